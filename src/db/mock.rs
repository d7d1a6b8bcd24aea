//! In-memory backend for unit tests
//!
//! Accepts exactly one set of credentials (see [`good_config`]) and serves a
//! fixed `public` schema: `users` (3 rows) and `orders` (empty). Every trait
//! call counts as a round-trip; counters live in thread-locals, and each
//! test runs on its own thread.

use crate::config::{ConnectionConfig, SslMode};
use crate::db::Database;
use crate::db::query::select_rows_sql;
use crate::db::schema::ColumnInfo;
use crate::db::types::{CellValue, ColumnDef, QueryResults, Row, SqlParam};
use crate::error::{DbError, DbResult};
use std::cell::Cell;
use std::time::Duration;

thread_local! {
    static ROUND_TRIPS: Cell<usize> = const { Cell::new(0) };
    static CLOSED: Cell<usize> = const { Cell::new(0) };
    static SERVER_DOWN: Cell<bool> = const { Cell::new(false) };
    static CATALOG_DOWN: Cell<bool> = const { Cell::new(false) };
}

pub(crate) const LOOKUP_SQL: &str = "SELECT name FROM users WHERE id = $1";

pub(crate) fn good_config() -> ConnectionConfig {
    let mut config = ConnectionConfig::new("localhost", 5432, "shop", "reader", "secret");
    config.ssl_mode = SslMode::Disable;
    config
}

pub(crate) fn round_trips() -> usize {
    ROUND_TRIPS.with(Cell::get)
}

pub(crate) fn reset_round_trips() {
    ROUND_TRIPS.with(|c| c.set(0));
}

pub(crate) fn closed_handles() -> usize {
    CLOSED.with(Cell::get)
}

pub(crate) fn reset_closed() {
    CLOSED.with(|c| c.set(0));
}

pub(crate) fn set_server_down(down: bool) {
    SERVER_DOWN.with(|c| c.set(down));
}

/// Make catalog reads fail while connecting and pinging still work
pub(crate) fn set_catalog_down(down: bool) {
    CATALOG_DOWN.with(|c| c.set(down));
}

fn round_trip() -> DbResult<()> {
    ROUND_TRIPS.with(|c| c.set(c.get() + 1));
    if SERVER_DOWN.with(Cell::get) {
        Err(DbError::ConnectionFailed(
            "server closed the connection unexpectedly".to_string(),
        ))
    } else {
        Ok(())
    }
}

#[derive(Debug)]
struct MockTable {
    name: &'static str,
    columns: Vec<ColumnInfo>,
    rows: Vec<Row>,
}

#[derive(Debug)]
pub(crate) struct MockDatabase {
    tables: Vec<MockTable>,
}

fn column(name: &str, declared: &str, max_length: Option<i32>, nullable: &str, pos: i32) -> ColumnInfo {
    ColumnInfo::from_catalog(
        name.to_string(),
        declared.to_string(),
        max_length,
        nullable,
        pos,
    )
}

fn user_row(id: i64, name: &str, email: Option<&str>) -> Row {
    Row {
        values: vec![
            CellValue::Integer(id),
            CellValue::Text(name.to_string()),
            email.map_or(CellValue::Null, |e| CellValue::Text(e.to_string())),
        ],
    }
}

impl MockDatabase {
    fn seeded() -> Self {
        Self {
            tables: vec![
                MockTable {
                    name: "users",
                    columns: vec![
                        column("id", "integer", None, "NO", 1),
                        column("name", "text", None, "NO", 2),
                        column("email", "character varying", Some(255), "YES", 3),
                    ],
                    rows: vec![
                        user_row(1, "Alice", Some("alice@example.com")),
                        user_row(2, "Bob", None),
                        user_row(3, "Carol", Some("carol@example.org")),
                    ],
                },
                MockTable {
                    name: "orders",
                    columns: vec![
                        column("id", "integer", None, "NO", 1),
                        column("user_id", "integer", None, "NO", 2),
                        column("amount", "numeric", None, "YES", 3),
                    ],
                    rows: vec![],
                },
            ],
        }
    }

    fn table(&self, name: &str) -> Option<&MockTable> {
        self.tables.iter().find(|t| t.name == name)
    }
}

fn as_defs(columns: &[ColumnInfo]) -> Vec<ColumnDef> {
    columns
        .iter()
        .map(|c| ColumnDef {
            name: c.name.clone(),
            data_type: c.data_type.clone(),
        })
        .collect()
}

impl Database for MockDatabase {
    async fn connect(config: &ConnectionConfig) -> DbResult<Self> {
        round_trip()?;
        let good = good_config();
        if config.host != good.host {
            return Err(DbError::ConnectionFailed(format!(
                "could not translate host name \"{}\" to address",
                config.host
            )));
        }
        if config.port != good.port {
            return Err(DbError::ConnectionFailed("connection refused".to_string()));
        }
        if config.database != good.database {
            return Err(DbError::ConnectionFailed(format!(
                "database \"{}\" does not exist",
                config.database
            )));
        }
        if config.username != good.username || config.password != good.password {
            return Err(DbError::ConnectionFailed(format!(
                "password authentication failed for user \"{}\"",
                config.username
            )));
        }
        Ok(Self::seeded())
    }

    async fn close(self) {
        CLOSED.with(|c| c.set(c.get() + 1));
    }

    async fn ping(&self) -> DbResult<String> {
        round_trip()?;
        Ok("PostgreSQL 16.0 (mock)".to_string())
    }

    async fn list_tables(&self, schema: &str) -> DbResult<Vec<String>> {
        round_trip()?;
        if CATALOG_DOWN.with(Cell::get) {
            return Err(DbError::QueryFailed(
                "ERROR: permission denied for schema information_schema".to_string(),
            ));
        }
        if schema != "public" {
            return Ok(Vec::new());
        }
        let mut names: Vec<String> = self.tables.iter().map(|t| t.name.to_string()).collect();
        names.sort();
        Ok(names)
    }

    async fn table_columns(&self, schema: &str, table: &str) -> DbResult<Vec<ColumnInfo>> {
        round_trip()?;
        if schema != "public" {
            return Ok(Vec::new());
        }
        Ok(self
            .table(table)
            .map(|t| t.columns.clone())
            .unwrap_or_default())
    }

    async fn query(&self, sql: &str, params: &[SqlParam]) -> DbResult<QueryResults> {
        round_trip()?;

        if let Some(table) = self
            .tables
            .iter()
            .find(|t| select_rows_sql("public", t.name) == sql)
        {
            let limit = match params {
                [SqlParam::Integer(n)] if *n >= 0 => *n as usize,
                _ => {
                    return Err(DbError::InvalidArgument(
                        "statement expects 1 parameter(s)".to_string(),
                    ));
                }
            };
            let rows = table.rows.iter().take(limit).cloned().collect();
            return Ok(QueryResults::new(
                as_defs(&table.columns),
                rows,
                Duration::from_millis(1),
            ));
        }

        if sql == LOOKUP_SQL {
            let id = match params {
                [SqlParam::Integer(n)] => *n,
                [SqlParam::Text(s)] => s.trim().parse().map_err(|_| {
                    DbError::InvalidArgument(format!("parameter $1: '{}' is not a valid integer", s))
                })?,
                _ => {
                    return Err(DbError::InvalidArgument(format!(
                        "statement expects 1 parameter(s), {} given",
                        params.len()
                    )));
                }
            };
            let users = self.table("users").map(|t| t.rows.as_slice()).unwrap_or(&[]);
            let rows = users
                .iter()
                .filter(|r| r.values[0] == CellValue::Integer(id))
                .map(|r| Row {
                    values: vec![r.values[1].clone()],
                })
                .collect();
            let columns = vec![ColumnDef {
                name: "name".to_string(),
                data_type: crate::db::types::DataType::Text,
            }];
            return Ok(QueryResults::new(columns, rows, Duration::from_millis(1)));
        }

        let near = sql.split_whitespace().next().unwrap_or("");
        Err(DbError::QueryFailed(format!(
            "ERROR: syntax error at or near \"{}\"",
            near
        )))
    }
}
