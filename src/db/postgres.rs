//! PostgreSQL database provider
//!
//! Concrete implementation using tokio-postgres.

use crate::config::{ConnectionConfig, SslMode};
use crate::db::Database;
use crate::db::schema::ColumnInfo;
use crate::db::types::{CellValue, ColumnDef, DataType, QueryResults, Row, SqlParam};
use crate::error::{DbError, DbResult};
use bytes::BytesMut;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_postgres::Client;
use tokio_postgres::types::{FromSql, IsNull, Kind, ToSql, Type, to_sql_checked};
use tracing::{debug, warn};

/// How long `close` waits for the connection task to send Terminate
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// PostgreSQL database provider
#[derive(Debug)]
pub struct PostgresProvider {
    /// The tokio-postgres client
    client: Client,
    /// Background task driving the socket
    connection_task: JoinHandle<()>,
}

impl Database for PostgresProvider {
    async fn connect(config: &ConnectionConfig) -> DbResult<Self> {
        let conn_string = config.connection_string_with_password();
        let label = config.display_name();

        let (client, connection_task) = match config.ssl_mode {
            SslMode::Disable => {
                let (client, connection) =
                    tokio_postgres::connect(&conn_string, tokio_postgres::NoTls)
                        .await
                        .map_err(DbError::connection)?;
                let task = tokio::spawn(async move {
                    if let Err(e) = connection.await {
                        warn!("Connection to {} lost: {}", label, e);
                    }
                });
                (client, task)
            }
            SslMode::Prefer | SslMode::Require => {
                let tls = tokio_postgres_rustls::MakeRustlsConnect::new(make_tls_config());
                let (client, connection) = tokio_postgres::connect(&conn_string, tls)
                    .await
                    .map_err(DbError::connection)?;
                let task = tokio::spawn(async move {
                    if let Err(e) = connection.await {
                        warn!("Connection to {} lost: {}", label, e);
                    }
                });
                (client, task)
            }
        };

        Ok(Self {
            client,
            connection_task,
        })
    }

    async fn close(self) {
        let Self {
            client,
            mut connection_task,
        } = self;
        // Dropping the last client handle makes the connection send Terminate
        drop(client);
        if tokio::time::timeout(CLOSE_TIMEOUT, &mut connection_task)
            .await
            .is_err()
        {
            warn!("Connection did not shut down in time, aborting");
            connection_task.abort();
        }
    }

    async fn ping(&self) -> DbResult<String> {
        if self.client.is_closed() {
            return Err(DbError::ConnectionFailed("connection is closed".to_string()));
        }
        let row = self
            .client
            .query_one("SELECT version()", &[])
            .await
            .map_err(DbError::connection)?;
        row.try_get(0).map_err(DbError::connection)
    }

    async fn list_tables(&self, schema: &str) -> DbResult<Vec<String>> {
        let rows = self
            .client
            .query(
                "SELECT table_name::text \
                 FROM information_schema.tables \
                 WHERE table_schema = $1::text \
                   AND table_type IN ('BASE TABLE', 'VIEW') \
                 ORDER BY table_name",
                &[&schema],
            )
            .await
            .map_err(DbError::query)?;

        Ok(rows.iter().map(|r| r.get(0)).collect())
    }

    async fn table_columns(&self, schema: &str, table: &str) -> DbResult<Vec<ColumnInfo>> {
        let rows = self
            .client
            .query(
                "SELECT column_name::text, data_type::text, \
                        character_maximum_length::int4, is_nullable::text, \
                        ordinal_position::int4 \
                 FROM information_schema.columns \
                 WHERE table_schema = $1::text AND table_name = $2::text \
                 ORDER BY ordinal_position",
                &[&schema, &table],
            )
            .await
            .map_err(DbError::query)?;

        Ok(rows
            .iter()
            .map(|r| {
                let is_nullable: String = r.get(3);
                ColumnInfo::from_catalog(r.get(0), r.get(1), r.get(2), &is_nullable, r.get(4))
            })
            .collect())
    }

    async fn query(&self, sql: &str, params: &[SqlParam]) -> DbResult<QueryResults> {
        let start = Instant::now();

        let stmt = self.client.prepare(sql).await.map_err(DbError::query)?;

        let expected = stmt.params();
        if expected.len() != params.len() {
            return Err(DbError::InvalidArgument(format!(
                "statement expects {} parameter(s), {} given",
                expected.len(),
                params.len()
            )));
        }

        let bound = params
            .iter()
            .zip(expected)
            .enumerate()
            .map(|(i, (param, ty))| {
                bind_param(param, ty)
                    .map_err(|msg| DbError::InvalidArgument(format!("parameter ${}: {}", i + 1, msg)))
            })
            .collect::<DbResult<Vec<BoundParam>>>()?;
        let refs: Vec<&(dyn ToSql + Sync)> =
            bound.iter().map(|b| b as &(dyn ToSql + Sync)).collect();

        let columns: Vec<ColumnDef> = stmt
            .columns()
            .iter()
            .map(|col| ColumnDef {
                name: col.name().to_string(),
                data_type: pg_type_to_datatype(col.type_()),
            })
            .collect();

        let pg_rows = self
            .client
            .query(&stmt, &refs)
            .await
            .map_err(DbError::query)?;

        let rows = pg_rows
            .iter()
            .map(|pg_row| Row {
                values: columns
                    .iter()
                    .enumerate()
                    .map(|(i, col)| extract_cell_value(pg_row, i, &col.data_type))
                    .collect(),
            })
            .collect();

        Ok(QueryResults::new(columns, rows, start.elapsed()))
    }
}

/// Map a tokio_postgres Type to our DataType enum
fn pg_type_to_datatype(pg_type: &Type) -> DataType {
    match pg_type.kind() {
        Kind::Array(inner) => DataType::Array(Box::new(pg_type_to_datatype(inner))),
        Kind::Domain(base) => pg_type_to_datatype(base),
        _ => DataType::from_catalog_name(pg_type.name()),
    }
}

/// Build a rustls ClientConfig that trusts OS certificates (with Mozilla roots as fallback)
fn make_tls_config() -> rustls::ClientConfig {
    let mut root_store = rustls::RootCertStore::empty();

    let native_certs = rustls_native_certs::load_native_certs();
    let loaded = native_certs
        .certs
        .into_iter()
        .filter(|cert| root_store.add(cert.clone()).is_ok())
        .count();
    if loaded == 0 {
        debug!("No native root certificates, using bundled Mozilla roots");
        root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    }

    rustls::ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth()
}

/// A parameter value already converted to the Rust type matching the
/// statement's declared parameter type.
#[derive(Debug, Clone, PartialEq)]
enum BoundParam {
    Null,
    Bool(bool),
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    Numeric(Decimal),
    Text(String),
    Uuid(uuid::Uuid),
    Json(serde_json::Value),
    Date(NaiveDate),
    Time(NaiveTime),
    Timestamp(NaiveDateTime),
    TimestampTz(DateTime<Utc>),
}

impl ToSql for BoundParam {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn std::error::Error + Sync + Send>> {
        match self {
            BoundParam::Null => Ok(IsNull::Yes),
            BoundParam::Bool(v) => v.to_sql(ty, out),
            BoundParam::I16(v) => v.to_sql(ty, out),
            BoundParam::I32(v) => v.to_sql(ty, out),
            BoundParam::I64(v) => v.to_sql(ty, out),
            BoundParam::F32(v) => v.to_sql(ty, out),
            BoundParam::F64(v) => v.to_sql(ty, out),
            BoundParam::Numeric(v) => v.to_sql(ty, out),
            BoundParam::Text(v) => v.to_sql(ty, out),
            BoundParam::Uuid(v) => v.to_sql(ty, out),
            BoundParam::Json(v) => v.to_sql(ty, out),
            BoundParam::Date(v) => v.to_sql(ty, out),
            BoundParam::Time(v) => v.to_sql(ty, out),
            BoundParam::Timestamp(v) => v.to_sql(ty, out),
            BoundParam::TimestampTz(v) => v.to_sql(ty, out),
        }
    }

    // bind_param already picked the representation for `ty`
    fn accepts(_ty: &Type) -> bool {
        true
    }

    to_sql_checked!();
}

/// Convert a caller-supplied parameter to the representation `ty` expects.
fn bind_param(param: &SqlParam, ty: &Type) -> Result<BoundParam, String> {
    let target = pg_type_to_datatype(ty);
    match (param, &target) {
        (SqlParam::Null, _) => Ok(BoundParam::Null),
        (SqlParam::Text(s), t) => parse_text_param(s, t),
        (SqlParam::Bool(b), DataType::Boolean) => Ok(BoundParam::Bool(*b)),
        (SqlParam::Integer(n), DataType::SmallInt) => i16::try_from(*n)
            .map(BoundParam::I16)
            .map_err(|_| format!("{} is out of range for smallint", n)),
        (SqlParam::Integer(n), DataType::Integer) => i32::try_from(*n)
            .map(BoundParam::I32)
            .map_err(|_| format!("{} is out of range for integer", n)),
        (SqlParam::Integer(n), DataType::BigInt) => Ok(BoundParam::I64(*n)),
        (SqlParam::Integer(n), DataType::Real) => Ok(BoundParam::F32(*n as f32)),
        (SqlParam::Integer(n), DataType::Double) => Ok(BoundParam::F64(*n as f64)),
        (SqlParam::Integer(n), DataType::Numeric) => Ok(BoundParam::Numeric(Decimal::from(*n))),
        (SqlParam::Float(f), DataType::Real) => Ok(BoundParam::F32(*f as f32)),
        (SqlParam::Float(f), DataType::Double) => Ok(BoundParam::F64(*f)),
        (SqlParam::Float(f), DataType::Numeric) => Decimal::try_from(*f)
            .map(BoundParam::Numeric)
            .map_err(|e| format!("{} is not a valid numeric: {}", f, e)),
        (other, t) if is_text_type(t) => Ok(BoundParam::Text(param_as_text(other))),
        (other, t) => Err(format!(
            "cannot bind {} to {}",
            param_kind(other),
            t.display_name()
        )),
    }
}

fn is_text_type(t: &DataType) -> bool {
    matches!(
        t,
        DataType::Text | DataType::Varchar(_) | DataType::Char(_) | DataType::Unknown(_)
    )
}

fn param_kind(param: &SqlParam) -> &'static str {
    match param {
        SqlParam::Null => "null",
        SqlParam::Bool(_) => "boolean",
        SqlParam::Integer(_) => "integer",
        SqlParam::Float(_) => "float",
        SqlParam::Text(_) => "text",
    }
}

fn param_as_text(param: &SqlParam) -> String {
    match param {
        SqlParam::Null => String::new(),
        SqlParam::Bool(b) => b.to_string(),
        SqlParam::Integer(n) => n.to_string(),
        SqlParam::Float(f) => f.to_string(),
        SqlParam::Text(s) => s.clone(),
    }
}

/// Parse a text parameter into the target type (the common case for values
/// typed into a search box or passed on the command line).
fn parse_text_param(s: &str, target: &DataType) -> Result<BoundParam, String> {
    let v = s.trim();
    let invalid = |what: &str| format!("'{}' is not a valid {}", s, what);

    match target {
        t if is_text_type(t) => Ok(BoundParam::Text(s.to_string())),
        DataType::Boolean => match v.to_ascii_lowercase().as_str() {
            "true" | "t" | "yes" | "y" | "on" | "1" => Ok(BoundParam::Bool(true)),
            "false" | "f" | "no" | "n" | "off" | "0" => Ok(BoundParam::Bool(false)),
            _ => Err(invalid("boolean")),
        },
        DataType::SmallInt => v
            .parse()
            .map(BoundParam::I16)
            .map_err(|_| invalid("smallint")),
        DataType::Integer => v
            .parse()
            .map(BoundParam::I32)
            .map_err(|_| invalid("integer")),
        DataType::BigInt => v
            .parse()
            .map(BoundParam::I64)
            .map_err(|_| invalid("bigint")),
        DataType::Real => v.parse().map(BoundParam::F32).map_err(|_| invalid("real")),
        DataType::Double => v
            .parse()
            .map(BoundParam::F64)
            .map_err(|_| invalid("double precision")),
        DataType::Numeric => v
            .parse::<Decimal>()
            .or_else(|_| Decimal::from_scientific(v))
            .map(BoundParam::Numeric)
            .map_err(|_| invalid("numeric")),
        DataType::Uuid => uuid::Uuid::parse_str(v)
            .map(BoundParam::Uuid)
            .map_err(|_| invalid("uuid")),
        DataType::Json | DataType::Jsonb => serde_json::from_str(s)
            .map(BoundParam::Json)
            .map_err(|e| format!("invalid JSON: {}", e)),
        DataType::Date => NaiveDate::parse_from_str(v, "%Y-%m-%d")
            .map(BoundParam::Date)
            .map_err(|_| invalid("date (expected YYYY-MM-DD)")),
        DataType::Time => NaiveTime::parse_from_str(v, "%H:%M:%S%.f")
            .or_else(|_| NaiveTime::parse_from_str(v, "%H:%M"))
            .map(BoundParam::Time)
            .map_err(|_| invalid("time (expected HH:MM[:SS])")),
        DataType::Timestamp => parse_naive_timestamp(v)
            .map(BoundParam::Timestamp)
            .ok_or_else(|| invalid("timestamp")),
        DataType::TimestampTz => DateTime::parse_from_rfc3339(v)
            .or_else(|_| DateTime::parse_from_str(v, "%Y-%m-%d %H:%M:%S%.f%#z"))
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
            // No offset given: read it as UTC
            .or_else(|| parse_naive_timestamp(v).map(|naive| naive.and_utc()))
            .map(BoundParam::TimestampTz)
            .ok_or_else(|| invalid("timestamp with time zone")),
        other => Err(format!("cannot bind text to {}", other.display_name())),
    }
}

fn parse_naive_timestamp(v: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(v, "%Y-%m-%d %H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(v, "%Y-%m-%dT%H:%M:%S%.f"))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(v, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// Read column `idx` as `T`, mapping NULL to `CellValue::Null` and falling
/// back to the text representation when the type doesn't match.
fn typed<'a, T>(row: &'a tokio_postgres::Row, idx: usize, wrap: impl FnOnce(T) -> CellValue) -> CellValue
where
    T: FromSql<'a>,
{
    match row.try_get::<_, Option<T>>(idx) {
        Ok(Some(v)) => wrap(v),
        Ok(None) => CellValue::Null,
        Err(_) => try_as_string(row, idx),
    }
}

/// Read an array column as `Vec<T>`, wrapping each element.
fn typed_array<'a, T>(
    row: &'a tokio_postgres::Row,
    idx: usize,
    wrap: impl Fn(T) -> CellValue,
) -> CellValue
where
    T: FromSql<'a>,
{
    typed::<Vec<T>>(row, idx, |items| {
        CellValue::Array(items.into_iter().map(wrap).collect())
    })
}

/// Extract a cell value from a tokio_postgres Row based on the column's DataType.
///
/// Returns CellValue::Null only for actual NULL values.
fn extract_cell_value(row: &tokio_postgres::Row, idx: usize, data_type: &DataType) -> CellValue {
    match data_type {
        DataType::SmallInt => typed::<i16>(row, idx, |v| CellValue::Integer(v.into())),
        DataType::Integer => typed::<i32>(row, idx, |v| CellValue::Integer(v.into())),
        DataType::BigInt => typed::<i64>(row, idx, CellValue::Integer),
        DataType::Real => typed::<f32>(row, idx, |v| CellValue::Float(v.into())),
        DataType::Double => typed::<f64>(row, idx, CellValue::Float),
        // Kept as text so no precision is lost
        DataType::Numeric => typed::<Decimal>(row, idx, |v| CellValue::Text(v.to_string())),
        DataType::Boolean => typed::<bool>(row, idx, CellValue::Boolean),
        DataType::Json | DataType::Jsonb => typed::<serde_json::Value>(row, idx, CellValue::Json),
        DataType::Bytea => typed::<Vec<u8>>(row, idx, CellValue::Binary),
        DataType::Uuid => typed::<uuid::Uuid>(row, idx, |v| CellValue::Uuid(v.to_string())),
        DataType::Timestamp => {
            typed::<NaiveDateTime>(row, idx, |v| CellValue::DateTime(v.to_string()))
        }
        DataType::TimestampTz => {
            typed::<DateTime<Utc>>(row, idx, |v| CellValue::DateTime(v.to_string()))
        }
        DataType::Date => typed::<NaiveDate>(row, idx, |v| CellValue::DateTime(v.to_string())),
        DataType::Time => typed::<NaiveTime>(row, idx, |v| CellValue::DateTime(v.to_string())),
        DataType::Array(inner) => extract_array_value(row, idx, inner),
        // Text types and fallback for unknown types
        _ => try_as_string(row, idx),
    }
}

/// Extract an array value, typed by its element type.
fn extract_array_value(row: &tokio_postgres::Row, idx: usize, inner: &DataType) -> CellValue {
    match inner {
        DataType::Text | DataType::Varchar(_) | DataType::Char(_) => {
            typed_array::<String>(row, idx, CellValue::Text)
        }
        DataType::SmallInt => typed_array::<i16>(row, idx, |n| CellValue::Integer(n.into())),
        DataType::Integer => typed_array::<i32>(row, idx, |n| CellValue::Integer(n.into())),
        DataType::BigInt => typed_array::<i64>(row, idx, CellValue::Integer),
        DataType::Real => typed_array::<f32>(row, idx, |n| CellValue::Float(n.into())),
        DataType::Double => typed_array::<f64>(row, idx, CellValue::Float),
        DataType::Boolean => typed_array::<bool>(row, idx, CellValue::Boolean),
        DataType::Uuid => typed_array::<uuid::Uuid>(row, idx, |u| CellValue::Uuid(u.to_string())),
        DataType::Json | DataType::Jsonb => {
            typed_array::<serde_json::Value>(row, idx, CellValue::Json)
        }
        DataType::Numeric => typed_array::<Decimal>(row, idx, |d| CellValue::Text(d.to_string())),
        _ => try_as_string(row, idx),
    }
}

/// Try to extract a value as a string (fallback for type mismatches).
///
/// When even the string fallback fails, includes the postgres type name
/// so the user knows what type couldn't be displayed.
fn try_as_string(row: &tokio_postgres::Row, idx: usize) -> CellValue {
    match row.try_get::<_, Option<String>>(idx) {
        Ok(Some(v)) => CellValue::Text(v),
        Ok(None) => CellValue::Null,
        Err(_) => {
            let type_name = row
                .columns()
                .get(idx)
                .map_or("unknown", |c| c.type_().name());
            CellValue::Text(format!("<unable to display: {}>", type_name))
        }
    }
}
