//! Integration tests for the connection manager and query service
//!
//! These tests require the test PostgreSQL database to be running.
//! Start it with: docker-compose -f docker-compose.test.yml up -d

use pgview::config::{ConnectionConfig, SslMode};
use pgview::db::{CellValue, ConnectionManager, DataType, QueryService, SqlParam};
use pgview::{DbError, ErrorKind};

/// Get test database connection config
pub fn test_config() -> ConnectionConfig {
    let var = |key: &str, default: &str| std::env::var(key).unwrap_or_else(|_| default.to_string());
    let mut config = ConnectionConfig::new(
        var("TEST_DB_HOST", "localhost"),
        std::env::var("TEST_DB_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(5433),
        var("TEST_DB_NAME", "test_db"),
        var("TEST_DB_USER", "test_user"),
        var("TEST_DB_PASSWORD", "test_password"),
    );
    config.ssl_mode = SslMode::Disable;
    config
}

/// Connected manager, or `None` (after a note on stderr) when there is no
/// database to test against
pub async fn connect() -> Option<ConnectionManager> {
    let config = test_config();
    let mut manager: ConnectionManager = ConnectionManager::new();
    match manager.connect(&config).await {
        Ok(_) => Some(manager),
        Err(e) => {
            eprintln!(
                "Skipping test: Database not available at {}:{} - {}",
                config.host, config.port, e
            );
            None
        }
    }
}

/// (Re)create `table` with three known rows
pub async fn create_fixture(manager: &ConnectionManager, table: &str) {
    let service = QueryService::new(manager, "public");
    service
        .run_query(&format!("DROP TABLE IF EXISTS {}", table), &[])
        .await
        .unwrap();
    service
        .run_query(
            &format!(
                "CREATE TABLE {} (id integer PRIMARY KEY, name text NOT NULL, email varchar(255))",
                table
            ),
            &[],
        )
        .await
        .unwrap();
    service
        .run_query(
            &format!(
                "INSERT INTO {} VALUES (1, 'Alice', 'alice@example.com'), (2, 'Bob', NULL), (3, 'Carol', 'carol@example.org')",
                table
            ),
            &[],
        )
        .await
        .unwrap();
}

pub async fn drop_fixture(manager: &ConnectionManager, table: &str) {
    let service = QueryService::new(manager, "public");
    let _ = service
        .run_query(&format!("DROP TABLE IF EXISTS {}", table), &[])
        .await;
}

#[tokio::test]
async fn test_connect_and_test_connection() {
    let Some(mut manager) = connect().await else {
        return;
    };
    assert!(manager.test_connection().await);
    let version = manager.server_version().await.unwrap();
    assert!(version.starts_with("PostgreSQL"), "got {}", version);

    manager.disconnect().await;
    assert!(!manager.test_connection().await);
}

#[tokio::test]
async fn test_wrong_password_is_connection_error() {
    let Some(_) = connect().await else {
        return;
    };
    let mut config = test_config();
    config.password = "definitely-not-the-password".to_string();
    let mut manager: ConnectionManager = ConnectionManager::new();
    let err = manager.connect(&config).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Connection);
    assert!(!manager.is_connected());
}

#[tokio::test]
async fn test_wrong_database_is_connection_error() {
    let Some(_) = connect().await else {
        return;
    };
    let mut config = test_config();
    config.database = "pgview_no_such_db".to_string();
    let mut manager: ConnectionManager = ConnectionManager::new();
    let err = manager.connect(&config).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Connection);
}

#[tokio::test]
async fn test_disconnect_twice() {
    let Some(mut manager) = connect().await else {
        return;
    };
    manager.disconnect().await;
    manager.disconnect().await;
    assert!(!manager.is_connected());
}

#[tokio::test]
async fn test_reconnect_replaces_session() {
    let Some(mut manager) = connect().await else {
        return;
    };
    manager.connect(&test_config()).await.unwrap();
    assert!(manager.test_connection().await);
    manager.disconnect().await;
}

#[tokio::test]
async fn test_list_tables_includes_fixture() {
    let Some(manager) = connect().await else {
        return;
    };
    create_fixture(&manager, "it_list_tables").await;

    let service = QueryService::new(&manager, "public");
    let tables = service.list_tables().await.unwrap();
    assert!(tables.contains(&"it_list_tables".to_string()));
    let mut sorted = tables.clone();
    sorted.sort();
    assert_eq!(tables, sorted);

    drop_fixture(&manager, "it_list_tables").await;
}

#[tokio::test]
async fn test_fetch_columns_matches_declaration() {
    let Some(manager) = connect().await else {
        return;
    };
    create_fixture(&manager, "it_fetch_columns").await;

    let service = QueryService::new(&manager, "public");
    let columns = service.fetch_columns("it_fetch_columns").await.unwrap();
    let names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["id", "name", "email"]);

    assert_eq!(columns[0].declared_type, "integer");
    assert!(!columns[0].nullable);
    assert_eq!(columns[1].data_type, DataType::Text);
    assert!(!columns[1].nullable);
    assert_eq!(columns[2].declared_type, "character varying");
    assert_eq!(columns[2].max_length, Some(255));
    assert!(columns[2].nullable);

    drop_fixture(&manager, "it_fetch_columns").await;
}

#[tokio::test]
async fn test_fetch_rows_limit_larger_than_table() {
    let Some(manager) = connect().await else {
        return;
    };
    create_fixture(&manager, "it_fetch_all").await;

    let service = QueryService::new(&manager, "public");
    let results = service.fetch_rows("it_fetch_all", 1000).await.unwrap();
    assert_eq!(results.rows.len(), 3);
    assert_eq!(results.row_count, 3);
    let columns = service.fetch_columns("it_fetch_all").await.unwrap();
    assert_eq!(results.column_count(), columns.len());
    assert_eq!(results.cell(1, "email"), Some(&CellValue::Null));

    drop_fixture(&manager, "it_fetch_all").await;
}

#[tokio::test]
async fn test_fetch_rows_limit_one() {
    let Some(manager) = connect().await else {
        return;
    };
    create_fixture(&manager, "it_fetch_one").await;

    let service = QueryService::new(&manager, "public");
    let results = service.fetch_rows("it_fetch_one", 1).await.unwrap();
    assert_eq!(results.row_count, 1);
    assert_eq!(results.rows.len(), 1);

    drop_fixture(&manager, "it_fetch_one").await;
}

#[tokio::test]
async fn test_fetch_rows_missing_table() {
    let Some(manager) = connect().await else {
        return;
    };
    let service = QueryService::new(&manager, "public");
    let err = service
        .fetch_rows("pgview_no_such_table", 10)
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::TableNotFound(_)));
    assert_eq!(err.kind(), ErrorKind::Query);
    assert!(manager.test_connection().await);
}

#[tokio::test]
async fn test_run_query_with_params() {
    let Some(manager) = connect().await else {
        return;
    };
    create_fixture(&manager, "it_run_query").await;

    let service = QueryService::new(&manager, "public");
    let results = service
        .run_query(
            "SELECT name FROM it_run_query WHERE id = $1 OR name = $2 ORDER BY id",
            &[SqlParam::Text("1".to_string()), SqlParam::from("Carol")],
        )
        .await
        .unwrap();
    assert_eq!(results.column_names(), vec!["name"]);
    assert_eq!(results.row_count, 2);
    assert_eq!(
        results.cell(0, "name"),
        Some(&CellValue::Text("Alice".to_string()))
    );
    assert_eq!(
        results.cell(1, "name"),
        Some(&CellValue::Text("Carol".to_string()))
    );

    drop_fixture(&manager, "it_run_query").await;
}

#[tokio::test]
async fn test_run_query_scalar_types() {
    let Some(manager) = connect().await else {
        return;
    };
    let service = QueryService::new(&manager, "public");
    let results = service
        .run_query("SELECT 1 AS num, 'hello' AS msg, NULL::text AS nothing", &[])
        .await
        .unwrap();
    assert_eq!(results.columns.len(), 3);
    let row = &results.rows[0];
    assert_eq!(row.values[0], CellValue::Integer(1));
    assert_eq!(row.values[1], CellValue::Text("hello".to_string()));
    assert_eq!(row.values[2], CellValue::Null);
}

#[tokio::test]
async fn test_run_query_syntax_error() {
    let Some(manager) = connect().await else {
        return;
    };
    let service = QueryService::new(&manager, "public");
    let err = service.run_query("SELEC 1", &[]).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Query);
    assert!(err.to_string().contains("syntax error"), "got {}", err);

    // The session survives a rejected statement
    assert!(manager.test_connection().await);
}

#[tokio::test]
async fn test_run_query_wrong_param_count() {
    let Some(manager) = connect().await else {
        return;
    };
    let service = QueryService::new(&manager, "public");
    let err = service
        .run_query("SELECT $1::int + $2::int", &[SqlParam::Integer(1)])
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::InvalidArgument(_)));
}

#[tokio::test]
async fn test_run_query_missing_table() {
    let Some(manager) = connect().await else {
        return;
    };
    let service = QueryService::new(&manager, "public");
    let err = service
        .run_query("SELECT * FROM pgview_no_such_table", &[])
        .await
        .unwrap_err();
    assert!(err.to_string().contains("does not exist"), "got {}", err);
}
