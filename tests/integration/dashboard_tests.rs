//! Integration tests for the dashboard session against a live database

use crate::postgres_tests::{connect, create_fixture, drop_fixture, test_config};
use pgview::app::{Action, Dashboard, StatusLevel};
use pgview::config::Settings;

fn level(dash: &Dashboard) -> StatusLevel {
    dash.status_message.as_ref().map(|s| s.level).unwrap()
}

#[tokio::test]
async fn test_browse_search_and_export() {
    let Some(mut fixture) = connect().await else {
        return;
    };
    create_fixture(&fixture, "it_dashboard").await;

    let dir = tempfile::tempdir().unwrap();
    let settings = Settings {
        export_dir: Some(dir.path().to_path_buf()),
        ..Settings::default()
    };
    let mut dash: Dashboard = Dashboard::new(test_config(), settings);

    dash.handle(Action::Connect).await;
    assert_eq!(level(&dash), StatusLevel::Success);
    assert!(dash.tables.contains(&"it_dashboard".to_string()));

    dash.handle(Action::SelectTable("it_dashboard".to_string())).await;
    assert_eq!(level(&dash), StatusLevel::Success);
    assert_eq!(dash.visible_results().unwrap().row_count, 3);

    dash.handle(Action::Search {
        text: "example.org".to_string(),
        column: Some("email".to_string()),
    })
    .await;
    assert_eq!(dash.visible_results().unwrap().row_count, 1);

    dash.handle(Action::Export(None)).await;
    assert_eq!(level(&dash), StatusLevel::Success);
    let csv = std::fs::read_to_string(dir.path().join("it_dashboard.csv")).unwrap();
    assert_eq!(csv, "id,name,email\n3,Carol,carol@example.org\n");

    dash.handle(Action::Disconnect).await;
    assert!(!dash.is_connected());

    drop_fixture(&fixture, "it_dashboard").await;
    fixture.disconnect().await;
}

#[tokio::test]
async fn test_errors_become_status() {
    let Some(_) = connect().await else {
        return;
    };
    let mut dash: Dashboard = Dashboard::new(test_config(), Settings::default());
    dash.handle(Action::Connect).await;

    dash.handle(Action::RunQuery {
        sql: "SELEC 1".to_string(),
        params: vec![],
    })
    .await;
    assert_eq!(level(&dash), StatusLevel::Error);

    dash.handle(Action::TestConnection).await;
    assert_eq!(level(&dash), StatusLevel::Success);

    dash.handle(Action::Disconnect).await;
}
