//! End-to-end tests against a DuckDB warehouse file
//!
//! Each test gets its own database in a temp directory.

use chrono::NaiveDate;
use ctm_sync::auth::ApiCredentials;
use ctm_sync::config::Settings;
use ctm_sync::jobs::{AccountsSync, BatchBackfill, DailySync, JobKind, JobOutcome};
use ctm_sync::pagination::Fetcher;
use ctm_sync::partition::BatchPartitioner;
use ctm_sync::warehouse::{DatasetRef, DuckDbWarehouse, Warehouse};
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PROJECT: &str = "data-etl-to-bigquery";

fn open_warehouse(dir: &TempDir) -> DuckDbWarehouse {
    DuckDbWarehouse::open(dir.path().join("ctm.duckdb"), PROJECT).unwrap()
}

fn dataset() -> DatasetRef {
    DatasetRef::new(PROJECT, "ctm_data")
}

fn fetcher(server: &MockServer, kind: JobKind) -> Fetcher {
    let settings = Settings::new(ApiCredentials::new("ak", "sk"))
        .with_api_base_url(server.uri())
        .with_requests_per_second(100);
    Fetcher::from_settings(&settings, kind.failure_policy()).unwrap()
}

async fn mount_accounts(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/accounts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "accounts": [
                {"id": 2, "name": "Beta", "status": "active", "created": "2022-06-01T08:30:00Z"},
                {"id": 1, "name": "Alpha", "status": "active", "created": "2021-01-01T00:00:00Z"},
                {"id": 3, "name": "Gamma", "status": "inactive", "created": null},
            ]
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_accounts_then_backfill() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start().await;
    mount_accounts(&server).await;
    for id in 1..=3 {
        Mock::given(method("GET"))
            .and(path(format!("/accounts/{id}/calls")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "calls": [{
                    "id": format!("call-{id}"),
                    "called_at": "2024-01-02 09:15:00 -0500",
                    "Caller Number": "+15550100",
                    "tags": ["a", "b"],
                }]
            })))
            .mount(&server)
            .await;
    }

    let wh = open_warehouse(&dir);

    let accounts_fetcher = fetcher(&server, JobKind::AccountsSync);
    AccountsSync::new(&accounts_fetcher, &wh, dataset())
        .run()
        .await
        .unwrap();

    let accounts = wh
        .read_rows(&dataset().table("accounts"), &["id", "name"], Some("id"))
        .await
        .unwrap();
    assert_eq!(accounts.len(), 3);
    assert_eq!(accounts[0]["name"], json!("Alpha"));

    let backfill_fetcher = fetcher(&server, JobKind::BatchBackfill);
    let job = BatchBackfill::new(
        &backfill_fetcher,
        &wh,
        dataset(),
        BatchPartitioner::with_size(2).unwrap(),
    );
    assert_eq!(job.run().await.unwrap().batch_index, Some(1));
    assert_eq!(job.run().await.unwrap().batch_index, Some(2));
    assert_eq!(
        job.run().await.unwrap().outcome,
        JobOutcome::AllBatchesComplete
    );

    let tables = wh
        .list_tables(&dataset(), "activities_raw_batch_")
        .await
        .unwrap();
    assert_eq!(tables, vec!["activities_raw_batch_1", "activities_raw_batch_2"]);

    let batch_one = wh
        .read_rows(
            &dataset().table("activities_raw_batch_1"),
            &["account_id", "caller_number", "tags"],
            Some("account_id"),
        )
        .await
        .unwrap();
    assert_eq!(batch_one.len(), 2);
    assert_eq!(batch_one[0]["account_id"], json!(1));
    assert_eq!(batch_one[0]["caller_number"], json!("+15550100"));
    assert_eq!(batch_one[0]["tags"], json!(r#"["a","b"]"#));

    let schema = wh
        .table_schema(&dataset().table("activities_raw_batch_1"))
        .await
        .unwrap();
    let called_at = schema.iter().find(|c| c.name == "called_at").unwrap();
    assert!(called_at.field_type.starts_with("TIMESTAMP"));
}

#[tokio::test]
async fn test_daily_append_tolerates_schema_drift() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start().await;
    mount_accounts(&server).await;

    Mock::given(method("GET"))
        .and(path("/accounts/1/calls"))
        .and(query_param("start_date", "2024-03-01"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "calls": [{"id": "d1", "duration": 12, "source": "web"}]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/accounts/1/calls"))
        .and(query_param("start_date", "2024-03-02"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "calls": [{"id": "d2", "duration": 40, "new_field": "surprise"}]
        })))
        .mount(&server)
        .await;
    for id in 2..=3 {
        Mock::given(method("GET"))
            .and(path(format!("/accounts/{id}/calls")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"calls": []})))
            .mount(&server)
            .await;
    }

    let wh = open_warehouse(&dir);
    let accounts_fetcher = fetcher(&server, JobKind::AccountsSync);
    AccountsSync::new(&accounts_fetcher, &wh, dataset())
        .run()
        .await
        .unwrap();

    let daily_fetcher = fetcher(&server, JobKind::DailySync);
    for day in [1, 2] {
        let report = DailySync::new(&daily_fetcher, &wh, dataset())
            .with_date(NaiveDate::from_ymd_opt(2024, 3, day).unwrap())
            .run()
            .await
            .unwrap();
        assert_eq!(report.rows_written, 1);
    }

    let daily = dataset().table("activities_raw_daily");
    let rows = wh
        .read_rows(&daily, &["id", "duration", "source"], Some("id"))
        .await
        .unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["source"], json!("web"));
    assert_eq!(rows[1]["duration"], json!(40));
    assert_eq!(rows[1]["source"], serde_json::Value::Null);

    let columns: Vec<String> = wh
        .table_schema(&daily)
        .await
        .unwrap()
        .into_iter()
        .map(|c| c.name)
        .collect();
    assert!(!columns.contains(&"new_field".to_string()));
}

#[tokio::test]
async fn test_reopen_sees_previous_tables() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start().await;
    mount_accounts(&server).await;

    {
        let wh = open_warehouse(&dir);
        let fetcher = fetcher(&server, JobKind::AccountsSync);
        AccountsSync::new(&fetcher, &wh, dataset())
            .run()
            .await
            .unwrap();
    }

    let wh = open_warehouse(&dir);
    let tables = wh.list_tables(&dataset(), "").await.unwrap();
    assert_eq!(tables, vec!["accounts"]);
}
