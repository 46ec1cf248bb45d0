//! Tests for the job drivers

use super::*;
use crate::error::{Error, Result};
use crate::http::{HttpClient, HttpClientConfig};
use crate::output::{arrow_to_json, records_to_batch};
use crate::pagination::{FetchConfig, Fetcher};
use crate::partition::{BatchPartitioner, BatchProgress};
use crate::types::{FailurePolicy, JsonObject};
use crate::warehouse::{DatasetRef, MemoryWarehouse, TableRef};
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use chrono::NaiveDate;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::collections::BTreeSet;
use std::time::Duration;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn dataset() -> DatasetRef {
    DatasetRef::new("proj", "ctm_data")
}

fn table(name: &str) -> TableRef {
    dataset().table(name)
}

fn objects(values: Vec<Value>) -> Vec<JsonObject> {
    values
        .into_iter()
        .map(|v| match v {
            Value::Object(obj) => obj,
            _ => panic!("expected object"),
        })
        .collect()
}

fn batch(values: Vec<Value>) -> RecordBatch {
    records_to_batch(&objects(values), &[]).unwrap()
}

fn fetcher(server: &MockServer, policy: FailurePolicy) -> Fetcher {
    let config = HttpClientConfig::builder()
        .base_url(server.uri())
        .no_rate_limit()
        .build();
    Fetcher::new(
        HttpClient::with_config(config).unwrap(),
        FetchConfig::new(100, policy),
    )
}

/// Warehouse holding an accounts table with ids `1..=n`
fn warehouse_with_accounts(n: i64) -> MemoryWarehouse {
    let rows = (1..=n)
        .rev()
        .map(|id| json!({"id": id, "name": format!("Account {id}")}))
        .collect();
    MemoryWarehouse::new().with_table(table("accounts"), batch(rows))
}

async fn mount_calls(server: &MockServer, account: i64, calls: Value) {
    Mock::given(method("GET"))
        .and(path(format!("/accounts/{account}/calls")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "calls": calls })))
        .mount(server)
        .await;
}

async fn stored(wh: &MemoryWarehouse, name: &str) -> Vec<JsonObject> {
    arrow_to_json(&wh.batch(&table(name)).unwrap()).unwrap()
}

// ============================================================================
// Reporting
// ============================================================================

#[test]
fn test_job_kind_names_and_policies() {
    assert_eq!(JobKind::AccountsSync.name(), "ctm_accounts_sync");
    assert_eq!(JobKind::BatchBackfill.to_string(), "ctm_batch_backfill");
    assert_eq!(JobKind::DailySync.title(), "CTM Daily Sync");

    assert_eq!(
        JobKind::BatchBackfill.failure_policy(),
        FailurePolicy::SkipOnError
    );
    assert_eq!(JobKind::DailySync.failure_policy(), FailurePolicy::FailFast);
    assert_eq!(JobKind::AccountsSync.failure_policy(), FailurePolicy::FailFast);
}

#[test]
fn test_processing_seconds_rounding() {
    assert_eq!(processing_seconds(Duration::from_millis(1234)), 1.23);
    assert_eq!(processing_seconds(Duration::from_millis(1236)), 1.24);
    assert_eq!(processing_seconds(Duration::ZERO), 0.0);
}

#[tokio::test]
async fn test_run_instrumented_passes_results_through() {
    let report = run_instrumented(JobKind::DailySync, async {
        Ok(JobReport::new(JobKind::DailySync, JobOutcome::NoData))
    })
    .await
    .unwrap();
    assert_eq!(report.outcome, JobOutcome::NoData);

    let err = run_instrumented(JobKind::DailySync, async {
        Err(Error::warehouse("table is locked"))
    })
    .await
    .unwrap_err();
    assert!(matches!(err, Error::Warehouse { .. }));
}

// ============================================================================
// Accounts sync
// ============================================================================

#[test]
fn test_select_account_columns() {
    let rows = select_account_columns(objects(vec![
        json!({"id": 1, "name": "A", "extra": "x", "status": "active"}),
        json!({"status": "inactive", "id": 2, "agency_id": {"nested": true}}),
    ]));

    let keys: Vec<&str> = rows[0].keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["id", "name", "status", "agency_id"]);

    assert_eq!(rows[0]["agency_id"], Value::Null);
    assert_eq!(rows[1]["name"], Value::Null);
    assert_eq!(rows[1]["agency_id"], json!(r#"{"nested":true}"#));
}

#[tokio::test]
async fn test_accounts_sync_two_pages() {
    let server = MockServer::start().await;
    let next = format!("{}/accounts?page=2", server.uri());

    Mock::given(method("GET"))
        .and(path("/accounts"))
        .and(query_param("per_page", "100"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "accounts": [
                {"id": 1, "name": "One", "status": "active", "created": "2023-01-05T10:00:00Z"},
                {"id": 2, "name": "Two", "status": "active", "created": "2023-02-05T10:00:00Z"},
            ],
            "next_page": next,
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/accounts"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "accounts": [
                {"id": 3, "name": "Three", "status": "inactive", "unknown": 1},
                {"id": 4, "name": "Four", "status": "active", "created": null},
            ],
        })))
        .expect(1)
        .mount(&server)
        .await;

    let wh = MemoryWarehouse::new();
    let fetcher = fetcher(&server, FailurePolicy::FailFast);
    let report = AccountsSync::new(&fetcher, &wh, dataset())
        .run()
        .await
        .unwrap();

    assert_eq!(report.outcome, JobOutcome::Written);
    assert_eq!(report.records_fetched, 4);
    assert_eq!(report.rows_written, 4);
    assert_eq!(report.columns, 4);
    assert_eq!(report.destination.as_deref(), Some("proj.ctm_data.accounts"));
    assert_eq!(wh.write_count(), 1);

    let rows = stored(&wh, "accounts").await;
    let ids: Vec<i64> = rows.iter().map(|r| r["id"].as_i64().unwrap()).collect();
    assert_eq!(ids, vec![1, 2, 3, 4]);
    assert_eq!(rows[0]["created"], json!("2023-01-05T10:00:00Z"));
    assert_eq!(rows[2]["created"], Value::Null);
    assert!(!rows[2].contains_key("unknown"));
}

#[tokio::test]
async fn test_accounts_sync_empty_writes_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/accounts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"accounts": []})))
        .mount(&server)
        .await;

    let wh = MemoryWarehouse::new();
    let fetcher = fetcher(&server, FailurePolicy::FailFast);
    let report = AccountsSync::new(&fetcher, &wh, dataset())
        .run()
        .await
        .unwrap();

    assert_eq!(report.outcome, JobOutcome::NoData);
    assert_eq!(wh.write_count(), 0);
}

#[tokio::test]
async fn test_accounts_sync_upstream_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/accounts"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
        .mount(&server)
        .await;

    let wh = MemoryWarehouse::new();
    let fetcher = fetcher(&server, FailurePolicy::FailFast);
    let err = AccountsSync::new(&fetcher, &wh, dataset())
        .run()
        .await
        .unwrap_err();

    assert!(err.is_http_status());
    assert_eq!(wh.write_count(), 0);
}

// ============================================================================
// Batch backfill
// ============================================================================

fn backfill<'a>(fetcher: &'a Fetcher, wh: &'a MemoryWarehouse, size: usize) -> BatchBackfill<'a> {
    BatchBackfill::new(
        fetcher,
        wh,
        dataset(),
        BatchPartitioner::with_size(size).unwrap(),
    )
}

#[tokio::test]
async fn test_backfill_runs_batches_in_order() {
    let server = MockServer::start().await;
    for id in 1..=3 {
        mount_calls(
            &server,
            id,
            json!([{"id": format!("call-{id}"), "called_at": "2024-01-01T12:00:00Z"}]),
        )
        .await;
    }

    let wh = warehouse_with_accounts(3);
    let fetcher = fetcher(&server, FailurePolicy::SkipOnError);
    let job = backfill(&fetcher, &wh, 2);

    let first = job.run().await.unwrap();
    assert_eq!(first.outcome, JobOutcome::Written);
    assert_eq!(first.batch_index, Some(1));
    assert_eq!(first.accounts_processed, 2);
    assert_eq!(first.rows_written, 2);

    let rows = stored(&wh, "activities_raw_batch_1").await;
    assert_eq!(rows[0]["account_id"], json!(1));
    assert_eq!(rows[0]["account_name"], json!("Account 1"));
    assert_eq!(rows[1]["account_id"], json!(2));
    assert_eq!(rows[0]["batch_number"], json!(1));
    assert!(rows[0]["processed_at"].is_string());
    assert_eq!(rows[0]["called_at"], json!("2024-01-01T12:00:00Z"));

    let second = job.run().await.unwrap();
    assert_eq!(second.batch_index, Some(2));
    assert_eq!(second.accounts_processed, 1);
    let rows = stored(&wh, "activities_raw_batch_2").await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["account_id"], json!(3));
    assert_eq!(rows[0]["batch_number"], json!(2));

    let third = job.run().await.unwrap();
    assert_eq!(third.outcome, JobOutcome::AllBatchesComplete);
    assert_eq!(third.batch_index, Some(2));

    // accounts seed is not a write; two batch tables are
    assert_eq!(wh.write_count(), 2);
}

#[tokio::test]
async fn test_backfill_skips_failing_account() {
    let server = MockServer::start().await;
    mount_calls(&server, 1, json!([{"id": "a"}])).await;
    Mock::given(method("GET"))
        .and(path("/accounts/2/calls"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    mount_calls(&server, 3, json!([{"id": "c"}, {"id": "d"}])).await;

    let wh = warehouse_with_accounts(3);
    let fetcher = fetcher(&server, FailurePolicy::SkipOnError);
    let report = backfill(&fetcher, &wh, 60).run().await.unwrap();

    assert_eq!(report.outcome, JobOutcome::Written);
    assert_eq!(report.accounts_processed, 3);
    assert_eq!(report.rows_written, 3);

    let accounts: Vec<i64> = stored(&wh, "activities_raw_batch_1")
        .await
        .iter()
        .map(|r| r["account_id"].as_i64().unwrap())
        .collect();
    assert_eq!(accounts, vec![1, 3, 3]);
}

#[tokio::test]
async fn test_backfill_empty_batch_writes_nothing() {
    let server = MockServer::start().await;
    for id in 1..=2 {
        mount_calls(&server, id, json!([])).await;
    }

    let wh = warehouse_with_accounts(2);
    let fetcher = fetcher(&server, FailurePolicy::SkipOnError);
    let report = backfill(&fetcher, &wh, 60).run().await.unwrap();

    assert_eq!(report.outcome, JobOutcome::NoData);
    assert_eq!(report.batch_index, Some(1));
    assert_eq!(wh.write_count(), 0);
}

#[tokio::test]
async fn test_backfill_counts_existing_tables() {
    let server = MockServer::start().await;
    mount_calls(&server, 3, json!([{"id": "late"}])).await;

    // Batch 1 exists already, so this run takes the second slice
    let wh = warehouse_with_accounts(3)
        .with_table(table("activities_raw_batch_1"), batch(vec![json!({"id": "x"})]));
    let fetcher = fetcher(&server, FailurePolicy::SkipOnError);
    let report = backfill(&fetcher, &wh, 2).run().await.unwrap();

    assert_eq!(report.batch_index, Some(2));
    assert_eq!(
        report.destination.as_deref(),
        Some("proj.ctm_data.activities_raw_batch_2")
    );
}

#[tokio::test]
async fn test_backfill_ignores_unnumbered_batch_tables() {
    let server = MockServer::start().await;
    mount_calls(&server, 3, json!([{"id": "late"}])).await;

    // A stray copy shares the prefix but carries no batch number
    let wh = warehouse_with_accounts(3)
        .with_table(table("activities_raw_batch_1"), batch(vec![json!({"id": "x"})]))
        .with_table(table("activities_raw_batch_backup"), batch(vec![json!({"id": "y"})]));
    let fetcher = fetcher(&server, FailurePolicy::SkipOnError);
    let report = backfill(&fetcher, &wh, 2).run().await.unwrap();

    assert_eq!(report.outcome, JobOutcome::Written);
    assert_eq!(report.batch_index, Some(2));
    assert_eq!(report.accounts_processed, 1);
    assert_eq!(stored(&wh, "activities_raw_batch_2").await.len(), 1);
}

struct BrokenProgress;

#[async_trait]
impl BatchProgress for BrokenProgress {
    async fn completed_batches(&self) -> Result<BTreeSet<u32>> {
        Err(Error::warehouse("listing denied"))
    }
}

#[tokio::test]
async fn test_backfill_progress_failure_starts_from_first_batch() {
    let server = MockServer::start().await;
    mount_calls(&server, 1, json!([{"id": "a"}])).await;

    let wh = warehouse_with_accounts(1);
    let fetcher = fetcher(&server, FailurePolicy::SkipOnError);
    let report = backfill(&fetcher, &wh, 60)
        .run_with_progress(&BrokenProgress)
        .await
        .unwrap();

    assert_eq!(report.batch_index, Some(1));
    assert_eq!(report.outcome, JobOutcome::Written);
}

#[tokio::test]
async fn test_backfill_requires_accounts_table() {
    let server = MockServer::start().await;
    let wh = MemoryWarehouse::new();
    let fetcher = fetcher(&server, FailurePolicy::SkipOnError);

    let err = backfill(&fetcher, &wh, 60).run().await.unwrap_err();
    assert!(matches!(err, Error::TableNotFound { .. }));
}

#[test]
fn test_combined_table_sql() {
    assert_eq!(combined_table_sql(&dataset(), &BTreeSet::new()), None);

    let sql = combined_table_sql(&dataset(), &BTreeSet::from([1, 2])).unwrap();
    assert_eq!(
        sql,
        "CREATE OR REPLACE TABLE \"proj\".\"ctm_data\".\"activities_raw_combined\" AS\n\
         SELECT * FROM \"proj\".\"ctm_data\".\"activities_raw_batch_1\"\n\
         UNION ALL BY NAME\n\
         SELECT * FROM \"proj\".\"ctm_data\".\"activities_raw_batch_2\";"
    );
}

// ============================================================================
// Daily sync
// ============================================================================

fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()
}

#[tokio::test]
async fn test_daily_appends_reconciled_rows() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/accounts/1/calls"))
        .and(query_param("start_date", "2024-05-01"))
        .and(query_param("end_date", "2024-05-01"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "calls": [
                {"id": "c2", "duration": 42, "brand_new": "x"},
                {"id": "c3", "duration": 7},
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let wh = warehouse_with_accounts(1).with_table(
        table("activities_raw_daily"),
        batch(vec![json!({"id": "c1", "duration": 10, "account_id": 1})]),
    );
    let fetcher = fetcher(&server, FailurePolicy::FailFast);
    let job = DailySync::new(&fetcher, &wh, dataset()).with_date(day());
    assert_eq!(job.window().start, day());

    let report = job.run().await.unwrap();
    assert_eq!(report.outcome, JobOutcome::Written);
    assert_eq!(report.rows_written, 2);
    assert_eq!(report.columns, 3);

    let rows = stored(&wh, "activities_raw_daily").await;
    assert_eq!(
        rows,
        objects(vec![
            json!({"id": "c1", "duration": 10, "account_id": 1}),
            json!({"id": "c2", "duration": 42, "account_id": 1}),
            json!({"id": "c3", "duration": 7, "account_id": 1}),
        ])
    );
}

#[tokio::test]
async fn test_daily_creates_table_with_all_columns() {
    let server = MockServer::start().await;
    mount_calls(&server, 1, json!([{"id": "c1", "Caller Name": "Ada"}])).await;

    let wh = warehouse_with_accounts(1);
    let fetcher = fetcher(&server, FailurePolicy::FailFast);
    DailySync::new(&fetcher, &wh, dataset())
        .with_date(day())
        .run()
        .await
        .unwrap();

    let rows = stored(&wh, "activities_raw_daily").await;
    let keys: Vec<&str> = rows[0].keys().map(String::as_str).collect();
    assert_eq!(
        keys,
        vec!["id", "caller_name", "account_id", "account_name", "processed_at"]
    );
}

#[tokio::test]
async fn test_daily_empty_upstream_writes_nothing() {
    let server = MockServer::start().await;
    for id in 1..=2 {
        mount_calls(&server, id, json!([])).await;
    }

    let wh = warehouse_with_accounts(2);
    let fetcher = fetcher(&server, FailurePolicy::FailFast);
    let report = DailySync::new(&fetcher, &wh, dataset())
        .with_date(day())
        .run()
        .await
        .unwrap();

    assert_eq!(report.outcome, JobOutcome::NoData);
    assert_eq!(report.accounts_processed, 2);
    assert_eq!(wh.write_count(), 0);
}

#[tokio::test]
async fn test_daily_aborts_on_upstream_error() {
    let server = MockServer::start().await;
    mount_calls(&server, 1, json!([{"id": "c1"}])).await;
    Mock::given(method("GET"))
        .and(path("/accounts/2/calls"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let wh = warehouse_with_accounts(2);
    let fetcher = fetcher(&server, FailurePolicy::FailFast);
    let err = DailySync::new(&fetcher, &wh, dataset())
        .with_date(day())
        .run()
        .await
        .unwrap_err();

    assert!(matches!(err, Error::HttpStatus { status: 503, .. }));
    assert_eq!(wh.write_count(), 0);
}
