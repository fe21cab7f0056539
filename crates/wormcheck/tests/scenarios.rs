//! Runs the scenario catalogue against the in-memory store.
//!
//! `MemoryStore` enforces Object Lock on its own, so these tests check the
//! driver, the oracle and the store against each other, and use fault
//! injection for the paths a conforming server never takes.

use std::time::Duration;

use wormcheck::scenario::select;
use wormcheck::{catalogue, Driver, ScenarioReport, Verdict};
use wormcheck_core::{Config, S3ErrorCode};
use wormcheck_storage::{Faults, MemoryStore};

/// Cleanup gives up immediately on COMPLIANCE versions instead of waiting
/// for them to expire.
fn config() -> Config {
    let mut config = Config::default();
    config.cleanup.timeout_secs = 0;
    config.cleanup.poll_interval_secs = 0;
    config
}

fn driver(faults: Faults) -> Driver<MemoryStore> {
    Driver::new(MemoryStore::with_faults(faults), &config())
}

fn bucket_of(report: &ScenarioReport) -> &str {
    &report.args["bucketName"]
}

async fn run_one(driver: &Driver<MemoryStore>, name: &str) -> ScenarioReport {
    let scenario = select(&[name.to_string()]).unwrap().remove(0);
    driver.run(&scenario).await
}

#[tokio::test]
async fn test_catalogue_passes_against_conforming_store() {
    let driver = driver(Faults::default());
    let reports = driver.run_all(&catalogue()).await;

    assert_eq!(reports.len(), catalogue().len());
    for (report, scenario) in reports.iter().zip(catalogue()) {
        assert_eq!(report.name, scenario.name);
        assert_eq!(report.status, Verdict::Pass, "{}: {:?}", report.name, report.error);
        assert!(bucket_of(report).starts_with("versioning-test-"));
    }
}

#[tokio::test]
async fn test_catalogue_passes_with_strict_error_codes() {
    let mut config = config();
    config.run.strict_error_codes = true;
    let driver = Driver::new(MemoryStore::new(), &config);

    for report in driver.run_all(&catalogue()).await {
        assert_eq!(report.status, Verdict::Pass, "{}: {:?}", report.name, report.error);
    }
}

#[tokio::test]
async fn test_governance_buckets_are_removed() {
    let driver = driver(Faults::default());
    let governed =
        ["retention_governance", "retention_governance_multipart", "legal_hold_blocks_delete"];
    for name in governed {
        let report = run_one(&driver, name).await;
        assert_eq!(report.status, Verdict::Pass);
        assert!(!driver.store().bucket_exists(bucket_of(&report)), "{name}");
    }
    assert_eq!(driver.store().bucket_count(), 0);
    assert_eq!(driver.store().pending_upload_count(), 0);
}

#[tokio::test]
async fn test_cleanup_failure_does_not_mask_pass() {
    let driver = driver(Faults::default());
    let report = run_one(&driver, "retention_compliance").await;

    assert_eq!(report.status, Verdict::Pass, "{:?}", report.error);
    // The COMPLIANCE version outlives the zero cleanup deadline.
    assert!(driver.store().bucket_exists(bucket_of(&report)));
    assert_eq!(driver.store().version_count(bucket_of(&report)), 1);
}

#[tokio::test]
async fn test_non_conforming_store_fails() {
    let driver = driver(Faults { ignore_compliance: true, ..Faults::default() });
    let report = run_one(&driver, "retention_compliance").await;

    assert_eq!(report.status, Verdict::Fail);
    assert_eq!(report.alert.as_deref(), Some("AssertionMismatch"));
    let error = report.error.as_deref().unwrap();
    assert!(error.contains("DeleteObject testObject@"), "{error}");
    assert!(error.contains("expected DENY(compliance retention is immutable"), "{error}");
    assert!(error.contains("[COMPLIANCE until"), "model dump missing: {error}");
    assert!(!driver.store().bucket_exists(bucket_of(&report)));
}

#[tokio::test]
async fn test_unsupported_object_lock_skips() {
    let driver = driver(Faults { object_lock_unsupported: true, ..Faults::default() });
    let reports = driver.run_all(&catalogue()).await;

    for report in &reports {
        assert_eq!(report.status, Verdict::Skipped, "{}", report.name);
        assert_eq!(report.alert.as_deref(), Some("UnsupportedFeature"));
        assert!(!report.is_failure());
    }
    assert_eq!(driver.store().bucket_count(), 0);
}

#[tokio::test]
async fn test_setup_error_fails_without_cleanup() {
    let driver = driver(Faults {
        create_bucket_error: Some(S3ErrorCode::AccessDenied),
        ..Faults::default()
    });
    let report = run_one(&driver, "retention_governance").await;

    assert_eq!(report.status, Verdict::Fail);
    assert_eq!(report.alert.as_deref(), Some("SetupError"));
    assert_eq!(driver.store().bucket_count(), 0);
}

#[tokio::test]
async fn test_failed_part_aborts_and_fails() {
    let driver = driver(Faults { fail_part: Some(2), ..Faults::default() });
    let report = run_one(&driver, "retention_governance_multipart").await;

    assert_eq!(report.status, Verdict::Fail);
    assert!(report.error.as_deref().unwrap().contains("InternalError"));
    assert_eq!(driver.store().pending_upload_count(), 0);
    assert!(!driver.store().bucket_exists(bucket_of(&report)));
}

#[tokio::test]
async fn test_transport_error_during_assertion_is_a_mismatch() {
    let driver = driver(Faults::default());
    // The first delete of the scenario is the fixture creating the marker.
    driver.store().fail_next_deletes(1);
    let report = run_one(&driver, "retention_governance").await;

    assert_eq!(report.status, Verdict::Fail);
    assert_eq!(report.alert.as_deref(), Some("AssertionMismatch"));
    assert!(report.error.as_deref().unwrap().contains("transport error"));
    assert!(!driver.store().bucket_exists(bucket_of(&report)));
}

#[tokio::test(start_paused = true)]
async fn test_timeout_fails_and_still_cleans_up() {
    let mut config = config();
    config.run.scenario_timeout_secs = 30;
    let store = MemoryStore::with_faults(Faults {
        latency: Some(Duration::from_secs(10)),
        ..Faults::default()
    });
    let driver = Driver::new(store, &config);

    let report = run_one(&driver, "retention_governance").await;
    assert_eq!(report.status, Verdict::Fail);
    assert_eq!(report.alert.as_deref(), Some("Timeout"));
    assert!(report.duration >= 30_000);
    assert!(!driver.store().bucket_exists(bucket_of(&report)));
}

#[tokio::test(start_paused = true)]
async fn test_timeout_during_create_bucket_removes_late_bucket() {
    let mut config = config();
    config.run.scenario_timeout_secs = 5;
    // The server creates the bucket, but the answer arrives after the deadline.
    let store = MemoryStore::with_faults(Faults {
        create_bucket_response_delay: Some(Duration::from_secs(60)),
        ..Faults::default()
    });
    let driver = Driver::new(store, &config);

    let report = run_one(&driver, "retention_governance").await;
    assert_eq!(report.status, Verdict::Fail);
    assert_eq!(report.alert.as_deref(), Some("Timeout"));
    assert_eq!(driver.store().bucket_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_timeout_before_bucket_exists_is_reported() {
    let mut config = config();
    config.run.scenario_timeout_secs = 5;
    let store = MemoryStore::with_faults(Faults {
        latency: Some(Duration::from_secs(60)),
        ..Faults::default()
    });
    let driver = Driver::new(store, &config);

    let report = run_one(&driver, "retention_governance").await;
    assert_eq!(report.status, Verdict::Fail);
    assert_eq!(report.alert.as_deref(), Some("Timeout"));
    assert_eq!(driver.store().bucket_count(), 0);
}

#[tokio::test]
async fn test_report_lines_are_mint_json() {
    let driver = driver(Faults::default());
    let report = run_one(&driver, "legal_hold_blocks_delete").await;

    let line = report.to_json().unwrap();
    assert!(!line.contains('\n'));
    let value: serde_json::Value = serde_json::from_str(&line).unwrap();
    assert_eq!(value["name"], "legal_hold_blocks_delete");
    assert_eq!(value["status"], "PASS");
    assert_eq!(value["args"]["objectName"], "testObject");
    assert!(value["duration"].is_u64());
}
