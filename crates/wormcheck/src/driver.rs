// Copyright 2025 The Wormcheck Authors
// SPDX-License-Identifier: Apache-2.0

//! Scenario driver.
//!
//! Runs each scenario through
//! `Init -> BucketReady -> Uploading -> Uploaded -> Asserting -> Pass|Fail -> CleanedUp`.
//! Every request is first shown to the [`Oracle`]; the driver sends it,
//! compares the answer with the prediction and, when the server accepted it,
//! advances the model. The first mismatch ends the scenario.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use wormcheck_core::types::truncate_to_seconds;
use wormcheck_core::{
    Bucket, CleanupConfig, Config, Expectation, Operation, Oracle, RetentionRecord, RunConfig,
    S3ErrorCode,
};
use wormcheck_storage::{upload_multipart, ObjectStore, StoreError, StoreResult};

use crate::cleanup::cleanup_bucket;
use crate::error::ScenarioError;
use crate::names;
use crate::report::ScenarioReport;
use crate::scenario::{Fixture, Scenario, Step};

/// Size of the body written by single-part fixtures.
const SMALL_OBJECT_SIZE: usize = 1024;

/// Lifecycle phase of a running scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    /// Nothing created yet.
    Init,
    /// Lock-enabled bucket exists.
    BucketReady,
    /// Fixtures are being written.
    Uploading,
    /// All fixtures written.
    Uploaded,
    /// Steps are being checked against the oracle.
    Asserting,
    /// Every step matched.
    Pass,
    /// A step mismatched, setup failed or the scenario timed out.
    Fail,
    /// Bucket removed (or never created).
    CleanedUp,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Init => "INIT",
            Self::BucketReady => "BUCKET_READY",
            Self::Uploading => "UPLOADING",
            Self::Uploaded => "UPLOADED",
            Self::Asserting => "ASSERTING",
            Self::Pass => "PASS",
            Self::Fail => "FAIL",
            Self::CleanedUp => "CLEANED_UP",
        };
        f.write_str(s)
    }
}

/// Per-scenario mutable state.
struct Run<'a> {
    scenario: &'a Scenario,
    phase: Phase,
    model: Bucket,
    anchor: DateTime<Utc>,
    /// CreateBucket was sent; the bucket may exist even without an answer.
    create_sent: bool,
    /// Version ID created by each fixture, by fixture index.
    versions: Vec<String>,
}

impl Run<'_> {
    fn enter(&mut self, next: Phase) {
        debug!(scenario = %self.scenario.name, from = %self.phase, to = %next, "Phase transition");
        self.phase = next;
    }

    fn version_of(&self, fixture: usize) -> Result<&str, ScenarioError> {
        self.versions.get(fixture).map(String::as_str).ok_or_else(|| {
            ScenarioError::mismatch(
                format!("fixture #{fixture}"),
                "a version created by the fixture",
                "no version recorded",
                &self.model,
            )
        })
    }
}

/// Runs scenarios against one object store.
#[derive(Debug)]
pub struct Driver<S> {
    store: S,
    run: RunConfig,
    cleanup: CleanupConfig,
    oracle: Oracle,
}

impl<S: ObjectStore> Driver<S> {
    /// Creates a driver using the `[run]` and `[cleanup]` settings of `config`.
    pub fn new(store: S, config: &Config) -> Self {
        Self { store, run: config.run.clone(), cleanup: config.cleanup.clone(), oracle: Oracle }
    }

    /// The underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Runs every scenario in order.
    pub async fn run_all(&self, scenarios: &[Scenario]) -> Vec<ScenarioReport> {
        let mut reports = Vec::with_capacity(scenarios.len());
        for scenario in scenarios {
            reports.push(self.run(scenario).await);
        }
        reports
    }

    /// Runs one scenario to a verdict, cleaning up whatever it created.
    pub async fn run(&self, scenario: &Scenario) -> ScenarioReport {
        let bucket = names::random_bucket_name();
        let started = Instant::now();
        info!(scenario = %scenario.name, %bucket, "Running scenario");

        let mut run = Run {
            scenario,
            phase: Phase::Init,
            model: Bucket::new(bucket.clone(), true),
            anchor: truncate_to_seconds(Utc::now()),
            create_sent: false,
            versions: Vec::with_capacity(scenario.fixtures.len()),
        };

        let budget = self.run.scenario_timeout();
        let outcome = match tokio::time::timeout(budget, self.execute(&mut run)).await {
            Ok(result) => result,
            Err(_) => Err(ScenarioError::Timeout(budget)),
        };
        let elapsed = started.elapsed();

        let created = run.phase >= Phase::BucketReady;
        // A timeout can drop CreateBucket after the server has acted on it.
        let maybe_created =
            !created && run.create_sent && matches!(outcome, Err(ScenarioError::Timeout(_)));
        let mut args = BTreeMap::from([("bucketName".to_string(), bucket.clone())]);
        if let Some(key) = scenario.fixtures.first().map(Fixture::key) {
            args.insert("objectName".to_string(), key.to_string());
        }

        let report = match &outcome {
            Ok(()) => {
                run.enter(Phase::Pass);
                let elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
                info!(scenario = %scenario.name, elapsed_ms, "PASS");
                ScenarioReport::pass(&scenario.name, &scenario.function, args, elapsed)
            }
            Err(e) if e.is_skip() => {
                info!(scenario = %scenario.name, reason = %e, "SKIPPED");
                ScenarioReport::from_error(&scenario.name, &scenario.function, args, elapsed, e)
            }
            Err(e) => {
                run.enter(Phase::Fail);
                error!(scenario = %scenario.name, kind = e.kind(), error = %e, "FAIL");
                ScenarioReport::from_error(&scenario.name, &scenario.function, args, elapsed, e)
            }
        };

        if created || maybe_created {
            match cleanup_bucket(&self.store, &bucket, &self.cleanup).await {
                Ok(()) => {}
                Err(ScenarioError::Cleanup(e))
                    if maybe_created && e.has_code_in(&[S3ErrorCode::NoSuchBucket]) =>
                {
                    debug!(scenario = %scenario.name, %bucket, "Bucket was never created");
                }
                Err(e) => warn!(scenario = %scenario.name, %bucket, error = %e, "Cleanup failed"),
            }
        }
        run.enter(Phase::CleanedUp);
        report
    }

    async fn execute(&self, run: &mut Run<'_>) -> Result<(), ScenarioError> {
        let bucket = run.model.name.clone();
        run.create_sent = true;
        match self.store.create_bucket(&bucket, true).await {
            Ok(()) => run.enter(Phase::BucketReady),
            Err(e) if e.is_not_implemented() => return Err(ScenarioError::Unsupported(e)),
            Err(e) => return Err(ScenarioError::Setup(e)),
        }

        run.enter(Phase::Uploading);
        run.anchor = truncate_to_seconds(Utc::now());
        let scenario = run.scenario;
        for fixture in &scenario.fixtures {
            let version = self.apply_fixture(run, &bucket, fixture).await?;
            run.versions.push(version);
        }
        run.enter(Phase::Uploaded);

        run.enter(Phase::Asserting);
        for step in &scenario.steps {
            self.apply_step(run, &bucket, step).await?;
        }
        Ok(())
    }

    async fn apply_fixture(
        &self,
        run: &mut Run<'_>,
        bucket: &str,
        fixture: &Fixture,
    ) -> Result<String, ScenarioError> {
        let key = fixture.key().to_string();
        let (op, result) = match fixture {
            Fixture::Put { lock, .. } => {
                let lock = lock.map(|l| l.resolve(run.anchor));
                let op = Operation::Put { key: key.clone(), lock };
                let body = names::random_bytes(SMALL_OBJECT_SIZE);
                let result = self
                    .store
                    .put_object(bucket, &key, body, lock.as_ref())
                    .await
                    .map(|out| out.version_id);
                (op, result)
            }
            Fixture::Multipart { lock, .. } => {
                let lock = lock.map(|l| l.resolve(run.anchor));
                let op = Operation::Put { key: key.clone(), lock };
                let body = names::random_bytes(usize_of(self.run.object_size));
                let part_size = usize_of(self.run.part_size);
                let result =
                    upload_multipart(&self.store, bucket, &key, body, part_size, lock.as_ref())
                        .await
                        .map(|out| {
                            debug!(
                                bucket,
                                %key,
                                parts = out.parts,
                                etag = %out.object.etag,
                                "Multipart upload complete"
                            );
                            out.object.version_id
                        });
                (op, result)
            }
            Fixture::DeleteMarker { .. } => {
                let op = Operation::Delete {
                    key: key.clone(),
                    version_id: None,
                    bypass_governance: false,
                };
                let result = self
                    .store
                    .delete_object(bucket, &key, None, false)
                    .await
                    .map(|out| out.version_id);
                (op, result)
            }
        };

        let expected = self.oracle.expect(&run.model, &op, Utc::now());
        self.compare(&op, &expected, &result, &run.model)?;
        let version = match result {
            Ok(Some(version)) => version,
            _ => {
                return Err(ScenarioError::mismatch(
                    &op,
                    "a version ID",
                    "no version ID in the response",
                    &run.model,
                ))
            }
        };
        debug!(bucket, %op, %version, "Fixture created");
        self.oracle.advance(&mut run.model, &op, Some(version.as_str()));
        Ok(version)
    }

    async fn apply_step(
        &self,
        run: &mut Run<'_>,
        bucket: &str,
        step: &Step,
    ) -> Result<(), ScenarioError> {
        // Every fixture recorded a version, so the index is in bounds past this point.
        let version_id = run.version_of(step.fixture())?.to_string();
        let key = run.scenario.fixtures[step.fixture()].key().to_string();

        let (op, result): (Operation, StoreResult<()>) = match step {
            Step::Delete { bypass, .. } => {
                let op = Operation::Delete {
                    key: key.clone(),
                    version_id: Some(version_id.clone()),
                    bypass_governance: *bypass,
                };
                let result = self
                    .store
                    .delete_object(bucket, &key, Some(version_id.as_str()), *bypass)
                    .await
                    .map(|_| ());
                (op, result)
            }
            Step::PutRetention { bypass, .. } => {
                let retention = step.proposed_retention(run.anchor).unwrap_or_default();
                let op = Operation::PutRetention {
                    key: key.clone(),
                    version_id: version_id.clone(),
                    retention,
                    bypass_governance: *bypass,
                };
                let result = self
                    .store
                    .put_object_retention(bucket, &key, &version_id, &retention, *bypass)
                    .await;
                (op, result)
            }
            Step::VerifyRetention { .. } => {
                return self.verify_retention(run, bucket, &key, &version_id).await;
            }
            Step::PutLegalHold { on, .. } => {
                let op = Operation::PutLegalHold {
                    key: key.clone(),
                    version_id: version_id.clone(),
                    on: *on,
                };
                let result = self.store.put_object_legal_hold(bucket, &key, &version_id, *on).await;
                (op, result)
            }
        };

        let expected = self.oracle.expect(&run.model, &op, Utc::now());
        self.compare(&op, &expected, &result, &run.model)?;
        debug!(bucket, %op, %expected, "Step matched");
        if result.is_ok() {
            self.oracle.advance(&mut run.model, &op, None);
        }
        Ok(())
    }

    /// Reads the retention twice: both reads must match the model and each
    /// other.
    async fn verify_retention(
        &self,
        run: &Run<'_>,
        bucket: &str,
        key: &str,
        version_id: &str,
    ) -> Result<(), ScenarioError> {
        let op =
            Operation::GetRetention { key: key.to_string(), version_id: version_id.to_string() };
        let expected = self.oracle.expect(&run.model, &op, Utc::now());

        let first = self.store.get_object_retention(bucket, key, version_id).await.map(normalize);
        self.compare(&op, &expected, &first, &run.model)?;
        let Ok(first) = first else {
            debug!(bucket, %op, %expected, "Step matched");
            return Ok(());
        };

        let want = self.oracle.retention_of(&run.model, key, version_id).unwrap_or_default();
        if first != want {
            return Err(ScenarioError::mismatch(&op, want, first, &run.model));
        }

        match self.store.get_object_retention(bucket, key, version_id).await.map(normalize) {
            Ok(second) if second == first => {
                debug!(bucket, %op, retention = %first, "Retention verified");
                Ok(())
            }
            other => Err(ScenarioError::mismatch(
                &op,
                format!("{first} again"),
                describe(&other),
                &run.model,
            )),
        }
    }

    fn compare<T: fmt::Debug>(
        &self,
        op: &Operation,
        expected: &Expectation,
        actual: &StoreResult<T>,
        model: &Bucket,
    ) -> Result<(), ScenarioError> {
        let matched = match (expected, actual) {
            (Expectation::Allow, Ok(_)) => true,
            (Expectation::Deny(reason), Err(e)) => {
                e.is_client_error()
                    && (!self.run.strict_error_codes || e.has_code_in(reason.accepted_codes()))
            }
            _ => false,
        };
        if matched {
            Ok(())
        } else {
            Err(ScenarioError::mismatch(op, expected, describe(actual), model))
        }
    }
}

/// Servers may report sub-second precision; the model works in whole seconds.
fn normalize(record: RetentionRecord) -> RetentionRecord {
    RetentionRecord::proposed(record.mode, record.retain_until)
}

fn describe<T: fmt::Debug>(result: &Result<T, StoreError>) -> String {
    match result {
        Ok(value) => format!("ALLOW ({value:?})"),
        Err(e) => e.to_string(),
    }
}

fn usize_of(size: u64) -> usize {
    usize::try_from(size).unwrap_or(usize::MAX)
}

#[cfg(test)]
mod tests {
    use wormcheck_core::{DenyReason, S3ErrorCode};
    use wormcheck_storage::MemoryStore;

    use super::*;

    fn driver(strict: bool) -> Driver<MemoryStore> {
        let mut config = Config::default();
        config.run.strict_error_codes = strict;
        Driver::new(MemoryStore::new(), &config)
    }

    fn op() -> Operation {
        Operation::Delete {
            key: "k".into(),
            version_id: Some("v".into()),
            bypass_governance: false,
        }
    }

    #[test]
    fn test_deny_accepts_any_client_error_unless_strict() {
        let model = Bucket::new("b", true);
        let expected = Expectation::Deny(DenyReason::GovernanceBypassRequired);
        let wrong_code: StoreResult<()> =
            Err(StoreError::service(S3ErrorCode::InvalidRequest, "refused"));
        let right_code: StoreResult<()> =
            Err(StoreError::service(S3ErrorCode::AccessDenied, "refused"));

        assert!(driver(false).compare(&op(), &expected, &wrong_code, &model).is_ok());
        assert!(driver(true).compare(&op(), &expected, &wrong_code, &model).is_err());
        assert!(driver(true).compare(&op(), &expected, &right_code, &model).is_ok());
    }

    #[test]
    fn test_deny_is_not_satisfied_by_server_or_transport_errors() {
        let model = Bucket::new("b", true);
        let expected = Expectation::Deny(DenyReason::GovernanceBypassRequired);
        let internal: StoreResult<()> =
            Err(StoreError::service(S3ErrorCode::InternalError, "boom"));
        let transport: StoreResult<()> = Err(StoreError::Transport("reset".into()));
        assert!(driver(false).compare(&op(), &expected, &internal, &model).is_err());
        assert!(driver(false).compare(&op(), &expected, &transport, &model).is_err());
    }

    #[test]
    fn test_unexpected_allow_is_a_mismatch() {
        let model = Bucket::new("b", true);
        let expected = Expectation::Deny(DenyReason::LegalHoldActive);
        let err = driver(false).compare(&op(), &expected, &Ok(()), &model).unwrap_err();
        match err {
            ScenarioError::Mismatch(m) => {
                assert_eq!(m.operation, "DeleteObject k@v");
                assert_eq!(m.actual, "ALLOW (())");
                assert!(m.model.starts_with("bucket b"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_phase_order() {
        assert!(Phase::Init < Phase::BucketReady);
        assert!(Phase::BucketReady < Phase::Asserting);
        assert_eq!(Phase::CleanedUp.to_string(), "CLEANED_UP");
    }
}
