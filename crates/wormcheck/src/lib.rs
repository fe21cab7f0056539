// Copyright 2025 The Wormcheck Authors
// SPDX-License-Identifier: Apache-2.0

//! Scenario driver for wormcheck, an S3 Object Lock conformance suite.
//!
//! A [`Driver`] runs [`Scenario`]s against any
//! [`ObjectStore`](wormcheck_storage::ObjectStore): it creates a lock-enabled
//! bucket, writes the fixtures, checks each step against the oracle in
//! `wormcheck-core`, and always removes what it created. Each run ends in a
//! [`ScenarioReport`] in the Mint JSON log format.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cleanup;
pub mod driver;
pub mod error;
pub mod names;
pub mod report;
pub mod scenario;

pub use driver::{Driver, Phase};
pub use error::{Mismatch, ScenarioError, UnknownScenario};
pub use report::{ScenarioReport, Verdict};
pub use scenario::{catalogue, Fixture, LockSpec, Scenario, Step};
