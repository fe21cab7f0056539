//! Runs the catalogue against a live endpoint.
//!
//! Configure with the Mint variables (`SERVER_ENDPOINT`, `ACCESS_KEY`,
//! `SECRET_KEY`, `ENABLE_HTTPS`, `SERVER_REGION`) and run with
//! `--ignored`. COMPLIANCE scenarios keep their bucket for about two minutes
//! while cleanup waits for retention to expire.

use wormcheck::{catalogue, Driver, Verdict};
use wormcheck_core::Config;
use wormcheck_storage::S3Store;

#[tokio::test]
#[ignore = "requires a live S3 endpoint"]
async fn test_catalogue_against_live_endpoint() {
    let mut config = Config::default();
    config.apply_env();
    config.validate().unwrap();

    let driver = Driver::new(S3Store::new(&config.endpoint), &config);
    for report in driver.run_all(&catalogue()).await {
        println!("{}", report.to_json().unwrap());
        assert_ne!(report.status, Verdict::Fail, "{}: {:?}", report.name, report.error);
    }
}
