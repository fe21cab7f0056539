//! Configuration management for wormcheck.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Smallest part S3 accepts for every part but the last.
pub const MIN_PART_SIZE: u64 = 5 * 1024 * 1024;

/// Main configuration for a conformance run.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Endpoint and credentials.
    pub endpoint: EndpointConfig,
    /// Scenario execution settings.
    pub run: RunConfig,
    /// Bucket cleanup settings.
    pub cleanup: CleanupConfig,
    /// Logging configuration.
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path).map_err(crate::Error::Io)?;
        Self::parse(&content)
    }

    /// Load configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the string cannot be parsed.
    pub fn parse(content: &str) -> crate::Result<Self> {
        toml::from_str(content).map_err(|e| crate::Error::Config(e.to_string()))
    }

    /// Applies the Mint environment variables on top of the file settings.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|name| std::env::var(name).ok());
    }

    /// Applies environment overrides read through `lookup`.
    ///
    /// Recognised variables: `SERVER_ENDPOINT`, `ACCESS_KEY`, `SECRET_KEY`,
    /// `ENABLE_HTTPS` and `SERVER_REGION`.
    pub fn apply_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let https =
            lookup("ENABLE_HTTPS").is_some_and(|v| v == "1" || v.eq_ignore_ascii_case("true"));
        if let Some(endpoint) = lookup("SERVER_ENDPOINT").filter(|v| !v.is_empty()) {
            self.endpoint.url = normalize_endpoint(&endpoint, https);
        }
        if let Some(key) = lookup("ACCESS_KEY") {
            self.endpoint.access_key = key;
        }
        if let Some(secret) = lookup("SECRET_KEY") {
            self.endpoint.secret_key = secret;
        }
        if let Some(region) = lookup("SERVER_REGION").filter(|v| !v.is_empty()) {
            self.endpoint.region = region;
        }
    }

    /// Checks the settings that would make a run meaningless.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Config`] describing the first problem found.
    pub fn validate(&self) -> crate::Result<()> {
        if self.endpoint.url.is_empty() {
            return Err(crate::Error::Config("endpoint.url must not be empty".to_string()));
        }
        if self.run.part_size < MIN_PART_SIZE {
            return Err(crate::Error::Config(format!(
                "run.part_size must be at least {MIN_PART_SIZE} bytes, got {}",
                self.run.part_size
            )));
        }
        if self.run.object_size <= self.run.part_size {
            return Err(crate::Error::Config(format!(
                "run.object_size ({}) must exceed run.part_size ({}) to need more than one part",
                self.run.object_size, self.run.part_size
            )));
        }
        if self.run.scenario_timeout_secs == 0 {
            return Err(crate::Error::Config("run.scenario_timeout_secs must be positive".into()));
        }
        Ok(())
    }
}

/// Prefixes a scheme when the endpoint is given as `host:port`.
fn normalize_endpoint(endpoint: &str, https: bool) -> String {
    if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        endpoint.to_string()
    } else if https {
        format!("https://{endpoint}")
    } else {
        format!("http://{endpoint}")
    }
}

/// Endpoint and credential configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    /// Endpoint URL, including scheme.
    pub url: String,
    /// Signing region.
    pub region: String,
    /// Access key ID.
    pub access_key: String,
    /// Secret access key.
    pub secret_key: String,
    /// Use path-style addressing (`http://host/bucket/key`).
    pub force_path_style: bool,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:9000".to_string(),
            region: "us-east-1".to_string(),
            access_key: "minioadmin".to_string(),
            secret_key: "minioadmin".to_string(),
            force_path_style: true,
        }
    }
}

/// Scenario execution configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Wall-clock budget for setup, uploads and assertions of one scenario.
    pub scenario_timeout_secs: u64,
    /// Size of the object uploaded by multipart scenarios.
    /// Default: 15 MiB.
    pub object_size: u64,
    /// Size of each multipart part (the last part may be smaller).
    /// Default: 5 MiB.
    pub part_size: u64,
    /// Require the server's error code to match the denial reason, instead
    /// of accepting any 4xx refusal.
    pub strict_error_codes: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            scenario_timeout_secs: 60,
            object_size: 15 * 1024 * 1024, // 15 MiB
            part_size: MIN_PART_SIZE,
            strict_error_codes: false,
        }
    }
}

impl RunConfig {
    /// Scenario timeout as a `Duration`.
    #[must_use]
    pub fn scenario_timeout(&self) -> Duration {
        Duration::from_secs(self.scenario_timeout_secs)
    }
}

/// Bucket cleanup configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanupConfig {
    /// How long to keep sweeping for versions still under COMPLIANCE
    /// retention before giving up.
    pub timeout_secs: u64,
    /// Pause between cleanup sweeps.
    pub poll_interval_secs: u64,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self { timeout_secs: 150, poll_interval_secs: 5 }
    }
}

impl CleanupConfig {
    /// Cleanup deadline as a `Duration`.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Sweep interval as a `Duration`.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable format.
    #[default]
    Pretty,
    /// JSON format.
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    pub level: String,
    /// Log output format.
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), format: LogFormat::Pretty }
    }
}
