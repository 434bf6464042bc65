//! Settings file handling.
//!
//! Configuration is a TOML document with a `[test]` table of probe
//! parameters, one `[[servers]]` entry per test server, and optional
//! `[storage]` and `[logging]` tables.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SpeedtestError};

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Servers to test, in order.
    #[serde(default)]
    pub servers: Vec<ServerConfig>,

    /// Probe parameters shared by every server.
    #[serde(default)]
    pub test: TestSettings,

    /// Where results are kept.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            SpeedtestError::Config(format!(
                "failed to read {}: {e}",
                path.as_ref().display()
            ))
        })?;
        content.parse()
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<()> {
        for server in &self.servers {
            if server.url.trim().is_empty() {
                return Err(SpeedtestError::Config("server url must not be empty".into()));
            }
            url::Url::parse(&server.url)?;
        }
        self.test.validate()
    }
}

impl std::str::FromStr for Config {
    type Err = SpeedtestError;

    fn from_str(s: &str) -> Result<Self> {
        let config: Config = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }
}

/// One LibreSpeed server.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Display name. Falls back to the URL when absent or empty.
    #[serde(default)]
    pub name: Option<String>,
    /// Base URL of the LibreSpeed installation.
    pub url: String,
    /// Basic-Auth user.
    #[serde(default)]
    pub username: Option<String>,
    /// Basic-Auth password.
    #[serde(default)]
    pub password: Option<String>,
}

impl ServerConfig {
    /// Unnamed server without credentials.
    pub fn new(url: impl Into<String>) -> Self {
        ServerConfig {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Configured name, or the URL when there is none.
    pub fn display_name(&self) -> &str {
        match self.name.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => &self.url,
        }
    }

    /// Basic-Auth credentials, when both parts are non-empty.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (self.username.as_deref(), self.password.as_deref()) {
            (Some(user), Some(pass)) if !user.is_empty() && !pass.is_empty() => Some((user, pass)),
            _ => None,
        }
    }
}

/// Probe parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TestSettings {
    /// Download size in MiB, sent as `ckSize`.
    pub download_size_mb: u32,
    /// Upload payload in MiB.
    pub upload_size_mb: f64,
    /// Upload payload used when the full-size upload fails.
    pub small_upload_size_mb: f64,
    /// Round trips per ping test.
    pub ping_count: u32,
    /// Limit for the whole download.
    pub download_timeout_secs: u64,
    /// Limit for each upload attempt.
    pub upload_timeout_secs: u64,
    /// Per round trip.
    pub ping_timeout_secs: u64,
}

impl Default for TestSettings {
    fn default() -> Self {
        Self {
            download_size_mb: 50,
            upload_size_mb: 10.0,
            small_upload_size_mb: 1.0,
            ping_count: 10,
            download_timeout_secs: 60,
            upload_timeout_secs: 60,
            ping_timeout_secs: 5,
        }
    }
}

impl TestSettings {
    /// Reject sizes, counts and timeouts of zero.
    pub fn validate(&self) -> Result<()> {
        let positive_sizes = [
            ("upload_size_mb", self.upload_size_mb),
            ("small_upload_size_mb", self.small_upload_size_mb),
        ];
        for (field, value) in positive_sizes {
            if !(value.is_finite() && value > 0.0) {
                return Err(SpeedtestError::Config(format!("{field} must be positive")));
            }
        }

        let positive_counts = [
            ("download_size_mb", u64::from(self.download_size_mb)),
            ("ping_count", u64::from(self.ping_count)),
            ("download_timeout_secs", self.download_timeout_secs),
            ("upload_timeout_secs", self.upload_timeout_secs),
            ("ping_timeout_secs", self.ping_timeout_secs),
        ];
        for (field, value) in positive_counts {
            if value == 0 {
                return Err(SpeedtestError::Config(format!("{field} must be positive")));
            }
        }

        Ok(())
    }

    /// As a [`Duration`].
    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }

    /// As a [`Duration`].
    pub fn upload_timeout(&self) -> Duration {
        Duration::from_secs(self.upload_timeout_secs)
    }

    /// As a [`Duration`].
    pub fn ping_timeout(&self) -> Duration {
        Duration::from_secs(self.ping_timeout_secs)
    }
}

/// Result store configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite database holding the history.
    pub path: PathBuf,
    /// Persist diagnostic rows for servers where every step failed.
    pub persist_failures: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("speedtest_results.db"),
            persist_failures: true,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` wins.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (text, json).
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Enable ANSI colors in text output.
    #[serde(default = "default_color")]
    pub color: bool,
}

fn default_log_level() -> String {
    "info".into()
}
fn default_log_format() -> String {
    "text".into()
}
fn default_color() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            color: default_color(),
        }
    }
}

/// Initialize logging.
///
/// Logs go to stderr so stdout stays free for results.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.format == "json" {
        subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
            .map_err(|e| SpeedtestError::Config(format!("failed to init logging: {e}")))?;
    } else {
        subscriber
            .with(
                fmt::layer()
                    .with_ansi(config.color)
                    .with_writer(std::io::stderr),
            )
            .try_init()
            .map_err(|e| SpeedtestError::Config(format!("failed to init logging: {e}")))?;
    }

    Ok(())
}
