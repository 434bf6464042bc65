//! Error type shared by every module.

use std::time::Duration;

use thiserror::Error;

use crate::result::{SpeedTestResult, ValidationIssue};

/// Everything that can go wrong while testing a server or storing results.
#[derive(Debug, Error)]
pub enum SpeedtestError {
    /// Transport failure or a non-success HTTP status.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// A probe ran past its limit.
    #[error("{operation} timed out after {after:?}")]
    Timeout {
        /// Which probe timed out.
        operation: &'static str,
        /// The limit that elapsed.
        after: Duration,
    },
    /// The probe finished without receiving anything to measure.
    #[error("no data received before the {0} ended")]
    NoData(&'static str),
    /// Too many ping round trips failed for the series to be meaningful.
    #[error("more than half of ping requests failed ({failed}/{count})")]
    PingThreshold {
        /// Failed round trips so far.
        failed: u32,
        /// Round trips requested.
        count: u32,
    },
    /// Every ping round trip failed.
    #[error("all ping requests failed")]
    NoPingSamples,
    /// The server URL did not parse.
    #[error("bad server URL: {0}")]
    BadUrl(#[from] url::ParseError),
    /// Credentials could not form a header.
    #[error("invalid header value: {0}")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),
    /// JSON encoding or decoding failed.
    #[error("serialize/deserialize error: {0}")]
    JsonError(#[from] serde_json::Error),
    /// The settings file is not valid TOML.
    #[error("failed to parse config: {0}")]
    TomlError(#[from] toml::de::Error),
    /// Reading a file or writing output failed.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
    /// Settings that parse but make no sense.
    #[error("invalid config: {0}")]
    Config(String),
    /// A result failed validation and was not stored.
    #[error("result rejected: {}", join_issues(.0))]
    Validation(Vec<ValidationIssue>),
    /// The SQLite store reported an error.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    /// A stored row could not be decoded.
    #[error("result store error: {0}")]
    Store(String),
    /// The store was used after `close`.
    #[error("result store is closed")]
    StoreClosed,
}

fn join_issues(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, SpeedtestError>;

/// Every step of a server test failed.
///
/// The partially filled record travels with the error so the caller can
/// still decide to persist it as a diagnostic row.
#[derive(Debug, Error)]
#[error("all tests failed: {}", .result.errors.join(", "))]
pub struct TotalFailure {
    /// The record as far as it was filled in.
    pub result: SpeedTestResult,
}

impl TotalFailure {
    /// Give up the error, keeping the record.
    pub fn into_result(self) -> SpeedTestResult {
        self.result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_failure_lists_every_step() {
        let mut result = SpeedTestResult::new("a", "http://a/");
        result.errors = vec![
            "download test failed: boom".into(),
            "ping test failed: bang".into(),
        ];
        let total = TotalFailure { result };

        assert_eq!(
            total.to_string(),
            "all tests failed: download test failed: boom, ping test failed: bang"
        );
        assert_eq!(total.into_result().errors.len(), 2);
    }
}
