//! Measurement outcomes and result records.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SpeedtestError};
use crate::params;

/// Which step of a server test produced a value or an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeKind {
    /// Server metadata fetch.
    Info,
    /// Download (server-to-client) test.
    Download,
    /// Upload (client-to-server) test.
    Upload,
    /// Round-trip latency and jitter test.
    Ping,
}

impl ProbeKind {
    /// Label used in error messages and logs.
    pub fn label(self) -> &'static str {
        match self {
            ProbeKind::Info => "server info fetch",
            ProbeKind::Download => "download test",
            ProbeKind::Upload => "upload test",
            ProbeKind::Ping => "ping test",
        }
    }
}

impl fmt::Display for ProbeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Value produced by a probe that did not fail outright.
///
/// A probe that obtained no usable signal returns an error instead.
#[derive(Debug, Clone, PartialEq)]
pub enum ProbeOutcome<T> {
    /// The probe ran to completion.
    Complete(T),
    /// The probe degraded but still measured something.
    Partial {
        /// The degraded measurement.
        value: T,
        /// What went wrong.
        note: String,
    },
}

impl<T> ProbeOutcome<T> {
    /// The measured value, complete or not.
    pub fn value(&self) -> &T {
        match self {
            ProbeOutcome::Complete(value) | ProbeOutcome::Partial { value, .. } => value,
        }
    }

    /// Consume the outcome, keeping only the value.
    pub fn into_value(self) -> T {
        match self {
            ProbeOutcome::Complete(value) | ProbeOutcome::Partial { value, .. } => value,
        }
    }

    /// True when the probe degraded.
    pub fn is_partial(&self) -> bool {
        matches!(self, ProbeOutcome::Partial { .. })
    }

    /// What degraded the probe, if anything.
    pub fn note(&self) -> Option<&str> {
        match self {
            ProbeOutcome::Complete(_) => None,
            ProbeOutcome::Partial { note, .. } => Some(note),
        }
    }
}

/// Latency figures from the ping probe, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Latency {
    /// Mean round-trip time.
    pub ping_ms: f64,
    /// Mean absolute difference between consecutive round trips.
    pub jitter_ms: f64,
}

/// Round to two decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Throughput in Mbit/s for `bytes` moved in `elapsed`, rounded to two
/// decimals.
pub fn throughput_mbps(bytes: u64, elapsed: Duration) -> f64 {
    let seconds = elapsed.max(params::MIN_ELAPSED).as_secs_f64();
    round2((bytes as f64 * 8.0) / (seconds * 1_000_000.0))
}

/// Aggregate outcome of testing one server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeedTestResult {
    /// Configured name, or the URL.
    pub server_name: String,
    /// Base URL as configured.
    pub server_url: String,
    /// Mbit/s.
    pub download_speed: Option<f64>,
    /// Mbit/s.
    pub upload_speed: Option<f64>,
    /// Milliseconds.
    pub ping: Option<f64>,
    /// Milliseconds.
    pub jitter: Option<f64>,
    /// Opaque metadata returned by the server's IP endpoint.
    #[serde(default = "empty_object")]
    pub server_info: serde_json::Value,
    /// One message per failed step, in execution order.
    #[serde(default)]
    pub errors: Vec<String>,
    /// Notes from steps that only produced partial measurements.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
}

fn empty_object() -> serde_json::Value {
    serde_json::Value::Object(Default::default())
}

impl SpeedTestResult {
    /// An empty record for the given server.
    pub fn new(server_name: impl Into<String>, server_url: impl Into<String>) -> Self {
        SpeedTestResult {
            server_name: server_name.into(),
            server_url: server_url.into(),
            download_speed: None,
            upload_speed: None,
            ping: None,
            jitter: None,
            server_info: empty_object(),
            errors: Vec::new(),
            notes: Vec::new(),
        }
    }

    /// True when no measurement field carries a value.
    pub fn is_empty(&self) -> bool {
        self.download_speed.is_none()
            && self.upload_speed.is_none()
            && self.ping.is_none()
            && self.jitter.is_none()
    }

    /// Check the record before it is persisted.
    ///
    /// Absent measurements are fine. Present ones must be finite and
    /// non-negative. Identity fields must be non-empty.
    pub fn validate(&self) -> Result<()> {
        let mut issues = Vec::new();

        if self.server_name.trim().is_empty() {
            issues.push(ValidationIssue::Missing("server_name"));
        }
        if self.server_url.trim().is_empty() {
            issues.push(ValidationIssue::Missing("server_url"));
        }

        let measurements = [
            ("download_speed", self.download_speed),
            ("upload_speed", self.upload_speed),
            ("ping", self.ping),
            ("jitter", self.jitter),
        ];
        for (field, value) in measurements {
            if let Some(value) = value
                && !(value.is_finite() && value >= 0.0)
            {
                issues.push(ValidationIssue::Invalid { field, value });
            }
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(SpeedtestError::Validation(issues))
        }
    }
}

/// Why a record was rejected.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationIssue {
    /// A required field is empty.
    Missing(&'static str),
    /// A measurement is present but negative, NaN or infinite.
    Invalid {
        /// The offending field.
        field: &'static str,
        /// Its value.
        value: f64,
    },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::Missing(field) => write!(f, "{field} must not be empty"),
            ValidationIssue::Invalid { field, value } => {
                write!(f, "{field} must be a finite non-negative number, got {value}")
            }
        }
    }
}

/// A result as stored by a [`ResultSink`](crate::store::ResultSink).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    /// Assigned by the store.
    pub id: u64,
    /// When the result was stored.
    pub test_timestamp: DateTime<Utc>,
    /// The stored result.
    #[serde(flatten)]
    pub result: SpeedTestResult,
}

/// Averages over every stored result for one server URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerStats {
    /// Server the averages cover.
    pub server_url: String,
    /// Mbit/s, `None` when no row has a value.
    pub avg_download: Option<f64>,
    /// Mbit/s.
    pub avg_upload: Option<f64>,
    /// Milliseconds.
    pub avg_ping: Option<f64>,
    /// Milliseconds.
    pub avg_jitter: Option<f64>,
    /// Rows for this server, failed ones included.
    pub count: usize,
}
