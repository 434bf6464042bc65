//! Per-campaign summary.

use serde::Serialize;

use crate::result::SpeedTestResult;

/// Outcome for one server.
#[derive(Debug, Clone, Serialize)]
pub struct ServerSummary {
    /// Configured name, or the URL.
    pub server_name: String,
    /// Base URL as configured.
    pub server_url: String,
    /// Id assigned by the store, when the result was saved.
    pub record_id: Option<u64>,
    /// Every step failed.
    pub failed: bool,
    /// Mbit/s.
    pub download_speed: Option<f64>,
    /// Mbit/s.
    pub upload_speed: Option<f64>,
    /// Milliseconds.
    pub ping: Option<f64>,
    /// Milliseconds.
    pub jitter: Option<f64>,
    /// Failed steps.
    pub error_count: usize,
}

/// Outcome of a whole campaign.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Summary {
    /// One entry per server, in test order.
    pub servers: Vec<ServerSummary>,
    /// Servers tested.
    pub tested: usize,
    /// Results persisted.
    pub saved: usize,
    /// Servers where every step failed.
    pub failed: usize,
}

impl Summary {
    /// Add one server's outcome.
    pub fn record(&mut self, result: &SpeedTestResult, failed: bool, record_id: Option<u64>) {
        self.tested += 1;
        if failed {
            self.failed += 1;
        }
        if record_id.is_some() {
            self.saved += 1;
        }
        self.servers.push(ServerSummary {
            server_name: result.server_name.clone(),
            server_url: result.server_url.clone(),
            record_id,
            failed,
            download_speed: result.download_speed,
            upload_speed: result.upload_speed,
            ping: result.ping,
            jitter: result.jitter,
            error_count: result.errors.len(),
        });
    }
}
