//! Runs every step of a server test and folds the outcomes into one record.
//!
//! Steps run in a fixed order: info, download, upload, ping. A failed step
//! is recorded in [`SpeedTestResult::errors`] and never stops the next one.

use std::fmt::Display;

use tracing::{error, info, warn};

use crate::client::Client;
use crate::config::{ServerConfig, TestSettings};
use crate::error::TotalFailure;
use crate::result::{ProbeKind, ProbeOutcome, SpeedTestResult};
use crate::{download, info as server_info, ping, upload};

/// Number of steps in a server test.
pub const STEP_COUNT: usize = 4;

/// Test one server.
///
/// Returns the record when at least one step succeeded. When every step
/// fails, or the client cannot be built, the record comes back inside the
/// [`TotalFailure`].
pub async fn test_server(
    server: &ServerConfig,
    settings: &TestSettings,
) -> Result<SpeedTestResult, TotalFailure> {
    let mut result = SpeedTestResult::new(server.display_name(), server.url.clone());

    let client = match Client::new(server) {
        Ok(client) => client,
        Err(e) => {
            error!(server = %server.url, error = %e, "cannot build client");
            result.errors.push(format!("client setup failed: {e}"));
            return Err(TotalFailure { result });
        }
    };

    run_steps(&client, settings, &mut result).await;

    if result.errors.len() == STEP_COUNT {
        return Err(TotalFailure { result });
    }
    Ok(result)
}

async fn run_steps(client: &Client, settings: &TestSettings, result: &mut SpeedTestResult) {
    let server = client.base_url().as_str();

    info!(server, "fetching server info");
    match server_info::fetch(client).await {
        Ok(info) => result.server_info = info,
        Err(e) => fail(result, ProbeKind::Info, server, e),
    }

    info!(server, "running download test");
    match download::run(client, settings).await {
        Ok(outcome) => {
            let speed = keep(result, outcome, server);
            result.download_speed = Some(speed);
        }
        Err(e) => fail(result, ProbeKind::Download, server, e),
    }

    info!(server, "running upload test");
    match upload::run(client, settings).await {
        Ok(outcome) => {
            let speed = keep(result, outcome, server);
            result.upload_speed = Some(speed);
        }
        Err(e) => fail(result, ProbeKind::Upload, server, e),
    }

    info!(server, "running ping test");
    match ping::run(client, settings).await {
        Ok(outcome) => {
            let latency = keep(result, outcome, server);
            result.ping = Some(latency.ping_ms);
            result.jitter = Some(latency.jitter_ms);
        }
        Err(e) => fail(result, ProbeKind::Ping, server, e),
    }
}

/// Record a partial note, if any, and hand back the value.
fn keep<T>(result: &mut SpeedTestResult, outcome: ProbeOutcome<T>, server: &str) -> T {
    if let ProbeOutcome::Partial { note, .. } = &outcome {
        warn!(server, "{note}");
        result.notes.push(note.clone());
    }
    outcome.into_value()
}

fn fail(result: &mut SpeedTestResult, step: ProbeKind, server: &str, e: impl Display) {
    error!(server, step = step.label(), error = %e, "step failed");
    result.errors.push(format!("{step} failed: {e}"));
}
