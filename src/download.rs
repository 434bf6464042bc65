//! Download test.
//!
//! Streams `garbage.php` output until the server ends the body or the
//! configured download timeout elapses. Whatever arrived before a timeout
//! or stream error still counts as a partial measurement.

use std::time::Duration;

use futures_util::StreamExt;
use tokio::time::{Instant, timeout};
use tracing::{debug, warn};

use crate::client::Client;
use crate::config::TestSettings;
use crate::error::{Result, SpeedtestError};
use crate::params;
use crate::result::{ProbeOutcome, throughput_mbps};

/// Bytes received so far. The clock starts with the response headers.
#[derive(Debug, Default)]
struct Transfer {
    started: Option<Instant>,
    bytes: u64,
}

impl Transfer {
    fn elapsed(&self) -> Duration {
        self.started.map(|s| s.elapsed()).unwrap_or_default()
    }
}

/// Run the download test.
pub async fn run(client: &Client, settings: &TestSettings) -> Result<ProbeOutcome<f64>> {
    let limit = settings.download_timeout();
    let mut transfer = Transfer::default();

    let result = timeout(
        limit,
        download_loop(client, settings.download_size_mb, limit, &mut transfer),
    )
    .await;
    let elapsed = transfer.elapsed();

    match result {
        Ok(Ok(())) if transfer.bytes == 0 => Err(SpeedtestError::NoData("download")),
        Ok(Ok(())) => {
            debug!(bytes = transfer.bytes, ?elapsed, "download complete");
            Ok(ProbeOutcome::Complete(throughput_mbps(transfer.bytes, elapsed)))
        }
        Ok(Err(e)) => settle(
            transfer.bytes,
            elapsed,
            e,
            "download interrupted, partial result",
        ),
        Err(_elapsed) => settle(
            transfer.bytes,
            elapsed,
            SpeedtestError::Timeout {
                operation: "download",
                after: limit,
            },
            "download timed out, partial result",
        ),
    }
}

async fn download_loop(
    client: &Client,
    size_mb: u32,
    limit: Duration,
    transfer: &mut Transfer,
) -> Result<()> {
    let response = client
        .get(params::DOWNLOAD_PATH)?
        .query(&[(params::DOWNLOAD_SIZE_PARAM, size_mb)])
        .timeout(limit + params::TIMEOUT_GRACE)
        .send()
        .await?
        .error_for_status()?;

    transfer.started = Some(Instant::now());

    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        transfer.bytes += chunk?.len() as u64;
    }
    Ok(())
}

/// Keep what was measured before `cause` cut the transfer short.
fn settle(
    bytes: u64,
    elapsed: Duration,
    cause: SpeedtestError,
    note: &str,
) -> Result<ProbeOutcome<f64>> {
    if bytes == 0 {
        return Err(cause);
    }

    warn!(bytes, ?elapsed, error = %cause, "{note}");
    Ok(ProbeOutcome::Partial {
        value: throughput_mbps(bytes, elapsed),
        note: format!("{note}: {cause}"),
    })
}
