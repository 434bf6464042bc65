//! Ping and jitter test.
//!
//! Sends `ping_count` empty posts one after another. Individual failures
//! are tolerated until they exceed half of the planned round trips.

use std::time::Duration;

use tokio::time::{Instant, timeout};
use tracing::{debug, warn};

use crate::client::Client;
use crate::config::TestSettings;
use crate::error::{Result, SpeedtestError};
use crate::params;
use crate::result::{Latency, ProbeOutcome, round2};

/// Running record of a ping series.
#[derive(Debug, Clone, PartialEq)]
pub struct PingTally {
    count: u32,
    failed: u32,
    samples: Vec<f64>,
}

impl PingTally {
    /// A tally for a series of `count` round trips.
    pub fn new(count: u32) -> Self {
        PingTally {
            count,
            failed: 0,
            samples: Vec::with_capacity(count as usize),
        }
    }

    /// Keep one round-trip time.
    pub fn record_success(&mut self, rtt: Duration) {
        self.samples.push(rtt.as_nanos() as f64 / 1_000_000.0);
    }

    /// Count a failed round trip. Errors once failures exceed half of the
    /// planned count; the series must stop there.
    pub fn record_failure(&mut self) -> Result<()> {
        self.failed += 1;
        if self.failed > self.count / 2 {
            return Err(SpeedtestError::PingThreshold {
                failed: self.failed,
                count: self.count,
            });
        }
        Ok(())
    }

    /// Round trips failed so far.
    pub fn failed(&self) -> u32 {
        self.failed
    }

    /// Round-trip times in milliseconds, in issue order.
    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    /// Average and jitter of the kept samples.
    pub fn finish(self) -> Result<ProbeOutcome<Latency>> {
        if self.samples.is_empty() {
            return Err(SpeedtestError::NoPingSamples);
        }

        let mean = self.samples.iter().sum::<f64>() / self.samples.len() as f64;
        let latency = Latency {
            ping_ms: round2(mean),
            jitter_ms: round2(jitter(&self.samples)),
        };

        if self.failed > 0 {
            Ok(ProbeOutcome::Partial {
                value: latency,
                note: format!(
                    "some ping requests failed ({}/{})",
                    self.failed, self.count
                ),
            })
        } else {
            Ok(ProbeOutcome::Complete(latency))
        }
    }
}

/// Mean absolute difference between consecutive samples.
pub fn jitter(samples: &[f64]) -> f64 {
    if samples.len() < 2 {
        return 0.0;
    }
    let total: f64 = samples.windows(2).map(|w| (w[1] - w[0]).abs()).sum();
    total / (samples.len() - 1) as f64
}

/// Run the ping test.
pub async fn run(client: &Client, settings: &TestSettings) -> Result<ProbeOutcome<Latency>> {
    let limit = settings.ping_timeout();
    let mut tally = PingTally::new(settings.ping_count);

    for seq in 1..=settings.ping_count {
        match round_trip(client, limit).await {
            Ok(rtt) => {
                debug!(seq, ?rtt, "pong");
                tally.record_success(rtt);
            }
            Err(e) => {
                warn!(seq, error = %e, "ping request failed");
                tally.record_failure()?;
            }
        }
    }

    tally.finish()
}

async fn round_trip(client: &Client, limit: Duration) -> Result<Duration> {
    let request = client
        .post(params::EMPTY_PATH)?
        .timeout(limit + params::TIMEOUT_GRACE);

    let start = Instant::now();
    let exchange = async {
        request.send().await?.error_for_status()?.bytes().await?;
        Ok::<_, SpeedtestError>(())
    };
    timeout(limit, exchange)
        .await
        .map_err(|_| SpeedtestError::Timeout {
            operation: "ping",
            after: limit,
        })??;
    Ok(start.elapsed())
}
