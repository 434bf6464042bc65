//! Upload test.
//!
//! Posts a random payload to `empty.php` and times the round trip. A failed
//! full-size upload is retried once with a smaller payload; see
//! [`UploadPlan`].

use std::future::Future;
use std::time::Duration;

use bytes::Bytes;
use rand::RngCore;
use rand::SeedableRng;
use rand::rngs::StdRng;
use reqwest::header::CONTENT_TYPE;
use tokio::time::{Instant, timeout};
use tracing::{debug, warn};

use crate::client::Client;
use crate::config::TestSettings;
use crate::error::{Result, SpeedtestError};
use crate::params;
use crate::result::{ProbeOutcome, throughput_mbps};

/// One upload try: how much to send and how long to wait.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UploadAttempt {
    /// Payload size in megabytes.
    pub size_mb: f64,
    /// Limit for the whole request.
    pub timeout: Duration,
}

impl UploadAttempt {
    /// Payload size in bytes.
    pub fn payload_len(&self) -> usize {
        (self.size_mb * params::BYTES_PER_MB).round() as usize
    }
}

/// Full-size attempt followed by an optional reduced-size fallback.
///
/// A fallback success is reported as partial. When both attempts fail the
/// primary error is returned, since it describes the real problem.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UploadPlan {
    /// Full-size attempt.
    pub primary: UploadAttempt,
    /// Reduced-size retry, if any.
    pub fallback: Option<UploadAttempt>,
}

impl UploadPlan {
    /// Primary and fallback sizes from the test settings.
    pub fn from_settings(settings: &TestSettings) -> Self {
        let timeout = settings.upload_timeout();
        UploadPlan {
            primary: UploadAttempt {
                size_mb: settings.upload_size_mb,
                timeout,
            },
            fallback: Some(UploadAttempt {
                size_mb: settings.small_upload_size_mb,
                timeout,
            }),
        }
    }

    /// Run the plan. `attempt` performs one upload and yields Mbit/s; each
    /// call is bounded by the attempt's timeout.
    pub async fn execute<F, Fut>(&self, mut attempt: F) -> Result<ProbeOutcome<f64>>
    where
        F: FnMut(UploadAttempt) -> Fut,
        Fut: Future<Output = Result<f64>>,
    {
        let primary_err = match bounded(self.primary, attempt(self.primary)).await {
            Ok(speed) => return Ok(ProbeOutcome::Complete(speed)),
            Err(e) => e,
        };

        let Some(fallback) = self.fallback else {
            return Err(primary_err);
        };

        warn!(
            error = %primary_err,
            size_mb = fallback.size_mb,
            "upload failed, retrying with a smaller payload"
        );
        match bounded(fallback, attempt(fallback)).await {
            Ok(speed) => Ok(ProbeOutcome::Partial {
                value: speed,
                note: format!(
                    "upload used a reduced {} MB payload, result may be less accurate",
                    fallback.size_mb
                ),
            }),
            Err(e) => {
                warn!(error = %e, "reduced upload also failed");
                Err(primary_err)
            }
        }
    }
}

async fn bounded<Fut>(attempt: UploadAttempt, fut: Fut) -> Result<f64>
where
    Fut: Future<Output = Result<f64>>,
{
    timeout(attempt.timeout, fut)
        .await
        .map_err(|_| SpeedtestError::Timeout {
            operation: "upload",
            after: attempt.timeout,
        })?
}

/// Run the upload test.
pub async fn run(client: &Client, settings: &TestSettings) -> Result<ProbeOutcome<f64>> {
    UploadPlan::from_settings(settings)
        .execute(|attempt| upload_once(client, attempt))
        .await
}

async fn upload_once(client: &Client, attempt: UploadAttempt) -> Result<f64> {
    let payload = random_payload(attempt.payload_len());
    let len = payload.len() as u64;

    let start = Instant::now();
    client
        .post(params::EMPTY_PATH)?
        .header(CONTENT_TYPE, "application/octet-stream")
        .timeout(attempt.timeout + params::TIMEOUT_GRACE)
        .body(payload)
        .send()
        .await?
        .error_for_status()?
        .bytes()
        .await?;
    let elapsed = start.elapsed();

    debug!(bytes = len, ?elapsed, "upload complete");
    Ok(throughput_mbps(len, elapsed))
}

fn random_payload(len: usize) -> Bytes {
    let mut rng = StdRng::from_os_rng();
    let mut buf = vec![0u8; len];
    rng.fill_bytes(&mut buf);
    buf.into()
}
