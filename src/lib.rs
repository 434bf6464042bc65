//! A [LibreSpeed](https://github.com/librespeed/speedtest) speed test client
//! that records results for historical analysis.
//!
//! For each configured server the client fetches server metadata, then
//! measures download throughput, upload throughput, and round-trip latency
//! with jitter over plain HTTP. A broken step never prevents the others from
//! running; whatever was measured ends up in one [`SpeedTestResult`].
//!
//! # Quick start
//!
//! ```no_run
//! use librespeed_monitor::config::{ServerConfig, TestSettings};
//! use librespeed_monitor::orchestrator::test_server;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let server = ServerConfig::new("https://librespeed.org/");
//! let result = match test_server(&server, &TestSettings::default()).await {
//!     Ok(result) => result,
//!     Err(total) => total.into_result(),
//! };
//! println!("{:?} Mbit/s down", result.download_speed);
//! # Ok(())
//! # }
//! ```
//!
//! [`SpeedTestResult`]: result::SpeedTestResult

#![warn(missing_docs)]

pub mod campaign;
pub mod client;
pub mod config;
pub mod download;
pub mod emitter;
pub mod error;
pub mod info;
pub mod orchestrator;
pub mod params;
pub mod ping;
pub mod result;
pub mod store;
pub mod summary;
pub mod upload;
