//! Endpoint paths and tuning parameters.

use std::time::Duration;

/// Server metadata endpoint.
pub const INFO_PATH: &str = "backend/getIP.php";

/// Download payload generator. Takes the size in MiB as `ckSize`.
pub const DOWNLOAD_PATH: &str = "backend/garbage.php";

/// Query parameter carrying the download size.
pub const DOWNLOAD_SIZE_PARAM: &str = "ckSize";

/// Accepts an arbitrary body. Used for upload and ping.
pub const EMPTY_PATH: &str = "backend/empty.php";

/// Product token sent at the front of the User-Agent header.
pub const USER_AGENT_PRODUCT: &str = "LibreSpeed-Test-Script/1.0";

/// Ceiling for any request that has no probe-specific timeout.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Added to probe timeouts when overriding the request ceiling, so the
/// probe's own timer always fires first.
pub const TIMEOUT_GRACE: Duration = Duration::from_secs(1);

/// Bytes per megabyte for payload sizes.
pub const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Floor for measured durations. Keeps throughput finite when a transfer
/// completes within the clock's resolution.
pub const MIN_ELAPSED: Duration = Duration::from_micros(1);
