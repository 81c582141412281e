//! Controller defaults, overridable from the config file.

/// Default directory for SlateDB state storage.
pub const DEFAULT_DATA_DIR: &str = "/tmp/hpa-transfer-data";

/// Default config file location.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/hpa-transfer/config.yaml";

/// Upper bound on a single store call made during a reconcile.
pub const DEFAULT_CALL_TIMEOUT_SECS: u64 = 10;

/// Distinct keys reconciled in parallel.
pub const DEFAULT_MAX_CONCURRENT_RECONCILES: usize = 4;

/// First retry delay after a failed reconcile; doubled per consecutive failure.
pub const DEFAULT_BASE_BACKOFF_MS: u64 = 500;

/// Retry delay ceiling.
pub const DEFAULT_MAX_BACKOFF_SECS: u64 = 60;
