//! # Constants
//!
//! Default values for configuration and controller behavior.

/// Default port for the metrics and health HTTP server
pub const DEFAULT_METRICS_PORT: u16 = 8080;

/// Default server startup timeout (seconds)
pub const DEFAULT_SERVER_STARTUP_TIMEOUT_SECS: u64 = 10;

/// Default server readiness poll interval (milliseconds)
pub const DEFAULT_SERVER_POLL_INTERVAL_MS: u64 = 50;

/// Field manager recorded on status writes
pub const DEFAULT_FIELD_MANAGER: &str = "cloud-manager";

/// Fixed requeue between cleanup passes (seconds)
pub const DEFAULT_NUKE_REQUEUE_SECS: u64 = 10;

/// Default log filter when `RUST_LOG` is unset
pub const DEFAULT_LOG_FILTER: &str = "cloud_manager=info";

/// Controller names used as metric labels
pub const CONTROLLER_NETWORK: &str = "network";
pub const CONTROLLER_IPRANGE: &str = "iprange";
pub const CONTROLLER_NUKE: &str = "nuke";
