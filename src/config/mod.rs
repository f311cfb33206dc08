//! # Controller Configuration
//!
//! Configuration loaded once at start-up from environment variables.
//!
//! All configuration has sensible defaults and can be overridden via environment
//! variables (populated from a ConfigMap using `envFrom` in the deployment).

mod controller;
mod server;

pub use controller::ControllerConfig;
pub use server::ServerConfig;

use tracing::warn;

/// Load configuration from environment variables with defaults
pub fn load_config() -> (ControllerConfig, ServerConfig) {
    (ControllerConfig::from_env(), ServerConfig::from_env())
}

/// Read environment variable or return default value
///
/// A value that does not parse is logged and replaced by the default.
pub(crate) fn env_var_or_default<T: std::str::FromStr>(key: &str, default: T) -> T
where
    <T as std::str::FromStr>::Err: std::fmt::Debug,
{
    parse_or_default(key, std::env::var(key).ok(), default)
}

fn parse_or_default<T: std::str::FromStr>(key: &str, raw: Option<String>, default: T) -> T
where
    <T as std::str::FromStr>::Err: std::fmt::Debug,
{
    let Some(raw) = raw else {
        return default;
    };
    match raw.parse() {
        Ok(value) => value,
        Err(e) => {
            warn!(key, value = %raw, error = ?e, "Invalid configuration value, using default");
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unset_value_uses_default() {
        assert_eq!(parse_or_default("METRICS_PORT", None, 8080_u16), 8080);
    }

    #[test]
    fn test_valid_value_is_parsed() {
        assert_eq!(parse_or_default("METRICS_PORT", Some("9090".to_string()), 8080_u16), 9090);
    }

    #[test]
    fn test_invalid_value_falls_back_to_default() {
        assert_eq!(parse_or_default("METRICS_PORT", Some("not-a-port".to_string()), 8080_u16), 8080);
        assert_eq!(parse_or_default("NUKE_REQUEUE_SECS", Some("ten".to_string()), 10_u64), 10);
    }
}
