//! # Runtime Configuration Module
//!
//! Tunables of the dispatch runtime, loaded from the environment or from
//! the `runtime:` section of a descriptor.
//!
//! ## Environment Variables
//!
//! ### `SUBR_STACK_SIZE`
//!
//! Stack size of coroutines started by `Dispatcher::spawn`. Decimal
//! (`16384`) or hexadecimal (`0x4000`). Default: `0x4000` (16 KB).
//!
//! ### `SUBR_MAX_LOCATOR_DEPTH`
//!
//! Maximum number of locator hops per request. Default: `32`.
//!
//! ### `SUBR_MAX_PATH_PARAMS`
//!
//! Initial capacity of a request's capture array. Default: `8`.
//!
//! ## Usage
//!
//! ```rust
//! use subrouter::runtime_config::RuntimeConfig;
//!
//! let config = RuntimeConfig::from_env();
//! println!("Stack size: {} bytes", config.stack_size);
//! ```

use std::env;

use serde::Deserialize;

pub const DEFAULT_STACK_SIZE: usize = 0x4000;
pub const DEFAULT_MAX_LOCATOR_DEPTH: usize = 32;
pub const DEFAULT_MAX_PATH_PARAMS: usize = 8;

/// Runtime configuration of a deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Stack size for dispatch coroutines in bytes
    pub stack_size: usize,
    /// Locator hops allowed per request
    pub max_locator_depth: usize,
    /// Capture slots reserved per request
    pub max_path_params: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            stack_size: DEFAULT_STACK_SIZE,
            max_locator_depth: DEFAULT_MAX_LOCATOR_DEPTH,
            max_path_params: DEFAULT_MAX_PATH_PARAMS,
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read = |key: &str, default: usize| {
            lookup(key)
                .and_then(|val| parse_size(&val))
                .unwrap_or(default)
        };
        Self {
            stack_size: read("SUBR_STACK_SIZE", DEFAULT_STACK_SIZE),
            max_locator_depth: read("SUBR_MAX_LOCATOR_DEPTH", DEFAULT_MAX_LOCATOR_DEPTH),
            max_path_params: read("SUBR_MAX_PATH_PARAMS", DEFAULT_MAX_PATH_PARAMS),
        }
    }
}

/// Decimal or `0x` hexadecimal.
fn parse_size(val: &str) -> Option<usize> {
    let val = val.trim();
    match val.strip_prefix("0x").or_else(|| val.strip_prefix("0X")) {
        Some(hex) => usize::from_str_radix(hex, 16).ok(),
        None => val.parse().ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> RuntimeConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        RuntimeConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        assert_eq!(config(&[]), RuntimeConfig::default());
    }

    #[test]
    fn test_hex_and_decimal() {
        let cfg = config(&[("SUBR_STACK_SIZE", "0x8000"), ("SUBR_MAX_LOCATOR_DEPTH", "4")]);
        assert_eq!(cfg.stack_size, 0x8000);
        assert_eq!(cfg.max_locator_depth, 4);
    }

    #[test]
    fn test_garbage_falls_back() {
        let cfg = config(&[("SUBR_MAX_PATH_PARAMS", "lots")]);
        assert_eq!(cfg.max_path_params, DEFAULT_MAX_PATH_PARAMS);
    }

    #[test]
    fn test_partial_yaml_section() {
        let cfg: RuntimeConfig = serde_yaml::from_str("max_locator_depth: 3").expect("yaml");
        assert_eq!(cfg.max_locator_depth, 3);
        assert_eq!(cfg.stack_size, DEFAULT_STACK_SIZE);
    }
}
