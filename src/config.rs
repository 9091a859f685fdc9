/*!
 * Lifecycle Configuration
 *
 * Environment variables:
 * - MPI_LIFECYCLE_THREAD_LEVEL: single | funneled | serialized | multiple (default: serialized)
 * - MPI_LIFECYCLE_FINALIZE_AT_EXIT: finalize when the process exits (default: true)
 * - MPI_LIFECYCLE_HAS_ACCELERATOR: override accelerator-memory detection (default: unset)
 * - MPI_LIFECYCLE_TRACE_JSON: JSON log output (default: false)
 */

use crate::core::errors::ConfigError;
use crate::core::types::ThreadLevel;
use crate::lifecycle::InitOptions;
use serde::{Deserialize, Serialize};
use tracing::warn;

pub const ENV_THREAD_LEVEL: &str = "MPI_LIFECYCLE_THREAD_LEVEL";
pub const ENV_FINALIZE_AT_EXIT: &str = "MPI_LIFECYCLE_FINALIZE_AT_EXIT";
pub const ENV_HAS_ACCELERATOR: &str = "MPI_LIFECYCLE_HAS_ACCELERATOR";
pub const ENV_TRACE_JSON: &str = "MPI_LIFECYCLE_TRACE_JSON";

/// Environment-derived lifecycle settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleConfig {
    /// Thread level requested by `init_from_env`
    pub thread_level: ThreadLevel,
    pub finalize_at_exit: bool,
    /// Forced answer for accelerator-memory support, `None` to probe
    pub accelerator_override: Option<bool>,
    pub trace_json: bool,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            thread_level: ThreadLevel::Serialized,
            finalize_at_exit: true,
            accelerator_override: None,
            trace_json: false,
        }
    }
}

impl LifecycleConfig {
    /// Read configuration from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read configuration through `lookup`
    ///
    /// Invalid values are logged and replaced by their default.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let thread_level = lookup(ENV_THREAD_LEVEL)
            .map(|value| {
                value.parse::<ThreadLevel>().map_err(|_| ConfigError::InvalidThreadLevel {
                    var: ENV_THREAD_LEVEL,
                    value,
                })
            })
            .transpose()
            .unwrap_or_else(|err| {
                warn!(error = %err, "Ignoring invalid configuration value");
                None
            })
            .unwrap_or(defaults.thread_level);

        let finalize_at_exit =
            read_bool(&lookup, ENV_FINALIZE_AT_EXIT).unwrap_or(defaults.finalize_at_exit);
        let accelerator_override = read_bool(&lookup, ENV_HAS_ACCELERATOR);
        let trace_json = read_bool(&lookup, ENV_TRACE_JSON).unwrap_or(defaults.trace_json);

        Self {
            thread_level,
            finalize_at_exit,
            accelerator_override,
            trace_json,
        }
    }

    /// Init options implied by this configuration
    pub fn init_options(&self) -> InitOptions {
        InitOptions {
            thread_level: Some(self.thread_level),
            finalize_at_exit: self.finalize_at_exit,
        }
    }
}

fn read_bool<F>(lookup: &F, var: &'static str) -> Option<bool>
where
    F: Fn(&str) -> Option<String>,
{
    let value = lookup(var)?;
    match parse_bool(&value) {
        Some(flag) => Some(flag),
        None => {
            let err = ConfigError::InvalidBool { var, value };
            warn!(error = %err, "Ignoring invalid configuration value");
            None
        }
    }
}

/// Lenient boolean parsing for environment flags
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
