/*!
 * Error Types
 * Lifecycle error handling with thiserror and miette diagnostics
 */

use super::types::{ErrorCode, ThreadLevel};
use miette::Diagnostic;
use thiserror::Error;

/// Errors surfaced by the init/finalize/abort lifecycle
#[derive(Error, Debug, Clone, PartialEq, Eq, Diagnostic)]
pub enum LifecycleError {
    #[error("Runtime already initialized")]
    #[diagnostic(
        code(lifecycle::already_initialized),
        help("Init and Init_thread may be called at most once per process, and not both.")
    )]
    AlreadyInitialized,

    #[error("Runtime initialization failed: {0}")]
    #[diagnostic(
        code(lifecycle::initialization_failed),
        help("The native runtime rejected initialization. Check the launcher environment.")
    )]
    InitializationFailed(ErrorCode),

    #[error("Native call {call} failed: {code}")]
    #[diagnostic(code(lifecycle::native_call_failed))]
    NativeCallFailed { call: &'static str, code: ErrorCode },

    #[error("Runtime not initialized")]
    #[diagnostic(
        code(lifecycle::not_initialized),
        help("Call init() or init_thread() before using the runtime.")
    )]
    NotInitialized,
}

impl LifecycleError {
    #[inline]
    pub(crate) fn native(call: &'static str, code: ErrorCode) -> Self {
        LifecycleError::NativeCallFailed { call, code }
    }
}

pub type LifecycleResult<T> = Result<T, LifecycleError>;

/// Thread level shortfall reported by init_thread
///
/// Not a failure: the provided level is still returned to the caller.
/// This value only exists so the warning carries a proper diagnostic.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Diagnostic)]
#[error("Requested thread level {required}, runtime provided {provided}")]
#[diagnostic(
    code(lifecycle::thread_level_insufficient),
    severity(Warning),
    help("Decide whether the provided level is enough before issuing calls from other threads.")
)]
pub struct ThreadLevelInsufficient {
    pub required: ThreadLevel,
    pub provided: ThreadLevel,
}

/// Invalid configuration value read from the environment
#[derive(Error, Debug, Clone, PartialEq, Eq, Diagnostic)]
pub enum ConfigError {
    #[error("Invalid boolean for {var}: '{value}'")]
    #[diagnostic(
        code(config::invalid_bool),
        help("Use one of 1/0, true/false, yes/no, on/off.")
    )]
    InvalidBool { var: &'static str, value: String },

    #[error("Invalid thread level for {var}: '{value}'")]
    #[diagnostic(
        code(config::invalid_thread_level),
        help("Use single, funneled, serialized or multiple.")
    )]
    InvalidThreadLevel { var: &'static str, value: String },
}
