/*!
 * Core Types
 * Values exchanged with the native runtime
 */

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Thread support level negotiated with the native runtime
///
/// Ordered from weakest to strongest guarantee, so a provided level
/// satisfies a required one iff `provided >= required`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ThreadLevel {
    /// Only one thread will execute
    Single,
    /// Only the thread that initialized the runtime makes runtime calls
    Funneled,
    /// Any thread may call, but never two at once
    #[default]
    Serialized,
    /// Any thread may call at any time
    Multiple,
}

impl ThreadLevel {
    /// All levels, weakest first
    pub const ALL: [ThreadLevel; 4] = [
        ThreadLevel::Single,
        ThreadLevel::Funneled,
        ThreadLevel::Serialized,
        ThreadLevel::Multiple,
    ];

    /// Whether this (provided) level meets `required`
    #[inline]
    #[must_use]
    pub fn satisfies(self, required: ThreadLevel) -> bool {
        self >= required
    }

    /// Native integer encoding (MPI_THREAD_* values)
    #[inline]
    pub const fn as_raw(self) -> i32 {
        match self {
            ThreadLevel::Single => 0,
            ThreadLevel::Funneled => 1,
            ThreadLevel::Serialized => 2,
            ThreadLevel::Multiple => 3,
        }
    }

    /// Decode a native level, `None` for values outside the known range
    #[inline]
    pub const fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            0 => Some(ThreadLevel::Single),
            1 => Some(ThreadLevel::Funneled),
            2 => Some(ThreadLevel::Serialized),
            3 => Some(ThreadLevel::Multiple),
            _ => None,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            ThreadLevel::Single => "single",
            ThreadLevel::Funneled => "funneled",
            ThreadLevel::Serialized => "serialized",
            ThreadLevel::Multiple => "multiple",
        }
    }
}

impl fmt::Display for ThreadLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a thread level string is not recognized
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown thread level '{0}' (expected single, funneled, serialized or multiple)")]
pub struct ParseThreadLevelError(pub String);

impl FromStr for ThreadLevel {
    type Err = ParseThreadLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().trim_start_matches(':').to_ascii_lowercase();
        let normalized = normalized
            .strip_prefix("thread_")
            .or_else(|| normalized.strip_prefix("mpi_thread_"))
            .unwrap_or(&normalized);

        ThreadLevel::ALL
            .into_iter()
            .find(|level| level.as_str() == normalized)
            .ok_or_else(|| ParseThreadLevelError(s.to_string()))
    }
}

/// Status code reported by a native runtime call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ErrorCode(pub i32);

impl ErrorCode {
    /// Generic failure
    pub const OTHER: ErrorCode = ErrorCode(15);
    /// Invalid communicator / scope
    pub const COMM: ErrorCode = ErrorCode(5);
    /// Internal runtime error
    pub const INTERN: ErrorCode = ErrorCode(16);

    #[inline]
    pub const fn raw(self) -> i32 {
        self.0
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "native error code {}", self.0)
    }
}

/// Group of participants targeted by an abort
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeHandle {
    /// Every participant in the job
    World,
    /// Only the calling process
    Process,
    /// Backend-specific raw handle
    Raw(i64),
}

/// Which native runtime implementation is loaded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Vendor {
    /// In-process single-participant runtime
    Local,
    Mpich,
    OpenMpi,
    Unknown,
}

impl fmt::Display for Vendor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Vendor::Local => "local",
            Vendor::Mpich => "mpich",
            Vendor::OpenMpi => "openmpi",
            Vendor::Unknown => "unknown",
        };
        f.write_str(name)
    }
}
