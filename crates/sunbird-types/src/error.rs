//! The bridge error taxonomy.
//!
//! Load failures are fatal and resolve the backend chain to the static
//! fallback; every other kind is scoped to a single call. Each variant's
//! `Display` is a non-empty human-readable string — the chat layer renders
//! these, it must never receive an empty answer.

use std::fmt;

use thiserror::Error;

/// A negative status returned by the kernel's `execute` entry point.
///
/// The code table is fixed; anything outside it is reported as an unknown
/// error carrying the raw code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExecFailure(pub i32);

impl ExecFailure {
    pub const INIT_FAILED: Self = Self(-1);
    pub const OUTPUT_PREPARATION_FAILED: Self = Self(-2);
    pub const PARSE_ERROR: Self = Self(-3);
    pub const RUNTIME_ERROR: Self = Self(-4);
    pub const INVALID_ARGUMENTS: Self = Self(-5);

    /// Stable category name for logs and telemetry.
    pub fn category(self) -> &'static str {
        match self.0 {
            -1 => "init-failed",
            -2 => "output-preparation-failed",
            -3 => "parse-error",
            -4 => "runtime-error",
            -5 => "invalid-arguments",
            _ => "unknown-error",
        }
    }
}

impl fmt::Display for ExecFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            -1 => write!(f, "the kernel state failed to initialize"),
            -2 => write!(f, "the kernel could not prepare its output sink"),
            -3 => write!(f, "the program text was rejected by the kernel parser"),
            -4 => write!(f, "program execution failed inside the kernel"),
            -5 => write!(f, "invalid arguments were passed to the kernel"),
            code => write!(f, "unknown error (code {code})"),
        }
    }
}

/// Errors surfaced by the bridge.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Module fetch, compile, instantiation or init failure. Fatal: the
    /// backend chain resolves to the static fallback and never retries.
    #[error("kernel module load failed: {0}")]
    Load(String),

    /// The kernel allocator returned a null pointer. Scoped to one call;
    /// any sibling buffer has already been freed.
    #[error("kernel allocator returned null for the {what} buffer ({size} bytes)")]
    Allocation { what: &'static str, size: u32 },

    /// `execute` returned a negative status.
    #[error("kernel execution failed: {0}")]
    Execution(ExecFailure),

    /// `configure` or `reset` was rejected; kernel state is assumed
    /// unchanged.
    #[error("kernel {operation} was rejected with status {status}")]
    Configuration { operation: &'static str, status: i32 },

    /// Remote proxy transport failure. Recovered transparently by falling
    /// back to the delegate; surfaced only in logs.
    #[error("remote inference request failed: {0}")]
    Transport(String),
}
