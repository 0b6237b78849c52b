// SPDX-License-Identifier: MIT
// Copyright 2026 nn-interop contributors

//! Unified error types for the interop layer.
//!
//! Every failure in the crate flows through [`Error`]. Nothing in the core
//! recovers locally: a native failure, a failed download, or a digest
//! mismatch propagates to the immediate caller via `?`. Only the blocking
//! download adapter unwraps an inner error, and it re-raises the original
//! value unchanged.
//!
//! ## Error Hierarchy
//!
//! ```text
//! Error
//! ├── NativeCallFailed   - A native entry point returned the null sentinel
//! ├── TransferFailed     - Remote endpoint answered with a non-success status
//! ├── IntegrityMismatch  - Downloaded file's SHA-256 does not match the prefix
//! ├── InvalidConfig      - Constructor/registration argument validation
//! ├── Io                 - File I/O while streaming a download to disk
//! └── Http               - Transport-level errors from the HTTP client
//! ```

use thiserror::Error;

/// Result type alias for nn-interop operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the interop core and the hub download utility.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// A native entry point signaled failure via the null sentinel.
    ///
    /// Carries the diagnostic string from the runtime's last-error channel
    /// when one was available. Native failures are almost always programming
    /// errors (bad shapes, invalid device), so they are never retried.
    #[error("native call failed: {message}")]
    NativeCallFailed {
        /// Diagnostic from the native side, or a placeholder if none was set.
        message: String,
    },

    /// The remote endpoint answered a download request with a non-success
    /// HTTP status.
    #[error("transfer failed: {url} returned status {status}")]
    TransferFailed {
        /// The URL that was requested.
        url: String,
        /// The HTTP status code received.
        status: u16,
    },

    /// A downloaded file's digest does not begin with the expected prefix.
    ///
    /// The destination file is already on disk when this is raised; callers
    /// must treat it as untrusted.
    #[error("integrity mismatch: expected SHA-256 prefix \"{expected}\", got \"{actual}\"")]
    IntegrityMismatch {
        /// The expected lowercase-hex digest prefix.
        expected: String,
        /// The full lowercase-hex digest that was computed.
        actual: String,
    },

    /// Invalid configuration or registration argument.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(String),

    /// Transport-level HTTP error (connection refused, DNS, TLS, ...).
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

impl Error {
    /// Create a native-call failure.
    pub fn native_call_failed(message: impl Into<String>) -> Self {
        Self::NativeCallFailed {
            message: message.into(),
        }
    }

    /// Create an invalid configuration error.
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create an I/O error.
    pub fn io(msg: impl Into<String>) -> Self {
        Self::Io(msg.into())
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
