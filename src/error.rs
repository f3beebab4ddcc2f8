//! Error types for the sandbox pool

use std::time::Duration;

use thiserror::Error;

/// Result type for pool operations
pub type Result<T> = std::result::Result<T, Error>;

/// Boxed source error carried by wrapped variants
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Error type for sandbox pool operations.
///
/// Everything except `Configuration` is a per-acquisition condition
/// reported back to the caller; none of these crash the process.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid configuration. Fatal, startup-only: the pool refuses to
    /// construct rather than run with a bad limit combination.
    #[error("Configuration error: {message}")]
    Configuration {
        /// What is wrong with the configuration
        message: String,
    },

    /// A quota ceiling rejected the acquisition. The caller should back
    /// off and retry later; the reason distinguishes the concurrency
    /// ceiling from the hourly ceiling.
    #[error("Cannot create sandbox: {reason}")]
    AdmissionRejected {
        /// Human-readable rejection reason
        reason: String,
        /// Sandboxes active when the check ran
        active: u64,
        /// Creations counted in the current hourly window
        hourly_count: u64,
    },

    /// Provisioning exceeded its bound. Counted as both a timeout and a
    /// failure.
    #[error("Sandbox creation timed out after {timeout:?}")]
    CreationTimeout {
        /// The configured creation timeout
        timeout: Duration,
    },

    /// The remote provisioning call failed.
    #[error("Sandbox creation failed: {reason}")]
    CreationFailed {
        /// The failure reason
        reason: String,
        /// The underlying error
        #[source]
        source: Option<BoxError>,
    },

    /// A unit of work (or the whole request, provisioning included)
    /// exceeded its bound.
    #[error("Execution timed out after {timeout:?}")]
    ExecutionTimeout {
        /// The bound that was exceeded
        timeout: Duration,
    },

    /// Invariant violation inside the pool (e.g. closed semaphore).
    #[error("Internal pool error: {message}")]
    Internal {
        /// The error message
        message: String,
    },
}

impl Error {
    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a creation-failed error wrapping its source
    pub fn creation_failed<S, E>(reason: S, source: E) -> Self
    where
        S: Into<String>,
        E: Into<BoxError>,
    {
        Self::CreationFailed {
            reason: reason.into(),
            source: Some(source.into()),
        }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether the caller may reasonably retry after backing off.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::AdmissionRejected { .. }
                | Self::CreationTimeout { .. }
                | Self::CreationFailed { .. }
                | Self::ExecutionTimeout { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admission_rejection_is_retryable() {
        let err = Error::AdmissionRejected {
            reason: "Hourly limit reached".into(),
            active: 0,
            hourly_count: 20,
        };
        assert!(err.is_retryable());
    }

    #[test]
    fn configuration_error_is_not_retryable() {
        assert!(!Error::configuration("bad").is_retryable());
    }

    #[test]
    fn creation_failed_preserves_source() {
        let source = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        let err = Error::creation_failed("connection reset", source);
        assert!(std::error::Error::source(&err).is_some());
        assert!(err.to_string().contains("connection reset"));
    }
}
