//! Error taxonomy shared across the adapter crates and the engine.

use thiserror::Error;

/// Result type alias for gangway operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors surfaced by the adapters and the reconciliation engine.
///
/// Transient transport errors abort the current sync and are retried on
/// the next tick; translation errors fail the whole snapshot because a
/// half-translated snapshot would corrupt reconciliation.
#[derive(Debug, Error)]
pub enum Error {
    /// Network-level failure talking to a back end.
    #[error("transport error: {0}")]
    Transport(String),

    /// A back end answered with a payload we could not decode.
    #[error("decode error: {0}")]
    Decode(String),

    /// Hostname → IP resolution failed.
    #[error("failed to resolve {host}: {reason}")]
    Resolve { host: String, reason: String },

    /// A task's original and exposed port counts differ.
    #[error("task {task}: original and exposed port count mismatch")]
    PortCountMismatch { task: String },

    /// The registry agent's self-report lacks an advertise address.
    #[error("registry agent did not report an advertise address")]
    AdvertiseAddrMissing,
}

impl Error {
    /// Wrap any transport-layer failure, keeping only its display form.
    pub fn transport(err: impl std::fmt::Display) -> Self {
        Error::Transport(err.to_string())
    }

    /// Wrap a payload decoding failure.
    pub fn decode(err: impl std::fmt::Display) -> Self {
        Error::Decode(err.to_string())
    }
}
