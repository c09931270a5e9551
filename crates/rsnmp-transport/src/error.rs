//! Transport error type.

/// Failures raised by a [`Transport`](crate::Transport) implementation.
///
/// The client core propagates these verbatim; retry and backoff policy
/// live with the caller.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum TransportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No reply arrived within the configured read timeout.
    #[error("request timed out")]
    Timeout,

    /// The target name did not resolve to any usable address.
    #[error("cannot resolve target {0:?}")]
    Unresolvable(String),
}
