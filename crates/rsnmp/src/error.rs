//! Client error type.

use rsnmp_msg::{CodecError, ErrorStatus, Oid, PduType};
use rsnmp_transport::TransportError;

use crate::crypto::{AuthProtocol, CryptoError, PrivProtocol};

/// SNMP client result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong between a request and its decoded
/// response. Errors flow up to the caller unchanged; the core never
/// retries transparently (the single engine-rediscovery round after a
/// usmStats report being the protocol-mandated exception).
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Key material could not be derived.
    #[error("key derivation failed: {0}")]
    KeyDerivation(#[source] CryptoError),

    /// The inbound message digest did not match (constant-time compare).
    #[error("authentication failed: message digest mismatch")]
    AuthenticationFailed,

    #[error("decryption failed: {0}")]
    DecryptionFailed(#[source] CryptoError),

    #[error("encryption failed: {0}")]
    EncryptionFailed(#[source] CryptoError),

    /// The peer's engine identity changed mid-session and the session is
    /// configured to abort instead of adopting it.
    #[error("peer engine ID drifted mid-session")]
    EngineMismatch {
        expected: Vec<u8>,
        actual: Vec<u8>,
    },

    /// An authenticated or encrypted packet was requested before engine
    /// discovery completed.
    #[error("authoritative engine not discovered yet")]
    EngineNotDiscovered,

    /// msgFlags with the privacy bit but not the authentication bit.
    #[error("invalid msgFlags: privacy without authentication")]
    InvalidMsgFlags,

    /// The response carried a different request-id than the request.
    #[error("request ID mismatch: expected {expected}, got {actual}")]
    RequestIdMismatch { expected: u32, actual: u32 },

    /// A PDU type that makes no sense at this point of the exchange.
    #[error("unexpected PDU type {0}")]
    UnexpectedPduType(PduType),

    /// The agent answered with a non-zero error-status.
    #[error("agent returned {status} at index {index}")]
    Agent { status: ErrorStatus, index: u32 },

    /// The agent answered with a Report PDU this session cannot act on.
    #[error("agent returned report {oid}")]
    Report { oid: Oid },

    /// A walk received an OID that is not strictly greater than the
    /// request start, which would loop forever.
    #[error("OID not increasing: {current} follows {previous}")]
    OidNotIncreasing { previous: Oid, current: Oid },
}

/// Session configuration problems, caught before any packet is built.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("v3 sessions require security parameters")]
    SecurityRequired,

    #[error("security user name is missing")]
    MissingUserName,

    #[error("authentication protocol {0:?} declared without a passphrase")]
    MissingAuthPassphrase(AuthProtocol),

    #[error("privacy protocol {0:?} declared without a passphrase")]
    MissingPrivPassphrase(PrivProtocol),

    #[error("privacy requires an authentication protocol")]
    PrivacyRequiresAuthentication,

    #[error("this trap form is not valid for a {0} session")]
    TrapVersionMismatch(rsnmp_msg::Version),
}
