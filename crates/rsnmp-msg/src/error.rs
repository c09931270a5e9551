//! Codec error type shared by the BER reader/writer and the message layer.

use crate::oid::Oid;

/// Errors produced while encoding or decoding SNMP wire data.
///
/// Decode variants carry the byte offset at which the reader gave up, so a
/// malformed capture can be narrowed down without re-parsing by hand.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum CodecError {
    /// The buffer ended before the announced TLV content did.
    #[error("truncated data at offset {offset}: need {needed} more bytes, {available} available")]
    Truncated {
        offset: usize,
        needed: usize,
        available: usize,
    },

    /// A different tag was present than the grammar requires.
    #[error("unexpected tag at offset {offset}: expected 0x{expected:02X}, got 0x{actual:02X}")]
    UnexpectedTag {
        offset: usize,
        expected: u8,
        actual: u8,
    },

    /// Indefinite length (0x80), which SNMP forbids.
    #[error("indefinite length encoding at offset {offset}")]
    IndefiniteLength { offset: usize },

    /// Length octets that are themselves malformed or absurdly wide.
    #[error("invalid length encoding at offset {offset}")]
    InvalidLength { offset: usize },

    /// An INTEGER with no content octets.
    #[error("zero-length integer at offset {offset}")]
    ZeroLengthInteger { offset: usize },

    /// An integer value that does not fit the target width.
    #[error("integer overflow at offset {offset}")]
    IntegerOverflow { offset: usize },

    /// Malformed OBJECT IDENTIFIER content.
    #[error("invalid OID encoding at offset {offset}: {reason}")]
    InvalidOid { offset: usize, reason: OidRepr },

    /// An OID that cannot be put on the wire (fewer than two arcs, or
    /// leading arcs out of range).
    #[error("OID {oid} is not encodable: {reason}")]
    UnencodableOid { oid: Oid, reason: OidRepr },

    /// BOOLEAN or NULL with the wrong content length.
    #[error("invalid fixed-size value at offset {offset} for tag 0x{tag:02X}")]
    InvalidValueLength { offset: usize, tag: u8 },

    /// IpAddress content that is not exactly four octets.
    #[error("IP address at offset {offset} has {length} octets, expected 4")]
    InvalidIpAddressLength { offset: usize, length: usize },

    /// A version integer outside {0, 1, 3}.
    #[error("unknown SNMP version {0}")]
    UnknownVersion(i64),

    /// A PDU tag outside 0xA0..=0xA8.
    #[error("unknown PDU type 0x{0:02X}")]
    UnknownPduType(u8),

    /// A value tag the SNMP grammar does not know.
    #[error("unknown value tag 0x{tag:02X} at offset {offset}")]
    UnknownValueTag { offset: usize, tag: u8 },

    /// Text that does not parse as a dotted OID.
    #[error("cannot parse {input:?} as an OID: {reason}")]
    OidFromStr { input: String, reason: OidRepr },
}

/// Reason detail for OID-related failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OidRepr {
    Empty,
    TooShort,
    NonCanonicalPadding,
    TruncatedArc,
    ArcOverflow,
    FirstArcRange,
    SecondArcRange,
    BadArcText,
}

impl std::fmt::Display for OidRepr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "empty content"),
            Self::TooShort => write!(f, "fewer than two arcs"),
            Self::NonCanonicalPadding => write!(f, "arc starts with padding byte 0x80"),
            Self::TruncatedArc => write!(f, "continuation chain overruns the content"),
            Self::ArcOverflow => write!(f, "arc value exceeds 32 bits"),
            Self::FirstArcRange => write!(f, "first arc must be 0, 1 or 2"),
            Self::SecondArcRange => write!(f, "second arc must be below 40 for first arc 0 or 1"),
            Self::BadArcText => write!(f, "arc is not a decimal number"),
        }
    }
}
