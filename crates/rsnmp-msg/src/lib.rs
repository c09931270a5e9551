//! SNMP wire model: the BER subset SNMP needs, object identifiers,
//! variable bindings, PDUs and message framing for v1, v2c and v3.
//!
//! This crate is transport- and crypto-free. Security processing (USM
//! digests and privacy) happens in the `rsnmp` crate, which treats the
//! v3 security-parameters field here as an opaque blob.

#![forbid(unsafe_code)]

pub mod ber;
pub mod error;
pub mod msg;
pub mod oid;
pub mod pdu;
pub mod usm;
pub mod value;

pub use error::CodecError;
pub use msg::{
    CommunityMessage, HeaderData, ScopedPdu, ScopedPduData, SnmpMessage, V3Message, Version,
    flags, peek_version, SECURITY_MODEL_USM,
};
pub use oid::Oid;
pub use pdu::{ErrorStatus, Pdu, PduType, SnmpPdu, TrapV1Pdu, VarBind};
pub use usm::UsmSecurityParams;
pub use value::Value;

/// Message codec result type.
pub type Result<T> = std::result::Result<T, CodecError>;
