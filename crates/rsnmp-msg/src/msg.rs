//! Whole-message framing for all three protocol versions.

use crate::ber::{self, Reader, tag};
use crate::error::CodecError;
use crate::pdu::SnmpPdu;

/// Protocol version, as encoded in the message header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Version {
    V1,
    V2c,
    V3,
}

impl Version {
    pub fn to_wire(self) -> i64 {
        match self {
            Version::V1 => 0,
            Version::V2c => 1,
            Version::V3 => 3,
        }
    }

    pub fn from_wire(v: i64) -> Result<Version, CodecError> {
        match v {
            0 => Ok(Version::V1),
            1 => Ok(Version::V2c),
            3 => Ok(Version::V3),
            other => Err(CodecError::UnknownVersion(other)),
        }
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Version::V1 => f.write_str("SNMPv1"),
            Version::V2c => f.write_str("SNMPv2c"),
            Version::V3 => f.write_str("SNMPv3"),
        }
    }
}

/// A community-based (v1/v2c) message.
#[derive(Debug, Clone, PartialEq)]
pub struct CommunityMessage {
    pub version: Version,
    pub community: Vec<u8>,
    pub pdu: SnmpPdu,
}

impl CommunityMessage {
    pub fn marshal(&self) -> Result<Vec<u8>, CodecError> {
        let mut out = Vec::new();
        ber::push_constructed(&mut out, tag::SEQUENCE, |body| {
            ber::push_integer(body, self.version.to_wire());
            ber::push_octet_string(body, &self.community);
            self.pdu.encode(body)
        })?;
        Ok(out)
    }

    pub fn unmarshal(buf: &[u8]) -> Result<CommunityMessage, CodecError> {
        let mut outer = Reader::new(buf);
        let mut r = outer.enter_sequence()?;
        let version = Version::from_wire(r.read_integer()?)?;
        if version == Version::V3 {
            return Err(CodecError::UnknownVersion(3));
        }
        let community = r.read_octet_string()?.to_vec();
        let pdu = SnmpPdu::decode(&mut r)?;
        Ok(CommunityMessage {
            version,
            community,
            pdu,
        })
    }
}

/// msgFlags bits (RFC 3412 §6.4).
pub mod flags {
    pub const AUTH: u8 = 0x01;
    pub const PRIV: u8 = 0x02;
    pub const REPORTABLE: u8 = 0x04;
}

/// Security model identifiers. USM is the only one this library speaks.
pub const SECURITY_MODEL_USM: u32 = 3;

/// The msgGlobalData header of a v3 message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderData {
    pub msg_id: u32,
    pub msg_max_size: u32,
    pub msg_flags: u8,
    pub msg_security_model: u32,
}

impl HeaderData {
    pub fn is_authenticated(&self) -> bool {
        self.msg_flags & flags::AUTH != 0
    }

    pub fn is_encrypted(&self) -> bool {
        self.msg_flags & flags::PRIV != 0
    }

    pub fn is_reportable(&self) -> bool {
        self.msg_flags & flags::REPORTABLE != 0
    }

    fn encode(&self, out: &mut Vec<u8>) -> Result<(), CodecError> {
        ber::push_constructed(out, tag::SEQUENCE, |body| {
            ber::push_integer(body, i64::from(self.msg_id));
            ber::push_integer(body, i64::from(self.msg_max_size));
            ber::push_octet_string(body, &[self.msg_flags]);
            ber::push_integer(body, i64::from(self.msg_security_model));
            Ok(())
        })
    }

    fn decode(r: &mut Reader<'_>) -> Result<HeaderData, CodecError> {
        let mut body = r.enter_sequence()?;
        let msg_id = read_wire_u32(&mut body)?;
        let msg_max_size = read_wire_u32(&mut body)?;
        let offset = body.offset();
        let flag_octets = body.read_octet_string()?;
        if flag_octets.len() != 1 {
            return Err(CodecError::InvalidValueLength {
                offset,
                tag: tag::OCTET_STRING,
            });
        }
        let msg_security_model = read_wire_u32(&mut body)?;
        Ok(HeaderData {
            msg_id,
            msg_max_size,
            msg_flags: flag_octets[0],
            msg_security_model,
        })
    }
}

/// The scoped PDU: context identifiers plus the payload PDU. This is the
/// region USM privacy encrypts.
#[derive(Debug, Clone, PartialEq)]
pub struct ScopedPdu {
    pub context_engine_id: Vec<u8>,
    pub context_name: Vec<u8>,
    pub pdu: SnmpPdu,
}

impl ScopedPdu {
    pub fn marshal(&self) -> Result<Vec<u8>, CodecError> {
        let mut out = Vec::new();
        ber::push_constructed(&mut out, tag::SEQUENCE, |body| {
            ber::push_octet_string(body, &self.context_engine_id);
            ber::push_octet_string(body, &self.context_name);
            self.pdu.encode(body)
        })?;
        Ok(out)
    }

    pub fn unmarshal(buf: &[u8]) -> Result<ScopedPdu, CodecError> {
        let mut outer = Reader::new(buf);
        let mut r = outer.enter_sequence()?;
        let context_engine_id = r.read_octet_string()?.to_vec();
        let context_name = r.read_octet_string()?.to_vec();
        let pdu = SnmpPdu::decode(&mut r)?;
        Ok(ScopedPdu {
            context_engine_id,
            context_name,
            pdu,
        })
    }
}

/// The scoped-PDU slot of a v3 message: cleartext or ciphertext.
#[derive(Debug, Clone, PartialEq)]
pub enum ScopedPduData {
    Plaintext(ScopedPdu),
    Encrypted(Vec<u8>),
}

/// A full SNMPv3 message. The security parameters travel as an opaque
/// octet blob; interpreting them is the security model's business.
#[derive(Debug, Clone, PartialEq)]
pub struct V3Message {
    pub header: HeaderData,
    pub security_parameters: Vec<u8>,
    pub data: ScopedPduData,
}

impl V3Message {
    pub fn marshal(&self) -> Result<Vec<u8>, CodecError> {
        Ok(self.marshal_located()?.0)
    }

    /// Serializes the message and returns the byte offset of the
    /// security-parameters blob content within the output, so a security
    /// model can patch its digest placeholder without re-scanning.
    pub fn marshal_located(&self) -> Result<(Vec<u8>, usize), CodecError> {
        let mut body = Vec::new();
        ber::push_integer(&mut body, Version::V3.to_wire());
        self.header.encode(&mut body)?;
        ber::push_octet_string(&mut body, &self.security_parameters);
        let params_offset_in_body = body.len() - self.security_parameters.len();
        match &self.data {
            ScopedPduData::Plaintext(scoped) => {
                body.extend_from_slice(&scoped.marshal()?);
            }
            ScopedPduData::Encrypted(ciphertext) => {
                ber::push_octet_string(&mut body, ciphertext);
            }
        }
        let mut out = Vec::new();
        ber::push_tlv(&mut out, tag::SEQUENCE, &body);
        let body_offset = out.len() - body.len();
        Ok((out, body_offset + params_offset_in_body))
    }

    pub fn unmarshal(buf: &[u8]) -> Result<V3Message, CodecError> {
        Ok(Self::unmarshal_located(buf)?.0)
    }

    /// Parses a v3 message, also returning the offset of the
    /// security-parameters blob content within `buf`.
    pub fn unmarshal_located(buf: &[u8]) -> Result<(V3Message, usize), CodecError> {
        let mut outer = Reader::new(buf);
        let mut r = outer.enter_sequence()?;
        let version = r.read_integer()?;
        if Version::from_wire(version)? != Version::V3 {
            return Err(CodecError::UnknownVersion(version));
        }
        let header = HeaderData::decode(&mut r)?;
        let params = r.read_octet_string()?;
        let params_offset = r.offset() - params.len();
        let data = if header.is_encrypted() {
            ScopedPduData::Encrypted(r.read_octet_string()?.to_vec())
        } else {
            let scoped_start = r.offset();
            let rest = &buf[scoped_start..];
            let scoped = ScopedPdu::unmarshal(rest)?;
            ScopedPduData::Plaintext(scoped)
        };
        let msg = V3Message {
            header,
            security_parameters: params.to_vec(),
            data,
        };
        Ok((msg, params_offset))
    }
}

/// Any inbound message, dispatched on the version field.
#[derive(Debug, Clone, PartialEq)]
pub enum SnmpMessage {
    Community(CommunityMessage),
    V3(Box<V3Message>),
}

impl SnmpMessage {
    pub fn unmarshal(buf: &[u8]) -> Result<SnmpMessage, CodecError> {
        match peek_version(buf)? {
            Version::V3 => Ok(SnmpMessage::V3(Box::new(V3Message::unmarshal(buf)?))),
            _ => Ok(SnmpMessage::Community(CommunityMessage::unmarshal(buf)?)),
        }
    }
}

/// Reads just the version integer of a serialized message.
pub fn peek_version(buf: &[u8]) -> Result<Version, CodecError> {
    let mut outer = Reader::new(buf);
    let mut r = outer.enter_sequence()?;
    Version::from_wire(r.read_integer()?)
}

fn read_wire_u32(r: &mut Reader<'_>) -> Result<u32, CodecError> {
    let offset = r.offset();
    let v = r.read_integer()?;
    u32::try_from(v).map_err(|_| CodecError::IntegerOverflow { offset })
}
