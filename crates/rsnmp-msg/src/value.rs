//! Variable-binding values and their BER forms.

use std::net::Ipv4Addr;

use crate::ber::{self, Reader, tag};
use crate::error::CodecError;
use crate::oid::Oid;

/// The value half of a variable binding.
///
/// This is the closed set of types an SNMP varbind can carry (RFC 2578
/// SMI types plus the RFC 3416 exception markers). Integers are held as
/// signed 64-bit internally but encoded minimally; `OpaqueFloat` and
/// `OpaqueDouble` are the net-snmp nested-opaque forms.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Boolean(bool),
    Integer(i64),
    /// Raw BIT STRING content, including the leading unused-bits octet.
    BitString(Vec<u8>),
    OctetString(Vec<u8>),
    Null,
    ObjectIdentifier(Oid),
    IpAddress(Ipv4Addr),
    Counter32(u32),
    Gauge32(u32),
    TimeTicks(u32),
    Opaque(Vec<u8>),
    Counter64(u64),
    Uinteger32(u32),
    OpaqueFloat(f32),
    OpaqueDouble(f64),
    NoSuchObject,
    NoSuchInstance,
    EndOfMibView,
}

impl Value {
    /// Returns true for the three exception markers that end a walk.
    pub fn is_exception(&self) -> bool {
        matches!(
            self,
            Value::NoSuchObject | Value::NoSuchInstance | Value::EndOfMibView
        )
    }

    /// Borrows the octets of an `OctetString` value.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::OctetString(b) => Some(b),
            _ => None,
        }
    }

    /// Widens any of the integral variants to u64, losing sign.
    pub fn as_u64(&self) -> Option<u64> {
        match *self {
            Value::Integer(v) => Some(v as u64),
            Value::Counter32(v) | Value::Gauge32(v) | Value::TimeTicks(v)
            | Value::Uinteger32(v) => Some(u64::from(v)),
            Value::Counter64(v) => Some(v),
            _ => None,
        }
    }
}

pub(crate) fn push_value(out: &mut Vec<u8>, value: &Value) -> Result<(), CodecError> {
    match value {
        Value::Boolean(v) => ber::push_boolean(out, *v),
        Value::Integer(v) => ber::push_integer(out, *v),
        Value::BitString(content) => ber::push_tlv(out, tag::BIT_STRING, content),
        Value::OctetString(bytes) => ber::push_octet_string(out, bytes),
        Value::Null => ber::push_null(out),
        Value::ObjectIdentifier(oid) => ber::push_oid(out, oid)?,
        Value::IpAddress(addr) => ber::push_tlv(out, tag::IP_ADDRESS, &addr.octets()),
        Value::Counter32(v) => ber::push_unsigned(out, tag::COUNTER32, u64::from(*v)),
        Value::Gauge32(v) => ber::push_unsigned(out, tag::GAUGE32, u64::from(*v)),
        Value::TimeTicks(v) => ber::push_unsigned(out, tag::TIME_TICKS, u64::from(*v)),
        Value::Opaque(content) => ber::push_tlv(out, tag::OPAQUE, content),
        Value::Counter64(v) => ber::push_unsigned(out, tag::COUNTER64, *v),
        Value::Uinteger32(v) => ber::push_unsigned(out, tag::UINTEGER32, u64::from(*v)),
        Value::OpaqueFloat(v) => {
            let mut inner = vec![tag::OPAQUE_EXTENSION, tag::OPAQUE_FLOAT, 4];
            inner.extend_from_slice(&v.to_be_bytes());
            ber::push_tlv(out, tag::OPAQUE, &inner);
        }
        Value::OpaqueDouble(v) => {
            let mut inner = vec![tag::OPAQUE_EXTENSION, tag::OPAQUE_DOUBLE, 8];
            inner.extend_from_slice(&v.to_be_bytes());
            ber::push_tlv(out, tag::OPAQUE, &inner);
        }
        Value::NoSuchObject => ber::push_tlv(out, tag::NO_SUCH_OBJECT, &[]),
        Value::NoSuchInstance => ber::push_tlv(out, tag::NO_SUCH_INSTANCE, &[]),
        Value::EndOfMibView => ber::push_tlv(out, tag::END_OF_MIB_VIEW, &[]),
    }
    Ok(())
}

pub(crate) fn read_value(r: &mut Reader<'_>) -> Result<Value, CodecError> {
    let offset = r.offset();
    let (tag_byte, content) = r.read_tlv()?;
    let value = match tag_byte {
        tag::BOOLEAN => {
            if content.len() != 1 {
                return Err(CodecError::InvalidValueLength {
                    offset,
                    tag: tag_byte,
                });
            }
            Value::Boolean(content[0] != 0)
        }
        tag::INTEGER => Value::Integer(ber::parse_int(content, offset)?),
        tag::BIT_STRING => Value::BitString(content.to_vec()),
        tag::OCTET_STRING => Value::OctetString(content.to_vec()),
        tag::NULL => {
            if !content.is_empty() {
                return Err(CodecError::InvalidValueLength {
                    offset,
                    tag: tag_byte,
                });
            }
            Value::Null
        }
        tag::OBJECT_IDENTIFIER => Value::ObjectIdentifier(ber::parse_oid(content, offset)?),
        tag::IP_ADDRESS => {
            let octets: [u8; 4] =
                content
                    .try_into()
                    .map_err(|_| CodecError::InvalidIpAddressLength {
                        offset,
                        length: content.len(),
                    })?;
            Value::IpAddress(Ipv4Addr::from(octets))
        }
        tag::COUNTER32 => Value::Counter32(narrow_u32(content, offset)?),
        tag::GAUGE32 => Value::Gauge32(narrow_u32(content, offset)?),
        tag::TIME_TICKS => Value::TimeTicks(narrow_u32(content, offset)?),
        tag::OPAQUE => read_opaque(content, offset)?,
        tag::COUNTER64 => Value::Counter64(ber::parse_uint(content, offset)?),
        tag::UINTEGER32 => Value::Uinteger32(narrow_u32(content, offset)?),
        tag::NO_SUCH_OBJECT => Value::NoSuchObject,
        tag::NO_SUCH_INSTANCE => Value::NoSuchInstance,
        tag::END_OF_MIB_VIEW => Value::EndOfMibView,
        other => {
            return Err(CodecError::UnknownValueTag { offset, tag: other });
        }
    };
    Ok(value)
}

fn narrow_u32(content: &[u8], offset: usize) -> Result<u32, CodecError> {
    let wide = ber::parse_uint(content, offset)?;
    u32::try_from(wide).map_err(|_| CodecError::IntegerOverflow { offset })
}

/// Opaque content is either raw octets or a nested net-snmp float/double
/// TLV tagged 0x9F 0x78 / 0x9F 0x79.
fn read_opaque(content: &[u8], offset: usize) -> Result<Value, CodecError> {
    match content {
        [tag::OPAQUE_EXTENSION, tag::OPAQUE_FLOAT, 4, rest @ ..] if rest.len() == 4 => {
            let bits: [u8; 4] = rest.try_into().map_err(|_| CodecError::InvalidValueLength {
                offset,
                tag: tag::OPAQUE_FLOAT,
            })?;
            Ok(Value::OpaqueFloat(f32::from_be_bytes(bits)))
        }
        [tag::OPAQUE_EXTENSION, tag::OPAQUE_DOUBLE, 8, rest @ ..] if rest.len() == 8 => {
            let bits: [u8; 8] = rest.try_into().map_err(|_| CodecError::InvalidValueLength {
                offset,
                tag: tag::OPAQUE_DOUBLE,
            })?;
            Ok(Value::OpaqueDouble(f64::from_be_bytes(bits)))
        }
        _ => Ok(Value::Opaque(content.to_vec())),
    }
}
