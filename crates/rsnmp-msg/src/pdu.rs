//! PDU model: variable bindings, the generic request/response PDU and the
//! SNMPv1 trap PDU.

use std::net::Ipv4Addr;

use crate::ber::{self, Reader, tag};
use crate::error::CodecError;
use crate::oid::Oid;
use crate::value::{self, Value};

/// Context-specific constructed tags carried by the PDU wrapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PduType {
    GetRequest = 0xA0,
    GetNextRequest = 0xA1,
    Response = 0xA2,
    SetRequest = 0xA3,
    TrapV1 = 0xA4,
    GetBulkRequest = 0xA5,
    InformRequest = 0xA6,
    TrapV2 = 0xA7,
    Report = 0xA8,
}

impl PduType {
    pub fn from_tag(tag: u8) -> Option<PduType> {
        Some(match tag {
            0xA0 => PduType::GetRequest,
            0xA1 => PduType::GetNextRequest,
            0xA2 => PduType::Response,
            0xA3 => PduType::SetRequest,
            0xA4 => PduType::TrapV1,
            0xA5 => PduType::GetBulkRequest,
            0xA6 => PduType::InformRequest,
            0xA7 => PduType::TrapV2,
            0xA8 => PduType::Report,
            _ => return None,
        })
    }

    pub fn tag(self) -> u8 {
        self as u8
    }
}

impl std::fmt::Display for PduType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PduType::GetRequest => "GetRequest",
            PduType::GetNextRequest => "GetNextRequest",
            PduType::Response => "Response",
            PduType::SetRequest => "SetRequest",
            PduType::TrapV1 => "Trap",
            PduType::GetBulkRequest => "GetBulkRequest",
            PduType::InformRequest => "InformRequest",
            PduType::TrapV2 => "TrapV2",
            PduType::Report => "Report",
        };
        f.write_str(name)
    }
}

/// Agent error-status codes (RFC 3416). Any non-zero status ends a walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorStatus {
    NoError,
    TooBig,
    NoSuchName,
    BadValue,
    ReadOnly,
    GenErr,
    NoAccess,
    WrongType,
    WrongLength,
    WrongEncoding,
    WrongValue,
    NoCreation,
    InconsistentValue,
    ResourceUnavailable,
    CommitFailed,
    UndoFailed,
    AuthorizationError,
    NotWritable,
    InconsistentName,
    /// A status code outside the RFC 3416 table.
    Unknown(i64),
}

impl ErrorStatus {
    pub fn from_wire(v: i64) -> ErrorStatus {
        match v {
            0 => ErrorStatus::NoError,
            1 => ErrorStatus::TooBig,
            2 => ErrorStatus::NoSuchName,
            3 => ErrorStatus::BadValue,
            4 => ErrorStatus::ReadOnly,
            5 => ErrorStatus::GenErr,
            6 => ErrorStatus::NoAccess,
            7 => ErrorStatus::WrongType,
            8 => ErrorStatus::WrongLength,
            9 => ErrorStatus::WrongEncoding,
            10 => ErrorStatus::WrongValue,
            11 => ErrorStatus::NoCreation,
            12 => ErrorStatus::InconsistentValue,
            13 => ErrorStatus::ResourceUnavailable,
            14 => ErrorStatus::CommitFailed,
            15 => ErrorStatus::UndoFailed,
            16 => ErrorStatus::AuthorizationError,
            17 => ErrorStatus::NotWritable,
            18 => ErrorStatus::InconsistentName,
            other => ErrorStatus::Unknown(other),
        }
    }

    pub fn to_wire(self) -> i64 {
        match self {
            ErrorStatus::NoError => 0,
            ErrorStatus::TooBig => 1,
            ErrorStatus::NoSuchName => 2,
            ErrorStatus::BadValue => 3,
            ErrorStatus::ReadOnly => 4,
            ErrorStatus::GenErr => 5,
            ErrorStatus::NoAccess => 6,
            ErrorStatus::WrongType => 7,
            ErrorStatus::WrongLength => 8,
            ErrorStatus::WrongEncoding => 9,
            ErrorStatus::WrongValue => 10,
            ErrorStatus::NoCreation => 11,
            ErrorStatus::InconsistentValue => 12,
            ErrorStatus::ResourceUnavailable => 13,
            ErrorStatus::CommitFailed => 14,
            ErrorStatus::UndoFailed => 15,
            ErrorStatus::AuthorizationError => 16,
            ErrorStatus::NotWritable => 17,
            ErrorStatus::InconsistentName => 18,
            ErrorStatus::Unknown(code) => code,
        }
    }

    pub fn is_error(self) -> bool {
        self != ErrorStatus::NoError
    }
}

impl std::fmt::Display for ErrorStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorStatus::NoError => "noError",
            ErrorStatus::TooBig => "tooBig",
            ErrorStatus::NoSuchName => "noSuchName",
            ErrorStatus::BadValue => "badValue",
            ErrorStatus::ReadOnly => "readOnly",
            ErrorStatus::GenErr => "genErr",
            ErrorStatus::NoAccess => "noAccess",
            ErrorStatus::WrongType => "wrongType",
            ErrorStatus::WrongLength => "wrongLength",
            ErrorStatus::WrongEncoding => "wrongEncoding",
            ErrorStatus::WrongValue => "wrongValue",
            ErrorStatus::NoCreation => "noCreation",
            ErrorStatus::InconsistentValue => "inconsistentValue",
            ErrorStatus::ResourceUnavailable => "resourceUnavailable",
            ErrorStatus::CommitFailed => "commitFailed",
            ErrorStatus::UndoFailed => "undoFailed",
            ErrorStatus::AuthorizationError => "authorizationError",
            ErrorStatus::NotWritable => "notWritable",
            ErrorStatus::InconsistentName => "inconsistentName",
            ErrorStatus::Unknown(code) => return write!(f, "unknown({code})"),
        };
        f.write_str(name)
    }
}

/// A (name, value) pair. The type tag lives inside [`Value`].
#[derive(Debug, Clone, PartialEq)]
pub struct VarBind {
    pub name: Oid,
    pub value: Value,
}

impl VarBind {
    pub fn new(name: Oid, value: Value) -> VarBind {
        VarBind { name, value }
    }

    /// A varbind with a NULL value, as requests carry.
    pub fn null(name: Oid) -> VarBind {
        VarBind {
            name,
            value: Value::Null,
        }
    }
}

/// The generic PDU shape shared by every operation except the SNMPv1 trap.
///
/// For GetBulk the `non_repeaters` and `max_repetitions` fields are
/// carried in the wire slots that otherwise hold error-status and
/// error-index; both views are kept as separate fields here and the right
/// pair is chosen at encode time.
#[derive(Debug, Clone, PartialEq)]
pub struct Pdu {
    pub pdu_type: PduType,
    pub request_id: u32,
    pub error_status: ErrorStatus,
    pub error_index: u32,
    pub non_repeaters: u32,
    pub max_repetitions: u32,
    pub varbinds: Vec<VarBind>,
}

impl Pdu {
    /// A request PDU with zeroed error fields.
    pub fn request(pdu_type: PduType, request_id: u32, varbinds: Vec<VarBind>) -> Pdu {
        Pdu {
            pdu_type,
            request_id,
            error_status: ErrorStatus::NoError,
            error_index: 0,
            non_repeaters: 0,
            max_repetitions: 0,
            varbinds,
        }
    }

    pub fn get_bulk(
        request_id: u32,
        non_repeaters: u32,
        max_repetitions: u32,
        varbinds: Vec<VarBind>,
    ) -> Pdu {
        Pdu {
            pdu_type: PduType::GetBulkRequest,
            request_id,
            error_status: ErrorStatus::NoError,
            error_index: 0,
            non_repeaters,
            max_repetitions,
            varbinds,
        }
    }

    pub(crate) fn encode(&self, out: &mut Vec<u8>) -> Result<(), CodecError> {
        ber::push_constructed(out, self.pdu_type.tag(), |body| {
            ber::push_integer(body, i64::from(self.request_id));
            if self.pdu_type == PduType::GetBulkRequest {
                ber::push_integer(body, i64::from(self.non_repeaters));
                ber::push_integer(body, i64::from(self.max_repetitions));
            } else {
                ber::push_integer(body, self.error_status.to_wire());
                ber::push_integer(body, i64::from(self.error_index));
            }
            encode_varbinds(body, &self.varbinds)
        })
    }

    pub(crate) fn decode(pdu_type: PduType, r: &mut Reader<'_>) -> Result<Pdu, CodecError> {
        let request_id = read_u32(r)?;
        let second = r.read_integer()?;
        let third = read_u32(r)?;
        let varbinds = decode_varbinds(r)?;
        let mut pdu = Pdu {
            pdu_type,
            request_id,
            error_status: ErrorStatus::NoError,
            error_index: 0,
            non_repeaters: 0,
            max_repetitions: 0,
            varbinds,
        };
        if pdu_type == PduType::GetBulkRequest {
            pdu.non_repeaters = u32::try_from(second.max(0)).unwrap_or(0);
            pdu.max_repetitions = third;
        } else {
            pdu.error_status = ErrorStatus::from_wire(second);
            pdu.error_index = third;
        }
        Ok(pdu)
    }
}

/// The SNMPv1 trap PDU (RFC 1157), which has its own body layout.
#[derive(Debug, Clone, PartialEq)]
pub struct TrapV1Pdu {
    pub enterprise: Oid,
    pub agent_addr: Ipv4Addr,
    pub generic_trap: i64,
    pub specific_trap: i64,
    pub timestamp: u32,
    pub varbinds: Vec<VarBind>,
}

impl TrapV1Pdu {
    pub(crate) fn encode(&self, out: &mut Vec<u8>) -> Result<(), CodecError> {
        ber::push_constructed(out, PduType::TrapV1.tag(), |body| {
            ber::push_oid(body, &self.enterprise)?;
            ber::push_tlv(body, tag::IP_ADDRESS, &self.agent_addr.octets());
            ber::push_integer(body, self.generic_trap);
            ber::push_integer(body, self.specific_trap);
            ber::push_unsigned(body, tag::TIME_TICKS, u64::from(self.timestamp));
            encode_varbinds(body, &self.varbinds)
        })
    }

    pub(crate) fn decode(r: &mut Reader<'_>) -> Result<TrapV1Pdu, CodecError> {
        let enterprise = r.read_oid()?;
        let offset = r.offset();
        let addr = r.expect(tag::IP_ADDRESS)?;
        let octets: [u8; 4] = addr
            .try_into()
            .map_err(|_| CodecError::InvalidIpAddressLength {
                offset,
                length: addr.len(),
            })?;
        let generic_trap = r.read_integer()?;
        let specific_trap = r.read_integer()?;
        let offset = r.offset();
        let timestamp = u32::try_from(r.read_unsigned(tag::TIME_TICKS)?)
            .map_err(|_| CodecError::IntegerOverflow { offset })?;
        let varbinds = decode_varbinds(r)?;
        Ok(TrapV1Pdu {
            enterprise,
            agent_addr: Ipv4Addr::from(octets),
            generic_trap,
            specific_trap,
            timestamp,
            varbinds,
        })
    }
}

/// Either PDU shape, as found inside a message.
#[derive(Debug, Clone, PartialEq)]
pub enum SnmpPdu {
    Generic(Pdu),
    TrapV1(TrapV1Pdu),
}

impl SnmpPdu {
    pub fn pdu_type(&self) -> PduType {
        match self {
            SnmpPdu::Generic(pdu) => pdu.pdu_type,
            SnmpPdu::TrapV1(_) => PduType::TrapV1,
        }
    }

    pub fn varbinds(&self) -> &[VarBind] {
        match self {
            SnmpPdu::Generic(pdu) => &pdu.varbinds,
            SnmpPdu::TrapV1(trap) => &trap.varbinds,
        }
    }

    pub(crate) fn encode(&self, out: &mut Vec<u8>) -> Result<(), CodecError> {
        match self {
            SnmpPdu::Generic(pdu) => pdu.encode(out),
            SnmpPdu::TrapV1(trap) => trap.encode(out),
        }
    }

    pub(crate) fn decode(r: &mut Reader<'_>) -> Result<SnmpPdu, CodecError> {
        let tag_byte = r.peek_tag()?;
        let pdu_type =
            PduType::from_tag(tag_byte).ok_or(CodecError::UnknownPduType(tag_byte))?;
        let mut body = r.enter(tag_byte)?;
        let pdu = match pdu_type {
            PduType::TrapV1 => SnmpPdu::TrapV1(TrapV1Pdu::decode(&mut body)?),
            _ => SnmpPdu::Generic(Pdu::decode(pdu_type, &mut body)?),
        };
        Ok(pdu)
    }
}

impl From<Pdu> for SnmpPdu {
    fn from(pdu: Pdu) -> SnmpPdu {
        SnmpPdu::Generic(pdu)
    }
}

impl From<TrapV1Pdu> for SnmpPdu {
    fn from(trap: TrapV1Pdu) -> SnmpPdu {
        SnmpPdu::TrapV1(trap)
    }
}

fn encode_varbinds(out: &mut Vec<u8>, varbinds: &[VarBind]) -> Result<(), CodecError> {
    ber::push_constructed(out, tag::SEQUENCE, |list| {
        for vb in varbinds {
            ber::push_constructed(list, tag::SEQUENCE, |item| {
                ber::push_oid(item, &vb.name)?;
                value::push_value(item, &vb.value)
            })?;
        }
        Ok(())
    })
}

fn decode_varbinds(r: &mut Reader<'_>) -> Result<Vec<VarBind>, CodecError> {
    let mut list = r.enter_sequence()?;
    let mut varbinds = Vec::new();
    while !list.is_empty() {
        let mut item = list.enter_sequence()?;
        let name = item.read_oid()?;
        let value = value::read_value(&mut item)?;
        varbinds.push(VarBind { name, value });
    }
    Ok(varbinds)
}

fn read_u32(r: &mut Reader<'_>) -> Result<u32, CodecError> {
    let offset = r.offset();
    let v = r.read_integer()?;
    // Request ids and error indexes are non-negative 32-bit on the wire;
    // tolerate sloppy agents that sign-wrap them.
    Ok(u32::try_from(v)
        .or_else(|_| u32::try_from(v & 0xFFFF_FFFF).map_err(|_| CodecError::IntegerOverflow { offset }))?)
}
