//! Wire form of the User-based Security Model parameters (RFC 3414 §2.4).
//!
//! Only the BER shape lives here; key material and the crypto that uses
//! these fields belong to the client crate.

use crate::ber::{self, Reader, tag};
use crate::error::CodecError;

/// The UsmSecurityParameters SEQUENCE, carried inside the v3 message as an
/// opaque OCTET STRING.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UsmSecurityParams {
    pub engine_id: Vec<u8>,
    pub engine_boots: u32,
    pub engine_time: u32,
    pub user_name: Vec<u8>,
    /// Incoming: the message digest. Outgoing: a zeroed placeholder that
    /// is overwritten once the whole message has been serialized.
    pub authentication_parameters: Vec<u8>,
    /// The privacy salt ("privParameters").
    pub privacy_parameters: Vec<u8>,
}

impl UsmSecurityParams {
    /// Parameters for an engine-discovery probe: everything empty.
    pub fn discovery() -> UsmSecurityParams {
        UsmSecurityParams::default()
    }

    pub fn encode(&self) -> Vec<u8> {
        self.encode_located().0
    }

    /// Encodes the parameters, also returning the byte offset of the
    /// authenticationParameters *content* within the returned buffer, so
    /// the digest can be patched in place after the full message exists.
    pub fn encode_located(&self) -> (Vec<u8>, usize) {
        let mut inner = Vec::new();
        ber::push_octet_string(&mut inner, &self.engine_id);
        ber::push_integer(&mut inner, i64::from(self.engine_boots));
        ber::push_integer(&mut inner, i64::from(self.engine_time));
        ber::push_octet_string(&mut inner, &self.user_name);
        ber::push_octet_string(&mut inner, &self.authentication_parameters);
        let auth_end_in_inner = inner.len();
        ber::push_octet_string(&mut inner, &self.privacy_parameters);

        let mut out = Vec::new();
        ber::push_tlv(&mut out, tag::SEQUENCE, &inner);
        let inner_start = out.len() - inner.len();
        let auth_offset =
            inner_start + auth_end_in_inner - self.authentication_parameters.len();
        (out, auth_offset)
    }

    pub fn decode(buf: &[u8]) -> Result<UsmSecurityParams, CodecError> {
        Ok(Self::decode_located(buf)?.0)
    }

    /// Decodes the parameters, also returning the offset of the
    /// authenticationParameters content within `buf` (the digest bytes a
    /// verifier must zero before recomputing).
    pub fn decode_located(buf: &[u8]) -> Result<(UsmSecurityParams, usize), CodecError> {
        let mut outer = Reader::new(buf);
        let mut r = outer.enter_sequence()?;
        let engine_id = r.read_octet_string()?.to_vec();
        let engine_boots = read_engine_u32(&mut r)?;
        let engine_time = read_engine_u32(&mut r)?;
        let user_name = r.read_octet_string()?.to_vec();
        let auth = r.read_octet_string()?;
        let auth_offset = r.offset() - auth.len();
        let privacy_parameters = r.read_octet_string()?.to_vec();
        let params = UsmSecurityParams {
            engine_id,
            engine_boots,
            engine_time,
            user_name,
            authentication_parameters: auth.to_vec(),
            privacy_parameters,
        };
        Ok((params, auth_offset))
    }
}

/// Engine boots and time are non-negative 32-bit on the wire.
fn read_engine_u32(r: &mut Reader<'_>) -> Result<u32, CodecError> {
    let offset = r.offset();
    let v = r.read_integer()?;
    u32::try_from(v).map_err(|_| CodecError::IntegerOverflow { offset })
}
