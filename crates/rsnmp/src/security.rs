//! Security model dispatch.
//!
//! A v3 session owns one security parameters object with a fixed
//! capability set: marshal into and out of the message's opaque blob,
//! secure outgoing packets, verify and decrypt incoming ones, and report
//! whether engine discovery is still pending. USM is the only model this
//! library ships; the tagged variant leaves room for a future alternative
//! (e.g. TSM) without an inheritance hierarchy.

use rsnmp_msg::{HeaderData, ScopedPdu, UsmSecurityParams};

use crate::error::Error;

pub mod usm;

pub use usm::{UsmConfig, UsmSecurity};

/// What to do when an authenticated peer's engine ID changes mid-session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EngineDriftPolicy {
    /// Adopt the new identity, rederive keys and continue (logged).
    #[default]
    Adopt,
    /// Fail the exchange with [`Error::EngineMismatch`].
    Abort,
}

/// A session's security state, dispatched by model.
#[derive(Debug, Clone)]
pub enum SecurityParameters {
    Usm(UsmSecurity),
}

impl SecurityParameters {
    pub fn discovery_required(&self) -> bool {
        match self {
            SecurityParameters::Usm(usm) => usm.discovery_required(),
        }
    }

    /// msgFlags bits asserted by the configured security level.
    pub fn security_flags(&self) -> u8 {
        match self {
            SecurityParameters::Usm(usm) => usm.security_flags(),
        }
    }

    pub fn engine_id(&self) -> &[u8] {
        match self {
            SecurityParameters::Usm(usm) => usm.engine_id(),
        }
    }

    pub fn update_engine(
        &mut self,
        engine_id: &[u8],
        engine_boots: u32,
        engine_time: u32,
    ) -> Result<(), Error> {
        match self {
            SecurityParameters::Usm(usm) => usm.update_engine(engine_id, engine_boots, engine_time),
        }
    }

    /// Builds a fully-secured outgoing message around a scoped PDU.
    pub fn secure_message(
        &self,
        scoped: ScopedPdu,
        msg_id: u32,
        msg_max_size: u32,
        reportable: bool,
    ) -> Result<Vec<u8>, Error> {
        match self {
            SecurityParameters::Usm(usm) => {
                usm.secure_message(scoped, msg_id, msg_max_size, reportable)
            }
        }
    }

    /// Verifies and decrypts an inbound message.
    pub fn open_message(
        &mut self,
        buf: &[u8],
        drift: EngineDriftPolicy,
    ) -> Result<(HeaderData, UsmSecurityParams, ScopedPdu), Error> {
        match self {
            SecurityParameters::Usm(usm) => usm.open_message(buf, drift),
        }
    }
}

impl From<UsmSecurity> for SecurityParameters {
    fn from(usm: UsmSecurity) -> SecurityParameters {
        SecurityParameters::Usm(usm)
    }
}
