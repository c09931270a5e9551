//! The client session: per-target state, request dispatch and the
//! engine-discovery handshake.

use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use rand::RngCore;
use rand::rngs::OsRng;
use rsnmp_msg::{
    CommunityMessage, Oid, Pdu, PduType, ScopedPdu, SnmpPdu, TrapV1Pdu, VarBind, Version,
};
use rsnmp_transport::{SNMP_PORT, Transport, TransportConfig, make_transport};

use crate::error::{ConfigError, Error, Result};
use crate::security::{EngineDriftPolicy, SecurityParameters, usm};
use crate::walk::{self, WalkMode, WalkVisitor};

/// Present/absent application options tweaking protocol behavior.
///
/// The only option the core recognizes today is `"c"`: disable the
/// strictly-increasing OID check during walks, for agents that violate
/// the lexicographic ordering contract.
#[derive(Debug, Clone, Default)]
pub struct AppOptions(HashSet<String>);

impl AppOptions {
    pub fn set(&mut self, option: impl Into<String>) -> &mut Self {
        self.0.insert(option.into());
        self
    }

    pub fn is_set(&self, option: &str) -> bool {
        self.0.contains(option)
    }
}

/// Session configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Peer host, with or without an explicit port.
    pub target: String,
    /// Port used when `target` does not carry one.
    pub port: u16,
    pub version: Version,
    /// Community string (v1/v2c only).
    pub community: String,
    /// USM state (v3 only).
    pub security: Option<SecurityParameters>,
    /// Scoped-PDU context engine ID; defaults to the discovered
    /// authoritative engine when left empty.
    pub context_engine_id: Vec<u8>,
    pub context_name: Vec<u8>,
    /// Default max-repetitions for GetBulk-based walks.
    pub max_repetitions: u32,
    pub timeout: Duration,
    pub transport: TransportConfig,
    pub app_options: AppOptions,
    /// Advertised msgMaxSize (v3).
    pub msg_max_size: u32,
    pub engine_drift: EngineDriftPolicy,
}

impl Default for ClientConfig {
    fn default() -> ClientConfig {
        ClientConfig {
            target: String::new(),
            port: SNMP_PORT,
            version: Version::V2c,
            community: "public".to_string(),
            security: None,
            context_engine_id: Vec::new(),
            context_name: Vec::new(),
            max_repetitions: 10,
            timeout: Duration::from_secs(5),
            transport: TransportConfig::default(),
            app_options: AppOptions::default(),
            msg_max_size: rsnmp_transport::MAX_DATAGRAM_SIZE as u32,
            engine_drift: EngineDriftPolicy::Adopt,
        }
    }
}

/// An SNMP client session against a single peer.
///
/// A session issues one exchange at a time; the transport and the
/// mutable security state are each behind their own lock, so sessions
/// can be shared across threads while packet construction never blocks
/// on another thread's network wait longer than necessary.
pub struct Client {
    version: Version,
    community: Vec<u8>,
    security: Option<Mutex<SecurityParameters>>,
    transport: Mutex<Box<dyn Transport>>,
    request_id: AtomicU32,
    msg_id: AtomicU32,
    max_repetitions: u32,
    msg_max_size: u32,
    context_engine_id: Vec<u8>,
    context_name: Vec<u8>,
    app_options: AppOptions,
    engine_drift: EngineDriftPolicy,
}

impl Client {
    /// Connects the configured transport and builds a session.
    pub fn connect(config: ClientConfig) -> Result<Client> {
        let target = if config.target.parse::<std::net::SocketAddr>().is_ok() {
            config.target.clone()
        } else {
            format!("{}:{}", config.target, config.port)
        };
        let transport = make_transport(&config.transport, &target, config.timeout)?;
        Client::with_transport(config, transport)
    }

    /// Builds a session over an already-connected transport collaborator.
    pub fn with_transport(
        config: ClientConfig,
        transport: Box<dyn Transport>,
    ) -> Result<Client> {
        if config.version == Version::V3 && config.security.is_none() {
            return Err(ConfigError::SecurityRequired.into());
        }
        // Random starts keep request ids from colliding across restarts;
        // both counters stay within 31 bits on the wire.
        let request_id = OsRng.next_u32() & 0x7FFF_FFFF;
        let msg_id = OsRng.next_u32() & 0x7FFF_FFFF;
        Ok(Client {
            version: config.version,
            community: config.community.into_bytes(),
            security: config.security.map(Mutex::new),
            transport: Mutex::new(transport),
            request_id: AtomicU32::new(request_id),
            msg_id: AtomicU32::new(msg_id),
            max_repetitions: config.max_repetitions,
            msg_max_size: config.msg_max_size,
            context_engine_id: config.context_engine_id,
            context_name: config.context_name,
            app_options: config.app_options,
            engine_drift: config.engine_drift,
        })
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub(crate) fn app_option(&self, option: &str) -> bool {
        self.app_options.is_set(option)
    }

    /// Retrieves the named objects.
    pub fn get(&self, oids: &[Oid]) -> Result<Vec<VarBind>> {
        let pdu = self.round(PduType::GetRequest, nulls(oids), 0, 0)?;
        agent_checked(pdu)
    }

    /// Retrieves the lexicographic successors of the named objects.
    pub fn get_next(&self, oids: &[Oid]) -> Result<Vec<VarBind>> {
        let pdu = self.round(PduType::GetNextRequest, nulls(oids), 0, 0)?;
        agent_checked(pdu)
    }

    /// Bulk retrieval (v2c/v3): up to `max_repetitions` successors for
    /// each OID past the first `non_repeaters`.
    pub fn get_bulk(
        &self,
        oids: &[Oid],
        non_repeaters: u32,
        max_repetitions: u32,
    ) -> Result<Vec<VarBind>> {
        let pdu = self.round(
            PduType::GetBulkRequest,
            nulls(oids),
            non_repeaters,
            max_repetitions,
        )?;
        agent_checked(pdu)
    }

    /// Writes the given varbinds.
    pub fn set(&self, varbinds: Vec<VarBind>) -> Result<Vec<VarBind>> {
        let pdu = self.round(PduType::SetRequest, varbinds, 0, 0)?;
        agent_checked(pdu)
    }

    /// Sends an acknowledged notification and returns the responder's
    /// varbinds.
    pub fn inform(&self, varbinds: Vec<VarBind>) -> Result<Vec<VarBind>> {
        let pdu = self.round(PduType::InformRequest, varbinds, 0, 0)?;
        agent_checked(pdu)
    }

    /// Sends an unacknowledged v2 trap.
    pub fn send_trap(&self, varbinds: Vec<VarBind>) -> Result<()> {
        let request_id = self.next_request_id();
        let pdu = Pdu::request(PduType::TrapV2, request_id, varbinds);
        match self.version {
            Version::V1 => Err(ConfigError::TrapVersionMismatch(Version::V1).into()),
            Version::V2c => self.send_community(pdu.into()),
            Version::V3 => self.send_v3(pdu),
        }
    }

    /// Sends an RFC 1157 trap (v1 sessions only).
    pub fn send_trap_v1(&self, trap: TrapV1Pdu) -> Result<()> {
        if self.version != Version::V1 {
            return Err(ConfigError::TrapVersionMismatch(self.version).into());
        }
        self.send_community(trap.into())
    }

    /// Walks the subtree under `root` with GetNext, one varbind per
    /// round, feeding each in-range varbind to `visitor`.
    pub fn walk(&self, root: &str, visitor: impl WalkVisitor) -> Result<()> {
        let mut visitor = visitor;
        walk::walk(self, root, WalkMode::GetNext, &mut visitor)
    }

    /// Walks the subtree under `root` with GetBulk and the session's
    /// default max-repetitions.
    pub fn walk_bulk(&self, root: &str, visitor: impl WalkVisitor) -> Result<()> {
        let mut visitor = visitor;
        walk::walk(
            self,
            root,
            WalkMode::GetBulk(self.max_repetitions),
            &mut visitor,
        )
    }

    /// GetNext walk collecting every varbind.
    pub fn walk_all(&self, root: &str) -> Result<Vec<VarBind>> {
        let mut out = Vec::new();
        self.walk(root, |vb: &VarBind| {
            out.push(vb.clone());
            Ok(())
        })?;
        Ok(out)
    }

    /// GetBulk walk collecting every varbind.
    pub fn walk_bulk_all(&self, root: &str) -> Result<Vec<VarBind>> {
        let mut out = Vec::new();
        self.walk_bulk(root, |vb: &VarBind| {
            out.push(vb.clone());
            Ok(())
        })?;
        Ok(out)
    }

    /// One request/response round, returning the response PDU with its
    /// error-status intact (the walk engine maps statuses itself).
    pub(crate) fn round(
        &self,
        pdu_type: PduType,
        varbinds: Vec<VarBind>,
        non_repeaters: u32,
        max_repetitions: u32,
    ) -> Result<Pdu> {
        match self.version {
            Version::V1 | Version::V2c => {
                let request_id = self.next_request_id();
                let pdu = match pdu_type {
                    PduType::GetBulkRequest => {
                        Pdu::get_bulk(request_id, non_repeaters, max_repetitions, varbinds)
                    }
                    _ => Pdu::request(pdu_type, request_id, varbinds),
                };
                self.exchange_community(pdu)
            }
            Version::V3 => self.exchange_v3(pdu_type, varbinds, non_repeaters, max_repetitions),
        }
    }

    fn exchange_community(&self, pdu: Pdu) -> Result<Pdu> {
        let request_id = pdu.request_id;
        let msg = CommunityMessage {
            version: self.version,
            community: self.community.clone(),
            pdu: pdu.into(),
        };
        let bytes = msg.marshal()?;
        log::trace!("sending {} byte {} message", bytes.len(), self.version);
        let reply = lock(&self.transport).exchange(&bytes)?;
        let parsed = CommunityMessage::unmarshal(&reply)?;
        self.accept_response(parsed.pdu, request_id)
    }

    fn send_community(&self, pdu: SnmpPdu) -> Result<()> {
        let msg = CommunityMessage {
            version: self.version,
            community: self.community.clone(),
            pdu,
        };
        let bytes = msg.marshal()?;
        lock(&self.transport).send(&bytes)?;
        Ok(())
    }

    fn exchange_v3(
        &self,
        pdu_type: PduType,
        varbinds: Vec<VarBind>,
        non_repeaters: u32,
        max_repetitions: u32,
    ) -> Result<Pdu> {
        let security = self.security_state()?;
        self.ensure_engine(security)?;

        let mut rediscovered = false;
        loop {
            let request_id = self.next_request_id();
            let pdu = match pdu_type {
                PduType::GetBulkRequest => Pdu::get_bulk(
                    request_id,
                    non_repeaters,
                    max_repetitions,
                    varbinds.clone(),
                ),
                _ => Pdu::request(pdu_type, request_id, varbinds.clone()),
            };
            let (bytes, required_flags) = {
                let sec = lock(security);
                let scoped = self.scoped_pdu(&sec, pdu.into());
                let bytes =
                    sec.secure_message(scoped, self.next_msg_id(), self.msg_max_size, true)?;
                (bytes, sec.security_flags())
            };
            let reply = lock(&self.transport).exchange(&bytes)?;
            let (header, _params, scoped) =
                lock(security).open_message(&reply, self.engine_drift)?;
            let resp = match scoped.pdu {
                SnmpPdu::Generic(p) => p,
                SnmpPdu::TrapV1(_) => return Err(Error::UnexpectedPduType(PduType::TrapV1)),
            };

            // Request-id first: a stale or forged Report must not steer
            // the engine-discovery path.
            if resp.request_id != request_id {
                return Err(Error::RequestIdMismatch {
                    expected: request_id,
                    actual: resp.request_id,
                });
            }

            if resp.pdu_type == PduType::Report {
                let oid = resp
                    .varbinds
                    .first()
                    .map(|vb| vb.name.clone())
                    .unwrap_or_default();
                let retriable = oid.arcs() == usm::USM_STATS_UNKNOWN_ENGINE_IDS
                    || oid.arcs() == usm::USM_STATS_NOT_IN_TIME_WINDOWS;
                if retriable && !rediscovered {
                    // open_message already absorbed the report's engine
                    // parameters; one retry with the fresh identity.
                    log::debug!("agent sent report {oid}, retrying with updated engine state");
                    rediscovered = true;
                    continue;
                }
                return Err(Error::Report { oid });
            }

            // A downgraded (weaker-than-requested) response is not
            // acceptable for regular traffic.
            if required_flags != 0 && header.msg_flags & required_flags != required_flags {
                return Err(Error::AuthenticationFailed);
            }
            if resp.pdu_type != PduType::Response {
                return Err(Error::UnexpectedPduType(resp.pdu_type));
            }
            return Ok(resp);
        }
    }

    fn send_v3(&self, pdu: Pdu) -> Result<()> {
        let security = self.security_state()?;
        self.ensure_engine(security)?;
        let bytes = {
            let sec = lock(security);
            let scoped = self.scoped_pdu(&sec, pdu.into());
            // Traps are unacknowledged, so not reportable.
            sec.secure_message(scoped, self.next_msg_id(), self.msg_max_size, false)?
        };
        lock(&self.transport).send(&bytes)?;
        Ok(())
    }

    fn scoped_pdu(&self, sec: &SecurityParameters, pdu: SnmpPdu) -> ScopedPdu {
        let context_engine_id = if self.context_engine_id.is_empty() {
            sec.engine_id().to_vec()
        } else {
            self.context_engine_id.clone()
        };
        ScopedPdu {
            context_engine_id,
            context_name: self.context_name.clone(),
            pdu,
        }
    }

    fn security_state(&self) -> Result<&Mutex<SecurityParameters>> {
        self.security
            .as_ref()
            .ok_or_else(|| ConfigError::SecurityRequired.into())
    }

    fn ensure_engine(&self, security: &Mutex<SecurityParameters>) -> Result<()> {
        if !lock(security).discovery_required() {
            return Ok(());
        }
        let request_id = self.next_request_id();
        let probe = usm::discovery_message(self.next_msg_id(), self.msg_max_size, request_id)?;
        log::debug!("authoritative engine unknown, sending discovery probe");
        let reply = lock(&self.transport).exchange(&probe)?;
        let mut sec = lock(security);
        let (_header, params, scoped) = sec.open_message(&reply, EngineDriftPolicy::Adopt)?;
        match scoped.pdu.pdu_type() {
            PduType::Report => {
                log::debug!(
                    "discovered engine ({} bytes, boots {}, time {})",
                    params.engine_id.len(),
                    params.engine_boots,
                    params.engine_time
                );
                Ok(())
            }
            other => Err(Error::UnexpectedPduType(other)),
        }
    }

    fn accept_response(&self, pdu: SnmpPdu, request_id: u32) -> Result<Pdu> {
        match pdu {
            SnmpPdu::Generic(p) => self.accept_generic(p, request_id),
            SnmpPdu::TrapV1(_) => Err(Error::UnexpectedPduType(PduType::TrapV1)),
        }
    }

    fn accept_generic(&self, resp: Pdu, request_id: u32) -> Result<Pdu> {
        if resp.request_id != request_id {
            return Err(Error::RequestIdMismatch {
                expected: request_id,
                actual: resp.request_id,
            });
        }
        if resp.pdu_type != PduType::Response {
            return Err(Error::UnexpectedPduType(resp.pdu_type));
        }
        Ok(resp)
    }

    fn next_request_id(&self) -> u32 {
        self.request_id.fetch_add(1, Ordering::Relaxed) & 0x7FFF_FFFF
    }

    fn next_msg_id(&self) -> u32 {
        self.msg_id.fetch_add(1, Ordering::Relaxed) & 0x7FFF_FFFF
    }
}

fn nulls(oids: &[Oid]) -> Vec<VarBind> {
    oids.iter().map(|oid| VarBind::null(oid.clone())).collect()
}

fn agent_checked(pdu: Pdu) -> Result<Vec<VarBind>> {
    if pdu.error_status.is_error() {
        return Err(Error::Agent {
            status: pdu.error_status,
            index: pdu.error_index,
        });
    }
    Ok(pdu.varbinds)
}

/// Locks a mutex, recovering the guard if a panicking holder poisoned it.
fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
