//! Shared test doubles: a scripted transport and a miniature in-process
//! agent that answers from a sorted (OID, value) table.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use rsnmp::transport::{Transport, TransportError};
use rsnmp::{CommunityMessage, ErrorStatus, Oid, Pdu, PduType, SnmpPdu, Value, VarBind};

/// A [`Transport`] that hands every request to a closure and records the
/// raw bytes it saw, so tests can assert on the wire traffic afterwards.
pub struct ScriptedTransport<F> {
    handler: F,
    sent: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl<F> ScriptedTransport<F>
where
    F: FnMut(&[u8]) -> Vec<u8> + Send,
{
    pub fn new(handler: F) -> (ScriptedTransport<F>, Arc<Mutex<Vec<Vec<u8>>>>) {
        let sent = Arc::new(Mutex::new(Vec::new()));
        (
            ScriptedTransport {
                handler,
                sent: sent.clone(),
            },
            sent,
        )
    }
}

impl<F> Transport for ScriptedTransport<F>
where
    F: FnMut(&[u8]) -> Vec<u8> + Send,
{
    fn exchange(&mut self, request: &[u8]) -> Result<Vec<u8>, TransportError> {
        self.sent.lock().unwrap().push(request.to_vec());
        Ok((self.handler)(request))
    }

    fn send(&mut self, request: &[u8]) -> Result<(), TransportError> {
        self.sent.lock().unwrap().push(request.to_vec());
        Ok(())
    }
}

/// A sorted MIB table the fake agent serves from.
pub type MibTable = Vec<(Oid, Value)>;

pub fn table(entries: &[(&str, Value)]) -> MibTable {
    let mut rows: MibTable = entries
        .iter()
        .map(|(oid, value)| (oid.parse().unwrap(), value.clone()))
        .collect();
    rows.sort_by(|a, b| a.0.cmp(&b.0));
    rows
}

/// Answers one request PDU from the table, with Get, GetNext and GetBulk
/// semantics faithful enough for walk testing.
pub fn answer_pdu(table: &MibTable, pdu: &Pdu) -> Pdu {
    let varbinds = match pdu.pdu_type {
        PduType::GetRequest => pdu
            .varbinds
            .iter()
            .map(|vb| match table.iter().find(|(oid, _)| *oid == vb.name) {
                Some((oid, value)) => VarBind::new(oid.clone(), value.clone()),
                None => VarBind::new(vb.name.clone(), Value::NoSuchInstance),
            })
            .collect(),
        PduType::GetNextRequest => pdu
            .varbinds
            .iter()
            .map(|vb| successor(table, &vb.name))
            .collect(),
        PduType::GetBulkRequest => {
            let mut out = Vec::new();
            for vb in &pdu.varbinds {
                let mut cursor = vb.name.clone();
                for _ in 0..pdu.max_repetitions.max(1) {
                    let next = successor(table, &cursor);
                    cursor = next.name.clone();
                    let done = next.value == Value::EndOfMibView;
                    out.push(next);
                    if done {
                        break;
                    }
                }
            }
            out
        }
        // Writes and informs are acknowledged by echoing the varbinds.
        PduType::SetRequest | PduType::InformRequest => pdu.varbinds.clone(),
        other => panic!("agent cannot answer {other}"),
    };
    Pdu {
        pdu_type: PduType::Response,
        request_id: pdu.request_id,
        error_status: ErrorStatus::NoError,
        error_index: 0,
        non_repeaters: 0,
        max_repetitions: 0,
        varbinds,
    }
}

/// Answers one community-message request from the table.
pub fn respond_from_table(table: &MibTable, request: &[u8]) -> Vec<u8> {
    let msg = CommunityMessage::unmarshal(request).expect("agent received garbage");
    let pdu = match msg.pdu {
        SnmpPdu::Generic(pdu) => pdu,
        SnmpPdu::TrapV1(_) => panic!("agent received a trap"),
    };
    CommunityMessage {
        version: msg.version,
        community: msg.community,
        pdu: answer_pdu(table, &pdu).into(),
    }
    .marshal()
    .unwrap()
}

fn successor(table: &MibTable, start: &Oid) -> VarBind {
    match table.iter().find(|(oid, _)| oid > start) {
        Some((oid, value)) => VarBind::new(oid.clone(), value.clone()),
        None => VarBind::new(start.clone(), Value::EndOfMibView),
    }
}

/// A v2c client wired straight to a table-serving agent.
pub fn table_client(rows: MibTable) -> rsnmp::Client {
    table_client_with(rows, rsnmp::ClientConfig::default())
}

pub fn table_client_with(rows: MibTable, config: rsnmp::ClientConfig) -> rsnmp::Client {
    let (transport, _sent) = ScriptedTransport::new(move |req: &[u8]| {
        respond_from_table(&rows, req)
    });
    rsnmp::Client::with_transport(config, Box::new(transport)).unwrap()
}

/// Convenience: the system subtree most tests walk over.
pub fn system_table() -> MibTable {
    table(&[
        (
            ".1.3.6.1.2.1.1.1.0",
            Value::OctetString(b"Linux gw-core-1 6.6.0".to_vec()),
        ),
        (
            ".1.3.6.1.2.1.1.2.0",
            Value::ObjectIdentifier(".1.3.6.1.4.1.8072.3.2.10".parse().unwrap()),
        ),
        (".1.3.6.1.2.1.1.3.0", Value::TimeTicks(970_069)),
        (
            ".1.3.6.1.2.1.1.5.0",
            Value::OctetString(b"gw-core-1".to_vec()),
        ),
        (".1.3.6.1.2.1.2.1.0", Value::Integer(3)),
    ])
}

pub fn names(varbinds: &[VarBind]) -> Vec<String> {
    varbinds.iter().map(|vb| vb.name.to_string()).collect()
}
