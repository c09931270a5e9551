//! Iterative MIB-tree traversal over GetNext or GetBulk.
//!
//! Each round requests the successors of the last OID received; the
//! traversal ends when the agent signals an error-status, returns an
//! exception varbind, leaves the requested subtree, or answers with
//! nothing. Every returned OID must be strictly greater than the
//! request start of its round, or the walk aborts rather than loop
//! forever against a broken agent (the `"c"` application option turns
//! that abort into a logged shrug).

use rsnmp_msg::{Oid, Pdu, PduType, Value, VarBind};

use crate::client::Client;
use crate::error::{Error, Result};

/// Root used when the caller passes an empty root or `"."`: the IANA
/// `internet` arc.
pub const DEFAULT_WALK_ROOT: &str = ".1.3.6.1";

/// Receives each in-range varbind of a walk. A failure halts the
/// traversal and surfaces to the caller unchanged.
pub trait WalkVisitor {
    fn visit(&mut self, varbind: &VarBind) -> Result<()>;
}

impl<F> WalkVisitor for F
where
    F: FnMut(&VarBind) -> Result<()>,
{
    fn visit(&mut self, varbind: &VarBind) -> Result<()> {
        self(varbind)
    }
}

/// Traversal flavor: one varbind per round, or up to `max_repetitions`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkMode {
    GetNext,
    GetBulk(u32),
}

pub(crate) fn walk(
    client: &Client,
    root: &str,
    mode: WalkMode,
    visitor: &mut dyn WalkVisitor,
) -> Result<()> {
    let root = normalize_root(root)?;
    let tolerate_non_increasing = client.app_option("c");
    let mut current = root.clone();
    let mut first_round = true;

    loop {
        let pdu = request_round(client, mode, &current)?;
        if pdu.error_status.is_error() {
            log::debug!(
                "walk of {root} stopped: agent returned {} at index {}",
                pdu.error_status,
                pdu.error_index
            );
            return Ok(());
        }
        if pdu.varbinds.is_empty() {
            log::debug!("walk of {root} stopped: response carries no varbinds");
            return Ok(());
        }

        let request_start = current.clone();
        for (index, vb) in pdu.varbinds.iter().enumerate() {
            if vb.value.is_exception() {
                log::debug!("walk of {root} stopped: {} on {}", exception_name(&vb.value), vb.name);
                return Ok(());
            }
            if !vb.name.is_descendant_of(&root) {
                // A root that names a scalar leaf makes the very first
                // answer land on the root itself or past the subtree;
                // degrade to a plain Get of the root.
                if first_round && index == 0 {
                    log::debug!("walk root {root} looks like a leaf object, degrading to a single get");
                    return leaf_get(client, &root, visitor);
                }
                log::debug!("walk of {root} stopped: {} is outside the subtree", vb.name);
                return Ok(());
            }
            if vb.name <= request_start {
                if tolerate_non_increasing {
                    log::debug!(
                        "walk of {root}: tolerating non-increasing OID {} (app option c)",
                        vb.name
                    );
                } else {
                    return Err(Error::OidNotIncreasing {
                        previous: request_start,
                        current: vb.name.clone(),
                    });
                }
            }

            visitor.visit(vb)?;
            current = vb.name.clone();
        }
        first_round = false;
    }
}

fn request_round(client: &Client, mode: WalkMode, start: &Oid) -> Result<Pdu> {
    let varbinds = vec![VarBind::null(start.clone())];
    match mode {
        WalkMode::GetNext => client.round(PduType::GetNextRequest, varbinds, 0, 0),
        WalkMode::GetBulk(max_repetitions) => client.round(
            PduType::GetBulkRequest,
            varbinds,
            0,
            max_repetitions.max(1),
        ),
    }
}

/// The leaf-OID fallback: one Get on the root, delivering its varbind if
/// the agent has it.
fn leaf_get(client: &Client, root: &Oid, visitor: &mut dyn WalkVisitor) -> Result<()> {
    let pdu = client.round(PduType::GetRequest, vec![VarBind::null(root.clone())], 0, 0)?;
    if pdu.error_status.is_error() {
        log::debug!(
            "leaf get of {root} stopped: agent returned {}",
            pdu.error_status
        );
        return Ok(());
    }
    if let Some(vb) = pdu.varbinds.first() {
        if !vb.value.is_exception() {
            visitor.visit(vb)?;
        }
    }
    Ok(())
}

/// Normalizes a textual root: empty or `"."` means the `internet` arc,
/// and a missing leading dot is tolerated.
fn normalize_root(root: &str) -> Result<Oid> {
    let trimmed = root.trim();
    if trimmed.is_empty() || trimmed == "." {
        return Ok(DEFAULT_WALK_ROOT.parse()?);
    }
    Ok(trimmed.parse()?)
}

fn exception_name(value: &Value) -> &'static str {
    match value {
        Value::NoSuchObject => "noSuchObject",
        Value::NoSuchInstance => "noSuchInstance",
        Value::EndOfMibView => "endOfMibView",
        _ => "value",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_and_dot_roots_normalize_to_internet() {
        assert_eq!(normalize_root("").unwrap(), ".1.3.6.1".parse().unwrap());
        assert_eq!(normalize_root(".").unwrap(), ".1.3.6.1".parse().unwrap());
        assert_eq!(normalize_root(" . ").unwrap(), ".1.3.6.1".parse().unwrap());
    }

    #[test]
    fn leading_dot_is_optional() {
        assert_eq!(
            normalize_root("1.3.6.1.2.1").unwrap(),
            normalize_root(".1.3.6.1.2.1").unwrap()
        );
    }
}
