//! The exchange contract the client core programs against.

use crate::error::TransportError;

/// A byte-exchange collaborator: send a fully-formed request, receive a
/// response (or fail). The core issues one exchange at a time per session
/// and never retries on its own; cancellation is modeled as an error
/// returned from here and propagated verbatim.
pub trait Transport: Send {
    /// Sends `request` and blocks for the matching response datagram.
    fn exchange(&mut self, request: &[u8]) -> Result<Vec<u8>, TransportError>;

    /// Sends `request` without waiting for a reply (trap delivery).
    fn send(&mut self, request: &[u8]) -> Result<(), TransportError>;
}
