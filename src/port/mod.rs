//! The local message-port capability consumed by the protocol engine.
//!
//! The engine is written against the [`MessagePort`] trait so the framing
//! and binding logic is independent of the OS primitive. On Windows the
//! [`AlpcPort`] implementation drives the NT ALPC system calls; tests
//! substitute scripted ports.

use crate::error::Result;

#[cfg(windows)]
mod alpc;
#[cfg(windows)]
pub mod ffi;

#[cfg(windows)]
pub use alpc::{AlpcPort, MAX_MESSAGE_SIZE};

/// One synchronous exchange's worth of reply data.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PortReply {
    /// The inline reply payload, header stripped.
    pub data: Vec<u8>,
    /// The out-of-band view payload, when the server delivered one and it
    /// could be captured. Capture is best-effort.
    pub view: Option<Vec<u8>>,
}

/// A synchronous local message port.
///
/// Exactly one disconnection is permitted; sends racing a disconnect
/// observe [`PortDisconnected`](crate::error::AlpcRpcError::PortDisconnected)
/// once it returns.
pub trait MessagePort: Sized {
    /// Opens the named local port.
    fn connect(port_name: &str) -> Result<Self>;

    /// Sends `input` framed as a port message and waits for the matched
    /// reply.
    fn send_receive(&self, input: &[u8]) -> Result<PortReply>;

    /// Waits for in-flight exchanges, then releases the port. Idempotent.
    fn disconnect(&self);
}
