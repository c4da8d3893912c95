//! The local-RPC wire frames: bind, request, response and fault.
//!
//! Layouts reproduce the rpcrt4 message bodies bit-for-bit, interior
//! padding included; every integer field is little-endian. The port-message
//! header in front of these bodies belongs to the transport and never
//! appears here.

use bitflags::bitflags;

use crate::error::{AlpcRpcError, Result};
use crate::ndr::{Guid, PlainData, TransferSyntax};

use super::SyntaxId;

/// Message-type words carried in the first 8 bytes of every frame body.
pub const MESSAGE_TYPE_REQUEST: u64 = 0;
pub const MESSAGE_TYPE_BIND: u64 = 1;
pub const MESSAGE_TYPE_FAULT: u64 = 2;
pub const MESSAGE_TYPE_RESPONSE: u64 = 3;

/// Encoded size of a bind frame body.
pub const BIND_MESSAGE_SIZE: usize = 72;
/// Encoded size of a request frame body; the marshalled in-arguments
/// follow immediately.
pub const REQUEST_MESSAGE_SIZE: usize = 64;
/// Encoded size of a response frame body ahead of the out-arguments.
pub const RESPONSE_MESSAGE_SIZE: usize = 24;
/// Minimum size of a fault frame body.
pub const FAULT_MESSAGE_SIZE: usize = 12;

bitflags! {
    /// Flag word of a request frame.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct RequestFlags: u32 {
        /// The interface UUID field is present.
        const UUID_SPECIFIED = 0x0001;
        /// The call is part of a causal flow.
        const PART_OF_FLOW = 0x0002;
        /// The in-arguments travel in a view.
        const VIEW_PRESENT = 0x0004;
    }
}

bitflags! {
    /// Flag word of a response frame.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ResponseFlags: u32 {
        /// The out-arguments travel in a view rather than inline.
        const VIEW_PRESENT = 0x0004;
    }
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}

fn read_u64(bytes: &[u8], offset: usize) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&bytes[offset..offset + 8]);
    u64::from_le_bytes(raw)
}

/// A bind request associating a (port, interface, transfer syntax) triple
/// with a binding identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BindMessage {
    pub interface: SyntaxId,
    pub syntax: TransferSyntax,
    pub bind_id: u16,
}

impl BindMessage {
    /// Encodes the frame body. The requested syntax's bind-identifier slot
    /// carries `bind_id`; the other two slots stay zero. NDR64 requests
    /// advertise multiple-syntax support, DCE requests do not.
    pub fn to_bytes(&self) -> [u8; BIND_MESSAGE_SIZE] {
        let mut bytes = [0u8; BIND_MESSAGE_SIZE];
        bytes[0..8].copy_from_slice(&MESSAGE_TYPE_BIND.to_le_bytes());
        // 8..12: BindingStatus, zero on request.
        bytes[12..28].copy_from_slice(self.interface.guid.to_le_bytes().as_ref());
        bytes[28..30].copy_from_slice(&self.interface.version.major.to_le_bytes());
        bytes[30..32].copy_from_slice(&self.interface.version.minor.to_le_bytes());
        bytes[32..36].copy_from_slice(&self.syntax.as_flags().to_le_bytes());

        let (slot, supports_multiple) = match self.syntax {
            TransferSyntax::Dce => (36, 0u32),
            TransferSyntax::Ndr64 => (38, 1u32),
        };
        bytes[slot..slot + 2].copy_from_slice(&self.bind_id.to_le_bytes());
        // 40..42: test-syntax slot, never requested. 42..44: padding.
        bytes[44..48].copy_from_slice(&supports_multiple.to_le_bytes());
        // 48..72: causal-flow support, flow id and association data, all
        // zero for local transport.
        bytes
    }

    /// Parses a bind reply, returning the server's binding status.
    pub fn parse_reply(bytes: &[u8]) -> Result<u32> {
        if bytes.len() < BIND_MESSAGE_SIZE {
            return Err(AlpcRpcError::InvalidMessage);
        }
        if read_u64(bytes, 0) != MESSAGE_TYPE_BIND {
            return Err(AlpcRpcError::InvalidMessage);
        }
        Ok(read_u32(bytes, 8))
    }
}

/// A request frame; the marshalled in-argument stream is appended right
/// after the body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestMessage {
    pub flags: RequestFlags,
    pub call_id: u32,
    pub binding_id: u32,
    pub procnum: u32,
    pub uuid: Guid,
}

impl RequestMessage {
    pub fn to_bytes(&self) -> [u8; REQUEST_MESSAGE_SIZE] {
        let mut bytes = [0u8; REQUEST_MESSAGE_SIZE];
        bytes[0..8].copy_from_slice(&MESSAGE_TYPE_REQUEST.to_le_bytes());
        bytes[8..12].copy_from_slice(&self.flags.bits().to_le_bytes());
        bytes[12..16].copy_from_slice(&self.call_id.to_le_bytes());
        bytes[16..20].copy_from_slice(&self.binding_id.to_le_bytes());
        bytes[20..24].copy_from_slice(&self.procnum.to_le_bytes());
        // 24..48: reserved word, pipe-call data and causal-flow data, all
        // zero for local transport.
        bytes[48..64].copy_from_slice(self.uuid.to_le_bytes().as_ref());
        bytes
    }
}

/// The parsed body of a response frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseMessage {
    pub flags: ResponseFlags,
    pub call_id: u32,
}

impl ResponseMessage {
    /// Parses a call reply. The leading message-type word decides the
    /// frame: a fault maps to [`FaultReceived`](AlpcRpcError::FaultReceived)
    /// carrying the server's RPC status, anything that is neither a fault
    /// nor a well-formed response is an [`InvalidMessage`](AlpcRpcError::InvalidMessage).
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 8 {
            return Err(AlpcRpcError::InvalidMessage);
        }
        match read_u64(bytes, 0) {
            MESSAGE_TYPE_FAULT => {
                if bytes.len() < FAULT_MESSAGE_SIZE {
                    return Err(AlpcRpcError::InvalidMessage);
                }
                Err(AlpcRpcError::FaultReceived(read_u32(bytes, 8)))
            }
            MESSAGE_TYPE_RESPONSE => {
                if bytes.len() < RESPONSE_MESSAGE_SIZE {
                    return Err(AlpcRpcError::InvalidMessage);
                }
                Ok(Self {
                    flags: ResponseFlags::from_bits_truncate(read_u32(bytes, 8)),
                    call_id: read_u32(bytes, 12),
                })
            }
            _ => Err(AlpcRpcError::InvalidMessage),
        }
    }
}
