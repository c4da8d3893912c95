//! Structured records used by the RPC service interfaces.
//!
//! Records align to the largest scalar the active syntax carries (4 under
//! DCE, 8 under NDR64) and then marshal their members in declaration
//! order.

use crate::error::{AlpcRpcError, Result};
use crate::stream::RwStream;

use super::array::NdrWstring;
use super::pointer::NdrUniquePointer;
use super::primitive::{Guid, NdrPrimitive, NdrSizeT, PlainData};
use super::{NdrType, TransferSyntax};

/// An RPC context handle: a 20-byte plain record of an attributes word and
/// a GUID, marshalled like any other primitive with 4-byte alignment under
/// both syntaxes.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ContextHandle {
    pub attributes: u32,
    pub uuid: Guid,
}

impl PlainData for ContextHandle {
    const SIZE: usize = 20;
    const ALIGNMENT: usize = 4;
    type Bytes = [u8; 20];

    fn to_le_bytes(&self) -> Self::Bytes {
        let mut bytes = [0u8; 20];
        bytes[0..4].copy_from_slice(&self.attributes.to_le_bytes());
        bytes[4..20].copy_from_slice(self.uuid.to_le_bytes().as_ref());
        bytes
    }

    fn from_le_bytes(bytes: &Self::Bytes) -> Self {
        let mut uuid = [0u8; 16];
        uuid.copy_from_slice(&bytes[4..20]);
        Self {
            attributes: u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            uuid: Guid::from_le_bytes(&uuid),
        }
    }
}

/// The event service's RpcInfo record: error, sub-error and sub-error
/// parameter words.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RpcInfo {
    error: NdrPrimitive<u32>,
    sub_error: NdrPrimitive<u32>,
    sub_error_param: NdrPrimitive<u32>,
}

impl RpcInfo {
    pub fn new(error: u32, sub_error: u32, sub_error_param: u32) -> Self {
        Self {
            error: error.into(),
            sub_error: sub_error.into(),
            sub_error_param: sub_error_param.into(),
        }
    }

    pub fn error(&self) -> u32 {
        self.error.value()
    }
}

impl NdrType for RpcInfo {
    fn marshall(&self, stream: &mut RwStream, syntax: TransferSyntax) -> Result<()> {
        stream.align_for_write(syntax.record_alignment())?;
        self.error.marshall(stream, syntax)?;
        self.sub_error.marshall(stream, syntax)?;
        self.sub_error_param.marshall(stream, syntax)
    }

    fn unmarshall(&mut self, stream: &mut RwStream, syntax: TransferSyntax) -> Result<()> {
        stream.align_for_read(syntax.record_alignment())?;
        self.error.unmarshall(stream, syntax)?;
        self.sub_error.unmarshall(stream, syntax)?;
        self.sub_error_param.unmarshall(stream, syntax)
    }
}

/// Wrapper over RPC_UNICODE_STRING: byte length, maximum byte length, and
/// a unique pointer to the counted wide string.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct RpcUnicodeString {
    length: NdrPrimitive<u16>,
    maximum_length: NdrPrimitive<u16>,
    buffer: NdrUniquePointer<NdrWstring>,
}

impl RpcUnicodeString {
    /// Wraps an already-encoded buffer, deriving both length fields from
    /// it.
    pub fn new(buffer: NdrUniquePointer<NdrWstring>) -> Self {
        let byte_length = buffer.as_ref().map_or(0, |string| string.len() * 2) as u16;
        Self {
            length: byte_length.into(),
            maximum_length: byte_length.into(),
            buffer,
        }
    }

    /// Encodes a host string without a trailing NUL, the counted-string
    /// convention.
    pub fn from_str(value: &str) -> Self {
        Self::new(NdrUniquePointer::new(NdrWstring::from_str(value, false)))
    }

    pub fn to_string_lossy(&self) -> String {
        self.buffer
            .as_ref()
            .map(NdrWstring::to_string_lossy)
            .unwrap_or_default()
    }
}

impl NdrType for RpcUnicodeString {
    fn marshall(&self, stream: &mut RwStream, syntax: TransferSyntax) -> Result<()> {
        stream.align_for_write(syntax.record_alignment())?;
        self.length.marshall(stream, syntax)?;
        self.maximum_length.marshall(stream, syntax)?;
        self.buffer.marshall(stream, syntax)
    }

    fn unmarshall(&mut self, stream: &mut RwStream, syntax: TransferSyntax) -> Result<()> {
        stream.align_for_read(syntax.record_alignment())?;
        self.length.unmarshall(stream, syntax)?;
        self.maximum_length.unmarshall(stream, syntax)?;
        self.buffer.unmarshall(stream, syntax)
    }
}

/// Upper bound on sub-authorities in an RPC_SID.
pub const SID_MAX_SUB_AUTHORITIES: usize = 15;

/// Wrapper over RPC_SID. The record is conformant: the sub-authority count
/// travels once as the conformance ahead of the fixed members.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RpcSid {
    revision: NdrPrimitive<u8>,
    sub_authority_count: NdrPrimitive<u8>,
    identifier_authority: [NdrPrimitive<u8>; 6],
    sub_authorities: Vec<NdrPrimitive<u32>>,
}

impl RpcSid {
    pub fn new(revision: u8, identifier_authority: [u8; 6], sub_authorities: &[u32]) -> Self {
        Self {
            revision: revision.into(),
            sub_authority_count: (sub_authorities.len() as u8).into(),
            identifier_authority: identifier_authority.map(Into::into),
            sub_authorities: sub_authorities.iter().copied().map(Into::into).collect(),
        }
    }

    pub fn revision(&self) -> u8 {
        self.revision.value()
    }

    pub fn sub_authorities(&self) -> Vec<u32> {
        self.sub_authorities.iter().map(|value| value.value()).collect()
    }
}

impl NdrType for RpcSid {
    fn marshall(&self, stream: &mut RwStream, syntax: TransferSyntax) -> Result<()> {
        stream.align_for_write(syntax.record_alignment())?;

        // The conformance of the trailing array precedes the record.
        let conformance = self.sub_authorities.len() as u64;
        NdrSizeT::from(conformance).marshall(stream, syntax)?;

        self.revision.marshall(stream, syntax)?;
        self.sub_authority_count.marshall(stream, syntax)?;
        for byte in &self.identifier_authority {
            byte.marshall(stream, syntax)?;
        }
        for sub_authority in &self.sub_authorities {
            sub_authority.marshall(stream, syntax)?;
        }
        Ok(())
    }

    fn unmarshall(&mut self, stream: &mut RwStream, syntax: TransferSyntax) -> Result<()> {
        stream.align_for_read(syntax.record_alignment())?;

        let mut conformance = NdrSizeT::default();
        conformance.unmarshall(stream, syntax)?;
        if conformance.value() > SID_MAX_SUB_AUTHORITIES as u64 {
            return Err(AlpcRpcError::NotSupported);
        }

        self.revision.unmarshall(stream, syntax)?;
        self.sub_authority_count.unmarshall(stream, syntax)?;
        for byte in &mut self.identifier_authority {
            byte.unmarshall(stream, syntax)?;
        }

        self.sub_authorities.clear();
        for _ in 0..conformance.value() {
            let mut sub_authority = NdrPrimitive::<u32>::default();
            sub_authority.unmarshall(stream, syntax)?;
            self.sub_authorities.push(sub_authority);
        }
        Ok(())
    }
}
