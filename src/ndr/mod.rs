//! The NDR value model shared by the DCE and NDR64 transfer syntaxes.
//!
//! Every serialisable value implements [`NdrType`], the two-method
//! capability that replaces dynamic dispatch in classic marshalling stacks:
//! one function per direction, parameterised by the active
//! [`TransferSyntax`]. Values never share ownership of their contents; an
//! array owns its elements and a unique pointer owns its referent.

mod array;
mod buffer;
mod pointer;
mod primitive;
mod records;
mod string;

pub use array::{
    ArrayKind, Conformant, ConformantArray, ConformantPointerArray, ConformantVarying,
    ConformantVaryingArray, ConformantVaryingPointerArray, NdrUniDimensionalArray,
    NdrUniDimensionalPointerArray, NdrWstring, Varying, VaryingArray, VaryingPointerArray,
};
pub use buffer::MarshallBuffer;
pub use pointer::{NdrRawPointer, NdrUniquePointer};
pub use primitive::{Guid, NdrEnumeration, NdrPrimitive, NdrSizeT, PlainData};
pub use records::{ContextHandle, RpcInfo, RpcSid, RpcUnicodeString, SID_MAX_SUB_AUTHORITIES};
pub use string::unique_wstring;

use crate::error::{AlpcRpcError, Result};
use crate::stream::RwStream;

/// Transfer-syntax flag word used by the local RPC runtime.
///
/// The discriminants are the wire values carried in bind frames: 1 selects
/// the classic 32-bit DCE-NDR encoding, 2 selects NDR64. The reserved test
/// syntax (4) is never a valid engine syntax.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferSyntax {
    /// Classic 32-bit DCE-NDR.
    Dce = 1,
    /// The 64-bit NDR64 dialect.
    Ndr64 = 2,
}

impl TransferSyntax {
    /// Interprets a wire flag word, rejecting everything that is not a
    /// recognised syntax.
    pub fn from_flags(flags: u32) -> Result<Self> {
        match flags {
            1 => Ok(TransferSyntax::Dce),
            2 => Ok(TransferSyntax::Ndr64),
            other => Err(AlpcRpcError::UnknownTransferSyntax(other)),
        }
    }

    /// The flag word preserved bit-for-bit into wire headers.
    pub fn as_flags(self) -> u32 {
        self as u32
    }

    /// Alignment of structured records, which follow the largest scalar
    /// the syntax can carry.
    pub fn record_alignment(self) -> usize {
        match self {
            TransferSyntax::Dce => 4,
            TransferSyntax::Ndr64 => 8,
        }
    }
}

/// A value that can be marshalled into and unmarshalled from an octet
/// stream under either transfer syntax.
pub trait NdrType {
    /// Serialises the value into `stream`.
    fn marshall(&self, stream: &mut RwStream, syntax: TransferSyntax) -> Result<()>;

    /// Deserialises the value from `stream`, replacing the current
    /// contents.
    fn unmarshall(&mut self, stream: &mut RwStream, syntax: TransferSyntax) -> Result<()>;
}
