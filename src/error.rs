//! Error kinds surfaced by the marshalling engine and the local RPC transport.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = core::result::Result<T, AlpcRpcError>;

/// The distinct failure kinds of the marshalling engine, the port transport
/// and the RPC protocol layer.
///
/// Octet-stream and NDR-value operations return these directly; the
/// [`MarshallBuffer`](crate::ndr::MarshallBuffer) latches the first one and
/// turns every subsequent operation into a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AlpcRpcError {
    /// The allocator refused to grow a stream.
    #[error("out of memory while growing a stream")]
    OutOfMemory,

    /// A size or cursor computation would exceed the platform width or an
    /// NDR field width.
    #[error("size or cursor computation overflowed")]
    IntegerOverflow,

    /// Deserialisation demanded more bytes than remain in the stream.
    #[error("deserialisation ran past the end of the stream")]
    BufferUnderflow,

    /// A received frame failed a header or call-id check.
    #[error("a received frame failed a header or call-id check")]
    InvalidMessage,

    /// The port handle is a sentinel value or has already been closed.
    #[error("the port handle is a sentinel or has been closed")]
    InvalidHandle,

    /// A send was attempted after the port was disconnected.
    #[error("the port has been disconnected")]
    PortDisconnected,

    /// The transfer-syntax flag word is neither DCE (1) nor NDR64 (2).
    #[error("transfer syntax {0:#x} is not recognised")]
    UnknownTransferSyntax(u32),

    /// The reduced NDR model does not cover this encoding, e.g. a varying
    /// array with a non-zero offset.
    #[error("the reduced NDR model does not cover this encoding")]
    NotSupported,

    /// An empty container was handed to a marshalling path that forbids one.
    #[error("refusing to marshall an empty container")]
    NoDataDetected,

    /// A pointer array held a null embedded referent on marshall.
    #[error("pointer arrays cannot marshall a null embedded referent")]
    InvalidAddress,

    /// The endpoint mapper returned no endpoint that could be bound.
    #[error("no endpoint returned by the mapper could be bound")]
    ConnectionRefused,

    /// The server answered with a fault frame carrying this RPC status.
    #[error("the server returned a fault frame, rpc status {0:#010x}")]
    FaultReceived(u32),

    /// The OS message-port primitive failed with a raw NTSTATUS.
    #[error("the message port primitive failed with NTSTATUS {0:#010x}")]
    NtStatus(i32),
}
