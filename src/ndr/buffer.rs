//! The failure-sticky chaining wrapper around an octet stream.

use log::debug;

use crate::error::Result;
use crate::stream::RwStream;

use super::{NdrType, TransferSyntax};

/// Chains marshalling and unmarshalling operations over one octet stream
/// under one transfer syntax.
///
/// Once any operation fails, the first error is latched: every subsequent
/// operation is a no-op that leaves the byte content unchanged, and
/// [`status`](Self::status) keeps reporting the initial failure. The buffer
/// is purely a codec; it owns no transport.
#[derive(Debug)]
pub struct MarshallBuffer {
    stream: RwStream,
    syntax: TransferSyntax,
    status: Result<()>,
}

impl MarshallBuffer {
    /// An empty buffer for the given syntax.
    pub fn new(syntax: TransferSyntax) -> Self {
        Self {
            stream: RwStream::new(),
            syntax,
            status: Ok(()),
        }
    }

    /// An empty buffer for a wire flag word. An unrecognised flag latches
    /// `UnknownTransferSyntax` up front, so every operation no-ops.
    pub fn with_flags(flags: u32) -> Self {
        match TransferSyntax::from_flags(flags) {
            Ok(syntax) => Self::new(syntax),
            Err(error) => Self {
                stream: RwStream::new(),
                syntax: TransferSyntax::Dce,
                status: Err(error),
            },
        }
    }

    /// Serialises `object` into the stream. Chainable.
    pub fn marshall(&mut self, object: &dyn NdrType) -> &mut Self {
        if self.status.is_ok() {
            self.status = object.marshall(&mut self.stream, self.syntax);
            if let Err(error) = self.status {
                debug!("marshalling failed: {error}");
            }
        }
        self
    }

    /// Deserialises `object` from the stream. Chainable.
    pub fn unmarshall(&mut self, object: &mut dyn NdrType) -> &mut Self {
        if self.status.is_ok() {
            self.status = object.unmarshall(&mut self.stream, self.syntax);
            if let Err(error) = self.status {
                debug!("unmarshalling failed: {error}");
            }
        }
        self
    }

    /// Appends raw bytes with no alignment. Chainable.
    pub fn marshall_raw(&mut self, bytes: &[u8]) -> &mut Self {
        if self.status.is_ok() {
            self.status = self.stream.serialize_raw(bytes);
        }
        self
    }

    /// `Ok` while every operation so far succeeded, otherwise the first
    /// failure. A failed buffer's contents must be considered corrupted.
    pub fn status(&self) -> Result<()> {
        self.status
    }

    /// Borrowed view of the accumulated bytes.
    pub fn bytes(&self) -> &[u8] {
        self.stream.buffer()
    }

    /// The transfer syntax this buffer encodes with.
    pub fn syntax(&self) -> TransferSyntax {
        self.syntax
    }
}
