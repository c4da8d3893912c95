//! Pointer encodings: the raw referent token and the unique (non-aliased)
//! top-level pointer.

use crate::error::Result;
use crate::stream::RwStream;

use super::primitive::NdrSizeT;
use super::{NdrType, TransferSyntax};

/// An opaque referent token, encoded as a [`NdrSizeT`].
///
/// Zero encodes a null pointer. A non-zero value identifies a referent and
/// is never dereferenced; marshalled referents are placeholders rather
/// than live addresses, so nothing about the sender's address space leaks
/// onto the wire.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct NdrRawPointer {
    token: u64,
}

impl NdrRawPointer {
    /// The null referent.
    pub const NULL: Self = Self { token: 0 };

    pub fn new(token: u64) -> Self {
        Self { token }
    }

    pub fn is_null(&self) -> bool {
        self.token == 0
    }

    pub fn token(&self) -> u64 {
        self.token
    }
}

impl From<u64> for NdrRawPointer {
    fn from(token: u64) -> Self {
        Self { token }
    }
}

impl NdrType for NdrRawPointer {
    fn marshall(&self, stream: &mut RwStream, syntax: TransferSyntax) -> Result<()> {
        NdrSizeT::from(self.token).marshall(stream, syntax)
    }

    fn unmarshall(&mut self, stream: &mut RwStream, syntax: TransferSyntax) -> Result<()> {
        let mut token = NdrSizeT::default();
        token.unmarshall(stream, syntax)?;
        self.token = token.value();
        Ok(())
    }
}

/// A unique pointer serialised as a top-level pointer.
///
/// A null pointer is a zero referent and nothing else. A non-null pointer
/// is a non-zero referent immediately followed by the referent's encoding.
/// Unique pointers cannot be aliases, so no referent bookkeeping is needed
/// across values.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct NdrUniquePointer<T> {
    data: Option<T>,
}

impl<T> NdrUniquePointer<T> {
    /// A null pointer.
    pub fn null() -> Self {
        Self { data: None }
    }

    /// A pointer holding `data`.
    pub fn new(data: T) -> Self {
        Self { data: Some(data) }
    }

    /// Borrow of the held value, if any.
    pub fn as_ref(&self) -> Option<&T> {
        self.data.as_ref()
    }

    pub fn is_null(&self) -> bool {
        self.data.is_none()
    }

    /// Consumes the pointer, returning the held value.
    pub fn into_inner(self) -> Option<T> {
        self.data
    }
}

impl<T> From<Option<T>> for NdrUniquePointer<T> {
    fn from(data: Option<T>) -> Self {
        Self { data }
    }
}

impl<T: NdrType + Default> NdrType for NdrUniquePointer<T> {
    fn marshall(&self, stream: &mut RwStream, syntax: TransferSyntax) -> Result<()> {
        match &self.data {
            None => NdrRawPointer::NULL.marshall(stream, syntax),
            Some(data) => {
                // Any non-zero token will do; the receiver treats it as opaque.
                NdrRawPointer::new(1).marshall(stream, syntax)?;
                data.marshall(stream, syntax)
            }
        }
    }

    fn unmarshall(&mut self, stream: &mut RwStream, syntax: TransferSyntax) -> Result<()> {
        self.data = None;

        let mut referent = NdrRawPointer::default();
        referent.unmarshall(stream, syntax)?;
        if referent.is_null() {
            return Ok(());
        }

        let mut data = T::default();
        data.unmarshall(stream, syntax)?;
        self.data = Some(data);
        Ok(())
    }
}
