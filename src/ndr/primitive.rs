//! Primitive NDR values: fixed-width scalars, GUIDs, enumerations and the
//! size-dependent integer that diverges between the two syntaxes.

use crate::error::{AlpcRpcError, Result};
use crate::stream::RwStream;

use super::{NdrType, TransferSyntax};

/// Fixed-width plain data with a little-endian byte image.
///
/// Anything implementing this marshals identically under both syntaxes:
/// align to [`ALIGNMENT`](PlainData::ALIGNMENT), then the byte image.
pub trait PlainData: Copy + Default {
    /// Encoded size in bytes.
    const SIZE: usize;
    /// Natural alignment on the wire.
    const ALIGNMENT: usize;
    /// The byte image, `[u8; SIZE]` in every implementation.
    type Bytes: AsRef<[u8]> + AsMut<[u8]> + Default;

    fn to_le_bytes(&self) -> Self::Bytes;
    fn from_le_bytes(bytes: &Self::Bytes) -> Self;
}

macro_rules! plain_integer {
    ($($int:ty),* $(,)?) => {$(
        impl PlainData for $int {
            const SIZE: usize = size_of::<$int>();
            // Natural wire alignment of a fixed-width integer is its width,
            // independent of the host ABI.
            const ALIGNMENT: usize = size_of::<$int>();
            type Bytes = [u8; size_of::<$int>()];

            fn to_le_bytes(&self) -> Self::Bytes {
                <$int>::to_le_bytes(*self)
            }

            fn from_le_bytes(bytes: &Self::Bytes) -> Self {
                <$int>::from_le_bytes(*bytes)
            }
        }
    )*};
}

plain_integer!(u8, i8, u16, i16, u32, i32, u64, i64);

/// 128-bit interface identifier in the Windows GUID layout.
///
/// On the wire: `data1` as a little-endian u32, `data2` and `data3` as
/// little-endian u16s, then the eight `data4` bytes verbatim.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Guid {
    pub data1: u32,
    pub data2: u16,
    pub data3: u16,
    pub data4: [u8; 8],
}

impl Guid {
    /// Builds a GUID from its canonical u128 form, e.g.
    /// `Guid::from_u128(0x8a885d04_1ceb_11c9_9fe8_08002b104860)`.
    pub const fn from_u128(value: u128) -> Self {
        Self {
            data1: (value >> 96) as u32,
            data2: (value >> 80) as u16,
            data3: (value >> 64) as u16,
            data4: (value as u64).to_be_bytes(),
        }
    }
}

impl core::fmt::Display for Guid {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "{:08x}-{:04x}-{:04x}-{:02x}{:02x}-{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}",
            self.data1,
            self.data2,
            self.data3,
            self.data4[0],
            self.data4[1],
            self.data4[2],
            self.data4[3],
            self.data4[4],
            self.data4[5],
            self.data4[6],
            self.data4[7],
        )
    }
}

impl PlainData for Guid {
    const SIZE: usize = 16;
    const ALIGNMENT: usize = 4;
    type Bytes = [u8; 16];

    fn to_le_bytes(&self) -> Self::Bytes {
        let mut bytes = [0u8; 16];
        bytes[0..4].copy_from_slice(&self.data1.to_le_bytes());
        bytes[4..6].copy_from_slice(&self.data2.to_le_bytes());
        bytes[6..8].copy_from_slice(&self.data3.to_le_bytes());
        bytes[8..16].copy_from_slice(&self.data4);
        bytes
    }

    fn from_le_bytes(bytes: &Self::Bytes) -> Self {
        let mut data4 = [0u8; 8];
        data4.copy_from_slice(&bytes[8..16]);
        Self {
            data1: u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            data2: u16::from_le_bytes([bytes[4], bytes[5]]),
            data3: u16::from_le_bytes([bytes[6], bytes[7]]),
            data4,
        }
    }
}

/// A plain-data value written directly into the stream as its aligned
/// little-endian byte image. Ideal for integers, GUIDs and plain records.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct NdrPrimitive<T: PlainData> {
    data: T,
}

impl<T: PlainData> NdrPrimitive<T> {
    pub fn new(data: T) -> Self {
        Self { data }
    }

    /// The held value.
    pub fn value(&self) -> T {
        self.data
    }
}

impl<T: PlainData> From<T> for NdrPrimitive<T> {
    fn from(data: T) -> Self {
        Self { data }
    }
}

impl<T: PlainData> NdrType for NdrPrimitive<T> {
    fn marshall(&self, stream: &mut RwStream, _syntax: TransferSyntax) -> Result<()> {
        stream.serialize(self.data.to_le_bytes().as_ref(), T::ALIGNMENT)
    }

    fn unmarshall(&mut self, stream: &mut RwStream, _syntax: TransferSyntax) -> Result<()> {
        let mut bytes = T::Bytes::default();
        stream.deserialize(bytes.as_mut(), T::ALIGNMENT)?;
        self.data = T::from_le_bytes(&bytes);
        Ok(())
    }
}

/// An enumerated value with a 16-bit logical range.
///
/// NDR64 represents enumerations as 4-octet integers while DCE keeps the
/// classic 2-octet form, so the wire width follows the syntax. Reading a
/// value above 65 535 under NDR64 fails with `IntegerOverflow`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct NdrEnumeration {
    data: u16,
}

impl NdrEnumeration {
    pub fn new(data: u16) -> Self {
        Self { data }
    }

    pub fn value(&self) -> u16 {
        self.data
    }
}

impl From<u16> for NdrEnumeration {
    fn from(data: u16) -> Self {
        Self { data }
    }
}

impl NdrType for NdrEnumeration {
    fn marshall(&self, stream: &mut RwStream, syntax: TransferSyntax) -> Result<()> {
        match syntax {
            TransferSyntax::Ndr64 => {
                NdrPrimitive::from(u32::from(self.data)).marshall(stream, syntax)
            }
            TransferSyntax::Dce => NdrPrimitive::from(self.data).marshall(stream, syntax),
        }
    }

    fn unmarshall(&mut self, stream: &mut RwStream, syntax: TransferSyntax) -> Result<()> {
        match syntax {
            TransferSyntax::Ndr64 => {
                let mut wide = NdrPrimitive::<u32>::default();
                wide.unmarshall(stream, syntax)?;
                self.data =
                    u16::try_from(wide.value()).map_err(|_| AlpcRpcError::IntegerOverflow)?;
            }
            TransferSyntax::Dce => {
                let mut narrow = NdrPrimitive::<u16>::default();
                narrow.unmarshall(stream, syntax)?;
                self.data = narrow.value();
            }
        }
        Ok(())
    }
}

/// A size-like integer: 32 bits under DCE, 64 bits under NDR64.
///
/// Array headers and pointer referents are built from this type, which is
/// where the two syntaxes diverge. Marshalling a value above `u32::MAX`
/// under DCE fails with `IntegerOverflow`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct NdrSizeT {
    data: u64,
}

impl NdrSizeT {
    pub fn new(data: u64) -> Self {
        Self { data }
    }

    pub fn value(&self) -> u64 {
        self.data
    }
}

impl From<u64> for NdrSizeT {
    fn from(data: u64) -> Self {
        Self { data }
    }
}

impl NdrType for NdrSizeT {
    fn marshall(&self, stream: &mut RwStream, syntax: TransferSyntax) -> Result<()> {
        match syntax {
            TransferSyntax::Ndr64 => NdrPrimitive::from(self.data).marshall(stream, syntax),
            TransferSyntax::Dce => {
                let narrow =
                    u32::try_from(self.data).map_err(|_| AlpcRpcError::IntegerOverflow)?;
                NdrPrimitive::from(narrow).marshall(stream, syntax)
            }
        }
    }

    fn unmarshall(&mut self, stream: &mut RwStream, syntax: TransferSyntax) -> Result<()> {
        match syntax {
            TransferSyntax::Ndr64 => {
                let mut wide = NdrPrimitive::<u64>::default();
                wide.unmarshall(stream, syntax)?;
                self.data = wide.value();
            }
            TransferSyntax::Dce => {
                let mut narrow = NdrPrimitive::<u32>::default();
                narrow.unmarshall(stream, syntax)?;
                self.data = u64::from(narrow.value());
            }
        }
        Ok(())
    }
}
