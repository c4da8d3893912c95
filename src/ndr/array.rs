//! Uni-dimensional arrays in their conformant, varying and
//! conformant-varying forms, for both value elements and embedded unique
//! pointers.
//!
//! Header layout by kind, every field a size-dependent integer:
//!
//! | Kind              | Header fields in order          |
//! |-------------------|---------------------------------|
//! | Conformant        | MaxCount                        |
//! | Varying           | Offset, ActualCount             |
//! | ConformantVarying | MaxCount, Offset, ActualCount   |
//!
//! Marshalling always emits MaxCount = ActualCount = element count and
//! Offset = 0; unmarshalling rejects non-zero offsets. Broader
//! conformant/varying semantics are deliberately out of scope.

use core::marker::PhantomData;

use crate::error::{AlpcRpcError, Result};
use crate::stream::RwStream;

use super::pointer::NdrRawPointer;
use super::primitive::{NdrPrimitive, NdrSizeT};
use super::{NdrType, TransferSyntax};

/// Selects which header fields a uni-dimensional array carries.
pub trait ArrayKind {
    const CONFORMANT: bool;
    const VARYING: bool;
}

/// Maximum count on the wire ahead of the elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Conformant;

/// Offset and actual count on the wire ahead of the elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Varying;

/// Both of the above, max-count first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConformantVarying;

impl ArrayKind for Conformant {
    const CONFORMANT: bool = true;
    const VARYING: bool = false;
}

impl ArrayKind for Varying {
    const CONFORMANT: bool = false;
    const VARYING: bool = true;
}

impl ArrayKind for ConformantVarying {
    const CONFORMANT: bool = true;
    const VARYING: bool = true;
}

/// A uni-dimensional array of values: the kind-specific header followed by
/// the element encodings back-to-back.
#[derive(Debug, Clone, PartialEq)]
pub struct NdrUniDimensionalArray<T, K: ArrayKind> {
    elements: Vec<T>,
    kind: PhantomData<K>,
}

impl<T, K: ArrayKind> Default for NdrUniDimensionalArray<T, K> {
    fn default() -> Self {
        Self {
            elements: Vec::new(),
            kind: PhantomData,
        }
    }
}

impl<T, K: ArrayKind> NdrUniDimensionalArray<T, K> {
    pub fn new(elements: Vec<T>) -> Self {
        Self {
            elements,
            kind: PhantomData,
        }
    }

    pub fn elements(&self) -> &[T] {
        &self.elements
    }

    pub fn into_elements(self) -> Vec<T> {
        self.elements
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

impl<T, K: ArrayKind> From<Vec<T>> for NdrUniDimensionalArray<T, K> {
    fn from(elements: Vec<T>) -> Self {
        Self::new(elements)
    }
}

fn marshall_header<K: ArrayKind>(
    count: u64,
    stream: &mut RwStream,
    syntax: TransferSyntax,
) -> Result<()> {
    if K::CONFORMANT {
        NdrSizeT::from(count).marshall(stream, syntax)?;
    }
    if K::VARYING {
        NdrSizeT::from(0).marshall(stream, syntax)?;
        NdrSizeT::from(count).marshall(stream, syntax)?;
    }
    Ok(())
}

fn unmarshall_header<K: ArrayKind>(stream: &mut RwStream, syntax: TransferSyntax) -> Result<u64> {
    let mut count = 0;

    if K::CONFORMANT {
        let mut max_count = NdrSizeT::default();
        max_count.unmarshall(stream, syntax)?;
        if max_count.value() > u64::from(u32::MAX) {
            return Err(AlpcRpcError::IntegerOverflow);
        }
        count = max_count.value();
    }

    if K::VARYING {
        let mut offset = NdrSizeT::default();
        offset.unmarshall(stream, syntax)?;
        if offset.value() != 0 {
            return Err(AlpcRpcError::NotSupported);
        }

        let mut actual_count = NdrSizeT::default();
        actual_count.unmarshall(stream, syntax)?;
        if actual_count.value() > u64::from(u32::MAX) {
            return Err(AlpcRpcError::IntegerOverflow);
        }
        // ActualCount governs how many elements follow; it need not match
        // the MaxCount read above.
        count = actual_count.value();
    }

    Ok(count)
}

impl<T: NdrType + Default, K: ArrayKind> NdrType for NdrUniDimensionalArray<T, K> {
    fn marshall(&self, stream: &mut RwStream, syntax: TransferSyntax) -> Result<()> {
        if self.elements.is_empty() {
            return Err(AlpcRpcError::NoDataDetected);
        }
        let count =
            u32::try_from(self.elements.len()).map_err(|_| AlpcRpcError::IntegerOverflow)?;

        marshall_header::<K>(u64::from(count), stream, syntax)?;
        for element in &self.elements {
            element.marshall(stream, syntax)?;
        }
        Ok(())
    }

    fn unmarshall(&mut self, stream: &mut RwStream, syntax: TransferSyntax) -> Result<()> {
        self.elements.clear();

        let count = unmarshall_header::<K>(stream, syntax)?;
        for _ in 0..count {
            let mut element = T::default();
            element.unmarshall(stream, syntax)?;
            self.elements.push(element);
        }
        Ok(())
    }
}

/// A uni-dimensional array of embedded unique pointers.
///
/// The pointers are embedded and their referents deferred: the header is
/// followed by one referent token per element, then the encodings of the
/// non-null elements in order.
#[derive(Debug, Clone, PartialEq)]
pub struct NdrUniDimensionalPointerArray<T, K: ArrayKind> {
    elements: Vec<Option<T>>,
    kind: PhantomData<K>,
}

impl<T, K: ArrayKind> Default for NdrUniDimensionalPointerArray<T, K> {
    fn default() -> Self {
        Self {
            elements: Vec::new(),
            kind: PhantomData,
        }
    }
}

impl<T, K: ArrayKind> NdrUniDimensionalPointerArray<T, K> {
    pub fn new(elements: Vec<Option<T>>) -> Self {
        Self {
            elements,
            kind: PhantomData,
        }
    }

    pub fn elements(&self) -> &[Option<T>] {
        &self.elements
    }

    pub fn into_elements(self) -> Vec<Option<T>> {
        self.elements
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

impl<T, K: ArrayKind> From<Vec<Option<T>>> for NdrUniDimensionalPointerArray<T, K> {
    fn from(elements: Vec<Option<T>>) -> Self {
        Self::new(elements)
    }
}

impl<T: NdrType + Default, K: ArrayKind> NdrType for NdrUniDimensionalPointerArray<T, K> {
    fn marshall(&self, stream: &mut RwStream, syntax: TransferSyntax) -> Result<()> {
        if self.elements.is_empty() {
            return Err(AlpcRpcError::NoDataDetected);
        }

        // Null embedded referents are not supported on marshall. Tokens are
        // distinct per element so a receiver cannot mistake them for aliases.
        let mut referents = Vec::with_capacity(self.elements.len());
        for (index, element) in self.elements.iter().enumerate() {
            if element.is_none() {
                return Err(AlpcRpcError::InvalidAddress);
            }
            referents.push(NdrRawPointer::new(index as u64 + 1));
        }

        NdrUniDimensionalArray::<NdrRawPointer, K>::new(referents).marshall(stream, syntax)?;

        for element in self.elements.iter().flatten() {
            element.marshall(stream, syntax)?;
        }
        Ok(())
    }

    fn unmarshall(&mut self, stream: &mut RwStream, syntax: TransferSyntax) -> Result<()> {
        self.elements.clear();

        let mut referents = NdrUniDimensionalArray::<NdrRawPointer, K>::default();
        referents.unmarshall(stream, syntax)?;

        for referent in referents.elements() {
            if referent.is_null() {
                self.elements.push(None);
            } else {
                let mut element = T::default();
                element.unmarshall(stream, syntax)?;
                self.elements.push(Some(element));
            }
        }
        Ok(())
    }
}

/// Conformant array of values.
pub type ConformantArray<T> = NdrUniDimensionalArray<T, Conformant>;
/// Varying array of values.
pub type VaryingArray<T> = NdrUniDimensionalArray<T, Varying>;
/// Conformant-varying array of values.
pub type ConformantVaryingArray<T> = NdrUniDimensionalArray<T, ConformantVarying>;
/// Conformant array of embedded unique pointers.
pub type ConformantPointerArray<T> = NdrUniDimensionalPointerArray<T, Conformant>;
/// Varying array of embedded unique pointers.
pub type VaryingPointerArray<T> = NdrUniDimensionalPointerArray<T, Varying>;
/// Conformant-varying array of embedded unique pointers.
pub type ConformantVaryingPointerArray<T> = NdrUniDimensionalPointerArray<T, ConformantVarying>;

/// Wide strings travel as conformant-varying arrays of UTF-16 code units.
pub type NdrWstring = ConformantVaryingArray<NdrPrimitive<u16>>;
