//! Conversions between host strings and the wide-string wire form.

use super::array::{ConformantVarying, NdrUniDimensionalArray, NdrWstring};
use super::pointer::NdrUniquePointer;
use super::primitive::NdrPrimitive;

impl NdrUniDimensionalArray<NdrPrimitive<u16>, ConformantVarying> {
    /// Encodes a host string as UTF-16 code units, optionally appending a
    /// trailing NUL the way null-terminated protocol strings expect.
    pub fn from_str(value: &str, null_terminated: bool) -> Self {
        let mut units: Vec<NdrPrimitive<u16>> = value.encode_utf16().map(Into::into).collect();
        if null_terminated {
            units.push(0u16.into());
        }
        Self::new(units)
    }

    /// Decodes back into a host string, dropping any trailing NULs.
    pub fn to_string_lossy(&self) -> String {
        let mut units: Vec<u16> = self.elements().iter().map(|unit| unit.value()).collect();
        while units.last() == Some(&0) {
            units.pop();
        }
        String::from_utf16_lossy(&units)
    }
}

/// A possibly-null protocol string: `None` travels as a null unique
/// pointer.
pub fn unique_wstring(value: Option<&str>, null_terminated: bool) -> NdrUniquePointer<NdrWstring> {
    match value {
        Some(value) => NdrUniquePointer::new(NdrWstring::from_str(value, null_terminated)),
        None => NdrUniquePointer::null(),
    }
}
