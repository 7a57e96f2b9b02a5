//! Fill values.
//!
//! The fill value of an array is the logical value of every element which has not been written.

use super::element::Element;

/// The fill value of an array.
///
/// Holds one element in the in-memory representation of the array data type.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct FillValue(Vec<u8>);

impl core::fmt::Display for FillValue {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

impl From<Vec<u8>> for FillValue {
    fn from(value: Vec<u8>) -> Self {
        FillValue(value)
    }
}

impl From<bool> for FillValue {
    fn from(value: bool) -> Self {
        FillValue(vec![u8::from(value)])
    }
}

impl<T: Element> From<T> for FillValue {
    fn from(value: T) -> Self {
        FillValue(bytemuck::bytes_of(&value).to_vec())
    }
}

impl FillValue {
    /// Create a new fill value composed of `bytes`.
    #[must_use]
    pub fn new(bytes: Vec<u8>) -> FillValue {
        FillValue(bytes)
    }

    /// Returns the size in bytes of the fill value.
    #[must_use]
    pub fn size(&self) -> usize {
        self.0.len()
    }

    /// Return the byte representation of the fill value.
    #[must_use]
    pub fn as_ne_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Interpret the fill value as an element of type `T`, if sizes match.
    #[must_use]
    pub fn as_element<T: Element>(&self) -> Option<T> {
        (self.0.len() == std::mem::size_of::<T>()).then(|| bytemuck::pod_read_unaligned(&self.0))
    }

    /// Check if the bytes are equal to a sequence of the fill value.
    #[must_use]
    pub fn equals_all(&self, bytes: &[u8]) -> bool {
        if self.0.is_empty() || bytes.len() % self.0.len() != 0 {
            return false;
        }
        if self.0.iter().all(|b| *b == self.0[0]) {
            let first = self.0[0];
            bytes.iter().all(|b| *b == first)
        } else {
            bytes.chunks_exact(self.0.len()).all(|element| element == self.0)
        }
    }

    /// Return `num_elements` repetitions of the fill value.
    #[must_use]
    pub fn repeat(&self, num_elements: usize) -> Vec<u8> {
        self.0.repeat(num_elements)
    }
}
