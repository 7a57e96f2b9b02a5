//! The bytes stage: maps in-memory elements to their stored representation.
//!
//! Stored elements are packed: the leaves of a compound type (numbers and fixed-width strings) are laid
//! out one after the other in component order, without the padding of the in-memory layout.
//! Each multi-byte leaf is stored in the byte order declared for it.

use crate::array::{
    endianness::reverse_words, DataTypeError, Endianness, ExtendedDataType, TextWidth,
};

/// A leaf of an element: a number, the base of an enumeration, or a fixed-width string.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
struct Leaf {
    memory_offset: usize,
    storage_offset: usize,
    size: usize,
    /// The word size whose bytes are reversed between memory and storage, `1` if none.
    swap_unit: usize,
}

/// The mapping between the in-memory and stored representation of elements of a data type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StorageLayout {
    leaves: Vec<Leaf>,
    memory_size: usize,
    storage_size: usize,
    identity: bool,
}

impl StorageLayout {
    /// Create the layout of `data_type` given the byte order of each of its leaves, depth first.
    ///
    /// A leaf without a byte order, or beyond the end of `leaf_endianness`, is stored in native byte order.
    ///
    /// # Errors
    /// Returns [`DataTypeError::VariableSize`] if `data_type` contains a variable-length string.
    pub fn new(
        data_type: &ExtendedDataType,
        leaf_endianness: &[Option<Endianness>],
    ) -> Result<Self, DataTypeError> {
        let mut endianness = leaf_endianness.iter().copied();
        Self::build(data_type, &mut || endianness.next().flatten())
    }

    /// Create the layout of `data_type` with every leaf stored in `endianness`.
    ///
    /// # Errors
    /// Returns [`DataTypeError::VariableSize`] if `data_type` contains a variable-length string.
    pub fn uniform(
        data_type: &ExtendedDataType,
        endianness: Endianness,
    ) -> Result<Self, DataTypeError> {
        Self::build(data_type, &mut || Some(endianness))
    }

    fn build(
        data_type: &ExtendedDataType,
        next_endianness: &mut dyn FnMut() -> Option<Endianness>,
    ) -> Result<Self, DataTypeError> {
        let memory_size = data_type.fixed_size()?;
        let mut leaves = Vec::new();
        let mut storage_size = 0;
        Self::walk(data_type, 0, &mut storage_size, &mut leaves, next_endianness)?;
        let identity = memory_size == storage_size
            && leaves
                .iter()
                .all(|leaf| leaf.memory_offset == leaf.storage_offset && leaf.swap_unit == 1);
        Ok(Self {
            leaves,
            memory_size,
            storage_size,
            identity,
        })
    }

    fn walk(
        data_type: &ExtendedDataType,
        memory_offset: usize,
        storage_offset: &mut usize,
        leaves: &mut Vec<Leaf>,
        next_endianness: &mut dyn FnMut() -> Option<Endianness>,
    ) -> Result<(), DataTypeError> {
        let (size, unit) = match data_type {
            ExtendedDataType::Numeric(numeric) => (numeric.size(), numeric.swap_unit()),
            ExtendedDataType::Enum(enumeration) => {
                (enumeration.base().size(), enumeration.base().swap_unit())
            }
            ExtendedDataType::String(string) => {
                let size = data_type.fixed_size()?;
                match string.width() {
                    TextWidth::Ascii => (size, 1),
                    TextWidth::Ucs4 => (size, 4),
                }
            }
            ExtendedDataType::Compound(compound) => {
                for component in compound.components() {
                    Self::walk(
                        component.data_type(),
                        memory_offset + component.offset(),
                        storage_offset,
                        leaves,
                        next_endianness,
                    )?;
                }
                return Ok(());
            }
        };
        let swap_unit = match next_endianness() {
            Some(endianness) if !endianness.is_native() => unit,
            _ => 1,
        };
        leaves.push(Leaf {
            memory_offset,
            storage_offset: *storage_offset,
            size,
            swap_unit,
        });
        *storage_offset += size;
        Ok(())
    }

    /// The size in bytes of an element in memory.
    #[must_use]
    pub const fn memory_size(&self) -> usize {
        self.memory_size
    }

    /// The size in bytes of a stored element.
    #[must_use]
    pub const fn storage_size(&self) -> usize {
        self.storage_size
    }

    /// Returns true if the stored representation equals the in-memory representation.
    #[must_use]
    pub const fn is_identity(&self) -> bool {
        self.identity
    }

    /// Returns the foreign byte order if any leaf is byte swapped, otherwise the native byte order.
    #[must_use]
    pub fn endianness(&self) -> Endianness {
        let native = crate::array::NATIVE_ENDIAN;
        if self.leaves.iter().any(|leaf| leaf.swap_unit > 1) {
            match native {
                Endianness::Little => Endianness::Big,
                Endianness::Big => Endianness::Little,
            }
        } else {
            native
        }
    }

    /// Encode elements from their in-memory representation.
    ///
    /// `memory` must hold a whole number of elements.
    #[must_use]
    pub fn encode(&self, memory: Vec<u8>) -> Vec<u8> {
        if self.identity || self.memory_size == 0 {
            return memory;
        }
        if let [leaf] = self.leaves.as_slice() {
            if leaf.size == self.memory_size && leaf.size == self.storage_size {
                let mut memory = memory;
                reverse_words(&mut memory, leaf.swap_unit);
                return memory;
            }
        }
        let num_elements = memory.len() / self.memory_size.max(1);
        let mut storage = vec![0; num_elements * self.storage_size];
        for (element, stored) in memory
            .chunks_exact(self.memory_size)
            .zip(storage.chunks_exact_mut(self.storage_size))
        {
            self.encode_into(element, stored);
        }
        storage
    }

    /// Decode elements to their in-memory representation. Padding bytes are zero.
    ///
    /// `storage` must hold a whole number of stored elements.
    #[must_use]
    pub fn decode(&self, storage: Vec<u8>) -> Vec<u8> {
        if self.identity || self.storage_size == 0 {
            return storage;
        }
        if let [leaf] = self.leaves.as_slice() {
            if leaf.size == self.memory_size && leaf.size == self.storage_size {
                let mut storage = storage;
                reverse_words(&mut storage, leaf.swap_unit);
                return storage;
            }
        }
        let num_elements = storage.len() / self.storage_size.max(1);
        let mut memory = vec![0; num_elements * self.memory_size];
        for (stored, element) in storage
            .chunks_exact(self.storage_size)
            .zip(memory.chunks_exact_mut(self.memory_size))
        {
            self.decode_into(stored, element);
        }
        memory
    }

    /// Encode a single element.
    #[must_use]
    pub fn encode_element(&self, element: &[u8]) -> Vec<u8> {
        let mut stored = vec![0; self.storage_size];
        self.encode_into(element, &mut stored);
        stored
    }

    /// Decode a single stored element.
    #[must_use]
    pub fn decode_element(&self, stored: &[u8]) -> Vec<u8> {
        let mut element = vec![0; self.memory_size];
        self.decode_into(stored, &mut element);
        element
    }

    fn encode_into(&self, element: &[u8], stored: &mut [u8]) {
        for leaf in &self.leaves {
            let dst = &mut stored[leaf.storage_offset..leaf.storage_offset + leaf.size];
            dst.copy_from_slice(&element[leaf.memory_offset..leaf.memory_offset + leaf.size]);
            reverse_words(dst, leaf.swap_unit);
        }
    }

    fn decode_into(&self, stored: &[u8], element: &mut [u8]) {
        for leaf in &self.leaves {
            let dst = &mut element[leaf.memory_offset..leaf.memory_offset + leaf.size];
            dst.copy_from_slice(&stored[leaf.storage_offset..leaf.storage_offset + leaf.size]);
            reverse_words(dst, leaf.swap_unit);
        }
    }
}
