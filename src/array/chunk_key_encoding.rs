//! Chunk key encoding.
//!
//! The key of a chunk is formed by concatenating for each dimension:
//! - the ASCII decimal string representation of the chunk index within that dimension, followed by
//! - the separator character, except that it is omitted for the last dimension.
//!
//! A chunk of an array with no dimensions has the key `0`.

use derive_more::Display;

use crate::storage::StoreKey;

/// A chunk key separator.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Display, Default)]
pub enum ChunkKeySeparator {
    /// The slash '/' character.
    #[display("/")]
    Slash,
    /// The dot '.' character.
    #[default]
    #[display(".")]
    Dot,
}

impl TryFrom<char> for ChunkKeySeparator {
    type Error = char;

    fn try_from(separator: char) -> Result<Self, Self::Error> {
        if separator == '/' {
            Ok(Self::Slash)
        } else if separator == '.' {
            Ok(Self::Dot)
        } else {
            Err(separator)
        }
    }
}

impl serde::Serialize for ChunkKeySeparator {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        match self {
            ChunkKeySeparator::Slash => s.serialize_char('/'),
            ChunkKeySeparator::Dot => s.serialize_char('.'),
        }
    }
}

impl<'de> serde::Deserialize<'de> for ChunkKeySeparator {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(d)?;
        if let serde_json::Value::String(separator) = value {
            if separator == "/" {
                return Ok(ChunkKeySeparator::Slash);
            } else if separator == "." {
                return Ok(ChunkKeySeparator::Dot);
            }
        }
        Err(serde::de::Error::custom(
            "chunk key separator must be a `.` or `/`.",
        ))
    }
}

/// A chunk key encoding.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub struct ChunkKeyEncoding {
    separator: ChunkKeySeparator,
}

impl ChunkKeyEncoding {
    /// Create a new chunk key encoding with separator `separator`.
    #[must_use]
    pub const fn new(separator: ChunkKeySeparator) -> Self {
        Self { separator }
    }

    /// Create a new chunk key encoding with separator `.`.
    #[must_use]
    pub const fn dot() -> Self {
        Self::new(ChunkKeySeparator::Dot)
    }

    /// Create a new chunk key encoding with separator `/`.
    #[must_use]
    pub const fn slash() -> Self {
        Self::new(ChunkKeySeparator::Slash)
    }

    /// The separator.
    #[must_use]
    pub const fn separator(&self) -> ChunkKeySeparator {
        self.separator
    }

    /// Encode chunk grid indices (grid cell coordinates) into a store key relative to the array.
    #[must_use]
    pub fn encode(&self, chunk_grid_indices: &[u64]) -> StoreKey {
        let key = if chunk_grid_indices.is_empty() {
            "0".to_string()
        } else {
            chunk_grid_indices
                .iter()
                .map(std::string::ToString::to_string)
                .collect::<Vec<String>>()
                .join(&self.separator.to_string())
        };
        unsafe { StoreKey::new_unchecked(key) }
    }

    /// Decode a key relative to an array of `dimensionality` dimensions into chunk grid indices.
    ///
    /// Returns [`None`] if `key` is not a chunk key, such as a metadata document.
    #[must_use]
    pub fn decode(&self, key: &str, dimensionality: usize) -> Option<Vec<u64>> {
        if dimensionality == 0 {
            return (key == "0").then(Vec::new);
        }
        let separator = match self.separator {
            ChunkKeySeparator::Slash => '/',
            ChunkKeySeparator::Dot => '.',
        };
        let indices = key
            .split(separator)
            .map(|index| {
                if index.is_empty() || !index.bytes().all(|byte| byte.is_ascii_digit()) {
                    None
                } else {
                    index.parse::<u64>().ok()
                }
            })
            .collect::<Option<Vec<u64>>>()?;
        (indices.len() == dimensionality).then_some(indices)
    }
}
