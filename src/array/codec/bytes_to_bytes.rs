//! `bytes->bytes` codecs: compressors, filters, and checksums.

#[cfg(feature = "blosc")]
pub mod blosc;
#[cfg(feature = "bz2")]
pub mod bz2;
#[cfg(feature = "crc32c")]
pub mod crc32c;
#[cfg(feature = "gzip")]
pub mod gzip;
#[cfg(feature = "lz4")]
pub mod lz4;
#[cfg(feature = "lzma")]
pub mod lzma;
pub mod shuffle;
pub mod unsupported;
#[cfg(feature = "gzip")]
pub mod zlib;
#[cfg(feature = "zstd")]
pub mod zstd;

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// A compression level in `[0, MAX]`.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Serialize)]
#[serde(transparent)]
pub struct CompressionLevel<const MAX: u32>(u32);

/// An invalid compression level.
#[derive(Copy, Clone, Debug, Error)]
#[error("invalid compression level {0}, must be between 0 and {1}")]
pub struct CompressionLevelError(u32, u32);

impl<const MAX: u32> CompressionLevel<MAX> {
    /// Create a new compression level.
    ///
    /// # Errors
    /// Returns [`CompressionLevelError`] if `level` exceeds `MAX`.
    pub const fn new(level: u32) -> Result<Self, CompressionLevelError> {
        if level > MAX {
            Err(CompressionLevelError(level, MAX))
        } else {
            Ok(Self(level))
        }
    }

    /// The compression level as a [`u32`].
    #[must_use]
    pub const fn as_u32(&self) -> u32 {
        self.0
    }
}

impl<'de, const MAX: u32> Deserialize<'de> for CompressionLevel<MAX> {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let level = u32::deserialize(d)?;
        Self::new(level).map_err(serde::de::Error::custom)
    }
}
