//! The codec pipeline.
//!
//! A chunk is encoded by an ordered sequence of stages, each a bidirectional transform:
//!  - an optional memory-layout transform ([`array_to_array::transpose`]) reordering elements from row-major to column-major,
//!  - the [bytes stage](array_to_bytes::bytes) mapping in-memory elements to their stored byte order and packed layout,
//!  - any number of filters, then
//!  - an optional compressor.
//!
//! Filters and compressors are [`BytesToBytesCodecTraits`] implementations registered as a [`CodecPlugin`] through [`inventory`].
//! The [`CodecChain`] combines all stages and decodes them in exactly the reverse order.

pub mod array_to_array;
pub mod array_to_bytes;
pub mod bytes_to_bytes;

pub use array_to_array::delta::{DeltaCodec, DeltaCodecConfiguration};
pub use array_to_bytes::{bytes::StorageLayout, codec_chain::CodecChain};
#[cfg(feature = "blosc")]
pub use bytes_to_bytes::blosc::{BloscCodec, BloscCodecConfiguration};
#[cfg(feature = "bz2")]
pub use bytes_to_bytes::bz2::{Bz2Codec, Bz2CodecConfiguration};
#[cfg(feature = "crc32c")]
pub use bytes_to_bytes::crc32c::Crc32cCodec;
#[cfg(feature = "gzip")]
pub use bytes_to_bytes::gzip::{GzipCodec, GzipCodecConfiguration};
#[cfg(feature = "lz4")]
pub use bytes_to_bytes::lz4::{Lz4Codec, Lz4CodecConfiguration};
#[cfg(feature = "lzma")]
pub use bytes_to_bytes::lzma::{LzmaCodec, LzmaCodecConfiguration};
pub use bytes_to_bytes::shuffle::{ShuffleCodec, ShuffleCodecConfiguration};
pub use bytes_to_bytes::unsupported::UnsupportedCodec;
#[cfg(feature = "gzip")]
pub use bytes_to_bytes::zlib::{ZlibCodec, ZlibCodecConfiguration};
#[cfg(feature = "zstd")]
pub use bytes_to_bytes::zstd::{ZstdCodec, ZstdCodecConfiguration};

use std::sync::Arc;

use thiserror::Error;

use crate::{
    metadata::CodecMetadata,
    plugin::{Plugin, PluginCreateError},
};

/// A codec plugin, created from [`CodecMetadata`] and the size in bytes of an element.
pub type CodecPlugin = Plugin<Arc<dyn BytesToBytesCodecTraits>, CodecMetadata, usize>;
inventory::collect!(CodecPlugin);

/// Traits for `bytes->bytes` codecs.
pub trait BytesToBytesCodecTraits: core::fmt::Debug + Send + Sync {
    /// The codec id.
    fn identifier(&self) -> &str;

    /// Create the metadata of this codec.
    fn create_metadata(&self) -> CodecMetadata;

    /// Encode chunk bytes.
    ///
    /// # Errors
    /// Returns [`CodecError`] if a codec fails.
    fn encode(&self, decoded_value: Vec<u8>) -> Result<Vec<u8>, CodecError>;

    /// Decode chunk bytes. `decoded_size` is the expected decoded size, if known.
    ///
    /// # Errors
    /// Returns [`CodecError`] if a codec fails.
    fn decode(
        &self,
        encoded_value: Vec<u8>,
        decoded_size: Option<usize>,
    ) -> Result<Vec<u8>, CodecError>;
}

/// Create a `bytes->bytes` codec from metadata.
///
/// A codec id with no registered plugin yields an [`UnsupportedCodec`]: the array remains usable
/// but every chunk encode or decode through it fails.
///
/// # Errors
/// Returns a [`PluginCreateError`] if a registered codec rejects its configuration.
pub fn create_bytes_to_bytes_codec(
    metadata: &CodecMetadata,
    element_size: usize,
) -> Result<Arc<dyn BytesToBytesCodecTraits>, PluginCreateError> {
    for plugin in inventory::iter::<CodecPlugin> {
        if plugin.match_name(metadata.id()) {
            return plugin.create(metadata, &element_size);
        }
    }
    log::debug!("codec {} is not supported, chunks will not be decodable", metadata.id());
    Ok(Arc::new(UnsupportedCodec::new(metadata.clone())))
}

/// A codec error.
#[derive(Debug, Error)]
pub enum CodecError {
    /// An IO error.
    #[error(transparent)]
    IOError(#[from] std::io::Error),
    /// The decoded size of a chunk did not match what was expected.
    #[error("the size of a decoded chunk is {_0}, expected {_1}")]
    UnexpectedChunkDecodedSize(usize, usize),
    /// An embedded checksum does not match the decoded value.
    #[error("the checksum is invalid")]
    InvalidChecksum,
    /// A codec which is not supported.
    #[error("codec {0} is not supported")]
    UnsupportedCodec(String),
    /// Other
    #[error("{_0}")]
    Other(String),
}

impl From<&str> for CodecError {
    fn from(err: &str) -> Self {
        Self::Other(err.to_string())
    }
}

impl From<String> for CodecError {
    fn from(err: String) -> Self {
        Self::Other(err)
    }
}
