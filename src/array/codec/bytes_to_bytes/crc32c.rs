//! The `crc32c` checksum filter.
//!
//! Appends a CRC32C checksum of the input bytes, stored as 4 little endian bytes.
//! The checksum is verified on decode if [`validate_checksums`](crate::config::Config#validate-checksums) is enabled.

use std::sync::Arc;

use crate::{
    array::codec::{BytesToBytesCodecTraits, CodecError, CodecPlugin},
    config::global_config,
    metadata::CodecMetadata,
    plugin::PluginCreateError,
};

const IDENTIFIER: &str = "crc32c";

const CHECKSUM_SIZE: usize = std::mem::size_of::<u32>();

// Register the codec.
inventory::submit! {
    CodecPlugin::new(IDENTIFIER, is_name_crc32c, create_codec_crc32c)
}

fn is_name_crc32c(name: &str) -> bool {
    name.eq(IDENTIFIER)
}

fn create_codec_crc32c(
    _metadata: &CodecMetadata,
    _element_size: &usize,
) -> Result<Arc<dyn BytesToBytesCodecTraits>, PluginCreateError> {
    Ok(Arc::new(Crc32cCodec::new()))
}

/// A `crc32c` codec implementation.
#[derive(Clone, Debug, Default)]
pub struct Crc32cCodec;

impl Crc32cCodec {
    /// Create a new `crc32c` codec.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl BytesToBytesCodecTraits for Crc32cCodec {
    fn identifier(&self) -> &str {
        IDENTIFIER
    }

    fn create_metadata(&self) -> CodecMetadata {
        CodecMetadata::new(IDENTIFIER, serde_json::Map::new())
    }

    fn encode(&self, mut decoded_value: Vec<u8>) -> Result<Vec<u8>, CodecError> {
        let checksum = crc32c::crc32c(&decoded_value).to_le_bytes();
        decoded_value.extend_from_slice(&checksum);
        Ok(decoded_value)
    }

    fn decode(
        &self,
        mut encoded_value: Vec<u8>,
        _decoded_size: Option<usize>,
    ) -> Result<Vec<u8>, CodecError> {
        if encoded_value.len() < CHECKSUM_SIZE {
            return Err(CodecError::Other(
                "crc32c decoder expects a 32 bit input".to_string(),
            ));
        }
        let decoded_len = encoded_value.len() - CHECKSUM_SIZE;
        if global_config().validate_checksums() {
            let checksum = crc32c::crc32c(&encoded_value[..decoded_len]).to_le_bytes();
            if checksum != encoded_value[decoded_len..] {
                return Err(CodecError::InvalidChecksum);
            }
        }
        encoded_value.truncate(decoded_len);
        Ok(encoded_value)
    }
}
