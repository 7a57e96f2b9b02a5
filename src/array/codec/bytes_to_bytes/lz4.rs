//! The `lz4` compressor.
//!
//! An encoded chunk is the little-endian `u32` size of the decoded chunk followed by an LZ4 block.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{
    array::codec::{BytesToBytesCodecTraits, CodecError, CodecPlugin},
    metadata::CodecMetadata,
    plugin::{PluginCreateError, PluginMetadataInvalidError},
};

const IDENTIFIER: &str = "lz4";

// Register the codec.
inventory::submit! {
    CodecPlugin::new(IDENTIFIER, is_name_lz4, create_codec_lz4)
}

fn is_name_lz4(name: &str) -> bool {
    name.eq(IDENTIFIER)
}

fn create_codec_lz4(
    metadata: &CodecMetadata,
    _element_size: &usize,
) -> Result<Arc<dyn BytesToBytesCodecTraits>, PluginCreateError> {
    let configuration: Lz4CodecConfiguration = metadata.to_configuration().map_err(|_| {
        PluginMetadataInvalidError::new(IDENTIFIER, "codec", metadata.to_string())
    })?;
    Ok(Arc::new(Lz4Codec::new_with_configuration(&configuration)))
}

/// Configuration parameters for the `lz4` codec.
#[derive(Serialize, Deserialize, Clone, Eq, PartialEq, Debug)]
pub struct Lz4CodecConfiguration {
    /// The acceleration factor. Higher is faster with less compression.
    ///
    /// Kept in the metadata. Encoding always uses the default acceleration.
    #[serde(default = "default_acceleration")]
    pub acceleration: i32,
}

const fn default_acceleration() -> i32 {
    1
}

/// An `lz4` codec implementation.
#[derive(Clone, Debug)]
pub struct Lz4Codec {
    acceleration: i32,
}

impl Lz4Codec {
    /// Create a new `lz4` codec.
    #[must_use]
    pub fn new(acceleration: i32) -> Self {
        Self { acceleration }
    }

    /// Create a new `lz4` codec from configuration.
    #[must_use]
    pub fn new_with_configuration(configuration: &Lz4CodecConfiguration) -> Self {
        Self::new(configuration.acceleration)
    }
}

impl BytesToBytesCodecTraits for Lz4Codec {
    fn identifier(&self) -> &str {
        IDENTIFIER
    }

    fn create_metadata(&self) -> CodecMetadata {
        let configuration = Lz4CodecConfiguration {
            acceleration: self.acceleration,
        };
        CodecMetadata::new_with_serializable_configuration(IDENTIFIER, &configuration)
            .unwrap_or_else(|_| CodecMetadata::new(IDENTIFIER, serde_json::Map::new()))
    }

    fn encode(&self, decoded_value: Vec<u8>) -> Result<Vec<u8>, CodecError> {
        if u32::try_from(decoded_value.len()).is_err() {
            return Err(CodecError::Other(
                "lz4 cannot encode more than u32::MAX bytes".to_string(),
            ));
        }
        Ok(lz4_flex::compress_prepend_size(&decoded_value))
    }

    fn decode(
        &self,
        encoded_value: Vec<u8>,
        _decoded_size: Option<usize>,
    ) -> Result<Vec<u8>, CodecError> {
        lz4_flex::decompress_size_prepended(&encoded_value)
            .map_err(|err| CodecError::Other(format!("lz4 decompression failed: {err}")))
    }
}
