//! The `bz2` compressor.

use std::{
    io::{Cursor, Read},
    sync::Arc,
};

use serde::{Deserialize, Serialize};

use crate::{
    array::codec::{BytesToBytesCodecTraits, CodecError, CodecPlugin},
    metadata::CodecMetadata,
    plugin::{PluginCreateError, PluginMetadataInvalidError},
};

use super::CompressionLevel;

const IDENTIFIER: &str = "bz2";

// Register the codec.
inventory::submit! {
    CodecPlugin::new(IDENTIFIER, is_name_bz2, create_codec_bz2)
}

fn is_name_bz2(name: &str) -> bool {
    name.eq(IDENTIFIER)
}

fn create_codec_bz2(
    metadata: &CodecMetadata,
    _element_size: &usize,
) -> Result<Arc<dyn BytesToBytesCodecTraits>, PluginCreateError> {
    let configuration: Bz2CodecConfiguration = metadata.to_configuration().map_err(|_| {
        PluginMetadataInvalidError::new(IDENTIFIER, "codec", metadata.to_string())
    })?;
    Ok(Arc::new(Bz2Codec::new_with_configuration(&configuration)))
}

/// Configuration parameters for the `bz2` codec.
#[derive(Serialize, Deserialize, Clone, Eq, PartialEq, Debug)]
pub struct Bz2CodecConfiguration {
    /// The compression level, from 1 (fastest) to 9 (best). Level 0 maps to 1.
    #[serde(default = "default_level")]
    pub level: CompressionLevel<9>,
}

const fn default_level() -> CompressionLevel<9> {
    CompressionLevel(9)
}

/// A `bz2` codec implementation.
#[derive(Clone, Debug)]
pub struct Bz2Codec {
    compression: bzip2::Compression,
}

impl Bz2Codec {
    /// Create a new `bz2` codec.
    #[must_use]
    pub fn new(level: CompressionLevel<9>) -> Self {
        Self {
            compression: bzip2::Compression::new(level.as_u32().max(1)),
        }
    }

    /// Create a new `bz2` codec from configuration.
    #[must_use]
    pub fn new_with_configuration(configuration: &Bz2CodecConfiguration) -> Self {
        Self::new(configuration.level)
    }
}

impl BytesToBytesCodecTraits for Bz2Codec {
    fn identifier(&self) -> &str {
        IDENTIFIER
    }

    fn create_metadata(&self) -> CodecMetadata {
        let mut configuration = serde_json::Map::new();
        configuration.insert("level".to_string(), self.compression.level().into());
        CodecMetadata::new(IDENTIFIER, configuration)
    }

    fn encode(&self, decoded_value: Vec<u8>) -> Result<Vec<u8>, CodecError> {
        let mut encoder = bzip2::read::BzEncoder::new(Cursor::new(decoded_value), self.compression);
        let mut out: Vec<u8> = Vec::new();
        encoder.read_to_end(&mut out)?;
        Ok(out)
    }

    fn decode(
        &self,
        encoded_value: Vec<u8>,
        decoded_size: Option<usize>,
    ) -> Result<Vec<u8>, CodecError> {
        let mut decoder = bzip2::read::BzDecoder::new(Cursor::new(encoded_value));
        let mut out: Vec<u8> = Vec::with_capacity(decoded_size.unwrap_or_default());
        decoder.read_to_end(&mut out)?;
        Ok(out)
    }
}
