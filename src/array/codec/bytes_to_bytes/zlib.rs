//! The `zlib` compressor.

use std::{
    io::{Cursor, Read},
    sync::Arc,
};

use flate2::bufread::{ZlibDecoder, ZlibEncoder};
use serde::{Deserialize, Serialize};

use crate::{
    array::codec::{BytesToBytesCodecTraits, CodecError, CodecPlugin},
    metadata::CodecMetadata,
    plugin::{PluginCreateError, PluginMetadataInvalidError},
};

use super::CompressionLevel;

const IDENTIFIER: &str = "zlib";

// Register the codec.
inventory::submit! {
    CodecPlugin::new(IDENTIFIER, is_name_zlib, create_codec_zlib)
}

fn is_name_zlib(name: &str) -> bool {
    name.eq(IDENTIFIER)
}

fn create_codec_zlib(
    metadata: &CodecMetadata,
    _element_size: &usize,
) -> Result<Arc<dyn BytesToBytesCodecTraits>, PluginCreateError> {
    let configuration: ZlibCodecConfiguration = metadata.to_configuration().map_err(|_| {
        PluginMetadataInvalidError::new(IDENTIFIER, "codec", metadata.to_string())
    })?;
    Ok(Arc::new(ZlibCodec::new_with_configuration(&configuration)))
}

/// Configuration parameters for the `zlib` codec.
#[derive(Serialize, Deserialize, Clone, Eq, PartialEq, Debug)]
pub struct ZlibCodecConfiguration {
    /// The compression level.
    #[serde(default = "default_level")]
    pub level: CompressionLevel<9>,
}

const fn default_level() -> CompressionLevel<9> {
    CompressionLevel(1)
}

/// A `zlib` codec implementation.
#[derive(Clone, Debug)]
pub struct ZlibCodec {
    compression_level: CompressionLevel<9>,
}

impl ZlibCodec {
    /// Create a new `zlib` codec.
    #[must_use]
    pub const fn new(compression_level: CompressionLevel<9>) -> Self {
        Self { compression_level }
    }

    /// Create a new `zlib` codec from configuration.
    #[must_use]
    pub const fn new_with_configuration(configuration: &ZlibCodecConfiguration) -> Self {
        Self::new(configuration.level)
    }
}

impl BytesToBytesCodecTraits for ZlibCodec {
    fn identifier(&self) -> &str {
        IDENTIFIER
    }

    fn create_metadata(&self) -> CodecMetadata {
        let mut configuration = serde_json::Map::new();
        configuration.insert("level".to_string(), self.compression_level.as_u32().into());
        CodecMetadata::new(IDENTIFIER, configuration)
    }

    fn encode(&self, decoded_value: Vec<u8>) -> Result<Vec<u8>, CodecError> {
        let mut encoder = ZlibEncoder::new(
            Cursor::new(decoded_value),
            flate2::Compression::new(self.compression_level.as_u32()),
        );
        let mut out: Vec<u8> = Vec::new();
        encoder.read_to_end(&mut out)?;
        Ok(out)
    }

    fn decode(
        &self,
        encoded_value: Vec<u8>,
        decoded_size: Option<usize>,
    ) -> Result<Vec<u8>, CodecError> {
        let mut decoder = ZlibDecoder::new(Cursor::new(encoded_value));
        let mut out: Vec<u8> = Vec::with_capacity(decoded_size.unwrap_or_default());
        decoder.read_to_end(&mut out)?;
        Ok(out)
    }
}
