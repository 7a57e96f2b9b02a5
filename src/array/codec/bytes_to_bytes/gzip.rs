//! The `gzip` compressor.

use std::{
    io::{Cursor, Read},
    sync::Arc,
};

use flate2::bufread::{GzDecoder, GzEncoder};
use serde::{Deserialize, Serialize};

use crate::{
    array::codec::{BytesToBytesCodecTraits, CodecError, CodecPlugin},
    metadata::CodecMetadata,
    plugin::{PluginCreateError, PluginMetadataInvalidError},
};

use super::CompressionLevel;

const IDENTIFIER: &str = "gzip";

// Register the codec.
inventory::submit! {
    CodecPlugin::new(IDENTIFIER, is_name_gzip, create_codec_gzip)
}

fn is_name_gzip(name: &str) -> bool {
    name.eq(IDENTIFIER)
}

fn create_codec_gzip(
    metadata: &CodecMetadata,
    _element_size: &usize,
) -> Result<Arc<dyn BytesToBytesCodecTraits>, PluginCreateError> {
    let configuration: GzipCodecConfiguration = metadata.to_configuration().map_err(|_| {
        PluginMetadataInvalidError::new(IDENTIFIER, "codec", metadata.to_string())
    })?;
    Ok(Arc::new(GzipCodec::new_with_configuration(&configuration)))
}

/// Configuration parameters for the `gzip` codec.
#[derive(Serialize, Deserialize, Clone, Eq, PartialEq, Debug)]
pub struct GzipCodecConfiguration {
    /// The compression level.
    #[serde(default = "default_level")]
    pub level: CompressionLevel<9>,
}

const fn default_level() -> CompressionLevel<9> {
    CompressionLevel(1)
}

/// A `gzip` codec implementation.
#[derive(Clone, Debug)]
pub struct GzipCodec {
    compression_level: CompressionLevel<9>,
}

impl GzipCodec {
    /// Create a new `gzip` codec.
    #[must_use]
    pub const fn new(compression_level: CompressionLevel<9>) -> Self {
        Self { compression_level }
    }

    /// Create a new `gzip` codec from configuration.
    #[must_use]
    pub const fn new_with_configuration(configuration: &GzipCodecConfiguration) -> Self {
        Self::new(configuration.level)
    }
}

impl BytesToBytesCodecTraits for GzipCodec {
    fn identifier(&self) -> &str {
        IDENTIFIER
    }

    fn create_metadata(&self) -> CodecMetadata {
        let mut configuration = serde_json::Map::new();
        configuration.insert("level".to_string(), self.compression_level.as_u32().into());
        CodecMetadata::new(IDENTIFIER, configuration)
    }

    fn encode(&self, decoded_value: Vec<u8>) -> Result<Vec<u8>, CodecError> {
        let mut encoder = GzEncoder::new(
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
        let mut decoder = GzDecoder::new(Cursor::new(encoded_value));
        let mut out: Vec<u8> = Vec::with_capacity(decoded_size.unwrap_or_default());
        decoder.read_to_end(&mut out)?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codec_gzip_round_trip() {
        let bytes: Vec<u8> = (0..255u8).cycle().take(4000).collect();
        let configuration: GzipCodecConfiguration =
            serde_json::from_str(r#"{"level": 6}"#).unwrap();
        let codec = GzipCodec::new_with_configuration(&configuration);
        let encoded = codec.encode(bytes.clone()).unwrap();
        assert_eq!(&encoded[..2], &[0x1f, 0x8b]);
        assert_eq!(codec.decode(encoded, Some(bytes.len())).unwrap(), bytes);
        assert_eq!(codec.create_metadata().to_string(), r#"{"id":"gzip","level":6}"#);
    }

    #[test]
    fn codec_gzip_default_level() {
        let metadata: CodecMetadata = serde_json::from_str(r#"{"id":"gzip"}"#).unwrap();
        let codec = create_codec_gzip(&metadata, &1).unwrap();
        assert_eq!(codec.create_metadata().configuration()["level"], 1);
    }
}
