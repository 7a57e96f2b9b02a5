//! The `zstd` compressor.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{
    array::codec::{BytesToBytesCodecTraits, CodecError, CodecPlugin},
    metadata::CodecMetadata,
    plugin::{PluginCreateError, PluginMetadataInvalidError},
};

const IDENTIFIER: &str = "zstd";

// Register the codec.
inventory::submit! {
    CodecPlugin::new(IDENTIFIER, is_name_zstd, create_codec_zstd)
}

fn is_name_zstd(name: &str) -> bool {
    name.eq(IDENTIFIER)
}

fn create_codec_zstd(
    metadata: &CodecMetadata,
    _element_size: &usize,
) -> Result<Arc<dyn BytesToBytesCodecTraits>, PluginCreateError> {
    let configuration: ZstdCodecConfiguration = metadata.to_configuration().map_err(|_| {
        PluginMetadataInvalidError::new(IDENTIFIER, "codec", metadata.to_string())
    })?;
    Ok(Arc::new(ZstdCodec::new_with_configuration(&configuration)?))
}

/// Configuration parameters for the `zstd` codec.
#[derive(Serialize, Deserialize, Clone, Eq, PartialEq, Debug)]
pub struct ZstdCodecConfiguration {
    /// The compression level. Negative levels favour speed.
    #[serde(default = "default_level")]
    pub level: i32,
    /// Store a checksum of the decompressed content in each frame.
    #[serde(default)]
    pub checksum: bool,
}

const fn default_level() -> i32 {
    0
}

/// A `zstd` codec implementation.
#[derive(Clone, Debug)]
pub struct ZstdCodec {
    compression: i32,
    checksum: bool,
}

impl ZstdCodec {
    /// Create a new `zstd` codec.
    ///
    /// # Errors
    /// Returns [`PluginCreateError`] if `compression` is outside of the range supported by zstd.
    pub fn new(compression: i32, checksum: bool) -> Result<Self, PluginCreateError> {
        let range = zstd::compression_level_range();
        if compression != 0 && !range.contains(&compression) {
            return Err(PluginCreateError::Other(format!(
                "zstd compression level {compression} is outside of {range:?}"
            )));
        }
        Ok(Self {
            compression,
            checksum,
        })
    }

    /// Create a new `zstd` codec from configuration.
    ///
    /// # Errors
    /// Returns [`PluginCreateError`] if the compression level is invalid.
    pub fn new_with_configuration(
        configuration: &ZstdCodecConfiguration,
    ) -> Result<Self, PluginCreateError> {
        Self::new(configuration.level, configuration.checksum)
    }
}

impl BytesToBytesCodecTraits for ZstdCodec {
    fn identifier(&self) -> &str {
        IDENTIFIER
    }

    fn create_metadata(&self) -> CodecMetadata {
        let configuration = ZstdCodecConfiguration {
            level: self.compression,
            checksum: self.checksum,
        };
        CodecMetadata::new_with_serializable_configuration(IDENTIFIER, &configuration)
            .unwrap_or_else(|_| CodecMetadata::new(IDENTIFIER, serde_json::Map::new()))
    }

    fn encode(&self, decoded_value: Vec<u8>) -> Result<Vec<u8>, CodecError> {
        let mut result = Vec::<u8>::new();
        let mut encoder = zstd::Encoder::new(&mut result, self.compression)?;
        encoder.include_checksum(self.checksum)?;
        std::io::copy(&mut decoded_value.as_slice(), &mut encoder)?;
        encoder.finish()?;
        Ok(result)
    }

    fn decode(
        &self,
        encoded_value: Vec<u8>,
        _decoded_size: Option<usize>,
    ) -> Result<Vec<u8>, CodecError> {
        zstd::decode_all(encoded_value.as_slice()).map_err(CodecError::IOError)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codec_zstd_round_trip() {
        let bytes: Vec<u8> = (0..32u16).flat_map(u16::to_ne_bytes).collect();
        let configuration: ZstdCodecConfiguration =
            serde_json::from_str(r#"{"level": 5, "checksum": true}"#).unwrap();
        let codec = ZstdCodec::new_with_configuration(&configuration).unwrap();
        let encoded = codec.encode(bytes.clone()).unwrap();
        assert_eq!(codec.decode(encoded, None).unwrap(), bytes);
        assert_eq!(
            codec.create_metadata().to_string(),
            r#"{"id":"zstd","level":5,"checksum":true}"#
        );
    }

    #[test]
    fn codec_zstd_invalid_level() {
        assert!(ZstdCodec::new(1000, false).is_err());
    }
}
