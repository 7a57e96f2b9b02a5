//! The `lzma` compressor.
//!
//! Chunks are `.xz` streams, legacy `.lzma` streams or raw LZMA data depending on the `format`.
//! Streams in the `.xz` format with any filter chain can be decoded. Encoding supports the LZMA1 and LZMA2 filters.

use std::{io::Read, sync::Arc};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use xz2::stream::{Check, Filters, LzmaOptions, Stream};

use crate::{
    array::codec::{BytesToBytesCodecTraits, CodecError, CodecPlugin},
    metadata::CodecMetadata,
    plugin::{PluginCreateError, PluginMetadataInvalidError},
};

const IDENTIFIER: &str = "lzma";

const FORMAT_XZ: u32 = 1;
const FORMAT_ALONE: u32 = 2;
const FORMAT_RAW: u32 = 3;

const FILTER_LZMA1: u64 = 0x4000_0000_0000_0001;
const FILTER_LZMA2: u64 = 0x21;

const DEFAULT_PRESET: u32 = 6;

// Register the codec.
inventory::submit! {
    CodecPlugin::new(IDENTIFIER, is_name_lzma, create_codec_lzma)
}

fn is_name_lzma(name: &str) -> bool {
    name.eq(IDENTIFIER)
}

fn create_codec_lzma(
    metadata: &CodecMetadata,
    _element_size: &usize,
) -> Result<Arc<dyn BytesToBytesCodecTraits>, PluginCreateError> {
    let configuration: LzmaCodecConfiguration = metadata.to_configuration().map_err(|_| {
        PluginMetadataInvalidError::new(IDENTIFIER, "codec", metadata.to_string())
    })?;
    Ok(Arc::new(LzmaCodec::new_with_configuration(configuration)?))
}

/// Configuration parameters for the `lzma` codec.
#[derive(Serialize, Deserialize, Clone, Eq, PartialEq, Debug)]
pub struct LzmaCodecConfiguration {
    /// The container: `1` for `.xz`, `2` for legacy `.lzma`, `3` for raw data.
    #[serde(default = "default_format")]
    pub format: u32,
    /// The integrity check of `.xz` streams: `-1` (default), `0` (none), `1` (CRC32), `4` (CRC64) or `10` (SHA-256).
    #[serde(default = "default_check")]
    pub check: i32,
    /// The compression preset, from 0 to 9, optionally with the extreme flag.
    #[serde(default)]
    pub preset: Option<u32>,
    /// A custom filter chain, each filter an object with an `id`.
    #[serde(default)]
    pub filters: Option<Vec<Map<String, Value>>>,
}

const fn default_format() -> u32 {
    FORMAT_XZ
}

const fn default_check() -> i32 {
    -1
}

/// An `lzma` codec implementation.
#[derive(Clone, Debug)]
pub struct LzmaCodec {
    configuration: LzmaCodecConfiguration,
}

fn check_of(check: i32) -> Option<Check> {
    match check {
        -1 | 4 => Some(Check::Crc64),
        0 => Some(Check::None),
        1 => Some(Check::Crc32),
        10 => Some(Check::Sha256),
        _ => None,
    }
}

impl LzmaCodec {
    /// Create a new `lzma` codec from configuration.
    ///
    /// # Errors
    /// Returns [`PluginCreateError`] if the format or check is unknown, or the raw format has no filters.
    pub fn new_with_configuration(
        configuration: LzmaCodecConfiguration,
    ) -> Result<Self, PluginCreateError> {
        if check_of(configuration.check).is_none() {
            return Err(PluginCreateError::Other(format!(
                "lzma check {} is not supported",
                configuration.check
            )));
        }
        match (configuration.format, &configuration.filters) {
            (FORMAT_XZ, _) | (FORMAT_ALONE, None) | (FORMAT_RAW, Some(_)) => {}
            (FORMAT_ALONE, Some(_)) => {
                return Err(PluginCreateError::from(
                    "lzma filters are not supported by the legacy .lzma format",
                ))
            }
            (FORMAT_RAW, None) => {
                return Err(PluginCreateError::from(
                    "the raw lzma format requires filters",
                ))
            }
            (format, _) => {
                return Err(PluginCreateError::Other(format!(
                    "lzma format {format} is not supported"
                )))
            }
        }
        Ok(Self { configuration })
    }

    fn check(&self) -> Check {
        check_of(self.configuration.check).unwrap_or(Check::Crc64)
    }

    fn preset(&self) -> u32 {
        self.configuration.preset.unwrap_or(DEFAULT_PRESET)
    }

    /// The filter chain of the configuration, [`None`] if there is none.
    fn filters(&self) -> Result<Option<Filters>, CodecError> {
        let Some(chain) = &self.configuration.filters else {
            return Ok(None);
        };
        let mut filters = Filters::new();
        for filter in chain {
            let id = filter.get("id").and_then(Value::as_u64);
            let preset = filter
                .get("preset")
                .and_then(Value::as_u64)
                .and_then(|preset| u32::try_from(preset).ok())
                .unwrap_or(DEFAULT_PRESET);
            let options = LzmaOptions::new_preset(preset).map_err(std::io::Error::from)?;
            match id {
                Some(FILTER_LZMA1) => filters.lzma1(&options),
                Some(FILTER_LZMA2) => filters.lzma2(&options),
                _ => {
                    return Err(CodecError::Other(format!(
                        "lzma filter {} is not supported",
                        Value::Object(filter.clone())
                    )))
                }
            };
        }
        Ok(Some(filters))
    }
}

impl BytesToBytesCodecTraits for LzmaCodec {
    fn identifier(&self) -> &str {
        IDENTIFIER
    }

    fn create_metadata(&self) -> CodecMetadata {
        CodecMetadata::new_with_serializable_configuration(IDENTIFIER, &self.configuration)
            .unwrap_or_else(|_| CodecMetadata::new(IDENTIFIER, Map::new()))
    }

    fn encode(&self, decoded_value: Vec<u8>) -> Result<Vec<u8>, CodecError> {
        let stream = match (self.configuration.format, self.filters()?) {
            (FORMAT_XZ, None) => Stream::new_easy_encoder(self.preset(), self.check()),
            (FORMAT_XZ, Some(filters)) => Stream::new_stream_encoder(&filters, self.check()),
            (FORMAT_RAW, Some(filters)) => Stream::new_raw_encoder(&filters),
            _ => LzmaOptions::new_preset(self.preset())
                .and_then(|options| Stream::new_lzma_encoder(&options)),
        }
        .map_err(std::io::Error::from)?;
        let mut encoder = xz2::read::XzEncoder::new_stream(decoded_value.as_slice(), stream);
        let mut out = Vec::new();
        encoder.read_to_end(&mut out)?;
        Ok(out)
    }

    fn decode(
        &self,
        encoded_value: Vec<u8>,
        decoded_size: Option<usize>,
    ) -> Result<Vec<u8>, CodecError> {
        let stream = if self.configuration.format == FORMAT_RAW {
            let filters = self.filters()?.ok_or("the raw lzma format requires filters")?;
            Stream::new_raw_decoder(&filters)
        } else {
            Stream::new_auto_decoder(u64::MAX, 0)
        }
        .map_err(std::io::Error::from)?;
        let mut decoder = xz2::read::XzDecoder::new_stream(encoded_value.as_slice(), stream);
        let mut out = Vec::with_capacity(decoded_size.unwrap_or_default());
        decoder.read_to_end(&mut out)?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codec(configuration: &str) -> LzmaCodec {
        LzmaCodec::new_with_configuration(serde_json::from_str(configuration).unwrap()).unwrap()
    }

    fn decoded() -> Vec<u8> {
        (0..16u8).chain(0..16u8).collect()
    }

    #[test]
    fn codec_lzma_round_trip() {
        for configuration in [
            r#"{}"#,
            r#"{"format": 1, "check": 0, "preset": 1}"#,
            r#"{"format": 1, "filters": [{"id": 33, "preset": 2}]}"#,
            r#"{"format": 2, "preset": 9}"#,
            r#"{"format": 3, "filters": [{"id": 33}]}"#,
        ] {
            let codec = codec(configuration);
            let encoded = codec.encode(decoded()).unwrap();
            assert_eq!(codec.decode(encoded, Some(32)).unwrap(), decoded(), "{configuration}");
        }
    }

    #[test]
    fn codec_lzma_metadata() {
        let metadata: CodecMetadata = serde_json::from_str(r#"{"id": "lzma"}"#).unwrap();
        let codec = create_codec_lzma(&metadata, &1).unwrap();
        assert_eq!(
            codec.create_metadata().to_string(),
            r#"{"id":"lzma","format":1,"check":-1,"preset":null,"filters":null}"#
        );
    }

    #[test]
    fn codec_lzma_invalid_configuration() {
        for configuration in [
            r#"{"format": 4}"#,
            r#"{"check": 2}"#,
            r#"{"format": 3}"#,
            r#"{"format": 2, "filters": [{"id": 33}]}"#,
        ] {
            assert!(LzmaCodec::new_with_configuration(
                serde_json::from_str(configuration).unwrap()
            )
            .is_err());
        }
    }

    // An .xz stream with a CRC64 check, preset 6.
    const XZ: [u8; 84] = [
        253, 55, 122, 88, 90, 0, 0, 4, 230, 214, 180, 70, 2, 0, 33, 1, 22, 0, 0, 0, 116, 47, 229,
        163, 224, 0, 31, 0, 21, 93, 0, 0, 0, 82, 80, 10, 132, 249, 155, 178, 128, 33, 169, 105,
        214, 39, 224, 253, 184, 27, 48, 0, 0, 0, 0, 0, 85, 179, 2, 53, 198, 89, 62, 196, 0, 1, 49,
        32, 81, 146, 181, 221, 31, 182, 243, 125, 1, 0, 0, 0, 0, 4, 89, 90,
    ];

    // An .xz stream with the filter chain delta (distance 4) then LZMA2 (preset 1).
    const XZ_WITH_FILTERS: [u8; 76] = [
        253, 55, 122, 88, 90, 0, 0, 4, 230, 214, 180, 70, 2, 1, 3, 1, 3, 33, 1, 16, 162, 42, 18,
        21, 224, 0, 31, 0, 14, 93, 0, 0, 0, 82, 80, 10, 160, 10, 84, 80, 49, 105, 107, 7, 148, 0,
        0, 0, 85, 179, 2, 53, 198, 89, 62, 196, 0, 1, 42, 32, 203, 89, 131, 116, 31, 182, 243,
        125, 1, 0, 0, 0, 0, 4, 89, 90,
    ];

    // A legacy .lzma stream.
    const ALONE: [u8; 41] = [
        93, 0, 0, 128, 0, 255, 255, 255, 255, 255, 255, 255, 255, 0, 0, 0, 82, 80, 10, 132, 249,
        155, 178, 128, 33, 169, 105, 214, 39, 224, 253, 185, 71, 106, 99, 255, 255, 114, 216, 0,
        0,
    ];

    #[test]
    fn codec_lzma_decode_streams() {
        let xz = codec(r#"{"format": 1, "check": -1, "preset": null, "filters": null}"#);
        assert_eq!(xz.decode(XZ.to_vec(), Some(32)).unwrap(), decoded());

        let with_filters =
            codec(r#"{"format": 1, "filters": [{"id": 3, "dist": 4}, {"id": 33, "preset": 1}]}"#);
        assert_eq!(
            with_filters.decode(XZ_WITH_FILTERS.to_vec(), Some(32)).unwrap(),
            decoded()
        );
        assert!(with_filters.encode(decoded()).is_err());

        let alone = codec(r#"{"format": 2}"#);
        assert_eq!(alone.decode(ALONE.to_vec(), Some(32)).unwrap(), decoded());

        let mut corrupt = XZ.to_vec();
        corrupt[40] ^= 0xFF;
        assert!(xz.decode(corrupt, Some(32)).is_err());
    }
}
