//! The `blosc` compressor.
//!
//! It uses the [blosc](https://www.blosc.org/) container format through the `c-blosc` library.
//! The type size used for shuffling is the size of an array element.

use std::{
    ffi::{c_char, c_int, c_void, CString},
    sync::Arc,
};

use blosc_sys::{
    blosc_cbuffer_sizes, blosc_cbuffer_validate, blosc_compress_ctx, blosc_decompress_ctx,
    blosc_get_complib_info, BLOSC_MAX_OVERHEAD,
};
use serde::{Deserialize, Serialize};

use crate::{
    array::codec::{BytesToBytesCodecTraits, CodecError, CodecPlugin},
    metadata::CodecMetadata,
    plugin::{PluginCreateError, PluginMetadataInvalidError},
};

use super::CompressionLevel;

const IDENTIFIER: &str = "blosc";

// Register the codec.
inventory::submit! {
    CodecPlugin::new(IDENTIFIER, is_name_blosc, create_codec_blosc)
}

fn is_name_blosc(name: &str) -> bool {
    name.eq(IDENTIFIER)
}

fn create_codec_blosc(
    metadata: &CodecMetadata,
    element_size: &usize,
) -> Result<Arc<dyn BytesToBytesCodecTraits>, PluginCreateError> {
    let configuration: BloscCodecConfiguration = metadata.to_configuration().map_err(|_| {
        PluginMetadataInvalidError::new(IDENTIFIER, "codec", metadata.to_string())
    })?;
    Ok(Arc::new(BloscCodec::new_with_configuration(
        &configuration,
        *element_size,
    )?))
}

/// Configuration parameters for the `blosc` codec.
///
/// ```json
/// {
///     "id": "blosc",
///     "cname": "lz4",
///     "clevel": 5,
///     "shuffle": 1,
///     "blocksize": 0
/// }
/// ```
#[derive(Serialize, Deserialize, Clone, Eq, PartialEq, Debug)]
pub struct BloscCodecConfiguration {
    /// The internal compressor: `blosclz`, `lz4`, `lz4hc`, `snappy`, `zlib` or `zstd`.
    #[serde(default = "default_cname")]
    pub cname: String,
    /// The compression level.
    #[serde(default = "default_clevel")]
    pub clevel: CompressionLevel<9>,
    /// The shuffle mode: `-1` automatic, `0` none, `1` byte shuffle, `2` bit shuffle.
    #[serde(default = "default_shuffle")]
    pub shuffle: i32,
    /// The compression block size. Automatically determined if zero.
    #[serde(default)]
    pub blocksize: usize,
}

fn default_cname() -> String {
    "lz4".to_string()
}

const fn default_clevel() -> CompressionLevel<9> {
    CompressionLevel(5)
}

const fn default_shuffle() -> i32 {
    1
}

/// A `blosc` codec implementation.
#[derive(Clone, Debug)]
pub struct BloscCodec {
    configuration: BloscCodecConfiguration,
    cname: CString,
    typesize: usize,
}

impl BloscCodec {
    /// Create a new `blosc` codec from configuration, shuffling elements of `typesize` bytes.
    ///
    /// # Errors
    /// Returns [`PluginCreateError`] if the compressor is not supported or the shuffle mode is invalid.
    pub fn new_with_configuration(
        configuration: &BloscCodecConfiguration,
        typesize: usize,
    ) -> Result<Self, PluginCreateError> {
        if !(-1..=2).contains(&configuration.shuffle) {
            return Err(PluginCreateError::Other(format!(
                "invalid blosc shuffle mode {}",
                configuration.shuffle
            )));
        }
        let cname = CString::new(configuration.cname.as_str())
            .map_err(|err| PluginCreateError::Other(err.to_string()))?;
        // Check that the compressor is available
        let support = unsafe {
            blosc_get_complib_info(
                cname.as_ptr().cast::<c_char>(),
                std::ptr::null_mut(),
                std::ptr::null_mut(),
            )
        };
        if support < 0 {
            return Err(PluginCreateError::Other(format!(
                "blosc compressor {} is not supported.",
                configuration.cname
            )));
        }
        Ok(Self {
            configuration: configuration.clone(),
            cname,
            typesize: typesize.max(1),
        })
    }

    fn shuffle_mode(&self) -> c_int {
        match self.configuration.shuffle {
            -1 if self.typesize == 1 => 2,
            -1 => 1,
            shuffle => shuffle,
        }
    }
}

impl BytesToBytesCodecTraits for BloscCodec {
    fn identifier(&self) -> &str {
        IDENTIFIER
    }

    fn create_metadata(&self) -> CodecMetadata {
        CodecMetadata::new_with_serializable_configuration(IDENTIFIER, &self.configuration)
            .unwrap_or_else(|_| CodecMetadata::new(IDENTIFIER, serde_json::Map::new()))
    }

    #[allow(clippy::cast_possible_wrap)]
    fn encode(&self, decoded_value: Vec<u8>) -> Result<Vec<u8>, CodecError> {
        let destsize = decoded_value.len() + BLOSC_MAX_OVERHEAD as usize;
        let mut dest: Vec<u8> = Vec::with_capacity(destsize);
        let destsize = unsafe {
            blosc_compress_ctx(
                self.configuration.clevel.as_u32() as c_int,
                self.shuffle_mode(),
                self.typesize,
                decoded_value.len(),
                decoded_value.as_ptr().cast::<c_void>(),
                dest.as_mut_ptr().cast::<c_void>(),
                destsize,
                self.cname.as_ptr().cast::<c_char>(),
                self.configuration.blocksize,
                1,
            )
        };
        if destsize > 0 {
            #[allow(clippy::cast_sign_loss)]
            unsafe {
                dest.set_len(destsize as usize);
            }
            dest.shrink_to_fit();
            Ok(dest)
        } else {
            Err(CodecError::Other(format!(
                "blosc_compress_ctx(clevel: {}, doshuffle: {}, typesize: {}, nbytes: {}, destsize {}, compressor {:?}, blocksize: {}) -> {destsize} (failure)",
                self.configuration.clevel.as_u32(),
                self.shuffle_mode(),
                self.typesize,
                decoded_value.len(),
                decoded_value.len() + BLOSC_MAX_OVERHEAD as usize,
                self.cname,
                self.configuration.blocksize
            )))
        }
    }

    fn decode(
        &self,
        encoded_value: Vec<u8>,
        _decoded_size: Option<usize>,
    ) -> Result<Vec<u8>, CodecError> {
        let mut destsize: usize = 0;
        let valid = encoded_value.len() >= BLOSC_MAX_OVERHEAD as usize
            && unsafe {
                blosc_cbuffer_validate(
                    encoded_value.as_ptr().cast::<c_void>(),
                    encoded_value.len(),
                    std::ptr::addr_of_mut!(destsize),
                )
            } == 0;
        if !valid {
            return Err(CodecError::Other("blosc encoded value is invalid".to_string()));
        }
        let mut nbytes: usize = 0;
        let mut cbytes: usize = 0;
        let mut blocksize: usize = 0;
        unsafe {
            blosc_cbuffer_sizes(
                encoded_value.as_ptr().cast::<c_void>(),
                std::ptr::addr_of_mut!(nbytes),
                std::ptr::addr_of_mut!(cbytes),
                std::ptr::addr_of_mut!(blocksize),
            );
        }
        if cbytes > encoded_value.len() {
            return Err(CodecError::Other("blosc encoded value is truncated".to_string()));
        }
        let mut dest: Vec<u8> = Vec::with_capacity(destsize);
        let destsize = unsafe {
            blosc_decompress_ctx(
                encoded_value.as_ptr().cast::<c_void>(),
                dest.as_mut_ptr().cast::<c_void>(),
                destsize,
                1,
            )
        };
        if destsize > 0 {
            #[allow(clippy::cast_sign_loss)]
            unsafe {
                dest.set_len(destsize as usize);
            }
            Ok(dest)
        } else if destsize == 0 && nbytes == 0 {
            Ok(dest)
        } else {
            Err(CodecError::Other("blosc decompression failed".to_string()))
        }
    }
}
