//! The `shuffle` filter.
//!
//! Groups the `i`-th byte of every element together, which often improves compression of numeric data.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{
    array::codec::{BytesToBytesCodecTraits, CodecError, CodecPlugin},
    metadata::CodecMetadata,
    plugin::{PluginCreateError, PluginMetadataInvalidError},
};

const IDENTIFIER: &str = "shuffle";

// Register the codec.
inventory::submit! {
    CodecPlugin::new(IDENTIFIER, is_name_shuffle, create_codec_shuffle)
}

fn is_name_shuffle(name: &str) -> bool {
    name.eq(IDENTIFIER)
}

fn create_codec_shuffle(
    metadata: &CodecMetadata,
    element_size: &usize,
) -> Result<Arc<dyn BytesToBytesCodecTraits>, PluginCreateError> {
    let configuration: ShuffleCodecConfiguration = metadata.to_configuration().map_err(|_| {
        PluginMetadataInvalidError::new(IDENTIFIER, "codec", metadata.to_string())
    })?;
    let elementsize = configuration.elementsize.unwrap_or(*element_size);
    if elementsize == 0 {
        return Err(PluginCreateError::Other(
            "the shuffle elementsize must be a positive integer".to_string(),
        ));
    }
    Ok(Arc::new(ShuffleCodec::new(elementsize)))
}

/// Configuration parameters for the `shuffle` codec.
#[derive(Serialize, Deserialize, Clone, Eq, PartialEq, Debug)]
pub struct ShuffleCodecConfiguration {
    /// The element size in bytes. Defaults to the array element size.
    #[serde(default)]
    pub elementsize: Option<usize>,
}

/// A `shuffle` codec implementation.
#[derive(Clone, Debug)]
pub struct ShuffleCodec {
    elementsize: usize,
}

impl ShuffleCodec {
    /// Create a new `shuffle` codec.
    #[must_use]
    pub fn new(elementsize: usize) -> Self {
        Self { elementsize }
    }
}

impl BytesToBytesCodecTraits for ShuffleCodec {
    fn identifier(&self) -> &str {
        IDENTIFIER
    }

    fn create_metadata(&self) -> CodecMetadata {
        let mut configuration = serde_json::Map::new();
        configuration.insert("elementsize".to_string(), self.elementsize.into());
        CodecMetadata::new(IDENTIFIER, configuration)
    }

    fn encode(&self, decoded_value: Vec<u8>) -> Result<Vec<u8>, CodecError> {
        if decoded_value.len() % self.elementsize != 0 {
            return Err(CodecError::Other("the shuffle codec expects the input byte length to be an integer multiple of the elementsize".to_string()));
        }
        let count = decoded_value.len() / self.elementsize;
        let mut encoded_value = vec![0; decoded_value.len()];
        for (i, element) in decoded_value.chunks_exact(self.elementsize).enumerate() {
            for (byte_index, byte) in element.iter().enumerate() {
                encoded_value[byte_index * count + i] = *byte;
            }
        }
        Ok(encoded_value)
    }

    fn decode(
        &self,
        encoded_value: Vec<u8>,
        _decoded_size: Option<usize>,
    ) -> Result<Vec<u8>, CodecError> {
        if encoded_value.len() % self.elementsize != 0 {
            return Err(CodecError::Other("the shuffle codec expects the input byte length to be an integer multiple of the elementsize".to_string()));
        }
        let count = encoded_value.len() / self.elementsize;
        let mut decoded_value = vec![0; encoded_value.len()];
        for (i, element) in decoded_value.chunks_exact_mut(self.elementsize).enumerate() {
            for (byte_index, byte) in element.iter_mut().enumerate() {
                *byte = encoded_value[byte_index * count + i];
            }
        }
        Ok(decoded_value)
    }
}
