//! A placeholder for codecs without a registered implementation.

use crate::{
    array::codec::{BytesToBytesCodecTraits, CodecError},
    metadata::CodecMetadata,
};

/// A codec which is not supported.
///
/// The metadata is retained so the array metadata can be rewritten unchanged.
#[derive(Clone, Debug)]
pub struct UnsupportedCodec {
    metadata: CodecMetadata,
}

impl UnsupportedCodec {
    /// Create a new unsupported codec placeholder.
    #[must_use]
    pub fn new(metadata: CodecMetadata) -> Self {
        Self { metadata }
    }
}

impl BytesToBytesCodecTraits for UnsupportedCodec {
    fn identifier(&self) -> &str {
        self.metadata.id()
    }

    fn create_metadata(&self) -> CodecMetadata {
        self.metadata.clone()
    }

    fn encode(&self, _decoded_value: Vec<u8>) -> Result<Vec<u8>, CodecError> {
        Err(CodecError::UnsupportedCodec(self.metadata.id().to_string()))
    }

    fn decode(
        &self,
        _encoded_value: Vec<u8>,
        _decoded_size: Option<usize>,
    ) -> Result<Vec<u8>, CodecError> {
        Err(CodecError::UnsupportedCodec(self.metadata.id().to_string()))
    }
}
