use thiserror::Error;

use crate::{
    metadata::{DataTypeMetadataError, FillValueMetadataError},
    plugin::PluginCreateError,
    storage::StorageError,
};

use super::{
    chunk_grid::ChunkGridError, codec::CodecError, data_type::DataTypeError, ArrayIndices,
    ArrayShape,
};

/// An array creation error.
#[derive(Debug, Error)]
pub enum ArrayCreateError {
    /// Unsupported data type.
    #[error(transparent)]
    DataTypeMetadataError(#[from] DataTypeMetadataError),
    /// An invalid data type.
    #[error(transparent)]
    DataTypeError(#[from] DataTypeError),
    /// A variable-length string data type.
    #[error("String arrays of unlimited size are not supported")]
    VariableLengthString,
    /// Invalid fill value.
    #[error(transparent)]
    InvalidFillValue(#[from] FillValueMetadataError),
    /// A fill value whose size does not match the data type.
    #[error("fill value has {0} bytes, expected {1}")]
    InvalidFillValueSize(usize, usize),
    /// Error creating codecs.
    #[error(transparent)]
    CodecsCreateError(#[from] PluginCreateError),
    /// An invalid chunk grid.
    #[error(transparent)]
    ChunkGridError(#[from] ChunkGridError),
    /// Storage error.
    #[error(transparent)]
    StorageError(#[from] StorageError),
    /// An error deserializing the metadata.
    #[error(transparent)]
    MetadataDeserializationError(#[from] serde_json::Error),
    /// Missing metadata.
    #[error("array metadata is missing")]
    MissingMetadata,
}

/// Array errors.
#[derive(Debug, Error)]
pub enum ArrayError {
    /// A store error.
    #[error(transparent)]
    StorageError(#[from] StorageError),
    /// A chunk could not be encoded or decoded.
    #[error("chunk {chunk:?}: {source}")]
    ChunkError {
        /// The chunk grid indices of the chunk.
        chunk: ArrayIndices,
        /// The codec error.
        source: CodecError,
    },
    /// Incompatible dimensionality.
    #[error("got {_0} dimensions, expected {_1}")]
    IncompatibleDimensionality(usize, usize),
    /// A window which is not within the array.
    #[error("window start {start:?} count {count:?} step {step:?} is not compatible with array shape {shape:?}")]
    InvalidWindow {
        /// The start of the window.
        start: ArrayIndices,
        /// The number of elements of the window per dimension.
        count: ArrayShape,
        /// The step of the window per dimension.
        step: Vec<i64>,
        /// The shape of the array.
        shape: ArrayShape,
    },
    /// A zero step.
    #[error("step cannot be zero")]
    ZeroStep,
    /// An unexpected bytes input size.
    #[error("got bytes with size {_0}, expected {_1}")]
    InvalidBytesInputSize(usize, usize),
    /// Incompatible data types.
    #[error(transparent)]
    DataTypeError(#[from] DataTypeError),
    /// A window too large to be held in memory.
    #[error("window of {0:?} elements is too large")]
    WindowTooLarge(ArrayShape),
}
