//! The memory-layout stage.
//!
//! A chunk of an array with [`F`](crate::metadata::ArrayMetadataOrder::F) order is stored with its elements in column-major order.
//! This is a reversal of all axes of the row-major chunk.

use crate::array::{block_transpose, codec::CodecError};

fn chunk_shape_usize(chunk_shape: &[u64]) -> Result<Vec<usize>, CodecError> {
    chunk_shape
        .iter()
        .map(|size| {
            usize::try_from(*size).map_err(|_| CodecError::Other("chunk too large".to_string()))
        })
        .collect()
}

fn reverse_axes(bytes: &[u8], shape: &[usize], element_size: usize) -> Result<Vec<u8>, CodecError> {
    let expected = shape.iter().product::<usize>() * element_size;
    if bytes.len() != expected {
        return Err(CodecError::UnexpectedChunkDecodedSize(bytes.len(), expected));
    }
    match shape {
        [] | [_] => Ok(bytes.to_vec()),
        [rows, cols] => {
            let mut transposed = vec![0; bytes.len()];
            block_transpose::transpose_2d(bytes, &mut transposed, *rows, *cols, element_size);
            Ok(transposed)
        }
        _ => {
            let mut shape_with_element = shape.to_vec();
            shape_with_element.push(element_size);
            let view = ndarray::ArrayViewD::<u8>::from_shape(shape_with_element, bytes)
                .map_err(|err| CodecError::Other(err.to_string()))?;
            let axes: Vec<usize> = (0..shape.len())
                .rev()
                .chain(std::iter::once(shape.len()))
                .collect();
            Ok(view.permuted_axes(axes).iter().copied().collect())
        }
    }
}

/// Reorder a row-major chunk of `chunk_shape` to column-major.
///
/// # Errors
/// Returns a [`CodecError`] if `bytes` does not hold a chunk of `chunk_shape`.
pub fn encode_column_major(
    bytes: &[u8],
    chunk_shape: &[u64],
    element_size: usize,
) -> Result<Vec<u8>, CodecError> {
    reverse_axes(bytes, &chunk_shape_usize(chunk_shape)?, element_size)
}

/// Reorder a column-major chunk of `chunk_shape` to row-major.
///
/// # Errors
/// Returns a [`CodecError`] if `bytes` does not hold a chunk of `chunk_shape`.
pub fn decode_column_major(
    bytes: &[u8],
    chunk_shape: &[u64],
    element_size: usize,
) -> Result<Vec<u8>, CodecError> {
    let mut reversed = chunk_shape_usize(chunk_shape)?;
    reversed.reverse();
    reverse_axes(bytes, &reversed, element_size)
}
