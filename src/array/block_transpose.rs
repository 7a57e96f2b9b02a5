//! In-memory transposition of matrices of fixed-size elements.

/// The edge length of the square tiles a matrix is transposed by.
const TILE: usize = 64;

/// Transpose the row-major `rows`×`cols` matrix `src` of `element_size` byte elements into the row-major `cols`×`rows` matrix `dst`.
///
/// The matrix is processed in square tiles so that both the reads and the writes of a tile stay cache resident.
///
/// # Panics
/// Panics if `src` or `dst` is not `rows * cols * element_size` bytes long.
pub(crate) fn transpose_2d(src: &[u8], dst: &mut [u8], rows: usize, cols: usize, element_size: usize) {
    assert_eq!(src.len(), rows * cols * element_size);
    assert_eq!(dst.len(), src.len());
    match element_size {
        1 => transpose_tiled::<1>(src, dst, rows, cols),
        2 => transpose_tiled::<2>(src, dst, rows, cols),
        4 => transpose_tiled::<4>(src, dst, rows, cols),
        8 => transpose_tiled::<8>(src, dst, rows, cols),
        16 => transpose_tiled::<16>(src, dst, rows, cols),
        _ => transpose_any(src, dst, rows, cols, element_size),
    }
}

/// Transpose the last two axes of a batch of `batch` consecutive `rows`×`cols` matrices.
pub(crate) fn transpose_2d_batched(
    src: &[u8],
    dst: &mut [u8],
    batch: usize,
    rows: usize,
    cols: usize,
    element_size: usize,
) {
    let matrix_size = rows * cols * element_size;
    if matrix_size == 0 {
        return;
    }
    for (src, dst) in src
        .chunks_exact(matrix_size)
        .zip(dst.chunks_exact_mut(matrix_size))
        .take(batch)
    {
        transpose_2d(src, dst, rows, cols, element_size);
    }
}

fn transpose_tiled<const N: usize>(src: &[u8], dst: &mut [u8], rows: usize, cols: usize) {
    let src: &[[u8; N]] = bytemuck::cast_slice(src);
    let dst: &mut [[u8; N]] = bytemuck::cast_slice_mut(dst);
    for row_tile in (0..rows).step_by(TILE) {
        let row_end = (row_tile + TILE).min(rows);
        for col_tile in (0..cols).step_by(TILE) {
            let col_end = (col_tile + TILE).min(cols);
            for row in row_tile..row_end {
                let src_row = &src[row * cols..(row + 1) * cols];
                for col in col_tile..col_end {
                    dst[col * rows + row] = src_row[col];
                }
            }
        }
    }
}

fn transpose_any(src: &[u8], dst: &mut [u8], rows: usize, cols: usize, element_size: usize) {
    for row in 0..rows {
        for col in 0..cols {
            let s = (row * cols + col) * element_size;
            let d = (col * rows + row) * element_size;
            dst[d..d + element_size].copy_from_slice(&src[s..s + element_size]);
        }
    }
}
