//! Windowed reads and writes.
//!
//! A window is a strided hyper-rectangle of an array: `count` elements per dimension starting at `start`,
//! `step` elements apart. A step can be negative, in which case the window runs backwards from `start`.
//! The bytes of a window are dense and in row-major order, whatever the steps.
//!
//! Each dimension of a window is split into segments: runs of consecutive window elements falling in the same chunk.
//! A window is read or written one intersecting chunk at a time, with rows of elements copied (or converted) between
//! the chunk and the window bytes.

use super::{
    chunk_store::ChunkStore, data_type::ValueConverter, ArrayError, ArrayIndices, ArrayShape,
    ExtendedDataType,
};

/// A validated window of an array.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Window {
    start: ArrayIndices,
    count: ArrayShape,
    step: Vec<i64>,
}

/// A run of window elements along one dimension in one chunk.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
struct Segment {
    /// The chunk grid index.
    chunk: u64,
    /// The index of the first element in the window.
    first: u64,
    /// The number of elements.
    len: u64,
    /// The index of the first element within the chunk.
    offset: u64,
}

#[allow(clippy::cast_possible_truncation)]
const fn to_usize(value: u64) -> usize {
    value as usize
}

impl Window {
    /// Create a window of an array of `shape`. The step defaults to `1` on every dimension.
    ///
    /// The step of a dimension with a single element is ignored.
    ///
    /// # Errors
    /// Returns an [`ArrayError`] if the dimensionality does not match `shape`, a step is zero, or an element of the window is outside of the array.
    pub(crate) fn new(
        shape: &[u64],
        start: &[u64],
        count: &[u64],
        step: Option<&[i64]>,
    ) -> Result<Self, ArrayError> {
        let ndim = shape.len();
        if start.len() != ndim {
            return Err(ArrayError::IncompatibleDimensionality(start.len(), ndim));
        }
        if count.len() != ndim {
            return Err(ArrayError::IncompatibleDimensionality(count.len(), ndim));
        }
        let step = match step {
            Some(step) if step.len() != ndim => {
                return Err(ArrayError::IncompatibleDimensionality(step.len(), ndim));
            }
            Some(step) => step.to_vec(),
            None => vec![1; ndim],
        };
        let invalid = || ArrayError::InvalidWindow {
            start: start.to_vec(),
            count: count.to_vec(),
            step: step.clone(),
            shape: shape.to_vec(),
        };

        let mut steps = Vec::with_capacity(ndim);
        for (((start, count), step), extent) in start.iter().zip(count).zip(&step).zip(shape) {
            if *count == 0 {
                if start > extent {
                    return Err(invalid());
                }
                steps.push(1);
                continue;
            }
            if *count > 1 && *step == 0 {
                return Err(ArrayError::ZeroStep);
            }
            let step = if *count == 1 { 1 } else { *step };
            let last = i128::from(*start) + i128::from(count - 1) * i128::from(step);
            if start >= extent || last < 0 || last >= i128::from(*extent) {
                return Err(invalid());
            }
            steps.push(step);
        }
        let window = Self {
            start: start.to_vec(),
            count: count.to_vec(),
            step: steps,
        };
        if window.num_elements().is_none() {
            return Err(ArrayError::WindowTooLarge(count.to_vec()));
        }
        Ok(window)
    }

    pub(crate) fn count(&self) -> &[u64] {
        &self.count
    }

    /// The number of elements of the window, [`None`] if it exceeds [`usize::MAX`].
    pub(crate) fn num_elements(&self) -> Option<usize> {
        self.count.iter().try_fold(1usize, |num_elements, count| {
            usize::try_from(*count)
                .ok()
                .and_then(|count| num_elements.checked_mul(count))
        })
    }

    fn segments(&self, chunk_shape: &[u64]) -> Vec<Vec<Segment>> {
        itertools::izip!(&self.start, &self.count, &self.step, chunk_shape)
            .map(|(start, count, step, chunk)| axis_segments(*start, *count, *step, *chunk))
            .collect()
    }
}

fn axis_segments(start: u64, count: u64, step: i64, chunk: u64) -> Vec<Segment> {
    let mut segments = Vec::new();
    let stride = step.unsigned_abs();
    let mut first = 0;
    while first < count {
        let index = if step > 0 {
            start + first * stride
        } else {
            start - first * stride
        };
        let offset = index % chunk;
        let remaining = if step > 0 {
            (chunk - 1 - offset) / stride + 1
        } else {
            offset / stride + 1
        };
        let len = remaining.min(count - first);
        segments.push(Segment {
            chunk: index / chunk,
            first,
            len,
            offset,
        });
        first += len;
    }
    segments
}

/// Row-major strides in elements.
fn strides(shape: &[u64]) -> Vec<usize> {
    let mut strides = vec![1; shape.len()];
    for axis in (0..shape.len().saturating_sub(1)).rev() {
        strides[axis] = strides[axis + 1] * to_usize(shape[axis + 1]);
    }
    strides
}

/// The index of the element `i` elements of `step` apart from `base`.
const fn step_index(base: usize, i: usize, step: i64) -> usize {
    let stride = to_usize(step.unsigned_abs());
    if step > 0 {
        base + i * stride
    } else {
        base - i * stride
    }
}

/// Call `f` with the chunk grid indices and the segments of each chunk intersecting the window.
fn for_each_chunk(
    segments: &[Vec<Segment>],
    mut f: impl FnMut(&[u64], &[Segment]) -> Result<(), ArrayError>,
) -> Result<(), ArrayError> {
    if segments.iter().any(Vec::is_empty) {
        return Ok(());
    }
    let mut positions = vec![0usize; segments.len()];
    loop {
        let chunk_segments: Vec<Segment> = segments
            .iter()
            .zip(&positions)
            .map(|(axis_segments, position)| axis_segments[*position])
            .collect();
        let chunk_indices: Vec<u64> = chunk_segments.iter().map(|segment| segment.chunk).collect();
        f(&chunk_indices, &chunk_segments)?;

        let mut axis = segments.len();
        loop {
            if axis == 0 {
                return Ok(());
            }
            axis -= 1;
            positions[axis] += 1;
            if positions[axis] < segments[axis].len() {
                break;
            }
            positions[axis] = 0;
        }
    }
}

/// Call `f(window_index, chunk_index, len, chunk_step)` for each row of window elements within a chunk.
///
/// Rows run along the last dimension. Indices are in elements.
fn for_each_row(
    segments: &[Segment],
    steps: &[i64],
    window_strides: &[usize],
    chunk_strides: &[usize],
    mut f: impl FnMut(usize, usize, usize, i64),
) {
    let Some((last, outer)) = segments.split_last() else {
        f(0, 0, 1, 1);
        return;
    };
    let last_step = steps[outer.len()];
    let mut positions = vec![0u64; outer.len()];
    loop {
        let mut window_index = to_usize(last.first);
        let mut chunk_index = to_usize(last.offset);
        for (axis, (segment, position)) in outer.iter().zip(&positions).enumerate() {
            window_index += to_usize(segment.first + position) * window_strides[axis];
            let offset = if steps[axis] > 0 {
                segment.offset + position * steps[axis].unsigned_abs()
            } else {
                segment.offset - position * steps[axis].unsigned_abs()
            };
            chunk_index += to_usize(offset) * chunk_strides[axis];
        }
        f(window_index, chunk_index, to_usize(last.len), last_step);

        let mut axis = outer.len();
        loop {
            if axis == 0 {
                return;
            }
            axis -= 1;
            positions[axis] += 1;
            if positions[axis] < outer[axis].len {
                break;
            }
            positions[axis] = 0;
        }
    }
}

/// Read a window as elements of `buffer_type`.
///
/// Elements of chunks which are not stored have the fill value, or zero if the array has no fill value.
///
/// # Errors
/// Returns an [`ArrayError`] if the data type of the array cannot be converted to `buffer_type` or a chunk cannot be retrieved.
pub(crate) fn read_window(
    store: &ChunkStore,
    window: &Window,
    buffer_type: &ExtendedDataType,
) -> Result<Vec<u8>, ArrayError> {
    let core = store.core();
    let converter = ValueConverter::new(core.data_type(), buffer_type)?;
    let (src_size, dst_size) = (converter.src_size(), converter.dst_size());
    let size = window
        .num_elements()
        .and_then(|num_elements| num_elements.checked_mul(dst_size))
        .ok_or_else(|| ArrayError::WindowTooLarge(window.count.clone()))?;
    let mut buffer = vec![0u8; size];
    if size == 0 {
        return Ok(buffer);
    }

    let mut fill = vec![0u8; dst_size];
    if let Some(fill_value) = core.fill_value() {
        converter.convert(fill_value.as_ne_bytes(), &mut fill);
    }
    let fill_is_zero = fill.iter().all(|byte| *byte == 0);
    let window_strides = strides(&window.count);
    let chunk_strides = strides(core.chunk_shape());

    for_each_chunk(&window.segments(core.chunk_shape()), |chunk_indices, segments| {
        let chunk = store.retrieve_chunk(chunk_indices)?;
        for_each_row(
            segments,
            &window.step,
            &window_strides,
            &chunk_strides,
            |window_index, chunk_index, len, chunk_step| {
                let out = &mut buffer[window_index * dst_size..(window_index + len) * dst_size];
                match &chunk {
                    None if fill_is_zero => {}
                    None => {
                        for element in out.chunks_exact_mut(dst_size) {
                            element.copy_from_slice(&fill);
                        }
                    }
                    Some(chunk) if chunk_step == 1 && converter.is_identity() => {
                        out.copy_from_slice(
                            &chunk[chunk_index * src_size..(chunk_index + len) * src_size],
                        );
                    }
                    Some(chunk) => {
                        for (i, element) in out.chunks_exact_mut(dst_size).enumerate() {
                            let index = step_index(chunk_index, i, chunk_step);
                            converter.convert(
                                &chunk[index * src_size..(index + 1) * src_size],
                                element,
                            );
                        }
                    }
                }
            },
        );
        Ok(())
    })?;
    Ok(buffer)
}

/// Write a window from `bytes`, elements of `buffer_type`.
///
/// A chunk entirely covered by the window is not read back from the store.
///
/// # Errors
/// Returns an [`ArrayError`] if `buffer_type` cannot be converted to the data type of the array,
/// `bytes` is not the size of the window, or a chunk cannot be retrieved or stored.
pub(crate) fn write_window(
    store: &ChunkStore,
    window: &Window,
    buffer_type: &ExtendedDataType,
    bytes: &[u8],
) -> Result<(), ArrayError> {
    let core = store.core();
    let converter = ValueConverter::new(buffer_type, core.data_type())?;
    let (src_size, dst_size) = (converter.src_size(), converter.dst_size());
    let expected = window
        .num_elements()
        .and_then(|num_elements| num_elements.checked_mul(src_size))
        .ok_or_else(|| ArrayError::WindowTooLarge(window.count.clone()))?;
    if bytes.len() != expected {
        return Err(ArrayError::InvalidBytesInputSize(bytes.len(), expected));
    }
    if expected == 0 {
        return Ok(());
    }

    let chunk_shape = core.chunk_shape();
    let chunk_elements = core.chunk_grid().chunk_num_elements();
    let fill_chunk = match core.fill_value() {
        Some(fill_value) => fill_value.repeat(chunk_elements),
        None => vec![0; chunk_elements * dst_size],
    };
    let window_strides = strides(&window.count);
    let chunk_strides = strides(chunk_shape);

    for_each_chunk(&window.segments(chunk_shape), |chunk_indices, segments| {
        let covered = itertools::izip!(segments, chunk_shape, &window.step)
            .all(|(segment, chunk, step)| segment.len == *chunk && step.unsigned_abs() == 1);
        let mut chunk = if covered {
            fill_chunk.clone()
        } else {
            store
                .retrieve_chunk(chunk_indices)?
                .unwrap_or_else(|| fill_chunk.clone())
        };
        for_each_row(
            segments,
            &window.step,
            &window_strides,
            &chunk_strides,
            |window_index, chunk_index, len, chunk_step| {
                if chunk_step == 1 && converter.is_identity() {
                    chunk[chunk_index * dst_size..(chunk_index + len) * dst_size].copy_from_slice(
                        &bytes[window_index * src_size..(window_index + len) * src_size],
                    );
                } else {
                    for i in 0..len {
                        let index = step_index(chunk_index, i, chunk_step);
                        converter.convert(
                            &bytes[(window_index + i) * src_size..(window_index + i + 1) * src_size],
                            &mut chunk[index * dst_size..(index + 1) * dst_size],
                        );
                    }
                }
            },
        );
        store.store_chunk(chunk_indices, chunk)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        array::{array_core::ArrayCore, NumericDataType},
        config::Config,
        node::NodePath,
        storage::{store::MemoryStore, ReadableStorageTraits},
    };

    fn core(shape: &[u64], chunks: &[u64], order: &str) -> ArrayCore {
        let metadata = serde_json::json!({
            "zarr_format": 2,
            "shape": shape,
            "chunks": chunks,
            "dtype": "<i4",
            "compressor": null,
            "fill_value": null,
            "filters": null,
            "order": order,
        });
        ArrayCore::new("/a", serde_json::from_value(metadata).unwrap()).unwrap()
    }

    /// A linear congruential generator, so windows are reproducible.
    struct Lcg(u64);

    impl Lcg {
        fn next(&mut self, bound: u64) -> u64 {
            self.0 = self
                .0
                .wrapping_mul(6_364_136_223_846_793_005)
                .wrapping_add(1_442_695_040_888_963_407);
            (self.0 >> 33) % bound
        }
    }

    fn naive(shape: &[u64], start: &[u64], count: &[u64], step: &[i64]) -> Vec<i32> {
        let array_strides = strides(shape);
        let num_elements: u64 = count.iter().product();
        let count_strides = strides(count);
        (0..to_usize(num_elements))
            .map(|linear| {
                let mut index = 0;
                for axis in 0..shape.len() {
                    let k = (linear / count_strides[axis]) % to_usize(count[axis]);
                    let element = start[axis] as i64 + k as i64 * step[axis];
                    index += element as usize * array_strides[axis];
                }
                index as i32
            })
            .collect()
    }

    fn check_strided_reads(shape: &[u64], chunks: &[u64], order: &str) {
        let storage = MemoryStore::new();
        let path = NodePath::new("/a").unwrap();
        let core = core(shape, chunks, order);
        let config = Config::default();
        let store = ChunkStore::new(&storage, &path, &core, &config);
        let buffer_type = ExtendedDataType::from(NumericDataType::Int32);

        let num_elements: u64 = shape.iter().product();
        let values: Vec<i32> = (0..num_elements as i32).collect();
        let window = Window::new(shape, &vec![0; shape.len()], shape, None).unwrap();
        write_window(&store, &window, &buffer_type, bytemuck::cast_slice(&values)).unwrap();

        let mut lcg = Lcg(shape.len() as u64);
        let steps = [-3i64, -1, 1, 2, 3];
        for _ in 0..200 {
            let mut start = Vec::new();
            let mut count = Vec::new();
            let mut step = Vec::new();
            for extent in shape {
                let s = steps[to_usize(lcg.next(steps.len() as u64))];
                let first = lcg.next(*extent);
                let available = if s > 0 {
                    (extent - 1 - first) / s.unsigned_abs() + 1
                } else {
                    first / s.unsigned_abs() + 1
                };
                start.push(first);
                count.push(lcg.next(available) + 1);
                step.push(s);
            }
            let window = Window::new(shape, &start, &count, Some(&step)).unwrap();
            let bytes = read_window(&store, &window, &buffer_type).unwrap();
            let elements: Vec<i32> = bytemuck::pod_collect_to_vec(&bytes);
            assert_eq!(
                elements,
                naive(shape, &start, &count, &step),
                "start {start:?} count {count:?} step {step:?}"
            );
        }
    }

    #[test]
    fn windowed_io_strided_reads() {
        check_strided_reads(&[23], &[5], "C");
        check_strided_reads(&[11, 13], &[4, 5], "C");
        check_strided_reads(&[11, 13], &[4, 5], "F");
        check_strided_reads(&[5, 7, 9], &[2, 3, 4], "C");
        check_strided_reads(&[4, 5, 3, 7], &[3, 2, 2, 3], "F");
    }

    #[test]
    fn windowed_io_strided_write() {
        let storage = MemoryStore::new();
        let path = NodePath::new("/a").unwrap();
        let core = core(&[10], &[3], "C");
        let config = Config::default();
        let store = ChunkStore::new(&storage, &path, &core, &config);
        let buffer_type = ExtendedDataType::from(NumericDataType::Int32);

        let window = Window::new(&[10], &[9], &[4], Some(&[-3])).unwrap();
        write_window(&store, &window, &buffer_type, bytemuck::cast_slice(&[1i32, 2, 3, 4]))
            .unwrap();
        let window = Window::new(&[10], &[0], &[10], None).unwrap();
        let elements: Vec<i32> =
            bytemuck::pod_collect_to_vec(&read_window(&store, &window, &buffer_type).unwrap());
        assert_eq!(elements, vec![4, 0, 0, 3, 0, 0, 2, 0, 0, 1]);
    }

    #[test]
    fn windowed_io_conversion_and_fill() {
        let storage = MemoryStore::new();
        let path = NodePath::new("/a").unwrap();
        let metadata = serde_json::json!({
            "zarr_format": 2, "shape": [6], "chunks": [4], "dtype": "<u2",
            "compressor": null, "fill_value": 7, "filters": null, "order": "C",
        });
        let core = ArrayCore::new("/a", serde_json::from_value(metadata).unwrap()).unwrap();
        let config = Config::default();
        let store = ChunkStore::new(&storage, &path, &core, &config);

        let window = Window::new(&[6], &[4], &[2], None).unwrap();
        let float = ExtendedDataType::from(NumericDataType::Float64);
        write_window(&store, &window, &float, bytemuck::cast_slice(&[1.6f64, 300.0])).unwrap();
        let window = Window::new(&[6], &[0], &[6], None).unwrap();
        let elements: Vec<f64> =
            bytemuck::pod_collect_to_vec(&read_window(&store, &window, &float).unwrap());
        assert_eq!(elements, vec![7.0, 7.0, 7.0, 7.0, 2.0, 300.0]);
        assert!(storage.get(&store.key(&[0])).unwrap().is_none());
    }

    #[test]
    fn windowed_io_invalid_windows() {
        assert!(matches!(
            Window::new(&[10], &[0], &[2], Some(&[0])),
            Err(ArrayError::ZeroStep)
        ));
        assert!(Window::new(&[10], &[0], &[1], Some(&[0])).is_ok());
        assert!(Window::new(&[10], &[2], &[2], Some(&[-3])).is_err());
        assert!(Window::new(&[10], &[9], &[4], Some(&[-3])).is_ok());
        assert!(Window::new(&[10], &[9], &[2], Some(&[1])).is_err());
        assert!(Window::new(&[10], &[10], &[1], None).is_err());
        assert!(Window::new(&[10], &[10], &[0], None).is_ok());
        assert!(Window::new(&[10], &[11], &[0], None).is_err());
        assert!(matches!(
            Window::new(&[10, 10], &[0], &[1], None),
            Err(ArrayError::IncompatibleDimensionality(1, 2))
        ));
    }

    #[test]
    fn windowed_io_zero_dimensional() {
        let storage = MemoryStore::new();
        let path = NodePath::new("/a").unwrap();
        let core = core(&[], &[], "C");
        let config = Config::default();
        let store = ChunkStore::new(&storage, &path, &core, &config);
        let buffer_type = ExtendedDataType::from(NumericDataType::Int32);
        let window = Window::new(&[], &[], &[], None).unwrap();
        write_window(&store, &window, &buffer_type, &5i32.to_ne_bytes()).unwrap();
        assert_eq!(store.key(&[]).as_str(), "a/0");
        assert_eq!(
            read_window(&store, &window, &buffer_type).unwrap(),
            5i32.to_ne_bytes()
        );
    }
}
