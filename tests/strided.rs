use std::{sync::Arc, time::Instant};

use mdstore::{
    array::{ArrayCreateOptions, Element, ExtendedDataType, MDArray, NumericDataType},
    dataset::{Dataset, OpenOptions},
    dimension::DimensionCreateOptions,
    group::Group,
    metadata::{ArrayMetadataOrder, CodecMetadata},
    storage::store::MemoryStore,
};

fn create_array(
    root: &Group,
    name: &str,
    shape: &[u64],
    chunks: &[u64],
    data_type: NumericDataType,
    options: &mut ArrayCreateOptions,
) -> Result<MDArray, Box<dyn std::error::Error>> {
    let dimensions = shape
        .iter()
        .enumerate()
        .map(|(axis, size)| {
            root.create_dimension(
                &format!("{name}_{axis}"),
                *size,
                &DimensionCreateOptions::default(),
            )
        })
        .collect::<Result<Vec<_>, _>>()?;
    options.chunk_shape(chunks.to_vec());
    Ok(root.create_md_array(
        name,
        &dimensions,
        ExtendedDataType::numeric(data_type),
        options,
    )?)
}

/// The linear indices of the elements of a window, computed element by element.
fn naive_window(shape: &[u64], start: &[u64], count: &[u64], step: &[i64]) -> Vec<i64> {
    let num_elements: u64 = count.iter().product();
    (0..num_elements)
        .map(|linear| {
            let mut remainder = linear;
            let mut index = 0i64;
            let mut stride = 1i64;
            for axis in (0..shape.len()).rev() {
                let k = (remainder % count[axis]) as i64;
                remainder /= count[axis];
                index += (start[axis] as i64 + k * step[axis]) * stride;
                stride *= shape[axis] as i64;
            }
            index
        })
        .collect()
}

/// A xorshift generator, so windows are reproducible.
struct XorShift(u64);

impl XorShift {
    fn below(&mut self, bound: u64) -> u64 {
        self.0 ^= self.0 << 13;
        self.0 ^= self.0 >> 7;
        self.0 ^= self.0 << 17;
        self.0 % bound
    }
}

fn check_strided(
    shape: &[u64],
    chunks: &[u64],
    order: ArrayMetadataOrder,
) -> Result<(), Box<dyn std::error::Error>> {
    let dataset = Dataset::create(Arc::new(MemoryStore::new()), &OpenOptions::default())?;
    let mut options = ArrayCreateOptions::default();
    options.order(order);
    let array = create_array(
        &dataset.root_group(),
        "a",
        shape,
        chunks,
        NumericDataType::Int64,
        &mut options,
    )?;
    let num_elements: u64 = shape.iter().product();
    let values: Vec<i64> = (0..num_elements as i64).collect();
    array.write_elements(&vec![0; shape.len()], shape, None, &values)?;

    let steps = [-3i64, -1, 1, 2, 3];
    let mut rng = XorShift(0x9E37_79B9_7F4A_7C15 ^ shape.len() as u64);
    for _ in 0..100 {
        let (mut start, mut count, mut step) = (vec![], vec![], vec![]);
        for extent in shape {
            let s = steps[rng.below(steps.len() as u64) as usize];
            let first = rng.below(*extent);
            let available = if s > 0 {
                (extent - 1 - first) / s.unsigned_abs() + 1
            } else {
                first / s.unsigned_abs() + 1
            };
            start.push(first);
            count.push(rng.below(available) + 1);
            step.push(s);
        }
        assert_eq!(
            array.read_elements::<i64>(&start, &count, Some(&step))?,
            naive_window(shape, &start, &count, &step),
            "start {start:?} count {count:?} step {step:?}"
        );
    }
    Ok(())
}

#[test]
fn strided_read_equivalence() -> Result<(), Box<dyn std::error::Error>> {
    check_strided(&[29], &[4], ArrayMetadataOrder::C)?;
    check_strided(&[9, 14], &[4, 3], ArrayMetadataOrder::C)?;
    check_strided(&[9, 14], &[4, 3], ArrayMetadataOrder::F)?;
    check_strided(&[6, 5, 7], &[2, 3, 2], ArrayMetadataOrder::C)?;
    check_strided(&[4, 3, 5, 6], &[3, 2, 2, 4], ArrayMetadataOrder::F)?;
    Ok(())
}

fn check_transpose<T: Element + PartialEq + std::fmt::Debug>(
    root: &Group,
    name: &str,
    storage_type: NumericDataType,
    value: impl Fn(u64) -> T,
) -> Result<(), Box<dyn std::error::Error>> {
    let (rows, columns) = (41u64, 37u64);
    let array = create_array(
        root,
        name,
        &[rows, columns],
        &[16, 16],
        storage_type,
        &mut ArrayCreateOptions::default(),
    )?;
    let values: Vec<T> = (0..rows * columns).map(|i| value(i & 255)).collect();
    array.write_elements(&[0, 0], &[rows, columns], None, &values)?;

    let transposed = array.transpose(&[1, 0])?;
    assert_eq!(transposed.shape()?, vec![columns, rows]);
    let expected: Vec<T> = (0..columns)
        .flat_map(|i| (0..rows).map(move |j| (j * columns + i) & 255))
        .map(&value)
        .collect();
    assert_eq!(
        transposed.read_elements::<T>(&[0, 0], &[columns, rows], None)?,
        expected
    );
    Ok(())
}

#[test]
fn transpose_correctness() -> Result<(), Box<dyn std::error::Error>> {
    let dataset = Dataset::create(Arc::new(MemoryStore::new()), &OpenOptions::default())?;
    let root = dataset.root_group();
    check_transpose(&root, "u8_u8", NumericDataType::UInt8, |v| v as u8)?;
    check_transpose(&root, "u8_f64", NumericDataType::UInt8, |v| v as f64)?;
    check_transpose(&root, "i16_i32", NumericDataType::Int16, |v| v as i32)?;
    check_transpose(&root, "f32_f32", NumericDataType::Float32, |v| v as f32)?;
    check_transpose(&root, "f64_u16", NumericDataType::Float64, |v| v as u16)?;
    check_transpose(&root, "u64_i64", NumericDataType::UInt64, |v| v as i64)?;
    Ok(())
}

#[test]
fn transposed_read_performance() -> Result<(), Box<dyn std::error::Error>> {
    let dataset = Dataset::create(Arc::new(MemoryStore::new()), &OpenOptions::default())?;
    let mut options = ArrayCreateOptions::default();
    options.compressor(Some(CodecMetadata::new("zlib", serde_json::Map::new())));
    let size = 1024;
    let array = create_array(
        &dataset.root_group(),
        "a",
        &[size, size],
        &[256, 256],
        NumericDataType::UInt8,
        &mut options,
    )?;
    let values: Vec<u8> = (0..size * size).map(|i| (i % 251) as u8).collect();
    array.write_elements(&[0, 0], &[size, size], None, &values)?;

    let transposed = array.transpose(&[1, 0])?;
    let start = Instant::now();
    let read = transposed.read_elements::<u8>(&[0, 0], &[size, size], None)?;
    let elapsed = start.elapsed();
    assert_eq!(read[1], values[size as usize]);
    assert_eq!(read[size as usize], values[1]);
    assert!(elapsed.as_secs_f64() < 1.0, "transposed read took {elapsed:?}");
    Ok(())
}

#[test]
fn view_writes_and_negative_steps() -> Result<(), Box<dyn std::error::Error>> {
    let dataset = Dataset::create(Arc::new(MemoryStore::new()), &OpenOptions::default())?;
    let array = create_array(
        &dataset.root_group(),
        "a",
        &[2, 3, 4],
        &[1, 2, 3],
        NumericDataType::Int32,
        &mut ArrayCreateOptions::default(),
    )?;
    let values: Vec<i32> = (0..24).collect();
    array.write_elements(&[0, 0, 0], &[2, 3, 4], None, &values)?;

    // view[k, i] = array[1, i, k]
    let view = array.slice(0, 1)?.transpose(&[1, 0])?;
    assert_eq!(view.shape()?, vec![4, 3]);
    assert_eq!(
        view.read_elements::<i32>(&[3, 2], &[2, 3], Some(&[-2, -1]))?,
        vec![23, 19, 15, 21, 17, 13]
    );
    view.write_elements(&[0, 0], &[4, 1], None, &[-1i32, -2, -3, -4])?;
    assert_eq!(
        array.read_elements::<i32>(&[1, 0, 0], &[1, 1, 4], None)?,
        vec![-1, -2, -3, -4]
    );
    assert_eq!(
        array.read_elements::<i32>(&[0, 0, 0], &[1, 1, 4], None)?,
        vec![0, 1, 2, 3]
    );
    assert!(view.read_elements::<i32>(&[0], &[1], None).is_err());
    assert!(array.transpose(&[0, 0, 1]).is_err());
    assert!(array.slice(3, 0).is_err());
    assert!(array.slice(0, 2).is_err());
    Ok(())
}
