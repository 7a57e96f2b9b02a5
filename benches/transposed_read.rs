use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use mdstore::{
    array::{ArrayCreateOptions, ExtendedDataType, NumericDataType},
    dataset::{Dataset, OpenOptions},
    dimension::DimensionCreateOptions,
    metadata::CodecMetadata,
    storage::store::MemoryStore,
};

fn transposed_read(c: &mut Criterion) {
    let mut group = c.benchmark_group("transposed_read");
    for size in [256u64, 1024] {
        let dataset =
            Dataset::create(Arc::new(MemoryStore::new()), &OpenOptions::default()).unwrap();
        let root = dataset.root_group();
        let y = root
            .create_dimension("y", size, &DimensionCreateOptions::default())
            .unwrap();
        let x = root
            .create_dimension("x", size, &DimensionCreateOptions::default())
            .unwrap();
        let mut options = ArrayCreateOptions::default();
        options.compressor(Some(CodecMetadata::new("zlib", serde_json::Map::new())));
        let array = root
            .create_md_array(
                "a",
                &[y, x],
                ExtendedDataType::numeric(NumericDataType::UInt8),
                &options,
            )
            .unwrap();
        let values: Vec<u8> = (0..size * size).map(|i| (i % 253) as u8).collect();
        array
            .write_elements(&[0, 0], &[size, size], None, &values)
            .unwrap();
        let transposed = array.transpose(&[1, 0]).unwrap();

        group.throughput(Throughput::Bytes(size * size));
        group.bench_function(BenchmarkId::new("full", size), |b| {
            b.iter(|| {
                transposed
                    .read_elements::<u8>(&[0, 0], &[size, size], None)
                    .unwrap()
            });
        });
        group.bench_function(BenchmarkId::new("strided", size), |b| {
            b.iter(|| {
                transposed
                    .read_elements::<u8>(&[size - 1, 0], &[size / 2, size / 2], Some(&[-2, 2]))
                    .unwrap()
            });
        });
    }
    group.finish();
}

criterion_group!(benches, transposed_read);
criterion_main!(benches);
