use std::sync::Arc;

use mdstore::{
    array::{ArrayCreateOptions, ExtendedDataType, FillValue, MDArray, NumericDataType},
    dataset::{Dataset, OpenOptions},
    dimension::DimensionCreateOptions,
    error::MdError,
    storage::{
        store::MemoryStore, ReadableStorageTraits, ReadableWritableListableStorage, StoreKey,
        WritableStorageTraits,
    },
};

/// A 6x8 array of 2x2 chunks with a scattered selection of chunks written.
fn create_sparse_array(
    store: &ReadableWritableListableStorage,
) -> Result<MDArray, Box<dyn std::error::Error>> {
    let dataset = Dataset::create(store.clone(), &OpenOptions::default())?;
    let root = dataset.root_group();
    let y = root.create_dimension("y", 6, &DimensionCreateOptions::default())?;
    let x = root.create_dimension("x", 8, &DimensionCreateOptions::default())?;
    let mut options = ArrayCreateOptions::default();
    options
        .chunk_shape(vec![2, 2])
        .fill_value(Some(FillValue::from(-1i16)));
    let array = root.create_md_array(
        "a",
        &[y, x],
        ExtendedDataType::numeric(NumericDataType::Int16),
        &options,
    )?;
    array.write_elements(&[0, 0], &[1, 3], None, &[1i16, 2, 3])?;
    array.write_elements(&[3, 5], &[2, 2], None, &[4i16, 5, 6, 7])?;
    array.write_elements(&[5, 7], &[1, 1], None, &[8i16])?;
    Ok(array)
}

fn read_all(array: &MDArray) -> Result<Vec<i16>, MdError> {
    array.read_elements(&[0, 0], &[6, 8], None)
}

#[test]
fn tile_presence_transparency() -> Result<(), Box<dyn std::error::Error>> {
    let store: ReadableWritableListableStorage = Arc::new(MemoryStore::new());
    let array = create_sparse_array(&store)?;
    let expected = read_all(&array)?;
    assert_eq!(expected.iter().filter(|v| **v != -1).count(), 8);

    array.cache_tile_presence()?;
    assert_eq!(read_all(&array)?, expected);
    let status = store
        .get(&StoreKey::new(".cache/_a_tile_presence/.zattrs")?)?
        .ok_or("missing cache attributes")?;
    let status: serde_json::Value = serde_json::from_slice(&status)?;
    assert_eq!(status["filling_status"], "some_tiles_missing");

    let dataset = Dataset::open(store.clone(), &OpenOptions::default())?;
    assert_eq!(dataset.root_group().md_array_names()?, vec!["a"]);
    assert_eq!(read_all(&dataset.root_group().open_md_array("a")?)?, expected);

    // A write through a handle with the cache keeps it up to date.
    array.write_elements(&[2, 2], &[1, 1], None, &[9i16])?;
    let dataset = Dataset::open(store, &OpenOptions::default())?;
    let read = read_all(&dataset.root_group().open_md_array("a")?)?;
    assert_eq!(read[2 * 8 + 2], 9);
    Ok(())
}

#[test]
fn tile_presence_separate_cache_store() -> Result<(), Box<dyn std::error::Error>> {
    let store: ReadableWritableListableStorage = Arc::new(MemoryStore::new());
    let expected = read_all(&create_sparse_array(&store)?)?;

    let cache: ReadableWritableListableStorage = Arc::new(MemoryStore::new());
    let mut options = OpenOptions::default();
    options.cache_storage(Some(cache.clone()));
    let dataset = Dataset::open(store.clone(), &options)?;
    let array = dataset.root_group().open_md_array("a")?;
    array.cache_tile_presence()?;
    assert!(cache.exists(&StoreKey::new("_a_tile_presence/.zarray")?)?);
    assert!(!store.exists(&StoreKey::new(".cache/_a_tile_presence/.zarray")?)?);
    assert_eq!(read_all(&array)?, expected);

    let dataset = Dataset::open(store, &options)?;
    assert_eq!(read_all(&dataset.root_group().open_md_array("a")?)?, expected);
    Ok(())
}

#[test]
fn tile_presence_edited_cache() -> Result<(), Box<dyn std::error::Error>> {
    let store: ReadableWritableListableStorage = Arc::new(MemoryStore::new());
    let array = create_sparse_array(&store)?;
    array.cache_tile_presence()?;

    // The grid is 3x4 chunks, held in a single uncompressed chunk of the cache. Mark chunk [0, 0] absent.
    let key = StoreKey::new(".cache/_a_tile_presence/0.0")?;
    let mut presence = store.get(&key)?.ok_or("missing cache chunk")?;
    assert_eq!(presence.len(), 12);
    assert_eq!(presence[0], 1);
    presence[0] = 0;
    store.set(&key, &presence)?;

    let dataset = Dataset::open(store.clone(), &OpenOptions::default())?;
    let array = dataset.root_group().open_md_array("a")?;
    assert_eq!(
        array.read_elements::<i16>(&[0, 0], &[2, 2], None)?,
        vec![-1; 4]
    );
    assert_eq!(array.read_elements::<i16>(&[0, 2], &[1, 1], None)?, vec![3]);
    Ok(())
}

#[test]
fn tile_presence_mismatched_cache_ignored() -> Result<(), Box<dyn std::error::Error>> {
    let store: ReadableWritableListableStorage = Arc::new(MemoryStore::new());
    let expected = read_all(&create_sparse_array(&store)?)?;
    let metadata = serde_json::json!({
        "zarr_format": 2, "shape": [2, 2], "chunks": [2, 2], "dtype": "|u1",
        "compressor": null, "fill_value": null, "filters": null, "order": "C",
    });
    store.set(
        &StoreKey::new(".cache/_a_tile_presence/.zarray")?,
        &serde_json::to_vec(&metadata)?,
    )?;
    store.set(&StoreKey::new(".cache/_a_tile_presence/0.0")?, &[0; 4])?;

    let dataset = Dataset::open(store, &OpenOptions::default())?;
    assert_eq!(read_all(&dataset.root_group().open_md_array("a")?)?, expected);
    Ok(())
}

#[test]
fn tile_presence_erased_on_resize() -> Result<(), Box<dyn std::error::Error>> {
    let store: ReadableWritableListableStorage = Arc::new(MemoryStore::new());
    let dataset = Dataset::create(store.clone(), &OpenOptions::default())?;
    let root = dataset.root_group();
    let mut growable = DimensionCreateOptions::default();
    growable.growable(true);
    let t = root.create_dimension("t", 4, &growable)?;
    let mut options = ArrayCreateOptions::default();
    options.chunk_shape(vec![2]);
    let array = root.create_md_array(
        "a",
        &[t],
        ExtendedDataType::numeric(NumericDataType::UInt8),
        &options,
    )?;
    array.write_elements(&[0], &[1], None, &[5u8])?;
    array.cache_tile_presence()?;
    let key = StoreKey::new(".cache/_a_tile_presence/.zarray")?;
    assert!(store.exists(&key)?);
    array.resize(&[6])?;
    assert!(!store.exists(&key)?);
    array.write_elements(&[5], &[1], None, &[6u8])?;
    assert_eq!(
        array.read_elements::<u8>(&[0], &[6], None)?,
        vec![5, 0, 0, 0, 0, 6]
    );
    Ok(())
}
