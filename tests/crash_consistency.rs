use std::{collections::BTreeMap, sync::Arc};

use mdstore::{
    array::{ArrayCreateOptions, ExtendedDataType, NumericDataType},
    attribute::AttributeValue,
    dataset::{Dataset, OpenOptions},
    dimension::DimensionCreateOptions,
    error::MdError,
    storage::{
        storage_adapter::FailingStorageAdapter, store::MemoryStore, ListableStorageTraits,
        ReadableStorageTraits,
    },
};

type Storage = Arc<FailingStorageAdapter<MemoryStore>>;

/// Every key and value of the store.
fn snapshot(storage: &Storage) -> Result<BTreeMap<String, Vec<u8>>, Box<dyn std::error::Error>> {
    let store = storage.inner();
    let mut snapshot = BTreeMap::new();
    for key in store.list()? {
        if let Some(value) = store.get(&key)? {
            snapshot.insert(key.as_str().to_string(), value);
        }
    }
    Ok(snapshot)
}

/// A dataset with a group `g` holding the dimensions `t` and `x`, and two arrays along them.
fn populated() -> Result<(Storage, Dataset), Box<dyn std::error::Error>> {
    let storage = Arc::new(FailingStorageAdapter::new(Arc::new(MemoryStore::new())));
    let dataset = Dataset::create(storage.clone(), &OpenOptions::default())?;
    let g = dataset.root_group().create_group("g")?;
    let mut growable = DimensionCreateOptions::default();
    growable.growable(true);
    let t = g.create_dimension("t", 2, &growable)?;
    let x = g.create_dimension("x", 3, &DimensionCreateOptions::default())?;
    let float32 = ExtendedDataType::numeric(NumericDataType::Float32);
    let options = ArrayCreateOptions::default();
    let a = g.create_md_array("a", &[t.clone(), x], float32.clone(), &options)?;
    let b = g.create_md_array("b", &[t], float32, &options)?;
    a.write_elements(&[0, 0], &[2, 3], None, &[1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0])?;
    b.write_elements(&[0], &[2], None, &[7.0f32, 8.0])?;
    a.create_attribute("title", &AttributeValue::String("a".into()))?;
    Ok((storage, dataset))
}

/// Run `mutation` with an injected failure at each successive write until it succeeds.
///
/// After each failure, the store must hold exactly what it held before, and must reopen to the same hierarchy.
fn check_mutation(
    mutation: impl Fn(&Dataset) -> Result<(), MdError>,
) -> Result<usize, Box<dyn std::error::Error>> {
    for successful_writes in 0.. {
        let (storage, dataset) = populated()?;
        let before = snapshot(&storage)?;
        let tree = dataset.hierarchy_tree();

        storage.fail_after(successful_writes);
        let result = mutation(&dataset);
        storage.disarm();
        if result.is_ok() {
            return Ok(successful_writes);
        }
        assert_eq!(storage.failures(), 1);
        assert_eq!(snapshot(&storage)?, before, "after {successful_writes} writes");

        let reopened = Dataset::open(storage.clone(), &OpenOptions::default())?;
        assert_eq!(reopened.hierarchy_tree(), tree);
        let g = reopened.root_group().open_group("g")?;
        assert_eq!(
            g.open_md_array("a")?.read_elements::<f32>(&[0, 0], &[2, 3], None)?,
            vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]
        );
    }
    unreachable!()
}

#[test]
fn crash_consistency_create_array() -> Result<(), Box<dyn std::error::Error>> {
    let writes = check_mutation(|dataset| {
        let g = dataset.root_group().open_group("g")?;
        let dimensions = g.dimensions()?;
        g.create_md_array(
            "c",
            &dimensions,
            ExtendedDataType::numeric(NumericDataType::Int8),
            &ArrayCreateOptions::default(),
        )?;
        Ok(())
    })?;
    assert!(writes >= 2);
    Ok(())
}

#[test]
fn crash_consistency_rename_group() -> Result<(), Box<dyn std::error::Error>> {
    let writes = check_mutation(|dataset| dataset.root_group().open_group("g")?.rename("h"))?;
    assert!(writes >= 1);
    Ok(())
}

#[test]
fn crash_consistency_rename_dimension() -> Result<(), Box<dyn std::error::Error>> {
    let writes = check_mutation(|dataset| {
        let g = dataset.root_group().open_group("g")?;
        let t = g
            .dimensions()?
            .into_iter()
            .find(|dimension| dimension.name() == "t")
            .ok_or_else(|| MdError::InvalidArgument("no t".to_string()))?;
        t.rename("time")
    })?;
    assert!(writes >= 2);
    Ok(())
}

#[test]
fn crash_consistency_resize() -> Result<(), Box<dyn std::error::Error>> {
    let writes = check_mutation(|dataset| {
        let g = dataset.root_group().open_group("g")?;
        g.open_md_array("a")?.resize(&[4, 3])
    })?;
    assert!(writes >= 2);
    Ok(())
}

#[test]
fn crash_consistency_attributes() -> Result<(), Box<dyn std::error::Error>> {
    check_mutation(|dataset| {
        let a = dataset.root_group().open_group("g")?.open_md_array("a")?;
        a.create_attribute("history", &AttributeValue::Strings(vec!["created".into()]))?;
        Ok(())
    })?;
    check_mutation(|dataset| {
        let a = dataset.root_group().open_group("g")?.open_md_array("a")?;
        a.set_units(Some("K"))
    })?;
    Ok(())
}

#[test]
fn crash_consistency_failed_write_keeps_handles_usable() -> Result<(), Box<dyn std::error::Error>> {
    let (storage, dataset) = populated()?;
    let g = dataset.root_group().open_group("g")?;
    storage.fail_after(0);
    assert!(g.rename("h").is_err());
    storage.disarm();
    assert_eq!(g.full_name().as_str(), "/g");
    let a = g.open_md_array("a")?;
    assert_eq!(a.dimensions()?[0].full_name().as_str(), "/g/t");
    g.rename("h")?;
    assert_eq!(a.full_name().as_str(), "/h/a");
    Ok(())
}
