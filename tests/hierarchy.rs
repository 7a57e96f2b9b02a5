use std::sync::Arc;

use mdstore::{
    array::{ArrayCreateOptions, ExtendedDataType, FillValue, NumericDataType},
    attribute::AttributeValue,
    dataset::{Dataset, OpenOptions},
    dimension::DimensionCreateOptions,
    error::MdError,
    storage::{store::FilesystemStore, ReadableWritableListableStorage},
};

fn filesystem_store(
    path: &tempfile::TempDir,
) -> Result<ReadableWritableListableStorage, Box<dyn std::error::Error>> {
    Ok(Arc::new(FilesystemStore::new(path.path())?))
}

fn update() -> OpenOptions {
    let mut options = OpenOptions::default();
    options.update(true);
    options
}

#[test]
fn hierarchy_tree() -> Result<(), Box<dyn std::error::Error>> {
    let path = tempfile::TempDir::new()?;
    let store = filesystem_store(&path)?;
    let dataset = Dataset::create(store.clone(), &OpenOptions::default())?;
    let root = dataset.root_group();
    let a = root.create_group("a")?;
    root.create_group("b")?;
    let y = a.create_dimension("y", 10, &DimensionCreateOptions::default())?;
    let x = a.create_dimension("x", 20, &DimensionCreateOptions::default())?;
    let float64 = ExtendedDataType::numeric(NumericDataType::Float64);
    let options = ArrayCreateOptions::default();
    a.create_md_array("foo", &[y.clone(), x.clone()], float64.clone(), &options)?;
    a.create_md_array("baz", &[y, x], float64, &options)?;

    let dataset = Dataset::open(store, &OpenOptions::default())?;
    assert_eq!(
        dataset.hierarchy_tree(),
        "/
  a
    baz [10, 20] float64
    foo [10, 20] float64
  b
"
    );
    let a = dataset.root_group().open_group("a")?;
    let names: Vec<String> = a.dimensions()?.iter().map(|d| d.name()).collect();
    assert_eq!(names, vec!["x", "y"]);
    Ok(())
}

#[test]
fn resize_preserves_data() -> Result<(), Box<dyn std::error::Error>> {
    let path = tempfile::TempDir::new()?;
    let store = filesystem_store(&path)?;
    let dataset = Dataset::create(store.clone(), &OpenOptions::default())?;
    let root = dataset.root_group();
    let mut growable = DimensionCreateOptions::default();
    growable.growable(true);
    let y = root.create_dimension("y", 2, &growable)?;
    let x = root.create_dimension("x", 3, &DimensionCreateOptions::default())?;
    let mut options = ArrayCreateOptions::default();
    options.fill_value(Some(FillValue::from(-1i32)));
    let array = root.create_md_array(
        "a",
        &[y, x],
        ExtendedDataType::numeric(NumericDataType::Int32),
        &options,
    )?;
    array.write_elements(&[0, 0], &[2, 3], None, &[1i32, 2, 3, 4, 5, 6])?;

    assert!(matches!(array.resize(&[1, 3]), Err(MdError::InvalidResize(_))));
    assert!(matches!(array.resize(&[2, 4]), Err(MdError::InvalidResize(_))));
    array.resize(&[4, 3])?;
    let expected = vec![1, 2, 3, 4, 5, 6, -1, -1, -1, -1, -1, -1];
    assert_eq!(array.read_elements::<i32>(&[0, 0], &[4, 3], None)?, expected);

    let dataset = Dataset::open(store.clone(), &update())?;
    let array = dataset.root_group().open_md_array("a")?;
    assert_eq!(array.shape()?, vec![4, 3]);
    assert_eq!(array.read_elements::<i32>(&[0, 0], &[4, 3], None)?, expected);
    assert_eq!(array.dimensions()?[0].size()?, 4);

    let dataset = Dataset::open(store, &OpenOptions::default())?;
    let array = dataset.root_group().open_md_array("a")?;
    assert!(matches!(array.resize(&[5, 3]), Err(MdError::ReadOnly)));
    Ok(())
}

#[test]
fn rename_propagation() -> Result<(), Box<dyn std::error::Error>> {
    let path = tempfile::TempDir::new()?;
    let store = filesystem_store(&path)?;
    let dataset = Dataset::create(store.clone(), &OpenOptions::default())?;
    let root = dataset.root_group();
    let old = root.create_group("old")?;
    let inner = old.create_group("inner")?;
    let x = old.create_dimension("x", 2, &DimensionCreateOptions::default())?;
    let array = inner.create_md_array(
        "child",
        &[x.clone()],
        ExtendedDataType::numeric(NumericDataType::UInt8),
        &ArrayCreateOptions::default(),
    )?;
    array.write_elements(&[0], &[2], None, &[3u8, 4])?;
    let attribute = array.create_attribute("long_name", &AttributeValue::String("t".into()))?;
    root.create_group("taken")?;

    assert!(matches!(old.rename("taken"), Err(MdError::NameCollision { .. })));
    old.rename("new")?;
    assert_eq!(old.full_name().as_str(), "/new");
    assert_eq!(inner.full_name().as_str(), "/new/inner");
    assert_eq!(array.full_name().as_str(), "/new/inner/child");
    assert_eq!(attribute.full_name().as_str(), "/new/inner/child/long_name");
    assert_eq!(x.full_name().as_str(), "/new/x");
    assert_eq!(array.read_elements::<u8>(&[0], &[2], None)?, vec![3, 4]);
    assert_eq!(root.group_names()?, vec!["new", "taken"]);

    let dataset = Dataset::open(store, &OpenOptions::default())?;
    let root = dataset.root_group();
    assert_eq!(root.group_names()?, vec!["new", "taken"]);
    let array = root.open_group("new")?.open_group("inner")?.open_md_array("child")?;
    assert_eq!(array.read_elements::<u8>(&[0], &[2], None)?, vec![3, 4]);
    assert_eq!(array.dimensions()?[0].full_name().as_str(), "/new/x");
    assert_eq!(
        array.attribute("long_name")?.value()?,
        AttributeValue::String("t".into())
    );
    Ok(())
}

#[test]
fn delete_invalidation() -> Result<(), Box<dyn std::error::Error>> {
    let path = tempfile::TempDir::new()?;
    let store = filesystem_store(&path)?;
    let dataset = Dataset::create(store.clone(), &OpenOptions::default())?;
    let root = dataset.root_group();
    let x = root.create_dimension("x", 4, &DimensionCreateOptions::default())?;
    let array = root.create_md_array(
        "a",
        &[x.clone()],
        ExtendedDataType::numeric(NumericDataType::Int8),
        &ArrayCreateOptions::default(),
    )?;
    let other = root.create_md_array(
        "b",
        &[x],
        ExtendedDataType::numeric(NumericDataType::Int8),
        &ArrayCreateOptions::default(),
    )?;
    array.write_elements(&[0], &[4], None, &[1i8, 2, 3, 4])?;
    let attribute = array.create_attribute("units_note", &AttributeValue::Int64(3))?;

    root.delete_md_array("a")?;
    assert!(matches!(array.shape(), Err(MdError::Deleted { .. })));
    assert!(matches!(array.read_elements::<i8>(&[0], &[1], None), Err(MdError::Deleted { .. })));
    assert!(matches!(array.write_elements(&[0], &[1], None, &[0i8]), Err(MdError::Deleted { .. })));
    assert!(matches!(array.rename("c"), Err(MdError::Deleted { .. })));
    assert!(matches!(array.attributes(), Err(MdError::Deleted { .. })));
    assert!(matches!(attribute.value(), Err(MdError::Deleted { .. })));
    assert!(matches!(root.open_md_array("a"), Err(MdError::NotFound { .. })));
    assert_eq!(root.md_array_names()?, vec!["b"]);
    assert_eq!(other.read_elements::<i8>(&[0], &[1], None)?, vec![0]);

    // The name is free again, with no data left from the deleted array.
    let x = root.dimensions()?.remove(0);
    let array = root.create_md_array(
        "a",
        &[x],
        ExtendedDataType::numeric(NumericDataType::Int8),
        &ArrayCreateOptions::default(),
    )?;
    assert_eq!(array.read_elements::<i8>(&[0], &[4], None)?, vec![0; 4]);
    root.delete_md_array("a")?;

    let dataset = Dataset::open(store, &OpenOptions::default())?;
    assert_eq!(dataset.root_group().md_array_names()?, vec!["b"]);
    assert!(matches!(
        dataset.root_group().delete_md_array("b"),
        Err(MdError::ReadOnly)
    ));
    Ok(())
}

#[test]
fn read_only_and_multidim() -> Result<(), Box<dyn std::error::Error>> {
    let path = tempfile::TempDir::new()?;
    let store = filesystem_store(&path)?;
    Dataset::create(store.clone(), &OpenOptions::default())?;

    let dataset = Dataset::open(store.clone(), &OpenOptions::default())?;
    assert!(matches!(dataset.root_group().create_group("g"), Err(MdError::ReadOnly)));

    let mut options = update();
    options.multidim(false);
    let dataset = Dataset::open(store, &options)?;
    assert!(matches!(
        dataset.root_group().create_group("g"),
        Err(MdError::InvalidArgument(_))
    ));
    Ok(())
}
