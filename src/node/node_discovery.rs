//! Hierarchy discovery.
//!
//! The groups and arrays of a store are found by listing its metadata documents. A directory holding nodes but no
//! `.zgroup` is an implicit group. Hidden directories (names starting with `.`) are skipped, which excludes tile
//! presence caches and nodes being deleted.
//!
//! Dimensions are not stored: they are reconstructed from the `_ARRAY_DIMENSIONS` attribute of arrays.

use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    sync::Arc,
};

use crate::{
    array::ArrayCore,
    dimension::{indexing_variable, type_from_attributes, DimensionData},
    metadata::{ArrayMetadata, Attributes, SpecialAttributes},
    storage::{
        meta_key_array, meta_key_attributes, ListableStorageTraits, ReadableStorageTraits,
        ReadableWritableListableStorageTraits, StorageError, ARRAY_METADATA_KEY, ATTRIBUTES_KEY,
        GROUP_METADATA_KEY,
    },
};

use super::{ArrayNode, NodeData, NodeGraph, NodeId, NodeKind, NodeName, NodePath, ROOT};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Document {
    Group,
    Array,
}

/// The node path of a metadata document key, or [`None`] if it is not a visible metadata document.
fn document_path(key: &str) -> Option<(NodePath, &str)> {
    let (directory, file_name) = key.rsplit_once('/').unwrap_or(("", key));
    if ![GROUP_METADATA_KEY, ARRAY_METADATA_KEY, ATTRIBUTES_KEY].contains(&file_name) {
        return None;
    }
    if directory.is_empty() {
        return Some((NodePath::root(), file_name));
    }
    if directory
        .split('/')
        .any(|name| !NodeName::validate(name) || NodeName::is_hidden(name))
    {
        return None;
    }
    NodePath::new(&format!("/{directory}"))
        .ok()
        .map(|path| (path, file_name))
}

fn read_attributes(
    storage: &dyn ReadableWritableListableStorageTraits,
    path: &NodePath,
) -> Result<Attributes, StorageError> {
    let key = meta_key_attributes(path);
    let Some(bytes) = storage.get(&key)? else {
        return Ok(Attributes::new());
    };
    match serde_json::from_slice::<Attributes>(&bytes) {
        Ok(attributes) => Ok(attributes),
        Err(err) => {
            log::warn!("attributes of {path} are ignored: {err}");
            Ok(Attributes::new())
        }
    }
}

fn read_array(
    storage: &dyn ReadableWritableListableStorageTraits,
    path: &NodePath,
) -> Result<NodeData, StorageError> {
    let key = meta_key_array(path);
    let core = storage.get(&key)?.map_or_else(
        || Err("array metadata is missing".to_string()),
        |bytes| {
            serde_json::from_slice::<ArrayMetadata>(&bytes)
                .map_err(|err| err.to_string())
                .and_then(|metadata| {
                    ArrayCore::new(path.as_str(), metadata).map_err(|err| err.to_string())
                })
        },
    );
    match core {
        Ok(core) => {
            let (special, attributes) = SpecialAttributes::split(read_attributes(storage, path)?);
            Ok(NodeData::Array(ArrayNode {
                core: Arc::new(core),
                dimensions: Vec::new(),
                attributes,
                special,
            }))
        }
        Err(error) => {
            log::warn!("array {path} cannot be opened: {error}");
            Ok(NodeData::BrokenArray { error })
        }
    }
}

/// The group at `path`, walking down from the root.
fn find_group(graph: &NodeGraph, path: &NodePath) -> Option<NodeId> {
    if path.is_root() {
        return Some(ROOT);
    }
    path.as_str()
        .split('/')
        .filter(|name| !name.is_empty())
        .try_fold(ROOT, |group, name| {
            graph.find_child(group, name, &[NodeKind::Group])
        })
}

fn new_dimension(size: u64) -> NodeData {
    NodeData::Dimension(DimensionData {
        size,
        growable: true,
        ..DimensionData::default()
    })
}

/// Resolve the dimension `name` of size `size` of `array`.
fn resolve_dimension(graph: &mut NodeGraph, array: NodeId, axis: usize, name: &str, size: u64) -> NodeId {
    let array_path = graph.path(array);
    let local = |graph: &mut NodeGraph, name: &str| {
        let name = if NodeName::validate(name) && !name.contains('/') {
            name.to_string()
        } else {
            format!("dim{axis}")
        };
        graph
            .find_child(array, &name, &[NodeKind::Dimension])
            .unwrap_or_else(|| graph.insert(array, &name, new_dimension(size)))
    };

    if let Some(full_name) = name.strip_prefix('/') {
        let Ok(path) = NodePath::new(name) else {
            log::warn!("dimension {name} of {array_path} is not a valid path");
            return local(graph, full_name);
        };
        let dimension_name = path.name().to_string();
        let parent = path
            .as_str()
            .rsplit_once('/')
            .map_or("/", |(parent, _)| if parent.is_empty() { "/" } else { parent })
            .to_string();
        let group = NodePath::new(&parent)
            .ok()
            .and_then(|parent| find_group(graph, &parent));
        return match group {
            Some(group) => match graph.find_child(group, &dimension_name, &[NodeKind::Dimension]) {
                Some(dimension) if graph.dimension(dimension).map(|data| data.size) == Some(size) => {
                    dimension
                }
                Some(_) => {
                    log::warn!("dimension {name} of {array_path} does not have size {size}");
                    local(graph, &dimension_name)
                }
                None => graph.insert(group, &dimension_name, new_dimension(size)),
            },
            None => {
                log::warn!("dimension {name} of {array_path} does not exist");
                local(graph, &dimension_name)
            }
        };
    }

    let array_group = graph.group_of(array);
    let groups = graph.ancestor_groups(array_group);
    for group in &groups {
        if let Some(dimension) = graph.find_child(*group, name, &[NodeKind::Dimension]) {
            if graph.dimension(dimension).map(|data| data.size) == Some(size) {
                return dimension;
            }
            log::warn!("dimension {name} of {array_path} does not have size {size}");
            return local(graph, name);
        }
    }
    for group in &groups {
        if let Some(variable) = graph.find_child(*group, name, &[NodeKind::Array]) {
            let one_dimensional = graph
                .array(variable)
                .is_some_and(|node| node.core.shape() == [size]);
            if one_dimensional && variable != array {
                let dimension = graph.insert(*group, name, new_dimension(size));
                if let Some(data) = graph.dimension_mut(dimension) {
                    data.indexing_variable = Some(variable);
                }
                return dimension;
            }
        }
    }
    if NodeName::validate(name) {
        graph.insert(array_group, name, new_dimension(size))
    } else {
        log::warn!("dimension {name} of {array_path} is not a valid name");
        local(graph, name)
    }
}

/// Discover the hierarchy of `storage`.
///
/// # Errors
/// Returns a [`StorageError`] if the store cannot be listed or read.
pub(crate) fn discover(
    storage: &dyn ReadableWritableListableStorageTraits,
) -> Result<NodeGraph, StorageError> {
    let mut documents: BTreeMap<NodePath, Document> = BTreeMap::new();
    let mut directories: BTreeSet<NodePath> = BTreeSet::new();
    for key in storage.list()? {
        let Some((path, file_name)) = document_path(key.as_str()) else {
            continue;
        };
        match file_name {
            ARRAY_METADATA_KEY if path.is_root() => {
                log::warn!("an array at the root of a store is not supported and is ignored");
            }
            ARRAY_METADATA_KEY => {
                documents.insert(path.clone(), Document::Array);
            }
            GROUP_METADATA_KEY => {
                documents.entry(path.clone()).or_insert(Document::Group);
            }
            _ => {}
        }
        directories.insert(path);
    }

    let mut graph = NodeGraph::new(read_attributes(storage, &NodePath::root())?);
    let mut ids: HashMap<NodePath, NodeId> = HashMap::from([(NodePath::root(), ROOT)]);
    let mut arrays = Vec::new();
    // Paths are ordered so that a parent precedes its children.
    let paths: BTreeSet<NodePath> = directories
        .into_iter()
        .chain(documents.keys().cloned())
        .collect();
    for path in paths {
        let mut parent = ROOT;
        let mut current = NodePath::root();
        for name in path.as_str().split('/').filter(|name| !name.is_empty()) {
            current = current.child(name);
            if let Some(id) = ids.get(&current) {
                parent = *id;
                continue;
            }
            if graph.get(parent).kind() != NodeKind::Group {
                log::warn!("{current} is below the array {} and is ignored", graph.path(parent));
                break;
            }
            let data = match documents.get(&current) {
                Some(Document::Array) => read_array(storage, &current)?,
                _ => NodeData::Group {
                    attributes: read_attributes(storage, &current)?,
                },
            };
            let id = graph.insert(parent, name, data);
            if graph.array(id).is_some() {
                arrays.push(id);
            }
            ids.insert(current.clone(), id);
            parent = id;
        }
    }

    arrays.sort_by_key(|id| {
        let path = graph.path(*id);
        (path.depth(), path)
    });
    for array in arrays {
        let Some(node) = graph.array(array) else {
            continue;
        };
        let shape = node.core.shape();
        let names = match &node.special.array_dimensions {
            Some(names) if names.len() == shape.len() => Some(names.clone()),
            Some(names) => {
                log::warn!(
                    "{} of {} has {} names for {} dimensions and is ignored",
                    crate::metadata::ARRAY_DIMENSIONS_ATTRIBUTE,
                    graph.path(array),
                    names.len(),
                    shape.len()
                );
                None
            }
            None => None,
        };
        let dimensions: Vec<NodeId> = shape
            .iter()
            .enumerate()
            .map(|(axis, size)| match &names {
                Some(names) => resolve_dimension(&mut graph, array, axis, &names[axis], *size),
                None => {
                    let name = format!("dim{axis}");
                    graph.insert(array, &name, new_dimension(*size))
                }
            })
            .collect();
        if let Some(node) = graph.array_mut(array) {
            node.dimensions = dimensions;
        }
    }

    let dimensions: Vec<NodeId> = (0..graph.len())
        .filter(|id| graph.dimension(*id).is_some())
        .collect();
    for dimension in dimensions {
        let described = indexing_variable(&graph, dimension)
            .and_then(|variable| graph.array(variable))
            .map(|node| type_from_attributes(&node.attributes, node.special.units.as_deref()));
        if let (Some((dim_type, direction)), Some(data)) = (described, graph.dimension_mut(dimension)) {
            data.dim_type = dim_type;
            data.direction = direction;
        }
    }
    Ok(graph)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{store::MemoryStore, StoreKey, WritableStorageTraits};

    const ARRAY: &str = r#"{"zarr_format": 2, "shape": [SHAPE], "chunks": [CHUNKS], "dtype": "<f4",
        "compressor": null, "fill_value": null, "filters": null, "order": "C"}"#;

    fn array(shape: &str) -> String {
        ARRAY.replace("SHAPE", shape).replace("CHUNKS", shape)
    }

    #[test]
    fn discover_hierarchy() -> Result<(), Box<dyn std::error::Error>> {
        let store = MemoryStore::new();
        store.set(&StoreKey::new(".zgroup")?, br#"{"zarr_format": 2}"#)?;
        store.set(&StoreKey::new("x/.zarray")?, array("4").as_bytes())?;
        store.set(
            &StoreKey::new("x/.zattrs")?,
            br#"{"_ARRAY_DIMENSIONS": ["x"], "standard_name": "longitude", "units": "degrees_east"}"#,
        )?;
        store.set(&StoreKey::new("g/h/a/.zarray")?, array("3, 4").as_bytes())?;
        store.set(&StoreKey::new("g/h/a/.zattrs")?, br#"{"_ARRAY_DIMENSIONS": ["y", "x"]}"#)?;
        store.set(&StoreKey::new("g/h/b/.zarray")?, br#"{"zarr_format": 2}"#)?;
        store.set(&StoreKey::new("g/c/.zarray")?, array("5").as_bytes())?;
        store.set(&StoreKey::new(".cache/_x_tile_presence/.zarray")?, array("1").as_bytes())?;

        let graph = discover(&store)?;
        assert_eq!(
            graph.hierarchy_tree(ROOT),
            "/\n  g\n    c [5] float32\n    h\n      a [3, 4] float32\n      b (invalid)\n  x [4] float32\n"
        );
        let root_x = graph.find_child(ROOT, "x", &[NodeKind::Dimension]).unwrap();
        let x = graph.find_child(ROOT, "x", &[NodeKind::Array]).unwrap();
        let data = graph.dimension(root_x).unwrap();
        assert_eq!(data.size, 4);
        assert!(data.growable);
        assert_eq!(data.dim_type, Some(crate::dimension::DimensionType::HorizontalX));
        assert_eq!(data.direction.as_deref(), Some("EAST"));
        assert_eq!(indexing_variable(&graph, root_x), Some(x));

        let g = graph.find_child(ROOT, "g", &[NodeKind::Group]).unwrap();
        let h = graph.find_child(g, "h", &[NodeKind::Group]).unwrap();
        let a = graph.find_child(h, "a", &[NodeKind::Array]).unwrap();
        let y = graph.find_child(h, "y", &[NodeKind::Dimension]).unwrap();
        assert_eq!(graph.array(a).unwrap().dimensions, vec![y, root_x]);

        let c = graph.find_child(g, "c", &[NodeKind::Array]).unwrap();
        let dim0 = graph.find_child(c, "dim0", &[NodeKind::Dimension]).unwrap();
        assert_eq!(graph.array(c).unwrap().dimensions, vec![dim0]);
        Ok(())
    }

    #[test]
    fn discover_size_mismatch() -> Result<(), Box<dyn std::error::Error>> {
        let store = MemoryStore::new();
        store.set(&StoreKey::new("a/.zarray")?, array("4").as_bytes())?;
        store.set(&StoreKey::new("a/.zattrs")?, br#"{"_ARRAY_DIMENSIONS": ["x"]}"#)?;
        store.set(&StoreKey::new("b/.zarray")?, array("6").as_bytes())?;
        store.set(&StoreKey::new("b/.zattrs")?, br#"{"_ARRAY_DIMENSIONS": ["x"]}"#)?;
        store.set(&StoreKey::new("c/.zarray")?, array("2").as_bytes())?;
        store.set(&StoreKey::new("c/.zattrs")?, b"not json")?;

        let graph = discover(&store)?;
        let x = graph.find_child(ROOT, "x", &[NodeKind::Dimension]).unwrap();
        let b = graph.find_child(ROOT, "b", &[NodeKind::Array]).unwrap();
        let local = graph.array(b).unwrap().dimensions[0];
        assert_ne!(local, x);
        assert_eq!(graph.get(local).parent, Some(b));
        assert_eq!(graph.dimension(local).unwrap().size, 6);
        let c = graph.find_child(ROOT, "c", &[NodeKind::Array]).unwrap();
        assert!(graph.array(c).unwrap().attributes.is_empty());
        Ok(())
    }

    #[test]
    fn discover_document_paths() {
        assert_eq!(document_path(".zgroup"), Some((NodePath::root(), ".zgroup")));
        assert_eq!(
            document_path("a/b/.zattrs"),
            Some((NodePath::new("/a/b").unwrap(), ".zattrs"))
        );
        assert_eq!(document_path("a/0.0"), None);
        assert_eq!(document_path(".deleted_a_0/.zarray"), None);
    }
}
