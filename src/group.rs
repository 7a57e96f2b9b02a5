//! Groups.
//!
//! A group holds groups, arrays, dimensions and attributes.
//! Groups and arrays are stored as a `.zgroup` or `.zarray` document under a prefix of the store named after their
//! full name. Dimensions are not stored by themselves: they are the names listed in the `_ARRAY_DIMENSIONS` attribute
//! of the arrays referencing them.
//!
//! ```rust
//! # use std::sync::Arc;
//! # use mdstore::array::{ArrayCreateOptions, ExtendedDataType, NumericDataType};
//! # use mdstore::dataset::{Dataset, OpenOptions};
//! # use mdstore::dimension::DimensionCreateOptions;
//! # use mdstore::storage::store::MemoryStore;
//! let dataset = Dataset::create(Arc::new(MemoryStore::new()), &OpenOptions::default())?;
//! let group = dataset.root_group().create_group("g")?;
//! let y = group.create_dimension("y", 4, &DimensionCreateOptions::default())?;
//! let x = group.create_dimension("x", 6, &DimensionCreateOptions::default())?;
//! let array = group.create_md_array(
//!     "a",
//!     &[y, x],
//!     ExtendedDataType::numeric(NumericDataType::Float32),
//!     &ArrayCreateOptions::default(),
//! )?;
//! assert_eq!(array.shape()?, vec![4, 6]);
//! assert_eq!(group.md_array_names()?, vec!["a".to_string()]);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::sync::Arc;

use crate::{
    array::{
        chunk_grid::RegularChunkGrid, ArrayCore, ArrayCreateError, ArrayCreateOptions,
        ExtendedDataType, MDArray,
    },
    attribute::{self, Attribute, AttributeValue},
    dataset::SharedResource,
    dimension::{
        dimension_reference, refresh_array_dimensions, stale_dimension_references, Dimension,
        DimensionCreateOptions, DimensionData,
    },
    error::MdError,
    metadata::{
        data_type_to_metadata, AdditionalFields, ArrayMetadata, Attributes, GroupMetadata,
        SpecialAttributes, ENUMS_FIELD,
    },
    node::{ArrayNode, NodeData, NodeGraph, NodeId, NodeKind, NodeName, NodePath, ROOT},
    storage::{
        apply_metadata_writes, meta_key_array, meta_key_group, node_prefix,
        ListableStorageTraits, StorePrefix, WritableStorageTraits,
    },
};

/// A group of a [`Dataset`](crate::dataset::Dataset).
#[derive(Clone)]
pub struct Group {
    shared: Arc<SharedResource>,
    id: NodeId,
}

impl std::fmt::Debug for Group {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Group")
            .field("full_name", &self.full_name().as_str())
            .finish_non_exhaustive()
    }
}

/// Check that `name` is a valid name for a new group or array.
fn check_node_name(name: &str) -> Result<(), MdError> {
    NodeName::new(name)?;
    if NodeName::is_hidden(name) {
        return Err(MdError::InvalidArgument(format!(
            "{name} is reserved: names starting with . are hidden"
        )));
    }
    Ok(())
}

/// Check that no group or array named `name` exists in `parent`.
fn check_group_or_array_collision(
    graph: &NodeGraph,
    parent: NodeId,
    name: &str,
) -> Result<(), MdError> {
    match graph.find_child(parent, name, &[NodeKind::Group, NodeKind::Array]) {
        Some(existing) => Err(MdError::name_collision(graph.get(existing).kind())),
        None => Ok(()),
    }
}

/// A prefix next to `path` that holds no keys, under which a node is moved before it is erased.
fn unused_hidden_prefix(
    shared: &SharedResource,
    path: &NodePath,
) -> Result<StorePrefix, MdError> {
    let parent = path.parent().unwrap_or_else(NodePath::root);
    let name = path.name();
    let mut n = 0u64;
    loop {
        let prefix = node_prefix(&parent.child(&format!(".deleted_{name}_{n}")));
        if shared.storage.list_prefix(&prefix)?.is_empty() {
            return Ok(prefix);
        }
        n += 1;
    }
}

/// Delete the group or array `id` and everything below it from the store and the graph.
///
/// The node is first moved to a hidden prefix, which removes it from the hierarchy in a single step.
/// The hidden prefix is then erased. If erasing fails, the leftovers stay hidden and are logged.
fn delete_node(shared: &SharedResource, graph: &mut NodeGraph, id: NodeId) -> Result<(), MdError> {
    let path = graph.path(id);
    let arrays: Vec<NodePath> = graph
        .arrays_below(id)
        .into_iter()
        .map(|array| graph.path(array))
        .collect();
    let hidden = unused_hidden_prefix(shared, &path)?;
    shared.storage.rename_prefix(&node_prefix(&path), &hidden)?;
    if let Err(err) = shared.storage.erase_prefix(&hidden) {
        log::warn!("failed to erase {hidden} after deleting {path}: {err}");
    }
    shared.erase_tile_presence(&arrays);
    for array in graph.arrays_below(id) {
        if let Some(node) = graph.array(array) {
            node.core.invalidate_caches();
        }
    }
    graph.mark_deleted_recursive(id);
    log::debug!("deleted {path}");
    Ok(())
}

/// Rename the group or array `id` to `name` in the store and the graph.
///
/// The `_ARRAY_DIMENSIONS` of arrays referencing dimensions whose full name changes are rewritten.
pub(crate) fn rename_node(
    shared: &SharedResource,
    graph: &mut NodeGraph,
    id: NodeId,
    name: &str,
) -> Result<(), MdError> {
    shared.check_schema_mutation()?;
    check_node_name(name)?;
    let entry = graph.check_live(id)?;
    let Some(parent) = entry.parent else {
        return Err(MdError::InvalidArgument(
            "The root group cannot be renamed".to_string(),
        ));
    };
    if entry.name == name {
        return Ok(());
    }
    check_group_or_array_collision(graph, parent, name)?;

    let old_path = graph.path(id);
    let new_path = graph.path(parent).child(name);
    let old_prefix = node_prefix(&old_path);
    let new_prefix = node_prefix(&new_path);
    let arrays: Vec<NodePath> = graph
        .arrays_below(id)
        .into_iter()
        .map(|array| graph.path(array))
        .collect();

    shared.storage.rename_prefix(&old_prefix, &new_prefix)?;
    let previous = std::mem::replace(&mut graph.get_mut(id).name, name.to_string());
    let rewritten = stale_dimension_references(graph).and_then(|writes| {
        apply_metadata_writes(shared.storage.as_ref(), &writes).map_err(MdError::from)
    });
    if let Err(err) = rewritten {
        graph.get_mut(id).name = previous;
        if let Err(restore_err) = shared.storage.rename_prefix(&new_prefix, &old_prefix) {
            log::warn!("failed to move {new_path} back to {old_path}: {restore_err}");
        }
        return Err(err);
    }
    refresh_array_dimensions(graph);

    shared.erase_tile_presence(&arrays);
    for array in graph.arrays_below(id) {
        if let Some(node) = graph.array(array) {
            node.core.invalidate_caches();
        }
    }
    log::debug!("renamed {old_path} to {new_path}");
    Ok(())
}

impl Group {
    pub(crate) fn new(shared: Arc<SharedResource>, id: NodeId) -> Self {
        Self { shared, id }
    }

    /// The name of the group, empty for the root group.
    #[must_use]
    pub fn name(&self) -> String {
        self.shared.graph.read().get(self.id).name.clone()
    }

    /// The full name of the group, e.g. `/a/b`.
    #[must_use]
    pub fn full_name(&self) -> NodePath {
        self.shared.graph.read().path(self.id)
    }

    /// The names of the child groups, sorted.
    ///
    /// # Errors
    /// Returns [`MdError::Deleted`] if the group has been deleted.
    pub fn group_names(&self) -> Result<Vec<String>, MdError> {
        let graph = self.shared.graph.read();
        graph.check_live(self.id)?;
        Ok(graph.child_names(self.id, &[NodeKind::Group]))
    }

    /// The names of the arrays of the group, sorted.
    ///
    /// # Errors
    /// Returns [`MdError::Deleted`] if the group has been deleted.
    pub fn md_array_names(&self) -> Result<Vec<String>, MdError> {
        let graph = self.shared.graph.read();
        graph.check_live(self.id)?;
        Ok(graph.child_names(self.id, &[NodeKind::Array]))
    }

    /// Open the child group `name`.
    ///
    /// # Errors
    /// Returns [`MdError::NotFound`] if there is no such group, or [`MdError::Deleted`] if this group has been deleted.
    pub fn open_group(&self, name: &str) -> Result<Self, MdError> {
        let graph = self.shared.graph.read();
        graph.check_live(self.id)?;
        graph
            .find_child(self.id, name, &[NodeKind::Group])
            .map(|id| Self::new(self.shared.clone(), id))
            .ok_or_else(|| MdError::NotFound {
                kind: NodeKind::Group,
                name: name.to_string(),
            })
    }

    /// Open the array `name`.
    ///
    /// # Errors
    /// Returns [`MdError::NotFound`] if there is no such array, [`MdError::InvalidArray`] if its metadata could not be
    /// interpreted when the dataset was opened, or [`MdError::Deleted`] if this group has been deleted.
    pub fn open_md_array(&self, name: &str) -> Result<MDArray, MdError> {
        let graph = self.shared.graph.read();
        graph.check_live(self.id)?;
        let id = graph
            .find_child(self.id, name, &[NodeKind::Array])
            .ok_or_else(|| MdError::NotFound {
                kind: NodeKind::Array,
                name: name.to_string(),
            })?;
        match &graph.get(id).data {
            NodeData::BrokenArray { error } => Err(MdError::InvalidArray {
                name: graph.path(id).to_string(),
                error: error.clone(),
            }),
            _ => Ok(MDArray::new(self.shared.clone(), id)),
        }
    }

    /// Create the child group `name`.
    ///
    /// # Errors
    /// Returns an [`MdError`] if the dataset is not open in update mode, `name` is invalid or used by a group or array
    /// of this group, or the store fails.
    pub fn create_group(&self, name: &str) -> Result<Self, MdError> {
        self.shared.check_schema_mutation()?;
        check_node_name(name)?;
        let mut graph = self.shared.graph.write();
        graph.check_live(self.id)?;
        check_group_or_array_collision(&graph, self.id, name)?;

        let path = graph.path(self.id).child(name);
        self.shared.storage.set(
            &meta_key_group(&path),
            &serde_json::to_vec_pretty(&GroupMetadata::default())?,
        )?;
        let id = graph.insert(
            self.id,
            name,
            NodeData::Group {
                attributes: Attributes::new(),
            },
        );
        log::debug!("created group {path}");
        Ok(Self::new(self.shared.clone(), id))
    }

    /// Create the dimension `name` of `size`.
    ///
    /// A dimension is written to the store by the arrays referencing it.
    ///
    /// # Errors
    /// Returns an [`MdError`] if the dataset is not open in update mode, or `name` is invalid or used by another
    /// dimension of this group.
    pub fn create_dimension(
        &self,
        name: &str,
        size: u64,
        options: &DimensionCreateOptions,
    ) -> Result<Dimension, MdError> {
        self.shared.check_schema_mutation()?;
        NodeName::new(name)?;
        let mut graph = self.shared.graph.write();
        graph.check_live(self.id)?;
        if graph
            .find_child(self.id, name, &[NodeKind::Dimension])
            .is_some()
        {
            return Err(MdError::name_collision(NodeKind::Dimension));
        }
        let id = graph.insert(
            self.id,
            name,
            NodeData::Dimension(DimensionData {
                size,
                growable: options.growable,
                dim_type: options.dim_type,
                direction: options.direction.clone(),
                indexing_variable: None,
            }),
        );
        Ok(Dimension::new(self.shared.clone(), id))
    }

    /// The dimensions of the group, sorted by name.
    ///
    /// # Errors
    /// Returns [`MdError::Deleted`] if the group has been deleted.
    pub fn dimensions(&self) -> Result<Vec<Dimension>, MdError> {
        let graph = self.shared.graph.read();
        graph.check_live(self.id)?;
        let mut dimensions: Vec<NodeId> = graph.children(self.id, &[NodeKind::Dimension]).collect();
        dimensions.sort_by(|a, b| graph.get(*a).name.cmp(&graph.get(*b).name));
        Ok(dimensions
            .into_iter()
            .map(|id| Dimension::new(self.shared.clone(), id))
            .collect())
    }

    /// Create the array `name` along `dimensions` with elements of `data_type`.
    ///
    /// The shape of the array is given by the sizes of `dimensions`, which must be dimensions of this dataset.
    ///
    /// # Errors
    /// Returns an [`MdError`] if
    ///  - the dataset is not open in update mode,
    ///  - `name` is invalid or used by a group or array of this group,
    ///  - a dimension belongs to another dataset or has been deleted,
    ///  - `data_type` is a variable-length string, or the options are incompatible with it, or
    ///  - the store fails.
    pub fn create_md_array(
        &self,
        name: &str,
        dimensions: &[Dimension],
        data_type: ExtendedDataType,
        options: &ArrayCreateOptions,
    ) -> Result<MDArray, MdError> {
        self.shared.check_schema_mutation()?;
        check_node_name(name)?;
        let data_type = match (options.text_width, &data_type) {
            (Some(width), ExtendedDataType::String(string)) => match string.max_length() {
                Some(max_length) => ExtendedDataType::fixed_string(max_length, width),
                None => data_type,
            },
            _ => data_type,
        };
        if data_type.size().is_none() {
            return Err(ArrayCreateError::VariableLengthString.into());
        }

        let mut graph = self.shared.graph.write();
        graph.check_live(self.id)?;
        check_group_or_array_collision(&graph, self.id, name)?;
        let mut shape = Vec::with_capacity(dimensions.len());
        for dimension in dimensions {
            if !Arc::ptr_eq(dimension.shared(), &self.shared) {
                return Err(MdError::InvalidArgument(
                    "The dimensions of an array must belong to its dataset".to_string(),
                ));
            }
            graph.check_live(dimension.id())?;
            let data = graph.dimension(dimension.id()).ok_or_else(|| {
                MdError::InvalidArgument("not a dimension".to_string())
            })?;
            shape.push(data.size);
        }

        let chunks = options.chunk_shape.clone().unwrap_or_else(|| {
            RegularChunkGrid::generate_chunk_shape(&shape, self.shared.config.block_size_limit())
        });
        let (dtype, enums) = data_type_to_metadata(&data_type, options.endianness)?;
        let mut additional_fields = AdditionalFields::new();
        if let Some(enums) = enums {
            additional_fields.insert(ENUMS_FIELD.to_string(), enums);
        }
        let metadata = ArrayMetadata {
            zarr_format: monostate::MustBe!(2u64),
            shape,
            chunks,
            dtype,
            compressor: options.compressor.clone(),
            fill_value: serde_json::Value::Null,
            order: options.order,
            filters: (!options.filters.is_empty()).then(|| options.filters.clone()),
            dimension_separator: options.separator,
            additional_fields,
        };
        let path = graph.path(self.id).child(name);
        let core = ArrayCore::new(path.as_str(), metadata)?;
        if let Some(fill_value) = &options.fill_value {
            if fill_value.size() != core.element_size() {
                return Err(ArrayCreateError::InvalidFillValueSize(
                    fill_value.size(),
                    core.element_size(),
                )
                .into());
            }
            core.set_fill_value(Some(fill_value.clone()));
        }

        // Keys left under the path of a node that no longer exists would read as chunks of the new array.
        self.shared.storage.erase_prefix(&node_prefix(&path))?;

        let id = graph.insert(
            self.id,
            name,
            NodeData::Array(ArrayNode {
                core: Arc::new(core),
                dimensions: dimensions.iter().map(Dimension::id).collect(),
                attributes: Attributes::new(),
                special: SpecialAttributes::default(),
            }),
        );
        let special = SpecialAttributes {
            array_dimensions: Some(
                dimensions
                    .iter()
                    .map(|dimension| dimension_reference(&graph, id, dimension.id()))
                    .collect(),
            ),
            ..SpecialAttributes::default()
        };
        let writes = match graph.array(id) {
            Some(node) => serde_json::to_vec_pretty(&node.core.metadata())
                .map_err(MdError::from)
                .and_then(|zarray| {
                    Ok(vec![
                        (meta_key_array(&path), Some(zarray)),
                        SharedResource::attributes_write(&path, &special.merge(&Attributes::new()))?,
                    ])
                }),
            None => Err(MdError::InvalidArgument(format!("{path} is not an array"))),
        };
        let written = writes.and_then(|writes| {
            apply_metadata_writes(self.shared.storage.as_ref(), &writes).map_err(MdError::from)
        });
        if let Err(err) = written {
            graph.mark_deleted_recursive(id);
            return Err(err);
        }
        if let Some(node) = graph.array_mut(id) {
            node.special = special;
        }
        log::debug!("created array {path}");
        Ok(MDArray::new(self.shared.clone(), id))
    }

    /// Delete the child group `name` and everything below it.
    ///
    /// Handles to the deleted nodes fail with [`MdError::Deleted`] afterwards.
    ///
    /// # Errors
    /// Returns an [`MdError`] if the dataset is not open in update mode, there is no such group, or the store fails.
    pub fn delete_group(&self, name: &str) -> Result<(), MdError> {
        self.delete_child(name, NodeKind::Group)
    }

    /// Delete the array `name`.
    ///
    /// Handles to the array fail with [`MdError::Deleted`] afterwards.
    ///
    /// # Errors
    /// Returns an [`MdError`] if the dataset is not open in update mode, there is no such array, or the store fails.
    pub fn delete_md_array(&self, name: &str) -> Result<(), MdError> {
        self.delete_child(name, NodeKind::Array)
    }

    fn delete_child(&self, name: &str, kind: NodeKind) -> Result<(), MdError> {
        self.shared.check_schema_mutation()?;
        let mut graph = self.shared.graph.write();
        graph.check_live(self.id)?;
        let child = graph
            .find_child(self.id, name, &[kind])
            .ok_or_else(|| MdError::NotFound {
                kind,
                name: name.to_string(),
            })?;
        delete_node(&self.shared, &mut graph, child)
    }

    /// Rename the group.
    ///
    /// Handles to the group and to the nodes below it follow the rename.
    ///
    /// # Errors
    /// Returns an [`MdError`] if the dataset is not open in update mode, this is the root group, `name` is invalid or
    /// used by a sibling group or array, or the store fails.
    pub fn rename(&self, name: &str) -> Result<(), MdError> {
        let mut graph = self.shared.graph.write();
        rename_node(&self.shared, &mut graph, self.id, name)
    }

    /// The attributes of the group.
    ///
    /// # Errors
    /// Returns [`MdError::Deleted`] if the group has been deleted.
    pub fn attributes(&self) -> Result<Vec<Attribute>, MdError> {
        attribute::attributes_of(&self.shared, self.id)
    }

    /// The attribute `name` of the group.
    ///
    /// # Errors
    /// Returns [`MdError::NotFound`] if there is no such attribute.
    pub fn attribute(&self, name: &str) -> Result<Attribute, MdError> {
        attribute::attribute_of(&self.shared, self.id, name)
    }

    /// Create the attribute `name` of the group with `value`.
    ///
    /// # Errors
    /// Returns an [`MdError`] if the dataset is not open in update mode, the attribute exists, or the store fails.
    pub fn create_attribute(
        &self,
        name: &str,
        value: &AttributeValue,
    ) -> Result<Attribute, MdError> {
        attribute::create_attribute(&self.shared, self.id, name, value)
    }

    /// Delete the attribute `name` of the group.
    ///
    /// # Errors
    /// Returns an [`MdError`] if the dataset is not open in update mode, there is no such attribute, or the store fails.
    pub fn delete_attribute(&self, name: &str) -> Result<(), MdError> {
        attribute::delete_attribute(&self.shared, self.id, name)
    }

    /// Return a tree representation of the hierarchy below the group.
    #[must_use]
    pub fn hierarchy_tree(&self) -> String {
        self.shared.graph.read().hierarchy_tree(self.id)
    }

    /// Returns true if this is the root group.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.id == ROOT
    }
}
