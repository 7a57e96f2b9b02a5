//! Dimensions.
//!
//! A dimension is a named, shared extent. It belongs to a group and is referenced by the arrays of that group and of
//! the groups below it. Arrays store the names of their dimensions in their `_ARRAY_DIMENSIONS` attribute:
//! the plain name if the dimension can be found from the array by walking up its groups, otherwise the full name.

use std::sync::Arc;

use derive_more::Display;

use crate::{
    array::MDArray,
    dataset::SharedResource,
    error::MdError,
    metadata::Attributes,
    node::{NodeData, NodeGraph, NodeId, NodeKind, NodeName, NodePath},
    storage::{apply_metadata_writes, MetadataWrite},
};

/// The `standard_name` attribute of an indexing variable.
const STANDARD_NAME_ATTRIBUTE: &str = "standard_name";

/// The `axis` attribute of an indexing variable.
const AXIS_ATTRIBUTE: &str = "axis";

/// The `positive` attribute of a vertical indexing variable.
const POSITIVE_ATTRIBUTE: &str = "positive";

/// The type of a dimension.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Display)]
pub enum DimensionType {
    /// An easting or longitude axis.
    #[display("HORIZONTAL_X")]
    HorizontalX,
    /// A northing or latitude axis.
    #[display("HORIZONTAL_Y")]
    HorizontalY,
    /// A height or depth axis.
    #[display("VERTICAL")]
    Vertical,
    /// A time axis.
    #[display("TEMPORAL")]
    Temporal,
}

/// The state of a dimension node.
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct DimensionData {
    pub(crate) size: u64,
    pub(crate) growable: bool,
    pub(crate) dim_type: Option<DimensionType>,
    pub(crate) direction: Option<String>,
    pub(crate) indexing_variable: Option<NodeId>,
}

/// Options for the creation of a [`Dimension`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DimensionCreateOptions {
    /// The type of the dimension.
    pub dim_type: Option<DimensionType>,
    /// The direction of the dimension, such as `EAST` or `UP`.
    pub direction: Option<String>,
    /// Whether arrays referencing the dimension can be resized along it.
    pub growable: bool,
}

impl DimensionCreateOptions {
    /// Set the type of the dimension.
    pub fn dim_type(&mut self, dim_type: DimensionType) -> &mut Self {
        self.dim_type = Some(dim_type);
        self
    }

    /// Set the direction of the dimension.
    pub fn direction(&mut self, direction: impl Into<String>) -> &mut Self {
        self.direction = Some(direction.into());
        self
    }

    /// Set whether the dimension is growable.
    pub fn growable(&mut self, growable: bool) -> &mut Self {
        self.growable = growable;
        self
    }
}

/// The type and direction of a dimension derived from the attributes of its indexing variable.
pub(crate) fn type_from_attributes(
    attributes: &Attributes,
    units: Option<&str>,
) -> (Option<DimensionType>, Option<String>) {
    let text = |name: &str| attributes.get(name).and_then(serde_json::Value::as_str);
    match (text(STANDARD_NAME_ATTRIBUTE), text(AXIS_ATTRIBUTE)) {
        (Some("projection_x_coordinate" | "longitude"), _) => (
            Some(DimensionType::HorizontalX),
            (units == Some("degrees_east")).then(|| "EAST".to_string()),
        ),
        (Some("projection_y_coordinate" | "latitude"), _) => (
            Some(DimensionType::HorizontalY),
            (units == Some("degrees_north")).then(|| "NORTH".to_string()),
        ),
        (Some("time"), _) => (Some(DimensionType::Temporal), None),
        (_, Some("Z")) => (
            Some(DimensionType::Vertical),
            match text(POSITIVE_ATTRIBUTE) {
                Some("up") => Some("UP".to_string()),
                Some("down") => Some("DOWN".to_string()),
                _ => None,
            },
        ),
        _ => (None, None),
    }
}

/// The attributes describing a dimension of `dim_type` on its indexing variable.
fn type_attributes(dim_type: DimensionType, direction: Option<&str>) -> Attributes {
    let mut attributes = Attributes::new();
    match dim_type {
        DimensionType::HorizontalX => {
            attributes.insert(STANDARD_NAME_ATTRIBUTE.into(), "projection_x_coordinate".into());
            attributes.insert(AXIS_ATTRIBUTE.into(), "X".into());
        }
        DimensionType::HorizontalY => {
            attributes.insert(STANDARD_NAME_ATTRIBUTE.into(), "projection_y_coordinate".into());
            attributes.insert(AXIS_ATTRIBUTE.into(), "Y".into());
        }
        DimensionType::Vertical => {
            attributes.insert(AXIS_ATTRIBUTE.into(), "Z".into());
            match direction {
                Some("UP") => {
                    attributes.insert(POSITIVE_ATTRIBUTE.into(), "up".into());
                }
                Some("DOWN") => {
                    attributes.insert(POSITIVE_ATTRIBUTE.into(), "down".into());
                }
                _ => {}
            }
        }
        DimensionType::Temporal => {
            attributes.insert(STANDARD_NAME_ATTRIBUTE.into(), "time".into());
            attributes.insert(AXIS_ATTRIBUTE.into(), "T".into());
        }
    }
    attributes
}

/// The name of the dimension `dimension` in the `_ARRAY_DIMENSIONS` of the array `array`.
///
/// This is the plain name if the group of the dimension is a group of the array or above it, and no nearer group has a
/// dimension of the same name. Otherwise it is the full name of the dimension.
pub(crate) fn dimension_reference(graph: &NodeGraph, array: NodeId, dimension: NodeId) -> String {
    let entry = graph.get(dimension);
    let Some(owner) = entry.parent else {
        return entry.name.clone();
    };
    if graph.get(owner).kind() != NodeKind::Group {
        return entry.name.clone();
    }
    for group in graph.ancestor_groups(graph.group_of(array)) {
        if let Some(found) = graph.find_child(group, &entry.name, &[NodeKind::Dimension]) {
            if found == dimension && group == owner {
                return entry.name.clone();
            }
            break;
        }
    }
    graph.path(dimension).to_string()
}

/// The `.zattrs` write of the array `array` with its `_ARRAY_DIMENSIONS` recomputed from the graph.
pub(crate) fn array_dimensions_write(
    graph: &NodeGraph,
    array: NodeId,
) -> Result<MetadataWrite, MdError> {
    let node = graph
        .array(array)
        .ok_or_else(|| MdError::InvalidArgument(format!("{} is not an array", graph.path(array))))?;
    let mut special = node.special.clone();
    special.array_dimensions = Some(
        node.dimensions
            .iter()
            .map(|dimension| dimension_reference(graph, array, *dimension))
            .collect(),
    );
    SharedResource::attributes_write(&graph.path(array), &special.merge(&node.attributes))
}

/// A dimension of a [`Dataset`](crate::dataset::Dataset).
#[derive(Clone)]
pub struct Dimension {
    shared: Arc<SharedResource>,
    id: NodeId,
}

impl std::fmt::Debug for Dimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dimension")
            .field("full_name", &self.full_name().as_str())
            .finish_non_exhaustive()
    }
}

impl Dimension {
    pub(crate) fn new(shared: Arc<SharedResource>, id: NodeId) -> Self {
        Self { shared, id }
    }

    pub(crate) const fn id(&self) -> NodeId {
        self.id
    }

    pub(crate) fn shared(&self) -> &Arc<SharedResource> {
        &self.shared
    }

    fn data(&self) -> Result<DimensionData, MdError> {
        let graph = self.shared.graph.read();
        graph.check_live(self.id)?;
        graph
            .dimension(self.id)
            .cloned()
            .ok_or_else(|| MdError::InvalidArgument("not a dimension".to_string()))
    }

    /// The name of the dimension.
    #[must_use]
    pub fn name(&self) -> String {
        self.shared.graph.read().get(self.id).name.clone()
    }

    /// The full name of the dimension, e.g. `/group/x`.
    #[must_use]
    pub fn full_name(&self) -> NodePath {
        self.shared.graph.read().path(self.id)
    }

    /// The size of the dimension.
    ///
    /// # Errors
    /// Returns [`MdError::Deleted`] if the dimension has been deleted.
    pub fn size(&self) -> Result<u64, MdError> {
        Ok(self.data()?.size)
    }

    /// The type of the dimension, if known.
    ///
    /// # Errors
    /// Returns [`MdError::Deleted`] if the dimension has been deleted.
    pub fn dim_type(&self) -> Result<Option<DimensionType>, MdError> {
        Ok(self.data()?.dim_type)
    }

    /// The direction of the dimension, if known.
    ///
    /// # Errors
    /// Returns [`MdError::Deleted`] if the dimension has been deleted.
    pub fn direction(&self) -> Result<Option<String>, MdError> {
        Ok(self.data()?.direction)
    }

    /// Returns true if arrays referencing the dimension can be resized along it.
    ///
    /// # Errors
    /// Returns [`MdError::Deleted`] if the dimension has been deleted.
    pub fn is_growable(&self) -> Result<bool, MdError> {
        Ok(self.data()?.growable)
    }

    /// The indexing variable of the dimension: the array holding its coordinates.
    ///
    /// Without an explicitly set indexing variable, this is the one-dimensional array with the name of the dimension
    /// in the group of the dimension.
    ///
    /// # Errors
    /// Returns [`MdError::Deleted`] if the dimension has been deleted.
    pub fn indexing_variable(&self) -> Result<Option<MDArray>, MdError> {
        let graph = self.shared.graph.read();
        graph.check_live(self.id)?;
        Ok(indexing_variable(&graph, self.id).map(|id| MDArray::new(self.shared.clone(), id)))
    }

    /// Set the indexing variable of the dimension.
    ///
    /// The array must be a one-dimensional array of the same dataset along this dimension.
    /// If the dimension has a type, the array is given the `standard_name` and `axis` attributes describing it.
    ///
    /// # Errors
    /// Returns an [`MdError`] if the dimension or the array has been deleted, or if the array cannot index the dimension.
    pub fn set_indexing_variable(&self, array: &MDArray) -> Result<(), MdError> {
        if !Arc::ptr_eq(&self.shared, array.shared()) {
            return Err(MdError::InvalidArgument(
                "The indexing variable must belong to the dataset of the dimension".to_string(),
            ));
        }
        self.shared.check_update()?;
        let mut graph = self.shared.graph.write();
        graph.check_live(self.id)?;
        graph.check_live(array.id())?;
        let node = graph.array(array.id()).ok_or_else(|| {
            MdError::InvalidArgument("The indexing variable must be an array".to_string())
        })?;
        if node.dimensions != [self.id] || array.is_view() {
            return Err(MdError::InvalidArgument(
                "The indexing variable must be a one-dimensional array along this dimension"
                    .to_string(),
            ));
        }
        let data = graph
            .dimension(self.id)
            .cloned()
            .ok_or_else(|| MdError::InvalidArgument("not a dimension".to_string()))?;

        if let Some(dim_type) = data.dim_type {
            let described = type_attributes(dim_type, data.direction.as_deref());
            let missing: Vec<(String, serde_json::Value)> = described
                .into_iter()
                .filter(|(name, _)| !node.attributes.contains_key(name))
                .collect();
            if !missing.is_empty() {
                let mut attributes = node.attributes.clone();
                attributes.extend(missing);
                let path = graph.path(array.id());
                self.shared
                    .write_attributes(&path, &node.special.merge(&attributes))?;
                if let Some(node) = graph.array_mut(array.id()) {
                    node.attributes = attributes;
                }
            }
        }
        if let Some(data) = graph.dimension_mut(self.id) {
            data.indexing_variable = Some(array.id());
        }
        Ok(())
    }

    /// Rename the dimension.
    ///
    /// The `_ARRAY_DIMENSIONS` of every array referencing the dimension are rewritten.
    ///
    /// # Errors
    /// Returns an [`MdError`] if the dataset is not open in update mode, the dimension has been deleted, `name` is
    /// invalid or used by another dimension of the group, or the store fails.
    pub fn rename(&self, name: &str) -> Result<(), MdError> {
        self.shared.check_schema_mutation()?;
        NodeName::new(name)?;
        let mut graph = self.shared.graph.write();
        let entry = graph.check_live(self.id)?;
        if entry.name == name {
            return Ok(());
        }
        let owner = entry.parent.unwrap_or(crate::node::ROOT);
        if graph
            .find_child(owner, name, &[NodeKind::Dimension])
            .is_some()
        {
            return Err(MdError::name_collision(NodeKind::Dimension));
        }

        let previous = std::mem::replace(&mut graph.get_mut(self.id).name, name.to_string());
        let writes = stale_dimension_references(&graph);
        let result = writes.and_then(|writes| {
            apply_metadata_writes(self.shared.storage.as_ref(), &writes).map_err(MdError::from)
        });
        if let Err(err) = result {
            graph.get_mut(self.id).name = previous;
            return Err(err);
        }
        refresh_array_dimensions(&mut graph);
        Ok(())
    }
}

/// The `.zattrs` writes of every array whose `_ARRAY_DIMENSIONS` differ from those computed from the graph.
///
/// Arrays without `_ARRAY_DIMENSIONS` and only dimensions of their own are left as they are.
pub(crate) fn stale_dimension_references(
    graph: &NodeGraph,
) -> Result<Vec<MetadataWrite>, MdError> {
    let mut writes = Vec::new();
    for array in graph.arrays_below(crate::node::ROOT) {
        let Some(node) = graph.array(array) else {
            continue;
        };
        if node.special.array_dimensions.is_none()
            && node
                .dimensions
                .iter()
                .all(|dimension| graph.get(*dimension).parent == Some(array))
        {
            continue;
        }
        let references: Vec<String> = node
            .dimensions
            .iter()
            .map(|dimension| dimension_reference(graph, array, *dimension))
            .collect();
        if node.special.array_dimensions.as_ref() != Some(&references) {
            writes.push(array_dimensions_write(graph, array)?);
        }
    }
    Ok(writes)
}

/// Update the special attributes of every array with its `_ARRAY_DIMENSIONS` computed from the graph.
pub(crate) fn refresh_array_dimensions(graph: &mut NodeGraph) {
    for array in graph.arrays_below(crate::node::ROOT) {
        let Some(node) = graph.array(array) else {
            continue;
        };
        if node.special.array_dimensions.is_none()
            && node
                .dimensions
                .iter()
                .all(|dimension| graph.get(*dimension).parent == Some(array))
        {
            continue;
        }
        let references: Vec<String> = node
            .dimensions
            .iter()
            .map(|dimension| dimension_reference(graph, array, *dimension))
            .collect();
        if let Some(node) = graph.array_mut(array) {
            node.special.array_dimensions = Some(references);
        }
    }
}

/// The indexing variable of the dimension `id`.
pub(crate) fn indexing_variable(graph: &NodeGraph, id: NodeId) -> Option<NodeId> {
    let data = graph.dimension(id)?;
    if let Some(array) = data.indexing_variable {
        if !graph.get(array).deleted {
            return Some(array);
        }
    }
    let owner = graph.get(id).parent?;
    let name = &graph.get(id).name;
    graph
        .find_child(owner, name, &[NodeKind::Array])
        .filter(|array| {
            matches!(&graph.get(*array).data, NodeData::Array(node) if node.dimensions == [id])
        })
}
