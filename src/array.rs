//! Multidimensional arrays.
//!
//! An [`MDArray`] is a chunked array of a [`Dataset`](crate::dataset::Dataset) along an ordered list of
//! [dimensions](crate::dimension::Dimension). Its elements have an [`ExtendedDataType`]: numeric, fixed-width string,
//! compound or enumerated.
//!
//! ### Storage
//!
//! An array is stored as a `.zarray` metadata document, an optional `.zattrs` attributes document, and one blob per
//! stored chunk. A chunk is encoded by the [codec pipeline](codec) of the array: the memory-layout stage (row-major or
//! column-major), the byte-order stage, then the filters and the compressor.
//! A chunk that has never been written is not stored: all of its elements have the fill value of the array.
//!
//! ### Reading and writing
//!
//! [`read`](MDArray::read) and [`write`](MDArray::write) transfer a window of the array: `count` elements per
//! dimension from `start`, `step` elements apart. A negative step walks a dimension backwards.
//! Elements are converted between the data type of the array and the data type of the buffer.
//! The buffer is always dense and in row-major order.
//!
//! ### Views
//!
//! [`transpose`](MDArray::transpose) and [`slice`](MDArray::slice) return views: arrays remapping the dimensions of the
//! array without copying it. A view reads and writes through the chunks of the array.

mod array_core;
mod array_create_options;
mod array_errors;
mod array_sync_readable;
mod array_sync_writable;
mod array_view;
mod block_transpose;
mod chunk_cache;
pub mod chunk_grid;
pub mod chunk_key_encoding;
mod chunk_store;
pub mod codec;
pub mod data_type;
mod element;
mod endianness;
mod fill_value;
pub(crate) mod tile_presence;
mod windowed_io;

use std::sync::Arc;

pub use self::{
    array_create_options::ArrayCreateOptions,
    array_errors::{ArrayCreateError, ArrayError},
    chunk_grid::RegularChunkGrid,
    chunk_key_encoding::{ChunkKeyEncoding, ChunkKeySeparator},
    codec::CodecChain,
    data_type::{
        Component, CompoundDataType, DataTypeClass, DataTypeError, EnumDataType, EnumLabel,
        ExtendedDataType, NumericDataType, StringDataType, StringSubtype, TextWidth,
    },
    element::Element,
    endianness::{Endianness, NATIVE_ENDIAN},
    fill_value::FillValue,
};
pub(crate) use self::{array_core::ArrayCore, chunk_store::ChunkStore};

use crate::{
    attribute::{self, Attribute, AttributeValue},
    dataset::SharedResource,
    dimension::Dimension,
    error::MdError,
    group::rename_node,
    metadata::{SpatialRef, SpecialAttributes},
    node::{NodeGraph, NodeId, NodeKind, NodePath},
};

use self::array_view::ViewMapping;

/// An ND index to an element in an array.
pub type ArrayIndices = Vec<u64>;

/// The shape of an array.
pub type ArrayShape = Vec<u64>;

/// The name of the attribute listing the coordinate variables of an array.
const COORDINATES_ATTRIBUTE: &str = "coordinates";

/// An array of a [`Dataset`](crate::dataset::Dataset), or a view of one.
///
/// A handle to an array which has been deleted fails every operation with [`MdError::Deleted`].
/// A handle follows the renames of the array and of the groups above it.
#[derive(Clone)]
pub struct MDArray {
    shared: Arc<SharedResource>,
    id: NodeId,
    view: Option<ViewMapping>,
}

impl std::fmt::Debug for MDArray {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MDArray")
            .field("full_name", &self.full_name().as_str())
            .field("view", &self.view)
            .finish_non_exhaustive()
    }
}

impl MDArray {
    pub(crate) fn new(shared: Arc<SharedResource>, id: NodeId) -> Self {
        Self {
            shared,
            id,
            view: None,
        }
    }

    pub(crate) const fn id(&self) -> NodeId {
        self.id
    }

    pub(crate) fn shared(&self) -> &Arc<SharedResource> {
        &self.shared
    }

    /// Returns true if the array is a view of another array.
    #[must_use]
    pub const fn is_view(&self) -> bool {
        self.view.is_some()
    }

    /// The path and the core of the array, if it has not been deleted.
    pub(crate) fn node(&self) -> Result<(NodePath, Arc<ArrayCore>), MdError> {
        let graph = self.shared.graph.read();
        Ok((graph.path(self.id), self.core_in(&graph)?))
    }

    fn core_in(&self, graph: &NodeGraph) -> Result<Arc<ArrayCore>, MdError> {
        graph.check_live(self.id)?;
        graph
            .array(self.id)
            .map(|node| node.core.clone())
            .ok_or_else(|| MdError::InvalidArgument(format!("{} is not an array", graph.path(self.id))))
    }

    fn mapping(&self, core: &ArrayCore) -> ViewMapping {
        self.view
            .clone()
            .unwrap_or_else(|| ViewMapping::identity(core.dimensionality()))
    }

    /// The name of the array. A view has the name of its array.
    #[must_use]
    pub fn name(&self) -> String {
        self.shared.graph.read().get(self.id).name.clone()
    }

    /// The full name of the array, e.g. `/group/array`.
    #[must_use]
    pub fn full_name(&self) -> NodePath {
        self.shared.graph.read().path(self.id)
    }

    /// The dimensions of the array.
    ///
    /// # Errors
    /// Returns [`MdError::Deleted`] if the array has been deleted.
    pub fn dimensions(&self) -> Result<Vec<Dimension>, MdError> {
        let graph = self.shared.graph.read();
        let core = self.core_in(&graph)?;
        let dimensions = graph
            .array(self.id)
            .map(|node| node.dimensions.clone())
            .unwrap_or_default();
        Ok(self
            .mapping(&core)
            .view_to_base()
            .into_iter()
            .filter_map(|axis| dimensions.get(axis))
            .map(|id| Dimension::new(self.shared.clone(), *id))
            .collect())
    }

    /// The shape of the array.
    ///
    /// # Errors
    /// Returns [`MdError::Deleted`] if the array has been deleted.
    pub fn shape(&self) -> Result<ArrayShape, MdError> {
        let (_, core) = self.node()?;
        Ok(self.mapping(&core).shape(&core.shape()))
    }

    /// The number of dimensions of the array.
    ///
    /// # Errors
    /// Returns [`MdError::Deleted`] if the array has been deleted.
    pub fn dimensionality(&self) -> Result<usize, MdError> {
        let (_, core) = self.node()?;
        Ok(self.mapping(&core).dimensionality())
    }

    /// The data type of the elements of the array.
    ///
    /// # Errors
    /// Returns [`MdError::Deleted`] if the array has been deleted.
    pub fn data_type(&self) -> Result<ExtendedDataType, MdError> {
        let (_, core) = self.node()?;
        Ok(core.data_type().clone())
    }

    /// The chunk shape of the array.
    ///
    /// # Errors
    /// Returns [`MdError::Deleted`] if the array has been deleted.
    pub fn chunk_shape(&self) -> Result<ArrayShape, MdError> {
        let (_, core) = self.node()?;
        Ok(self.mapping(&core).shape(core.chunk_shape()))
    }

    /// The no-data value of the array: its fill value, in the in-memory representation of its data type.
    ///
    /// # Errors
    /// Returns [`MdError::Deleted`] if the array has been deleted.
    pub fn no_data(&self) -> Result<Option<FillValue>, MdError> {
        let (_, core) = self.node()?;
        Ok(core.fill_value())
    }

    /// The no-data value of the array converted to [`f64`].
    ///
    /// Returns [`None`] if the array has no no-data value or its data type is not numeric.
    ///
    /// # Errors
    /// Returns [`MdError::Deleted`] if the array has been deleted.
    pub fn no_data_as_f64(&self) -> Result<Option<f64>, MdError> {
        let (_, core) = self.node()?;
        let Some(fill_value) = core.fill_value() else {
            return Ok(None);
        };
        let Ok(converter) = data_type::ValueConverter::new(
            core.data_type(),
            &ExtendedDataType::numeric(NumericDataType::Float64),
        ) else {
            return Ok(None);
        };
        let mut bytes = [0u8; 8];
        converter.convert(fill_value.as_ne_bytes(), &mut bytes);
        Ok(Some(f64::from_ne_bytes(bytes)))
    }

    fn special<T>(&self, f: impl FnOnce(&SpecialAttributes) -> T) -> Result<T, MdError> {
        let graph = self.shared.graph.read();
        graph.check_live(self.id)?;
        graph
            .array(self.id)
            .map(|node| f(&node.special))
            .ok_or_else(|| MdError::InvalidArgument(format!("{} is not an array", graph.path(self.id))))
    }

    /// Update the special attributes of the array and write its `.zattrs`.
    fn update_special(&self, f: impl FnOnce(&mut SpecialAttributes)) -> Result<(), MdError> {
        self.shared.check_update()?;
        let mut graph = self.shared.graph.write();
        graph.check_live(self.id)?;
        let path = graph.path(self.id);
        let node = graph
            .array_mut(self.id)
            .ok_or_else(|| MdError::InvalidArgument(format!("{path} is not an array")))?;
        let mut special = node.special.clone();
        f(&mut special);
        self.shared
            .write_attributes(&path, &special.merge(&node.attributes))?;
        node.special = special;
        Ok(())
    }

    /// The scale of the unpacked values of the array (`scale_factor`).
    ///
    /// # Errors
    /// Returns [`MdError::Deleted`] if the array has been deleted.
    pub fn scale(&self) -> Result<Option<f64>, MdError> {
        self.special(|special| special.scale_factor)
    }

    /// Set the scale of the unpacked values of the array.
    ///
    /// # Errors
    /// Returns an [`MdError`] if the dataset is not open in update mode, the array has been deleted, or the store fails.
    pub fn set_scale(&self, scale: Option<f64>) -> Result<(), MdError> {
        self.update_special(|special| special.scale_factor = scale)
    }

    /// The offset of the unpacked values of the array (`add_offset`).
    ///
    /// # Errors
    /// Returns [`MdError::Deleted`] if the array has been deleted.
    pub fn offset(&self) -> Result<Option<f64>, MdError> {
        self.special(|special| special.add_offset)
    }

    /// Set the offset of the unpacked values of the array.
    ///
    /// # Errors
    /// Returns an [`MdError`] if the dataset is not open in update mode, the array has been deleted, or the store fails.
    pub fn set_offset(&self, offset: Option<f64>) -> Result<(), MdError> {
        self.update_special(|special| special.add_offset = offset)
    }

    /// The unit of the values of the array.
    ///
    /// # Errors
    /// Returns [`MdError::Deleted`] if the array has been deleted.
    pub fn units(&self) -> Result<Option<String>, MdError> {
        self.special(|special| special.units.clone())
    }

    /// Set the unit of the values of the array. An empty unit removes it.
    ///
    /// # Errors
    /// Returns an [`MdError`] if the dataset is not open in update mode, the array has been deleted, or the store fails.
    pub fn set_units(&self, units: Option<&str>) -> Result<(), MdError> {
        let units = units.filter(|units| !units.is_empty()).map(str::to_string);
        self.update_special(|special| special.units = units)
    }

    /// The spatial reference of the array.
    ///
    /// # Errors
    /// Returns [`MdError::Deleted`] if the array has been deleted.
    pub fn spatial_ref(&self) -> Result<Option<SpatialRef>, MdError> {
        self.special(|special| special.crs.clone())
    }

    /// Set the spatial reference of the array.
    ///
    /// # Errors
    /// Returns an [`MdError`] if the dataset is not open in update mode, the array has been deleted, or the store fails.
    pub fn set_spatial_ref(&self, spatial_ref: Option<&SpatialRef>) -> Result<(), MdError> {
        let spatial_ref = spatial_ref.filter(|crs| !crs.is_empty()).cloned();
        self.update_special(|special| special.crs = spatial_ref)
    }

    /// The attributes of the array.
    ///
    /// The attributes interpreted by this crate, such as `_ARRAY_DIMENSIONS` or `units`, are not listed.
    ///
    /// # Errors
    /// Returns [`MdError::Deleted`] if the array has been deleted.
    pub fn attributes(&self) -> Result<Vec<Attribute>, MdError> {
        attribute::attributes_of(&self.shared, self.id)
    }

    /// The attribute `name` of the array.
    ///
    /// # Errors
    /// Returns [`MdError::NotFound`] if there is no such attribute.
    pub fn attribute(&self, name: &str) -> Result<Attribute, MdError> {
        attribute::attribute_of(&self.shared, self.id, name)
    }

    /// Create the attribute `name` of the array with `value`.
    ///
    /// # Errors
    /// Returns an [`MdError`] if the dataset is not open in update mode, `name` is reserved or used by another
    /// attribute, or the store fails.
    pub fn create_attribute(
        &self,
        name: &str,
        value: &AttributeValue,
    ) -> Result<Attribute, MdError> {
        attribute::create_attribute(&self.shared, self.id, name, value)
    }

    /// Delete the attribute `name` of the array.
    ///
    /// # Errors
    /// Returns an [`MdError`] if the dataset is not open in update mode, there is no such attribute, or the store fails.
    pub fn delete_attribute(&self, name: &str) -> Result<(), MdError> {
        attribute::delete_attribute(&self.shared, self.id, name)
    }

    /// Rename the array.
    ///
    /// # Errors
    /// Returns an [`MdError`] if the dataset is not open in update mode, this is a view, `name` is invalid or used by
    /// a sibling group or array, or the store fails.
    pub fn rename(&self, name: &str) -> Result<(), MdError> {
        if self.is_view() {
            return Err(MdError::InvalidArgument(
                "A view cannot be renamed".to_string(),
            ));
        }
        let mut graph = self.shared.graph.write();
        rename_node(&self.shared, &mut graph, self.id, name)
    }

    /// A view of the array with its dimensions reordered: dimension `i` of the view is dimension `axes[i]` of this
    /// array.
    ///
    /// # Errors
    /// Returns an [`MdError`] if the array has been deleted or `axes` is not a permutation of its dimensions.
    pub fn transpose(&self, axes: &[usize]) -> Result<Self, MdError> {
        let (_, core) = self.node()?;
        Ok(Self {
            shared: self.shared.clone(),
            id: self.id,
            view: Some(self.mapping(&core).transpose(axes)?),
        })
    }

    /// A view of the array with its dimension `axis` fixed to `index`, with one dimension less.
    ///
    /// # Errors
    /// Returns an [`MdError`] if the array has been deleted, `axis` is not a dimension of the array, or `index` is
    /// out of bounds.
    pub fn slice(&self, axis: usize, index: u64) -> Result<Self, MdError> {
        let (_, core) = self.node()?;
        let mapping = self.mapping(&core);
        let shape = mapping.shape(&core.shape());
        Ok(Self {
            shared: self.shared.clone(),
            id: self.id,
            view: Some(mapping.slice(axis, index, &shape)?),
        })
    }

    /// The coordinate variables of the array, listed in its `coordinates` attribute.
    ///
    /// Names are looked up among the arrays of the group of the array. Names which are not found are skipped.
    ///
    /// # Errors
    /// Returns [`MdError::Deleted`] if the array has been deleted.
    pub fn coordinate_variables(&self) -> Result<Vec<Self>, MdError> {
        let graph = self.shared.graph.read();
        graph.check_live(self.id)?;
        let Some(coordinates) = graph
            .attributes(self.id)
            .and_then(|attributes| attributes.get(COORDINATES_ATTRIBUTE))
            .and_then(serde_json::Value::as_str)
        else {
            return Ok(Vec::new());
        };
        let group = graph.group_of(self.id);
        let mut variables = Vec::new();
        for name in coordinates.split_whitespace() {
            match graph
                .find_child(group, name, &[NodeKind::Array])
                .filter(|id| graph.array(*id).is_some())
            {
                Some(id) => variables.push(Self::new(self.shared.clone(), id)),
                None => log::debug!(
                    "coordinate variable {name} of {} does not exist",
                    graph.path(self.id)
                ),
            }
        }
        Ok(variables)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dataset::{Dataset, OpenOptions},
        dimension::DimensionCreateOptions,
        storage::store::MemoryStore,
    };

    fn array_2d(rows: u64, cols: u64) -> Result<MDArray, MdError> {
        let dataset = Dataset::create(Arc::new(MemoryStore::new()), &OpenOptions::default())?;
        let root = dataset.root_group();
        let y = root.create_dimension("y", rows, &DimensionCreateOptions::default())?;
        let x = root.create_dimension("x", cols, &DimensionCreateOptions::default())?;
        let mut options = ArrayCreateOptions::default();
        options.chunk_shape(vec![2, 2]);
        root.create_md_array(
            "a",
            &[y, x],
            ExtendedDataType::numeric(NumericDataType::Int32),
            &options,
        )
    }

    #[test]
    fn md_array_views() -> Result<(), Box<dyn std::error::Error>> {
        let array = array_2d(3, 5)?;
        let values: Vec<i32> = (0..15).collect();
        array.write_elements(&[0, 0], &[3, 5], None, &values)?;

        let transposed = array.transpose(&[1, 0])?;
        assert!(transposed.is_view());
        assert_eq!(transposed.shape()?, vec![5, 3]);
        assert_eq!(transposed.name(), "a");
        let elements: Vec<i32> = transposed.read_elements(&[0, 0], &[5, 3], None)?;
        let expected: Vec<i32> = (0..5)
            .flat_map(|i| (0..3).map(move |j| j * 5 + i))
            .collect();
        assert_eq!(elements, expected);

        let row = array.slice(0, 1)?;
        assert_eq!(row.shape()?, vec![5]);
        assert_eq!(row.read_elements::<i32>(&[1], &[2], Some(&[2]))?, vec![6, 8]);
        row.write_elements(&[0], &[2], None, &[-1i32, -2])?;
        assert_eq!(
            array.read_elements::<i32>(&[1, 0], &[1, 3], None)?,
            vec![-1, -2, 7]
        );

        let column = transposed.slice(0, 4)?;
        assert_eq!(column.read_elements::<i32>(&[0], &[3], Some(&[1]))?, vec![4, 9, 14]);
        assert_eq!(column.dimensions()?[0].name(), "y");
        Ok(())
    }

    #[test]
    fn md_array_special_attributes() -> Result<(), Box<dyn std::error::Error>> {
        let array = array_2d(2, 2)?;
        array.set_scale(Some(2.0))?;
        array.set_offset(Some(-1.0))?;
        array.set_units(Some("m"))?;
        array.set_spatial_ref(Some(&SpatialRef::from_wkt("LOCAL_CS[\"a\"]")))?;
        assert_eq!(array.scale()?, Some(2.0));
        assert_eq!(array.offset()?, Some(-1.0));
        assert_eq!(array.units()?.as_deref(), Some("m"));
        assert!(array.attributes()?.is_empty());
        array.set_units(None)?;
        assert_eq!(array.units()?, None);

        assert_eq!(array.no_data_as_f64()?, None);
        array.set_no_data(Some(FillValue::from(-9i32)))?;
        assert_eq!(array.no_data_as_f64()?, Some(-9.0));
        assert_eq!(
            array.read_elements::<i32>(&[0, 0], &[2, 2], None)?,
            vec![-9; 4]
        );
        Ok(())
    }
}
