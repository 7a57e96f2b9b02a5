//! Metadata documents.
//!
//! A hierarchy is described by three kinds of JSON documents:
//!  - [`GroupMetadata`] (`.zgroup`), a group marker,
//!  - [`ArrayMetadata`] (`.zarray`), the shape, chunking, data type, fill value and codecs of an array, and
//!  - attributes (`.zattrs`), a JSON object of user attributes and the [special attributes](SpecialAttributes)
//!    interpreted by this crate.
//!
//! Unknown keys of a document are retained as [`AdditionalFields`] and written back unchanged on rewrite.

mod array;
mod attributes;
mod codec;
mod data_type;
mod fill_value;
mod group;

pub(crate) use array::ENUMS_FIELD;
pub use array::{ArrayMetadata, ArrayMetadataOrder};
pub use attributes::{
    SpatialRef, SpecialAttributes, ARRAY_DIMENSIONS_ATTRIBUTE, CRS_ATTRIBUTE,
    OFFSET_ATTRIBUTE, SCALE_ATTRIBUTE, UNITS_ATTRIBUTE,
};
pub use codec::CodecMetadata;
pub use data_type::{
    data_type_from_metadata, data_type_to_metadata, DataTypeMetadataError, ParsedDataType,
};
pub(crate) use data_type::parse_simple_dtype;
pub use fill_value::{fill_value_from_metadata, fill_value_to_metadata, FillValueMetadataError};
pub use group::GroupMetadata;

/// Additional fields in array or group metadata.
pub type AdditionalFields = serde_json::Map<String, serde_json::Value>;

/// A JSON object of attributes.
pub type Attributes = serde_json::Map<String, serde_json::Value>;
