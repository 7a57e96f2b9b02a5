use derive_more::Display;
use serde::{Deserialize, Serialize};

use crate::array::{ArrayShape, ChunkKeySeparator};

use super::{AdditionalFields, CodecMetadata};

/// Array metadata (`.zarray`).
///
/// An example document:
/// ```json
/// {
///     "chunks": [
///         1000,
///         1000
///     ],
///     "compressor": {
///         "id": "blosc",
///         "cname": "lz4",
///         "clevel": 5,
///         "shuffle": 1
///     },
///     "dtype": "<f8",
///     "fill_value": "NaN",
///     "filters": null,
///     "order": "C",
///     "shape": [
///         10000,
///         10000
///     ],
///     "zarr_format": 2
/// }
/// ```
///
/// The `dtype` and `fill_value` are kept as raw JSON and interpreted with
/// [`data_type_from_metadata`](super::data_type_from_metadata) and
/// [`fill_value_from_metadata`](super::fill_value_from_metadata), which need the rest of the document.
#[derive(Serialize, Deserialize, Clone, PartialEq, Debug, Display)]
#[display("{}", serde_json::to_string(self).unwrap_or_default())]
pub struct ArrayMetadata {
    /// An integer defining the version of the storage specification to which the array adheres. Must be `2`.
    pub zarr_format: monostate::MustBe!(2u64),
    /// An array of integers providing the length of each dimension of the array.
    pub shape: ArrayShape,
    /// A list of integers defining the length of each dimension of a chunk of the array.
    pub chunks: ArrayShape,
    /// The data type of the array.
    pub dtype: serde_json::Value,
    /// A JSON object identifying the primary compression codec and providing configuration parameters, or null if no compressor is to be used.
    pub compressor: Option<CodecMetadata>,
    /// A scalar value providing the default value to use for uninitialized portions of the array, or null if no fill value is to be used.
    pub fill_value: serde_json::Value,
    /// Either “C” or “F”, defining the layout of bytes within each chunk of the array.
    pub order: ArrayMetadataOrder,
    /// A list of JSON objects providing codec configurations, or null if no filters are to be applied.
    #[serde(default)]
    pub filters: Option<Vec<CodecMetadata>>,
    /// If present, either the string "." or "/" defining the separator placed between the dimensions of a chunk.
    #[serde(default)]
    pub dimension_separator: ChunkKeySeparator,
    /// Additional fields, such as the `enums` labels of enumerated data types.
    #[serde(flatten)]
    pub additional_fields: AdditionalFields,
}

/// The layout of bytes within each chunk of the array.
#[derive(Serialize, Deserialize, Copy, Clone, PartialEq, Eq, Debug, Default)]
pub enum ArrayMetadataOrder {
    /// Row-major order. The last dimension varies fastest.
    #[default]
    C,
    /// Column-major order. The first dimension varies fastest.
    F,
}

/// The additional field holding enumeration labels.
pub(crate) const ENUMS_FIELD: &str = "enums";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn array_metadata() {
        let json = r#"{
            "chunks": [10, 10],
            "compressor": {"id": "zlib", "level": 1},
            "dtype": "<f8",
            "fill_value": "NaN",
            "filters": null,
            "order": "F",
            "shape": [100, 100],
            "zarr_format": 2,
            "dimension_separator": "/",
            "custom": {"a": 1}
        }"#;
        let metadata: ArrayMetadata = serde_json::from_str(json).unwrap();
        assert_eq!(metadata.order, ArrayMetadataOrder::F);
        assert_eq!(metadata.dimension_separator, ChunkKeySeparator::Slash);
        assert_eq!(metadata.compressor.as_ref().unwrap().id(), "zlib");
        assert_eq!(metadata.fill_value, "NaN");
        assert!(metadata.additional_fields.contains_key("custom"));
        let rewritten: ArrayMetadata =
            serde_json::from_str(&metadata.to_string()).unwrap();
        assert_eq!(rewritten, metadata);
    }

    #[test]
    fn array_metadata_default_separator() {
        let json = r#"{"chunks":[1],"compressor":null,"dtype":"|u1","fill_value":0,"filters":null,"order":"C","shape":[1],"zarr_format":2}"#;
        let metadata: ArrayMetadata = serde_json::from_str(json).unwrap();
        assert_eq!(metadata.dimension_separator, ChunkKeySeparator::Dot);
        assert!(serde_json::from_str::<ArrayMetadata>(&json.replace("\"zarr_format\":2", "\"zarr_format\":3")).is_err());
    }
}
