use derive_more::Display;
use serde::{Deserialize, Serialize};

use super::AdditionalFields;

/// Group metadata (`.zgroup`).
///
/// ```json
/// {
///     "zarr_format": 2
/// }
/// ```
#[derive(Serialize, Deserialize, Clone, Eq, PartialEq, Debug, Display, Default)]
#[display("{}", serde_json::to_string(self).unwrap_or_default())]
pub struct GroupMetadata {
    /// An integer defining the version of the storage specification to which the group adheres. Must be `2`.
    pub zarr_format: monostate::MustBe!(2u64),
    /// Additional fields.
    #[serde(default, flatten)]
    pub additional_fields: AdditionalFields,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_metadata() {
        let metadata: GroupMetadata = serde_json::from_str(r#"{"zarr_format":2}"#).unwrap();
        assert_eq!(metadata.to_string(), r#"{"zarr_format":2}"#);
        assert!(serde_json::from_str::<GroupMetadata>(r#"{"zarr_format":3}"#).is_err());
        let metadata: GroupMetadata =
            serde_json::from_str(r#"{"zarr_format":2,"extra":[1]}"#).unwrap();
        assert_eq!(metadata.additional_fields.len(), 1);
    }
}
