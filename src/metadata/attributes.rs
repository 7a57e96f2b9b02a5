//! Attributes (`.zattrs`) and the special attributes interpreted by this crate.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::Attributes;

/// The names of the dimensions of an array.
pub const ARRAY_DIMENSIONS_ATTRIBUTE: &str = "_ARRAY_DIMENSIONS";

/// The spatial reference of an array.
pub const CRS_ATTRIBUTE: &str = "_CRS";

/// The unit of the values of an array.
pub const UNITS_ATTRIBUTE: &str = "units";

/// The offset of the unpacked values of an array.
pub const OFFSET_ATTRIBUTE: &str = "add_offset";

/// The scale of the unpacked values of an array.
pub const SCALE_ATTRIBUTE: &str = "scale_factor";

/// A spatial reference, in up to three equivalent representations.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
pub struct SpatialRef {
    /// Well known text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wkt: Option<String>,
    /// A URL identifying the reference system.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// A PROJJSON object.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub projjson: Option<Value>,
}

impl SpatialRef {
    /// Create a spatial reference from well known text.
    #[must_use]
    pub fn from_wkt(wkt: impl Into<String>) -> Self {
        Self {
            wkt: Some(wkt.into()),
            ..Self::default()
        }
    }

    /// Returns true if no representation is present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.wkt.is_none() && self.url.is_none() && self.projjson.is_none()
    }
}

/// The special attributes of an array.
///
/// These are kept in `.zattrs` next to user attributes, but are not listed as attributes of the array.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct SpecialAttributes {
    /// `_ARRAY_DIMENSIONS`.
    pub array_dimensions: Option<Vec<String>>,
    /// `_CRS`.
    pub crs: Option<SpatialRef>,
    /// `units`.
    pub units: Option<String>,
    /// `add_offset`.
    pub add_offset: Option<f64>,
    /// `scale_factor`.
    pub scale_factor: Option<f64>,
}

fn take<T: for<'de> Deserialize<'de>>(attributes: &mut Attributes, name: &str) -> Option<T> {
    let value = attributes.get(name)?;
    match serde_json::from_value(value.clone()) {
        Ok(parsed) => {
            attributes.remove(name);
            Some(parsed)
        }
        Err(err) => {
            log::warn!("attribute {name} is kept as a user attribute: {err}");
            None
        }
    }
}

impl SpecialAttributes {
    /// Split the special attributes from user attributes.
    ///
    /// A special attribute with an unexpected value is left as a user attribute.
    #[must_use]
    pub fn split(mut attributes: Attributes) -> (Self, Attributes) {
        let special = Self {
            array_dimensions: take(&mut attributes, ARRAY_DIMENSIONS_ATTRIBUTE),
            crs: take(&mut attributes, CRS_ATTRIBUTE),
            units: take(&mut attributes, UNITS_ATTRIBUTE),
            add_offset: take(&mut attributes, OFFSET_ATTRIBUTE),
            scale_factor: take(&mut attributes, SCALE_ATTRIBUTE),
        };
        (special, attributes)
    }

    /// Merge the special attributes with user attributes into one attributes document.
    #[must_use]
    pub fn merge(&self, user_attributes: &Attributes) -> Attributes {
        let mut attributes = Attributes::new();
        if let Some(array_dimensions) = &self.array_dimensions {
            attributes.insert(
                ARRAY_DIMENSIONS_ATTRIBUTE.to_string(),
                Value::from(array_dimensions.clone()),
            );
        }
        if let Some(crs) = self.crs.as_ref().filter(|crs| !crs.is_empty()) {
            if let Ok(crs) = serde_json::to_value(crs) {
                attributes.insert(CRS_ATTRIBUTE.to_string(), crs);
            }
        }
        if let Some(units) = &self.units {
            attributes.insert(UNITS_ATTRIBUTE.to_string(), Value::from(units.clone()));
        }
        if let Some(add_offset) = self.add_offset {
            attributes.insert(OFFSET_ATTRIBUTE.to_string(), Value::from(add_offset));
        }
        if let Some(scale_factor) = self.scale_factor {
            attributes.insert(SCALE_ATTRIBUTE.to_string(), Value::from(scale_factor));
        }
        for (name, value) in user_attributes {
            attributes.insert(name.clone(), value.clone());
        }
        attributes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn special_attributes_split_merge() {
        let json = r#"{
            "_ARRAY_DIMENSIONS": ["y", "x"],
            "_CRS": {"wkt": "LOCAL_CS[\"x\"]", "url": "http://example.com"},
            "units": "m",
            "add_offset": 1.5,
            "scale_factor": 2,
            "standard_name": "height"
        }"#;
        let attributes: Attributes = serde_json::from_str(json).unwrap();
        let (special, user) = SpecialAttributes::split(attributes.clone());
        assert_eq!(
            special.array_dimensions,
            Some(vec!["y".to_string(), "x".to_string()])
        );
        assert_eq!(special.crs.as_ref().unwrap().url.as_deref(), Some("http://example.com"));
        assert_eq!(special.units.as_deref(), Some("m"));
        assert_eq!(special.add_offset, Some(1.5));
        assert_eq!(special.scale_factor, Some(2.0));
        assert_eq!(user.len(), 1);
        assert_eq!(user["standard_name"], "height");

        let merged = special.merge(&user);
        let (special2, user2) = SpecialAttributes::split(merged);
        assert_eq!(special2, special);
        assert_eq!(user2, user);
    }

    #[test]
    fn special_attributes_invalid_kept() {
        let attributes: Attributes =
            serde_json::from_str(r#"{"units": 3, "_ARRAY_DIMENSIONS": "x"}"#).unwrap();
        let (special, user) = SpecialAttributes::split(attributes);
        assert!(special.units.is_none());
        assert!(special.array_dimensions.is_none());
        assert_eq!(user.len(), 2);
    }
}
