use serde::{de::DeserializeOwned, Deserialize, Serialize};

/// Codec metadata: an id and a flat configuration.
///
/// For example:
/// ```json
/// {
///     "id": "blosc",
///     "cname": "lz4",
///     "clevel": 5,
///     "shuffle": 1
/// }
/// ```
#[derive(Serialize, Deserialize, Clone, Eq, PartialEq, Debug)]
pub struct CodecMetadata {
    id: String,
    #[serde(flatten)]
    configuration: serde_json::Map<String, serde_json::Value>,
}

impl core::fmt::Display for CodecMetadata {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", serde_json::to_string(self).unwrap_or_default())
    }
}

impl CodecMetadata {
    /// Create codec metadata from an id and a configuration.
    #[must_use]
    pub fn new(id: &str, configuration: serde_json::Map<String, serde_json::Value>) -> Self {
        Self {
            id: id.to_string(),
            configuration,
        }
    }

    /// Create codec metadata from an id and a serializable configuration.
    ///
    /// # Errors
    /// Returns a [`serde_json::Error`] if `configuration` does not serialize to a JSON object.
    pub fn new_with_serializable_configuration<T: Serialize>(
        id: &str,
        configuration: &T,
    ) -> Result<Self, serde_json::Error> {
        match serde_json::to_value(configuration)? {
            serde_json::Value::Object(configuration) => Ok(Self::new(id, configuration)),
            _ => Err(serde::ser::Error::custom(
                "the configuration cannot be serialized to a JSON object",
            )),
        }
    }

    /// Return the "id" key.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Return the configuration, which includes all fields excluding the "id".
    #[must_use]
    pub fn configuration(&self) -> &serde_json::Map<String, serde_json::Value> {
        &self.configuration
    }

    /// Try and convert the configuration to a specific configuration type.
    ///
    /// # Errors
    /// Returns a [`serde_json::Error`] if the configuration cannot be converted.
    pub fn to_configuration<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(serde_json::Value::Object(self.configuration.clone()))
    }
}
