use thiserror::Error;

use crate::storage::StorePrefix;

/// The name of a group, array, dimension or attribute.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct NodeName(String);

/// An invalid node name.
#[derive(Debug, Error)]
#[error("invalid node name {0}")]
pub struct NodeNameError(String);

impl NodeName {
    /// Create a new node name from `name`.
    ///
    /// # Errors
    /// Returns [`NodeNameError`] if `name` is not valid according to [`NodeName::validate`()].
    pub fn new(name: &str) -> Result<Self, NodeNameError> {
        if Self::validate(name) {
            Ok(Self(name.to_string()))
        } else {
            Err(NodeNameError(name.to_string()))
        }
    }

    /// Extracts a string slice containing the node name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Validates a node name. A node name
    /// - must not be empty, `.` or `..`,
    /// - must not include any of `/`, `\` and `:`, and
    /// - must not start with `.z`, the prefix of metadata documents.
    #[must_use]
    pub fn validate(node_name: &str) -> bool {
        !(node_name.is_empty()
            || node_name == "."
            || node_name == ".."
            || node_name.contains(['/', '\\', ':'])
            || node_name.starts_with(".z"))
    }

    /// Returns true if the node is hidden from listings: its name starts with `.`.
    #[must_use]
    pub fn is_hidden(node_name: &str) -> bool {
        node_name.starts_with('.')
    }
}

impl TryFrom<&StorePrefix> for NodeName {
    type Error = NodeNameError;

    fn try_from(prefix: &StorePrefix) -> Result<Self, Self::Error> {
        let name = prefix
            .as_str()
            .strip_suffix('/')
            .and_then(|prefix| prefix.rsplit('/').next())
            .unwrap_or_default();
        Self::new(name)
    }
}

impl std::fmt::Display for NodeName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
