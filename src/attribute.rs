//! Attributes.
//!
//! Attributes are named JSON values attached to a group or an array, stored in its `.zattrs` document.
//! Every change to an attribute rewrites the document of its owner.

use std::sync::Arc;

use serde_json::{Number, Value};

use crate::{
    dataset::SharedResource,
    error::MdError,
    metadata::{
        Attributes, ARRAY_DIMENSIONS_ATTRIBUTE, CRS_ATTRIBUTE, OFFSET_ATTRIBUTE, SCALE_ATTRIBUTE,
        UNITS_ATTRIBUTE,
    },
    node::{NodeGraph, NodeId, NodeKind, NodeName, NodePath},
};

/// The value of an [`Attribute`].
#[derive(Clone, Debug, PartialEq)]
pub enum AttributeValue {
    /// A string.
    String(String),
    /// Any other JSON value, such as an object, a boolean or a mixed array.
    Json(Value),
    /// A signed integer.
    Int64(i64),
    /// An unsigned integer beyond the range of [`i64`].
    UInt64(u64),
    /// A floating point number.
    Float64(f64),
    /// A vector of strings.
    Strings(Vec<String>),
    /// A vector of signed integers.
    Int64s(Vec<i64>),
    /// A vector of integers, some beyond the range of [`i64`].
    UInt64s(Vec<u64>),
    /// A vector of numbers, some with a fractional part.
    Float64s(Vec<f64>),
}

fn number(value: f64) -> Value {
    Number::from_f64(value).map_or(Value::Null, Value::Number)
}

impl From<&Value> for AttributeValue {
    fn from(value: &Value) -> Self {
        match value {
            Value::String(string) => Self::String(string.clone()),
            Value::Number(number) => {
                if let Some(int) = number.as_i64() {
                    Self::Int64(int)
                } else if let Some(uint) = number.as_u64() {
                    Self::UInt64(uint)
                } else {
                    Self::Float64(number.as_f64().unwrap_or(f64::NAN))
                }
            }
            Value::Array(values) if !values.is_empty() => {
                if let Some(strings) = values
                    .iter()
                    .map(|value| value.as_str().map(str::to_string))
                    .collect::<Option<Vec<_>>>()
                {
                    Self::Strings(strings)
                } else if let Some(ints) = values.iter().map(Value::as_i64).collect::<Option<Vec<_>>>() {
                    Self::Int64s(ints)
                } else if let Some(uints) = values.iter().map(Value::as_u64).collect::<Option<Vec<_>>>() {
                    Self::UInt64s(uints)
                } else if let Some(floats) = values.iter().map(Value::as_f64).collect::<Option<Vec<_>>>() {
                    Self::Float64s(floats)
                } else {
                    Self::Json(value.clone())
                }
            }
            _ => Self::Json(value.clone()),
        }
    }
}

impl From<&AttributeValue> for Value {
    fn from(value: &AttributeValue) -> Self {
        match value {
            AttributeValue::String(string) => Value::from(string.as_str()),
            AttributeValue::Json(value) => value.clone(),
            AttributeValue::Int64(int) => Value::from(*int),
            AttributeValue::UInt64(uint) => Value::from(*uint),
            AttributeValue::Float64(float) => number(*float),
            AttributeValue::Strings(strings) => Value::from(strings.clone()),
            AttributeValue::Int64s(ints) => Value::from(ints.clone()),
            AttributeValue::UInt64s(uints) => Value::from(uints.clone()),
            AttributeValue::Float64s(floats) => {
                Value::Array(floats.iter().map(|float| number(*float)).collect())
            }
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        Self::Int64(value)
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        Self::Float64(value)
    }
}

impl From<Vec<f64>> for AttributeValue {
    fn from(value: Vec<f64>) -> Self {
        Self::Float64s(value)
    }
}

impl From<Vec<i64>> for AttributeValue {
    fn from(value: Vec<i64>) -> Self {
        Self::Int64s(value)
    }
}

impl From<Vec<String>> for AttributeValue {
    fn from(value: Vec<String>) -> Self {
        Self::Strings(value)
    }
}

/// The attribute names of arrays that are only accessible with dedicated accessors.
const RESERVED_ARRAY_ATTRIBUTES: [&str; 5] = [
    ARRAY_DIMENSIONS_ATTRIBUTE,
    CRS_ATTRIBUTE,
    UNITS_ATTRIBUTE,
    OFFSET_ATTRIBUTE,
    SCALE_ATTRIBUTE,
];

fn check_name(graph: &NodeGraph, owner: NodeId, name: &str) -> Result<(), MdError> {
    NodeName::new(name)?;
    if graph.array(owner).is_some() && RESERVED_ARRAY_ATTRIBUTES.contains(&name) {
        return Err(MdError::InvalidArgument(format!(
            "Attribute {name} is reserved and cannot be accessed as an attribute of an array"
        )));
    }
    Ok(())
}

fn owner_attributes(graph: &NodeGraph, owner: NodeId) -> Result<&Attributes, MdError> {
    graph.check_live(owner)?;
    graph.attributes(owner).ok_or_else(|| {
        MdError::InvalidArgument(format!("{} cannot hold attributes", graph.path(owner)))
    })
}

/// Write the user attributes of `owner` to its `.zattrs` document, then update the graph.
pub(crate) fn write_owner_attributes(
    shared: &SharedResource,
    graph: &mut NodeGraph,
    owner: NodeId,
    attributes: Attributes,
) -> Result<(), MdError> {
    let path = graph.path(owner);
    let document = match graph.array(owner) {
        Some(node) => node.special.merge(&attributes),
        None => attributes.clone(),
    };
    shared.write_attributes(&path, &document)?;
    if let Some(user_attributes) = graph.attributes_mut(owner) {
        *user_attributes = attributes;
    }
    Ok(())
}

/// The attributes of `owner`.
pub(crate) fn attributes_of(
    shared: &Arc<SharedResource>,
    owner: NodeId,
) -> Result<Vec<Attribute>, MdError> {
    let mut graph = shared.graph.write();
    let names: Vec<String> = owner_attributes(&graph, owner)?.keys().cloned().collect();
    Ok(names
        .iter()
        .map(|name| Attribute {
            shared: shared.clone(),
            id: graph.attribute_node(owner, name),
        })
        .collect())
}

/// The attribute `name` of `owner`.
pub(crate) fn attribute_of(
    shared: &Arc<SharedResource>,
    owner: NodeId,
    name: &str,
) -> Result<Attribute, MdError> {
    let mut graph = shared.graph.write();
    if !owner_attributes(&graph, owner)?.contains_key(name) {
        return Err(MdError::NotFound {
            kind: NodeKind::Attribute,
            name: name.to_string(),
        });
    }
    Ok(Attribute {
        shared: shared.clone(),
        id: graph.attribute_node(owner, name),
    })
}

/// Create the attribute `name` of `owner`.
pub(crate) fn create_attribute(
    shared: &Arc<SharedResource>,
    owner: NodeId,
    name: &str,
    value: &AttributeValue,
) -> Result<Attribute, MdError> {
    shared.check_update()?;
    let mut graph = shared.graph.write();
    check_name(&graph, owner, name)?;
    let mut attributes = owner_attributes(&graph, owner)?.clone();
    if attributes.contains_key(name) {
        return Err(MdError::name_collision(NodeKind::Attribute));
    }
    attributes.insert(name.to_string(), value.into());
    write_owner_attributes(shared, &mut graph, owner, attributes)?;
    Ok(Attribute {
        shared: shared.clone(),
        id: graph.attribute_node(owner, name),
    })
}

/// Delete the attribute `name` of `owner`.
pub(crate) fn delete_attribute(
    shared: &Arc<SharedResource>,
    owner: NodeId,
    name: &str,
) -> Result<(), MdError> {
    shared.check_update()?;
    let mut graph = shared.graph.write();
    let mut attributes = owner_attributes(&graph, owner)?.clone();
    if attributes.remove(name).is_none() {
        return Err(MdError::NotFound {
            kind: NodeKind::Attribute,
            name: name.to_string(),
        });
    }
    write_owner_attributes(shared, &mut graph, owner, attributes)?;
    if let Some(id) = graph.find_child(owner, name, &[NodeKind::Attribute]) {
        graph.mark_deleted_recursive(id);
    }
    Ok(())
}

/// An attribute of a [`Group`](crate::group::Group) or an [`MDArray`](crate::array::MDArray).
#[derive(Clone)]
pub struct Attribute {
    shared: Arc<SharedResource>,
    id: NodeId,
}

impl std::fmt::Debug for Attribute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Attribute")
            .field("full_name", &self.full_name().as_str())
            .finish_non_exhaustive()
    }
}

impl Attribute {
    fn owner(&self, graph: &NodeGraph) -> Result<NodeId, MdError> {
        let entry = graph.check_live(self.id)?;
        entry
            .parent
            .ok_or_else(|| MdError::InvalidArgument("attribute without an owner".to_string()))
    }

    /// The name of the attribute.
    #[must_use]
    pub fn name(&self) -> String {
        self.shared.graph.read().get(self.id).name.clone()
    }

    /// The full name of the attribute: the full name of its owner followed by its name.
    #[must_use]
    pub fn full_name(&self) -> NodePath {
        self.shared.graph.read().path(self.id)
    }

    /// The value of the attribute.
    ///
    /// # Errors
    /// Returns [`MdError::Deleted`] if the attribute has been deleted.
    pub fn value(&self) -> Result<AttributeValue, MdError> {
        let graph = self.shared.graph.read();
        let owner = self.owner(&graph)?;
        let name = &graph.get(self.id).name;
        owner_attributes(&graph, owner)?
            .get(name)
            .map(AttributeValue::from)
            .ok_or_else(|| MdError::Deleted {
                kind: NodeKind::Attribute,
                name: graph.path(self.id).to_string(),
            })
    }

    /// Replace the value of the attribute.
    ///
    /// # Errors
    /// Returns an [`MdError`] if the dataset is not open in update mode, the attribute has been deleted, or the store fails.
    pub fn write(&self, value: &AttributeValue) -> Result<(), MdError> {
        self.shared.check_update()?;
        let mut graph = self.shared.graph.write();
        let owner = self.owner(&graph)?;
        let name = graph.get(self.id).name.clone();
        let mut attributes = owner_attributes(&graph, owner)?.clone();
        attributes.insert(name, value.into());
        write_owner_attributes(&self.shared, &mut graph, owner, attributes)
    }

    /// Rename the attribute.
    ///
    /// # Errors
    /// Returns an [`MdError`] if the dataset is not open in update mode, the attribute has been deleted, `name` is
    /// invalid or used by another attribute of the owner, or the store fails.
    pub fn rename(&self, name: &str) -> Result<(), MdError> {
        self.shared.check_update()?;
        let mut graph = self.shared.graph.write();
        let owner = self.owner(&graph)?;
        let previous = graph.get(self.id).name.clone();
        if previous == name {
            return Ok(());
        }
        check_name(&graph, owner, name)?;
        let mut attributes = owner_attributes(&graph, owner)?.clone();
        if attributes.contains_key(name) {
            return Err(MdError::name_collision(NodeKind::Attribute));
        }
        let value = attributes.remove(&previous).unwrap_or(Value::Null);
        attributes.insert(name.to_string(), value);
        write_owner_attributes(&self.shared, &mut graph, owner, attributes)?;
        graph.get_mut(self.id).name = name.to_string();
        Ok(())
    }
}
