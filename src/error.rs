//! The error type of operations on groups, arrays, dimensions and attributes.

use thiserror::Error;

use crate::{
    array::{ArrayCreateError, ArrayError},
    metadata::DataTypeMetadataError,
    node::{NodeKind, NodeNameError},
    storage::StorageError,
};

/// An error of an operation on a [`Group`](crate::group::Group), [`MDArray`](crate::array::MDArray),
/// [`Dimension`](crate::dimension::Dimension) or [`Attribute`](crate::attribute::Attribute).
#[derive(Debug, Error)]
pub enum MdError {
    /// A mutation of a dataset opened read-only.
    #[error("Dataset not open in update mode")]
    ReadOnly,
    /// An operation on a deleted entity.
    #[error("{kind} {name} has been deleted")]
    Deleted {
        /// The kind of the entity.
        kind: NodeKind,
        /// The full name of the entity when it was deleted.
        name: String,
    },
    /// A name already used by a sibling.
    #[error("A {kind} with same name already exists")]
    NameCollision {
        /// The kind of the sibling.
        kind: NameCollisionKind,
    },
    /// An invalid name.
    #[error(transparent)]
    InvalidName(#[from] NodeNameError),
    /// A missing entity.
    #[error("{kind} {name} does not exist")]
    NotFound {
        /// The kind of the entity.
        kind: NodeKind,
        /// The name of the entity.
        name: String,
    },
    /// An invalid resize.
    #[error("{0}")]
    InvalidResize(String),
    /// An invalid argument.
    #[error("{0}")]
    InvalidArgument(String),
    /// An array whose metadata cannot be interpreted.
    #[error("array {name} cannot be opened: {error}")]
    InvalidArray {
        /// The full name of the array.
        name: String,
        /// The metadata error.
        error: String,
    },
    /// An array error.
    #[error(transparent)]
    ArrayError(#[from] ArrayError),
    /// An array creation error.
    #[error(transparent)]
    ArrayCreateError(#[from] ArrayCreateError),
    /// A data type error.
    #[error(transparent)]
    DataTypeMetadataError(#[from] DataTypeMetadataError),
    /// A storage error.
    #[error(transparent)]
    StorageError(#[from] StorageError),
    /// An error serializing metadata.
    #[error(transparent)]
    MetadataSerializationError(#[from] serde_json::Error),
}

/// The kind of a sibling whose name collides.
#[derive(Copy, Clone, Debug, PartialEq, Eq, derive_more::Display)]
pub enum NameCollisionKind {
    /// A group.
    #[display("group")]
    Group,
    /// An array.
    #[display("array")]
    Array,
    /// A dimension.
    #[display("dimension")]
    Dimension,
    /// An attribute.
    #[display("attribute")]
    Attribute,
}

impl From<NodeKind> for NameCollisionKind {
    fn from(kind: NodeKind) -> Self {
        match kind {
            NodeKind::Group => Self::Group,
            NodeKind::Array => Self::Array,
            NodeKind::Dimension => Self::Dimension,
            NodeKind::Attribute => Self::Attribute,
        }
    }
}

impl MdError {
    pub(crate) fn name_collision(kind: NodeKind) -> Self {
        Self::NameCollision { kind: kind.into() }
    }
}
