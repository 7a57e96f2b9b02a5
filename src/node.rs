//! Hierarchy nodes.
//!
//! Every entity of a [`Dataset`](crate::dataset::Dataset) (a group, an array, a dimension or an attribute) is a node of an
//! in-process [`NodeGraph`] owned by the dataset. Handles refer to their node by a [`NodeId`] which is never reused,
//! so a handle to a deleted node keeps observing the deletion even if a node with the same name is created later.
//!
//! Full names are computed from the graph on demand, so a rename is immediately visible to every handle below the renamed node.

mod node_discovery;
mod node_name;
mod node_path;

pub(crate) use node_discovery::discover;
pub use node_name::{NodeName, NodeNameError};
pub use node_path::{NodePath, NodePathError};

use std::sync::Arc;

use derive_more::Display;

use crate::{
    array::ArrayCore,
    dimension::DimensionData,
    error::MdError,
    metadata::{Attributes, SpecialAttributes},
};

/// The identifier of a node in a [`NodeGraph`].
pub(crate) type NodeId = usize;

/// The root group.
pub(crate) const ROOT: NodeId = 0;

/// The kind of a node.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Display)]
pub enum NodeKind {
    /// A group.
    Group,
    /// An array.
    Array,
    /// A dimension.
    Dimension,
    /// An attribute.
    Attribute,
}

/// The state of an array node.
#[derive(Debug)]
pub(crate) struct ArrayNode {
    pub(crate) core: Arc<ArrayCore>,
    pub(crate) dimensions: Vec<NodeId>,
    pub(crate) attributes: Attributes,
    pub(crate) special: SpecialAttributes,
}

#[derive(Debug)]
pub(crate) enum NodeData {
    Group { attributes: Attributes },
    Array(ArrayNode),
    /// An array whose metadata could not be interpreted.
    BrokenArray { error: String },
    Dimension(DimensionData),
    /// The value of an attribute is held by its owner.
    Attribute,
}

impl NodeData {
    pub(crate) const fn kind(&self) -> NodeKind {
        match self {
            Self::Group { .. } => NodeKind::Group,
            Self::Array(_) | Self::BrokenArray { .. } => NodeKind::Array,
            Self::Dimension(_) => NodeKind::Dimension,
            Self::Attribute => NodeKind::Attribute,
        }
    }
}

#[derive(Debug)]
pub(crate) struct NodeEntry {
    pub(crate) name: String,
    pub(crate) parent: Option<NodeId>,
    pub(crate) deleted: bool,
    pub(crate) children: Vec<NodeId>,
    pub(crate) data: NodeData,
}

impl NodeEntry {
    pub(crate) const fn kind(&self) -> NodeKind {
        self.data.kind()
    }
}

/// The nodes of a dataset.
///
/// Groups and arrays share one namespace per parent group.
/// Dimensions and attributes each have their own namespace per owner.
#[derive(Debug)]
pub(crate) struct NodeGraph {
    nodes: Vec<NodeEntry>,
}

impl NodeGraph {
    /// Create a graph holding a root group with `attributes`.
    pub(crate) fn new(attributes: Attributes) -> Self {
        Self {
            nodes: vec![NodeEntry {
                name: String::new(),
                parent: None,
                deleted: false,
                children: Vec::new(),
                data: NodeData::Group { attributes },
            }],
        }
    }

    pub(crate) fn insert(&mut self, parent: NodeId, name: &str, data: NodeData) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(NodeEntry {
            name: name.to_string(),
            parent: Some(parent),
            deleted: false,
            children: Vec::new(),
            data,
        });
        self.nodes[parent].children.push(id);
        id
    }

    /// The number of nodes, including deleted nodes.
    pub(crate) fn len(&self) -> usize {
        self.nodes.len()
    }

    pub(crate) fn get(&self, id: NodeId) -> &NodeEntry {
        &self.nodes[id]
    }

    pub(crate) fn get_mut(&mut self, id: NodeId) -> &mut NodeEntry {
        &mut self.nodes[id]
    }

    /// The full name of a node.
    pub(crate) fn path(&self, id: NodeId) -> NodePath {
        let mut names = Vec::new();
        let mut current = Some(id);
        while let Some(node) = current {
            let entry = &self.nodes[node];
            if entry.parent.is_some() {
                names.push(entry.name.as_str());
            }
            current = entry.parent;
        }
        names
            .iter()
            .rev()
            .fold(NodePath::root(), |path, name| path.child(name))
    }

    /// Returns the node if it has not been deleted.
    ///
    /// # Errors
    /// Returns [`MdError::Deleted`] if the node has been deleted.
    pub(crate) fn check_live(&self, id: NodeId) -> Result<&NodeEntry, MdError> {
        let entry = &self.nodes[id];
        if entry.deleted {
            Err(MdError::Deleted {
                kind: entry.kind(),
                name: self.path(id).to_string(),
            })
        } else {
            Ok(entry)
        }
    }

    /// The live children of `parent` of one of `kinds`.
    pub(crate) fn children<'a>(
        &'a self,
        parent: NodeId,
        kinds: &'a [NodeKind],
    ) -> impl Iterator<Item = NodeId> + 'a {
        self.nodes[parent].children.iter().copied().filter(move |child| {
            let entry = &self.nodes[*child];
            !entry.deleted && kinds.contains(&entry.kind())
        })
    }

    /// The live child `name` of `parent` of one of `kinds`.
    pub(crate) fn find_child(
        &self,
        parent: NodeId,
        name: &str,
        kinds: &[NodeKind],
    ) -> Option<NodeId> {
        self.children(parent, kinds)
            .find(|child| self.nodes[*child].name == name)
    }

    /// The names of the live children of `parent` of one of `kinds`, excluding hidden names, sorted.
    pub(crate) fn child_names(&self, parent: NodeId, kinds: &[NodeKind]) -> Vec<String> {
        let mut names: Vec<String> = self
            .children(parent, kinds)
            .map(|child| self.nodes[child].name.clone())
            .filter(|name| !NodeName::is_hidden(name))
            .collect();
        names.sort();
        names
    }

    /// Mark a node and every node below it deleted.
    pub(crate) fn mark_deleted_recursive(&mut self, id: NodeId) {
        let mut stack = vec![id];
        while let Some(node) = stack.pop() {
            let entry = &mut self.nodes[node];
            entry.deleted = true;
            stack.extend(entry.children.iter().copied());
        }
    }

    /// The live arrays at or below `id`.
    pub(crate) fn arrays_below(&self, id: NodeId) -> Vec<NodeId> {
        let mut arrays = Vec::new();
        let mut stack = vec![id];
        while let Some(node) = stack.pop() {
            let entry = &self.nodes[node];
            if entry.deleted {
                continue;
            }
            if matches!(entry.data, NodeData::Array(_)) {
                arrays.push(node);
            }
            stack.extend(entry.children.iter().copied());
        }
        arrays
    }

    /// The live arrays referencing the dimension `dimension`.
    pub(crate) fn arrays_referencing(&self, dimension: NodeId) -> Vec<NodeId> {
        (0..self.nodes.len())
            .filter(|id| {
                let entry = &self.nodes[*id];
                !entry.deleted
                    && matches!(&entry.data, NodeData::Array(array) if array.dimensions.contains(&dimension))
            })
            .collect()
    }

    /// The group `id` itself if it is a group, otherwise the nearest group above it.
    pub(crate) fn group_of(&self, id: NodeId) -> NodeId {
        let mut current = id;
        loop {
            let entry = &self.nodes[current];
            match (entry.kind(), entry.parent) {
                (NodeKind::Group, _) | (_, None) => return current,
                (_, Some(parent)) => current = parent,
            }
        }
    }

    /// `group` followed by the groups above it, up to the root.
    pub(crate) fn ancestor_groups(&self, group: NodeId) -> Vec<NodeId> {
        let mut groups = vec![group];
        let mut current = self.nodes[group].parent;
        while let Some(id) = current {
            groups.push(id);
            current = self.nodes[id].parent;
        }
        groups
    }

    /// The node of the live attribute `name` of `owner`, created if it does not have one yet.
    pub(crate) fn attribute_node(&mut self, owner: NodeId, name: &str) -> NodeId {
        self.find_child(owner, name, &[NodeKind::Attribute])
            .unwrap_or_else(|| self.insert(owner, name, NodeData::Attribute))
    }

    /// The user attributes of a group or array.
    pub(crate) fn attributes(&self, owner: NodeId) -> Option<&Attributes> {
        match &self.nodes[owner].data {
            NodeData::Group { attributes } => Some(attributes),
            NodeData::Array(array) => Some(&array.attributes),
            _ => None,
        }
    }

    /// The user attributes of a group or array.
    pub(crate) fn attributes_mut(&mut self, owner: NodeId) -> Option<&mut Attributes> {
        match &mut self.nodes[owner].data {
            NodeData::Group { attributes } => Some(attributes),
            NodeData::Array(array) => Some(&mut array.attributes),
            _ => None,
        }
    }

    pub(crate) fn array(&self, id: NodeId) -> Option<&ArrayNode> {
        match &self.nodes[id].data {
            NodeData::Array(array) => Some(array),
            _ => None,
        }
    }

    pub(crate) fn array_mut(&mut self, id: NodeId) -> Option<&mut ArrayNode> {
        match &mut self.nodes[id].data {
            NodeData::Array(array) => Some(array),
            _ => None,
        }
    }

    pub(crate) fn dimension(&self, id: NodeId) -> Option<&DimensionData> {
        match &self.nodes[id].data {
            NodeData::Dimension(dimension) => Some(dimension),
            _ => None,
        }
    }

    pub(crate) fn dimension_mut(&mut self, id: NodeId) -> Option<&mut DimensionData> {
        match &mut self.nodes[id].data {
            NodeData::Dimension(dimension) => Some(dimension),
            _ => None,
        }
    }

    /// Return a tree representation of the hierarchy below the group `id` as a string.
    ///
    /// Arrays are annotated with their shape and data type.
    /// For example:
    /// ```text
    /// /
    ///   a
    ///     baz [10000, 1000] float64
    ///     foo [10000, 1000] float64
    ///   b
    /// ```
    pub(crate) fn hierarchy_tree(&self, id: NodeId) -> String {
        fn update_tree(graph: &NodeGraph, string: &mut String, id: NodeId, depth: usize) {
            let entry = graph.get(id);
            let name = if entry.parent.is_none() {
                "/"
            } else {
                entry.name.as_str()
            };
            string.push_str(&" ".repeat(depth * 2));
            match &entry.data {
                NodeData::Array(array) => {
                    let s = format!(
                        "{} {:?} {}",
                        name,
                        array.core.shape(),
                        array.core.data_type()
                    );
                    string.push_str(&s);
                }
                NodeData::BrokenArray { .. } => {
                    string.push_str(name);
                    string.push_str(" (invalid)");
                }
                _ => string.push_str(name),
            }
            string.push('\n');
            let mut children: Vec<NodeId> = graph
                .children(id, &[NodeKind::Group, NodeKind::Array])
                .filter(|child| !NodeName::is_hidden(&graph.get(*child).name))
                .collect();
            children.sort_by(|a, b| graph.get(*a).name.cmp(&graph.get(*b).name));
            for child in children {
                update_tree(graph, string, child, depth + 1);
            }
        }

        let mut string = String::default();
        update_tree(self, &mut string, id, 0);
        string
    }
}
