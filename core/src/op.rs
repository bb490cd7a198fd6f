//! Edit operations produced by the differ and consumed by the patcher.

use alloc::{string::String, vec::Vec};
use core::fmt;

use crate::node::{Attributes, Listener, VNode};

/// A position in the live tree: child indices walked from the container.
///
/// The empty path names the container itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NodePath(Vec<usize>);

impl NodePath {
    /// The container path.
    #[must_use]
    pub const fn root() -> Self {
        Self(Vec::new())
    }

    /// Returns the path of this node's `index`-th child.
    #[must_use]
    pub fn child(&self, index: usize) -> Self {
        let mut indices = Vec::with_capacity(self.0.len() + 1);
        indices.extend_from_slice(&self.0);
        indices.push(index);
        Self(indices)
    }

    /// Splits the path into its parent path and the last index.
    ///
    /// Returns `None` for the container path.
    #[must_use]
    pub fn split_last(&self) -> Option<(Self, usize)> {
        let (last, parent) = self.0.split_last()?;
        Some((Self(parent.to_vec()), *last))
    }

    /// Returns `true` for the container path.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the indices making up this path.
    #[must_use]
    pub fn indices(&self) -> &[usize] {
        &self.0
    }

    /// Number of steps from the container.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.0.len()
    }
}

impl From<Vec<usize>> for NodePath {
    fn from(indices: Vec<usize>) -> Self {
        Self(indices)
    }
}

impl<const N: usize> From<[usize; N]> for NodePath {
    fn from(indices: [usize; N]) -> Self {
        Self(indices.to_vec())
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("/");
        }
        for index in &self.0 {
            write!(f, "/{index}")?;
        }
        Ok(())
    }
}

/// A single host node to create, without children or listeners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeSpec {
    /// An element with its attributes.
    Element {
        /// Tag name.
        tag: String,
        /// Reconciliation key, kept in the mount table for inspection.
        key: Option<String>,
        /// Attributes set right after creation.
        attrs: Attributes,
    },
    /// A text node.
    Text(String),
    /// A comment node.
    Comment(String),
}

impl NodeSpec {
    /// Describes `node` for creation.
    ///
    /// Returns `None` for fragments, which have no host node.
    #[must_use]
    pub fn of(node: &VNode) -> Option<Self> {
        match node {
            VNode::Element(element) => Some(Self::Element {
                tag: element.tag().into(),
                key: element.key_ref().map(Into::into),
                attrs: element.attrs().clone(),
            }),
            VNode::Text(content) => Some(Self::Text(content.clone())),
            VNode::Comment(content) => Some(Self::Comment(content.clone())),
            VNode::Fragment(_) => None,
        }
    }
}

/// How an attribute changes.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AttrChange {
    /// Set the attribute to a value.
    Set(String),
    /// Remove the attribute.
    Remove,
}

/// One atomic instruction moving the live tree toward the next tree.
///
/// Paths are resolved against the live tree at the moment the op is applied,
/// so every op observes the effects of the ops before it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditOp {
    /// Create a node and insert it as the `index`-th child of `parent`.
    CreateNode {
        /// Parent position.
        parent: NodePath,
        /// Index the new node occupies after insertion.
        index: usize,
        /// The node to create.
        spec: NodeSpec,
    },
    /// Remove the node at `path` together with its subtree.
    RemoveNode {
        /// Position of the node to remove.
        path: NodePath,
    },
    /// Replace the node at `path` with a freshly created node.
    ReplaceNode {
        /// Position of the node to replace.
        path: NodePath,
        /// The replacement.
        spec: NodeSpec,
    },
    /// Set or remove an attribute.
    UpdateAttr {
        /// Element position.
        path: NodePath,
        /// Attribute name.
        name: String,
        /// The change to apply.
        change: AttrChange,
    },
    /// Replace the content of a text or comment node.
    UpdateText {
        /// Node position.
        path: NodePath,
        /// New content.
        content: String,
    },
    /// Move a child of `parent` from `from` to `to`.
    ///
    /// `to` is the index the child ends up at, counted after it left `from`.
    Move {
        /// Parent position.
        parent: NodePath,
        /// Current index of the child.
        from: usize,
        /// Final index of the child.
        to: usize,
    },
    /// Register a listener on an element.
    AttachListener {
        /// Element position.
        path: NodePath,
        /// Event name.
        event: String,
        /// The callback.
        listener: Listener,
    },
    /// Deregister the listener bound to `event` on an element.
    DetachListener {
        /// Element position.
        path: NodePath,
        /// Event name.
        event: String,
    },
}

impl EditOp {
    /// Short name of the op kind, used in errors and logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::CreateNode { .. } => "CreateNode",
            Self::RemoveNode { .. } => "RemoveNode",
            Self::ReplaceNode { .. } => "ReplaceNode",
            Self::UpdateAttr { .. } => "UpdateAttr",
            Self::UpdateText { .. } => "UpdateText",
            Self::Move { .. } => "Move",
            Self::AttachListener { .. } => "AttachListener",
            Self::DetachListener { .. } => "DetachListener",
        }
    }

    /// The position this op targets: the node itself, or the parent for list ops.
    #[must_use]
    pub const fn target(&self) -> &NodePath {
        match self {
            Self::CreateNode { parent, .. } | Self::Move { parent, .. } => parent,
            Self::RemoveNode { path }
            | Self::ReplaceNode { path, .. }
            | Self::UpdateAttr { path, .. }
            | Self::UpdateText { path, .. }
            | Self::AttachListener { path, .. }
            | Self::DetachListener { path, .. } => path,
        }
    }
}

impl fmt::Display for EditOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CreateNode { parent, index, spec } => {
                write!(f, "create {spec:?} at {}", parent.child(*index))
            }
            Self::RemoveNode { path } => write!(f, "remove {path}"),
            Self::ReplaceNode { path, spec } => write!(f, "replace {path} with {spec:?}"),
            Self::UpdateAttr {
                path,
                name,
                change: AttrChange::Set(value),
            } => write!(f, "set {path}[{name}] = {value:?}"),
            Self::UpdateAttr {
                path,
                name,
                change: AttrChange::Remove,
            } => write!(f, "remove {path}[{name}]"),
            Self::UpdateText { path, content } => write!(f, "text {path} = {content:?}"),
            Self::Move { parent, from, to } => write!(f, "move {parent} {from} -> {to}"),
            Self::AttachListener { path, event, .. } => write!(f, "attach {path} on:{event}"),
            Self::DetachListener { path, event } => write!(f, "detach {path} on:{event}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_extend_and_split() {
        let path = NodePath::root().child(2).child(0);
        assert_eq!(path.indices(), &[2, 0]);
        assert_eq!(path.to_string(), "/2/0");
        let (parent, last) = path.split_last().unwrap();
        assert_eq!(parent, NodePath::from([2]));
        assert_eq!(last, 0);
        assert!(NodePath::root().split_last().is_none());
        assert_eq!(NodePath::root().to_string(), "/");
    }

    #[test]
    fn fragments_have_no_spec() {
        assert!(NodeSpec::of(&VNode::empty()).is_none());
        assert_eq!(
            NodeSpec::of(&VNode::Text("hi".into())),
            Some(NodeSpec::Text("hi".into()))
        );
    }
}
