//! The mount table: live host handles, arranged like the last applied tree.

use alloc::{collections::BTreeMap, string::String, vec::Vec};

use crate::{
    node::{Attributes, NodeIdentity},
    op::{NodePath, NodeSpec},
    registry::ListenerHandle,
};

/// What a mounted node currently shows in the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MountedKind {
    /// An element.
    Element {
        /// Tag name.
        tag: String,
        /// Reconciliation key it was mounted with.
        key: Option<String>,
        /// Attributes currently set on the host node.
        attrs: Attributes,
    },
    /// A text node and its content.
    Text(String),
    /// A comment node and its content.
    Comment(String),
}

impl MountedKind {
    /// Identity of the mounted node, comparable with
    /// [`VNode::identity`](crate::node::VNode::identity).
    #[must_use]
    pub fn identity(&self) -> NodeIdentity {
        match self {
            Self::Element { tag, key, .. } => NodeIdentity::Element {
                tag: tag.clone(),
                key: key.clone(),
            },
            Self::Text(_) => NodeIdentity::Text,
            Self::Comment(_) => NodeIdentity::Comment,
        }
    }
}

impl From<NodeSpec> for MountedKind {
    fn from(spec: NodeSpec) -> Self {
        match spec {
            NodeSpec::Element { tag, key, attrs } => Self::Element { tag, key, attrs },
            NodeSpec::Text(content) => Self::Text(content),
            NodeSpec::Comment(content) => Self::Comment(content),
        }
    }
}

/// A listener registered with the host on behalf of a mounted element.
#[derive(Debug)]
pub struct ListenerBinding<T> {
    /// Registry handle of the callback.
    pub handle: ListenerHandle,
    /// Host receipt used to deregister it.
    pub token: T,
}

/// One live node: its host handle, what it shows, its listeners and its children.
#[derive(Debug)]
pub struct MountedNode<N, T> {
    handle: N,
    kind: MountedKind,
    listeners: BTreeMap<String, ListenerBinding<T>>,
    children: Vec<MountedNode<N, T>>,
}

impl<N, T> MountedNode<N, T> {
    /// Creates a childless node without listeners.
    pub fn new(handle: N, kind: impl Into<MountedKind>) -> Self {
        Self {
            handle,
            kind: kind.into(),
            listeners: BTreeMap::new(),
            children: Vec::new(),
        }
    }

    /// Host handle.
    pub const fn handle(&self) -> &N {
        &self.handle
    }

    /// Current content description.
    pub const fn kind(&self) -> &MountedKind {
        &self.kind
    }

    /// Mounted children.
    pub fn children(&self) -> &[Self] {
        &self.children
    }

    /// Listener handles by event name.
    pub fn listeners(&self) -> impl Iterator<Item = (&str, ListenerHandle)> + '_ {
        self.listeners
            .iter()
            .map(|(event, binding)| (event.as_str(), binding.handle))
    }

    /// Binding for `event`, if any.
    pub fn listener(&self, event: &str) -> Option<&ListenerBinding<T>> {
        self.listeners.get(event)
    }

    /// Number of host nodes in this subtree, including itself.
    pub fn subtree_len(&self) -> usize {
        1 + self.children.iter().map(Self::subtree_len).sum::<usize>()
    }

    pub(crate) const fn kind_mut(&mut self) -> &mut MountedKind {
        &mut self.kind
    }

    pub(crate) fn bind(&mut self, event: String, binding: ListenerBinding<T>) {
        self.listeners.insert(event, binding);
    }

    pub(crate) fn unbind(&mut self, event: &str) -> Option<ListenerBinding<T>> {
        self.listeners.remove(event)
    }

    /// Paths (relative to `base`) and event names of every listener in this subtree, pre-order.
    pub(crate) fn bound_listeners(&self, base: &NodePath, out: &mut Vec<(NodePath, String)>) {
        for event in self.listeners.keys() {
            out.push((base.clone(), event.clone()));
        }
        for (index, child) in self.children.iter().enumerate() {
            child.bound_listeners(&base.child(index), out);
        }
    }

    fn descend(&self, indices: &[usize]) -> Option<&Self> {
        indices
            .iter()
            .try_fold(self, |node, &index| node.children.get(index))
    }

    fn descend_mut(&mut self, indices: &[usize]) -> Option<&mut Self> {
        indices
            .iter()
            .try_fold(self, |node, &index| node.children.get_mut(index))
    }
}

/// Why a mount table update was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountError {
    /// The parent position is not mounted.
    MissingParent,
    /// The position is not mounted.
    MissingNode,
    /// The index lies past the end of the sibling list.
    IndexOutOfBounds,
}

impl MountError {
    /// Human readable reason.
    #[must_use]
    pub const fn reason(self) -> &'static str {
        match self {
            Self::MissingParent => "parent is not mounted",
            Self::MissingNode => "no node is mounted there",
            Self::IndexOutOfBounds => "index is past the end of the sibling list",
        }
    }
}

/// Live mapping from tree positions to host handles.
///
/// The container handle sits at the empty path; its children are the roots.
#[derive(Debug)]
pub struct MountTable<N, T> {
    container: N,
    roots: Vec<MountedNode<N, T>>,
}

impl<N, T> MountTable<N, T> {
    /// Creates an empty table mounting into `container`.
    pub const fn new(container: N) -> Self {
        Self {
            container,
            roots: Vec::new(),
        }
    }

    /// Container handle.
    pub const fn container(&self) -> &N {
        &self.container
    }

    /// Mounted root nodes, in host order.
    pub fn roots(&self) -> &[MountedNode<N, T>] {
        &self.roots
    }

    /// Node at `path`. The container path resolves to `None`: it is not a mounted node.
    pub fn get(&self, path: &NodePath) -> Option<&MountedNode<N, T>> {
        let (first, rest) = path.indices().split_first()?;
        self.roots.get(*first)?.descend(rest)
    }

    /// Mutable node at `path`.
    pub fn get_mut(&mut self, path: &NodePath) -> Option<&mut MountedNode<N, T>> {
        let (first, rest) = path.indices().split_first()?;
        self.roots.get_mut(*first)?.descend_mut(rest)
    }

    /// Host handle at `path`, the container for the empty path.
    pub fn handle_of(&self, path: &NodePath) -> Option<&N> {
        if path.is_root() {
            Some(&self.container)
        } else {
            self.get(path).map(MountedNode::handle)
        }
    }

    /// Children of the node at `parent`.
    pub fn children(&self, parent: &NodePath) -> Option<&[MountedNode<N, T>]> {
        if parent.is_root() {
            Some(&self.roots)
        } else {
            self.get(parent).map(MountedNode::children)
        }
    }

    fn children_mut(&mut self, parent: &NodePath) -> Option<&mut Vec<MountedNode<N, T>>> {
        if parent.is_root() {
            Some(&mut self.roots)
        } else {
            self.get_mut(parent).map(|node| &mut node.children)
        }
    }

    /// Inserts `node` as the `index`-th child of `parent`.
    ///
    /// # Errors
    ///
    /// Fails when `parent` is not mounted or `index` exceeds its child count.
    pub fn insert(
        &mut self,
        parent: &NodePath,
        index: usize,
        node: MountedNode<N, T>,
    ) -> Result<(), MountError> {
        let children = self.children_mut(parent).ok_or(MountError::MissingParent)?;
        if index > children.len() {
            return Err(MountError::IndexOutOfBounds);
        }
        children.insert(index, node);
        Ok(())
    }

    /// Removes and returns the subtree at `path`.
    ///
    /// # Errors
    ///
    /// Fails when nothing is mounted at `path`.
    pub fn remove(&mut self, path: &NodePath) -> Result<MountedNode<N, T>, MountError> {
        let (parent, index) = path.split_last().ok_or(MountError::MissingNode)?;
        let children = self.children_mut(&parent).ok_or(MountError::MissingParent)?;
        if index >= children.len() {
            return Err(MountError::MissingNode);
        }
        Ok(children.remove(index))
    }

    /// Swaps the subtree at `path` for `node`, returning the old subtree.
    ///
    /// # Errors
    ///
    /// Fails when nothing is mounted at `path`.
    pub fn replace(
        &mut self,
        path: &NodePath,
        node: MountedNode<N, T>,
    ) -> Result<MountedNode<N, T>, MountError> {
        let slot = self.get_mut(path).ok_or(MountError::MissingNode)?;
        Ok(core::mem::replace(slot, node))
    }

    /// Moves the child at `from` so that it ends up at `to` (counted after removal).
    ///
    /// # Errors
    ///
    /// Fails when `parent` is not mounted or either index is out of range.
    pub fn move_child(
        &mut self,
        parent: &NodePath,
        from: usize,
        to: usize,
    ) -> Result<(), MountError> {
        let children = self.children_mut(parent).ok_or(MountError::MissingParent)?;
        if from >= children.len() || to >= children.len() {
            return Err(MountError::IndexOutOfBounds);
        }
        let node = children.remove(from);
        children.insert(to, node);
        Ok(())
    }

    /// Detaches every root, leaving the table empty.
    pub fn take_roots(&mut self) -> Vec<MountedNode<N, T>> {
        core::mem::take(&mut self.roots)
    }

    /// Total number of mounted nodes.
    pub fn len(&self) -> usize {
        self.roots.iter().map(MountedNode::subtree_len).sum()
    }

    /// Returns `true` when nothing is mounted.
    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Every mounted node with its path, in pre-order.
    pub fn nodes(&self) -> Vec<(NodePath, &MountedNode<N, T>)> {
        fn walk<'a, N, T>(
            path: NodePath,
            node: &'a MountedNode<N, T>,
            out: &mut Vec<(NodePath, &'a MountedNode<N, T>)>,
        ) {
            out.push((path.clone(), node));
            for (index, child) in node.children.iter().enumerate() {
                walk(path.child(index), child, out);
            }
        }

        let mut out = Vec::with_capacity(self.len());
        for (index, root) in self.roots.iter().enumerate() {
            walk(NodePath::root().child(index), root, &mut out);
        }
        out
    }

    /// Checks the table against a layout: the same positions in pre-order, with the same
    /// identities.
    ///
    /// # Errors
    ///
    /// Returns the index of the first mismatching layout entry, its path and a reason.
    pub fn verify(
        &self,
        layout: &[(NodePath, NodeIdentity)],
    ) -> Result<(), (usize, NodePath, &'static str)> {
        let nodes = self.nodes();
        for (index, (path, identity)) in layout.iter().enumerate() {
            let Some((mounted_path, node)) = nodes.get(index) else {
                return Err((index, path.clone(), "expected node is not mounted"));
            };
            if mounted_path != path {
                return Err((index, path.clone(), "mounted tree shape differs"));
            }
            if node.kind.identity() != *identity {
                return Err((index, path.clone(), "mounted node has a different identity"));
            }
        }
        if nodes.len() > layout.len() {
            let (path, _) = &nodes[layout.len()];
            return Err((layout.len(), path.clone(), "stale node is still mounted"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    type Table = MountTable<u32, ()>;

    fn text(handle: u32) -> MountedNode<u32, ()> {
        MountedNode::new(handle, MountedKind::Text(String::new()))
    }

    fn element(handle: u32) -> MountedNode<u32, ()> {
        MountedNode::new(
            handle,
            MountedKind::Element {
                tag: "div".into(),
                key: None,
                attrs: Attributes::new(),
            },
        )
    }

    #[test]
    fn insert_lookup_remove() {
        let mut table = Table::new(0);
        table.insert(&NodePath::root(), 0, element(1)).unwrap();
        table.insert(&NodePath::from([0]), 0, text(2)).unwrap();
        table.insert(&NodePath::from([0]), 0, text(3)).unwrap();

        assert_eq!(table.handle_of(&NodePath::root()), Some(&0));
        assert_eq!(table.handle_of(&NodePath::from([0, 0])), Some(&3));
        assert_eq!(table.handle_of(&NodePath::from([0, 1])), Some(&2));
        assert_eq!(table.len(), 3);

        let removed = table.remove(&NodePath::from([0, 0])).unwrap();
        assert_eq!(*removed.handle(), 3);
        assert_eq!(table.handle_of(&NodePath::from([0, 0])), Some(&2));
    }

    #[test]
    fn rejects_unknown_positions() {
        let mut table = Table::new(0);
        assert_eq!(
            table.insert(&NodePath::from([4]), 0, text(1)).unwrap_err(),
            MountError::MissingParent
        );
        assert_eq!(
            table.insert(&NodePath::root(), 1, text(1)).unwrap_err(),
            MountError::IndexOutOfBounds
        );
        assert_eq!(
            table.remove(&NodePath::from([0])).unwrap_err(),
            MountError::MissingNode
        );
        assert!(table.remove(&NodePath::root()).is_err());
    }

    #[test]
    fn move_child_counts_after_removal() {
        let mut table = Table::new(0);
        for (index, handle) in [1, 2, 3].into_iter().enumerate() {
            table.insert(&NodePath::root(), index, text(handle)).unwrap();
        }
        table.move_child(&NodePath::root(), 2, 0).unwrap();
        let order: Vec<_> = table.roots().iter().map(|node| *node.handle()).collect();
        assert_eq!(order, vec![3, 1, 2]);
        table.move_child(&NodePath::root(), 0, 2).unwrap();
        let order: Vec<_> = table.roots().iter().map(|node| *node.handle()).collect();
        assert_eq!(order, vec![1, 2, 3]);
    }

    #[test]
    fn verify_detects_stale_nodes() {
        let mut table = Table::new(0);
        table.insert(&NodePath::root(), 0, text(1)).unwrap();
        table.insert(&NodePath::root(), 1, text(2)).unwrap();
        let layout = vec![(NodePath::from([0]), NodeIdentity::Text)];
        let (index, path, _) = table.verify(&layout).unwrap_err();
        assert_eq!(index, 1);
        assert_eq!(path, NodePath::from([1]));

        table.remove(&NodePath::from([1])).unwrap();
        assert!(table.verify(&layout).is_ok());
    }
}
