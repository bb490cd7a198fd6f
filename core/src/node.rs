//! The node model: immutable descriptions of a desired UI tree.
//!
//! A [`VNode`] tree is built fresh for every render and never mutated afterwards.
//! Builders in this module are plain value constructors; nothing here touches a host.
//!
//! ```
//! use waterdom_core::node::{VNode, element, text};
//!
//! let view: VNode = element("ul")
//!     .attr("class", "todos")
//!     .child(element("li").key("a").child(text("first")))
//!     .child(element("li").key("b").child(text("second")))
//!     .into();
//! assert_eq!(view.children().len(), 2);
//! ```

use alloc::{
    collections::BTreeMap,
    rc::Rc,
    string::{String, ToString},
    vec::Vec,
};
use core::fmt;

/// Ordered attribute mapping of an element, name to value.
pub type Attributes = BTreeMap<String, String>;

/// Ordered listener mapping of an element, event name to listener.
pub type Listeners = BTreeMap<String, Listener>;

/// Payload handed to a [`Listener`] when the host dispatches an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    name: String,
    value: Option<String>,
}

impl Event {
    /// Creates an event with the given name and no value.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: None,
        }
    }

    /// Attaches the current value of the event target (for example an input's text).
    #[must_use]
    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// Returns the event name, such as `click`.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the target value captured by the host, if any.
    #[must_use]
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }
}

/// An event callback carried by an element.
///
/// Two listeners are equal only when they share the same allocation, so cloning a
/// listener keeps its identity while wrapping the same closure twice does not.
#[derive(Clone)]
pub struct Listener(Rc<dyn Fn(&Event)>);

impl Listener {
    /// Wraps a closure into a listener.
    pub fn new(callback: impl Fn(&Event) + 'static) -> Self {
        Self(Rc::new(callback))
    }

    /// Invokes the callback.
    pub fn call(&self, event: &Event) {
        (self.0)(event);
    }

    /// Returns `true` when both listeners point at the same callback.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.addr() == other.addr()
    }

    pub(crate) fn addr(&self) -> usize {
        Rc::as_ptr(&self.0).cast::<()>() as usize
    }
}

impl PartialEq for Listener {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Listener {}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Listener({:#x})", self.addr())
    }
}

/// A description of one element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VElement {
    tag: String,
    key: Option<String>,
    attrs: Attributes,
    listeners: Listeners,
    children: Vec<VNode>,
}

impl VElement {
    /// Creates an element with the given tag and nothing else.
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            key: None,
            attrs: Attributes::new(),
            listeners: Listeners::new(),
            children: Vec::new(),
        }
    }

    /// Sets the reconciliation key.
    #[must_use]
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Sets an attribute, replacing any previous value under the same name.
    #[must_use]
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.insert(name.into(), value.into());
        self
    }

    /// Registers a callback for `event`, replacing any previous listener.
    #[must_use]
    pub fn on(self, event: impl Into<String>, callback: impl Fn(&Event) + 'static) -> Self {
        self.listener(event, Listener::new(callback))
    }

    /// Registers an existing listener for `event`, keeping its identity.
    #[must_use]
    pub fn listener(mut self, event: impl Into<String>, listener: Listener) -> Self {
        self.listeners.insert(event.into(), listener);
        self
    }

    /// Appends a child.
    #[must_use]
    pub fn child(mut self, child: impl Into<VNode>) -> Self {
        self.children.push(child.into());
        self
    }

    /// Appends every child yielded by the iterator.
    #[must_use]
    pub fn children<I>(mut self, children: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<VNode>,
    {
        self.children.extend(children.into_iter().map(Into::into));
        self
    }

    /// Returns the tag name.
    #[must_use]
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Returns the key, if any.
    #[must_use]
    pub fn key_ref(&self) -> Option<&str> {
        self.key.as_deref()
    }

    /// Returns the attribute mapping.
    #[must_use]
    pub const fn attrs(&self) -> &Attributes {
        &self.attrs
    }

    /// Returns the listener mapping.
    #[must_use]
    pub const fn listeners(&self) -> &Listeners {
        &self.listeners
    }

    /// Returns the children exactly as they were declared, fragments included.
    #[must_use]
    pub fn child_nodes(&self) -> &[VNode] {
        &self.children
    }
}

/// An immutable description of a UI subtree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VNode {
    /// An element with attributes, listeners and children.
    Element(VElement),
    /// A text node.
    Text(String),
    /// A comment node.
    Comment(String),
    /// A transparent grouping whose children are spliced into the parent's child list.
    Fragment(Vec<VNode>),
}

impl VNode {
    /// Returns the empty tree, which mounts nothing.
    #[must_use]
    pub const fn empty() -> Self {
        Self::Fragment(Vec::new())
    }

    /// Returns the identity used when deciding whether two matched nodes can be updated
    /// in place. Fragments have no identity of their own and yield `None`.
    #[must_use]
    pub fn identity(&self) -> Option<NodeIdentity> {
        match self {
            Self::Element(element) => Some(NodeIdentity::Element {
                tag: element.tag.clone(),
                key: element.key.clone(),
            }),
            Self::Text(_) => Some(NodeIdentity::Text),
            Self::Comment(_) => Some(NodeIdentity::Comment),
            Self::Fragment(_) => None,
        }
    }

    /// Returns the key of an element node.
    #[must_use]
    pub fn key(&self) -> Option<&str> {
        match self {
            Self::Element(element) => element.key.as_deref(),
            _ => None,
        }
    }

    /// Returns the children of this node with fragments flattened away.
    #[must_use]
    pub fn children(&self) -> Vec<&Self> {
        match self {
            Self::Element(element) => flatten(&element.children),
            Self::Fragment(children) => flatten(children),
            Self::Text(_) | Self::Comment(_) => Vec::new(),
        }
    }

    /// Counts the host nodes this tree mounts.
    #[must_use]
    pub fn host_node_count(&self) -> usize {
        match self {
            Self::Element(element) => {
                1 + element
                    .children
                    .iter()
                    .map(Self::host_node_count)
                    .sum::<usize>()
            }
            Self::Text(_) | Self::Comment(_) => 1,
            Self::Fragment(children) => children.iter().map(Self::host_node_count).sum(),
        }
    }

    /// Returns `true` when `self` and `other` would be matched as the same node by the differ.
    #[must_use]
    pub fn same_identity(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Element(a), Self::Element(b)) => a.tag == b.tag && a.key == b.key,
            (Self::Text(_), Self::Text(_)) | (Self::Comment(_), Self::Comment(_)) => true,
            _ => false,
        }
    }
}

impl From<VElement> for VNode {
    fn from(element: VElement) -> Self {
        Self::Element(element)
    }
}

impl From<&str> for VNode {
    fn from(content: &str) -> Self {
        Self::Text(content.to_string())
    }
}

impl From<String> for VNode {
    fn from(content: String) -> Self {
        Self::Text(content)
    }
}

impl From<Vec<Self>> for VNode {
    fn from(children: Vec<Self>) -> Self {
        Self::Fragment(children)
    }
}

/// Identity of a node as seen by the differ: `(tag, key)` for elements, the node kind otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum NodeIdentity {
    /// An element identified by tag and optional key.
    Element {
        /// Tag name.
        tag: String,
        /// Reconciliation key.
        key: Option<String>,
    },
    /// A text node.
    Text,
    /// A comment node.
    Comment,
}

impl fmt::Display for NodeIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Element { tag, key: Some(key) } => write!(f, "<{tag} key={key:?}>"),
            Self::Element { tag, key: None } => write!(f, "<{tag}>"),
            Self::Text => f.write_str("#text"),
            Self::Comment => f.write_str("#comment"),
        }
    }
}

/// Splices fragments into their parent list, recursively.
#[must_use]
pub fn flatten(nodes: &[VNode]) -> Vec<&VNode> {
    let mut out = Vec::with_capacity(nodes.len());
    flatten_into(nodes, &mut out);
    out
}

fn flatten_into<'a>(nodes: &'a [VNode], out: &mut Vec<&'a VNode>) {
    for node in nodes {
        match node {
            VNode::Fragment(children) => flatten_into(children, out),
            other => out.push(other),
        }
    }
}

/// Starts building an element.
#[must_use]
pub fn element(tag: impl Into<String>) -> VElement {
    VElement::new(tag)
}

/// Creates a text node.
#[must_use]
pub fn text(content: impl Into<String>) -> VNode {
    VNode::Text(content.into())
}

/// Creates a comment node.
#[must_use]
pub fn comment(content: impl Into<String>) -> VNode {
    VNode::Comment(content.into())
}

/// Groups nodes without introducing a host node.
#[must_use]
pub fn fragment<I>(children: I) -> VNode
where
    I: IntoIterator,
    I::Item: Into<VNode>,
{
    VNode::Fragment(children.into_iter().map(Into::into).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    #[test]
    fn fragments_flatten_recursively() {
        let tree = VNode::from(
            element("div")
                .child(text("a"))
                .child(fragment(vec![text("b"), fragment(vec![text("c")])]))
                .child(text("d")),
        );
        let contents: Vec<_> = tree
            .children()
            .into_iter()
            .map(|node| match node {
                VNode::Text(content) => content.as_str(),
                _ => "?",
            })
            .collect();
        assert_eq!(contents, ["a", "b", "c", "d"]);
        assert_eq!(tree.host_node_count(), 5);
    }

    #[test]
    fn identity_ignores_attributes_and_content() {
        let a = VNode::from(element("li").key("x").attr("class", "on"));
        let b = VNode::from(element("li").key("x").attr("class", "off"));
        let c = VNode::from(element("li").key("y"));
        assert!(a.same_identity(&b));
        assert!(!a.same_identity(&c));
        assert!(text("one").same_identity(&text("two")));
        assert!(!text("one").same_identity(&comment("one")));
    }

    #[test]
    fn listeners_compare_by_allocation() {
        let listener = Listener::new(|_| {});
        let same = listener.clone();
        let other = Listener::new(|_| {});
        assert_eq!(listener, same);
        assert_ne!(listener, other);

        let a = VNode::from(element("button").listener("click", listener.clone()));
        let b = VNode::from(element("button").listener("click", listener));
        assert_eq!(a, b);
    }

    #[test]
    fn later_attr_wins() {
        let node = element("input").attr("value", "a").attr("value", "b");
        assert_eq!(node.attrs().get("value").map(String::as_str), Some("b"));
    }
}
