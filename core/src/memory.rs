//! An in-memory [`HostDom`], for headless rendering and tests.
//!
//! Nodes live in an arena and are never freed, so stale handles stay observable.
//! The host records every call it receives, can serialize any subtree to HTML,
//! bubbles dispatched events through a [`ClosureRegistry`], and can be told to fail
//! a specific call to exercise error paths.

use alloc::{
    format,
    string::{String, ToString},
    vec::Vec,
};
use core::fmt::Write;

use crate::{
    error::HostError,
    host::{HostDom, HostResult},
    node::{Attributes, Event},
    registry::{ClosureRegistry, ListenerHandle},
};

/// Handle to a node of a [`MemoryHost`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(usize);

/// Receipt for a listener registered with a [`MemoryHost`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListenerToken(u64);

/// The host calls a [`MemoryHost`] understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostCall {
    /// `create_element`
    CreateElement,
    /// `create_text`
    CreateText,
    /// `create_comment`
    CreateComment,
    /// `set_attribute`
    SetAttribute,
    /// `remove_attribute`
    RemoveAttribute,
    /// `set_text`
    SetText,
    /// `append_child`
    AppendChild,
    /// `insert_before`
    InsertBefore,
    /// `remove_child`
    RemoveChild,
    /// `add_event_listener`
    AddEventListener,
    /// `remove_event_listener`
    RemoveEventListener,
}

impl HostCall {
    /// Name of the host call.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::CreateElement => "create_element",
            Self::CreateText => "create_text",
            Self::CreateComment => "create_comment",
            Self::SetAttribute => "set_attribute",
            Self::RemoveAttribute => "remove_attribute",
            Self::SetText => "set_text",
            Self::AppendChild => "append_child",
            Self::InsertBefore => "insert_before",
            Self::RemoveChild => "remove_child",
            Self::AddEventListener => "add_event_listener",
            Self::RemoveEventListener => "remove_event_listener",
        }
    }

    /// Returns `true` for calls that create a node.
    #[must_use]
    pub const fn creates(self) -> bool {
        matches!(
            self,
            Self::CreateElement | Self::CreateText | Self::CreateComment
        )
    }
}

/// Content of a memory node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemoryData {
    /// An element.
    Element {
        /// Tag name.
        tag: String,
        /// Attributes.
        attrs: Attributes,
    },
    /// A text node.
    Text(String),
    /// A comment node.
    Comment(String),
}

#[derive(Debug)]
struct Registration {
    token: ListenerToken,
    event: String,
    listener: ListenerHandle,
}

#[derive(Debug)]
struct MemoryNode {
    data: MemoryData,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    listeners: Vec<Registration>,
    valid: bool,
}

impl MemoryNode {
    const fn new(data: MemoryData) -> Self {
        Self {
            data,
            parent: None,
            children: Vec::new(),
            listeners: Vec::new(),
            valid: true,
        }
    }
}

#[derive(Debug)]
struct Fault {
    call: HostCall,
    skip: usize,
}

/// Arena-backed DOM.
#[derive(Debug, Default)]
pub struct MemoryHost {
    nodes: Vec<MemoryNode>,
    calls: Vec<HostCall>,
    faults: Vec<Fault>,
    next_token: u64,
}

impl MemoryHost {
    /// Creates an empty host.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a detached `<div>` to mount into. Not recorded as a host call.
    pub fn create_root(&mut self) -> NodeId {
        self.push(MemoryData::Element {
            tag: "div".to_string(),
            attrs: Attributes::new(),
        })
    }

    fn push(&mut self, data: MemoryData) -> NodeId {
        self.nodes.push(MemoryNode::new(data));
        NodeId(self.nodes.len() - 1)
    }

    /// Makes the next-but-`skip` call of kind `call` fail.
    pub fn fail_on(&mut self, call: HostCall, skip: usize) {
        self.faults.push(Fault { call, skip });
    }

    /// Marks `node` as no longer valid; every later call naming it fails.
    pub fn invalidate(&mut self, node: NodeId) {
        if let Some(node) = self.nodes.get_mut(node.0) {
            node.valid = false;
        }
    }

    /// Every call received so far, in order.
    #[must_use]
    pub fn calls(&self) -> &[HostCall] {
        &self.calls
    }

    /// Number of received calls of kind `call`.
    #[must_use]
    pub fn count(&self, call: HostCall) -> usize {
        self.calls.iter().filter(|recorded| **recorded == call).count()
    }

    /// Forgets the recorded calls.
    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    /// Content of `node`.
    #[must_use]
    pub fn data(&self, node: NodeId) -> Option<&MemoryData> {
        self.nodes.get(node.0).map(|node| &node.data)
    }

    /// Parent of `node`, if attached.
    #[must_use]
    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.get(node.0).and_then(|node| node.parent)
    }

    /// Children of `node`.
    #[must_use]
    pub fn children(&self, node: NodeId) -> &[NodeId] {
        self.nodes
            .get(node.0)
            .map(|node| node.children.as_slice())
            .unwrap_or_default()
    }

    /// Value of attribute `name` on `node`.
    #[must_use]
    pub fn attribute(&self, node: NodeId, name: &str) -> Option<&str> {
        match self.data(node)? {
            MemoryData::Element { attrs, .. } => attrs.get(name).map(String::as_str),
            _ => None,
        }
    }

    /// Event names and registry handles of the listeners registered on `node`.
    #[must_use]
    pub fn listeners(&self, node: NodeId) -> Vec<(&str, ListenerHandle)> {
        self.nodes.get(node.0).map_or_else(Vec::new, |node| {
            node.listeners
                .iter()
                .map(|registration| (registration.event.as_str(), registration.listener))
                .collect()
        })
    }

    /// Number of listener registrations across all nodes.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.nodes.iter().map(|node| node.listeners.len()).sum()
    }

    /// Delivers `event` to the listeners on `target` and its ancestors, innermost first.
    ///
    /// Returns the number of callbacks invoked.
    pub fn dispatch(&self, registry: &ClosureRegistry, target: NodeId, event: &Event) -> usize {
        let mut delivered = 0;
        let mut current = Some(target);
        while let Some(id) = current {
            let Some(node) = self.nodes.get(id.0) else {
                break;
            };
            for registration in node.listeners.iter().filter(|r| r.event == event.name()) {
                match registry.dispatch(registration.listener, event) {
                    Ok(()) => delivered += 1,
                    Err(error) => tracing::warn!(%error, "host kept a released listener"),
                }
            }
            current = node.parent;
        }
        delivered
    }

    /// Serializes the children of `node`.
    #[must_use]
    pub fn inner_html(&self, node: NodeId) -> String {
        let mut out = String::new();
        for child in self.children(node) {
            self.write_html(*child, &mut out);
        }
        out
    }

    /// Serializes `node` itself.
    #[must_use]
    pub fn outer_html(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.write_html(node, &mut out);
        out
    }

    fn write_html(&self, id: NodeId, out: &mut String) {
        let Some(node) = self.nodes.get(id.0) else {
            return;
        };
        match &node.data {
            MemoryData::Element { tag, attrs } => {
                out.push('<');
                out.push_str(tag);
                for (name, value) in attrs {
                    let _ = write!(out, " {name}=\"{}\"", escape(value, true));
                }
                out.push('>');
                for child in &node.children {
                    self.write_html(*child, out);
                }
                let _ = write!(out, "</{tag}>");
            }
            MemoryData::Text(content) => out.push_str(&escape(content, false)),
            MemoryData::Comment(content) => {
                let _ = write!(out, "<!--{content}-->");
            }
        }
    }

    fn enter(&mut self, call: HostCall) -> HostResult {
        self.calls.push(call);
        if let Some(position) = self.faults.iter().position(|fault| fault.call == call) {
            let fault = &mut self.faults[position];
            if fault.skip == 0 {
                self.faults.remove(position);
                return Err(HostError::new(call.name(), "injected fault"));
            }
            fault.skip -= 1;
        }
        Ok(())
    }

    fn check(&self, call: HostCall, node: NodeId) -> HostResult<&MemoryNode> {
        match self.nodes.get(node.0) {
            Some(found) if found.valid => Ok(found),
            Some(_) => Err(HostError::new(
                call.name(),
                format!("{node:?} is no longer valid"),
            )),
            None => Err(HostError::new(call.name(), format!("{node:?} does not exist"))),
        }
    }

    fn check_mut(&mut self, call: HostCall, node: NodeId) -> HostResult<&mut MemoryNode> {
        self.check(call, node)?;
        Ok(&mut self.nodes[node.0])
    }

    fn is_ancestor(&self, candidate: NodeId, of: NodeId) -> bool {
        let mut current = Some(of);
        while let Some(id) = current {
            if id == candidate {
                return true;
            }
            current = self.nodes.get(id.0).and_then(|node| node.parent);
        }
        false
    }

    fn detach(&mut self, child: NodeId) {
        if let Some(parent) = self.nodes[child.0].parent.take() {
            self.nodes[parent.0].children.retain(|id| *id != child);
        }
    }

    fn insert(
        &mut self,
        call: HostCall,
        parent: NodeId,
        child: NodeId,
        anchor: Option<NodeId>,
    ) -> HostResult {
        self.check(call, parent)?;
        self.check(call, child)?;
        if self.is_ancestor(child, parent) {
            return Err(HostError::new(call.name(), "insertion would create a cycle"));
        }
        if let Some(anchor) = anchor {
            if self.check(call, anchor)?.parent != Some(parent) {
                return Err(HostError::new(call.name(), "anchor is not a child of parent"));
            }
            if anchor == child {
                return Ok(());
            }
        }
        self.detach(child);
        let siblings = &mut self.nodes[parent.0].children;
        let index = anchor
            .and_then(|anchor| siblings.iter().position(|id| *id == anchor))
            .unwrap_or(siblings.len());
        siblings.insert(index, child);
        self.nodes[child.0].parent = Some(parent);
        Ok(())
    }
}

fn escape(raw: &str, attribute: bool) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            other => out.push(other),
        }
    }
    out
}

impl HostDom for MemoryHost {
    type Handle = NodeId;
    type Token = ListenerToken;

    fn create_element(&mut self, tag: &str) -> HostResult<NodeId> {
        self.enter(HostCall::CreateElement)?;
        if tag.is_empty() {
            return Err(HostError::new(HostCall::CreateElement.name(), "empty tag name"));
        }
        Ok(self.push(MemoryData::Element {
            tag: tag.to_string(),
            attrs: Attributes::new(),
        }))
    }

    fn create_text(&mut self, content: &str) -> HostResult<NodeId> {
        self.enter(HostCall::CreateText)?;
        Ok(self.push(MemoryData::Text(content.to_string())))
    }

    fn create_comment(&mut self, content: &str) -> HostResult<NodeId> {
        self.enter(HostCall::CreateComment)?;
        Ok(self.push(MemoryData::Comment(content.to_string())))
    }

    fn set_attribute(&mut self, node: &NodeId, name: &str, value: &str) -> HostResult {
        self.enter(HostCall::SetAttribute)?;
        match &mut self.check_mut(HostCall::SetAttribute, *node)?.data {
            MemoryData::Element { attrs, .. } => {
                attrs.insert(name.to_string(), value.to_string());
                Ok(())
            }
            _ => Err(HostError::new(HostCall::SetAttribute.name(), "not an element")),
        }
    }

    fn remove_attribute(&mut self, node: &NodeId, name: &str) -> HostResult {
        self.enter(HostCall::RemoveAttribute)?;
        match &mut self.check_mut(HostCall::RemoveAttribute, *node)?.data {
            MemoryData::Element { attrs, .. } => {
                attrs.remove(name);
                Ok(())
            }
            _ => Err(HostError::new(HostCall::RemoveAttribute.name(), "not an element")),
        }
    }

    fn set_text(&mut self, node: &NodeId, content: &str) -> HostResult {
        self.enter(HostCall::SetText)?;
        match &mut self.check_mut(HostCall::SetText, *node)?.data {
            MemoryData::Text(current) | MemoryData::Comment(current) => {
                *current = content.to_string();
                Ok(())
            }
            MemoryData::Element { .. } => {
                Err(HostError::new(HostCall::SetText.name(), "not a character data node"))
            }
        }
    }

    fn append_child(&mut self, parent: &NodeId, child: &NodeId) -> HostResult {
        self.enter(HostCall::AppendChild)?;
        self.insert(HostCall::AppendChild, *parent, *child, None)
    }

    fn insert_before(&mut self, parent: &NodeId, child: &NodeId, anchor: &NodeId) -> HostResult {
        self.enter(HostCall::InsertBefore)?;
        self.insert(HostCall::InsertBefore, *parent, *child, Some(*anchor))
    }

    fn remove_child(&mut self, parent: &NodeId, child: &NodeId) -> HostResult {
        self.enter(HostCall::RemoveChild)?;
        self.check(HostCall::RemoveChild, *parent)?;
        if self.check(HostCall::RemoveChild, *child)?.parent != Some(*parent) {
            return Err(HostError::new(HostCall::RemoveChild.name(), "not a child of parent"));
        }
        self.detach(*child);
        Ok(())
    }

    fn add_event_listener(
        &mut self,
        node: &NodeId,
        event: &str,
        listener: ListenerHandle,
    ) -> HostResult<ListenerToken> {
        self.enter(HostCall::AddEventListener)?;
        let token = ListenerToken(self.next_token);
        self.check_mut(HostCall::AddEventListener, *node)?
            .listeners
            .push(Registration {
                token,
                event: event.to_string(),
                listener,
            });
        self.next_token += 1;
        Ok(token)
    }

    fn remove_event_listener(&mut self, node: &NodeId, token: &ListenerToken) -> HostResult {
        self.enter(HostCall::RemoveEventListener)?;
        let listeners = &mut self.check_mut(HostCall::RemoveEventListener, *node)?.listeners;
        let position = listeners
            .iter()
            .position(|registration| registration.token == *token)
            .ok_or_else(|| {
                HostError::new(HostCall::RemoveEventListener.name(), "unknown listener token")
            })?;
        listeners.remove(position);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_before_moves_existing_children() {
        let mut host = MemoryHost::new();
        let root = host.create_root();
        let a = host.create_text("a").unwrap();
        let b = host.create_text("b").unwrap();
        host.append_child(&root, &a).unwrap();
        host.append_child(&root, &b).unwrap();
        host.insert_before(&root, &b, &a).unwrap();
        assert_eq!(host.inner_html(root), "ba");
        assert_eq!(host.parent(b), Some(root));
    }

    #[test]
    fn serializes_and_escapes() {
        let mut host = MemoryHost::new();
        let root = host.create_root();
        let p = host.create_element("p").unwrap();
        host.set_attribute(&p, "title", "a \"b\"").unwrap();
        let t = host.create_text("1 < 2").unwrap();
        let c = host.create_comment("note").unwrap();
        host.append_child(&root, &p).unwrap();
        host.append_child(&p, &t).unwrap();
        host.append_child(&root, &c).unwrap();
        assert_eq!(
            host.inner_html(root),
            "<p title=\"a &quot;b&quot;\">1 &lt; 2</p><!--note-->"
        );
    }

    #[test]
    fn injected_faults_fire_once() {
        let mut host = MemoryHost::new();
        host.fail_on(HostCall::CreateText, 1);
        assert!(host.create_text("ok").is_ok());
        let error = host.create_text("boom").unwrap_err();
        assert_eq!(error.operation(), "create_text");
        assert!(host.create_text("ok again").is_ok());
        assert_eq!(host.count(HostCall::CreateText), 3);
    }

    #[test]
    fn invalid_handles_are_rejected() {
        let mut host = MemoryHost::new();
        let root = host.create_root();
        let p = host.create_element("p").unwrap();
        host.invalidate(p);
        assert!(host.append_child(&root, &p).is_err());
        assert!(host.set_attribute(&p, "id", "x").is_err());
    }

    #[test]
    fn rejects_cycles_and_foreign_children() {
        let mut host = MemoryHost::new();
        let root = host.create_root();
        let outer = host.create_element("div").unwrap();
        let other = host.create_element("div").unwrap();
        host.append_child(&root, &outer).unwrap();
        assert!(host.append_child(&outer, &root).is_err());
        assert!(host.remove_child(&outer, &other).is_err());
    }
}
