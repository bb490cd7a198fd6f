//! Applying edit scripts to the host.

use alloc::{string::String, vec::Vec};

use crate::{
    error::{HostError, ReconcileError},
    host::HostDom,
    mount::{ListenerBinding, MountError, MountTable, MountedKind, MountedNode},
    node::Listener,
    op::{AttrChange, EditOp, NodePath, NodeSpec},
    registry::{ClosureRegistry, Deregistered, ListenerHandle, Release},
};

/// Counts of applied ops, by kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PatchReport {
    /// Ops applied.
    pub ops: usize,
    /// Nodes created by `CreateNode`.
    pub created: usize,
    /// Subtrees removed by `RemoveNode`.
    pub removed: usize,
    /// Nodes swapped by `ReplaceNode`.
    pub replaced: usize,
    /// Attribute sets and removals.
    pub attributes: usize,
    /// Text and comment updates.
    pub texts: usize,
    /// Sibling moves.
    pub moved: usize,
    /// Listeners registered with the host.
    pub attached: usize,
    /// Listeners deregistered from the host, including those swept with removed subtrees.
    pub detached: usize,
}

impl PatchReport {
    fn record(&mut self, op: &EditOp) {
        self.ops += 1;
        match op {
            EditOp::CreateNode { .. } => self.created += 1,
            EditOp::RemoveNode { .. } => self.removed += 1,
            EditOp::ReplaceNode { .. } => self.replaced += 1,
            EditOp::UpdateAttr { .. } => self.attributes += 1,
            EditOp::UpdateText { .. } => self.texts += 1,
            EditOp::Move { .. } => self.moved += 1,
            EditOp::AttachListener { .. } => self.attached += 1,
            // Counted where the host call happens.
            EditOp::DetachListener { .. } => {}
        }
    }
}

/// A batch that stopped early.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchFailure {
    /// What went wrong.
    pub error: ReconcileError,
    /// Ops applied before the failure.
    pub report: PatchReport,
}

/// Drives the host and keeps the mount table in step with it.
///
/// The patcher is the only owner of the mount table; every op updates the host first
/// and the table right after, so both agree between any two ops.
#[derive(Debug)]
pub struct Patcher<H: HostDom> {
    host: H,
    table: MountTable<H::Handle, H::Token>,
    registry: ClosureRegistry,
    trace_ops: bool,
}

/// Failure of a single op, before it is tagged with its position in the batch.
enum OpError {
    Host(HostError),
    Reference(NodePath, &'static str),
}

impl From<HostError> for OpError {
    fn from(error: HostError) -> Self {
        Self::Host(error)
    }
}

type OpResult<T = ()> = Result<T, OpError>;

fn at(path: &NodePath) -> impl FnOnce(MountError) -> OpError + '_ {
    move |error| OpError::Reference(path.clone(), error.reason())
}

impl<H: HostDom> Patcher<H> {
    /// Creates a patcher mounting into `container`.
    pub const fn new(host: H, container: H::Handle, registry: ClosureRegistry) -> Self {
        Self {
            host,
            table: MountTable::new(container),
            registry,
            trace_ops: false,
        }
    }

    /// Logs every applied op at `trace` level.
    pub const fn set_trace_ops(&mut self, enabled: bool) {
        self.trace_ops = enabled;
    }

    /// The live mount table.
    pub const fn table(&self) -> &MountTable<H::Handle, H::Token> {
        &self.table
    }

    /// The host.
    pub const fn host(&self) -> &H {
        &self.host
    }

    /// Mutable access to the host, for host-specific operations outside a batch.
    pub const fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    /// The registry listeners are acquired from.
    pub const fn registry(&self) -> &ClosureRegistry {
        &self.registry
    }

    /// Applies `ops` in order.
    ///
    /// # Errors
    ///
    /// Stops at the first failing op. The host and the mount table keep every change
    /// made by the ops before it; the failing op itself leaves the table untouched.
    pub fn apply(&mut self, ops: &[EditOp]) -> Result<PatchReport, PatchFailure> {
        let mut report = PatchReport::default();
        for (index, op) in ops.iter().enumerate() {
            if self.trace_ops {
                tracing::trace!(index, %op, "applying edit op");
            }
            let outcome = self.apply_one(op, &mut report);
            if let Err(error) = outcome {
                let error = match error {
                    OpError::Host(source) => ReconcileError::HostOperationFailed {
                        index,
                        op: op.name(),
                        source,
                    },
                    OpError::Reference(path, reason) => ReconcileError::InvalidTreeReference {
                        index,
                        op: op.name(),
                        path,
                        reason,
                    },
                };
                tracing::error!(%error, applied = index, total = ops.len(), "patch batch aborted");
                return Err(PatchFailure { error, report });
            }
            report.record(op);
        }
        Ok(report)
    }

    fn apply_one(&mut self, op: &EditOp, report: &mut PatchReport) -> OpResult {
        match op {
            EditOp::CreateNode {
                parent,
                index,
                spec,
            } => self.create(parent, *index, spec),
            EditOp::RemoveNode { path } => self.remove(path, report),
            EditOp::ReplaceNode { path, spec } => self.replace(path, spec, report),
            EditOp::UpdateAttr { path, name, change } => self.update_attr(path, name, change),
            EditOp::UpdateText { path, content } => self.update_text(path, content),
            EditOp::Move { parent, from, to } => self.move_child(parent, *from, *to),
            EditOp::AttachListener {
                path,
                event,
                listener,
            } => self.attach(path, event, listener),
            EditOp::DetachListener { path, event } => {
                self.detach(path, event)?;
                report.detached += 1;
                Ok(())
            }
        }
    }

    fn build(&mut self, spec: &NodeSpec) -> OpResult<H::Handle> {
        let handle = match spec {
            NodeSpec::Element { tag, attrs, .. } => {
                // A failed attribute drops the element before it is attached anywhere, so
                // neither the host tree nor the table ever sees it.
                let handle = self.host.create_element(tag)?;
                for (name, value) in attrs {
                    self.host.set_attribute(&handle, name, value)?;
                }
                handle
            }
            NodeSpec::Text(content) => self.host.create_text(content)?,
            NodeSpec::Comment(content) => self.host.create_comment(content)?,
        };
        Ok(handle)
    }

    fn create(&mut self, parent: &NodePath, index: usize, spec: &NodeSpec) -> OpResult {
        let parent_handle = self.table.handle_of(parent).cloned().ok_or_else(|| {
            OpError::Reference(parent.clone(), MountError::MissingParent.reason())
        })?;
        let anchor = {
            let siblings = self.table.children(parent).unwrap_or_default();
            if index > siblings.len() {
                return Err(OpError::Reference(
                    parent.child(index),
                    MountError::IndexOutOfBounds.reason(),
                ));
            }
            siblings.get(index).map(|node| node.handle().clone())
        };

        let handle = self.build(spec)?;
        match &anchor {
            Some(anchor) => self.host.insert_before(&parent_handle, &handle, anchor)?,
            None => self.host.append_child(&parent_handle, &handle)?,
        }
        self.table
            .insert(parent, index, MountedNode::new(handle, spec.clone()))
            .map_err(at(parent))
    }

    fn remove(&mut self, path: &NodePath, report: &mut PatchReport) -> OpResult {
        let (parent, _) = path
            .split_last()
            .ok_or_else(|| OpError::Reference(path.clone(), MountError::MissingNode.reason()))?;
        let parent_handle = self
            .table
            .handle_of(&parent)
            .cloned()
            .ok_or_else(|| OpError::Reference(parent.clone(), MountError::MissingParent.reason()))?;
        report.detached += self.sweep_listeners(path)?;
        let handle = self.mounted(path)?.handle().clone();
        self.host.remove_child(&parent_handle, &handle)?;
        self.table.remove(path).map_err(at(path))?;
        Ok(())
    }

    fn replace(&mut self, path: &NodePath, spec: &NodeSpec, report: &mut PatchReport) -> OpResult {
        let (parent, index) = path
            .split_last()
            .ok_or_else(|| OpError::Reference(path.clone(), MountError::MissingNode.reason()))?;
        let parent_handle = self
            .table
            .handle_of(&parent)
            .cloned()
            .ok_or_else(|| OpError::Reference(parent.clone(), MountError::MissingParent.reason()))?;
        report.detached += self.sweep_listeners(path)?;
        let old = self.mounted(path)?.handle().clone();
        let anchor = self
            .table
            .children(&parent)
            .and_then(|siblings| siblings.get(index + 1))
            .map(|node| node.handle().clone());

        // Old node out before the new one goes in: every node in the host stays known to
        // the table whichever step fails.
        let handle = self.build(spec)?;
        self.host.remove_child(&parent_handle, &old)?;
        let inserted = match &anchor {
            Some(anchor) => self.host.insert_before(&parent_handle, &handle, anchor),
            None => self.host.append_child(&parent_handle, &handle),
        };
        if let Err(error) = inserted {
            // The old subtree is already gone from the host.
            let _ = self.table.remove(path);
            return Err(error.into());
        }
        self.table
            .replace(path, MountedNode::new(handle, spec.clone()))
            .map_err(at(path))?;
        Ok(())
    }

    fn update_attr(&mut self, path: &NodePath, name: &str, change: &AttrChange) -> OpResult {
        let node = self.mounted(path)?;
        if !matches!(node.kind(), MountedKind::Element { .. }) {
            return Err(OpError::Reference(
                path.clone(),
                "attributes need an element",
            ));
        }
        let handle = node.handle().clone();
        match change {
            AttrChange::Set(value) => self.host.set_attribute(&handle, name, value)?,
            AttrChange::Remove => self.host.remove_attribute(&handle, name)?,
        }
        if let Some(MountedKind::Element { attrs, .. }) =
            self.table.get_mut(path).map(MountedNode::kind_mut)
        {
            match change {
                AttrChange::Set(value) => {
                    attrs.insert(String::from(name), value.clone());
                }
                AttrChange::Remove => {
                    attrs.remove(name);
                }
            }
        }
        Ok(())
    }

    fn update_text(&mut self, path: &NodePath, content: &str) -> OpResult {
        let node = self.mounted(path)?;
        if matches!(node.kind(), MountedKind::Element { .. }) {
            return Err(OpError::Reference(
                path.clone(),
                "text updates need a text or comment node",
            ));
        }
        let handle = node.handle().clone();
        self.host.set_text(&handle, content)?;
        if let Some(MountedKind::Text(current) | MountedKind::Comment(current)) =
            self.table.get_mut(path).map(MountedNode::kind_mut)
        {
            *current = String::from(content);
        }
        Ok(())
    }

    fn move_child(&mut self, parent: &NodePath, from: usize, to: usize) -> OpResult {
        let parent_handle = self
            .table
            .handle_of(parent)
            .cloned()
            .ok_or_else(|| OpError::Reference(parent.clone(), MountError::MissingParent.reason()))?;
        let siblings = self.table.children(parent).unwrap_or_default();
        if from >= siblings.len() || to >= siblings.len() {
            return Err(OpError::Reference(
                parent.child(from.max(to)),
                MountError::IndexOutOfBounds.reason(),
            ));
        }
        let child = siblings[from].handle().clone();
        // `to` counts after removal, so the node now at `to` sits one further right while
        // the child has not left yet.
        let anchor_index = if to < from { to } else { to + 1 };
        let anchor = siblings.get(anchor_index).map(|node| node.handle().clone());

        match &anchor {
            Some(anchor) => self.host.insert_before(&parent_handle, &child, anchor)?,
            None => self.host.append_child(&parent_handle, &child)?,
        }
        self.table.move_child(parent, from, to).map_err(at(parent))
    }

    fn attach(&mut self, path: &NodePath, event: &str, listener: &Listener) -> OpResult {
        let node = self.mounted(path)?;
        if !matches!(node.kind(), MountedKind::Element { .. }) {
            return Err(OpError::Reference(path.clone(), "listeners need an element"));
        }
        if node.listener(event).is_some() {
            return Err(OpError::Reference(
                path.clone(),
                "a listener is already bound to this event",
            ));
        }
        let node_handle = node.handle().clone();

        let handle = self.registry.acquire(listener);
        let token = match self.host.add_event_listener(&node_handle, event, handle) {
            Ok(token) => token,
            Err(error) => {
                self.registry.abandon(handle);
                return Err(error.into());
            }
        };
        if let Some(node) = self.table.get_mut(path) {
            node.bind(String::from(event), ListenerBinding { handle, token });
        }
        Ok(())
    }

    fn detach(&mut self, path: &NodePath, event: &str) -> OpResult {
        let node = self
            .table
            .get(path)
            .ok_or_else(|| OpError::Reference(path.clone(), MountError::MissingNode.reason()))?;
        let binding = node
            .listener(event)
            .ok_or_else(|| {
                OpError::Reference(path.clone(), "no listener is bound to this event")
            })?;
        self.host.remove_event_listener(node.handle(), &binding.token)?;

        if let Some(binding) = self.table.get_mut(path).and_then(|node| node.unbind(event)) {
            self.release(binding.handle);
        }
        Ok(())
    }

    /// Detaches every listener still bound inside the subtree at `path`.
    fn sweep_listeners(&mut self, path: &NodePath) -> OpResult<usize> {
        let mut bound = Vec::new();
        self.mounted(path)?.bound_listeners(path, &mut bound);
        for (listener_path, event) in &bound {
            self.detach(listener_path, event)?;
        }
        Ok(bound.len())
    }

    fn release(&self, handle: ListenerHandle) {
        if let Release::Retained(refs) = self.registry.release(Deregistered::new(handle)) {
            tracing::trace!(%handle, refs, "listener still shared");
        }
    }

    fn mounted(&self, path: &NodePath) -> OpResult<&MountedNode<H::Handle, H::Token>> {
        self.table
            .get(path)
            .ok_or_else(|| OpError::Reference(path.clone(), MountError::MissingNode.reason()))
    }

    /// Tears down everything mounted, best effort, and empties the table.
    ///
    /// Listeners whose host deregistration fails stay registered (and leak) rather than
    /// being released while the host may still call them.
    pub fn unmount_all(&mut self) -> usize {
        let container = self.table.container().clone();
        let mut leaked = 0;
        for root in self.table.take_roots() {
            leaked += self.teardown(&root);
            if let Err(error) = self.host.remove_child(&container, root.handle()) {
                tracing::warn!(%error, "failed to detach a root during teardown");
            }
        }
        leaked
    }

    fn teardown(&mut self, node: &MountedNode<H::Handle, H::Token>) -> usize {
        let mut leaked = 0;
        for (event, handle) in node.listeners() {
            let Some(binding) = node.listener(event) else {
                continue;
            };
            match self.host.remove_event_listener(node.handle(), &binding.token) {
                Ok(()) => self.release(handle),
                Err(error) => {
                    tracing::warn!(%error, %handle, "listener leaked during teardown");
                    leaked += 1;
                }
            }
        }
        for child in node.children() {
            leaked += self.teardown(child);
        }
        leaked
    }
}
