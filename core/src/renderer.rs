//! The render entry point: diff against the last tree, patch, remember.

use alloc::vec::Vec;

use crate::{
    diff::{EditScript, diff},
    error::{DuplicateKey, ReconcileError},
    host::HostDom,
    mount::MountTable,
    node::VNode,
    patch::{PatchReport, Patcher},
    registry::ClosureRegistry,
};

/// Knobs for a [`Renderer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderConfig {
    /// Check the mount table against the next tree after every successful batch.
    pub verify_after_patch: bool,
    /// Log every applied op at `trace` level.
    pub trace_ops: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            verify_after_patch: cfg!(debug_assertions),
            trace_ops: false,
        }
    }
}

/// Builder for [`Renderer`].
#[derive(Debug, Default, Clone)]
pub struct RendererBuilder {
    config: RenderConfig,
    registry: Option<ClosureRegistry>,
}

impl RendererBuilder {
    /// Creates a builder with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Controls post-patch verification of the mount table.
    #[must_use]
    pub const fn verify_after_patch(mut self, verify: bool) -> Self {
        self.config.verify_after_patch = verify;
        self
    }

    /// Controls per-op trace logging.
    #[must_use]
    pub const fn trace_ops(mut self, trace: bool) -> Self {
        self.config.trace_ops = trace;
        self
    }

    /// Shares an existing registry, typically the one the host routes events into.
    #[must_use]
    pub fn registry(mut self, registry: ClosureRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Builds a renderer mounting into `container`.
    pub fn build<H: HostDom>(self, host: H, container: H::Handle) -> Renderer<H> {
        let mut patcher = Patcher::new(host, container, self.registry.unwrap_or_default());
        patcher.set_trace_ops(self.config.trace_ops);
        Renderer {
            patcher,
            previous: None,
            config: self.config,
            state: RendererState::Idle,
        }
    }
}

/// Lifecycle of a [`Renderer`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum RendererState {
    /// Nothing has been rendered since creation or the last reset.
    #[default]
    Idle,
    /// The last render succeeded; the host shows the stored tree.
    Mounted,
    /// A batch failed half way; the renderer refuses to render until reset.
    Faulted,
}

/// Summary of a successful render.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RenderReport {
    /// What the patcher did.
    pub patch: PatchReport,
    /// Duplicate keys found in the rendered tree.
    pub duplicate_keys: Vec<DuplicateKey>,
}

/// Result of [`Renderer::render`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderOutcome {
    /// The host now shows the requested tree.
    Applied(RenderReport),
    /// The batch was aborted; the host shows a partial update.
    Failed {
        /// Why it stopped.
        error: ReconcileError,
        /// Ops applied before stopping.
        applied: PatchReport,
    },
}

impl RenderOutcome {
    /// Returns `true` for [`RenderOutcome::Applied`].
    #[must_use]
    pub const fn is_applied(&self) -> bool {
        matches!(self, Self::Applied(_))
    }

    /// Converts the outcome into a `Result`.
    ///
    /// # Errors
    ///
    /// Returns the reconcile error of a failed render.
    pub fn into_result(self) -> Result<RenderReport, ReconcileError> {
        match self {
            Self::Applied(report) => Ok(report),
            Self::Failed { error, .. } => Err(error),
        }
    }
}

/// Keeps a host in sync with successive [`VNode`] trees.
///
/// ```
/// use waterdom_core::{Renderer, memory::MemoryHost, node::{element, text}};
///
/// let mut host = MemoryHost::new();
/// let root = host.create_root();
/// let mut renderer = Renderer::new(host, root);
///
/// renderer.render(element("p").child(text("hello")).into()).into_result().unwrap();
/// assert_eq!(renderer.host().inner_html(root), "<p>hello</p>");
/// ```
#[derive(Debug)]
pub struct Renderer<H: HostDom> {
    patcher: Patcher<H>,
    previous: Option<VNode>,
    config: RenderConfig,
    state: RendererState,
}

impl<H: HostDom> Renderer<H> {
    /// Creates a renderer with the default configuration and a fresh registry.
    pub fn new(host: H, container: H::Handle) -> Self {
        RendererBuilder::new().build(host, container)
    }

    /// Brings the host in line with `next`.
    ///
    /// On success `next` becomes the tree the following render is diffed against.
    /// On failure the renderer is [`RendererState::Faulted`] until [`Renderer::reset`].
    pub fn render(&mut self, next: VNode) -> RenderOutcome {
        if self.state == RendererState::Faulted {
            return RenderOutcome::Failed {
                error: ReconcileError::NeedsReset,
                applied: PatchReport::default(),
            };
        }

        let script = diff(self.previous.as_ref(), &next);
        tracing::debug!(
            ops = script.ops.len(),
            nodes = script.layout.len(),
            duplicate_keys = script.duplicate_keys.len(),
            "diffed render"
        );

        match self.apply(&script) {
            Ok(patch) => {
                self.previous = Some(next);
                self.state = RendererState::Mounted;
                RenderOutcome::Applied(RenderReport {
                    patch,
                    duplicate_keys: script.duplicate_keys,
                })
            }
            Err((error, applied)) => {
                self.state = RendererState::Faulted;
                RenderOutcome::Failed { error, applied }
            }
        }
    }

    fn apply(&mut self, script: &EditScript) -> Result<PatchReport, (ReconcileError, PatchReport)> {
        let report = self
            .patcher
            .apply(&script.ops)
            .map_err(|failure| (failure.error, failure.report))?;

        if self.config.verify_after_patch {
            if let Err((index, path, reason)) = self.patcher.table().verify(&script.layout) {
                let error = ReconcileError::InvalidTreeReference {
                    index,
                    op: "verify",
                    path,
                    reason,
                };
                tracing::error!(%error, "mount table diverged from the rendered tree");
                return Err((error, report));
            }
        }
        Ok(report)
    }

    /// Renders the empty tree, removing everything this renderer mounted.
    pub fn unmount(&mut self) -> RenderOutcome {
        self.render(VNode::empty())
    }

    /// Tears down whatever is mounted, best effort, and forgets the previous tree.
    ///
    /// Use after a failed render to start over from an empty mount table.
    /// Returns the number of listeners that could not be deregistered and were leaked.
    pub fn reset(&mut self) -> usize {
        let leaked = self.patcher.unmount_all();
        if leaked > 0 {
            tracing::warn!(leaked, "listeners leaked while resetting the renderer");
        }
        self.previous = None;
        self.state = RendererState::Idle;
        leaked
    }

    /// Current lifecycle state.
    pub const fn state(&self) -> RendererState {
        self.state
    }

    /// The tree the host currently shows, if the last render succeeded.
    pub const fn current(&self) -> Option<&VNode> {
        self.previous.as_ref()
    }

    /// The live mount table.
    pub const fn table(&self) -> &MountTable<H::Handle, H::Token> {
        self.patcher.table()
    }

    /// The registry owning this renderer's listeners.
    pub const fn registry(&self) -> &ClosureRegistry {
        self.patcher.registry()
    }

    /// The host.
    pub const fn host(&self) -> &H {
        self.patcher.host()
    }

    /// Mutable access to the host.
    pub const fn host_mut(&mut self) -> &mut H {
        self.patcher.host_mut()
    }

    /// The active configuration.
    pub const fn config(&self) -> RenderConfig {
        self.config
    }
}
