use waterdom_core::{
    ClosureRegistry, RenderOutcome, RenderReport, Renderer, RendererBuilder, RendererState, VNode,
};

use crate::{dom::DomRoot, error::WebError, host::WebHost};

/// Builder for [`WebApp`].
#[derive(Debug, Default, Clone)]
pub struct WebAppBuilder {
    root_id: Option<String>,
    clear_root: bool,
    verify_after_patch: Option<bool>,
    trace_ops: bool,
}

impl WebAppBuilder {
    /// Creates a new builder with default configuration.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            root_id: None,
            clear_root: true,
            verify_after_patch: None,
            trace_ops: false,
        }
    }

    /// Sets the DOM element identifier that should host the application.
    #[must_use]
    pub fn with_root_id(mut self, id: impl Into<String>) -> Self {
        self.root_id = Some(id.into());
        self
    }

    /// Controls whether existing content of the root element is removed before mounting.
    #[must_use]
    pub const fn clear_root(mut self, clear: bool) -> Self {
        self.clear_root = clear;
        self
    }

    /// Overrides post-patch verification of the mount table (on in debug builds).
    #[must_use]
    pub const fn verify_after_patch(mut self, verify: bool) -> Self {
        self.verify_after_patch = Some(verify);
        self
    }

    /// Logs every applied edit op at `trace` level.
    #[must_use]
    pub const fn trace_ops(mut self, trace: bool) -> Self {
        self.trace_ops = trace;
        self
    }

    /// Finalises the builder and creates a [`WebApp`].
    ///
    /// # Errors
    ///
    /// Returns an error if the DOM root element cannot be found or initialized.
    pub fn build(self) -> Result<WebApp, WebError> {
        WebApp::new_with_options(self)
    }
}

/// Entry point for rendering `waterdom` trees inside the browser.
#[wasm_bindgen]
#[derive(Debug)]
pub struct WebApp {
    root: DomRoot,
    renderer: Renderer<WebHost>,
}

impl WebApp {
    #[allow(clippy::needless_pass_by_value)]
    fn new_with_options(builder: WebAppBuilder) -> Result<Self, WebError> {
        crate::install_panic_hook();
        let root = DomRoot::new(builder.root_id.as_deref())?;
        if builder.clear_root {
            root.clear()?;
        }

        let registry = ClosureRegistry::new();
        let host = WebHost::new(root.document().clone(), registry.clone());
        let mut renderer = RendererBuilder::new()
            .registry(registry)
            .trace_ops(builder.trace_ops);
        if let Some(verify) = builder.verify_after_patch {
            renderer = renderer.verify_after_patch(verify);
        }
        let renderer = renderer.build(host, root.node());

        tracing::debug!(root = ?root.element().id(), "web app mounted");
        Ok(Self { root, renderer })
    }

    /// Starts configuring an app.
    #[must_use]
    pub const fn builder() -> WebAppBuilder {
        WebAppBuilder::new()
    }

    /// Brings the DOM in line with `view`.
    ///
    /// # Errors
    ///
    /// Returns [`WebError::Reconcile`] when the batch fails. The app is then faulted
    /// until [`WebApp::reset`] is called.
    pub fn render(&mut self, view: impl Into<VNode>) -> Result<RenderReport, WebError> {
        match self.renderer.render(view.into()) {
            RenderOutcome::Applied(report) => Ok(report),
            RenderOutcome::Failed { error, applied } => {
                tracing::error!(%error, applied = applied.ops, "render failed");
                Err(error.into())
            }
        }
    }

    /// Returns the mounting point.
    #[must_use]
    pub const fn root(&self) -> &DomRoot {
        &self.root
    }

    /// Provides access to the renderer.
    #[must_use]
    pub const fn renderer(&self) -> &Renderer<WebHost> {
        &self.renderer
    }

    /// Provides mutable access to the renderer for advanced integrations.
    #[must_use]
    pub const fn renderer_mut(&mut self) -> &mut Renderer<WebHost> {
        &mut self.renderer
    }

    /// Current lifecycle state of the renderer.
    #[must_use]
    pub const fn state(&self) -> RendererState {
        self.renderer.state()
    }
}

use wasm_bindgen::prelude::*;

#[wasm_bindgen]
impl WebApp {
    /// Creates a new [`WebApp`] using the default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the DOM root element cannot be found or initialized.
    #[wasm_bindgen(constructor)]
    pub fn new() -> Result<Self, WebError> {
        Self::new_with_options(WebAppBuilder::new())
    }

    /// Removes everything the app rendered.
    ///
    /// # Errors
    ///
    /// Returns an error if the DOM rejects one of the removals.
    #[wasm_bindgen]
    pub fn unmount(&mut self) -> Result<(), WebError> {
        self.renderer.unmount().into_result()?;
        Ok(())
    }

    /// Tears down whatever is mounted so rendering can start over after a failure.
    ///
    /// Returns the number of listeners that could not be removed from the DOM.
    #[wasm_bindgen]
    pub fn reset(&mut self) -> usize {
        self.renderer.reset()
    }
}
