#![doc = include_str!("../README.md")]
#![allow(clippy::multiple_crate_versions)]

pub mod logging;

#[doc(inline)]
pub use waterdom_core::{
    AttrChange, ClosureRegistry, DuplicateKey, EditOp, EditScript, Event, HostDom, HostError,
    HostResult, Listener, ListenerHandle, MountTable, MountedKind, MountedNode, NodeIdentity,
    NodePath, NodeSpec, PatchFailure, PatchReport, Patcher, ReconcileError, RenderConfig,
    RenderOutcome, RenderReport, Renderer, RendererBuilder, RendererState, VElement, VNode,
    comment, diff, element, fragment, text,
};
pub use waterdom_core::{memory, registry};

/// The browser backend.
#[cfg(feature = "web")]
pub use waterdom_web as web;

pub use tracing as log;

pub mod prelude {
    //! A collection of commonly used types for easy importing.
    //!
    //! ```rust
    //! use waterdom::prelude::*;
    //!
    //! fn greeting(name: &str) -> VNode {
    //!     element("p").attr("class", "greeting").child(text(name)).into()
    //! }
    //! # let _ = greeting("world");
    //! ```
    pub use waterdom_core::{
        Event, HostDom, Listener, RenderOutcome, Renderer, VElement, VNode, comment, element,
        fragment, text,
    };
}
