#![allow(clippy::module_name_repetitions)]

//! Virtual DOM diffing and incremental patching.
//!
//! A view is described as an immutable [`VNode`] tree. Each call to
//! [`Renderer::render`] diffs the new tree against the previously rendered one,
//! turns the difference into an [`EditScript`], and applies that script to a
//! [`HostDom`] through the [`Patcher`]. Keyed siblings are matched by key and
//! reordered with the fewest moves a longest-increasing-subsequence pass allows.
//!
//! Event callbacks never reach the host directly. The patcher registers them in a
//! [`ClosureRegistry`] and hands the host an opaque [`ListenerHandle`]; the registry
//! drops a callback only after the host has confirmed it will not deliver to it again.
//!
//! The crate ships an in-memory host, [`memory::MemoryHost`], for headless use and
//! tests. The browser host lives in `waterdom-web`.
//!
//! ```
//! use waterdom_core::{Renderer, VNode, element, memory::MemoryHost, text};
//!
//! let mut host = MemoryHost::new();
//! let root = host.create_root();
//! let mut renderer = Renderer::new(host, root);
//!
//! let list = |items: &[&str]| -> VNode {
//!     element("ul")
//!         .children(items.iter().map(|item| element("li").key(*item).child(text(*item))))
//!         .into()
//! };
//!
//! renderer.render(list(&["a", "b", "c"])).into_result().unwrap();
//! let report = renderer.render(list(&["c", "a", "b"])).into_result().unwrap();
//! assert_eq!(report.patch.moved, 1);
//! assert_eq!(report.patch.created, 0);
//! assert_eq!(
//!     renderer.host().inner_html(root),
//!     "<ul><li>c</li><li>a</li><li>b</li></ul>"
//! );
//! ```

extern crate alloc;

pub mod diff;
pub mod error;
pub mod host;
pub mod memory;
pub mod mount;
pub mod node;
pub mod op;
pub mod patch;
pub mod registry;
pub mod renderer;


#[doc(inline)]
pub use diff::{EditScript, diff};
#[doc(inline)]
pub use error::{DuplicateKey, HostError, ReconcileError};
#[doc(inline)]
pub use host::{HostDom, HostResult};
#[doc(inline)]
pub use mount::{MountTable, MountedKind, MountedNode};
#[doc(inline)]
pub use node::{
    Event, Listener, NodeIdentity, VElement, VNode, comment, element, fragment, text,
};
#[doc(inline)]
pub use op::{AttrChange, EditOp, NodePath, NodeSpec};
#[doc(inline)]
pub use patch::{PatchFailure, PatchReport, Patcher};
#[doc(inline)]
pub use registry::{ClosureRegistry, ListenerHandle};
#[doc(inline)]
pub use renderer::{
    RenderConfig, RenderOutcome, RenderReport, Renderer, RendererBuilder, RendererState,
};
