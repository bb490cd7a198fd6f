#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! Web/WASM backend for `waterdom`.
//!
//! [`WebHost`] implements [`waterdom_core::HostDom`] over `web-sys` nodes, turning
//! DOM events into [`waterdom_core::Event`]s delivered through the renderer's
//! [`waterdom_core::ClosureRegistry`]. [`WebApp`] bundles a host, a mounting
//! element and a [`waterdom_core::Renderer`] into a browser entry point.
//!
//! ```no_run
//! use std::{cell::{Cell, RefCell}, rc::{Rc, Weak}};
//!
//! use waterdom_core::{VNode, element, text};
//! use waterdom_web::{WebApp, WebError};
//!
//! fn counter(count: Rc<Cell<i32>>, app: Weak<RefCell<WebApp>>) -> VNode {
//!     let label = format!("Click me: {}", count.get());
//!     element("button")
//!         .on("click", move |_| {
//!             count.set(count.get() + 1);
//!             if let Some(app) = app.upgrade() {
//!                 let next = counter(count.clone(), Rc::downgrade(&app));
//!                 let _ = app.borrow_mut().render(next);
//!             }
//!         })
//!         .child(text(label))
//!         .into()
//! }
//!
//! fn start() -> Result<(), WebError> {
//!     let app = Rc::new(RefCell::new(WebApp::builder().with_root_id("app").build()?));
//!     let view = counter(Rc::new(Cell::new(0)), Rc::downgrade(&app));
//!     app.borrow_mut().render(view)?;
//!     Ok(())
//! }
//! ```

mod app;
mod dom;
mod error;
mod host;

pub use app::{WebApp, WebAppBuilder};
pub use dom::DomRoot;
pub use error::WebError;
pub use host::{WebHost, WebListener};

/// Forwards panic messages to the browser console (idempotent).
pub fn install_panic_hook() {
    console_error_panic_hook::set_once();
}
