//! The abstract host DOM the patcher drives.
//!
//! Implementations wrap a real DOM (see `waterdom-web`) or an in-memory stand-in
//! ([`MemoryHost`](crate::memory::MemoryHost)). Every call may fail; the core treats a
//! failure as opaque and aborts the current batch.

use core::fmt::Debug;

use crate::{error::HostError, registry::ListenerHandle};

/// Result of a host call.
pub type HostResult<T = ()> = Result<T, HostError>;

/// Operations the engine needs from a DOM implementation.
pub trait HostDom {
    /// Opaque reference to a host node.
    type Handle: Clone + Debug;
    /// Receipt returned by [`HostDom::add_event_listener`], needed to remove the listener again.
    type Token: Debug;

    /// Creates a detached element.
    ///
    /// # Errors
    ///
    /// Returns an error if the host rejects the tag or is unavailable.
    fn create_element(&mut self, tag: &str) -> HostResult<Self::Handle>;

    /// Creates a detached text node.
    ///
    /// # Errors
    ///
    /// Returns an error if the host is unavailable.
    fn create_text(&mut self, content: &str) -> HostResult<Self::Handle>;

    /// Creates a detached comment node.
    ///
    /// # Errors
    ///
    /// Returns an error if the host is unavailable.
    fn create_comment(&mut self, content: &str) -> HostResult<Self::Handle>;

    /// Sets an attribute on an element.
    ///
    /// # Errors
    ///
    /// Returns an error if the handle is not a live element or the name is invalid.
    fn set_attribute(&mut self, node: &Self::Handle, name: &str, value: &str) -> HostResult;

    /// Removes an attribute from an element.
    ///
    /// # Errors
    ///
    /// Returns an error if the handle is not a live element.
    fn remove_attribute(&mut self, node: &Self::Handle, name: &str) -> HostResult;

    /// Replaces the content of a text or comment node.
    ///
    /// # Errors
    ///
    /// Returns an error if the handle is not a live character-data node.
    fn set_text(&mut self, node: &Self::Handle, content: &str) -> HostResult;

    /// Appends `child` to `parent`, detaching it from any previous parent.
    ///
    /// # Errors
    ///
    /// Returns an error if either handle is invalid.
    fn append_child(&mut self, parent: &Self::Handle, child: &Self::Handle) -> HostResult;

    /// Inserts `child` into `parent` right before `anchor`, detaching it from any previous parent.
    ///
    /// # Errors
    ///
    /// Returns an error if a handle is invalid or `anchor` is not a child of `parent`.
    fn insert_before(
        &mut self,
        parent: &Self::Handle,
        child: &Self::Handle,
        anchor: &Self::Handle,
    ) -> HostResult;

    /// Removes `child` from `parent`.
    ///
    /// # Errors
    ///
    /// Returns an error if `child` is not a child of `parent`.
    fn remove_child(&mut self, parent: &Self::Handle, child: &Self::Handle) -> HostResult;

    /// Registers `listener` for `event` on `node`.
    ///
    /// # Errors
    ///
    /// Returns an error if the handle is invalid.
    fn add_event_listener(
        &mut self,
        node: &Self::Handle,
        event: &str,
        listener: ListenerHandle,
    ) -> HostResult<Self::Token>;

    /// Removes a listener registered with [`HostDom::add_event_listener`].
    ///
    /// Once this returns `Ok`, the host must never deliver events for that registration again.
    ///
    /// # Errors
    ///
    /// Returns an error if the handle or token is invalid.
    fn remove_event_listener(&mut self, node: &Self::Handle, token: &Self::Token) -> HostResult;
}
