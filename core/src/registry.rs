//! Ownership of event callbacks handed to the host.
//!
//! The host never holds a callback directly. It holds a [`ListenerHandle`] and routes
//! events back through [`ClosureRegistry::dispatch`], which refuses handles that have
//! been released. A handle is released only when its reference count drops to zero,
//! and every decrement requires a [`Deregistered`] proof that the host already forgot
//! the listener, so no host event can reach a released callback.

use alloc::{collections::BTreeMap, rc::Rc};
use core::{cell::RefCell, fmt};

use thiserror::Error;

use crate::node::{Event, Listener};

/// Opaque token identifying one registered callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListenerHandle(u64);

impl ListenerHandle {
    /// Raw identifier, for hosts that need to ship the handle across a boundary.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// Rebuilds a handle from [`ListenerHandle::raw`].
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for ListenerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener#{}", self.0)
    }
}

/// Proof that the host has deregistered a listener.
///
/// Only the patcher mints these, right after a successful
/// [`remove_event_listener`](crate::host::HostDom::remove_event_listener).
#[derive(Debug)]
pub struct Deregistered(ListenerHandle);

impl Deregistered {
    pub(crate) const fn new(handle: ListenerHandle) -> Self {
        Self(handle)
    }

    /// The deregistered handle.
    #[must_use]
    pub const fn handle(&self) -> ListenerHandle {
        self.0
    }
}

/// Result of dropping one reference to a handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Release {
    /// Other attachment sites still reference the callback.
    Retained(usize),
    /// The count reached zero and the callback was dropped.
    Released,
    /// The handle was not live. Indicates a bookkeeping bug in the caller.
    Unknown,
}

/// Failure to deliver an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// The handle has been released (or was never issued).
    #[error("{0} is not live")]
    Released(ListenerHandle),
}

/// Counters describing registry activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistryStats {
    /// Handles currently live.
    pub live: usize,
    /// Handles issued since creation.
    pub issued: u64,
    /// Handles released since creation.
    pub released: u64,
    /// Events delivered to callbacks.
    pub dispatched: u64,
}

#[derive(Debug)]
struct Entry {
    listener: Listener,
    refs: usize,
}

#[derive(Debug, Default)]
struct Inner {
    entries: BTreeMap<ListenerHandle, Entry>,
    by_callback: BTreeMap<usize, ListenerHandle>,
    next: u64,
    released: u64,
    dispatched: u64,
}

impl Inner {
    fn decrement(&mut self, handle: ListenerHandle) -> Release {
        let Some(entry) = self.entries.get_mut(&handle) else {
            return Release::Unknown;
        };
        entry.refs -= 1;
        if entry.refs > 0 {
            return Release::Retained(entry.refs);
        }
        if let Some(entry) = self.entries.remove(&handle) {
            self.by_callback.remove(&entry.listener.addr());
        }
        self.released += 1;
        Release::Released
    }
}

/// Reference-counted store of event callbacks, shared between the patcher and the host.
///
/// Cloning the registry clones a handle to the same store.
#[derive(Debug, Clone, Default)]
pub struct ClosureRegistry {
    inner: Rc<RefCell<Inner>>,
}

impl ClosureRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `listener`, or adds a reference if the same callback is already registered.
    pub fn acquire(&self, listener: &Listener) -> ListenerHandle {
        let mut inner = self.inner.borrow_mut();
        if let Some(&handle) = inner.by_callback.get(&listener.addr()) {
            if let Some(entry) = inner.entries.get_mut(&handle) {
                entry.refs += 1;
                return handle;
            }
        }
        let handle = ListenerHandle(inner.next);
        inner.next += 1;
        inner.entries.insert(
            handle,
            Entry {
                listener: listener.clone(),
                refs: 1,
            },
        );
        inner.by_callback.insert(listener.addr(), handle);
        handle
    }

    /// Drops one reference after the host confirmed deregistration.
    pub fn release(&self, proof: Deregistered) -> Release {
        let release = self.inner.borrow_mut().decrement(proof.0);
        if release == Release::Unknown {
            tracing::error!(handle = %proof.0, "released a listener that is not live");
        }
        release
    }

    /// Drops a reference the host never received, for example after a failed registration.
    pub(crate) fn abandon(&self, handle: ListenerHandle) -> Release {
        self.inner.borrow_mut().decrement(handle)
    }

    /// Delivers `event` to the callback behind `handle`.
    ///
    /// The registry is not borrowed while the callback runs, so callbacks may
    /// acquire or release listeners themselves (for example by rendering).
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Released`] when the handle is not live; the callback
    /// is not invoked in that case.
    pub fn dispatch(&self, handle: ListenerHandle, event: &Event) -> Result<(), DispatchError> {
        let listener = {
            let mut inner = self.inner.borrow_mut();
            let listener = inner
                .entries
                .get(&handle)
                .map(|entry| entry.listener.clone())
                .ok_or(DispatchError::Released(handle))?;
            inner.dispatched += 1;
            listener
        };
        tracing::trace!(%handle, event = event.name(), "dispatching event");
        listener.call(event);
        Ok(())
    }

    /// Current reference count of `handle`; zero once released.
    #[must_use]
    pub fn refcount(&self, handle: ListenerHandle) -> usize {
        self.inner
            .borrow()
            .entries
            .get(&handle)
            .map_or(0, |entry| entry.refs)
    }

    /// Returns `true` when `handle` was issued by this registry and has since been released.
    #[must_use]
    pub fn is_released(&self, handle: ListenerHandle) -> bool {
        let inner = self.inner.borrow();
        handle.0 < inner.next && !inner.entries.contains_key(&handle)
    }

    /// Number of live handles.
    #[must_use]
    pub fn live(&self) -> usize {
        self.inner.borrow().entries.len()
    }

    /// Activity counters.
    #[must_use]
    pub fn stats(&self) -> RegistryStats {
        let inner = self.inner.borrow();
        RegistryStats {
            live: inner.entries.len(),
            issued: inner.next,
            released: inner.released,
            dispatched: inner.dispatched,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::Cell;

    fn counting() -> (Listener, Rc<Cell<usize>>) {
        let calls = Rc::new(Cell::new(0));
        let counter = calls.clone();
        (Listener::new(move |_| counter.set(counter.get() + 1)), calls)
    }

    #[test]
    fn shared_listener_is_released_at_zero() {
        let registry = ClosureRegistry::new();
        let (listener, _) = counting();

        let first = registry.acquire(&listener);
        let second = registry.acquire(&listener.clone());
        assert_eq!(first, second);
        assert_eq!(registry.refcount(first), 2);

        assert_eq!(registry.release(Deregistered::new(first)), Release::Retained(1));
        assert!(!registry.is_released(first));
        assert_eq!(registry.release(Deregistered::new(first)), Release::Released);
        assert!(registry.is_released(first));
        assert_eq!(registry.live(), 0);
    }

    #[test]
    fn distinct_callbacks_get_distinct_handles() {
        let registry = ClosureRegistry::new();
        let (a, _) = counting();
        let (b, _) = counting();
        assert_ne!(registry.acquire(&a), registry.acquire(&b));
        assert_eq!(registry.live(), 2);
    }

    #[test]
    fn dispatch_refuses_released_handles() {
        let registry = ClosureRegistry::new();
        let (listener, calls) = counting();
        let handle = registry.acquire(&listener);

        registry.dispatch(handle, &Event::new("click")).unwrap();
        assert_eq!(calls.get(), 1);

        registry.release(Deregistered::new(handle));
        assert_eq!(
            registry.dispatch(handle, &Event::new("click")),
            Err(DispatchError::Released(handle))
        );
        assert_eq!(calls.get(), 1);
        assert_eq!(registry.stats().dispatched, 1);
    }

    #[test]
    fn double_release_is_reported() {
        let registry = ClosureRegistry::new();
        let (listener, _) = counting();
        let handle = registry.acquire(&listener);
        assert_eq!(registry.release(Deregistered::new(handle)), Release::Released);
        assert_eq!(registry.release(Deregistered::new(handle)), Release::Unknown);
        assert_eq!(registry.stats().released, 1);
    }

    #[test]
    fn callbacks_may_reenter_the_registry() {
        let registry = ClosureRegistry::new();
        let inner = registry.clone();
        let (other, _) = counting();
        let reentrant = Listener::new(move |_| {
            let handle = inner.acquire(&other);
            inner.abandon(handle);
        });
        let handle = registry.acquire(&reentrant);
        registry.dispatch(handle, &Event::new("input")).unwrap();
        assert_eq!(registry.live(), 1);
    }
}
