//! Errors and diagnostics produced while reconciling a tree.

use alloc::string::String;
use core::fmt;

use thiserror::Error;

use crate::op::NodePath;

/// Opaque failure reported by a [`HostDom`](crate::host::HostDom) call.
///
/// The core does not interpret host failures beyond "the operation failed";
/// the message is kept for logs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("host call `{operation}` failed: {message}")]
pub struct HostError {
    operation: &'static str,
    message: String,
}

impl HostError {
    /// Creates a host error for the named host call.
    #[must_use]
    pub fn new(operation: &'static str, message: impl Into<String>) -> Self {
        Self {
            operation,
            message: message.into(),
        }
    }

    /// Name of the failed host call.
    #[must_use]
    pub const fn operation(&self) -> &'static str {
        self.operation
    }

    /// Message supplied by the host.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Fatal errors aborting a patch batch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconcileError {
    /// A host call failed; the remaining ops of the batch were not applied.
    #[error("edit op #{index} ({op}) failed: {source}")]
    HostOperationFailed {
        /// Index of the failing op within the batch.
        index: usize,
        /// Kind of the failing op.
        op: &'static str,
        /// The host failure.
        #[source]
        source: HostError,
    },
    /// An op referenced a position the mount table cannot resolve.
    ///
    /// This is an internal fault of the differ or the patcher, never an expected outcome.
    #[error("edit op #{index} ({op}) references {path}: {reason}")]
    InvalidTreeReference {
        /// Index of the failing op within the batch, or the layout entry for verification.
        index: usize,
        /// Kind of the failing op.
        op: &'static str,
        /// The unresolvable position.
        path: NodePath,
        /// What was wrong with it.
        reason: &'static str,
    },
    /// The renderer is faulted after a failed batch and must be reset first.
    #[error("renderer is faulted after a failed batch; call `reset` before rendering again")]
    NeedsReset,
}

impl ReconcileError {
    /// Returns `true` for errors caused by the host rather than by the engine.
    #[must_use]
    pub const fn is_host_failure(&self) -> bool {
        matches!(self, Self::HostOperationFailed { .. })
    }
}

/// A key repeated among siblings of the next tree.
///
/// The first occurrence keeps its key; the duplicate is matched positionally instead.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DuplicateKey {
    /// Parent of the sibling list.
    pub parent: NodePath,
    /// The repeated key.
    pub key: String,
    /// Index of the sibling that kept the key.
    pub first: usize,
    /// Index of the sibling that was degraded to positional matching.
    pub duplicate: usize,
}

impl fmt::Display for DuplicateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "duplicate key {:?} under {} at index {} (first seen at {})",
            self.key, self.parent, self.duplicate, self.first
        )
    }
}
