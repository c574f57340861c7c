//! Aggregate result type for batch operations (spec §7).
//!
//! Storage-adapter operations that are inherently batch (`createEntities`,
//! `deleteEntities`, `deleteDocuments`, `reEmbedEverything`,
//! `linkEntitiesToDocument`) continue past per-item errors and report a
//! per-item result plus an aggregate `{succeeded, failed, errors[]}`,
//! rather than failing the whole call. `crate::Error` is not `Clone`/
//! `Serialize` (it carries backend-internal causes that should not reach
//! the tool-call boundary verbatim), so failures are recorded as
//! [`ItemError`] — a target name plus a caller-safe message.

use serde::{Deserialize, Serialize};

/// One failed item within a batch operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemError {
    /// The item that failed (an entity name, document id, etc.).
    pub target: String,
    /// Caller-safe error message (no backend internals, no stack trace).
    pub message: String,
}

impl ItemError {
    /// Builds an item error from a target and any displayable error.
    pub fn new(target: impl Into<String>, error: impl std::fmt::Display) -> Self {
        Self {
            target: target.into(),
            message: error.to_string(),
        }
    }
}

/// Aggregate outcome of a batch operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResult<T> {
    /// Items that completed successfully.
    pub succeeded: Vec<T>,
    /// Items that failed, logged and counted but not fatal to the batch.
    pub errors: Vec<ItemError>,
}

impl<T> Default for BatchResult<T> {
    fn default() -> Self {
        Self {
            succeeded: Vec::new(),
            errors: Vec::new(),
        }
    }
}

impl<T> BatchResult<T> {
    /// Creates an empty result.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a success.
    pub fn push_success(&mut self, item: T) {
        self.succeeded.push(item);
    }

    /// Records a failure.
    pub fn push_error(&mut self, target: impl Into<String>, error: impl std::fmt::Display) {
        self.errors.push(ItemError::new(target, error));
    }

    /// Number of successful items.
    #[must_use]
    pub fn succeeded_count(&self) -> usize {
        self.succeeded.len()
    }

    /// Number of failed items.
    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.errors.len()
    }

    /// Merges another batch result into this one.
    pub fn extend(&mut self, other: Self) {
        self.succeeded.extend(other.succeeded);
        self.errors.extend(other.errors);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_successes_and_failures_independently() {
        let mut result: BatchResult<String> = BatchResult::new();
        result.push_success("a".to_string());
        result.push_error("b", "not found");
        result.push_success("c".to_string());

        assert_eq!(result.succeeded_count(), 2);
        assert_eq!(result.failed_count(), 1);
        assert_eq!(result.errors[0].target, "b");
    }
}
