//! Progress reporting for batch runs.
//!
//! [`ProgressCallback`] decouples the batch driver from any rendering
//! backend. The CLI renders it with `indicatif`; tests and library callers
//! use [`NullProgress`].

use std::sync::Arc;

/// Trait for reporting progress through a batch of documents.
pub trait ProgressCallback: Send + Sync {
    /// Set the total number of documents.
    fn set_total(&self, total: u64);

    /// Advance progress by `delta` documents.
    fn inc(&self, delta: u64);

    /// Update the message displayed alongside the progress indicator.
    fn set_message(&self, msg: String);

    /// Mark progress as complete with a final message.
    fn finish(&self, msg: String);
}

/// A [`ProgressCallback`] that ignores every update.
pub struct NullProgress;

impl ProgressCallback for NullProgress {
    fn set_total(&self, _total: u64) {}
    fn inc(&self, _delta: u64) {}
    fn set_message(&self, _msg: String) {}
    fn finish(&self, _msg: String) {}
}

/// Returns a shared [`NullProgress`] instance for convenient use.
#[must_use]
pub fn null_progress() -> Arc<dyn ProgressCallback> {
    Arc::new(NullProgress)
}
