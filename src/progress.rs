//! Progress-callback trait for per-document batch events.
//!
//! Inject an [`Arc<dyn FilingProgressCallback>`] via
//! [`crate::filing::FilingOrchestrator::with_progress`] to receive real-time
//! events as the batch processes each document.
//!
//! # Why callbacks instead of channels?
//!
//! The callback approach is the least-invasive integration point: callers can
//! forward events to a Tokio broadcast channel, a GUI event loop, or a
//! terminal progress bar without the library knowing anything about how the
//! host application communicates. The trait is `Send + Sync` so it works
//! correctly when documents are processed concurrently.

use std::path::Path;
use std::sync::Arc;

/// Called by the orchestrator as a batch progresses.
///
/// `on_document_start`, `on_document_complete`, and `on_document_error` may
/// be called concurrently from different tasks; implementations must protect
/// shared mutable state (e.g. with `Mutex` or atomics). All methods have
/// default no-op implementations so callers only override what they care
/// about.
pub trait FilingProgressCallback: Send + Sync {
    /// Called once before any document is processed.
    fn on_batch_start(&self, total_documents: usize) {
        let _ = total_documents;
    }

    /// Called when a document's pipeline begins.
    fn on_document_start(&self, index: usize, total: usize, path: &Path) {
        let _ = (index, total, path);
    }

    /// Called when a document's pipeline finishes successfully.
    fn on_document_complete(&self, index: usize, total: usize, path: &Path) {
        let _ = (index, total, path);
    }

    /// Called when a document's pipeline fails.
    ///
    /// `error` is a display-ready reason string; the batch continues.
    fn on_document_error(&self, index: usize, total: usize, path: &Path, error: &str) {
        let _ = (index, total, path, error);
    }

    /// Called once after every document has been attempted.
    fn on_batch_complete(&self, total: usize, success_count: usize) {
        let _ = (total, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl FilingProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored by the orchestrator.
pub type ProgressCallback = Arc<dyn FilingProgressCallback>;
