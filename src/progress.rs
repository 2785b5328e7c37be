//! Progress-callback trait for per-document batch events.
//!
//! Inject an [`Arc<dyn BatchProgressCallback>`] via
//! [`crate::config::BatchConfigBuilder::progress_callback`] to receive events
//! as the batch processes each PDF. The CLI uses it to drive a progress bar;
//! library callers can forward events anywhere.
//!
//! # Example
//!
//! ```rust
//! use edgequake_pdf2csv::{BatchConfig, BatchProgressCallback};
//! use std::path::Path;
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     completed: Arc<AtomicUsize>,
//! }
//!
//! impl BatchProgressCallback for CountingCallback {
//!     fn on_document_complete(&self, path: &Path, index: usize, total: usize) {
//!         self.completed.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{}/{} {}", index, total, path.display());
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback {
//!     completed: Arc::new(AtomicUsize::new(0)),
//! });
//!
//! let config = BatchConfig::builder()
//!     .progress_callback(counter as Arc<dyn BatchProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::path::Path;
use std::sync::Arc;

/// Called by the batch driver as it processes each document.
///
/// All methods have no-op defaults so callers only override what they need.
/// `index` is 1-based.
pub trait BatchProgressCallback: Send + Sync {
    /// Called once after discovery, before the first document.
    fn on_batch_start(&self, total_documents: usize) {
        let _ = total_documents;
    }

    /// Called before a document is opened.
    fn on_document_start(&self, path: &Path, index: usize, total: usize) {
        let _ = (path, index, total);
    }

    /// Called when a document contributed a record.
    fn on_document_complete(&self, path: &Path, index: usize, total: usize) {
        let _ = (path, index, total);
    }

    /// Called when a document was skipped or failed.
    fn on_document_error(&self, path: &Path, index: usize, total: usize, error: &str) {
        let _ = (path, index, total, error);
    }

    /// Called once after every document has been attempted.
    fn on_batch_complete(&self, total_documents: usize, success_count: usize) {
        let _ = (total_documents, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl BatchProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::BatchConfig`].
pub type ProgressCallback = Arc<dyn BatchProgressCallback>;
