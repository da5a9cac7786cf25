//! Progress-callback trait for per-item ingestion events.
//!
//! Inject an [`Arc<dyn IngestProgressCallback>`] via
//! [`crate::config::IngestConfigBuilder::progress_callback`] to receive
//! events as the consumer releases each item.
//!
//! # Why callbacks instead of channels?
//!
//! The callback is the least invasive integration point: a host can forward
//! events to a terminal progress bar, a GUI or a log without the library
//! knowing how it communicates. Events are raised by the sequential
//! consumer, so they arrive in input order, but the trait is still
//! `Send + Sync` because the consumer may run on a blocking-pool thread.
//!
//! # Example
//!
//! ```rust
//! use picmerge::{FileResult, IngestConfig, IngestProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     finished: AtomicUsize,
//! }
//!
//! impl IngestProgressCallback for CountingCallback {
//!     fn on_item_finished(&self, index: usize, total: usize, result: &FileResult) {
//!         let done = self.finished.fetch_add(1, Ordering::SeqCst) + 1;
//!         eprintln!("{}/{} {} (code {:#x}, item {})", done, total, result.filename, result.code, index);
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { finished: AtomicUsize::new(0) });
//!
//! let config = IngestConfig::builder()
//!     .progress_callback(counter as Arc<dyn IngestProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::output::FileResult;
use std::sync::Arc;

/// Called by the ingestion pipeline as it releases each item.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
pub trait IngestProgressCallback: Send + Sync {
    /// Called once before any item is dispatched.
    fn on_batch_start(&self, total: usize) {
        let _ = total;
    }

    /// Called exactly once per input item, in input order, whatever the outcome.
    ///
    /// # Arguments
    /// * `index`:  0-based position in the input list
    /// * `total`:  number of items in the batch
    /// * `result`: the record just appended to the output
    fn on_item_finished(&self, index: usize, total: usize, result: &FileResult) {
        let _ = (index, total, result);
    }

    /// Called once after the last item has been released.
    ///
    /// # Arguments
    /// * `total`:         items in the batch
    /// * `success_count`: items that became pages
    fn on_batch_complete(&self, total: usize, success_count: usize) {
        let _ = (total, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
///
/// This is the default when no callback is configured.
pub struct NoopProgressCallback;

impl IngestProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::IngestConfig`].
pub type ProgressCallback = Arc<dyn IngestProgressCallback>;
