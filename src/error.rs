//! Error types for the picmerge library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`IngestError`] is **fatal**: the batch cannot proceed at all (the output
//!   sink cannot be opened, the configuration is invalid). Returned as
//!   `Err(IngestError)` from the top-level `ingest*` functions.
//!
//! * [`ItemError`] is **non-fatal**: a single input failed (corrupt bytes,
//!   unsupported type, sink refused the page) but every other item is fine.
//!   Carried inside [`crate::output::ImageResult::Failed`] through the same
//!   ordered channel as successes and reported as a
//!   [`crate::output::FileResult`] at the item's original position.
//!
//! Every [`ItemError`] maps to a stable numeric code. Codes with the high bit
//! set (`>= 0x8000_0000`) are hard failures the caller should warn about;
//! lower codes are informational.

use thiserror::Error;

/// Code recorded for an item that became a page.
pub const CODE_SUCCESS: u32 = 0x0000_0001;

/// Codes at or above this value denote hard failures.
pub const HARD_FAILURE_BIT: u32 = 0x8000_0000;

/// All fatal errors returned by the picmerge library.
///
/// Per-item failures use [`ItemError`] and are stored in the result list
/// rather than propagated here.
#[derive(Debug, Error)]
pub enum IngestError {
    // ── Sink errors ───────────────────────────────────────────────────────
    /// The output sink could not be acquired; nothing was dispatched.
    #[error("Cannot open output: {reason}\nCheck the destination exists and is writable.")]
    SinkUnavailable { reason: String },

    /// The sink reported a fatal condition while pages were being added.
    #[error("Output failed mid-batch: {reason}")]
    SinkFailed { reason: String },

    // ── Outcome errors ────────────────────────────────────────────────────
    /// Some items succeeded but at least one hard failure occurred.
    ///
    /// Returned by [`crate::output::IngestOutput::into_result`] when the
    /// caller wants to treat any hard per-item failure as an error.
    #[error("{failed}/{total} items failed during ingestion")]
    PartialFailure {
        succeeded: usize,
        failed: usize,
        total: usize,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error (e.g. a blocking task could not be joined).
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single input item.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum ItemError {
    /// The item is an archive container; archives must be expanded upstream.
    #[error("Archive conversion is not enabled ({kind} container skipped)")]
    ArchiveInput { kind: String },

    /// The byte source could not be read.
    #[error("Cannot read source: {detail}")]
    SourceUnreadable { detail: String },

    /// The byte signature matches no supported image type.
    #[error("Unsupported type")]
    UnsupportedType,

    /// Every codec strategy for this format failed.
    #[error("Failed to load image because: {detail}")]
    LoadFailed { detail: String },

    /// The sink refused the page.
    #[error("Unable to add into output")]
    SinkRejected,

    /// The worker processing the item panicked.
    #[error("Worker panicked while processing item: {detail}")]
    WorkerPanicked { detail: String },
}

impl ItemError {
    /// Stable numeric code reported in [`crate::output::FileResult::code`].
    pub fn code(&self) -> u32 {
        match self {
            ItemError::ArchiveInput { .. } => 0x0000_2001,
            ItemError::SourceUnreadable { .. } => 0x8001_0001,
            ItemError::UnsupportedType => 0x8001_0002,
            ItemError::LoadFailed { .. } => 0x8001_0003,
            ItemError::SinkRejected => 0x8001_0004,
            ItemError::WorkerPanicked { .. } => 0x8001_0005,
        }
    }

    /// `true` when the code has the hard-failure bit set.
    pub fn is_hard(&self) -> bool {
        is_hard_failure(self.code())
    }
}

/// `true` when `code` denotes a hard failure.
pub fn is_hard_failure(code: u32) -> bool {
    code >= HARD_FAILURE_BIT
}
