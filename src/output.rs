//! Result types produced by an ingestion batch.
//!
//! * [`ImageResult`] is what a worker hands to the ordered queue: either a
//!   decoded page or a failure record. Both travel through the same channel
//!   so a failure still occupies its slot.
//! * [`FileResult`] is the public per-item record `{code, filename,
//!   description}`, emitted in input order.
//! * [`IngestOutput`] bundles the records with batch statistics.

use crate::error::{is_hard_failure, IngestError, ItemError, CODE_SUCCESS};
use crate::pipeline::codec::Strategy;
use crate::pipeline::sniff::FormatTag;
use serde::{Deserialize, Serialize};

/// An image ready to be placed on a page.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedImage {
    /// Encoded image bytes (JPEG, PNG, or the untouched source on pass-through).
    pub bytes: Vec<u8>,
    /// Pixel width of `bytes`.
    pub width: u32,
    /// Pixel height of `bytes`.
    pub height: u32,
    /// Encoding of `bytes`.
    pub format: FormatTag,
    /// Size the page layout should treat the image as, in pixels.
    ///
    /// Equal to the pixel size unless the image was passed through with an
    /// active resize policy.
    pub declared_width: f32,
    pub declared_height: f32,
    /// The strategy that produced this image.
    pub strategy: Strategy,
}

impl DecodedImage {
    /// Image whose declared size equals its pixel size.
    pub fn new(bytes: Vec<u8>, width: u32, height: u32, format: FormatTag, strategy: Strategy) -> Self {
        Self {
            bytes,
            width,
            height,
            format,
            declared_width: width as f32,
            declared_height: height as f32,
            strategy,
        }
    }

    pub fn with_declared_size(mut self, width: f32, height: f32) -> Self {
        self.declared_width = width;
        self.declared_height = height;
        self
    }
}

/// Outcome of processing one item.
#[derive(Debug, Clone, PartialEq)]
pub enum ImageResult {
    Decoded(DecodedImage),
    Failed { source_id: String, error: ItemError },
}

impl ImageResult {
    /// Numeric code: [`CODE_SUCCESS`] or the error's code.
    pub fn code(&self) -> u32 {
        match self {
            ImageResult::Decoded(_) => CODE_SUCCESS,
            ImageResult::Failed { error, .. } => error.code(),
        }
    }

    pub fn is_decoded(&self) -> bool {
        matches!(self, ImageResult::Decoded(_))
    }
}

/// Public per-item result record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileResult {
    /// `0x1` on success; codes `>= 0x8000_0000` are hard failures, anything
    /// else is informational.
    pub code: u32,
    pub filename: String,
    pub description: String,
}

impl FileResult {
    pub fn success(filename: impl Into<String>) -> Self {
        Self {
            code: CODE_SUCCESS,
            filename: filename.into(),
            description: String::new(),
        }
    }

    pub fn from_error(filename: impl Into<String>, error: &ItemError) -> Self {
        Self {
            code: error.code(),
            filename: filename.into(),
            description: error.to_string(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.code == CODE_SUCCESS
    }

    pub fn is_failure(&self) -> bool {
        is_hard_failure(self.code)
    }

    /// Neither success nor hard failure (e.g. an archive that was skipped).
    pub fn is_informational(&self) -> bool {
        !self.is_success() && !self.is_failure()
    }
}

/// Aggregate statistics for a batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestStats {
    pub total: usize,
    pub succeeded: usize,
    /// Hard failures.
    pub failed: usize,
    /// Items skipped with an informational code.
    pub informational: usize,
    pub duration_ms: u64,
    /// Highest number of completed items waiting in the ordered queue.
    pub peak_queue_len: usize,
}

impl IngestStats {
    /// Tally `results`; timing fields are left for the caller.
    pub fn from_results(results: &[FileResult]) -> Self {
        let mut stats = Self {
            total: results.len(),
            ..Default::default()
        };
        for r in results {
            if r.is_success() {
                stats.succeeded += 1;
            } else if r.is_failure() {
                stats.failed += 1;
            } else {
                stats.informational += 1;
            }
        }
        stats
    }
}

/// Everything an ingestion batch produced, in input order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IngestOutput {
    pub results: Vec<FileResult>,
    pub stats: IngestStats,
}

impl IngestOutput {
    /// `true` when any record carries a hard-failure code.
    pub fn has_failures(&self) -> bool {
        self.results.iter().any(FileResult::is_failure)
    }

    /// Records with hard-failure codes.
    pub fn failures(&self) -> impl Iterator<Item = &FileResult> {
        self.results.iter().filter(|r| r.is_failure())
    }

    /// Turn hard failures into [`IngestError::PartialFailure`].
    pub fn into_result(self) -> Result<Self, IngestError> {
        if self.has_failures() {
            return Err(IngestError::PartialFailure {
                succeeded: self.stats.succeeded,
                failed: self.stats.failed,
                total: self.stats.total,
            });
        }
        Ok(self)
    }
}
