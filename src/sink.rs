//! Page sinks: where the ordered consumer puts finished pages.
//!
//! The pipeline talks to its output only through [`PdfSink`]. Building the
//! PDF object model is left to an implementation of that trait; the crate
//! ships two sinks that need no PDF library:
//!
//! * [`MemorySink`] keeps pages in memory, for embedding and tests.
//! * [`DirectorySink`] writes each page's encoded image plus a
//!   `layout.json` manifest, which a separate PDF writer can assemble.
//!
//! ## Failure semantics
//!
//! | Call | Result | Pipeline reaction |
//! |------|--------|-------------------|
//! | `begin` | `Err` | batch aborted before dispatch |
//! | `add_page` | `Ok(false)` | item recorded as `SinkRejected`, batch continues |
//! | `add_page` | `Err` | batch aborted, error returned once |
//! | `finish` | `Err` | error returned after all items were released |

use crate::error::IngestError;
use crate::output::DecodedImage;
use crate::pipeline::layout::PageLayout;
use crate::pipeline::sniff::FormatTag;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Ordered page-append target.
///
/// Only ever called from the single consumer thread.
pub trait PdfSink: Send {
    /// Acquire the output. Called once, before any item is dispatched.
    fn begin(&mut self) -> Result<(), IngestError> {
        Ok(())
    }

    /// Append a page, or insert it at `page_index` if that is within the
    /// current page count.
    ///
    /// `Ok(false)` rejects this page only.
    fn add_page(
        &mut self,
        image: &DecodedImage,
        layout: &PageLayout,
        page_index: Option<usize>,
    ) -> Result<bool, IngestError>;

    /// Finalise the output after the last page.
    fn finish(&mut self) -> Result<(), IngestError> {
        Ok(())
    }
}

impl<S: PdfSink + ?Sized> PdfSink for &mut S {
    fn begin(&mut self) -> Result<(), IngestError> {
        (**self).begin()
    }

    fn add_page(
        &mut self,
        image: &DecodedImage,
        layout: &PageLayout,
        page_index: Option<usize>,
    ) -> Result<bool, IngestError> {
        (**self).add_page(image, layout, page_index)
    }

    fn finish(&mut self) -> Result<(), IngestError> {
        (**self).finish()
    }
}

impl<S: PdfSink + ?Sized> PdfSink for Box<S> {
    fn begin(&mut self) -> Result<(), IngestError> {
        (**self).begin()
    }

    fn add_page(
        &mut self,
        image: &DecodedImage,
        layout: &PageLayout,
        page_index: Option<usize>,
    ) -> Result<bool, IngestError> {
        (**self).add_page(image, layout, page_index)
    }

    fn finish(&mut self) -> Result<(), IngestError> {
        (**self).finish()
    }
}

/// Resolve where a page goes: `Some(i)` inserts before page `i`.
fn insertion_point(page_index: Option<usize>, len: usize) -> Option<usize> {
    page_index.filter(|&i| i < len)
}

// ── MemorySink ───────────────────────────────────────────────────────────

/// A page held by [`MemorySink`].
#[derive(Debug, Clone, PartialEq)]
pub struct SinkPage {
    pub image: DecodedImage,
    pub layout: PageLayout,
}

/// Keeps every page in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    pages: Vec<SinkPage>,
    max_pages: Option<usize>,
    begun: bool,
    finished: bool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject pages beyond `max` (they are reported as `SinkRejected`).
    pub fn with_max_pages(max: usize) -> Self {
        Self {
            max_pages: Some(max),
            ..Self::default()
        }
    }

    pub fn pages(&self) -> &[SinkPage] {
        &self.pages
    }

    pub fn into_pages(self) -> Vec<SinkPage> {
        self.pages
    }

    pub fn is_begun(&self) -> bool {
        self.begun
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

impl PdfSink for MemorySink {
    fn begin(&mut self) -> Result<(), IngestError> {
        self.begun = true;
        Ok(())
    }

    fn add_page(
        &mut self,
        image: &DecodedImage,
        layout: &PageLayout,
        page_index: Option<usize>,
    ) -> Result<bool, IngestError> {
        if self.max_pages.is_some_and(|max| self.pages.len() >= max) {
            return Ok(false);
        }
        let page = SinkPage {
            image: image.clone(),
            layout: *layout,
        };
        match insertion_point(page_index, self.pages.len()) {
            Some(i) => self.pages.insert(i, page),
            None => self.pages.push(page),
        }
        Ok(true)
    }

    fn finish(&mut self) -> Result<(), IngestError> {
        self.finished = true;
        Ok(())
    }
}

// ── DirectorySink ────────────────────────────────────────────────────────

/// File name of the manifest written by [`DirectorySink::finish`].
pub const MANIFEST_FILE: &str = "layout.json";

const PENDING_PREFIX: &str = ".pending-";

/// Extensions a finished page file can carry.
const PAGE_EXTENSIONS: [&str; 6] = ["jpg", "png", "bmp", "gif", "tif", "webp"];

/// Whether `name` is a file this sink writes: a numbered page, a pending
/// page or the manifest.
fn is_sink_output(name: &str) -> bool {
    if name == MANIFEST_FILE || name.starts_with(PENDING_PREFIX) {
        return true;
    }
    match name.split_once('.') {
        Some((stem, ext)) => {
            stem.len() >= 4
                && stem.bytes().all(|b| b.is_ascii_digit())
                && PAGE_EXTENSIONS.contains(&ext)
        }
        None => false,
    }
}

/// One page entry in `layout.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub file: String,
    pub format: FormatTag,
    pub width: u32,
    pub height: u32,
    pub layout: PageLayout,
}

#[derive(Debug)]
struct PendingPage {
    path: PathBuf,
    format: FormatTag,
    width: u32,
    height: u32,
    layout: PageLayout,
}

/// Writes pages as numbered image files into a directory.
///
/// Pages are written as they arrive under temporary names and renamed to
/// `0001.jpg`, `0002.png`, … in final page order by [`finish`](PdfSink::finish),
/// so insertions via `page_index` are honoured.
///
/// `begin` removes page files and the manifest left by an earlier run into
/// the same directory. Pending files that never reach `finish` are removed
/// when the sink is dropped or when `finish` fails.
#[derive(Debug)]
pub struct DirectorySink {
    dir: PathBuf,
    pending: Vec<PendingPage>,
    seq: usize,
    written: Vec<PathBuf>,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            pending: Vec::new(),
            seq: 0,
            written: Vec::new(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Final page files, in page order. Empty until `finish` has run.
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }

    /// Delete every page still waiting under its temporary name.
    fn discard_pending(&mut self) {
        for page in self.pending.drain(..) {
            match std::fs::remove_file(&page.path) {
                Ok(()) => debug!("Removed {}", page.path.display()),
                Err(e) => warn!("Cannot remove {}: {}", page.path.display(), e),
            }
        }
    }

    /// Delete output files from an earlier run.
    fn clear_previous_run(&self) -> Result<(), IngestError> {
        let entries = std::fs::read_dir(&self.dir).map_err(|e| IngestError::SinkUnavailable {
            reason: format!("{}: {}", self.dir.display(), e),
        })?;
        let mut removed = 0;
        for entry in entries.flatten() {
            let is_file = entry.file_type().map(|t| t.is_file()).unwrap_or(false);
            let name = entry.file_name();
            if !is_file || !name.to_str().is_some_and(is_sink_output) {
                continue;
            }
            match std::fs::remove_file(entry.path()) {
                Ok(()) => removed += 1,
                Err(e) => warn!("Cannot remove stale {}: {}", entry.path().display(), e),
            }
        }
        if removed > 0 {
            info!("Removed {} files of a previous run from {}", removed, self.dir.display());
        }
        Ok(())
    }
}

impl Drop for DirectorySink {
    fn drop(&mut self) {
        self.discard_pending();
    }
}

impl PdfSink for DirectorySink {
    fn begin(&mut self) -> Result<(), IngestError> {
        std::fs::create_dir_all(&self.dir).map_err(|e| IngestError::SinkUnavailable {
            reason: format!("{}: {}", self.dir.display(), e),
        })?;
        let meta = std::fs::metadata(&self.dir).map_err(|e| IngestError::SinkUnavailable {
            reason: format!("{}: {}", self.dir.display(), e),
        })?;
        if meta.permissions().readonly() {
            return Err(IngestError::SinkUnavailable {
                reason: format!("{}: directory is read-only", self.dir.display()),
            });
        }
        self.discard_pending();
        self.written.clear();
        self.seq = 0;
        self.clear_previous_run()?;
        info!("Writing pages to {}", self.dir.display());
        Ok(())
    }

    fn add_page(
        &mut self,
        image: &DecodedImage,
        layout: &PageLayout,
        page_index: Option<usize>,
    ) -> Result<bool, IngestError> {
        self.seq += 1;
        let path = self
            .dir
            .join(format!("{}{:04}.{}", PENDING_PREFIX, self.seq, image.format.extension()));
        if let Err(e) = std::fs::write(&path, &image.bytes) {
            warn!("Cannot write {}: {}", path.display(), e);
            return Ok(false);
        }
        debug!("Wrote {} ({} bytes)", path.display(), image.bytes.len());

        let page = PendingPage {
            path,
            format: image.format,
            width: image.width,
            height: image.height,
            layout: *layout,
        };
        match insertion_point(page_index, self.pending.len()) {
            Some(i) => self.pending.insert(i, page),
            None => self.pending.push(page),
        }
        Ok(true)
    }

    fn finish(&mut self) -> Result<(), IngestError> {
        let mut manifest = Vec::with_capacity(self.pending.len());
        let mut pages = std::mem::take(&mut self.pending).into_iter().enumerate();
        while let Some((i, page)) = pages.next() {
            let name = format!("{:04}.{}", i + 1, page.format.extension());
            let target = self.dir.join(&name);
            if let Err(e) = std::fs::rename(&page.path, &target) {
                let reason = format!("cannot rename {}: {}", page.path.display(), e);
                self.pending.push(page);
                self.pending.extend(pages.map(|(_, p)| p));
                self.discard_pending();
                return Err(IngestError::SinkFailed { reason });
            }
            manifest.push(ManifestEntry {
                file: name,
                format: page.format,
                width: page.width,
                height: page.height,
                layout: page.layout,
            });
            self.written.push(target);
        }

        let json = serde_json::to_vec_pretty(&manifest)
            .map_err(|e| IngestError::Internal(format!("manifest serialisation failed: {}", e)))?;
        let manifest_path = self.dir.join(MANIFEST_FILE);
        std::fs::write(&manifest_path, json).map_err(|e| IngestError::SinkFailed {
            reason: format!("{}: {}", manifest_path.display(), e),
        })?;
        info!("Wrote {} pages and {}", self.written.len(), manifest_path.display());
        Ok(())
    }
}
