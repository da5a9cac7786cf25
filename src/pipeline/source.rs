//! Input items: where each image's bytes come from.
//!
//! ## Why two byte sources?
//!
//! Loose files are read lazily by the worker that claims them, so only
//! `workers` files are resident at once. Archive entries are staged in
//! memory by whoever expands the archive and are handed over as shared
//! buffers, which makes cloning an [`InputItem`] cheap.

use crate::error::ItemError;
use std::borrow::Cow;
use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Where an item's bytes live.
#[derive(Debug, Clone)]
pub enum ByteSource {
    /// A file read by the worker that processes the item.
    Path(PathBuf),
    /// Bytes already in memory (e.g. an extracted archive entry).
    Memory(Arc<[u8]>),
}

impl ByteSource {
    /// Load the bytes. Memory sources are borrowed, paths are read.
    pub fn read(&self) -> Result<Cow<'_, [u8]>, ItemError> {
        match self {
            ByteSource::Memory(bytes) => Ok(Cow::Borrowed(&bytes[..])),
            ByteSource::Path(path) => {
                let bytes = std::fs::read(path).map_err(|e| {
                    let detail = match e.kind() {
                        std::io::ErrorKind::NotFound => format!("{}: file not found", path.display()),
                        std::io::ErrorKind::PermissionDenied => {
                            format!("{}: permission denied", path.display())
                        }
                        _ => format!("{}: {}", path.display(), e),
                    };
                    ItemError::SourceUnreadable { detail }
                })?;
                debug!("Read {} bytes from {}", bytes.len(), path.display());
                Ok(Cow::Owned(bytes))
            }
        }
    }
}

/// One image to ingest.
///
/// The item's index is its position in the input list handed to the pipeline.
#[derive(Debug, Clone)]
pub struct InputItem {
    /// Name used in [`FileResult`](crate::output::FileResult) records.
    pub name: String,
    pub source: ByteSource,
    /// Insert the page at this 0-based position instead of appending,
    /// if it is within the document's current bounds.
    pub page_index: Option<usize>,
}

impl InputItem {
    /// Item backed by a file; the name is the path as given.
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        Self {
            name: path.display().to_string(),
            source: ByteSource::Path(path.to_path_buf()),
            page_index: None,
        }
    }

    /// Item backed by an in-memory buffer.
    pub fn from_bytes(name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            name: name.into(),
            source: ByteSource::Memory(bytes.into()),
            page_index: None,
        }
    }

    pub fn with_page_index(mut self, index: usize) -> Self {
        self.page_index = Some(index);
        self
    }
}

/// Compare two names the way file managers do: digit runs compare by
/// value (`2.png` < `10.png`), letters compare case-insensitively.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut ai = a.chars().peekable();
    let mut bi = b.chars().peekable();

    loop {
        match (ai.peek().copied(), bi.peek().copied()) {
            (None, None) => return a.cmp(b),
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(ca), Some(cb)) if ca.is_ascii_digit() && cb.is_ascii_digit() => {
                let da = take_digits(&mut ai);
                let db = take_digits(&mut bi);
                let ord = cmp_digit_runs(&da, &db);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            (Some(ca), Some(cb)) => {
                let ord = ca.to_lowercase().cmp(cb.to_lowercase());
                if ord != Ordering::Equal {
                    return ord;
                }
                ai.next();
                bi.next();
            }
        }
    }
}

fn take_digits(it: &mut std::iter::Peekable<std::str::Chars<'_>>) -> String {
    let mut run = String::new();
    while let Some(c) = it.peek().copied().filter(char::is_ascii_digit) {
        run.push(c);
        it.next();
    }
    run
}

fn cmp_digit_runs(a: &str, b: &str) -> Ordering {
    let ta = a.trim_start_matches('0');
    let tb = b.trim_start_matches('0');
    ta.len()
        .cmp(&tb.len())
        .then_with(|| ta.cmp(tb))
        // "01" after "1"
        .then_with(|| a.len().cmp(&b.len()))
}

/// Sort items by [`natural_cmp`] on their names.
pub fn sort_natural(items: &mut [InputItem]) {
    items.sort_by(|a, b| natural_cmp(&a.name, &b.name));
}
