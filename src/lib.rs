//! # picmerge
//!
//! Turn a list of image files into ordered, size-bounded PDF pages.
//!
//! ## Why this crate?
//!
//! Merging hundreds of scans into one PDF is dominated by decoding and
//! re-encoding, which parallelises well, while page order must follow the
//! input exactly. This crate decodes on a pool of worker threads, releases
//! results strictly in input order through a bounded queue, and keeps going
//! when individual files are corrupt: every input gets a result record at
//! its own position.
//!
//! ## Pipeline Overview
//!
//! ```text
//! inputs
//!  │
//!  ├─ 1. Source   read bytes from a path or memory
//!  ├─ 2. Sniff    classify by magic bytes (JPEG, PNG, BMP, GIF, TIFF, WEBP, archives)
//!  ├─ 3. Codec    fast compressor → pass-through → generic codec, per format
//!  ├─ 4. Queue    ordered release, at most `queue_capacity` results held
//!  ├─ 5. Layout   page size in points from the declared image size and DPI
//!  └─ 6. Sink     PdfSink::add_page + one FileResult per input
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use picmerge::{ingest_blocking, IngestConfig, InputItem, MemorySink, ResizePolicy};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let inputs: Vec<InputItem> = ["p1.jpg", "p2.png", "p3.tif"]
//!         .into_iter()
//!         .map(InputItem::from_path)
//!         .collect();
//!
//!     let config = IngestConfig::builder()
//!         .quality(70)
//!         .resize(ResizePolicy {
//!             enabled: true,
//!             long_side: Some(2000),
//!             ..Default::default()
//!         })
//!         .build()?;
//!
//!     let mut sink = MemorySink::new();
//!     let output = ingest_blocking(&inputs, &mut sink, &config)?;
//!     for failure in output.failures() {
//!         eprintln!("{}: {}", failure.filename, failure.description);
//!     }
//!     println!("{} pages", sink.pages().len());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `picmerge` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! picmerge = { version = "0.3", default-features = false }
//! ```
//!
//! ## Result Codes
//!
//! | Code | Meaning |
//! |------|---------|
//! | `0x0000_0001` | page added |
//! | `0x0000_2001` | archive input, skipped (informational) |
//! | `0x8001_0001` | source unreadable |
//! | `0x8001_0002` | unsupported type |
//! | `0x8001_0003` | every decode strategy failed |
//! | `0x8001_0004` | sink rejected the page |
//! | `0x8001_0005` | worker panicked |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod ingest;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod sink;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    IngestConfig, IngestConfigBuilder, PageGeometry, Parameters, ResizePolicy, TargetFormat,
};
pub use error::{IngestError, ItemError};
pub use ingest::{ingest, ingest_blocking};
pub use output::{DecodedImage, FileResult, ImageResult, IngestOutput, IngestStats};
pub use pipeline::codec::{Codec, CodecError, CodecSet, Strategy, StrategyTable};
pub use pipeline::layout::PageLayout;
pub use pipeline::sniff::{classify, FormatTag};
pub use pipeline::source::{ByteSource, InputItem};
pub use progress::{IngestProgressCallback, NoopProgressCallback, ProgressCallback};
pub use sink::{DirectorySink, MemorySink, PdfSink};
pub use stream::{ingest_stream, IngestedItem, PageStream};
