//! Pipeline stages for image ingestion.
//!
//! Each submodule implements one step. Stages are plain synchronous code;
//! the threading lives in [`crate::ingest`], which wires them together.
//!
//! ## Data Flow
//!
//! ```text
//! source ──▶ sniff ──▶ codec chain ──▶ queue ──▶ layout ──▶ sink
//! (bytes)    (magic)   (fast/pass/     (ordered  (points)
//!                       generic)        release)
//! ```
//!
//! 1. [`source`]  reads an item's bytes from disk or memory
//! 2. [`sniff`]   classifies the bytes by signature, never by extension
//! 3. [`codec`]   tries the configured strategies in order until one
//!    produces a page image; [`resize`] computes target dimensions and
//!    [`scratch`] bounds the fast compressor's output buffers
//! 4. [`queue`]   releases results strictly in input order, with a bounded
//!    number held at any time
//! 5. [`layout`]  turns the image's declared size into page geometry

pub mod codec;
pub mod layout;
pub mod queue;
pub mod resize;
pub mod scratch;
pub mod sniff;
pub mod source;
