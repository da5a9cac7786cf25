//! Configuration types for image ingestion.
//!
//! All ingestion behaviour is controlled through [`IngestConfig`], built via
//! its [`IngestConfigBuilder`]. The per-image knobs live in [`Parameters`],
//! which is shared read-only by every worker; the remaining fields size the
//! worker pool and plug in strategy implementations.
//!
//! # Design choice: builder over constructor
//! Most callers only touch quality and the resize bound. The builder lets
//! them set just that and rely on documented defaults for the rest, and
//! `build()` is the single place where cross-field constraints are checked.

use crate::error::IngestError;
use crate::pipeline::codec::{CodecSet, StrategyTable};
use crate::pipeline::resize::{compute_dimensions, compute_display_size};
use crate::pipeline::scratch::DEFAULT_SCRATCH_BYTES;
use crate::progress::{IngestProgressCallback, ProgressCallback};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

// ── Per-image parameters ─────────────────────────────────────────────────

/// Encoding the compressor produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TargetFormat {
    /// Keep lossy sources lossy (JPEG) and lossless sources lossless (PNG).
    NoChange,
    /// JPEG at the configured quality. (default)
    #[default]
    Jpeg,
    /// PNG with compression effort derived from the quality.
    Png,
}

/// Declarative resize bound. Pixels are never enlarged.
///
/// `width`/`height` take precedence; `short_side`/`long_side` are only
/// consulted when neither is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResizePolicy {
    pub enabled: bool,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub short_side: Option<u32>,
    pub long_side: Option<u32>,
    /// Shrink by whole halvings instead of scaling to the exact bound.
    pub reduce_by_pow2: bool,
}

impl ResizePolicy {
    /// `true` when enabled and at least one positive bound is set.
    pub fn is_active(&self) -> bool {
        self.enabled
            && [self.width, self.height, self.short_side, self.long_side]
                .iter()
                .any(|b| b.is_some_and(|v| v > 0))
    }

    /// `(width, height, short, long)` bounds with `0` for unset; explicit
    /// width/height suppress the short/long pair.
    fn bounds(&self) -> (u32, u32, u32, u32) {
        let w = self.width.unwrap_or(0);
        let h = self.height.unwrap_or(0);
        if w > 0 || h > 0 {
            (w, h, 0, 0)
        } else {
            (0, 0, self.short_side.unwrap_or(0), self.long_side.unwrap_or(0))
        }
    }

    /// Pixel size to resample an image of `width × height` to.
    ///
    /// Returns the input size when the policy is inactive or would enlarge.
    pub fn target_for(&self, width: u32, height: u32) -> (u32, u32) {
        if !self.is_active() {
            return (width, height);
        }
        let (w, h, s, l) = self.bounds();
        compute_dimensions(width, height, w, h, s, l, self.reduce_by_pow2)
    }

    /// Declared (display) size for an image shown without resampling.
    pub fn display_size_for(&self, width: f32, height: f32) -> (f32, f32) {
        if !self.is_active() {
            return (width, height);
        }
        let (w, h, s, l) = self.bounds();
        compute_display_size(width, height, w, h, s, l, self.reduce_by_pow2)
    }
}

/// How page size is derived from the images placed on it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PageGeometry {
    /// Every page is exactly the size of its image.
    FollowImage,
    /// Fixed page width; the height follows each image's aspect ratio.
    /// `None` takes the width of the first page laid out. (default)
    FixedWidth { width: Option<f32> },
    /// Fixed page size; images are scaled to fit and centred.
    /// `None` takes the size of the first page laid out.
    FixedSize { size: Option<(f32, f32)> },
}

impl Default for PageGeometry {
    fn default() -> Self {
        PageGeometry::FixedWidth { width: None }
    }
}

/// Per-image processing parameters shared by every worker in a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameters {
    /// Re-encode images. When off, directly-embeddable images are passed
    /// through untouched. Default: true.
    pub compress: bool,

    /// Encoding produced by the compressor. Default: JPEG.
    pub target_format: TargetFormat,

    /// Quality 0–100. JPEG uses it directly; PNG maps it onto effort 0–9. Default: 80.
    pub quality: u8,

    /// Resize bound applied while compressing, or to the declared size when
    /// passing through. Default: disabled.
    pub resize: ResizePolicy,

    /// Page size policy. Default: fixed width taken from the first page.
    pub page_geometry: PageGeometry,

    /// Pixels per inch used to turn declared pixels into PDF points. Default: 72
    /// (one pixel per point).
    pub page_dpi: f32,

    /// Classify ZIP/RAR/7-Zip signatures as archives. Archives are reported
    /// as informational results and never decoded here. Default: true.
    pub detect_archives: bool,
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            compress: true,
            target_format: TargetFormat::default(),
            quality: 80,
            resize: ResizePolicy::default(),
            page_geometry: PageGeometry::default(),
            page_dpi: 72.0,
            detect_archives: true,
        }
    }
}

// ── Batch configuration ──────────────────────────────────────────────────

/// Configuration for an ingestion batch.
///
/// Built via [`IngestConfig::builder()`] or using [`IngestConfig::default()`].
///
/// # Example
/// ```rust
/// use picmerge::{IngestConfig, TargetFormat};
///
/// let config = IngestConfig::builder()
///     .quality(70)
///     .target_format(TargetFormat::Png)
///     .workers(4)
///     .build()
///     .unwrap();
/// assert_eq!(config.queue_capacity, 8);
/// ```
#[derive(Clone)]
pub struct IngestConfig {
    pub params: Parameters,

    /// Worker threads decoding in parallel. Default: available parallelism.
    pub workers: usize,

    /// Completed items the ordered queue may hold before workers block.
    /// Default: 2 × `workers`.
    pub queue_capacity: usize,

    /// Cap on each fast-compressor scratch buffer. Default: 64 MiB.
    ///
    /// Output that would exceed it makes the fast strategy fail and the item
    /// falls through to the generic codec.
    pub scratch_buffer_bytes: usize,

    /// Which strategies are tried, in order, for each format.
    pub strategy_table: StrategyTable,

    /// Strategy implementations.
    pub codecs: CodecSet,

    /// Optional per-item progress events.
    pub progress_callback: Option<ProgressCallback>,
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

impl Default for IngestConfig {
    fn default() -> Self {
        let workers = default_workers();
        Self {
            params: Parameters::default(),
            workers,
            queue_capacity: workers * 2,
            scratch_buffer_bytes: DEFAULT_SCRATCH_BYTES,
            strategy_table: StrategyTable::default(),
            codecs: CodecSet::default(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for IngestConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IngestConfig")
            .field("params", &self.params)
            .field("workers", &self.workers)
            .field("queue_capacity", &self.queue_capacity)
            .field("scratch_buffer_bytes", &self.scratch_buffer_bytes)
            .field("strategy_table", &self.strategy_table)
            .field("codecs", &self.codecs)
            .field(
                "progress_callback",
                &self
                    .progress_callback
                    .as_ref()
                    .map(|_| "<dyn IngestProgressCallback>"),
            )
            .finish()
    }
}

impl IngestConfig {
    /// Create a new builder for `IngestConfig`.
    pub fn builder() -> IngestConfigBuilder {
        IngestConfigBuilder {
            config: Self::default(),
            queue_capacity_set: false,
        }
    }
}

/// Builder for [`IngestConfig`].
#[derive(Debug)]
pub struct IngestConfigBuilder {
    config: IngestConfig,
    queue_capacity_set: bool,
}

impl IngestConfigBuilder {
    pub fn params(mut self, params: Parameters) -> Self {
        self.config.params = params;
        self
    }

    pub fn compress(mut self, v: bool) -> Self {
        self.config.params.compress = v;
        self
    }

    pub fn target_format(mut self, format: TargetFormat) -> Self {
        self.config.params.target_format = format;
        self
    }

    pub fn quality(mut self, q: u8) -> Self {
        self.config.params.quality = q.min(100);
        self
    }

    pub fn resize(mut self, policy: ResizePolicy) -> Self {
        self.config.params.resize = policy;
        self
    }

    pub fn page_geometry(mut self, geometry: PageGeometry) -> Self {
        self.config.params.page_geometry = geometry;
        self
    }

    pub fn page_dpi(mut self, dpi: f32) -> Self {
        self.config.params.page_dpi = dpi;
        self
    }

    pub fn detect_archives(mut self, v: bool) -> Self {
        self.config.params.detect_archives = v;
        self
    }

    /// Worker count (min 1). Also resets the default queue capacity to 2 × `n`
    /// unless [`queue_capacity`](Self::queue_capacity) was set explicitly.
    pub fn workers(mut self, n: usize) -> Self {
        self.config.workers = n.max(1);
        if !self.queue_capacity_set {
            self.config.queue_capacity = self.config.workers * 2;
        }
        self
    }

    pub fn queue_capacity(mut self, n: usize) -> Self {
        self.config.queue_capacity = n.max(1);
        self.queue_capacity_set = true;
        self
    }

    pub fn scratch_buffer_bytes(mut self, bytes: usize) -> Self {
        self.config.scratch_buffer_bytes = bytes;
        self
    }

    pub fn strategy_table(mut self, table: StrategyTable) -> Self {
        self.config.strategy_table = table;
        self
    }

    pub fn codecs(mut self, codecs: CodecSet) -> Self {
        self.config.codecs = codecs;
        self
    }

    pub fn progress_callback(mut self, cb: Arc<dyn IngestProgressCallback>) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<IngestConfig, IngestError> {
        let c = &self.config;
        let p = &c.params;
        if !(p.page_dpi.is_finite() && p.page_dpi > 0.0) {
            return Err(IngestError::InvalidConfig(format!(
                "Page DPI must be positive, got {}",
                p.page_dpi
            )));
        }
        if c.scratch_buffer_bytes == 0 {
            return Err(IngestError::InvalidConfig(
                "Scratch buffer size must be > 0".into(),
            ));
        }
        let r = &p.resize;
        let explicit = r.width.is_some() || r.height.is_some();
        let sides = r.short_side.is_some() || r.long_side.is_some();
        if r.enabled && explicit && sides {
            return Err(IngestError::InvalidConfig(
                "Resize by width/height and by short/long side are mutually exclusive".into(),
            ));
        }
        if let (Some(s), Some(l)) = (r.short_side, r.long_side) {
            if s > l {
                return Err(IngestError::InvalidConfig(format!(
                    "Short side ({}) is larger than long side ({})",
                    s, l
                )));
            }
        }
        match p.page_geometry {
            PageGeometry::FixedWidth { width: Some(w) } if !(w > 0.0) => {
                return Err(IngestError::InvalidConfig(format!(
                    "Page width must be positive, got {}",
                    w
                )));
            }
            PageGeometry::FixedSize { size: Some((w, h)) } if !(w > 0.0 && h > 0.0) => {
                return Err(IngestError::InvalidConfig(format!(
                    "Page size must be positive, got {}×{}",
                    w, h
                )));
            }
            _ => {}
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = IngestConfig::default();
        assert!(c.params.compress);
        assert_eq!(c.params.target_format, TargetFormat::Jpeg);
        assert_eq!(c.params.quality, 80);
        assert_eq!(c.params.page_dpi, 72.0);
        assert_eq!(c.params.page_geometry, PageGeometry::FixedWidth { width: None });
        assert!(c.workers >= 1);
        assert_eq!(c.queue_capacity, c.workers * 2);
        assert_eq!(c.scratch_buffer_bytes, 64 * 1024 * 1024);
    }

    #[test]
    fn builder_clamps() {
        let c = IngestConfig::builder()
            .quality(250)
            .workers(0)
            .queue_capacity(0)
            .build()
            .unwrap();
        assert_eq!(c.params.quality, 100);
        assert_eq!(c.workers, 1);
        assert_eq!(c.queue_capacity, 1);
    }

    #[test]
    fn explicit_queue_capacity_survives_worker_change() {
        let c = IngestConfig::builder()
            .queue_capacity(3)
            .workers(8)
            .build()
            .unwrap();
        assert_eq!(c.queue_capacity, 3);

        let c = IngestConfig::builder().workers(3).build().unwrap();
        assert_eq!(c.queue_capacity, 6);
    }

    #[test]
    fn rejects_conflicting_resize_bounds() {
        let err = IngestConfig::builder()
            .resize(ResizePolicy {
                enabled: true,
                width: Some(800),
                long_side: Some(1000),
                ..Default::default()
            })
            .build()
            .unwrap_err();
        assert!(matches!(err, IngestError::InvalidConfig(_)));
    }

    #[test]
    fn rejects_bad_page_geometry() {
        let err = IngestConfig::builder()
            .page_geometry(PageGeometry::FixedSize {
                size: Some((0.0, 100.0)),
            })
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("Page size"));

        assert!(IngestConfig::builder().page_dpi(0.0).build().is_err());
    }

    #[test]
    fn inactive_policy_is_identity() {
        let p = ResizePolicy {
            enabled: false,
            width: Some(10),
            ..Default::default()
        };
        assert!(!p.is_active());
        assert_eq!(p.target_for(640, 480), (640, 480));

        let p = ResizePolicy {
            enabled: true,
            ..Default::default()
        };
        assert!(!p.is_active());
    }

    #[test]
    fn policy_uses_sides_when_no_explicit_size() {
        let p = ResizePolicy {
            enabled: true,
            short_side: Some(300),
            long_side: Some(400),
            ..Default::default()
        };
        assert_eq!(p.target_for(1600, 1200), (400, 300));
        assert_eq!(p.display_size_for(1200.0, 1600.0), (300.0, 400.0));
    }

    #[test]
    fn parameters_serde_roundtrip() {
        let p = Parameters {
            target_format: TargetFormat::NoChange,
            page_geometry: PageGeometry::FixedSize {
                size: Some((595.0, 842.0)),
            },
            ..Default::default()
        };
        let json = serde_json::to_string(&p).unwrap();
        let back: Parameters = serde_json::from_str(&json).unwrap();
        assert_eq!(back, p);
    }

    #[test]
    fn debug_elides_callback() {
        let cb: ProgressCallback = Arc::new(crate::progress::NoopProgressCallback);
        let c = IngestConfig::builder().progress_callback(cb).build().unwrap();
        let dbg = format!("{:?}", c);
        assert!(dbg.contains("<dyn IngestProgressCallback>"));
    }
}
