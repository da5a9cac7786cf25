//! Per-format codec fallback chain.
//!
//! Each image format has an ordered list of [`Strategy`]s in a
//! [`StrategyTable`]. The chain tries them in turn and returns the first
//! success; a failing strategy only logs and hands over to the next one.
//!
//! ```text
//!              compress                 no compress
//! JPEG/PNG/TIFF  fast ─▶ generic          pass ─▶ generic
//! WEBP           fast ─▶ generic          generic
//! BMP/GIF        generic                  pass ─▶ generic
//! ```
//!
//! Strategy implementations sit behind the [`Codec`] trait and are bundled
//! in a [`CodecSet`], so a caller can swap any of them (tests stub all
//! three to fail).

use crate::config::{Parameters, TargetFormat};
use crate::error::ItemError;
use crate::output::{DecodedImage, ImageResult};
use crate::pipeline::resize::png_effort;
use crate::pipeline::scratch::ScratchPool;
use crate::pipeline::sniff::FormatTag;
use fast_image_resize as fr;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::{DynamicImage, ImageBuffer, Rgb, Rgba};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::io::{Cursor, Write};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

// ── Strategies ───────────────────────────────────────────────────────────

/// One way of turning source bytes into an embeddable image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Strategy {
    /// Decode, resample with SIMD kernels and re-encode into a pooled buffer.
    FastCompress,
    /// Hand the source bytes over untouched.
    PassThrough,
    /// Decode, resample and re-encode with the `image` crate alone.
    Generic,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Strategy::FastCompress => "fast-compress",
            Strategy::PassThrough => "pass-through",
            Strategy::Generic => "generic",
        })
    }
}

/// Ordered strategies per `(format, compress)` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrategyTable {
    entries: HashMap<(FormatTag, bool), Vec<Strategy>>,
}

impl StrategyTable {
    /// Table with no entries: every image fails with `LoadFailed`.
    pub fn empty() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// The default per-format ordering.
    pub fn canonical() -> Self {
        use FormatTag::*;
        use Strategy::*;

        let mut table = Self::empty();
        for tag in [Jpeg, Png, Tiff] {
            table.set(tag, true, [FastCompress, Generic]);
            table.set(tag, false, [PassThrough, Generic]);
        }
        // No PDF writer embeds WEBP directly.
        table.set(Webp, true, [FastCompress, Generic]);
        table.set(Webp, false, [Generic]);
        // The fast compressor does not accept BMP or GIF.
        for tag in [Bmp, Gif] {
            table.set(tag, true, [Generic]);
            table.set(tag, false, [PassThrough, Generic]);
        }
        table
    }

    /// Strategies to try for `format`, in order. Empty when none are configured.
    pub fn strategies(&self, format: FormatTag, compress: bool) -> &[Strategy] {
        self.entries
            .get(&(format, compress))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Replace the strategies for one `(format, compress)` pair.
    pub fn set(
        &mut self,
        format: FormatTag,
        compress: bool,
        strategies: impl Into<Vec<Strategy>>,
    ) -> &mut Self {
        self.entries.insert((format, compress), strategies.into());
        self
    }
}

impl Default for StrategyTable {
    fn default() -> Self {
        Self::canonical()
    }
}

/// Pick the output encoding for a re-encoded image.
pub fn output_format(target: TargetFormat, source: FormatTag) -> FormatTag {
    match target {
        TargetFormat::Png => FormatTag::Png,
        TargetFormat::Jpeg => FormatTag::Jpeg,
        TargetFormat::NoChange => match source {
            FormatTag::Jpeg | FormatTag::Webp => FormatTag::Jpeg,
            _ => FormatTag::Png,
        },
    }
}

// ── Codec trait ──────────────────────────────────────────────────────────

/// Why a single strategy failed. Never leaves the chain.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("{format} is not accepted by this strategy")]
    Unsupported { format: FormatTag },

    #[error(transparent)]
    Image(#[from] image::ImageError),

    #[error("resize failed: {0}")]
    Resize(String),

    #[error("{0}")]
    Other(String),
}

/// Shared state a strategy may use while processing one item.
#[derive(Debug, Clone, Copy)]
pub struct CodecContext<'a> {
    pub params: &'a Parameters,
    pub scratch: &'a ScratchPool,
}

/// A single codec strategy.
///
/// Called concurrently from every worker thread.
pub trait Codec: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Produce an embeddable image from `bytes`, already classified as `format`.
    fn process(
        &self,
        bytes: &[u8],
        format: FormatTag,
        ctx: &CodecContext<'_>,
    ) -> Result<DecodedImage, CodecError>;
}

/// One implementation per [`Strategy`].
#[derive(Clone)]
pub struct CodecSet {
    fast: Arc<dyn Codec>,
    pass_through: Arc<dyn Codec>,
    generic: Arc<dyn Codec>,
}

impl CodecSet {
    pub fn new(fast: Arc<dyn Codec>, pass_through: Arc<dyn Codec>, generic: Arc<dyn Codec>) -> Self {
        Self {
            fast,
            pass_through,
            generic,
        }
    }

    /// Replace the implementation behind one strategy.
    pub fn with(mut self, strategy: Strategy, codec: Arc<dyn Codec>) -> Self {
        match strategy {
            Strategy::FastCompress => self.fast = codec,
            Strategy::PassThrough => self.pass_through = codec,
            Strategy::Generic => self.generic = codec,
        }
        self
    }

    pub fn get(&self, strategy: Strategy) -> &dyn Codec {
        match strategy {
            Strategy::FastCompress => self.fast.as_ref(),
            Strategy::PassThrough => self.pass_through.as_ref(),
            Strategy::Generic => self.generic.as_ref(),
        }
    }
}

impl Default for CodecSet {
    fn default() -> Self {
        Self::new(
            Arc::new(NativeCompressor),
            Arc::new(PassThrough),
            Arc::new(ImageCodec),
        )
    }
}

impl fmt::Debug for CodecSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CodecSet")
            .field("fast", &self.fast.name())
            .field("pass_through", &self.pass_through.name())
            .field("generic", &self.generic.name())
            .finish()
    }
}

// ── Fallback chain ───────────────────────────────────────────────────────

/// Runs the configured strategies for one item until one succeeds.
#[derive(Debug, Clone, Copy)]
pub struct CodecFallbackChain<'a> {
    table: &'a StrategyTable,
    codecs: &'a CodecSet,
    scratch: &'a ScratchPool,
}

impl<'a> CodecFallbackChain<'a> {
    pub fn new(table: &'a StrategyTable, codecs: &'a CodecSet, scratch: &'a ScratchPool) -> Self {
        Self {
            table,
            codecs,
            scratch,
        }
    }

    /// Process one item into an [`ImageResult`]; never fails outright.
    pub fn process(
        &self,
        source_id: &str,
        bytes: &[u8],
        format: FormatTag,
        params: &Parameters,
    ) -> ImageResult {
        match self.run(source_id, bytes, format, params) {
            Ok(image) => ImageResult::Decoded(image),
            Err(error) => ImageResult::Failed {
                source_id: source_id.to_string(),
                error,
            },
        }
    }

    fn run(
        &self,
        source_id: &str,
        bytes: &[u8],
        format: FormatTag,
        params: &Parameters,
    ) -> Result<DecodedImage, ItemError> {
        if format.is_container() {
            return Err(ItemError::ArchiveInput {
                kind: format.to_string(),
            });
        }
        if format == FormatTag::Unknown {
            return Err(ItemError::UnsupportedType);
        }

        let strategies = self.table.strategies(format, params.compress);
        if strategies.is_empty() {
            return Err(ItemError::LoadFailed {
                detail: format!("no strategy configured for {}", format),
            });
        }

        let ctx = CodecContext {
            params,
            scratch: self.scratch,
        };
        let mut reasons = Vec::with_capacity(strategies.len());
        for &strategy in strategies {
            match self.codecs.get(strategy).process(bytes, format, &ctx) {
                Ok(image) => {
                    debug!(
                        "{}: {} via {} → {}×{} {} ({} bytes)",
                        source_id,
                        format,
                        strategy,
                        image.width,
                        image.height,
                        image.format,
                        image.bytes.len()
                    );
                    return Ok(image);
                }
                Err(e) => {
                    warn!("{}: {} strategy failed: {}", source_id, strategy, e);
                    reasons.push(format!("{}: {}", strategy, e));
                }
            }
        }
        Err(ItemError::LoadFailed {
            detail: reasons.join("; "),
        })
    }
}

// ── Encoding helpers ─────────────────────────────────────────────────────

fn png_compression(effort: u8) -> CompressionType {
    match effort {
        0..=3 => CompressionType::Fast,
        4..=6 => CompressionType::Default,
        _ => CompressionType::Best,
    }
}

/// Encode `img` as `format` (JPEG unless PNG) into `out`.
fn encode_into<W: Write>(img: &DynamicImage, format: FormatTag, quality: u8, out: W) -> Result<(), CodecError> {
    match format {
        FormatTag::Png => {
            let encoder = PngEncoder::new_with_quality(
                out,
                png_compression(png_effort(quality)),
                PngFilter::Adaptive,
            );
            if img.color().has_alpha() {
                img.to_rgba8().write_with_encoder(encoder)?;
            } else {
                img.to_rgb8().write_with_encoder(encoder)?;
            }
        }
        _ => {
            // JPEG has no alpha channel.
            let encoder = JpegEncoder::new_with_quality(out, quality.clamp(1, 100));
            img.to_rgb8().write_with_encoder(encoder)?;
        }
    }
    Ok(())
}

fn decode(bytes: &[u8], format: FormatTag) -> Result<DynamicImage, CodecError> {
    let img = match format.image_format() {
        Some(f) => image::load_from_memory_with_format(bytes, f)?,
        None => image::load_from_memory(bytes)?,
    };
    if img.width() == 0 || img.height() == 0 {
        return Err(CodecError::Other("image has no pixels".into()));
    }
    Ok(img)
}

// ── Strategy implementations ─────────────────────────────────────────────

/// Fast compressor: SIMD Lanczos3 resampling and encoding into a pooled
/// scratch buffer capped at the configured size.
///
/// Accepts JPEG, PNG, TIFF and WEBP only.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeCompressor;

impl NativeCompressor {
    /// Lanczos3 resample. Opaque sources stay RGB; others resample as RGBA.
    fn resize(img: &DynamicImage, width: u32, height: u32) -> Result<DynamicImage, CodecError> {
        let has_alpha = img.color().has_alpha();
        let (src_width, src_height) = (img.width(), img.height());
        let (pixels, pixel_type) = if has_alpha {
            (img.to_rgba8().into_raw(), fr::PixelType::U8x4)
        } else {
            (img.to_rgb8().into_raw(), fr::PixelType::U8x3)
        };

        let src_image = fr::images::Image::from_vec_u8(src_width, src_height, pixels, pixel_type)
            .map_err(|e| CodecError::Resize(e.to_string()))?;
        let mut dst_image = fr::images::Image::new(width, height, pixel_type);

        let mut resizer = fr::Resizer::new();
        let options = fr::ResizeOptions::new()
            .resize_alg(fr::ResizeAlg::Convolution(fr::FilterType::Lanczos3));
        resizer
            .resize(&src_image, &mut dst_image, Some(&options))
            .map_err(|e| CodecError::Resize(e.to_string()))?;

        let raw = dst_image.into_vec();
        let resized = if has_alpha {
            ImageBuffer::<Rgba<u8>, Vec<u8>>::from_raw(width, height, raw).map(DynamicImage::ImageRgba8)
        } else {
            ImageBuffer::<Rgb<u8>, Vec<u8>>::from_raw(width, height, raw).map(DynamicImage::ImageRgb8)
        };
        resized.ok_or_else(|| CodecError::Resize("resized buffer has unexpected length".into()))
    }
}

impl Codec for NativeCompressor {
    fn name(&self) -> &str {
        "native-compressor"
    }

    fn process(
        &self,
        bytes: &[u8],
        format: FormatTag,
        ctx: &CodecContext<'_>,
    ) -> Result<DecodedImage, CodecError> {
        if !matches!(
            format,
            FormatTag::Jpeg | FormatTag::Png | FormatTag::Tiff | FormatTag::Webp
        ) {
            return Err(CodecError::Unsupported { format });
        }
        let params = ctx.params;
        let mut img = decode(bytes, format)?;

        let (w, h) = (img.width(), img.height());
        let (tw, th) = params.resize.target_for(w, h);
        if (tw, th) != (w, h) {
            img = Self::resize(&img, tw, th)?;
        }

        let out = output_format(params.target_format, format);
        let mut scratch = ctx.scratch.checkout();
        encode_into(&img, out, params.quality, &mut scratch)?;
        Ok(DecodedImage::new(
            scratch.to_vec(),
            img.width(),
            img.height(),
            out,
            Strategy::FastCompress,
        ))
    }
}

/// Generic codec: decode anything the `image` crate reads, resize with
/// `resize_exact`, re-encode.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageCodec;

impl Codec for ImageCodec {
    fn name(&self) -> &str {
        "image-codec"
    }

    fn process(
        &self,
        bytes: &[u8],
        format: FormatTag,
        ctx: &CodecContext<'_>,
    ) -> Result<DecodedImage, CodecError> {
        let params = ctx.params;
        let mut img = decode(bytes, format)?;

        let (w, h) = (img.width(), img.height());
        let (tw, th) = params.resize.target_for(w, h);
        if (tw, th) != (w, h) {
            img = img.resize_exact(tw, th, image::imageops::FilterType::Lanczos3);
        }

        let out = output_format(params.target_format, format);
        let mut buf = Vec::new();
        encode_into(&img, out, params.quality, &mut buf)?;
        Ok(DecodedImage::new(buf, img.width(), img.height(), out, Strategy::Generic))
    }
}

/// Pass-through: keep the source bytes, read only the header.
///
/// With an active resize policy the declared size is shrunk instead of
/// the pixels. Accepts formats a PDF writer embeds directly: JPEG, PNG,
/// TIFF, BMP and GIF.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassThrough;

impl Codec for PassThrough {
    fn name(&self) -> &str {
        "pass-through"
    }

    fn process(
        &self,
        bytes: &[u8],
        format: FormatTag,
        ctx: &CodecContext<'_>,
    ) -> Result<DecodedImage, CodecError> {
        let fmt = match format {
            FormatTag::Jpeg | FormatTag::Png | FormatTag::Tiff | FormatTag::Bmp | FormatTag::Gif => {
                format.image_format()
            }
            _ => None,
        }
        .ok_or(CodecError::Unsupported { format })?;

        let (w, h) = image::ImageReader::with_format(Cursor::new(bytes), fmt).into_dimensions()?;
        if w == 0 || h == 0 {
            return Err(CodecError::Other("image has no pixels".into()));
        }

        let (dw, dh) = ctx.params.resize.display_size_for(w as f32, h as f32);
        Ok(DecodedImage::new(bytes.to_vec(), w, h, format, Strategy::PassThrough)
            .with_declared_size(dw, dh))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::ResizePolicy;
    use crate::pipeline::scratch::DEFAULT_SCRATCH_BYTES;
    use image::{ImageFormat, RgbImage, RgbaImage};

    /// Encode a small gradient as `format`.
    pub(crate) fn sample_image(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
        let img = RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(x * 7 % 256) as u8, (y * 13 % 256) as u8, ((x + y) % 256) as u8])
        });
        let img = match format {
            // the GIF encoder wants RGBA frames
            ImageFormat::Gif => DynamicImage::ImageRgba8(DynamicImage::ImageRgb8(img).to_rgba8()),
            _ => DynamicImage::ImageRgb8(img),
        };
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), format).unwrap();
        buf
    }

    struct AlwaysFails;

    impl Codec for AlwaysFails {
        fn process(&self, _: &[u8], _: FormatTag, _: &CodecContext<'_>) -> Result<DecodedImage, CodecError> {
            Err(CodecError::Other("stubbed".into()))
        }
    }

    fn failing_set() -> CodecSet {
        let f: Arc<dyn Codec> = Arc::new(AlwaysFails);
        CodecSet::new(f.clone(), f.clone(), f)
    }

    fn run(bytes: &[u8], params: &Parameters) -> ImageResult {
        run_with(bytes, params, &StrategyTable::canonical(), &CodecSet::default())
    }

    fn run_with(bytes: &[u8], params: &Parameters, table: &StrategyTable, codecs: &CodecSet) -> ImageResult {
        let pool = ScratchPool::new(1, DEFAULT_SCRATCH_BYTES);
        let chain = CodecFallbackChain::new(table, codecs, &pool);
        let tag = crate::pipeline::sniff::classify(bytes);
        chain.process("item", bytes, tag, params)
    }

    fn decoded(r: ImageResult) -> DecodedImage {
        match r {
            ImageResult::Decoded(img) => img,
            ImageResult::Failed { error, .. } => panic!("expected success, got {error}"),
        }
    }

    #[test]
    fn canonical_table_matches_format_tiers() {
        let t = StrategyTable::canonical();
        use Strategy::*;
        assert_eq!(t.strategies(FormatTag::Jpeg, true), [FastCompress, Generic]);
        assert_eq!(t.strategies(FormatTag::Tiff, false), [PassThrough, Generic]);
        assert_eq!(t.strategies(FormatTag::Webp, false), [Generic]);
        assert_eq!(t.strategies(FormatTag::Gif, true), [Generic]);
        assert_eq!(t.strategies(FormatTag::Bmp, false), [PassThrough, Generic]);
        assert!(t.strategies(FormatTag::Zip, true).is_empty());
        assert!(t.strategies(FormatTag::Unknown, false).is_empty());
    }

    #[test]
    fn output_format_selection() {
        assert_eq!(output_format(TargetFormat::Png, FormatTag::Jpeg), FormatTag::Png);
        assert_eq!(output_format(TargetFormat::Jpeg, FormatTag::Png), FormatTag::Jpeg);
        assert_eq!(output_format(TargetFormat::NoChange, FormatTag::Webp), FormatTag::Jpeg);
        assert_eq!(output_format(TargetFormat::NoChange, FormatTag::Bmp), FormatTag::Png);
    }

    #[test]
    fn png_compressed_to_jpeg_by_fast_path() {
        let img = decoded(run(&sample_image(64, 48, ImageFormat::Png), &Parameters::default()));
        assert_eq!(img.strategy, Strategy::FastCompress);
        assert_eq!(img.format, FormatTag::Jpeg);
        assert_eq!((img.width, img.height), (64, 48));
        assert_eq!(crate::pipeline::sniff::classify(&img.bytes), FormatTag::Jpeg);
    }

    #[test]
    fn fast_path_resizes() {
        let params = Parameters {
            resize: ResizePolicy {
                enabled: true,
                width: Some(32),
                ..Default::default()
            },
            target_format: TargetFormat::Png,
            ..Default::default()
        };
        let img = decoded(run(&sample_image(64, 48, ImageFormat::Png), &params));
        assert_eq!((img.width, img.height), (32, 24));
        assert_eq!(img.format, FormatTag::Png);
        let back = image::load_from_memory(&img.bytes).unwrap();
        assert_eq!((back.width(), back.height()), (32, 24));
    }

    #[test]
    fn fast_path_resize_keeps_alpha_only_when_present() {
        let params = Parameters {
            resize: ResizePolicy {
                enabled: true,
                width: Some(16),
                ..Default::default()
            },
            target_format: TargetFormat::Png,
            ..Default::default()
        };

        let opaque = decoded(run(&sample_image(64, 48, ImageFormat::Png), &params));
        assert_eq!(opaque.strategy, Strategy::FastCompress);
        let back = image::load_from_memory(&opaque.bytes).unwrap();
        assert_eq!(back.color(), image::ColorType::Rgb8);
        assert_eq!((back.width(), back.height()), (16, 12));

        let translucent = RgbaImage::from_fn(64, 48, |x, _| image::Rgba([200, 40, 40, (x * 4) as u8]));
        let mut bytes = Vec::new();
        DynamicImage::ImageRgba8(translucent)
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        let img = decoded(run(&bytes, &params));
        let back = image::load_from_memory(&img.bytes).unwrap();
        assert_eq!(back.color(), image::ColorType::Rgba8);
    }

    #[test]
    fn gif_skips_fast_path() {
        let img = decoded(run(&sample_image(20, 10, ImageFormat::Gif), &Parameters::default()));
        assert_eq!(img.strategy, Strategy::Generic);
        assert_eq!(img.format, FormatTag::Jpeg);
    }

    #[test]
    fn generic_resizes_bmp_with_pow2() {
        let params = Parameters {
            resize: ResizePolicy {
                enabled: true,
                width: Some(30),
                reduce_by_pow2: true,
                ..Default::default()
            },
            ..Default::default()
        };
        let img = decoded(run(&sample_image(100, 40, ImageFormat::Bmp), &params));
        assert_eq!(img.strategy, Strategy::Generic);
        // 100 → 50 → 25 would undershoot 30
        assert_eq!((img.width, img.height), (50, 20));
    }

    #[test]
    fn pass_through_keeps_bytes_and_rewrites_declared_size() {
        let bytes = sample_image(80, 40, ImageFormat::Png);
        let params = Parameters {
            compress: false,
            resize: ResizePolicy {
                enabled: true,
                width: Some(20),
                ..Default::default()
            },
            ..Default::default()
        };
        let img = decoded(run(&bytes, &params));
        assert_eq!(img.strategy, Strategy::PassThrough);
        assert_eq!(img.bytes, bytes);
        assert_eq!((img.width, img.height), (80, 40));
        assert_eq!((img.declared_width, img.declared_height), (20.0, 10.0));
    }

    #[test]
    fn webp_without_compression_is_reencoded() {
        let bytes = sample_image(16, 16, ImageFormat::WebP);
        let params = Parameters {
            compress: false,
            target_format: TargetFormat::NoChange,
            ..Default::default()
        };
        let img = decoded(run(&bytes, &params));
        assert_eq!(img.strategy, Strategy::Generic);
        assert_eq!(img.format, FormatTag::Jpeg);
    }

    #[test]
    fn pass_through_failure_falls_back_to_generic() {
        let bytes = sample_image(8, 8, ImageFormat::Jpeg);
        let codecs = CodecSet::default().with(Strategy::PassThrough, Arc::new(AlwaysFails));
        let params = Parameters {
            compress: false,
            ..Default::default()
        };
        let img = decoded(run_with(&bytes, &params, &StrategyTable::canonical(), &codecs));
        assert_eq!(img.strategy, Strategy::Generic);
    }

    #[test]
    fn oversized_output_falls_back_from_scratch() {
        let bytes = sample_image(64, 64, ImageFormat::Png);
        let pool = ScratchPool::new(1, 16);
        let table = StrategyTable::canonical();
        let codecs = CodecSet::default();
        let chain = CodecFallbackChain::new(&table, &codecs, &pool);
        let img = decoded(chain.process("big", &bytes, FormatTag::Png, &Parameters::default()));
        assert_eq!(img.strategy, Strategy::Generic);
    }

    #[test]
    fn exhaustion_yields_load_failed() {
        let bytes = sample_image(8, 8, ImageFormat::Png);
        for compress in [true, false] {
            let params = Parameters {
                compress,
                ..Default::default()
            };
            let r = run_with(&bytes, &params, &StrategyTable::canonical(), &failing_set());
            match r {
                ImageResult::Failed { source_id, error } => {
                    assert_eq!(source_id, "item");
                    assert_eq!(error.code(), 0x8001_0003);
                    assert!(error.to_string().contains("stubbed"));
                }
                other => panic!("expected failure, got {other:?}"),
            }
        }
    }

    #[test]
    fn truncated_image_fails_every_strategy() {
        let mut bytes = sample_image(32, 32, ImageFormat::Png);
        bytes.truncate(20);
        let r = run(&bytes, &Parameters::default());
        assert_eq!(r.code(), 0x8001_0003);
    }

    #[test]
    fn containers_and_unknown_bytes() {
        let mut zip = b"PK\x03\x04".to_vec();
        zip.resize(32, 0);
        let r = run(&zip, &Parameters::default());
        assert!(matches!(
            r,
            ImageResult::Failed { error: ItemError::ArchiveInput { ref kind }, .. } if kind == "ZIP"
        ));

        let r = run(b"definitely not an image", &Parameters::default());
        assert!(matches!(r, ImageResult::Failed { error: ItemError::UnsupportedType, .. }));
    }

    #[test]
    fn empty_table_entry_is_load_failure() {
        let mut table = StrategyTable::canonical();
        table.set(FormatTag::Png, true, Vec::new());
        let r = run_with(
            &sample_image(4, 4, ImageFormat::Png),
            &Parameters::default(),
            &table,
            &CodecSet::default(),
        );
        assert_eq!(r.code(), 0x8001_0003);
    }

    #[test]
    fn alpha_survives_png_output() {
        let img = RgbaImage::from_pixel(4, 4, Rgba([1, 2, 3, 128]));
        let mut bytes = Vec::new();
        DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        let params = Parameters {
            target_format: TargetFormat::Png,
            ..Default::default()
        };
        let out = decoded(run(&bytes, &params));
        let back = image::load_from_memory(&out.bytes).unwrap();
        assert!(back.color().has_alpha());
    }
}
