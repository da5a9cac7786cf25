//! CLI binary for picmerge.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `IngestConfig`, writes pages through `DirectorySink` and prints results.

use anyhow::{bail, Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use picmerge::pipeline::source::sort_natural;
use picmerge::{
    ingest, DirectorySink, FileResult, IngestConfig, IngestProgressCallback, InputItem,
    PageGeometry, ProgressCallback, ResizePolicy, TargetFormat,
};
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a live bar plus one log line per file.
/// Items are released in input order, so the log reads top to bottom.
struct CliProgressCallback {
    bar: ProgressBar,
    hard_failures: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>4}/{len} files  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Ingesting");

        Arc::new(Self {
            bar,
            hard_failures: AtomicUsize::new(0),
        })
    }
}

impl IngestProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total: usize) {
        self.bar.set_length(total as u64);
        self.bar.enable_steady_tick(Duration::from_millis(80));
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Ingesting {total} files…"))
        ));
    }

    fn on_item_finished(&self, index: usize, total: usize, result: &FileResult) {
        let line = if result.is_success() {
            format!("  {} {:>4}/{:<4} {}", green("✓"), index + 1, total, result.filename)
        } else if result.is_failure() {
            self.hard_failures.fetch_add(1, Ordering::SeqCst);
            // Truncate very long error messages to keep output tidy.
            let msg = if result.description.chars().count() > 80 {
                let cut: String = result.description.chars().take(79).collect();
                format!("{cut}\u{2026}")
            } else {
                result.description.clone()
            };
            format!(
                "  {} {:>4}/{:<4} {}  {}",
                red("✗"),
                index + 1,
                total,
                result.filename,
                red(&msg)
            )
        } else {
            format!(
                "  {} {:>4}/{:<4} {}  {}",
                yellow("·"),
                index + 1,
                total,
                result.filename,
                dim(&result.description)
            )
        };
        self.bar.println(line);
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, total: usize, success_count: usize) {
        self.bar.finish_and_clear();
        let failed = self.hard_failures.load(Ordering::SeqCst);
        if failed == 0 {
            eprintln!(
                "{} {}/{} files added as pages",
                green("✔"),
                bold(&success_count.to_string()),
                total
            );
        } else {
            eprintln!(
                "{} {}/{} files added as pages  ({} failed)",
                if success_count == 0 { red("✘") } else { cyan("⚠") },
                bold(&success_count.to_string()),
                total,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Merge scans in the given order into ./pages
  picmerge scan-*.jpg -o pages

  # Natural file-name order (2.png before 10.png)
  picmerge --sort *.png -o pages

  # Re-encode as PNG, long side at most 2000 px
  picmerge --format png --long-side 2000 photos/*.jpg -o pages

  # Keep sources untouched, every page as wide as the first image
  picmerge --no-compress --page width *.tif -o pages

  # A4 pages at 300 DPI, results as JSON
  picmerge --page fixed --page-width 595 --page-height 842 --dpi 300 --json *.jpg -o pages

OUTPUT:
  DIR/0001.jpg, DIR/0002.png, …   one encoded image per page, in page order
  DIR/layout.json                 page and image rectangles in PDF points

RESULT CODES (--json):
  0x00000001  page added
  0x00002001  archive input, skipped
  0x80010001  source unreadable
  0x80010002  unsupported type
  0x80010003  every decode strategy failed
  0x80010004  sink rejected the page
  0x80010005  worker panicked

ENVIRONMENT VARIABLES:
  RUST_LOG            Override the log filter (e.g. picmerge=debug)
  PICMERGE_*          Every long flag can also be set as PICMERGE_<FLAG>
"#;

#[derive(Parser, Debug)]
#[command(
    name = "picmerge",
    version,
    about = "Ingest image files into ordered, size-bounded PDF pages",
    long_about = "Decode, optionally resize and re-encode a list of image files on several \
threads, then write them as pages in input order. Corrupt or unsupported files are reported \
and skipped; every other file still becomes a page.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Image files, in page order.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Output directory for page images and layout.json.
    #[arg(short, long, env = "PICMERGE_OUTPUT")]
    output: PathBuf,

    /// Keep source bytes where possible instead of re-encoding.
    #[arg(long, env = "PICMERGE_NO_COMPRESS")]
    no_compress: bool,

    /// Encoding for recompressed pages.
    #[arg(long, env = "PICMERGE_FORMAT", value_enum, default_value = "jpeg")]
    format: FormatArg,

    /// JPEG quality, or PNG effort (higher quality means less effort).
    #[arg(long, env = "PICMERGE_QUALITY", default_value_t = 80,
          value_parser = clap::value_parser!(u8).range(0..=100))]
    quality: u8,

    /// Maximum width in pixels.
    #[arg(long, env = "PICMERGE_WIDTH")]
    width: Option<u32>,

    /// Maximum height in pixels.
    #[arg(long, env = "PICMERGE_HEIGHT")]
    height: Option<u32>,

    /// Maximum short side in pixels (not combinable with --width/--height).
    #[arg(long, env = "PICMERGE_SHORT_SIDE", conflicts_with_all = ["width", "height"])]
    short_side: Option<u32>,

    /// Maximum long side in pixels (not combinable with --width/--height).
    #[arg(long, env = "PICMERGE_LONG_SIDE", conflicts_with_all = ["width", "height"])]
    long_side: Option<u32>,

    /// Shrink by whole halvings only.
    #[arg(long, env = "PICMERGE_POW2")]
    pow2: bool,

    /// How page size is chosen.
    #[arg(long, env = "PICMERGE_PAGE", value_enum, default_value = "width")]
    page: PageArg,

    /// Page width in points (--page width or fixed). Default: first image.
    #[arg(long, env = "PICMERGE_PAGE_WIDTH")]
    page_width: Option<f32>,

    /// Page height in points (--page fixed, together with --page-width). Default: first image.
    #[arg(long, env = "PICMERGE_PAGE_HEIGHT", requires = "page_width")]
    page_height: Option<f32>,

    /// Pixels per inch when converting image size to points.
    #[arg(long, env = "PICMERGE_DPI", default_value_t = 72.0)]
    dpi: f32,

    /// Decoder threads. Default: available parallelism.
    #[arg(short, long, env = "PICMERGE_WORKERS")]
    workers: Option<usize>,

    /// Treat ZIP/RAR/7z inputs as unsupported instead of skipping them.
    #[arg(long, env = "PICMERGE_NO_ARCHIVES")]
    no_archives: bool,

    /// Sort inputs in natural file-name order.
    #[arg(long, env = "PICMERGE_SORT")]
    sort: bool,

    /// Print per-file results as JSON on stdout.
    #[arg(long, env = "PICMERGE_JSON")]
    json: bool,

    #[arg(long, env = "PICMERGE_NO_PROGRESS")]
    no_progress: bool,

    #[arg(short, long, env = "PICMERGE_VERBOSE")]
    verbose: bool,

    #[arg(short, long, env = "PICMERGE_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum FormatArg {
    NoChange,
    Jpeg,
    Png,
}

impl From<FormatArg> for TargetFormat {
    fn from(v: FormatArg) -> Self {
        match v {
            FormatArg::NoChange => TargetFormat::NoChange,
            FormatArg::Jpeg => TargetFormat::Jpeg,
            FormatArg::Png => TargetFormat::Png,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum PageArg {
    /// Page follows each image.
    Image,
    /// Fixed page width, height follows the image.
    Width,
    /// Fixed page size, image fitted and centred.
    Fixed,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO-level library logs.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Build inputs and config ──────────────────────────────────────────
    let mut inputs: Vec<InputItem> = cli.inputs.iter().map(InputItem::from_path).collect();
    if cli.sort {
        sort_natural(&mut inputs);
    }

    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn IngestProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, progress_cb)?;

    // ── Run ingestion ────────────────────────────────────────────────────
    let (sink, output) = ingest(inputs, DirectorySink::new(&cli.output), &config)
        .await
        .context("Ingestion failed")?;

    if cli.json {
        let json =
            serde_json::to_string_pretty(&output.results).context("Failed to serialise results")?;
        println!("{json}");
    } else if !cli.quiet {
        let stats = &output.stats;
        eprintln!(
            "{}  {}/{} pages  {}ms  →  {}",
            if stats.failed == 0 { green("✔") } else { cyan("⚠") },
            stats.succeeded,
            stats.total,
            stats.duration_ms,
            bold(&sink.dir().display().to_string()),
        );
        if !show_progress {
            for failure in output.failures() {
                eprintln!(
                    "   {} {}  {}",
                    red("✗"),
                    failure.filename,
                    dim(&failure.description)
                );
            }
        }
    }

    if output.has_failures() {
        std::process::exit(1);
    }
    Ok(())
}

/// Map CLI flags to an `IngestConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<IngestConfig> {
    let resize = ResizePolicy {
        enabled: cli.width.is_some()
            || cli.height.is_some()
            || cli.short_side.is_some()
            || cli.long_side.is_some(),
        width: cli.width,
        height: cli.height,
        short_side: cli.short_side,
        long_side: cli.long_side,
        reduce_by_pow2: cli.pow2,
    };

    let geometry = match cli.page {
        PageArg::Image => PageGeometry::FollowImage,
        PageArg::Width => PageGeometry::FixedWidth {
            width: cli.page_width,
        },
        PageArg::Fixed => match (cli.page_width, cli.page_height) {
            (Some(_), None) => bail!("--page fixed needs --page-height as well as --page-width"),
            (width, height) => PageGeometry::FixedSize {
                size: width.zip(height),
            },
        },
    };

    let mut builder = IngestConfig::builder()
        .compress(!cli.no_compress)
        .target_format(cli.format.into())
        .quality(cli.quality)
        .resize(resize)
        .page_geometry(geometry)
        .page_dpi(cli.dpi)
        .detect_archives(!cli.no_archives);

    if let Some(n) = cli.workers {
        builder = builder.workers(n);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("picmerge").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn defaults_map_to_library_defaults() {
        let cli = parse(&["a.jpg", "-o", "out"]);
        let config = build_config(&cli, None).unwrap();
        assert!(config.params.compress);
        assert_eq!(config.params.target_format, TargetFormat::Jpeg);
        assert_eq!(config.params.quality, 80);
        assert!(!config.params.resize.is_active());
        assert_eq!(config.params.page_geometry, PageGeometry::FixedWidth { width: None });
    }

    #[test]
    fn resize_flags_enable_policy() {
        let cli = parse(&["--long-side", "1200", "--pow2", "a.jpg", "-o", "out"]);
        let config = build_config(&cli, None).unwrap();
        assert!(config.params.resize.is_active());
        assert_eq!(config.params.resize.long_side, Some(1200));
        assert!(config.params.resize.reduce_by_pow2);
    }

    #[test]
    fn width_conflicts_with_sides() {
        let args = ["picmerge", "--width", "100", "--short-side", "50", "a.jpg", "-o", "out"];
        assert!(Cli::try_parse_from(args).is_err());
    }

    #[test]
    fn fixed_page_size_needs_both_dimensions() {
        let cli = parse(&["--page", "fixed", "--page-width", "595", "--page-height", "842", "a.jpg", "-o", "o"]);
        let config = build_config(&cli, None).unwrap();
        assert_eq!(
            config.params.page_geometry,
            PageGeometry::FixedSize { size: Some((595.0, 842.0)) }
        );

        let cli = parse(&["--page", "fixed", "a.jpg", "-o", "o"]);
        let config = build_config(&cli, None).unwrap();
        assert_eq!(config.params.page_geometry, PageGeometry::FixedSize { size: None });
    }

    #[test]
    fn fixed_page_with_width_only_is_rejected() {
        let cli = parse(&["--page", "fixed", "--page-width", "595", "a.jpg", "-o", "o"]);
        let err = build_config(&cli, None).unwrap_err();
        assert!(err.to_string().contains("--page-height"));

        // a lone width still applies to --page width
        let cli = parse(&["--page-width", "595", "a.jpg", "-o", "o"]);
        let config = build_config(&cli, None).unwrap();
        assert_eq!(
            config.params.page_geometry,
            PageGeometry::FixedWidth { width: Some(595.0) }
        );
    }

    #[test]
    fn quality_accepts_full_range() {
        let cli = parse(&["--quality", "0", "a.jpg", "-o", "o"]);
        assert_eq!(build_config(&cli, None).unwrap().params.quality, 0);

        let args = ["picmerge", "--quality", "101", "a.jpg", "-o", "o"];
        assert!(Cli::try_parse_from(args).is_err());
    }

    #[test]
    fn invalid_dpi_is_rejected() {
        let cli = parse(&["--dpi", "0", "a.jpg", "-o", "o"]);
        assert!(build_config(&cli, None).is_err());
    }
}
