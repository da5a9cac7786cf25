//! Batch ingestion entry points.
//!
//! ## How a batch runs
//!
//! ```text
//!  inputs ──▶ dispatch cursor (AtomicUsize)
//!               │ claim next index
//!      ┌────────┼────────┐
//!   worker 0 worker 1 … worker N-1     read → sniff → codec chain
//!      └────────┼────────┘
//!               ▼ push(index) in index order, ≤ queue_capacity held
//!        OrderedWorkQueue
//!               ▼ pop()
//!   consumer (calling thread) ──▶ layout ──▶ PdfSink / FileResult
//! ```
//!
//! Workers are self-feeding: after releasing a result they claim the next
//! index, so no scheduler thread exists. Every item produces exactly one
//! [`ImageResult`], failures included, so the consumer sees every index in
//! order. Only a fatal sink error stops the batch early.
//!
//! ## Why scoped OS threads?
//!
//! Decoding and re-encoding are CPU-bound and synchronous. Scoped threads
//! let workers borrow the inputs, the config and the scratch pool without
//! reference counting. The async wrapper [`ingest`] moves the whole batch
//! onto Tokio's blocking pool, the same way page rendering was kept off the
//! async executor.

use crate::config::{IngestConfig, Parameters};
use crate::error::{IngestError, ItemError};
use crate::output::{FileResult, ImageResult, IngestOutput, IngestStats};
use crate::pipeline::codec::CodecFallbackChain;
use crate::pipeline::layout::PageLayouter;
use crate::pipeline::queue::OrderedWorkQueue;
use crate::pipeline::scratch::ScratchPool;
use crate::pipeline::sniff::{classify_with, SniffOptions};
use crate::pipeline::source::InputItem;
use crate::sink::PdfSink;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Ingest `inputs` into `sink`, blocking the calling thread.
///
/// The calling thread acts as the sequential consumer; decoding runs on
/// `config.workers` scoped threads.
///
/// # Returns
/// `Ok(IngestOutput)` with one [`FileResult`] per input, in input order,
/// even if some items failed (check [`IngestOutput::has_failures`]).
/// An empty input list returns an empty output without touching the sink.
///
/// # Errors
/// Returns `Err(IngestError)` only for fatal errors:
/// - the sink could not be acquired ([`IngestError::SinkUnavailable`])
/// - the sink failed mid-batch or on finish ([`IngestError::SinkFailed`])
pub fn ingest_blocking<S>(
    inputs: &[InputItem],
    sink: &mut S,
    config: &IngestConfig,
) -> Result<IngestOutput, IngestError>
where
    S: PdfSink + ?Sized,
{
    let start = Instant::now();
    let total = inputs.len();
    if total == 0 {
        info!("Nothing to ingest");
        return Ok(IngestOutput::default());
    }
    info!(
        "Starting ingestion: {} items, {} workers",
        total,
        worker_count(config, total)
    );

    sink.begin().map_err(|e| match e {
        IngestError::SinkUnavailable { .. } => e,
        other => IngestError::SinkUnavailable {
            reason: other.to_string(),
        },
    })?;

    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_start(total);
    }

    let layouter = PageLayouter::from_params(&config.params);
    let mut results: Vec<FileResult> = Vec::with_capacity(total);

    let peak_queue_len = drive(inputs, config, |index, image| {
        let item = &inputs[index];
        debug_assert_eq!(index, results.len(), "consumer received an item out of order");

        let record = match image {
            ImageResult::Decoded(img) => {
                let layout = layouter.place(&img);
                if sink.add_page(&img, &layout, item.page_index)? {
                    FileResult::success(&item.name)
                } else {
                    warn!("{}: sink rejected page", item.name);
                    FileResult::from_error(&item.name, &ItemError::SinkRejected)
                }
            }
            ImageResult::Failed { error, .. } => {
                if error.is_hard() {
                    warn!("{}: {}", item.name, error);
                } else {
                    info!("{}: {}", item.name, error);
                }
                FileResult::from_error(&item.name, &error)
            }
        };

        if let Some(ref cb) = config.progress_callback {
            cb.on_item_finished(index, total, &record);
        }
        results.push(record);
        Ok(())
    })?;

    sink.finish()?;

    let mut stats = IngestStats::from_results(&results);
    stats.duration_ms = start.elapsed().as_millis() as u64;
    stats.peak_queue_len = peak_queue_len;

    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_complete(total, stats.succeeded);
    }

    info!(
        "Ingestion complete: {}/{} succeeded, {} failed, {} skipped in {}ms",
        stats.succeeded, stats.total, stats.failed, stats.informational, stats.duration_ms
    );

    Ok(IngestOutput { results, stats })
}

/// Async wrapper around [`ingest_blocking`].
///
/// The batch runs on Tokio's blocking pool; the sink is handed back
/// together with the output.
///
/// # Example
/// ```rust,no_run
/// use picmerge::{ingest, IngestConfig, InputItem, DirectorySink};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let inputs = vec![InputItem::from_path("scan-01.jpg"), InputItem::from_path("scan-02.png")];
/// let config = IngestConfig::builder().quality(75).build()?;
/// let (_sink, output) = ingest(inputs, DirectorySink::new("pages"), &config).await?;
/// println!("{} pages", output.stats.succeeded);
/// # Ok(())
/// # }
/// ```
pub async fn ingest<S>(
    inputs: Vec<InputItem>,
    mut sink: S,
    config: &IngestConfig,
) -> Result<(S, IngestOutput), IngestError>
where
    S: PdfSink + 'static,
{
    let config = config.clone();
    tokio::task::spawn_blocking(move || {
        let output = ingest_blocking(&inputs, &mut sink, &config)?;
        Ok((sink, output))
    })
    .await
    .map_err(|e| IngestError::Internal(format!("ingestion task failed: {}", e)))?
}

// ── Core ─────────────────────────────────────────────────────────────────

fn worker_count(config: &IngestConfig, total: usize) -> usize {
    config.workers.max(1).min(total.max(1))
}

/// Aborts the queue if the consumer unwinds, so blocked workers can exit
/// and the thread scope can close.
struct AbortOnUnwind<'a, T>(&'a OrderedWorkQueue<T>);

impl<T> Drop for AbortOnUnwind<'_, T> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.0.abort();
        }
    }
}

/// Run the worker pool over `inputs`, feeding `consume` in input order on
/// the calling thread.
///
/// `consume` returning `Err` aborts the queue; workers finish their
/// in-flight item and exit. Returns the queue's high-water mark.
pub(crate) fn drive<F>(
    inputs: &[InputItem],
    config: &IngestConfig,
    mut consume: F,
) -> Result<usize, IngestError>
where
    F: FnMut(usize, ImageResult) -> Result<(), IngestError>,
{
    let total = inputs.len();
    let workers = worker_count(config, total);
    let queue = OrderedWorkQueue::new(total, config.queue_capacity);
    let scratch = ScratchPool::new(workers, config.scratch_buffer_bytes);
    let chain = CodecFallbackChain::new(&config.strategy_table, &config.codecs, &scratch);
    let cursor = AtomicUsize::new(0);
    let params = &config.params;

    std::thread::scope(|s| {
        for n in 0..workers {
            let spawned = std::thread::Builder::new()
                .name(format!("picmerge-worker-{}", n))
                .spawn_scoped(s, || worker_loop(inputs, &cursor, &queue, &chain, params));
            if let Err(e) = spawned {
                queue.abort();
                return Err(IngestError::Internal(format!(
                    "cannot spawn worker thread: {}",
                    e
                )));
            }
        }

        let _guard = AbortOnUnwind(&queue);
        while let Some((index, image)) = queue.pop() {
            if let Err(e) = consume(index, image) {
                warn!("Aborting batch at item {}: {}", index, e);
                queue.abort();
                return Err(e);
            }
        }
        Ok(())
    })?;

    Ok(queue.peak_len())
}

fn worker_loop(
    inputs: &[InputItem],
    cursor: &AtomicUsize,
    queue: &OrderedWorkQueue<ImageResult>,
    chain: &CodecFallbackChain<'_>,
    params: &Parameters,
) {
    loop {
        let index = cursor.fetch_add(1, Ordering::SeqCst);
        let Some(item) = inputs.get(index) else {
            break;
        };
        let result = process_item(item, chain, params);
        if queue.push(index, result).is_err() {
            debug!("Queue aborted; worker exiting after item {}", index);
            break;
        }
    }
}

/// Read, classify and decode one item. Panics become `WorkerPanicked`.
pub(crate) fn process_item(
    item: &InputItem,
    chain: &CodecFallbackChain<'_>,
    params: &Parameters,
) -> ImageResult {
    let outcome = catch_unwind(AssertUnwindSafe(|| {
        let bytes = match item.source.read() {
            Ok(bytes) => bytes,
            Err(error) => {
                return ImageResult::Failed {
                    source_id: item.name.clone(),
                    error,
                }
            }
        };
        let format = classify_with(
            &bytes,
            SniffOptions {
                detect_archives: params.detect_archives,
            },
        );
        debug!("{}: classified as {}", item.name, format);
        chain.process(&item.name, &bytes, format, params)
    }));

    outcome.unwrap_or_else(|payload| {
        let detail = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic payload".to_string());
        warn!("{}: worker panicked: {}", item.name, detail);
        ImageResult::Failed {
            source_id: item.name.clone(),
            error: ItemError::WorkerPanicked { detail },
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::codec::tests::sample_image;
    use crate::sink::MemorySink;
    use image::ImageFormat;

    fn config(workers: usize) -> IngestConfig {
        IngestConfig::builder().workers(workers).build().unwrap()
    }

    #[test]
    fn empty_input_leaves_sink_untouched() {
        let mut sink = MemorySink::new();
        let out = ingest_blocking(&[], &mut sink, &config(2)).unwrap();
        assert!(out.results.is_empty());
        assert!(!sink.is_begun());
        assert!(!sink.is_finished());
    }

    #[test]
    fn fail_soft_keeps_positions() {
        let inputs = vec![
            InputItem::from_bytes("A.jpg", sample_image(16, 16, ImageFormat::Jpeg)),
            InputItem::from_bytes("CORRUPT.bin", vec![0xFF, 0xD8, 0xFF, 0xE0, 0, 0, 0, 0, 1, 2]),
            InputItem::from_bytes("B.png", sample_image(8, 8, ImageFormat::Png)),
        ];
        let mut sink = MemorySink::new();
        let out = ingest_blocking(&inputs, &mut sink, &config(3)).unwrap();

        let names: Vec<_> = out.results.iter().map(|r| r.filename.as_str()).collect();
        assert_eq!(names, ["A.jpg", "CORRUPT.bin", "B.png"]);
        assert!(out.results[0].is_success());
        assert!(out.results[1].is_failure());
        assert!(out.results[2].is_success());
        assert_eq!(sink.pages().len(), 2);
        assert!(sink.is_finished());
        assert_eq!(out.stats.succeeded, 2);
        assert_eq!(out.stats.failed, 1);
    }

    #[test]
    fn sink_rejection_is_per_item() {
        let inputs: Vec<_> = (0..3)
            .map(|i| InputItem::from_bytes(format!("{i}.png"), sample_image(4, 4, ImageFormat::Png)))
            .collect();
        let mut sink = MemorySink::with_max_pages(2);
        let out = ingest_blocking(&inputs, &mut sink, &config(2)).unwrap();
        assert!(out.results[0].is_success());
        assert!(out.results[1].is_success());
        assert_eq!(out.results[2].code, ItemError::SinkRejected.code());
    }

    #[test]
    fn process_item_reports_unreadable_source() {
        let dir = tempfile::tempdir().unwrap();
        let item = InputItem::from_path(dir.path().join("missing.jpg"));
        let pool = ScratchPool::new(1, 1024);
        let cfg = IngestConfig::default();
        let chain = CodecFallbackChain::new(&cfg.strategy_table, &cfg.codecs, &pool);
        let r = process_item(&item, &chain, &cfg.params);
        assert!(matches!(r, ImageResult::Failed { error: ItemError::SourceUnreadable { .. }, .. }));
    }

    #[test]
    fn archives_are_informational_unless_detection_is_off() {
        let mut zip = b"PK\x03\x04".to_vec();
        zip.resize(64, 0);
        let inputs = vec![InputItem::from_bytes("bundle.zip", zip)];

        let out = ingest_blocking(&inputs, &mut MemorySink::new(), &config(1)).unwrap();
        assert!(out.results[0].is_informational());
        assert!(!out.has_failures());

        let cfg = IngestConfig::builder().detect_archives(false).build().unwrap();
        let out = ingest_blocking(&inputs, &mut MemorySink::new(), &cfg).unwrap();
        assert_eq!(out.results[0].code, ItemError::UnsupportedType.code());
    }

    #[tokio::test]
    async fn async_wrapper_returns_sink() {
        let inputs = vec![InputItem::from_bytes("a.png", sample_image(4, 4, ImageFormat::Png))];
        let (sink, out) = ingest(inputs, MemorySink::new(), &config(1)).await.unwrap();
        assert_eq!(sink.pages().len(), 1);
        assert_eq!(out.stats.total, 1);
    }
}
