//! Streaming ingestion API: emit items in input order as they are released.
//!
//! ## Why stream?
//!
//! A batch of several hundred scans takes a while. A streams-based API lets
//! callers place pages as they are ready, drive progress bars, or hand
//! results to their own PDF writer without a [`PdfSink`](crate::PdfSink) and
//! without buffering the whole batch.
//!
//! Unlike [`crate::ingest::ingest`], which returns only after every item
//! has been placed, [`ingest_stream`] yields an [`IngestedItem`] per input.
//! Items always arrive in input order; failures are yielded in their slot.
//!
//! Backpressure is end to end: the bounded channel holds at most
//! `queue_capacity` items, after which the consumer blocks, the ordered
//! queue fills up, and workers stop claiming new indices. Dropping the
//! stream aborts the batch.

use crate::config::IngestConfig;
use crate::error::IngestError;
use crate::ingest::drive;
use crate::output::{FileResult, ImageResult};
use crate::pipeline::source::InputItem;
use std::pin::Pin;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::Stream;
use tracing::{debug, info, warn};

/// One released item.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestedItem {
    /// 0-based position in the input list.
    pub index: usize,
    pub name: String,
    pub result: ImageResult,
}

impl IngestedItem {
    /// The public record for this item.
    pub fn file_result(&self) -> FileResult {
        match &self.result {
            ImageResult::Decoded(_) => FileResult::success(&self.name),
            ImageResult::Failed { error, .. } => FileResult::from_error(&self.name, error),
        }
    }
}

/// A boxed stream of released items.
pub type PageStream = Pin<Box<dyn Stream<Item = IngestedItem> + Send>>;

/// Ingest `inputs`, streaming one [`IngestedItem`] per input in input order.
///
/// Must be called from within a Tokio runtime; the batch runs on the
/// blocking pool. The progress callback, if any, sees the same events as
/// with [`crate::ingest::ingest_blocking`].
///
/// # Example
/// ```rust,no_run
/// use picmerge::{ingest_stream, IngestConfig, InputItem};
/// use tokio_stream::StreamExt;
///
/// # #[tokio::main]
/// # async fn main() {
/// let inputs = vec![InputItem::from_path("a.jpg"), InputItem::from_path("b.png")];
/// let mut stream = ingest_stream(inputs, &IngestConfig::default());
/// while let Some(item) = stream.next().await {
///     println!("{} → {:#x}", item.name, item.result.code());
/// }
/// # }
/// ```
pub fn ingest_stream(inputs: Vec<InputItem>, config: &IngestConfig) -> PageStream {
    let config = config.clone();
    let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));

    tokio::task::spawn_blocking(move || {
        let total = inputs.len();
        if total == 0 {
            return;
        }
        info!("Starting streaming ingestion: {} items", total);
        if let Some(ref cb) = config.progress_callback {
            cb.on_batch_start(total);
        }

        let mut succeeded = 0;
        let outcome = drive(&inputs, &config, |index, result| {
            let item = IngestedItem {
                index,
                name: inputs[index].name.clone(),
                result,
            };
            if let Some(ref cb) = config.progress_callback {
                cb.on_item_finished(index, total, &item.file_result());
            }
            if item.result.is_decoded() {
                succeeded += 1;
            }
            tx.blocking_send(item)
                .map_err(|_| IngestError::Internal("stream receiver dropped".to_string()))
        });

        match outcome {
            Ok(peak) => {
                if let Some(ref cb) = config.progress_callback {
                    cb.on_batch_complete(total, succeeded);
                }
                info!(
                    "Streaming ingestion complete: {}/{} succeeded (peak queue {})",
                    succeeded, total, peak
                );
            }
            Err(IngestError::Internal(reason)) if tx.is_closed() => {
                debug!("Stream dropped early: {}", reason);
            }
            Err(e) => warn!("Streaming ingestion stopped: {}", e),
        }
    });

    Box::pin(ReceiverStream::new(rx))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ItemError;
    use crate::output::DecodedImage;
    use crate::pipeline::codec::tests::sample_image;
    use crate::pipeline::codec::{Codec, CodecContext, CodecError, CodecSet, Strategy};
    use crate::pipeline::sniff::FormatTag;
    use futures::StreamExt;
    use image::ImageFormat;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn png_inputs(n: usize) -> Vec<InputItem> {
        (0..n)
            .map(|i| InputItem::from_bytes(format!("{i:03}.png"), sample_image(4 + i as u32, 4, ImageFormat::Png)))
            .collect()
    }

    #[tokio::test]
    async fn stream_yields_in_input_order() {
        let config = IngestConfig::builder().workers(4).build().unwrap();
        let items: Vec<IngestedItem> = ingest_stream(png_inputs(12), &config).collect().await;
        assert_eq!(items.len(), 12);
        for (i, item) in items.iter().enumerate() {
            assert_eq!(item.index, i);
            assert_eq!(item.name, format!("{i:03}.png"));
            assert!(item.result.is_decoded());
        }
    }

    #[tokio::test]
    async fn failures_occupy_their_slot() {
        let mut inputs = png_inputs(2);
        inputs.insert(1, InputItem::from_bytes("notes.txt", b"plain text, not an image".to_vec()));
        let items: Vec<IngestedItem> = ingest_stream(inputs, &IngestConfig::default()).collect().await;

        assert_eq!(items.len(), 3);
        assert_eq!(items[1].name, "notes.txt");
        assert_eq!(items[1].result.code(), ItemError::UnsupportedType.code());
        assert!(items[1].file_result().is_failure());
    }

    #[tokio::test]
    async fn empty_input_ends_immediately() {
        let items: Vec<IngestedItem> = ingest_stream(Vec::new(), &IngestConfig::default()).collect().await;
        assert!(items.is_empty());
    }

    /// Counts calls and takes a few milliseconds per item.
    struct SlowCounting {
        calls: AtomicUsize,
    }

    impl Codec for SlowCounting {
        fn process(
            &self,
            bytes: &[u8],
            format: FormatTag,
            _ctx: &CodecContext<'_>,
        ) -> Result<DecodedImage, CodecError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(5));
            Ok(DecodedImage::new(bytes.to_vec(), 1, 1, format, Strategy::Generic))
        }
    }

    #[tokio::test]
    async fn dropping_the_stream_stops_the_batch() {
        let codec = Arc::new(SlowCounting {
            calls: AtomicUsize::new(0),
        });
        let set: Arc<dyn Codec> = codec.clone();
        let config = IngestConfig::builder()
            .workers(2)
            .queue_capacity(1)
            .codecs(CodecSet::new(set.clone(), set.clone(), set))
            .build()
            .unwrap();

        let mut stream = ingest_stream(png_inputs(50), &config);
        let first = stream.next().await.unwrap();
        assert_eq!(first.index, 0);
        drop(stream);

        // An unaborted batch would finish all 50 items well within this window.
        tokio::time::sleep(Duration::from_millis(600)).await;
        let settled = codec.calls.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(codec.calls.load(Ordering::SeqCst), settled);
        assert!(settled < 50, "codec ran {settled} times after the stream was dropped");
    }
}
