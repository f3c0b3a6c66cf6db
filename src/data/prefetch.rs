// ============================================================
// Layer 4 — Batch Prefetcher
// ============================================================
// Runs a RoundRobinBatcher on a background thread so batch
// assembly overlaps with the training step.
//
//   batcher thread ──► bounded channel (depth) ──► training loop
//
// A single thread owns the batcher, its pool and its RNG, so
// the stream of batches is identical to calling get_batch()
// directly. Each batch travels with the batcher's epoch count
// as it was right after that batch was assembled. The first
// error is forwarded and ends the stream.
// Dropping the prefetcher raises the shutdown flag and joins
// the thread.

use crossbeam::channel::{bounded, Receiver, SendTimeoutError, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::data::batcher::RoundRobinBatcher;
use crate::data::error::PipelineError;
use crate::domain::batch::Batch;
use crate::domain::traits::RecordingSource;

/// A batch and the number of corpus passes completed when it was built.
#[derive(Debug, Clone)]
pub struct EpochBatch {
    pub batch: Batch,
    pub epoch: usize,
}

type Item = Result<EpochBatch, PipelineError>;

pub struct Prefetcher {
    rx:       Receiver<Item>,
    shutdown: Arc<AtomicBool>,
    handle:   Option<JoinHandle<()>>,
}

impl Prefetcher {
    /// Move `batcher` onto its own thread, keeping up to `depth`
    /// batches ready.
    pub fn spawn<S>(batcher: RoundRobinBatcher<S>, depth: usize) -> Self
    where
        S: RecordingSource + Send + 'static,
    {
        let (tx, rx)  = bounded(depth.max(1));
        let shutdown  = Arc::new(AtomicBool::new(false));
        let handle = {
            let shutdown = Arc::clone(&shutdown);
            thread::spawn(move || producer_main(batcher, tx, shutdown))
        };
        tracing::debug!("Prefetcher started (depth {})", depth.max(1));
        Self { rx, shutdown, handle: Some(handle) }
    }

    /// Block until the next batch is ready.
    ///
    /// Returns None once the producer has stopped.
    pub fn next_batch(&self) -> Option<Item> {
        self.rx.recv().ok()
    }

    fn stop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(h) = self.handle.take() {
            let _ = h.join();
        }
    }
}

impl Iterator for Prefetcher {
    type Item = Item;

    fn next(&mut self) -> Option<Item> {
        self.next_batch()
    }
}

impl Drop for Prefetcher {
    fn drop(&mut self) {
        self.stop();
    }
}

fn producer_main<S: RecordingSource>(
    mut batcher: RoundRobinBatcher<S>,
    tx:          Sender<Item>,
    shutdown:    Arc<AtomicBool>,
) {
    while !shutdown.load(Ordering::Relaxed) {
        let item = batcher
            .get_batch()
            .map(|batch| EpochBatch { batch, epoch: batcher.epoch() });
        let failed = item.is_err();
        if !send_item(&tx, &shutdown, item) || failed {
            return;
        }
    }
}

/// Send with retry on timeout, checking shutdown between attempts.
fn send_item(tx: &Sender<Item>, shutdown: &AtomicBool, mut item: Item) -> bool {
    loop {
        if shutdown.load(Ordering::Relaxed) {
            return false;
        }
        match tx.send_timeout(item, Duration::from_millis(100)) {
            Ok(()) => return true,
            Err(SendTimeoutError::Timeout(returned)) => item = returned,
            Err(SendTimeoutError::Disconnected(_)) => return false,
        }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::batcher::BatcherConfig;
    use crate::data::testing::{beat_recording, MemorySource};
    use crate::data::windower::WindowConfig;

    fn corpus() -> MemorySource {
        MemorySource::new(
            (0..4)
                .map(|i| beat_recording(&format!("r{i}"), 30, 8 + i, i as f32))
                .collect(),
        )
    }

    fn config() -> BatcherConfig {
        BatcherConfig {
            batch_size: 2,
            window: WindowConfig { n_frames: 3, overlap: 1, reduction_ratio: 2, ..Default::default() },
            seed: 11,
            ..Default::default()
        }
    }

    #[test]
    fn test_prefetched_stream_matches_direct_stream() {
        let mut direct = RoundRobinBatcher::new(corpus(), config()).unwrap();
        let prefetch   = Prefetcher::spawn(RoundRobinBatcher::new(corpus(), config()).unwrap(), 3);

        for batch in prefetch.take(12) {
            let item     = batch.unwrap();
            let expected = direct.get_batch().unwrap();
            assert_eq!(item.batch.raw, expected.raw);
            assert_eq!(item.batch.sequence_length, expected.sequence_length);
            assert_eq!(item.epoch, direct.epoch());
        }
    }

    #[test]
    fn test_epochs_advance_through_the_channel() {
        // (30 - 1) / 3 - 1 = 8 windows per recording, 4 recordings, 2 lanes
        let prefetch = Prefetcher::spawn(RoundRobinBatcher::new(corpus(), config()).unwrap(), 2);
        let epochs: Vec<usize> = prefetch.take(40).map(|item| item.unwrap().epoch).collect();

        assert_eq!(epochs[0], 0);
        assert!(epochs.windows(2).all(|w| w[0] <= w[1]));
        assert!(*epochs.last().unwrap() >= 1);
    }

    #[test]
    fn test_error_ends_the_stream() {
        let cfg = BatcherConfig { file_min_len: Some(1_000_000), max_attempts: 3, ..config() };
        let mut prefetch = Prefetcher::spawn(RoundRobinBatcher::new(corpus(), cfg).unwrap(), 2);

        assert!(matches!(
            prefetch.next(),
            Some(Err(PipelineError::CorpusStarvation { attempts: 3, .. }))
        ));
        assert!(prefetch.next().is_none());
    }

    #[test]
    fn test_drop_stops_the_producer() {
        let prefetch = Prefetcher::spawn(RoundRobinBatcher::new(corpus(), config()).unwrap(), 1);
        assert!(prefetch.next_batch().unwrap().is_ok());
        drop(prefetch);
    }
}
