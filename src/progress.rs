//! Progress reporting for a running compression task.
//!
//! The worker calls a [`ProgressSink`] at fixed checkpoints (30 "converting",
//! 70 "compressing") and once per re-encoded page. The task registry
//! implements it to update the pollable task record; the CLI implements it to
//! drive a terminal progress bar. Sinks are `Send + Sync` because pages are
//! encoded concurrently.
//!
//! # Example
//!
//! ```rust
//! use edgequake_pdfcompress::ProgressSink;
//! use std::sync::atomic::{AtomicU8, Ordering};
//!
//! struct LastCheckpoint(AtomicU8);
//!
//! impl ProgressSink for LastCheckpoint {
//!     fn on_checkpoint(&self, progress: u8, _step: &str) {
//!         self.0.store(progress, Ordering::SeqCst);
//!     }
//! }
//!
//! let sink = LastCheckpoint(AtomicU8::new(0));
//! sink.on_checkpoint(30, "converting");
//! assert_eq!(sink.0.load(Ordering::SeqCst), 30);
//! ```

use std::sync::Arc;

/// Checkpoint reached before rasterisation starts.
pub const CHECKPOINT_CONVERTING: (u8, &str) = (30, "converting");

/// Checkpoint reached before reassembly starts.
pub const CHECKPOINT_COMPRESSING: (u8, &str) = (70, "compressing");

/// Receives progress events from the pipeline worker.
///
/// All methods default to no-ops.
pub trait ProgressSink: Send + Sync {
    /// A named checkpoint was reached. `progress` is a percentage in 0..=100.
    fn on_checkpoint(&self, progress: u8, step: &str) {
        let _ = (progress, step);
    }

    /// Rasterisation finished and `total_pages` pages will be re-encoded.
    fn on_pages_rendered(&self, total_pages: usize) {
        let _ = total_pages;
    }

    /// Page `page_num` (1-indexed) was written as JPEG.
    ///
    /// May be called out of page order.
    fn on_page_encoded(&self, page_num: usize, total_pages: usize) {
        let _ = (page_num, total_pages);
    }
}

/// Sink that ignores every event.
pub struct NoopProgress;

impl ProgressSink for NoopProgress {}

/// Shared handle passed into the worker.
pub type SharedProgress = Arc<dyn ProgressSink>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        checkpoints: Mutex<Vec<(u8, String)>>,
        encoded: AtomicUsize,
    }

    impl ProgressSink for Recorder {
        fn on_checkpoint(&self, progress: u8, step: &str) {
            self.checkpoints
                .lock()
                .unwrap()
                .push((progress, step.to_string()));
        }

        fn on_page_encoded(&self, _page_num: usize, _total_pages: usize) {
            self.encoded.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_sink_accepts_everything() {
        let sink: SharedProgress = Arc::new(NoopProgress);
        sink.on_checkpoint(30, "converting");
        sink.on_pages_rendered(3);
        sink.on_page_encoded(1, 3);
    }

    #[test]
    fn recorder_sees_checkpoints_in_order() {
        let rec = Recorder::default();
        rec.on_checkpoint(CHECKPOINT_CONVERTING.0, CHECKPOINT_CONVERTING.1);
        rec.on_page_encoded(2, 2);
        rec.on_page_encoded(1, 2);
        rec.on_checkpoint(CHECKPOINT_COMPRESSING.0, CHECKPOINT_COMPRESSING.1);

        let seen = rec.checkpoints.lock().unwrap().clone();
        assert_eq!(
            seen,
            vec![(30, "converting".to_string()), (70, "compressing".to_string())]
        );
        assert_eq!(rec.encoded.load(Ordering::SeqCst), 2);
    }
}
