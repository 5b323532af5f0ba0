//! Single-worker dispatch of copied frames.
//!
//! The producer hands a filled [`SlotHandle`] to the [`Dispatcher`]. Exactly
//! one dedicated thread runs the statistics computation; while it is busy
//! every further submission is refused immediately and the caller counts the
//! frame as lost. Nothing is queued: the freshest frame wins.
//!
//! ```text
//! producer ── submit(job) ──► [busy flag] ──► channel(1) ──► metric-worker
//!                 │ refused                                    │ process()
//!                 ▼                                            ▼
//!         LostFrameCounter                            drop(job) releases slot
//! ```

use crate::frame::{FrameDescriptor, StreamSource};
use frame_pool::SlotHandle;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Name of the statistics worker thread.
pub const WORKER_THREAD_NAME: &str = "metric-worker";

/// One copied frame travelling from a producer to the worker.
///
/// Owning the job means owning the slot; dropping it returns the slot to its
/// pool.
#[derive(Debug)]
pub struct FrameJob {
    /// Slot holding the copied frame; released when the job is dropped.
    pub slot: SlotHandle,
    /// Geometry of the copied frame.
    pub descriptor: FrameDescriptor,
    /// Stream the frame came from.
    pub stream: StreamSource,
}

impl FrameJob {
    /// Frame bytes.
    #[inline]
    #[must_use]
    pub fn data(&self) -> &[u8] {
        self.slot.as_slice()
    }
}

/// Work executed on the worker thread for every accepted job.
pub trait FrameProcessor: Send + 'static {
    /// Handle one job; the slot is released after this returns.
    fn process(&mut self, job: &FrameJob);
}

impl<F> FrameProcessor for F
where
    F: FnMut(&FrameJob) + Send + 'static,
{
    fn process(&mut self, job: &FrameJob) {
        self(job);
    }
}

/// Handle to the statistics worker.
///
/// Dropping the dispatcher closes the channel and joins the worker after it
/// finishes the job in progress.
pub struct Dispatcher {
    tx: Option<mpsc::Sender<FrameJob>>,
    busy: Arc<AtomicBool>,
    processed: Arc<AtomicU64>,
    worker: Option<JoinHandle<()>>,
}

impl Dispatcher {
    /// Spawn the worker thread running `processor`.
    ///
    /// # Errors
    ///
    /// Returns the OS error if the thread cannot be spawned.
    pub fn spawn<P: FrameProcessor>(mut processor: P) -> io::Result<Self> {
        let (tx, mut rx) = mpsc::channel::<FrameJob>(1);
        let busy = Arc::new(AtomicBool::new(false));
        let processed = Arc::new(AtomicU64::new(0));

        let worker = {
            let busy = Arc::clone(&busy);
            let processed = Arc::clone(&processed);
            thread::Builder::new()
                .name(WORKER_THREAD_NAME.to_string())
                .spawn(move || {
                    debug!("Statistics worker started");
                    while let Some(job) = rx.blocking_recv() {
                        processor.process(&job);
                        // Release the slot before advertising availability.
                        drop(job);
                        processed.fetch_add(1, Ordering::Relaxed);
                        busy.store(false, Ordering::Release);
                    }
                    debug!("Statistics worker stopped");
                })?
        };

        info!(thread = WORKER_THREAD_NAME, "Spawned statistics worker");

        Ok(Self {
            tx: Some(tx),
            busy,
            processed,
            worker: Some(worker),
        })
    }

    /// Whether a job is currently being computed.
    #[inline]
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Jobs completed since spawn.
    #[must_use]
    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    /// Hand `job` to the worker.
    ///
    /// Returns `false` without blocking if the worker is busy or gone; the
    /// job is dropped and its slot released.
    pub fn submit(&self, job: FrameJob) -> bool {
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }

        let Some(tx) = self.tx.as_ref() else {
            self.busy.store(false, Ordering::Release);
            return false;
        };

        match tx.try_send(job) {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Statistics worker unavailable");
                self.busy.store(false, Ordering::Release);
                false
            }
        }
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.tx.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("Statistics worker panicked");
            }
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("busy", &self.is_busy())
            .field("processed", &self.processed())
            .finish()
    }
}

/// Result of recording one dropped frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LostFrame {
    /// Running total after this drop.
    Counted(u32),
    /// This drop brought the total to the limit, carried here; the counter
    /// restarted at zero.
    Overflowed(u32),
}

/// Saturating per-stream count of frames dropped because the pipeline was
/// busy.
#[derive(Debug)]
pub struct LostFrameCounter {
    count: AtomicU32,
    limit: u32,
}

impl LostFrameCounter {
    /// Counter that resets when it reaches `limit` (at least 1).
    #[must_use]
    pub fn with_limit(limit: u32) -> Self {
        Self {
            count: AtomicU32::new(0),
            limit: limit.max(1),
        }
    }

    /// Record one drop.
    pub fn record(&self) -> LostFrame {
        let limit = self.limit;
        let previous = self
            .count
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                let next = n.saturating_add(1);
                Some(if next >= limit { 0 } else { next })
            })
            .unwrap_or_default();

        let next = previous.saturating_add(1);
        if next >= limit {
            LostFrame::Overflowed(next)
        } else {
            LostFrame::Counted(next)
        }
    }

    /// Drops since the last overflow.
    #[must_use]
    pub fn get(&self) -> u32 {
        self.count.load(Ordering::Acquire)
    }
}

impl Default for LostFrameCounter {
    fn default() -> Self {
        Self::with_limit(u32::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use frame_pool::SlotPool;
    use std::sync::mpsc as std_mpsc;
    use std::time::Duration;

    fn descriptor() -> FrameDescriptor {
        FrameDescriptor {
            sample_width_bits: 8,
            samples_per_line: 2,
            lines_per_frame: 2,
            frames_per_buffer: 1,
            buffers_per_volume: 1,
            current_buffer_index: 0,
        }
    }

    fn job(pool: &SlotPool) -> FrameJob {
        let mut slot = pool.try_acquire().unwrap();
        slot.write(&[1, 2, 3, 4], 0, 4).unwrap();
        FrameJob {
            slot,
            descriptor: descriptor(),
            stream: StreamSource::Raw,
        }
    }

    fn wait_idle(dispatcher: &Dispatcher) {
        for _ in 0..500 {
            if !dispatcher.is_busy() {
                return;
            }
            thread::sleep(Duration::from_millis(2));
        }
        panic!("worker never became idle");
    }

    #[test]
    fn job_is_processed_and_slot_released() {
        let pool = SlotPool::with_size(2, 4).unwrap();
        let (seen_tx, seen_rx) = std_mpsc::channel();
        let dispatcher = Dispatcher::spawn(move |job: &FrameJob| {
            seen_tx.send(job.data().to_vec()).unwrap();
        })
        .unwrap();

        assert!(dispatcher.submit(job(&pool)));
        assert_eq!(seen_rx.recv_timeout(Duration::from_secs(2)).unwrap(), vec![1, 2, 3, 4]);

        wait_idle(&dispatcher);
        assert_eq!(pool.in_flight(), 0);
        assert_eq!(dispatcher.processed(), 1);
    }

    #[test]
    fn busy_worker_refuses_second_job() {
        let pool = SlotPool::with_size(2, 4).unwrap();
        let (gate_tx, gate_rx) = std_mpsc::channel::<()>();
        let (started_tx, started_rx) = std_mpsc::channel::<()>();
        let dispatcher = Dispatcher::spawn(move |_: &FrameJob| {
            started_tx.send(()).unwrap();
            gate_rx.recv().unwrap();
        })
        .unwrap();

        assert!(dispatcher.submit(job(&pool)));
        started_rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert!(dispatcher.is_busy());

        // The refused job is dropped and its slot returned.
        assert!(!dispatcher.submit(job(&pool)));
        assert_eq!(pool.in_flight(), 1);

        gate_tx.send(()).unwrap();
        wait_idle(&dispatcher);
        assert_eq!(pool.in_flight(), 0);
        assert!(dispatcher.submit(job(&pool)));
        gate_tx.send(()).unwrap();
    }

    #[test]
    fn drop_joins_worker_after_current_job() {
        let pool = SlotPool::with_size(2, 4).unwrap();
        let done = Arc::new(AtomicBool::new(false));
        let dispatcher = {
            let done = Arc::clone(&done);
            Dispatcher::spawn(move |_: &FrameJob| {
                thread::sleep(Duration::from_millis(20));
                done.store(true, Ordering::SeqCst);
            })
            .unwrap()
        };

        assert!(dispatcher.submit(job(&pool)));
        drop(dispatcher);
        assert!(done.load(Ordering::SeqCst));
        assert_eq!(pool.in_flight(), 0);
    }

    #[test]
    fn lost_counter_counts_and_overflows() {
        let counter = LostFrameCounter::with_limit(3);
        assert_eq!(counter.record(), LostFrame::Counted(1));
        assert_eq!(counter.record(), LostFrame::Counted(2));
        assert_eq!(counter.record(), LostFrame::Overflowed(3));
        assert_eq!(counter.get(), 0);
        assert_eq!(counter.record(), LostFrame::Counted(1));
    }

    #[test]
    fn lost_counter_default_limit() {
        let counter = LostFrameCounter::default();
        for expected in 1..=10 {
            assert_eq!(counter.record(), LostFrame::Counted(expected));
        }
        assert_eq!(counter.get(), 10);
    }
}
