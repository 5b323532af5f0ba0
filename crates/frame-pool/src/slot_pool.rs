//! Round-robin slot pool and the owning [`SlotHandle`].
//!
//! # Design
//!
//! Each slot carries an atomic in-flight flag and a parked buffer. Acquiring
//! a slot flips the flag with a compare-exchange and moves the buffer out of
//! the slot into the handle, so the consumer owns the bytes outright and the
//! producer has nothing left to write into. Releasing moves the buffer back
//! before clearing the flag.
//!
//! The slot table sits behind a `parking_lot::RwLock` that is only taken for
//! writing by [`SlotPool::resize_if_needed`], which refuses to run while any
//! slot is in flight. Handles keep an `Arc` to their slot, so releasing never
//! touches the table lock.

use crate::PoolError;
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

struct Slot {
    index: usize,
    in_flight: AtomicBool,
    /// Parked buffer while the slot is free; empty while a handle owns it.
    buffer: Mutex<Vec<u8>>,
}

impl Slot {
    fn new(index: usize, bytes: usize) -> Self {
        Self {
            index,
            in_flight: AtomicBool::new(false),
            buffer: Mutex::new(vec![0u8; bytes]),
        }
    }
}

struct SlotPoolInner {
    slots: RwLock<Vec<Arc<Slot>>>,
    slot_count: usize,
    bytes_per_slot: AtomicUsize,
    /// Next slot index in the rotation.
    cursor: AtomicUsize,
    in_flight: AtomicUsize,
    /// Bumped on every reallocation; stale handles drop their buffer.
    generation: AtomicU64,
    total_acquires: AtomicU64,
    total_releases: AtomicU64,
    busy_rejections: AtomicU64,
    resizes: AtomicU64,
}

/// Snapshot of pool counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolMetrics {
    /// Successful acquisitions since creation.
    pub total_acquires: u64,
    /// Handles returned since creation.
    pub total_releases: u64,
    /// Acquisitions refused because the rotation hit an in-flight slot.
    pub busy_rejections: u64,
    /// Number of reallocations.
    pub resizes: u64,
    /// Slots currently owned by consumers.
    pub in_flight: usize,
}

/// Fixed-size pool of frame buffers handed out in round-robin order.
///
/// Cloning is cheap and yields another handle to the same pool.
#[derive(Clone)]
pub struct SlotPool {
    inner: Arc<SlotPoolInner>,
}

impl SlotPool {
    /// Create an unsized pool with `slot_count` slots.
    ///
    /// No memory is allocated until the first [`resize_if_needed`] call.
    ///
    /// # Panics
    ///
    /// Panics if `slot_count` is 0.
    ///
    /// [`resize_if_needed`]: SlotPool::resize_if_needed
    #[must_use]
    pub fn new(slot_count: usize) -> Self {
        assert!(slot_count > 0, "slot_count must be > 0");

        Self {
            inner: Arc::new(SlotPoolInner {
                slots: RwLock::new(Vec::new()),
                slot_count,
                bytes_per_slot: AtomicUsize::new(0),
                cursor: AtomicUsize::new(0),
                in_flight: AtomicUsize::new(0),
                generation: AtomicU64::new(0),
                total_acquires: AtomicU64::new(0),
                total_releases: AtomicU64::new(0),
                busy_rejections: AtomicU64::new(0),
                resizes: AtomicU64::new(0),
            }),
        }
    }

    /// Create a pool with `slot_count` slots of `bytes_per_slot` bytes each.
    pub fn with_size(slot_count: usize, bytes_per_slot: usize) -> Result<Self, PoolError> {
        let pool = Self::new(slot_count);
        pool.resize_if_needed(bytes_per_slot)?;
        Ok(pool)
    }

    /// Reallocate every slot if `bytes_per_slot` differs from the current
    /// slot size or the pool has never been sized.
    ///
    /// Returns `Ok(true)` when the slots were reallocated and `Ok(false)` when
    /// the current allocation already matches.
    ///
    /// # Errors
    ///
    /// - [`PoolError::ResizeWhileBusy`] if any slot is in flight. Callers must
    ///   drain (wait for release) before changing the frame geometry.
    /// - [`PoolError::ZeroSize`] for a zero byte request.
    pub fn resize_if_needed(&self, bytes_per_slot: usize) -> Result<bool, PoolError> {
        if bytes_per_slot == 0 {
            return Err(PoolError::ZeroSize);
        }

        let mut slots = self.inner.slots.write();
        let current = self.inner.bytes_per_slot.load(Ordering::Acquire);
        if !slots.is_empty() && current == bytes_per_slot {
            return Ok(false);
        }

        let in_flight = self.inner.in_flight.load(Ordering::Acquire);
        if in_flight > 0 {
            warn!(
                in_flight,
                current_bytes = current,
                requested_bytes = bytes_per_slot,
                "Refusing to resize frame pool with slots in flight"
            );
            return Err(PoolError::ResizeWhileBusy { in_flight });
        }

        *slots = (0..self.inner.slot_count)
            .map(|index| Arc::new(Slot::new(index, bytes_per_slot)))
            .collect();
        self.inner.bytes_per_slot.store(bytes_per_slot, Ordering::Release);
        self.inner.cursor.store(0, Ordering::Release);
        self.inner.generation.fetch_add(1, Ordering::AcqRel);
        self.inner.resizes.fetch_add(1, Ordering::Relaxed);

        info!(
            slot_count = self.inner.slot_count,
            old_bytes = current,
            new_bytes = bytes_per_slot,
            total_kb = (self.inner.slot_count * bytes_per_slot) as f64 / 1024.0,
            "Frame pool (re)allocated"
        );

        Ok(true)
    }

    /// Take the next slot in the rotation without blocking.
    ///
    /// # Errors
    ///
    /// - [`PoolError::Busy`] if the next slot is still owned by a consumer.
    ///   The rotation does not advance, so the same slot is tried again next
    ///   time.
    /// - [`PoolError::Unallocated`] if the pool has never been sized.
    pub fn try_acquire(&self) -> Result<SlotHandle, PoolError> {
        let slots = self.inner.slots.read();
        if slots.is_empty() {
            return Err(PoolError::Unallocated);
        }

        let index = self.inner.cursor.load(Ordering::Acquire) % slots.len();
        let slot = &slots[index];

        if slot
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            self.inner.busy_rejections.fetch_add(1, Ordering::Relaxed);
            trace!(slot = index, "Next frame slot still in flight");
            return Err(PoolError::Busy { slot: index });
        }

        // Only the winner of the exchange above moves the cursor.
        let next = (index + 1) % slots.len();
        let _ = self.inner.cursor.compare_exchange(
            index,
            next,
            Ordering::AcqRel,
            Ordering::Relaxed,
        );

        let buffer = std::mem::take(&mut *slot.buffer.lock());
        self.inner.in_flight.fetch_add(1, Ordering::AcqRel);
        self.inner.total_acquires.fetch_add(1, Ordering::Relaxed);

        Ok(SlotHandle {
            pool: Arc::clone(&self.inner),
            slot: Arc::clone(slot),
            buffer,
            len: 0,
            generation: self.inner.generation.load(Ordering::Acquire),
        })
    }

    /// Return a handle to the pool. Equivalent to dropping it.
    pub fn release(&self, handle: SlotHandle) {
        drop(handle);
    }

    /// Number of slots in the pool.
    #[must_use]
    pub fn slot_count(&self) -> usize {
        self.inner.slot_count
    }

    /// Current slot size in bytes (0 before the first resize).
    #[must_use]
    pub fn bytes_per_slot(&self) -> usize {
        self.inner.bytes_per_slot.load(Ordering::Acquire)
    }

    /// Slots currently owned by consumers.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.load(Ordering::Acquire)
    }

    /// Whether the slot at `index` is currently owned by a consumer.
    #[must_use]
    pub fn is_in_flight(&self, index: usize) -> bool {
        self.inner
            .slots
            .read()
            .get(index)
            .is_some_and(|slot| slot.in_flight.load(Ordering::Acquire))
    }

    /// Snapshot of the pool counters.
    #[must_use]
    pub fn metrics(&self) -> PoolMetrics {
        PoolMetrics {
            total_acquires: self.inner.total_acquires.load(Ordering::Relaxed),
            total_releases: self.inner.total_releases.load(Ordering::Relaxed),
            busy_rejections: self.inner.busy_rejections.load(Ordering::Relaxed),
            resizes: self.inner.resizes.load(Ordering::Relaxed),
            in_flight: self.in_flight(),
        }
    }
}

impl std::fmt::Debug for SlotPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlotPool")
            .field("slot_count", &self.slot_count())
            .field("bytes_per_slot", &self.bytes_per_slot())
            .field("in_flight", &self.in_flight())
            .finish()
    }
}

/// Exclusive owner of one pool slot.
///
/// The slot's buffer lives inside the handle until it is dropped, at which
/// point the buffer is parked back in the slot and the slot becomes free.
pub struct SlotHandle {
    pool: Arc<SlotPoolInner>,
    slot: Arc<Slot>,
    buffer: Vec<u8>,
    len: usize,
    generation: u64,
}

impl SlotHandle {
    /// Copy `length` bytes starting at `offset` in `source` into the slot.
    ///
    /// # Errors
    ///
    /// - [`PoolError::SourceOutOfRange`] if `offset + length` exceeds `source`.
    /// - [`PoolError::ExceedsSlot`] if `length` exceeds the slot size.
    pub fn write(&mut self, source: &[u8], offset: usize, length: usize) -> Result<(), PoolError> {
        let range = offset
            .checked_add(length)
            .and_then(|end| source.get(offset..end))
            .ok_or(PoolError::SourceOutOfRange {
                offset,
                length,
                available: source.len(),
            })?;

        let capacity = self.buffer.len();
        let target = self
            .buffer
            .get_mut(..length)
            .ok_or(PoolError::ExceedsSlot { length, capacity })?;

        target.copy_from_slice(range);
        self.len = length;
        Ok(())
    }

    /// Bytes written by the last [`write`](SlotHandle::write).
    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.buffer[..self.len]
    }

    /// Number of valid bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether nothing has been written yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Slot size in bytes.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Index of the owned slot (for diagnostics).
    #[must_use]
    pub fn slot_index(&self) -> usize {
        self.slot.index
    }

    /// Return the slot to its pool.
    pub fn release(self) {
        drop(self);
    }
}

impl std::fmt::Debug for SlotHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlotHandle")
            .field("slot", &self.slot.index)
            .field("len", &self.len)
            .field("capacity", &self.buffer.len())
            .finish()
    }
}

impl AsRef<[u8]> for SlotHandle {
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl Drop for SlotHandle {
    fn drop(&mut self) {
        let buffer = std::mem::take(&mut self.buffer);
        if self.pool.generation.load(Ordering::Acquire) == self.generation {
            *self.slot.buffer.lock() = buffer;
        } else {
            debug!(slot = self.slot.index, "Dropping buffer from a previous pool generation");
        }

        self.slot.in_flight.store(false, Ordering::Release);
        self.pool.in_flight.fetch_sub(1, Ordering::AcqRel);
        self.pool.total_releases.fetch_add(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsized_pool_refuses_acquire() {
        let pool = SlotPool::new(2);
        assert_eq!(pool.try_acquire().unwrap_err(), PoolError::Unallocated);
        assert_eq!(pool.bytes_per_slot(), 0);
    }

    #[test]
    fn test_resize_on_first_use_and_noop_when_unchanged() {
        let pool = SlotPool::new(2);
        assert!(pool.resize_if_needed(32).unwrap());
        assert!(!pool.resize_if_needed(32).unwrap());
        assert!(pool.resize_if_needed(64).unwrap());
        assert_eq!(pool.bytes_per_slot(), 64);
        assert_eq!(pool.metrics().resizes, 2);
    }

    #[test]
    fn test_zero_size_rejected() {
        let pool = SlotPool::new(2);
        assert_eq!(pool.resize_if_needed(0).unwrap_err(), PoolError::ZeroSize);
    }

    #[test]
    fn test_round_robin_order() {
        let pool = SlotPool::with_size(3, 8).unwrap();

        let order: Vec<usize> = (0..6)
            .map(|_| pool.try_acquire().unwrap().slot_index())
            .collect();

        assert_eq!(order, vec![0, 1, 2, 0, 1, 2]);
    }

    #[test]
    fn test_busy_when_next_slot_in_flight() {
        let pool = SlotPool::with_size(2, 8).unwrap();

        let first = pool.try_acquire().unwrap();
        let second = pool.try_acquire().unwrap();
        assert_eq!(first.slot_index(), 0);
        assert_eq!(second.slot_index(), 1);

        // Slot 1 comes free but the rotation points at slot 0.
        drop(second);
        assert_eq!(pool.try_acquire().unwrap_err(), PoolError::Busy { slot: 0 });
        assert_eq!(pool.metrics().busy_rejections, 1);

        drop(first);
        assert_eq!(pool.try_acquire().unwrap().slot_index(), 0);
    }

    #[test]
    fn test_resize_while_busy_fails() {
        let pool = SlotPool::with_size(2, 8).unwrap();
        let held = pool.try_acquire().unwrap();

        assert_eq!(
            pool.resize_if_needed(16).unwrap_err(),
            PoolError::ResizeWhileBusy { in_flight: 1 }
        );
        assert_eq!(pool.bytes_per_slot(), 8);

        pool.release(held);
        assert!(pool.resize_if_needed(16).unwrap());
    }

    #[test]
    fn test_write_copies_frame_at_offset() {
        let pool = SlotPool::with_size(2, 4).unwrap();
        let source: Vec<u8> = (0..12).collect();

        let mut handle = pool.try_acquire().unwrap();
        assert!(handle.is_empty());
        handle.write(&source, 8, 4).unwrap();

        assert_eq!(handle.as_slice(), &[8, 9, 10, 11]);
        assert_eq!(handle.len(), 4);
        assert_eq!(handle.capacity(), 4);
    }

    #[test]
    fn test_write_out_of_range_is_an_error() {
        let pool = SlotPool::with_size(1, 4).unwrap();
        let source = [0u8; 6];
        let mut handle = pool.try_acquire().unwrap();

        assert_eq!(
            handle.write(&source, 4, 4).unwrap_err(),
            PoolError::SourceOutOfRange {
                offset: 4,
                length: 4,
                available: 6
            }
        );
        assert_eq!(
            handle.write(&[0u8; 16], 0, 8).unwrap_err(),
            PoolError::ExceedsSlot {
                length: 8,
                capacity: 4
            }
        );
        assert!(handle.is_empty());
    }

    #[test]
    fn test_buffer_survives_release_cycle() {
        let pool = SlotPool::with_size(1, 4).unwrap();

        let mut handle = pool.try_acquire().unwrap();
        handle.write(&[1, 2, 3, 4], 0, 4).unwrap();
        handle.release();

        let handle = pool.try_acquire().unwrap();
        assert_eq!(handle.capacity(), 4);
        assert_eq!(pool.in_flight(), 1);
        drop(handle);

        let metrics = pool.metrics();
        assert_eq!(metrics.total_acquires, 2);
        assert_eq!(metrics.total_releases, 2);
        assert_eq!(metrics.in_flight, 0);
    }

    #[test]
    fn test_handle_crosses_threads() {
        let pool = SlotPool::with_size(2, 4).unwrap();
        let mut handle = pool.try_acquire().unwrap();
        handle.write(&[9, 9, 9, 9], 0, 4).unwrap();
        assert!(pool.is_in_flight(0));

        let sum = std::thread::spawn(move || {
            let sum: u32 = handle.as_slice().iter().map(|&b| u32::from(b)).sum();
            drop(handle);
            sum
        })
        .join()
        .unwrap();

        assert_eq!(sum, 36);
        assert!(!pool.is_in_flight(0));
    }
}
