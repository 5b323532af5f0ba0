//! Fixed-size frame slot pool with exclusive ownership handoff.
//!
//! The signal monitor copies one frame out of every sampled acquisition
//! buffer before handing it to the statistics worker. The acquisition
//! callback must never block and must never write into memory the worker is
//! still reading, so the copy target comes from a [`SlotPool`]:
//!
//! - A fixed number of slots (two per stream by default), each one byte
//!   buffer of exactly `bytes_per_frame` bytes.
//! - Slots are handed out in round-robin order. If the next slot in the
//!   rotation is still owned by a consumer, [`SlotPool::try_acquire`] returns
//!   [`PoolError::Busy`] instead of overwriting live data.
//! - A [`SlotHandle`] owns its slot's buffer exclusively. Dropping (or
//!   explicitly releasing) the handle returns the buffer and marks the slot
//!   free again.
//! - [`SlotPool::resize_if_needed`] reallocates every slot when the frame
//!   geometry changes, and refuses with [`PoolError::ResizeWhileBusy`] while
//!   any slot is in flight.
//!
//! # Slot lifecycle
//!
//! ```text
//!   resize_if_needed()        try_acquire()            drop / release()
//!  ───────────────────▶ Free ───────────────▶ InFlight ─────────────────▶ Free
//!                        ▲                      │
//!                        └──── Busy if the ─────┘
//!                             rotation hits it
//! ```
//!
//! # Example
//!
//! ```
//! use frame_pool::{PoolError, SlotPool};
//!
//! let pool = SlotPool::new(2);
//! pool.resize_if_needed(16).unwrap();
//!
//! let source = [7u8; 64];
//! let mut first = pool.try_acquire().unwrap();
//! first.write(&source, 16, 16).unwrap();
//! let second = pool.try_acquire().unwrap();
//!
//! // Both slots are in flight: the rotation is back at slot 0.
//! assert!(matches!(pool.try_acquire(), Err(PoolError::Busy { slot: 0 })));
//!
//! drop(first);
//! assert_eq!(pool.try_acquire().unwrap().slot_index(), 0);
//! # drop(second);
//! ```

pub mod slot_pool;

pub use slot_pool::{PoolMetrics, SlotHandle, SlotPool};

use thiserror::Error;

/// Default number of slots per pool.
pub const DEFAULT_SLOT_COUNT: usize = 2;

/// Errors raised by [`SlotPool`] operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    /// The next slot in the rotation is still owned by a consumer.
    #[error("slot {slot} is still in flight")]
    Busy {
        /// Index of the slot the rotation is waiting on.
        slot: usize,
    },

    /// A resize was requested while at least one slot was in flight.
    #[error("cannot resize pool while {in_flight} slot(s) are in flight")]
    ResizeWhileBusy {
        /// Number of slots currently owned by consumers.
        in_flight: usize,
    },

    /// The pool has not been sized yet.
    #[error("pool slots have not been allocated")]
    Unallocated,

    /// A zero byte slot size was requested.
    #[error("slot size must be greater than zero")]
    ZeroSize,

    /// The requested source range lies outside the source buffer.
    #[error("source range of {length} bytes at offset {offset} exceeds source length {available}")]
    SourceOutOfRange {
        /// Start of the requested range.
        offset: usize,
        /// Number of bytes requested.
        length: usize,
        /// Length of the source buffer.
        available: usize,
    },

    /// The write would not fit into the slot.
    #[error("write of {length} bytes exceeds slot capacity {capacity}")]
    ExceedsSlot {
        /// Number of bytes requested.
        length: usize,
        /// Slot size in bytes.
        capacity: usize,
    },
}
