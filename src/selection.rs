//! Frame selection and throttling.
//!
//! The acquisition host notifies the monitor for every buffer it produces,
//! far more often than a scrolling plot needs. [`FrameSelector`] decides per
//! notification whether one frame of that buffer is sampled:
//!
//! 1. The descriptor is validated (`InvalidDimensions` or
//!    `UnsupportedSampleWidth` aborts the frame).
//! 2. New `frames_per_buffer` / `buffers_per_volume` values produce one
//!    [`Bound`] notification each, before the frame is used.
//! 3. The target frame and buffer indices are clamped to the new bounds and
//!    written back into the shared [`SelectionState`].
//! 4. Buffers other than the target buffer are skipped without touching the
//!    decimation counter, on both streams and before any copy is made.
//! 5. Only every `decimation_factor`-th remaining notification is sampled.

use crate::cell::ConfigCell;
use crate::error::MonitorResult;
use crate::events::Bound;
use crate::frame::{FrameDescriptor, StreamSource};
use serde::{Deserialize, Serialize};

/// `target_buffer_index` value selecting every buffer of a volume.
pub const ALL_BUFFERS: i64 = -1;

/// User-controlled sampling filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionState {
    /// Sample every Nth notification (>= 1).
    pub decimation_factor: u32,
    /// Frame within the acquisition buffer to copy.
    pub target_frame_index: u32,
    /// Buffer within the volume to sample, or [`ALL_BUFFERS`].
    pub target_buffer_index: i64,
    /// Stream whose notifications are processed.
    pub stream_source: StreamSource,
}

impl Default for SelectionState {
    fn default() -> Self {
        Self {
            decimation_factor: 10,
            target_frame_index: 0,
            target_buffer_index: ALL_BUFFERS,
            stream_source: StreamSource::Raw,
        }
    }
}

impl SelectionState {
    /// Clamp the frame index into `[0, frames_per_buffer - 1]` and the buffer
    /// index into `[-1, buffers_per_volume - 1]`.
    pub fn clamp_to(&mut self, descriptor: &FrameDescriptor) {
        self.target_frame_index = self.target_frame_index.min(descriptor.max_frame_index());
        self.target_buffer_index = self
            .target_buffer_index
            .min(descriptor.max_buffer_index())
            .max(ALL_BUFFERS);
        self.decimation_factor = self.decimation_factor.max(1);
    }

    /// Whether the buffer filter lets `descriptor` through.
    #[inline]
    #[must_use]
    pub fn accepts_buffer(&self, descriptor: &FrameDescriptor) -> bool {
        self.target_buffer_index == ALL_BUFFERS
            || i64::from(descriptor.current_buffer_index) == self.target_buffer_index
    }
}

/// Buffer filter plus decimation for one notification.
///
/// Returns whether the frame is sampled and the updated decimation counter.
/// Buffers rejected by the filter leave the counter untouched.
#[must_use]
pub fn should_sample(descriptor: &FrameDescriptor, selection: &SelectionState, counter: u32) -> (bool, u32) {
    if !selection.accepts_buffer(descriptor) {
        return (false, counter);
    }

    let counter = counter.saturating_add(1);
    if counter < selection.decimation_factor.max(1) {
        return (false, counter);
    }
    (true, 0)
}

/// Outcome of [`FrameSelector::observe`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorOutcome {
    /// Bound changes to announce before processing this frame.
    pub bounds: Vec<Bound>,
    /// Frame to copy, `None` if the notification is skipped.
    pub frame_index: Option<u32>,
}

/// Per-stream selection state: decimation counter and last seen bounds.
#[derive(Debug, Default)]
pub struct FrameSelector {
    counter: u32,
    frames_per_buffer: Option<u32>,
    buffers_per_volume: Option<u32>,
}

impl FrameSelector {
    /// Selector with no bounds seen yet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current decimation counter.
    #[must_use]
    pub fn counter(&self) -> u32 {
        self.counter
    }

    /// Run the selection steps for one notification.
    ///
    /// # Errors
    ///
    /// [`crate::MonitorError::InvalidDimensions`] or
    /// [`crate::MonitorError::UnsupportedSampleWidth`] if the descriptor
    /// violates the geometry invariants. Nothing else is updated in that case.
    pub fn observe(
        &mut self,
        descriptor: &FrameDescriptor,
        selection: &ConfigCell<SelectionState>,
    ) -> MonitorResult<SelectorOutcome> {
        descriptor.validate()?;

        let mut bounds = Vec::new();
        if self.frames_per_buffer != Some(descriptor.frames_per_buffer) {
            self.frames_per_buffer = Some(descriptor.frames_per_buffer);
            bounds.push(Bound::MaxFrameIndex(descriptor.max_frame_index()));
        }
        if self.buffers_per_volume != Some(descriptor.buffers_per_volume) {
            self.buffers_per_volume = Some(descriptor.buffers_per_volume);
            bounds.push(Bound::MaxBufferIndex(descriptor.max_buffer_index()));
        }

        let current = selection.get();
        let mut clamped = current;
        clamped.clamp_to(descriptor);
        if clamped != current {
            tracing::debug!(?current, ?clamped, "Clamped selection to frame bounds");
            selection.update(|state| state.clamp_to(descriptor));
        }

        let (accepted, counter) = should_sample(descriptor, &clamped, self.counter);
        self.counter = counter;

        Ok(SelectorOutcome {
            bounds,
            frame_index: accepted.then_some(clamped.target_frame_index),
        })
    }
}
