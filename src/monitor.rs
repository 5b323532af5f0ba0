//! The signal monitor pipeline.
//!
//! [`SignalMonitor`] ties the pieces together: per-stream selection and slot
//! pools on the producer side, one statistics worker behind the
//! [`Dispatcher`], and configuration cells shared with the control context.
//!
//! # Producer path
//!
//! For every notification on the active stream:
//!
//! 1. [`FrameSelector::observe`] validates the geometry and sample width
//!    (nothing is allocated for an unsupported width), announces new bounds,
//!    clamps the selection and applies the buffer filter and decimation.
//! 2. If the worker is busy the frame is dropped and counted as lost.
//! 3. The stream's pool is resized to the frame size if needed, a slot is
//!    acquired (busy slot means lost frame) and the target frame copied.
//! 4. The slot is submitted to the worker, which computes the statistics with
//!    the ROI and metric current at that moment and publishes the result.
//!
//! Nothing on this path blocks or panics; failures become events.

use crate::cell::ConfigCell;
use crate::config::PipelineConfig;
use crate::dispatch::{Dispatcher, FrameJob, FrameProcessor, LostFrame, LostFrameCounter};
use crate::error::{MonitorError, MonitorResult};
use crate::events::{EventBus, MonitorEvent};
use crate::frame::{FrameDescriptor, StreamSource};
use crate::roi::RegionOfInterest;
use crate::selection::{FrameSelector, SelectionState, ALL_BUFFERS};
use crate::settings::MonitorSettings;
use crate::stats::{self, MetricKind};
use frame_pool::{PoolError, PoolMetrics, SlotPool};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, trace};

/// What happened to one notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Pipeline disabled or notification for the inactive stream.
    Ignored,
    /// Filtered out by the buffer filter or decimation.
    Skipped,
    /// Copied and handed to the worker.
    Dispatched,
    /// Dropped because the worker or the next slot was busy.
    Lost,
    /// Aborted with an error event.
    Failed,
}

/// Computes statistics for every job with the latest ROI and metric.
pub struct StatisticsProcessor {
    roi: Arc<ConfigCell<RegionOfInterest>>,
    metric: Arc<ConfigCell<MetricKind>>,
    events: EventBus,
}

impl StatisticsProcessor {
    /// Processor reading the shared ROI and metric cells.
    #[must_use]
    pub fn new(
        roi: Arc<ConfigCell<RegionOfInterest>>,
        metric: Arc<ConfigCell<MetricKind>>,
        events: EventBus,
    ) -> Self {
        Self { roi, metric, events }
    }
}

impl FrameProcessor for StatisticsProcessor {
    fn process(&mut self, job: &FrameJob) {
        // One snapshot per computation.
        let roi = self.roi.get();
        let metric = self.metric.get();
        let d = &job.descriptor;

        match stats::compute(
            job.data(),
            d.sample_width_bits,
            d.samples_per_line,
            d.lines_per_frame,
            roi,
            metric,
        ) {
            Ok(output) => {
                self.events
                    .metric(job.stream, output.kind, output.value, output.statistics);
            }
            Err(e) => self.events.error(e.to_string()),
        }
    }
}

struct StreamPipeline {
    selector: Mutex<FrameSelector>,
    pool: SlotPool,
    lost: LostFrameCounter,
}

impl StreamPipeline {
    fn new(config: &PipelineConfig) -> Self {
        Self {
            selector: Mutex::new(FrameSelector::new()),
            pool: SlotPool::new(config.slots_per_stream),
            lost: LostFrameCounter::with_limit(config.lost_frame_limit),
        }
    }
}

/// Frame-statistics monitor for the raw and processed acquisition streams.
pub struct SignalMonitor {
    streams: [StreamPipeline; 2],
    enabled: AtomicBool,
    roi: Arc<ConfigCell<RegionOfInterest>>,
    metric: Arc<ConfigCell<MetricKind>>,
    selection: ConfigCell<SelectionState>,
    visible_samples: AtomicU32,
    events: EventBus,
    dispatcher: Dispatcher,
}

impl SignalMonitor {
    /// Monitor with default pipeline settings.
    ///
    /// # Errors
    ///
    /// Fails if the worker thread cannot be spawned.
    pub fn new() -> MonitorResult<Self> {
        Self::with_config(&PipelineConfig::default())
    }

    /// # Errors
    ///
    /// [`MonitorError::Configuration`] for a zero slot count or event
    /// capacity, [`MonitorError::Io`] if the worker cannot be spawned.
    pub fn with_config(config: &PipelineConfig) -> MonitorResult<Self> {
        Self::with_processor(config, |statistics| statistics)
    }

    /// Like [`Self::with_config`], with the worker's [`StatisticsProcessor`]
    /// passed through `wrap` first (instrumentation, throttling in tests).
    ///
    /// # Errors
    ///
    /// Same as [`Self::with_config`].
    pub fn with_processor<P, F>(config: &PipelineConfig, wrap: F) -> MonitorResult<Self>
    where
        P: FrameProcessor,
        F: FnOnce(StatisticsProcessor) -> P,
    {
        config.validate().map_err(MonitorError::Configuration)?;

        let events = EventBus::new(config.event_capacity);
        let roi = Arc::new(ConfigCell::new(RegionOfInterest::default()));
        let metric = Arc::new(ConfigCell::new(MetricKind::default()));

        let processor = StatisticsProcessor::new(Arc::clone(&roi), Arc::clone(&metric), events.clone());
        let dispatcher = Dispatcher::spawn(wrap(processor))?;

        info!(
            slots_per_stream = config.slots_per_stream,
            event_capacity = config.event_capacity,
            lost_frame_limit = config.lost_frame_limit,
            "Created signal monitor"
        );

        Ok(Self {
            streams: [StreamPipeline::new(config), StreamPipeline::new(config)],
            enabled: AtomicBool::new(true),
            roi,
            metric,
            selection: ConfigCell::new(SelectionState::default()),
            visible_samples: AtomicU32::new(crate::settings::DEFAULT_VISIBLE_SAMPLES),
            events,
            dispatcher,
        })
    }

    // =========================================================================
    // Frame notifications
    // =========================================================================

    /// Handle one acquisition buffer of `stream`.
    ///
    /// `data` is the whole buffer; the frame at the selected index is copied
    /// out. Returns immediately; results arrive as events.
    pub fn on_frame_batch(&self, stream: StreamSource, data: &[u8], descriptor: &FrameDescriptor) -> FrameOutcome {
        if !self.is_enabled() || self.selection.get().stream_source != stream {
            return FrameOutcome::Ignored;
        }
        let pipeline = &self.streams[stream.index()];

        let outcome = {
            let mut selector = pipeline.selector.lock();
            match selector.observe(descriptor, &self.selection) {
                Ok(outcome) => outcome,
                Err(e) => {
                    self.events.error(e.to_string());
                    return FrameOutcome::Failed;
                }
            }
        };

        for bound in outcome.bounds {
            self.events.bounds_changed(stream, bound);
        }

        let Some(frame_index) = outcome.frame_index else {
            return FrameOutcome::Skipped;
        };

        if self.dispatcher.is_busy() {
            self.record_lost(stream, pipeline);
            return FrameOutcome::Lost;
        }

        let bytes_per_frame = descriptor.bytes_per_frame();
        if let Err(e) = pipeline.pool.resize_if_needed(bytes_per_frame) {
            self.events.error(MonitorError::from(e).to_string());
            return FrameOutcome::Failed;
        }

        let mut slot = match pipeline.pool.try_acquire() {
            Ok(slot) => slot,
            Err(PoolError::Busy { slot }) => {
                trace!(%stream, slot, "Next slot still in flight");
                self.record_lost(stream, pipeline);
                return FrameOutcome::Lost;
            }
            Err(e) => {
                self.events.error(MonitorError::from(e).to_string());
                return FrameOutcome::Failed;
            }
        };

        if let Err(e) = slot.write(data, descriptor.frame_offset(frame_index), bytes_per_frame) {
            self.events.error(MonitorError::from(e).to_string());
            return FrameOutcome::Failed;
        }

        let job = FrameJob {
            slot,
            descriptor: *descriptor,
            stream,
        };
        if self.dispatcher.submit(job) {
            debug!(%stream, frame_index, "Dispatched frame");
            FrameOutcome::Dispatched
        } else {
            self.record_lost(stream, pipeline);
            FrameOutcome::Lost
        }
    }

    /// Shorthand for [`Self::on_frame_batch`] on the raw stream.
    pub fn on_raw_frames(&self, data: &[u8], descriptor: &FrameDescriptor) -> FrameOutcome {
        self.on_frame_batch(StreamSource::Raw, data, descriptor)
    }

    /// Shorthand for [`Self::on_frame_batch`] on the processed stream.
    pub fn on_processed_frames(&self, data: &[u8], descriptor: &FrameDescriptor) -> FrameOutcome {
        self.on_frame_batch(StreamSource::Processed, data, descriptor)
    }

    fn record_lost(&self, stream: StreamSource, pipeline: &StreamPipeline) {
        match pipeline.lost.record() {
            LostFrame::Counted(total) => {
                self.events
                    .info(format!("{stream} frames lost: {total}"));
            }
            LostFrame::Overflowed(total) => {
                self.events
                    .info(format!("{stream} frames lost: {total}"));
                self.events.info(format!(
                    "{stream} lost frame counter overflow, counter reset to 0"
                ));
            }
        }
    }

    // =========================================================================
    // Configuration
    // =========================================================================

    /// Replace the ROI; takes effect on the next computation.
    pub fn set_roi(&self, roi: RegionOfInterest) {
        self.roi.store(roi);
        self.events.info(roi.to_string());
    }

    /// Current ROI.
    #[must_use]
    pub fn roi(&self) -> RegionOfInterest {
        self.roi.get()
    }

    /// Select the emitted metric; takes effect on the next computation.
    pub fn set_metric(&self, metric: MetricKind) {
        self.metric.store(metric);
        debug!(%metric, "Metric changed");
    }

    /// Current metric.
    #[must_use]
    pub fn metric(&self) -> MetricKind {
        self.metric.get()
    }

    /// Sample every `factor`-th notification; 0 is treated as 1.
    pub fn set_decimation_factor(&self, factor: u32) {
        self.selection.update(|s| s.decimation_factor = factor.max(1));
    }

    /// Takes effect on the next notification, clamped to its bounds.
    pub fn set_target_frame_index(&self, index: u32) {
        self.selection.update(|s| s.target_frame_index = index);
    }

    /// Buffer to sample, [`ALL_BUFFERS`] (-1) for every buffer.
    pub fn set_target_buffer_index(&self, index: i64) {
        self.selection
            .update(|s| s.target_buffer_index = index.max(ALL_BUFFERS));
    }

    /// Switch the monitored stream.
    pub fn set_stream_source(&self, stream: StreamSource) {
        self.selection.update(|s| s.stream_source = stream);
        debug!(%stream, "Stream source changed");
    }

    /// Current selection, including clamped indices.
    #[must_use]
    pub fn selection(&self) -> SelectionState {
        self.selection.get()
    }

    /// A disabled pipeline ignores notifications without counting them.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
        info!(enabled, "Signal monitor toggled");
    }

    /// Whether notifications are processed.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Width of the scrolling display, persisted with the settings.
    pub fn set_visible_samples(&self, samples: u32) {
        self.visible_samples.store(samples, Ordering::Relaxed);
    }

    /// Width of the scrolling display.
    #[must_use]
    pub fn visible_samples(&self) -> u32 {
        self.visible_samples.load(Ordering::Relaxed)
    }

    /// Current persisted state.
    #[must_use]
    pub fn settings(&self) -> MonitorSettings {
        let selection = self.selection();
        let mut settings = MonitorSettings {
            stream_source: selection.stream_source,
            metric: self.metric(),
            target_frame_index: selection.target_frame_index,
            target_buffer_index: selection.target_buffer_index,
            decimation_factor: selection.decimation_factor,
            visible_samples: self.visible_samples(),
            ..MonitorSettings::default()
        };
        settings.set_roi(self.roi());
        settings
    }

    /// Restore persisted state.
    pub fn apply_settings(&self, settings: &MonitorSettings) {
        self.selection.store(settings.selection());
        self.metric.store(settings.metric);
        self.set_visible_samples(settings.visible_samples);
        self.set_roi(settings.roi());
    }

    // =========================================================================
    // Observation
    // =========================================================================

    /// Receiver for every event published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<MonitorEvent> {
        self.events.subscribe()
    }

    /// Frames dropped on `stream` since the last counter reset.
    #[must_use]
    pub fn lost_frames(&self, stream: StreamSource) -> u32 {
        self.streams[stream.index()].lost.get()
    }

    /// Slot pool counters of `stream`.
    #[must_use]
    pub fn pool_metrics(&self, stream: StreamSource) -> PoolMetrics {
        self.streams[stream.index()].pool.metrics()
    }

    /// Whether the worker is computing right now.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.dispatcher.is_busy()
    }

    /// Frames the worker has finished.
    #[must_use]
    pub fn processed_frames(&self) -> u64 {
        self.dispatcher.processed()
    }
}

impl std::fmt::Debug for SignalMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalMonitor")
            .field("enabled", &self.is_enabled())
            .field("roi", &self.roi())
            .field("metric", &self.metric())
            .field("selection", &self.selection())
            .field("dispatcher", &self.dispatcher)
            .finish()
    }
}
