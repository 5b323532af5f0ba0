//! Outbound events for the display/UI collaborator.
//!
//! Everything the pipeline wants to tell the outside world goes through the
//! [`EventBus`]: computed metrics, informational and error diagnostics, and
//! selection bound changes. The bus is a `tokio::sync::broadcast` channel, so
//! publishing never blocks the producer or the worker; a subscriber that
//! falls behind loses the oldest events and sees `RecvError::Lagged`.
//!
//! Every event is also logged through `tracing` at a matching level.

use crate::frame::StreamSource;
use crate::stats::{MetricKind, Statistics};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, error, info};

/// Default broadcast capacity.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// New selection bound observed on a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Bound {
    /// `frames_per_buffer - 1`
    MaxFrameIndex(u32),
    /// `buffers_per_volume - 1` (`-1` if the volume size is zero)
    MaxBufferIndex(i64),
}

/// Notification published on the [`EventBus`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum MonitorEvent {
    /// One successfully computed frame.
    Metric {
        /// Stream the frame came from.
        stream: StreamSource,
        /// Selected metric.
        kind: MetricKind,
        /// Value of the selected metric.
        value: f64,
        /// All statistics of the frame.
        statistics: Statistics,
    },
    /// Diagnostic such as lost frames or a changed ROI.
    Info(String),
    /// A frame could not be processed.
    Error(String),
    /// New selection bound for the control surface.
    BoundsChanged {
        /// Stream the bound belongs to.
        stream: StreamSource,
        /// The new bound.
        bound: Bound,
    },
}

/// Broadcast hub for [`MonitorEvent`]s.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<MonitorEvent>,
}

impl EventBus {
    /// # Panics
    ///
    /// Panics if `capacity` is 0.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// New receiver that sees every event published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<MonitorEvent> {
        self.tx.subscribe()
    }

    /// Publish a computed metric.
    pub fn metric(&self, stream: StreamSource, kind: MetricKind, value: f64, statistics: Statistics) {
        debug!(%stream, %kind, value, pixels = statistics.pixels, "Metric computed");
        self.publish(MonitorEvent::Metric {
            stream,
            kind,
            value,
            statistics,
        });
    }

    /// Publish an informational message.
    pub fn info(&self, message: impl Into<String>) {
        let message = message.into();
        info!(target: "signal_monitor::events", "{message}");
        self.publish(MonitorEvent::Info(message));
    }

    /// Publish an error message.
    pub fn error(&self, message: impl Into<String>) {
        let message = message.into();
        error!(target: "signal_monitor::events", "{message}");
        self.publish(MonitorEvent::Error(message));
    }

    /// Publish a selection bound change.
    pub fn bounds_changed(&self, stream: StreamSource, bound: Bound) {
        info!(%stream, ?bound, "Selection bounds changed");
        self.publish(MonitorEvent::BoundsChanged { stream, bound });
    }

    fn publish(&self, event: MonitorEvent) {
        // No subscribers is fine: events are fire-and-forget.
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.tx.receiver_count())
            .finish()
    }
}
