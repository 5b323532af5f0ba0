//! Scrolling metric history.
//!
//! Headless model of the scrolling plot: metric values are appended with a
//! running sample number, the newest `visible_points` form the visible
//! window, and the whole history restarts once `max_points` is exceeded.

#[cfg(feature = "storage_csv")]
use crate::error::MonitorResult;
use crate::events::MonitorEvent;
use crate::frame::StreamSource;
use serde::Serialize;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, warn};

/// Stored points before the history restarts.
pub const DEFAULT_MAX_POINTS: usize = 1_000_000;
/// Points shown in the scrolling window.
pub const DEFAULT_VISIBLE_POINTS: usize = 512;

/// CSV header written by [`MetricHistory::export_csv`].
#[cfg(feature = "storage_csv")]
pub const CSV_HEADER: [&str; 2] = ["Sample Number", "Sample Value"];

/// One plotted value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HistoryPoint {
    /// Running sample number (x axis).
    pub sample: u64,
    /// Metric value (y axis).
    pub value: f64,
}

/// Metric values in arrival order with running sample numbers.
#[derive(Debug, Clone)]
pub struct MetricHistory {
    points: Vec<HistoryPoint>,
    counter: u64,
    max_points: usize,
    visible_points: usize,
}

impl Default for MetricHistory {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_POINTS, DEFAULT_VISIBLE_POINTS)
    }
}

impl MetricHistory {
    /// Both sizes are raised to at least 1.
    #[must_use]
    pub fn new(max_points: usize, visible_points: usize) -> Self {
        Self {
            points: Vec::new(),
            counter: 0,
            max_points: max_points.max(1),
            visible_points: visible_points.max(1),
        }
    }

    /// Append a value and return its sample number.
    ///
    /// When the counter passes `max_points` the history is cleared first and
    /// the new value gets sample number 0.
    pub fn push(&mut self, value: f64) -> u64 {
        self.counter += 1;
        if self.counter > self.max_points as u64 {
            debug!(max_points = self.max_points, "History full, restarting");
            self.clear();
        }
        self.points.push(HistoryPoint {
            sample: self.counter,
            value,
        });
        self.counter
    }

    /// Drop every point and restart numbering.
    pub fn clear(&mut self) {
        self.points.clear();
        self.counter = 0;
    }

    /// Stored points.
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether no point is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Every stored point, oldest first.
    #[must_use]
    pub fn points(&self) -> &[HistoryPoint] {
        &self.points
    }

    /// The newest `visible_points` entries.
    #[must_use]
    pub fn visible(&self) -> &[HistoryPoint] {
        let start = self.points.len().saturating_sub(self.visible_points);
        &self.points[start..]
    }

    /// Size of the scrolling window.
    #[must_use]
    pub fn visible_points(&self) -> usize {
        self.visible_points
    }

    /// Resize the scrolling window (at least 1).
    pub fn set_visible_points(&mut self, visible_points: usize) {
        self.visible_points = visible_points.max(1);
    }

    /// Capacity before the history restarts.
    #[must_use]
    pub fn max_points(&self) -> usize {
        self.max_points
    }

    /// Y-axis range: min and max of the stored values widened by 10 % of
    /// their span on each side. `None` when empty.
    #[must_use]
    pub fn value_range(&self) -> Option<(f64, f64)> {
        let (min, max) = self
            .points
            .iter()
            .map(|p| p.value)
            .filter(|v| v.is_finite())
            .fold(None, |acc: Option<(f64, f64)>, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })?;
        let padding = (max - min) * 0.1;
        Some((min - padding, max + padding))
    }

    /// Append the value of a metric event; other events are ignored.
    ///
    /// With `stream` set, metrics of the other stream are ignored as well.
    pub fn record(&mut self, event: &MonitorEvent, stream: Option<StreamSource>) -> bool {
        match event {
            MonitorEvent::Metric { stream: s, value, .. } if stream.map_or(true, |want| want == *s) => {
                self.push(*value);
                true
            }
            _ => false,
        }
    }

    /// Drain metric events until the bus closes. Returns the number of
    /// points appended.
    pub async fn follow(
        &mut self,
        receiver: &mut broadcast::Receiver<MonitorEvent>,
        stream: Option<StreamSource>,
    ) -> usize {
        let mut appended = 0;
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    if self.record(&event, stream) {
                        appended += 1;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "History fell behind the event bus");
                }
                Err(RecvError::Closed) => break,
            }
        }
        appended
    }

    /// Write all points as `;`-separated CSV with a header row.
    ///
    /// # Errors
    ///
    /// Propagates writer failures.
    #[cfg(feature = "storage_csv")]
    pub fn export_csv<W: std::io::Write>(&self, writer: W) -> MonitorResult<()> {
        let mut csv = csv::WriterBuilder::new()
            .delimiter(b';')
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(writer);
        csv.write_record(CSV_HEADER)?;
        for point in &self.points {
            csv.write_record([point.sample.to_string(), point.value.to_string()])?;
        }
        csv.flush()?;
        Ok(())
    }

    /// [`Self::export_csv`] into a new file at `path`.
    ///
    /// # Errors
    ///
    /// File creation or write failures.
    #[cfg(feature = "storage_csv")]
    pub fn save_csv<P: AsRef<std::path::Path>>(&self, path: P) -> MonitorResult<()> {
        let file = std::fs::File::create(path.as_ref())?;
        self.export_csv(std::io::BufWriter::new(file))?;
        debug!(path = %path.as_ref().display(), points = self.points.len(), "Exported history");
        Ok(())
    }
}
