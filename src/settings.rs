//! Persisted user settings.
//!
//! The host application keeps user choices in its own key/value store. The
//! monitor only defines the record and the keys; where and how the values are
//! written is up to the [`SettingsStore`] implementation.

use crate::error::MonitorResult;
use crate::frame::StreamSource;
use crate::roi::RegionOfInterest;
use crate::selection::{SelectionState, ALL_BUFFERS};
use crate::stats::MetricKind;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Default number of points shown in the scrolling plot.
pub const DEFAULT_VISIBLE_SAMPLES: u32 = 512;

/// Snapshot of every persisted user choice.
///
/// Field keys match the host's settings keys. Missing keys take their
/// defaults, so partially populated stores load fine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorSettings {
    /// Monitored stream.
    #[serde(rename = "image_source")]
    pub stream_source: StreamSource,
    /// Emitted metric.
    pub metric: MetricKind,
    /// Frame within the buffer.
    #[serde(rename = "frame_number")]
    pub target_frame_index: u32,
    /// Buffer within the volume, -1 for all.
    #[serde(rename = "buffer_number")]
    pub target_buffer_index: i64,
    /// Sample every Nth notification.
    #[serde(rename = "nth_buffer_to_use")]
    pub decimation_factor: u32,
    /// ROI first column.
    pub roi_x: i32,
    /// ROI first line.
    pub roi_y: i32,
    /// ROI width.
    pub roi_width: u32,
    /// ROI height.
    pub roi_height: u32,
    /// Width of the scrolling display.
    pub visible_samples: u32,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        let selection = SelectionState::default();
        let roi = RegionOfInterest::default();
        Self {
            stream_source: selection.stream_source,
            metric: MetricKind::default(),
            target_frame_index: selection.target_frame_index,
            target_buffer_index: ALL_BUFFERS,
            decimation_factor: selection.decimation_factor,
            roi_x: roi.x,
            roi_y: roi.y,
            roi_width: roi.width,
            roi_height: roi.height,
            visible_samples: DEFAULT_VISIBLE_SAMPLES,
        }
    }
}

impl MonitorSettings {
    /// ROI assembled from the four `roi_*` keys.
    #[must_use]
    pub fn roi(&self) -> RegionOfInterest {
        RegionOfInterest::new(self.roi_x, self.roi_y, self.roi_width, self.roi_height)
    }

    /// Split `roi` into the four `roi_*` keys.
    pub fn set_roi(&mut self, roi: RegionOfInterest) {
        self.roi_x = roi.x;
        self.roi_y = roi.y;
        self.roi_width = roi.width;
        self.roi_height = roi.height;
    }

    /// Selection filters, with the decimation factor raised to at least 1.
    #[must_use]
    pub fn selection(&self) -> SelectionState {
        SelectionState {
            decimation_factor: self.decimation_factor.max(1),
            target_frame_index: self.target_frame_index,
            target_buffer_index: self.target_buffer_index.max(ALL_BUFFERS),
            stream_source: self.stream_source,
        }
    }

    /// Flatten into a key/value map.
    ///
    /// # Errors
    ///
    /// Propagates `serde_json` failures.
    pub fn to_map(&self) -> MonitorResult<Map<String, Value>> {
        Ok(serde_json::from_value(serde_json::to_value(self)?)?)
    }

    /// Rebuild from a key/value map; unknown keys are ignored.
    ///
    /// # Errors
    ///
    /// Fails if a known key holds a value of the wrong type.
    pub fn from_map(map: Map<String, Value>) -> MonitorResult<Self> {
        Ok(serde_json::from_value(Value::Object(map))?)
    }
}

/// Backend that persists [`MonitorSettings`].
pub trait SettingsStore: Send + Sync {
    /// Stored settings, or `None` if nothing was saved yet.
    fn load(&self) -> MonitorResult<Option<MonitorSettings>>;

    /// Persist `settings`, replacing what was stored.
    fn save(&self, settings: &MonitorSettings) -> MonitorResult<()>;
}

/// In-process key/value store.
#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    values: RwLock<Map<String, Value>>,
}

impl MemorySettingsStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw value stored under `key`.
    #[must_use]
    pub fn value(&self, key: &str) -> Option<Value> {
        self.values.read().get(key).cloned()
    }

    /// Overwrite a single key, as the host does when one control changes.
    pub fn set_value(&self, key: impl Into<String>, value: Value) {
        self.values.write().insert(key.into(), value);
    }
}

impl SettingsStore for MemorySettingsStore {
    fn load(&self) -> MonitorResult<Option<MonitorSettings>> {
        let values = self.values.read();
        if values.is_empty() {
            return Ok(None);
        }
        MonitorSettings::from_map(values.clone()).map(Some)
    }

    fn save(&self, settings: &MonitorSettings) -> MonitorResult<()> {
        let map = settings.to_map()?;
        self.values.write().extend(map);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn keys_match_host_names() {
        let map = MonitorSettings::default().to_map().unwrap();
        for key in [
            "image_source",
            "metric",
            "frame_number",
            "buffer_number",
            "nth_buffer_to_use",
            "roi_x",
            "roi_y",
            "roi_width",
            "roi_height",
            "visible_samples",
        ] {
            assert!(map.contains_key(key), "missing key {key}");
        }
        assert_eq!(map.len(), 10);
    }

    #[test]
    fn enums_persist_as_codes() {
        let settings = MonitorSettings {
            stream_source: StreamSource::Processed,
            metric: MetricKind::StdDev,
            ..MonitorSettings::default()
        };
        let map = settings.to_map().unwrap();
        assert_eq!(map["image_source"], json!(1));
        assert_eq!(map["metric"], json!(2));
    }

    #[test]
    fn unknown_metric_code_falls_back_to_sum() {
        let mut map = Map::new();
        map.insert("metric".into(), json!(42));
        let settings = MonitorSettings::from_map(map).unwrap();
        assert_eq!(settings.metric, MetricKind::Sum);
        assert_eq!(settings.roi(), RegionOfInterest::default());
    }

    #[test]
    fn memory_store_round_trip() {
        let store = MemorySettingsStore::new();
        assert!(store.load().unwrap().is_none());

        let mut settings = MonitorSettings::default();
        settings.set_roi(RegionOfInterest::new(10, 20, 30, 40));
        settings.decimation_factor = 3;
        store.save(&settings).unwrap();

        assert_eq!(store.value("roi_width"), Some(json!(30)));
        assert_eq!(store.load().unwrap(), Some(settings));
    }

    #[test]
    fn selection_sanitizes_values() {
        let settings = MonitorSettings {
            decimation_factor: 0,
            target_buffer_index: -7,
            ..MonitorSettings::default()
        };
        let selection = settings.selection();
        assert_eq!(selection.decimation_factor, 1);
        assert_eq!(selection.target_buffer_index, ALL_BUFFERS);
    }

    #[test]
    fn wrong_type_is_an_error() {
        let store = MemorySettingsStore::new();
        store.set_value("roi_x", json!("left"));
        assert!(store.load().is_err());
    }
}
