//! The shipped configuration file loads, validates and drives a monitor.

use signal_monitor::config::{MonitorConfig, DEFAULT_CONFIG_PATH};
use signal_monitor::settings::{MemorySettingsStore, SettingsStore};
use signal_monitor::{MetricKind, RegionOfInterest, SignalMonitor, StreamSource};

#[test]
fn test_shipped_config_is_valid() {
    let config = MonitorConfig::load_from(DEFAULT_CONFIG_PATH).unwrap();
    config.validate().unwrap();

    assert_eq!(config.pipeline.slots_per_stream, 2);
    assert_eq!(config.defaults.stream_source, StreamSource::Raw);
    assert_eq!(config.defaults.metric, MetricKind::Sum);
    assert_eq!(config.defaults.roi(), RegionOfInterest::default());
    assert_eq!(config.defaults.target_buffer_index, -1);
}

#[test]
fn test_defaults_round_trip_through_store() {
    let config = MonitorConfig::load_from(DEFAULT_CONFIG_PATH).unwrap();
    let monitor = SignalMonitor::with_config(&config.pipeline).unwrap();
    monitor.apply_settings(&config.defaults);

    let store = MemorySettingsStore::new();
    store.save(&monitor.settings()).unwrap();

    let restored = store.load().unwrap().unwrap();
    assert_eq!(restored, config.defaults);
    assert_eq!(restored.decimation_factor, 10);
}
