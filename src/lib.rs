//! # Signal Monitor
//!
//! Real-time frame statistics for imaging acquisition pipelines. The monitor
//! watches a high-rate stream of frame buffers (raw or processed), samples
//! frames with a configurable decimation factor, copies the selected frame
//! into a reusable slot and computes ROI statistics on a dedicated worker
//! thread. Results are published as events for a scrolling display.
//!
//! The acquisition thread never blocks: if the worker is still busy or the
//! next slot is in flight, the frame is dropped and counted.
//!
//! ## Crate Structure
//!
//! - **`monitor`**: [`SignalMonitor`], the pipeline entry point and control
//!   surface.
//! - **`selection`**: decimation, buffer filter and index clamping.
//! - **`dispatch`**: the single statistics worker and lost-frame counting.
//! - **`stats`**: width-generic ROI statistics (sum, average, standard
//!   deviation, coefficient of variation).
//! - **`roi`**, **`frame`**: region of interest and frame geometry.
//! - **`events`**: the outbound event bus.
//! - **`cell`**: tear-free configuration cells.
//! - **`settings`**: persisted user settings and the store abstraction.
//! - **`history`**: scrolling metric history with CSV export.
//! - **`config`**, **`logging`**: Figment configuration and tracing setup.
//! - **`mock`**: synthetic acquisition source.
//! - **`error`**: [`MonitorError`].
//!
//! Slot ownership lives in the companion `frame-pool` crate.
//!
//! ## Example
//!
//! ```rust
//! use signal_monitor::{MetricKind, MonitorEvent, RegionOfInterest, SignalMonitor};
//! use signal_monitor::mock::{Pattern, SyntheticSource};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let monitor = SignalMonitor::new()?;
//! monitor.set_decimation_factor(1);
//! monitor.set_metric(MetricKind::Average);
//! monitor.set_roi(RegionOfInterest::new(0, 0, 8, 8));
//! let mut events = monitor.subscribe();
//!
//! let mut source = SyntheticSource::new(16, 32, 32, Pattern::Constant(40))?;
//! let (batch, descriptor) = source.next_batch();
//! monitor.on_raw_frames(&batch, &descriptor);
//!
//! drop(monitor);
//! while let Ok(event) = events.try_recv() {
//!     if let MonitorEvent::Metric { value, .. } = event {
//!         assert_eq!(value, 40.0);
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod cell;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod frame;
pub mod history;
pub mod logging;
pub mod mock;
pub mod monitor;
pub mod roi;
pub mod selection;
pub mod settings;
pub mod stats;

pub use error::{MonitorError, MonitorResult};
pub use events::{Bound, EventBus, MonitorEvent};
pub use frame::{FrameDescriptor, StreamSource};
pub use monitor::{FrameOutcome, SignalMonitor};
pub use roi::RegionOfInterest;
pub use selection::SelectionState;
pub use settings::{MonitorSettings, SettingsStore};
pub use stats::{MetricKind, Statistics};
