//! Error types for the signal monitor.
//!
//! `MonitorError` collects everything that can abort the processing of one
//! frame, plus the configuration and export failures of the surrounding
//! application. Frame-level errors never poison the pipeline: the producer
//! turns them into error events and stays ready for the next notification.
//!
//! ## Error Hierarchy
//!
//! - **`InvalidDimensions`**: a notification carried a zero sample width,
//!   line length, frame height or frame count. Nothing is copied or
//!   dispatched.
//! - **`UnsupportedSampleWidth`**: the statistics engine only knows 1, 2 and
//!   4 byte elements (1–32 bits).
//! - **`EmptyRegion`**: the region of interest selects no pixel of the frame.
//! - **`UndefinedMetric`**: the coefficient of variation was requested for a
//!   region whose mean is zero.
//! - **`FrameTooShort`**: the buffer handed to the engine is smaller than the
//!   declared geometry.
//! - **`Pool`**: wraps [`frame_pool::PoolError`]. `ResizeWhileBusy` here is a
//!   caller-ordering bug and is fatal to the current operation only.
//! - **`Config`**, **`Io`**, **`Serialization`**, **`Csv`**: application edge
//!   errors.

use frame_pool::PoolError;
use thiserror::Error;

/// Convenience alias for results using the monitor error type.
pub type MonitorResult<T> = std::result::Result<T, MonitorError>;

/// Everything that can go wrong in the monitor.
#[derive(Error, Debug)]
pub enum MonitorError {
    /// Zero sample width, line length, frame height or frame count.
    #[error("Invalid data dimensions: {bits} bit samples, {samples_per_line}x{lines_per_frame} frame, {frames_per_buffer} frames per buffer")]
    InvalidDimensions {
        /// Declared sample width.
        bits: u32,
        /// Declared line length.
        samples_per_line: u32,
        /// Declared frame height.
        lines_per_frame: u32,
        /// Declared frames per buffer.
        frames_per_buffer: u32,
    },

    /// Sample width outside 1 to 32 bits.
    #[error("Unsupported sample width: {0} bits (expected 1-32)")]
    UnsupportedSampleWidth(u32),

    /// The ROI does not overlap the frame.
    #[error("Region of interest {0} selects no pixels")]
    EmptyRegion(crate::roi::RegionOfInterest),

    /// The selected metric has no value for this frame.
    #[error("{0} is undefined for a region with zero mean")]
    UndefinedMetric(crate::stats::MetricKind),

    /// Buffer smaller than the declared geometry.
    #[error("Frame buffer holds {actual} bytes but the geometry needs {expected}")]
    FrameTooShort {
        /// Bytes the geometry needs.
        expected: usize,
        /// Bytes available.
        actual: usize,
    },

    /// Slot pool failure.
    #[error("Frame pool error: {0}")]
    Pool(#[from] PoolError),

    /// Figment could not extract the configuration.
    #[error("Configuration error: {0}")]
    Config(#[from] figment::Error),

    /// Configuration values out of range.
    #[error("Configuration validation error: {0}")]
    Configuration(String),

    /// I/O failure (worker spawn, file export).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Settings could not be converted to or from a key/value map.
    #[error("Settings serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// CSV writer failure.
    #[cfg(feature = "storage_csv")]
    #[error("CSV export error: {0}")]
    Csv(#[from] csv::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roi::RegionOfInterest;

    #[test]
    fn invalid_dimensions_message_names_geometry() {
        let err = MonitorError::InvalidDimensions {
            bits: 16,
            samples_per_line: 0,
            lines_per_frame: 4,
            frames_per_buffer: 1,
        };
        let msg = err.to_string();
        assert!(msg.contains("0x4"));
    }

    #[test]
    fn pool_errors_convert() {
        let err: MonitorError = PoolError::ResizeWhileBusy { in_flight: 1 }.into();
        assert!(matches!(
            err,
            MonitorError::Pool(PoolError::ResizeWhileBusy { in_flight: 1 })
        ));
    }

    #[test]
    fn empty_region_names_the_roi() {
        let err = MonitorError::EmptyRegion(RegionOfInterest::new(50, 50, 2, 2));
        assert_eq!(err.to_string(), "Region of interest ROI: 50, 50, 2, 2 selects no pixels");
    }
}
