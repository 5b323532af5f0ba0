//! Frame notification metadata.

use crate::error::{MonitorError, MonitorResult};
use crate::stats::SampleWidth;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which acquisition stream a notification belongs to.
///
/// Settings code: 0 = raw, 1 = processed; unknown codes fall back to raw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub enum StreamSource {
    /// Camera frames as acquired.
    #[default]
    Raw,
    /// Frames after on-line processing.
    Processed,
}

impl StreamSource {
    /// Index into per-stream tables.
    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        match self {
            StreamSource::Raw => 0,
            StreamSource::Processed => 1,
        }
    }
}

impl From<u8> for StreamSource {
    fn from(code: u8) -> Self {
        match code {
            1 => StreamSource::Processed,
            _ => StreamSource::Raw,
        }
    }
}

impl From<StreamSource> for u8 {
    fn from(source: StreamSource) -> Self {
        source.index() as u8
    }
}

impl fmt::Display for StreamSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamSource::Raw => f.write_str("raw"),
            StreamSource::Processed => f.write_str("processed"),
        }
    }
}

impl FromStr for StreamSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "raw" => Ok(StreamSource::Raw),
            "processed" => Ok(StreamSource::Processed),
            _ => Err(format!("Invalid stream '{}'. Must be raw or processed", s)),
        }
    }
}

/// Per-notification metadata describing an acquisition buffer.
///
/// One acquisition buffer holds `frames_per_buffer` frames of
/// `samples_per_line * lines_per_frame` samples each; a volume consists of
/// `buffers_per_volume` buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameDescriptor {
    /// Declared bit depth, 1 to 32.
    pub sample_width_bits: u32,
    /// Samples per line (frame width).
    pub samples_per_line: u32,
    /// Lines per frame (frame height).
    pub lines_per_frame: u32,
    /// Frames in one acquisition buffer.
    pub frames_per_buffer: u32,
    /// Buffers in one volume, 0 when unknown.
    pub buffers_per_volume: u32,
    /// Index of this buffer inside the volume.
    pub current_buffer_index: u32,
}

impl FrameDescriptor {
    /// Check the geometry invariants.
    ///
    /// # Errors
    ///
    /// - [`MonitorError::InvalidDimensions`] if the sample width, line length,
    ///   frame height or frame count is zero.
    /// - [`MonitorError::UnsupportedSampleWidth`] for more than 32 bits.
    pub fn validate(&self) -> MonitorResult<()> {
        if self.sample_width_bits == 0
            || self.samples_per_line == 0
            || self.lines_per_frame == 0
            || self.frames_per_buffer == 0
        {
            return Err(MonitorError::InvalidDimensions {
                bits: self.sample_width_bits,
                samples_per_line: self.samples_per_line,
                lines_per_frame: self.lines_per_frame,
                frames_per_buffer: self.frames_per_buffer,
            });
        }
        SampleWidth::from_bits(self.sample_width_bits)?;
        Ok(())
    }

    /// Bytes per element of the sample container: 1, 2 or 4.
    ///
    /// 17 to 24 bit samples occupy a full 4-byte element, the same layout
    /// [`crate::stats::compute`] reads. Unsupported widths give 0.
    #[inline]
    #[must_use]
    pub fn bytes_per_sample(&self) -> usize {
        SampleWidth::from_bits(self.sample_width_bits).map_or(0, SampleWidth::bytes)
    }

    /// `samples_per_line * lines_per_frame`.
    #[inline]
    #[must_use]
    pub fn pixels_per_frame(&self) -> usize {
        self.samples_per_line as usize * self.lines_per_frame as usize
    }

    /// Size of one frame in bytes.
    #[inline]
    #[must_use]
    pub fn bytes_per_frame(&self) -> usize {
        self.pixels_per_frame() * self.bytes_per_sample()
    }

    /// Byte offset of frame `frame_index` inside the acquisition buffer.
    #[inline]
    #[must_use]
    pub fn frame_offset(&self, frame_index: u32) -> usize {
        self.bytes_per_frame() * frame_index as usize
    }

    /// Highest valid frame index.
    #[must_use]
    pub fn max_frame_index(&self) -> u32 {
        self.frames_per_buffer.saturating_sub(1)
    }

    /// Highest valid buffer index, `-1` when the volume size is unknown.
    #[must_use]
    pub fn max_buffer_index(&self) -> i64 {
        i64::from(self.buffers_per_volume) - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(bits: u32) -> FrameDescriptor {
        FrameDescriptor {
            sample_width_bits: bits,
            samples_per_line: 4,
            lines_per_frame: 3,
            frames_per_buffer: 5,
            buffers_per_volume: 2,
            current_buffer_index: 0,
        }
    }

    #[test]
    fn bytes_per_frame_follows_element_width() {
        assert_eq!(descriptor(8).bytes_per_frame(), 12);
        assert_eq!(descriptor(12).bytes_per_frame(), 24);
        assert_eq!(descriptor(17).bytes_per_frame(), 48);
        assert_eq!(descriptor(24).bytes_per_frame(), 48);
        assert_eq!(descriptor(32).bytes_per_frame(), 48);
        assert_eq!(descriptor(12).frame_offset(3), 72);
        assert_eq!(descriptor(24).frame_offset(2), 96);
    }

    #[test]
    fn wide_samples_are_unsupported() {
        assert!(matches!(
            descriptor(33).validate(),
            Err(MonitorError::UnsupportedSampleWidth(33))
        ));
        assert!(matches!(
            descriptor(u32::MAX).validate(),
            Err(MonitorError::UnsupportedSampleWidth(u32::MAX))
        ));
        assert_eq!(descriptor(u32::MAX).bytes_per_frame(), 0);
    }

    #[test]
    fn zero_dimensions_are_invalid() {
        assert!(descriptor(16).validate().is_ok());

        let mut d = descriptor(16);
        d.lines_per_frame = 0;
        assert!(matches!(d.validate(), Err(MonitorError::InvalidDimensions { .. })));

        let mut d = descriptor(16);
        d.frames_per_buffer = 0;
        assert!(d.validate().is_err());

        assert!(descriptor(0).validate().is_err());
    }

    #[test]
    fn stream_codes_and_names() {
        assert_eq!(StreamSource::from(1), StreamSource::Processed);
        assert_eq!(StreamSource::from(9), StreamSource::Raw);
        assert_eq!(u8::from(StreamSource::Processed), 1);
        assert_eq!("Processed".parse::<StreamSource>().unwrap(), StreamSource::Processed);
        assert_eq!(StreamSource::Raw.to_string(), "raw");
    }
}
