//! Synthetic acquisition source.
//!
//! Generates acquisition buffers with a known test pattern so the pipeline
//! can run without hardware: `frames_per_buffer` frames per batch, the buffer
//! index cycling through the volume, samples masked to the declared bit
//! width.
//!
//! # Example
//!
//! ```rust
//! use signal_monitor::mock::{Pattern, SyntheticSource};
//!
//! let mut source = SyntheticSource::new(12, 64, 48, Pattern::Constant(100)).unwrap();
//! let (batch, descriptor) = source.next_batch();
//! assert_eq!(batch.len(), descriptor.bytes_per_frame());
//! ```

use crate::error::MonitorResult;
use crate::frame::FrameDescriptor;
use crate::stats::SampleWidth;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Per-pixel test pattern.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Pattern {
    /// Every sample has the same value.
    Constant(u32),
    /// `(pixel_index + frame_number)`, wrapping at the bit width.
    Ramp,
    /// Uniform noise in `[mean - amplitude, mean + amplitude]`.
    Noise { mean: u32, amplitude: u32 },
}

/// Deterministic generator of acquisition buffers.
#[derive(Debug, Clone)]
pub struct SyntheticSource {
    template: FrameDescriptor,
    width: SampleWidth,
    pattern: Pattern,
    frame_number: u64,
    rng: StdRng,
}

impl SyntheticSource {
    /// Single-frame buffers, one buffer per volume.
    ///
    /// # Errors
    ///
    /// Invalid geometry or a bit width outside 1–32.
    pub fn new(sample_width_bits: u32, samples_per_line: u32, lines_per_frame: u32, pattern: Pattern) -> MonitorResult<Self> {
        Self::with_layout(
            FrameDescriptor {
                sample_width_bits,
                samples_per_line,
                lines_per_frame,
                frames_per_buffer: 1,
                buffers_per_volume: 1,
                current_buffer_index: 0,
            },
            pattern,
        )
    }

    /// Source producing buffers shaped like `layout`; its
    /// `current_buffer_index` is the first buffer emitted.
    ///
    /// # Errors
    ///
    /// Invalid geometry or a bit width outside 1–32.
    pub fn with_layout(layout: FrameDescriptor, pattern: Pattern) -> MonitorResult<Self> {
        layout.validate()?;
        let width = SampleWidth::from_bits(layout.sample_width_bits)?;
        Ok(Self {
            template: layout,
            width,
            pattern,
            frame_number: 0,
            rng: StdRng::seed_from_u64(0x5eed),
        })
    }

    /// Reseed the noise generator for reproducible batches.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Frames generated so far.
    #[must_use]
    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }

    /// Descriptor of the next batch.
    #[must_use]
    pub fn descriptor(&self) -> FrameDescriptor {
        self.template
    }

    /// Generate the next acquisition buffer and its descriptor.
    pub fn next_batch(&mut self) -> (Vec<u8>, FrameDescriptor) {
        let descriptor = self.template;
        let pixels = descriptor.pixels_per_frame();
        let mut buffer = Vec::with_capacity(descriptor.bytes_per_frame() * descriptor.frames_per_buffer as usize);

        for _ in 0..descriptor.frames_per_buffer {
            self.frame_number += 1;
            for index in 0..pixels {
                let value = self.sample(index) & self.mask();
                self.encode(value, &mut buffer);
            }
        }

        if descriptor.buffers_per_volume > 0 {
            self.template.current_buffer_index = (descriptor.current_buffer_index + 1) % descriptor.buffers_per_volume;
        }
        (buffer, descriptor)
    }

    fn sample(&mut self, index: usize) -> u32 {
        match self.pattern {
            Pattern::Constant(value) => value,
            Pattern::Ramp => (index as u64).wrapping_add(self.frame_number) as u32,
            Pattern::Noise { mean, amplitude } => {
                let low = mean.saturating_sub(amplitude);
                let high = mean.saturating_add(amplitude);
                self.rng.gen_range(low..=high)
            }
        }
    }

    fn mask(&self) -> u32 {
        match self.template.sample_width_bits {
            32.. => u32::MAX,
            bits => (1u32 << bits) - 1,
        }
    }

    fn encode(&self, value: u32, out: &mut Vec<u8>) {
        match self.width {
            SampleWidth::U8 => out.push(value as u8),
            SampleWidth::U16 => out.extend_from_slice(&(value as u16).to_ne_bytes()),
            SampleWidth::U32 => out.extend_from_slice(&value.to_ne_bytes()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MonitorError;

    #[test]
    fn constant_pattern_fills_every_sample() {
        let mut source = SyntheticSource::new(16, 4, 4, Pattern::Constant(7)).unwrap();
        let (batch, descriptor) = source.next_batch();
        assert_eq!(batch.len(), 32);
        assert_eq!(descriptor.frames_per_buffer, 1);
        assert!(batch.chunks_exact(2).all(|c| u16::from_ne_bytes([c[0], c[1]]) == 7));
    }

    #[test]
    fn values_are_masked_to_bit_width() {
        let mut source = SyntheticSource::new(12, 2, 1, Pattern::Constant(0xFFFF)).unwrap();
        let (batch, _) = source.next_batch();
        assert_eq!(u16::from_ne_bytes([batch[0], batch[1]]), 0x0FFF);
    }

    #[test]
    fn wide_samples_fill_four_byte_elements() {
        let mut source = SyntheticSource::new(24, 2, 2, Pattern::Constant(0x12_3456)).unwrap();
        let (batch, descriptor) = source.next_batch();
        assert_eq!(batch.len(), descriptor.bytes_per_frame());
        assert_eq!(batch.len(), 16);
        assert!(batch.chunks_exact(4).all(|c| u32::from_ne_bytes([c[0], c[1], c[2], c[3]]) == 0x12_3456));
    }

    #[test]
    fn buffer_index_cycles_through_volume() {
        let layout = FrameDescriptor {
            sample_width_bits: 8,
            samples_per_line: 2,
            lines_per_frame: 2,
            frames_per_buffer: 3,
            buffers_per_volume: 2,
            current_buffer_index: 0,
        };
        let mut source = SyntheticSource::with_layout(layout, Pattern::Ramp).unwrap();

        let indices: Vec<u32> = (0..4).map(|_| source.next_batch().1.current_buffer_index).collect();
        assert_eq!(indices, vec![0, 1, 0, 1]);
        assert_eq!(source.frame_number(), 12);
    }

    #[test]
    fn ramp_shifts_with_frame_number() {
        let mut source = SyntheticSource::new(8, 3, 1, Pattern::Ramp).unwrap();
        assert_eq!(source.next_batch().0, vec![1, 2, 3]);
        assert_eq!(source.next_batch().0, vec![2, 3, 4]);
    }

    #[test]
    fn noise_is_reproducible_and_bounded() {
        let pattern = Pattern::Noise { mean: 100, amplitude: 10 };
        let mut a = SyntheticSource::new(16, 8, 8, pattern).unwrap().with_seed(7);
        let mut b = SyntheticSource::new(16, 8, 8, pattern).unwrap().with_seed(7);

        let (batch_a, _) = a.next_batch();
        assert_eq!(batch_a, b.next_batch().0);
        assert!(batch_a
            .chunks_exact(2)
            .map(|c| u16::from_ne_bytes([c[0], c[1]]))
            .all(|v| (90..=110).contains(&v)));
    }

    #[test]
    fn unsupported_width_rejected() {
        assert!(matches!(
            SyntheticSource::new(40, 2, 2, Pattern::Ramp),
            Err(MonitorError::UnsupportedSampleWidth(40))
        ));
        assert!(matches!(
            SyntheticSource::new(8, 0, 2, Pattern::Ramp),
            Err(MonitorError::InvalidDimensions { .. })
        ));
    }
}
