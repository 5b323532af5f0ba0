//! ROI statistics engine.
//!
//! Reduces one frame to a [`Statistics`] record over the region of interest
//! and picks the scalar selected by [`MetricKind`].
//!
//! # Sample widths
//!
//! Frames arrive as raw bytes with a declared bit depth. The element type is
//! chosen once per frame from the bit depth:
//!
//! | Bits    | Element |
//! |---------|---------|
//! | 1–8     | `u8`    |
//! | 9–16    | `u16`   |
//! | 17–32   | `u32`   |
//!
//! and the reduction itself is generic over [`Sample`], so each width gets its
//! own monomorphic inner loop. Elements are read in native byte order, the
//! layout the acquisition host writes them in.
//!
//! # Passes
//!
//! The first pass walks the frame in row-major order and keeps every pixel
//! whose `(index % width, index / width)` position lies in the ROI. Only rows
//! and columns overlapping the ROI are visited, which selects exactly the same
//! pixels as testing every index. Sum, min and max are accumulated and the
//! selected raw samples are retained. The mean is then known and the second
//! pass over the retained samples yields the population standard deviation.
//! The retained list is bounded by the ROI pixel count, not the frame size.
//!
//! Sample values are aggregated as read; no clamping to `[0, 2^bits - 1]` is
//! applied.

use crate::error::{MonitorError, MonitorResult};
use crate::roi::RegionOfInterest;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Scalar emitted to the scrolling display.
///
/// Integer codes follow the settings store: 0 = sum, 1 = average,
/// 2 = standard deviation, 3 = coefficient of variation. Unknown codes fall
/// back to [`MetricKind::Sum`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub enum MetricKind {
    /// Sum of the ROI samples.
    #[default]
    Sum,
    /// Mean of the ROI samples.
    Average,
    /// Population standard deviation.
    StdDev,
    /// Standard deviation divided by the mean.
    CoeffOfVariation,
}

impl MetricKind {
    /// Every metric, in settings-code order.
    pub const ALL: [MetricKind; 4] = [
        MetricKind::Sum,
        MetricKind::Average,
        MetricKind::StdDev,
        MetricKind::CoeffOfVariation,
    ];
}

impl From<u8> for MetricKind {
    fn from(code: u8) -> Self {
        match code {
            1 => MetricKind::Average,
            2 => MetricKind::StdDev,
            3 => MetricKind::CoeffOfVariation,
            _ => MetricKind::Sum,
        }
    }
}

impl From<MetricKind> for u8 {
    fn from(kind: MetricKind) -> Self {
        match kind {
            MetricKind::Sum => 0,
            MetricKind::Average => 1,
            MetricKind::StdDev => 2,
            MetricKind::CoeffOfVariation => 3,
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MetricKind::Sum => "sum",
            MetricKind::Average => "average",
            MetricKind::StdDev => "standard deviation",
            MetricKind::CoeffOfVariation => "coefficient of variation",
        };
        f.write_str(name)
    }
}

impl FromStr for MetricKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sum" => Ok(MetricKind::Sum),
            "average" | "avg" | "mean" => Ok(MetricKind::Average),
            "stddev" | "std" => Ok(MetricKind::StdDev),
            "cov" | "coeffvar" | "coefficient-of-variation" => Ok(MetricKind::CoeffOfVariation),
            _ => Err(format!(
                "Invalid metric '{}'. Must be one of: sum, average, stddev, cov",
                s
            )),
        }
    }
}

/// Statistics of one frame over the region of interest.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    /// Number of frame pixels inside the ROI.
    pub pixels: usize,
    /// Sum of the samples.
    pub sum: f64,
    /// Smallest sample.
    pub min: f64,
    /// Largest sample.
    pub max: f64,
    /// `sum / pixels`.
    pub average: f64,
    /// Population standard deviation (denominator = pixel count).
    pub std_deviation: f64,
    /// `std_deviation / average`; `None` when the average is zero.
    pub coeff_of_variation: Option<f64>,
    /// ROI the statistics were computed over.
    pub roi: RegionOfInterest,
}

impl Statistics {
    /// Scalar selected by `kind`, `None` if it is undefined for this frame.
    #[must_use]
    pub fn metric(&self, kind: MetricKind) -> Option<f64> {
        match kind {
            MetricKind::Sum => Some(self.sum),
            MetricKind::Average => Some(self.average),
            MetricKind::StdDev => Some(self.std_deviation),
            MetricKind::CoeffOfVariation => self.coeff_of_variation,
        }
    }
}

/// Result of one successful computation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricOutput {
    /// Metric that was selected.
    pub kind: MetricKind,
    /// Its value.
    pub value: f64,
    /// The full set the value was taken from.
    pub statistics: Statistics,
}

/// Element width category derived from the declared bit depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleWidth {
    /// 1 to 8 bits, one byte.
    U8,
    /// 9 to 16 bits, two bytes.
    U16,
    /// 17 to 32 bits, four bytes.
    U32,
}

impl SampleWidth {
    /// Pick the element type for `bits`.
    ///
    /// # Errors
    ///
    /// [`MonitorError::UnsupportedSampleWidth`] for 0 or more than 32 bits.
    pub fn from_bits(bits: u32) -> MonitorResult<Self> {
        match bits {
            1..=8 => Ok(SampleWidth::U8),
            9..=16 => Ok(SampleWidth::U16),
            17..=32 => Ok(SampleWidth::U32),
            _ => Err(MonitorError::UnsupportedSampleWidth(bits)),
        }
    }

    /// Bytes per element.
    #[must_use]
    pub fn bytes(self) -> usize {
        match self {
            SampleWidth::U8 => 1,
            SampleWidth::U16 => 2,
            SampleWidth::U32 => 4,
        }
    }
}

/// Unsigned sample element readable from a native-endian byte chunk.
pub trait Sample: Copy + Send + 'static {
    /// Element size in bytes.
    const BYTES: usize;

    /// Decode one element; `bytes` is exactly `Self::BYTES` long.
    fn from_ne_chunk(bytes: &[u8]) -> Self;

    /// Lossless widening for accumulation.
    fn to_f64(self) -> f64;
}

macro_rules! impl_sample {
    ($($ty:ty),*) => {
        $(
            impl Sample for $ty {
                const BYTES: usize = std::mem::size_of::<$ty>();

                #[inline]
                fn from_ne_chunk(bytes: &[u8]) -> Self {
                    let mut raw = [0u8; std::mem::size_of::<$ty>()];
                    raw.copy_from_slice(bytes);
                    <$ty>::from_ne_bytes(raw)
                }

                #[inline]
                fn to_f64(self) -> f64 {
                    f64::from(self)
                }
            }
        )*
    };
}

impl_sample!(u8, u16, u32);

/// Compute statistics of `buffer` over `roi` and select the `metric` scalar.
///
/// # Errors
///
/// - [`MonitorError::UnsupportedSampleWidth`] for widths outside 1–32 bits.
/// - [`MonitorError::FrameTooShort`] if `buffer` is smaller than the geometry.
/// - [`MonitorError::EmptyRegion`] if the ROI covers no pixel of the frame.
/// - [`MonitorError::UndefinedMetric`] if the coefficient of variation is
///   requested for a zero mean.
pub fn compute(
    buffer: &[u8],
    sample_width_bits: u32,
    samples_per_line: u32,
    lines_per_frame: u32,
    roi: RegionOfInterest,
    metric: MetricKind,
) -> MonitorResult<MetricOutput> {
    let statistics = match SampleWidth::from_bits(sample_width_bits)? {
        SampleWidth::U8 => reduce::<u8>(buffer, samples_per_line, lines_per_frame, roi)?,
        SampleWidth::U16 => reduce::<u16>(buffer, samples_per_line, lines_per_frame, roi)?,
        SampleWidth::U32 => reduce::<u32>(buffer, samples_per_line, lines_per_frame, roi)?,
    };

    let value = statistics
        .metric(metric)
        .ok_or(MonitorError::UndefinedMetric(metric))?;

    Ok(MetricOutput {
        kind: metric,
        value,
        statistics,
    })
}

/// Width-specific reduction over the ROI.
pub fn reduce<T: Sample>(
    buffer: &[u8],
    samples_per_line: u32,
    lines_per_frame: u32,
    roi: RegionOfInterest,
) -> MonitorResult<Statistics> {
    let width = samples_per_line as usize;
    let height = lines_per_frame as usize;
    let expected = width * height * T::BYTES;
    if buffer.len() < expected {
        return Err(MonitorError::FrameTooShort {
            expected,
            actual: buffer.len(),
        });
    }

    let (columns, rows) = roi
        .clip(width, height)
        .ok_or(MonitorError::EmptyRegion(roi))?;

    let mut samples: Vec<T> = Vec::with_capacity(columns.len() * rows.len());
    let mut sum = 0.0_f64;
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;

    for row in rows {
        let start = (row * width + columns.start) * T::BYTES;
        let end = (row * width + columns.end) * T::BYTES;
        for chunk in buffer[start..end].chunks_exact(T::BYTES) {
            let sample = T::from_ne_chunk(chunk);
            let value = sample.to_f64();
            sum += value;
            min = min.min(value);
            max = max.max(value);
            samples.push(sample);
        }
    }

    let pixels = samples.len();
    if pixels == 0 {
        return Err(MonitorError::EmptyRegion(roi));
    }

    let average = sum / pixels as f64;
    let std_deviation = population_std_dev(&samples, average);
    let coeff_of_variation = (average != 0.0).then(|| std_deviation / average);

    Ok(Statistics {
        pixels,
        sum,
        min,
        max,
        average,
        std_deviation,
        coeff_of_variation,
        roi,
    })
}

fn population_std_dev<T: Sample>(samples: &[T], mean: f64) -> f64 {
    let squared: f64 = samples
        .iter()
        .map(|s| {
            let d = s.to_f64() - mean;
            d * d
        })
        .sum();
    (squared / samples.len() as f64).sqrt()
}
