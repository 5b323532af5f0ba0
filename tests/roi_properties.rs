//! Property tests for ROI statistics.
//!
//! For arbitrary frame sizes and rectangles the engine must count exactly
//! the pixels of the rectangle that lie on the frame, and a uniform frame
//! must reduce to its value with zero spread.

use proptest::prelude::*;
use signal_monitor::stats;
use signal_monitor::{MetricKind, MonitorError, RegionOfInterest};

fn uniform_frame_16(width: u32, height: u32, value: u16) -> Vec<u8> {
    std::iter::repeat(value.to_ne_bytes())
        .take((width * height) as usize)
        .flatten()
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    /// ROI fully inside the frame: pixel count is width * height.
    #[test]
    fn prop_inner_roi_counts_every_pixel(
        width in 1u32..64,
        height in 1u32..64,
        seed in any::<(u32, u32, u32, u32)>(),
    ) {
        let x = seed.0 % width;
        let y = seed.1 % height;
        let w = 1 + seed.2 % (width - x);
        let h = 1 + seed.3 % (height - y);
        let roi = RegionOfInterest::new(x as i32, y as i32, w, h);

        let frame = uniform_frame_16(width, height, 1);
        let output = stats::compute(&frame, 16, width, height, roi, MetricKind::Sum).unwrap();

        prop_assert_eq!(output.statistics.pixels, (w * h) as usize);
        prop_assert_eq!(output.value, f64::from(w * h));
    }

    /// Any ROI: the count equals the overlap with the frame, and a ROI
    /// without overlap is an error.
    #[test]
    fn prop_roi_is_clipped_to_frame(
        width in 1u32..48,
        height in 1u32..48,
        x in -64i32..64,
        y in -64i32..64,
        w in 0u32..96,
        h in 0u32..96,
    ) {
        let roi = RegionOfInterest::new(x, y, w, h);
        let frame = uniform_frame_16(width, height, 3);

        let overlap_x = (i64::from(x) + i64::from(w)).min(i64::from(width)) - i64::from(x).max(0);
        let overlap_y = (i64::from(y) + i64::from(h)).min(i64::from(height)) - i64::from(y).max(0);
        let expected = (overlap_x.max(0) * overlap_y.max(0)) as usize;

        match stats::compute(&frame, 16, width, height, roi, MetricKind::Average) {
            Ok(output) => {
                prop_assert_eq!(output.statistics.pixels, expected);
                prop_assert_eq!(output.value, 3.0);
            }
            Err(MonitorError::EmptyRegion(_)) => prop_assert_eq!(expected, 0),
            Err(e) => prop_assert!(false, "unexpected error: {}", e),
        }
    }

    /// Uniform frame: average v, deviation 0, coefficient 0 for v > 0.
    #[test]
    fn prop_uniform_frame_has_no_spread(value in 1u16..=u16::MAX, side in 1u32..32) {
        let frame = uniform_frame_16(side, side, value);
        let roi = RegionOfInterest::new(0, 0, side, side);
        let output = stats::compute(&frame, 16, side, side, roi, MetricKind::StdDev).unwrap();

        prop_assert_eq!(output.statistics.average, f64::from(value));
        prop_assert_eq!(output.value, 0.0);
        prop_assert_eq!(output.statistics.coeff_of_variation, Some(0.0));
    }
}
