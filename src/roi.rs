//! Region of interest in sample/line coordinates.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;

/// Axis-aligned rectangle `(x, y, width, height)` over a frame.
///
/// Containment is half-open: a pixel `(px, py)` is inside iff
/// `x <= px < x + width` and `y <= py < y + height`. The rectangle may extend
/// past the frame or start at negative coordinates (the display overlay can
/// be dragged off the image); only the overlap with the frame counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RegionOfInterest {
    /// First column, may be negative.
    pub x: i32,
    /// First line, may be negative.
    pub y: i32,
    /// Columns covered.
    pub width: u32,
    /// Lines covered.
    pub height: u32,
}

impl RegionOfInterest {
    /// Rectangle at (`x`, `y`) of `width` x `height` samples.
    #[must_use]
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Whether the point `(px, py)` lies inside the rectangle.
    #[inline]
    #[must_use]
    pub fn contains(&self, px: i64, py: i64) -> bool {
        let (x, y) = (i64::from(self.x), i64::from(self.y));
        px >= x && px < x + i64::from(self.width) && py >= y && py < y + i64::from(self.height)
    }

    /// Whether the pixel at linear `index` of a frame `frame_width` samples
    /// wide lies inside the rectangle.
    #[inline]
    #[must_use]
    pub fn contains_index(&self, index: usize, frame_width: usize) -> bool {
        if frame_width == 0 {
            return false;
        }
        self.contains((index % frame_width) as i64, (index / frame_width) as i64)
    }

    /// Column and row ranges of the overlap with a `frame_width` x
    /// `frame_height` frame, or `None` if they do not overlap.
    #[must_use]
    pub fn clip(&self, frame_width: usize, frame_height: usize) -> Option<(Range<usize>, Range<usize>)> {
        let columns = clip_axis(self.x, self.width, frame_width)?;
        let rows = clip_axis(self.y, self.height, frame_height)?;
        Some((columns, rows))
    }

    /// Number of frame pixels covered by the rectangle.
    #[must_use]
    pub fn pixel_count_in(&self, frame_width: usize, frame_height: usize) -> usize {
        self.clip(frame_width, frame_height)
            .map_or(0, |(columns, rows)| columns.len() * rows.len())
    }
}

impl Default for RegionOfInterest {
    fn default() -> Self {
        Self::new(0, 0, 1024, 1024)
    }
}

impl fmt::Display for RegionOfInterest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ROI: {}, {}, {}, {}", self.x, self.y, self.width, self.height)
    }
}

fn clip_axis(start: i32, extent: u32, limit: usize) -> Option<Range<usize>> {
    let begin = i64::from(start).max(0);
    let end = (i64::from(start) + i64::from(extent)).min(limit as i64);
    (begin < end).then(|| begin as usize..end as usize)
}
