//! Track path: one (dx, dy) direction delta per integer road position

use serde::{Deserialize, Serialize};

use crate::TrackData;

/// Signed direction change between two consecutive road positions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathDelta {
    pub x: i16,
    pub y: i16,
}

impl PathDelta {
    pub const ZERO: Self = Self { x: 0, y: 0 };

    pub const fn new(x: i16, y: i16) -> Self {
        Self { x, y }
    }

    /// 16-bit wrapping sum
    pub const fn wrapping_add(self, other: Self) -> Self {
        Self {
            x: self.x.wrapping_add(other.x),
            y: self.y.wrapping_add(other.y),
        }
    }

    pub const fn is_zero(&self) -> bool {
        self.x == 0 && self.y == 0
    }
}

/// Run-length authored path segment: `repeat` copies of one delta
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathSegment {
    pub repeat: u32,
    pub dx: i16,
    pub dy: i16,
}

impl PathSegment {
    /// Expand a run-length path into one delta per road position
    pub fn expand(segments: &[PathSegment]) -> Vec<PathDelta> {
        segments
            .iter()
            .flat_map(|s| std::iter::repeat(PathDelta::new(s.dx, s.dy)).take(s.repeat as usize))
            .collect()
    }
}

/// Sequential reader over a track path
pub struct PathReader<'a> {
    track: &'a dyn TrackData,
    cursor: u32,
}

impl<'a> PathReader<'a> {
    pub fn new(track: &'a dyn TrackData, position: u32) -> Self {
        Self {
            track,
            cursor: position,
        }
    }

    /// Road position of the next delta
    pub fn position(&self) -> u32 {
        self.cursor
    }

    pub fn next_delta(&mut self) -> PathDelta {
        let delta = self.track.path_delta(self.cursor);
        self.cursor = self.cursor.wrapping_add(1);
        delta
    }

    /// Two consecutive deltas summed in 32 bits
    pub fn next_pair(&mut self) -> (i32, i32) {
        let a = self.next_delta();
        let b = self.next_delta();
        (
            i32::from(a.x) + i32::from(b.x),
            i32::from(a.y) + i32::from(b.y),
        )
    }

    /// Sum of the next `count` deltas in 16 bits
    pub fn sum_next(&mut self, count: usize) -> PathDelta {
        (0..count).fold(PathDelta::ZERO, |acc, _| acc.wrapping_add(self.next_delta()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TrackSection;

    #[test]
    fn expand_run_lengths() {
        let path = PathSegment::expand(&[
            PathSegment { repeat: 2, dx: 0, dy: 100 },
            PathSegment { repeat: 1, dx: 5, dy: 90 },
        ]);
        assert_eq!(path, vec![
            PathDelta::new(0, 100),
            PathDelta::new(0, 100),
            PathDelta::new(5, 90),
        ]);
    }

    #[test]
    fn reader_walks_and_pads_with_zero() {
        let section = TrackSection::straight("test", 3);
        let mut reader = PathReader::new(&section, 1);
        assert_eq!(reader.next_pair(), (0, 200));
        assert_eq!(reader.position(), 3);
        // Past the authored path
        assert_eq!(reader.next_delta(), PathDelta::ZERO);
    }

    #[test]
    fn sum_next_wraps_in_16_bits() {
        let section = TrackSection::from_path("wrap", vec![PathDelta::new(0x4000, 1); 4]);
        let mut reader = PathReader::new(&section, 0);
        let sum = reader.sum_next(2);
        assert_eq!(sum, PathDelta::new(i16::MIN, 2));
    }
}
