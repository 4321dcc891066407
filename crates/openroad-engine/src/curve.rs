//! Curve generator: track path deltas to per-scanline road X offsets
//!
//! The direction of the next two path entries gives a unit vector (scaled by
//! 2^14). Up to 33 further delta pairs are accumulated and each running total
//! is projected onto that vector, giving how far across (curve increment) and
//! how far into the screen (curve end) the road has moved. X offsets are then
//! interpolated between successive increments, nearest scanline first.

use openroad_common::isqrt;
use openroad_track::{PathReader, TrackData};
use serde::Serialize;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

pub const ROAD_X_LEN: usize = 0x200;
/// "No data here, reuse the last good value"
pub const ROAD_X_SENTINEL: i16 = 0x3210;
/// Horizon-side entries reset to the sentinel before each pass
pub const SENTINEL_FILL: usize = 0x80;
/// Delta pairs sampled per pass
pub const CURVE_SAMPLES: usize = 0x21;
/// Largest legal offset
pub const CURVE_X_LIMIT: i16 = 0x3200;
/// Nearest scanline written
pub const FIRST_SCANLINE: i16 = 0x1BF;
/// Denominator bias in the perspective divide
const CURVE_BIAS: i32 = 0x410;
/// Unit vector scale
const DIRECTION_SHIFT: u32 = 14;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Per-scanline horizontal offsets, index 0 furthest into the horizon
#[derive(Debug, Clone, Serialize)]
pub struct ScanlineXTable {
    #[serde(serialize_with = "serialize_slice")]
    entries: [i16; ROAD_X_LEN],
}

fn serialize_slice<S: serde::Serializer>(v: &[i16; ROAD_X_LEN], s: S) -> Result<S::Ok, S::Error> {
    s.collect_seq(v.iter())
}

impl Default for ScanlineXTable {
    fn default() -> Self {
        Self {
            entries: [0; ROAD_X_LEN],
        }
    }
}

impl ScanlineXTable {
    pub fn entries(&self) -> &[i16; ROAD_X_LEN] {
        &self.entries
    }

    pub fn get(&self, scanline: usize) -> i16 {
        self.entries[scanline & (ROAD_X_LEN - 1)]
    }

    pub fn is_sentinel(&self, scanline: usize) -> bool {
        self.get(scanline) == ROAD_X_SENTINEL
    }
}

/// A table pass that finished
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Written {
    /// Entries written
    pub entries: usize,
}

/// Why a table pass stopped early. Entries not yet reached keep their
/// previous values.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aborted {
    #[error("path chord at {position} has zero length")]
    DegenerateChord { position: u32 },

    #[error("curve denominator is zero at sample {sample}")]
    ZeroDenominator { sample: usize },

    #[error("curve end went backwards at sample {sample} ({start} -> {end})")]
    NegativeSpan { sample: usize, start: i16, end: i16 },

    #[error("offset {value:#x} out of range at scanline {scanline:#x}")]
    OutOfRange { scanline: i16, value: i16 },
}

pub type WriteResult = Result<Written, Aborted>;

/// Direction of the road ahead, scaled by 2^14
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Direction {
    pub x: i16,
    pub y: i16,
}

impl Direction {
    /// Unit vector along a chord. `None` for a zero-length chord.
    pub fn from_chord(x: i16, y: i16) -> Option<Self> {
        let (wx, wy) = (i32::from(x), i32::from(y));
        let distance = isqrt((wx * wx) as u32 + (wy * wy) as u32) as u16;
        if distance == 0 {
            return None;
        }
        let distance = i32::from(distance);
        Some(Self {
            x: ((wx << DIRECTION_SHIFT) / distance) as i16,
            y: ((wy << DIRECTION_SHIFT) / distance) as i16,
        })
    }
}

/// Projection of one accumulated sample
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurvePoint {
    /// Sideways offset reached
    pub inc: i16,
    /// Scanlines consumed so far
    pub end: i16,
}

/// Project accumulated path totals onto the road direction
pub fn create_curve(total_x: i32, total_y: i32, dir: Direction) -> Option<CurvePoint> {
    let (tx, ty) = (total_x >> 5, total_y >> 5);
    let (dx, dy) = (i32::from(dir.x), i32::from(dir.y));

    let cross = tx.wrapping_mul(dy).wrapping_sub(ty.wrapping_mul(dx));
    let dot = tx.wrapping_mul(dx).wrapping_add(ty.wrapping_mul(dy)) >> 7;
    let denom = (dot >> 7) + CURVE_BIAS;
    if denom == 0 {
        return None;
    }

    Some(CurvePoint {
        inc: cross.wrapping_div(denom) as i16,
        end: dot.wrapping_div(denom).wrapping_mul(4) as i16,
    })
}

// ---------------------------------------------------------------------------
// Generator
// ---------------------------------------------------------------------------

/// Fill `road_x` from the path at `position`
pub fn generate(track: &dyn TrackData, position: u32, road_x: &mut ScanlineXTable) -> WriteResult {
    let (chord_x, chord_y) = PathReader::new(track, position).next_pair();
    let dir = Direction::from_chord(chord_x as i16, chord_y as i16)
        .ok_or(Aborted::DegenerateChord { position })?;

    road_x.entries[..SENTINEL_FILL].fill(ROAD_X_SENTINEL);

    let mut reader = PathReader::new(track, position);
    let (mut total_x, mut total_y) = (0i32, 0i32);
    let mut start = 0i16;
    let mut inc_old = 0i16;
    let mut scanline = FIRST_SCANLINE;
    let mut written = 0;

    for sample in 0..CURVE_SAMPLES {
        let (x, y) = reader.next_pair();
        total_x = total_x.wrapping_add(x);
        total_y = total_y.wrapping_add(y);

        let point = create_curve(total_x, total_y, dir).ok_or(Aborted::ZeroDenominator { sample })?;
        let steps = point.end.wrapping_sub(start);
        if steps < 0 {
            return Err(Aborted::NegativeSpan {
                sample,
                start,
                end: point.end,
            });
        }
        if steps == 0 {
            continue;
        }

        let xinc = (i32::from(point.inc) - i32::from(inc_old)) / i32::from(steps);
        let mut x = inc_old;
        for _ in 0..=steps {
            x = (i32::from(x) + xinc) as i16;
            if !(-CURVE_X_LIMIT..=CURVE_X_LIMIT).contains(&x) {
                return Err(Aborted::OutOfRange { scanline, value: x });
            }
            road_x.entries[scanline as usize] = x;
            written += 1;
            scanline -= 1;
            if scanline < 0 {
                return Ok(Written { entries: written });
            }
        }

        inc_old = point.inc;
        start = point.end;
    }

    Ok(Written { entries: written })
}

/// Background tilemap scroll target from the next four path deltas.
/// Compass codes: +y 0x000, +x 0x200, -y 0x400, -x 0x600, with the
/// in-between headings interpolated.
pub fn tilemap_target(track: &dyn TrackData, position: u32) -> i16 {
    let sum = PathReader::new(track, position).sum_next(4);
    let (x, y) = (sum.x, sum.y);
    let steep = y.wrapping_abs() > x.wrapping_abs();

    let mut scroll = if steep {
        ((0x100 * i32::from(x)) / i32::from(y)) as i16
    } else if x != 0 {
        ((-0x100 * i32::from(y)) / i32::from(x)) as i16
    } else {
        0
    };

    let quadrant: i16 = if x > 0 || (x == 0 && y >= 0) { 0x200 } else { 0x600 };
    scroll = scroll.wrapping_add(quadrant);

    if steep {
        if i32::from(x) * i32::from(y) >= 0 {
            scroll = scroll.wrapping_sub(0x200);
        } else {
            scroll = scroll.wrapping_add(0x200);
        }
    }
    scroll
}

#[cfg(test)]
mod tests {
    use super::*;
    use openroad_track::{PathDelta, TrackSection};

    fn curving_right(len: usize) -> TrackSection {
        // First chord points straight up +y, then the road bends towards +x
        let path = (0..len)
            .map(|i| PathDelta::new((i.saturating_sub(1) * 2) as i16, 100))
            .collect();
        TrackSection::from_path("right", path)
    }

    #[test]
    fn straight_road_has_no_offset() {
        let track = TrackSection::straight("straight", 200);
        let mut road_x = ScanlineXTable::default();
        let written = generate(&track, 0, &mut road_x).unwrap();
        assert!(written.entries > 0);
        for (i, x) in road_x.entries().iter().enumerate() {
            assert!(*x == 0 || *x == ROAD_X_SENTINEL, "entry {:#x} is {:#x}", i, x);
        }
        assert!(road_x.is_sentinel(0));
        assert!(road_x.is_sentinel(SENTINEL_FILL - 1));
        assert_eq!(road_x.get(FIRST_SCANLINE as usize), 0);
    }

    #[test]
    fn straight_chord_direction() {
        let dir = Direction::from_chord(0, 200).unwrap();
        assert_eq!(dir, Direction { x: 0, y: 0x4000 });
        assert!(Direction::from_chord(0, 0).is_none());
    }

    #[test]
    fn curve_end_grows_with_distance() {
        let dir = Direction { x: 0, y: 0x4000 };
        let near = create_curve(0, 400, dir).unwrap();
        let far = create_curve(0, 6600, dir).unwrap();
        assert_eq!(near, CurvePoint { inc: 0, end: 4 });
        assert!(far.end > near.end);
        assert_eq!(far.inc, 0);
    }

    #[test]
    fn right_curve_offsets_one_way() {
        let track = curving_right(100);
        let mut road_x = ScanlineXTable::default();
        generate(&track, 0, &mut road_x).unwrap();

        let curve: Vec<i16> = road_x.entries()[SENTINEL_FILL..=FIRST_SCANLINE as usize].to_vec();
        assert!(curve.iter().all(|x| *x >= 0), "offsets must all bend one way");
        assert!(curve.iter().any(|x| *x > 0), "curve must bend");
    }

    #[test]
    fn zero_chord_aborts_untouched() {
        let track = TrackSection::from_path("empty", Vec::new());
        let mut road_x = ScanlineXTable::default();
        let err = generate(&track, 0, &mut road_x).unwrap_err();
        assert_eq!(err, Aborted::DegenerateChord { position: 0 });
        assert!(road_x.entries().iter().all(|x| *x == 0));
    }

    #[test]
    fn tilemap_compass_codes() {
        let heading = |dx, dy| {
            let track = TrackSection::from_path("h", vec![PathDelta::new(dx, dy); 4]);
            tilemap_target(&track, 0)
        };
        assert_eq!(heading(0, 100), 0x000);
        assert_eq!(heading(100, 0), 0x200);
        assert_eq!(heading(0, -100), 0x400);
        assert_eq!(heading(-100, 0), 0x600);
    }

    #[test]
    fn tilemap_without_path_does_not_divide_by_zero() {
        let track = TrackSection::from_path("none", Vec::new());
        assert_eq!(tilemap_target(&track, 0), 0x200);
    }

    #[test]
    fn tilemap_slight_right_turn() {
        let track = TrackSection::from_path("slight", vec![PathDelta::new(10, 100); 4]);
        // 0x100 * 40 / 400 = 0x19, nudged right of north
        assert_eq!(tilemap_target(&track, 0), 0x19);
    }
}
