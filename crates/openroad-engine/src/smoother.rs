//! Horizon smoother: re-interpolates the profile around each slope change so
//! crests do not show as hard kinks, then reads the horizon screen Y
//!
//! Around a bend at profile index `d0` a window of `d0 ± d0/8` is resampled at
//! five points, blended in thirds and redrawn as four straight quarters. The
//! window's first entry is rewritten with its own value and its last entry is
//! not touched, so both ends keep their heights.

use openroad_common::Fixed1616;

use crate::profile::UndulationList;
use crate::quad::{Quadrant, QUADRANT_LEN};

/// Last profile index a window may reach
const PROFILE_LAST: i16 = 0x1FF;
/// Windows whose quarter is this short or shorter end smoothing
const MIN_QUARTER: i16 = 2;
const HORIZON_Y_BASE: i16 = 224;

/// Resampling window around one bend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunWindow {
    pub centre: i16,
    /// Half-width, an eighth of the bend's depth
    pub eighth: i16,
    /// Length of each redrawn quarter
    pub quarter: i16,
}

impl RunWindow {
    /// Window for a bend at `depth`, or `None` when it is too short to smooth
    pub fn at(depth: i16) -> Option<Self> {
        let mut centre = depth;
        let mut eighth = depth >> 3;
        let overshoot = eighth + centre - PROFILE_LAST;
        if overshoot > 0 {
            eighth = (eighth + eighth - overshoot) >> 1;
            centre = PROFILE_LAST - eighth;
        }
        let quarter = eighth >> 1;
        if quarter <= MIN_QUARTER {
            return None;
        }
        Some(Self {
            centre,
            eighth,
            quarter,
        })
    }

    pub fn first(&self) -> i16 {
        self.centre - self.eighth
    }

    pub fn last(&self) -> i16 {
        self.centre + self.eighth
    }
}

fn at(quadrant: &Quadrant, index: i16) -> i16 {
    quadrant[index as usize & (QUADRANT_LEN - 1)]
}

fn third(sum: i32) -> i32 {
    Fixed1616::ONE_THIRD.mul_int(sum)
}

fn smooth_window(quadrant: &mut Quadrant, w: RunWindow) {
    let y0 = at(quadrant, w.first());
    let y1 = at(quadrant, w.centre - w.quarter);
    let y2 = at(quadrant, w.centre);
    let y3 = at(quadrant, w.centre + w.quarter);
    let y4 = at(quadrant, w.last());

    let mid = third(i32::from(y2) + i32::from(y0) + i32::from(y4));
    let near = third(i32::from(y1) + i32::from(y0) + i32::from(mid as i16));
    let far = third(i32::from(y3) + i32::from(y4) + i32::from(mid as i16));

    let quarter = i32::from(w.quarter);
    let drops = [
        i32::from(y0.wrapping_sub(near as i16)),
        near - i32::from(mid as i16),
        mid - i32::from(far as i16),
        far - i32::from(y4),
    ];

    let mut acc = y0.wrapping_shl(2);
    let mut addr = w.first() as usize;
    for drop in drops {
        let slope = ((drop << 2) / quarter) as i16;
        for _ in 0..w.quarter {
            quadrant[addr & (QUADRANT_LEN - 1)] = acc >> 2;
            addr += 1;
            acc = acc.wrapping_sub(slope);
        }
    }
}

/// Smooth every bend in `undulations`, nearest first. Stops at the first
/// bend too close to the horizon. Returns the number of windows redrawn.
pub fn smooth(quadrant: &mut Quadrant, undulations: &UndulationList) -> usize {
    let mut smoothed = 0;
    for (depth, _) in undulations.runs() {
        let Some(window) = RunWindow::at(depth) else {
            break;
        };
        smooth_window(quadrant, window);
        smoothed += 1;
    }
    smoothed
}

/// Screen Y of the horizon from the first profile entry
pub fn horizon_y(quadrant: &Quadrant) -> i16 {
    HORIZON_Y_BASE - (quadrant[0] >> 4)
}
