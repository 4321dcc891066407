//! Scanline rasterizer: turns a quadrant's profile into the line-select table
//! the road hardware stretches the road texture with, plus the crest priority
//! list used to clip sprites
//!
//! The profile is walked from the nearest entry outward. Each entry that
//! climbs above the highest screen line seen so far emits the entry index as
//! the next hardware line. An entry that drops below it after a climb marks a
//! crest and is pushed onto the priority list. Lines left above the road are
//! filled with a horizon colour ramp.

use serde::Serialize;

use crate::quad::{Quadrant, OUTPUT_END, PRIORITY_CAPACITY, PRIORITY_END, PRIORITY_START, PROFILE_LEN};

/// Hardware lines available above the first one
const SCANLINES: i16 = 254;
/// First hardware line: the nearest profile entry
const NEAREST_LINE: i16 = 0x1FF;
const HORIZON_FILL: i16 = 0x800;
const HORIZON_FILL_LAST: i16 = 0x83F;
const HORIZON_RAMP_MAX: i16 = 0x3F;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RasterStats {
    /// Hardware lines written, horizon fill included
    pub lines: usize,
    pub priority_runs: usize,
    /// Crests dropped because the priority list was full
    pub overflowed: bool,
}

struct Writer<'a> {
    q: &'a mut Quadrant,
    dst: usize,
    prio: usize,
    stats: RasterStats,
}

impl Writer<'_> {
    fn line(&mut self, value: i16) {
        if self.dst > PRIORITY_END {
            self.dst -= 1;
            self.q[self.dst] = value;
            self.stats.lines += 1;
        }
    }

    fn priority(&mut self, line: i16, height: i16) {
        if self.stats.priority_runs >= PRIORITY_CAPACITY {
            if !self.stats.overflowed {
                tracing::warn!("Priority list full, dropping crest at line {:#x}", line);
            }
            self.stats.overflowed = true;
            return;
        }
        self.q[self.prio] = line;
        self.q[self.prio + 1] = height;
        self.prio += 2;
        self.stats.priority_runs += 1;
    }

    fn finish(self) -> RasterStats {
        self.q[self.prio] = 0;
        self.q[self.prio + 1] = 0;
        self.stats
    }
}

/// Rasterize the profile in `quadrant` into its output and priority regions
pub fn rasterize(quadrant: &mut Quadrant) -> RasterStats {
    let mut src = PROFILE_LEN - 1;
    let mut this = quadrant[src] >> 4;
    let mut next = this;

    let mut w = Writer {
        q: quadrant,
        dst: OUTPUT_END,
        prio: PRIORITY_START,
        stats: RasterStats::default(),
    };
    w.line(NEAREST_LINE);

    let mut scanline = SCANLINES;
    let mut write_priority = false;
    let mut rom_line = NEAREST_LINE;

    loop {
        rom_line -= 1;
        if rom_line <= 0 {
            break;
        }
        src -= 1;
        next = w.q[src] >> 4;

        if this < next {
            scanline -= 1;
            if scanline <= 0 {
                return w.finish();
            }
            this = next;
            w.line(rom_line);
            write_priority = true;
        } else if this > next && write_priority {
            w.priority(rom_line, this);
            write_priority = false;
        }
    }

    // Profile exhausted: ramp the horizon colour up, two lines per shade
    let mut shade = (255 - next).wrapping_sub(scanline);
    if shade < 0 {
        shade = HORIZON_FILL;
    } else if shade > HORIZON_RAMP_MAX {
        while scanline > 0 {
            scanline -= 1;
            w.line(HORIZON_FILL_LAST);
        }
        return w.finish();
    } else {
        shade |= HORIZON_FILL;
    }

    loop {
        for _ in 0..2 {
            w.line(shade);
            scanline -= 1;
            if scanline < 0 {
                return w.finish();
            }
        }
        shade += 1;
        if shade > HORIZON_FILL_LAST {
            break;
        }
    }

    while scanline > 0 {
        scanline -= 1;
        w.line(HORIZON_FILL_LAST);
    }
    w.finish()
}
