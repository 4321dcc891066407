//! Road position trackers
//!
//! `RoadPosition` is the 16.16 distance along the current section. Its
//! integer part indexes the path. `GranularPosition` is a finer counter
//! advanced by `speed / 0x40` per tick that drives the elevation machine and
//! background strip scrolling.

use openroad_common::Fixed1616;
use serde::Serialize;

/// Speed units per fine position step
const FINE_DIVISOR: u16 = 0x40;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RoadPosition {
    pos: Fixed1616,
    old: u16,
    change: i32,
}

impl RoadPosition {
    pub fn value(&self) -> Fixed1616 {
        self.pos
    }

    /// Integer part, the path index
    pub fn index(&self) -> u32 {
        u32::from(self.pos.index())
    }

    /// Whole units moved between the last two latches
    pub fn change(&self) -> i32 {
        self.change
    }

    pub fn advance(&mut self, by: Fixed1616) {
        self.pos = self.pos.wrapping_add(by);
    }

    /// Record the movement since the previous latch. Called once per tick.
    pub fn latch(&mut self) -> i32 {
        let now = self.pos.index();
        self.change = i32::from(now) - i32::from(self.old);
        self.old = now;
        self.change
    }

    /// Back to the start of a section. The next latch sees the jump.
    pub fn reset(&mut self) {
        self.pos = Fixed1616::ZERO;
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GranularPosition {
    pub fine: u16,
    remainder: u16,
}

impl GranularPosition {
    pub fn advance(&mut self, speed: u16) {
        let mut steps = speed / FINE_DIVISOR;
        self.remainder += speed % FINE_DIVISOR;
        if self.remainder >= FINE_DIVISOR {
            self.remainder -= FINE_DIVISOR;
            steps += 1;
        }
        self.fine = self.fine.wrapping_add(steps);
    }
}
