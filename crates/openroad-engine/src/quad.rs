//! Rotating four-quadrant scanline Y table
//!
//! Each quadrant holds:
//! - 0x000..0x200: raw elevation profile (12.4), written downward from 0x200
//! - 0x280..0x300: priority run list, (line select, height) pairs ending (0, 0)
//! - 0x300..0x400: rasterized hardware lines, written downward from 0x400
//!
//! After `k` rotations quadrant `slot` is `(slot + k) mod 4`. The write slot
//! of one tick becomes the previous slot of the next, the horizon slot two
//! ticks on and the blit slot three ticks on.

use serde::Serialize;

pub const QUADRANT_LEN: usize = 0x400;
pub const QUADRANT_COUNT: usize = 4;
/// Profile entries per quadrant
pub const PROFILE_LEN: usize = 0x200;
pub const PRIORITY_START: usize = 0x280;
pub const PRIORITY_END: usize = 0x300;
/// Priority pairs that fit before the sentinel
pub const PRIORITY_CAPACITY: usize = (PRIORITY_END - PRIORITY_START) / 2 - 1;
pub const OUTPUT_END: usize = 0x400;

/// Role of a quadrant relative to the current tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Slot {
    /// Written last tick
    Previous = 0,
    /// Written this tick
    Write = 1,
    /// Written three ticks ago, handed to the hardware blit
    Blit = 2,
    /// Written two ticks ago, source of the horizon position
    Horizon = 3,
}

pub type Quadrant = [i16; QUADRANT_LEN];

#[derive(Debug, Clone)]
pub struct ScanlineYTable {
    quadrants: [Quadrant; QUADRANT_COUNT],
    rotation: u8,
}

impl Default for ScanlineYTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ScanlineYTable {
    pub fn new() -> Self {
        Self {
            quadrants: [[0; QUADRANT_LEN]; QUADRANT_COUNT],
            rotation: 0,
        }
    }

    /// Rotations so far, mod 4
    pub fn rotation(&self) -> u8 {
        self.rotation
    }

    pub fn rotate(&mut self) {
        self.rotation = (self.rotation + 1) & 3;
    }

    pub fn quadrant_index(&self, slot: Slot) -> usize {
        usize::from((slot as u8 + self.rotation) & 3)
    }

    pub fn quadrant(&self, slot: Slot) -> &Quadrant {
        &self.quadrants[self.quadrant_index(slot)]
    }

    pub fn quadrant_mut(&mut self, slot: Slot) -> &mut Quadrant {
        let index = self.quadrant_index(slot);
        &mut self.quadrants[index]
    }

    /// Priority pairs of a quadrant up to the (0, 0) sentinel
    pub fn priority_runs(&self, slot: Slot) -> Vec<(i16, i16)> {
        self.quadrant(slot)[PRIORITY_START..PRIORITY_END]
            .chunks_exact(2)
            .map(|pair| (pair[0], pair[1]))
            .take_while(|pair| *pair != (0, 0))
            .collect()
    }

    /// Screen Y of profile entry `index` from last tick's quadrant
    pub fn road_y(&self, index: usize) -> i16 {
        let value = self.quadrant(Slot::Previous)[index & (QUADRANT_LEN - 1)];
        223 - (value >> 4)
    }

    pub fn clear(&mut self) {
        self.quadrants = [[0; QUADRANT_LEN]; QUADRANT_COUNT];
        self.rotation = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slots_start_at_identity() {
        let table = ScanlineYTable::new();
        assert_eq!(table.quadrant_index(Slot::Previous), 0);
        assert_eq!(table.quadrant_index(Slot::Write), 1);
        assert_eq!(table.quadrant_index(Slot::Blit), 2);
        assert_eq!(table.quadrant_index(Slot::Horizon), 3);
    }

    #[test]
    fn write_slot_ages_through_every_role() {
        let mut table = ScanlineYTable::new();
        table.rotate();
        let written = table.quadrant_index(Slot::Write);
        table.quadrant_mut(Slot::Write)[0] = 42;

        table.rotate();
        assert_eq!(table.quadrant_index(Slot::Previous), written);
        table.rotate();
        assert_eq!(table.quadrant_index(Slot::Horizon), written);
        table.rotate();
        assert_eq!(table.quadrant_index(Slot::Blit), written);
        assert_eq!(table.quadrant(Slot::Blit)[0], 42);
        table.rotate();
        assert_eq!(table.quadrant_index(Slot::Write), written);
    }

    #[test]
    fn rotation_never_skips() {
        let mut table = ScanlineYTable::new();
        let mut seen = Vec::new();
        for _ in 0..8 {
            table.rotate();
            seen.push(table.quadrant_index(Slot::Write));
        }
        assert_eq!(seen, vec![2, 3, 0, 1, 2, 3, 0, 1]);
    }

    #[test]
    fn priority_runs_stop_at_sentinel() {
        let mut table = ScanlineYTable::new();
        let q = table.quadrant_mut(Slot::Previous);
        q[PRIORITY_START..PRIORITY_START + 6].copy_from_slice(&[0x120, 5, 0x80, 3, 0, 0]);
        q[PRIORITY_START + 6] = 99;
        assert_eq!(table.priority_runs(Slot::Previous), vec![(0x120, 5), (0x80, 3)]);
    }

    #[test]
    fn road_y_converts_profile() {
        let mut table = ScanlineYTable::new();
        table.quadrant_mut(Slot::Previous)[10] = 0x100;
        assert_eq!(table.road_y(10), 223 - 0x10);
    }
}
