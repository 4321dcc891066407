//! Profile interpolator: expands the elevation progress pair into 512
//! accumulated profile heights
//!
//! The profile is split into seven depth bands whose lengths come from
//! `height_end` by repeated halving. Each band adds a constant change per
//! entry to a running total; between bands the next height word bends the
//! slope. Every bend is recorded in the undulation list for the horizon
//! smoother.

use openroad_common::{Fixed1616, Fixed88};
use openroad_track::{HeightMap, HEIGHT_END};
use serde::Serialize;
use std::cmp::Ordering;

use crate::elevation::{Elevation, ElevationStateMachine, HeightMode, MIXED_LOOKAHEAD};
use crate::quad::{Quadrant, PROFILE_LEN};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

pub const SECTION_COUNT: usize = 7;
/// Largest change per profile entry
pub const MAX_CHANGE_PER_ENTRY: i32 = 0x10000;
pub const UNDULATION_LEN: usize = 32;
/// First undulation entry: the nearest profile index
pub const NEAREST_RUN: i16 = 0x1FF;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// (profile index, height) pairs where the slope changes, ending with 0
#[derive(Debug, Clone, Serialize)]
pub struct UndulationList {
    entries: [i16; UNDULATION_LEN],
}

impl Default for UndulationList {
    fn default() -> Self {
        Self {
            entries: [0; UNDULATION_LEN],
        }
    }
}

impl UndulationList {
    /// List holding `runs` followed by the terminator
    pub fn from_runs(runs: &[(i16, i16)]) -> Self {
        let mut list = Self::default();
        for (i, (index, height)) in runs.iter().take(UNDULATION_LEN / 2 - 1).enumerate() {
            list.entries[i * 2] = *index;
            list.entries[i * 2 + 1] = *height;
        }
        list
    }

    pub fn entries(&self) -> &[i16; UNDULATION_LEN] {
        &self.entries
    }

    /// Pairs up to the terminating zero
    pub fn runs(&self) -> impl Iterator<Item = (i16, i16)> + '_ {
        self.entries
            .chunks_exact(2)
            .map(|pair| (pair[0], pair[1]))
            .take_while(|(index, _)| *index != 0)
    }

    fn set(&mut self, at: usize, value: i16) {
        if let Some(slot) = self.entries.get_mut(at) {
            *slot = value;
        }
    }
}

/// What the interpolator wrote this tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ProfileOutcome {
    /// Seven-band interpolation
    Interpolated { lengths: [u16; SECTION_COUNT] },
    /// Straight horizon ramp
    Horizon,
    /// No block loaded
    Skipped,
}

/// Depth band lengths for a given `height_end`. Always sums to 0x200.
pub fn section_lengths(end: Fixed88) -> [u16; SECTION_COUNT] {
    let end = end.raw().min(0x1FF);
    let mut lengths = [0u16; SECTION_COUNT];
    lengths[0] = 0x1FF - end;
    lengths[1] = end >> 1;

    let mut rest = 0x200 - lengths[0] - lengths[1];
    for length in &mut lengths[2..SECTION_COUNT - 1] {
        let half = rest >> 1;
        *length = half;
        rest -= half;
    }
    lengths[SECTION_COUNT - 1] = rest;
    lengths
}

// ---------------------------------------------------------------------------
// Interpolation
// ---------------------------------------------------------------------------

/// Write the profile for the active block into `quadrant`
pub fn write_profile(
    machine: &mut ElevationStateMachine,
    heights: &HeightMap,
    quadrant: &mut Quadrant,
    undulations: &mut UndulationList,
) -> ProfileOutcome {
    match machine.mode {
        Some(HeightMode::HorizonAdjust { horizon_mod }) => {
            write_horizon(machine, heights, horizon_mod, quadrant, undulations);
            ProfileOutcome::Horizon
        }
        Some(mode) => {
            let lengths = interpolate(machine, mode, heights, quadrant, undulations);
            ProfileOutcome::Interpolated { lengths }
        }
        None => ProfileOutcome::Skipped,
    }
}

fn interpolate(
    machine: &mut ElevationStateMachine,
    mode: HeightMode,
    heights: &HeightMap,
    quadrant: &mut Quadrant,
    undulations: &mut UndulationList,
) -> [u16; SECTION_COUNT] {
    let progress = machine.progress;
    let lengths = section_lengths(progress.end);
    let mut a1 = progress
        .addr
        .wrapping_add((i32::from(progress.index) * 2) as u32);

    undulations.set(0, NEAREST_RUN);
    undulations.set(1, 0);
    let mut cursor = 2;

    let final_height = (i32::from(heights.read16(a1)) * progress.start.progress()) >> 4;
    let horizon_shift = machine.horizon_base << 4;
    let mut change = horizon_shift;
    if let HeightMode::DelayedHold { lift_horizon: true, .. } = mode {
        change += final_height;
    }

    let mut y_addr = PROFILE_LEN;
    let mut scanline: i16 = 0x200;
    let mut total = Fixed1616::ZERO;

    for (band, length) in lengths.iter().enumerate() {
        change = change.min(MAX_CHANGE_PER_ENTRY);
        let band_start = change;

        let last = *length as i16 - 1;
        scanline -= last;
        for _ in 0..*length {
            total += Fixed1616::from_raw(change);
            y_addr -= 1;
            quadrant[y_addr] = total.to_fixed124();
        }

        let counter = band + 1;
        if counter == SECTION_COUNT {
            break;
        }

        // Slope for the next band
        match mode {
            HeightMode::DelayedHold { lift_horizon, .. } => {
                if !lift_horizon {
                    change += final_height;
                }
            }
            HeightMode::MixedLookaheadHold { .. } if progress.index >= MIXED_LOOKAHEAD => {
                change += final_height;
            }
            _ => {
                change = (i32::from(heights.read16(a1)) << 4) + band_start;
                a1 = a1.wrapping_add(2);
                if counter == 1 {
                    change -= final_height;
                    match change.cmp(&horizon_shift) {
                        Ordering::Greater => machine.progress.elevation = Elevation::Up,
                        Ordering::Less => machine.progress.elevation = Elevation::Down,
                        Ordering::Equal => {}
                    }
                }
            }
        }

        if band_start != change {
            undulations.set(cursor, scanline);
            undulations.set(cursor + 1, total.abs().to_fixed124());
            cursor += 2;
        }
    }

    undulations.set(cursor, 0);

    if heights.read16(a1) == HEIGHT_END {
        tracing::debug!("Height entry {} exhausted", machine.lookup_active);
        machine.finish_segment();
    }
    lengths
}

/// Even ramp towards a shifted horizon
fn write_horizon(
    machine: &mut ElevationStateMachine,
    heights: &HeightMap,
    horizon_mod: i32,
    quadrant: &mut Quadrant,
    undulations: &mut UndulationList,
) {
    let start = machine.progress.start;
    let shift = horizon_mod.wrapping_mul(start.progress()) >> 4;
    let change = (machine.horizon_base << 4).wrapping_add(shift) as u32;

    let mut total = 0u32;
    for entry in quadrant[..PROFILE_LEN].iter_mut().rev() {
        total = total.wrapping_add(change);
        *entry = (total.wrapping_shl(4) >> 16) as i16;
    }
    undulations.set(0, 0);

    if start.is_saturated() {
        machine.horizon_base = i32::from(heights.read16(machine.progress.addr));
        tracing::debug!("Horizon base now {:#x}", machine.horizon_base);
        machine.finish_segment();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elevation::HeightPhase;
    use crate::quad::QUADRANT_LEN;
    use openroad_track::HeightBlockDef;

    fn loaded(blocks: &[HeightBlockDef], lookup: u16) -> (ElevationStateMachine, HeightMap) {
        let heights = HeightMap::from_blocks(blocks);
        let mut machine = ElevationStateMachine::new(0x240);
        machine.phase = HeightPhase::LoadNext;
        machine.lookup = lookup;
        machine.tick(&heights, 0);
        (machine, heights)
    }

    #[test]
    fn section_lengths_always_cover_profile() {
        for end in 0..=0x1FFu16 {
            let lengths = section_lengths(Fixed88::from_raw(end));
            let sum: u16 = lengths.iter().sum();
            assert_eq!(sum, 0x200, "height_end {:#x} gives {:?}", end, lengths);
        }
    }

    #[test]
    fn section_lengths_at_transition_start() {
        assert_eq!(
            section_lengths(Fixed88::START),
            [0xFF, 0x80, 0x40, 0x20, 0x10, 0x08, 0x09]
        );
    }

    #[test]
    fn flat_block_gives_even_ramp() {
        let flat = HeightBlockDef::Elevation {
            step: 1,
            down_mult: 1,
            up_mult: 1,
            heights: vec![0; 12],
        };
        let (mut machine, heights) = loaded(&[flat], 0);
        let mut quadrant: Quadrant = [0; QUADRANT_LEN];
        let mut undulations = UndulationList::default();

        let outcome = write_profile(&mut machine, &heights, &mut quadrant, &mut undulations);
        assert!(matches!(outcome, ProfileOutcome::Interpolated { .. }));

        // 0x240 << 4 per entry, stored as 12.4
        assert_eq!(quadrant[0x1FF], 2);
        assert_eq!(quadrant[0], 0x480);
        assert!(quadrant[..PROFILE_LEN].windows(2).all(|w| w[0] >= w[1]));
        assert_eq!(undulations.runs().collect::<Vec<_>>(), vec![(NEAREST_RUN, 0)]);
        assert_eq!(machine.progress.elevation, Elevation::Flat);
        assert_eq!(machine.phase, HeightPhase::Running);
    }

    #[test]
    fn rise_records_bend_and_climbs() {
        let hill = HeightBlockDef::Elevation {
            step: 1,
            down_mult: 1,
            up_mult: 1,
            heights: vec![0x40, 0x40, 0, 0, 0, 0, 0, 0],
        };
        let (mut machine, heights) = loaded(&[hill], 0);
        let mut quadrant: Quadrant = [0; QUADRANT_LEN];
        let mut undulations = UndulationList::default();
        write_profile(&mut machine, &heights, &mut quadrant, &mut undulations);

        assert_eq!(machine.progress.elevation, Elevation::Up);
        let runs: Vec<_> = undulations.runs().collect();
        assert!(runs.len() >= 2, "expected a bend, got {:?}", runs);
        // Bends are listed nearest first
        assert!(runs.windows(2).all(|w| w[0].0 > w[1].0));
    }

    #[test]
    fn terminator_loads_next_block() {
        let (mut machine, heights) = loaded(&[HeightBlockDef::flat()], 0);
        let mut quadrant: Quadrant = [0; QUADRANT_LEN];
        let mut undulations = UndulationList::default();
        write_profile(&mut machine, &heights, &mut quadrant, &mut undulations);
        assert_eq!(machine.phase, HeightPhase::LoadNext);
    }

    #[test]
    fn hold_block_does_not_walk_heights() {
        let hold = HeightBlockDef::Hold {
            step: 4,
            delay: 10,
            heights: vec![0x20, 0x20],
            horizon_lift: false,
        };
        let (mut machine, heights) = loaded(&[HeightBlockDef::flat(), hold], 1);
        let mut quadrant: Quadrant = [0; QUADRANT_LEN];
        let mut undulations = UndulationList::default();
        write_profile(&mut machine, &heights, &mut quadrant, &mut undulations);
        // Height word at index 0 is not the terminator
        assert_eq!(machine.phase, HeightPhase::Running);

        machine.progress.index = 2;
        write_profile(&mut machine, &heights, &mut quadrant, &mut undulations);
        assert_eq!(machine.phase, HeightPhase::LoadNext);
    }

    #[test]
    fn horizon_block_moves_base_at_saturation() {
        let gate = HeightBlockDef::Horizon {
            step: 2,
            horizon: 0x300,
        };
        let (mut machine, heights) = loaded(&[HeightBlockDef::flat(), gate], 1);
        let mut quadrant: Quadrant = [0; QUADRANT_LEN];
        let mut undulations = UndulationList::default();

        assert_eq!(
            write_profile(&mut machine, &heights, &mut quadrant, &mut undulations),
            ProfileOutcome::Horizon
        );
        assert_eq!(undulations.runs().count(), 0);
        assert_eq!(machine.horizon_base, 0x240);
        assert_eq!(quadrant[0], 0x480);

        machine.progress.start = Fixed88::SATURATED;
        write_profile(&mut machine, &heights, &mut quadrant, &mut undulations);
        assert_eq!(machine.horizon_base, 0x300);
        assert_eq!(machine.phase, HeightPhase::LoadNext);
    }

    #[test]
    fn unknown_block_writes_nothing() {
        let (mut machine, heights) = loaded(&[HeightBlockDef::Raw { bytes: vec![7, 1] }], 0);
        let mut quadrant: Quadrant = [5; QUADRANT_LEN];
        let mut undulations = UndulationList::default();
        assert_eq!(
            write_profile(&mut machine, &heights, &mut quadrant, &mut undulations),
            ProfileOutcome::Skipped
        );
        assert!(quadrant.iter().all(|v| *v == 5));
    }
}
