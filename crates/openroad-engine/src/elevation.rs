//! Elevation state machine
//!
//! Each height table block starts with a control byte picking one of four
//! modes and a step-adjust byte that scales how fast the block is driven
//! through. Every tick the fine position delta (times 12) is added to a step
//! accumulator, and the step over a mode-specific divisor gives the progress
//! pair `start`/`end` in 0x100..=0x1FF.
//!
//! - `Elevation`: one ramp per height entry, slowed by the up/down multiplier
//! - `DelayedHold`: ramp up, hold for a driven-distance delay, ramp down
//! - `MixedLookaheadHold`: six lookahead entries, then a hold, then ramp down
//! - `HorizonAdjust`: one ramp moving the horizon base itself

use openroad_common::Fixed88;
use openroad_track::HeightMap;
use serde::Serialize;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Fine position to height step multiplier
pub const HEIGHT_STEP_SCALE: i32 = 12;
/// Height entries looked ahead before a mixed block holds
pub const MIXED_LOOKAHEAD: i16 = 6;
/// Divisor used while a mixed block looks ahead
const MIXED_LOOKAHEAD_DIVISOR: u16 = 4;
/// Bytes skipped once a mixed block's hold expires (six words)
const MIXED_SKIP_BYTES: u32 = 12;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Direction the road is heading, set by the profile interpolator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum Elevation {
    Down,
    #[default]
    Flat,
    Up,
}

/// Decoded height block mode with its private state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HeightMode {
    Elevation {
        down_mult: i8,
        up_mult: i8,
    },
    DelayedHold {
        /// Remaining hold distance
        delay: i16,
        /// Still before or inside the hold
        holding: bool,
        /// Block also raises the horizon (control byte 2)
        lift_horizon: bool,
    },
    MixedLookaheadHold {
        delay: i16,
        holding: bool,
    },
    HorizonAdjust {
        /// Horizon change applied at saturation
        horizon_mod: i32,
    },
}

/// Where the machine is in the segment lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HeightPhase {
    /// Drop any pending request and load entry 0
    Reset,
    /// Load the requested entry
    LoadNext,
    /// A block is active
    Running,
}

/// Progress through the active block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SegmentProgress {
    /// Height entry within the block
    pub index: i16,
    /// Added to `index` on the next tick
    pub inc: u16,
    /// Distance accumulator
    pub step: u16,
    pub step_adjust: u16,
    pub elevation: Elevation,
    /// Byte address of the block's height words
    pub addr: u32,
    pub start: Fixed88,
    pub end: Fixed88,
}

impl Default for SegmentProgress {
    fn default() -> Self {
        Self {
            index: 0,
            inc: 0,
            step: 1,
            step_adjust: 1,
            elevation: Elevation::Flat,
            addr: 0,
            start: Fixed88::ZERO,
            end: Fixed88::ZERO,
        }
    }
}

impl SegmentProgress {
    fn advance_index(&mut self) {
        self.index = self.index.wrapping_add(self.inc as i16);
        self.inc = 0;
    }

    /// Entry finished: rewind the step and move on next tick
    fn next_entry(&mut self) {
        self.step = 1;
        self.inc = 1;
        self.elevation = Elevation::Flat;
    }

    fn add_step(&mut self, amount: u16) {
        self.step = self.step.wrapping_add(amount);
    }

    fn adjust(&self) -> u16 {
        self.step_adjust.max(1)
    }
}

/// Progress pair produced each tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ElevationSample {
    pub start: Fixed88,
    pub end: Fixed88,
}

impl HeightMode {
    /// Control byte that selects this mode
    pub fn ctrl(&self) -> u8 {
        match self {
            HeightMode::Elevation { .. } => 0,
            HeightMode::DelayedHold { lift_horizon: false, .. } => 1,
            HeightMode::DelayedHold { lift_horizon: true, .. } => 2,
            HeightMode::MixedLookaheadHold { .. } => 3,
            HeightMode::HorizonAdjust { .. } => 4,
        }
    }

    /// Advance by one tick's fine position delta
    pub fn advance(&mut self, seg: &mut SegmentProgress, fine_delta: i16) -> ElevationSample {
        let scaled = i32::from(fine_delta) * HEIGHT_STEP_SCALE;

        match self {
            HeightMode::Elevation { down_mult, up_mult } => {
                seg.add_step(scaled as u16);
                let mut divisor = seg.step_adjust;
                match seg.elevation {
                    Elevation::Up => divisor = divisor.wrapping_mul(*up_mult as u16),
                    Elevation::Down => divisor = divisor.wrapping_mul(*down_mult as u16),
                    Elevation::Flat => {}
                }
                let progress = Fixed88::from_progress(seg.step / divisor.max(1));
                seg.start = progress;
                seg.end = progress;
                seg.advance_index();

                if seg.start.is_saturated() {
                    seg.next_entry();
                }
            }

            HeightMode::DelayedHold { delay, holding, .. } => {
                let d1 = scaled as i16;
                seg.advance_index();

                if seg.index == 0 || !*holding {
                    // Ramp up (entry 0) or back down (after the hold)
                    seg.add_step(d1 as u16);
                    let mut progress = (seg.step / seg.adjust()).min(Fixed88::MAX_PROGRESS);
                    let mut reached = progress;
                    if progress > 0xFE {
                        reached = 0xFF;
                        seg.next_entry();
                    }
                    if seg.index != 0 {
                        progress = 0xFF - reached;
                    }
                    seg.start = Fixed88::from_raw(progress + 0x100);
                } else {
                    *delay = delay.wrapping_sub((i32::from(d1) / i32::from(seg.adjust())) as i16);
                    seg.start = Fixed88::SATURATED;
                    if *delay < 0 {
                        *holding = false;
                    }
                }
            }

            HeightMode::MixedLookaheadHold { delay, holding } => {
                let d1 = scaled as u16;
                seg.advance_index();

                if seg.index >= MIXED_LOOKAHEAD {
                    let adjust = seg.adjust();
                    if *holding {
                        *delay = delay.wrapping_sub((d1 / adjust) as i16);
                        seg.start = Fixed88::SATURATED;
                        seg.end = Fixed88::START;
                        if *delay < 0 {
                            seg.addr = seg.addr.wrapping_add(MIXED_SKIP_BYTES);
                            *holding = false;
                        }
                    } else {
                        seg.add_step(d1);
                        let progress = (seg.step / adjust).min(Fixed88::MAX_PROGRESS);
                        seg.start = Fixed88::from_raw(0x1FF - progress);
                        if seg.start == Fixed88::START {
                            seg.next_entry();
                        }
                    }
                } else {
                    seg.add_step(d1);
                    let progress = Fixed88::from_progress(seg.step / MIXED_LOOKAHEAD_DIVISOR);
                    seg.start = progress;
                    seg.end = progress;
                    if progress.is_saturated() {
                        seg.next_entry();
                    }
                }
            }

            HeightMode::HorizonAdjust { .. } => {
                seg.add_step(scaled as u16);
                let progress = Fixed88::from_progress(seg.step / seg.adjust());
                seg.start = progress;
                seg.end = progress;
            }
        }

        ElevationSample {
            start: seg.start,
            end: seg.end,
        }
    }
}

// ---------------------------------------------------------------------------
// State machine
// ---------------------------------------------------------------------------

/// The single active height segment plus the persistent horizon base
#[derive(Debug, Clone, Serialize)]
pub struct ElevationStateMachine {
    pub phase: HeightPhase,
    /// Decoded mode of the active block, `None` for an unknown control byte
    pub mode: Option<HeightMode>,
    /// Control byte of the last loaded block
    pub ctrl: u8,
    /// Requested height table entry, 0 when none is pending
    pub lookup: u16,
    /// Entry currently loaded
    pub lookup_active: u16,
    pub progress: SegmentProgress,
    pub horizon_base: i32,
    horizon_set: bool,
    default_horizon_base: i32,
    pos_fine_old: u16,
    /// Fine position change seen this tick
    pub fine_delta: i16,
}

impl ElevationStateMachine {
    pub fn new(default_horizon_base: i32) -> Self {
        Self {
            phase: HeightPhase::Reset,
            mode: None,
            ctrl: 0,
            lookup: 0,
            lookup_active: 0,
            progress: SegmentProgress::default(),
            horizon_base: 0,
            horizon_set: false,
            default_horizon_base,
            pos_fine_old: 0,
            fine_delta: 0,
        }
    }

    /// Start over on a newly loaded track section
    pub fn reset(&mut self) {
        self.phase = HeightPhase::Reset;
        self.mode = None;
        self.lookup = 0;
        self.lookup_active = 0;
        self.progress = SegmentProgress::default();
        self.pos_fine_old = 0;
        self.fine_delta = 0;
    }

    /// Ask for height entry `lookup`. Ignored while another request is pending.
    pub fn request(&mut self, lookup: u16) -> bool {
        if self.lookup != 0 {
            return false;
        }
        self.lookup = lookup;
        true
    }

    /// The block ran out of height words: load the next one next tick
    pub fn finish_segment(&mut self) {
        if self.lookup == self.lookup_active {
            self.lookup = 0;
        }
        self.phase = HeightPhase::LoadNext;
    }

    /// Advance one tick
    pub fn tick(&mut self, heights: &HeightMap, pos_fine: u16) -> ElevationSample {
        self.fine_delta = pos_fine.wrapping_sub(self.pos_fine_old) as i16;
        self.pos_fine_old = pos_fine;

        if !self.horizon_set {
            self.horizon_base = self.default_horizon_base;
            self.horizon_set = true;
        }

        match self.phase {
            HeightPhase::Reset => {
                self.lookup = 0;
                self.init_segment(heights);
            }
            HeightPhase::LoadNext => self.init_segment(heights),
            HeightPhase::Running => self.advance_mode(),
        }

        tracing::trace!(
            "height {:?} idx={} start={:#x} end={:#x}",
            self.mode,
            self.progress.index,
            self.progress.start.raw(),
            self.progress.end.raw()
        );

        ElevationSample {
            start: self.progress.start,
            end: self.progress.end,
        }
    }

    fn advance_mode(&mut self) {
        let Some(mut mode) = self.mode else {
            return;
        };
        mode.advance(&mut self.progress, self.fine_delta);
        self.mode = Some(mode);

        // A pending request pre-empts the default block
        if let HeightMode::Elevation { .. } = mode {
            if !self.progress.start.is_saturated() && self.lookup != 0 && self.lookup_active == 0 {
                self.phase = HeightPhase::LoadNext;
            }
        }
    }

    fn init_segment(&mut self, heights: &HeightMap) {
        let seg = &mut self.progress;
        seg.index = 0;
        seg.inc = 0;
        seg.elevation = Elevation::Flat;
        seg.step = 1;

        self.lookup_active = self.lookup;
        let mut addr = heights.entry_address(self.lookup_active);
        self.ctrl = heights.read8(addr) as u8;
        seg.step_adjust = u16::from(heights.read8(addr + 1) as u8);
        addr += 2;

        if seg.step_adjust == 0 && self.ctrl <= 4 {
            tracing::warn!("Height entry {} has zero step adjust", self.lookup_active);
        }

        let mode = match self.ctrl {
            0 => {
                let down_mult = heights.read8(addr);
                let up_mult = heights.read8(addr + 1);
                seg.addr = addr + 2;
                HeightMode::Elevation { down_mult, up_mult }
            }
            1 | 2 => {
                let delay = heights.read16(addr);
                seg.addr = addr + 2;
                seg.end = Fixed88::START;
                HeightMode::DelayedHold {
                    delay,
                    holding: true,
                    lift_horizon: self.ctrl == 2,
                }
            }
            3 => {
                let delay = heights.read16(addr);
                seg.addr = addr + 2;
                HeightMode::MixedLookaheadHold {
                    delay,
                    holding: true,
                }
            }
            4 => {
                seg.addr = addr;
                HeightMode::HorizonAdjust {
                    horizon_mod: i32::from(heights.read16(addr)) - self.horizon_base,
                }
            }
            other => {
                // Nothing is loaded and the phase is left alone, so the same
                // entry is read again next tick.
                tracing::trace!("Height entry {} has unknown control {:#x}", self.lookup_active, other);
                self.mode = None;
                return;
            }
        };

        tracing::debug!("Height entry {} loaded: {:?}", self.lookup_active, mode);
        self.mode = Some(mode);
        self.phase = HeightPhase::Running;
        self.advance_mode();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use openroad_track::HeightBlockDef;

    fn machine_with(blocks: &[HeightBlockDef], lookup: u16) -> (ElevationStateMachine, HeightMap) {
        let heights = HeightMap::from_blocks(blocks);
        let mut machine = ElevationStateMachine::new(0x240);
        machine.phase = HeightPhase::LoadNext;
        machine.lookup = lookup;
        (machine, heights)
    }

    fn long_flat(step: u8) -> HeightBlockDef {
        HeightBlockDef::Elevation {
            step,
            down_mult: 2,
            up_mult: 3,
            heights: vec![0; 20],
        }
    }

    #[test]
    fn horizon_base_defaults_on_first_tick() {
        let heights = HeightMap::from_blocks(&[HeightBlockDef::flat()]);
        let mut machine = ElevationStateMachine::new(0x240);
        assert_eq!(machine.horizon_base, 0);
        machine.tick(&heights, 0);
        assert_eq!(machine.horizon_base, 0x240);
        assert_eq!(machine.phase, HeightPhase::Running);
    }

    #[test]
    fn flat_segment_saturates_in_bounded_ticks() {
        let step_adjust = 3u16;
        let (mut machine, heights) = machine_with(&[long_flat(step_adjust as u8)], 0);
        let fine_per_tick = 10u16;
        // 0xFF of progress at (fine * 12 / step_adjust) per tick
        let bound = (0xFF * step_adjust) / (fine_per_tick * 12) + 2;

        let mut pos_fine = 0u16;
        let mut ticks = 0;
        loop {
            pos_fine += fine_per_tick;
            let sample = machine.tick(&heights, pos_fine);
            ticks += 1;
            assert_eq!(sample.start, sample.end);
            if sample.start.is_saturated() {
                break;
            }
            assert!(ticks <= bound, "no saturation after {} ticks", ticks);
        }
        assert!(ticks <= bound);
        // Next tick moves to the next height entry
        machine.tick(&heights, pos_fine + fine_per_tick);
        assert_eq!(machine.progress.index, 1);
    }

    #[test]
    fn climbing_uses_up_multiplier() {
        let (mut flat, heights) = machine_with(&[long_flat(4)], 0);
        flat.tick(&heights, 0);
        let mut climbing = flat.clone();
        climbing.progress.elevation = Elevation::Up;

        let a = flat.tick(&heights, 20);
        let b = climbing.tick(&heights, 20);
        // 1 + 240 over 4 versus over 12
        assert_eq!(a.start.raw(), 0x100 + 60);
        assert_eq!(b.start.raw(), 0x100 + 20);
    }

    #[test]
    fn pending_request_preempts_default_block() {
        let (mut machine, heights) = machine_with(&[long_flat(4), long_flat(4)], 0);
        machine.tick(&heights, 1);
        assert_eq!(machine.phase, HeightPhase::Running);
        assert!(machine.request(1));
        assert!(!machine.request(1), "second request must wait");
        machine.tick(&heights, 2);
        assert_eq!(machine.phase, HeightPhase::LoadNext);
        machine.tick(&heights, 3);
        assert_eq!(machine.lookup_active, 1);
        assert_eq!(machine.phase, HeightPhase::Running);
    }

    #[test]
    fn reset_phase_drops_request() {
        let (mut machine, heights) = machine_with(&[long_flat(4), long_flat(4)], 1);
        machine.phase = HeightPhase::Reset;
        machine.tick(&heights, 1);
        assert_eq!(machine.lookup_active, 0);
    }

    #[test]
    fn delayed_hold_plateau() {
        let delay = 5i16;
        let blocks = [
            HeightBlockDef::flat(),
            HeightBlockDef::Hold {
                step: 12,
                delay,
                heights: vec![0x40, 0x40],
                horizon_lift: false,
            },
        ];
        let (mut machine, heights) = machine_with(&blocks, 1);
        assert_eq!(machine.tick(&heights, 0).end, Fixed88::START);

        // One fine unit per tick: 12 step, so one progress unit and one
        // delay unit per tick
        let mut pos_fine = 0u16;
        let mut starts = Vec::new();
        for _ in 0..300 {
            pos_fine += 1;
            starts.push(machine.tick(&heights, pos_fine).start.raw());
        }

        // Ramp up first
        assert!(starts[0] < 0x1FF);
        assert!(starts.windows(2).take(200).all(|w| w[0] <= w[1] || w[0] == 0x1FF));

        let first = starts.iter().position(|s| *s == 0x1FF).unwrap();
        let plateau = starts[first..].iter().take_while(|s| **s == 0x1FF).count();
        // Saturating tick, then the delay counts down through zero
        assert_eq!(plateau as i16, delay + 2);

        // Then it ramps back down
        let after = starts[first + plateau];
        assert_eq!(after, 0x1FE);
        assert_eq!(starts[first + plateau + 1], 0x1FD);
    }

    #[test]
    fn mixed_block_looks_ahead_then_holds() {
        let blocks = [
            HeightBlockDef::flat(),
            HeightBlockDef::Mixed {
                step: 1,
                delay: 3,
                heights: vec![0x10; 14],
            },
        ];
        let (mut machine, heights) = machine_with(&blocks, 1);
        machine.tick(&heights, 0);
        let addr = machine.progress.addr;

        let mut pos_fine = 0u16;
        let mut ticks = 0;
        while machine.progress.index < MIXED_LOOKAHEAD {
            pos_fine += 8;
            machine.tick(&heights, pos_fine);
            ticks += 1;
            assert!(ticks < 1000);
        }
        // Hold: start pinned, end reset
        assert_eq!(machine.progress.start, Fixed88::SATURATED);
        assert_eq!(machine.progress.end, Fixed88::START);

        while matches!(machine.mode, Some(HeightMode::MixedLookaheadHold { holding: true, .. })) {
            pos_fine += 8;
            machine.tick(&heights, pos_fine);
        }
        assert_eq!(machine.progress.addr, addr + 12);
    }

    #[test]
    fn horizon_adjust_measures_from_base() {
        let blocks = [
            HeightBlockDef::flat(),
            HeightBlockDef::Horizon {
                step: 2,
                horizon: 0x300,
            },
        ];
        let (mut machine, heights) = machine_with(&blocks, 1);
        machine.tick(&heights, 4);
        assert_eq!(machine.mode, Some(HeightMode::HorizonAdjust { horizon_mod: 0xC0 }));
        assert_eq!(machine.ctrl, 4);
        // 1 + 48 over 2
        assert_eq!(machine.progress.start.raw(), 0x100 + 24);
    }

    #[test]
    fn unknown_control_does_nothing() {
        let blocks = [HeightBlockDef::Raw {
            bytes: vec![9, 4, 0, 0],
        }];
        let (mut machine, heights) = machine_with(&blocks, 0);
        machine.tick(&heights, 5);
        assert_eq!(machine.mode, None);
        assert_eq!(machine.ctrl, 9);
        assert_eq!(machine.phase, HeightPhase::LoadNext);
    }

    #[test]
    fn finish_segment_clears_matching_request() {
        let (mut machine, heights) = machine_with(&[long_flat(4), long_flat(4)], 1);
        machine.tick(&heights, 1);
        assert_eq!(machine.lookup_active, 1);
        machine.finish_segment();
        assert_eq!(machine.lookup, 0);
        assert_eq!(machine.phase, HeightPhase::LoadNext);
    }
}
