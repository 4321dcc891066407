//! The per-tick road pipeline
//!
//! Each tick rotates the quadrant buffer, regenerates the curve when the car
//! crossed a path entry, advances the elevation machine, writes and smooths
//! the profile, rasterizes it and hands the quadrant written three ticks ago
//! to the hardware sink.

use openroad_common::{EngineConfig, Fixed1616, GameInput};
use openroad_track::{StageSelect, TrackData};
use serde::Serialize;

use crate::curve::{self, Aborted, ScanlineXTable};
use crate::elevation::ElevationStateMachine;
use crate::hscroll::HScrollProjector;
use crate::position::{GranularPosition, RoadPosition};
use crate::profile::{self, ProfileOutcome, UndulationList};
use crate::quad::{ScanlineYTable, Slot, OUTPUT_END, PROFILE_LEN};
use crate::rasterizer::{self, RasterStats};
use crate::segments::WidthHeightTracker;
use crate::sink::{self, HardwareSink, HSCROLL_TABLE0, HSCROLL_TABLE1};
use crate::smoother;

/// What one tick did
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct TickReport {
    pub tick: u64,
    pub position: u32,
    /// Whole path entries crossed since the previous tick
    pub change: i32,
    /// Section loaded this tick
    #[serde(serialize_with = "serialize_select")]
    pub loaded: Option<StageSelect>,
    /// Curve entries written, `None` when the curve was kept or stopped early
    pub curve_entries: Option<usize>,
    pub profile: Option<ProfileOutcome>,
    pub smoothed: usize,
    pub raster: RasterStats,
    pub horizon_y: i16,
}

fn serialize_select<S: serde::Serializer>(v: &Option<StageSelect>, s: S) -> Result<S::Ok, S::Error> {
    match v {
        Some(select) => s.collect_str(select),
        None => s.serialize_none(),
    }
}

pub struct RoadEngine {
    config: EngineConfig,
    y_table: ScanlineYTable,
    x_table: ScanlineXTable,
    hscroll: HScrollProjector,
    heights: ElevationStateMachine,
    undulations: UndulationList,
    position: RoadPosition,
    fine: GranularPosition,
    segments: WidthHeightTracker,
    loaded_stage: Option<u8>,
    split_held: bool,
    bonus_held: bool,
    split_pending: bool,
    bonus_pending: bool,
    regenerate_x: bool,
    last_abort: Option<Aborted>,
    tilemap_h_target: i16,
    horizon_y: i16,
    ticks: u64,
}

impl RoadEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            y_table: ScanlineYTable::new(),
            x_table: ScanlineXTable::default(),
            hscroll: HScrollProjector::default(),
            heights: ElevationStateMachine::new(config.horizon_base),
            undulations: UndulationList::default(),
            position: RoadPosition::default(),
            fine: GranularPosition::default(),
            segments: WidthHeightTracker::new(config.start_width),
            loaded_stage: None,
            split_held: false,
            bonus_held: false,
            split_pending: false,
            bonus_pending: false,
            regenerate_x: true,
            last_abort: None,
            tilemap_h_target: 0,
            horizon_y: 0,
            ticks: 0,
            config,
        }
    }

    /// Power-on state of the road hardware: neutral scroll and identity lines
    pub fn init_hardware(&self, sink: &mut dyn HardwareSink) {
        sink::set_default_hscroll(sink);
        sink::clear_road_ram(sink);
    }

    /// Advance the position by `input` and run one tick
    pub fn tick(&mut self, track: &mut dyn TrackData, input: &GameInput, sink: &mut dyn HardwareSink) -> TickReport {
        self.advance(track, input);
        self.run(track, input, sink)
    }

    /// One host frame: `ticks_per_frame` ticks, the position advancing once
    pub fn frame(&mut self, track: &mut dyn TrackData, input: &GameInput, sink: &mut dyn HardwareSink) -> TickReport {
        let mut report = self.tick(track, input, sink);
        for _ in 1..self.config.ticks_per_frame {
            report = self.run(track, input, sink);
        }
        report
    }

    fn advance(&mut self, track: &dyn TrackData, input: &GameInput) {
        self.position.advance(input.position_advance());
        self.fine.advance(input.speed);
        self.segments
            .update(track, self.position.index(), input.speed, &mut self.heights);
    }

    fn run(&mut self, track: &mut dyn TrackData, input: &GameInput, sink: &mut dyn HardwareSink) -> TickReport {
        self.ticks += 1;
        self.y_table.rotate();
        let change = self.position.latch();
        let loaded = self.check_load_road(track, input);
        let track: &dyn TrackData = track;

        let curve_entries = self.setup_road_x(track, input, change);

        self.heights.tick(track.height_map(), self.fine.fine);
        let outcome = profile::write_profile(
            &mut self.heights,
            track.height_map(),
            self.y_table.quadrant_mut(Slot::Write),
            &mut self.undulations,
        );

        let smoothed = if self.config.smooth_horizon {
            smoother::smooth(self.y_table.quadrant_mut(Slot::Write), &self.undulations)
        } else {
            0
        };
        self.horizon_y = smoother::horizon_y(self.y_table.quadrant(Slot::Horizon));

        let raster = rasterizer::rasterize(self.y_table.quadrant_mut(Slot::Write));

        sink::blit_roads(sink, input.road_ctrl, self.y_table.quadrant(Slot::Blit));
        sink::output_hscroll(sink, &self.hscroll.road0, HSCROLL_TABLE0);
        sink::output_hscroll(sink, &self.hscroll.road1, HSCROLL_TABLE1);
        sink::copy_bg_color(sink, track, self.fine.fine);
        sink.swap_road_ram();

        let report = TickReport {
            tick: self.ticks,
            position: self.position.index(),
            change,
            loaded,
            curve_entries,
            profile: Some(outcome).filter(|o| *o != ProfileOutcome::Skipped),
            smoothed,
            raster,
            horizon_y: self.horizon_y,
        };
        tracing::trace!("{:?}", report);
        report
    }

    /// Load a new section when the stage changed or a split or bonus road was
    /// requested. Split and bonus requests act on their rising edge.
    fn check_load_road(&mut self, track: &mut dyn TrackData, input: &GameInput) -> Option<StageSelect> {
        self.split_pending |= input.request_split && !self.split_held;
        self.bonus_pending |= input.request_bonus && !self.bonus_held;
        self.split_held = input.request_split;
        self.bonus_held = input.request_bonus;

        let select = if self.loaded_stage != Some(input.stage) {
            self.loaded_stage = Some(input.stage);
            StageSelect::Stage(input.stage)
        } else if self.split_pending {
            self.split_pending = false;
            StageSelect::Split
        } else if self.bonus_pending {
            self.bonus_pending = false;
            StageSelect::Bonus
        } else {
            return None;
        };

        if let Err(e) = track.select(select) {
            tracing::warn!("Cannot load {}: {}", select, e);
            return None;
        }
        self.load_section(select);
        Some(select)
    }

    /// Restart position, height state and segments on a freshly selected section
    pub fn load_section(&mut self, select: StageSelect) {
        self.position.reset();
        self.heights.reset();
        self.segments.reset();
        self.regenerate_x = true;
        self.last_abort = None;
        tracing::debug!("Loaded {}", select);
    }

    fn setup_road_x(&mut self, track: &dyn TrackData, input: &GameInput, change: i32) -> Option<usize> {
        let mut entries = None;
        if change != 0 || self.regenerate_x {
            self.regenerate_x = false;
            let position = self.position.index();
            self.tilemap_h_target = curve::tilemap_target(track, position);

            match curve::generate(track, position, &mut self.x_table) {
                Ok(written) => {
                    self.last_abort = None;
                    entries = Some(written.entries);
                }
                Err(abort) => {
                    // Past the end of a section this repeats every tick
                    if self.last_abort != Some(abort) {
                        tracing::warn!("Curve at {} stopped early: {}", position, abort);
                    }
                    self.last_abort = Some(abort);
                }
            }
        }

        self.hscroll.setup(
            &self.x_table,
            input.road_ctrl,
            self.segments.width_int(),
            input.car_x,
            input.camera_x_offset,
        );
        entries
    }

    /// Screen Y of profile entry `index` as of the previous tick
    pub fn road_y(&self, index: usize) -> i16 {
        self.y_table.road_y(index)
    }

    pub fn horizon_y(&self) -> i16 {
        self.horizon_y
    }

    pub fn tilemap_h_target(&self) -> i16 {
        self.tilemap_h_target
    }

    pub fn position(&self) -> Fixed1616 {
        self.position.value()
    }

    pub fn pos_fine(&self) -> u16 {
        self.fine.fine
    }

    pub fn road_width(&self) -> Fixed1616 {
        self.segments.width
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn y_table(&self) -> &ScanlineYTable {
        &self.y_table
    }

    pub fn x_table(&self) -> &ScanlineXTable {
        &self.x_table
    }

    pub fn hscroll(&self) -> &HScrollProjector {
        &self.hscroll
    }

    pub fn heights(&self) -> &ElevationStateMachine {
        &self.heights
    }

    /// Tables written by the latest tick
    pub fn snapshot(&self) -> Snapshot<'_> {
        let quadrant = self.y_table.quadrant(Slot::Write);
        Snapshot {
            tick: self.ticks,
            position: self.position.value(),
            pos_fine: self.fine.fine,
            road_width: self.segments.width,
            tilemap_h_target: self.tilemap_h_target,
            horizon_y: self.horizon_y,
            heights: &self.heights,
            undulations: self.undulations.runs().collect(),
            profile: &quadrant[..PROFILE_LEN],
            priority: self.y_table.priority_runs(Slot::Write),
            lines: &quadrant[OUTPUT_END - sink::SCREEN_LINES..OUTPUT_END],
            road_x: &self.x_table,
            hscroll: &self.hscroll,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Snapshot<'a> {
    pub tick: u64,
    pub position: Fixed1616,
    pub pos_fine: u16,
    pub road_width: Fixed1616,
    pub tilemap_h_target: i16,
    pub horizon_y: i16,
    pub heights: &'a ElevationStateMachine,
    pub undulations: Vec<(i16, i16)>,
    pub profile: &'a [i16],
    pub priority: Vec<(i16, i16)>,
    pub lines: &'a [i16],
    pub road_x: &'a ScanlineXTable,
    pub hscroll: &'a HScrollProjector,
}
