//! Producer side of the road hardware: the word bus the engine writes its
//! tables to, and an in-memory double-buffered road RAM that implements it

use openroad_common::RoadCtrl;
use openroad_track::TrackData;
use serde::Serialize;

use crate::hscroll::HScrollTable;
use crate::quad::{Quadrant, OUTPUT_END};

pub const ROAD_RAM_BASE: u32 = 0x80000;
pub const ROAD_RAM_WORDS: usize = 0x800;
pub const HSCROLL_TABLE0: u32 = 0x80400;
pub const HSCROLL_TABLE1: u32 = 0x80800;
pub const BG_COLOR_TABLE: u32 = 0x80C00;
/// Blit targets; each blit writes downward from here
pub const ROAD0_LINES: u32 = 0x801C0;
pub const ROAD1_LINES: u32 = 0x803C0;
/// Visible scanlines
pub const SCREEN_LINES: usize = 224;
pub const HSCROLL_CENTRE: i16 = 0x654;
pub const DEFAULT_HSCROLL: u16 = 0x0100;
/// Background strips are selected by the low bits of the fine position
pub const BG_STRIP_MASK: u16 = 0x1F;

/// Word-addressed bus to the road generator
pub trait HardwareSink {
    fn write16(&mut self, addr: u32, value: u16);

    /// Select which generators are shown and their layering (0..=3)
    fn write_road_control(&mut self, value: u8);

    /// Publish everything written since the last swap
    fn swap_road_ram(&mut self);
}

fn write_words(sink: &mut dyn HardwareSink, addr: u32, values: impl IntoIterator<Item = u16>) {
    let mut addr = addr;
    for value in values {
        sink.write16(addr, value);
        addr = addr.wrapping_add(2);
    }
}

/// Road RAM with a write half and a published half
#[derive(Debug, Clone, Serialize)]
pub struct RoadRam {
    #[serde(skip)]
    ram: Box<[u16; ROAD_RAM_WORDS]>,
    #[serde(serialize_with = "serialize_words")]
    published: Box<[u16; ROAD_RAM_WORDS]>,
    pub road_control: u8,
    pub swaps: u64,
}

fn serialize_words<S: serde::Serializer>(v: &[u16; ROAD_RAM_WORDS], s: S) -> Result<S::Ok, S::Error> {
    s.collect_seq(v.iter())
}

impl Default for RoadRam {
    fn default() -> Self {
        Self {
            ram: Box::new([0; ROAD_RAM_WORDS]),
            published: Box::new([0; ROAD_RAM_WORDS]),
            road_control: 0,
            swaps: 0,
        }
    }
}

impl RoadRam {
    pub fn new() -> Self {
        Self::default()
    }

    fn index(addr: u32) -> usize {
        (addr >> 1) as usize & (ROAD_RAM_WORDS - 1)
    }

    /// Word at `addr` in the published half
    pub fn read16(&self, addr: u32) -> u16 {
        self.published[Self::index(addr)]
    }

    /// Word at `addr` in the half being written
    pub fn pending16(&self, addr: u32) -> u16 {
        self.ram[Self::index(addr)]
    }

    pub fn published(&self) -> &[u16; ROAD_RAM_WORDS] {
        &self.published
    }
}

impl HardwareSink for RoadRam {
    fn write16(&mut self, addr: u32, value: u16) {
        self.ram[Self::index(addr)] = value;
    }

    fn write_road_control(&mut self, value: u8) {
        self.road_control = value;
    }

    fn swap_road_ram(&mut self) {
        std::mem::swap(&mut self.ram, &mut self.published);
        self.swaps += 1;
    }
}

/// Fill both h-scroll tables with the neutral scroll value
pub fn set_default_hscroll(sink: &mut dyn HardwareSink) {
    write_words(sink, HSCROLL_TABLE0, std::iter::repeat(DEFAULT_HSCROLL).take(0x400));
    sink.swap_road_ram();
}

/// Point every visible line at its own scanline
pub fn clear_road_ram(sink: &mut dyn HardwareSink) {
    write_words(sink, ROAD_RAM_BASE, 0..SCREEN_LINES as u16);
    sink.swap_road_ram();
}

fn blit_road(sink: &mut dyn HardwareSink, quadrant: &Quadrant, target: u32) {
    let mut addr = target;
    for value in quadrant[..OUTPUT_END].iter().rev().take(SCREEN_LINES) {
        addr -= 2;
        sink.write16(addr, *value as u16);
    }
}

/// Copy the rasterized lines of `quadrant` to each generator `ctrl` shows and
/// set the matching road control code
pub fn blit_roads(sink: &mut dyn HardwareSink, ctrl: RoadCtrl, quadrant: &Quadrant) {
    let code = match ctrl {
        RoadCtrl::Off => return,
        RoadCtrl::Road0 | RoadCtrl::Road0Split => {
            blit_road(sink, quadrant, ROAD0_LINES);
            0
        }
        RoadCtrl::Road1 | RoadCtrl::Road1Split => {
            blit_road(sink, quadrant, ROAD1_LINES);
            3
        }
        RoadCtrl::BothPriority0 | RoadCtrl::BothPriority0Inverted => {
            blit_road(sink, quadrant, ROAD0_LINES);
            blit_road(sink, quadrant, ROAD1_LINES);
            1
        }
        RoadCtrl::BothPriority1 | RoadCtrl::BothPriority1Inverted => {
            blit_road(sink, quadrant, ROAD0_LINES);
            blit_road(sink, quadrant, ROAD1_LINES);
            2
        }
    };
    sink.write_road_control(code);
}

/// Write a scroll table as hardware scroll registers
pub fn output_hscroll(sink: &mut dyn HardwareSink, table: &HScrollTable, dst: u32) {
    let values = table
        .entries()
        .iter()
        .map(|h| HSCROLL_CENTRE.wrapping_sub(*h) as u16);
    write_words(sink, dst, values);
}

/// Copy the background colour strip for the current fine position.
/// Returns false when the track has no strip for it.
pub fn copy_bg_color(sink: &mut dyn HardwareSink, track: &dyn TrackData, pos_fine: u16) -> bool {
    let index = usize::from(pos_fine & BG_STRIP_MASK);
    match track.bg_color_strip(index) {
        Some(strip) => {
            write_words(sink, BG_COLOR_TABLE, strip.iter().copied());
            true
        }
        None => {
            tracing::trace!("No background strip {}", index);
            false
        }
    }
}
