//! H-scroll projector: road X offsets to per-scanline scroll for each road
//! generator, shifted by the car's position on the road
//!
//! The car offset is weighted by depth: index 0 (horizon) moves not at all and
//! every scanline nearer the camera moves a little more.

use openroad_common::RoadCtrl;
use serde::Serialize;

use crate::curve::{ScanlineXTable, ROAD_X_LEN, ROAD_X_SENTINEL};

pub const HSCROLL_LEN: usize = ROAD_X_LEN;

/// Scroll values for one road generator
#[derive(Debug, Clone, Serialize)]
pub struct HScrollTable {
    #[serde(serialize_with = "serialize_slice")]
    entries: [i16; HSCROLL_LEN],
}

fn serialize_slice<S: serde::Serializer>(v: &[i16; HSCROLL_LEN], s: S) -> Result<S::Ok, S::Error> {
    s.collect_seq(v.iter())
}

impl Default for HScrollTable {
    fn default() -> Self {
        Self {
            entries: [0; HSCROLL_LEN],
        }
    }
}

impl HScrollTable {
    pub fn entries(&self) -> &[i16; HSCROLL_LEN] {
        &self.entries
    }
}

/// Project `road_x` into `out`. `offset` is car x + road width + camera offset.
pub fn project(road_x: &ScanlineXTable, offset: i32, invert: bool, out: &mut HScrollTable) {
    let src = road_x.entries();

    if offset == 0 {
        for (dst, x) in out.entries.iter_mut().zip(src.iter()) {
            *dst = if invert { x.wrapping_neg() >> 6 } else { x >> 6 };
        }
        return;
    }

    let step = offset.wrapping_shl(7);
    let mut scanline_inc = 0i32;
    for (dst, x) in out.entries.iter_mut().zip(src.iter()) {
        let mut h = (scanline_inc >> 16) as i16;
        if *x == ROAD_X_SENTINEL {
            h = 0;
        }
        let x_off = x >> 6;
        *dst = if invert {
            h.wrapping_sub(x_off)
        } else {
            h.wrapping_add(x_off)
        };
        scanline_inc = scanline_inc.wrapping_add(step);
    }
}

/// Scroll tables for both road generators
#[derive(Debug, Clone, Default, Serialize)]
pub struct HScrollProjector {
    pub road0: HScrollTable,
    pub road1: HScrollTable,
}

impl HScrollProjector {
    /// Update the tables the road mode draws. Road 0 sits at -width,
    /// road 1 at +width.
    pub fn setup(&mut self, road_x: &ScanlineXTable, ctrl: RoadCtrl, width: i16, car_x: i16, camera_x: i16) {
        let offset = |w: i16| i32::from(car_x) + i32::from(w) + i32::from(camera_x);
        let left = offset(width.wrapping_neg());
        let right = offset(width);

        match ctrl {
            RoadCtrl::Off => {}
            RoadCtrl::Road0 | RoadCtrl::Road0Split => {
                project(road_x, left, false, &mut self.road0);
            }
            RoadCtrl::Road1 => {
                project(road_x, right, false, &mut self.road1);
            }
            RoadCtrl::BothPriority0 | RoadCtrl::BothPriority1 => {
                project(road_x, left, false, &mut self.road0);
                project(road_x, right, false, &mut self.road1);
            }
            RoadCtrl::BothPriority0Inverted | RoadCtrl::BothPriority1Inverted => {
                project(road_x, left, false, &mut self.road0);
                project(road_x, right, true, &mut self.road1);
            }
            RoadCtrl::Road1Split => {
                project(road_x, right, true, &mut self.road1);
            }
        }
    }
}
