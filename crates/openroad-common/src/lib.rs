//! Common utilities and types shared across OpenRoad crates

pub mod config;
pub mod fixed;

pub use config::{AppConfig, ConfigError, EngineConfig};
pub use fixed::{isqrt, Fixed1616, Fixed88};

use serde::{Deserialize, Serialize};

/// Road position advance per unit of speed on a straight road
pub const CAR_BASE_INC: u32 = 0x12F;

/// Which road generators are drawn and how they are layered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoadCtrl {
    /// No road drawn
    Off,
    /// Road 0 only
    Road0,
    /// Road 1 only
    Road1,
    /// Both roads, road 0 has priority
    #[default]
    BothPriority0,
    /// Both roads, road 1 has priority
    BothPriority1,
    /// Both roads, road 0 priority, road 1 mirrored
    BothPriority0Inverted,
    /// Both roads, road 1 priority, road 1 mirrored
    BothPriority1Inverted,
    /// Road 0 only, during a road split
    Road0Split,
    /// Road 1 only, mirrored, during a road split
    Road1Split,
}

impl RoadCtrl {
    /// Decode a road control byte
    pub fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            0 => RoadCtrl::Off,
            1 => RoadCtrl::Road0,
            2 => RoadCtrl::Road1,
            3 => RoadCtrl::BothPriority0,
            4 => RoadCtrl::BothPriority1,
            5 => RoadCtrl::BothPriority0Inverted,
            6 => RoadCtrl::BothPriority1Inverted,
            7 => RoadCtrl::Road0Split,
            8 => RoadCtrl::Road1Split,
            _ => return None,
        })
    }

    pub fn code(&self) -> u8 {
        match self {
            RoadCtrl::Off => 0,
            RoadCtrl::Road0 => 1,
            RoadCtrl::Road1 => 2,
            RoadCtrl::BothPriority0 => 3,
            RoadCtrl::BothPriority1 => 4,
            RoadCtrl::BothPriority0Inverted => 5,
            RoadCtrl::BothPriority1Inverted => 6,
            RoadCtrl::Road0Split => 7,
            RoadCtrl::Road1Split => 8,
        }
    }

    pub fn draws_road0(&self) -> bool {
        !matches!(self, RoadCtrl::Off | RoadCtrl::Road1 | RoadCtrl::Road1Split)
    }

    pub fn draws_road1(&self) -> bool {
        !matches!(self, RoadCtrl::Off | RoadCtrl::Road0 | RoadCtrl::Road0Split)
    }
}

/// Per-tick values the road engine reads from the game simulation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GameInput {
    /// Car speed, the integer part of the car increment
    pub speed: u16,
    /// Car lateral position
    pub car_x: i16,
    /// Debug camera offset added to the car position
    pub camera_x_offset: i16,
    pub road_ctrl: RoadCtrl,
    /// Stage the game wants loaded
    pub stage: u8,
    /// Switch to the road split section
    pub request_split: bool,
    /// Switch to the bonus section
    pub request_bonus: bool,
}

impl GameInput {
    /// 16.16 road position advance for this tick's speed
    pub fn position_advance(&self) -> Fixed1616 {
        Fixed1616::from_raw(CAR_BASE_INC.wrapping_mul(u32::from(self.speed)) as i32)
    }
}
