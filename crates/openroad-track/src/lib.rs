//! Track data for the road geometry engine
//!
//! This crate handles:
//! - Reading the track path as sequential (dx, dy) deltas
//! - Width/height segments keyed by road position
//! - Encoded height tables
//! - Stage, road split and bonus section selection
//! - Loading tracks from TOML files

pub mod height;
pub mod path;
pub mod segment;
pub mod set;

pub use height::{HeightBlockDef, HeightMap, HEIGHT_END};
pub use path::{PathDelta, PathReader, PathSegment};
pub use segment::WidthHeightSegment;
pub use set::{TrackSection, TrackSet, BG_STRIP_LEN};

use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TrackError {
    #[error("Failed to read track file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid track syntax: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid track data: {0}")]
    InvalidTrack(String),

    #[error("Track has no section {0}")]
    StageNotFound(StageSelect),
}

pub type Result<T> = std::result::Result<T, TrackError>;

/// Which section of the track is current
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageSelect {
    Stage(u8),
    Split,
    Bonus,
}

impl fmt::Display for StageSelect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageSelect::Stage(i) => write!(f, "stage {}", i),
            StageSelect::Split => write!(f, "road split"),
            StageSelect::Bonus => write!(f, "bonus"),
        }
    }
}

/// Track data the engine reads every tick
pub trait TrackData {
    /// Direction delta at an integer road position; zero past the end
    fn path_delta(&self, position: u32) -> PathDelta;

    fn width_height_segment(&self, index: usize) -> Option<WidthHeightSegment>;

    fn height_map(&self) -> &HeightMap;

    /// One background colour strip, `BG_STRIP_LEN` entries
    fn bg_color_strip(&self, index: usize) -> Option<&[u16]>;

    /// Make another section current
    fn select(&mut self, select: StageSelect) -> Result<()> {
        match select {
            StageSelect::Stage(0) => Ok(()),
            other => Err(TrackError::StageNotFound(other)),
        }
    }

    fn current(&self) -> StageSelect {
        StageSelect::Stage(0)
    }
}
