//! Width/height segments: road width changes and height table requests
//! keyed by road position

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WidthHeightSegment {
    /// Request height table entry `lookup`
    Height { position: u16, lookup: u16 },
    /// Change the road width to `width` at `speed` per unit of car speed
    Width { position: u16, width: i16, speed: i16 },
}

impl WidthHeightSegment {
    /// Road position the segment takes effect at
    pub fn position(&self) -> u16 {
        match self {
            WidthHeightSegment::Height { position, .. } | WidthHeightSegment::Width { position, .. } => {
                *position
            }
        }
    }
}
