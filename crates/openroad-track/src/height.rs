//! Height table: elevation segment blocks addressed by byte offset
//!
//! Block layout (big-endian):
//! - byte 0: control (0 = elevation, 1/2 = hold, 3 = mixed, 4 = horizon)
//! - byte 1: step adjust, the distance divisor
//! - mode payload: multipliers (elevation), delay word (hold/mixed) or
//!   horizon word (horizon)
//! - signed height words ending with -1
//!
//! Reads past the end of the table return -1 so a block missing its
//! terminator runs into "load next" instead of out of bounds.

use byteorder::{BigEndian, ByteOrder};
use serde::{Deserialize, Serialize};

/// Terminator word of a height block
pub const HEIGHT_END: i16 = -1;

/// Control byte values
pub const CTRL_ELEVATION: u8 = 0;
pub const CTRL_HOLD: u8 = 1;
pub const CTRL_HOLD_LIFT: u8 = 2;
pub const CTRL_MIXED: u8 = 3;
pub const CTRL_HORIZON: u8 = 4;

/// Authored height block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum HeightBlockDef {
    /// Ramp whose speed depends on the elevation direction
    Elevation {
        step: u8,
        #[serde(default = "default_mult")]
        down_mult: i8,
        #[serde(default = "default_mult")]
        up_mult: i8,
        heights: Vec<i16>,
    },
    /// Ramp up, hold for `delay`, ramp down
    Hold {
        step: u8,
        delay: i16,
        heights: Vec<i16>,
        /// Lift the horizon along with the crest
        #[serde(default)]
        horizon_lift: bool,
    },
    /// Six lookahead entries, then a hold
    Mixed {
        step: u8,
        delay: i16,
        heights: Vec<i16>,
    },
    /// Move the horizon base to `horizon`
    Horizon { step: u8, horizon: i16 },
    /// Bytes copied as-is, no terminator added
    Raw { bytes: Vec<u8> },
}

fn default_mult() -> i8 {
    1
}

impl HeightBlockDef {
    /// Level road
    pub fn flat() -> Self {
        HeightBlockDef::Elevation {
            step: 1,
            down_mult: 1,
            up_mult: 1,
            heights: vec![0; 6],
        }
    }

    fn encode(&self, out: &mut Vec<u8>) {
        let push_words = |out: &mut Vec<u8>, words: &[i16]| {
            let mut buf = [0u8; 2];
            for w in words {
                BigEndian::write_i16(&mut buf, *w);
                out.extend_from_slice(&buf);
            }
        };

        match self {
            HeightBlockDef::Elevation {
                step,
                down_mult,
                up_mult,
                heights,
            } => {
                out.extend_from_slice(&[CTRL_ELEVATION, *step, *down_mult as u8, *up_mult as u8]);
                push_words(out, heights);
            }
            HeightBlockDef::Hold {
                step,
                delay,
                heights,
                horizon_lift,
            } => {
                let ctrl = if *horizon_lift { CTRL_HOLD_LIFT } else { CTRL_HOLD };
                out.extend_from_slice(&[ctrl, *step]);
                push_words(out, &[*delay]);
                push_words(out, heights);
            }
            HeightBlockDef::Mixed {
                step,
                delay,
                heights,
            } => {
                out.extend_from_slice(&[CTRL_MIXED, *step]);
                push_words(out, &[*delay]);
                push_words(out, heights);
            }
            HeightBlockDef::Horizon { step, horizon } => {
                out.extend_from_slice(&[CTRL_HORIZON, *step]);
                push_words(out, &[*horizon]);
            }
            HeightBlockDef::Raw { bytes } => {
                out.extend_from_slice(bytes);
                return;
            }
        }
        push_words(out, &[HEIGHT_END]);
    }
}

/// Encoded height table with an entry index
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeightMap {
    bytes: Vec<u8>,
    entries: Vec<u32>,
}

impl HeightMap {
    pub fn from_blocks(blocks: &[HeightBlockDef]) -> Self {
        let mut bytes = Vec::new();
        let mut entries = Vec::with_capacity(blocks.len());
        for block in blocks {
            entries.push(bytes.len() as u32);
            block.encode(&mut bytes);
            // Keep words aligned
            if bytes.len() % 2 != 0 {
                bytes.push(0);
            }
        }
        Self { bytes, entries }
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    pub fn byte_len(&self) -> usize {
        self.bytes.len()
    }

    /// Address of a height block. Unknown entries point past the table.
    pub fn entry_address(&self, lookup: u16) -> u32 {
        self.entries
            .get(usize::from(lookup))
            .copied()
            .unwrap_or(self.bytes.len() as u32)
    }

    pub fn read8(&self, addr: u32) -> i8 {
        self.bytes.get(addr as usize).map_or(-1, |b| *b as i8)
    }

    pub fn read16(&self, addr: u32) -> i16 {
        let at = addr as usize;
        match self.bytes.get(at..at + 2) {
            Some(pair) => BigEndian::read_i16(pair),
            None => HEIGHT_END,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elevation_block_layout() {
        let map = HeightMap::from_blocks(&[HeightBlockDef::Elevation {
            step: 12,
            down_mult: 2,
            up_mult: 3,
            heights: vec![0x10, -0x20],
        }]);
        let addr = map.entry_address(0);
        assert_eq!(map.read8(addr), 0);
        assert_eq!(map.read8(addr + 1), 12);
        assert_eq!(map.read8(addr + 2), 2);
        assert_eq!(map.read8(addr + 3), 3);
        assert_eq!(map.read16(addr + 4), 0x10);
        assert_eq!(map.read16(addr + 6), -0x20);
        assert_eq!(map.read16(addr + 8), HEIGHT_END);
    }

    #[test]
    fn hold_block_with_lift_uses_ctrl_two() {
        let map = HeightMap::from_blocks(&[
            HeightBlockDef::flat(),
            HeightBlockDef::Hold {
                step: 4,
                delay: 30,
                heights: vec![0x40, 0],
                horizon_lift: true,
            },
        ]);
        let addr = map.entry_address(1);
        assert_eq!(map.read8(addr) as u8, CTRL_HOLD_LIFT);
        assert_eq!(map.read16(addr + 2), 30);
        assert_eq!(map.read16(addr + 4), 0x40);
    }

    #[test]
    fn reads_past_end_are_terminators() {
        let map = HeightMap::from_blocks(&[HeightBlockDef::Raw { bytes: vec![9, 1, 0] }]);
        assert_eq!(map.byte_len(), 4);
        assert_eq!(map.read16(100), HEIGHT_END);
        assert_eq!(map.read8(100), -1);
        assert_eq!(map.entry_address(7), 4);
    }
}
