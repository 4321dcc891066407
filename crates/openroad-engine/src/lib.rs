//! Pseudo-3D road geometry engine
//!
//! Once per tick the engine turns the track path and height tables into
//! per-scanline tables for the road hardware:
//! - `curve`: horizontal road offsets from the path ahead
//! - `hscroll`: per-generator scroll values from those offsets
//! - `elevation` + `profile`: the height segment state machine and the
//!   512-entry elevation profile it drives
//! - `smoother`: crest smoothing and horizon position
//! - `rasterizer`: hardware line-select table and crest priority list
//! - `quad`: the four rotating quadrants the tables live in
//! - `sink`: the road RAM the results are written to

pub mod curve;
pub mod elevation;
pub mod engine;
pub mod hscroll;
pub mod position;
pub mod profile;
pub mod quad;
pub mod rasterizer;
pub mod segments;
pub mod sink;
pub mod smoother;

pub use curve::{Aborted, ScanlineXTable, WriteResult, Written};
pub use elevation::{ElevationStateMachine, HeightMode, HeightPhase};
pub use engine::{RoadEngine, Snapshot, TickReport};
pub use hscroll::{HScrollProjector, HScrollTable};
pub use profile::{ProfileOutcome, UndulationList};
pub use quad::{ScanlineYTable, Slot};
pub use rasterizer::RasterStats;
pub use sink::{HardwareSink, RoadRam};
