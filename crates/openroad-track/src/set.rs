//! Track files: stages plus optional road split and bonus sections, in TOML

use serde::Deserialize;
use std::path::Path;

use crate::height::{HeightBlockDef, HeightMap};
use crate::path::{PathDelta, PathSegment};
use crate::segment::WidthHeightSegment;
use crate::{Result, StageSelect, TrackData, TrackError};

/// Entries in one background colour strip
pub const BG_STRIP_LEN: usize = 0x200;

// ---------------------------------------------------------------------------
// File format
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct TrackFile {
    name: String,
    stages: Vec<SectionDef>,
    split: Option<SectionDef>,
    bonus: Option<SectionDef>,
}

#[derive(Debug, Deserialize)]
struct SectionDef {
    name: String,
    path: Vec<PathSegment>,
    #[serde(default)]
    segments: Vec<WidthHeightSegment>,
    #[serde(default)]
    heights: Vec<HeightBlockDef>,
    #[serde(default)]
    bg_colors: Vec<u16>,
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

/// One loadable stretch of road
#[derive(Debug, Clone)]
pub struct TrackSection {
    pub name: String,
    path: Vec<PathDelta>,
    segments: Vec<WidthHeightSegment>,
    heights: HeightMap,
    bg_colors: Vec<u16>,
}

impl TrackSection {
    /// Section with a path only, a flat height entry and no segments
    pub fn from_path(name: &str, path: Vec<PathDelta>) -> Self {
        Self {
            name: name.to_string(),
            path,
            segments: Vec::new(),
            heights: HeightMap::from_blocks(&[HeightBlockDef::flat()]),
            bg_colors: Vec::new(),
        }
    }

    /// Dead straight road heading +y
    pub fn straight(name: &str, length: usize) -> Self {
        Self::from_path(name, vec![PathDelta::new(0, 100); length])
    }

    pub fn with_heights(mut self, blocks: &[HeightBlockDef]) -> Self {
        self.heights = HeightMap::from_blocks(blocks);
        self
    }

    pub fn with_segments(mut self, segments: Vec<WidthHeightSegment>) -> Self {
        self.segments = segments;
        self
    }

    pub fn with_bg_colors(mut self, colors: Vec<u16>) -> Self {
        self.bg_colors = colors;
        self
    }

    pub fn path_len(&self) -> usize {
        self.path.len()
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    pub fn height_entries(&self) -> usize {
        self.heights.entry_count()
    }

    fn from_def(def: SectionDef) -> Result<Self> {
        let path = PathSegment::expand(&def.path);
        if path.len() < 2 {
            return Err(TrackError::InvalidTrack(format!(
                "section '{}' needs at least two path entries",
                def.name
            )));
        }
        // The curve direction comes from pairs of deltas; a pair summing to
        // zero has no direction.
        if let Some(i) = path
            .windows(2)
            .position(|w| w[0].wrapping_add(w[1]).is_zero())
        {
            return Err(TrackError::InvalidTrack(format!(
                "section '{}': path entries {} and {} cancel out",
                def.name,
                i,
                i + 1
            )));
        }
        if def
            .segments
            .windows(2)
            .any(|w| w[1].position() < w[0].position())
        {
            return Err(TrackError::InvalidTrack(format!(
                "section '{}': width/height segments out of order",
                def.name
            )));
        }

        let mut heights = def.heights;
        if heights.is_empty() {
            heights.push(HeightBlockDef::flat());
        }
        for seg in &def.segments {
            if let WidthHeightSegment::Height { lookup, .. } = seg {
                if usize::from(*lookup) >= heights.len() {
                    return Err(TrackError::InvalidTrack(format!(
                        "section '{}': height lookup {} has no block",
                        def.name, lookup
                    )));
                }
            }
        }
        if !def.bg_colors.is_empty() && def.bg_colors.len() % BG_STRIP_LEN != 0 {
            tracing::warn!(
                "Section '{}': {} background colours is not a whole number of strips",
                def.name,
                def.bg_colors.len()
            );
        }

        Ok(Self {
            name: def.name,
            path,
            segments: def.segments,
            heights: HeightMap::from_blocks(&heights),
            bg_colors: def.bg_colors,
        })
    }
}

impl TrackData for TrackSection {
    fn path_delta(&self, position: u32) -> PathDelta {
        self.path
            .get(position as usize)
            .copied()
            .unwrap_or(PathDelta::ZERO)
    }

    fn width_height_segment(&self, index: usize) -> Option<WidthHeightSegment> {
        self.segments.get(index).copied()
    }

    fn height_map(&self) -> &HeightMap {
        &self.heights
    }

    fn bg_color_strip(&self, index: usize) -> Option<&[u16]> {
        let start = index * BG_STRIP_LEN;
        self.bg_colors.get(start..start + BG_STRIP_LEN)
    }
}

// ---------------------------------------------------------------------------
// Track set
// ---------------------------------------------------------------------------

/// All sections of a track with a current-section pointer
#[derive(Debug, Clone)]
pub struct TrackSet {
    pub name: String,
    stages: Vec<TrackSection>,
    split: Option<TrackSection>,
    bonus: Option<TrackSection>,
    current: StageSelect,
}

impl TrackSet {
    pub fn new(name: &str, stages: Vec<TrackSection>) -> Result<Self> {
        if stages.is_empty() {
            return Err(TrackError::InvalidTrack(format!("track '{}' has no stages", name)));
        }
        Ok(Self {
            name: name.to_string(),
            stages,
            split: None,
            bonus: None,
            current: StageSelect::Stage(0),
        })
    }

    pub fn with_split(mut self, split: TrackSection) -> Self {
        self.split = Some(split);
        self
    }

    pub fn with_bonus(mut self, bonus: TrackSection) -> Self {
        self.bonus = Some(bonus);
        self
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        let file: TrackFile = toml::from_str(text)?;
        let stages = file
            .stages
            .into_iter()
            .map(TrackSection::from_def)
            .collect::<Result<Vec<_>>>()?;
        let mut set = Self::new(&file.name, stages)?;
        set.split = file.split.map(TrackSection::from_def).transpose()?;
        set.bonus = file.bonus.map(TrackSection::from_def).transpose()?;
        Ok(set)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let set = Self::from_toml_str(&text)?;
        tracing::info!(
            "Loaded track '{}' from {} ({} stages)",
            set.name,
            path.display(),
            set.stage_count()
        );
        Ok(set)
    }

    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    pub fn section(&self, select: StageSelect) -> Option<&TrackSection> {
        match select {
            StageSelect::Stage(i) => self.stages.get(usize::from(i)),
            StageSelect::Split => self.split.as_ref(),
            StageSelect::Bonus => self.bonus.as_ref(),
        }
    }

    pub fn sections(&self) -> impl Iterator<Item = (StageSelect, &TrackSection)> {
        let stages = self
            .stages
            .iter()
            .enumerate()
            .map(|(i, s)| (StageSelect::Stage(i as u8), s));
        let split = self.split.iter().map(|s| (StageSelect::Split, s));
        let bonus = self.bonus.iter().map(|s| (StageSelect::Bonus, s));
        stages.chain(split).chain(bonus)
    }

    fn current_section(&self) -> &TrackSection {
        // `current` is only ever set to a section that exists
        self.section(self.current).unwrap_or(&self.stages[0])
    }
}

impl TrackData for TrackSet {
    fn path_delta(&self, position: u32) -> PathDelta {
        self.current_section().path_delta(position)
    }

    fn width_height_segment(&self, index: usize) -> Option<WidthHeightSegment> {
        self.current_section().width_height_segment(index)
    }

    fn height_map(&self) -> &HeightMap {
        self.current_section().height_map()
    }

    fn bg_color_strip(&self, index: usize) -> Option<&[u16]> {
        self.current_section().bg_color_strip(index)
    }

    fn select(&mut self, select: StageSelect) -> Result<()> {
        let name = self
            .section(select)
            .map(|s| s.name.clone())
            .ok_or(TrackError::StageNotFound(select))?;
        tracing::debug!("Selected {} ({})", select, name);
        self.current = select;
        Ok(())
    }

    fn current(&self) -> StageSelect {
        self.current
    }
}
