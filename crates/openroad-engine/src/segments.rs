//! Width/height segment tracker: applies road width changes and queues height
//! table requests as the car passes each segment's position

use openroad_common::Fixed1616;
use openroad_track::{TrackData, WidthHeightSegment};
use serde::Serialize;

use crate::elevation::ElevationStateMachine;

#[derive(Debug, Clone, Serialize)]
pub struct WidthHeightTracker {
    /// Next segment to reach
    pub index: usize,
    /// Road half-width, 16.16
    pub width: Fixed1616,
    /// Width being moved towards
    pub target: i16,
    /// Signed width change per unit of speed
    pub adjust: i16,
    pub changing: bool,
}

impl WidthHeightTracker {
    pub fn new(start_width: i16) -> Self {
        Self {
            index: 0,
            width: Fixed1616::from_int(start_width),
            target: start_width,
            adjust: 0,
            changing: false,
        }
    }

    /// Start over at the first segment of a new section. The width carries over.
    pub fn reset(&mut self) {
        self.index = 0;
    }

    /// Whole-unit width used by the h-scroll projector
    pub fn width_int(&self) -> i16 {
        self.width.int()
    }

    /// Handle at most one reached segment, then step any width change.
    /// Returns the segment that was reached.
    pub fn update(
        &mut self,
        track: &dyn TrackData,
        position: u32,
        speed: u16,
        heights: &mut ElevationStateMachine,
    ) -> Option<WidthHeightSegment> {
        let reached = track
            .width_height_segment(self.index)
            .filter(|segment| u32::from(segment.position()) <= position);

        if let Some(segment) = reached {
            match segment {
                WidthHeightSegment::Height { lookup, .. } => {
                    if heights.request(lookup) {
                        tracing::debug!("Height entry {} requested at {}", lookup, position);
                    }
                }
                WidthHeightSegment::Width { width, speed: adjust, .. } => {
                    let current = self.width_int();
                    if width != current {
                        self.target = width;
                        self.adjust = if width <= current { adjust.wrapping_neg() } else { adjust };
                        self.changing = true;
                        tracing::debug!("Road width {} -> {} at {}", current, width, position);
                    }
                }
            }
            self.index += 1;
        }

        if self.changing && speed != 0 {
            self.step_width(speed);
        }
        reached
    }

    fn step_width(&mut self, speed: u16) {
        let delta = (i32::from(speed) * i32::from(self.adjust)).wrapping_shl(4);
        self.width = self.width.wrapping_add(Fixed1616::from_raw(delta));

        let done = if delta > 0 {
            self.target < self.width_int()
        } else {
            self.target >= self.width_int()
        };
        if done {
            self.changing = false;
            self.width = Fixed1616::from_int(self.target);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use openroad_track::TrackSection;

    fn track(segments: Vec<WidthHeightSegment>) -> TrackSection {
        TrackSection::straight("segments", 64).with_segments(segments)
    }

    #[test]
    fn width_grows_to_target_and_clamps() {
        let track = track(vec![WidthHeightSegment::Width {
            position: 0,
            width: 0x1D0,
            speed: 0x100,
        }]);
        let mut heights = ElevationStateMachine::new(0x240);
        let mut tracker = WidthHeightTracker::new(0x1C2);

        tracker.update(&track, 0, 0x10, &mut heights);
        assert!(tracker.changing);
        assert_eq!(tracker.width.raw(), (0x1C2 << 16) + 0x10000);

        for _ in 0..32 {
            tracker.update(&track, 1, 0x10, &mut heights);
        }
        assert!(!tracker.changing);
        assert_eq!(tracker.width, Fixed1616::from_int(0x1D0));
    }

    #[test]
    fn narrowing_negates_adjust() {
        let track = track(vec![WidthHeightSegment::Width {
            position: 5,
            width: 0x100,
            speed: 0x200,
        }]);
        let mut heights = ElevationStateMachine::new(0x240);
        let mut tracker = WidthHeightTracker::new(0x1C2);

        assert_eq!(tracker.update(&track, 4, 0x40, &mut heights), None);
        assert!(tracker.update(&track, 5, 0x40, &mut heights).is_some());
        assert_eq!(tracker.adjust, -0x200);
        for _ in 0..64 {
            tracker.update(&track, 6, 0x40, &mut heights);
        }
        assert_eq!(tracker.width_int(), 0x100);
    }

    #[test]
    fn stopped_car_keeps_width() {
        let track = track(vec![WidthHeightSegment::Width {
            position: 0,
            width: 0x200,
            speed: 0x100,
        }]);
        let mut heights = ElevationStateMachine::new(0x240);
        let mut tracker = WidthHeightTracker::new(0x1C2);
        tracker.update(&track, 0, 0, &mut heights);
        assert!(tracker.changing);
        assert_eq!(tracker.width_int(), 0x1C2);
    }

    #[test]
    fn height_request_waits_for_pending_one() {
        let track = track(vec![
            WidthHeightSegment::Height { position: 0, lookup: 2 },
            WidthHeightSegment::Height { position: 0, lookup: 3 },
        ]);
        let mut heights = ElevationStateMachine::new(0x240);
        let mut tracker = WidthHeightTracker::new(0x1C2);

        tracker.update(&track, 0, 0, &mut heights);
        assert_eq!(heights.lookup, 2);
        tracker.update(&track, 0, 0, &mut heights);
        assert_eq!(heights.lookup, 2, "second request must not replace the pending one");
        assert_eq!(tracker.index, 2);
    }
}
