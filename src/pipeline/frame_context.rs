// src/pipeline/frame_context.rs
//
// Everything decided about one frame, in one place. Callers and tests read
// this instead of poking at the stages.

use crate::adaptive::Rescored;
use crate::detection::{Classification, StabilityOutcome};
use crate::types::{GestureLabel, Point2, StabilizedEvent};

#[derive(Debug, Clone, PartialEq)]
pub struct FrameContext {
    pub frame_id: u64,
    pub timestamp: f64,
    /// All 21 joints cleared the confidence gate
    pub hand_present: bool,
    /// Motion history was dropped because of a gap before this frame
    pub motion_reset: bool,
    pub classification: Classification,
    pub rescored: Rescored,
    pub outcome: StabilityOutcome,
    pub screen_position: Option<Point2>,
}

impl FrameContext {
    pub fn event(&self) -> Option<&StabilizedEvent> {
        self.outcome.event()
    }

    /// Label after the adaptive gate, before stabilization.
    pub fn frame_label(&self) -> GestureLabel {
        self.rescored.label
    }
}
