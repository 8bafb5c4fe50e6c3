// src/detection/classifier.rs
//
// Single-frame pose classification. Rules are tried in priority order and
// the first match wins; motion pre-empts every static pose.

use super::landmarks::*;
use super::motion::{MotionHistory, SwipeParams};
use crate::geometry::{distance, is_finger_extended, is_finger_pointing_down, Strictness};
use crate::types::{GestureLabel, RecognitionConfig};
use tracing::trace;

/// Thumb tip must clear the index knuckle by this much for thumbs up/down.
const THUMB_VERTICAL_MARGIN: f32 = 0.05;
const POINTING_MIN_CONFIDENCE: f32 = 0.8;
const PEACE_MAX_TIP_DISTANCE: f32 = 0.15;
const PEACE_MIN_CONFIDENCE: f32 = 0.8;
const FIST_WRIST_MIN_CONFIDENCE: f32 = 0.8;
const OPEN_HAND_MIN_TIP_CONFIDENCE: f32 = 0.85;
/// Fallback: this many extended fingers reads as an open hand.
const FALLBACK_OPEN_COUNT: usize = 3;

const TIPS: [usize; 5] = [THUMB_TIP, INDEX_TIP, MIDDLE_TIP, RING_TIP, LITTLE_TIP];

#[derive(Debug, Clone, Copy)]
pub struct ClassifierParams {
    pub min_landmark_confidence: f32,
    pub pinch_distance_threshold: f32,
    pub pinch_min_confidence: f32,
    /// Minimum tip reach over joint-chain length for an extended finger
    pub finger_extension_threshold: f32,
    pub swipe: SwipeParams,
}

impl Default for ClassifierParams {
    fn default() -> Self {
        Self::from(&RecognitionConfig::default())
    }
}

impl From<&RecognitionConfig> for ClassifierParams {
    fn from(config: &RecognitionConfig) -> Self {
        Self {
            min_landmark_confidence: config.min_landmark_confidence,
            pinch_distance_threshold: config.pinch_distance_threshold,
            pinch_min_confidence: config.pinch_min_confidence,
            finger_extension_threshold: config.finger_extension_threshold,
            swipe: SwipeParams {
                min_distance: config.swipe_distance_threshold,
                axis_dominance: config.swipe_axis_dominance,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classification {
    pub label: GestureLabel,
    /// Mean confidence of the joints the deciding rule consulted
    pub confidence: f32,
}

impl Classification {
    fn new(label: GestureLabel, confidence: f32) -> Self {
        Self { label, confidence }
    }

    pub fn unknown() -> Self {
        Self::new(GestureLabel::Unknown, 0.0)
    }
}

/// Which fingers pass the extension test in one frame.
#[derive(Debug, Clone, Copy, Default)]
struct Extension {
    thumb: bool,
    index: bool,
    middle: bool,
    ring: bool,
    little: bool,
}

impl Extension {
    fn of(hand: &HandLandmarks, min_straightness: f32) -> Self {
        let extended =
            |finger, strictness| is_finger_extended(&hand.finger(finger), strictness, min_straightness);
        Self {
            thumb: extended(Finger::Thumb, Strictness::Standard),
            index: extended(Finger::Index, Strictness::Index),
            middle: extended(Finger::Middle, Strictness::Standard),
            ring: extended(Finger::Ring, Strictness::Standard),
            little: extended(Finger::Little, Strictness::Standard),
        }
    }

    fn count(&self) -> usize {
        [self.thumb, self.index, self.middle, self.ring, self.little]
            .iter()
            .filter(|&&e| e)
            .count()
    }

    fn any_finger(&self) -> bool {
        self.index || self.middle || self.ring || self.little
    }
}

pub struct GestureClassifier {
    params: ClassifierParams,
}

impl GestureClassifier {
    pub fn new(params: ClassifierParams) -> Self {
        Self { params }
    }

    pub fn from_config(config: &RecognitionConfig) -> Self {
        Self::new(ClassifierParams::from(config))
    }

    pub fn params(&self) -> &ClassifierParams {
        &self.params
    }

    /// Classify one frame. Fewer than 21 usable joints yields `Unknown`.
    pub fn classify(&self, frame: &HandFrame, motion: &MotionHistory) -> Classification {
        let Some(hand) = frame.complete(self.params.min_landmark_confidence) else {
            trace!(
                "incomplete hand: {}/{} joints usable",
                frame.usable_count(self.params.min_landmark_confidence),
                JOINT_COUNT
            );
            return Classification::unknown();
        };

        if let Some(swipe) = motion.detect_swipe(&self.params.swipe) {
            return Classification::new(swipe, hand.confidence(INDEX_TIP));
        }

        self.classify_pose(&hand)
    }

    /// Static pose rules only.
    pub fn classify_pose(&self, hand: &HandLandmarks) -> Classification {
        let ext = Extension::of(hand, self.params.finger_extension_threshold);
        let thumb_tip = hand.position(THUMB_TIP);
        let index_tip = hand.position(INDEX_TIP);
        let index_mcp = hand.position(INDEX_MCP);

        // Pinch
        let pinch_distance = distance(thumb_tip, index_tip);
        if pinch_distance < self.params.pinch_distance_threshold
            && hand.confidence(THUMB_TIP) > self.params.pinch_min_confidence
            && hand.confidence(INDEX_TIP) > self.params.pinch_min_confidence
        {
            return Classification::new(
                GestureLabel::Pinch,
                hand.mean_confidence(&[THUMB_TIP, INDEX_TIP]),
            );
        }

        let thumb_joints = [THUMB_TIP, THUMB_IP, INDEX_MCP];

        // Thumbs up
        if ext.thumb && ext.count() == 1 && thumb_tip.y < index_mcp.y - THUMB_VERTICAL_MARGIN {
            return Classification::new(GestureLabel::ThumbsUp, hand.mean_confidence(&thumb_joints));
        }

        // Thumbs down
        if !ext.any_finger()
            && is_finger_pointing_down(&hand.finger(Finger::Thumb))
            && thumb_tip.y > index_mcp.y + THUMB_VERTICAL_MARGIN
        {
            return Classification::new(GestureLabel::ThumbsDown, hand.mean_confidence(&thumb_joints));
        }

        // Pointing
        if ext.index
            && !ext.middle
            && !ext.ring
            && !ext.little
            && hand.confidence(INDEX_TIP) > POINTING_MIN_CONFIDENCE
        {
            return Classification::new(
                GestureLabel::Pointing,
                hand.mean_confidence(&Finger::Index.joints()),
            );
        }

        // Peace
        if ext.index
            && ext.middle
            && !ext.ring
            && !ext.little
            && distance(index_tip, hand.position(MIDDLE_TIP)) < PEACE_MAX_TIP_DISTANCE
            && hand.confidence(INDEX_TIP) > PEACE_MIN_CONFIDENCE
            && hand.confidence(MIDDLE_TIP) > PEACE_MIN_CONFIDENCE
        {
            return Classification::new(
                GestureLabel::Peace,
                hand.mean_confidence(&[INDEX_TIP, MIDDLE_TIP]),
            );
        }

        // Fist
        if ext.count() <= 1
            && !ext.index
            && !ext.middle
            && hand.confidence(WRIST) > FIST_WRIST_MIN_CONFIDENCE
        {
            let mut joints = vec![WRIST];
            joints.extend_from_slice(&TIPS);
            return Classification::new(GestureLabel::Fist, hand.mean_confidence(&joints));
        }

        // Open hand
        let tip_confidence = hand.mean_confidence(&TIPS);
        if ext.count() == 5 && tip_confidence > OPEN_HAND_MIN_TIP_CONFIDENCE {
            return Classification::new(GestureLabel::OpenHand, tip_confidence);
        }

        // Ambiguous: fall back on how many fingers are out
        let label = if ext.count() >= FALLBACK_OPEN_COUNT {
            GestureLabel::OpenHand
        } else {
            GestureLabel::Fist
        };
        trace!("fallback {:?} with {} extended", label, ext.count());
        Classification::new(label, tip_confidence)
    }
}

impl Default for GestureClassifier {
    fn default() -> Self {
        Self::new(ClassifierParams::default())
    }
}
