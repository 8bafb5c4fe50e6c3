// src/detection/landmarks.rs
//
// 21-joint hand skeleton as delivered by the pose detector. Joints the
// detector did not report, or reported below the confidence gate, are
// absent evidence rather than errors.

use crate::geometry::FingerJoints;
use crate::types::{Landmark, Point2};
use serde::{Deserialize, Serialize};

pub const JOINT_COUNT: usize = 21;

pub const WRIST: usize = 0;
pub const THUMB_CMC: usize = 1;
pub const THUMB_MP: usize = 2;
pub const THUMB_IP: usize = 3;
pub const THUMB_TIP: usize = 4;
pub const INDEX_MCP: usize = 5;
pub const INDEX_PIP: usize = 6;
pub const INDEX_DIP: usize = 7;
pub const INDEX_TIP: usize = 8;
pub const MIDDLE_MCP: usize = 9;
pub const MIDDLE_PIP: usize = 10;
pub const MIDDLE_DIP: usize = 11;
pub const MIDDLE_TIP: usize = 12;
pub const RING_MCP: usize = 13;
pub const RING_PIP: usize = 14;
pub const RING_DIP: usize = 15;
pub const RING_TIP: usize = 16;
pub const LITTLE_MCP: usize = 17;
pub const LITTLE_PIP: usize = 18;
pub const LITTLE_DIP: usize = 19;
pub const LITTLE_TIP: usize = 20;

const JOINT_NAMES: [&str; JOINT_COUNT] = [
    "wrist",
    "thumb_cmc",
    "thumb_mp",
    "thumb_ip",
    "thumb_tip",
    "index_mcp",
    "index_pip",
    "index_dip",
    "index_tip",
    "middle_mcp",
    "middle_pip",
    "middle_dip",
    "middle_tip",
    "ring_mcp",
    "ring_pip",
    "ring_dip",
    "ring_tip",
    "little_mcp",
    "little_pip",
    "little_dip",
    "little_tip",
];

/// Resolve a detector joint name ("indexTip", "index_tip", "INDEX-TIP")
/// to its skeleton index. "pinky" is accepted for the little finger.
pub fn joint_index(name: &str) -> Option<usize> {
    let mut normalized = String::with_capacity(name.len() + 2);
    let mut prev_lower = false;
    for c in name.chars() {
        if c == '-' || c == ' ' {
            normalized.push('_');
        } else {
            if c.is_ascii_uppercase() && prev_lower {
                normalized.push('_');
            }
            normalized.push(c.to_ascii_lowercase());
        }
        prev_lower = c.is_ascii_lowercase();
    }
    let normalized = normalized.replace("pinky", "little").replace("thumb_mcp", "thumb_mp");

    JOINT_NAMES.iter().position(|n| *n == normalized)
}

pub fn joint_name(index: usize) -> Option<&'static str> {
    JOINT_NAMES.get(index).copied()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Finger {
    Thumb,
    Index,
    Middle,
    Ring,
    Little,
}

impl Finger {
    pub const ALL: [Finger; 5] = [
        Finger::Thumb,
        Finger::Index,
        Finger::Middle,
        Finger::Ring,
        Finger::Little,
    ];

    /// Joint indices tip-first: tip, dip, pip, mcp (tip, IP, MP, CMC for the thumb).
    pub fn joints(&self) -> [usize; 4] {
        match self {
            Finger::Thumb => [THUMB_TIP, THUMB_IP, THUMB_MP, THUMB_CMC],
            Finger::Index => [INDEX_TIP, INDEX_DIP, INDEX_PIP, INDEX_MCP],
            Finger::Middle => [MIDDLE_TIP, MIDDLE_DIP, MIDDLE_PIP, MIDDLE_MCP],
            Finger::Ring => [RING_TIP, RING_DIP, RING_PIP, RING_MCP],
            Finger::Little => [LITTLE_TIP, LITTLE_DIP, LITTLE_PIP, LITTLE_MCP],
        }
    }

    pub fn tip(&self) -> usize {
        self.joints()[0]
    }
}

/// One joint tuple at the detector boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JointObservation {
    pub name: String,
    pub x: f32,
    pub y: f32,
    pub confidence: f32,
}

/// Everything the detector reported for one hand in one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct HandFrame {
    pub joints: [Option<Landmark>; JOINT_COUNT],
    pub detection_confidence: f32,
    pub timestamp: f64,
}

impl HandFrame {
    pub fn new(timestamp: f64, detection_confidence: f32) -> Self {
        Self {
            joints: [None; JOINT_COUNT],
            detection_confidence,
            timestamp,
        }
    }

    /// Build from a complete landmark array (tests, replays of cleaned data).
    pub fn from_landmarks(landmarks: &[Landmark; JOINT_COUNT], timestamp: f64) -> Self {
        let mut frame = Self::new(timestamp, 1.0);
        for (slot, lm) in frame.joints.iter_mut().zip(landmarks.iter()) {
            *slot = Some(*lm);
        }
        frame
    }

    /// Unknown joint names and non-finite coordinates are ignored.
    pub fn from_observations<'a, I>(observations: I, detection_confidence: f32, timestamp: f64) -> Self
    where
        I: IntoIterator<Item = &'a JointObservation>,
    {
        let mut frame = Self::new(timestamp, detection_confidence);
        for obs in observations {
            if !(obs.x.is_finite() && obs.y.is_finite() && obs.confidence.is_finite()) {
                continue;
            }
            if let Some(index) = joint_index(&obs.name) {
                frame.joints[index] = Some(Landmark::new(
                    obs.x,
                    obs.y,
                    obs.confidence.clamp(0.0, 1.0),
                ));
            }
        }
        frame
    }

    /// Joint at `index` if present and at or above the confidence gate.
    pub fn joint(&self, index: usize, min_confidence: f32) -> Option<Landmark> {
        self.joints
            .get(index)
            .copied()
            .flatten()
            .filter(|lm| lm.confidence >= min_confidence)
    }

    pub fn usable_count(&self, min_confidence: f32) -> usize {
        (0..JOINT_COUNT)
            .filter(|&i| self.joint(i, min_confidence).is_some())
            .count()
    }

    /// The full skeleton, only when all 21 joints clear the gate.
    pub fn complete(&self, min_confidence: f32) -> Option<HandLandmarks> {
        let mut points = [Landmark::default(); JOINT_COUNT];
        for (i, slot) in points.iter_mut().enumerate() {
            *slot = self.joint(i, min_confidence)?;
        }
        Some(HandLandmarks { points })
    }
}

/// A complete 21-joint skeleton.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HandLandmarks {
    pub points: [Landmark; JOINT_COUNT],
}

impl HandLandmarks {
    pub fn new(points: [Landmark; JOINT_COUNT]) -> Self {
        Self { points }
    }

    pub fn get(&self, index: usize) -> Landmark {
        self.points[index]
    }

    pub fn position(&self, index: usize) -> Point2 {
        self.points[index].position()
    }

    pub fn confidence(&self, index: usize) -> f32 {
        self.points[index].confidence
    }

    pub fn finger(&self, finger: Finger) -> FingerJoints {
        let [tip, dip, pip, mcp] = finger.joints();
        FingerJoints {
            tip: self.position(tip),
            dip: self.position(dip),
            pip: self.position(pip),
            mcp: self.position(mcp),
        }
    }

    /// Mean confidence over a set of joints.
    pub fn mean_confidence(&self, indices: &[usize]) -> f32 {
        if indices.is_empty() {
            return 0.0;
        }
        indices.iter().map(|&i| self.confidence(i)).sum::<f32>() / indices.len() as f32
    }
}
