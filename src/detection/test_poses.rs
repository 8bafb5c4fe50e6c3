// src/detection/test_poses.rs
//
// Synthetic hand skeletons for unit tests. Wrist at the bottom, knuckles at
// y = 0.6, extended fingers pointing straight up the image.

use super::landmarks::*;
use crate::types::{Landmark, Point2};

const FINGER_X: [(Finger, f32); 4] = [
    (Finger::Index, 0.42),
    (Finger::Middle, 0.50),
    (Finger::Ring, 0.58),
    (Finger::Little, 0.66),
];

pub(crate) struct PoseBuilder {
    points: [Landmark; JOINT_COUNT],
}

impl PoseBuilder {
    /// Every finger curled, thumb tucked.
    pub fn fist() -> Self {
        let mut b = Self {
            points: [Landmark::new(0.5, 0.6, 0.95); JOINT_COUNT],
        };
        b.set(WRIST, 0.5, 0.85);
        b.thumb_tucked();
        for (finger, _) in FINGER_X {
            b.curl(finger);
        }
        b
    }

    pub fn open_hand() -> Self {
        let mut b = Self::fist();
        b.thumb_out();
        for (finger, _) in FINGER_X {
            b.extend(finger);
        }
        b
    }

    pub fn pointing() -> Self {
        let mut b = Self::fist();
        b.extend(Finger::Index);
        b
    }

    pub fn peace() -> Self {
        let mut b = Self::pointing();
        b.extend(Finger::Middle);
        b
    }

    pub fn pinch() -> Self {
        let mut b = Self::pointing();
        b.set(THUMB_TIP, 0.44, 0.37);
        b
    }

    pub fn thumbs_up() -> Self {
        let mut b = Self::fist();
        b.set(THUMB_CMC, 0.40, 0.70);
        b.set(THUMB_MP, 0.38, 0.60);
        b.set(THUMB_IP, 0.37, 0.52);
        b.set(THUMB_TIP, 0.36, 0.45);
        b
    }

    pub fn thumbs_down() -> Self {
        let mut b = Self::fist();
        b.set(THUMB_CMC, 0.40, 0.62);
        b.set(THUMB_MP, 0.38, 0.72);
        b.set(THUMB_IP, 0.37, 0.80);
        b.set(THUMB_TIP, 0.36, 0.87);
        b
    }

    fn x_of(finger: Finger) -> f32 {
        FINGER_X
            .iter()
            .find(|(f, _)| *f == finger)
            .map(|(_, x)| *x)
            .unwrap_or(0.5)
    }

    pub fn extend(&mut self, finger: Finger) -> &mut Self {
        let x = Self::x_of(finger);
        let [tip, dip, pip, mcp] = finger.joints();
        self.set(mcp, x, 0.60);
        self.set(pip, x, 0.50);
        self.set(dip, x, 0.42);
        self.set(tip, x, 0.35);
        self
    }

    pub fn curl(&mut self, finger: Finger) -> &mut Self {
        let x = Self::x_of(finger);
        let [tip, dip, pip, mcp] = finger.joints();
        self.set(mcp, x, 0.60);
        self.set(pip, x, 0.53);
        self.set(dip, x + 0.02, 0.56);
        self.set(tip, x, 0.62);
        self
    }

    fn thumb_out(&mut self) {
        self.set(THUMB_CMC, 0.40, 0.78);
        self.set(THUMB_MP, 0.34, 0.70);
        self.set(THUMB_IP, 0.30, 0.64);
        self.set(THUMB_TIP, 0.27, 0.58);
    }

    fn thumb_tucked(&mut self) {
        self.set(THUMB_CMC, 0.40, 0.78);
        self.set(THUMB_MP, 0.36, 0.70);
        self.set(THUMB_IP, 0.40, 0.66);
        self.set(THUMB_TIP, 0.45, 0.68);
    }

    pub fn set(&mut self, index: usize, x: f32, y: f32) -> &mut Self {
        let c = self.points[index].confidence;
        self.points[index] = Landmark::new(x, y, c);
        self
    }

    pub fn confidence(&mut self, index: usize, confidence: f32) -> &mut Self {
        self.points[index].confidence = confidence;
        self
    }

    pub fn all_confidence(&mut self, confidence: f32) -> &mut Self {
        for p in self.points.iter_mut() {
            p.confidence = confidence;
        }
        self
    }

    /// Translate the whole hand so the index tip lands on `target`.
    pub fn index_tip_at(&mut self, target: Point2) -> &mut Self {
        let tip = self.points[INDEX_TIP];
        let (dx, dy) = (target.x - tip.x, target.y - tip.y);
        for p in self.points.iter_mut() {
            p.x += dx;
            p.y += dy;
        }
        self
    }

    pub fn hand(&self) -> HandLandmarks {
        HandLandmarks::new(self.points)
    }

    pub fn frame(&self, timestamp: f64) -> HandFrame {
        HandFrame::from_landmarks(&self.points, timestamp)
    }
}
