// src/detection/motion.rs

use crate::types::{GestureLabel, Point2};
use std::collections::VecDeque;

/// Number of most recent samples a swipe is judged over.
pub const SWIPE_WINDOW: usize = 6;

/// Bounded FIFO of recent index-tip positions feeding swipe detection.
pub struct MotionHistory {
    positions: VecDeque<Point2>,
    capacity: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct SwipeParams {
    /// Minimum first→last displacement (normalized units)
    pub min_distance: f32,
    /// Dominant axis must exceed the other by this factor
    pub axis_dominance: f32,
}

impl Default for SwipeParams {
    fn default() -> Self {
        Self {
            min_distance: 0.08,
            axis_dominance: 1.5,
        }
    }
}

impl MotionHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(SWIPE_WINDOW);
        Self {
            positions: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, position: Point2) {
        self.positions.push_back(position);
        if self.positions.len() > self.capacity {
            self.positions.pop_front();
        }
    }

    pub fn latest(&self) -> Option<Point2> {
        self.positions.back().copied()
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn clear(&mut self) {
        self.positions.clear();
    }

    /// Classify the last six positions as a swipe.
    ///
    /// Every step must move with the overall displacement on both axes (a
    /// single reversal voids the swipe), and one axis must dominate; diagonal
    /// motion is left unclassified.
    pub fn detect_swipe(&self, params: &SwipeParams) -> Option<GestureLabel> {
        if self.positions.len() < SWIPE_WINDOW {
            return None;
        }

        let recent: Vec<Point2> = self
            .positions
            .iter()
            .skip(self.positions.len() - SWIPE_WINDOW)
            .copied()
            .collect();
        let first = recent[0];
        let last = recent[SWIPE_WINDOW - 1];

        let dx = last.x - first.x;
        let dy = last.y - first.y;
        if (dx * dx + dy * dy).sqrt() <= params.min_distance {
            return None;
        }

        let consistent = recent.windows(2).all(|pair| {
            let step_x = pair[1].x - pair[0].x;
            let step_y = pair[1].y - pair[0].y;
            !opposes(dx, step_x) && !opposes(dy, step_y)
        });
        if !consistent {
            return None;
        }

        if dx.abs() > dy.abs() * params.axis_dominance {
            Some(if dx > 0.0 {
                GestureLabel::SwipeRight
            } else {
                GestureLabel::SwipeLeft
            })
        } else if dy.abs() > dx.abs() * params.axis_dominance {
            // Image y grows downward
            Some(if dy < 0.0 {
                GestureLabel::SwipeUp
            } else {
                GestureLabel::SwipeDown
            })
        } else {
            None
        }
    }
}

fn opposes(overall: f32, step: f32) -> bool {
    (overall > 0.0 && step < 0.0) || (overall < 0.0 && step > 0.0)
}
