// src/adaptive/snapshot.rs
//
// Read-only view of the learned state for the frame path. The learning
// engine builds a fresh snapshot after every cycle and swaps it in whole;
// readers clone the inner Arc once per frame and never hold the lock while
// classifying.

use super::patterns::{calculate_pattern_match, rescale, GesturePattern};
use super::thresholds::AdaptiveThresholdStore;
use crate::detection::{Classification, HandLandmarks};
use crate::types::GestureLabel;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LearnedSnapshot {
    pub thresholds: BTreeMap<GestureLabel, f32>,
    pub patterns: BTreeMap<GestureLabel, GesturePattern>,
    pub recognition_accuracy: f64,
    /// Bumped by the engine on every swap
    pub generation: u64,
}

/// Classification after the adaptive gate and the pattern blend.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rescored {
    pub label: GestureLabel,
    pub confidence: f32,
    pub raw_confidence: f32,
    pub pattern_match: Option<f64>,
    /// Passed the adaptive gate and should be recorded as a training sample
    pub learnable: bool,
}

impl LearnedSnapshot {
    pub fn from_store(
        store: &AdaptiveThresholdStore,
        patterns: &BTreeMap<GestureLabel, GesturePattern>,
        recognition_accuracy: f64,
        generation: u64,
    ) -> Self {
        Self {
            thresholds: store.currents(),
            patterns: patterns.clone(),
            recognition_accuracy,
            generation,
        }
    }

    /// A raw confidence under the label's adaptive threshold is not trusted
    /// and becomes `Unknown`. Labels without a threshold pass through as-is.
    pub fn rescore(&self, classification: Classification, hand: Option<&HandLandmarks>) -> Rescored {
        let Classification { label, confidence } = classification;
        let passthrough = Rescored {
            label,
            confidence,
            raw_confidence: confidence,
            pattern_match: None,
            learnable: false,
        };

        let Some(&threshold) = self.thresholds.get(&label) else {
            return passthrough;
        };

        if confidence < threshold {
            return Rescored {
                label: GestureLabel::Unknown,
                ..passthrough
            };
        }

        let pattern_match = match (hand, self.patterns.get(&label)) {
            (Some(hand), Some(pattern)) => calculate_pattern_match(hand, pattern),
            _ => None,
        };

        Rescored {
            label,
            confidence: rescale(confidence, pattern_match),
            raw_confidence: confidence,
            pattern_match,
            learnable: hand.is_some(),
        }
    }
}

/// Single-writer, many-reader holder for the current snapshot.
#[derive(Clone, Default)]
pub struct SnapshotCell {
    inner: Arc<RwLock<Arc<LearnedSnapshot>>>,
}

impl SnapshotCell {
    pub fn new(snapshot: LearnedSnapshot) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(snapshot))),
        }
    }

    pub fn load(&self) -> Arc<LearnedSnapshot> {
        self.inner.read().clone()
    }

    pub fn store(&self, snapshot: LearnedSnapshot) {
        *self.inner.write() = Arc::new(snapshot);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adaptive::patterns::TrainingSample;
    use crate::detection::test_poses::PoseBuilder;
    use crate::types::LearningConfig;

    fn snapshot() -> LearnedSnapshot {
        let store = AdaptiveThresholdStore::new(&LearningConfig::default());
        LearnedSnapshot::from_store(&store, &BTreeMap::new(), 0.85, 0)
    }

    fn classification(label: GestureLabel, confidence: f32) -> Classification {
        Classification { label, confidence }
    }

    #[test]
    fn test_below_adaptive_threshold_becomes_unknown() {
        let hand = PoseBuilder::fist().hand();
        let r = snapshot().rescore(classification(GestureLabel::Fist, 0.65), Some(&hand));
        assert_eq!(r.label, GestureLabel::Unknown);
        assert!(!r.learnable);
    }

    #[test]
    fn test_no_pattern_keeps_raw_confidence() {
        let hand = PoseBuilder::fist().hand();
        let r = snapshot().rescore(classification(GestureLabel::Fist, 0.9), Some(&hand));
        assert_eq!(r.label, GestureLabel::Fist);
        assert_eq!(r.confidence, 0.9);
        assert!(r.pattern_match.is_none());
        assert!(r.learnable);
    }

    #[test]
    fn test_pattern_blends_confidence() {
        let pose = PoseBuilder::peace();
        let sample = TrainingSample::new(GestureLabel::Peace, &pose.hand(), 0.9);
        let pattern = GesturePattern::from_samples(&[&sample]).unwrap();

        let mut snap = snapshot();
        snap.patterns.insert(GestureLabel::Peace, pattern);

        let r = snap.rescore(classification(GestureLabel::Peace, 0.8), Some(&pose.hand()));
        assert!((r.confidence - 0.9).abs() < 1e-6);
        assert_eq!(r.raw_confidence, 0.8);
    }

    #[test]
    fn test_unknown_passes_through() {
        let r = snapshot().rescore(Classification::unknown(), None);
        assert_eq!(r.label, GestureLabel::Unknown);
        assert!(!r.learnable);
    }

    #[test]
    fn test_cell_swaps_whole_snapshot() {
        let cell = SnapshotCell::new(snapshot());
        let before = cell.load();

        let mut next = (*before).clone();
        next.generation = 1;
        next.thresholds.insert(GestureLabel::Pinch, 0.9);
        cell.store(next);

        // Earlier readers keep their view
        assert_eq!(before.generation, 0);
        assert_eq!(cell.load().generation, 1);
        assert_eq!(cell.load().thresholds[&GestureLabel::Pinch], 0.9);
    }
}
