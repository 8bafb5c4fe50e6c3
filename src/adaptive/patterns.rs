// src/adaptive/patterns.rs
//
// Coarse positional fingerprints. Each joint is reduced to (x + y) / 2 and
// averaged over the recent samples of a label; a new hand is scored by how
// close its joints sit to those averages.

use crate::detection::HandLandmarks;
use crate::types::{GestureLabel, Landmark};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// One recorded recognition, kept for the next learning cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingSample {
    pub label: GestureLabel,
    pub landmarks: Vec<Landmark>,
    pub confidence: f32,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub user_confirmed: bool,
}

impl TrainingSample {
    pub fn new(label: GestureLabel, hand: &HandLandmarks, confidence: f32) -> Self {
        Self {
            label,
            landmarks: hand.points.to_vec(),
            confidence,
            timestamp: Utc::now(),
            user_confirmed: false,
        }
    }

    /// Confirmed by the user, or confident enough to be trusted on its own.
    pub fn judged_correct(&self, correct_confidence: f32) -> bool {
        self.user_confirmed || self.confidence > correct_confidence
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GesturePattern {
    pub average_confidence: f32,
    /// Joint index → averaged (x + y) / 2
    pub landmark_signature: BTreeMap<usize, f64>,
    pub sample_count: usize,
    pub last_updated: DateTime<Utc>,
}

impl GesturePattern {
    /// Average a group of samples of the same label. `None` for an empty group.
    pub fn from_samples(samples: &[&TrainingSample]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }

        let mut sums: BTreeMap<usize, f64> = BTreeMap::new();
        let mut confidence = 0.0f32;
        for sample in samples {
            confidence += sample.confidence;
            for (index, lm) in sample.landmarks.iter().enumerate() {
                *sums.entry(index).or_insert(0.0) += joint_scalar(lm);
            }
        }

        let n = samples.len() as f64;
        for value in sums.values_mut() {
            *value /= n;
        }

        Some(Self {
            average_confidence: confidence / samples.len() as f32,
            landmark_signature: sums,
            sample_count: samples.len(),
            last_updated: Utc::now(),
        })
    }
}

fn joint_scalar(lm: &Landmark) -> f64 {
    (lm.x as f64 + lm.y as f64) / 2.0
}

/// Similarity in [0, 1] averaged over the joints the signature knows about.
/// `None` when no joint overlaps.
pub fn calculate_pattern_match(hand: &HandLandmarks, pattern: &GesturePattern) -> Option<f64> {
    let mut similarity = 0.0;
    let mut matched = 0usize;

    for (index, lm) in hand.points.iter().enumerate() {
        if let Some(expected) = pattern.landmark_signature.get(&index) {
            let diff = (joint_scalar(lm) - expected).abs();
            similarity += (1.0 - diff).max(0.0);
            matched += 1;
        }
    }

    (matched > 0).then(|| similarity / matched as f64)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GesturePatternLearner {
    patterns: BTreeMap<GestureLabel, GesturePattern>,
}

impl GesturePatternLearner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_patterns(patterns: BTreeMap<GestureLabel, GesturePattern>) -> Self {
        Self { patterns }
    }

    /// Rebuild signatures from the recent window. Every label present in the
    /// window gets a fresh pattern that replaces the old one outright; labels
    /// absent from the window keep theirs.
    pub fn rebuild(&mut self, window: &[TrainingSample]) -> usize {
        let mut groups: BTreeMap<GestureLabel, Vec<&TrainingSample>> = BTreeMap::new();
        for sample in window.iter().filter(|s| s.label.is_known()) {
            groups.entry(sample.label).or_default().push(sample);
        }

        let mut rebuilt = 0;
        for (label, samples) in groups {
            if let Some(pattern) = GesturePattern::from_samples(&samples) {
                debug!("📝 Pattern rebuilt for {} from {} samples", label, pattern.sample_count);
                self.patterns.insert(label, pattern);
                rebuilt += 1;
            }
        }
        rebuilt
    }

    pub fn get(&self, label: GestureLabel) -> Option<&GesturePattern> {
        self.patterns.get(&label)
    }

    pub fn patterns(&self) -> &BTreeMap<GestureLabel, GesturePattern> {
        &self.patterns
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn clear(&mut self) {
        self.patterns.clear();
    }
}

/// Blend raw confidence with the pattern match: (raw + match) / 2.
pub fn rescale(raw_confidence: f32, pattern_match: Option<f64>) -> f32 {
    match pattern_match {
        Some(m) => ((raw_confidence as f64 + m) / 2.0) as f32,
        None => raw_confidence,
    }
}
