// src/adaptive/thresholds.rs

use crate::types::{GestureLabel, LearningConfig};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Accuracy below this lowers the threshold, making the label easier to accept.
pub const LOW_ACCURACY: f64 = 0.7;
/// Accuracy above this raises the threshold.
pub const HIGH_ACCURACY: f64 = 0.9;

/// Per-label confidence cutoff nudged by observed accuracy.
///
/// Plain proportional control: a fixed step per cycle in the direction the
/// accuracy band asks for. A step that is large compared with the sample
/// noise makes it oscillate around the band edges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdaptiveThreshold {
    pub base: f32,
    pub current: f32,
    pub min: f32,
    pub max: f32,
    pub adaptation_rate: f32,
}

impl AdaptiveThreshold {
    pub fn new(base: f32, min: f32, max: f32, adaptation_rate: f32) -> Self {
        let (min, max) = if min <= max { (min, max) } else { (max, min) };
        let base = base.clamp(min, max);
        Self {
            base,
            current: base,
            min,
            max,
            adaptation_rate,
        }
    }

    pub fn from_config(config: &LearningConfig) -> Self {
        Self::new(
            config.base_threshold,
            config.min_threshold,
            config.max_threshold,
            config.adaptation_rate,
        )
    }

    /// Shift by `delta`, never leaving [min, max].
    pub fn adjust_threshold(&mut self, delta: f32) {
        if !delta.is_finite() {
            return;
        }
        self.current = (self.current + delta).clamp(self.min, self.max);
    }

    pub fn get(&self) -> f32 {
        self.current
    }

    pub fn reset(&mut self) {
        self.current = self.base;
    }

    /// Rebuild through [`AdaptiveThreshold::new`] so decoded values obey the
    /// same bounds as fresh ones. Non-finite fields take the fallback's value.
    pub fn sanitized(&self, fallback: &AdaptiveThreshold) -> Self {
        let pick = |value: f32, default: f32| if value.is_finite() { value } else { default };
        let mut t = Self::new(
            pick(self.base, fallback.base),
            pick(self.min, fallback.min),
            pick(self.max, fallback.max),
            pick(self.adaptation_rate, fallback.adaptation_rate).abs(),
        );
        t.current = pick(self.current, t.base).clamp(t.min, t.max);
        t
    }
}

/// Correct / total tally for one label over a learning window.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AccuracyTally {
    pub correct: usize,
    pub total: usize,
}

impl AccuracyTally {
    pub fn record(&mut self, correct: bool) {
        self.total += 1;
        if correct {
            self.correct += 1;
        }
    }

    pub fn accuracy(&self) -> Option<f64> {
        (self.total > 0).then(|| self.correct as f64 / self.total as f64)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdMove {
    Lowered,
    Raised,
    Held,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AdaptiveThresholdStore {
    thresholds: BTreeMap<GestureLabel, AdaptiveThreshold>,
}

impl AdaptiveThresholdStore {
    /// One threshold per recognizable label, all starting at the base value.
    pub fn new(config: &LearningConfig) -> Self {
        let template = AdaptiveThreshold::from_config(config);
        Self {
            thresholds: GestureLabel::RECOGNIZED
                .iter()
                .map(|&label| (label, template.clone()))
                .collect(),
        }
    }

    /// Bring a decoded store back in line: every entry within its bounds,
    /// one entry per recognizable label and nothing else. Returns how many
    /// entries were repaired, added or dropped.
    pub fn reconcile(&mut self, config: &LearningConfig) -> usize {
        let template = AdaptiveThreshold::from_config(config);
        let before = self.thresholds.len();
        self.thresholds.retain(|label, _| GestureLabel::RECOGNIZED.contains(label));
        let mut changed = before - self.thresholds.len();

        for label in GestureLabel::RECOGNIZED {
            match self.thresholds.get_mut(&label) {
                Some(threshold) => {
                    let rebuilt = threshold.sanitized(&template);
                    if rebuilt != *threshold {
                        debug!("🎯 {} threshold repaired to {:.3}", label, rebuilt.current);
                        *threshold = rebuilt;
                        changed += 1;
                    }
                }
                None => {
                    self.thresholds.insert(label, template.clone());
                    changed += 1;
                }
            }
        }

        changed
    }

    pub fn get(&self, label: GestureLabel) -> Option<&AdaptiveThreshold> {
        self.thresholds.get(&label)
    }

    pub fn current(&self, label: GestureLabel) -> Option<f32> {
        self.get(label).map(|t| t.current)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&GestureLabel, &AdaptiveThreshold)> {
        self.thresholds.iter()
    }

    pub fn len(&self) -> usize {
        self.thresholds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.thresholds.is_empty()
    }

    /// Overwrite the current value (calibration seeding), clamped to bounds.
    pub fn seed(&mut self, label: GestureLabel, value: f32) {
        if let Some(t) = self.thresholds.get_mut(&label) {
            let delta = value - t.current;
            t.adjust_threshold(delta);
            info!("🎯 Seeded {} threshold at {:.3}", label, t.current);
        }
    }

    /// Apply one cycle's worth of per-label accuracy.
    pub fn update_from_accuracy(
        &mut self,
        tallies: &BTreeMap<GestureLabel, AccuracyTally>,
    ) -> BTreeMap<GestureLabel, ThresholdMove> {
        let mut moves = BTreeMap::new();

        for (label, tally) in tallies {
            let (Some(threshold), Some(accuracy)) = (self.thresholds.get_mut(label), tally.accuracy())
            else {
                continue;
            };

            let movement = if accuracy < LOW_ACCURACY {
                threshold.adjust_threshold(-threshold.adaptation_rate);
                ThresholdMove::Lowered
            } else if accuracy > HIGH_ACCURACY {
                threshold.adjust_threshold(threshold.adaptation_rate);
                ThresholdMove::Raised
            } else {
                ThresholdMove::Held
            };

            debug!(
                "🎯 {} threshold {:.3} (accuracy {:.0}%, {:?})",
                label,
                threshold.current,
                accuracy * 100.0,
                movement
            );
            moves.insert(*label, movement);
        }

        moves
    }

    /// A user correction counts double against the detected label.
    pub fn report_incorrect(&mut self, detected: GestureLabel) {
        if let Some(t) = self.thresholds.get_mut(&detected) {
            t.adjust_threshold(-2.0 * t.adaptation_rate);
            debug!("🎯 {} threshold lowered to {:.3} after correction", detected, t.current);
        }
    }

    pub fn currents(&self) -> BTreeMap<GestureLabel, f32> {
        self.thresholds.iter().map(|(l, t)| (*l, t.current)).collect()
    }

    pub fn reset(&mut self) {
        for t in self.thresholds.values_mut() {
            t.reset();
        }
    }
}
