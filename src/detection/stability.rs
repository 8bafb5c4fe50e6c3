// src/detection/stability.rs
//
// Two-stage debounce between raw per-frame detections and the events the
// action dispatcher sees: a hard minimum-interval gate, then a majority vote
// over the most recent detections with a confidence gate on the winner.

use crate::types::{GestureLabel, RawDetection, SensitivityConfig, StabilityConfig, StabilizedEvent};
use std::collections::{HashMap, VecDeque};
use tracing::debug;

/// Fewest buffered detections before a vote is taken.
pub const MIN_DECISION_FRAMES: usize = 3;

/// Decides whether a consensus label at an averaged confidence may fire.
pub trait ConfidenceGate {
    fn should_trigger(&self, label: GestureLabel, confidence: f32) -> bool;
}

impl ConfidenceGate for SensitivityConfig {
    fn should_trigger(&self, label: GestureLabel, confidence: f32) -> bool {
        SensitivityConfig::should_trigger(self, label, confidence)
    }
}

/// Label-independent cutoff.
#[derive(Debug, Clone, Copy)]
pub struct FixedThreshold(pub f32);

impl ConfidenceGate for FixedThreshold {
    fn should_trigger(&self, label: GestureLabel, confidence: f32) -> bool {
        label.is_known() && confidence >= self.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StabilityOutcome {
    Emitted(StabilizedEvent),
    /// Inside the minimum interval after the last event
    Debounced,
    /// Not enough buffered frames to vote
    Collecting,
    NoConsensus,
    BelowThreshold { label: GestureLabel, confidence: f32 },
}

impl StabilityOutcome {
    pub fn event(&self) -> Option<&StabilizedEvent> {
        match self {
            StabilityOutcome::Emitted(event) => Some(event),
            _ => None,
        }
    }
}

pub struct StabilityFilter {
    buffer: VecDeque<RawDetection>,
    capacity: usize,
    consensus_window: usize,
    consensus_ratio: f32,
    minimum_interval: f64,
    last_event_time: Option<f64>,
}

impl StabilityFilter {
    pub fn new(config: &StabilityConfig) -> Self {
        let capacity = config.buffer_size.max(MIN_DECISION_FRAMES);
        Self {
            buffer: VecDeque::with_capacity(capacity),
            capacity,
            consensus_window: config.consensus_window.clamp(1, capacity),
            consensus_ratio: config.consensus_ratio,
            minimum_interval: config.minimum_gesture_interval,
            last_event_time: None,
        }
    }

    pub fn process<G>(&mut self, detection: RawDetection, gate: &G) -> StabilityOutcome
    where
        G: ConfidenceGate + ?Sized,
    {
        if let Some(last) = self.last_event_time {
            if detection.timestamp - last < self.minimum_interval {
                return StabilityOutcome::Debounced;
            }
        }

        self.buffer.push_back(detection);
        if self.buffer.len() > self.capacity {
            self.buffer.pop_front();
        }

        if self.buffer.len() < MIN_DECISION_FRAMES {
            return StabilityOutcome::Collecting;
        }

        let window = self.consensus_window.min(self.buffer.len());
        let recent: Vec<&RawDetection> = self.buffer.iter().skip(self.buffer.len() - window).collect();

        let label = match self.consensus_label(&recent) {
            Some(label) if label.is_known() => label,
            _ => return StabilityOutcome::NoConsensus,
        };

        let confidence = recent.iter().map(|d| d.confidence).sum::<f32>() / recent.len() as f32;
        if !gate.should_trigger(label, confidence) {
            return StabilityOutcome::BelowThreshold { label, confidence };
        }

        self.last_event_time = Some(detection.timestamp);
        debug!("stabilized {} @ {:.2}", label, confidence);

        StabilityOutcome::Emitted(StabilizedEvent {
            label,
            confidence,
            position: detection.position,
            timestamp: detection.timestamp,
        })
    }

    /// Most frequent label in the window, if it reaches the consensus ratio.
    /// Ties go to the label seen most recently.
    fn consensus_label(&self, recent: &[&RawDetection]) -> Option<GestureLabel> {
        let mut counts: HashMap<GestureLabel, usize> = HashMap::new();
        for d in recent {
            *counts.entry(d.label).or_insert(0) += 1;
        }

        let (label, count) = recent
            .iter()
            .rev()
            .map(|d| (d.label, counts[&d.label]))
            .fold(None, |best: Option<(GestureLabel, usize)>, candidate| match best {
                Some(b) if b.1 >= candidate.1 => Some(b),
                _ => Some(candidate),
            })?;

        let required = (self.consensus_ratio * recent.len() as f32).ceil() as usize;
        (count >= required.max(1)).then_some(label)
    }

    pub fn last_event_time(&self) -> Option<f64> {
        self.last_event_time
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Drop buffered detections; the debounce clock is kept.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    pub fn reset(&mut self) {
        self.buffer.clear();
        self.last_event_time = None;
    }
}
