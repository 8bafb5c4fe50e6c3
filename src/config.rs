// src/config.rs

use crate::types::{
    CalibrationConfig, Config, GestureAction, GestureConfiguration, GestureLabel, LearningConfig,
    LoggingConfig, RecognitionConfig, SensitivityConfig, StabilityConfig, StorageConfig,
    TransformFit,
};
use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let mut config: Config = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        config.validate();
        Ok(config)
    }

    /// Missing or malformed config files fall back to defaults.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        match Self::load(path.as_ref()) {
            Ok(config) => {
                info!("✓ Configuration loaded from {}", path.as_ref().display());
                config
            }
            Err(e) => {
                warn!("⚠️  Using default configuration: {:#}", e);
                Self::default()
            }
        }
    }

    /// Clamp knobs into the ranges the algorithms are defined for.
    pub fn validate(&mut self) {
        let r = &mut self.recognition;
        if !(6..=10).contains(&r.motion_history_size) {
            warn!(
                "motion_history_size {} outside 6..=10, clamping",
                r.motion_history_size
            );
            r.motion_history_size = r.motion_history_size.clamp(6, 10);
        }
        r.min_landmark_confidence = r.min_landmark_confidence.clamp(0.0, 1.0);
        r.finger_extension_threshold = r.finger_extension_threshold.clamp(0.0, 1.0);

        self.sensitivity.smoothing_factor = self.sensitivity.smoothing_factor.clamp(0.0, 1.0);

        let s = &mut self.stability;
        if !(3..=5).contains(&s.buffer_size) {
            warn!("stability buffer_size {} outside 3..=5, clamping", s.buffer_size);
            s.buffer_size = s.buffer_size.clamp(3, 5);
        }
        s.consensus_window = s.consensus_window.clamp(1, s.buffer_size);
        s.consensus_ratio = s.consensus_ratio.clamp(0.0, 1.0);
        s.minimum_gesture_interval = s.minimum_gesture_interval.max(0.0);

        let l = &mut self.learning;
        if l.min_threshold > l.max_threshold {
            warn!(
                "learning min_threshold {:.2} > max_threshold {:.2}, swapping",
                l.min_threshold, l.max_threshold
            );
            std::mem::swap(&mut l.min_threshold, &mut l.max_threshold);
        }
        l.base_threshold = l.base_threshold.clamp(l.min_threshold, l.max_threshold);
        l.pattern_window = l.pattern_window.max(1);
        l.accuracy_window = l.accuracy_window.max(1);
        l.max_training_samples = l.max_training_samples.max(l.pattern_window);

        for gesture in self.sensitivity.gestures.values_mut() {
            gesture.sensitivity = gesture.sensitivity.clamp(0.0, 1.0);
        }
    }
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            min_landmark_confidence: 0.3,
            pinch_distance_threshold: 0.05,
            pinch_min_confidence: 0.85,
            swipe_distance_threshold: 0.08,
            swipe_axis_dominance: 1.5,
            finger_extension_threshold: 0.6,
            motion_history_size: 10,
        }
    }
}

impl Default for SensitivityConfig {
    fn default() -> Self {
        Self {
            global_sensitivity: 1.0,
            detection_threshold: 0.7,
            smoothing_factor: 0.3,
            gesture_timeout: 0.5,
            confidence_multiplier: 1.2,
            gestures: default_gestures(),
        }
    }
}

impl SensitivityConfig {
    /// Raw confidence scaled by gesture and global sensitivity, clamped to [0,1].
    /// Disabled or unconfigured gestures score zero.
    pub fn adjusted_confidence(&self, label: GestureLabel, confidence: f32) -> f32 {
        let Some(gesture) = self.gestures.get(&label) else {
            return 0.0;
        };
        if !gesture.enabled {
            return 0.0;
        }

        let factor = gesture.sensitivity * self.global_sensitivity;
        (confidence * factor * self.confidence_multiplier).clamp(0.0, 1.0)
    }

    pub fn should_trigger(&self, label: GestureLabel, confidence: f32) -> bool {
        self.adjusted_confidence(label, confidence) >= self.detection_threshold
    }

    pub fn update_sensitivity(&mut self, label: GestureLabel, sensitivity: f32) {
        if let Some(gesture) = self.gestures.get_mut(&label) {
            gesture.sensitivity = sensitivity.clamp(0.0, 1.0);
        }
    }

    pub fn toggle_gesture(&mut self, label: GestureLabel) {
        if let Some(gesture) = self.gestures.get_mut(&label) {
            gesture.enabled = !gesture.enabled;
        }
    }

    pub fn action_for(&self, label: GestureLabel) -> Option<GestureAction> {
        self.gestures
            .get(&label)
            .filter(|g| g.enabled)
            .map(|g| g.action)
    }

    pub fn reset_to_defaults(&mut self) {
        *self = Self::default();
    }
}

fn gesture(name: &str, description: &str, sensitivity: f32, action: GestureAction) -> GestureConfiguration {
    GestureConfiguration {
        name: name.to_string(),
        description: description.to_string(),
        sensitivity,
        action,
        enabled: true,
    }
}

fn default_gestures() -> BTreeMap<GestureLabel, GestureConfiguration> {
    use GestureAction as A;
    use GestureLabel as G;

    BTreeMap::from([
        (G::Pointing, gesture("Pointing", "Move the cursor with the index finger", 0.9, A::MoveCursor)),
        (G::Pinch, gesture("Pinch", "Left click with thumb and index", 0.8, A::LeftClick)),
        (G::Fist, gesture("Fist", "Right click with a closed fist", 0.7, A::RightClick)),
        (G::Peace, gesture("Peace", "Double click with index and middle", 0.8, A::DoubleClick)),
        (G::ThumbsUp, gesture("Thumbs up", "Scroll up", 0.7, A::ScrollUp)),
        (G::ThumbsDown, gesture("Thumbs down", "Scroll down", 0.7, A::ScrollDown)),
        (G::OpenHand, gesture("Open hand", "Mission Control", 0.8, A::MissionControl)),
        (G::SwipeLeft, gesture("Swipe left", "Navigate back", 0.7, A::NavigateBack)),
        (G::SwipeRight, gesture("Swipe right", "Navigate forward", 0.7, A::NavigateForward)),
        (G::SwipeUp, gesture("Swipe up", "Scroll up", 0.7, A::ScrollUp)),
        (G::SwipeDown, gesture("Swipe down", "Scroll down", 0.7, A::ScrollDown)),
    ])
}

impl Default for StabilityConfig {
    fn default() -> Self {
        Self {
            buffer_size: 5,
            consensus_window: 3,
            consensus_ratio: 0.6,
            minimum_gesture_interval: 0.3,
        }
    }
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            cycle_interval_secs: 5.0,
            cycle_sample_trigger: 200,
            pattern_window: 50,
            accuracy_window: 100,
            max_training_samples: 1000,
            base_threshold: 0.7,
            min_threshold: 0.5,
            max_threshold: 0.95,
            adaptation_rate: 0.01,
            correct_confidence: 0.8,
        }
    }
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            samples_per_corner: 10,
            samples_per_gesture: 5,
            hand_position_samples: 30,
            screen_width: 1920.0,
            screen_height: 1080.0,
            transform_fit: TransformFit::AnchorCorners,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            dir: "state".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}
