// src/adaptive/mod.rs

pub mod engine;
pub mod patterns;
pub mod snapshot;
pub mod thresholds;

pub use engine::{
    LearningCounters, LearningCycleReport, LearningEngine, LearningFeedback, LearningStatistics,
};
pub use patterns::{calculate_pattern_match, GesturePattern, GesturePatternLearner, TrainingSample};
pub use snapshot::{LearnedSnapshot, Rescored, SnapshotCell};
pub use thresholds::{AdaptiveThreshold, AdaptiveThresholdStore, ThresholdMove};
