// src/lib.rs
//
// Hand-landmark gesture recognition: per-frame classification, temporal
// stabilization, adaptive thresholds learned from usage, and a calibration
// wizard mapping camera space to the screen.

pub mod adaptive;
pub mod calibration;
pub mod config;
pub mod detection;
pub mod geometry;
pub mod pipeline;
pub mod storage;
pub mod types;

pub use adaptive::{LearningEngine, LearningFeedback, SnapshotCell};
pub use calibration::{CalibrationData, CalibrationEngine, CursorMapper};
pub use detection::{GestureClassifier, HandFrame, StabilityFilter};
pub use pipeline::{GesturePipeline, PipelineEvent};
pub use types::{Config, GestureLabel, StabilizedEvent};
