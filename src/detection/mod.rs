// src/detection/mod.rs

mod classifier;
pub mod landmarks;
mod motion;
mod stability;

#[cfg(test)]
pub(crate) mod test_poses;

// Re-export public APIs
pub use classifier::{Classification, ClassifierParams, GestureClassifier};
pub use landmarks::{Finger, HandFrame, HandLandmarks, JointObservation};
pub use motion::{MotionHistory, SwipeParams, SWIPE_WINDOW};
pub use stability::{ConfidenceGate, FixedThreshold, StabilityFilter, StabilityOutcome};
