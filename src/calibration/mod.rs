// src/calibration/mod.rs

pub mod cursor;
pub mod data;
pub mod transform;
pub mod wizard;

pub use cursor::CursorMapper;
pub use data::CalibrationData;
pub use transform::{AffineTransform, CornerMapping, CornerSet};
pub use wizard::{
    CalibrationEngine, CalibrationEvent, CalibrationStatus, CalibrationStep, ObservedGesture,
    SampleOutcome,
};
