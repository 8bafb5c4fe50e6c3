// src/calibration/data.rs

use super::transform::{AffineTransform, CornerMapping, CornerSet};
use crate::types::{GestureLabel, Point2};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const DEFAULT_SMOOTHING_FACTOR: f64 = 0.3;
pub const DEFAULT_MOVEMENT_SENSITIVITY: f64 = 1.0;
/// Pixels
pub const DEFAULT_DEAD_ZONE_RADIUS: f64 = 5.0;

/// The durable outcome of a calibration session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationData {
    pub is_calibrated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calibration_date: Option<DateTime<Utc>>,

    /// Averaged joint positions of the open hand at rest
    pub reference_hand_position: Vec<Point2>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_left_mapping: Option<CornerMapping>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_right_mapping: Option<CornerMapping>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bottom_left_mapping: Option<CornerMapping>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bottom_right_mapping: Option<CornerMapping>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub center_mapping: Option<CornerMapping>,

    pub screen_mapping: AffineTransform,
    pub scaling_factor: Point2,
    pub translation_offset: Point2,

    pub gesture_thresholds: BTreeMap<GestureLabel, f32>,

    pub smoothing_factor: f64,
    pub movement_sensitivity: f64,
    pub dead_zone_radius: f64,
}

impl Default for CalibrationData {
    fn default() -> Self {
        Self {
            is_calibrated: false,
            calibration_date: None,
            reference_hand_position: Vec::new(),
            top_left_mapping: None,
            top_right_mapping: None,
            bottom_left_mapping: None,
            bottom_right_mapping: None,
            center_mapping: None,
            screen_mapping: AffineTransform::IDENTITY,
            scaling_factor: Point2::new(1.0, 1.0),
            translation_offset: Point2::default(),
            gesture_thresholds: BTreeMap::new(),
            smoothing_factor: DEFAULT_SMOOTHING_FACTOR,
            movement_sensitivity: DEFAULT_MOVEMENT_SENSITIVITY,
            dead_zone_radius: DEFAULT_DEAD_ZONE_RADIUS,
        }
    }
}

impl CalibrationData {
    /// All four corners, once they have been collected.
    pub fn corners(&self) -> Option<CornerSet> {
        Some(CornerSet {
            top_left: self.top_left_mapping?,
            top_right: self.top_right_mapping?,
            bottom_left: self.bottom_left_mapping?,
            bottom_right: self.bottom_right_mapping?,
            center: self.center_mapping,
        })
    }

    pub fn mapped_corner_count(&self) -> usize {
        [
            self.top_left_mapping,
            self.top_right_mapping,
            self.bottom_left_mapping,
            self.bottom_right_mapping,
            self.center_mapping,
        ]
        .iter()
        .filter(|m| m.is_some())
        .count()
    }
}
