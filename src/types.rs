// src/types.rs

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// CONFIGURATION
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub recognition: RecognitionConfig,
    pub sensitivity: SensitivityConfig,
    pub stability: StabilityConfig,
    pub learning: LearningConfig,
    pub calibration: CalibrationConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognitionConfig {
    /// Joints below this confidence count as absent
    pub min_landmark_confidence: f32,
    pub pinch_distance_threshold: f32,
    pub pinch_min_confidence: f32,
    pub swipe_distance_threshold: f32,
    pub swipe_axis_dominance: f32,
    pub finger_extension_threshold: f32,
    pub motion_history_size: usize,
}

/// Per-gesture knobs plus the global sensitivity surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SensitivityConfig {
    pub global_sensitivity: f32,
    pub detection_threshold: f32,
    pub smoothing_factor: f32,
    /// Seconds without a frame before motion history is considered stale
    pub gesture_timeout: f64,
    pub confidence_multiplier: f32,
    pub gestures: BTreeMap<GestureLabel, GestureConfiguration>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GestureConfiguration {
    pub name: String,
    pub description: String,
    pub sensitivity: f32,
    pub action: GestureAction,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StabilityConfig {
    pub buffer_size: usize,
    pub consensus_window: usize,
    pub consensus_ratio: f32,
    pub minimum_gesture_interval: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LearningConfig {
    pub cycle_interval_secs: f64,
    /// Run a cycle early once this many samples arrived since the last one
    pub cycle_sample_trigger: usize,
    pub pattern_window: usize,
    pub accuracy_window: usize,
    pub max_training_samples: usize,
    pub base_threshold: f32,
    pub min_threshold: f32,
    pub max_threshold: f32,
    pub adaptation_rate: f32,
    /// Raw confidence above which an unconfirmed sample is judged correct
    pub correct_confidence: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    pub samples_per_corner: usize,
    pub samples_per_gesture: usize,
    pub hand_position_samples: usize,
    pub screen_width: f32,
    pub screen_height: f32,
    pub transform_fit: TransformFit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformFit {
    /// Per-axis least squares over every collected corner pair
    LeastSquares,
    /// Scale from the top-left anchor to its horizontal and vertical neighbours
    AnchorCorners,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

// ============================================================================
// GEOMETRY PRIMITIVES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point2 {
    pub x: f32,
    pub y: f32,
}

impl Point2 {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// One tracked joint in normalized image-plane coordinates (y grows downward).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    pub confidence: f32,
}

impl Landmark {
    pub const fn new(x: f32, y: f32, confidence: f32) -> Self {
        Self { x, y, confidence }
    }

    pub fn position(&self) -> Point2 {
        Point2::new(self.x, self.y)
    }
}

// ============================================================================
// GESTURES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GestureLabel {
    Pointing,
    Peace,
    Pinch,
    Fist,
    OpenHand,
    ThumbsUp,
    ThumbsDown,
    SwipeLeft,
    SwipeRight,
    SwipeUp,
    SwipeDown,
    Unknown,
}

struct LabelInfo {
    key: &'static str,
    display_name: &'static str,
    icon: &'static str,
}

const LABEL_TABLE: [LabelInfo; 12] = [
    LabelInfo { key: "pointing", display_name: "Pointing", icon: "👆" },
    LabelInfo { key: "peace", display_name: "Peace", icon: "✌️" },
    LabelInfo { key: "pinch", display_name: "Pinch", icon: "🤏" },
    LabelInfo { key: "fist", display_name: "Fist", icon: "✊" },
    LabelInfo { key: "open_hand", display_name: "Open hand", icon: "🖐" },
    LabelInfo { key: "thumbs_up", display_name: "Thumbs up", icon: "👍" },
    LabelInfo { key: "thumbs_down", display_name: "Thumbs down", icon: "👎" },
    LabelInfo { key: "swipe_left", display_name: "Swipe left", icon: "👈" },
    LabelInfo { key: "swipe_right", display_name: "Swipe right", icon: "👉" },
    LabelInfo { key: "swipe_up", display_name: "Swipe up", icon: "⬆️" },
    LabelInfo { key: "swipe_down", display_name: "Swipe down", icon: "⬇️" },
    LabelInfo { key: "unknown", display_name: "Unknown", icon: "❔" },
];

impl GestureLabel {
    /// Every label that can carry a threshold or a learned pattern.
    pub const RECOGNIZED: [GestureLabel; 11] = [
        Self::Pointing,
        Self::Peace,
        Self::Pinch,
        Self::Fist,
        Self::OpenHand,
        Self::ThumbsUp,
        Self::ThumbsDown,
        Self::SwipeLeft,
        Self::SwipeRight,
        Self::SwipeUp,
        Self::SwipeDown,
    ];

    fn info(&self) -> &'static LabelInfo {
        &LABEL_TABLE[*self as usize]
    }

    pub fn as_str(&self) -> &'static str {
        self.info().key
    }

    pub fn display_name(&self) -> &'static str {
        self.info().display_name
    }

    pub fn icon(&self) -> &'static str {
        self.info().icon
    }

    pub fn is_swipe(&self) -> bool {
        matches!(
            self,
            Self::SwipeLeft | Self::SwipeRight | Self::SwipeUp | Self::SwipeDown
        )
    }

    pub fn is_known(&self) -> bool {
        *self != Self::Unknown
    }
}

impl std::fmt::Display for GestureLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Action the dispatch collaborator performs for a gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GestureAction {
    LeftClick,
    RightClick,
    DoubleClick,
    ScrollUp,
    ScrollDown,
    MoveCursor,
    DragAndDrop,
    Zoom,
    MissionControl,
    ShowDesktop,
    NavigateBack,
    NavigateForward,
    Custom,
    None,
}

impl GestureAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LeftClick => "LEFT_CLICK",
            Self::RightClick => "RIGHT_CLICK",
            Self::DoubleClick => "DOUBLE_CLICK",
            Self::ScrollUp => "SCROLL_UP",
            Self::ScrollDown => "SCROLL_DOWN",
            Self::MoveCursor => "MOVE_CURSOR",
            Self::DragAndDrop => "DRAG_AND_DROP",
            Self::Zoom => "ZOOM",
            Self::MissionControl => "MISSION_CONTROL",
            Self::ShowDesktop => "SHOW_DESKTOP",
            Self::NavigateBack => "NAVIGATE_BACK",
            Self::NavigateForward => "NAVIGATE_FORWARD",
            Self::Custom => "CUSTOM",
            Self::None => "NONE",
        }
    }
}

// ============================================================================
// DETECTIONS
// ============================================================================

/// Single-frame classification result before stabilization.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawDetection {
    pub label: GestureLabel,
    pub confidence: f32,
    pub position: Point2,
    /// Seconds on the frame source clock
    pub timestamp: f64,
}

/// Debounced, consensus-filtered gesture handed to the action dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StabilizedEvent {
    pub label: GestureLabel,
    pub confidence: f32,
    pub position: Point2,
    pub timestamp: f64,
}
