// src/calibration/wizard.rs
//
// User-paced calibration session. Steps only move one at a time; the
// corner steps advance on their own once enough pointing samples arrived.
// Everything collected lives in a draft that is committed only when the
// wizard reaches `Completed`.

use super::data::CalibrationData;
use super::transform::{self, CornerMapping};
use crate::detection::landmarks::INDEX_TIP;
use crate::detection::HandLandmarks;
use crate::storage::{self, BlobStore, CALIBRATION_KEY};
use crate::types::{CalibrationConfig, GestureLabel, Point2};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Gestures whose thresholds the gesture-test step measures.
pub const REFERENCE_GESTURES: [GestureLabel; 3] =
    [GestureLabel::Fist, GestureLabel::Peace, GestureLabel::ThumbsUp];

/// Calibrated threshold = max(margin × weakest sample, floor).
const THRESHOLD_MARGIN: f32 = 0.9;
const THRESHOLD_FLOOR: f32 = 0.6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalibrationStep {
    Introduction,
    HandPosition,
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
    Center,
    GestureTest,
    Completed,
}

struct StepInfo {
    title: &'static str,
    instructions: &'static str,
}

const STEP_TABLE: [StepInfo; 9] = [
    StepInfo {
        title: "Introduction",
        instructions: "This calibration tunes detection to your setup. It takes about two minutes.",
    },
    StepInfo {
        title: "Hand position",
        instructions: "Hold an open hand in the middle of the camera view, about 50 cm away.",
    },
    StepInfo {
        title: "Top-left corner",
        instructions: "Point your index finger at the TOP-LEFT corner of the screen and hold.",
    },
    StepInfo {
        title: "Top-right corner",
        instructions: "Point your index finger at the TOP-RIGHT corner of the screen and hold.",
    },
    StepInfo {
        title: "Bottom-left corner",
        instructions: "Point your index finger at the BOTTOM-LEFT corner of the screen and hold.",
    },
    StepInfo {
        title: "Bottom-right corner",
        instructions: "Point your index finger at the BOTTOM-RIGHT corner of the screen and hold.",
    },
    StepInfo {
        title: "Screen center",
        instructions: "Point your index finger at the CENTER of the screen and hold.",
    },
    StepInfo {
        title: "Gesture test",
        instructions: "Make a fist ✊, a peace sign ✌️ and a thumbs up 👍, holding each for two seconds.",
    },
    StepInfo {
        title: "Calibration complete",
        instructions: "Calibration finished. Settings are tuned for your setup.",
    },
];

impl CalibrationStep {
    pub const ALL: [CalibrationStep; 9] = [
        Self::Introduction,
        Self::HandPosition,
        Self::TopLeft,
        Self::TopRight,
        Self::BottomLeft,
        Self::BottomRight,
        Self::Center,
        Self::GestureTest,
        Self::Completed,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn next(self) -> Option<Self> {
        Self::ALL.get(self.index() + 1).copied()
    }

    pub fn previous(self) -> Option<Self> {
        self.index().checked_sub(1).and_then(|i| Self::ALL.get(i).copied())
    }

    pub fn title(self) -> &'static str {
        STEP_TABLE[self.index()].title
    }

    pub fn instructions(self) -> &'static str {
        STEP_TABLE[self.index()].instructions
    }

    /// Fraction of the wizard behind this step; the introduction is 0.
    pub fn progress(self) -> f64 {
        self.index() as f64 / (Self::ALL.len() - 1) as f64
    }

    fn is_pointing_step(self) -> bool {
        matches!(
            self,
            Self::TopLeft | Self::TopRight | Self::BottomLeft | Self::BottomRight | Self::Center
        )
    }
}

/// What the UI hands over for every classified frame during calibration.
#[derive(Debug, Clone, Copy)]
pub struct ObservedGesture {
    pub label: GestureLabel,
    pub confidence: f32,
    pub hand: HandLandmarks,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleOutcome {
    /// Not calibrating, or the gesture is not what this step collects
    Ignored,
    Collected { collected: usize, required: usize },
    Advanced(CalibrationStep),
    Completed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CalibrationEvent {
    StepChanged { step: CalibrationStep, progress: f64 },
    Completed(CalibrationData),
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalibrationStatus {
    pub is_calibrating: bool,
    pub current_step: CalibrationStep,
    pub progress: f64,
    pub status_message: String,
    pub samples_collected: usize,
}

type Listener = Box<dyn Fn(&CalibrationEvent) + Send>;

pub struct CalibrationEngine {
    config: CalibrationConfig,
    is_calibrating: bool,
    step: CalibrationStep,
    status_message: String,
    samples_collected: usize,

    draft: CalibrationData,
    committed: CalibrationData,

    point_samples: BTreeMap<CalibrationStep, Vec<Point2>>,
    hand_sums: Vec<(f64, f64)>,
    hand_count: usize,
    gesture_samples: BTreeMap<GestureLabel, Vec<f32>>,

    listeners: Vec<Listener>,
    store: Option<Arc<dyn BlobStore>>,
}

impl CalibrationEngine {
    pub fn new(config: CalibrationConfig) -> Self {
        Self {
            config,
            is_calibrating: false,
            step: CalibrationStep::Introduction,
            status_message: String::new(),
            samples_collected: 0,
            draft: CalibrationData::default(),
            committed: CalibrationData::default(),
            point_samples: BTreeMap::new(),
            hand_sums: Vec::new(),
            hand_count: 0,
            gesture_samples: BTreeMap::new(),
            listeners: Vec::new(),
            store: None,
        }
    }

    /// Persist completed sessions to `store` and start from what it holds.
    pub fn with_store(config: CalibrationConfig, store: Arc<dyn BlobStore>) -> Self {
        let mut engine = Self::new(config);
        engine.committed = storage::load_json_or_default(store.as_ref(), CALIBRATION_KEY);
        if engine.committed.is_calibrated {
            info!("📐 Loaded calibration from {:?}", engine.committed.calibration_date);
        }
        engine.store = Some(store);
        engine
    }

    pub fn subscribe<F>(&mut self, listener: F)
    where
        F: Fn(&CalibrationEvent) + Send + 'static,
    {
        self.listeners.push(Box::new(listener));
    }

    fn emit(&self, event: CalibrationEvent) {
        for listener in &self.listeners {
            listener(&event);
        }
    }

    // ========================================================================
    // WIZARD CONTROLS
    // ========================================================================

    /// Begin a fresh session, discarding anything in progress.
    pub fn start_calibration(&mut self) {
        self.clear_draft();
        self.is_calibrating = true;
        self.enter(CalibrationStep::Introduction);
        self.status_message = "Preparing calibration...".to_string();
        info!("📐 Calibration started");
    }

    pub fn next_step(&mut self) {
        if !self.is_calibrating {
            return;
        }
        if let Some(next) = self.step.next() {
            self.enter(next);
            if next == CalibrationStep::Completed {
                self.complete();
            }
        }
    }

    pub fn previous_step(&mut self) {
        if !self.is_calibrating || self.step == CalibrationStep::Completed {
            return;
        }
        if let Some(prev) = self.step.previous() {
            self.enter(prev);
        }
    }

    /// Abandon the session; nothing collected so far is kept.
    pub fn cancel_calibration(&mut self) {
        if !self.is_calibrating {
            return;
        }
        self.clear_draft();
        self.is_calibrating = false;
        self.step = CalibrationStep::Introduction;
        self.samples_collected = 0;
        self.status_message = "Calibration cancelled".to_string();
        info!("📐 Calibration cancelled");
        self.emit(CalibrationEvent::Cancelled);
    }

    fn enter(&mut self, step: CalibrationStep) {
        self.step = step;
        self.samples_collected = 0;
        self.status_message = step.instructions().to_string();

        // Re-entering a step collects from scratch
        self.point_samples.remove(&step);
        match step {
            CalibrationStep::HandPosition => {
                self.hand_sums.clear();
                self.hand_count = 0;
            }
            CalibrationStep::GestureTest => self.gesture_samples.clear(),
            _ => {}
        }

        debug!("📐 Step {} ({:.0}%)", step.title(), step.progress() * 100.0);
        self.emit(CalibrationEvent::StepChanged {
            step,
            progress: step.progress(),
        });
    }

    fn clear_draft(&mut self) {
        self.draft = CalibrationData::default();
        self.point_samples.clear();
        self.hand_sums.clear();
        self.hand_count = 0;
        self.gesture_samples.clear();
    }

    // ========================================================================
    // SAMPLE COLLECTION
    // ========================================================================

    pub fn process_sample(&mut self, sample: &ObservedGesture) -> SampleOutcome {
        if !self.is_calibrating {
            return SampleOutcome::Ignored;
        }

        match self.step {
            CalibrationStep::HandPosition => self.collect_hand_position(sample),
            step if step.is_pointing_step() => self.collect_pointing(step, sample),
            CalibrationStep::GestureTest => self.collect_gesture(sample),
            _ => SampleOutcome::Ignored,
        }
    }

    fn collect_hand_position(&mut self, sample: &ObservedGesture) -> SampleOutcome {
        if sample.label != GestureLabel::OpenHand {
            return SampleOutcome::Ignored;
        }

        if self.hand_sums.len() != sample.hand.points.len() {
            self.hand_sums = vec![(0.0, 0.0); sample.hand.points.len()];
        }
        for (sum, lm) in self.hand_sums.iter_mut().zip(sample.hand.points.iter()) {
            sum.0 += lm.x as f64;
            sum.1 += lm.y as f64;
        }
        self.hand_count += 1;
        self.samples_collected = self.hand_count;

        let required = self.config.hand_position_samples.max(1);
        if self.hand_count < required {
            return self.collected(required);
        }

        let n = self.hand_count as f64;
        self.draft.reference_hand_position = self
            .hand_sums
            .iter()
            .map(|(x, y)| Point2::new((x / n) as f32, (y / n) as f32))
            .collect();
        self.advance()
    }

    fn collect_pointing(&mut self, step: CalibrationStep, sample: &ObservedGesture) -> SampleOutcome {
        if sample.label != GestureLabel::Pointing {
            return SampleOutcome::Ignored;
        }

        let samples = self.point_samples.entry(step).or_default();
        samples.push(sample.hand.position(INDEX_TIP));
        self.samples_collected = samples.len();

        let required = self.config.samples_per_corner.max(1);
        if self.samples_collected < required {
            return self.collected(required);
        }

        let camera = average_point(samples);
        self.set_mapping(step, camera);
        self.advance()
    }

    fn collect_gesture(&mut self, sample: &ObservedGesture) -> SampleOutcome {
        if !REFERENCE_GESTURES.contains(&sample.label) {
            return SampleOutcome::Ignored;
        }

        let required = self.config.samples_per_gesture.max(1);
        let samples = self.gesture_samples.entry(sample.label).or_default();
        if samples.len() >= required {
            return SampleOutcome::Ignored;
        }
        samples.push(sample.confidence);

        self.samples_collected = self.gesture_samples.values().map(Vec::len).sum();
        let total_required = required * REFERENCE_GESTURES.len();
        if self.samples_collected < total_required {
            return self.collected(total_required);
        }

        for (label, confidences) in &self.gesture_samples {
            let weakest = confidences.iter().copied().fold(f32::INFINITY, f32::min);
            let threshold = (weakest * THRESHOLD_MARGIN).max(THRESHOLD_FLOOR);
            self.draft.gesture_thresholds.insert(*label, threshold);
            debug!("📐 {} threshold {:.3}", label, threshold);
        }
        self.advance()
    }

    fn collected(&mut self, required: usize) -> SampleOutcome {
        self.status_message = format!("Samples collected: {}/{}", self.samples_collected, required);
        SampleOutcome::Collected {
            collected: self.samples_collected,
            required,
        }
    }

    fn advance(&mut self) -> SampleOutcome {
        self.next_step();
        if self.step == CalibrationStep::Completed {
            SampleOutcome::Completed
        } else {
            SampleOutcome::Advanced(self.step)
        }
    }

    fn set_mapping(&mut self, step: CalibrationStep, camera: Point2) {
        let (w, h) = (self.config.screen_width, self.config.screen_height);
        let (slot, screen) = match step {
            CalibrationStep::TopLeft => (&mut self.draft.top_left_mapping, Point2::new(0.0, 0.0)),
            CalibrationStep::TopRight => (&mut self.draft.top_right_mapping, Point2::new(w, 0.0)),
            CalibrationStep::BottomLeft => (&mut self.draft.bottom_left_mapping, Point2::new(0.0, h)),
            CalibrationStep::BottomRight => (&mut self.draft.bottom_right_mapping, Point2::new(w, h)),
            CalibrationStep::Center => (&mut self.draft.center_mapping, Point2::new(w / 2.0, h / 2.0)),
            _ => return,
        };
        *slot = Some(CornerMapping { camera, screen });
        info!(
            "📐 {} mapped: camera ({:.3}, {:.3}) → screen ({:.0}, {:.0})",
            step.title(),
            camera.x,
            camera.y,
            screen.x,
            screen.y
        );

        self.recompute_transform();
    }

    fn recompute_transform(&mut self) {
        let Some(corners) = self.draft.corners() else {
            return;
        };
        self.draft.screen_mapping = transform::solve(self.config.transform_fit, &corners);
        self.draft.scaling_factor = transform::scaling_factor(&corners);
        self.draft.translation_offset = transform::translation_offset(&corners);
    }

    fn complete(&mut self) {
        self.draft.is_calibrated = true;
        self.draft.calibration_date = Some(Utc::now());
        self.committed = self.draft.clone();
        self.is_calibrating = false;
        self.status_message = "Calibration completed successfully".to_string();

        if let Some(store) = &self.store {
            if let Err(e) = storage::save_json(store.as_ref(), CALIBRATION_KEY, &self.committed) {
                warn!("⚠️  Failed to persist calibration: {:#}", e);
            }
        }

        info!(
            "✅ Calibration complete: {} corners, {} gesture thresholds",
            self.committed.mapped_corner_count(),
            self.committed.gesture_thresholds.len()
        );
        self.emit(CalibrationEvent::Completed(self.committed.clone()));
    }

    // ========================================================================
    // OBSERVABLES
    // ========================================================================

    pub fn status(&self) -> CalibrationStatus {
        CalibrationStatus {
            is_calibrating: self.is_calibrating,
            current_step: self.step,
            progress: self.progress(),
            status_message: self.status_message.clone(),
            samples_collected: self.samples_collected,
        }
    }

    pub fn current_step(&self) -> CalibrationStep {
        self.step
    }

    pub fn progress(&self) -> f64 {
        self.step.progress()
    }

    pub fn is_calibrating(&self) -> bool {
        self.is_calibrating
    }

    /// In-progress values of the running session.
    pub fn draft(&self) -> &CalibrationData {
        &self.draft
    }

    /// Last completed calibration.
    pub fn calibration_data(&self) -> &CalibrationData {
        &self.committed
    }
}

fn average_point(points: &[Point2]) -> Point2 {
    if points.is_empty() {
        return Point2::default();
    }
    let n = points.len() as f64;
    let (sx, sy) = points
        .iter()
        .fold((0.0f64, 0.0f64), |(sx, sy), p| (sx + p.x as f64, sy + p.y as f64));
    Point2::new((sx / n) as f32, (sy / n) as f32)
}
