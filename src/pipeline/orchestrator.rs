// src/pipeline/orchestrator.rs
//
// Per-frame data flow: motion → classify → adaptive rescore → training
// sample → stabilize → publish. Runs on the caller's thread; the only
// shared state it touches is the learned snapshot (one Arc clone per
// frame) and the feedback channel to the learning engine.

use super::event_bus::{EventBus, PipelineEvent};
use super::frame_context::FrameContext;
use super::metrics::PipelineMetrics;
use crate::adaptive::{LearningCycleReport, LearningFeedback, SnapshotCell, TrainingSample};
use crate::calibration::{CalibrationEvent, CursorMapper};
use crate::detection::landmarks::INDEX_TIP;
use crate::detection::{
    GestureClassifier, HandFrame, MotionHistory, StabilityFilter, StabilityOutcome,
};
use crate::types::{Config, GestureLabel, Point2, RawDetection, SensitivityConfig};
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

const EVENT_QUEUE_CAPACITY: usize = 256;

pub struct GesturePipeline {
    classifier: GestureClassifier,
    motion: MotionHistory,
    stability: StabilityFilter,
    sensitivity: SensitivityConfig,
    min_landmark_confidence: f32,

    snapshots: SnapshotCell,
    feedback: Option<mpsc::UnboundedSender<LearningFeedback>>,
    cursor: Option<CursorMapper>,

    event_bus: EventBus,
    metrics: PipelineMetrics,

    last_frame_time: Option<f64>,
    frame_count: u64,
}

impl GesturePipeline {
    pub fn new(config: &Config, snapshots: SnapshotCell) -> Self {
        Self {
            classifier: GestureClassifier::from_config(&config.recognition),
            motion: MotionHistory::new(config.recognition.motion_history_size),
            stability: StabilityFilter::new(&config.stability),
            sensitivity: config.sensitivity.clone(),
            min_landmark_confidence: config.recognition.min_landmark_confidence,
            snapshots,
            feedback: None,
            cursor: None,
            event_bus: EventBus::new(EVENT_QUEUE_CAPACITY),
            metrics: PipelineMetrics::new(),
            last_frame_time: None,
            frame_count: 0,
        }
    }

    /// Forward training samples to a learning engine.
    pub fn with_feedback(mut self, tx: mpsc::UnboundedSender<LearningFeedback>) -> Self {
        self.feedback = Some(tx);
        self
    }

    /// Map pointing positions to screen coordinates.
    pub fn with_cursor(mut self, cursor: CursorMapper) -> Self {
        self.cursor = Some(cursor);
        self
    }

    pub fn process_frame(&mut self, frame: &HandFrame) -> FrameContext {
        self.frame_count += 1;
        self.metrics.inc(&self.metrics.total_frames);

        let motion_reset = self.expire_stale_motion(frame.timestamp);

        let hand = frame.complete(self.min_landmark_confidence);
        if let Some(hand) = &hand {
            self.metrics.inc(&self.metrics.frames_with_hand);
            self.motion.push(hand.position(INDEX_TIP));
        }

        let started = Instant::now();
        let classification = self.classifier.classify(frame, &self.motion);
        self.metrics
            .set_timing(&self.metrics.classify_time_us, started.elapsed().as_micros() as u64);

        let snapshot = self.snapshots.load();
        let rescored = snapshot.rescore(classification, hand.as_ref());

        if rescored.label.is_known() {
            self.metrics.inc(&self.metrics.raw_recognitions);
        }

        if rescored.learnable && rescored.label.is_known() {
            if let Some(hand) = &hand {
                self.send_feedback(LearningFeedback::Sample(TrainingSample::new(
                    rescored.label,
                    hand,
                    rescored.raw_confidence,
                )));
            }
        }

        let position = hand
            .as_ref()
            .map(|h| h.position(INDEX_TIP))
            .or_else(|| frame.joint(INDEX_TIP, 0.0).map(|lm| lm.position()))
            .unwrap_or_default();

        let screen_position = match (&mut self.cursor, rescored.label) {
            (Some(cursor), GestureLabel::Pointing) => cursor.update(position).or(cursor.position()),
            _ => None,
        };

        let detection = RawDetection {
            label: rescored.label,
            confidence: rescored.confidence,
            position,
            timestamp: frame.timestamp,
        };
        let outcome = self.stability.process(detection, &self.sensitivity);

        match &outcome {
            StabilityOutcome::Emitted(event) => {
                self.metrics.inc(&self.metrics.stabilized_events);
                info!(
                    "{} {} ({:.0}%) at t={:.3}s",
                    event.label.icon(),
                    event.label,
                    event.confidence * 100.0,
                    event.timestamp
                );
                self.event_bus.publish(PipelineEvent::GestureDetected {
                    event: *event,
                    action: self.sensitivity.action_for(event.label),
                    screen_position,
                });
            }
            StabilityOutcome::Debounced => self.metrics.inc(&self.metrics.debounced_frames),
            _ => {}
        }

        FrameContext {
            frame_id: self.frame_count,
            timestamp: frame.timestamp,
            hand_present: hand.is_some(),
            motion_reset,
            classification,
            rescored,
            outcome,
            screen_position,
        }
    }

    /// A gap longer than the gesture timeout (or time running backwards)
    /// makes the stored trajectory meaningless.
    fn expire_stale_motion(&mut self, timestamp: f64) -> bool {
        let stale = match self.last_frame_time {
            Some(last) => {
                let gap = timestamp - last;
                gap > self.sensitivity.gesture_timeout || gap < 0.0
            }
            None => false,
        };
        self.last_frame_time = Some(timestamp);

        if stale && !self.motion.is_empty() {
            debug!("motion history expired at t={:.3}s", timestamp);
            self.motion.clear();
            return true;
        }
        false
    }

    fn send_feedback(&mut self, feedback: LearningFeedback) {
        let Some(tx) = &self.feedback else {
            return;
        };
        if tx.send(feedback).is_err() {
            warn!("⚠️  Learning engine gone, no longer sending training samples");
            self.feedback = None;
            return;
        }
        self.metrics.inc(&self.metrics.training_samples_sent);
    }

    // ========================================================================
    // FEEDBACK + EXTERNAL EVENTS
    // ========================================================================

    pub fn confirm_gesture(&mut self, label: GestureLabel) {
        self.send_feedback(LearningFeedback::Confirm(label));
    }

    pub fn report_incorrect(&mut self, detected: GestureLabel, actual: GestureLabel) {
        self.send_feedback(LearningFeedback::Incorrect { detected, actual });
    }

    pub fn record_learning_cycle(&mut self, report: LearningCycleReport) {
        self.metrics.inc(&self.metrics.learning_cycles);
        self.event_bus
            .publish(PipelineEvent::LearningCycleCompleted(report));
    }

    pub fn record_calibration_event(&mut self, event: &CalibrationEvent) {
        if let Some(event) = PipelineEvent::from_calibration(event) {
            self.event_bus.publish(event);
        }
    }

    // ========================================================================
    // ACCESSORS
    // ========================================================================

    pub fn event_bus(&mut self) -> &mut EventBus {
        &mut self.event_bus
    }

    pub fn metrics(&self) -> &PipelineMetrics {
        &self.metrics
    }

    pub fn sensitivity(&self) -> &SensitivityConfig {
        &self.sensitivity
    }

    pub fn sensitivity_mut(&mut self) -> &mut SensitivityConfig {
        &mut self.sensitivity
    }

    pub fn cursor_position(&self) -> Option<Point2> {
        self.cursor.as_ref().and_then(|c| c.position())
    }

    /// Forget motion, buffered detections and the debounce clock.
    pub fn reset(&mut self) {
        self.motion.clear();
        self.stability.reset();
        self.last_frame_time = None;
        if let Some(cursor) = &mut self.cursor {
            cursor.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adaptive::LearningEngine;
    use crate::calibration::CalibrationData;
    use crate::detection::test_poses::PoseBuilder;
    use crate::types::{GestureAction, LearningConfig};

    const DT: f64 = 1.0 / 30.0;

    fn learning_cell() -> SnapshotCell {
        let cell = SnapshotCell::default();
        // Publishes default thresholds into the cell
        let _engine = LearningEngine::new(LearningConfig::default(), cell.clone());
        cell
    }

    #[test]
    fn test_steady_pinch_emits_once_then_debounces() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut pipeline = GesturePipeline::new(&Config::default(), learning_cell()).with_feedback(tx);
        let pose = PoseBuilder::pinch();

        let outcomes: Vec<FrameContext> = (0..6)
            .map(|i| pipeline.process_frame(&pose.frame(i as f64 * DT)))
            .collect();

        assert_eq!(outcomes[0].outcome, StabilityOutcome::Collecting);
        assert_eq!(outcomes[1].outcome, StabilityOutcome::Collecting);
        let event = outcomes[2].event().expect("third frame reaches consensus");
        assert_eq!(event.label, GestureLabel::Pinch);
        for ctx in &outcomes[3..] {
            assert_eq!(ctx.outcome, StabilityOutcome::Debounced);
        }

        let events = pipeline.event_bus().drain();
        assert_eq!(events.len(), 1);
        match &events[0] {
            PipelineEvent::GestureDetected { event, action, .. } => {
                assert_eq!(event.label, GestureLabel::Pinch);
                assert_eq!(*action, Some(GestureAction::LeftClick));
            }
            other => panic!("unexpected event {:?}", other),
        }

        let mut samples = 0;
        while let Ok(msg) = rx.try_recv() {
            match msg {
                LearningFeedback::Sample(s) => {
                    assert_eq!(s.label, GestureLabel::Pinch);
                    samples += 1;
                }
                other => panic!("unexpected feedback {:?}", other),
            }
        }
        assert_eq!(samples, 6);

        let summary = pipeline.metrics().summary();
        assert_eq!(summary.total_frames, 6);
        assert_eq!(summary.stabilized_events, 1);
        assert_eq!(summary.debounced_frames, 3);
    }

    #[test]
    fn test_missing_hand_is_unknown_and_not_learned() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut pipeline = GesturePipeline::new(&Config::default(), learning_cell()).with_feedback(tx);

        for i in 0..5 {
            let ctx = pipeline.process_frame(&HandFrame::new(i as f64 * DT, 0.0));
            assert!(!ctx.hand_present);
            assert_eq!(ctx.frame_label(), GestureLabel::Unknown);
            assert!(ctx.event().is_none());
        }
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_horizontal_motion_becomes_swipe() {
        let mut pipeline = GesturePipeline::new(&Config::default(), SnapshotCell::default());
        let mut labels = Vec::new();
        for i in 0..6 {
            let mut pose = PoseBuilder::pointing();
            pose.index_tip_at(Point2::new(0.3 + 0.04 * i as f32, 0.35));
            labels.push(pipeline.process_frame(&pose.frame(i as f64 * DT)).frame_label());
        }
        assert_eq!(labels[4], GestureLabel::Pointing);
        assert_eq!(labels[5], GestureLabel::SwipeRight);
    }

    #[test]
    fn test_gap_clears_motion_history() {
        let mut pipeline = GesturePipeline::new(&Config::default(), SnapshotCell::default());
        let mut t = 0.0;
        for i in 0..5 {
            let mut pose = PoseBuilder::pointing();
            pose.index_tip_at(Point2::new(0.3 + 0.04 * i as f32, 0.35));
            pipeline.process_frame(&pose.frame(t));
            t += DT;
        }

        // Sixth sample arrives after the timeout: no swipe can form
        let mut pose = PoseBuilder::pointing();
        pose.index_tip_at(Point2::new(0.5, 0.35));
        let ctx = pipeline.process_frame(&pose.frame(t + 1.0));
        assert!(ctx.motion_reset);
        assert_eq!(ctx.frame_label(), GestureLabel::Pointing);
    }

    #[test]
    fn test_pointing_maps_cursor() {
        let config = Config::default();
        let cursor = CursorMapper::new(&CalibrationData::default(), &config);
        let mut pipeline = GesturePipeline::new(&config, SnapshotCell::default()).with_cursor(cursor);

        let mut pose = PoseBuilder::pointing();
        pose.index_tip_at(Point2::new(0.5, 0.5));
        let ctx = pipeline.process_frame(&pose.frame(0.0));
        let mapped = ctx.screen_position.unwrap();
        assert!((mapped.x - 960.0).abs() < 0.01);
        assert!((mapped.y - 540.0).abs() < 0.01);

        let ctx = pipeline.process_frame(&PoseBuilder::fist().frame(DT));
        assert_eq!(ctx.screen_position, None);
        assert_eq!(pipeline.cursor_position(), Some(mapped));
    }

    #[test]
    fn test_low_confidence_below_adaptive_threshold_is_gated() {
        let mut pipeline = GesturePipeline::new(&Config::default(), learning_cell());
        let mut pose = PoseBuilder::fist();
        pose.all_confidence(0.6);
        let ctx = pipeline.process_frame(&pose.frame(0.0));
        assert_eq!(ctx.classification.label, GestureLabel::Fist);
        assert_eq!(ctx.frame_label(), GestureLabel::Unknown);
        assert!(!ctx.rescored.learnable);
    }
}
