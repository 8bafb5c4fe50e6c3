// src/adaptive/engine.rs
//
// Owner of all mutable learning state. The frame path sends samples and
// user feedback over a channel; the engine folds them in, runs a learning
// cycle on a fixed interval (or early once enough samples piled up), and
// publishes a fresh read-only snapshot after each cycle.

use super::patterns::{GesturePattern, GesturePatternLearner, TrainingSample};
use super::snapshot::{LearnedSnapshot, SnapshotCell};
use super::thresholds::{AccuracyTally, AdaptiveThresholdStore, ThresholdMove};
use crate::storage::{self, BlobStore, COUNTERS_KEY, PATTERNS_KEY, THRESHOLDS_KEY};
use crate::types::{GestureLabel, LearningConfig};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Accuracy reported before any cycle has run.
pub const DEFAULT_RECOGNITION_ACCURACY: f64 = 0.85;

/// Samples needed for learning progress to reach 1.0.
const PROGRESS_SAMPLE_TARGET: f64 = 100.0;

#[derive(Debug, Clone)]
pub enum LearningFeedback {
    Sample(TrainingSample),
    /// The user confirmed the latest detection of this label
    Confirm(GestureLabel),
    Incorrect {
        detected: GestureLabel,
        actual: GestureLabel,
    },
    Reset,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LearningCounters {
    pub recognition_accuracy: f64,
    pub training_data_count: u64,
}

impl Default for LearningCounters {
    fn default() -> Self {
        Self {
            recognition_accuracy: DEFAULT_RECOGNITION_ACCURACY,
            training_data_count: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LearningCycleReport {
    pub samples_considered: usize,
    pub patterns_rebuilt: usize,
    pub threshold_moves: BTreeMap<GestureLabel, ThresholdMove>,
    pub recognition_accuracy: f64,
    pub learning_progress: f64,
    pub generation: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LearningStatistics {
    pub learned_gestures: usize,
    pub training_samples: u64,
    pub recognition_accuracy: f64,
    pub learning_progress: f64,
    pub adaptive_thresholds: BTreeMap<GestureLabel, f32>,
}

pub struct LearningEngine {
    config: LearningConfig,
    samples: VecDeque<TrainingSample>,
    thresholds: AdaptiveThresholdStore,
    patterns: GesturePatternLearner,
    counters: LearningCounters,
    samples_since_cycle: usize,
    confirmations_since_cycle: usize,
    generation: u64,
    snapshots: SnapshotCell,
}

impl LearningEngine {
    pub fn new(config: LearningConfig, snapshots: SnapshotCell) -> Self {
        let thresholds = AdaptiveThresholdStore::new(&config);
        Self::with_state(
            config,
            snapshots,
            thresholds,
            GesturePatternLearner::new(),
            LearningCounters::default(),
        )
    }

    /// Resume from persisted state; anything unreadable starts fresh.
    pub fn restore(config: LearningConfig, snapshots: SnapshotCell, store: &dyn BlobStore) -> Self {
        let thresholds = match storage::load_json::<AdaptiveThresholdStore>(store, THRESHOLDS_KEY) {
            Ok(Some(mut t)) if !t.is_empty() => {
                let repaired = t.reconcile(&config);
                if repaired > 0 {
                    warn!("⚠️  Repaired {} persisted adaptive thresholds", repaired);
                }
                t
            }
            Ok(_) => AdaptiveThresholdStore::new(&config),
            Err(e) => {
                warn!("⚠️  Adaptive thresholds unreadable, using defaults: {:#}", e);
                AdaptiveThresholdStore::new(&config)
            }
        };
        let patterns: BTreeMap<GestureLabel, GesturePattern> =
            storage::load_json_or_default(store, PATTERNS_KEY);
        let counters: LearningCounters = storage::load_json_or_default(store, COUNTERS_KEY);

        info!(
            "🧠 Learning state restored: {} patterns, {} samples seen, accuracy {:.0}%",
            patterns.len(),
            counters.training_data_count,
            counters.recognition_accuracy * 100.0
        );

        Self::with_state(
            config,
            snapshots,
            thresholds,
            GesturePatternLearner::from_patterns(patterns),
            counters,
        )
    }

    fn with_state(
        config: LearningConfig,
        snapshots: SnapshotCell,
        thresholds: AdaptiveThresholdStore,
        patterns: GesturePatternLearner,
        counters: LearningCounters,
    ) -> Self {
        let engine = Self {
            samples: VecDeque::with_capacity(config.max_training_samples),
            config,
            thresholds,
            patterns,
            counters,
            samples_since_cycle: 0,
            confirmations_since_cycle: 0,
            generation: 0,
            snapshots,
        };
        engine.publish_snapshot();
        engine
    }

    pub fn snapshots(&self) -> &SnapshotCell {
        &self.snapshots
    }

    pub fn thresholds(&self) -> &AdaptiveThresholdStore {
        &self.thresholds
    }

    pub fn thresholds_mut(&mut self) -> &mut AdaptiveThresholdStore {
        &mut self.thresholds
    }

    pub fn patterns(&self) -> &GesturePatternLearner {
        &self.patterns
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    pub fn record_sample(&mut self, sample: TrainingSample) {
        self.samples.push_back(sample);
        while self.samples.len() > self.config.max_training_samples {
            self.samples.pop_front();
        }
        self.counters.training_data_count += 1;
        self.samples_since_cycle += 1;
    }

    /// Mark the most recent sample of `label` as user-confirmed.
    pub fn confirm_gesture_correct(&mut self, label: GestureLabel) -> bool {
        match self.samples.iter_mut().rev().find(|s| s.label == label) {
            Some(sample) => {
                sample.user_confirmed = true;
                self.confirmations_since_cycle += 1;
                info!("✅ Gesture confirmed: {}", label);
                true
            }
            None => false,
        }
    }

    pub fn report_incorrect_gesture(&mut self, detected: GestureLabel, actual: GestureLabel) {
        self.thresholds.report_incorrect(detected);
        info!("❌ Correction: {} → {}", detected, actual);
        self.publish_snapshot();
    }

    /// Start calibrated labels from their measured thresholds.
    pub fn seed_from_calibration(&mut self, thresholds: &BTreeMap<GestureLabel, f32>) {
        for (&label, &value) in thresholds {
            self.thresholds.seed(label, value);
        }
        self.publish_snapshot();
    }

    pub fn handle(&mut self, feedback: LearningFeedback) {
        match feedback {
            LearningFeedback::Sample(sample) => self.record_sample(sample),
            LearningFeedback::Confirm(label) => {
                self.confirm_gesture_correct(label);
            }
            LearningFeedback::Incorrect { detected, actual } => {
                self.report_incorrect_gesture(detected, actual)
            }
            LearningFeedback::Reset => self.reset_learning(),
        }
    }

    pub fn due_early(&self) -> bool {
        self.samples_since_cycle >= self.config.cycle_sample_trigger.max(1)
    }

    /// One learning pass over the recent window. `None` when nothing new
    /// arrived since the previous pass, so an idle session never drifts.
    pub fn process_learning_cycle(&mut self) -> Option<LearningCycleReport> {
        if self.samples.is_empty() {
            return None;
        }
        if self.samples_since_cycle == 0 && self.confirmations_since_cycle == 0 {
            debug!("no new samples since cycle {}, skipping", self.generation);
            return None;
        }

        let window = recent(&self.samples, self.config.pattern_window);
        let correct_confidence = self.config.correct_confidence;

        let mut tallies: BTreeMap<GestureLabel, AccuracyTally> = BTreeMap::new();
        for sample in &window {
            tallies
                .entry(sample.label)
                .or_default()
                .record(sample.judged_correct(correct_confidence));
        }
        let threshold_moves = self.thresholds.update_from_accuracy(&tallies);
        let patterns_rebuilt = self.patterns.rebuild(&window);

        let accuracy_window = recent(&self.samples, self.config.accuracy_window);
        let correct = accuracy_window
            .iter()
            .filter(|s| s.judged_correct(correct_confidence))
            .count();
        self.counters.recognition_accuracy = correct as f64 / accuracy_window.len() as f64;

        self.samples_since_cycle = 0;
        self.confirmations_since_cycle = 0;
        self.generation += 1;
        self.publish_snapshot();

        let report = LearningCycleReport {
            samples_considered: window.len(),
            patterns_rebuilt,
            threshold_moves,
            recognition_accuracy: self.counters.recognition_accuracy,
            learning_progress: self.learning_progress(),
            generation: self.generation,
        };

        info!(
            "🧠 Learning cycle {} done: accuracy {:.0}%, {} patterns rebuilt",
            report.generation,
            report.recognition_accuracy * 100.0,
            report.patterns_rebuilt
        );

        Some(report)
    }

    pub fn learning_progress(&self) -> f64 {
        (self.counters.training_data_count as f64 / PROGRESS_SAMPLE_TARGET).min(1.0)
    }

    pub fn statistics(&self) -> LearningStatistics {
        LearningStatistics {
            learned_gestures: self.patterns.len(),
            training_samples: self.counters.training_data_count,
            recognition_accuracy: self.counters.recognition_accuracy,
            learning_progress: self.learning_progress(),
            adaptive_thresholds: self.thresholds.currents(),
        }
    }

    pub fn reset_learning(&mut self) {
        self.samples.clear();
        self.patterns.clear();
        self.thresholds = AdaptiveThresholdStore::new(&self.config);
        self.counters = LearningCounters::default();
        self.samples_since_cycle = 0;
        self.confirmations_since_cycle = 0;
        self.generation += 1;
        self.publish_snapshot();
        info!("🔄 Learning reset");
    }

    pub fn persist(&self, store: &dyn BlobStore) -> Result<()> {
        storage::save_json(store, THRESHOLDS_KEY, &self.thresholds)?;
        storage::save_json(store, PATTERNS_KEY, self.patterns.patterns())?;
        storage::save_json(store, COUNTERS_KEY, &self.counters)?;
        Ok(())
    }

    pub fn publish_snapshot(&self) {
        self.snapshots.store(LearnedSnapshot::from_store(
            &self.thresholds,
            self.patterns.patterns(),
            self.counters.recognition_accuracy,
            self.generation,
        ));
    }

    fn cycle_and_persist(
        &mut self,
        store: &dyn BlobStore,
        reports: Option<&mpsc::UnboundedSender<LearningCycleReport>>,
    ) {
        let Some(report) = self.process_learning_cycle() else {
            return;
        };
        if let Err(e) = self.persist(store) {
            warn!("⚠️  Failed to persist learned state: {:#}", e);
        }
        if let Some(tx) = reports {
            // Receiver gone just means nobody is listening
            let _ = tx.send(report);
        }
    }

    /// Drive the engine until every feedback sender is dropped, then run a
    /// final cycle, persist, and hand the engine back.
    pub async fn run(
        mut self,
        mut rx: mpsc::UnboundedReceiver<LearningFeedback>,
        store: Arc<dyn BlobStore>,
        reports: Option<mpsc::UnboundedSender<LearningCycleReport>>,
    ) -> Self {
        let period = Duration::from_secs_f64(self.config.cycle_interval_secs.max(0.05));
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick fires immediately
        ticker.tick().await;

        info!("🧠 Learning engine started (cycle every {:.1}s)", period.as_secs_f64());

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.cycle_and_persist(store.as_ref(), reports.as_ref());
                }
                msg = rx.recv() => match msg {
                    Some(feedback) => {
                        self.handle(feedback);
                        if self.due_early() {
                            debug!("sample trigger reached, cycling early");
                            self.cycle_and_persist(store.as_ref(), reports.as_ref());
                            ticker.reset();
                        }
                    }
                    None => break,
                },
            }
        }

        self.cycle_and_persist(store.as_ref(), reports.as_ref());
        if let Err(e) = self.persist(store.as_ref()) {
            warn!("⚠️  Failed to persist learned state on shutdown: {:#}", e);
        }
        info!("🧠 Learning engine stopped");
        self
    }
}

fn recent(samples: &VecDeque<TrainingSample>, window: usize) -> Vec<TrainingSample> {
    let skip = samples.len().saturating_sub(window.max(1));
    samples.iter().skip(skip).cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::test_poses::PoseBuilder;
    use crate::storage::MemoryBlobStore;

    fn sample(label: GestureLabel, confidence: f32) -> TrainingSample {
        let pose = match label {
            GestureLabel::Fist => PoseBuilder::fist(),
            GestureLabel::Peace => PoseBuilder::peace(),
            _ => PoseBuilder::pointing(),
        };
        TrainingSample::new(label, &pose.hand(), confidence)
    }

    fn engine() -> LearningEngine {
        LearningEngine::new(LearningConfig::default(), SnapshotCell::default())
    }

    #[test]
    fn test_empty_cycle_is_noop() {
        let mut e = engine();
        assert!(e.process_learning_cycle().is_none());
        assert_eq!(e.statistics().recognition_accuracy, DEFAULT_RECOGNITION_ACCURACY);
    }

    #[test]
    fn test_cycle_adjusts_thresholds_and_patterns() {
        let mut e = engine();
        for _ in 0..10 {
            e.record_sample(sample(GestureLabel::Fist, 0.95));
            e.record_sample(sample(GestureLabel::Peace, 0.6));
        }

        let report = e.process_learning_cycle().unwrap();
        assert_eq!(report.samples_considered, 20);
        assert_eq!(report.patterns_rebuilt, 2);
        assert_eq!(report.threshold_moves[&GestureLabel::Fist], ThresholdMove::Raised);
        assert_eq!(report.threshold_moves[&GestureLabel::Peace], ThresholdMove::Lowered);
        assert!((report.recognition_accuracy - 0.5).abs() < 1e-9);
        assert!((report.learning_progress - 0.2).abs() < 1e-9);

        let snap = e.snapshots().load();
        assert_eq!(snap.generation, 1);
        assert!((snap.thresholds[&GestureLabel::Fist] - 0.71).abs() < 1e-6);
        assert!(snap.patterns.contains_key(&GestureLabel::Peace));
    }

    #[test]
    fn test_idle_cycles_leave_thresholds_unchanged() {
        let mut e = engine();
        for _ in 0..10 {
            e.record_sample(sample(GestureLabel::Fist, 0.95));
            e.record_sample(sample(GestureLabel::Peace, 0.6));
        }
        assert!(e.process_learning_cycle().is_some());
        let after_first = e.thresholds().currents();
        let generation = e.snapshots().load().generation;

        assert!(e.process_learning_cycle().is_none());
        assert!(e.process_learning_cycle().is_none());
        assert_eq!(e.thresholds().currents(), after_first);
        assert_eq!(e.snapshots().load().generation, generation);

        // A confirmation is new evidence on its own
        assert!(e.confirm_gesture_correct(GestureLabel::Peace));
        assert!(e.process_learning_cycle().is_some());
    }

    #[tokio::test]
    async fn test_idle_actor_ticks_do_not_cycle() {
        tokio::time::pause();
        let mut config = LearningConfig::default();
        config.cycle_interval_secs = 1.0;
        let cell = SnapshotCell::default();
        let mut engine = LearningEngine::new(config, cell.clone());
        engine.record_sample(sample(GestureLabel::Fist, 0.95));
        engine.process_learning_cycle();
        let before = engine.thresholds().currents();

        let store: Arc<dyn BlobStore> = Arc::new(MemoryBlobStore::new());
        let (tx, rx) = mpsc::unbounded_channel();
        let (report_tx, mut report_rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(engine.run(rx, store, Some(report_tx)));

        tokio::time::sleep(Duration::from_secs(10)).await;
        drop(tx);
        let engine = handle.await.unwrap();

        assert!(report_rx.recv().await.is_none());
        assert_eq!(engine.thresholds().currents(), before);
        assert_eq!(cell.load().generation, 1);
    }

    #[test]
    fn test_confirmation_counts_as_correct() {
        let mut e = engine();
        e.record_sample(sample(GestureLabel::Peace, 0.6));
        e.record_sample(sample(GestureLabel::Fist, 0.6));
        assert!(e.confirm_gesture_correct(GestureLabel::Peace));
        assert!(!e.confirm_gesture_correct(GestureLabel::Pinch));

        let report = e.process_learning_cycle().unwrap();
        assert!((report.recognition_accuracy - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_training_window_is_bounded() {
        let mut config = LearningConfig::default();
        config.max_training_samples = 60;
        let mut e = LearningEngine::new(config, SnapshotCell::default());
        for _ in 0..100 {
            e.record_sample(sample(GestureLabel::Fist, 0.9));
        }
        assert_eq!(e.sample_count(), 60);
        assert_eq!(e.statistics().training_samples, 100);
        assert_eq!(e.learning_progress(), 1.0);

        let report = e.process_learning_cycle().unwrap();
        assert_eq!(report.samples_considered, 50);
    }

    #[test]
    fn test_incorrect_report_and_reset() {
        let mut e = engine();
        e.report_incorrect_gesture(GestureLabel::Pinch, GestureLabel::Pointing);
        assert!((e.snapshots().load().thresholds[&GestureLabel::Pinch] - 0.68).abs() < 1e-6);

        e.record_sample(sample(GestureLabel::Fist, 0.9));
        e.process_learning_cycle();
        e.reset_learning();

        let stats = e.statistics();
        assert_eq!(stats.learned_gestures, 0);
        assert_eq!(stats.training_samples, 0);
        assert_eq!(stats.adaptive_thresholds[&GestureLabel::Pinch], 0.7);
    }

    #[test]
    fn test_calibration_seeds_thresholds() {
        let mut e = engine();
        let measured = BTreeMap::from([(GestureLabel::Fist, 0.62_f32), (GestureLabel::Peace, 0.99)]);
        e.seed_from_calibration(&measured);

        let snap = e.snapshots().load();
        assert!((snap.thresholds[&GestureLabel::Fist] - 0.62).abs() < 1e-6);
        // Clamped to the configured maximum
        assert!((snap.thresholds[&GestureLabel::Peace] - 0.95).abs() < 1e-6);
    }

    #[test]
    fn test_persist_and_restore() {
        let store = MemoryBlobStore::new();
        let mut e = engine();
        for _ in 0..5 {
            e.record_sample(sample(GestureLabel::Fist, 0.95));
        }
        e.process_learning_cycle();
        e.persist(&store).unwrap();

        let restored = LearningEngine::restore(LearningConfig::default(), SnapshotCell::default(), &store);
        assert_eq!(restored.statistics(), e.statistics());
        assert_eq!(restored.patterns(), e.patterns());
        assert_eq!(restored.thresholds(), e.thresholds());
    }

    #[test]
    fn test_restore_from_corrupt_store_uses_defaults() {
        let store = MemoryBlobStore::new();
        store.put(THRESHOLDS_KEY, b"[1,2").unwrap();
        store.put(COUNTERS_KEY, b"nope").unwrap();

        let e = LearningEngine::restore(LearningConfig::default(), SnapshotCell::default(), &store);
        assert_eq!(e.thresholds().len(), GestureLabel::RECOGNIZED.len());
        assert_eq!(e.statistics().recognition_accuracy, DEFAULT_RECOGNITION_ACCURACY);
    }

    #[test]
    fn test_restore_repairs_out_of_bounds_thresholds() {
        let store = MemoryBlobStore::new();
        let blob = r#"{
            "pinch": {"base": 0.7, "current": 5.0, "min": 0.5, "max": 0.95, "adaptation_rate": 0.01},
            "fist": {"base": 0.7, "current": 0.7, "min": 0.9, "max": 0.6, "adaptation_rate": 0.01}
        }"#;
        store.put(THRESHOLDS_KEY, blob.as_bytes()).unwrap();

        let e = LearningEngine::restore(LearningConfig::default(), SnapshotCell::default(), &store);

        assert_eq!(e.thresholds().len(), GestureLabel::RECOGNIZED.len());
        for (label, t) in e.thresholds().iter() {
            assert!(t.min <= t.max, "{} bounds inverted", label);
            assert!(t.current >= t.min && t.current <= t.max, "{} out of bounds", label);
        }
        assert_eq!(e.thresholds().current(GestureLabel::Pinch), Some(0.95));
        let fist = e.thresholds().get(GestureLabel::Fist).unwrap();
        assert_eq!((fist.min, fist.max), (0.6, 0.9));
        assert_eq!(e.thresholds().current(GestureLabel::Peace), Some(0.7));
        assert_eq!(e.snapshots().load().thresholds.len(), GestureLabel::RECOGNIZED.len());
    }

    #[tokio::test]
    async fn test_actor_runs_final_cycle_on_shutdown() {
        let mut config = LearningConfig::default();
        config.cycle_interval_secs = 3600.0;
        let cell = SnapshotCell::default();
        let engine = LearningEngine::new(config, cell.clone());

        let store: Arc<dyn BlobStore> = Arc::new(MemoryBlobStore::new());
        let (tx, rx) = mpsc::unbounded_channel();
        let (report_tx, mut report_rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(engine.run(rx, store.clone(), Some(report_tx)));

        for _ in 0..4 {
            tx.send(LearningFeedback::Sample(sample(GestureLabel::Fist, 0.95))).unwrap();
        }
        tx.send(LearningFeedback::Confirm(GestureLabel::Fist)).unwrap();
        drop(tx);

        let engine = handle.await.unwrap();
        assert_eq!(engine.statistics().training_samples, 4);
        assert_eq!(cell.load().generation, 1);

        let report = report_rx.recv().await.unwrap();
        assert_eq!(report.samples_considered, 4);
        assert!(store.get(PATTERNS_KEY).unwrap().is_some());
    }

    #[tokio::test]
    async fn test_sample_trigger_cycles_early() {
        let mut config = LearningConfig::default();
        config.cycle_interval_secs = 3600.0;
        config.cycle_sample_trigger = 3;
        let cell = SnapshotCell::default();
        let engine = LearningEngine::new(config, cell.clone());

        let store: Arc<dyn BlobStore> = Arc::new(MemoryBlobStore::new());
        let (tx, rx) = mpsc::unbounded_channel();
        let (report_tx, mut report_rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(engine.run(rx, store, Some(report_tx)));

        for _ in 0..3 {
            tx.send(LearningFeedback::Sample(sample(GestureLabel::Peace, 0.9))).unwrap();
        }

        let early = report_rx.recv().await.unwrap();
        assert_eq!(early.samples_considered, 3);
        assert_eq!(cell.load().generation, 1);

        drop(tx);
        handle.await.unwrap();
    }
}
