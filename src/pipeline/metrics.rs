// src/pipeline/metrics.rs
//
// Counters and timings for the frame path. Cheap to clone and share with
// the learning task; logged as a summary at the end of a run.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone)]
pub struct PipelineMetrics {
    pub total_frames: Arc<AtomicU64>,
    pub frames_with_hand: Arc<AtomicU64>,
    pub raw_recognitions: Arc<AtomicU64>,
    pub debounced_frames: Arc<AtomicU64>,
    pub stabilized_events: Arc<AtomicU64>,
    pub training_samples_sent: Arc<AtomicU64>,
    pub learning_cycles: Arc<AtomicU64>,
    pub classify_time_us: Arc<AtomicU64>,
    pub started_at: Instant,
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self {
            total_frames: Arc::new(AtomicU64::new(0)),
            frames_with_hand: Arc::new(AtomicU64::new(0)),
            raw_recognitions: Arc::new(AtomicU64::new(0)),
            debounced_frames: Arc::new(AtomicU64::new(0)),
            stabilized_events: Arc::new(AtomicU64::new(0)),
            training_samples_sent: Arc::new(AtomicU64::new(0)),
            learning_cycles: Arc::new(AtomicU64::new(0)),
            classify_time_us: Arc::new(AtomicU64::new(0)),
            started_at: Instant::now(),
        }
    }

    pub fn inc(&self, counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_timing(&self, counter: &AtomicU64, duration_us: u64) {
        counter.store(duration_us, Ordering::Relaxed);
    }

    pub fn fps(&self) -> f64 {
        let frames = self.total_frames.load(Ordering::Relaxed);
        let elapsed = self.started_at.elapsed().as_secs_f64();
        if elapsed > 0.01 {
            frames as f64 / elapsed
        } else {
            0.0
        }
    }

    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            total_frames: self.total_frames.load(Ordering::Relaxed),
            fps: self.fps(),
            frames_with_hand: self.frames_with_hand.load(Ordering::Relaxed),
            raw_recognitions: self.raw_recognitions.load(Ordering::Relaxed),
            debounced_frames: self.debounced_frames.load(Ordering::Relaxed),
            stabilized_events: self.stabilized_events.load(Ordering::Relaxed),
            training_samples_sent: self.training_samples_sent.load(Ordering::Relaxed),
            learning_cycles: self.learning_cycles.load(Ordering::Relaxed),
            last_classify_us: self.classify_time_us.load(Ordering::Relaxed),
            elapsed_secs: self.started_at.elapsed().as_secs_f64(),
        }
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct MetricsSummary {
    pub total_frames: u64,
    pub fps: f64,
    pub frames_with_hand: u64,
    pub raw_recognitions: u64,
    pub debounced_frames: u64,
    pub stabilized_events: u64,
    pub training_samples_sent: u64,
    pub learning_cycles: u64,
    pub last_classify_us: u64,
    pub elapsed_secs: f64,
}
