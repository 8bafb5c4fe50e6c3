// src/pipeline/event_bus.rs
//
// Output boundary. Everything the core wants the outside world to know
// about goes through here; consumers either drain the queue or register a
// callback. The core never performs OS-level effects itself.

use crate::adaptive::LearningCycleReport;
use crate::calibration::{CalibrationData, CalibrationEvent, CalibrationStep};
use crate::types::{GestureAction, Point2, StabilizedEvent};
use serde::Serialize;
use std::collections::VecDeque;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineEvent {
    GestureDetected {
        event: StabilizedEvent,
        /// Bound action, if the gesture is enabled
        #[serde(skip_serializing_if = "Option::is_none")]
        action: Option<GestureAction>,
        /// Mapped cursor position for pointing
        #[serde(skip_serializing_if = "Option::is_none")]
        screen_position: Option<Point2>,
    },

    LearningCycleCompleted(LearningCycleReport),

    CalibrationStepChanged {
        step: CalibrationStep,
        progress: f64,
    },

    CalibrationCompleted(CalibrationData),
}

impl PipelineEvent {
    /// Calibration notifications worth publishing; cancellation is not.
    pub fn from_calibration(event: &CalibrationEvent) -> Option<Self> {
        match event {
            CalibrationEvent::StepChanged { step, progress } => Some(Self::CalibrationStepChanged {
                step: *step,
                progress: *progress,
            }),
            CalibrationEvent::Completed(data) => Some(Self::CalibrationCompleted(data.clone())),
            CalibrationEvent::Cancelled => None,
        }
    }
}

type Subscriber = Box<dyn Fn(&PipelineEvent) + Send>;

pub struct EventBus {
    events: VecDeque<PipelineEvent>,
    max_pending: usize,
    subscribers: Vec<Subscriber>,
}

impl EventBus {
    pub fn new(max_pending: usize) -> Self {
        let max_pending = max_pending.max(1);
        Self {
            events: VecDeque::with_capacity(max_pending),
            max_pending,
            subscribers: Vec::new(),
        }
    }

    /// Callbacks run synchronously on the publishing thread.
    pub fn subscribe<F>(&mut self, subscriber: F)
    where
        F: Fn(&PipelineEvent) + Send + 'static,
    {
        self.subscribers.push(Box::new(subscriber));
    }

    pub fn publish(&mut self, event: PipelineEvent) {
        for subscriber in &self.subscribers {
            subscriber(&event);
        }

        if self.events.len() >= self.max_pending {
            warn!(
                "Event bus full ({} events), dropping oldest",
                self.max_pending
            );
            self.events.pop_front();
        }
        self.events.push_back(event);
    }

    pub fn drain(&mut self) -> Vec<PipelineEvent> {
        self.events.drain(..).collect()
    }

    pub fn pending_count(&self) -> usize {
        self.events.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GestureLabel;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn detected(t: f64) -> PipelineEvent {
        PipelineEvent::GestureDetected {
            event: StabilizedEvent {
                label: GestureLabel::Fist,
                confidence: 0.9,
                position: Point2::new(0.5, 0.5),
                timestamp: t,
            },
            action: Some(GestureAction::RightClick),
            screen_position: None,
        }
    }

    #[test]
    fn test_bounded_queue_drops_oldest() {
        let mut bus = EventBus::new(2);
        bus.publish(detected(0.0));
        bus.publish(detected(1.0));
        bus.publish(detected(2.0));
        assert_eq!(bus.pending_count(), 2);

        let drained = bus.drain();
        assert_eq!(drained[0], detected(1.0));
        assert_eq!(bus.pending_count(), 0);
    }

    #[test]
    fn test_subscribers_see_every_event() {
        let mut bus = EventBus::new(1);
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        bus.subscribe(move |_| {
            counter.fetch_add(1, Ordering::Relaxed);
        });

        for t in 0..3 {
            bus.publish(detected(t as f64));
        }
        assert_eq!(seen.load(Ordering::Relaxed), 3);
    }

    #[test]
    fn test_serialized_shape() {
        let json = serde_json::to_value(detected(0.5)).unwrap();
        assert_eq!(json["type"], "gesture_detected");
        assert_eq!(json["event"]["label"], "fist");
        assert_eq!(json["action"], "right_click");
        assert!(json.get("screen_position").is_none());
    }
}
