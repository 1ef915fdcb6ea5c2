//! Unified event bus: trait for emitting analytics events from any module.
//!
//! The journey router accepts an `Arc<dyn EventSink>` and reports every
//! routing decision and graph edit through it.

use crate::types::{AnalyticsEvent, EventType};
use chrono::Utc;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

/// Trait for emitting analytics events.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: AnalyticsEvent);
}

/// No-op sink for tests and callers that don't need event emission.
pub struct NoOpSink;

impl EventSink for NoOpSink {
    fn emit(&self, _event: AnalyticsEvent) {}
}

/// In-memory sink that captures events for testing.
#[derive(Default)]
pub struct CaptureSink {
    events: Mutex<Vec<AnalyticsEvent>>,
}

impl CaptureSink {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<AnalyticsEvent>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn events(&self) -> Vec<AnalyticsEvent> {
        self.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.lock().len()
    }

    pub fn count_type(&self, event_type: EventType) -> usize {
        self.lock()
            .iter()
            .filter(|e| e.event_type == event_type)
            .count()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}

impl EventSink for CaptureSink {
    fn emit(&self, event: AnalyticsEvent) {
        self.lock().push(event);
    }
}

/// Convenience builder for creating `AnalyticsEvent` with minimal boilerplate.
/// The event's `node_id` is `local` until the emitter stamps its own.
pub fn make_event(
    event_type: EventType,
    journey_id: impl Into<String>,
    step_id: Option<String>,
    branch_id: Option<String>,
    contact_id: Option<String>,
) -> AnalyticsEvent {
    AnalyticsEvent {
        event_id: Uuid::new_v4(),
        event_type,
        journey_id: journey_id.into(),
        step_id,
        branch_id,
        contact_id,
        detail: None,
        node_id: "local".into(),
        timestamp: Utc::now(),
    }
}

/// Convenience: create a no-op event bus for modules that don't need it.
pub fn noop_sink() -> Arc<dyn EventSink> {
    Arc::new(NoOpSink)
}

/// Convenience: create a capture sink for tests.
pub fn capture_sink() -> Arc<CaptureSink> {
    Arc::new(CaptureSink::new())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_sink() {
        let sink = capture_sink();
        assert_eq!(sink.count(), 0);

        sink.emit(make_event(
            EventType::BranchSelected,
            "journey-1",
            Some("step-a".into()),
            Some("e-step-a-step-b".into()),
            Some("contact-1".into()),
        ));
        sink.emit(make_event(
            EventType::BranchUnmatched,
            "journey-1",
            Some("step-a".into()),
            None,
            Some("contact-2".into()),
        ));

        assert_eq!(sink.count(), 2);
        assert_eq!(sink.count_type(EventType::BranchSelected), 1);
        assert_eq!(sink.count_type(EventType::BranchUnmatched), 1);

        let events = sink.events();
        assert_eq!(events[0].branch_id.as_deref(), Some("e-step-a-step-b"));
        assert_eq!(events[1].contact_id, Some("contact-2".into()));

        sink.clear();
        assert_eq!(sink.count(), 0);
    }

    #[test]
    fn test_noop_sink() {
        let sink = noop_sink();
        // Should not panic
        sink.emit(make_event(EventType::CommandUndone, "journey-1", None, None, None));
    }
}
