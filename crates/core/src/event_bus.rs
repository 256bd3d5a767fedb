//! Unified event bus: trait for emitting cadence lifecycle events.
//!
//! The engine accepts an `Arc<dyn EventSink>` and only decides *that* a step
//! occurred; sinks decide how it is broadcast (chat cards, webhooks, logs).

use crate::types::{CadenceEvent, Channel, EventType};
use chrono::Utc;
use std::sync::{Arc, Mutex};
use tracing::info;
use uuid::Uuid;

/// Trait for emitting cadence events.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: CadenceEvent);
}

/// No-op sink for tests and deployments without notifications.
pub struct NoOpSink;

impl EventSink for NoOpSink {
    fn emit(&self, _event: CadenceEvent) {}
}

/// Sink that writes every event to the tracing pipeline.
pub struct LogSink;

impl EventSink for LogSink {
    fn emit(&self, event: CadenceEvent) {
        info!(
            event_type = ?event.event_type,
            enrollment_id = %event.enrollment_id,
            contact_id = %event.contact_id,
            step_index = ?event.step_index,
            channel = ?event.channel,
            "Cadence event"
        );
    }
}

/// Keeps every emitted event in memory; used by tests to assert on the
/// lifecycle a sequence of transitions produced.
#[derive(Default)]
pub struct CaptureSink {
    events: Mutex<Vec<CadenceEvent>>,
}

impl CaptureSink {
    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<CadenceEvent>> {
        // A panicking test thread must not hide the events it already sent.
        self.events.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn events(&self) -> Vec<CadenceEvent> {
        self.lock().clone()
    }

    pub fn count_type(&self, event_type: EventType) -> usize {
        self.lock()
            .iter()
            .filter(|e| e.event_type == event_type)
            .count()
    }
}

impl EventSink for CaptureSink {
    fn emit(&self, event: CadenceEvent) {
        self.lock().push(event);
    }
}

/// Convenience builder for creating a `CadenceEvent` with minimal boilerplate.
pub fn make_event(
    event_type: EventType,
    enrollment_id: Uuid,
    contact_id: impl Into<String>,
    step_index: Option<usize>,
    channel: Option<Channel>,
) -> CadenceEvent {
    CadenceEvent {
        event_id: Uuid::new_v4(),
        event_type,
        enrollment_id,
        contact_id: contact_id.into(),
        step_index,
        channel,
        actor: None,
        timestamp: Utc::now(),
    }
}

/// Convenience: create a no-op event bus.
pub fn noop_sink() -> Arc<dyn EventSink> {
    Arc::new(NoOpSink)
}

pub fn capture_sink() -> Arc<CaptureSink> {
    Arc::new(CaptureSink::default())
}
