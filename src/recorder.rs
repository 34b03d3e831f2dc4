//! The event-recorder capability.
//!
//! Modeled as an injected capability with one method, matching the real
//! Kubernetes client-go convention this crate's merger stands in for — the
//! crate never reaches for a global sink.

use k8s_openapi::api::core::v1::Pod;
use std::sync::Mutex;

/// Mirrors client-go's event type constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    Normal,
    Warning,
}

/// A capability for recording events against a pod. Must be safe for
/// concurrent use — the merger task and whatever else the embedder runs may
/// both hold a clone of it (spec §5's "shared resources" clause).
pub trait EventRecorder: Send + Sync {
    /// `messageFmt, args...` from the spec collapses to a single
    /// pre-formatted `message`, since Rust has no varargs; callers format
    /// with `format!` before calling, same as this codebase's `format!`
    /// message construction in its admission-control path.
    fn eventf(&self, pod: &Pod, event_type: EventType, reason: &str, message: &str);
}

/// Discards every event. Useful when the embedder genuinely has nowhere to
/// send them (e.g. a one-off CLI invocation) or in tests that don't assert
/// on recorder output.
#[derive(Debug, Default)]
pub struct NullRecorder;

impl EventRecorder for NullRecorder {
    fn eventf(&self, _pod: &Pod, _event_type: EventType, _reason: &str, _message: &str) {}
}

/// A single recorded event, captured by [`RecordingRecorder`] for test
/// assertions.
#[derive(Debug, Clone)]
pub struct RecordedEvent {
    pub pod_name: String,
    pub pod_namespace: String,
    pub event_type: EventType,
    pub reason: String,
    pub message: String,
}

/// An in-memory [`EventRecorder`] that remembers everything it's told, so
/// tests can assert a validation failure was actually reported.
#[derive(Debug, Default)]
pub struct RecordingRecorder {
    events: Mutex<Vec<RecordedEvent>>,
}

impl RecordingRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<RecordedEvent> {
        self.events.lock().expect("recorder mutex poisoned").clone()
    }
}

impl EventRecorder for RecordingRecorder {
    fn eventf(&self, pod: &Pod, event_type: EventType, reason: &str, message: &str) {
        let record = RecordedEvent {
            pod_name: pod.metadata.name.clone().unwrap_or_default(),
            pod_namespace: pod.metadata.namespace.clone().unwrap_or_default(),
            event_type,
            reason: reason.to_string(),
            message: message.to_string(),
        };
        self.events
            .lock()
            .expect("recorder mutex poisoned")
            .push(record);
    }
}
