/*!
Status notifications produced for the host framework.
*/

use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::panic::Location;
use tracing::{error, info};

/// Event delivered on the host's "update status" channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StatusEvent {
    /// Initialization succeeded
    Initialized { info: String },

    /// Initialization failed; the actuator stays uninitialized
    InitFailed { message: String },

    /// Last commanded position (not a hardware reading)
    Position { value: f64 },

    /// Channel closed by its owner
    Closed,

    /// A slave dropped its reference; the owner keeps the port open
    Released { port: String },
}

impl StatusEvent {
    /// Failure event carrying the error chain and the reporting call site
    #[track_caller]
    pub fn init_failed(err: &dyn std::error::Error) -> Self {
        let location = Location::caller();
        let mut message = err.to_string();
        let mut source = err.source();
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        message.push_str(&format!(" ({}:{})", location.file(), location.line()));
        Self::InitFailed { message }
    }

    /// Short kind name, matching the serialized tag
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Initialized { .. } => "initialized",
            Self::InitFailed { .. } => "init_failed",
            Self::Position { .. } => "position",
            Self::Closed => "closed",
            Self::Released { .. } => "released",
        }
    }

    /// Human-readable payload
    pub fn message(&self) -> String {
        match self {
            Self::Initialized { info } => info.clone(),
            Self::InitFailed { message } => message.clone(),
            Self::Position { value } => value.to_string(),
            Self::Closed => "Port closed".to_string(),
            Self::Released { port } => format!("Released shared port {}", port),
        }
    }

    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Receiver of status events, owned by the host framework
pub trait StatusSink {
    fn update_status(&self, event: StatusEvent);
}

/// Default sink: forwards events to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl StatusSink for LogSink {
    fn update_status(&self, event: StatusEvent) {
        match &event {
            StatusEvent::InitFailed { message } => error!("Shutter status: {}", message),
            other => info!("Shutter status: {} {}", other.kind(), other.message()),
        }
    }
}

/// Sink that keeps every event, for embedders polling status and for tests
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: RefCell<Vec<StatusEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<StatusEvent> {
        self.events.borrow().clone()
    }

    pub fn last(&self) -> Option<StatusEvent> {
        self.events.borrow().last().cloned()
    }
}

impl StatusSink for RecordingSink {
    fn update_status(&self, event: StatusEvent) {
        self.events.borrow_mut().push(event);
    }
}

impl<S: StatusSink + ?Sized> StatusSink for std::rc::Rc<S> {
    fn update_status(&self, event: StatusEvent) {
        (**self).update_status(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ConnectionError, InitError};

    #[test]
    fn test_failure_message_has_chain_and_location() {
        let err = InitError::HardwareInitFailed(ConnectionError::new("COM3", "access denied"));
        let event = StatusEvent::init_failed(&err);
        let message = event.message();

        assert!(message.starts_with("hardware initialization failed"));
        assert!(message.contains("access denied"));
        assert!(message.contains("status.rs:"));
        assert_eq!(event.kind(), "init_failed");
    }

    #[test]
    fn test_json_tagging() {
        let json = StatusEvent::Position { value: 1.0 }.to_json().unwrap();
        assert_eq!(json, r#"{"kind":"position","value":1.0}"#);

        let json = StatusEvent::Closed.to_json().unwrap();
        assert_eq!(json, r#"{"kind":"closed"}"#);

        let released = StatusEvent::Released { port: "COM3".to_string() };
        assert_eq!(released.to_json().unwrap(), r#"{"kind":"released","port":"COM3"}"#);
        assert_eq!(released.message(), "Released shared port COM3");
    }

    #[test]
    fn test_recording_sink() {
        let sink = RecordingSink::new();
        sink.update_status(StatusEvent::Closed);
        sink.update_status(StatusEvent::Position { value: 0.0 });
        assert_eq!(sink.events().len(), 2);
        assert_eq!(sink.last(), Some(StatusEvent::Position { value: 0.0 }));
    }
}
