//! Diagnostic message sinks for index writers.

use parking_lot::Mutex;

/// Component name under which the vector writer reports.
pub const PILUM_COMPONENT: &str = "PILUM";

/// A sink for per-component diagnostic messages.
pub trait InfoStream: Send + Sync + std::fmt::Debug {
    /// Whether messages for `component` are wanted.
    fn is_enabled(&self, component: &str) -> bool;

    /// Record a message for `component`.
    fn message(&self, component: &str, message: &str);
}

/// Discards every message.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopInfoStream;

impl InfoStream for NoopInfoStream {
    fn is_enabled(&self, _component: &str) -> bool {
        false
    }

    fn message(&self, _component: &str, _message: &str) {}
}

/// Forwards messages to the `log` facade with the component as target.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogInfoStream;

impl InfoStream for LogInfoStream {
    fn is_enabled(&self, component: &str) -> bool {
        log::log_enabled!(target: component, log::Level::Info)
    }

    fn message(&self, component: &str, message: &str) {
        log::info!(target: component, "{message}");
    }
}

/// Keeps every message in memory.
#[derive(Debug, Default)]
pub struct MemoryInfoStream {
    messages: Mutex<Vec<(String, String)>>,
}

impl MemoryInfoStream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages recorded so far, as `(component, message)` pairs.
    pub fn messages(&self) -> Vec<(String, String)> {
        self.messages.lock().clone()
    }
}

impl InfoStream for MemoryInfoStream {
    fn is_enabled(&self, _component: &str) -> bool {
        true
    }

    fn message(&self, component: &str, message: &str) {
        self.messages
            .lock()
            .push((component.to_string(), message.to_string()));
    }
}
