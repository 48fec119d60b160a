//! Ordered call recording shared by the mock provider and namespace.
//!
//! Rollback order is only observable across both collaborators at once
//! (a line leaf is removed, then its handle released, then the root node
//! removed), so both mocks append to the same [`CallLog`].

use gpio_export_core::{Direction, Level, LineId};
use parking_lot::Mutex;
use std::sync::Arc;

/// One recorded collaborator call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    /// `LineProvider::resolve`
    Resolve { chip: String, offset: u32 },
    /// `LineProvider::acquire` that handed out a handle
    Acquire { line: LineId, label: String },
    /// `LineProvider::read`
    Read { line: LineId },
    /// `LineProvider::write`
    Write { line: LineId, level: Level },
    /// `LineProvider::set_direction`
    SetDirection { line: LineId, direction: Direction },
    /// `LineProvider::release`
    Release { line: LineId, label: String },
    /// `NamespacePublisher::create_class` that succeeded
    CreateClass { path: String },
    /// `NamespacePublisher::create_node` that succeeded
    CreateNode { path: String },
    /// `NamespacePublisher::create_link` that succeeded
    CreateLink { alias: String },
    /// `NamespacePublisher::publish_line` that succeeded
    PublishLine { path: String },
    /// `NamespacePublisher::remove_node`
    RemoveNode { path: String },
    /// `NamespacePublisher::remove_link`
    RemoveLink { alias: String },
}

/// Cheaply cloneable, thread-safe call record.
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    calls: Arc<Mutex<Vec<Call>>>,
}

impl CallLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record(&self, call: Call) {
        self.calls.lock().push(call);
    }

    /// Snapshot of all calls so far.
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    /// Position of the first call equal to `call`.
    pub fn position(&self, call: &Call) -> Option<usize> {
        self.calls.lock().iter().position(|c| c == call)
    }

    /// Number of calls equal to `call`.
    pub fn count(&self, call: &Call) -> usize {
        self.calls.lock().iter().filter(|c| *c == call).count()
    }

    /// Labels of all released lines, in release order.
    pub fn released_labels(&self) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                Call::Release { label, .. } => Some(label.clone()),
                _ => None,
            })
            .collect()
    }

    /// Forget everything recorded so far.
    pub fn clear(&self) {
        self.calls.lock().clear();
    }
}
