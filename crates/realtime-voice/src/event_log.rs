use chrono::{DateTime, Utc};
use std::collections::VecDeque;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventLogEntry {
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

/// Append-only, bounded history of what the session did. Oldest entries fall off first.
#[derive(Debug)]
pub(crate) struct EventLog {
    entries: VecDeque<EventLogEntry>,
    capacity: usize,
}

impl EventLog {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.min(64)),
            capacity: capacity.max(1),
        }
    }

    pub(crate) fn push(&mut self, message: impl Into<String>) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(EventLogEntry {
            timestamp: Utc::now(),
            message: message.into(),
        });
    }

    pub(crate) fn entries(&self) -> Vec<EventLogEntry> {
        self.entries.iter().cloned().collect()
    }
}
