//! Activity log sinks: one forwarding to `tracing`, one keeping a bounded
//! in-memory ring for inspection.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use chrono::Local;
use serde::Serialize;
use tracing::{info, warn};

use crate::ports::log_sink::{LogSink, CATEGORY_ERROR};

/// Entries kept by [`MemoryLogSink`] by default
pub const DEFAULT_LOG_CAPACITY: usize = 100;

/// Emits activity lines as tracing events
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogSink;

impl LogSink for TracingLogSink {
    fn log(&self, category: &str, message: &str) {
        if category == CATEGORY_ERROR {
            warn!(category, "{}", message);
        } else {
            info!(category, "{}", message);
        }
    }
}

/// One activity line
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogEntry {
    /// Local wall time, `HH:MM:SS`
    pub time: String,
    pub category: String,
    pub message: String,
}

/// Ring buffer of the most recent activity lines
#[derive(Debug)]
pub struct MemoryLogSink {
    entries: Mutex<VecDeque<LogEntry>>,
    capacity: usize,
}

impl Default for MemoryLogSink {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_CAPACITY)
    }
}

impl MemoryLogSink {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity: capacity.max(1),
        }
    }

    /// Oldest first
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    /// Entries of one category, oldest first
    pub fn category(&self, category: &str) -> Vec<String> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|e| e.category == category)
            .map(|e| e.message.clone())
            .collect()
    }

    /// Whether any message contains `needle`
    pub fn contains(&self, needle: &str) -> bool {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|e| e.message.contains(needle))
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

impl LogSink for MemoryLogSink {
    fn log(&self, category: &str, message: &str) {
        let entry = LogEntry {
            time: Local::now().format("%H:%M:%S").to_string(),
            category: category.to_string(),
            message: message.to_string(),
        };
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        while entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }
}
