use std::collections::VecDeque;

use chrono::Local;

pub const DEFAULT_ACTIVITY_CAPACITY: usize = 8;

/// Local wall-clock time, `HH:MM:SS`.
pub fn clock_time() -> String {
    Local::now().format("%H:%M:%S").to_string()
}

/// Bounded operator log, most recent entry first.
///
/// Once full, every push silently drops the oldest entry.
#[derive(Clone, Debug)]
pub struct ActivityLog {
    capacity: usize,
    entries: VecDeque<String>,
}

impl Default for ActivityLog {
    fn default() -> Self {
        Self::new(DEFAULT_ACTIVITY_CAPACITY)
    }
}

impl ActivityLog {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
        }
    }

    /// Record `msg` with a `[HH:MM:SS]` prefix.
    pub fn push(&mut self, msg: &str) {
        self.entries.push_front(format!("[{}] {msg}", clock_time()));
        self.entries.truncate(self.capacity);
    }

    pub fn snapshot(&self) -> Vec<String> {
        self.entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
