//! Bounded log of committed transitions.
//!
//! Every time the root commits a new current state it records where the
//! machine came from, where it went, and on which tick. The log keeps the
//! most recent entries only.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;

/// Record of a single committed transition.
///
/// # Example
///
/// ```rust
/// use canopy::TransitionRecord;
/// use chrono::Utc;
///
/// let record = TransitionRecord {
///     from: "Agent".to_string(),
///     to: "Agent/Patrol".to_string(),
///     tick: 1,
///     sequence: 1,
///     timestamp: Utc::now(),
/// };
/// assert_eq!(record.to, "Agent/Patrol");
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransitionRecord {
    /// Path of the previous current state
    pub from: String,
    /// Path of the new current state
    pub to: String,
    /// Tick the transition happened on
    pub tick: u64,
    /// Position of the transition within its tick, starting at 1
    pub sequence: u32,
    /// Wall-clock time of the transition
    pub timestamp: DateTime<Utc>,
}

/// Most recent transitions, oldest first.
///
/// A capacity of zero disables recording.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TransitionHistory {
    records: VecDeque<TransitionRecord>,
    capacity: usize,
}

impl TransitionHistory {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: VecDeque::with_capacity(capacity.min(256)),
            capacity,
        }
    }

    /// Append a record, evicting the oldest one when full.
    pub fn record(&mut self, record: TransitionRecord) {
        if self.capacity == 0 {
            return;
        }
        if self.records.len() == self.capacity {
            self.records.pop_front();
        }
        self.records.push_back(record);
    }

    pub fn records(&self) -> impl Iterator<Item = &TransitionRecord> {
        self.records.iter()
    }

    pub fn last(&self) -> Option<&TransitionRecord> {
        self.records.back()
    }

    /// Paths visited: the `from` of the oldest record, then every `to`.
    pub fn get_path(&self) -> Vec<&str> {
        let mut path = Vec::with_capacity(self.records.len() + 1);
        if let Some(first) = self.records.front() {
            path.push(first.from.as_str());
        }
        path.extend(self.records.iter().map(|r| r.to.as_str()));
        path
    }

    /// Wall-clock time between the oldest and newest record.
    pub fn duration(&self) -> Option<Duration> {
        let (first, last) = (self.records.front()?, self.records.back()?);
        last.timestamp
            .signed_duration_since(first.timestamp)
            .to_std()
            .ok()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}
