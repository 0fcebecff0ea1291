//! Recording of performed transitions.
//!
//! When tracing is enabled on a machine, every performed transition is
//! appended to a [`TransitionTrace`]: a serializable record of the path the
//! machine took, in transition-count order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One performed transition.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransitionRecord {
    /// Name of the state transitioned from.
    pub from: String,
    /// Name of the state transitioned to.
    pub to: String,
    /// Name of the triggering event; `None` for epsilon transitions.
    pub trigger: Option<String>,
    /// The machine's transition count after this transition.
    pub count: u64,
    /// When the transition was performed.
    pub timestamp: DateTime<Utc>,
}

/// Ordered record of the transitions a machine has performed.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TransitionTrace {
    records: Vec<TransitionRecord>,
}

impl TransitionTrace {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, record: TransitionRecord) {
        self.records.push(record);
    }

    /// All recorded transitions, oldest first.
    pub fn records(&self) -> &[TransitionRecord] {
        &self.records
    }

    /// The sequence of state names traversed: the first record's origin,
    /// then each destination in order.
    pub fn path(&self) -> Vec<&str> {
        let mut path = Vec::with_capacity(self.records.len() + 1);
        if let Some(first) = self.records.first() {
            path.push(first.from.as_str());
        }
        for record in &self.records {
            path.push(record.to.as_str());
        }
        path
    }

    /// Wall-clock time from the first to the last recorded transition.
    pub fn duration(&self) -> Option<Duration> {
        match (self.records.first(), self.records.last()) {
            (Some(first), Some(last)) => last
                .timestamp
                .signed_duration_since(first.timestamp)
                .to_std()
                .ok(),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
