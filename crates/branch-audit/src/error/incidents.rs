use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::taxonomy::{ClassifiedError, ErrorCategory, Severity};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Incident {
    pub at: DateTime<Utc>,
    pub context: String,
    pub category: ErrorCategory,
    pub severity: Severity,
    pub message: &'static str,
    pub detail: String,
}

/// Bounded log of recent classified errors, newest first.
#[derive(Debug)]
pub struct IncidentLog {
    capacity: usize,
    entries: Mutex<VecDeque<Incident>>,
}

impl IncidentLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: Mutex::new(VecDeque::new()),
        }
    }

    pub fn record(&self, context: impl Into<String>, error: &ClassifiedError, at: DateTime<Utc>) {
        let incident = Incident {
            at,
            context: context.into(),
            category: error.category,
            severity: error.severity,
            message: error.message,
            detail: error.detail.clone(),
        };
        let mut guard = self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.push_front(incident);
        guard.truncate(self.capacity);
    }

    pub fn recent(&self) -> Vec<Incident> {
        let guard = self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.iter().cloned().collect()
    }

    pub fn clear(&self) {
        let mut guard = self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.clear();
    }
}

impl Default for IncidentLog {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_INCIDENT_LOG_CAPACITY)
    }
}
