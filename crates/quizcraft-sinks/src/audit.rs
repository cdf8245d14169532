//! In-process audit trail of quiz activity.
//!
//! An [`AuditLog`] is constructed by the caller and handed to whoever needs
//! it, typically as an analytics sink on a player. It keeps the most recent
//! entries in a bounded buffer and mirrors each one to `tracing`.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use quizcraft_core::traits::{AnalyticsEvent, AnalyticsSink, EventKind};

const DEFAULT_CAPACITY: usize = 1024;

/// One recorded action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub at: DateTime<Utc>,
    pub action: EventKind,
    pub quiz_id: String,
    pub learner_id: String,
    pub attempt: u32,
    #[serde(default)]
    pub detail: serde_json::Value,
}

impl From<&AnalyticsEvent> for AuditEntry {
    fn from(event: &AnalyticsEvent) -> Self {
        Self {
            at: event.occurred_at,
            action: event.kind,
            quiz_id: event.quiz_id.clone(),
            learner_id: event.learner_id.clone(),
            attempt: event.attempt,
            detail: event.payload.clone(),
        }
    }
}

/// Bounded, thread-safe audit trail. Oldest entries are evicted first.
#[derive(Debug)]
pub struct AuditLog {
    entries: Mutex<VecDeque<AuditEntry>>,
    capacity: usize,
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl AuditLog {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity.min(DEFAULT_CAPACITY))),
            capacity,
        }
    }

    pub fn record(&self, entry: AuditEntry) {
        tracing::info!(
            target: "quizcraft::audit",
            action = %entry.action,
            quiz = %entry.quiz_id,
            learner = %entry.learner_id,
            attempt = entry.attempt,
            "audit"
        );
        let mut entries = self.lock();
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    /// All retained entries, oldest first.
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.lock().iter().cloned().collect()
    }

    pub fn for_learner(&self, learner_id: &str) -> Vec<AuditEntry> {
        self.lock()
            .iter()
            .filter(|e| e.learner_id == learner_id)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<AuditEntry>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl AnalyticsSink for AuditLog {
    fn name(&self) -> &str {
        "audit"
    }

    async fn track(&self, event: &AnalyticsEvent) -> anyhow::Result<()> {
        self.record(AuditEntry::from(event));
        Ok(())
    }
}
