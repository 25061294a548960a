//! Append-only record of mutation outcomes.
//!
//! Every trigger, whether denied, executed, or failed, lands here so an
//! operator can review what the automutator did and why. The log keeps the
//! most recent `capacity` entries in memory.

use crate::types::{MutationContext, MutationOutcome, MutationStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Mutex;
use tracing::info;

/// One recorded trigger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub source: String,
    pub procedure: String,
    pub status: MutationStatus,
    pub detail: String,
}

/// Bounded in-memory audit trail.
#[derive(Debug)]
pub struct MutationAudit {
    entries: Mutex<VecDeque<AuditEntry>>,
    capacity: usize,
}

impl MutationAudit {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity,
        }
    }

    /// Record an outcome for `context`.
    pub fn record(&self, context: &MutationContext, procedure: &str, outcome: &MutationOutcome) {
        let entry = AuditEntry {
            id: ulid::Ulid::new().to_string(),
            timestamp: Utc::now(),
            source: context.source.clone(),
            procedure: procedure.to_string(),
            status: outcome.status,
            detail: outcome.detail.clone(),
        };

        info!(
            audit_id = %entry.id,
            "Audit: {} from '{}' ({})",
            entry.status,
            entry.source,
            entry.detail
        );

        if self.capacity == 0 {
            return;
        }
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        while entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    /// Entries, oldest first.
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
