use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::remote::RemoteWriter;
use super::store::QueueStore;
use super::SyncError;
use crate::audits::domain::{AuditId, PhotoUpload, QuestionId, Responses};
use crate::config::SyncConfig;

/// Write waiting for connectivity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SyncPayload {
    AuditResponses {
        audit_id: AuditId,
        #[serde(default)]
        responses: Responses,
        #[serde(default)]
        na_reasons: BTreeMap<QuestionId, String>,
    },
    PhotoUpload(PhotoUpload),
}

impl SyncPayload {
    pub fn audit_id(&self) -> &AuditId {
        match self {
            Self::AuditResponses { audit_id, .. } => audit_id,
            Self::PhotoUpload(upload) => &upload.audit_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueEntry {
    pub sequence: u64,
    pub priority: u8,
    pub created_at: DateTime<Utc>,
    pub payload: SyncPayload,
    #[serde(default)]
    pub attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_attempt_at: Option<DateTime<Utc>>,
}

impl QueueEntry {
    fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.next_attempt_at.map_or(true, |at| at <= now)
    }
}

/// Everything the store persists.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueueState {
    #[serde(default)]
    pub next_sequence: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub entries: Vec<QueueEntry>,
    #[serde(default)]
    pub dead_letters: Vec<QueueEntry>,
}

impl QueueState {
    /// Highest priority first, then oldest first.
    fn ordered(&self) -> Vec<&QueueEntry> {
        let mut entries: Vec<&QueueEntry> = self.entries.iter().collect();
        entries.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then(a.created_at.cmp(&b.created_at))
                .then(a.sequence.cmp(&b.sequence))
        });
        entries
    }

    fn position(&self, sequence: u64) -> Option<usize> {
        self.entries
            .iter()
            .position(|entry| entry.sequence == sequence)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DrainStatus {
    Completed,
    AlreadyRunning,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DrainReport {
    pub status: DrainStatus,
    pub synced: Vec<u64>,
    pub retrying: Vec<u64>,
    pub evicted: Vec<u64>,
    pub deferred: usize,
}

impl DrainReport {
    fn new(status: DrainStatus) -> Self {
        Self {
            status,
            synced: Vec::new(),
            retrying: Vec::new(),
            evicted: Vec::new(),
            deferred: 0,
        }
    }
}

pub struct SyncQueue<S> {
    store: S,
    config: SyncConfig,
    state: Mutex<QueueState>,
    draining: AtomicBool,
}

struct DrainGuard<'a>(&'a AtomicBool);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl<S: QueueStore> SyncQueue<S> {
    pub fn open(store: S, config: SyncConfig) -> Result<Self, SyncError> {
        let state = store.load()?;
        debug!(pending = state.entries.len(), "sync queue opened");
        Ok(Self {
            store,
            config,
            state: Mutex::new(state),
            draining: AtomicBool::new(false),
        })
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stores a write. Creation timestamps never run backwards even if the clock does.
    pub fn enqueue(
        &self,
        payload: SyncPayload,
        priority: u8,
        now: DateTime<Utc>,
    ) -> Result<QueueEntry, SyncError> {
        let mut state = self.lock();
        let created_at = state.last_created_at.map_or(now, |last| last.max(now));
        let entry = QueueEntry {
            sequence: state.next_sequence,
            priority,
            created_at,
            payload,
            attempts: 0,
            last_error: None,
            next_attempt_at: None,
        };

        let mut next = state.clone();
        next.next_sequence += 1;
        next.last_created_at = Some(created_at);
        next.entries.push(entry.clone());
        self.store.save(&next)?;
        *state = next;

        debug!(sequence = entry.sequence, priority, "queued offline write");
        Ok(entry)
    }

    /// Pending entries in drain order.
    pub fn pending(&self) -> Vec<QueueEntry> {
        self.lock().ordered().into_iter().cloned().collect()
    }

    pub fn dead_letters(&self) -> Vec<QueueEntry> {
        self.lock().dead_letters.clone()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    /// Puts a dead-lettered entry back in the queue with a fresh attempt budget.
    pub fn requeue_dead_letter(&self, sequence: u64) -> Result<bool, SyncError> {
        let mut state = self.lock();
        let Some(index) = state
            .dead_letters
            .iter()
            .position(|entry| entry.sequence == sequence)
        else {
            return Ok(false);
        };

        let mut next = state.clone();
        let mut entry = next.dead_letters.remove(index);
        entry.attempts = 0;
        entry.next_attempt_at = None;
        next.entries.push(entry);
        self.store.save(&next)?;
        *state = next;
        Ok(true)
    }

    /// Sends due entries in priority order, removing each only after the remote accepts it.
    ///
    /// Failed entries back off exponentially and move to the dead-letter list once they
    /// reach the attempt limit. An expired session stops the drain without spending attempts.
    pub fn drain<W: RemoteWriter>(
        &self,
        writer: &W,
        now: DateTime<Utc>,
    ) -> Result<DrainReport, SyncError> {
        if self
            .draining
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Ok(DrainReport::new(DrainStatus::AlreadyRunning));
        }
        let _guard = DrainGuard(&self.draining);

        let mut report = DrainReport::new(DrainStatus::Completed);
        let due: Vec<QueueEntry> = {
            let state = self.lock();
            let ordered = state.ordered();
            report.deferred = ordered.iter().filter(|entry| !entry.is_due(now)).count();
            ordered
                .into_iter()
                .filter(|entry| entry.is_due(now))
                .cloned()
                .collect()
        };

        for entry in due {
            let outcome = match writer.write(&entry.payload) {
                Err(SyncError::Session(err)) => {
                    warn!(error = %err, "sync drain stopped: session unavailable");
                    return Err(SyncError::Session(err));
                }
                other => other,
            };

            let mut state = self.lock();
            let Some(index) = state.position(entry.sequence) else {
                continue;
            };
            let mut next = state.clone();

            match outcome {
                Ok(()) => {
                    next.entries.remove(index);
                    report.synced.push(entry.sequence);
                }
                Err(err) => {
                    let permanent = matches!(err, SyncError::Rejected(_));
                    let failed = &mut next.entries[index];
                    failed.attempts += 1;
                    failed.last_error = Some(err.to_string());

                    if permanent || failed.attempts >= self.config.max_attempts {
                        let evicted = next.entries.remove(index);
                        warn!(
                            sequence = evicted.sequence,
                            attempts = evicted.attempts,
                            error = %err,
                            "sync entry moved to dead letters"
                        );
                        next.dead_letters.push(evicted);
                        report.evicted.push(entry.sequence);
                    } else {
                        let delay = self.config.backoff_after(failed.attempts);
                        let retry_at = now
                            .checked_add_signed(delay)
                            .unwrap_or(DateTime::<Utc>::MAX_UTC);
                        failed.next_attempt_at = Some(retry_at);
                        report.retrying.push(entry.sequence);
                    }
                }
            }

            self.store.save(&next)?;
            *state = next;
        }

        info!(
            synced = report.synced.len(),
            retrying = report.retrying.len(),
            evicted = report.evicted.len(),
            deferred = report.deferred,
            "sync drain finished"
        );
        Ok(report)
    }
}
