use branch_audit::audits::{
    Audit, AuditId, AuditRepository, BranchId, Notification, NotificationError,
    NotificationPublisher, RepositoryError, Survey, SurveyId,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryAuditRepository {
    surveys: Arc<Mutex<HashMap<SurveyId, Survey>>>,
    audits: Arc<Mutex<HashMap<AuditId, Audit>>>,
    issued: Arc<Mutex<u64>>,
}

impl AuditRepository for InMemoryAuditRepository {
    fn insert_survey(&self, survey: Survey) -> Result<Survey, RepositoryError> {
        let mut guard = self.surveys.lock().expect("repository mutex poisoned");
        if guard.contains_key(&survey.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(survey.id.clone(), survey.clone());
        Ok(survey)
    }

    fn fetch_survey(&self, id: &SurveyId) -> Result<Option<Survey>, RepositoryError> {
        let guard = self.surveys.lock().expect("repository mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn surveys(&self) -> Result<Vec<Survey>, RepositoryError> {
        let guard = self.surveys.lock().expect("repository mutex poisoned");
        Ok(guard.values().cloned().collect())
    }

    fn next_audit_id(&self) -> Result<AuditId, RepositoryError> {
        let mut issued = self.issued.lock().expect("repository mutex poisoned");
        *issued += 1;
        Ok(AuditId(format!("aud-{:06}", *issued)))
    }

    fn insert_audit(&self, audit: Audit) -> Result<Audit, RepositoryError> {
        let mut guard = self.audits.lock().expect("repository mutex poisoned");
        if guard.contains_key(&audit.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(audit.id.clone(), audit.clone());
        Ok(audit)
    }

    fn update_audit(&self, mut audit: Audit) -> Result<Audit, RepositoryError> {
        let mut guard = self.audits.lock().expect("repository mutex poisoned");
        let stored = guard.get(&audit.id).ok_or(RepositoryError::NotFound)?;
        if stored.revision != audit.revision {
            return Err(RepositoryError::Stale);
        }
        audit.revision += 1;
        guard.insert(audit.id.clone(), audit.clone());
        Ok(audit)
    }

    fn fetch_audit(&self, id: &AuditId) -> Result<Option<Audit>, RepositoryError> {
        let guard = self.audits.lock().expect("repository mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn audits(&self, branch: Option<&BranchId>) -> Result<Vec<Audit>, RepositoryError> {
        let guard = self.audits.lock().expect("repository mutex poisoned");
        let mut audits: Vec<Audit> = guard
            .values()
            .filter(|audit| branch.map_or(true, |id| &audit.branch.branch_id == id))
            .cloned()
            .collect();
        audits.sort_by(|left, right| left.created_at.cmp(&right.created_at));
        Ok(audits)
    }
}

/// Keeps delivered notifications in memory and logs each one.
#[derive(Default, Clone)]
pub(crate) struct LoggingNotificationPublisher {
    events: Arc<Mutex<Vec<Notification>>>,
}

impl NotificationPublisher for LoggingNotificationPublisher {
    fn publish(&self, notification: Notification) -> Result<(), NotificationError> {
        info!(
            template = %notification.template,
            audit_id = %notification.audit_id.0,
            recipient = ?notification.recipient,
            "notification queued"
        );
        let mut guard = self.events.lock().expect("notification mutex poisoned");
        guard.push(notification);
        Ok(())
    }
}

impl LoggingNotificationPublisher {
    pub(crate) fn events(&self) -> Vec<Notification> {
        self.events.lock().expect("notification mutex poisoned").clone()
    }
}
