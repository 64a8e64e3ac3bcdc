use chrono::{DateTime, Utc};

use super::queue::SyncPayload;
use super::SyncError;
use crate::access::{Actor, SessionContext};
use crate::audits::repository::{AuditRepository, NotificationPublisher, RepositoryError};
use crate::audits::service::{AuditService, AuditServiceError, ResponseUpdate};

/// Destination the queue drains into.
pub trait RemoteWriter {
    fn write(&self, payload: &SyncPayload) -> Result<(), SyncError>;
}

/// Applies one queued write through the audit service.
pub fn apply_payload<R, N>(
    service: &AuditService<R, N>,
    actor: &Actor,
    payload: SyncPayload,
    now: DateTime<Utc>,
) -> Result<(), AuditServiceError>
where
    R: AuditRepository + 'static,
    N: NotificationPublisher + 'static,
{
    match payload {
        SyncPayload::AuditResponses {
            audit_id,
            responses,
            na_reasons,
        } => {
            let update = ResponseUpdate {
                responses,
                na_reasons,
            };
            service.record_responses(actor, &audit_id, update, now)?;
        }
        SyncPayload::PhotoUpload(upload) => {
            service.attach_photo(actor, upload, now)?;
        }
    }
    Ok(())
}

/// Writes queued changes straight into an [`AuditService`] for the signed-in user.
pub struct ServiceWriter<'a, R, N> {
    service: &'a AuditService<R, N>,
    session: &'a SessionContext,
    now: DateTime<Utc>,
}

impl<'a, R, N> ServiceWriter<'a, R, N> {
    pub fn new(
        service: &'a AuditService<R, N>,
        session: &'a SessionContext,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            service,
            session,
            now,
        }
    }
}

impl<R, N> RemoteWriter for ServiceWriter<'_, R, N>
where
    R: AuditRepository + 'static,
    N: NotificationPublisher + 'static,
{
    fn write(&self, payload: &SyncPayload) -> Result<(), SyncError> {
        let actor = self.session.require_active(self.now)?;
        apply_payload(self.service, actor, payload.clone(), self.now).map_err(|err| match err {
            AuditServiceError::Repository(
                RepositoryError::Unavailable(_) | RepositoryError::Stale,
            ) => SyncError::Remote(err.to_string()),
            other => SyncError::Rejected(other.to_string()),
        })
    }
}
