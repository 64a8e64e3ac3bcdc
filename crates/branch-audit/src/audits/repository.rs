use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::domain::{Audit, AuditId, BranchId, Survey, SurveyId};
use crate::access::UserId;

/// Data-access facade over the hosted backend's survey and audit tables.
pub trait AuditRepository: Send + Sync {
    fn insert_survey(&self, survey: Survey) -> Result<Survey, RepositoryError>;
    fn fetch_survey(&self, id: &SurveyId) -> Result<Option<Survey>, RepositoryError>;
    fn surveys(&self) -> Result<Vec<Survey>, RepositoryError>;
    /// Issues an identifier no stored audit uses.
    fn next_audit_id(&self) -> Result<AuditId, RepositoryError>;
    fn insert_audit(&self, audit: Audit) -> Result<Audit, RepositoryError>;
    /// Stores `audit` only if the stored copy still has `audit.revision`, and returns it
    /// with the revision bumped. A mismatch fails with [`RepositoryError::Stale`].
    fn update_audit(&self, audit: Audit) -> Result<Audit, RepositoryError>;
    fn fetch_audit(&self, id: &AuditId) -> Result<Option<Audit>, RepositoryError>;
    /// All audits, or only those of one branch.
    fn audits(&self, branch: Option<&BranchId>) -> Result<Vec<Audit>, RepositoryError>;
}

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("record was changed by another writer")]
    Stale,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Outbound notification hook (the backend's notifications table, e-mail, push).
pub trait NotificationPublisher: Send + Sync {
    fn publish(&self, notification: Notification) -> Result<(), NotificationError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recipient {
    User(UserId),
    BranchManagers(BranchId),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub template: String,
    pub recipient: Recipient,
    pub audit_id: AuditId,
    pub details: BTreeMap<String, String>,
}

#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
}
