//! Maps concrete failures onto the categories, severities and messages users see.

use axum::http::StatusCode;
use serde::Serialize;

use crate::access::SessionError;
use crate::audits::lifecycle::LifecycleError;
use crate::audits::repository::RepositoryError;
use crate::audits::service::AuditServiceError;
use crate::sync::SyncError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Authentication,
    Network,
    Data,
    Upload,
    Application,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Error,
    Critical,
}

/// What the user is offered alongside the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryAction {
    TryAgain,
    ContactAdmin,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassifiedError {
    pub category: ErrorCategory,
    pub severity: Severity,
    pub message: &'static str,
    pub detail: String,
    pub recoverable: bool,
    pub action: RecoveryAction,
}

impl ClassifiedError {
    pub fn new(
        category: ErrorCategory,
        severity: Severity,
        message: &'static str,
        recoverable: bool,
        detail: impl ToString,
    ) -> Self {
        Self {
            category,
            severity,
            message,
            detail: detail.to_string(),
            recoverable,
            action: if recoverable {
                RecoveryAction::TryAgain
            } else {
                RecoveryAction::ContactAdmin
            },
        }
    }
}

pub trait Classify {
    fn classify(&self) -> ClassifiedError;
}

impl Classify for SessionError {
    fn classify(&self) -> ClassifiedError {
        match self {
            SessionError::Expired(_) => ClassifiedError::new(
                ErrorCategory::Authentication,
                Severity::Warning,
                "Your session has expired. Please sign in again.",
                true,
                self,
            ),
            SessionError::MissingIdentity
            | SessionError::UnknownRole(_)
            | SessionError::MissingBranch => ClassifiedError::new(
                ErrorCategory::Authentication,
                Severity::Error,
                "We could not verify your account. Contact your administrator.",
                false,
                self,
            ),
        }
    }
}

impl Classify for RepositoryError {
    fn classify(&self) -> ClassifiedError {
        match self {
            RepositoryError::Unavailable(_) => ClassifiedError::new(
                ErrorCategory::Network,
                Severity::Error,
                "The server could not be reached. Check your connection and try again.",
                true,
                self,
            ),
            RepositoryError::NotFound => ClassifiedError::new(
                ErrorCategory::Data,
                Severity::Warning,
                "The requested record could not be found.",
                false,
                self,
            ),
            RepositoryError::Conflict => ClassifiedError::new(
                ErrorCategory::Data,
                Severity::Warning,
                "This record already exists.",
                true,
                self,
            ),
            RepositoryError::Stale => ClassifiedError::new(
                ErrorCategory::Data,
                Severity::Warning,
                "Someone else changed this audit. Refresh and try again.",
                true,
                self,
            ),
        }
    }
}

impl Classify for AuditServiceError {
    fn classify(&self) -> ClassifiedError {
        match self {
            AuditServiceError::Repository(err) => err.classify(),
            AuditServiceError::Photo(_) => ClassifiedError::new(
                ErrorCategory::Upload,
                Severity::Warning,
                "The photo could not be uploaded. Choose an image file and try again.",
                true,
                self,
            ),
            AuditServiceError::Forbidden(_)
            | AuditServiceError::Lifecycle(LifecycleError::Forbidden { .. }) => {
                ClassifiedError::new(
                    ErrorCategory::Authentication,
                    Severity::Warning,
                    "You do not have permission for this action. Contact your administrator.",
                    false,
                    self,
                )
            }
            AuditServiceError::Lifecycle(LifecycleError::Incomplete(_))
            | AuditServiceError::Lifecycle(LifecycleError::MissingReason) => {
                ClassifiedError::new(
                    ErrorCategory::Data,
                    Severity::Info,
                    "Some required information is missing. Review the audit and try again.",
                    true,
                    self,
                )
            }
            AuditServiceError::Lifecycle(LifecycleError::InvalidTransition { .. })
            | AuditServiceError::Locked(_) => ClassifiedError::new(
                ErrorCategory::Data,
                Severity::Warning,
                "This audit has changed status. Refresh and try again.",
                true,
                self,
            ),
            AuditServiceError::Survey(_)
            | AuditServiceError::UnknownSurvey(_)
            | AuditServiceError::UnknownQuestion(_) => ClassifiedError::new(
                ErrorCategory::Data,
                Severity::Warning,
                "The submitted data is not valid for this survey.",
                true,
                self,
            ),
        }
    }
}

impl Classify for SyncError {
    fn classify(&self) -> ClassifiedError {
        match self {
            SyncError::Session(err) => err.classify(),
            SyncError::Remote(message) => ClassifiedError::new(
                ErrorCategory::Network,
                Severity::Warning,
                "Changes are saved on this device and will sync when you are back online.",
                true,
                message,
            ),
            SyncError::Rejected(message) => ClassifiedError::new(
                ErrorCategory::Data,
                Severity::Error,
                "Some offline changes were rejected by the server. Contact your administrator.",
                false,
                message,
            ),
            SyncError::Store(_) | SyncError::Encoding(_) => ClassifiedError::new(
                ErrorCategory::Application,
                Severity::Critical,
                "Offline changes could not be saved on this device. Contact your administrator.",
                false,
                self,
            ),
        }
    }
}

pub fn http_status(err: &AuditServiceError) -> StatusCode {
    match err {
        AuditServiceError::Repository(RepositoryError::NotFound)
        | AuditServiceError::UnknownSurvey(_) => StatusCode::NOT_FOUND,
        AuditServiceError::Repository(RepositoryError::Conflict)
        | AuditServiceError::Repository(RepositoryError::Stale)
        | AuditServiceError::Lifecycle(LifecycleError::InvalidTransition { .. })
        | AuditServiceError::Locked(_) => StatusCode::CONFLICT,
        AuditServiceError::Repository(RepositoryError::Unavailable(_)) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        AuditServiceError::Forbidden(_)
        | AuditServiceError::Lifecycle(LifecycleError::Forbidden { .. }) => StatusCode::FORBIDDEN,
        AuditServiceError::Survey(_)
        | AuditServiceError::UnknownQuestion(_)
        | AuditServiceError::Photo(_)
        | AuditServiceError::Lifecycle(_) => StatusCode::UNPROCESSABLE_ENTITY,
    }
}
