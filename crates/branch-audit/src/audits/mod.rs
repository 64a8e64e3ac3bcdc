//! Survey-based branch audits: templates, responses, scoring, lifecycle, and analytics.

pub mod analytics;
pub mod domain;
pub mod lifecycle;
pub mod repository;
pub mod router;
pub mod scoring;
pub mod service;
pub mod wizard;

#[cfg(test)]
mod tests;

pub use analytics::{AnalyticsReport, BranchRow, StatusCount};
pub use domain::{
    Audit, AuditId, AuditStatus, BranchId, BranchRef, PhotoRef, PhotoUpload, Question,
    QuestionId, QuestionKind, Section, SectionId, Survey, SurveyError, SurveyId, YesNo,
};
pub use lifecycle::{AuditAction, LifecycleError};
pub use repository::{
    AuditRepository, Notification, NotificationError, NotificationPublisher, Recipient,
    RepositoryError,
};
pub use router::{audit_router, ApiState};
pub use scoring::{
    score_audit, AuditScore, ComplianceScore, ScoreBasis, ScoreSummary, WeightedScore,
};
pub use service::{AuditService, AuditServiceError, NewAudit, ResponseUpdate};
pub use wizard::{SectionProgress, WizardProgress};
