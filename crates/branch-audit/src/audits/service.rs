use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::analytics::AnalyticsReport;
use super::domain::{
    Audit, AuditId, AuditStatus, BranchRef, PhotoError, PhotoRef, PhotoUpload, QuestionId,
    Responses, Survey, SurveyError, SurveyId,
};
use super::lifecycle::{may_edit, plan_transition, AuditAction, LifecycleError};
use super::repository::{
    AuditRepository, Notification, NotificationPublisher, Recipient, RepositoryError,
};
use super::scoring::{score_audit, ScoreSummary};
use super::wizard::{self, WizardProgress};
use crate::access::{Actor, Role, UserId};

/// Service composing the repository, lifecycle rules, scorer, and notifications.
pub struct AuditService<R, N> {
    repository: Arc<R>,
    notifications: Arc<N>,
}

/// Request to schedule an audit of a branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAudit {
    pub survey_id: SurveyId,
    pub branch: BranchRef,
    pub auditor: UserId,
}

/// Partial answer update. A `null` response or blank reason clears the stored value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseUpdate {
    #[serde(default)]
    pub responses: Responses,
    #[serde(default)]
    pub na_reasons: BTreeMap<QuestionId, String>,
}

impl<R, N> AuditService<R, N>
where
    R: AuditRepository + 'static,
    N: NotificationPublisher + 'static,
{
    pub fn new(repository: Arc<R>, notifications: Arc<N>) -> Self {
        Self {
            repository,
            notifications,
        }
    }

    pub fn create_survey(
        &self,
        actor: &Actor,
        survey: Survey,
    ) -> Result<Survey, AuditServiceError> {
        if !actor.role.can_manage_templates() {
            return Err(AuditServiceError::Forbidden("manage survey templates"));
        }
        survey.validate()?;
        let stored = self.repository.insert_survey(survey)?;
        info!(survey_id = %stored.id.0, "survey template stored");
        Ok(stored)
    }

    pub fn survey(&self, id: &SurveyId) -> Result<Survey, AuditServiceError> {
        self.repository
            .fetch_survey(id)?
            .ok_or_else(|| AuditServiceError::UnknownSurvey(id.clone()))
    }

    pub fn create_audit(
        &self,
        actor: &Actor,
        request: NewAudit,
        now: DateTime<Utc>,
    ) -> Result<Audit, AuditServiceError> {
        if !actor.role.can_schedule_audits() || !actor.covers_branch(&request.branch.branch_id) {
            return Err(AuditServiceError::Forbidden("schedule audits for this branch"));
        }
        self.survey(&request.survey_id)?;

        let audit = Audit {
            id: self.repository.next_audit_id()?,
            survey_id: request.survey_id,
            branch: request.branch,
            auditor: request.auditor,
            status: AuditStatus::Draft,
            responses: Responses::new(),
            na_reasons: BTreeMap::new(),
            photos: Vec::new(),
            rejection_reason: None,
            created_at: now,
            updated_at: now,
            revision: 0,
        };

        let stored = self.repository.insert_audit(audit)?;
        info!(audit_id = %stored.id.0, auditor = %stored.auditor.0, "audit scheduled");
        Ok(stored)
    }

    /// Fetches an audit the actor is allowed to see.
    pub fn audit(&self, actor: &Actor, id: &AuditId) -> Result<Audit, AuditServiceError> {
        let audit = self
            .repository
            .fetch_audit(id)?
            .ok_or(RepositoryError::NotFound)?;

        let visible = match actor.role {
            Role::Auditor => audit.auditor == actor.user_id,
            Role::BranchManager | Role::Admin | Role::SuperAdmin => {
                actor.covers_branch(&audit.branch.branch_id)
            }
        };
        if visible {
            Ok(audit)
        } else {
            Err(AuditServiceError::Forbidden("view this audit"))
        }
    }

    pub fn record_responses(
        &self,
        actor: &Actor,
        id: &AuditId,
        update: ResponseUpdate,
        now: DateTime<Utc>,
    ) -> Result<Audit, AuditServiceError> {
        let mut audit = self.editable_audit(actor, id)?;
        let survey = self.survey(&audit.survey_id)?;

        for question_id in update.responses.keys().chain(update.na_reasons.keys()) {
            if survey.question(question_id).is_none() {
                return Err(AuditServiceError::UnknownQuestion(question_id.clone()));
            }
        }

        for (question_id, value) in update.responses {
            if value.is_null() {
                audit.responses.remove(&question_id);
            } else {
                audit.responses.insert(question_id, value);
            }
        }
        for (question_id, reason) in update.na_reasons {
            if reason.trim().is_empty() {
                audit.na_reasons.remove(&question_id);
            } else {
                audit.na_reasons.insert(question_id, reason);
            }
        }

        if audit.status == AuditStatus::Draft {
            audit.status = AuditStatus::InProgress;
        }
        audit.updated_at = now;
        Ok(self.repository.update_audit(audit)?)
    }

    pub fn attach_photo(
        &self,
        actor: &Actor,
        upload: PhotoUpload,
        now: DateTime<Utc>,
    ) -> Result<PhotoRef, AuditServiceError> {
        upload.check()?;
        let mut audit = self.editable_audit(actor, &upload.audit_id)?;
        let survey = self.survey(&audit.survey_id)?;
        if survey.question(&upload.question_id).is_none() {
            return Err(AuditServiceError::UnknownQuestion(upload.question_id));
        }

        let photo = PhotoRef {
            question_id: upload.question_id,
            file_name: upload.file_name,
            content_type: upload.content_type,
            size_bytes: upload.data.len(),
            uploaded_at: now,
        };
        audit.photos.retain(|existing| {
            existing.question_id != photo.question_id || existing.file_name != photo.file_name
        });
        audit.photos.push(photo.clone());
        audit.updated_at = now;
        self.repository.update_audit(audit)?;
        Ok(photo)
    }

    pub fn transition(
        &self,
        actor: &Actor,
        id: &AuditId,
        action: AuditAction,
        now: DateTime<Utc>,
    ) -> Result<Audit, AuditServiceError> {
        let mut audit = self.audit(actor, id)?;
        let next = plan_transition(&audit, &action, actor)?;

        if matches!(action, AuditAction::Complete | AuditAction::Submit) {
            let survey = self.survey(&audit.survey_id)?;
            let progress = wizard::evaluate(&survey, &audit);
            if !progress.complete {
                let incomplete = progress
                    .sections
                    .into_iter()
                    .filter(|section| !section.is_complete())
                    .map(|section| section.section_id)
                    .collect();
                return Err(LifecycleError::Incomplete(incomplete).into());
            }
        }

        let previous = audit.status;
        audit.status = next;
        audit.updated_at = now;
        match &action {
            AuditAction::Reject { reason } => {
                audit.rejection_reason = Some(reason.trim().to_string());
            }
            AuditAction::Reopen => audit.rejection_reason = None,
            _ => {}
        }
        let audit = self.repository.update_audit(audit)?;
        info!(
            audit_id = %audit.id.0,
            from = previous.label(),
            to = next.label(),
            actor = %actor.user_id.0,
            "audit transitioned"
        );

        self.notify(&audit, &action, actor);
        Ok(audit)
    }

    /// Recomputes the score from the stored responses.
    pub fn score(&self, actor: &Actor, id: &AuditId) -> Result<ScoreSummary, AuditServiceError> {
        let audit = self.audit(actor, id)?;
        let survey = self.survey(&audit.survey_id)?;
        Ok(ScoreSummary::headline(score_audit(&survey, &audit.responses)))
    }

    pub fn progress(
        &self,
        actor: &Actor,
        id: &AuditId,
    ) -> Result<WizardProgress, AuditServiceError> {
        let audit = self.audit(actor, id)?;
        let survey = self.survey(&audit.survey_id)?;
        Ok(wizard::evaluate(&survey, &audit))
    }

    /// Aggregates over the audits within the actor's scope.
    pub fn analytics(&self, actor: &Actor) -> Result<AnalyticsReport, AuditServiceError> {
        let audits = match actor.role {
            Role::Admin | Role::SuperAdmin => self.repository.audits(None)?,
            Role::BranchManager => match &actor.branch_id {
                Some(branch) => self.repository.audits(Some(branch))?,
                None => Vec::new(),
            },
            Role::Auditor => self
                .repository
                .audits(None)?
                .into_iter()
                .filter(|audit| audit.auditor == actor.user_id)
                .collect(),
        };

        let surveys = self
            .repository
            .surveys()?
            .into_iter()
            .map(|survey| (survey.id.clone(), survey))
            .collect();

        Ok(AnalyticsReport::build(&audits, &surveys))
    }

    fn editable_audit(&self, actor: &Actor, id: &AuditId) -> Result<Audit, AuditServiceError> {
        let audit = self.audit(actor, id)?;
        if !may_edit(&audit, actor) {
            return Err(AuditServiceError::Forbidden("edit this audit"));
        }
        if !audit.status.accepts_responses() {
            return Err(AuditServiceError::Locked(audit.status));
        }
        Ok(audit)
    }

    fn notify(&self, audit: &Audit, action: &AuditAction, actor: &Actor) {
        let (template, recipient) = match action {
            AuditAction::Submit => (
                "audit_submitted",
                Recipient::BranchManagers(audit.branch.branch_id.clone()),
            ),
            AuditAction::Approve => ("audit_approved", Recipient::User(audit.auditor.clone())),
            AuditAction::Reject { .. } => {
                ("audit_rejected", Recipient::User(audit.auditor.clone()))
            }
            AuditAction::Start | AuditAction::Complete | AuditAction::Reopen => return,
        };

        let mut details = BTreeMap::new();
        details.insert("status".to_string(), audit.status.label().to_string());
        details.insert("actor".to_string(), actor.user_id.0.clone());
        if let Some(reason) = &audit.rejection_reason {
            details.insert("reason".to_string(), reason.clone());
        }

        let notification = Notification {
            template: template.to_string(),
            recipient,
            audit_id: audit.id.clone(),
            details,
        };
        // The transition is already stored; a lost notification must not undo it.
        if let Err(err) = self.notifications.publish(notification) {
            warn!(audit_id = %audit.id.0, template, error = %err, "notification not delivered");
        }
    }
}

/// Error raised by the audit service.
#[derive(Debug, thiserror::Error)]
pub enum AuditServiceError {
    #[error(transparent)]
    Survey(#[from] SurveyError),
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Photo(#[from] PhotoError),
    #[error("not permitted to {0}")]
    Forbidden(&'static str),
    #[error("survey {0:?} does not exist")]
    UnknownSurvey(SurveyId),
    #[error("question {0:?} is not part of this audit's survey")]
    UnknownQuestion(QuestionId),
    #[error("audit is {0:?} and no longer accepts changes")]
    Locked(AuditStatus),
}
