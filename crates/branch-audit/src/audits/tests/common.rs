use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::{json, Value};

use crate::access::{Actor, Role, UserId};
use crate::audits::domain::{
    Audit, AuditId, AuditStatus, BranchId, BranchRef, Question, QuestionId, QuestionKind,
    Responses, Section, SectionId, Survey, SurveyId,
};
use crate::audits::repository::{
    AuditRepository, Notification, NotificationError, NotificationPublisher, RepositoryError,
};
use crate::audits::router::{audit_router, ApiState};
use crate::audits::service::{AuditService, NewAudit};
use crate::error::IncidentLog;

pub(super) const BRANCH: &str = "br-downtown";
pub(super) const AUDITOR: &str = "u-auditor";

pub(super) fn at(hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 2, hour, 0, 0)
        .single()
        .expect("valid timestamp")
}

pub(super) fn qid(id: &str) -> QuestionId {
    QuestionId(id.to_string())
}

pub(super) fn yes_no(id: &str, yes_weight: u32, no_weight: u32) -> Question {
    Question {
        id: qid(id),
        text: format!("Is {id} in order?"),
        kind: QuestionKind::YesNo,
        required: true,
        yes_weight,
        no_weight,
        options: Vec::new(),
    }
}

/// Q1 awards 10 for yes, Q2 awards 5 for no, Q3 is unweighted.
pub(super) fn weighted_survey() -> Survey {
    Survey {
        id: SurveyId("sv-safety".to_string()),
        title: "Branch safety walk".to_string(),
        sections: vec![
            Section {
                id: SectionId("exits".to_string()),
                title: "Exits".to_string(),
                questions: vec![yes_no("q1", 10, 0), yes_no("q2", 0, 5)],
            },
            Section {
                id: SectionId("signage".to_string()),
                title: "Signage".to_string(),
                questions: vec![yes_no("q3", 0, 0)],
            },
        ],
    }
}

/// Mixed question kinds for wizard validation.
pub(super) fn mixed_survey() -> Survey {
    Survey {
        id: SurveyId("sv-mixed".to_string()),
        title: "Store condition".to_string(),
        sections: vec![Section {
            id: SectionId("floor".to_string()),
            title: "Sales floor".to_string(),
            questions: vec![
                yes_no("clean", 0, 0),
                Question {
                    id: qid("staff"),
                    text: "Staff on shift".to_string(),
                    kind: QuestionKind::Number,
                    required: true,
                    yes_weight: 0,
                    no_weight: 0,
                    options: Vec::new(),
                },
                Question {
                    id: qid("lighting"),
                    text: "Lighting".to_string(),
                    kind: QuestionKind::MultipleChoice,
                    required: false,
                    yes_weight: 0,
                    no_weight: 0,
                    options: vec!["good".to_string(), "poor".to_string()],
                },
                Question {
                    id: qid("inspected_on"),
                    text: "Last fire inspection".to_string(),
                    kind: QuestionKind::Date,
                    required: false,
                    yes_weight: 0,
                    no_weight: 0,
                    options: Vec::new(),
                },
            ],
        }],
    }
}

pub(super) fn responses(pairs: &[(&str, Value)]) -> Responses {
    pairs
        .iter()
        .map(|(id, value)| (qid(id), value.clone()))
        .collect()
}

pub(super) fn all_answered() -> Responses {
    responses(&[("q1", json!("yes")), ("q2", json!("no")), ("q3", json!("yes"))])
}

pub(super) fn branch_ref() -> BranchRef {
    BranchRef {
        branch_id: BranchId(BRANCH.to_string()),
        zone_id: Some("zone-north".to_string()),
        organization_id: Some("org-acme".to_string()),
    }
}

pub(super) fn audit_with(status: AuditStatus, responses: Responses) -> Audit {
    Audit {
        id: AuditId("aud-test".to_string()),
        survey_id: weighted_survey().id,
        branch: branch_ref(),
        auditor: UserId(AUDITOR.to_string()),
        status,
        responses,
        na_reasons: BTreeMap::new(),
        photos: Vec::new(),
        rejection_reason: None,
        created_at: at(8),
        updated_at: at(8),
        revision: 0,
    }
}

pub(super) fn auditor() -> Actor {
    Actor::new(AUDITOR, Role::Auditor)
}

pub(super) fn other_auditor() -> Actor {
    Actor::new("u-someone-else", Role::Auditor)
}

pub(super) fn manager() -> Actor {
    Actor::new("u-manager", Role::BranchManager).at_branch(BRANCH)
}

pub(super) fn foreign_manager() -> Actor {
    Actor::new("u-manager-2", Role::BranchManager).at_branch("br-airport")
}

pub(super) fn admin() -> Actor {
    Actor::new("u-admin", Role::Admin)
}

pub(super) fn new_audit() -> NewAudit {
    NewAudit {
        survey_id: weighted_survey().id,
        branch: branch_ref(),
        auditor: UserId(AUDITOR.to_string()),
    }
}

#[derive(Default, Clone)]
pub(super) struct MemoryRepository {
    pub(super) surveys: Arc<Mutex<HashMap<SurveyId, Survey>>>,
    pub(super) audits: Arc<Mutex<HashMap<AuditId, Audit>>>,
    issued: Arc<Mutex<u64>>,
}

impl AuditRepository for MemoryRepository {
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
        Ok(guard
            .values()
            .filter(|audit| branch.map_or(true, |id| &audit.branch.branch_id == id))
            .cloned()
            .collect())
    }
}

pub(super) struct UnavailableRepository;

impl AuditRepository for UnavailableRepository {
    fn insert_survey(&self, _survey: Survey) -> Result<Survey, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn fetch_survey(&self, _id: &SurveyId) -> Result<Option<Survey>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn surveys(&self) -> Result<Vec<Survey>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn next_audit_id(&self) -> Result<AuditId, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn insert_audit(&self, _audit: Audit) -> Result<Audit, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn update_audit(&self, _audit: Audit) -> Result<Audit, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn fetch_audit(&self, _id: &AuditId) -> Result<Option<Audit>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn audits(&self, _branch: Option<&BranchId>) -> Result<Vec<Audit>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

#[derive(Default, Clone)]
pub(super) struct MemoryNotifications {
    events: Arc<Mutex<Vec<Notification>>>,
}

impl MemoryNotifications {
    pub(super) fn events(&self) -> Vec<Notification> {
        self.events.lock().expect("notification mutex poisoned").clone()
    }
}

impl NotificationPublisher for MemoryNotifications {
    fn publish(&self, notification: Notification) -> Result<(), NotificationError> {
        self.events
            .lock()
            .expect("notification mutex poisoned")
            .push(notification);
        Ok(())
    }
}

pub(super) struct FailingNotifications;

impl NotificationPublisher for FailingNotifications {
    fn publish(&self, _notification: Notification) -> Result<(), NotificationError> {
        Err(NotificationError::Transport("smtp down".to_string()))
    }
}

/// Service with the weighted survey already stored.
pub(super) fn build_service() -> (
    AuditService<MemoryRepository, MemoryNotifications>,
    Arc<MemoryRepository>,
    Arc<MemoryNotifications>,
) {
    let repository = Arc::new(MemoryRepository::default());
    let notifications = Arc::new(MemoryNotifications::default());
    let service = AuditService::new(repository.clone(), notifications.clone());
    service
        .create_survey(&admin(), weighted_survey())
        .expect("survey stored");
    (service, repository, notifications)
}

/// Scheduled audit with every question answered, moved to `Completed`.
pub(super) fn completed_audit(
    service: &AuditService<MemoryRepository, MemoryNotifications>,
) -> Audit {
    let audit = service
        .create_audit(&manager(), new_audit(), at(8))
        .expect("audit scheduled");
    service
        .record_responses(
            &auditor(),
            &audit.id,
            crate::audits::service::ResponseUpdate {
                responses: all_answered(),
                na_reasons: BTreeMap::new(),
            },
            at(9),
        )
        .expect("responses saved");
    service
        .transition(
            &auditor(),
            &audit.id,
            crate::audits::lifecycle::AuditAction::Complete,
            at(10),
        )
        .expect("audit completed")
}

pub(super) fn router_with_service(
    service: AuditService<MemoryRepository, MemoryNotifications>,
) -> (axum::Router, Arc<IncidentLog>) {
    let incidents = Arc::new(IncidentLog::new(10));
    let state = ApiState {
        service: Arc::new(service),
        incidents: incidents.clone(),
    };
    (audit_router(state), incidents)
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
