use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::domain::{AuditId, Survey, SurveyId};
use super::lifecycle::AuditAction;
use super::repository::{AuditRepository, NotificationPublisher};
use super::service::{AuditService, AuditServiceError, NewAudit, ResponseUpdate};
use crate::access::{Actor, NavItem};
use crate::error::{http_status, Classify, ClassifiedError, IncidentLog};
use crate::sync::{apply_payload, SyncPayload};

/// Shared handler state: the audit service plus the incident log errors are written to.
pub struct ApiState<R, N> {
    pub service: Arc<AuditService<R, N>>,
    pub incidents: Arc<IncidentLog>,
}

impl<R, N> Clone for ApiState<R, N> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            incidents: Arc::clone(&self.incidents),
        }
    }
}

/// Router builder exposing the audit API.
pub fn audit_router<R, N>(state: ApiState<R, N>) -> Router
where
    R: AuditRepository + 'static,
    N: NotificationPublisher + 'static,
{
    Router::new()
        .route("/api/v1/surveys", post(create_survey_handler::<R, N>))
        .route("/api/v1/surveys/:survey_id", get(survey_handler::<R, N>))
        .route("/api/v1/audits", post(create_audit_handler::<R, N>))
        .route("/api/v1/audits/:audit_id", get(audit_handler::<R, N>))
        .route(
            "/api/v1/audits/:audit_id/responses",
            put(responses_handler::<R, N>),
        )
        .route(
            "/api/v1/audits/:audit_id/transitions",
            post(transition_handler::<R, N>),
        )
        .route("/api/v1/audits/:audit_id/score", get(score_handler::<R, N>))
        .route(
            "/api/v1/audits/:audit_id/progress",
            get(progress_handler::<R, N>),
        )
        .route("/api/v1/sync", post(sync_handler::<R, N>))
        .route("/api/v1/analytics", get(analytics_handler::<R, N>))
        .route("/api/v1/session", get(session_handler))
        .route("/api/v1/incidents", get(incidents_handler::<R, N>))
        .with_state(state)
}

fn failure(
    incidents: &IncidentLog,
    context: &str,
    status: StatusCode,
    classified: ClassifiedError,
) -> Response {
    incidents.record(context, &classified, Utc::now());
    let payload = json!({
        "error": classified.detail,
        "message": classified.message,
        "category": classified.category,
        "severity": classified.severity,
        "recoverable": classified.recoverable,
        "action": classified.action,
    });
    (status, Json(payload)).into_response()
}

fn service_failure(incidents: &IncidentLog, context: &str, err: AuditServiceError) -> Response {
    let status = http_status(&err);
    failure(incidents, context, status, err.classify())
}

fn resolve_actor(incidents: &IncidentLog, headers: &HeaderMap) -> Result<Actor, Response> {
    Actor::from_headers(headers)
        .map_err(|err| failure(incidents, "authenticate", StatusCode::UNAUTHORIZED, err.classify()))
}

fn respond<T: Serialize>(
    incidents: &IncidentLog,
    context: &str,
    status: StatusCode,
    result: Result<T, AuditServiceError>,
) -> Response {
    match result {
        Ok(body) => (status, Json(body)).into_response(),
        Err(err) => service_failure(incidents, context, err),
    }
}

pub(crate) async fn create_survey_handler<R, N>(
    State(state): State<ApiState<R, N>>,
    headers: HeaderMap,
    Json(survey): Json<Survey>,
) -> Response
where
    R: AuditRepository + 'static,
    N: NotificationPublisher + 'static,
{
    let actor = match resolve_actor(&state.incidents, &headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    let result = state.service.create_survey(&actor, survey);
    respond(&state.incidents, "create survey", StatusCode::CREATED, result)
}

pub(crate) async fn survey_handler<R, N>(
    State(state): State<ApiState<R, N>>,
    headers: HeaderMap,
    Path(survey_id): Path<String>,
) -> Response
where
    R: AuditRepository + 'static,
    N: NotificationPublisher + 'static,
{
    if let Err(response) = resolve_actor(&state.incidents, &headers) {
        return response;
    }
    let result = state.service.survey(&SurveyId(survey_id));
    respond(&state.incidents, "fetch survey", StatusCode::OK, result)
}

pub(crate) async fn create_audit_handler<R, N>(
    State(state): State<ApiState<R, N>>,
    headers: HeaderMap,
    Json(request): Json<NewAudit>,
) -> Response
where
    R: AuditRepository + 'static,
    N: NotificationPublisher + 'static,
{
    let actor = match resolve_actor(&state.incidents, &headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    let result = state.service.create_audit(&actor, request, Utc::now());
    respond(&state.incidents, "schedule audit", StatusCode::CREATED, result)
}

pub(crate) async fn audit_handler<R, N>(
    State(state): State<ApiState<R, N>>,
    headers: HeaderMap,
    Path(audit_id): Path<String>,
) -> Response
where
    R: AuditRepository + 'static,
    N: NotificationPublisher + 'static,
{
    let actor = match resolve_actor(&state.incidents, &headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    let result = state.service.audit(&actor, &AuditId(audit_id));
    respond(&state.incidents, "fetch audit", StatusCode::OK, result)
}

pub(crate) async fn responses_handler<R, N>(
    State(state): State<ApiState<R, N>>,
    headers: HeaderMap,
    Path(audit_id): Path<String>,
    Json(update): Json<ResponseUpdate>,
) -> Response
where
    R: AuditRepository + 'static,
    N: NotificationPublisher + 'static,
{
    let actor = match resolve_actor(&state.incidents, &headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    let result = state
        .service
        .record_responses(&actor, &AuditId(audit_id), update, Utc::now());
    respond(&state.incidents, "save responses", StatusCode::OK, result)
}

pub(crate) async fn transition_handler<R, N>(
    State(state): State<ApiState<R, N>>,
    headers: HeaderMap,
    Path(audit_id): Path<String>,
    Json(action): Json<AuditAction>,
) -> Response
where
    R: AuditRepository + 'static,
    N: NotificationPublisher + 'static,
{
    let actor = match resolve_actor(&state.incidents, &headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    let context = format!("{} audit", action.label());
    let result = state
        .service
        .transition(&actor, &AuditId(audit_id), action, Utc::now());
    respond(&state.incidents, &context, StatusCode::OK, result)
}

pub(crate) async fn score_handler<R, N>(
    State(state): State<ApiState<R, N>>,
    headers: HeaderMap,
    Path(audit_id): Path<String>,
) -> Response
where
    R: AuditRepository + 'static,
    N: NotificationPublisher + 'static,
{
    let actor = match resolve_actor(&state.incidents, &headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    let result = state.service.score(&actor, &AuditId(audit_id));
    respond(&state.incidents, "score audit", StatusCode::OK, result)
}

pub(crate) async fn progress_handler<R, N>(
    State(state): State<ApiState<R, N>>,
    headers: HeaderMap,
    Path(audit_id): Path<String>,
) -> Response
where
    R: AuditRepository + 'static,
    N: NotificationPublisher + 'static,
{
    let actor = match resolve_actor(&state.incidents, &headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    let result = state.service.progress(&actor, &AuditId(audit_id));
    respond(&state.incidents, "audit progress", StatusCode::OK, result)
}

#[derive(Debug, Serialize)]
pub(crate) struct SyncItemResult {
    pub(crate) index: usize,
    pub(crate) audit_id: AuditId,
    pub(crate) accepted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) error: Option<ClassifiedError>,
}

/// Applies a batch of queued offline writes. Items are independent; one failure does not
/// stop the rest.
pub(crate) async fn sync_handler<R, N>(
    State(state): State<ApiState<R, N>>,
    headers: HeaderMap,
    Json(batch): Json<Vec<SyncPayload>>,
) -> Response
where
    R: AuditRepository + 'static,
    N: NotificationPublisher + 'static,
{
    let actor = match resolve_actor(&state.incidents, &headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };

    let now = Utc::now();
    let results: Vec<SyncItemResult> = batch
        .into_iter()
        .enumerate()
        .map(|(index, payload)| {
            let audit_id = payload.audit_id().clone();
            match apply_payload(&state.service, &actor, payload, now) {
                Ok(()) => SyncItemResult {
                    index,
                    audit_id,
                    accepted: true,
                    error: None,
                },
                Err(err) => {
                    let classified = err.classify();
                    state.incidents.record("sync offline write", &classified, now);
                    SyncItemResult {
                        index,
                        audit_id,
                        accepted: false,
                        error: Some(classified),
                    }
                }
            }
        })
        .collect();

    (StatusCode::OK, Json(json!({ "results": results }))).into_response()
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct AnalyticsQuery {
    #[serde(default)]
    pub(crate) format: Option<String>,
}

pub(crate) async fn analytics_handler<R, N>(
    State(state): State<ApiState<R, N>>,
    headers: HeaderMap,
    Query(query): Query<AnalyticsQuery>,
) -> Response
where
    R: AuditRepository + 'static,
    N: NotificationPublisher + 'static,
{
    let actor = match resolve_actor(&state.incidents, &headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    let report = match state.service.analytics(&actor) {
        Ok(report) => report,
        Err(err) => return service_failure(&state.incidents, "build analytics", err),
    };

    if query.format.as_deref() == Some("csv") {
        let mut buffer = Vec::new();
        if let Err(err) = report.write_csv(&mut buffer) {
            let payload = json!({ "error": err.to_string() });
            return (StatusCode::INTERNAL_SERVER_ERROR, Json(payload)).into_response();
        }
        return (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/csv; charset=utf-8")],
            buffer,
        )
            .into_response();
    }

    (StatusCode::OK, Json(report)).into_response()
}

#[derive(Debug, Serialize)]
pub(crate) struct NavEntry {
    pub(crate) item: NavItem,
    pub(crate) label: &'static str,
}

pub(crate) async fn session_handler(headers: HeaderMap) -> Response {
    match Actor::from_headers(&headers) {
        Ok(actor) => {
            let navigation: Vec<NavEntry> = actor
                .role
                .navigation()
                .iter()
                .map(|item| NavEntry {
                    item: *item,
                    label: item.label(),
                })
                .collect();
            let payload = json!({
                "user_id": actor.user_id,
                "role": actor.role,
                "role_label": actor.role.label(),
                "branch_id": actor.branch_id,
                "navigation": navigation,
                "capabilities": {
                    "conduct_audits": actor.role.can_conduct_audits(),
                    "review": actor.role.can_review(),
                    "schedule_audits": actor.role.can_schedule_audits(),
                    "manage_templates": actor.role.can_manage_templates(),
                },
            });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(err) => {
            let classified = err.classify();
            let payload = json!({
                "error": classified.detail,
                "message": classified.message,
                "category": classified.category,
            });
            (StatusCode::UNAUTHORIZED, Json(payload)).into_response()
        }
    }
}

pub(crate) async fn incidents_handler<R, N>(
    State(state): State<ApiState<R, N>>,
    headers: HeaderMap,
) -> Response
where
    R: AuditRepository + 'static,
    N: NotificationPublisher + 'static,
{
    let actor = match resolve_actor(&state.incidents, &headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    if !actor.role.can_view_incidents() {
        let err = AuditServiceError::Forbidden("view the error log");
        return service_failure(&state.incidents, "view incidents", err);
    }
    (
        StatusCode::OK,
        Json(json!({ "incidents": state.incidents.recent() })),
    )
        .into_response()
}
