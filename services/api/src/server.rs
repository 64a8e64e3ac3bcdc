use crate::cli::ServeArgs;
use crate::infra::{AppState, InMemoryAuditRepository, LoggingNotificationPublisher};
use crate::routes::with_audit_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use branch_audit::audits::{ApiState, AuditService};
use branch_audit::config::AppConfig;
use branch_audit::error::{AppError, IncidentLog};
use branch_audit::telemetry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let repository = Arc::new(InMemoryAuditRepository::default());
    let notifications = Arc::new(LoggingNotificationPublisher::default());
    let api_state = ApiState {
        service: Arc::new(AuditService::new(repository, notifications)),
        incidents: Arc::new(IncidentLog::new(config.incident_log_capacity)),
    };

    let app = with_audit_routes(api_state)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "branch audit service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
