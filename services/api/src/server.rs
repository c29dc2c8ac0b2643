use crate::cli::ServeArgs;
use crate::infra::{in_memory_service, AppState};
use crate::routes::{collaborator_routes, with_moderation_routes};
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use course_market::config::AppConfig;
use course_market::error::AppError;
use course_market::telemetry;
use std::sync::atomic::{AtomicBool, Ordering};
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
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let (service, adapters) = in_memory_service(&config.moderation);

    let app = with_moderation_routes(service)
        .merge(collaborator_routes(&adapters))
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        review_inbox = %config.moderation.review_inbox,
        max_batch = config.moderation.max_batch_size,
        "course moderation service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
