use crate::infra::{AppState, InMemoryAdapters};
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::put;
use axum::Extension;
use axum::Json;
use course_market::error::AppError;
use course_market::workflows::moderation::{
    actor_from_headers, moderation_router, Actor, ActorId, ActorRole, EnrollmentId, EntityId,
    EntityStore, InMemoryEnrollmentLedger, InMemoryInstructorDirectory, InstructorProfile,
    ModerationService, ModerationServiceError, NotificationDispatcher,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::info;

pub(crate) fn with_moderation_routes<S, N>(service: Arc<ModerationService<S, N>>) -> axum::Router
where
    S: EntityStore + 'static,
    N: NotificationDispatcher + 'static,
{
    moderation_router(service)
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
}

/// Handles onto the in-process instructor directory and enrollment ledger, which the
/// moderation workflow reads but does not own.
#[derive(Clone)]
pub(crate) struct CollaboratorState {
    profiles: InMemoryInstructorDirectory,
    enrollments: InMemoryEnrollmentLedger,
}

#[derive(Debug, Deserialize)]
pub(crate) struct EnrollmentBody {
    course_id: EntityId,
}

/// Reviewer-only routes that feed the collaborators consulted by course approval and
/// cancellation requests.
pub(crate) fn collaborator_routes(adapters: &InMemoryAdapters) -> axum::Router {
    let state = CollaboratorState {
        profiles: adapters.profiles.clone(),
        enrollments: adapters.enrollments.clone(),
    };

    axum::Router::new()
        .route(
            "/api/v1/admin/instructors/:instructor_id/profile",
            put(upsert_profile_handler),
        )
        .route(
            "/api/v1/admin/enrollments/:enrollment_id",
            put(record_enrollment_handler),
        )
        .with_state(state)
}

pub(crate) async fn upsert_profile_handler(
    State(state): State<CollaboratorState>,
    headers: HeaderMap,
    Path(instructor_id): Path<String>,
    Json(profile): Json<InstructorProfile>,
) -> Result<Response, AppError> {
    let actor = match require_reviewer(&headers) {
        Ok(actor) => actor,
        Err(response) => return Ok(response),
    };

    let missing = profile.missing_fields();
    state
        .profiles
        .upsert(ActorId(instructor_id.clone()), profile)
        .map_err(ModerationServiceError::from)?;
    info!(
        %instructor_id,
        actor = %actor.id,
        missing = missing.len(),
        "instructor profile recorded"
    );

    let payload = json!({ "instructor_id": instructor_id, "missing": missing });
    Ok((StatusCode::OK, Json(payload)).into_response())
}

pub(crate) async fn record_enrollment_handler(
    State(state): State<CollaboratorState>,
    headers: HeaderMap,
    Path(enrollment_id): Path<String>,
    Json(body): Json<EnrollmentBody>,
) -> Result<Response, AppError> {
    let actor = match require_reviewer(&headers) {
        Ok(actor) => actor,
        Err(response) => return Ok(response),
    };

    state
        .enrollments
        .enroll(EnrollmentId(enrollment_id.clone()), body.course_id.clone())
        .map_err(ModerationServiceError::from)?;
    info!(%enrollment_id, course_id = %body.course_id, actor = %actor.id, "enrollment recorded");

    let payload = json!({
        "enrollment_id": enrollment_id,
        "course_id": body.course_id,
        "status": "ENROLLED",
    });
    Ok((StatusCode::OK, Json(payload)).into_response())
}

fn require_reviewer(headers: &HeaderMap) -> Result<Actor, Response> {
    let actor = actor_from_headers(headers)?;
    if actor.role != ActorRole::Reviewer {
        let payload = json!({
            "error": format!("actor {} may not manage instructor or enrollment records", actor.id),
            "kind": "forbidden",
        });
        return Err((StatusCode::FORBIDDEN, Json(payload)).into_response());
    }
    Ok(actor)
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}
