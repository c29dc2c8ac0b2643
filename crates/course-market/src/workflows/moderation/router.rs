use std::str::FromStr;
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::batch::BatchRequest;
use super::domain::{
    Action, Actor, ActorId, ActorRole, EntityId, EntityKind, EntitySubject, ModerationStatus,
    TransitionPayload, TransitionRequest,
};
use super::engine::TransitionError;
use super::notification::NotificationType;
use super::projection::ModerationQuery;
use super::repository::{EntityStore, NotificationDispatcher};
use super::service::{ModerationService, ModerationServiceError, TransitionOutcome};

pub const ACTOR_ID_HEADER: &str = "x-actor-id";
pub const ACTOR_ROLE_HEADER: &str = "x-actor-role";

/// Router builder exposing the moderation workflow over HTTP.
pub fn moderation_router<S, N>(service: Arc<ModerationService<S, N>>) -> Router
where
    S: EntityStore + 'static,
    N: NotificationDispatcher + 'static,
{
    Router::new()
        .route(
            "/api/v1/moderation/entities",
            post(submit_handler::<S, N>).get(list_handler::<S, N>),
        )
        .route(
            "/api/v1/moderation/entities/:entity_id",
            get(status_handler::<S, N>),
        )
        .route(
            "/api/v1/moderation/entities/:entity_id/actions/:action",
            post(transition_handler::<S, N>),
        )
        .route(
            "/api/v1/moderation/batch/preflight",
            post(preflight_handler::<S, N>),
        )
        .route("/api/v1/moderation/batch", post(batch_handler::<S, N>))
        .route(
            "/api/v1/moderation/counts/:kind",
            get(counts_handler::<S, N>),
        )
        .with_state(service)
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ListParams {
    #[serde(default)]
    kind: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    owner: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct BatchBody {
    entity_ids: Vec<EntityId>,
    action: String,
    #[serde(default)]
    reason: Option<String>,
}

#[derive(Debug, Serialize)]
struct TransitionView {
    entity_id: EntityId,
    kind: EntityKind,
    action: Action,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reject_reason: Option<String>,
    removed: bool,
    notification_type: NotificationType,
    notified: bool,
}

impl From<&TransitionOutcome> for TransitionView {
    fn from(outcome: &TransitionOutcome) -> Self {
        Self {
            entity_id: outcome.entity_id.clone(),
            kind: outcome.kind,
            action: outcome.action,
            status: outcome.status().map(ModerationStatus::label),
            reject_reason: outcome
                .record
                .as_ref()
                .and_then(|record| record.reject_reason())
                .map(str::to_string),
            removed: outcome.removed(),
            notification_type: outcome.notification.notification_type,
            notified: outcome.notified,
        }
    }
}

pub(crate) async fn submit_handler<S, N>(
    State(service): State<Arc<ModerationService<S, N>>>,
    headers: HeaderMap,
    axum::Json(subject): axum::Json<EntitySubject>,
) -> Response
where
    S: EntityStore + 'static,
    N: NotificationDispatcher + 'static,
{
    let actor = match actor_from_headers(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };

    match service.submit(&actor, subject) {
        Ok(record) => (StatusCode::CREATED, axum::Json(record.status_view())).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn list_handler<S, N>(
    State(service): State<Arc<ModerationService<S, N>>>,
    Query(params): Query<ListParams>,
) -> Response
where
    S: EntityStore + 'static,
    N: NotificationDispatcher + 'static,
{
    let query = match parse_query(params) {
        Ok(query) => query,
        Err(message) => return bad_request(message),
    };

    match service.list(&query) {
        Ok(views) => (StatusCode::OK, axum::Json(views)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn status_handler<S, N>(
    State(service): State<Arc<ModerationService<S, N>>>,
    Path(entity_id): Path<String>,
) -> Response
where
    S: EntityStore + 'static,
    N: NotificationDispatcher + 'static,
{
    match service.get(&EntityId(entity_id)) {
        Ok(record) => (StatusCode::OK, axum::Json(record.status_view())).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn transition_handler<S, N>(
    State(service): State<Arc<ModerationService<S, N>>>,
    headers: HeaderMap,
    Path((entity_id, action)): Path<(String, String)>,
    payload: Result<axum::Json<TransitionPayload>, JsonRejection>,
) -> Response
where
    S: EntityStore + 'static,
    N: NotificationDispatcher + 'static,
{
    let actor = match actor_from_headers(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    let action = match Action::from_str(&action) {
        Ok(action) => action,
        Err(err) => return error_response(err.into()),
    };

    // A body is optional; one that is sent must parse.
    let payload = match payload {
        Ok(axum::Json(payload)) => payload,
        Err(JsonRejection::MissingJsonContentType(_)) => TransitionPayload::default(),
        Err(rejection) => return invalid_body(rejection),
    };

    let request = TransitionRequest {
        entity_id: EntityId(entity_id),
        actor,
        action,
        payload,
    };

    match service.transition(request) {
        Ok(outcome) => (StatusCode::OK, axum::Json(TransitionView::from(&outcome))).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn preflight_handler<S, N>(
    State(service): State<Arc<ModerationService<S, N>>>,
    headers: HeaderMap,
    axum::Json(body): axum::Json<BatchBody>,
) -> Response
where
    S: EntityStore + 'static,
    N: NotificationDispatcher + 'static,
{
    let request = match batch_request(&headers, body) {
        Ok(request) => request,
        Err(response) => return response,
    };

    match service.preflight_batch(&request) {
        Ok(plan) => (StatusCode::OK, axum::Json(plan)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn batch_handler<S, N>(
    State(service): State<Arc<ModerationService<S, N>>>,
    headers: HeaderMap,
    axum::Json(body): axum::Json<BatchBody>,
) -> Response
where
    S: EntityStore + 'static,
    N: NotificationDispatcher + 'static,
{
    let request = match batch_request(&headers, body) {
        Ok(request) => request,
        Err(response) => return response,
    };

    match service.apply_batch(&request) {
        Ok(result) => (StatusCode::OK, axum::Json(result)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn counts_handler<S, N>(
    State(service): State<Arc<ModerationService<S, N>>>,
    Path(kind): Path<String>,
) -> Response
where
    S: EntityStore + 'static,
    N: NotificationDispatcher + 'static,
{
    let kind = match EntityKind::from_str(&kind) {
        Ok(kind) => kind,
        Err(message) => return bad_request(message),
    };

    match service.counts(kind) {
        Ok(counts) => {
            let payload = json!({
                "kind": kind,
                "pending": counts.pending,
                "approved": counts.approved,
                "rejected": counts.rejected,
                "unmoderated": counts.unmoderated,
                "total": counts.total(),
            });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(err) => error_response(err),
    }
}

/// Identity comes from the upstream auth layer; it is trusted as given but must be present.
pub fn actor_from_headers(headers: &HeaderMap) -> Result<Actor, Response> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
    };

    let unauthorized = |message: String| {
        let payload = json!({ "error": message, "kind": "unauthenticated" });
        (StatusCode::UNAUTHORIZED, axum::Json(payload)).into_response()
    };

    let id = header(ACTOR_ID_HEADER)
        .ok_or_else(|| unauthorized(format!("missing {ACTOR_ID_HEADER} header")))?;
    let role = header(ACTOR_ROLE_HEADER)
        .ok_or_else(|| unauthorized(format!("missing {ACTOR_ROLE_HEADER} header")))?;
    let role = ActorRole::from_str(role).map_err(unauthorized)?;

    Ok(Actor {
        id: ActorId(id.to_string()),
        role,
    })
}

fn batch_request(headers: &HeaderMap, body: BatchBody) -> Result<BatchRequest, Response> {
    let actor = actor_from_headers(headers)?;
    let action = Action::from_str(&body.action).map_err(|err| error_response(err.into()))?;

    Ok(BatchRequest {
        entity_ids: body.entity_ids,
        actor,
        action,
        payload: TransitionPayload {
            reason: body.reason,
            update: None,
        },
    })
}

fn parse_query(params: ListParams) -> Result<ModerationQuery, String> {
    let kind = params
        .kind
        .as_deref()
        .map(EntityKind::from_str)
        .transpose()?;
    let status = params
        .status
        .as_deref()
        .map(ModerationStatus::from_str)
        .transpose()?;
    let owner = params
        .owner
        .filter(|owner| !owner.trim().is_empty())
        .map(ActorId);

    Ok(ModerationQuery {
        kind,
        status,
        owner,
    })
}

fn bad_request(message: String) -> Response {
    let payload = json!({ "error": message, "kind": "bad_request" });
    (StatusCode::BAD_REQUEST, axum::Json(payload)).into_response()
}

fn invalid_body(rejection: JsonRejection) -> Response {
    let payload = json!({ "error": rejection.body_text(), "kind": "invalid_body" });
    (rejection.status(), axum::Json(payload)).into_response()
}

pub(crate) fn error_response(err: ModerationServiceError) -> Response {
    let (status, kind) = match &err {
        ModerationServiceError::Transition(transition) => {
            let status = match transition {
                TransitionError::NotFound(_) => StatusCode::NOT_FOUND,
                TransitionError::Forbidden { .. } => StatusCode::FORBIDDEN,
                TransitionError::InvalidState { .. } | TransitionError::VersionConflict(_) => {
                    StatusCode::CONFLICT
                }
                TransitionError::IncompleteSubmission { .. }
                | TransitionError::ReasonRequired(_) => StatusCode::UNPROCESSABLE_ENTITY,
                TransitionError::Unsupported(_) => StatusCode::BAD_REQUEST,
            };
            (status, transition.code())
        }
        ModerationServiceError::OwnerRequired(_) => (StatusCode::FORBIDDEN, "forbidden"),
        ModerationServiceError::EnrollmentNotActive(_) => {
            (StatusCode::UNPROCESSABLE_ENTITY, "enrollment_not_active")
        }
        ModerationServiceError::BatchTooLarge { .. } => {
            (StatusCode::UNPROCESSABLE_ENTITY, "batch_too_large")
        }
        ModerationServiceError::Repository(_) | ModerationServiceError::Ledger(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, "internal")
        }
    };

    let payload = json!({
        "error": err.to_string(),
        "kind": kind,
    });
    (status, axum::Json(payload)).into_response()
}
