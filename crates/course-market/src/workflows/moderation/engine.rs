use chrono::{DateTime, Utc};

use super::domain::{
    Action, ActorId, ActorRole, EnrollmentId, EntityId, EntityKind, EntitySubject,
    InstructorProfile, ModerationRecord, ModerationStatus, ReviewState, TransitionEvent,
    TransitionRequest,
};
use super::notification::{Notification, NotificationType};
use super::table::{Edge, EdgeOutcome, TransitionTable};

/// Business failures of a requested transition.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("{0} not found")]
    NotFound(EntityId),
    #[error("actor {actor} ({role}) may not {action} a {kind}")]
    Forbidden {
        actor: ActorId,
        role: ActorRole,
        action: Action,
        kind: EntityKind,
    },
    #[error("cannot {action} a {kind} that is {state}")]
    InvalidState {
        kind: EntityKind,
        action: Action,
        state: String,
    },
    #[error("submission incomplete; missing {}", .missing.join(", "))]
    IncompleteSubmission { missing: Vec<String> },
    #[error("a non-empty reason is required to {0}")]
    ReasonRequired(Action),
    #[error("{0} was modified concurrently; reload and retry")]
    VersionConflict(EntityId),
    #[error("unsupported moderation request: {0}")]
    Unsupported(String),
}

impl TransitionError {
    /// Stable machine-readable tag for API payloads.
    pub const fn code(&self) -> &'static str {
        match self {
            TransitionError::NotFound(_) => "not_found",
            TransitionError::Forbidden { .. } => "forbidden",
            TransitionError::InvalidState { .. } => "invalid_state",
            TransitionError::IncompleteSubmission { .. } => "incomplete_submission",
            TransitionError::ReasonRequired(_) => "reason_required",
            TransitionError::VersionConflict(_) => "version_conflict",
            TransitionError::Unsupported(_) => "unsupported",
        }
    }
}

/// Facts from collaborators that the preconditions depend on.
#[derive(Debug, Clone, Default)]
pub struct EvaluationContext {
    /// Owning instructor's profile; only consulted for course approval.
    pub instructor_profile: Option<InstructorProfile>,
    /// Live enrollments on the course the entity belongs to.
    pub active_enrollments: usize,
}

/// How the store should change once a plan is accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlannedCommit {
    Replace(ModerationRecord),
    Remove,
    Untouched,
}

/// Side effects owned by other subsystems, run after the commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownstreamEffect {
    CancelEnrollment(EnrollmentId),
}

/// Fully validated transition, ready to commit.
#[derive(Debug, Clone)]
pub struct PlannedTransition {
    pub kind: EntityKind,
    pub edge: Edge,
    pub commit: PlannedCommit,
    pub event: TransitionEvent,
    pub notification: Notification,
    pub effect: Option<DownstreamEffect>,
}

/// Evaluates requests against the transition table. Holds no storage; the service
/// commits whatever plan comes back.
#[derive(Debug, Clone)]
pub struct TransitionEngine {
    review_inbox: ActorId,
}

impl TransitionEngine {
    pub fn new(review_inbox: ActorId) -> Self {
        Self { review_inbox }
    }

    pub fn review_inbox(&self) -> &ActorId {
        &self.review_inbox
    }

    /// Check preconditions in order (existence, role, state, data) and build the plan.
    pub fn evaluate(
        &self,
        record: Option<&ModerationRecord>,
        request: &TransitionRequest,
        context: &EvaluationContext,
        now: DateTime<Utc>,
    ) -> Result<PlannedTransition, TransitionError> {
        let (record, edge) = self.admit(record, request)?;
        let kind = record.kind();
        let table = TransitionTable::for_kind(kind);
        let action = request.action;
        let from = record.status();

        if action == Action::Delete
            && from == Some(ModerationStatus::Approved)
            && context.active_enrollments > 0
        {
            return Err(TransitionError::InvalidState {
                kind,
                action,
                state: format!(
                    "APPROVED with {} active enrollments",
                    context.active_enrollments
                ),
            });
        }

        let reason = request.payload.trimmed_reason();
        match action {
            Action::Approve => {
                let missing = self.missing_for_approval(&table, record, context);
                if !missing.is_empty() {
                    return Err(TransitionError::IncompleteSubmission { missing });
                }
            }
            Action::Resubmit => {
                if let Some(update) = &request.payload.update {
                    if update.kind() != kind {
                        return Err(TransitionError::Unsupported(format!(
                            "{} update supplied for a {}",
                            update.kind(),
                            kind
                        )));
                    }
                }
            }
            Action::Reject | Action::Delete | Action::RequestRevision => {}
        }
        if action.requires_reason() && reason.is_none() {
            return Err(TransitionError::ReasonRequired(action));
        }

        let to = match edge.outcome {
            EdgeOutcome::Enter(status) => Some(status),
            EdgeOutcome::Remove => None,
            EdgeOutcome::NotifyOnly => from,
        };
        let event = TransitionEvent {
            actor_id: request.actor.id.clone(),
            role: request.actor.role,
            action,
            from,
            to,
            reason: reason.clone(),
            at: now,
        };

        let commit = match edge.outcome {
            EdgeOutcome::Enter(status) => {
                let mut next = record.clone();
                next.state = Some(match status {
                    ModerationStatus::Pending => ReviewState::Pending,
                    ModerationStatus::Approved => ReviewState::Approved,
                    ModerationStatus::Rejected => ReviewState::Rejected {
                        reason: reason.clone().unwrap_or_default(),
                    },
                });
                next.decided_at = match action {
                    Action::Approve | Action::Reject => Some(now),
                    _ => None,
                };
                if let Some(update) = request.payload.update.clone() {
                    next.subject = update;
                }
                next.history.push(event.clone());
                PlannedCommit::Replace(next)
            }
            EdgeOutcome::Remove => PlannedCommit::Remove,
            EdgeOutcome::NotifyOnly => PlannedCommit::Untouched,
        };

        let notification_type = NotificationType::for_transition(kind, action).ok_or_else(|| {
            TransitionError::Unsupported(format!("no notification for {action} on a {kind}"))
        })?;
        let subject_name = match &commit {
            PlannedCommit::Replace(next) => next.subject.display_name(),
            _ => record.subject.display_name(),
        };
        let target = match request.actor.role {
            ActorRole::Reviewer => record.owner_id.clone(),
            ActorRole::Owner => self.review_inbox.clone(),
        };
        let notification = Notification::build(
            target,
            notification_type,
            kind,
            &record.id,
            &subject_name,
            reason.as_deref(),
        );

        let effect = match (&record.subject, action) {
            (EntitySubject::CancellationRequest(cancellation), Action::Approve) => Some(
                DownstreamEffect::CancelEnrollment(cancellation.enrollment_id.clone()),
            ),
            _ => None,
        };

        Ok(PlannedTransition {
            kind,
            edge,
            commit,
            event,
            notification,
            effect,
        })
    }

    /// Existence, role and state checks. They need no collaborator facts, so the service
    /// runs them before consulting the instructor directory or the enrollment ledger.
    pub fn admit<'a>(
        &self,
        record: Option<&'a ModerationRecord>,
        request: &TransitionRequest,
    ) -> Result<(&'a ModerationRecord, Edge), TransitionError> {
        let record = record.ok_or_else(|| TransitionError::NotFound(request.entity_id.clone()))?;
        authorize(record, request)?;

        let kind = record.kind();
        let from = record.status();
        let edge = TransitionTable::for_kind(kind)
            .edge(from, request.action)
            .ok_or_else(|| TransitionError::InvalidState {
                kind,
                action: request.action,
                state: state_label(from).to_string(),
            })?;
        Ok((record, edge))
    }

    /// Gating fields that would block approving `record`, including the owning
    /// instructor's profile for courses.
    pub fn missing_for_approval(
        &self,
        table: &TransitionTable,
        record: &ModerationRecord,
        context: &EvaluationContext,
    ) -> Vec<String> {
        let mut missing: Vec<String> = table
            .missing_fields(&record.subject)
            .into_iter()
            .map(str::to_string)
            .collect();
        if table.requires_instructor_profile() {
            let profile = context.instructor_profile.clone().unwrap_or_default();
            missing.extend(profile.missing_fields().into_iter().map(str::to_string));
        }
        missing
    }
}

fn authorize(
    record: &ModerationRecord,
    request: &TransitionRequest,
) -> Result<(), TransitionError> {
    let required = request.action.required_role(record.kind());
    let actor = &request.actor;
    let permitted = actor.role == required
        && (required == ActorRole::Reviewer || actor.id == record.owner_id);

    if permitted {
        Ok(())
    } else {
        Err(TransitionError::Forbidden {
            actor: actor.id.clone(),
            role: actor.role,
            action: request.action,
            kind: record.kind(),
        })
    }
}

fn state_label(status: Option<ModerationStatus>) -> &'static str {
    status.map(ModerationStatus::label).unwrap_or("unmoderated")
}
