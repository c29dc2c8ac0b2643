use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::config::ModerationConfig;

use super::domain::{
    Action, Actor, ActorId, ActorRole, EnrollmentId, EntityId, EntityKind, EntitySubject,
    ModerationRecord, ModerationStatus, ReviewState, TransitionRequest,
};
use super::engine::{
    DownstreamEffect, EvaluationContext, PlannedCommit, PlannedTransition, TransitionEngine,
    TransitionError,
};
use super::notification::Notification;
use super::repository::{
    EnrollmentLedger, EnrollmentStatus, EntityStore, InstructorDirectory, LedgerError,
    NotificationDispatcher, RepositoryError,
};
use super::table::TransitionTable;

/// Service composing the transition engine, the entity store and the collaborators the
/// workflow notifies or consults.
pub struct ModerationService<S, N> {
    store: Arc<S>,
    dispatcher: Arc<N>,
    profiles: Arc<dyn InstructorDirectory>,
    enrollments: Arc<dyn EnrollmentLedger>,
    engine: TransitionEngine,
    max_batch_size: usize,
}

static ENTITY_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_entity_id(kind: EntityKind) -> EntityId {
    let id = ENTITY_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    EntityId(format!("{}-{id:06}", kind.id_prefix()))
}

/// Result of a committed transition.
#[derive(Debug, Clone)]
pub struct TransitionOutcome {
    pub entity_id: EntityId,
    pub kind: EntityKind,
    pub action: Action,
    /// Latest stored state; `None` once the entity has been removed.
    pub record: Option<ModerationRecord>,
    pub notification: Notification,
    /// `false` when the dispatcher refused the notification. The transition still stands.
    pub notified: bool,
}

impl TransitionOutcome {
    pub fn status(&self) -> Option<ModerationStatus> {
        self.record.as_ref().and_then(ModerationRecord::status)
    }

    pub fn removed(&self) -> bool {
        self.record.is_none()
    }
}

impl<S, N> ModerationService<S, N>
where
    S: EntityStore + 'static,
    N: NotificationDispatcher + 'static,
{
    pub fn new(
        store: Arc<S>,
        dispatcher: Arc<N>,
        profiles: Arc<dyn InstructorDirectory>,
        enrollments: Arc<dyn EnrollmentLedger>,
        config: &ModerationConfig,
    ) -> Self {
        Self {
            store,
            dispatcher,
            profiles,
            enrollments,
            engine: TransitionEngine::new(ActorId(config.review_inbox.clone())),
            max_batch_size: config.max_batch_size.max(1),
        }
    }

    pub fn engine(&self) -> &TransitionEngine {
        &self.engine
    }

    pub(crate) fn store(&self) -> &S {
        &self.store
    }

    pub(crate) fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }

    /// Record a new owner submission in its initial state.
    pub fn submit(
        &self,
        actor: &Actor,
        subject: EntitySubject,
    ) -> Result<ModerationRecord, ModerationServiceError> {
        let kind = subject.kind();
        if actor.role != ActorRole::Owner {
            return Err(ModerationServiceError::OwnerRequired(kind));
        }

        if let EntitySubject::CancellationRequest(request) = &subject {
            match self.enrollments.status(&request.enrollment_id)? {
                Some(EnrollmentStatus::Enrolled) => {}
                Some(_) | None => {
                    return Err(ModerationServiceError::EnrollmentNotActive(
                        request.enrollment_id.clone(),
                    ))
                }
            }
        }

        let state = TransitionTable::for_kind(kind)
            .initial_status()
            .map(|_| ReviewState::Pending);
        let record = ModerationRecord {
            id: next_entity_id(kind),
            owner_id: actor.id.clone(),
            subject,
            state,
            created_at: Utc::now(),
            decided_at: None,
            version: 0,
            history: Vec::new(),
        };

        let stored = self.store.insert(record)?;
        info!(entity_id = %stored.id, %kind, owner = %stored.owner_id, "submission recorded");
        Ok(stored)
    }

    /// Fetch an entity for API responses.
    pub fn get(&self, entity_id: &EntityId) -> Result<ModerationRecord, ModerationServiceError> {
        self.store
            .fetch(entity_id)?
            .ok_or_else(|| TransitionError::NotFound(entity_id.clone()).into())
    }

    /// Validate and commit a single transition, then run its side effects.
    pub fn transition(
        &self,
        request: TransitionRequest,
    ) -> Result<TransitionOutcome, ModerationServiceError> {
        let current = self.store.fetch(&request.entity_id)?;
        let (plan, version) = self.plan(current.as_ref(), &request)?;

        if request.action == Action::Resubmit {
            let unchanged = match (&request.payload.update, &current) {
                (Some(update), Some(record)) => update == &record.subject,
                _ => true,
            };
            if unchanged {
                debug!(entity_id = %request.entity_id, "resubmission without field changes");
            }
        }

        let PlannedTransition {
            kind,
            commit,
            notification,
            effect,
            ..
        } = plan;

        let record = match commit {
            PlannedCommit::Replace(next) => Some(
                self.store
                    .commit(version, next)
                    .map_err(|err| commit_error(err, &request.entity_id))?,
            ),
            PlannedCommit::Remove => {
                self.store
                    .remove(&request.entity_id, version)
                    .map_err(|err| commit_error(err, &request.entity_id))?;
                None
            }
            PlannedCommit::Untouched => current,
        };

        info!(
            entity_id = %request.entity_id,
            %kind,
            action = %request.action,
            actor = %request.actor.id,
            status = status_label(record.as_ref()),
            "moderation transition committed"
        );

        if let Some(effect) = effect {
            self.run_effect(&request.entity_id, effect);
        }

        let notified = match self.dispatcher.enqueue(notification.clone()) {
            Ok(()) => true,
            Err(err) => {
                warn!(
                    entity_id = %request.entity_id,
                    notification_type = %notification.notification_type,
                    error = %err,
                    "notification dispatch failed; transition kept"
                );
                false
            }
        };

        Ok(TransitionOutcome {
            entity_id: request.entity_id,
            kind,
            action: request.action,
            record,
            notification,
            notified,
        })
    }

    /// Evaluate `request` against `current` without committing anything.
    pub(crate) fn plan(
        &self,
        current: Option<&ModerationRecord>,
        request: &TransitionRequest,
    ) -> Result<(PlannedTransition, u64), ModerationServiceError> {
        self.engine.admit(current, request)?;
        let context = self.context_for(current, request.action)?;
        let plan = self
            .engine
            .evaluate(current, request, &context, Utc::now())?;
        let version = current.map(|record| record.version).unwrap_or_default();
        Ok((plan, version))
    }

    /// Gather the collaborator facts the preconditions of `action` depend on.
    pub(crate) fn context_for(
        &self,
        current: Option<&ModerationRecord>,
        action: Action,
    ) -> Result<EvaluationContext, ModerationServiceError> {
        let mut context = EvaluationContext::default();
        let Some(record) = current else {
            return Ok(context);
        };

        let table = TransitionTable::for_kind(record.kind());
        if matches!(action, Action::Approve | Action::Reject) && table.requires_instructor_profile()
        {
            context.instructor_profile = self.profiles.profile(&record.owner_id)?;
        }

        if action == Action::Delete && record.status() == Some(ModerationStatus::Approved) {
            let course = record.subject.course_id().unwrap_or(&record.id);
            context.active_enrollments = self.enrollments.active_enrollments(course)?;
        }

        Ok(context)
    }

    fn run_effect(&self, entity_id: &EntityId, effect: DownstreamEffect) {
        match effect {
            DownstreamEffect::CancelEnrollment(enrollment) => {
                match self.enrollments.cancel(&enrollment) {
                    Ok(status) => info!(
                        %entity_id,
                        %enrollment,
                        status = ?status,
                        "enrollment cancelled after approved request"
                    ),
                    Err(err) => warn!(
                        %entity_id,
                        %enrollment,
                        error = %err,
                        "enrollment cancellation failed after approval"
                    ),
                }
            }
        }
    }
}

fn status_label(record: Option<&ModerationRecord>) -> &'static str {
    match record {
        Some(record) => record
            .status()
            .map(ModerationStatus::label)
            .unwrap_or("unmoderated"),
        None => "removed",
    }
}

fn commit_error(err: RepositoryError, entity_id: &EntityId) -> ModerationServiceError {
    match err {
        RepositoryError::VersionConflict { .. } => {
            TransitionError::VersionConflict(entity_id.clone()).into()
        }
        RepositoryError::NotFound => TransitionError::NotFound(entity_id.clone()).into(),
        other => other.into(),
    }
}

/// Error raised by the moderation service.
#[derive(Debug, thiserror::Error)]
pub enum ModerationServiceError {
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error("only owners may submit a {0}")]
    OwnerRequired(EntityKind),
    #[error("enrollment {0} is not active")]
    EnrollmentNotActive(EnrollmentId),
    #[error("batch of {requested} entities exceeds the limit of {limit}")]
    BatchTooLarge { requested: usize, limit: usize },
}
