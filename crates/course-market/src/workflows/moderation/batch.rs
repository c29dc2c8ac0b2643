//! Batch coordinator: one action fanned out over many entities.
//!
//! Members are validated with the same preconditions as single transitions and committed
//! independently. There is no cross-entity transaction; the result lists exactly which
//! members were applied and why the others were skipped.

use std::collections::HashSet;
use std::fmt;

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use tracing::{info, warn};

use super::domain::{
    Action, Actor, EntityId, ModerationStatus, TransitionPayload, TransitionRequest,
};
use super::engine::TransitionError;
use super::repository::{EntityStore, NotificationDispatcher};
use super::service::{ModerationService, ModerationServiceError};
use super::table::TransitionTable;

/// One action applied to a set of entities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchRequest {
    pub entity_ids: Vec<EntityId>,
    pub actor: Actor,
    pub action: Action,
    pub payload: TransitionPayload,
}

impl BatchRequest {
    fn member(&self, entity_id: &EntityId) -> TransitionRequest {
        TransitionRequest {
            entity_id: entity_id.clone(),
            actor: self.actor.clone(),
            action: self.action,
            payload: self.payload.clone(),
        }
    }

    /// Requested ids in order, duplicates dropped.
    fn distinct_ids(&self) -> Vec<EntityId> {
        let mut seen = HashSet::new();
        self.entity_ids
            .iter()
            .filter(|id| seen.insert((*id).clone()))
            .cloned()
            .collect()
    }
}

/// Why a member was left out of a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The member failed a transition precondition.
    Precondition(TransitionError),
    /// Batch rejection only targets incomplete submissions; this one is complete.
    SubmissionComplete,
    /// The store or a collaborator failed while applying this member.
    Failed(String),
}

impl SkipReason {
    pub fn code(&self) -> &'static str {
        match self {
            SkipReason::Precondition(err) => err.code(),
            SkipReason::SubmissionComplete => "submission_complete",
            SkipReason::Failed(_) => "failed",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Precondition(err) => write!(f, "{err}"),
            SkipReason::SubmissionComplete => {
                write!(f, "submission is complete; approve it instead of rejecting")
            }
            SkipReason::Failed(detail) => write!(f, "apply failed: {detail}"),
        }
    }
}

impl Serialize for SkipReason {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("SkipReason", 2)?;
        state.serialize_field("code", self.code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedEntity {
    pub entity_id: EntityId,
    pub reason: SkipReason,
}

/// Pre-flight partition shown to the caller before they confirm.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchPlan {
    pub eligible: Vec<EntityId>,
    pub skipped: Vec<SkippedEntity>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchResult {
    pub applied: Vec<EntityId>,
    pub skipped: Vec<SkippedEntity>,
}

impl<S, N> ModerationService<S, N>
where
    S: EntityStore + 'static,
    N: NotificationDispatcher + 'static,
{
    /// Partition the batch into eligible and skipped members without committing.
    pub fn preflight_batch(
        &self,
        request: &BatchRequest,
    ) -> Result<BatchPlan, ModerationServiceError> {
        let ids = self.bounded_ids(request)?;
        let mut plan = BatchPlan::default();

        for entity_id in ids {
            let skip = match self.member_eligibility(request, &entity_id) {
                Ok(skip) => skip,
                Err(err) => {
                    warn!(%entity_id, error = %err, "batch member lookup failed");
                    Some(SkipReason::Failed(err.to_string()))
                }
            };
            match skip {
                None => plan.eligible.push(entity_id),
                Some(reason) => plan.skipped.push(SkippedEntity { entity_id, reason }),
            }
        }

        Ok(plan)
    }

    /// Apply the action to every eligible member, each committed on its own.
    pub fn apply_batch(
        &self,
        request: &BatchRequest,
    ) -> Result<BatchResult, ModerationServiceError> {
        let BatchPlan { eligible, skipped } = self.preflight_batch(request)?;
        let mut result = BatchResult {
            applied: Vec::with_capacity(eligible.len()),
            skipped,
        };

        for entity_id in eligible {
            match self.transition(request.member(&entity_id)) {
                Ok(_) => result.applied.push(entity_id),
                Err(ModerationServiceError::Transition(err)) => result.skipped.push(SkippedEntity {
                    entity_id,
                    reason: SkipReason::Precondition(err),
                }),
                Err(other) => result.skipped.push(SkippedEntity {
                    entity_id,
                    reason: SkipReason::Failed(other.to_string()),
                }),
            }
        }

        info!(
            action = %request.action,
            actor = %request.actor.id,
            applied = result.applied.len(),
            skipped = result.skipped.len(),
            "batch moderation applied"
        );
        Ok(result)
    }

    fn bounded_ids(&self, request: &BatchRequest) -> Result<Vec<EntityId>, ModerationServiceError> {
        let ids = request.distinct_ids();
        let limit = self.max_batch_size();
        if ids.len() > limit {
            return Err(ModerationServiceError::BatchTooLarge {
                requested: ids.len(),
                limit,
            });
        }
        Ok(ids)
    }

    /// `None` when the member would be applied, otherwise the reason it is skipped.
    /// Collaborator failures come back as `Err` and only affect this member.
    fn member_eligibility(
        &self,
        request: &BatchRequest,
        entity_id: &EntityId,
    ) -> Result<Option<SkipReason>, ModerationServiceError> {
        let current = self.store().fetch(entity_id)?;
        let member = request.member(entity_id);

        match self.plan(current.as_ref(), &member) {
            Ok(_) => {}
            Err(ModerationServiceError::Transition(err)) => {
                return Ok(Some(SkipReason::Precondition(err)))
            }
            Err(other) => return Err(other),
        }

        // A rejectable member is PENDING at this point; for kinds with gating fields only
        // incomplete submissions qualify.
        if request.action == Action::Reject {
            if let Some(record) = current.as_ref() {
                let table = TransitionTable::for_kind(record.kind());
                if table.has_gating_fields() && record.status() == Some(ModerationStatus::Pending) {
                    let context = self.context_for(Some(record), Action::Approve)?;
                    if self
                        .engine()
                        .missing_for_approval(&table, record, &context)
                        .is_empty()
                    {
                        return Ok(Some(SkipReason::SubmissionComplete));
                    }
                }
            }
        }

        Ok(None)
    }
}
