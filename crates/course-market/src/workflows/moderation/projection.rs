use chrono::{DateTime, Utc};
use serde::Serialize;

use super::domain::{ActorId, EntityId, EntityKind, ModerationRecord, ModerationStatus};
use super::repository::{EntityStore, NotificationDispatcher};
use super::service::{ModerationService, ModerationServiceError};

/// Dashboard filters. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModerationQuery {
    pub kind: Option<EntityKind>,
    pub status: Option<ModerationStatus>,
    pub owner: Option<ActorId>,
}

impl ModerationQuery {
    pub fn matches(&self, record: &ModerationRecord) -> bool {
        self.kind.map_or(true, |kind| record.kind() == kind)
            && self
                .status
                .map_or(true, |status| record.status() == Some(status))
            && self
                .owner
                .as_ref()
                .map_or(true, |owner| &record.owner_id == owner)
    }
}

/// Sanitized read model of an entity's moderation state.
#[derive(Debug, Clone, Serialize)]
pub struct EntityStatusView {
    pub entity_id: EntityId,
    pub kind: EntityKind,
    pub owner_id: ActorId,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reject_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decided_at: Option<DateTime<Utc>>,
    pub version: u64,
}

impl ModerationRecord {
    pub fn status_view(&self) -> EntityStatusView {
        EntityStatusView {
            entity_id: self.id.clone(),
            kind: self.kind(),
            owner_id: self.owner_id.clone(),
            title: self.subject.display_name(),
            status: self.status().map(ModerationStatus::label),
            reject_reason: self.reject_reason().map(str::to_string),
            created_at: self.created_at,
            decided_at: self.decided_at,
            version: self.version,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub pending: usize,
    pub approved: usize,
    pub rejected: usize,
    /// Entities without a stored status (exams).
    pub unmoderated: usize,
}

impl StatusCounts {
    pub fn total(&self) -> usize {
        self.pending + self.approved + self.rejected + self.unmoderated
    }
}

pub fn project(records: &[ModerationRecord], query: &ModerationQuery) -> Vec<EntityStatusView> {
    let mut matching: Vec<&ModerationRecord> =
        records.iter().filter(|record| query.matches(record)).collect();
    matching.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
    matching.into_iter().map(ModerationRecord::status_view).collect()
}

pub fn count_by_status(records: &[ModerationRecord]) -> StatusCounts {
    records
        .iter()
        .fold(StatusCounts::default(), |mut counts, record| {
            match record.status() {
                Some(ModerationStatus::Pending) => counts.pending += 1,
                Some(ModerationStatus::Approved) => counts.approved += 1,
                Some(ModerationStatus::Rejected) => counts.rejected += 1,
                None => counts.unmoderated += 1,
            }
            counts
        })
}

impl<S, N> ModerationService<S, N>
where
    S: EntityStore + 'static,
    N: NotificationDispatcher + 'static,
{
    pub fn list(
        &self,
        query: &ModerationQuery,
    ) -> Result<Vec<EntityStatusView>, ModerationServiceError> {
        let records = self.store().list(query.kind)?;
        Ok(project(&records, query))
    }

    pub fn counts(&self, kind: EntityKind) -> Result<StatusCounts, ModerationServiceError> {
        let records = self.store().list(Some(kind))?;
        Ok(count_by_status(&records))
    }
}
