use serde::{Deserialize, Serialize};

use super::domain::{
    ActorId, EnrollmentId, EntityId, EntityKind, InstructorProfile, ModerationRecord,
};
use super::notification::Notification;

/// System of record for moderated entities.
///
/// Writes are optimistic: `commit` and `remove` only succeed when the stored version still
/// equals `expected_version`, so a decision taken against a stale read never lands.
pub trait EntityStore: Send + Sync {
    fn insert(&self, record: ModerationRecord) -> Result<ModerationRecord, RepositoryError>;
    fn fetch(&self, id: &EntityId) -> Result<Option<ModerationRecord>, RepositoryError>;
    /// Store `record` in place of the current entry and return it with its bumped version.
    fn commit(
        &self,
        expected_version: u64,
        record: ModerationRecord,
    ) -> Result<ModerationRecord, RepositoryError>;
    fn remove(
        &self,
        id: &EntityId,
        expected_version: u64,
    ) -> Result<ModerationRecord, RepositoryError>;
    fn list(&self, kind: Option<EntityKind>) -> Result<Vec<ModerationRecord>, RepositoryError>;
}

/// Error enumeration for store failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("version conflict (expected {expected}, found {found})")]
    VersionConflict { expected: u64, found: u64 },
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Outbound notification hook. Delivery, read tracking and retention live behind it.
pub trait NotificationDispatcher: Send + Sync {
    fn enqueue(&self, notification: Notification) -> Result<(), DispatchError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
}

/// Read access to instructor profiles, consulted before a course is approved.
pub trait InstructorDirectory: Send + Sync {
    fn profile(&self, instructor: &ActorId) -> Result<Option<InstructorProfile>, RepositoryError>;
}

/// Enrollment state owned by the billing/enrollment subsystem.
pub trait EnrollmentLedger: Send + Sync {
    fn status(&self, enrollment: &EnrollmentId) -> Result<Option<EnrollmentStatus>, LedgerError>;
    /// Move an enrollment out of `Enrolled` after an approved cancellation request.
    fn cancel(&self, enrollment: &EnrollmentId) -> Result<EnrollmentStatus, LedgerError>;
    fn active_enrollments(&self, course: &EntityId) -> Result<usize, LedgerError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EnrollmentStatus {
    Enrolled,
    Cancelled,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("enrollment {0} not found")]
    UnknownEnrollment(EnrollmentId),
    #[error("enrollment ledger unavailable: {0}")]
    Unavailable(String),
}
