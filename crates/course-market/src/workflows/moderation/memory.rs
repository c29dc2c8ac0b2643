//! In-memory adapters for the moderation collaborators.
//!
//! State lives in process memory and is lost on restart. Used by the demo binary and by
//! tests; production deployments plug in their own store and dispatcher.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use super::domain::{
    ActorId, EnrollmentId, EntityId, EntityKind, InstructorProfile, ModerationRecord,
};
use super::notification::Notification;
use super::repository::{
    DispatchError, EnrollmentLedger, EnrollmentStatus, EntityStore, InstructorDirectory,
    LedgerError, NotificationDispatcher, RepositoryError,
};

fn lock<'a, T>(mutex: &'a Mutex<T>, what: &str) -> Result<MutexGuard<'a, T>, RepositoryError> {
    mutex
        .lock()
        .map_err(|_| RepositoryError::Unavailable(format!("{what} mutex poisoned")))
}

/// Versioned entity store; writes check the expected version under a single lock.
#[derive(Default, Clone)]
pub struct InMemoryEntityStore {
    records: Arc<Mutex<HashMap<EntityId, ModerationRecord>>>,
}

impl EntityStore for InMemoryEntityStore {
    fn insert(&self, record: ModerationRecord) -> Result<ModerationRecord, RepositoryError> {
        let mut guard = lock(&self.records, "entity store")?;
        if guard.contains_key(&record.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    fn fetch(&self, id: &EntityId) -> Result<Option<ModerationRecord>, RepositoryError> {
        let guard = lock(&self.records, "entity store")?;
        Ok(guard.get(id).cloned())
    }

    fn commit(
        &self,
        expected_version: u64,
        mut record: ModerationRecord,
    ) -> Result<ModerationRecord, RepositoryError> {
        let mut guard = lock(&self.records, "entity store")?;
        let stored = guard.get(&record.id).ok_or(RepositoryError::NotFound)?;
        if stored.version != expected_version {
            return Err(RepositoryError::VersionConflict {
                expected: expected_version,
                found: stored.version,
            });
        }
        record.version = expected_version + 1;
        guard.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    fn remove(
        &self,
        id: &EntityId,
        expected_version: u64,
    ) -> Result<ModerationRecord, RepositoryError> {
        let mut guard = lock(&self.records, "entity store")?;
        let stored = guard.get(id).ok_or(RepositoryError::NotFound)?;
        if stored.version != expected_version {
            return Err(RepositoryError::VersionConflict {
                expected: expected_version,
                found: stored.version,
            });
        }
        guard.remove(id).ok_or(RepositoryError::NotFound)
    }

    fn list(&self, kind: Option<EntityKind>) -> Result<Vec<ModerationRecord>, RepositoryError> {
        let guard = lock(&self.records, "entity store")?;
        Ok(guard
            .values()
            .filter(|record| kind.map_or(true, |kind| record.kind() == kind))
            .cloned()
            .collect())
    }
}

/// Dispatcher that keeps every notification for later inspection.
#[derive(Default, Clone)]
pub struct InMemoryDispatcher {
    events: Arc<Mutex<Vec<Notification>>>,
}

impl InMemoryDispatcher {
    pub fn events(&self) -> Vec<Notification> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    pub fn events_for(&self, target: &ActorId) -> Vec<Notification> {
        self.events()
            .into_iter()
            .filter(|notification| &notification.target == target)
            .collect()
    }
}

impl NotificationDispatcher for InMemoryDispatcher {
    fn enqueue(&self, notification: Notification) -> Result<(), DispatchError> {
        self.events
            .lock()
            .map_err(|_| DispatchError::Transport("notification mutex poisoned".to_string()))?
            .push(notification);
        Ok(())
    }
}

#[derive(Default, Clone)]
pub struct InMemoryInstructorDirectory {
    profiles: Arc<Mutex<HashMap<ActorId, InstructorProfile>>>,
}

impl InMemoryInstructorDirectory {
    pub fn upsert(
        &self,
        instructor: ActorId,
        profile: InstructorProfile,
    ) -> Result<(), RepositoryError> {
        lock(&self.profiles, "instructor directory")?.insert(instructor, profile);
        Ok(())
    }
}

impl InstructorDirectory for InMemoryInstructorDirectory {
    fn profile(&self, instructor: &ActorId) -> Result<Option<InstructorProfile>, RepositoryError> {
        Ok(lock(&self.profiles, "instructor directory")?
            .get(instructor)
            .cloned())
    }
}

#[derive(Debug, Clone)]
struct EnrollmentEntry {
    course: EntityId,
    status: EnrollmentStatus,
}

#[derive(Default, Clone)]
pub struct InMemoryEnrollmentLedger {
    enrollments: Arc<Mutex<HashMap<EnrollmentId, EnrollmentEntry>>>,
}

impl InMemoryEnrollmentLedger {
    fn entries(
        &self,
    ) -> Result<MutexGuard<'_, HashMap<EnrollmentId, EnrollmentEntry>>, LedgerError> {
        self.enrollments
            .lock()
            .map_err(|_| LedgerError::Unavailable("enrollment mutex poisoned".to_string()))
    }

    pub fn enroll(&self, enrollment: EnrollmentId, course: EntityId) -> Result<(), LedgerError> {
        self.entries()?.insert(
            enrollment,
            EnrollmentEntry {
                course,
                status: EnrollmentStatus::Enrolled,
            },
        );
        Ok(())
    }
}

impl EnrollmentLedger for InMemoryEnrollmentLedger {
    fn status(&self, enrollment: &EnrollmentId) -> Result<Option<EnrollmentStatus>, LedgerError> {
        Ok(self.entries()?.get(enrollment).map(|entry| entry.status))
    }

    fn cancel(&self, enrollment: &EnrollmentId) -> Result<EnrollmentStatus, LedgerError> {
        let mut entries = self.entries()?;
        let entry = entries
            .get_mut(enrollment)
            .ok_or_else(|| LedgerError::UnknownEnrollment(enrollment.clone()))?;
        entry.status = EnrollmentStatus::Cancelled;
        Ok(entry.status)
    }

    fn active_enrollments(&self, course: &EntityId) -> Result<usize, LedgerError> {
        Ok(self
            .entries()?
            .values()
            .filter(|entry| &entry.course == course && entry.status == EnrollmentStatus::Enrolled)
            .count())
    }
}
