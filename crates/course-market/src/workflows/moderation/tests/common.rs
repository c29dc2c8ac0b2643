use std::sync::{Arc, Barrier, Mutex};

use axum::response::Response;
use chrono::Utc;
use serde_json::Value;

use crate::config::ModerationConfig;
use crate::workflows::moderation::domain::{
    Actor, ActorId, CancellationDetails, CourseDetails, CourseLevel, EnrollmentId, EntityId,
    EntityKind, EntitySubject, ExamDetails, InstructorProfile, LectureDetails, ModerationRecord,
    ReviewState,
};
use crate::workflows::moderation::memory::{
    InMemoryDispatcher, InMemoryEnrollmentLedger, InMemoryEntityStore,
    InMemoryInstructorDirectory,
};
use crate::workflows::moderation::notification::Notification;
use crate::workflows::moderation::repository::{
    DispatchError, EntityStore, InstructorDirectory, NotificationDispatcher, RepositoryError,
};
use crate::workflows::moderation::ModerationService;

pub(super) const INSTRUCTOR: &str = "instructor-7";
pub(super) const STUDENT: &str = "student-3";
pub(super) const REVIEWER: &str = "admin-1";
pub(super) const REVIEW_INBOX: &str = "moderation-inbox";

pub(super) fn instructor() -> Actor {
    Actor::owner(INSTRUCTOR)
}

pub(super) fn student() -> Actor {
    Actor::owner(STUDENT)
}

pub(super) fn reviewer() -> Actor {
    Actor::reviewer(REVIEWER)
}

pub(super) fn config() -> ModerationConfig {
    ModerationConfig {
        review_inbox: REVIEW_INBOX.to_string(),
        max_batch_size: 10,
    }
}

pub(super) fn complete_course() -> EntitySubject {
    EntitySubject::Course(CourseDetails {
        title: Some("Rust for Backend Engineers".to_string()),
        level: Some(CourseLevel::Intermediate),
        description: Some("Ownership, async and production services.".to_string()),
        price: Some(49_000),
    })
}

pub(super) fn course_without_price() -> EntitySubject {
    EntitySubject::Course(CourseDetails {
        title: Some("Draft Course".to_string()),
        level: Some(CourseLevel::Beginner),
        description: Some("Work in progress".to_string()),
        price: None,
    })
}

pub(super) fn lecture(course: &EntityId, title: &str, video_url: Option<&str>) -> EntitySubject {
    EntitySubject::Lecture(LectureDetails {
        course_id: course.clone(),
        title: title.to_string(),
        video_url: video_url.map(str::to_string),
        duration_seconds: Some(600),
    })
}

pub(super) fn exam(course: &EntityId) -> EntitySubject {
    EntitySubject::Exam(ExamDetails {
        course_id: course.clone(),
        title: "Midterm".to_string(),
        question_count: 20,
    })
}

pub(super) fn cancellation(enrollment: &str, course: &EntityId) -> EntitySubject {
    EntitySubject::CancellationRequest(CancellationDetails {
        enrollment_id: EnrollmentId(enrollment.to_string()),
        course_id: course.clone(),
        student_reason: Some("schedule conflict".to_string()),
    })
}

pub(super) fn complete_profile() -> InstructorProfile {
    InstructorProfile {
        name: Some("Dana Lee".to_string()),
        email: Some("dana@example.com".to_string()),
        bio: Some("Backend engineer".to_string()),
        career_years: Some(8),
        resume_file_path: Some("resumes/dana.pdf".to_string()),
    }
}

/// Standalone record for engine-level tests that bypass the service.
pub(super) fn record(
    id: &str,
    owner: &str,
    subject: EntitySubject,
    state: Option<ReviewState>,
) -> ModerationRecord {
    ModerationRecord {
        id: EntityId(id.to_string()),
        owner_id: ActorId(owner.to_string()),
        subject,
        state,
        created_at: Utc::now(),
        decided_at: None,
        version: 0,
        history: Vec::new(),
    }
}

pub(super) struct Harness {
    pub service: Arc<ModerationService<InMemoryEntityStore, InMemoryDispatcher>>,
    pub store: InMemoryEntityStore,
    pub dispatcher: InMemoryDispatcher,
    pub profiles: InMemoryInstructorDirectory,
    pub ledger: InMemoryEnrollmentLedger,
}

pub(super) fn harness() -> Harness {
    let store = InMemoryEntityStore::default();
    let dispatcher = InMemoryDispatcher::default();
    let profiles = InMemoryInstructorDirectory::default();
    let ledger = InMemoryEnrollmentLedger::default();

    let service = Arc::new(ModerationService::new(
        Arc::new(store.clone()),
        Arc::new(dispatcher.clone()),
        Arc::new(profiles.clone()),
        Arc::new(ledger.clone()),
        &config(),
    ));

    Harness {
        service,
        store,
        dispatcher,
        profiles,
        ledger,
    }
}

impl Harness {
    pub(super) fn with_complete_profile(self) -> Self {
        self.profiles
            .upsert(ActorId(INSTRUCTOR.to_string()), complete_profile())
            .expect("profile stored");
        self
    }

    pub(super) fn submit(&self, actor: &Actor, subject: EntitySubject) -> EntityId {
        self.service
            .submit(actor, subject)
            .expect("submission accepted")
            .id
    }

    pub(super) fn stored(&self, id: &EntityId) -> ModerationRecord {
        self.store
            .fetch(id)
            .expect("store reachable")
            .expect("record present")
    }
}

/// Dispatcher that always refuses, for exercising the fire-and-forget path.
#[derive(Default, Clone)]
pub(super) struct FailingDispatcher {
    pub attempts: Arc<Mutex<u32>>,
}

impl FailingDispatcher {
    pub(super) fn attempts(&self) -> u32 {
        *self.attempts.lock().expect("attempts mutex")
    }
}

impl NotificationDispatcher for FailingDispatcher {
    fn enqueue(&self, _notification: Notification) -> Result<(), DispatchError> {
        *self.attempts.lock().expect("attempts mutex") += 1;
        Err(DispatchError::Transport("smtp relay down".to_string()))
    }
}

/// Fails the first `failures` enqueues, then delegates.
pub(super) struct FlakyDispatcher {
    pub remaining_failures: Mutex<u32>,
    pub inner: InMemoryDispatcher,
}

impl NotificationDispatcher for FlakyDispatcher {
    fn enqueue(&self, notification: Notification) -> Result<(), DispatchError> {
        let mut remaining = self.remaining_failures.lock().expect("failures mutex");
        if *remaining > 0 {
            *remaining -= 1;
            return Err(DispatchError::Transport("queue busy".to_string()));
        }
        self.inner.enqueue(notification)
    }
}

/// Store whose reads always fail.
pub(super) struct UnavailableStore;

impl EntityStore for UnavailableStore {
    fn insert(&self, _record: ModerationRecord) -> Result<ModerationRecord, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn fetch(&self, _id: &EntityId) -> Result<Option<ModerationRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn commit(
        &self,
        _expected_version: u64,
        _record: ModerationRecord,
    ) -> Result<ModerationRecord, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn remove(
        &self,
        _id: &EntityId,
        _expected_version: u64,
    ) -> Result<ModerationRecord, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn list(&self, _kind: Option<EntityKind>) -> Result<Vec<ModerationRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

/// Store that fails reads and writes for one entity and delegates the rest.
pub(super) struct ShardedStore {
    pub inner: InMemoryEntityStore,
    pub offline: EntityId,
}

impl ShardedStore {
    fn check(&self, id: &EntityId) -> Result<(), RepositoryError> {
        if id == &self.offline {
            return Err(RepositoryError::Unavailable("shard down".to_string()));
        }
        Ok(())
    }
}

impl EntityStore for ShardedStore {
    fn insert(&self, record: ModerationRecord) -> Result<ModerationRecord, RepositoryError> {
        self.inner.insert(record)
    }

    fn fetch(&self, id: &EntityId) -> Result<Option<ModerationRecord>, RepositoryError> {
        self.check(id)?;
        self.inner.fetch(id)
    }

    fn commit(
        &self,
        expected_version: u64,
        record: ModerationRecord,
    ) -> Result<ModerationRecord, RepositoryError> {
        self.check(&record.id)?;
        self.inner.commit(expected_version, record)
    }

    fn remove(
        &self,
        id: &EntityId,
        expected_version: u64,
    ) -> Result<ModerationRecord, RepositoryError> {
        self.check(id)?;
        self.inner.remove(id, expected_version)
    }

    fn list(&self, kind: Option<EntityKind>) -> Result<Vec<ModerationRecord>, RepositoryError> {
        self.inner.list(kind)
    }
}

/// Instructor directory that cannot be reached.
pub(super) struct OfflineDirectory;

impl InstructorDirectory for OfflineDirectory {
    fn profile(&self, _instructor: &ActorId) -> Result<Option<InstructorProfile>, RepositoryError> {
        Err(RepositoryError::Unavailable("profile service offline".to_string()))
    }
}

/// Store that holds every `fetch` at a barrier so two callers read the same version
/// before either commits.
pub(super) struct RacingStore {
    pub inner: InMemoryEntityStore,
    pub barrier: Arc<Barrier>,
}

impl EntityStore for RacingStore {
    fn insert(&self, record: ModerationRecord) -> Result<ModerationRecord, RepositoryError> {
        self.inner.insert(record)
    }

    fn fetch(&self, id: &EntityId) -> Result<Option<ModerationRecord>, RepositoryError> {
        let record = self.inner.fetch(id)?;
        self.barrier.wait();
        Ok(record)
    }

    fn commit(
        &self,
        expected_version: u64,
        record: ModerationRecord,
    ) -> Result<ModerationRecord, RepositoryError> {
        self.inner.commit(expected_version, record)
    }

    fn remove(
        &self,
        id: &EntityId,
        expected_version: u64,
    ) -> Result<ModerationRecord, RepositoryError> {
        self.inner.remove(id, expected_version)
    }

    fn list(&self, kind: Option<EntityKind>) -> Result<Vec<ModerationRecord>, RepositoryError> {
        self.inner.list(kind)
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("body readable");
    serde_json::from_slice(&body).expect("body is json")
}
