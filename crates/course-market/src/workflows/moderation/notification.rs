use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::domain::{Action, ActorId, EntityId, EntityKind};
use super::repository::{DispatchError, NotificationDispatcher};

/// Closed set of notification tags the dispatcher understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationType {
    CourseApproved,
    CourseRejected,
    CourseResubmitted,
    CourseDeleted,
    LectureApproved,
    LectureRejected,
    LectureResubmitted,
    LectureDeleted,
    ExamDeleted,
    ExamRevisionRequested,
    CancellationApproved,
    CancellationRejected,
}

impl NotificationType {
    /// Tag for a committed `action` on an entity of `kind`, if that edge exists.
    pub fn for_transition(kind: EntityKind, action: Action) -> Option<Self> {
        use NotificationType::*;

        let tag = match (kind, action) {
            (EntityKind::Course, Action::Approve) => CourseApproved,
            (EntityKind::Course, Action::Reject) => CourseRejected,
            (EntityKind::Course, Action::Resubmit) => CourseResubmitted,
            (EntityKind::Course, Action::Delete) => CourseDeleted,
            (EntityKind::Lecture, Action::Approve) => LectureApproved,
            (EntityKind::Lecture, Action::Reject) => LectureRejected,
            (EntityKind::Lecture, Action::Resubmit) => LectureResubmitted,
            (EntityKind::Lecture, Action::Delete) => LectureDeleted,
            (EntityKind::Exam, Action::Delete) => ExamDeleted,
            (EntityKind::Exam, Action::RequestRevision) => ExamRevisionRequested,
            (EntityKind::CancellationRequest, Action::Approve) => CancellationApproved,
            (EntityKind::CancellationRequest, Action::Reject) => CancellationRejected,
            _ => return None,
        };
        Some(tag)
    }

    pub const fn label(self) -> &'static str {
        match self {
            NotificationType::CourseApproved => "COURSE_APPROVED",
            NotificationType::CourseRejected => "COURSE_REJECTED",
            NotificationType::CourseResubmitted => "COURSE_RESUBMITTED",
            NotificationType::CourseDeleted => "COURSE_DELETED",
            NotificationType::LectureApproved => "LECTURE_APPROVED",
            NotificationType::LectureRejected => "LECTURE_REJECTED",
            NotificationType::LectureResubmitted => "LECTURE_RESUBMITTED",
            NotificationType::LectureDeleted => "LECTURE_DELETED",
            NotificationType::ExamDeleted => "EXAM_DELETED",
            NotificationType::ExamRevisionRequested => "EXAM_REVISION_REQUESTED",
            NotificationType::CancellationApproved => "CANCELLATION_APPROVED",
            NotificationType::CancellationRejected => "CANCELLATION_REJECTED",
        }
    }

    fn verb(self) -> &'static str {
        match self {
            NotificationType::CourseApproved
            | NotificationType::LectureApproved
            | NotificationType::CancellationApproved => "was approved",
            NotificationType::CourseRejected
            | NotificationType::LectureRejected
            | NotificationType::CancellationRejected => "was rejected",
            NotificationType::CourseResubmitted | NotificationType::LectureResubmitted => {
                "was resubmitted for review"
            }
            NotificationType::CourseDeleted
            | NotificationType::LectureDeleted
            | NotificationType::ExamDeleted => "was deleted",
            NotificationType::ExamRevisionRequested => "needs revision",
        }
    }
}

impl fmt::Display for NotificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Record handed to the dispatcher after a committed transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub target: ActorId,
    pub notification_type: NotificationType,
    pub title: String,
    pub link_target: String,
    pub entity_id: EntityId,
}

impl Notification {
    pub(crate) fn build(
        target: ActorId,
        notification_type: NotificationType,
        kind: EntityKind,
        entity_id: &EntityId,
        display_name: &str,
        reason: Option<&str>,
    ) -> Self {
        let mut title = format!(
            "{} '{}' {}",
            capitalized(kind),
            display_name,
            notification_type.verb()
        );
        if let Some(reason) = reason {
            title.push_str(": ");
            title.push_str(reason);
        }

        Self {
            target,
            notification_type,
            title,
            link_target: format!("/{}s/{}", kind.label(), entity_id.0),
            entity_id: entity_id.clone(),
        }
    }
}

fn capitalized(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Course => "Course",
        EntityKind::Lecture => "Lecture",
        EntityKind::Exam => "Exam",
        EntityKind::CancellationRequest => "Cancellation request for",
    }
}

/// Dispatcher decorator that retries transient failures before giving up.
pub struct RetryingDispatcher<N> {
    inner: N,
    attempts: u32,
}

impl<N> RetryingDispatcher<N> {
    pub fn new(inner: N, attempts: u32) -> Self {
        Self {
            inner,
            attempts: attempts.max(1),
        }
    }

    pub fn inner(&self) -> &N {
        &self.inner
    }
}

impl<N> NotificationDispatcher for RetryingDispatcher<N>
where
    N: NotificationDispatcher,
{
    fn enqueue(&self, notification: Notification) -> Result<(), DispatchError> {
        let mut last_error = None;
        for attempt in 1..=self.attempts {
            match self.inner.enqueue(notification.clone()) {
                Ok(()) => return Ok(()),
                Err(err) => {
                    warn!(
                        attempt,
                        notification_type = %notification.notification_type,
                        entity_id = %notification.entity_id,
                        error = %err,
                        "notification enqueue failed"
                    );
                    last_error = Some(err);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| DispatchError::Transport("no attempts made".to_string())))
    }
}
