use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::engine::TransitionError;

/// Identifier wrapper for moderated entities.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub String);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity handed to the workflow by the external auth collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ActorId(pub String);

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EnrollmentId(pub String);

impl fmt::Display for EnrollmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The four entity families that move through moderation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Course,
    Lecture,
    Exam,
    CancellationRequest,
}

impl EntityKind {
    pub const ALL: [EntityKind; 4] = [
        EntityKind::Course,
        EntityKind::Lecture,
        EntityKind::Exam,
        EntityKind::CancellationRequest,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            EntityKind::Course => "course",
            EntityKind::Lecture => "lecture",
            EntityKind::Exam => "exam",
            EntityKind::CancellationRequest => "cancellation_request",
        }
    }

    /// Prefix used when minting identifiers for new submissions.
    pub(crate) const fn id_prefix(self) -> &'static str {
        match self {
            EntityKind::Course => "course",
            EntityKind::Lecture => "lecture",
            EntityKind::Exam => "exam",
            EntityKind::CancellationRequest => "cancel",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for EntityKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "course" | "courses" => Ok(EntityKind::Course),
            "lecture" | "lectures" => Ok(EntityKind::Lecture),
            "exam" | "exams" => Ok(EntityKind::Exam),
            "cancellation_request" | "cancellation" | "cancellations" => {
                Ok(EntityKind::CancellationRequest)
            }
            other => Err(format!("unknown entity kind '{other}'")),
        }
    }
}

/// Role the caller is acting in for a single request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    Owner,
    Reviewer,
}

impl ActorRole {
    pub const fn label(self) -> &'static str {
        match self {
            ActorRole::Owner => "owner",
            ActorRole::Reviewer => "reviewer",
        }
    }
}

impl fmt::Display for ActorRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ActorRole {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "owner" | "instructor" | "student" => Ok(ActorRole::Owner),
            "reviewer" | "admin" => Ok(ActorRole::Reviewer),
            other => Err(format!("unknown actor role '{other}'")),
        }
    }
}

/// Acting identity. Always passed explicitly; never read from ambient session state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: ActorId,
    pub role: ActorRole,
}

impl Actor {
    pub fn owner(id: impl Into<String>) -> Self {
        Self {
            id: ActorId(id.into()),
            role: ActorRole::Owner,
        }
    }

    pub fn reviewer(id: impl Into<String>) -> Self {
        Self {
            id: ActorId(id.into()),
            role: ActorRole::Reviewer,
        }
    }
}

/// Moderation actions. The set is closed; unknown values are a caller bug.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Approve,
    Reject,
    Resubmit,
    Delete,
    RequestRevision,
}

impl Action {
    pub const fn label(self) -> &'static str {
        match self {
            Action::Approve => "approve",
            Action::Reject => "reject",
            Action::Resubmit => "resubmit",
            Action::Delete => "delete",
            Action::RequestRevision => "request_revision",
        }
    }

    pub const fn requires_reason(self) -> bool {
        matches!(
            self,
            Action::Reject | Action::Delete | Action::RequestRevision
        )
    }

    /// Role allowed to issue this action against an entity of `kind`.
    pub const fn required_role(self, kind: EntityKind) -> ActorRole {
        match (self, kind) {
            (Action::Resubmit, _) => ActorRole::Owner,
            (Action::Delete, EntityKind::Exam) => ActorRole::Reviewer,
            (Action::Delete, _) => ActorRole::Owner,
            (Action::Approve | Action::Reject | Action::RequestRevision, _) => ActorRole::Reviewer,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Action {
    type Err = TransitionError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "approve" => Ok(Action::Approve),
            "reject" => Ok(Action::Reject),
            "resubmit" => Ok(Action::Resubmit),
            "delete" => Ok(Action::Delete),
            "request_revision" => Ok(Action::RequestRevision),
            _ => Err(TransitionError::Unsupported(value.to_string())),
        }
    }
}

/// Flat status label used by queries and views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ModerationStatus {
    Pending,
    Approved,
    Rejected,
}

impl ModerationStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ModerationStatus::Pending => "PENDING",
            ModerationStatus::Approved => "APPROVED",
            ModerationStatus::Rejected => "REJECTED",
        }
    }
}

impl fmt::Display for ModerationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ModerationStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Ok(ModerationStatus::Pending),
            "APPROVED" => Ok(ModerationStatus::Approved),
            "REJECTED" => Ok(ModerationStatus::Rejected),
            other => Err(format!("unknown moderation status '{other}'")),
        }
    }
}

/// Stored review state. The rejection reason lives inside the `Rejected` variant so a
/// rejected entity without a reason cannot be built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "status",
    rename_all = "SCREAMING_SNAKE_CASE",
    try_from = "StoredReviewState"
)]
pub enum ReviewState {
    Pending,
    Approved,
    Rejected { reason: String },
}

/// Wire shape of [`ReviewState`] before the reason is checked.
#[derive(Deserialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
enum StoredReviewState {
    Pending,
    Approved,
    Rejected { reason: String },
}

impl TryFrom<StoredReviewState> for ReviewState {
    type Error = String;

    fn try_from(stored: StoredReviewState) -> Result<Self, Self::Error> {
        match stored {
            StoredReviewState::Pending => Ok(ReviewState::Pending),
            StoredReviewState::Approved => Ok(ReviewState::Approved),
            StoredReviewState::Rejected { reason } => {
                let reason = reason.trim();
                if reason.is_empty() {
                    Err("a rejected entity must carry a non-empty reason".to_string())
                } else {
                    Ok(ReviewState::Rejected {
                        reason: reason.to_string(),
                    })
                }
            }
        }
    }
}

impl ReviewState {
    pub fn status(&self) -> ModerationStatus {
        match self {
            ReviewState::Pending => ModerationStatus::Pending,
            ReviewState::Approved => ModerationStatus::Approved,
            ReviewState::Rejected { .. } => ModerationStatus::Rejected,
        }
    }

    pub fn reject_reason(&self) -> Option<&str> {
        match self {
            ReviewState::Rejected { reason } => Some(reason.as_str()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CourseLevel {
    Beginner,
    Intermediate,
    Advanced,
}

/// Instructor-authored course. Every field gates approval.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseDetails {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub level: Option<CourseLevel>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub price: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LectureDetails {
    pub course_id: EntityId,
    pub title: String,
    #[serde(default)]
    pub video_url: Option<String>,
    #[serde(default)]
    pub duration_seconds: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExamDetails {
    pub course_id: EntityId,
    pub title: String,
    #[serde(default)]
    pub question_count: u32,
}

/// Student request to leave a course they are enrolled in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancellationDetails {
    pub enrollment_id: EnrollmentId,
    pub course_id: EntityId,
    #[serde(default)]
    pub student_reason: Option<String>,
}

/// Domain payload of a moderated entity, tagged by kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntitySubject {
    Course(CourseDetails),
    Lecture(LectureDetails),
    Exam(ExamDetails),
    CancellationRequest(CancellationDetails),
}

impl EntitySubject {
    pub fn kind(&self) -> EntityKind {
        match self {
            EntitySubject::Course(_) => EntityKind::Course,
            EntitySubject::Lecture(_) => EntityKind::Lecture,
            EntitySubject::Exam(_) => EntityKind::Exam,
            EntitySubject::CancellationRequest(_) => EntityKind::CancellationRequest,
        }
    }

    /// Human readable name used in notification titles.
    pub fn display_name(&self) -> String {
        match self {
            EntitySubject::Course(course) => course
                .title
                .clone()
                .filter(|title| !title.trim().is_empty())
                .unwrap_or_else(|| "untitled course".to_string()),
            EntitySubject::Lecture(lecture) => lecture.title.clone(),
            EntitySubject::Exam(exam) => exam.title.clone(),
            EntitySubject::CancellationRequest(request) => {
                format!("enrollment {}", request.enrollment_id)
            }
        }
    }

    /// Course the entity hangs off, used for enrollment guards.
    pub fn course_id(&self) -> Option<&EntityId> {
        match self {
            EntitySubject::Course(_) => None,
            EntitySubject::Lecture(lecture) => Some(&lecture.course_id),
            EntitySubject::Exam(exam) => Some(&exam.course_id),
            EntitySubject::CancellationRequest(request) => Some(&request.course_id),
        }
    }
}

/// Profile fields an instructor must complete before any of their courses is approved.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstructorProfile {
    pub name: Option<String>,
    pub email: Option<String>,
    pub bio: Option<String>,
    pub career_years: Option<u16>,
    pub resume_file_path: Option<String>,
}

impl InstructorProfile {
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if is_blank(&self.name) {
            missing.push("instructor.name");
        }
        if is_blank(&self.email) {
            missing.push("instructor.email");
        }
        if is_blank(&self.bio) {
            missing.push("instructor.bio");
        }
        if self.career_years.is_none() {
            missing.push("instructor.career_years");
        }
        if is_blank(&self.resume_file_path) {
            missing.push("instructor.resume_file_path");
        }
        missing
    }
}

pub(crate) fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map(str::trim).unwrap_or_default().is_empty()
}

/// Optional data accompanying an action.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionPayload {
    #[serde(default)]
    pub reason: Option<String>,
    /// Edited domain fields supplied with a resubmission.
    #[serde(default)]
    pub update: Option<EntitySubject>,
}

impl TransitionPayload {
    pub fn with_reason(reason: impl Into<String>) -> Self {
        Self {
            reason: Some(reason.into()),
            update: None,
        }
    }

    pub fn with_update(update: EntitySubject) -> Self {
        Self {
            reason: None,
            update: Some(update),
        }
    }

    /// Trimmed reason, `None` when absent or all whitespace.
    pub fn trimmed_reason(&self) -> Option<String> {
        self.reason
            .as_deref()
            .map(str::trim)
            .filter(|reason| !reason.is_empty())
            .map(str::to_string)
    }
}

/// A single request against one entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionRequest {
    pub entity_id: EntityId,
    pub actor: Actor,
    pub action: Action,
    pub payload: TransitionPayload,
}

/// Immutable audit entry appended on every committed transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionEvent {
    pub actor_id: ActorId,
    pub role: ActorRole,
    pub action: Action,
    pub from: Option<ModerationStatus>,
    pub to: Option<ModerationStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub at: DateTime<Utc>,
}

/// System-of-record entry for a moderated entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModerationRecord {
    pub id: EntityId,
    pub owner_id: ActorId,
    pub subject: EntitySubject,
    /// `None` for exams, which carry no stored review status.
    pub state: Option<ReviewState>,
    pub created_at: DateTime<Utc>,
    pub decided_at: Option<DateTime<Utc>>,
    pub version: u64,
    #[serde(default)]
    pub history: Vec<TransitionEvent>,
}

impl ModerationRecord {
    pub fn kind(&self) -> EntityKind {
        self.subject.kind()
    }

    pub fn status(&self) -> Option<ModerationStatus> {
        self.state.as_ref().map(ReviewState::status)
    }

    pub fn reject_reason(&self) -> Option<&str> {
        self.state.as_ref().and_then(ReviewState::reject_reason)
    }
}
