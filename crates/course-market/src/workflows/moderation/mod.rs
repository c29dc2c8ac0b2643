//! Content moderation for the course marketplace.
//!
//! Courses, lectures, exams and enrollment cancellation requests move through one shared
//! review lifecycle. The [`TransitionEngine`] evaluates a request against the per-kind
//! [`TransitionTable`]; [`ModerationService`] commits the result with an optimistic version
//! check and then notifies the counterpart. Batches and dashboard projections are layered
//! on top of the same service.

pub mod batch;
pub mod domain;
pub mod engine;
pub mod memory;
pub mod notification;
pub mod projection;
pub mod repository;
pub mod router;
pub mod service;
pub mod table;

#[cfg(test)]
mod tests;

pub use batch::{BatchPlan, BatchRequest, BatchResult, SkipReason, SkippedEntity};
pub use domain::{
    Action, Actor, ActorId, ActorRole, CancellationDetails, CourseDetails, CourseLevel,
    EnrollmentId, EntityId, EntityKind, EntitySubject, ExamDetails, InstructorProfile,
    LectureDetails, ModerationRecord, ModerationStatus, ReviewState, TransitionEvent,
    TransitionPayload, TransitionRequest,
};
pub use engine::{
    DownstreamEffect, EvaluationContext, PlannedCommit, PlannedTransition, TransitionEngine,
    TransitionError,
};
pub use memory::{
    InMemoryDispatcher, InMemoryEnrollmentLedger, InMemoryEntityStore,
    InMemoryInstructorDirectory,
};
pub use notification::{Notification, NotificationType, RetryingDispatcher};
pub use projection::{EntityStatusView, ModerationQuery, StatusCounts};
pub use repository::{
    DispatchError, EnrollmentLedger, EnrollmentStatus, EntityStore, InstructorDirectory,
    LedgerError, NotificationDispatcher, RepositoryError,
};
pub use router::{actor_from_headers, moderation_router, ACTOR_ID_HEADER, ACTOR_ROLE_HEADER};
pub use service::{ModerationService, ModerationServiceError, TransitionOutcome};
pub use table::{Edge, EdgeOutcome, TransitionTable};
