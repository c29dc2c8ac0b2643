use std::str::FromStr;

use chrono::Utc;

use super::common::*;
use crate::workflows::moderation::domain::{
    Action, Actor, ActorId, EnrollmentId, EntityId, EntityKind, ModerationStatus, ReviewState,
    TransitionPayload, TransitionRequest,
};
use crate::workflows::moderation::engine::{
    DownstreamEffect, EvaluationContext, PlannedCommit, TransitionEngine, TransitionError,
};
use crate::workflows::moderation::notification::NotificationType;
use crate::workflows::moderation::table::{EdgeOutcome, TransitionTable};

fn engine() -> TransitionEngine {
    TransitionEngine::new(ActorId(REVIEW_INBOX.to_string()))
}

fn request(
    id: &str,
    actor: Actor,
    action: Action,
    payload: TransitionPayload,
) -> TransitionRequest {
    TransitionRequest {
        entity_id: EntityId(id.to_string()),
        actor,
        action,
        payload,
    }
}

fn profile_context() -> EvaluationContext {
    EvaluationContext {
        instructor_profile: Some(complete_profile()),
        active_enrollments: 0,
    }
}

#[test]
fn every_edge_has_a_notification_type() {
    for kind in EntityKind::ALL {
        for edge in TransitionTable::for_kind(kind).edges() {
            assert!(
                NotificationType::for_transition(kind, edge.action).is_some(),
                "{kind} {} has no notification",
                edge.action
            );
        }
    }
}

#[test]
fn decisions_only_leave_pending() {
    for kind in EntityKind::ALL {
        for edge in TransitionTable::for_kind(kind).edges() {
            if matches!(edge.action, Action::Approve | Action::Reject) {
                assert_eq!(edge.from, Some(ModerationStatus::Pending), "{kind}");
            }
        }
    }
}

#[test]
fn exams_carry_no_status_edges() {
    let table = TransitionTable::for_kind(EntityKind::Exam);
    assert_eq!(table.initial_status(), None);
    assert!(table.edges().iter().all(|edge| edge.from.is_none()));
    assert!(table
        .edges()
        .iter()
        .all(|edge| !matches!(edge.outcome, EdgeOutcome::Enter(_))));
}

#[test]
fn only_courses_return_to_review_after_approval() {
    let course = TransitionTable::for_kind(EntityKind::Course);
    let lecture = TransitionTable::for_kind(EntityKind::Lecture);
    assert!(course
        .edge(Some(ModerationStatus::Approved), Action::Resubmit)
        .is_some());
    assert!(lecture
        .edge(Some(ModerationStatus::Approved), Action::Resubmit)
        .is_none());
}

#[test]
fn missing_record_is_not_found() {
    let err = engine()
        .evaluate(
            None,
            &request("course-404", reviewer(), Action::Approve, TransitionPayload::default()),
            &EvaluationContext::default(),
            Utc::now(),
        )
        .expect_err("missing entity");
    assert_eq!(err, TransitionError::NotFound(EntityId("course-404".to_string())));
}

#[test]
fn owners_cannot_decide_their_own_submissions() {
    let course = record("course-1", INSTRUCTOR, complete_course(), Some(ReviewState::Pending));
    let err = engine()
        .evaluate(
            Some(&course),
            &request("course-1", instructor(), Action::Approve, TransitionPayload::default()),
            &profile_context(),
            Utc::now(),
        )
        .expect_err("owner may not approve");
    assert!(matches!(err, TransitionError::Forbidden { .. }));
}

#[test]
fn another_owner_cannot_resubmit() {
    let course = record(
        "course-2",
        INSTRUCTOR,
        complete_course(),
        Some(ReviewState::Rejected {
            reason: "thin description".to_string(),
        }),
    );
    let err = engine()
        .evaluate(
            Some(&course),
            &request(
                "course-2",
                Actor::owner("instructor-99"),
                Action::Resubmit,
                TransitionPayload::default(),
            ),
            &EvaluationContext::default(),
            Utc::now(),
        )
        .expect_err("foreign owner");
    assert!(matches!(err, TransitionError::Forbidden { .. }));
}

#[test]
fn role_is_checked_before_state() {
    let approved_lecture = record(
        "lecture-1",
        INSTRUCTOR,
        lecture(&EntityId("course-1".to_string()), "Intro", Some("https://cdn/v.mp4")),
        Some(ReviewState::Approved),
    );
    let err = engine()
        .evaluate(
            Some(&approved_lecture),
            &request("lecture-1", instructor(), Action::Approve, TransitionPayload::default()),
            &EvaluationContext::default(),
            Utc::now(),
        )
        .expect_err("owner approving an approved lecture");
    assert!(matches!(err, TransitionError::Forbidden { .. }));

    let err = engine()
        .evaluate(
            Some(&approved_lecture),
            &request("lecture-1", reviewer(), Action::Approve, TransitionPayload::default()),
            &EvaluationContext::default(),
            Utc::now(),
        )
        .expect_err("approving an approved lecture");
    assert_eq!(
        err,
        TransitionError::InvalidState {
            kind: EntityKind::Lecture,
            action: Action::Approve,
            state: "APPROVED".to_string(),
        }
    );
}

#[test]
fn approval_lists_every_missing_gating_field() {
    let course = record(
        "course-3",
        INSTRUCTOR,
        course_without_price(),
        Some(ReviewState::Pending),
    );
    let context = EvaluationContext {
        instructor_profile: None,
        active_enrollments: 0,
    };
    let err = engine()
        .evaluate(
            Some(&course),
            &request("course-3", reviewer(), Action::Approve, TransitionPayload::default()),
            &context,
            Utc::now(),
        )
        .expect_err("incomplete course");

    let TransitionError::IncompleteSubmission { missing } = err else {
        panic!("expected incomplete submission, got {err:?}");
    };
    assert!(missing.contains(&"price".to_string()));
    assert!(missing.contains(&"instructor.name".to_string()));
    assert!(missing.contains(&"instructor.resume_file_path".to_string()));
    assert!(!missing.contains(&"title".to_string()));
}

#[test]
fn blank_reason_is_rejected() {
    let course = record("course-4", INSTRUCTOR, complete_course(), Some(ReviewState::Pending));
    let err = engine()
        .evaluate(
            Some(&course),
            &request(
                "course-4",
                reviewer(),
                Action::Reject,
                TransitionPayload::with_reason("   "),
            ),
            &profile_context(),
            Utc::now(),
        )
        .expect_err("blank reason");
    assert_eq!(err, TransitionError::ReasonRequired(Action::Reject));
}

#[test]
fn rejection_records_reason_and_notifies_owner() {
    let now = Utc::now();
    let course = record("course-5", INSTRUCTOR, complete_course(), Some(ReviewState::Pending));
    let plan = engine()
        .evaluate(
            Some(&course),
            &request(
                "course-5",
                reviewer(),
                Action::Reject,
                TransitionPayload::with_reason("  audio is unclear "),
            ),
            &profile_context(),
            now,
        )
        .expect("rejection planned");

    let PlannedCommit::Replace(next) = &plan.commit else {
        panic!("rejection replaces the record");
    };
    assert_eq!(
        next.state,
        Some(ReviewState::Rejected {
            reason: "audio is unclear".to_string()
        })
    );
    assert_eq!(next.decided_at, Some(now));
    assert_eq!(next.history.len(), 1);
    assert_eq!(plan.event.from, Some(ModerationStatus::Pending));
    assert_eq!(plan.event.to, Some(ModerationStatus::Rejected));
    assert_eq!(plan.notification.target, ActorId(INSTRUCTOR.to_string()));
    assert_eq!(
        plan.notification.notification_type,
        NotificationType::CourseRejected
    );
    assert!(plan.notification.title.ends_with("audio is unclear"));
    assert_eq!(plan.notification.link_target, "/courses/course-5");
}

#[test]
fn resubmission_clears_reason_and_notifies_review_inbox() {
    let course = record(
        "course-6",
        INSTRUCTOR,
        course_without_price(),
        Some(ReviewState::Rejected {
            reason: "price missing".to_string(),
        }),
    );
    let plan = engine()
        .evaluate(
            Some(&course),
            &request(
                "course-6",
                instructor(),
                Action::Resubmit,
                TransitionPayload::with_update(complete_course()),
            ),
            &EvaluationContext::default(),
            Utc::now(),
        )
        .expect("resubmission planned");

    let PlannedCommit::Replace(next) = &plan.commit else {
        panic!("resubmission replaces the record");
    };
    assert_eq!(next.state, Some(ReviewState::Pending));
    assert_eq!(next.reject_reason(), None);
    assert_eq!(next.decided_at, None);
    assert_eq!(next.subject, complete_course());
    assert_eq!(plan.notification.target, ActorId(REVIEW_INBOX.to_string()));
    assert_eq!(
        plan.notification.notification_type,
        NotificationType::CourseResubmitted
    );
}

#[test]
fn resubmission_with_foreign_kind_is_unsupported() {
    let course = record(
        "course-7",
        INSTRUCTOR,
        complete_course(),
        Some(ReviewState::Rejected {
            reason: "blurry".to_string(),
        }),
    );
    let err = engine()
        .evaluate(
            Some(&course),
            &request(
                "course-7",
                instructor(),
                Action::Resubmit,
                TransitionPayload::with_update(exam(&EntityId("course-7".to_string()))),
            ),
            &EvaluationContext::default(),
            Utc::now(),
        )
        .expect_err("kind mismatch");
    assert!(matches!(err, TransitionError::Unsupported(_)));
}

#[test]
fn pending_entities_cannot_be_deleted_by_owner() {
    let course = record("course-8", INSTRUCTOR, complete_course(), Some(ReviewState::Pending));
    let err = engine()
        .evaluate(
            Some(&course),
            &request(
                "course-8",
                instructor(),
                Action::Delete,
                TransitionPayload::with_reason("changed my mind"),
            ),
            &EvaluationContext::default(),
            Utc::now(),
        )
        .expect_err("pending delete");
    assert!(matches!(err, TransitionError::InvalidState { .. }));
}

#[test]
fn approved_course_with_enrollments_cannot_be_deleted() {
    let course = record("course-9", INSTRUCTOR, complete_course(), Some(ReviewState::Approved));
    let context = EvaluationContext {
        instructor_profile: None,
        active_enrollments: 3,
    };
    let err = engine()
        .evaluate(
            Some(&course),
            &request(
                "course-9",
                instructor(),
                Action::Delete,
                TransitionPayload::with_reason("retiring"),
            ),
            &context,
            Utc::now(),
        )
        .expect_err("enrolled course");
    let TransitionError::InvalidState { state, .. } = err else {
        panic!("expected invalid state");
    };
    assert!(state.contains("3 active enrollments"));
}

#[test]
fn exam_revision_request_leaves_exam_untouched() {
    let exam_record = record("exam-1", INSTRUCTOR, exam(&EntityId("course-1".to_string())), None);
    let plan = engine()
        .evaluate(
            Some(&exam_record),
            &request(
                "exam-1",
                reviewer(),
                Action::RequestRevision,
                TransitionPayload::with_reason("question 4 has two answers"),
            ),
            &EvaluationContext::default(),
            Utc::now(),
        )
        .expect("revision planned");

    assert_eq!(plan.commit, PlannedCommit::Untouched);
    assert_eq!(plan.event.from, None);
    assert_eq!(plan.event.to, None);
    assert_eq!(
        plan.notification.notification_type,
        NotificationType::ExamRevisionRequested
    );
    assert_eq!(plan.notification.target, ActorId(INSTRUCTOR.to_string()));
}

#[test]
fn exams_are_never_approved() {
    let exam_record = record("exam-2", INSTRUCTOR, exam(&EntityId("course-1".to_string())), None);
    let err = engine()
        .evaluate(
            Some(&exam_record),
            &request("exam-2", reviewer(), Action::Approve, TransitionPayload::default()),
            &EvaluationContext::default(),
            Utc::now(),
        )
        .expect_err("exam approval");
    assert_eq!(
        err,
        TransitionError::InvalidState {
            kind: EntityKind::Exam,
            action: Action::Approve,
            state: "unmoderated".to_string(),
        }
    );
}

#[test]
fn approved_cancellation_schedules_enrollment_cancel() {
    let request_record = record(
        "cancel-1",
        STUDENT,
        cancellation("enr-1", &EntityId("course-1".to_string())),
        Some(ReviewState::Pending),
    );
    let plan = engine()
        .evaluate(
            Some(&request_record),
            &request("cancel-1", reviewer(), Action::Approve, TransitionPayload::default()),
            &EvaluationContext::default(),
            Utc::now(),
        )
        .expect("approval planned");

    assert_eq!(
        plan.effect,
        Some(DownstreamEffect::CancelEnrollment(EnrollmentId(
            "enr-1".to_string()
        )))
    );
    assert_eq!(
        plan.notification.notification_type,
        NotificationType::CancellationApproved
    );
    assert_eq!(plan.notification.target, ActorId(STUDENT.to_string()));
}

#[test]
fn unknown_action_is_unsupported() {
    let err = Action::from_str("publish").expect_err("unknown action");
    assert_eq!(err.code(), "unsupported");
    assert_eq!(
        Action::from_str("request-revision").expect("dashed alias"),
        Action::RequestRevision
    );
}

#[test]
fn stored_rejection_requires_a_reason() {
    let blank: Result<ReviewState, _> =
        serde_json::from_value(serde_json::json!({ "status": "REJECTED", "reason": "  " }));
    assert!(blank.is_err());

    let stored: ReviewState = serde_json::from_value(serde_json::json!({
        "status": "REJECTED",
        "reason": " Audio is clipped ",
    }))
    .expect("rejection with reason");
    assert_eq!(stored.reject_reason(), Some("Audio is clipped"));

    let pending: ReviewState =
        serde_json::from_value(serde_json::json!({ "status": "PENDING" })).expect("pending");
    assert_eq!(pending, ReviewState::Pending);
    assert_eq!(
        serde_json::to_value(&stored).expect("serializes")["status"],
        "REJECTED"
    );
}
