use crate::infra::{in_memory_service, InMemoryAdapters, Service};
use chrono::Local;
use clap::Args;
use course_market::config::{ModerationConfig, DEFAULT_MAX_BATCH_SIZE, DEFAULT_REVIEW_INBOX};
use course_market::error::AppError;
use course_market::workflows::moderation::{
    Action, Actor, ActorId, BatchRequest, CancellationDetails, CourseDetails, CourseLevel,
    EnrollmentId, EnrollmentLedger, EntityId, EntityKind, EntitySubject, InstructorProfile,
    LectureDetails, ModerationServiceError, Notification, StatusCounts, TransitionPayload,
    TransitionRequest,
};
use serde::Serialize;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Recipient of owner-initiated notifications (defaults to "admin").
    #[arg(long)]
    pub(crate) review_inbox: Option<String>,
    /// Skip the lecture batch portion of the demo.
    #[arg(long)]
    pub(crate) skip_batch: bool,
    /// Print the final summary as JSON instead of prose.
    #[arg(long)]
    pub(crate) json: bool,
}

#[derive(Debug, Serialize)]
struct DemoSummary {
    counts: Vec<KindCounts>,
    notifications: Vec<Notification>,
}

#[derive(Debug, Serialize)]
struct KindCounts {
    kind: EntityKind,
    #[serde(flatten)]
    counts: StatusCounts,
}

const INSTRUCTOR: &str = "instructor-ada";
const STUDENT: &str = "student-lin";
const REVIEWER: &str = "admin-kim";

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        review_inbox,
        skip_batch,
        json,
    } = args;

    let config = ModerationConfig {
        review_inbox: review_inbox.unwrap_or_else(|| DEFAULT_REVIEW_INBOX.to_string()),
        max_batch_size: DEFAULT_MAX_BATCH_SIZE,
    };
    let (service, adapters) = in_memory_service(&config);
    let instructor = Actor::owner(INSTRUCTOR);
    let reviewer = Actor::reviewer(REVIEWER);

    println!(
        "Course moderation demo ({})",
        Local::now().format("%Y-%m-%d %H:%M")
    );

    let course = run_course_review(&service, &adapters, &instructor, &reviewer)?;
    if !skip_batch {
        run_lecture_batch(&service, &course, &instructor, &reviewer)?;
    }
    run_cancellation(&service, &adapters, &course, &reviewer)?;

    let summary = DemoSummary {
        counts: EntityKind::ALL
            .into_iter()
            .map(|kind| {
                service
                    .counts(kind)
                    .map(|counts| KindCounts { kind, counts })
            })
            .collect::<Result<_, _>>()?,
        notifications: adapters.notifications.events(),
    };

    if json {
        match serde_json::to_string_pretty(&summary) {
            Ok(rendered) => println!("{rendered}"),
            Err(err) => println!("  Unable to render summary: {err}"),
        }
        return Ok(());
    }

    println!("\nModeration dashboard");
    for entry in &summary.counts {
        println!(
            "- {}: {} pending | {} approved | {} rejected | {} unmoderated",
            entry.kind,
            entry.counts.pending,
            entry.counts.approved,
            entry.counts.rejected,
            entry.counts.unmoderated
        );
    }
    println!("\nNotification outbox ({} queued)", summary.notifications.len());
    for notification in &summary.notifications {
        println!(
            "- to {} [{}] {} -> {}",
            notification.target,
            notification.notification_type,
            notification.title,
            notification.link_target
        );
    }

    Ok(())
}

fn transition(
    service: &Service,
    entity_id: &EntityId,
    actor: &Actor,
    action: Action,
    payload: TransitionPayload,
) -> Result<(), ModerationServiceError> {
    let outcome = service.transition(TransitionRequest {
        entity_id: entity_id.clone(),
        actor: actor.clone(),
        action,
        payload,
    })?;
    let status = outcome
        .status()
        .map(|status| status.label())
        .unwrap_or(if outcome.removed() { "removed" } else { "unmoderated" });
    println!("  {} {} by {} -> {}", action, entity_id, actor.id, status);
    Ok(())
}

fn run_course_review(
    service: &Service,
    adapters: &InMemoryAdapters,
    instructor: &Actor,
    reviewer: &Actor,
) -> Result<EntityId, AppError> {
    println!("\nCourse review");
    let draft = EntitySubject::Course(CourseDetails {
        title: Some("Practical Rust Services".to_string()),
        level: Some(CourseLevel::Intermediate),
        description: Some("Build and operate async HTTP services.".to_string()),
        price: None,
    });
    let course = service.submit(instructor, draft)?.id;
    println!("- {} submitted {} -> PENDING", instructor.id, course);

    match transition(service, &course, reviewer, Action::Approve, TransitionPayload::default()) {
        Ok(()) => {}
        Err(err) => println!("  approval blocked: {err}"),
    }

    transition(
        service,
        &course,
        reviewer,
        Action::Reject,
        TransitionPayload::with_reason("Set a price and complete your instructor profile"),
    )?;

    let finished = EntitySubject::Course(CourseDetails {
        title: Some("Practical Rust Services".to_string()),
        level: Some(CourseLevel::Intermediate),
        description: Some("Build and operate async HTTP services.".to_string()),
        price: Some(39_000),
    });
    transition(
        service,
        &course,
        instructor,
        Action::Resubmit,
        TransitionPayload::with_update(finished),
    )?;

    adapters
        .profiles
        .upsert(
            ActorId(INSTRUCTOR.to_string()),
            InstructorProfile {
                name: Some("Ada Moreno".to_string()),
                email: Some("ada@example.com".to_string()),
                bio: Some("Ten years building payment systems".to_string()),
                career_years: Some(10),
                resume_file_path: Some("resumes/ada.pdf".to_string()),
            },
        )
        .map_err(ModerationServiceError::from)?;
    println!("- {} completed their instructor profile", instructor.id);

    transition(service, &course, reviewer, Action::Approve, TransitionPayload::default())?;
    Ok(course)
}

fn run_lecture_batch(
    service: &Service,
    course: &EntityId,
    instructor: &Actor,
    reviewer: &Actor,
) -> Result<(), AppError> {
    println!("\nLecture batch review");
    let lectures = [
        ("Ownership in practice", Some("https://cdn.example.com/ownership.mp4")),
        ("Async runtimes", Some("https://cdn.example.com/runtimes.mp4")),
        ("Observability", None),
    ];

    let mut ids = Vec::with_capacity(lectures.len());
    for (title, video) in lectures {
        let subject = EntitySubject::Lecture(LectureDetails {
            course_id: course.clone(),
            title: title.to_string(),
            video_url: video.map(str::to_string),
            duration_seconds: Some(900),
        });
        ids.push(service.submit(instructor, subject)?.id);
    }

    let approve = BatchRequest {
        entity_ids: ids.clone(),
        actor: reviewer.clone(),
        action: Action::Approve,
        payload: TransitionPayload::default(),
    };
    let plan = service.preflight_batch(&approve)?;
    println!(
        "- preflight: {} eligible, {} skipped",
        plan.eligible.len(),
        plan.skipped.len()
    );
    for skipped in &plan.skipped {
        println!("  skip {}: {}", skipped.entity_id, skipped.reason);
    }

    let approved = service.apply_batch(&approve)?;
    println!("- approved {} lectures", approved.applied.len());

    let reject = BatchRequest {
        entity_ids: ids,
        actor: reviewer.clone(),
        action: Action::Reject,
        payload: TransitionPayload::with_reason("Upload the lecture video before review"),
    };
    let rejected = service.apply_batch(&reject)?;
    println!(
        "- rejected {} incomplete lectures ({} left alone)",
        rejected.applied.len(),
        rejected.skipped.len()
    );
    Ok(())
}

fn run_cancellation(
    service: &Service,
    adapters: &InMemoryAdapters,
    course: &EntityId,
    reviewer: &Actor,
) -> Result<(), AppError> {
    println!("\nEnrollment cancellation");
    let enrollment = EnrollmentId("enr-0001".to_string());
    adapters
        .enrollments
        .enroll(enrollment.clone(), course.clone())
        .map_err(ModerationServiceError::from)?;

    let request = service
        .submit(
            &Actor::owner(STUDENT),
            EntitySubject::CancellationRequest(CancellationDetails {
                enrollment_id: enrollment.clone(),
                course_id: course.clone(),
                student_reason: Some("Schedule changed".to_string()),
            }),
        )?
        .id;
    println!("- {STUDENT} asked to cancel {enrollment}");

    transition(service, &request, reviewer, Action::Approve, TransitionPayload::default())?;
    let status = adapters
        .enrollments
        .status(&enrollment)
        .map_err(ModerationServiceError::from)?;
    println!("  enrollment {enrollment} is now {status:?}");
    Ok(())
}
