//! Legal moderation edges per entity family.
//!
//! All four families share one table shape. Each kind contributes its edge set and the
//! predicate naming the gating fields that block approval; the engine is written once
//! against [`TransitionTable`].

use super::domain::ModerationStatus::{Approved, Pending, Rejected};
use super::domain::{is_blank, Action, EntityKind, EntitySubject, ModerationStatus};

/// What committing an edge does to the stored entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeOutcome {
    Enter(ModerationStatus),
    Remove,
    /// The entity is left untouched; only the counterpart is notified.
    NotifyOnly,
}

/// One legal transition. `from == None` marks an edge on a stateless entity (exams).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    pub from: Option<ModerationStatus>,
    pub action: Action,
    pub outcome: EdgeOutcome,
}

const fn edge(from: Option<ModerationStatus>, action: Action, outcome: EdgeOutcome) -> Edge {
    Edge {
        from,
        action,
        outcome,
    }
}

const COURSE_EDGES: &[Edge] = &[
    edge(Some(Pending), Action::Approve, EdgeOutcome::Enter(Approved)),
    edge(Some(Pending), Action::Reject, EdgeOutcome::Enter(Rejected)),
    edge(Some(Rejected), Action::Resubmit, EdgeOutcome::Enter(Pending)),
    // Edit-after-approval sends the whole course back to review.
    edge(Some(Approved), Action::Resubmit, EdgeOutcome::Enter(Pending)),
    edge(Some(Rejected), Action::Delete, EdgeOutcome::Remove),
    edge(Some(Approved), Action::Delete, EdgeOutcome::Remove),
];

const LECTURE_EDGES: &[Edge] = &[
    edge(Some(Pending), Action::Approve, EdgeOutcome::Enter(Approved)),
    edge(Some(Pending), Action::Reject, EdgeOutcome::Enter(Rejected)),
    edge(Some(Rejected), Action::Resubmit, EdgeOutcome::Enter(Pending)),
    edge(Some(Rejected), Action::Delete, EdgeOutcome::Remove),
    edge(Some(Approved), Action::Delete, EdgeOutcome::Remove),
];

const EXAM_EDGES: &[Edge] = &[
    edge(None, Action::Delete, EdgeOutcome::Remove),
    edge(None, Action::RequestRevision, EdgeOutcome::NotifyOnly),
];

const CANCELLATION_EDGES: &[Edge] = &[
    edge(Some(Pending), Action::Approve, EdgeOutcome::Enter(Approved)),
    edge(Some(Pending), Action::Reject, EdgeOutcome::Enter(Rejected)),
];

/// Edge set and gating predicate for a single entity kind.
#[derive(Debug, Clone, Copy)]
pub struct TransitionTable {
    kind: EntityKind,
    edges: &'static [Edge],
    gating: GatingFn,
}

type GatingFn = fn(&EntitySubject) -> Vec<&'static str>;

impl TransitionTable {
    pub fn for_kind(kind: EntityKind) -> Self {
        let (edges, gating) = match kind {
            EntityKind::Course => (COURSE_EDGES, course_gating as GatingFn),
            EntityKind::Lecture => (LECTURE_EDGES, lecture_gating as GatingFn),
            EntityKind::Exam => (EXAM_EDGES, no_gating as GatingFn),
            EntityKind::CancellationRequest => (CANCELLATION_EDGES, no_gating as GatingFn),
        };
        Self {
            kind,
            edges,
            gating,
        }
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn edges(&self) -> &'static [Edge] {
        self.edges
    }

    /// The edge leaving `from` on `action`, if the table has one.
    pub fn edge(&self, from: Option<ModerationStatus>, action: Action) -> Option<Edge> {
        self.edges
            .iter()
            .copied()
            .find(|edge| edge.from == from && edge.action == action)
    }

    /// Gating fields absent from `subject`. Empty means the submission is complete.
    pub fn missing_fields(&self, subject: &EntitySubject) -> Vec<&'static str> {
        (self.gating)(subject)
    }

    /// Whether approval of this kind is gated on submission fields at all.
    pub fn has_gating_fields(&self) -> bool {
        matches!(self.kind, EntityKind::Course | EntityKind::Lecture)
    }

    /// Course approval also depends on the owning instructor's profile.
    pub fn requires_instructor_profile(&self) -> bool {
        matches!(self.kind, EntityKind::Course)
    }

    /// Initial state for a fresh submission; `None` for stateless kinds.
    pub fn initial_status(&self) -> Option<ModerationStatus> {
        match self.kind {
            EntityKind::Exam => None,
            _ => Some(Pending),
        }
    }
}

fn course_gating(subject: &EntitySubject) -> Vec<&'static str> {
    let EntitySubject::Course(course) = subject else {
        return Vec::new();
    };

    let mut missing = Vec::new();
    if is_blank(&course.title) {
        missing.push("title");
    }
    if course.level.is_none() {
        missing.push("level");
    }
    if is_blank(&course.description) {
        missing.push("description");
    }
    if course.price.is_none() {
        missing.push("price");
    }
    missing
}

fn lecture_gating(subject: &EntitySubject) -> Vec<&'static str> {
    match subject {
        EntitySubject::Lecture(lecture) if is_blank(&lecture.video_url) => vec!["video_url"],
        _ => Vec::new(),
    }
}

fn no_gating(_subject: &EntitySubject) -> Vec<&'static str> {
    Vec::new()
}
