use std::fmt;

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

/// Identifier wrapper for teachers; referenced by id only, never owned.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct TeacherId(pub u32);

impl fmt::Display for TeacherId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier wrapper for substitution requests.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(pub String);

/// Half-open lesson interval; schedules are not a fixed period grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSlot {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl TimeSlot {
    pub fn overlaps(&self, other: &TimeSlot) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// The class needing coverage: derived from the requester's own timetable
/// entry, never persisted on its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbsenceSlot {
    pub date: NaiveDate,
    pub slot: TimeSlot,
    pub subject: String,
}

impl AbsenceSlot {
    pub fn weekday(&self) -> Weekday {
        self.date.weekday()
    }

    pub fn starts_at(&self) -> NaiveDateTime {
        self.date.and_time(self.slot.start)
    }
}

/// Role attached to a verified actor identity; resolved upstream of the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    Teacher,
    HeadOfDepartment,
}

/// A verified caller of a workflow operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: TeacherId,
    pub role: ActorRole,
    pub department: String,
}

impl Actor {
    pub fn is_head_of(&self, department: &str) -> bool {
        self.role == ActorRole::HeadOfDepartment && self.department == department
    }
}

/// Lifecycle of one substitution request. Transitions are monotonic: once a
/// request leaves `PendingHod` or `ApprovedOpen` it never re-enters them, and
/// the other four states are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestStatus {
    PendingHod,
    ApprovedOpen,
    Filled,
    Rejected,
    Expired,
    Cancelled,
}

impl RequestStatus {
    pub const fn label(self) -> &'static str {
        match self {
            RequestStatus::PendingHod => "pending_hod",
            RequestStatus::ApprovedOpen => "approved_open",
            RequestStatus::Filled => "filled",
            RequestStatus::Rejected => "rejected",
            RequestStatus::Expired => "expired",
            RequestStatus::Cancelled => "cancelled",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            RequestStatus::Filled
                | RequestStatus::Rejected
                | RequestStatus::Expired
                | RequestStatus::Cancelled
        )
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Per-candidate state within a request. `Declined` is terminal for that
/// candidate: a teacher who turned a class down cannot accept it later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CandidateStatus {
    /// Nominated at creation, not yet notified.
    Queued,
    /// Notification dispatched at approval; may accept or decline.
    Notified,
    Accepted,
    Declined,
    /// Dropped by the approval re-filter because eligibility shifted.
    Withdrawn,
    /// Another candidate won, or the request was resolved without them.
    Superseded,
}

impl CandidateStatus {
    pub const fn label(self) -> &'static str {
        match self {
            CandidateStatus::Queued => "queued",
            CandidateStatus::Notified => "notified",
            CandidateStatus::Accepted => "accepted",
            CandidateStatus::Declined => "declined",
            CandidateStatus::Withdrawn => "withdrawn",
            CandidateStatus::Superseded => "superseded",
        }
    }

    /// Still in the running: nominated and not yet resolved either way.
    pub const fn is_active(self) -> bool {
        matches!(self, CandidateStatus::Queued | CandidateStatus::Notified)
    }
}

/// One nominated substitute and where they stand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub teacher_id: TeacherId,
    pub status: CandidateStatus,
    pub responded_at: Option<NaiveDateTime>,
}

impl Candidate {
    pub fn queued(teacher_id: TeacherId) -> Self {
        Self {
            teacher_id,
            status: CandidateStatus::Queued,
            responded_at: None,
        }
    }
}

/// Accept/decline action submitted by a nominated candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResponseAction {
    Accept,
    Reject,
}

/// The central entity: one absence and the search for its substitute.
///
/// Invariants: `winner` is `Some` exactly when `status` is `Filled`, and the
/// winner is always one of the nominated candidates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubstitutionRequest {
    pub id: RequestId,
    pub requester: TeacherId,
    pub department: String,
    pub absence: AbsenceSlot,
    pub reason: String,
    pub message: Option<String>,
    pub candidates: Vec<Candidate>,
    pub status: RequestStatus,
    pub winner: Option<TeacherId>,
    pub created_at: NaiveDateTime,
    pub resolved_at: Option<NaiveDateTime>,
}

impl SubstitutionRequest {
    pub fn candidate(&self, teacher_id: TeacherId) -> Option<&Candidate> {
        self.candidates
            .iter()
            .find(|candidate| candidate.teacher_id == teacher_id)
    }

    pub fn has_active_candidates(&self) -> bool {
        self.candidates
            .iter()
            .any(|candidate| candidate.status.is_active())
    }

    /// Last instant at which the request may still be accepted.
    pub fn deadline(&self, lead_minutes: i64) -> NaiveDateTime {
        self.absence.starts_at() - Duration::minutes(lead_minutes)
    }

    /// Apply a state change. Stores call this under their own atomicity
    /// guarantee after verifying the expected status; the semantics of each
    /// transition live here so every store behaves identically.
    pub fn apply(&mut self, change: &StateChange) {
        match change {
            StateChange::Approve {
                notified,
                withdrawn,
            } => {
                self.status = RequestStatus::ApprovedOpen;
                for candidate in &mut self.candidates {
                    if withdrawn.contains(&candidate.teacher_id) {
                        candidate.status = CandidateStatus::Withdrawn;
                    } else if notified.contains(&candidate.teacher_id) {
                        candidate.status = CandidateStatus::Notified;
                    }
                }
            }
            StateChange::Reject { at } => {
                self.resolve(RequestStatus::Rejected, *at);
            }
            StateChange::Cancel { at } => {
                self.resolve(RequestStatus::Cancelled, *at);
            }
            StateChange::Expire { at } => {
                self.resolve(RequestStatus::Expired, *at);
            }
            StateChange::Fill { winner, at } => {
                for candidate in &mut self.candidates {
                    if candidate.teacher_id == *winner {
                        candidate.status = CandidateStatus::Accepted;
                        candidate.responded_at = Some(*at);
                    } else if candidate.status.is_active() {
                        candidate.status = CandidateStatus::Superseded;
                    }
                }
                self.status = RequestStatus::Filled;
                self.winner = Some(*winner);
                self.resolved_at = Some(*at);
            }
            StateChange::Decline { candidate, at } => {
                for entry in &mut self.candidates {
                    if entry.teacher_id == *candidate {
                        entry.status = CandidateStatus::Declined;
                        entry.responded_at = Some(*at);
                    }
                }
            }
        }
    }

    fn resolve(&mut self, status: RequestStatus, at: NaiveDateTime) {
        self.status = status;
        self.resolved_at = Some(at);
        for candidate in &mut self.candidates {
            if candidate.status.is_active() {
                candidate.status = CandidateStatus::Superseded;
            }
        }
    }

    pub fn view(&self) -> RequestView {
        RequestView {
            request_id: self.id.clone(),
            status: self.status.label(),
            requester: self.requester,
            date: self.absence.date,
            start_time: self.absence.slot.start,
            end_time: self.absence.slot.end,
            subject: self.absence.subject.clone(),
            winner: self.winner,
            candidates: self
                .candidates
                .iter()
                .map(|candidate| CandidateView {
                    teacher_id: candidate.teacher_id,
                    status: candidate.status.label(),
                })
                .collect(),
        }
    }
}

/// Mutations a store may be asked to apply conditionally. The `Fill` variant
/// carries the single-winner guarantee: it must only ever be applied while
/// the request is still `ApprovedOpen`, as one indivisible operation.
#[derive(Debug, Clone, PartialEq)]
pub enum StateChange {
    Approve {
        notified: Vec<TeacherId>,
        withdrawn: Vec<TeacherId>,
    },
    Reject {
        at: NaiveDateTime,
    },
    Cancel {
        at: NaiveDateTime,
    },
    Expire {
        at: NaiveDateTime,
    },
    Fill {
        winner: TeacherId,
        at: NaiveDateTime,
    },
    Decline {
        candidate: TeacherId,
        at: NaiveDateTime,
    },
}

/// Sanitized representation of a request for API responses.
#[derive(Debug, Clone, Serialize)]
pub struct RequestView {
    pub request_id: RequestId,
    pub status: &'static str,
    pub requester: TeacherId,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub subject: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub winner: Option<TeacherId>,
    pub candidates: Vec<CandidateView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CandidateView {
    pub teacher_id: TeacherId,
    pub status: &'static str,
}

/// One entry of a teacher's effective week: their own classes minus those a
/// substitute covers, plus classes they cover for someone else.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScheduledClass {
    pub date: NaiveDate,
    pub slot: TimeSlot,
    pub subject: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub covering_for: Option<TeacherId>,
}
