use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{Duration, NaiveDate, NaiveDateTime};
use tracing::warn;

use super::config::SchedulingPolicy;
use super::domain::{
    AbsenceSlot, Actor, Candidate, CandidateStatus, RequestId, RequestStatus, ResponseAction,
    ScheduledClass, StateChange, SubstitutionRequest, TeacherId,
};
use super::recommend::{EngineError, Recommendation, RecommendationEngine};
use super::repository::{
    NotifierGateway, RepositoryError, RequestRepository, SubstitutionNotice, TransitionOutcome,
};
use super::roster::{RosterError, RosterStore, Teacher};

/// Service composing the roster view, request store, notifier gateway, and
/// recommendation engine into the substitution workflow.
///
/// Timestamps are passed in by the caller so the lazy-expiry rules stay
/// deterministic under test; the HTTP layer supplies the wall clock.
pub struct SubstitutionService<R, S, N> {
    roster: Arc<R>,
    requests: Arc<S>,
    notifier: Arc<N>,
    engine: RecommendationEngine<R, S>,
    policy: SchedulingPolicy,
}

static REQUEST_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_request_id() -> RequestId {
    let id = REQUEST_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    RequestId(format!("req-{id:06}"))
}

impl<R, S, N> SubstitutionService<R, S, N>
where
    R: RosterStore + 'static,
    S: RequestRepository + 'static,
    N: NotifierGateway + 'static,
{
    pub fn new(
        roster: Arc<R>,
        requests: Arc<S>,
        notifier: Arc<N>,
        policy: SchedulingPolicy,
    ) -> Self {
        let engine = RecommendationEngine::new(roster.clone(), requests.clone(), &policy);
        Self {
            roster,
            requests,
            notifier,
            engine,
            policy,
        }
    }

    /// Ranked eligible substitutes for the requester's absence.
    pub fn recommend(
        &self,
        requester: TeacherId,
        absence: &AbsenceSlot,
    ) -> Result<Vec<Recommendation>, SubstitutionError> {
        let requester = self.teacher(requester)?;
        Ok(self.engine.recommend(&requester, absence)?)
    }

    /// Create a request; it starts life awaiting the department head.
    pub fn create(
        &self,
        requester: TeacherId,
        absence: AbsenceSlot,
        reason: String,
        message: Option<String>,
        candidate_ids: &[TeacherId],
        now: NaiveDateTime,
    ) -> Result<SubstitutionRequest, SubstitutionError> {
        if candidate_ids.is_empty() {
            return Err(ValidationError::NoCandidates.into());
        }
        if candidate_ids.len() > self.policy.max_candidates {
            return Err(ValidationError::TooManyCandidates {
                max: self.policy.max_candidates,
            }
            .into());
        }
        if absence.date < now.date() {
            return Err(ValidationError::DateInPast.into());
        }

        let requester_profile = self.teacher(requester)?;

        let teaches_this_class = self
            .roster
            .schedule_on(requester, absence.date)?
            .iter()
            .any(|entry| entry.slot == absence.slot && entry.subject == absence.subject);
        if !teaches_this_class {
            return Err(ValidationError::NotRequestersClass.into());
        }

        let mut seen = HashSet::new();
        for &candidate_id in candidate_ids {
            if !seen.insert(candidate_id) {
                return Err(ValidationError::DuplicateCandidate(candidate_id).into());
            }
            if candidate_id == requester {
                return Err(ValidationError::SelfNomination.into());
            }
            let candidate = self
                .roster
                .get_teacher(candidate_id)?
                .ok_or(ValidationError::UnknownCandidate(candidate_id))?;
            if candidate.department != requester_profile.department {
                return Err(ValidationError::OutsideDepartment(candidate_id).into());
            }
        }

        let clash = self
            .requests
            .active_for(requester, absence.date)?
            .iter()
            .any(|existing| existing.absence.slot.overlaps(&absence.slot));
        if clash {
            return Err(ValidationError::DuplicateActiveRequest.into());
        }

        let request = SubstitutionRequest {
            id: next_request_id(),
            requester,
            department: requester_profile.department.clone(),
            absence,
            reason,
            message,
            candidates: candidate_ids.iter().copied().map(Candidate::queued).collect(),
            status: RequestStatus::PendingHod,
            winner: None,
            created_at: now,
            resolved_at: None,
        };
        let stored = self.requests.insert(request)?;

        if let Some(head) = self.roster.department_head(&stored.department)? {
            self.dispatch(SubstitutionNotice {
                recipient: head,
                request_id: stored.id.clone(),
                title: "New substitution request".to_string(),
                body: format!(
                    "{} requests cover for {} on {}",
                    requester_profile.full_name, stored.absence.subject, stored.absence.date
                ),
            });
        }

        Ok(stored)
    }

    /// Department-head approval. Candidates are re-checked against current
    /// eligibility; anyone who became unavailable since creation is dropped
    /// silently. If that empties the list the approval still succeeds but
    /// the request expires immediately, since there is nobody to notify.
    pub fn approve(
        &self,
        id: &RequestId,
        actor: &Actor,
        now: NaiveDateTime,
    ) -> Result<SubstitutionRequest, SubstitutionError> {
        let request = self.load_with_expiry(id, now)?;

        if !actor.is_head_of(&request.department) {
            return Err(PermissionError::NotDepartmentHead.into());
        }
        if request.status != RequestStatus::PendingHod {
            return Err(InvalidStateError::NotPending {
                status: request.status,
            }
            .into());
        }

        let requester = self.teacher(request.requester)?;
        let mut notified = Vec::new();
        let mut withdrawn = Vec::new();
        for candidate in &request.candidates {
            let still_eligible = match self.roster.get_teacher(candidate.teacher_id)? {
                Some(profile) => {
                    self.engine
                        .is_eligible(&profile, &requester, &request.absence)?
                }
                None => false,
            };
            if still_eligible {
                notified.push(candidate.teacher_id);
            } else {
                withdrawn.push(candidate.teacher_id);
            }
        }

        let approved = match self.requests.transition(
            id,
            RequestStatus::PendingHod,
            StateChange::Approve {
                notified: notified.clone(),
                withdrawn,
            },
        )? {
            TransitionOutcome::Applied(updated) => updated,
            TransitionOutcome::Lost { current } => {
                return Err(InvalidStateError::NotPending { status: current }.into())
            }
        };

        if notified.is_empty() {
            return match self.requests.transition(
                id,
                RequestStatus::ApprovedOpen,
                StateChange::Expire { at: now },
            )? {
                TransitionOutcome::Applied(expired) => Ok(expired),
                TransitionOutcome::Lost { .. } => Ok(self.load(id)?),
            };
        }

        for recipient in notified {
            self.dispatch(SubstitutionNotice {
                recipient,
                request_id: approved.id.clone(),
                title: "Substitution request".to_string(),
                body: match &approved.message {
                    Some(message) => format!(
                        "{} asks you to cover {} on {}: {}",
                        requester.full_name,
                        approved.absence.subject,
                        approved.absence.date,
                        message
                    ),
                    None => format!(
                        "{} asks you to cover {} on {}",
                        requester.full_name, approved.absence.subject, approved.absence.date
                    ),
                },
            });
        }

        Ok(approved)
    }

    /// Department-head rejection; terminal.
    pub fn reject(
        &self,
        id: &RequestId,
        actor: &Actor,
        now: NaiveDateTime,
    ) -> Result<SubstitutionRequest, SubstitutionError> {
        let request = self.load_with_expiry(id, now)?;

        if !actor.is_head_of(&request.department) {
            return Err(PermissionError::NotDepartmentHead.into());
        }
        if request.status != RequestStatus::PendingHod {
            return Err(InvalidStateError::NotPending {
                status: request.status,
            }
            .into());
        }

        match self.requests.transition(
            id,
            RequestStatus::PendingHod,
            StateChange::Reject { at: now },
        )? {
            TransitionOutcome::Applied(updated) => Ok(updated),
            TransitionOutcome::Lost { current } => {
                Err(InvalidStateError::NotPending { status: current }.into())
            }
        }
    }

    /// Withdrawal by the requester or the department head. A filled request
    /// stays filled; the substitute has already committed.
    pub fn cancel(
        &self,
        id: &RequestId,
        actor: &Actor,
        now: NaiveDateTime,
    ) -> Result<SubstitutionRequest, SubstitutionError> {
        let request = self.load_with_expiry(id, now)?;

        if actor.id != request.requester && !actor.is_head_of(&request.department) {
            return Err(PermissionError::NotRequesterOrHead.into());
        }
        if request.status == RequestStatus::Filled {
            return Err(InvalidStateError::CancelFilled.into());
        }
        if request.status.is_terminal() {
            return Err(InvalidStateError::AlreadyResolved {
                status: request.status,
            }
            .into());
        }

        match self
            .requests
            .transition(id, request.status, StateChange::Cancel { at: now })?
        {
            TransitionOutcome::Applied(updated) => Ok(updated),
            TransitionOutcome::Lost { current } => {
                Err(InvalidStateError::AlreadyResolved { status: current }.into())
            }
        }
    }

    /// Candidate accept/decline. Acceptance is arbitrated by the store's
    /// conditional transition: of any number of concurrent accepters exactly
    /// one observes `ApprovedOpen -> Filled` succeed, and every other caller
    /// is told the class was already taken. Declining never changes the
    /// request status, but once every candidate has declined the request
    /// expires early rather than waiting for the deadline.
    pub fn respond(
        &self,
        id: &RequestId,
        candidate: TeacherId,
        action: ResponseAction,
        now: NaiveDateTime,
    ) -> Result<SubstitutionRequest, SubstitutionError> {
        let request = self.load_with_expiry(id, now)?;

        if request.status != RequestStatus::ApprovedOpen {
            return Err(Self::too_late(&request).into());
        }

        let entry = request
            .candidate(candidate)
            .ok_or(PermissionError::NotNominated(candidate))?;
        match entry.status {
            CandidateStatus::Withdrawn => {
                return Err(PermissionError::NotNominated(candidate).into())
            }
            CandidateStatus::Declined | CandidateStatus::Accepted => {
                return Err(InvalidStateError::AlreadyResponded { candidate }.into())
            }
            CandidateStatus::Queued | CandidateStatus::Notified | CandidateStatus::Superseded => {}
        }

        match action {
            ResponseAction::Accept => {
                let outcome = self.requests.transition(
                    id,
                    RequestStatus::ApprovedOpen,
                    StateChange::Fill {
                        winner: candidate,
                        at: now,
                    },
                )?;
                match outcome {
                    TransitionOutcome::Applied(filled) => {
                        self.notify_requester_filled(&filled, candidate);
                        Ok(filled)
                    }
                    // Lost the race: report the state the winner left behind.
                    TransitionOutcome::Lost { .. } => {
                        let current = self.load(id)?;
                        Err(Self::too_late(&current).into())
                    }
                }
            }
            ResponseAction::Reject => {
                let outcome = self.requests.transition(
                    id,
                    RequestStatus::ApprovedOpen,
                    StateChange::Decline { candidate, at: now },
                )?;
                let declined = match outcome {
                    TransitionOutcome::Applied(updated) => updated,
                    TransitionOutcome::Lost { .. } => {
                        let current = self.load(id)?;
                        return Err(Self::too_late(&current).into());
                    }
                };

                if !declined.has_active_candidates() {
                    if let TransitionOutcome::Applied(expired) = self.requests.transition(
                        id,
                        RequestStatus::ApprovedOpen,
                        StateChange::Expire { at: now },
                    )? {
                        return Ok(expired);
                    }
                }
                Ok(declined)
            }
        }
    }

    /// Read a request, applying the lazy deadline check first.
    pub fn get(
        &self,
        id: &RequestId,
        now: NaiveDateTime,
    ) -> Result<SubstitutionRequest, SubstitutionError> {
        self.load_with_expiry(id, now)
    }

    /// The department head's approval queue, oldest first.
    pub fn pending_for_department(
        &self,
        department: &str,
    ) -> Result<Vec<SubstitutionRequest>, SubstitutionError> {
        Ok(self.requests.pending_for_department(department)?)
    }

    /// A teacher's effective week: static entries minus classes a substitute
    /// covers for them, plus classes they cover for colleagues.
    pub fn weekly_schedule(
        &self,
        teacher: TeacherId,
        week_start: NaiveDate,
    ) -> Result<Vec<ScheduledClass>, SubstitutionError> {
        self.teacher(teacher)?;
        let week_end = week_start + Duration::days(6);
        let filled = self.requests.filled_in_range(week_start, week_end)?;

        let mut classes = Vec::new();
        for offset in 0..7 {
            let date = week_start + Duration::days(offset);
            for entry in self.roster.schedule_on(teacher, date)? {
                let covered = filled.iter().any(|request| {
                    request.requester == teacher
                        && request.absence.date == date
                        && request.absence.slot == entry.slot
                });
                if !covered {
                    classes.push(ScheduledClass {
                        date,
                        slot: entry.slot,
                        subject: entry.subject,
                        room: Some(entry.room),
                        covering_for: None,
                    });
                }
            }
        }

        for request in &filled {
            if request.winner == Some(teacher) {
                classes.push(ScheduledClass {
                    date: request.absence.date,
                    slot: request.absence.slot,
                    subject: request.absence.subject.clone(),
                    room: None,
                    covering_for: Some(request.requester),
                });
            }
        }

        classes.sort_by(|a, b| {
            a.date
                .cmp(&b.date)
                .then_with(|| a.slot.start.cmp(&b.slot.start))
        });
        Ok(classes)
    }

    fn teacher(&self, id: TeacherId) -> Result<Teacher, SubstitutionError> {
        self.roster
            .get_teacher(id)?
            .ok_or(SubstitutionError::TeacherNotFound(id))
    }

    fn load(&self, id: &RequestId) -> Result<SubstitutionRequest, SubstitutionError> {
        self.requests
            .fetch(id)?
            .ok_or(SubstitutionError::RequestNotFound)
    }

    /// Any read path that finds an open request past its deadline performs
    /// the expiry transition before returning; there is no background timer.
    fn load_with_expiry(
        &self,
        id: &RequestId,
        now: NaiveDateTime,
    ) -> Result<SubstitutionRequest, SubstitutionError> {
        let request = self.load(id)?;
        if request.status == RequestStatus::ApprovedOpen
            && now >= request.deadline(self.policy.expiry_lead_minutes)
        {
            return match self.requests.transition(
                id,
                RequestStatus::ApprovedOpen,
                StateChange::Expire { at: now },
            )? {
                TransitionOutcome::Applied(expired) => Ok(expired),
                // Raced with a concurrent fill or expiry; re-read.
                TransitionOutcome::Lost { .. } => self.load(id),
            };
        }
        Ok(request)
    }

    fn too_late(request: &SubstitutionRequest) -> InvalidStateError {
        match (request.status, request.winner) {
            (RequestStatus::Filled, Some(winner)) => InvalidStateError::AlreadyFilled { winner },
            _ => InvalidStateError::AlreadyResolved {
                status: request.status,
            },
        }
    }

    fn notify_requester_filled(&self, request: &SubstitutionRequest, winner: TeacherId) {
        let winner_name = match self.roster.get_teacher(winner) {
            Ok(Some(profile)) => profile.full_name,
            _ => format!("teacher {winner}"),
        };
        self.dispatch(SubstitutionNotice {
            recipient: request.requester,
            request_id: request.id.clone(),
            title: "Substitution accepted".to_string(),
            body: format!(
                "{} will cover {} on {}",
                winner_name, request.absence.subject, request.absence.date
            ),
        });
    }

    /// Fire-and-forget: delivery failures are an operational concern, never
    /// a workflow failure.
    fn dispatch(&self, notice: SubstitutionNotice) {
        if let Err(error) = self.notifier.notify(notice.clone()) {
            warn!(
                recipient = notice.recipient.0,
                request = %notice.request_id.0,
                %error,
                "notification dispatch failed"
            );
        }
    }
}

/// Malformed or ineligible input at creation time.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("at least one candidate must be nominated")]
    NoCandidates,
    #[error("no more than {max} candidates may be nominated")]
    TooManyCandidates { max: usize },
    #[error("cannot request cover for a past date")]
    DateInPast,
    #[error("requester has no class matching this date, time, and subject")]
    NotRequestersClass,
    #[error("teacher {0} is not on the roster")]
    UnknownCandidate(TeacherId),
    #[error("teacher {0} was nominated twice")]
    DuplicateCandidate(TeacherId),
    #[error("cannot nominate yourself as a substitute")]
    SelfNomination,
    #[error("teacher {0} is outside the requester's department")]
    OutsideDepartment(TeacherId),
    #[error("an active request already exists for this class and date")]
    DuplicateActiveRequest,
}

/// The actor lacks the role the operation requires.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PermissionError {
    #[error("only the head of the requester's department may act on this request")]
    NotDepartmentHead,
    #[error("only the requester or the department head may cancel this request")]
    NotRequesterOrHead,
    #[error("teacher {0} was not nominated for this request")]
    NotNominated(TeacherId),
}

/// Operation attempted against a request not in the required state.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum InvalidStateError {
    #[error("request is not awaiting approval (status: {status})")]
    NotPending { status: RequestStatus },
    #[error("too late, the class was filled by teacher {winner}")]
    AlreadyFilled { winner: TeacherId },
    #[error("request already resolved (status: {status})")]
    AlreadyResolved { status: RequestStatus },
    #[error("teacher {candidate} has already responded to this request")]
    AlreadyResponded { candidate: TeacherId },
    #[error("cannot cancel a filled request")]
    CancelFilled,
}

/// Error raised by the substitution service.
#[derive(Debug, thiserror::Error)]
pub enum SubstitutionError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Permission(#[from] PermissionError),
    #[error(transparent)]
    InvalidState(#[from] InvalidStateError),
    #[error("substitution request not found")]
    RequestNotFound,
    #[error("teacher {0} not found")]
    TeacherNotFound(TeacherId),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Roster(#[from] RosterError),
}

impl From<EngineError> for SubstitutionError {
    fn from(value: EngineError) -> Self {
        match value {
            EngineError::Roster(err) => Self::Roster(err),
            EngineError::Repository(err) => Self::Repository(err),
        }
    }
}
