use std::sync::Arc;

use serde::Serialize;

use super::config::SchedulingPolicy;
use super::domain::{AbsenceSlot, TeacherId};
use super::repository::{RepositoryError, RequestRepository};
use super::roster::{RosterError, RosterStore, Teacher};
use super::workload::WorkloadCalculator;

/// One ranked substitute suggestion.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub teacher: Teacher,
    pub load: u32,
}

/// Failures while computing recommendations; both are collaborator faults,
/// never a property of the absence itself.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Roster(#[from] RosterError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Ranks eligible substitutes for an absence: qualified for the subject,
/// in the requester's department, free at the slot, and not absent
/// themselves. Ordering is ascending load with teacher id as the
/// tie-breaker, so repeated calls over unchanged data return identical
/// sequences. A pure read; mutates nothing.
pub struct RecommendationEngine<R, S> {
    roster: Arc<R>,
    requests: Arc<S>,
    workload: WorkloadCalculator<S>,
}

impl<R, S> RecommendationEngine<R, S>
where
    R: RosterStore,
    S: RequestRepository,
{
    pub fn new(roster: Arc<R>, requests: Arc<S>, policy: &SchedulingPolicy) -> Self {
        let workload = WorkloadCalculator::new(requests.clone(), policy.term_start);
        Self {
            roster,
            requests,
            workload,
        }
    }

    /// An empty result means nobody qualifies, not an error.
    pub fn recommend(
        &self,
        requester: &Teacher,
        absence: &AbsenceSlot,
    ) -> Result<Vec<Recommendation>, EngineError> {
        let mut recommendations = Vec::new();

        for teacher in self.roster.teachers_with_subject(&absence.subject)? {
            if !self.satisfies_filters(&teacher, requester, absence)? {
                continue;
            }
            let load = self.workload.load(teacher.id, absence.date)?;
            recommendations.push(Recommendation { teacher, load });
        }

        recommendations.sort_by(|a, b| {
            a.load
                .cmp(&b.load)
                .then_with(|| a.teacher.id.cmp(&b.teacher.id))
        });
        Ok(recommendations)
    }

    /// Full eligibility check for one candidate, including the subject
    /// qualification. The approval re-filter uses this to drop candidates
    /// whose availability shifted since the request was created.
    pub fn is_eligible(
        &self,
        candidate: &Teacher,
        requester: &Teacher,
        absence: &AbsenceSlot,
    ) -> Result<bool, EngineError> {
        if !candidate.teaches(&absence.subject) {
            return Ok(false);
        }
        self.satisfies_filters(candidate, requester, absence)
    }

    /// Filters beyond subject qualification, which `recommend` already
    /// applied through the roster query.
    fn satisfies_filters(
        &self,
        candidate: &Teacher,
        requester: &Teacher,
        absence: &AbsenceSlot,
    ) -> Result<bool, EngineError> {
        if candidate.id == requester.id || candidate.department != requester.department {
            return Ok(false);
        }

        let static_clash = self
            .roster
            .schedule_on(candidate.id, absence.date)?
            .iter()
            .any(|entry| entry.slot.overlaps(&absence.slot));
        if static_clash {
            return Ok(false);
        }

        let committed = self
            .requests
            .commitments_on(candidate.id, absence.date)?
            .iter()
            .any(|slot| slot.overlaps(&absence.slot));
        if committed {
            return Ok(false);
        }

        // A teacher with their own request that day is absent, whatever slot.
        if !self.requests.active_for(candidate.id, absence.date)?.is_empty() {
            return Ok(false);
        }

        Ok(true)
    }
}
