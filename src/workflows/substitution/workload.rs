use std::sync::Arc;

use chrono::NaiveDate;

use super::domain::TeacherId;
use super::repository::{RepositoryError, RequestRepository};

/// Rolling window over which substitution wins count toward a teacher's
/// load, typically the current term up to the absence date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkloadWindow {
    pub from: Option<NaiveDate>,
    pub until: NaiveDate,
}

impl WorkloadWindow {
    pub fn contains(&self, date: NaiveDate) -> bool {
        date <= self.until && self.from.map_or(true, |from| date >= from)
    }
}

/// Counts filled substitution assignments attributed to a teacher. Used only
/// for ranking, never for eligibility gating; a pure read of request history.
pub struct WorkloadCalculator<S> {
    requests: Arc<S>,
    term_start: Option<NaiveDate>,
}

impl<S: RequestRepository> WorkloadCalculator<S> {
    pub fn new(requests: Arc<S>, term_start: Option<NaiveDate>) -> Self {
        Self {
            requests,
            term_start,
        }
    }

    pub fn load(&self, teacher: TeacherId, as_of: NaiveDate) -> Result<u32, RepositoryError> {
        let window = WorkloadWindow {
            from: self.term_start,
            until: as_of,
        };
        self.requests.wins_in_window(teacher, &window)
    }
}
