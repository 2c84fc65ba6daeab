use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::domain::{
    RequestId, RequestStatus, StateChange, SubstitutionRequest, TeacherId, TimeSlot,
};
use super::workload::WorkloadWindow;

/// Storage abstraction for substitution requests.
///
/// `transition` is the concurrency contract of the whole workflow: the store
/// must evaluate the expected-status check and apply the change as one
/// indivisible operation (a `WHERE status = ?` conditional update, a
/// serializable transaction, or a single mutex here). Everything else is a
/// plain read or single-actor write.
pub trait RequestRepository: Send + Sync {
    fn insert(&self, request: SubstitutionRequest)
        -> Result<SubstitutionRequest, RepositoryError>;

    fn fetch(&self, id: &RequestId) -> Result<Option<SubstitutionRequest>, RepositoryError>;

    /// Compare-and-set: apply `change` only if the request's status still
    /// equals `expected`; otherwise report the status actually observed.
    fn transition(
        &self,
        id: &RequestId,
        expected: RequestStatus,
        change: StateChange,
    ) -> Result<TransitionOutcome, RepositoryError>;

    /// Number of `Filled` requests won by `teacher` inside the window.
    fn wins_in_window(
        &self,
        teacher: TeacherId,
        window: &WorkloadWindow,
    ) -> Result<u32, RepositoryError>;

    /// Slots of `Filled` requests `teacher` has already won on `date`.
    fn commitments_on(
        &self,
        teacher: TeacherId,
        date: NaiveDate,
    ) -> Result<Vec<TimeSlot>, RepositoryError>;

    /// Requests by `requester` on `date` still in a non-terminal or filled
    /// state; a teacher with one of these is absent themselves that day.
    fn active_for(
        &self,
        requester: TeacherId,
        date: NaiveDate,
    ) -> Result<Vec<SubstitutionRequest>, RepositoryError>;

    fn pending_for_department(
        &self,
        department: &str,
    ) -> Result<Vec<SubstitutionRequest>, RepositoryError>;

    fn filled_in_range(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<SubstitutionRequest>, RepositoryError>;
}

/// Result of a conditional transition.
#[derive(Debug, Clone, PartialEq)]
pub enum TransitionOutcome {
    /// The status matched and the change was applied; carries the new record.
    Applied(SubstitutionRequest),
    /// Someone else moved the request first.
    Lost { current: RequestStatus },
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Outbound push hook (FCM or similar). Delivery is best-effort: the
/// workflow logs failures and moves on.
pub trait NotifierGateway: Send + Sync {
    fn notify(&self, notice: SubstitutionNotice) -> Result<(), NotifyError>;
}

/// Payload handed to the notifier; enough for a push message and a deep link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubstitutionNotice {
    pub recipient: TeacherId,
    pub request_id: RequestId,
    pub title: String,
    pub body: String,
}

/// Notification dispatch error.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
}

fn is_active_or_filled(status: RequestStatus) -> bool {
    matches!(
        status,
        RequestStatus::PendingHod | RequestStatus::ApprovedOpen | RequestStatus::Filled
    )
}

/// Mutex-backed request store. The single mutex makes `transition` a genuine
/// compare-and-set: the status check and the mutation happen under one guard,
/// so concurrent accepters serialize and exactly one observes `ApprovedOpen`.
#[derive(Default, Clone)]
pub struct InMemoryRequestStore {
    records: Arc<Mutex<HashMap<RequestId, SubstitutionRequest>>>,
}

impl RequestRepository for InMemoryRequestStore {
    fn insert(
        &self,
        request: SubstitutionRequest,
    ) -> Result<SubstitutionRequest, RepositoryError> {
        let mut guard = self.records.lock().expect("request store mutex poisoned");
        if guard.contains_key(&request.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(request.id.clone(), request.clone());
        Ok(request)
    }

    fn fetch(&self, id: &RequestId) -> Result<Option<SubstitutionRequest>, RepositoryError> {
        let guard = self.records.lock().expect("request store mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn transition(
        &self,
        id: &RequestId,
        expected: RequestStatus,
        change: StateChange,
    ) -> Result<TransitionOutcome, RepositoryError> {
        let mut guard = self.records.lock().expect("request store mutex poisoned");
        let record = guard.get_mut(id).ok_or(RepositoryError::NotFound)?;
        if record.status != expected {
            return Ok(TransitionOutcome::Lost {
                current: record.status,
            });
        }
        record.apply(&change);
        Ok(TransitionOutcome::Applied(record.clone()))
    }

    fn wins_in_window(
        &self,
        teacher: TeacherId,
        window: &WorkloadWindow,
    ) -> Result<u32, RepositoryError> {
        let guard = self.records.lock().expect("request store mutex poisoned");
        let count = guard
            .values()
            .filter(|record| {
                record.status == RequestStatus::Filled
                    && record.winner == Some(teacher)
                    && window.contains(record.absence.date)
            })
            .count();
        Ok(count as u32)
    }

    fn commitments_on(
        &self,
        teacher: TeacherId,
        date: NaiveDate,
    ) -> Result<Vec<TimeSlot>, RepositoryError> {
        let guard = self.records.lock().expect("request store mutex poisoned");
        Ok(guard
            .values()
            .filter(|record| {
                record.status == RequestStatus::Filled
                    && record.winner == Some(teacher)
                    && record.absence.date == date
            })
            .map(|record| record.absence.slot)
            .collect())
    }

    fn active_for(
        &self,
        requester: TeacherId,
        date: NaiveDate,
    ) -> Result<Vec<SubstitutionRequest>, RepositoryError> {
        let guard = self.records.lock().expect("request store mutex poisoned");
        Ok(guard
            .values()
            .filter(|record| {
                record.requester == requester
                    && record.absence.date == date
                    && is_active_or_filled(record.status)
            })
            .cloned()
            .collect())
    }

    fn pending_for_department(
        &self,
        department: &str,
    ) -> Result<Vec<SubstitutionRequest>, RepositoryError> {
        let guard = self.records.lock().expect("request store mutex poisoned");
        let mut pending: Vec<SubstitutionRequest> = guard
            .values()
            .filter(|record| {
                record.status == RequestStatus::PendingHod && record.department == department
            })
            .cloned()
            .collect();
        pending.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(pending)
    }

    fn filled_in_range(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<SubstitutionRequest>, RepositoryError> {
        let guard = self.records.lock().expect("request store mutex poisoned");
        Ok(guard
            .values()
            .filter(|record| {
                record.status == RequestStatus::Filled
                    && record.absence.date >= from
                    && record.absence.date <= to
            })
            .cloned()
            .collect())
    }
}

/// Notifier that records what would have been pushed.
#[derive(Default, Clone)]
pub struct InMemoryNotifier {
    notices: Arc<Mutex<Vec<SubstitutionNotice>>>,
}

impl InMemoryNotifier {
    pub fn sent(&self) -> Vec<SubstitutionNotice> {
        self.notices.lock().expect("notifier mutex poisoned").clone()
    }
}

impl NotifierGateway for InMemoryNotifier {
    fn notify(&self, notice: SubstitutionNotice) -> Result<(), NotifyError> {
        self.notices
            .lock()
            .expect("notifier mutex poisoned")
            .push(notice);
        Ok(())
    }
}
