use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Tunables for the substitution workflow.
///
/// `term_start` bounds the workload window used for ranking; when unset the
/// whole request history counts. `expiry_lead_minutes` moves the acceptance
/// deadline ahead of the class start so a substitute is not confirmed seconds
/// before the bell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulingPolicy {
    pub max_candidates: usize,
    pub expiry_lead_minutes: i64,
    pub term_start: Option<NaiveDate>,
}

impl Default for SchedulingPolicy {
    fn default() -> Self {
        Self {
            max_candidates: 5,
            expiry_lead_minutes: 0,
            term_start: None,
        }
    }
}
