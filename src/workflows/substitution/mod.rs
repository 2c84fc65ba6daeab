//! Substitution-assignment workflow: recommendation, request lifecycle, and
//! concurrency-safe acceptance arbitration.
//!
//! A teacher who will be absent asks for recommendations, nominates
//! candidates, and submits a request. The head of department approves or
//! rejects it; approval notifies every still-eligible candidate. Notified
//! candidates then race to accept, and the store's conditional transition
//! guarantees that exactly one of them is bound to the class.

pub mod config;
pub mod domain;
pub mod recommend;
pub mod repository;
pub mod roster;
pub mod router;
pub mod service;
pub mod workload;

#[cfg(test)]
mod tests;

pub use config::SchedulingPolicy;
pub use domain::{
    AbsenceSlot, Actor, ActorRole, Candidate, CandidateStatus, CandidateView, RequestId,
    RequestStatus, RequestView, ResponseAction, ScheduledClass, StateChange, SubstitutionRequest,
    TeacherId, TimeSlot,
};
pub use recommend::{EngineError, Recommendation, RecommendationEngine};
pub use repository::{
    InMemoryNotifier, InMemoryRequestStore, NotifierGateway, NotifyError, RepositoryError,
    RequestRepository, SubstitutionNotice, TransitionOutcome,
};
pub use roster::{InMemoryRoster, RosterError, RosterStore, ScheduleEntry, Teacher};
pub use router::substitution_router;
pub use service::{
    InvalidStateError, PermissionError, SubstitutionError, SubstitutionService, ValidationError,
};
pub use workload::{WorkloadCalculator, WorkloadWindow};
