//! Core workflow for arranging substitute teachers.
//!
//! The crate owns the substitution-assignment workflow: ranking eligible
//! substitutes by current workload, the request lifecycle from creation
//! through department-head approval to terminal resolution, and the
//! concurrency-safe "first acceptance wins" arbitration between notified
//! candidates. Rosters, timetables, and push delivery are reached through
//! traits so deployments can plug in their own stores.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
