//! Time-off-in-lieu accrual and usage tracking.
//!
//! The heart of the crate: worked hours beyond a user's scheduled hours
//! accrue TOIL; entries carrying the configured TOIL job code draw the
//! balance back down. Everything is keyed by [`CalculationKey`]
//! (user + month), which is also the unit of caching, gating and
//! trigger deduplication.

pub mod breaker;
pub mod cache;
pub mod coordinator;
pub mod engine;
pub mod ledger;
pub mod service;
pub mod types;


pub use breaker::{BreakerStatus, CalculationGuard, CircuitBreaker};
pub use cache::SummaryCache;
pub use coordinator::{
    CalculationBatch, CoordinatorSettings, EventCoordinator, FlushOutcome, QueueOutcome,
    SummaryUpdate,
};
pub use engine::ToilEngine;
pub use ledger::ToilLedger;
pub use service::{ServiceSettings, ToilService};
pub use types::{CalcScope, CalculationKey, MonthKey, ToilRecord, ToilSummary, ToilUsage};
