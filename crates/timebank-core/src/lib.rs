//! # Timebank Core Library
//!
//! This library provides the core business logic for Timebank, a
//! time-off-in-lieu (TOIL) tracker. It implements a CLI-first
//! philosophy where all operations are available via a standalone CLI
//! binary, with any GUI being a thin layer over the same core library.
//!
//! ## Architecture
//!
//! - **Entry Store**: JSON-persisted attendance ledger with tombstoned
//!   deletes behind a retried write lock
//! - **Calculation Engine**: Stateless accrual/usage calculator; hours
//!   worked beyond the schedule accrue TOIL, entries carrying the TOIL
//!   job code draw it down
//! - **Event Coordinator**: Dedup/debounce/batch state machine the
//!   caller advances with `tick()`
//! - **Circuit Breaker**: Per-(user, month) gate so each unit is
//!   calculated at most once at a time
//!
//! ## Key Components
//!
//! - [`ToilService`]: The assembled subsystem, one instance per store
//! - [`EntryStore`]: Attendance entry CRUD and persistence
//! - [`WorkSchedule`]: Fortnight rotation of expected working hours
//! - [`Config`]: Application configuration management

pub mod bus;
pub mod clock;
pub mod entry;
pub mod error;
pub mod events;
pub mod schedule;
pub mod storage;
pub mod toil;

pub use bus::{NotificationBus, SubscriberId};
pub use clock::{Clock, ManualClock, SystemClock};
pub use entry::{EntryPatch, EntryStatus, EntryStore, NewEntry, RetryPolicy, TimeEntry};
pub use error::{
    CalculationError, ConfigError, CoreError, ScheduleError, StoreError, ValidationError,
};
pub use events::{Event, TriggerSource};
pub use schedule::{DaySchedule, Holiday, HolidayCalendar, WeekPattern, WorkSchedule};
pub use storage::{Config, JsonStore};
pub use toil::{
    BreakerStatus, CalcScope, CalculationKey, CircuitBreaker, CoordinatorSettings,
    EventCoordinator, MonthKey, QueueOutcome, ServiceSettings, SummaryCache, ToilEngine,
    ToilLedger, ToilRecord, ToilService, ToilSummary, ToilUsage,
};
