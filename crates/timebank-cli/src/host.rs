//! Shared service wiring for CLI commands.
//!
//! Each command opens a [`Host`]: the JSON file store, notification
//! bus, entry store and TOIL service assembled from the on-disk
//! configuration, plus a tokio runtime for the store's async write
//! path. Commands are one-shot processes, so anything they queue on
//! the coordinator must be drained before exit.

use std::future::Future;
use std::sync::Arc;

use timebank_core::entry::ENTRIES_KEY;
use timebank_core::{
    Config, EntryStore, HolidayCalendar, JsonStore, NotificationBus, SystemClock, ToilService,
    WorkSchedule,
};

/// Storage key for the persisted work schedule.
pub const SCHEDULE_KEY: &str = "work_schedule";
/// Storage key for the persisted holiday calendar.
pub const HOLIDAYS_KEY: &str = "holidays";

pub struct Host {
    runtime: tokio::runtime::Runtime,
    files: JsonStore,
    pub service: Arc<ToilService>,
}

impl Host {
    /// Assemble the service from the data directory.
    pub fn open() -> Result<Self, Box<dyn std::error::Error>> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        let config = Config::load_or_default();
        let files = JsonStore::open()?;
        tracing::debug!(entries = %files.path_for(ENTRIES_KEY).display(), "opening host");

        let bus = Arc::new(NotificationBus::new());
        let store = Arc::new(
            EntryStore::with_files(files.clone(), bus.clone())
                .with_retry_policy(config.retry_policy()),
        );
        let service = Arc::new(ToilService::new(
            store,
            bus,
            Arc::new(SystemClock),
            config.service_settings(),
        ));

        let schedule: Option<WorkSchedule> = files.read_or_default(SCHEDULE_KEY);
        service.set_schedule(schedule);
        service.set_holidays(files.read_or_default(HOLIDAYS_KEY));

        Ok(Self {
            runtime,
            files,
            service,
        })
    }

    /// Run a future to completion on the host runtime.
    pub fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }

    /// Persist the work schedule and apply it to the running service.
    pub fn save_schedule(&self, schedule: &WorkSchedule) -> Result<(), Box<dyn std::error::Error>> {
        self.block_on(self.files.write(SCHEDULE_KEY, schedule))?;
        self.service.set_schedule(Some(schedule.clone()));
        Ok(())
    }

    /// Persist the holiday calendar and apply it to the running service.
    pub fn save_holidays(
        &self,
        holidays: &HolidayCalendar,
    ) -> Result<(), Box<dyn std::error::Error>> {
        self.block_on(self.files.write(HOLIDAYS_KEY, holidays))?;
        self.service.set_holidays(holidays.clone());
        Ok(())
    }
}
