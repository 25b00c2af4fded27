//! Persisted attendance ledger.
//!
//! ## Write serialization
//!
//! All mutations funnel through one async write lock, acquired with
//! `try_lock` plus bounded exponential backoff (see [`RetryPolicy`]).
//! A writer that cannot get the lock within its attempts fails with
//! `StoreError::LockExhausted` instead of queueing behind the holder.
//!
//! ## Tombstones
//!
//! Deletes are two-phase: the id joins the tombstone set first, then the
//! entry leaves the active list, both persisted under the same lock
//! acquisition. A crash between the phases leaves a tombstoned id in the
//! persisted active list; the tombstone wins at load time.
//!
//! ## Persistence
//!
//! Active entries live under the `time_entries` storage key, tombstoned
//! ids under `deleted_entries`. A failed persist rolls the in-memory
//! state back to the previous known-good state and returns the error.

use std::collections::HashSet;
use std::sync::{Arc, RwLock};

use chrono::{Datelike, NaiveDate, Utc};
use uuid::Uuid;

use crate::bus::NotificationBus;
use crate::error::{StoreError, ValidationError};
use crate::events::Event;
use crate::storage::JsonStore;

use super::{validate_hours, EntryPatch, NewEntry, RetryPolicy, TimeEntry};

/// Storage key for active entries.
pub const ENTRIES_KEY: &str = "time_entries";
/// Storage key for tombstoned entry ids.
pub const TOMBSTONES_KEY: &str = "deleted_entries";

#[derive(Debug, Default)]
struct StoreState {
    entries: Vec<TimeEntry>,
    tombstones: HashSet<String>,
}

/// Entry ledger with JSON persistence and serialized writes.
pub struct EntryStore {
    state: RwLock<StoreState>,
    write_lock: tokio::sync::Mutex<()>,
    retry: RetryPolicy,
    files: JsonStore,
    bus: Arc<NotificationBus>,
}

impl EntryStore {
    /// Open the store over the default data directory.
    ///
    /// # Errors
    /// Returns an error if the data directory cannot be resolved or
    /// created.
    pub fn open(bus: Arc<NotificationBus>) -> Result<Self, Box<dyn std::error::Error>> {
        Ok(Self::with_files(JsonStore::open()?, bus))
    }

    /// Open the store over a specific storage root (for testing).
    pub fn with_files(files: JsonStore, bus: Arc<NotificationBus>) -> Self {
        let mut entries: Vec<TimeEntry> = files.read_or_default(ENTRIES_KEY);
        let tombstone_ids: Vec<String> = files.read_or_default(TOMBSTONES_KEY);
        let tombstones: HashSet<String> = tombstone_ids.into_iter().collect();
        // A crash between delete phases can leave a tombstoned id in the
        // persisted active list; the tombstone wins.
        entries.retain(|e| !tombstones.contains(&e.id));

        Self {
            state: RwLock::new(StoreState {
                entries,
                tombstones,
            }),
            write_lock: tokio::sync::Mutex::new(()),
            retry: RetryPolicy::default(),
            files,
            bus,
        }
    }

    /// Replace the write retry policy.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// All active entries.
    pub fn get_all_entries(&self) -> Vec<TimeEntry> {
        self.state.read().unwrap().entries.clone()
    }

    /// Active entries for one user.
    pub fn get_user_entries(&self, user_id: &str) -> Vec<TimeEntry> {
        self.state
            .read()
            .unwrap()
            .entries
            .iter()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect()
    }

    /// Active entries for one user on one day.
    pub fn get_day_entries(&self, date: NaiveDate, user_id: &str) -> Vec<TimeEntry> {
        self.state
            .read()
            .unwrap()
            .entries
            .iter()
            .filter(|e| e.user_id == user_id && e.date == date)
            .cloned()
            .collect()
    }

    /// Active entries for one user in the month containing `date`.
    pub fn get_month_entries(&self, date: NaiveDate, user_id: &str) -> Vec<TimeEntry> {
        self.state
            .read()
            .unwrap()
            .entries
            .iter()
            .filter(|e| {
                e.user_id == user_id
                    && e.date.year() == date.year()
                    && e.date.month() == date.month()
            })
            .cloned()
            .collect()
    }

    /// One entry by id, if active.
    pub fn get_entry(&self, id: &str) -> Option<TimeEntry> {
        self.state
            .read()
            .unwrap()
            .entries
            .iter()
            .find(|e| e.id == id)
            .cloned()
    }

    /// Has this id been tombstoned?
    pub fn is_deleted(&self, id: &str) -> bool {
        self.state.read().unwrap().tombstones.contains(id)
    }

    /// Create an entry. Publishes `EntryCreated` on success.
    pub async fn create_entry(&self, new: NewEntry) -> Result<String, StoreError> {
        if new.user_id.trim().is_empty() {
            return Err(ValidationError::MissingField {
                field: "user_id".to_string(),
            }
            .into());
        }
        validate_hours(new.hours)?;

        let now = Utc::now();
        let entry = TimeEntry {
            id: Uuid::new_v4().to_string(),
            user_id: new.user_id,
            date: new.date,
            hours: new.hours,
            job_number: new.job_number,
            status: new.status,
            created_at: now,
            updated_at: now,
        };

        let write_guard = self.acquire_write().await?;

        let previous = {
            let mut state = self.state.write().unwrap();
            let previous = state.entries.clone();
            state.entries.push(entry.clone());
            previous
        };
        if let Err(e) = self.persist_entries().await {
            self.state.write().unwrap().entries = previous;
            return Err(e);
        }
        drop(write_guard);

        self.bus.publish(&Event::EntryCreated {
            entry_id: entry.id.clone(),
            user_id: entry.user_id.clone(),
            date: entry.date,
            at: now,
        });
        Ok(entry.id)
    }

    /// Apply a patch. Returns `Ok(false)` when the id is unknown or
    /// tombstoned. Last write wins; publishes `EntryUpdated` on success.
    pub async fn update_entry(&self, id: &str, patch: EntryPatch) -> Result<bool, StoreError> {
        if let Some(hours) = patch.hours {
            validate_hours(hours)?;
        }

        let write_guard = self.acquire_write().await?;

        let now = Utc::now();
        let (previous, updated) = {
            let mut state = self.state.write().unwrap();
            if state.tombstones.contains(id) {
                return Ok(false);
            }
            let Some(idx) = state.entries.iter().position(|e| e.id == id) else {
                return Ok(false);
            };
            let previous = state.entries.clone();
            let entry = &mut state.entries[idx];
            if let Some(date) = patch.date {
                entry.date = date;
            }
            if let Some(hours) = patch.hours {
                entry.hours = hours;
            }
            if let Some(job_number) = patch.job_number {
                entry.job_number = job_number;
            }
            if let Some(status) = patch.status {
                entry.status = status;
            }
            entry.updated_at = now;
            (previous, entry.clone())
        };
        if let Err(e) = self.persist_entries().await {
            self.state.write().unwrap().entries = previous;
            return Err(e);
        }
        drop(write_guard);

        self.bus.publish(&Event::EntryUpdated {
            entry_id: updated.id,
            user_id: updated.user_id,
            date: updated.date,
            at: now,
        });
        Ok(true)
    }

    /// Tombstone an entry, then drop it from the active list. Returns
    /// `Ok(false)` when the id is unknown. Publishes `EntryDeleted` on
    /// success.
    pub async fn delete_entry(&self, id: &str) -> Result<bool, StoreError> {
        let write_guard = self.acquire_write().await?;

        let Some(removed) = self.get_entry(id) else {
            return Ok(false);
        };

        // Phase 1: record the tombstone.
        self.state
            .write()
            .unwrap()
            .tombstones
            .insert(id.to_string());
        if let Err(e) = self.persist_tombstones().await {
            self.state.write().unwrap().tombstones.remove(id);
            return Err(e);
        }

        // Phase 2: drop from the active list.
        let previous = {
            let mut state = self.state.write().unwrap();
            let previous = state.entries.clone();
            state.entries.retain(|e| e.id != id);
            previous
        };
        if let Err(e) = self.persist_entries().await {
            {
                let mut state = self.state.write().unwrap();
                state.entries = previous;
                state.tombstones.remove(id);
            }
            if let Err(e2) = self.persist_tombstones().await {
                tracing::warn!(error = %e2, "failed to restore tombstone file after aborted delete");
            }
            return Err(e);
        }
        drop(write_guard);

        self.bus.publish(&Event::EntryDeleted {
            entry_id: removed.id.clone(),
            user_id: removed.user_id.clone(),
            date: removed.date,
            at: Utc::now(),
        });
        Ok(true)
    }

    /// Tombstone and remove every entry for a user under one lock
    /// acquisition. Returns the removed entries.
    pub async fn delete_user_entries(&self, user_id: &str) -> Result<Vec<TimeEntry>, StoreError> {
        let write_guard = self.acquire_write().await?;

        let removed = self.get_user_entries(user_id);
        if removed.is_empty() {
            return Ok(removed);
        }

        {
            let mut state = self.state.write().unwrap();
            for entry in &removed {
                state.tombstones.insert(entry.id.clone());
            }
        }
        if let Err(e) = self.persist_tombstones().await {
            let mut state = self.state.write().unwrap();
            for entry in &removed {
                state.tombstones.remove(&entry.id);
            }
            return Err(e);
        }

        let previous = {
            let mut state = self.state.write().unwrap();
            let previous = state.entries.clone();
            state.entries.retain(|e| e.user_id != user_id);
            previous
        };
        if let Err(e) = self.persist_entries().await {
            {
                let mut state = self.state.write().unwrap();
                state.entries = previous;
                for entry in &removed {
                    state.tombstones.remove(&entry.id);
                }
            }
            if let Err(e2) = self.persist_tombstones().await {
                tracing::warn!(error = %e2, "failed to restore tombstone file after aborted delete");
            }
            return Err(e);
        }
        drop(write_guard);

        let now = Utc::now();
        for entry in &removed {
            self.bus.publish(&Event::EntryDeleted {
                entry_id: entry.id.clone(),
                user_id: entry.user_id.clone(),
                date: entry.date,
                at: now,
            });
        }
        Ok(removed)
    }

    /// Acquire the write lock, retrying per policy.
    async fn acquire_write(&self) -> Result<tokio::sync::MutexGuard<'_, ()>, StoreError> {
        let mut attempt: u32 = 0;
        loop {
            match self.write_lock.try_lock() {
                Ok(guard) => return Ok(guard),
                Err(_) => {
                    attempt += 1;
                    if attempt >= self.retry.max_attempts {
                        return Err(StoreError::LockExhausted { attempts: attempt });
                    }
                    let delay = self.retry.delay_for(attempt - 1);
                    tracing::debug!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "write lock contended; backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    async fn persist_entries(&self) -> Result<(), StoreError> {
        let entries = self.state.read().unwrap().entries.clone();
        self.files.write(ENTRIES_KEY, &entries).await
    }

    async fn persist_tombstones(&self) -> Result<(), StoreError> {
        let ids = {
            let state = self.state.read().unwrap();
            let mut ids: Vec<String> = state.tombstones.iter().cloned().collect();
            ids.sort();
            ids
        };
        self.files.write(TOMBSTONES_KEY, &ids).await
    }
}
