//! Integration tests for the notification pipeline.
//!
//! Wires a full service (store, bus, coordinator, breaker, cache) over
//! a temp directory and a manual clock, then walks entry mutations
//! through debounce, batching and delivery. No sleeps anywhere: every
//! window is crossed by advancing the clock and calling `tick()`.

use std::sync::{Arc, Mutex};

use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};
use timebank_core::{
    Clock, EntryPatch, EntryStatus, EntryStore, Event, JsonStore, ManualClock, MonthKey,
    NewEntry, NotificationBus, QueueOutcome, ServiceSettings, ToilService, TriggerSource,
    WorkSchedule,
};

struct Harness {
    service: Arc<ToilService>,
    clock: Arc<ManualClock>,
    events: Arc<Mutex<Vec<Event>>>,
    dir: tempfile::TempDir,
}

impl Harness {
    fn snapshot(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    fn clear_events(&self) {
        self.events.lock().unwrap().clear();
    }
}

fn standard_schedule() -> WorkSchedule {
    WorkSchedule::standard(
        NaiveDate::from_ymd_opt(2025, 6, 2).unwrap(),
        NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
        NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
    )
}

fn harness_with(settings: ServiceSettings) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let bus = Arc::new(NotificationBus::new());
    let store = Arc::new(EntryStore::with_files(
        JsonStore::with_root(dir.path()),
        Arc::clone(&bus),
    ));
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2025, 6, 2, 9, 0, 0).unwrap(),
    ));
    let service = Arc::new(ToilService::new(
        store,
        Arc::clone(&bus),
        Arc::clone(&clock) as Arc<dyn Clock>,
        settings,
    ));
    service.set_schedule(Some(standard_schedule()));

    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    bus.subscribe(move |event| {
        sink.lock().unwrap().push(event.clone());
        Ok(())
    });

    Harness {
        service,
        clock,
        events,
        dir,
    }
}

fn harness() -> Harness {
    harness_with(ServiceSettings::default())
}

fn june() -> MonthKey {
    MonthKey::new(2025, 6).unwrap()
}

fn july() -> MonthKey {
    MonthKey::new(2025, 7).unwrap()
}

fn new_entry(day: u32, hours: f64) -> NewEntry {
    new_entry_on(NaiveDate::from_ymd_opt(2025, 6, day).unwrap(), hours)
}

fn new_entry_on(date: NaiveDate, hours: f64) -> NewEntry {
    NewEntry {
        user_id: "u1".to_string(),
        date,
        hours,
        job_number: None,
        status: EntryStatus::Draft,
    }
}

fn calc_requests(events: &[Event]) -> Vec<Vec<MonthKey>> {
    events
        .iter()
        .filter_map(|e| match e {
            Event::CalculationRequested { months, .. } => Some(months.clone()),
            _ => None,
        })
        .collect()
}

fn summary_updates(events: &[Event]) -> Vec<(MonthKey, f64, TriggerSource)> {
    events
        .iter()
        .filter_map(|e| match e {
            Event::SummaryUpdated {
                month,
                accrued,
                source,
                ..
            } => Some((*month, *accrued, *source)),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn test_entry_create_flows_to_notification() {
    let h = harness();
    // Monday 2025-06-02, 10h on an 8h day.
    h.service.create_entry(new_entry(2, 10.0)).await.unwrap();
    assert_eq!(h.service.pending_triggers(), 1);

    // Inside the debounce window nothing moves.
    assert_eq!(h.service.tick(), 0);

    // Window closes: one consolidated request goes out and the month
    // is calculated, queueing a summary update for the next flush.
    h.clock.advance_ms(500);
    assert_eq!(h.service.tick(), 1);
    assert_eq!(calc_requests(&h.snapshot()), vec![vec![june()]]);

    h.clock.advance_ms(500);
    assert_eq!(h.service.tick(), 1);
    let updates = summary_updates(&h.snapshot());
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].0, june());
    assert_eq!(updates[0].1, 2.0);
    assert_eq!(updates[0].2, TriggerSource::EntryCreated);

    // Plus the raw entry event from the store itself.
    assert!(matches!(h.snapshot()[0], Event::EntryCreated { .. }));
}

#[tokio::test]
async fn test_five_refreshes_one_delivered_notification() {
    let h = harness_with(ServiceSettings {
        min_refresh_gap_ms: 0,
        ..ServiceSettings::default()
    });
    h.service.create_entry(new_entry(2, 10.0)).await.unwrap();
    h.clock.advance_ms(1500);
    h.service.drain();
    h.clear_events();
    // Step past the dedup window left by the drain's delivery.
    h.clock.advance_ms(1500);

    // Five forced refreshes inside one debounce window.
    for _ in 0..5 {
        let summary = h.service.refresh_summary("u1", june());
        assert_eq!(summary.accrued, 2.0);
        h.clock.advance_ms(100);
    }

    assert_eq!(h.service.tick(), 1);
    let updates = summary_updates(&h.snapshot());
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].2, TriggerSource::Refresh);
}

#[tokio::test]
async fn test_duplicate_triggers_dropped_within_window() {
    let h = harness();
    h.service.create_entry(new_entry(2, 10.0)).await.unwrap();
    h.clock.advance_ms(1500);
    h.service.drain();
    h.clear_events();
    h.clock.advance_ms(1500);

    assert_eq!(
        h.service
            .trigger_toil_calculation("u1", june(), TriggerSource::Manual),
        QueueOutcome::Queued
    );
    for _ in 0..4 {
        h.clock.advance_ms(50);
        assert_eq!(
            h.service
                .trigger_toil_calculation("u1", june(), TriggerSource::Manual),
            QueueOutcome::DroppedDuplicate
        );
    }

    h.clock.advance_ms(300);
    h.service.tick();
    assert_eq!(calc_requests(&h.snapshot()).len(), 1);
}

#[tokio::test]
async fn test_stop_gates_pipeline_and_resume_restores() {
    let h = harness();
    h.service.create_entry(new_entry(2, 10.0)).await.unwrap();
    h.service.stop_calculations();
    assert!(h.service.breaker_status().globally_disabled);

    // Reads fall back to zero instead of failing.
    let summary = h.service.summary("u1", june());
    assert_eq!(summary.accrued, 0.0);

    // The flush still announces the request, but the gated run produces
    // no summary update.
    h.clock.advance_ms(500);
    h.service.tick();
    h.clock.advance_ms(500);
    h.service.tick();
    assert_eq!(calc_requests(&h.snapshot()).len(), 1);
    assert!(summary_updates(&h.snapshot()).is_empty());

    h.service.resume_calculations();
    assert!(!h.service.breaker_status().globally_disabled);
    let summary = h.service.refresh_summary("u1", june());
    assert_eq!(summary.accrued, 2.0);
}

#[tokio::test]
async fn test_bulk_delete_regenerates_every_month_to_zero() {
    let h = harness();
    h.service.create_entry(new_entry(2, 10.0)).await.unwrap();
    h.service
        .create_entry(new_entry_on(NaiveDate::from_ymd_opt(2025, 7, 1).unwrap(), 9.0))
        .await
        .unwrap();
    h.clock.advance_ms(1500);
    h.service.drain();
    assert_eq!(h.service.summary("u1", june()).accrued, 2.0);
    assert_eq!(h.service.summary("u1", july()).accrued, 1.0);
    h.clear_events();
    h.clock.advance_ms(1500);

    let removed = h.service.delete_user_entries("u1").await.unwrap();
    assert_eq!(removed, 2);
    h.service.flush();

    let events = h.snapshot();
    let deletes = events
        .iter()
        .filter(|e| matches!(e, Event::EntryDeleted { .. }))
        .count();
    assert_eq!(deletes, 2);

    let mut updates = summary_updates(&events);
    updates.sort_by_key(|(month, _, _)| *month);
    assert_eq!(updates.len(), 2);
    assert_eq!(updates[0], (june(), 0.0, TriggerSource::Regenerate));
    assert_eq!(updates[1], (july(), 0.0, TriggerSource::Regenerate));

    assert_eq!(h.service.summary("u1", june()).remaining, 0.0);
}

#[tokio::test]
async fn test_cross_month_move_consolidates_one_request() {
    let h = harness();
    // Monday 2025-06-30.
    let id = h
        .service
        .create_entry(new_entry(30, 10.0))
        .await
        .unwrap();
    h.clock.advance_ms(1500);

    let patch = EntryPatch {
        date: Some(NaiveDate::from_ymd_opt(2025, 7, 1).unwrap()),
        ..EntryPatch::default()
    };
    assert!(h.service.update_entry(&id, patch).await.unwrap());
    assert_eq!(h.service.pending_triggers(), 2);

    // Both months ride one consolidated request.
    h.service.tick();
    let requests = calc_requests(&h.snapshot());
    assert_eq!(requests, vec![vec![june(), july()]]);

    h.clock.advance_ms(500);
    h.service.tick();
    let mut updates = summary_updates(&h.snapshot());
    updates.sort_by_key(|(month, _, _)| *month);
    assert_eq!(updates.len(), 2);
    // June lost the entry entirely; July gained 2h over its Tuesday.
    assert_eq!(updates[0].0, june());
    assert_eq!(updates[0].1, 0.0);
    assert_eq!(updates[1].0, july());
    assert_eq!(updates[1].1, 2.0);
}

#[tokio::test]
async fn test_subscriber_may_reenter_service() {
    let h = harness();
    h.service.create_entry(new_entry(2, 10.0)).await.unwrap();

    // A subscriber that reads back through the service while handling
    // the update it caused. Publishes hold no internal locks, so this
    // must neither deadlock nor observe a stale value.
    let observed = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&observed);
    let service = Arc::clone(&h.service);
    h.service.bus().subscribe(move |event| {
        if matches!(event, Event::SummaryUpdated { .. }) {
            let summary = service.summary("u1", june());
            *sink.lock().unwrap() = Some(summary.accrued);
        }
        Ok(())
    });

    h.clock.advance_ms(500);
    h.service.tick();
    h.clock.advance_ms(500);
    h.service.tick();

    assert_eq!(*observed.lock().unwrap(), Some(2.0));
}

#[tokio::test]
async fn test_balance_survives_reload() {
    let h = harness();
    h.service.create_entry(new_entry(2, 10.0)).await.unwrap();
    h.service
        .create_entry(NewEntry {
            job_number: Some("TOIL".to_string()),
            ..new_entry(3, 4.0)
        })
        .await
        .unwrap();
    assert_eq!(h.service.summary("u1", june()).remaining, -2.0);

    // A second service over the same directory sees the same entries.
    let bus = Arc::new(NotificationBus::new());
    let store = Arc::new(EntryStore::with_files(
        JsonStore::with_root(h.dir.path()),
        Arc::clone(&bus),
    ));
    let reloaded = ToilService::new(
        store,
        bus,
        Arc::new(ManualClock::new(h.clock.now())) as Arc<dyn Clock>,
        ServiceSettings::default(),
    );
    reloaded.set_schedule(Some(standard_schedule()));

    let summary = reloaded.summary("u1", june());
    assert_eq!(summary.accrued, 2.0);
    assert_eq!(summary.used, 4.0);
    assert_eq!(summary.remaining, -2.0);
}
