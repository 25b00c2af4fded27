//! Notification bus.
//!
//! Single typed pub/sub channel for [`Event`]s. Subscribers are plain
//! callbacks registered at runtime; a failing subscriber is logged and
//! skipped so one bad listener cannot starve the rest. The subscriber
//! list is snapshotted before delivery, which lets callbacks subscribe
//! or unsubscribe while an event is in flight.

use std::sync::{Arc, Mutex};

use crate::events::Event;

/// Handle returned by [`NotificationBus::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

type Callback = Arc<dyn Fn(&Event) -> Result<(), String> + Send + Sync>;

struct BusState {
    next_id: u64,
    subscribers: Vec<(SubscriberId, Callback)>,
}

/// Typed pub/sub channel for the whole subsystem.
pub struct NotificationBus {
    state: Mutex<BusState>,
}

impl NotificationBus {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(BusState {
                next_id: 1,
                subscribers: Vec::new(),
            }),
        }
    }

    /// Register a callback for every published event.
    pub fn subscribe<F>(&self, callback: F) -> SubscriberId
    where
        F: Fn(&Event) -> Result<(), String> + Send + Sync + 'static,
    {
        let mut state = self.state.lock().unwrap();
        let id = SubscriberId(state.next_id);
        state.next_id += 1;
        state.subscribers.push((id, Arc::new(callback)));
        id
    }

    /// Remove a subscriber. Returns false when the id is unknown.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let mut state = self.state.lock().unwrap();
        let before = state.subscribers.len();
        state.subscribers.retain(|(sid, _)| *sid != id);
        state.subscribers.len() != before
    }

    /// Deliver an event to every subscriber registered at the time of
    /// the call. Returns the number of successful deliveries.
    pub fn publish(&self, event: &Event) -> usize {
        let snapshot: Vec<(SubscriberId, Callback)> = {
            let state = self.state.lock().unwrap();
            state.subscribers.clone()
        };

        let mut delivered = 0;
        for (id, callback) in snapshot {
            match callback(event) {
                Ok(()) => delivered += 1,
                Err(message) => {
                    tracing::warn!(
                        subscriber = id.0,
                        %message,
                        "event subscriber failed; continuing delivery"
                    );
                }
            }
        }
        delivered
    }

    pub fn subscriber_count(&self) -> usize {
        self.state.lock().unwrap().subscribers.len()
    }
}

impl Default for NotificationBus {
    fn default() -> Self {
        Self::new()
    }
}
