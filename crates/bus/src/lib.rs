//! A thin, awaitable facade over the [`MailStore`](hiveguard_store::MailStore)
//! that normalizes arbitrary event-like input into the canonical event shape
//! and notifies publish hooks after each durable append (spec.md §4.2).

mod error;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use hiveguard_core::{Event, EventStatus, NewEvent};
use hiveguard_store::MailStore;
use serde_json::Value;
use tokio::sync::Notify;
use tracing::{debug, info};

pub use error::BusError;

type PublishHook = Box<dyn Fn(&Event) + Send + Sync>;

/// Awaitable wrapper around a [`MailStore`] exposing the publish/claim/ack
/// vocabulary used by every other component in the runtime.
pub struct EventBus {
    store: MailStore,
    hooks: Mutex<Vec<PublishHook>>,
    shutdown: Arc<Notify>,
}

impl EventBus {
    #[must_use]
    pub fn new(store: MailStore) -> Self {
        Self {
            store,
            hooks: Mutex::new(Vec::new()),
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// Register a function invoked, in registration order, after every
    /// successful durable append.
    pub fn add_publish_hook(&self, hook: impl Fn(&Event) + Send + Sync + 'static) {
        self.hooks.lock().expect("bus hooks mutex poisoned").push(Box::new(hook));
    }

    /// Signal every in-flight and future `claim_next_event` call to return
    /// promptly without waiting out its timeout.
    pub fn shutdown(&self) {
        info!("event bus shutdown requested");
        self.shutdown.notify_waiters();
    }

    /// Normalize `value` into a canonical event and durably append it,
    /// invoking any registered publish hooks afterward.
    pub async fn publish(&self, value: Value) -> Result<i64, BusError> {
        let draft = NewEvent::from_value(value)?;
        let id = self.store.append_event(draft).await?;
        if let Some(event) = self.store.get_event(id).await? {
            for hook in self.hooks.lock().expect("bus hooks mutex poisoned").iter() {
                hook(&event);
            }
        }
        Ok(id)
    }

    /// Publish an already-built [`NewEvent`] draft.
    pub async fn publish_event(&self, draft: NewEvent) -> Result<i64, BusError> {
        let id = self.store.append_event(draft).await?;
        if let Some(event) = self.store.get_event(id).await? {
            for hook in self.hooks.lock().expect("bus hooks mutex poisoned").iter() {
                hook(&event);
            }
        }
        Ok(id)
    }

    /// Claim the next matching pending event, racing the timeout against an
    /// explicit shutdown signal.
    pub async fn claim_next_event(
        &self,
        consumer_id: &str,
        timeout: Duration,
        target_agent: Option<&str>,
        include_unrouted: bool,
        lease_seconds: i64,
    ) -> Result<Option<Event>, BusError> {
        let poll_interval = Duration::from_millis(250);
        let claim = self.store.claim_next_event(
            consumer_id,
            timeout,
            target_agent,
            include_unrouted,
            lease_seconds,
            poll_interval,
        );
        tokio::select! {
            result = claim => result.map_err(BusError::from),
            () = self.shutdown.notified() => {
                debug!(consumer_id, "claim interrupted by shutdown");
                Ok(None)
            }
        }
    }

    pub async fn ack(&self, id: i64, consumer_id: &str) -> Result<(), BusError> {
        self.store.ack_event(id, Some(consumer_id)).await.map_err(BusError::from)
    }

    pub async fn fail(&self, id: i64, error: &str, consumer_id: &str) -> Result<(), BusError> {
        self.store
            .fail_event(id, error, Some(consumer_id))
            .await
            .map_err(BusError::from)
    }

    pub async fn requeue(
        &self,
        id: i64,
        consumer_id: &str,
        error: Option<&str>,
    ) -> Result<(), BusError> {
        self.store
            .requeue_event(id, Some(consumer_id), error)
            .await
            .map_err(BusError::from)
    }

    /// Number of currently pending events.
    pub async fn qsize(&self) -> Result<i64, BusError> {
        let counts = self.store.status_counts().await?;
        Ok(*counts.get(&EventStatus::Pending.to_string()).unwrap_or(&0))
    }

    /// Access the underlying store, e.g. for heartbeat or tool-audit writes
    /// that do not flow through the event vocabulary.
    #[must_use]
    pub fn store(&self) -> &MailStore {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn publish_coerces_and_invokes_hooks() {
        let store = MailStore::open_in_memory().unwrap();
        let bus = EventBus::new(store);
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_clone = Arc::clone(&seen);
        bus.add_publish_hook(move |_event| {
            seen_clone.fetch_add(1, Ordering::SeqCst);
        });

        let id = bus
            .publish(serde_json::json!({"type": "WORKER_STARTED", "origin_id": "supervisor"}))
            .await
            .unwrap();
        assert_eq!(id, 1);
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn qsize_reflects_pending_count() {
        let store = MailStore::open_in_memory().unwrap();
        let bus = EventBus::new(store);
        bus.publish(serde_json::json!({"type": "A", "origin_id": "x"})).await.unwrap();
        bus.publish(serde_json::json!({"type": "B", "origin_id": "x"})).await.unwrap();
        assert_eq!(bus.qsize().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn claim_ack_cycle() {
        let store = MailStore::open_in_memory().unwrap();
        let bus = EventBus::new(store);
        bus.publish(serde_json::json!({"type": "A", "origin_id": "x"})).await.unwrap();
        let event = bus
            .claim_next_event("worker:a:1", Duration::from_millis(50), None, false, 30)
            .await
            .unwrap()
            .expect("should claim");
        bus.ack(event.id, "worker:a:1").await.unwrap();
        assert_eq!(bus.qsize().await.unwrap(), 0);
    }
}
