//! Services wired to in-memory stores and a local bus.

use super::PatrolServices;
use crate::config::PatrolConfig;
use crate::db::memory::InMemoryStore;
use crate::db::models::user_models::{Recipient, UserRole};
use crate::error::Error;
use crate::messaging::broker::{EventCallback, MessageBrokerTrait};
use crate::messaging::{EventMessage, EventType, LocalBroker, PatrolEvents};
use crate::notification::{Notification, NotificationChannel};
use crate::security::Actor;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Channel that records every delivery attempt and fails while `fail` is set
#[derive(Default)]
pub struct RecordingChannel {
    pub sent: Mutex<Vec<Notification>>,
    pub fail: AtomicBool,
}

#[async_trait]
impl NotificationChannel for RecordingChannel {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn send(&self, notification: &Notification) -> Result<(), Error> {
        self.sent.lock().unwrap().push(notification.clone());
        if self.fail.load(Ordering::SeqCst) {
            Err(Error::NotificationDelivery("mail api down".to_string()))
        } else {
            Ok(())
        }
    }
}

pub struct Harness {
    pub store: Arc<InMemoryStore>,
    pub broker: Arc<LocalBroker>,
    pub channel: Arc<RecordingChannel>,
    pub services: PatrolServices,
}

impl Harness {
    pub fn build() -> Self {
        let store = InMemoryStore::new();
        store.recipients.lock().unwrap().push(Recipient {
            user_id: Uuid::new_v4(),
            name: "Night Supervisor".to_string(),
            email: "night@patrol.test".to_string(),
        });

        let broker = Arc::new(LocalBroker::new(64));
        let channel = Arc::new(RecordingChannel::default());
        let services = PatrolServices::new(
            store.stores(),
            &PatrolConfig::default(),
            PatrolEvents::new(broker.clone()),
            channel.clone(),
        );

        Self {
            store,
            broker,
            channel,
            services,
        }
    }

    /// Forward every event of `event_type` into a channel
    pub async fn listen(&self, event_type: EventType) -> mpsc::UnboundedReceiver<EventMessage> {
        let (tx, rx) = mpsc::unbounded_channel();
        let callback: EventCallback = Arc::new(move |event| {
            let _ = tx.send(event);
            Ok(())
        });
        self.broker.subscribe(event_type, callback).await.unwrap();
        rx
    }
}

pub fn admin() -> Actor {
    Actor {
        user_id: Uuid::new_v4(),
        name: "Admin".to_string(),
        role: UserRole::Admin,
        sites: vec![],
        guard_id: None,
    }
}

pub fn guard_actor(guard_id: Uuid) -> Actor {
    Actor {
        user_id: Uuid::new_v4(),
        name: "Guard".to_string(),
        role: UserRole::Guard,
        sites: vec![],
        guard_id: Some(guard_id),
    }
}

/// Wait for background dispatch tasks to settle
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}
