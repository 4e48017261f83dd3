use crate::error::Error;
use crate::messaging::broker::{deliver, EventCallback, MessageBrokerTrait};
use crate::messaging::event::{topic_matches, EventMessage, EventType};
use anyhow::Result;
use async_trait::async_trait;
use log::{debug, info, warn};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use uuid::Uuid;

/// In-process broker used when RabbitMQ is disabled. Same topic semantics
/// as the RabbitMQ exchange; events are lost if nobody is subscribed.
pub struct LocalBroker {
    sender: broadcast::Sender<EventMessage>,
    subscriptions: Arc<RwLock<HashMap<String, JoinHandle<()>>>>,
}

impl LocalBroker {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(16));
        Self {
            sender,
            subscriptions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn subscription_count(&self) -> usize {
        self.subscriptions.read().await.len()
    }
}

#[async_trait]
impl MessageBrokerTrait for LocalBroker {
    async fn publish(
        &self,
        event_type: EventType,
        source_id: Option<Uuid>,
        payload: serde_json::Value,
    ) -> Result<()> {
        let event = EventMessage::new(event_type, source_id, payload);
        debug!("Publishing local event: {}", event.routing_key());
        // A send error only means there are no receivers right now
        let _ = self.sender.send(event);
        Ok(())
    }

    async fn subscribe_pattern(&self, pattern: &str, callback: EventCallback) -> Result<String> {
        let mut receiver = self.sender.subscribe();
        let subscription_id = Uuid::new_v4().to_string();
        let pattern_owned = pattern.to_string();
        let subscription_id_clone = subscription_id.clone();

        let handle = tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(event) => {
                        if topic_matches(&pattern_owned, &event.routing_key()) {
                            deliver(&callback, event);
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(
                            "Subscription {} lagged, {} events skipped",
                            subscription_id_clone, skipped
                        );
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        self.subscriptions
            .write()
            .await
            .insert(subscription_id.clone(), handle);

        info!("Subscribed to local pattern: {}", pattern);
        Ok(subscription_id)
    }

    async fn unsubscribe(&self, subscription_id: &str) -> Result<()> {
        match self.subscriptions.write().await.remove(subscription_id) {
            Some(handle) => {
                handle.abort();
                Ok(())
            }
            None => {
                Err(Error::NotFound(format!("Subscription not found: {}", subscription_id)).into())
            }
        }
    }

    async fn unsubscribe_all(&self) {
        for (_, handle) in self.subscriptions.write().await.drain() {
            handle.abort();
        }
    }
}
