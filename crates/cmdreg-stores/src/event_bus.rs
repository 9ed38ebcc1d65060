//! In-process MessageBus based on tokio broadcast channels.

use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use tokio::sync::broadcast;

use cmdreg_core::bus::{BusError, MessageBus, Subscription};
use cmdreg_core::message::{Message, MessageId};

pub struct BroadcastMessageBus {
    /// `None` once the bus is closed
    tx: RwLock<Option<broadcast::Sender<Message>>>,
    capacity: usize,
}

impl BroadcastMessageBus {
    /// Create a new broadcast bus with channel capacity.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx: RwLock::new(Some(tx)),
            capacity,
        }
    }

    /// Return the configured channel capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for BroadcastMessageBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[async_trait]
impl MessageBus for BroadcastMessageBus {
    async fn publish(&self, message: Message) -> Result<(), BusError> {
        tracing::trace!(id = %message.id, "publish");
        let tx = self.tx.read().unwrap_or_else(PoisonError::into_inner);
        let Some(tx) = tx.as_ref() else {
            return Err(BusError::Closed);
        };
        // No receiver is not an error; nobody was interested in this id.
        let _ = tx.send(message);
        Ok(())
    }

    fn subscribe(&self, ids: &[MessageId]) -> Subscription {
        let tx = self.tx.read().unwrap_or_else(PoisonError::into_inner);
        let rx = match tx.as_ref() {
            Some(tx) => tx.subscribe(),
            // Sender dropped right away, so the subscription ends immediately.
            None => broadcast::channel::<Message>(1).1,
        };
        Subscription::new(rx, ids)
    }

    fn close(&self) {
        if self
            .tx
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .is_some()
        {
            tracing::debug!("message bus closed");
        }
    }
}
