//! MessageBus - publish/subscribe abstraction.
//!
//! A subscriber declares the message ids it consumes and receives those
//! messages in publish order, one at a time.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::broadcast;

use crate::message::{Message, MessageId};

/// Bus error types
#[derive(Debug, Error)]
pub enum BusError {
    #[error("Bus closed")]
    Closed,
}

/// MessageBus trait - async interface for publish/subscribe.
#[async_trait]
pub trait MessageBus: Send + Sync {
    /// Publish a message to every subscriber of its id.
    async fn publish(&self, message: Message) -> Result<(), BusError>;

    /// Subscribe to the given message ids.
    fn subscribe(&self, ids: &[MessageId]) -> Subscription;

    /// Stop accepting messages. Later publishes fail with [`BusError::Closed`]
    /// and every subscription ends once drained.
    fn close(&self);
}

/// One item read from a [`Subscription`].
#[derive(Debug)]
pub enum Delivery {
    Message(Message),
    /// The subscriber fell behind and this many messages were dropped,
    /// subscribed ids included.
    Lagged(u64),
}

/// Receiving half of a bus subscription, filtered by message id.
pub struct Subscription {
    rx: broadcast::Receiver<Message>,
    ids: Vec<MessageId>,
}

impl Subscription {
    pub fn new(rx: broadcast::Receiver<Message>, ids: &[MessageId]) -> Self {
        Self {
            rx,
            ids: ids.to_vec(),
        }
    }

    /// Ids this subscription delivers.
    pub fn ids(&self) -> &[MessageId] {
        &self.ids
    }

    /// Wait for the next subscribed message or lag report. Returns `None` once
    /// the bus is closed.
    pub async fn next(&mut self) -> Option<Delivery> {
        loop {
            match self.rx.recv().await {
                Ok(message) if self.ids.contains(&message.id) => {
                    return Some(Delivery::Message(message))
                }
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, ids = ?self.ids, "subscriber lagged, messages dropped");
                    return Some(Delivery::Lagged(skipped));
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Wait for the next subscribed message, skipping over lag reports.
    pub async fn recv(&mut self) -> Option<Message> {
        loop {
            match self.next().await? {
                Delivery::Message(message) => return Some(message),
                Delivery::Lagged(_) => continue,
            }
        }
    }

    /// Return the next subscribed message if one is already queued.
    pub fn try_recv(&mut self) -> Option<Message> {
        loop {
            match self.rx.try_recv() {
                Ok(message) if self.ids.contains(&message.id) => return Some(message),
                Ok(_) => continue,
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, ids = ?self.ids, "subscriber lagged, messages dropped");
                }
                Err(_) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_subscription_skips_unsubscribed_ids() {
        tokio_test::block_on(async {
            let (tx, rx) = broadcast::channel(8);
            let mut sub = Subscription::new(rx, &[MessageId(1)]);

            tx.send(Message::command(MessageId(2), "skip", json!(null), "button"))
                .unwrap();
            tx.send(Message::command(MessageId(1), "keep", json!(null), "button"))
                .unwrap();

            let message = sub.recv().await.expect("message");
            assert_eq!(message.id, MessageId(1));
            assert!(sub.try_recv().is_none());
        });
    }

    #[test]
    fn test_subscription_reports_lag() {
        tokio_test::block_on(async {
            let (tx, rx) = broadcast::channel(1);
            let mut sub = Subscription::new(rx, &[MessageId(1)]);

            tx.send(Message::folder_changed(MessageId(1), "/dropped"))
                .unwrap();
            tx.send(Message::command(MessageId(99), "noise", json!(null), "button"))
                .unwrap();

            assert!(matches!(sub.next().await, Some(Delivery::Lagged(1))));
            drop(tx);
            assert!(sub.next().await.is_none());
        });
    }

    #[test]
    fn test_subscription_ends_when_bus_closes() {
        tokio_test::block_on(async {
            let (tx, rx) = broadcast::channel::<Message>(8);
            let mut sub = Subscription::new(rx, &[MessageId(1)]);
            drop(tx);
            assert!(sub.recv().await.is_none());
        });
    }
}
