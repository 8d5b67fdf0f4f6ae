//! Subscriber hub for per-execution progress updates.
//!
//! Connections subscribe to an execution ID; the runner broadcasts updates
//! keyed by that ID. Delivery is best-effort, at most once: a subscriber with
//! a full or closed channel is dropped, never retried.

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::debug;

use super::message::WsMessage;

struct Subscriber {
    connection_id: String,
    tx: mpsc::Sender<WsMessage>,
}

/// Routes automation updates to subscribed WebSocket connections.
pub struct UpdateHub {
    /// execution_id -> subscribers.
    subscribers: DashMap<String, Vec<Subscriber>>,
}

impl UpdateHub {
    pub fn new() -> Self {
        Self {
            subscribers: DashMap::new(),
        }
    }

    /// Subscribe a connection to updates for one execution. A connection
    /// re-subscribing to the same execution replaces its previous entry.
    pub fn subscribe(&self, execution_id: &str, connection_id: &str, tx: mpsc::Sender<WsMessage>) {
        let mut entry = self.subscribers.entry(execution_id.to_string()).or_default();
        entry.retain(|s| s.connection_id != connection_id);
        entry.push(Subscriber {
            connection_id: connection_id.to_string(),
            tx,
        });
        debug!(
            "connection {} subscribed to execution {}",
            connection_id, execution_id
        );
    }

    /// Drop a connection from every subscription list.
    pub fn remove_connection(&self, connection_id: &str) {
        self.subscribers.retain(|_, subs| {
            subs.retain(|s| s.connection_id != connection_id);
            !subs.is_empty()
        });
    }

    /// Broadcast an update to the subscribers of one execution. Subscribers
    /// that cannot accept the message are dropped.
    pub fn broadcast(&self, execution_id: &str, message: WsMessage) {
        let Some(mut subs) = self.subscribers.get_mut(execution_id) else {
            return;
        };
        subs.retain(|s| s.tx.try_send(message.clone()).is_ok());
    }

    /// Drop all subscriptions for an execution once it is terminal.
    pub fn clear_execution(&self, execution_id: &str) {
        self.subscribers.remove(execution_id);
    }

    /// Number of distinct executions with at least one subscriber.
    pub fn subscribed_executions(&self) -> usize {
        self.subscribers.len()
    }
}

impl Default for UpdateHub {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_broadcast_reaches_only_matching_subscribers() {
        let hub = UpdateHub::new();
        let (tx_a, mut rx_a) = mpsc::channel(8);
        let (tx_b, mut rx_b) = mpsc::channel(8);
        hub.subscribe("exec-a", "conn-1", tx_a);
        hub.subscribe("exec-b", "conn-2", tx_b);

        hub.broadcast("exec-a", WsMessage::automation_update("exec-a", "progress", None));

        let msg = rx_a.recv().await.unwrap();
        assert!(matches!(msg, WsMessage::AutomationUpdate { automation_id, .. } if automation_id == "exec-a"));
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_removed_connection_receives_nothing() {
        let hub = UpdateHub::new();
        let (tx, mut rx) = mpsc::channel(8);
        hub.subscribe("exec-a", "conn-1", tx);
        hub.remove_connection("conn-1");

        hub.broadcast("exec-a", WsMessage::automation_update("exec-a", "progress", None));
        assert!(rx.try_recv().is_err());
        assert_eq!(hub.subscribed_executions(), 0);
    }

    #[tokio::test]
    async fn test_resubscribe_replaces_entry() {
        let hub = UpdateHub::new();
        let (tx_old, mut rx_old) = mpsc::channel(8);
        let (tx_new, mut rx_new) = mpsc::channel(8);
        hub.subscribe("exec-a", "conn-1", tx_old);
        hub.subscribe("exec-a", "conn-1", tx_new);

        hub.broadcast("exec-a", WsMessage::automation_update("exec-a", "started", None));
        assert!(rx_old.try_recv().is_err());
        assert!(rx_new.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_full_channel_subscriber_is_dropped() {
        let hub = UpdateHub::new();
        let (tx, _rx) = mpsc::channel(1);
        hub.subscribe("exec-a", "conn-1", tx);

        hub.broadcast("exec-a", WsMessage::automation_update("exec-a", "progress", None));
        // channel is now full; the next broadcast drops the subscriber
        hub.broadcast("exec-a", WsMessage::automation_update("exec-a", "progress", None));

        hub.broadcast("exec-a", WsMessage::automation_update("exec-a", "completed", None));
        assert_eq!(hub.subscribed_executions(), 1);
        let subs = hub.subscribers.get("exec-a").unwrap();
        assert!(subs.is_empty());
    }
}
