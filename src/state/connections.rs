use super::room::Notice;
use crate::protocol::ServerMessage;
use crate::types::ConnectionId;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};

/// Outbound channels of every open WebSocket, keyed by connection id
#[derive(Debug, Clone, Default)]
pub struct ConnectionHub {
    senders: Arc<RwLock<HashMap<ConnectionId, mpsc::UnboundedSender<ServerMessage>>>>,
}

impl ConnectionHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection and hand back the receiving end of its queue
    pub async fn register(&self, connection: &ConnectionId) -> mpsc::UnboundedReceiver<ServerMessage> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.senders.write().await.insert(connection.clone(), tx);
        rx
    }

    pub async fn unregister(&self, connection: &ConnectionId) {
        self.senders.write().await.remove(connection);
    }

    /// Deliver room pushes; recipients that already left are skipped
    pub async fn deliver(&self, notices: Vec<Notice>) {
        if notices.is_empty() {
            return;
        }
        let senders = self.senders.read().await;
        for notice in notices {
            match senders.get(&notice.to) {
                Some(tx) => {
                    if tx.send(notice.msg).is_err() {
                        tracing::debug!(connection = %notice.to, "Dropping push for closed connection");
                    }
                }
                None => {
                    tracing::debug!(connection = %notice.to, "Dropping push for unknown connection");
                }
            }
        }
    }

    pub(crate) async fn len(&self) -> usize {
        self.senders.read().await.len()
    }
}
