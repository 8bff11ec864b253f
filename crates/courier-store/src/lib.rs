use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::debug;

use courier_types::{ConversationKey, Message, UserId};

/// Both directions of a conversation as seen by `sender`.
#[derive(Debug, Clone, Default)]
pub struct History {
    /// receiver -> sender, in send order
    pub reverse: Vec<Message>,
    /// sender -> receiver, in send order
    pub forward: Vec<Message>,
}

/// In-memory message store shared by every connection.
///
/// Sequences only grow; nothing is evicted for the life of the process.
/// Writers hold the lock for the duration of one push, so concurrent sends to
/// the same key land one after the other in lock acquisition order.
#[derive(Clone, Default)]
pub struct ConversationStore {
    inner: Arc<RwLock<HashMap<ConversationKey, Vec<Message>>>>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `message` to the end of the sequence for `key`.
    pub async fn append(&self, key: ConversationKey, message: Message) {
        let mut conversations = self.inner.write().await;
        let sequence = conversations.entry(key).or_default();
        sequence.push(message);
        debug!(%key, len = sequence.len(), "message stored");
    }

    /// Messages stored under `key`, empty if nothing was ever sent.
    pub async fn get(&self, key: ConversationKey) -> Vec<Message> {
        self.inner
            .read()
            .await
            .get(&key)
            .cloned()
            .unwrap_or_default()
    }

    /// Read both directions between `sender` and `receiver` under one lock.
    pub async fn history(&self, sender: UserId, receiver: UserId) -> History {
        let forward_key = ConversationKey::new(sender, receiver);
        let conversations = self.inner.read().await;
        let read = |key: ConversationKey| conversations.get(&key).cloned().unwrap_or_default();
        History {
            reverse: read(forward_key.reversed()),
            forward: read(forward_key),
        }
    }

    pub async fn len(&self, key: ConversationKey) -> usize {
        self.inner.read().await.get(&key).map_or(0, Vec::len)
    }

    /// Number of directional conversations with at least one message.
    pub async fn conversation_count(&self) -> usize {
        self.inner.read().await.len()
    }
}
