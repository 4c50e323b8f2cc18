//! In-memory conversation store
//!
//! Owned by the engine and torn down with it. Each conversation sits behind
//! its own async mutex so concurrent turns on one id are serialized.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::types::Conversation;

/// Conversations keyed by id
#[derive(Default)]
pub struct ConversationStore {
    conversations: DashMap<String, Arc<Mutex<Conversation>>>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock the conversation for one turn, creating it if needed
    ///
    /// An absent id gets a fresh `conv_<uuid>`; an unknown id is created as given.
    pub async fn checkout(&self, id: Option<&str>) -> OwnedMutexGuard<Conversation> {
        let id = match id.map(str::trim).filter(|id| !id.is_empty()) {
            Some(id) => id.to_string(),
            None => format!("conv_{}", uuid::Uuid::new_v4()),
        };

        let slot = self
            .conversations
            .entry(id.clone())
            .or_insert_with(|| {
                tracing::debug!("Starting conversation {}", id);
                Arc::new(Mutex::new(Conversation::new(id.clone())))
            })
            .clone();

        slot.lock_owned().await
    }

    /// Snapshot of a conversation's current state
    pub async fn get(&self, id: &str) -> Option<Conversation> {
        let slot = self.conversations.get(id).map(|c| c.clone())?;
        let conversation = slot.lock().await;
        Some(conversation.clone())
    }

    /// Remove a conversation nobody else is waiting on that never recorded a turn
    pub fn discard_if_empty(&self, id: &str) -> bool {
        let removed = self
            .conversations
            .remove_if(id, |_, slot| {
                Arc::strong_count(slot) == 1
                    && slot.try_lock().map(|c| c.turns.is_empty()).unwrap_or(false)
            })
            .is_some();
        if removed {
            tracing::debug!("Dropped empty conversation {}", id);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.conversations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conversations.is_empty()
    }

    /// Drop every conversation
    pub fn shutdown(&self) {
        let count = self.conversations.len();
        self.conversations.clear();
        tracing::info!("Cleared {} conversations", count);
    }
}
