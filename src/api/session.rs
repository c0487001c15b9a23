use chrono::{TimeDelta, Utc};
use std::collections::HashMap;
use std::ops::Deref;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use uuid::Uuid;

use crate::domain::{Conversation, Message};

#[derive(Debug, Clone, Copy)]
pub struct SessionLimits {
    pub max_messages: usize,
    pub idle_timeout: Duration,
    pub max_sessions: usize,
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self {
            max_messages: 100,
            idle_timeout: Duration::from_secs(60 * 60),
            max_sessions: 1000,
        }
    }
}

type Slot = Arc<Mutex<Conversation>>;

/// In-memory chat sessions keyed by id. Nothing survives a restart.
///
/// Idle sessions expire after `idle_timeout`; past `max_sessions` the least
/// recently used session is dropped. A session in the middle of a turn is
/// never evicted.
#[derive(Clone, Default)]
pub struct SessionStore {
    inner: Arc<RwLock<HashMap<Uuid, Slot>>>,
    limits: SessionLimits,
}

/// Exclusive access to one session for the duration of a chat turn.
pub struct SessionGuard {
    conversation: OwnedMutexGuard<Conversation>,
    max_messages: usize,
}

impl SessionGuard {
    pub fn push(&mut self, message: Message) {
        self.conversation.add_message(message.role, message.content);
        self.conversation.keep_recent(self.max_messages);
    }
}

impl Deref for SessionGuard {
    type Target = Conversation;

    fn deref(&self) -> &Conversation {
        &self.conversation
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(limits: SessionLimits) -> Self {
        Self {
            inner: Arc::default(),
            limits,
        }
    }

    fn idle_limit(&self) -> TimeDelta {
        TimeDelta::from_std(self.limits.idle_timeout).unwrap_or(TimeDelta::MAX)
    }

    /// Locks the session, creating it when missing. Concurrent turns on the
    /// same session run one after another.
    pub async fn open(&self, id: Uuid) -> SessionGuard {
        let slot = {
            let mut sessions = self.inner.write().await;
            self.evict(&mut sessions, id);
            sessions
                .entry(id)
                .or_insert_with(|| Arc::new(Mutex::new(Conversation::with_id(id))))
                .clone()
        };

        SessionGuard {
            conversation: slot.lock_owned().await,
            max_messages: self.limits.max_messages,
        }
    }

    fn evict(&self, sessions: &mut HashMap<Uuid, Slot>, incoming: Uuid) {
        let now = Utc::now();
        let idle = self.idle_limit();
        let before = sessions.len();

        sessions.retain(|_, slot| match slot.try_lock() {
            Ok(conversation) => now - conversation.updated_at < idle,
            Err(_) => true,
        });

        if !sessions.contains_key(&incoming) {
            while sessions.len() >= self.limits.max_sessions {
                let oldest = sessions
                    .iter()
                    .filter_map(|(id, slot)| {
                        slot.try_lock().ok().map(|c| (*id, c.updated_at))
                    })
                    .min_by_key(|(_, updated_at)| *updated_at);
                match oldest {
                    Some((id, _)) => {
                        sessions.remove(&id);
                    }
                    None => break,
                }
            }
        }

        let evicted = before - sessions.len();
        if evicted > 0 {
            tracing::debug!(evicted, remaining = sessions.len(), "evicted chat sessions");
        }
    }

    /// Snapshot of a live session. Waits for an in-flight turn to finish.
    pub async fn get(&self, id: Uuid) -> Option<Conversation> {
        let slot = self.inner.read().await.get(&id).cloned()?;
        let conversation = slot.lock().await.clone();
        (Utc::now() - conversation.updated_at < self.idle_limit()).then_some(conversation)
    }

    pub async fn remove(&self, id: Uuid) -> bool {
        self.inner.write().await.remove(&id).is_some()
    }

    /// Drops every session and returns how many there were.
    pub async fn clear(&self) -> usize {
        let mut sessions = self.inner.write().await;
        let count = sessions.len();
        sessions.clear();
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn live(store: &SessionStore) -> usize {
        store.inner.read().await.len()
    }

    fn limits(max_messages: usize, idle_timeout: Duration, max_sessions: usize) -> SessionLimits {
        SessionLimits {
            max_messages,
            idle_timeout,
            max_sessions,
        }
    }

    #[tokio::test]
    async fn test_sessions_are_isolated() {
        let store = SessionStore::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        {
            let mut session = store.open(a).await;
            session.push(Message::user("hello"));
            session.push(Message::assistant("hi"));
        }
        store.open(b).await.push(Message::user("other"));

        assert_eq!(store.get(a).await.unwrap().messages.len(), 2);
        assert_eq!(store.get(b).await.unwrap().messages.len(), 1);
        assert!(store.get(Uuid::new_v4()).await.is_none());

        assert!(store.remove(a).await);
        assert!(!store.remove(a).await);
        assert_eq!(store.clear().await, 1);
    }

    #[tokio::test]
    async fn test_messages_capped_per_session() {
        let store = SessionStore::with_limits(limits(4, Duration::from_secs(60), 10));
        let id = Uuid::new_v4();

        let mut session = store.open(id).await;
        for i in 0..7 {
            session.push(Message::user(format!("m{i}")));
        }
        let contents: Vec<&str> = session.messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["m3", "m4", "m5", "m6"]);
    }

    #[tokio::test]
    async fn test_idle_sessions_expire() {
        let store = SessionStore::with_limits(limits(10, Duration::from_secs(60), 10));
        let stale = Uuid::new_v4();
        let fresh = Uuid::new_v4();

        {
            let mut session = store.open(stale).await;
            session.push(Message::user("old"));
            session.conversation.updated_at = Utc::now() - TimeDelta::minutes(5);
        }
        assert!(store.get(stale).await.is_none());

        store.open(fresh).await.push(Message::user("new"));

        assert_eq!(live(&store).await, 1);
        assert!(store.get(fresh).await.is_some());
    }

    #[tokio::test]
    async fn test_least_recently_used_evicted_at_capacity() {
        let store = SessionStore::with_limits(limits(10, Duration::from_secs(3600), 2));
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        let third = Uuid::new_v4();

        {
            let mut session = store.open(first).await;
            session.push(Message::user("one"));
            session.conversation.updated_at = Utc::now() - TimeDelta::seconds(30);
        }
        store.open(second).await.push(Message::user("two"));
        store.open(third).await.push(Message::user("three"));

        assert_eq!(live(&store).await, 2);
        assert!(store.get(first).await.is_none());
        assert!(store.get(second).await.is_some());
        assert!(store.get(third).await.is_some());
    }

    #[tokio::test]
    async fn test_busy_session_not_evicted() {
        let store = SessionStore::with_limits(limits(10, Duration::from_secs(3600), 1));
        let busy = Uuid::new_v4();
        let other = Uuid::new_v4();

        let _turn = store.open(busy).await;
        store.open(other).await.push(Message::user("hi"));

        assert_eq!(live(&store).await, 2);
    }

    #[tokio::test]
    async fn test_open_waits_for_running_turn() {
        let store = SessionStore::new();
        let id = Uuid::new_v4();

        let mut first = store.open(id).await;
        let waiting = tokio::time::timeout(Duration::from_millis(50), store.open(id)).await;
        assert!(waiting.is_err());

        first.push(Message::user("q"));
        drop(first);

        let second = store.open(id).await;
        assert_eq!(second.messages.len(), 1);
    }
}
