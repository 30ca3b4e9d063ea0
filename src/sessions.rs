//! Session/context store.
//!
//! A session is the conversation-scoped state shared by every task that
//! carries the same context ID. Stores are pluggable; the in-memory store
//! lives as long as the process.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use serde_json::Value;

use crate::a2a::Message;

/// One logical conversation.
#[derive(Debug)]
pub struct Session {
    id: String,
    created_at: DateTime<Utc>,
    state: RwLock<HashMap<String, Value>>,
    history: RwLock<Vec<Message>>,
}

impl Session {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            created_at: Utc::now(),
            state: RwLock::new(HashMap::new()),
            history: RwLock::new(Vec::new()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// A state value by key.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.state.read().get(key).cloned()
    }

    pub fn set(&self, key: impl Into<String>, value: Value) {
        self.state.write().insert(key.into(), value);
    }

    /// Return the value under `key`, inserting `init()` first if absent.
    pub fn get_or_insert_with<F>(&self, key: &str, init: F) -> Value
    where
        F: FnOnce() -> Value,
    {
        self.state
            .write()
            .entry(key.to_string())
            .or_insert_with(init)
            .clone()
    }

    pub fn push_message(&self, message: Message) {
        self.history.write().push(message);
    }

    /// A copy of the conversation history.
    pub fn history(&self) -> Vec<Message> {
        self.history.read().clone()
    }
}

/// Pluggable key-value store of sessions.
#[async_trait]
pub trait SessionStore: Send + Sync + std::fmt::Debug {
    /// The session for `session_id`, created on first reference.
    ///
    /// Concurrent callers with the same ID observe the same session.
    async fn get_or_create(&self, session_id: &str) -> Arc<Session>;

    /// The session for `session_id`, if it exists.
    async fn get(&self, session_id: &str) -> Option<Arc<Session>>;
}

/// Process-lifetime session store.
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: DashMap<String, Arc<Session>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get_or_create(&self, session_id: &str) -> Arc<Session> {
        // The entry guard holds the shard lock, so creation is at most once per id.
        self.sessions
            .entry(session_id.to_string())
            .or_insert_with(|| {
                log::debug!("Creating session {}", session_id);
                Arc::new(Session::new(session_id))
            })
            .value()
            .clone()
    }

    async fn get(&self, session_id: &str) -> Option<Arc<Session>> {
        self.sessions.get(session_id).map(|s| s.value().clone())
    }
}
