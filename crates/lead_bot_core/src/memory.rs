//! crates/lead_bot_core/src/memory.rs
//!
//! The volatile `SessionStore` backend. Functionally complete, but every
//! session is lost when the process exits.

use crate::domain::{ConversationState, Session, SessionPatch, SessionStats};
use crate::ports::{PortError, PortResult, SessionStore};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<String, Session>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn collect_sorted<F, K>(&self, filter: F, sort_key: K) -> Vec<Session>
    where
        F: Fn(&Session) -> bool,
        K: Fn(&Session) -> chrono::DateTime<Utc>,
    {
        let sessions = self.sessions.read().await;
        let mut matching: Vec<Session> = sessions.values().filter(|s| filter(s)).cloned().collect();
        matching.sort_by(|a, b| sort_key(b).cmp(&sort_key(a)));
        matching
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, correspondent_id: &str) -> PortResult<Option<Session>> {
        Ok(self.sessions.read().await.get(correspondent_id).cloned())
    }

    async fn create(&self, correspondent_id: &str, display_name: Option<&str>) -> PortResult<Session> {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(correspondent_id) {
            return Err(PortError::AlreadyExists(format!("Session {} already exists", correspondent_id)));
        }
        let session = Session::new(correspondent_id, display_name.map(str::to_string));
        sessions.insert(correspondent_id.to_string(), session.clone());
        debug!(correspondent = %correspondent_id, "Created session in memory");
        Ok(session)
    }

    async fn update(&self, correspondent_id: &str, patch: SessionPatch) -> PortResult<Session> {
        let mut sessions = self.sessions.write().await;
        let current = sessions
            .get(correspondent_id)
            .ok_or_else(|| PortError::NotFound(format!("Session {} not found", correspondent_id)))?;
        let next = patch.apply(current, Utc::now());
        sessions.insert(correspondent_id.to_string(), next.clone());
        debug!(correspondent = %correspondent_id, state = %next.state, "Updated session in memory");
        Ok(next)
    }

    async fn list_all(&self) -> PortResult<Vec<Session>> {
        Ok(self.collect_sorted(|_| true, |s| s.last_activity_at).await)
    }

    async fn list_by_state(&self, state: ConversationState) -> PortResult<Vec<Session>> {
        Ok(self.collect_sorted(|s| s.state == state, |s| s.last_activity_at).await)
    }

    async fn list_completed(&self) -> PortResult<Vec<Session>> {
        Ok(self.collect_sorted(|s| s.registration_complete, |s| s.created_at).await)
    }

    async fn delete(&self, correspondent_id: &str) -> PortResult<bool> {
        let removed = self.sessions.write().await.remove(correspondent_id).is_some();
        if removed {
            debug!(correspondent = %correspondent_id, "Deleted session from memory");
        }
        Ok(removed)
    }

    async fn stats(&self) -> PortResult<SessionStats> {
        let sessions = self.sessions.read().await;
        Ok(SessionStats::from_sessions(sessions.values()))
    }
}
