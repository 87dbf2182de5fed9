use std::{fmt, sync::Arc};

use dashmap::DashMap;
use uuid::Uuid;

use crate::infra::websocket::connection::Session;

/// Registry of live WebSocket sessions.
///
/// Fan-out itself happens per session: every bound session runs a forwarder
/// subscribed to the job controller's broadcast channel, so the manager only
/// tracks liveness and handles disconnect cleanup.
pub struct SessionManager {
    /// Active sessions mapped by connection ID
    sessions: DashMap<Uuid, Arc<Session>>,
}

impl fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionManager")
            .field("session_count", &self.sessions.len())
            .finish()
    }
}

impl SessionManager {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }

    /// Register a new session
    pub fn add_session(&self, session: Arc<Session>) {
        self.sessions.insert(session.id, session);
    }

    /// Remove a session and stop its event forwarder
    pub fn remove_session(&self, session_id: Uuid) {
        if let Some((_, session)) = self.sessions.remove(&session_id) {
            session.shutdown();
        }
    }

    /// Get a specific session
    pub fn get_session(&self, session_id: &Uuid) -> Option<Arc<Session>> {
        self.sessions.get(session_id).map(|s| s.clone())
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}
