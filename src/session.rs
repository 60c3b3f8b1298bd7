// task_backend/src/session.rs
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use uuid::Uuid;

pub const SESSION_COOKIE: &str = "session_id";

#[derive(Debug, Clone, Copy)]
pub struct Session {
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

/// Server-side sessions: token -> owning user. The token itself travels in
/// a private (encrypted) cookie.
pub struct SessionStore {
    sessions: DashMap<String, Session>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        SessionStore {
            sessions: DashMap::new(),
            ttl,
        }
    }

    /// Opens a session for `user_id` and returns its token.
    pub fn create(&self, user_id: Uuid) -> String {
        self.purge_expired();
        let token = Uuid::new_v4().to_string();
        self.sessions.insert(
            token.clone(),
            Session {
                user_id,
                expires_at: Utc::now() + self.ttl,
            },
        );
        token
    }

    /// Resolves a token to its user. Expired sessions are dropped.
    pub fn resolve(&self, token: &str) -> Option<Uuid> {
        let session = *self.sessions.get(token)?.value();
        if session.expires_at <= Utc::now() {
            self.sessions.remove(token);
            return None;
        }
        Some(session.user_id)
    }

    pub fn destroy(&self, token: &str) {
        self.sessions.remove(token);
    }

    /// Drops every session belonging to `user_id` except `keep`.
    pub fn destroy_others(&self, user_id: Uuid, keep: &str) {
        self.sessions
            .retain(|token, session| session.user_id != user_id || token == keep);
    }

    #[cfg(test)]
    fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    fn purge_expired(&self) {
        let now = Utc::now();
        self.sessions.retain(|_, session| session.expires_at > now);
    }
}
