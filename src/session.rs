//! Session table with sliding inactivity expiration.
//!
//! A successful `authenticate` draws an opaque token from the identifier
//! pool and binds a session record to it.  Every successful validate or
//! lookup refreshes the record's last-used stamp, so a session stays alive
//! as long as it keeps being used.
//!
//! ## Expiration
//! Expiry is enforced in two places that may race harmlessly:
//! - `validate` (and the lookups) checks the window on every call and evicts
//!   the record the moment it observes an expired one;
//! - the background sweeper walks the table each period and removes anything
//!   stale, bounding memory when expired sessions are never touched again.
//!
//! Whichever observes an expired record first wins; both outcomes are
//! acceptable to callers.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::credentials::CredentialStore;
use crate::error::AuthError;
use crate::idpool::IdentifierPool;

/// Server-side state bound to one token.
#[derive(Debug, Clone)]
struct SessionRecord {
    user_id: String,
    display_name: String,
    last_used: Instant,
}

/// Owns the session table and the credential store backing `authenticate`.
pub struct SessionManager {
    credentials: CredentialStore,
    pool: Arc<IdentifierPool>,
    sessions: RwLock<HashMap<String, SessionRecord>>,
    max_inactivity: Duration,
}

impl SessionManager {
    pub fn new(
        credentials: CredentialStore,
        pool: Arc<IdentifierPool>,
        max_inactivity: Duration,
    ) -> Self {
        Self {
            credentials,
            pool,
            sessions: RwLock::new(HashMap::new()),
            max_inactivity,
        }
    }

    /// Check credentials and open a session. Returns the new token.
    pub async fn authenticate(
        &self,
        user_id: &str,
        credential: &str,
    ) -> Result<String, AuthError> {
        let record = self.credentials.verify(user_id, credential)?;
        let display_name = record.display_name.clone();
        let user_id = record.user_id.clone();

        // Token uniqueness comes from the pool's generation strategy, so a
        // live token can never collide with a newly issued one.
        let token = self.pool.next().await;

        let mut sessions = self.sessions.write();
        sessions.insert(
            token.clone(),
            SessionRecord {
                user_id: user_id.clone(),
                display_name,
                last_used: Instant::now(),
            },
        );
        drop(sessions);

        tracing::info!(user_id = %user_id, "session established");
        Ok(token)
    }

    /// Check a token and refresh its inactivity window.
    pub fn validate(&self, token: &str) -> Result<(), AuthError> {
        self.touch(token).map(|_| ())
    }

    /// Validate-and-refresh, returning the session's display name.
    pub fn display_name(&self, token: &str) -> Result<String, AuthError> {
        self.touch(token).map(|record| record.display_name)
    }

    /// Validate-and-refresh, returning the session's user id.
    pub fn user_id(&self, token: &str) -> Result<String, AuthError> {
        self.touch(token).map(|record| record.user_id)
    }

    /// Remove a session unconditionally — expired-but-unswept entries are
    /// still discardable.
    pub fn discard(&self, token: &str) -> Result<(), AuthError> {
        if token.trim().is_empty() {
            return Err(AuthError::TokenRequired);
        }
        match self.sessions.write().remove(token) {
            Some(record) => {
                tracing::info!(user_id = %record.user_id, "session discarded");
                Ok(())
            }
            None => Err(AuthError::TokenRequired),
        }
    }

    /// Remove every session whose inactivity window has elapsed.
    /// Returns the number removed.
    pub fn sweep_expired(&self) -> usize {
        let max_inactivity = self.max_inactivity;
        let mut sessions = self.sessions.write();
        let before = sessions.len();
        sessions.retain(|_, record| record.last_used.elapsed() < max_inactivity);
        before - sessions.len()
    }

    /// Number of sessions currently in the table, expired or not.
    pub fn active_sessions(&self) -> usize {
        self.sessions.read().len()
    }

    /// Shared lookup path: reject malformed/absent tokens, evict and reject
    /// expired ones, refresh and clone the rest.
    fn touch(&self, token: &str) -> Result<SessionRecord, AuthError> {
        if token.trim().is_empty() {
            return Err(AuthError::TokenRequired);
        }

        let mut sessions = self.sessions.write();
        let record = sessions.get_mut(token).ok_or(AuthError::TokenRequired)?;

        if record.last_used.elapsed() >= self.max_inactivity {
            let user_id = record.user_id.clone();
            sessions.remove(token);
            tracing::debug!(user_id = %user_id, "expired session evicted on access");
            return Err(AuthError::TokenExpired);
        }

        record.last_used = Instant::now();
        Ok(record.clone())
    }
}

/// Spawn the periodic sweeper for a shared session manager.
pub fn spawn_sweeper(
    manager: Arc<SessionManager>,
    period: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::debug!("session sweeper stopped");
                    return;
                }
                _ = interval.tick() => {
                    let removed = manager.sweep_expired();
                    if removed > 0 {
                        tracing::debug!(removed, "swept expired sessions");
                    }
                }
            }
        }
    })
}
