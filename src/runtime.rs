//! Process lifecycle: owns both subsystems and their background tasks.
//!
//! `Runtime::start` is the only way to obtain working handles, which makes
//! "operation before init" unrepresentable rather than a runtime check.
//! Startup order matters: the identifier pool is stocked and its refiller
//! running before the session manager exists, because tokens are drawn from
//! the pool.  Shutdown runs in reverse and is idempotent.

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::credentials::CredentialStore;
use crate::error::AuthError;
use crate::idpool::{self, IdentifierPool};
use crate::session::{self, SessionManager};

struct Lifecycle {
    running: bool,
    cancel_sweeper: CancellationToken,
    cancel_refiller: CancellationToken,
    sweeper: Option<JoinHandle<()>>,
    refiller: Option<JoinHandle<()>>,
}

/// Handle to a started warden instance.
///
/// There are no process-wide singletons: each `Runtime` is fully isolated,
/// so tests can run several side by side.
pub struct Runtime {
    sessions: Arc<SessionManager>,
    pool: Arc<IdentifierPool>,
    lifecycle: Mutex<Lifecycle>,
}

impl Runtime {
    /// Load collaborators and start both background tasks.
    ///
    /// Must be called from within a tokio runtime. A `Runtime` is single-use:
    /// after `shutdown`, start a fresh one from the same config.
    pub fn start(config: &Config) -> Result<Self, AuthError> {
        let credentials_file = config
            .credentials_file
            .as_ref()
            .ok_or_else(|| AuthError::ConfigurationMissing("credentials_file".to_string()))?;
        let credentials = CredentialStore::load(credentials_file)?;

        let generator = idpool::generator_for(&config.pool.generator).ok_or_else(|| {
            AuthError::ConfigurationMissing(format!(
                "unknown identifier generator '{}'",
                config.pool.generator
            ))
        })?;

        // Pool first: stocked to target before anything can draw from it.
        let pool = Arc::new(IdentifierPool::new(generator, config.pool_target()));
        pool.prefill()?;
        let cancel_refiller = CancellationToken::new();
        let refiller = idpool::spawn_refiller(
            Arc::clone(&pool),
            config.refill_period(),
            cancel_refiller.clone(),
        );

        let sessions = Arc::new(SessionManager::new(
            credentials,
            Arc::clone(&pool),
            config.max_inactivity(),
        ));
        let cancel_sweeper = CancellationToken::new();
        let sweeper = session::spawn_sweeper(
            Arc::clone(&sessions),
            config.sweep_period(),
            cancel_sweeper.clone(),
        );

        tracing::info!(
            pool_target = pool.target(),
            max_inactivity_secs = config.session.max_inactivity_secs,
            "warden runtime started"
        );

        Ok(Self {
            sessions,
            pool,
            lifecycle: Mutex::new(Lifecycle {
                running: true,
                cancel_sweeper,
                cancel_refiller,
                sweeper: Some(sweeper),
                refiller: Some(refiller),
            }),
        })
    }

    /// Stop both background tasks in reverse start order and wait for them
    /// to finish. Calling this a second time is a no-op.
    pub async fn shutdown(&self) {
        let (sweeper, refiller) = {
            let mut lifecycle = self.lifecycle.lock();
            if !lifecycle.running {
                return;
            }
            lifecycle.running = false;
            lifecycle.cancel_sweeper.cancel();
            lifecycle.cancel_refiller.cancel();
            (lifecycle.sweeper.take(), lifecycle.refiller.take())
        };

        if let Some(handle) = sweeper {
            let _ = handle.await;
        }
        if let Some(handle) = refiller {
            let _ = handle.await;
        }
        tracing::info!("warden runtime stopped");
    }

    pub fn is_running(&self) -> bool {
        self.lifecycle.lock().running
    }

    // ── Boundary operations ─────────────────────────────────────────

    pub async fn authenticate(&self, user_id: &str, credential: &str) -> Result<String, AuthError> {
        self.sessions.authenticate(user_id, credential).await
    }

    pub fn validate(&self, token: &str) -> Result<(), AuthError> {
        self.sessions.validate(token)
    }

    pub fn display_name(&self, token: &str) -> Result<String, AuthError> {
        self.sessions.display_name(token)
    }

    pub fn user_id(&self, token: &str) -> Result<String, AuthError> {
        self.sessions.user_id(token)
    }

    pub fn discard(&self, token: &str) -> Result<(), AuthError> {
        self.sessions.discard(token)
    }

    /// Draw one unique identifier from the pool.
    pub async fn next_identifier(&self) -> String {
        self.pool.next().await
    }

    /// The session manager, for callers that hold it directly.
    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    /// The identifier pool, for callers that hold it directly.
    pub fn pool(&self) -> &Arc<IdentifierPool> {
        &self.pool
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PoolConfig;
    use std::collections::HashSet;
    use std::io::Write;
    use std::time::Duration;
    use tempfile::NamedTempFile;

    fn credentials_file() -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(
            b"[[user]]\n\
              user_id = \"alice\"\n\
              password = \"pw1\"\n\
              display_name = \"Alice Example\"\n",
        )
        .unwrap();
        file
    }

    fn test_config(credentials: &NamedTempFile) -> Config {
        Config {
            credentials_file: Some(credentials.path().to_path_buf()),
            pool: PoolConfig {
                target_size: 16,
                refill_secs: 1,
                ..PoolConfig::default()
            },
            ..Config::default()
        }
    }

    #[tokio::test]
    async fn start_issues_working_tokens() {
        let credentials = credentials_file();
        let runtime = Runtime::start(&test_config(&credentials)).unwrap();

        let token = runtime.authenticate("alice", "pw1").await.unwrap();
        runtime.validate(&token).unwrap();
        assert_eq!(runtime.display_name(&token).unwrap(), "Alice Example");
        assert_eq!(runtime.user_id(&token).unwrap(), "alice");
        runtime.discard(&token).unwrap();

        runtime.shutdown().await;
    }

    #[tokio::test]
    async fn identifiers_are_distinct() {
        let credentials = credentials_file();
        let runtime = Runtime::start(&test_config(&credentials)).unwrap();

        let mut seen = HashSet::new();
        for _ in 0..16 {
            assert!(seen.insert(runtime.next_identifier().await));
        }

        runtime.shutdown().await;
    }

    #[tokio::test]
    async fn shutdown_is_idempotent() {
        let credentials = credentials_file();
        let runtime = Runtime::start(&test_config(&credentials)).unwrap();

        assert!(runtime.is_running());
        runtime.shutdown().await;
        assert!(!runtime.is_running());
        runtime.shutdown().await;
        assert!(!runtime.is_running());
    }

    #[tokio::test]
    async fn restart_from_same_config_works() {
        let credentials = credentials_file();
        let config = test_config(&credentials);

        let first = Runtime::start(&config).unwrap();
        first.shutdown().await;

        let second = Runtime::start(&config).unwrap();
        let token = second.authenticate("alice", "pw1").await.unwrap();
        second.validate(&token).unwrap();
        second.shutdown().await;
    }

    #[tokio::test]
    async fn isolated_runtimes_do_not_share_sessions() {
        let credentials = credentials_file();
        let config = test_config(&credentials);

        let left = Runtime::start(&config).unwrap();
        let right = Runtime::start(&config).unwrap();

        let token = left.authenticate("alice", "pw1").await.unwrap();
        left.validate(&token).unwrap();
        assert!(matches!(
            right.validate(&token),
            Err(AuthError::TokenRequired)
        ));

        left.shutdown().await;
        right.shutdown().await;
    }

    #[tokio::test]
    async fn unknown_generator_key_fails_at_start() {
        let credentials = credentials_file();
        let mut config = test_config(&credentials);
        config.pool.generator = "dce-1".to_string();

        let result = Runtime::start(&config);
        assert!(matches!(result, Err(AuthError::ConfigurationMissing(_))));
    }

    #[tokio::test]
    async fn missing_credentials_path_fails_at_start() {
        let config = Config::default();
        let result = Runtime::start(&config);
        assert!(matches!(result, Err(AuthError::ConfigurationMissing(_))));
    }

    /// End-to-end expiry scenario: short inactivity window, fast sweeper.
    #[tokio::test]
    async fn expired_session_is_rejected_then_gone() {
        let credentials = credentials_file();
        let mut config = test_config(&credentials);
        config.session.max_inactivity_secs = 1;
        config.session.sweep_secs = 1;

        let runtime = Runtime::start(&config).unwrap();
        let token = runtime.authenticate("alice", "pw1").await.unwrap();
        runtime.validate(&token).unwrap();

        // Expired either way; the sweeper may or may not have evicted the
        // record first, and both outcomes are acceptable.
        tokio::time::sleep(Duration::from_millis(1200)).await;
        assert!(matches!(
            runtime.validate(&token),
            Err(AuthError::TokenExpired | AuthError::TokenRequired)
        ));

        // By now the record is gone regardless of who removed it.
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(matches!(
            runtime.discard(&token),
            Err(AuthError::TokenRequired)
        ));

        runtime.shutdown().await;
    }
}
