//! TOML-backed runtime configuration.
//!
//! Non-security settings (sweep period, pool sizing) fall back to defaults
//! when omitted.  The credential source location is security-relevant and has
//! no default: loading fails fast instead of running against a guessed path.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::AuthError;

/// Default inactivity window before a session expires (seconds).
const DEFAULT_MAX_INACTIVITY_SECS: u64 = 1200;

/// Default period between sweeper passes (seconds).
const DEFAULT_SWEEP_SECS: u64 = 3600;

/// Default identifier pool target size.
const DEFAULT_POOL_TARGET: usize = 100;

/// Default period between pool refill passes (seconds).
const DEFAULT_POOL_REFILL_SECS: u64 = 10;

/// Default identifier generation strategy key.
const DEFAULT_GENERATOR: &str = "uuid-v4";

/// Top-level configuration, normally loaded from `warden.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Path to the TOML credential file. Required — there is no default.
    pub credentials_file: Option<PathBuf>,
    pub session: SessionConfig,
    pub pool: PoolConfig,
}

/// `[session]` table.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Inactivity window before a session expires (seconds).
    pub max_inactivity_secs: u64,
    /// Period between sweeper passes (seconds).
    pub sweep_secs: u64,
}

/// `[pool]` table.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Number of pre-generated identifiers to keep on hand.
    pub target_size: usize,
    /// Period between refill passes (seconds).
    pub refill_secs: u64,
    /// Identifier generation strategy key (see `idpool::generator_for`).
    pub generator: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_inactivity_secs: DEFAULT_MAX_INACTIVITY_SECS,
            sweep_secs: DEFAULT_SWEEP_SECS,
        }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            target_size: DEFAULT_POOL_TARGET,
            refill_secs: DEFAULT_POOL_REFILL_SECS,
            generator: DEFAULT_GENERATOR.to_string(),
        }
    }
}

impl Config {
    /// Load and validate configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, AuthError> {
        let contents = std::fs::read_to_string(path).map_err(|source| AuthError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = toml::from_str(&contents).map_err(|source| AuthError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), AuthError> {
        if self.credentials_file.is_none() {
            return Err(AuthError::ConfigurationMissing(
                "credentials_file".to_string(),
            ));
        }
        Ok(())
    }

    pub fn max_inactivity(&self) -> Duration {
        Duration::from_secs(self.session.max_inactivity_secs)
    }

    pub fn sweep_period(&self) -> Duration {
        Duration::from_secs(self.session.sweep_secs.max(1))
    }

    pub fn refill_period(&self) -> Duration {
        Duration::from_secs(self.pool.refill_secs.max(1))
    }

    /// Pool target, clamped to at least one entry.
    pub fn pool_target(&self) -> usize {
        self.pool.target_size.max(1)
    }
}
