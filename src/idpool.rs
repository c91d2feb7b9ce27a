//! Pre-generated identifier pool.
//!
//! Generating globally-unique identifiers is cheap but not free, so a pool of
//! `target` pre-generated strings is kept on hand and a background refiller
//! tops it up each period.  Consumers pop the most recently added entry —
//! identifiers are interchangeable, so ordering does not matter.
//!
//! ## Design
//! - `parking_lot::Mutex<Vec<String>>` stock; critical sections are a pop or
//!   a bulk extend, never held across an await.
//! - Empty-pool consumers park on a `tokio::sync::Notify` and are woken as
//!   soon as the refiller restocks — no fixed-interval polling.
//! - The stock never exceeds `target`, even when refill passes overlap with
//!   concurrent consumption.
//! - A failed refill pass is logged and the loop continues; cancellation is
//!   normal shutdown.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::AuthError;

/// A pluggable identifier generation strategy.
///
/// Implementations must produce globally-unique strings with cheap equality
/// comparison. The textual form is an external contract, not the pool's.
pub trait IdGenerator: Send + Sync {
    fn generate(&self) -> Result<String, AuthError>;

    fn generate_batch(&self, n: usize) -> Result<Vec<String>, AuthError> {
        (0..n).map(|_| self.generate()).collect()
    }
}

/// Random (version 4) UUIDs in canonical hyphenated form.
#[derive(Debug, Default)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn generate(&self) -> Result<String, AuthError> {
        Ok(uuid::Uuid::new_v4().to_string())
    }
}

/// Resolve a configuration key to a generation strategy.
///
/// This registry replaces by-name class loading: unknown keys are a startup
/// configuration error, not a runtime reflection failure.
pub fn generator_for(key: &str) -> Option<Box<dyn IdGenerator>> {
    match key {
        "uuid-v4" => Some(Box::new(UuidGenerator)),
        _ => None,
    }
}

/// Bounded pool of pre-generated identifiers.
pub struct IdentifierPool {
    stock: Mutex<Vec<String>>,
    restocked: Notify,
    generator: Box<dyn IdGenerator>,
    target: usize,
}

impl IdentifierPool {
    /// Create an empty pool. Call [`prefill`](Self::prefill) before handing
    /// it to consumers.
    pub fn new(generator: Box<dyn IdGenerator>, target: usize) -> Self {
        Self {
            stock: Mutex::new(Vec::with_capacity(target)),
            restocked: Notify::new(),
            generator,
            target,
        }
    }

    /// Take one identifier, waiting for the refiller if the pool is empty.
    ///
    /// There is no hard timeout: if the refiller is stopped while consumers
    /// wait, they wait until the pool is restocked by some other means.
    pub async fn next(&self) -> String {
        let notified = self.restocked.notified();
        tokio::pin!(notified);
        loop {
            // Register interest before checking, so a restock between the
            // check and the await still wakes us.
            notified.as_mut().enable();
            if let Some(id) = self.stock.lock().pop() {
                return id;
            }
            notified.as_mut().await;
            notified.set(self.restocked.notified());
        }
    }

    /// Top the stock up to the target size. Returns the number added.
    ///
    /// Safe to call redundantly: the stock is re-measured under the lock
    /// after generation, so concurrent passes never overshoot the target.
    pub fn refill(&self) -> Result<usize, AuthError> {
        let needed = self.target.saturating_sub(self.stock.lock().len());
        if needed == 0 {
            return Ok(0);
        }

        // Generate outside the lock; consumers keep draining meanwhile.
        let batch = self.generator.generate_batch(needed)?;

        let added = {
            let mut stock = self.stock.lock();
            let room = self.target.saturating_sub(stock.len());
            let take = batch.len().min(room);
            stock.extend(batch.into_iter().take(take));
            take
        };
        if added > 0 {
            self.restocked.notify_waiters();
        }
        Ok(added)
    }

    /// Fill the pool to target before any consumer runs. Alias for the first
    /// refill pass, kept separate so startup reads as startup.
    pub fn prefill(&self) -> Result<usize, AuthError> {
        self.refill()
    }

    /// Current stock size.
    pub fn len(&self) -> usize {
        self.stock.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.stock.lock().is_empty()
    }

    /// Configured target size.
    pub fn target(&self) -> usize {
        self.target
    }
}

/// Spawn the periodic refiller for a shared pool.
pub fn spawn_refiller(
    pool: Arc<IdentifierPool>,
    period: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        // First tick fires immediately; the pool was prefilled at startup,
        // so that pass is a no-op.
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::debug!("identifier refiller stopped");
                    return;
                }
                _ = interval.tick() => {
                    match pool.refill() {
                        Ok(added) if added > 0 => {
                            tracing::debug!(added, stock = pool.len(), "identifier pool restocked");
                        }
                        Ok(_) => {}
                        Err(e) => {
                            tracing::warn!(error = %e, "identifier refill pass failed");
                        }
                    }
                }
            }
        }
    })
}
