//! Distributed lock
//!
//! Cluster-wide mutual exclusion with a lease, so a crashed holder cannot
//! stall other instances past the lease expiry. Acquisition retries are
//! bounded; a caller that cannot get the lock gives up instead of waiting.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LockError {
    /// Held by someone else after all tries
    #[error("Lock '{0}' is held by another instance")]
    Unavailable(String),

    #[error("Lock storage error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Proof of ownership returned by `acquire`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockHandle {
    pub name: String,
    pub holder: String,
}

#[async_trait]
pub trait LockProvider: Send + Sync {
    /// Try up to `max_tries` times to take `name` for `lease`.
    async fn acquire(
        &self,
        name: &str,
        lease: Duration,
        max_tries: u32,
    ) -> Result<LockHandle, LockError>;

    /// Release a lock; only the holder's own lease is removed.
    async fn release(&self, handle: LockHandle) -> Result<(), LockError>;
}

/// Unique holder token: `{unix_ts}:{instance_id}:{uuid}`
pub fn holder_token(instance_id: &str) -> String {
    format!(
        "{}:{}:{}",
        chrono::Utc::now().timestamp(),
        instance_id,
        uuid::Uuid::new_v4().simple()
    )
}

/// Run `work` while holding `name`.
///
/// Returns `Ok(None)` when the lock is unavailable. The lock is released
/// after `work` completes whatever its result.
pub async fn run_exclusive<F, T>(
    provider: &dyn LockProvider,
    name: &str,
    lease: Duration,
    max_tries: u32,
    work: F,
) -> Result<Option<T>, LockError>
where
    F: Future<Output = T>,
{
    let handle = match provider.acquire(name, lease, max_tries).await {
        Ok(handle) => handle,
        Err(LockError::Unavailable(_)) => return Ok(None),
        Err(e) => return Err(e),
    };

    let output = work.await;

    if let Err(e) = provider.release(handle).await {
        tracing::warn!(lock = name, error = %e, "Failed to release lock, lease will expire");
    }

    Ok(Some(output))
}

/// Lease lock backed by the `distributed_locks` table
#[derive(Debug, Clone)]
pub struct PgLeaseLock {
    pool: PgPool,
    instance_id: String,
    retry_delay: Duration,
}

impl PgLeaseLock {
    pub fn new(pool: PgPool, instance_id: impl Into<String>) -> Self {
        Self {
            pool,
            instance_id: instance_id.into(),
            retry_delay: Duration::from_millis(500),
        }
    }

    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    /// Single attempt; true when our row now holds the lock
    async fn try_acquire(&self, name: &str, holder: &str, lease: Duration) -> Result<bool, sqlx::Error> {
        let rows_affected = sqlx::query(
            r#"
            INSERT INTO distributed_locks (lock_name, holder, acquired_at, expires_at)
            VALUES ($1, $2, NOW(), NOW() + make_interval(secs => $3))
            ON CONFLICT (lock_name) DO UPDATE
            SET holder = EXCLUDED.holder,
                acquired_at = EXCLUDED.acquired_at,
                expires_at = EXCLUDED.expires_at
            WHERE distributed_locks.expires_at < NOW()
            "#,
        )
        .bind(name)
        .bind(holder)
        .bind(lease.as_secs_f64())
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(rows_affected == 1)
    }
}

#[async_trait]
impl LockProvider for PgLeaseLock {
    async fn acquire(
        &self,
        name: &str,
        lease: Duration,
        max_tries: u32,
    ) -> Result<LockHandle, LockError> {
        let holder = holder_token(&self.instance_id);

        for attempt in 1..=max_tries.max(1) {
            if self.try_acquire(name, &holder, lease).await? {
                tracing::debug!(lock = name, %holder, attempt, "Lock acquired");
                return Ok(LockHandle {
                    name: name.to_string(),
                    holder,
                });
            }
            if attempt < max_tries {
                tokio::time::sleep(self.retry_delay).await;
            }
        }

        Err(LockError::Unavailable(name.to_string()))
    }

    async fn release(&self, handle: LockHandle) -> Result<(), LockError> {
        sqlx::query("DELETE FROM distributed_locks WHERE lock_name = $1 AND holder = $2")
            .bind(&handle.name)
            .bind(&handle.holder)
            .execute(&self.pool)
            .await?;

        tracing::debug!(lock = %handle.name, holder = %handle.holder, "Lock released");
        Ok(())
    }
}

/// In-process lease lock for single-node deployments and tests
#[derive(Debug, Clone)]
pub struct LocalLockProvider {
    instance_id: String,
    retry_delay: Duration,
    leases: Arc<Mutex<HashMap<String, (String, Instant)>>>,
}

impl LocalLockProvider {
    pub fn new(instance_id: impl Into<String>) -> Self {
        Self {
            instance_id: instance_id.into(),
            retry_delay: Duration::from_millis(10),
            leases: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// A second provider sharing this one's lease table, like another
    /// instance talking to the same lock store
    pub fn peer(&self, instance_id: impl Into<String>) -> Self {
        Self {
            instance_id: instance_id.into(),
            retry_delay: self.retry_delay,
            leases: Arc::clone(&self.leases),
        }
    }

    fn try_acquire(&self, name: &str, holder: &str, lease: Duration) -> bool {
        let mut leases = self.leases.lock().unwrap_or_else(|e| e.into_inner());
        let now = Instant::now();
        match leases.get(name) {
            Some((_, expires_at)) if *expires_at > now => false,
            _ => {
                leases.insert(name.to_string(), (holder.to_string(), now + lease));
                true
            }
        }
    }
}

#[async_trait]
impl LockProvider for LocalLockProvider {
    async fn acquire(
        &self,
        name: &str,
        lease: Duration,
        max_tries: u32,
    ) -> Result<LockHandle, LockError> {
        let holder = holder_token(&self.instance_id);

        for attempt in 1..=max_tries.max(1) {
            if self.try_acquire(name, &holder, lease) {
                return Ok(LockHandle {
                    name: name.to_string(),
                    holder,
                });
            }
            if attempt < max_tries {
                tokio::time::sleep(self.retry_delay).await;
            }
        }

        Err(LockError::Unavailable(name.to_string()))
    }

    async fn release(&self, handle: LockHandle) -> Result<(), LockError> {
        let mut leases = self.leases.lock().unwrap_or_else(|e| e.into_inner());
        if matches!(leases.get(&handle.name), Some((holder, _)) if *holder == handle.holder) {
            leases.remove(&handle.name);
        }
        Ok(())
    }
}
