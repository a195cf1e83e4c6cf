//! Distributed per-resource locks backed by Redis.
//!
//! Writers that could collide on a unique value (an article slug, a user
//! email) take a short lease on a key derived from that value before touching
//! the database. Acquisition is `SET key token NX PX lease_ms` retried at a
//! fixed interval until a deadline; release is a compare-and-delete so a
//! holder can never delete a lease that expired and was re-acquired by
//! someone else.
//!
//! When the deadline passes without the lock being obtained, `acquire`
//! returns an *unobtained* [`Lease`] and the caller proceeds anyway. The
//! unique indexes on `articles.slug` and `users.email` remain the hard
//! backstop: the raced writer gets a constraint violation instead of a
//! corrupted row. A Redis transport failure, on the other hand, fails the
//! request.

use redis::aio::ConnectionManager;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::errors::{Error, Result};

/// Delete the key only while it still holds our token
const RELEASE_SCRIPT: &str = r#"
if redis.call("get", KEYS[1]) == ARGV[1] then
    return redis.call("del", KEYS[1])
else
    return 0
end
"#;

/// A held (or not held) lock lease. Obtain via [`LockManager::acquire`],
/// give back via [`LockManager::release`].
#[derive(Debug)]
pub struct Lease {
    key: String,
    token: Option<String>,
}

impl Lease {
    /// Whether the lock was actually obtained. Callers proceed either way;
    /// this only affects what `release` has to do.
    pub fn is_obtained(&self) -> bool {
        self.token.is_some()
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

#[derive(Clone)]
pub struct LockManager {
    redis: ConnectionManager,
    namespace: String,
    lease: Duration,
    acquire_deadline: Duration,
    retry_interval: Duration,
}

fn build_key(namespace: &str, key: &str) -> String {
    format!("{namespace}:{key}")
}

impl LockManager {
    pub fn new(redis: ConnectionManager, config: &Config) -> Self {
        Self {
            redis,
            namespace: config.app_name.clone(),
            lease: Duration::from_secs(config.lock.lease_secs),
            acquire_deadline: Duration::from_secs(config.lock.acquire_deadline_secs),
            retry_interval: Duration::from_millis(config.lock.retry_interval_ms),
        }
    }

    /// Try to take the lock for `key`, retrying at a fixed interval until the
    /// acquisition deadline. Returns an unobtained lease if the deadline
    /// passes; errors only if Redis itself is unreachable.
    #[instrument(skip(self), err)]
    pub async fn acquire(&self, key: &str) -> Result<Lease> {
        let full_key = build_key(&self.namespace, key);
        let token = Uuid::new_v4().to_string();
        let deadline = Instant::now() + self.acquire_deadline;
        let lease_ms = self.lease.as_millis() as u64;
        let mut conn = self.redis.clone();

        loop {
            let set: Option<String> = redis::cmd("SET")
                .arg(&full_key)
                .arg(&token)
                .arg("NX")
                .arg("PX")
                .arg(lease_ms)
                .query_async(&mut conn)
                .await
                .map_err(|e| Error::Internal {
                    operation: format!("acquire lock {full_key}: {e}"),
                })?;

            if set.is_some() {
                return Ok(Lease {
                    key: full_key,
                    token: Some(token),
                });
            }

            if Instant::now() >= deadline {
                warn!(key = %full_key, "lock not obtained before deadline, proceeding without it");
                return Ok(Lease {
                    key: full_key,
                    token: None,
                });
            }

            tokio::time::sleep(self.retry_interval).await;
        }
    }

    /// Give a lease back. Unobtained and already-expired leases are no-ops;
    /// a failed release is logged and swallowed since the lease TTL bounds
    /// the damage.
    #[instrument(skip(self, lease), fields(key = %lease.key))]
    pub async fn release(&self, lease: Lease) {
        let Some(token) = lease.token else {
            return;
        };

        let mut conn = self.redis.clone();
        let script = redis::Script::new(RELEASE_SCRIPT);
        if let Err(e) = script
            .key(&lease.key)
            .arg(&token)
            .invoke_async::<_, i64>(&mut conn)
            .await
        {
            warn!(key = %lease.key, "failed to release lock: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_namespaced_by_app_name() {
        assert_eq!(
            build_key("conduit", "article:slug-how-to-train-your-dragon"),
            "conduit:article:slug-how-to-train-your-dragon"
        );
        assert_eq!(build_key("conduit", "user:email-a@b.c"), "conduit:user:email-a@b.c");
    }

    #[test]
    fn unobtained_lease_reports_not_obtained() {
        let lease = Lease {
            key: "conduit:article:slug-x".to_string(),
            token: None,
        };
        assert!(!lease.is_obtained());

        let held = Lease {
            key: "conduit:article:slug-x".to_string(),
            token: Some(Uuid::new_v4().to_string()),
        };
        assert!(held.is_obtained());
    }

    // Runs only when REDIS_URL points at a live server, the way the
    // repository tests run only against a configured database.
    #[tokio::test]
    async fn test_releasing_an_unobtained_lease_leaves_the_holder_alone() {
        let Ok(url) = std::env::var("REDIS_URL") else {
            return;
        };
        let redis = crate::cache::connect(&url).await.unwrap();
        let config = Config {
            app_name: format!("conduit-test-{}", Uuid::new_v4()),
            ..Config::default()
        };
        let locker = LockManager::new(redis.clone(), &config);

        let held = locker.acquire("article:slug-contended").await.unwrap();
        assert!(held.is_obtained());

        // A contender that gave up reports unobtained; releasing it must
        // not free the holder's lease
        let unobtained = Lease {
            key: held.key().to_string(),
            token: None,
        };
        locker.release(unobtained).await;

        let mut conn = redis.clone();
        let value: Option<String> = redis::cmd("GET").arg(held.key()).query_async(&mut conn).await.unwrap();
        assert!(value.is_some(), "unobtained release deleted the holder's lease");

        // The holder's own release does free the key
        let key = held.key().to_string();
        locker.release(held).await;
        let value: Option<String> = redis::cmd("GET").arg(&key).query_async(&mut conn).await.unwrap();
        assert!(value.is_none());
    }
}
