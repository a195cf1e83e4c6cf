//! Redis connection setup.
//!
//! Both the session store and the lock manager share one [`ConnectionManager`],
//! which multiplexes commands over a single reconnecting connection and is
//! cheap to clone.

use anyhow::Context;
use redis::aio::ConnectionManager;

pub async fn connect(redis_url: &str) -> anyhow::Result<ConnectionManager> {
    let client = redis::Client::open(redis_url).context("invalid redis url")?;
    let manager = ConnectionManager::new(client)
        .await
        .context("failed to connect to redis")?;
    Ok(manager)
}
