//! Redis-backed session store.
//!
//! Each login creates a session record keyed
//! `{app_name}:{session_prefix}:{session_id}` holding a JSON blob with the
//! session id and the JWT minted for it, expiring with the session TTL.
//! Absence of the record means the token was revoked or expired; that is an
//! expected condition, not an error.

use redis::aio::ConnectionManager;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::instrument;
use uuid::Uuid;

use crate::auth::token;
use crate::config::Config;
use crate::errors::{Error, Result};
use crate::types::UserId;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
    pub token: String,
}

#[derive(Clone)]
pub struct Sessions {
    redis: ConnectionManager,
    key_prefix: String,
    ttl: Duration,
}

fn build_key(key_prefix: &str, session_id: &str) -> String {
    format!("{key_prefix}:{session_id}")
}

impl Sessions {
    pub fn new(redis: ConnectionManager, config: &Config) -> Self {
        Self {
            redis,
            key_prefix: format!("{}:{}", config.app_name, config.session.prefix),
            ttl: config.session_ttl(),
        }
    }

    /// Create a session for a user: mint a token bound to a fresh session id
    /// and store the record with the configured TTL.
    #[instrument(skip(self, config), err)]
    pub async fn create(&self, user_id: UserId, config: &Config) -> Result<Session> {
        let session_id = Uuid::new_v4().to_string();
        let token = token::create_token(user_id, &session_id, config)?;
        let session = Session { session_id, token };

        let payload = serde_json::to_string(&session).map_err(|e| Error::Internal {
            operation: format!("serialize session: {e}"),
        })?;

        let key = build_key(&self.key_prefix, &session.session_id);
        let mut conn = self.redis.clone();
        redis::cmd("SET")
            .arg(&key)
            .arg(payload)
            .arg("EX")
            .arg(self.ttl.as_secs())
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(|e| Error::Internal {
                operation: format!("store session {key}: {e}"),
            })?;

        Ok(session)
    }

    /// Look up a live session record. `None` means revoked or expired.
    #[instrument(skip(self), err)]
    pub async fn get_by_id(&self, session_id: &str) -> Result<Option<Session>> {
        let key = build_key(&self.key_prefix, session_id);
        let mut conn = self.redis.clone();
        let payload: Option<String> = redis::cmd("GET")
            .arg(&key)
            .query_async(&mut conn)
            .await
            .map_err(|e| Error::Internal {
                operation: format!("load session {key}: {e}"),
            })?;

        match payload {
            Some(json) => {
                let session = serde_json::from_str(&json).map_err(|e| Error::Internal {
                    operation: format!("deserialize session {key}: {e}"),
                })?;
                Ok(Some(session))
            }
            None => Ok(None),
        }
    }

    /// Delete a session record. Idempotent: deleting a missing record is fine.
    #[instrument(skip(self), err)]
    pub async fn delete_by_id(&self, session_id: &str) -> Result<()> {
        let key = build_key(&self.key_prefix, session_id);
        let mut conn = self.redis.clone();
        redis::cmd("DEL")
            .arg(&key)
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(|e| Error::Internal {
                operation: format!("delete session {key}: {e}"),
            })?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_keys_carry_app_name_and_prefix() {
        assert_eq!(
            build_key("conduit:sessions", "7b1c0d8e"),
            "conduit:sessions:7b1c0d8e"
        );
    }

    #[test]
    fn session_record_round_trips_as_json() {
        let session = Session {
            session_id: "abc".to_string(),
            token: "ey.j.wt".to_string(),
        };
        let json = serde_json::to_string(&session).unwrap();
        let parsed: Session = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.session_id, session.session_id);
        assert_eq!(parsed.token, session.token);
    }

    // Runs only when REDIS_URL points at a live server, the way the
    // repository tests run only against a configured database.
    #[tokio::test]
    async fn test_deleting_a_session_revokes_its_token() {
        let Ok(url) = std::env::var("REDIS_URL") else {
            return;
        };
        let redis = crate::cache::connect(&url).await.unwrap();
        let config = Config {
            secret_key: Some("test-secret-key-for-sessions".to_string()),
            app_name: format!("conduit-test-{}", Uuid::new_v4()),
            ..Config::default()
        };
        let sessions = Sessions::new(redis, &config);

        let user_id = Uuid::new_v4();
        let session = sessions.create(user_id, &config).await.unwrap();

        let claims = token::verify_token(&session.token, &config).unwrap();
        assert_eq!(claims.id, user_id);
        assert!(sessions.get_by_id(&claims.session_id).await.unwrap().is_some());

        sessions.delete_by_id(&claims.session_id).await.unwrap();

        // The signature still verifies; request authentication now fails
        // on the missing session record
        assert!(token::verify_token(&session.token, &config).is_ok());
        assert!(sessions.get_by_id(&claims.session_id).await.unwrap().is_none());
    }
}
