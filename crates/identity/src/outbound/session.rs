use async_trait::async_trait;
use bb8_redis::redis::AsyncCommands;
use bb8_redis::{RedisConnectionManager, bb8};

use crate::domain::error::IdentityError;

/// Server-side session store: opaque token → authenticated user id.
///
/// Sessions hold only the user id. Profile data is re-read from the user
/// store on every request, so edits are never served from a stale copy.
#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait SessionStore: Send + Sync {
    /// Binds a session token to a user for `ttl_secs` seconds.
    async fn bind(&self, token: &str, user_id: i64, ttl_secs: u64) -> Result<(), IdentityError>;

    /// Resolves a token to the bound user id, if the session is alive.
    async fn find(&self, token: &str) -> Result<Option<i64>, IdentityError>;

    /// Destroys a session. Clearing an absent token is not an error.
    async fn clear(&self, token: &str) -> Result<(), IdentityError>;
}

/// Redis-backed implementation of [`SessionStore`].
pub struct SessionRedis {
    pool: bb8::Pool<RedisConnectionManager>,
}

impl SessionRedis {
    pub fn new(pool: bb8::Pool<RedisConnectionManager>) -> Self {
        Self { pool }
    }

    fn key(token: &str) -> String {
        format!("session:{token}")
    }
}

#[async_trait]
impl SessionStore for SessionRedis {
    async fn bind(&self, token: &str, user_id: i64, ttl_secs: u64) -> Result<(), IdentityError> {
        let mut conn = self.pool.get().await?;
        let _: () = conn.set_ex(Self::key(token), user_id, ttl_secs).await?;
        Ok(())
    }

    async fn find(&self, token: &str) -> Result<Option<i64>, IdentityError> {
        let mut conn = self.pool.get().await?;
        let user_id: Option<i64> = conn.get(Self::key(token)).await?;
        Ok(user_id)
    }

    async fn clear(&self, token: &str) -> Result<(), IdentityError> {
        let mut conn = self.pool.get().await?;
        let _: () = conn.del(Self::key(token)).await?;
        Ok(())
    }
}
