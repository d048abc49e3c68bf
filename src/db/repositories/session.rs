use anyhow::{Context, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    Set, TransactionTrait,
};

use crate::entities::user_sessions;

pub struct SessionRepository {
    conn: DatabaseConnection,
}

impl SessionRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn find_by_token(&self, token: &str) -> Result<Option<user_sessions::Model>> {
        user_sessions::Entity::find()
            .filter(user_sessions::Column::Token.eq(token))
            .one(&self.conn)
            .await
            .context("Failed to query session by token")
    }

    /// Single-session enforcement: drop every session the account holds and
    /// insert the replacement in the same transaction, so two concurrent
    /// logins can never leave two live rows. Returns how many sessions were
    /// kicked alongside the new row.
    pub async fn replace_for_user(
        &self,
        user_id: i32,
        token: &str,
        ip_address: Option<String>,
        user_agent: Option<String>,
        expires_at: &str,
    ) -> Result<(u64, user_sessions::Model)> {
        let now = chrono::Utc::now().to_rfc3339();
        let txn = self.conn.begin().await?;

        let kicked = user_sessions::Entity::delete_many()
            .filter(user_sessions::Column::UserId.eq(user_id))
            .exec(&txn)
            .await
            .context("Failed to revoke prior sessions")?
            .rows_affected;

        let active = user_sessions::ActiveModel {
            user_id: Set(user_id),
            token: Set(token.to_string()),
            ip_address: Set(ip_address),
            user_agent: Set(user_agent),
            created_at: Set(now),
            expires_at: Set(expires_at.to_string()),
            ..Default::default()
        };

        let session = active
            .insert(&txn)
            .await
            .context("Failed to insert session")?;

        txn.commit().await?;
        Ok((kicked, session))
    }

    pub async fn delete_by_token(&self, token: &str) -> Result<u64> {
        let result = user_sessions::Entity::delete_many()
            .filter(user_sessions::Column::Token.eq(token))
            .exec(&self.conn)
            .await
            .context("Failed to delete session")?;
        Ok(result.rows_affected)
    }

    pub async fn delete_for_user(&self, user_id: i32) -> Result<u64> {
        let result = user_sessions::Entity::delete_many()
            .filter(user_sessions::Column::UserId.eq(user_id))
            .exec(&self.conn)
            .await
            .context("Failed to delete sessions for account")?;
        Ok(result.rows_affected)
    }

    /// Sessions whose expiry is still ahead of `now` (RFC3339 UTC compare).
    pub async fn count_live(&self, now: &str) -> Result<u64> {
        user_sessions::Entity::find()
            .filter(user_sessions::Column::ExpiresAt.gt(now))
            .count(&self.conn)
            .await
            .context("Failed to count live sessions")
    }
}
