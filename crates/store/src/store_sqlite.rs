//! SQLite-backed subscription registry using sqlx.

use {
    async_trait::async_trait,
    joingate_common::types::{ChannelRequirement, GroupId, UserId},
    sqlx::{SqlitePool, sqlite::SqlitePoolOptions},
    tracing::debug,
};

use crate::{Result, store::SubscriptionStore, types::SubscriptionConfig};

/// Internal row type for sqlx mapping.
#[derive(sqlx::FromRow)]
struct ForceSubRow {
    channels: String,
    enabled: Option<bool>,
}

impl TryFrom<ForceSubRow> for SubscriptionConfig {
    type Error = crate::Error;

    fn try_from(r: ForceSubRow) -> Result<Self> {
        let channels: Vec<ChannelRequirement> = serde_json::from_str(&r.channels)?;
        Ok(Self::new(channels, r.enabled.unwrap_or(true)))
    }
}

/// SQLite-backed registry.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Create a store with its own connection pool and run migrations.
    pub async fn new(database_url: &str) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;

        crate::run_migrations(&pool).await?;

        Ok(Self { pool })
    }

    /// Create a store using an existing pool (migrations must already be run).
    pub fn with_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

async fn count(pool: &SqlitePool, sql: &str) -> Result<u64> {
    let (n,): (i64,) = sqlx::query_as(sql).fetch_one(pool).await?;
    Ok(n.max(0) as u64)
}

#[async_trait]
impl SubscriptionStore for SqliteStore {
    async fn add_user(&self, user: UserId) -> Result<bool> {
        let result = sqlx::query(
            "INSERT INTO users (user_id, created_at) VALUES (?, ?)
             ON CONFLICT(user_id) DO NOTHING",
        )
        .bind(user)
        .bind(now())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_users(&self) -> Result<Vec<UserId>> {
        let rows: Vec<(i64,)> = sqlx::query_as("SELECT user_id FROM users ORDER BY rowid")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn count_users(&self) -> Result<u64> {
        count(&self.pool, "SELECT COUNT(*) FROM users").await
    }

    async fn add_group(&self, group: GroupId) -> Result<bool> {
        let result = sqlx::query(
            "INSERT INTO group_chats (group_id, created_at) VALUES (?, ?)
             ON CONFLICT(group_id) DO NOTHING",
        )
        .bind(group)
        .bind(now())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn remove_group(&self, group: GroupId) -> Result<()> {
        sqlx::query("DELETE FROM group_chats WHERE group_id = ?")
            .bind(group)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_groups(&self) -> Result<Vec<GroupId>> {
        let rows: Vec<(i64,)> = sqlx::query_as("SELECT group_id FROM group_chats ORDER BY rowid")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn count_groups(&self) -> Result<u64> {
        count(&self.pool, "SELECT COUNT(*) FROM group_chats").await
    }

    async fn get_subscription(&self, group: GroupId) -> Result<Option<SubscriptionConfig>> {
        let row = sqlx::query_as::<_, ForceSubRow>(
            "SELECT channels, enabled FROM forcesubs WHERE chat_id = ?",
        )
        .bind(group)
        .fetch_optional(&self.pool)
        .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn set_channels(
        &self,
        group: GroupId,
        channels: Vec<ChannelRequirement>,
    ) -> Result<SubscriptionConfig> {
        let config = SubscriptionConfig::new(channels, true);
        let channels_json = serde_json::to_string(&config.channels)?;
        sqlx::query(
            r#"INSERT INTO forcesubs (chat_id, channels, enabled, updated_at)
               VALUES (?, ?, 1, ?)
               ON CONFLICT(chat_id) DO UPDATE SET
                 channels = excluded.channels,
                 enabled = excluded.enabled,
                 updated_at = excluded.updated_at"#,
        )
        .bind(group)
        .bind(&channels_json)
        .bind(now())
        .execute(&self.pool)
        .await?;
        debug!(group, count = config.channels.len(), "stored required channels");
        Ok(config)
    }

    async fn set_enabled(
        &self,
        group: GroupId,
        enabled: bool,
    ) -> Result<Option<SubscriptionConfig>> {
        let row = sqlx::query_as::<_, ForceSubRow>(
            "UPDATE forcesubs SET enabled = ?, updated_at = ? WHERE chat_id = ?
             RETURNING channels, enabled",
        )
        .bind(enabled)
        .bind(now())
        .bind(group)
        .fetch_optional(&self.pool)
        .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn toggle_enabled(&self, group: GroupId) -> Result<Option<bool>> {
        let row: Option<(bool,)> = sqlx::query_as(
            "UPDATE forcesubs SET enabled = NOT COALESCE(enabled, 1), updated_at = ?
             WHERE chat_id = ?
             RETURNING enabled",
        )
        .bind(now())
        .bind(group)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(enabled,)| enabled))
    }

    async fn reset(&self, group: GroupId) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        let deleted = sqlx::query("DELETE FROM forcesubs WHERE chat_id = ?")
            .bind(group)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        sqlx::query("DELETE FROM group_chats WHERE group_id = ?")
            .bind(group)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(deleted > 0)
    }

    async fn ban_user(&self, user: UserId) -> Result<bool> {
        let result = sqlx::query(
            "INSERT INTO banned_users (user_id, created_at) VALUES (?, ?)
             ON CONFLICT(user_id) DO NOTHING",
        )
        .bind(user)
        .bind(now())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn unban_user(&self, user: UserId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM banned_users WHERE user_id = ?")
            .bind(user)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn is_banned(&self, user: UserId) -> Result<bool> {
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT user_id FROM banned_users WHERE user_id = ?")
                .bind(user)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.is_some())
    }

    async fn count_banned(&self) -> Result<u64> {
        count(&self.pool, "SELECT COUNT(*) FROM banned_users").await
    }
}
