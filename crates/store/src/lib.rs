//! Subscription registry: known users and groups, per-group required
//! channels, and banned users.
//!
//! [`store_sqlite::SqliteStore`] is the production backend;
//! [`store_memory::InMemoryStore`] backs tests and throwaway runs.

pub mod error;
pub mod store;
pub mod store_memory;
pub mod store_sqlite;
pub mod types;

pub use {
    error::{Error, Result},
    store::SubscriptionStore,
    types::SubscriptionConfig,
};

/// Run database migrations for the registry tables.
///
/// Creates `users`, `group_chats`, `forcesubs` and `banned_users`. Call at startup
/// before handing a shared pool to [`store_sqlite::SqliteStore::with_pool`].
pub async fn run_migrations(pool: &sqlx::SqlitePool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .set_ignore_missing(true)
        .run(pool)
        .await?;
    Ok(())
}
