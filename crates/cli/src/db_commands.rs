use {
    clap::Subcommand,
    joingate_common::types::UserId,
    joingate_config::JoingateConfig,
    joingate_store::{SubscriptionStore, store_sqlite::SqliteStore},
};

#[derive(Subcommand)]
pub enum DbAction {
    /// Run all pending registry migrations.
    Migrate,
    /// Print user, group and ban counts.
    Stats,
    /// Block a user from the bot.
    Ban { user: UserId },
    /// Unblock a user.
    Unban { user: UserId },
}

pub async fn handle_db(action: DbAction, config: &JoingateConfig) -> anyhow::Result<()> {
    let store = open_store(&config.database_url).await?;
    match action {
        DbAction::Migrate => println!("Migrations complete: {}", config.database_url),
        DbAction::Stats => print!("{}", stats(&store).await?),
        DbAction::Ban { user } => {
            if store.ban_user(user).await? {
                println!("User {user} is now banned.");
            } else {
                println!("User {user} is already banned.");
            }
        },
        DbAction::Unban { user } => {
            if store.unban_user(user).await? {
                println!("User {user} is no longer banned.");
            } else {
                println!("User {user} was not banned.");
            }
        },
    }
    Ok(())
}

/// Connect to the registry and bring its schema up to date.
pub async fn open_store(database_url: &str) -> anyhow::Result<SqliteStore> {
    SqliteStore::new(database_url)
        .await
        .map_err(|e| anyhow::anyhow!("failed to open registry {database_url}: {e}"))
}

async fn stats(store: &dyn SubscriptionStore) -> anyhow::Result<String> {
    let users = store.count_users().await?;
    let groups = store.count_groups().await?;
    let banned = store.count_banned().await?;
    Ok(format!("Users: {users}\nGroups: {groups}\nBanned: {banned}\n"))
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, tempfile::TempDir};

    fn db_url(temp: &TempDir) -> String {
        format!("sqlite:{}?mode=rwc", temp.path().join("joingate.db").display())
    }

    #[tokio::test]
    async fn migrations_are_idempotent() {
        let temp = TempDir::new().unwrap();
        let url = db_url(&temp);

        open_store(&url).await.unwrap();
        let store = open_store(&url).await.unwrap();
        assert_eq!(store.count_users().await.unwrap(), 0);
        assert!(temp.path().join("joingate.db").exists());
    }

    #[tokio::test]
    async fn stats_reflect_registry() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&db_url(&temp)).await.unwrap();
        store.add_user(7).await.unwrap();
        store.add_user(8).await.unwrap();
        store.add_group(-500).await.unwrap();
        store.ban_user(8).await.unwrap();

        assert_eq!(
            stats(&store).await.unwrap(),
            "Users: 2\nGroups: 1\nBanned: 1\n"
        );
    }

    #[tokio::test]
    async fn ban_persists_across_connections() {
        let temp = TempDir::new().unwrap();
        let config = JoingateConfig {
            database_url: db_url(&temp),
            ..Default::default()
        };

        handle_db(DbAction::Ban { user: 42 }, &config).await.unwrap();
        let store = open_store(&config.database_url).await.unwrap();
        assert!(store.is_banned(42).await.unwrap());

        handle_db(DbAction::Unban { user: 42 }, &config).await.unwrap();
        assert!(!store.is_banned(42).await.unwrap());
    }
}
