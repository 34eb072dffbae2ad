//! Database pool and preference queries
//!
//! The preference store is a single key-value table. Values are JSON text so
//! that records can be replaced wholesale without schema changes.

use std::path::Path;

use serde::{de::DeserializeOwned, Serialize};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Executor, Sqlite, SqlitePool};

use crate::error::AppResult;
use crate::models::User;

pub const KEY_TOKEN: &str = "session.token";
pub const KEY_USER: &str = "session.user";
pub const KEY_DRIVER_AVAILABLE: &str = "driver.available";

// ============================================================================
// Connection
// ============================================================================

/// Open (or create) the on-disk store and run migrations
pub async fn connect(path: &Path) -> AppResult<SqlitePool> {
    let db_url = format!("sqlite:{}?mode=rwc", path.display());
    let pool = SqlitePool::connect(&db_url).await?;

    // WAL keeps readers unblocked during session writes
    sqlx::query("PRAGMA journal_mode=WAL;")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA synchronous=NORMAL;")
        .execute(&pool)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    tracing::info!("Preference store initialized at: {}", path.display());
    Ok(pool)
}

/// Private in-memory store, used when no data directory is available
pub async fn connect_in_memory() -> AppResult<SqlitePool> {
    // A second connection would see a different empty database
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;
    Ok(pool)
}

// ============================================================================
// Raw Preference Queries
// ============================================================================

pub async fn set_preference(pool: &SqlitePool, key: &str, value: &str) -> AppResult<()> {
    upsert_preference(pool, key, value).await
}

/// Insert or replace one key; runs on a pool or inside a transaction
async fn upsert_preference<'e, E>(executor: E, key: &str, value: &str) -> AppResult<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO preferences (key, value, updated_at)
        VALUES (?, ?, datetime('now'))
        ON CONFLICT(key) DO UPDATE SET
            value = excluded.value,
            updated_at = datetime('now')
        "#,
    )
    .bind(key)
    .bind(value)
    .execute(executor)
    .await?;

    Ok(())
}

pub async fn get_preference(pool: &SqlitePool, key: &str) -> AppResult<Option<String>> {
    let value = sqlx::query_scalar::<_, String>("SELECT value FROM preferences WHERE key = ?")
        .bind(key)
        .fetch_optional(pool)
        .await?;

    Ok(value)
}

pub async fn delete_preference(pool: &SqlitePool, key: &str) -> AppResult<()> {
    sqlx::query("DELETE FROM preferences WHERE key = ?")
        .bind(key)
        .execute(pool)
        .await?;
    Ok(())
}

/// Delete every stored preference
pub async fn clear_preferences(pool: &SqlitePool) -> AppResult<()> {
    sqlx::query("DELETE FROM preferences").execute(pool).await?;
    Ok(())
}

async fn set_json<T: Serialize>(pool: &SqlitePool, key: &str, value: &T) -> AppResult<()> {
    let json = serde_json::to_string(value)?;
    set_preference(pool, key, &json).await
}

async fn get_json<T: DeserializeOwned>(pool: &SqlitePool, key: &str) -> AppResult<Option<T>> {
    match get_preference(pool, key).await? {
        Some(json) => Ok(Some(serde_json::from_str(&json)?)),
        None => Ok(None),
    }
}

// ============================================================================
// Session Queries
// ============================================================================

/// Persist token and user profile after login or a profile update
pub async fn save_session(pool: &SqlitePool, token: &str, user: &User) -> AppResult<()> {
    let mut tx = pool.begin().await?;
    let user_json = serde_json::to_string(user)?;

    for (key, value) in [(KEY_TOKEN, token), (KEY_USER, user_json.as_str())] {
        upsert_preference(&mut *tx, key, value).await?;
    }

    tx.commit().await?;
    Ok(())
}

/// Replace only the cached user record, keeping the token
pub async fn save_user(pool: &SqlitePool, user: &User) -> AppResult<()> {
    set_json(pool, KEY_USER, user).await
}

/// Token and user of the stored session, if both are present
pub async fn load_session(pool: &SqlitePool) -> AppResult<Option<(String, User)>> {
    let token = get_preference(pool, KEY_TOKEN).await?;
    let user: Option<User> = get_json(pool, KEY_USER).await?;

    Ok(token.zip(user))
}

// ============================================================================
// Driver Queries
// ============================================================================

pub async fn set_driver_available(pool: &SqlitePool, available: bool) -> AppResult<()> {
    set_json(pool, KEY_DRIVER_AVAILABLE, &available).await
}

/// Stored availability flag; `false` when never written
pub async fn driver_available(pool: &SqlitePool) -> AppResult<bool> {
    Ok(get_json::<bool>(pool, KEY_DRIVER_AVAILABLE).await?.unwrap_or(false))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;

    fn sample_user() -> User {
        User {
            id: 42,
            first_name: "Lucía".to_string(),
            last_name: "Quispe".to_string(),
            document: "45871236".to_string(),
            email: Some("lucia@itaxcix.pe".to_string()),
            phone: Some("987654321".to_string()),
            roles: vec![Role::Citizen],
            permissions: vec!["TRAVEL_REQUEST".to_string()],
            average_rating: Some(4.8),
            driver_available: None,
        }
    }

    #[tokio::test]
    async fn test_preference_upsert_and_delete() {
        let pool = connect_in_memory().await.unwrap();

        assert_eq!(get_preference(&pool, "theme").await.unwrap(), None);
        set_preference(&pool, "theme", "dark").await.unwrap();
        set_preference(&pool, "theme", "light").await.unwrap();
        assert_eq!(
            get_preference(&pool, "theme").await.unwrap().as_deref(),
            Some("light")
        );

        delete_preference(&pool, "theme").await.unwrap();
        assert_eq!(get_preference(&pool, "theme").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_session_round_trip_and_clear() {
        let pool = connect_in_memory().await.unwrap();
        let user = sample_user();

        assert!(load_session(&pool).await.unwrap().is_none());
        save_session(&pool, "tok-123", &user).await.unwrap();

        let (token, stored) = load_session(&pool).await.unwrap().unwrap();
        assert_eq!(token, "tok-123");
        assert_eq!(stored, user);

        clear_preferences(&pool).await.unwrap();
        assert!(load_session(&pool).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_session_replaces_previous_login() {
        let pool = connect_in_memory().await.unwrap();
        let user = sample_user();
        save_session(&pool, "tok-old", &user).await.unwrap();

        let mut other = sample_user();
        other.id = 43;
        save_session(&pool, "tok-new", &other).await.unwrap();

        let (token, stored) = load_session(&pool).await.unwrap().unwrap();
        assert_eq!(token, "tok-new");
        assert_eq!(stored.id, 43);
        assert_eq!(
            get_preference(&pool, KEY_TOKEN).await.unwrap().as_deref(),
            Some("tok-new")
        );
    }

    #[tokio::test]
    async fn test_driver_flag_defaults_to_false() {
        let pool = connect_in_memory().await.unwrap();
        assert!(!driver_available(&pool).await.unwrap());
        set_driver_available(&pool, true).await.unwrap();
        assert!(driver_available(&pool).await.unwrap());
    }

    #[tokio::test]
    async fn test_on_disk_store_survives_reconnect() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.db");

        let pool = connect(&path).await.unwrap();
        set_driver_available(&pool, true).await.unwrap();
        pool.close().await;

        let pool = connect(&path).await.unwrap();
        assert!(driver_available(&pool).await.unwrap());
    }
}
