//! Key/value settings, currently only the session shared secret
//!
//! The secret is stored as a decimal i64 string under `session_shared_secret`.
//! A stored value of 0 disables token signature checking.

use crate::auth::generate_shared_secret;
use crate::{Error, Result};
use sqlx::SqlitePool;

const SHARED_SECRET_KEY: &str = "session_shared_secret";

/// Load the shared secret, generating and storing one on first use
pub async fn load_shared_secret(pool: &SqlitePool) -> Result<i64> {
    let result: Option<(String,)> = sqlx::query_as("SELECT value FROM settings WHERE key = ?")
        .bind(SHARED_SECRET_KEY)
        .fetch_optional(pool)
        .await?;

    match result {
        Some((value,)) => value
            .parse::<i64>()
            .map_err(|e| Error::Config(format!("Invalid stored shared secret: {}", e))),
        None => initialize_shared_secret(pool).await,
    }
}

/// Generate a crypto-random non-zero secret and store it
pub async fn initialize_shared_secret(pool: &SqlitePool) -> Result<i64> {
    let secret = generate_shared_secret();
    store_shared_secret(pool, secret).await?;
    tracing::info!("Generated new session shared secret");
    Ok(secret)
}

/// Overwrite the stored secret
pub async fn store_shared_secret(pool: &SqlitePool, secret: i64) -> Result<()> {
    sqlx::query("INSERT OR REPLACE INTO settings (key, value) VALUES (?, ?)")
        .bind(SHARED_SECRET_KEY)
        .bind(secret.to_string())
        .execute(pool)
        .await?;
    Ok(())
}
