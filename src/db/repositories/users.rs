use crate::{
    db::models::user_models::Recipient,
    error::Error,
    notification::RecipientDirectory,
};
use anyhow::Result;
use async_trait::async_trait;
use sqlx::PgPool;
use std::sync::Arc;

/// Users repository
#[derive(Clone)]
pub struct UsersRepository {
    pool: Arc<PgPool>,
}

impl UsersRepository {
    /// Create a new users repository
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// Active admin and supervisor accounts with an email address
    pub async fn get_elevated_recipients(&self) -> Result<Vec<Recipient>> {
        let recipients = sqlx::query_as::<_, Recipient>(
            r#"
            SELECT id AS user_id, name, email
            FROM users
            WHERE active = TRUE
              AND role IN ('admin', 'supervisor')
              AND email <> ''
            ORDER BY email
            "#,
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to get elevated recipients: {}", e)))?;

        Ok(recipients)
    }
}

#[async_trait]
impl RecipientDirectory for UsersRepository {
    async fn elevated_recipients(&self) -> Result<Vec<Recipient>> {
        self.get_elevated_recipients().await
    }
}
