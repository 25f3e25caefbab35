//! Outbound email. Messages are queued on Redis for the mail worker;
//! the API never talks SMTP itself.

use anyhow::{Context, Result};
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use serde::{Deserialize, Serialize};
use tracing::info;

pub const OUTBOX_KEY: &str = "mail:outbox";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl OutgoingEmail {
    pub fn verification(to: &str, frontend_url: &str, key: &str) -> Self {
        let url = format!("{frontend_url}/auth/verify-email/{key}");
        Self {
            to: to.to_string(),
            subject: "Verify your email - Resume Analyzer".to_string(),
            body: format!(
                "Welcome to Resume Analyzer!\n\n\
                 Confirm your email address by opening the link below:\n\n{url}\n\n\
                 If you did not create an account, you can safely ignore this email."
            ),
        }
    }

    pub fn password_reset(to: &str, frontend_url: &str, uid: &str, token: &str) -> Self {
        let url = format!("{frontend_url}/auth/reset-password-confirm?uid={uid}&token={token}");
        Self {
            to: to.to_string(),
            subject: "Password Reset - Resume Analyzer".to_string(),
            body: format!(
                "Click the link below to reset your password:\n\n{url}\n\n\
                 If you did not request this, you can safely ignore this email."
            ),
        }
    }
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: OutgoingEmail) -> Result<()>;
}

/// Pushes JSON-encoded messages onto the `mail:outbox` list.
#[derive(Clone)]
pub struct RedisOutbox {
    conn: MultiplexedConnection,
}

impl RedisOutbox {
    pub fn new(conn: MultiplexedConnection) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl Mailer for RedisOutbox {
    async fn send(&self, email: OutgoingEmail) -> Result<()> {
        let payload = serde_json::to_string(&email).context("Failed to encode email")?;
        let mut conn = self.conn.clone();
        redis::cmd("RPUSH")
            .arg(OUTBOX_KEY)
            .arg(payload)
            .query_async::<_, i64>(&mut conn)
            .await
            .context("Failed to queue email")?;
        info!("Queued '{}' email for {}", email.subject, email.to);
        Ok(())
    }
}
