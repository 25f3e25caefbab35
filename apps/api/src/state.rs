use std::sync::Arc;

use aws_sdk_s3::Client as S3Client;
use redis::aio::MultiplexedConnection;
use sqlx::PgPool;

use crate::auth::mailer::Mailer;
use crate::auth::tokens::TokenService;
use crate::config::Config;
use crate::llm_client::TextGenerator;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    /// Refresh-token revocation list.
    pub redis: MultiplexedConnection,
    /// Uploaded resume files.
    pub s3: S3Client,
    /// Completion backend for the analyzer endpoints. `LlmClient` in production.
    pub llm: Arc<dyn TextGenerator>,
    pub tokens: TokenService,
    pub mailer: Arc<dyn Mailer>,
    pub config: Config,
}
