use anyhow::{Context, Result};

const DEFAULT_LLM_API_URL: &str = "https://api.groq.com/openai/v1/chat/completions";
const DEFAULT_MODEL_NAME: &str = "llama-3.3-70b-versatile";

/// Application configuration loaded from environment variables.
/// Built once in `main` and handed to every component that needs it.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub s3_bucket: String,
    pub s3_endpoint: String,
    pub aws_access_key_id: String,
    pub aws_secret_access_key: String,
    pub llm_api_key: String,
    pub llm_api_url: String,
    pub model_name: String,
    pub jwt_secret: String,
    pub access_token_minutes: i64,
    pub refresh_token_days: i64,
    pub require_email_verification: bool,
    pub frontend_url: String,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            redis_url: require_env("REDIS_URL")?,
            s3_bucket: require_env("S3_BUCKET")?,
            s3_endpoint: require_env("S3_ENDPOINT")?,
            aws_access_key_id: require_env("AWS_ACCESS_KEY_ID")?,
            aws_secret_access_key: require_env("AWS_SECRET_ACCESS_KEY")?,
            llm_api_key: require_env("LLM_API_KEY")?,
            llm_api_url: optional_env("LLM_API_URL", DEFAULT_LLM_API_URL),
            model_name: optional_env("MODEL_NAME", DEFAULT_MODEL_NAME),
            jwt_secret: require_env("JWT_SECRET")?,
            access_token_minutes: optional_env("ACCESS_TOKEN_MINUTES", "60")
                .parse::<i64>()
                .context("ACCESS_TOKEN_MINUTES must be an integer")?,
            refresh_token_days: optional_env("REFRESH_TOKEN_DAYS", "7")
                .parse::<i64>()
                .context("REFRESH_TOKEN_DAYS must be an integer")?,
            require_email_verification: parse_flag(&optional_env(
                "REQUIRE_EMAIL_VERIFICATION",
                "true",
            )),
            frontend_url: optional_env("FRONTEND_URL", "http://localhost:5173")
                .trim_end_matches('/')
                .to_string(),
            port: optional_env("PORT", "8080")
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: optional_env("RUST_LOG", "info"),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn optional_env(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
