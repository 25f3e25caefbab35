// Authentication: signup, login, email verification, password reset and
// JWT sessions. Refresh-token revocation and the email outbox live in Redis.

pub mod extractor;
pub mod handlers;
pub mod mailer;
pub mod password;
pub mod revocation;
pub mod tokens;
