use anyhow::{anyhow, Result};
use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use uuid::Uuid;

const MIN_LENGTH: usize = 8;

const COMMON_PASSWORDS: &[&str] = &[
    "password", "password1", "password123", "12345678", "123456789", "1234567890", "qwerty123",
    "qwertyuiop", "iloveyou", "sunshine", "princess", "football", "baseball", "welcome1",
    "abc12345", "letmein1", "trustno1", "passw0rd", "superman", "11111111", "00000000",
    "asdfghjkl", "dragon123", "monkey123", "admin123",
];

/// Checks a candidate password; the error is the message shown to the user.
pub fn validate_password(password: &str, email: &str) -> Result<(), String> {
    if password.chars().count() < MIN_LENGTH {
        return Err(format!(
            "This password is too short. It must contain at least {MIN_LENGTH} characters."
        ));
    }
    if password.chars().all(|c| c.is_ascii_digit()) {
        return Err("This password is entirely numeric.".to_string());
    }
    let lowered = password.to_lowercase();
    if COMMON_PASSWORDS.contains(&lowered.as_str()) {
        return Err("This password is too common.".to_string());
    }
    let local_part = email.split('@').next().unwrap_or_default().to_lowercase();
    if local_part.len() >= 3 && lowered.contains(&local_part) {
        return Err("The password is too similar to the email.".to_string());
    }
    Ok(())
}

/// Argon2id PHC string for `password`. CPU-heavy; call through `hash_password_blocking`.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::encode_b64(Uuid::new_v4().as_bytes())
        .map_err(|e| anyhow!("Failed to encode salt: {e}"))?;
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow!("Password hashing failed: {e}"))?;
    Ok(hash.to_string())
}

/// False on mismatch or on an unparseable stored hash.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    PasswordHash::new(stored_hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

pub async fn hash_password_blocking(password: String) -> Result<String> {
    tokio::task::spawn_blocking(move || hash_password(&password)).await?
}

pub async fn verify_password_blocking(password: String, stored_hash: String) -> Result<bool> {
    Ok(tokio::task::spawn_blocking(move || verify_password(&password, &stored_hash)).await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_rejects_weak_passwords() {
        assert!(validate_password("short1", "a@b.co").is_err());
        assert!(validate_password("1234567890123", "a@b.co").is_err());
        assert!(validate_password("Password123", "a@b.co").is_err());
        assert!(validate_password("janedoe-rocks", "janedoe@example.com").is_err());
    }

    #[test]
    fn test_policy_accepts_reasonable_password() {
        assert!(validate_password("correct horse battery", "jane@example.com").is_ok());
    }

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("correct horse battery").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("correct horse battery", &hash));
        assert!(!verify_password("wrong horse battery", &hash));
        assert!(!verify_password("anything", "not-a-phc-string"));
    }

    #[test]
    fn test_hashes_are_salted() {
        assert_ne!(hash_password("same input").unwrap(), hash_password("same input").unwrap());
    }

    #[tokio::test]
    async fn test_blocking_wrappers() {
        let hash = hash_password_blocking("tokio-runtime-pw".to_string()).await.unwrap();
        assert!(verify_password_blocking("tokio-runtime-pw".to_string(), hash)
            .await
            .unwrap());
    }
}
