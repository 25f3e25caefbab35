use axum::{
    extract::State,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::applicant::{check_len, double_option, parse_body, require_text};
use crate::auth::extractor::AuthUser;
use crate::errors::AppError;
use crate::models::applicant::BasicInfoRow;
use crate::response::Envelope;
use crate::state::AppState;
use crate::validation::{is_github_url, is_linkedin_url, is_valid_email};

const COLUMNS: &str = "id, full_name, phone_number, email, linkedin_url, github_url, address";

/// Basic-info POST body. Present fields overwrite; the optional ones accept `null`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BasicInfoInput {
    full_name: Option<String>,
    phone_number: Option<String>,
    email: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    linkedin_url: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    github_url: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    address: Option<Option<String>>,
}

/// Resolved column values after merging the input over the stored row.
#[derive(Debug, PartialEq)]
struct BasicInfoValues {
    full_name: String,
    phone_number: String,
    email: String,
    linkedin_url: Option<String>,
    github_url: Option<String>,
    address: Option<String>,
}

fn blank_to_none(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl BasicInfoValues {
    fn merge(input: BasicInfoInput, existing: Option<&BasicInfoRow>) -> Result<Self, AppError> {
        let pick = |new: Option<String>, old: Option<&String>| new.or_else(|| old.cloned());
        let pick_nullable = |new: Option<Option<String>>, old: Option<Option<String>>| match new {
            Some(v) => blank_to_none(v),
            None => old.flatten(),
        };

        let full_name = pick(input.full_name, existing.map(|e| &e.full_name));
        let phone_number = pick(input.phone_number, existing.map(|e| &e.phone_number));
        let email = pick(input.email, existing.map(|e| &e.email));

        let values = Self {
            full_name: require_text("fullName", full_name.as_deref(), 255)?,
            phone_number: require_text("phoneNumber", phone_number.as_deref(), 20)?,
            email: require_text("email", email.as_deref(), 254)?,
            linkedin_url: pick_nullable(input.linkedin_url, existing.map(|e| e.linkedin_url.clone())),
            github_url: pick_nullable(input.github_url, existing.map(|e| e.github_url.clone())),
            address: pick_nullable(input.address, existing.map(|e| e.address.clone())),
        };
        values.validate()?;
        Ok(values)
    }

    fn validate(&self) -> Result<(), AppError> {
        if !is_valid_email(&self.email) {
            return Err(AppError::Validation("email: Enter a valid email address.".to_string()));
        }
        if let Some(url) = self.linkedin_url.as_deref() {
            check_len("linkedinUrl", url, 500)?;
            if !is_linkedin_url(url) {
                return Err(AppError::Validation(
                    "linkedinUrl: Enter a valid LinkedIn profile URL.".to_string(),
                ));
            }
        }
        if let Some(url) = self.github_url.as_deref() {
            check_len("githubUrl", url, 500)?;
            if !is_github_url(url) {
                return Err(AppError::Validation(
                    "githubUrl: Enter a valid GitHub profile URL.".to_string(),
                ));
            }
        }
        Ok(())
    }
}

pub async fn find_basic_info(pool: &PgPool, user_id: Uuid) -> Result<Option<BasicInfoRow>, AppError> {
    let sql = format!("SELECT {COLUMNS} FROM applicant_basic_info WHERE user_id = $1");
    Ok(sqlx::query_as::<_, BasicInfoRow>(&sql)
        .bind(user_id)
        .fetch_optional(pool)
        .await?)
}

/// GET /api/applicant-info/basic
pub async fn handle_get_basic_info(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Response, AppError> {
    Ok(match find_basic_info(&state.db, user.user_id).await? {
        Some(info) => Envelope::data(info).into_response(),
        None => Envelope::data(serde_json::Value::Null)
            .with_message("No basic information found")
            .into_response(),
    })
}

/// POST /api/applicant-info/basic
pub async fn handle_save_basic_info(
    State(state): State<AppState>,
    user: AuthUser,
    Json(body): Json<serde_json::Value>,
) -> Result<Response, AppError> {
    let input: BasicInfoInput = parse_body(body)?;
    let existing = find_basic_info(&state.db, user.user_id).await?;
    let values = BasicInfoValues::merge(input, existing.as_ref())?;

    let sql = format!(
        r#"
        INSERT INTO applicant_basic_info
            (user_id, full_name, phone_number, email, linkedin_url, github_url, address)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        ON CONFLICT (user_id) DO UPDATE
        SET full_name = EXCLUDED.full_name,
            phone_number = EXCLUDED.phone_number,
            email = EXCLUDED.email,
            linkedin_url = EXCLUDED.linkedin_url,
            github_url = EXCLUDED.github_url,
            address = EXCLUDED.address,
            updated_at = NOW()
        RETURNING {COLUMNS}
        "#
    );
    let info = sqlx::query_as::<_, BasicInfoRow>(&sql)
        .bind(user.user_id)
        .bind(values.full_name)
        .bind(values.phone_number)
        .bind(values.email)
        .bind(values.linkedin_url)
        .bind(values.github_url)
        .bind(values.address)
        .fetch_one(&state.db)
        .await?;

    let message = if existing.is_some() {
        "Basic information updated successfully"
    } else {
        "Basic information created successfully"
    };
    Ok(Envelope::data(info).with_message(message).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn stored() -> BasicInfoRow {
        BasicInfoRow {
            id: Uuid::nil(),
            full_name: "Jane Doe".to_string(),
            phone_number: "+1 555 0100".to_string(),
            email: "jane@example.com".to_string(),
            linkedin_url: Some("https://www.linkedin.com/in/jane".to_string()),
            github_url: None,
            address: Some("Berlin".to_string()),
        }
    }

    fn input(value: serde_json::Value) -> BasicInfoInput {
        parse_body(value).unwrap()
    }

    #[test]
    fn test_create_requires_core_fields() {
        let err = BasicInfoValues::merge(input(json!({"fullName": "Jane"})), None).unwrap_err();
        assert!(matches!(err, AppError::Validation(ref m) if m.starts_with("phoneNumber")));
    }

    #[test]
    fn test_partial_update_keeps_stored_values() {
        let existing = stored();
        let values =
            BasicInfoValues::merge(input(json!({"phoneNumber": "+49 30 1234"})), Some(&existing))
                .unwrap();
        assert_eq!(values.full_name, "Jane Doe");
        assert_eq!(values.phone_number, "+49 30 1234");
        assert_eq!(values.linkedin_url, existing.linkedin_url);
        assert_eq!(values.address.as_deref(), Some("Berlin"));
    }

    #[test]
    fn test_explicit_null_clears_optional_field() {
        let values =
            BasicInfoValues::merge(input(json!({"address": null})), Some(&stored())).unwrap();
        assert_eq!(values.address, None);
    }

    #[test]
    fn test_profile_urls_are_checked() {
        let err = BasicInfoValues::merge(
            input(json!({"githubUrl": "https://gitlab.com/jane"})),
            Some(&stored()),
        )
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(ref m) if m.starts_with("githubUrl")));

        let err =
            BasicInfoValues::merge(input(json!({"email": "not-an-email"})), Some(&stored()))
                .unwrap_err();
        assert!(matches!(err, AppError::Validation(ref m) if m.starts_with("email")));
    }
}
