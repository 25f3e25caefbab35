use axum::{
    extract::{Query, State},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::applicant::{check_len, invalid_action, parse_body, require_text, split_action};
use crate::auth::extractor::AuthUser;
use crate::db::is_unique_violation;
use crate::errors::AppError;
use crate::models::applicant::SkillRow;
use crate::response::Envelope;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SkillQuery {
    pub category: Option<String>,
    pub search: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NewSkill {
    skill_name: Option<String>,
    category: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SkillSelection {
    #[serde(default)]
    skill_ids: Vec<Uuid>,
}

#[derive(Debug, Serialize)]
struct SkillsAdded {
    added: u64,
    skills: Vec<SkillRow>,
}

#[derive(Debug, Serialize)]
struct SkillsRemoved {
    removed: u64,
}

// ────────────────────────────────────────────────────────────────────────────
// Global catalog
// ────────────────────────────────────────────────────────────────────────────

/// Escapes LIKE wildcards so a search term matches literally.
fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

/// GET /api/skills
pub async fn handle_list_skills(
    State(state): State<AppState>,
    _user: AuthUser,
    Query(query): Query<SkillQuery>,
) -> Result<Response, AppError> {
    let category = query.category.filter(|c| !c.is_empty());
    let search = query
        .search
        .filter(|s| !s.is_empty())
        .map(|s| like_pattern(&s));

    let skills = sqlx::query_as::<_, SkillRow>(
        r#"
        SELECT id, skill_name, category
        FROM skills
        WHERE ($1::text IS NULL OR category = $1)
          AND ($2::text IS NULL OR skill_name ILIKE $2)
        ORDER BY skill_name
        "#,
    )
    .bind(category)
    .bind(search)
    .fetch_all(&state.db)
    .await?;

    Ok(Envelope::data(skills).into_response())
}

/// POST /api/skills
pub async fn handle_create_skill(
    State(state): State<AppState>,
    _user: AuthUser,
    Json(body): Json<Value>,
) -> Result<Response, AppError> {
    let req: NewSkill = parse_body(body)?;
    let name = require_text("skillName", req.skill_name.as_deref(), 100)?;
    let category = req.category.map(|c| c.trim().to_string()).filter(|c| !c.is_empty());
    if let Some(category) = category.as_deref() {
        check_len("category", category, 50)?;
    }

    let skill = sqlx::query_as::<_, SkillRow>(
        "INSERT INTO skills (skill_name, category) VALUES ($1, $2) RETURNING id, skill_name, category",
    )
    .bind(name)
    .bind(category)
    .fetch_one(&state.db)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            AppError::Duplicate("Skill name already exists".to_string())
        } else {
            AppError::Database(e)
        }
    })?;

    Ok(Envelope::data(skill)
        .with_message("Skill created successfully")
        .into_response())
}

// ────────────────────────────────────────────────────────────────────────────
// The user's selection
// ────────────────────────────────────────────────────────────────────────────

pub async fn list_user_skills(pool: &PgPool, user_id: Uuid) -> Result<Vec<SkillRow>, AppError> {
    Ok(sqlx::query_as::<_, SkillRow>(
        r#"
        SELECT s.id, s.skill_name, s.category
        FROM user_skills us
        JOIN skills s ON s.id = us.skill_id
        WHERE us.user_id = $1
        ORDER BY us.created_at
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?)
}

/// GET /api/applicant-info/skills
pub async fn handle_get_user_skills(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Response, AppError> {
    Ok(Envelope::data(list_user_skills(&state.db, user.user_id).await?).into_response())
}

/// POST /api/applicant-info/skills
pub async fn handle_user_skill_action(
    State(state): State<AppState>,
    user: AuthUser,
    Json(body): Json<Value>,
) -> Result<Response, AppError> {
    let (action, body) = split_action(body, "add");
    let req: SkillSelection = parse_body(body)?;

    match action.as_str() {
        "add" => {
            // Unknown ids and skills already selected are skipped.
            let skills = sqlx::query_as::<_, SkillRow>(
                r#"
                WITH inserted AS (
                    INSERT INTO user_skills (user_id, skill_id)
                    SELECT $1, s.id FROM skills s WHERE s.id = ANY($2)
                    ON CONFLICT (user_id, skill_id) DO NOTHING
                    RETURNING skill_id
                )
                SELECT s.id, s.skill_name, s.category
                FROM inserted i
                JOIN skills s ON s.id = i.skill_id
                ORDER BY s.skill_name
                "#,
            )
            .bind(user.user_id)
            .bind(&req.skill_ids)
            .fetch_all(&state.db)
            .await?;

            let added = skills.len() as u64;
            Ok(Envelope::data(SkillsAdded { added, skills })
                .with_message(format!("{added} skills added successfully"))
                .into_response())
        }
        "remove" => {
            let removed = sqlx::query("DELETE FROM user_skills WHERE user_id = $1 AND skill_id = ANY($2)")
                .bind(user.user_id)
                .bind(&req.skill_ids)
                .execute(&state.db)
                .await?
                .rows_affected();

            Ok(Envelope::data(SkillsRemoved { removed })
                .with_message(format!("{removed} skills removed successfully"))
                .into_response())
        }
        other => Err(invalid_action(other, "add or remove")),
    }
}
