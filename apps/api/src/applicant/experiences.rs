use axum::{
    extract::{Query, State},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::applicant::{
    check_len, double_option, invalid_action, order_conflict, parse_body, patch_text,
    require_text, required_id, split_action, IdQuery, OrderChange, OrderedTable,
};
use crate::auth::extractor::AuthUser;
use crate::errors::AppError;
use crate::models::applicant::ExperienceRow;
use crate::response::Envelope;
use crate::state::AppState;

const COLUMNS: &str =
    "id, experience_name, start_date, end_date, role, location, experience_explanation, display_order";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NewExperience {
    experience_name: Option<String>,
    start_date: Option<String>,
    end_date: Option<String>,
    role: Option<String>,
    location: Option<String>,
    experience_explanation: Option<String>,
    display_order: Option<i32>,
}

/// Partial update. `role` and `location` may be cleared with an explicit `null`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExperiencePatch {
    experience_name: Option<String>,
    start_date: Option<String>,
    end_date: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    role: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    location: Option<Option<String>>,
    experience_explanation: Option<String>,
    display_order: Option<i32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExperienceReorder {
    #[serde(default)]
    experience_orders: Vec<OrderChange>,
}

/// Trims an optional column; blank becomes `None`.
fn optional_text(field: &str, value: Option<&str>, max_len: usize) -> Result<Option<String>, AppError> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        Some(v) => {
            check_len(field, v, max_len)?;
            Ok(Some(v.to_string()))
        }
        None => Ok(None),
    }
}

pub async fn list_experiences(pool: &PgPool, user_id: Uuid) -> Result<Vec<ExperienceRow>, AppError> {
    let sql = format!("SELECT {COLUMNS} FROM experiences WHERE user_id = $1 ORDER BY display_order");
    Ok(sqlx::query_as::<_, ExperienceRow>(&sql)
        .bind(user_id)
        .fetch_all(pool)
        .await?)
}

/// GET /api/applicant-info/experiences
pub async fn handle_get_experiences(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<IdQuery>,
) -> Result<Response, AppError> {
    let Some(id) = query.id else {
        return Ok(Envelope::data(list_experiences(&state.db, user.user_id).await?).into_response());
    };

    let sql = format!("SELECT {COLUMNS} FROM experiences WHERE id = $1 AND user_id = $2");
    let row = sqlx::query_as::<_, ExperienceRow>(&sql)
        .bind(id)
        .bind(user.user_id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Experience not found".to_string()))?;

    Ok(Envelope::data(row).into_response())
}

/// POST /api/applicant-info/experiences
pub async fn handle_experience_action(
    State(state): State<AppState>,
    user: AuthUser,
    Json(body): Json<Value>,
) -> Result<Response, AppError> {
    let pool = &state.db;
    let (action, body) = split_action(body, "create");

    match action.as_str() {
        "create" => {
            let req: NewExperience = parse_body(body)?;
            let name = require_text("experienceName", req.experience_name.as_deref(), 255)?;
            let start_date = require_text("startDate", req.start_date.as_deref(), 50)?;
            let end_date = require_text("endDate", req.end_date.as_deref(), 50)?;
            let explanation =
                require_text("experienceExplanation", req.experience_explanation.as_deref(), usize::MAX)?;
            let role = optional_text("role", req.role.as_deref(), 255)?;
            let location = optional_text("location", req.location.as_deref(), 50)?;
            let display_order = OrderedTable::Experiences
                .new_row_order(pool, user.user_id, req.display_order)
                .await?;

            let sql = format!(
                r#"
                INSERT INTO experiences
                    (user_id, experience_name, start_date, end_date, role, location,
                     experience_explanation, display_order)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                RETURNING {COLUMNS}
                "#
            );
            let row = sqlx::query_as::<_, ExperienceRow>(&sql)
                .bind(user.user_id)
                .bind(name)
                .bind(start_date)
                .bind(end_date)
                .bind(role)
                .bind(location)
                .bind(explanation)
                .bind(display_order)
                .fetch_one(pool)
                .await
                .map_err(order_conflict)?;

            Ok(Envelope::data(row)
                .with_message("Experience created successfully")
                .into_response())
        }
        "update" => {
            let id = required_id(&body, "Experience", "update")?;
            let req: ExperiencePatch = parse_body(body)?;
            let name = patch_text("experienceName", req.experience_name, 255)?;
            let start_date = patch_text("startDate", req.start_date, 50)?;
            let end_date = patch_text("endDate", req.end_date, 50)?;
            let explanation = patch_text("experienceExplanation", req.experience_explanation, usize::MAX)?;

            // ($n present flag, $n+1 value) pairs for the clearable columns
            let role = req
                .role
                .map(|v| optional_text("role", v.as_deref(), 255))
                .transpose()?;
            let location = req
                .location
                .map(|v| optional_text("location", v.as_deref(), 50))
                .transpose()?;
            OrderedTable::Experiences
                .check_update(pool, user.user_id, id, req.display_order)
                .await?;

            let sql = format!(
                r#"
                UPDATE experiences
                SET experience_name = COALESCE($3, experience_name),
                    start_date = COALESCE($4, start_date),
                    end_date = COALESCE($5, end_date),
                    experience_explanation = COALESCE($6, experience_explanation),
                    display_order = COALESCE($7, display_order),
                    role = CASE WHEN $8 THEN $9 ELSE role END,
                    location = CASE WHEN $10 THEN $11 ELSE location END,
                    updated_at = NOW()
                WHERE id = $1 AND user_id = $2
                RETURNING {COLUMNS}
                "#
            );
            let row = sqlx::query_as::<_, ExperienceRow>(&sql)
                .bind(id)
                .bind(user.user_id)
                .bind(name)
                .bind(start_date)
                .bind(end_date)
                .bind(explanation)
                .bind(req.display_order)
                .bind(role.is_some())
                .bind(role.flatten())
                .bind(location.is_some())
                .bind(location.flatten())
                .fetch_optional(pool)
                .await
                .map_err(order_conflict)?
                .ok_or_else(|| AppError::NotFound("Experience not found".to_string()))?;

            Ok(Envelope::data(row)
                .with_message("Experience updated successfully")
                .into_response())
        }
        "delete" => {
            let id = required_id(&body, "Experience", "delete")?;
            if !OrderedTable::Experiences.delete(pool, user.user_id, id).await? {
                return Err(AppError::NotFound("Experience not found".to_string()));
            }
            Ok(Envelope::message("Experience deleted successfully").into_response())
        }
        "reorder" => {
            let req: ExperienceReorder = parse_body(body)?;
            OrderedTable::Experiences
                .reorder(pool, user.user_id, &req.experience_orders)
                .await?;
            Ok(Envelope::message("Experiences reordered successfully").into_response())
        }
        other => Err(invalid_action(other, "create, update, delete, or reorder")),
    }
}
