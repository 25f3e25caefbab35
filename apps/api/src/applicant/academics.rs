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
    invalid_action, order_conflict, parse_body, patch_text, require_text, required_id,
    split_action, IdQuery, OrderChange, OrderedTable,
};
use crate::auth::extractor::AuthUser;
use crate::errors::AppError;
use crate::models::applicant::AcademicRow;
use crate::response::Envelope;
use crate::state::AppState;

const SELECT: &str = "SELECT id, college_name, graduation_date, course, display_order FROM academics";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NewAcademic {
    college_name: Option<String>,
    graduation_date: Option<String>,
    course: Option<String>,
    display_order: Option<i32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AcademicPatch {
    college_name: Option<String>,
    graduation_date: Option<String>,
    course: Option<String>,
    display_order: Option<i32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AcademicReorder {
    #[serde(default)]
    academic_orders: Vec<OrderChange>,
}

pub async fn list_academics(pool: &PgPool, user_id: Uuid) -> Result<Vec<AcademicRow>, AppError> {
    Ok(
        sqlx::query_as::<_, AcademicRow>(&format!("{SELECT} WHERE user_id = $1 ORDER BY display_order"))
            .bind(user_id)
            .fetch_all(pool)
            .await?,
    )
}

async fn find_academic(pool: &PgPool, user_id: Uuid, id: Uuid) -> Result<AcademicRow, AppError> {
    sqlx::query_as::<_, AcademicRow>(&format!("{SELECT} WHERE id = $1 AND user_id = $2"))
        .bind(id)
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Academic record not found".to_string()))
}

/// GET /api/applicant-info/academics
pub async fn handle_get_academics(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<IdQuery>,
) -> Result<Response, AppError> {
    Ok(match query.id {
        Some(id) => Envelope::data(find_academic(&state.db, user.user_id, id).await?).into_response(),
        None => Envelope::data(list_academics(&state.db, user.user_id).await?).into_response(),
    })
}

/// POST /api/applicant-info/academics
pub async fn handle_academic_action(
    State(state): State<AppState>,
    user: AuthUser,
    Json(body): Json<Value>,
) -> Result<Response, AppError> {
    let pool = &state.db;
    let (action, body) = split_action(body, "create");

    match action.as_str() {
        "create" => {
            let req: NewAcademic = parse_body(body)?;
            let college_name = require_text("collegeName", req.college_name.as_deref(), 255)?;
            let graduation_date = require_text("graduationDate", req.graduation_date.as_deref(), 50)?;
            let course = require_text("course", req.course.as_deref(), 255)?;
            let display_order = OrderedTable::Academics
                .new_row_order(pool, user.user_id, req.display_order)
                .await?;

            let row = sqlx::query_as::<_, AcademicRow>(
                r#"
                INSERT INTO academics (user_id, college_name, graduation_date, course, display_order)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING id, college_name, graduation_date, course, display_order
                "#,
            )
            .bind(user.user_id)
            .bind(college_name)
            .bind(graduation_date)
            .bind(course)
            .bind(display_order)
            .fetch_one(pool)
            .await
            .map_err(order_conflict)?;

            Ok(Envelope::data(row)
                .with_message("Academic record created successfully")
                .into_response())
        }
        "update" => {
            let id = required_id(&body, "Academic", "update")?;
            let req: AcademicPatch = parse_body(body)?;
            let college_name = patch_text("collegeName", req.college_name, 255)?;
            let graduation_date = patch_text("graduationDate", req.graduation_date, 50)?;
            let course = patch_text("course", req.course, 255)?;
            OrderedTable::Academics
                .check_update(pool, user.user_id, id, req.display_order)
                .await?;

            let row = sqlx::query_as::<_, AcademicRow>(
                r#"
                UPDATE academics
                SET college_name = COALESCE($3, college_name),
                    graduation_date = COALESCE($4, graduation_date),
                    course = COALESCE($5, course),
                    display_order = COALESCE($6, display_order),
                    updated_at = NOW()
                WHERE id = $1 AND user_id = $2
                RETURNING id, college_name, graduation_date, course, display_order
                "#,
            )
            .bind(id)
            .bind(user.user_id)
            .bind(college_name)
            .bind(graduation_date)
            .bind(course)
            .bind(req.display_order)
            .fetch_optional(pool)
            .await
            .map_err(order_conflict)?
            .ok_or_else(|| AppError::NotFound("Academic record not found".to_string()))?;

            Ok(Envelope::data(row)
                .with_message("Academic record updated successfully")
                .into_response())
        }
        "delete" => {
            let id = required_id(&body, "Academic", "delete")?;
            if !OrderedTable::Academics.delete(pool, user.user_id, id).await? {
                return Err(AppError::NotFound("Academic record not found".to_string()));
            }
            Ok(Envelope::message("Academic record deleted successfully").into_response())
        }
        "reorder" => {
            let req: AcademicReorder = parse_body(body)?;
            OrderedTable::Academics
                .reorder(pool, user.user_id, &req.academic_orders)
                .await?;
            Ok(Envelope::message("Academics reordered successfully").into_response())
        }
        other => Err(invalid_action(other, "create, update, delete, or reorder")),
    }
}
