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
use crate::models::applicant::AchievementRow;
use crate::response::Envelope;
use crate::state::AppState;

const MAX_POINT_LEN: usize = 2000;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AchievementInput {
    achievement_point: Option<String>,
    display_order: Option<i32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AchievementReorder {
    #[serde(default)]
    achievement_orders: Vec<OrderChange>,
}

pub async fn list_achievements(
    pool: &PgPool,
    user_id: Uuid,
) -> Result<Vec<AchievementRow>, AppError> {
    Ok(sqlx::query_as::<_, AchievementRow>(
        "SELECT id, achievement_point, display_order FROM achievements WHERE user_id = $1 ORDER BY display_order",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?)
}

/// GET /api/applicant-info/achievements
pub async fn handle_get_achievements(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<IdQuery>,
) -> Result<Response, AppError> {
    let Some(id) = query.id else {
        return Ok(Envelope::data(list_achievements(&state.db, user.user_id).await?).into_response());
    };

    let row = sqlx::query_as::<_, AchievementRow>(
        "SELECT id, achievement_point, display_order FROM achievements WHERE id = $1 AND user_id = $2",
    )
    .bind(id)
    .bind(user.user_id)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| AppError::NotFound("Achievement not found".to_string()))?;

    Ok(Envelope::data(row).into_response())
}

/// POST /api/applicant-info/achievements
pub async fn handle_achievement_action(
    State(state): State<AppState>,
    user: AuthUser,
    Json(body): Json<Value>,
) -> Result<Response, AppError> {
    let pool = &state.db;
    let (action, body) = split_action(body, "create");

    match action.as_str() {
        "create" => {
            let req: AchievementInput = parse_body(body)?;
            let point = require_text("achievementPoint", req.achievement_point.as_deref(), MAX_POINT_LEN)?;
            let display_order = OrderedTable::Achievements
                .new_row_order(pool, user.user_id, req.display_order)
                .await?;

            let row = sqlx::query_as::<_, AchievementRow>(
                r#"
                INSERT INTO achievements (user_id, achievement_point, display_order)
                VALUES ($1, $2, $3)
                RETURNING id, achievement_point, display_order
                "#,
            )
            .bind(user.user_id)
            .bind(point)
            .bind(display_order)
            .fetch_one(pool)
            .await
            .map_err(order_conflict)?;

            Ok(Envelope::data(row)
                .with_message("Achievement created successfully")
                .into_response())
        }
        "update" => {
            let id = required_id(&body, "Achievement", "update")?;
            let req: AchievementInput = parse_body(body)?;
            let point = patch_text("achievementPoint", req.achievement_point, MAX_POINT_LEN)?;
            OrderedTable::Achievements
                .check_update(pool, user.user_id, id, req.display_order)
                .await?;

            let row = sqlx::query_as::<_, AchievementRow>(
                r#"
                UPDATE achievements
                SET achievement_point = COALESCE($3, achievement_point),
                    display_order = COALESCE($4, display_order),
                    updated_at = NOW()
                WHERE id = $1 AND user_id = $2
                RETURNING id, achievement_point, display_order
                "#,
            )
            .bind(id)
            .bind(user.user_id)
            .bind(point)
            .bind(req.display_order)
            .fetch_optional(pool)
            .await
            .map_err(order_conflict)?
            .ok_or_else(|| AppError::NotFound("Achievement not found".to_string()))?;

            Ok(Envelope::data(row)
                .with_message("Achievement updated successfully")
                .into_response())
        }
        "delete" => {
            let id = required_id(&body, "Achievement", "delete")?;
            if !OrderedTable::Achievements.delete(pool, user.user_id, id).await? {
                return Err(AppError::NotFound("Achievement not found".to_string()));
            }
            Ok(Envelope::message("Achievement deleted successfully").into_response())
        }
        "reorder" => {
            let req: AchievementReorder = parse_body(body)?;
            OrderedTable::Achievements
                .reorder(pool, user.user_id, &req.achievement_orders)
                .await?;
            Ok(Envelope::message("Achievements reordered successfully").into_response())
        }
        other => Err(invalid_action(other, "create, update, delete, or reorder")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_reorder_reads_achievement_orders() {
        let id = Uuid::new_v4();
        let req: AchievementReorder = parse_body(json!({
            "action": "reorder",
            "achievementOrders": [{"id": id, "displayOrder": 1}]
        }))
        .unwrap();
        assert_eq!(req.achievement_orders.len(), 1);
        assert_eq!(req.achievement_orders[0].id, id);
    }

    #[test]
    fn test_wrong_order_shape_is_a_validation_error() {
        let err = parse_body::<AchievementReorder>(json!({"achievementOrders": [{"id": 3}]}))
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
