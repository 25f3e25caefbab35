use std::collections::HashMap;

use axum::{
    extract::{Query, State},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::Value;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::applicant::{
    invalid_action, order_conflict, parse_body, patch_text, require_text, required_id,
    split_action, IdQuery, OrderChange, OrderedTable,
};
use crate::auth::extractor::AuthUser;
use crate::errors::AppError;
use crate::models::applicant::{ProjectRow, ProjectSkillRow, ProjectWithSkills, SkillRow};
use crate::response::Envelope;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProjectInput {
    project_name: Option<String>,
    project_info: Option<String>,
    display_order: Option<i32>,
    /// Absent on update leaves the skill links untouched.
    skill_ids: Option<Vec<Uuid>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProjectReorder {
    #[serde(default)]
    project_orders: Vec<OrderChange>,
}

/// Loads skills for many projects in one query, keyed by project id.
async fn skills_by_project(
    pool: &PgPool,
    project_ids: &[Uuid],
) -> Result<HashMap<Uuid, Vec<SkillRow>>, AppError> {
    let rows = sqlx::query_as::<_, ProjectSkillRow>(
        r#"
        SELECT ps.project_id, s.id, s.skill_name, s.category
        FROM project_skills ps
        JOIN skills s ON s.id = ps.skill_id
        WHERE ps.project_id = ANY($1)
        ORDER BY s.skill_name
        "#,
    )
    .bind(project_ids)
    .fetch_all(pool)
    .await?;

    let mut grouped: HashMap<Uuid, Vec<SkillRow>> = HashMap::new();
    for row in rows {
        grouped.entry(row.project_id).or_default().push(row.into());
    }
    Ok(grouped)
}

fn attach_skills(
    rows: Vec<ProjectRow>,
    mut skills: HashMap<Uuid, Vec<SkillRow>>,
) -> Vec<ProjectWithSkills> {
    rows.into_iter()
        .map(|row| {
            let project_skills = skills.remove(&row.id).unwrap_or_default();
            ProjectWithSkills::new(row, project_skills)
        })
        .collect()
}

pub async fn list_projects(pool: &PgPool, user_id: Uuid) -> Result<Vec<ProjectWithSkills>, AppError> {
    let rows = sqlx::query_as::<_, ProjectRow>(
        "SELECT id, project_name, project_info, display_order FROM projects WHERE user_id = $1 ORDER BY display_order",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
    let skills = skills_by_project(pool, &ids).await?;
    Ok(attach_skills(rows, skills))
}

async fn find_project(pool: &PgPool, user_id: Uuid, id: Uuid) -> Result<ProjectWithSkills, AppError> {
    let row = sqlx::query_as::<_, ProjectRow>(
        "SELECT id, project_name, project_info, display_order FROM projects WHERE id = $1 AND user_id = $2",
    )
    .bind(id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Project not found".to_string()))?;

    let skills = skills_by_project(pool, &[row.id]).await?;
    attach_skills(vec![row], skills)
        .pop()
        .ok_or_else(|| AppError::NotFound("Project not found".to_string()))
}

/// Replaces the project's skill links. Ids not in the catalog are skipped.
async fn replace_skill_links(
    tx: &mut Transaction<'_, Postgres>,
    project_id: Uuid,
    skill_ids: &[Uuid],
) -> Result<(), AppError> {
    sqlx::query("DELETE FROM project_skills WHERE project_id = $1")
        .bind(project_id)
        .execute(&mut **tx)
        .await?;

    sqlx::query(
        r#"
        INSERT INTO project_skills (project_id, skill_id)
        SELECT $1, s.id FROM skills s WHERE s.id = ANY($2)
        ON CONFLICT (project_id, skill_id) DO NOTHING
        "#,
    )
    .bind(project_id)
    .bind(skill_ids)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

/// GET /api/applicant-info/projects
pub async fn handle_get_projects(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<IdQuery>,
) -> Result<Response, AppError> {
    Ok(match query.id {
        Some(id) => Envelope::data(find_project(&state.db, user.user_id, id).await?).into_response(),
        None => Envelope::data(list_projects(&state.db, user.user_id).await?).into_response(),
    })
}

/// POST /api/applicant-info/projects
pub async fn handle_project_action(
    State(state): State<AppState>,
    user: AuthUser,
    Json(body): Json<Value>,
) -> Result<Response, AppError> {
    let pool = &state.db;
    let (action, body) = split_action(body, "create");

    match action.as_str() {
        "create" => {
            let req: ProjectInput = parse_body(body)?;
            let name = require_text("projectName", req.project_name.as_deref(), 255)?;
            let info = require_text("projectInfo", req.project_info.as_deref(), usize::MAX)?;
            let display_order = OrderedTable::Projects
                .new_row_order(pool, user.user_id, req.display_order)
                .await?;

            let mut tx = pool.begin().await?;
            let project_id: Uuid = sqlx::query_scalar(
                r#"
                INSERT INTO projects (user_id, project_name, project_info, display_order)
                VALUES ($1, $2, $3, $4)
                RETURNING id
                "#,
            )
            .bind(user.user_id)
            .bind(name)
            .bind(info)
            .bind(display_order)
            .fetch_one(&mut *tx)
            .await?;

            if let Some(skill_ids) = req.skill_ids.as_deref() {
                replace_skill_links(&mut tx, project_id, skill_ids).await?;
            }
            tx.commit().await.map_err(order_conflict)?;

            let project = find_project(pool, user.user_id, project_id).await?;
            Ok(Envelope::data(project)
                .with_message("Project created successfully")
                .into_response())
        }
        "update" => {
            let id = required_id(&body, "Project", "update")?;
            let req: ProjectInput = parse_body(body)?;
            let name = patch_text("projectName", req.project_name, 255)?;
            let info = patch_text("projectInfo", req.project_info, usize::MAX)?;
            OrderedTable::Projects
                .check_update(pool, user.user_id, id, req.display_order)
                .await?;

            let mut tx = pool.begin().await?;
            let updated = sqlx::query(
                r#"
                UPDATE projects
                SET project_name = COALESCE($3, project_name),
                    project_info = COALESCE($4, project_info),
                    display_order = COALESCE($5, display_order),
                    updated_at = NOW()
                WHERE id = $1 AND user_id = $2
                "#,
            )
            .bind(id)
            .bind(user.user_id)
            .bind(name)
            .bind(info)
            .bind(req.display_order)
            .execute(&mut *tx)
            .await?
            .rows_affected();

            if updated == 0 {
                return Err(AppError::NotFound("Project not found".to_string()));
            }
            if let Some(skill_ids) = req.skill_ids.as_deref() {
                replace_skill_links(&mut tx, id, skill_ids).await?;
            }
            tx.commit().await.map_err(order_conflict)?;

            let project = find_project(pool, user.user_id, id).await?;
            Ok(Envelope::data(project)
                .with_message("Project updated successfully")
                .into_response())
        }
        "delete" => {
            let id = required_id(&body, "Project", "delete")?;
            if !OrderedTable::Projects.delete(pool, user.user_id, id).await? {
                return Err(AppError::NotFound("Project not found".to_string()));
            }
            Ok(Envelope::message("Project deleted successfully").into_response())
        }
        "reorder" => {
            let req: ProjectReorder = parse_body(body)?;
            OrderedTable::Projects
                .reorder(pool, user.user_id, &req.project_orders)
                .await?;
            Ok(Envelope::message("Projects reordered successfully").into_response())
        }
        other => Err(invalid_action(other, "create, update, delete, or reorder")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(id: Uuid, name: &str, order: i32) -> ProjectRow {
        ProjectRow {
            id,
            project_name: name.to_string(),
            project_info: format!("{name} info"),
            display_order: order,
        }
    }

    fn skill(name: &str) -> SkillRow {
        SkillRow {
            id: Uuid::new_v4(),
            skill_name: name.to_string(),
            category: None,
        }
    }

    #[test]
    fn test_attach_skills_keeps_project_order() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let mut skills = HashMap::new();
        skills.insert(b, vec![skill("Rust"), skill("Postgres")]);

        let projects = attach_skills(vec![row(a, "Alpha", 0), row(b, "Beta", 1)], skills);

        assert_eq!(projects.len(), 2);
        assert_eq!(projects[0].project_name, "Alpha");
        assert!(projects[0].skills.is_empty());
        assert_eq!(projects[1].skills.len(), 2);
    }

    #[test]
    fn test_skill_ids_absent_vs_empty() {
        let absent: ProjectInput = parse_body(json!({"action": "update"})).unwrap();
        assert!(absent.skill_ids.is_none());
        let empty: ProjectInput = parse_body(json!({"skillIds": []})).unwrap();
        assert_eq!(empty.skill_ids, Some(vec![]));
    }
}
