use axum::{
    extract::{Query, State},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use crate::applicant::{
    check_len, double_option, invalid_action, parse_body, patch_text, require_text, required_id,
    split_action,
};
use crate::applications::resume_file::remove_resume;
use crate::applications::{summarize, ApplicationPage, ApplicationQuery, ApplicationStats};
use crate::auth::extractor::AuthUser;
use crate::errors::AppError;
use crate::models::application::{ApplicationRow, ApplicationStatus, RecentApplication};
use crate::response::Envelope;
use crate::state::AppState;
use crate::validation::is_http_url;

const COLUMNS: &str = "id, job_name, company_name, job_link, resume_file_path, status, notes";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NewApplication {
    job_name: Option<String>,
    company_name: Option<String>,
    job_link: Option<String>,
    status: Option<String>,
    notes: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApplicationPatch {
    job_name: Option<String>,
    company_name: Option<String>,
    job_link: Option<String>,
    status: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    notes: Option<Option<String>>,
}

fn check_status(status: &str) -> Result<&'static str, AppError> {
    ApplicationStatus::parse(status)
        .map(ApplicationStatus::as_str)
        .ok_or_else(|| {
            AppError::Validation(format!(
                "status: Status must be one of: {}",
                ApplicationStatus::choices()
            ))
        })
}

fn check_job_link(link: String) -> Result<String, AppError> {
    check_len("jobLink", &link, 500)?;
    if !is_http_url(&link) {
        return Err(AppError::Validation("jobLink: Enter a valid URL.".to_string()));
    }
    Ok(link)
}

/// GET /api/applications
pub async fn handle_get_applications(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<ApplicationQuery>,
) -> Result<Response, AppError> {
    if let Some(id) = query.id {
        let sql = format!("SELECT {COLUMNS} FROM applications WHERE id = $1 AND user_id = $2");
        let row = sqlx::query_as::<_, ApplicationRow>(&sql)
            .bind(id)
            .bind(user.user_id)
            .fetch_optional(&state.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Application not found".to_string()))?;
        return Ok(Envelope::data(row).into_response());
    }

    let params = query.list_params();
    let company = params.company.as_deref().map(|c| format!("%{c}%"));
    let filter = r#"
        WHERE user_id = $1
          AND ($2::text IS NULL OR status = $2)
          AND ($3::text IS NULL OR company_name ILIKE $3)
    "#;

    let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM applications {filter}"))
        .bind(user.user_id)
        .bind(&params.status)
        .bind(&company)
        .fetch_one(&state.db)
        .await?;

    let sql = format!(
        "SELECT {COLUMNS} FROM applications {filter} ORDER BY {} LIMIT $4 OFFSET $5",
        params.order_by
    );
    let applications = sqlx::query_as::<_, ApplicationRow>(&sql)
        .bind(user.user_id)
        .bind(&params.status)
        .bind(&company)
        .bind(params.limit)
        .bind(params.offset)
        .fetch_all(&state.db)
        .await?;

    Ok(Envelope::data(ApplicationPage {
        applications,
        total,
        page: params.page(),
        limit: params.limit,
    })
    .into_response())
}

/// POST /api/applications
pub async fn handle_application_action(
    State(state): State<AppState>,
    user: AuthUser,
    Json(body): Json<Value>,
) -> Result<Response, AppError> {
    let pool = &state.db;
    let (action, body) = split_action(body, "create");

    match action.as_str() {
        "create" => {
            let req: NewApplication = parse_body(body)?;
            let job_name = require_text("jobName", req.job_name.as_deref(), 255)?;
            let company_name = require_text("companyName", req.company_name.as_deref(), 255)?;
            let job_link = check_job_link(require_text("jobLink", req.job_link.as_deref(), 500)?)?;
            let status = check_status(req.status.as_deref().unwrap_or("Applied"))?;

            let sql = format!(
                r#"
                INSERT INTO applications (user_id, job_name, company_name, job_link, status, notes)
                VALUES ($1, $2, $3, $4, $5, $6)
                RETURNING {COLUMNS}
                "#
            );
            let row = sqlx::query_as::<_, ApplicationRow>(&sql)
                .bind(user.user_id)
                .bind(job_name)
                .bind(company_name)
                .bind(job_link)
                .bind(status)
                .bind(req.notes)
                .fetch_one(pool)
                .await?;

            info!("Created application {} for user {}", row.id, user.user_id);
            Ok(Envelope::data(row)
                .with_message("Application created successfully")
                .into_response())
        }
        "update" => {
            let id = required_id(&body, "Application", "update")?;
            let req: ApplicationPatch = parse_body(body)?;
            let job_name = patch_text("jobName", req.job_name, 255)?;
            let company_name = patch_text("companyName", req.company_name, 255)?;
            let job_link = patch_text("jobLink", req.job_link, 500)?
                .map(check_job_link)
                .transpose()?;
            let status = req.status.as_deref().map(check_status).transpose()?;

            let sql = format!(
                r#"
                UPDATE applications
                SET job_name = COALESCE($3, job_name),
                    company_name = COALESCE($4, company_name),
                    job_link = COALESCE($5, job_link),
                    status = COALESCE($6, status),
                    notes = CASE WHEN $7 THEN $8 ELSE notes END,
                    updated_at = NOW()
                WHERE id = $1 AND user_id = $2
                RETURNING {COLUMNS}
                "#
            );
            let row = sqlx::query_as::<_, ApplicationRow>(&sql)
                .bind(id)
                .bind(user.user_id)
                .bind(job_name)
                .bind(company_name)
                .bind(job_link)
                .bind(status)
                .bind(req.notes.is_some())
                .bind(req.notes.flatten())
                .fetch_optional(pool)
                .await?
                .ok_or_else(|| AppError::NotFound("Application not found".to_string()))?;

            Ok(Envelope::data(row)
                .with_message("Application updated successfully")
                .into_response())
        }
        "delete" => {
            let id = required_id(&body, "Application", "delete")?;
            let resume: Option<Option<String>> = sqlx::query_scalar(
                "DELETE FROM applications WHERE id = $1 AND user_id = $2 RETURNING resume_file_path",
            )
            .bind(id)
            .bind(user.user_id)
            .fetch_optional(pool)
            .await?;

            let Some(resume) = resume else {
                return Err(AppError::NotFound("Application not found".to_string()));
            };
            if let Some(key) = resume.as_deref() {
                remove_resume(&state.s3, &state.config.s3_bucket, key).await;
            }
            Ok(Envelope::message("Application deleted successfully").into_response())
        }
        other => Err(invalid_action(other, "create, update, or delete")),
    }
}

/// GET /api/applications/stats
pub async fn handle_application_stats(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Response, AppError> {
    let counts: Vec<(String, i64)> = sqlx::query_as(
        "SELECT status, COUNT(*) FROM applications WHERE user_id = $1 GROUP BY status",
    )
    .bind(user.user_id)
    .fetch_all(&state.db)
    .await?;

    let recent_applications = sqlx::query_as::<_, RecentApplication>(
        r#"
        SELECT id, job_name, company_name, status
        FROM applications
        WHERE user_id = $1
        ORDER BY created_at DESC
        LIMIT 5
        "#,
    )
    .bind(user.user_id)
    .fetch_all(&state.db)
    .await?;

    Ok(Envelope::data(ApplicationStats {
        summary: summarize(&counts),
        recent_applications,
    })
    .into_response())
}
