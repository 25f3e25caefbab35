use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use axum::{
    body::Body,
    extract::{Multipart, Query, State},
    http::header,
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::extractor::AuthUser;
use crate::errors::AppError;
use crate::response::Envelope;
use crate::state::AppState;

pub const MAX_RESUME_BYTES: usize = 10 * 1024 * 1024;

const PDF: &str = "application/pdf";
const DOC: &str = "application/msword";
const DOCX: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
const ALLOWED_TYPES: [&str; 3] = [PDF, DOC, DOCX];

#[derive(Debug, Deserialize)]
pub struct ResumeQuery {
    pub id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedResume {
    pub resume_file_path: String,
    pub file_name: String,
    pub file_size: usize,
    pub mime_type: String,
}

/// Download content type, chosen from the stored key's extension.
pub fn content_type_for(key: &str) -> &'static str {
    match extension(key).to_ascii_lowercase().as_str() {
        ".pdf" => PDF,
        ".doc" => DOC,
        ".docx" => DOCX,
        _ => "application/octet-stream",
    }
}

/// `.ext` of the final path segment, or empty.
fn extension(name: &str) -> &str {
    let file = name.rsplit('/').next().unwrap_or(name);
    match file.rfind('.') {
        Some(0) | None => "",
        Some(i) => &file[i..],
    }
}

pub fn resume_key(user_id: Uuid, application_id: Uuid, original_name: &str) -> String {
    format!(
        "resumes/{user_id}/{application_id}_{}{}",
        Uuid::new_v4(),
        extension(original_name)
    )
}

fn file_name(key: &str) -> &str {
    key.rsplit('/').next().unwrap_or(key)
}

pub fn check_upload(content_type: &str, size: usize) -> Result<(), AppError> {
    if !ALLOWED_TYPES.contains(&content_type) {
        return Err(AppError::InvalidFileType(
            "Only PDF, DOC, and DOCX files are allowed".to_string(),
        ));
    }
    if size > MAX_RESUME_BYTES {
        return Err(AppError::FileTooLarge("File size exceeds 10MB limit".to_string()));
    }
    Ok(())
}

// ────────────────────────────────────────────────────────────────────────────
// Object storage
// ────────────────────────────────────────────────────────────────────────────

async fn put_resume(
    s3: &S3Client,
    bucket: &str,
    key: &str,
    content_type: &str,
    data: Bytes,
) -> Result<(), AppError> {
    s3.put_object()
        .bucket(bucket)
        .key(key)
        .body(ByteStream::from(data))
        .content_type(content_type)
        .send()
        .await
        .map_err(|e| AppError::S3(format!("S3 upload failed: {e}")))?;

    info!("Uploaded resume to s3://{bucket}/{key}");
    Ok(())
}

async fn fetch_resume(s3: &S3Client, bucket: &str, key: &str) -> Result<Bytes, AppError> {
    let object = s3
        .get_object()
        .bucket(bucket)
        .key(key)
        .send()
        .await
        .map_err(|e| {
            if e.as_service_error().is_some_and(|se| se.is_no_such_key()) {
                AppError::FileNotFound("Resume file not found on server".to_string())
            } else {
                AppError::S3(format!("S3 download failed: {e}"))
            }
        })?;

    let data = object
        .body
        .collect()
        .await
        .map_err(|e| AppError::S3(format!("S3 read failed: {e}")))?;
    Ok(data.into_bytes())
}

/// Removes a stored resume. Failures are logged; the database stays authoritative.
pub async fn remove_resume(s3: &S3Client, bucket: &str, key: &str) {
    match s3.delete_object().bucket(bucket).key(key).send().await {
        Ok(_) => info!("Deleted resume s3://{bucket}/{key}"),
        Err(e) => warn!("Failed to delete resume s3://{bucket}/{key}: {e}"),
    }
}

async fn stored_path(pool: &PgPool, user_id: Uuid, id: Uuid) -> Result<Option<String>, AppError> {
    sqlx::query_scalar::<_, Option<String>>(
        "SELECT resume_file_path FROM applications WHERE id = $1 AND user_id = $2",
    )
    .bind(id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Application not found".to_string()))
}

fn required_application_id(id: Option<Uuid>) -> Result<Uuid, AppError> {
    id.ok_or_else(|| AppError::Validation("Application ID is required".to_string()))
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// GET /api/resume?id=
pub async fn handle_download_resume(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<ResumeQuery>,
) -> Result<Response, AppError> {
    let id = required_application_id(query.id)?;
    let key = stored_path(&state.db, user.user_id, id)
        .await?
        .ok_or_else(|| AppError::FileNotFound("Resume file not found".to_string()))?;

    let data = fetch_resume(&state.s3, &state.config.s3_bucket, &key).await?;
    let disposition = format!("attachment; filename=\"{}\"", file_name(&key));

    Ok((
        [
            (header::CONTENT_TYPE, content_type_for(&key).to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        Body::from(data),
    )
        .into_response())
}

/// Parts of a multipart resume request.
#[derive(Debug, Default)]
struct ResumeForm {
    action: Option<String>,
    id: Option<Uuid>,
    file: Option<ResumeUpload>,
}

#[derive(Debug)]
struct ResumeUpload {
    original_name: String,
    content_type: String,
    data: Bytes,
}

async fn read_form(mut multipart: Multipart) -> Result<ResumeForm, AppError> {
    let mut form = ResumeForm::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::FileUpload(format!("Malformed multipart body: {e}")))?
    {
        match field.name() {
            Some("file") => {
                let original_name = field.file_name().unwrap_or_default().to_string();
                let content_type = field.content_type().unwrap_or_default().to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::FileUpload(format!("Failed to read file: {e}")))?;
                form.file = Some(ResumeUpload {
                    original_name,
                    content_type,
                    data,
                });
            }
            Some("id") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::FileUpload(format!("Failed to read id: {e}")))?;
                let id = Uuid::parse_str(text.trim())
                    .map_err(|_| AppError::Validation("Invalid application ID".to_string()))?;
                form.id = Some(id);
            }
            Some("action") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::FileUpload(format!("Failed to read action: {e}")))?;
                form.action = Some(text.trim().to_string());
            }
            _ => {}
        }
    }
    Ok(form)
}

/// POST /api/resume (multipart `id`, `file`; `action=delete` removes instead)
pub async fn handle_resume_action(
    State(state): State<AppState>,
    user: AuthUser,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let form = read_form(multipart).await?;
    let id = required_application_id(form.id)?;
    let previous = stored_path(&state.db, user.user_id, id).await?;

    match form.action.as_deref().unwrap_or("upload") {
        "upload" => {
            let upload = form
                .file
                .ok_or_else(|| AppError::FileUpload("No file provided".to_string()))?;
            check_upload(&upload.content_type, upload.data.len())?;

            let key = resume_key(user.user_id, id, &upload.original_name);
            let file_size = upload.data.len();
            put_resume(
                &state.s3,
                &state.config.s3_bucket,
                &key,
                &upload.content_type,
                upload.data,
            )
            .await?;

            sqlx::query(
                "UPDATE applications SET resume_file_path = $3, updated_at = NOW() WHERE id = $1 AND user_id = $2",
            )
            .bind(id)
            .bind(user.user_id)
            .bind(&key)
            .execute(&state.db)
            .await?;

            if let Some(old) = previous.as_deref() {
                remove_resume(&state.s3, &state.config.s3_bucket, old).await;
            }

            Ok(Envelope::data(UploadedResume {
                file_name: file_name(&key).to_string(),
                resume_file_path: key,
                file_size,
                mime_type: upload.content_type,
            })
            .with_message("Resume uploaded successfully")
            .into_response())
        }
        "delete" => delete_stored(&state, user.user_id, id, previous).await,
        other => Err(AppError::Validation(format!(
            "Invalid action: {other}. Use upload or delete"
        ))),
    }
}

/// DELETE /api/resume?id=
pub async fn handle_delete_resume(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<ResumeQuery>,
) -> Result<Response, AppError> {
    let id = required_application_id(query.id)?;
    let previous = stored_path(&state.db, user.user_id, id).await?;
    delete_stored(&state, user.user_id, id, previous).await
}

async fn delete_stored(
    state: &AppState,
    user_id: Uuid,
    id: Uuid,
    previous: Option<String>,
) -> Result<Response, AppError> {
    sqlx::query(
        "UPDATE applications SET resume_file_path = NULL, updated_at = NOW() WHERE id = $1 AND user_id = $2",
    )
    .bind(id)
    .bind(user_id)
    .execute(&state.db)
    .await?;

    if let Some(key) = previous.as_deref() {
        remove_resume(&state.s3, &state.config.s3_bucket, key).await;
    }
    Ok(Envelope::message("Resume deleted successfully").into_response())
}
