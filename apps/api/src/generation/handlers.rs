//! Axum route handlers for the analyzer API.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::auth::extractor::AuthUser;
use crate::errors::AppError;
use crate::generation::content::load_skill_groups;
use crate::generation::generator::{
    generate_experience_content, generate_project_content, GenerationRequest,
};
use crate::generation::reconcile::{ExperienceResult, ProjectResult};
use crate::generation::skills::{
    optimize_skills, ExperienceHighlights, ProjectHighlights, SkillCategory, SkillRequest,
};
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct SkillGenerationRequest {
    pub job_role: String,
    #[serde(default)]
    pub job_description: String,
    #[serde(default)]
    pub include_web_research: bool,
    #[serde(default)]
    pub additional_instruction: Option<String>,
    #[serde(default)]
    pub experience_data: Vec<ExperienceHighlights>,
    #[serde(default)]
    pub project_data: Vec<ProjectHighlights>,
}

impl SkillGenerationRequest {
    fn as_skill_request(&self) -> SkillRequest<'_> {
        SkillRequest {
            job_role: &self.job_role,
            job_description: &self.job_description,
            include_web_research: self.include_web_research,
            additional_instruction: self.additional_instruction.as_deref(),
            experiences: &self.experience_data,
            projects: &self.project_data,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AnalyzerResponse<T> {
    pub message: &'static str,
    pub status: &'static str,
    pub output: Vec<T>,
}

impl<T> AnalyzerResponse<T> {
    fn success(message: &'static str, output: Vec<T>) -> Json<Self> {
        Json(Self {
            message,
            status: "success",
            output,
        })
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /analyzer/experience-gen
///
/// Rewrites the caller's stored experiences for the target job.
/// `points_count` is ordered by display order.
pub async fn handle_experience_generation(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<GenerationRequest>,
) -> Result<Json<AnalyzerResponse<ExperienceResult>>, AppError> {
    let output =
        generate_experience_content(&state.db, state.llm.as_ref(), user.user_id, &request).await?;
    Ok(AnalyzerResponse::success("Experience generation", output))
}

/// POST /analyzer/project-gen
pub async fn handle_project_generation(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<GenerationRequest>,
) -> Result<Json<AnalyzerResponse<ProjectResult>>, AppError> {
    let output =
        generate_project_content(&state.db, state.llm.as_ref(), user.user_id, &request).await?;
    Ok(AnalyzerResponse::success("Project generation", output))
}

/// POST /analyzer/skill-gen
///
/// Reshapes the caller's skill catalog. `experience_data` / `project_data` are
/// the outputs of the two endpoints above, passed back by the client.
pub async fn handle_skill_generation(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<SkillGenerationRequest>,
) -> Result<Json<AnalyzerResponse<SkillCategory>>, AppError> {
    let skill_request = request.as_skill_request();
    skill_request.validate()?;

    let catalog = load_skill_groups(&state.db, user.user_id).await?;
    let output = optimize_skills(state.llm.as_ref(), &catalog, skill_request).await?;

    Ok(AnalyzerResponse::success("Skill generation", output))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::GenerationError;

    #[test]
    fn test_skill_request_accepts_minimal_body() {
        let req: SkillGenerationRequest =
            serde_json::from_str(r#"{"job_role": "Data Engineer"}"#).unwrap();
        assert!(!req.include_web_research);
        assert!(req.experience_data.is_empty());
    }

    #[test]
    fn test_blank_role_is_rejected_before_any_loading() {
        let req: SkillGenerationRequest =
            serde_json::from_str(r#"{"job_role": "   ", "job_description": "Spark"}"#).unwrap();
        let err = AppError::from(req.as_skill_request().validate().unwrap_err());
        assert!(matches!(
            err,
            AppError::Generation(GenerationError::InvalidRequest(_))
        ));

        let ok: SkillGenerationRequest =
            serde_json::from_str(r#"{"job_role": "Data Engineer"}"#).unwrap();
        assert!(ok.as_skill_request().validate().is_ok());
    }

    #[test]
    fn test_skill_request_reads_previous_outputs() {
        let body = r#"{
            "job_role": "Data Engineer",
            "job_description": "Spark",
            "include_web_research": true,
            "experience_data": [{"experience_id": 1, "experience_role": "Dev", "resume_points": ["x"], "experience_company_name": "Acme"}],
            "project_data": [{"project_id": 1, "project_name": "P", "project_points": [], "project_skills": ["Spark"]}]
        }"#;
        let req: SkillGenerationRequest = serde_json::from_str(body).unwrap();
        assert_eq!(req.experience_data[0].resume_points, vec!["x"]);
        assert_eq!(req.project_data[0].project_skills, vec!["Spark"]);
    }

    #[test]
    fn test_response_envelope_shape() {
        let Json(body) = AnalyzerResponse::success("Skill generation", vec![SkillCategory {
            skill_category: "Cloud".to_string(),
            skills: vec!["S3".to_string()],
        }]);
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["status"], "success");
        assert_eq!(value["message"], "Skill generation");
        assert_eq!(value["output"][0]["skill_category"], "Cloud");
    }
}
