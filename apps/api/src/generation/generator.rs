//! Orchestrates one rewrite request.
//!
//! Flow: load records → build content-id index → build prompt →
//!       single LLM call → extract JSON → reconcile onto stored records.
//!
//! Results are returned to the caller and never persisted.

use serde::Deserialize;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::generation::content::{
    load_experiences, load_projects, ContentIndex, ExperienceRecord, NumberedRecord,
    ProjectRecord,
};
use crate::generation::prompts::{
    build_experience_prompt, build_project_prompt, PromptEntry, EXPERIENCE_SYSTEM, PROJECT_SYSTEM,
};
use crate::generation::reconcile::{
    extract_json_array, reconcile_experiences, reconcile_projects, ExperienceResult,
    GeneratedExperience, GeneratedProject, ProjectResult,
};
use crate::generation::GenerationError;
use crate::llm_client::{CompletionRequest, TextGenerator};

/// Experience/project rewriting favours variety.
const REWRITE_TEMPERATURE: f32 = 0.8;

// ────────────────────────────────────────────────────────────────────────────
// Request
// ────────────────────────────────────────────────────────────────────────────

/// Body of `experience-gen` and `project-gen`.
///
/// `points_count[i]` is the bullet count for the record at display position `i`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenerationRequest {
    pub job_role: String,
    #[serde(default)]
    pub job_description: String,
    #[serde(default)]
    pub points_count: Vec<u32>,
    #[serde(default)]
    pub additional_instruction: Option<String>,
}

impl GenerationRequest {
    fn validate(&self, record_count: usize) -> Result<(), GenerationError> {
        if self.job_role.trim().is_empty() {
            return Err(GenerationError::InvalidRequest(
                "job_role cannot be empty".to_string(),
            ));
        }
        if self.points_count.len() != record_count {
            return Err(GenerationError::InvalidRequest(format!(
                "points_count has {} entries but {} records are stored",
                self.points_count.len(),
                record_count
            )));
        }
        Ok(())
    }

    fn instruction(&self) -> Option<&str> {
        self.additional_instruction.as_deref()
    }
}

/// Pairs each record with its content id and requested bullet count.
fn prompt_entries<'a, T: NumberedRecord>(
    records: &'a [T],
    index: &ContentIndex,
    points_count: &[u32],
) -> Result<Vec<PromptEntry<'a, T>>, GenerationError> {
    records
        .iter()
        .zip(points_count)
        .map(|(record, &bullets)| -> Result<PromptEntry<'a, T>, GenerationError> {
            let content_id = index.content_id(record.storage_id()).ok_or_else(|| {
                GenerationError::InconsistentRecords(format!(
                    "record {} missing from content index",
                    record.storage_id()
                ))
            })?;
            Ok(PromptEntry {
                content_id,
                bullets,
                record,
            })
        })
        .collect()
}

// ────────────────────────────────────────────────────────────────────────────
// Experiences
// ────────────────────────────────────────────────────────────────────────────

/// Loads the user's experiences and rewrites them for the target job.
pub async fn generate_experience_content(
    pool: &PgPool,
    llm: &dyn TextGenerator,
    user_id: Uuid,
    request: &GenerationRequest,
) -> Result<Vec<ExperienceResult>, GenerationError> {
    let records = load_experiences(pool, user_id).await?;
    info!(
        "Loaded {} experiences for user {} (role '{}')",
        records.len(),
        user_id,
        request.job_role
    );
    rewrite_experiences(llm, &records, request).await
}

/// Rewrites already-loaded experience records. No records → no call.
pub async fn rewrite_experiences(
    llm: &dyn TextGenerator,
    records: &[ExperienceRecord],
    request: &GenerationRequest,
) -> Result<Vec<ExperienceResult>, GenerationError> {
    request.validate(records.len())?;
    if records.is_empty() {
        info!("No experiences stored; skipping generation");
        return Ok(Vec::new());
    }

    let index = ContentIndex::build(records)?;
    let entries = prompt_entries(records, &index, &request.points_count)?;
    let prompt = build_experience_prompt(
        &request.job_role,
        &request.job_description,
        &entries,
        request.instruction(),
    );

    let raw = llm
        .complete(CompletionRequest {
            system: EXPERIENCE_SYSTEM,
            prompt: &prompt,
            temperature: REWRITE_TEMPERATURE,
        })
        .await?;

    let generated: Vec<GeneratedExperience> = extract_json_array(&raw)?;
    let results = reconcile_experiences(generated, records, &index, &request.points_count)?;

    info!("Generated content for {} experiences", results.len());
    Ok(results)
}

// ────────────────────────────────────────────────────────────────────────────
// Projects
// ────────────────────────────────────────────────────────────────────────────

/// Loads the user's projects (with skill tags) and rewrites them for the target job.
pub async fn generate_project_content(
    pool: &PgPool,
    llm: &dyn TextGenerator,
    user_id: Uuid,
    request: &GenerationRequest,
) -> Result<Vec<ProjectResult>, GenerationError> {
    let records = load_projects(pool, user_id).await?;
    info!(
        "Loaded {} projects for user {} (role '{}')",
        records.len(),
        user_id,
        request.job_role
    );
    rewrite_projects(llm, &records, request).await
}

pub async fn rewrite_projects(
    llm: &dyn TextGenerator,
    records: &[ProjectRecord],
    request: &GenerationRequest,
) -> Result<Vec<ProjectResult>, GenerationError> {
    request.validate(records.len())?;
    if records.is_empty() {
        info!("No projects stored; skipping generation");
        return Ok(Vec::new());
    }

    let index = ContentIndex::build(records)?;
    let entries = prompt_entries(records, &index, &request.points_count)?;
    let prompt = build_project_prompt(
        &request.job_role,
        &request.job_description,
        &entries,
        request.instruction(),
    );

    let raw = llm
        .complete(CompletionRequest {
            system: PROJECT_SYSTEM,
            prompt: &prompt,
            temperature: REWRITE_TEMPERATURE,
        })
        .await?;

    let generated: Vec<GeneratedProject> = extract_json_array(&raw)?;
    let results = reconcile_projects(generated, records, &index, &request.points_count)?;

    info!("Generated content for {} projects", results.len());
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::content::fixtures::{experience, project};
    use crate::generation::content::ContentId;
    use crate::generation::testing::ScriptedGenerator;

    fn request(points_count: Vec<u32>) -> GenerationRequest {
        GenerationRequest {
            job_role: "Senior Engineer".to_string(),
            job_description: "Rust, Kubernetes, AWS".to_string(),
            points_count,
            additional_instruction: None,
        }
    }

    #[tokio::test]
    async fn test_experience_scenario_end_to_end() {
        let llm = ScriptedGenerator::new(
            "Here you go:\n[{\"experience_id\":\"1\",\"experience_role\":\"Senior Engineer\",\"resume_points\":[\"a\",\"b\"]}]",
        );
        let records = vec![experience(0, "Acme", "Engineer")];

        let results = rewrite_experiences(&llm, &records, &request(vec![2]))
            .await
            .unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].experience_id, ContentId(1));
        assert_eq!(results[0].experience_role, "Senior Engineer");
        assert_eq!(results[0].resume_points, vec!["a", "b"]);
        assert_eq!(results[0].experience_company_name, "Acme");
        assert_eq!(results[0].start_date, "Jan 2021");

        let calls = llm.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].system, EXPERIENCE_SYSTEM);
        assert!((calls[0].temperature - 0.8).abs() < f32::EPSILON);
        assert!(calls[0].prompt.contains("Bullet Points Needed: 2"));
    }

    #[tokio::test]
    async fn test_plain_prose_is_malformed() {
        let llm = ScriptedGenerator::new("Sorry, I can't help with that.");
        let records = vec![experience(0, "Acme", "Engineer")];
        let err = rewrite_experiences(&llm, &records, &request(vec![2]))
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::MalformedOutput(_)));
    }

    #[tokio::test]
    async fn test_unknown_content_id_fails_whole_request() {
        let llm = ScriptedGenerator::new(
            r#"[{"experience_id":1,"experience_role":"A","resume_points":[]},{"experience_id":9,"experience_role":"B","resume_points":[]}]"#,
        );
        let records = vec![experience(0, "Acme", "Engineer")];
        let err = rewrite_experiences(&llm, &records, &request(vec![0]))
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::ReconciliationMismatch { .. }));
    }

    #[tokio::test]
    async fn test_llm_failure_surfaces_as_external_service() {
        let llm = ScriptedGenerator::failing(503);
        let records = vec![experience(0, "Acme", "Engineer")];
        let err = rewrite_experiences(&llm, &records, &request(vec![1]))
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::ExternalService(_)));
        assert_eq!(llm.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_points_count_length_mismatch_is_rejected_before_call() {
        let llm = ScriptedGenerator::new("[]");
        let records = vec![experience(0, "Acme", "Engineer"), experience(1, "Beta", "Dev")];
        let err = rewrite_experiences(&llm, &records, &request(vec![2]))
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::InvalidRequest(_)));
        assert!(llm.calls().is_empty());
    }

    #[tokio::test]
    async fn test_empty_role_is_rejected() {
        let llm = ScriptedGenerator::new("[]");
        let mut req = request(vec![]);
        req.job_role = "  ".to_string();
        let err = rewrite_projects(&llm, &[], &req).await.unwrap_err();
        assert!(matches!(err, GenerationError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_no_records_skips_the_call() {
        let llm = ScriptedGenerator::new("[]");
        let results = rewrite_projects(&llm, &[], &request(vec![])).await.unwrap();
        assert!(results.is_empty());
        assert!(llm.calls().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_display_order_fails_before_call() {
        let llm = ScriptedGenerator::new("[]");
        let records = vec![project(0, "A", &[]), project(0, "B", &[])];
        let err = rewrite_projects(&llm, &records, &request(vec![1, 1]))
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::InconsistentRecords(_)));
        assert!(llm.calls().is_empty());
    }

    #[tokio::test]
    async fn test_project_rewrite_with_override_and_counts() {
        let llm = ScriptedGenerator::new(
            r#"```json
[{"project_id": 2, "project_name": "B", "project_points": ["x"], "project_skills": ["Go"]},
 {"project_id": 1, "project_name": "A", "project_points": [], "project_skills": []}]
```"#,
        );
        let records = vec![project(0, "Alpha", &["Python"]), project(1, "Beta", &[])];
        let mut req = request(vec![0, 1]);
        req.additional_instruction = Some("Mention Kafka".to_string());

        let results = rewrite_projects(&llm, &records, &req).await.unwrap();

        assert_eq!(results[0].project_id, ContentId(2));
        assert_eq!(results[0].project_name, "Beta");
        assert_eq!(results[1].project_name, "Alpha");
        assert!(results[1].project_points.is_empty());

        let prompt = &llm.calls()[0].prompt;
        assert!(prompt.contains("Mention Kafka"));
        assert!(prompt.contains("Points Needed: 0"));
        assert_eq!(llm.calls()[0].system, PROJECT_SYSTEM);
    }

    #[test]
    fn test_request_defaults_optional_fields() {
        let req: GenerationRequest = serde_json::from_str(r#"{"job_role": "Dev"}"#).unwrap();
        assert!(req.points_count.is_empty());
        assert!(req.job_description.is_empty());
        assert!(req.instruction().is_none());
    }
}
