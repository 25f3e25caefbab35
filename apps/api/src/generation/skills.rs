//! Skill optimization: reshapes the user's skill catalog for a target job.
//!
//! The already-generated experience and project content is corroborating
//! signal only. Budget and "no generic terms" rules live in the prompt and are
//! not enforced here.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::generation::content::SkillGroup;
use crate::generation::prompts::{build_skill_prompt, SKILL_SYSTEM};
use crate::generation::reconcile::extract_json_array;
use crate::generation::GenerationError;
use crate::llm_client::{CompletionRequest, TextGenerator};

const SKILL_TEMPERATURE: f32 = 0.3;

/// Rendered length window requested per category.
const CATEGORY_CHAR_BUDGET: std::ops::RangeInclusive<usize> = 100..=120;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloudPlatform {
    Aws,
    Azure,
    Gcp,
}

impl CloudPlatform {
    pub fn label(self) -> &'static str {
        match self {
            CloudPlatform::Aws => "AWS",
            CloudPlatform::Azure => "Azure",
            CloudPlatform::Gcp => "GCP",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CloudMention {
    pub platform: CloudPlatform,
    pub count: usize,
}

/// Experience content from an earlier experience-gen call.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ExperienceHighlights {
    #[serde(default)]
    pub experience_role: String,
    #[serde(default)]
    pub resume_points: Vec<String>,
}

/// Project content from an earlier project-gen call.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ProjectHighlights {
    #[serde(default)]
    pub project_name: String,
    #[serde(default)]
    pub project_points: Vec<String>,
    #[serde(default)]
    pub project_skills: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SkillCategory {
    pub skill_category: String,
    pub skills: Vec<String>,
}

impl SkillCategory {
    /// Length as it would print on a resume: `Category: a, b, c`.
    pub fn rendered_len(&self) -> usize {
        self.skill_category.chars().count()
            + 2
            + self.skills.iter().map(|s| s.chars().count()).sum::<usize>()
            + self.skills.len().saturating_sub(1) * 2
    }
}

/// Inputs to a skill optimization call.
#[derive(Debug, Clone, Default)]
pub struct SkillRequest<'a> {
    pub job_role: &'a str,
    pub job_description: &'a str,
    pub include_web_research: bool,
    pub additional_instruction: Option<&'a str>,
    pub experiences: &'a [ExperienceHighlights],
    pub projects: &'a [ProjectHighlights],
}

impl SkillRequest<'_> {
    pub fn validate(&self) -> Result<(), GenerationError> {
        if self.job_role.trim().is_empty() {
            return Err(GenerationError::InvalidRequest(
                "job_role cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

fn cloud_patterns() -> &'static [(CloudPlatform, Regex); 3] {
    static PATTERNS: OnceLock<[(CloudPlatform, Regex); 3]> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        let compile = |p: &str| Regex::new(p).expect("cloud pattern is a valid literal regex");
        [
            (
                CloudPlatform::Aws,
                compile(r"(?i)\b(aws|amazon web services)\b"),
            ),
            (
                CloudPlatform::Azure,
                compile(r"(?i)\b(microsoft azure|azure)\b"),
            ),
            (
                CloudPlatform::Gcp,
                compile(r"(?i)\b(gcp|google cloud)\b"),
            ),
        ]
    })
}

/// The platform named strictly more often than the others, if any.
pub fn dominant_cloud_platform(job_description: &str) -> Option<CloudMention> {
    let mut counts: Vec<CloudMention> = cloud_patterns()
        .iter()
        .map(|(platform, re)| CloudMention {
            platform: *platform,
            count: re.find_iter(job_description).count(),
        })
        .collect();
    counts.sort_by(|a, b| b.count.cmp(&a.count));

    match counts.as_slice() {
        [top, second, ..] if top.count > 0 && top.count > second.count => Some(*top),
        _ => None,
    }
}

/// Single-attempt skill optimization over the user's catalog.
pub async fn optimize_skills(
    llm: &dyn TextGenerator,
    catalog: &[SkillGroup],
    request: SkillRequest<'_>,
) -> Result<Vec<SkillCategory>, GenerationError> {
    request.validate()?;

    if request.include_web_research {
        info!("Web research requested for skill optimization; relying on model knowledge only");
    }

    let dominant_cloud = dominant_cloud_platform(request.job_description);
    if let Some(mention) = dominant_cloud {
        debug!(
            "Dominant cloud platform: {} ({} mentions)",
            mention.platform.label(),
            mention.count
        );
    }

    let prompt = build_skill_prompt(
        request.job_role,
        request.job_description,
        catalog,
        request.experiences,
        request.projects,
        dominant_cloud,
        request.additional_instruction,
    );

    let raw = llm
        .complete(CompletionRequest {
            system: SKILL_SYSTEM,
            prompt: &prompt,
            temperature: SKILL_TEMPERATURE,
        })
        .await?;

    let categories: Vec<SkillCategory> = extract_json_array(&raw)?;

    for category in &categories {
        let len = category.rendered_len();
        if !CATEGORY_CHAR_BUDGET.contains(&len) {
            debug!(
                "Skill category '{}' renders to {len} chars (budget 100-120)",
                category.skill_category
            );
        }
    }

    info!(
        "Skill optimization produced {} categories for role '{}'",
        categories.len(),
        request.job_role
    );
    Ok(categories)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::testing::ScriptedGenerator;

    #[test]
    fn test_dominant_cloud_picks_most_mentioned() {
        let jd = "We run on AWS. Experience with AWS Lambda and aws glue; Azure a plus.";
        assert_eq!(
            dominant_cloud_platform(jd),
            Some(CloudMention {
                platform: CloudPlatform::Aws,
                count: 3
            })
        );
    }

    #[test]
    fn test_dominant_cloud_counts_long_names() {
        let jd = "Google Cloud (GCP) and BigQuery on Google Cloud.";
        let mention = dominant_cloud_platform(jd).unwrap();
        assert_eq!(mention.platform, CloudPlatform::Gcp);
        assert_eq!(mention.count, 3);
    }

    #[test]
    fn test_dominant_cloud_none_on_tie_or_absence() {
        assert_eq!(dominant_cloud_platform("AWS or Azure"), None);
        assert_eq!(dominant_cloud_platform("Rust and Postgres"), None);
        assert_eq!(dominant_cloud_platform(""), None);
    }

    #[test]
    fn test_dominant_cloud_ignores_substrings() {
        assert_eq!(dominant_cloud_platform("laws and drawsome"), None);
    }

    #[test]
    fn test_rendered_len() {
        let category = SkillCategory {
            skill_category: "Languages".to_string(),
            skills: vec!["Rust".to_string(), "Go".to_string()],
        };
        // "Languages: Rust, Go"
        assert_eq!(category.rendered_len(), 19);
    }

    #[test]
    fn test_highlights_accept_partial_objects() {
        let exp: ExperienceHighlights =
            serde_json::from_str(r#"{"experience_role": "Dev", "extra": 1}"#).unwrap();
        assert!(exp.resume_points.is_empty());
        let proj: ProjectHighlights = serde_json::from_str(r#"{"project_name": "P"}"#).unwrap();
        assert!(proj.project_skills.is_empty());
    }

    #[tokio::test]
    async fn test_optimize_skills_parses_categories_at_low_temperature() {
        let llm = ScriptedGenerator::new(
            "Optimized:\n[{\"skill_category\": \"Cloud\", \"skills\": [\"AWS Lambda\", \"S3\"]}]",
        );
        let catalog = vec![SkillGroup {
            category: "Cloud".to_string(),
            skills: vec!["EC2".to_string()],
        }];

        let output = optimize_skills(
            &llm,
            &catalog,
            SkillRequest {
                job_role: "Cloud Engineer",
                job_description: "AWS AWS",
                ..Default::default()
            },
        )
        .await
        .unwrap();

        assert_eq!(output.len(), 1);
        assert_eq!(output[0].skills, vec!["AWS Lambda", "S3"]);

        let calls = llm.calls();
        assert_eq!(calls.len(), 1);
        assert!((calls[0].temperature - 0.3).abs() < f32::EPSILON);
        assert!(calls[0].prompt.contains("Skills: EC2"));
        assert!(calls[0].prompt.contains("DETECTED CLOUD PLATFORM: AWS"));
        assert_eq!(calls[0].system, SKILL_SYSTEM);
    }

    #[tokio::test]
    async fn test_optimize_skills_rejects_empty_role_without_calling() {
        let llm = ScriptedGenerator::new("[]");
        let err = optimize_skills(&llm, &[], SkillRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::InvalidRequest(_)));
        assert!(llm.calls().is_empty());
    }

    #[tokio::test]
    async fn test_optimize_skills_prose_is_malformed() {
        let llm = ScriptedGenerator::new("No skills for you.");
        let err = optimize_skills(
            &llm,
            &[],
            SkillRequest {
                job_role: "Dev",
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, GenerationError::MalformedOutput(_)));
    }
}
