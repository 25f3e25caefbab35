//! Recovers the JSON array from raw model text and
//! merges each element back onto the stored record it names.
//!
//! Stored fields the model was not asked to regenerate (company, dates,
//! location, project name) always come from storage. A content id that does
//! not resolve to exactly one stored record fails the whole request.

use std::collections::HashSet;

use serde::de::{self, DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::generation::content::{ContentId, ContentIndex, ExperienceRecord, ProjectRecord};
use crate::generation::GenerationError;

// ────────────────────────────────────────────────────────────────────────────
// Model output shapes
// ────────────────────────────────────────────────────────────────────────────

/// Experience element as emitted by the model.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct GeneratedExperience {
    #[serde(deserialize_with = "lenient_id")]
    pub experience_id: String,
    #[serde(default)]
    pub experience_role: Option<String>,
    pub resume_points: Vec<String>,
}

/// Project element as emitted by the model.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct GeneratedProject {
    #[serde(deserialize_with = "lenient_id")]
    pub project_id: String,
    pub project_points: Vec<String>,
    #[serde(default)]
    pub project_skills: Vec<String>,
}

// ────────────────────────────────────────────────────────────────────────────
// Reconciled results
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExperienceResult {
    pub experience_id: ContentId,
    pub experience_role: String,
    pub resume_points: Vec<String>,
    pub experience_company_name: String,
    pub start_date: String,
    pub end_date: String,
    pub location: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProjectResult {
    pub project_id: ContentId,
    pub project_name: String,
    pub project_points: Vec<String>,
    pub project_skills: Vec<String>,
}

/// Model ids arrive as `1`, `1.0` or `"1"`; all are kept as text until resolved.
/// A fractional or negative number keeps its own spelling and fails resolution.
fn lenient_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(match (n.as_u64(), n.as_f64()) {
            (Some(id), _) => id.to_string(),
            (None, Some(f)) if f.fract() == 0.0 && (0.0..=u32::MAX as f64).contains(&f) => {
                (f as u64).to_string()
            }
            _ => n.to_string(),
        }),
        other => Err(de::Error::custom(format!(
            "content id must be a number or string, got {other}"
        ))),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Extraction
// ────────────────────────────────────────────────────────────────────────────

/// Parses the JSON array out of raw model text.
///
/// 1. first `[` .. last `]`, if both exist in that order
/// 2. otherwise (or if that slice does not parse) the whole text
pub fn extract_json_array<T: DeserializeOwned>(raw: &str) -> Result<Vec<T>, GenerationError> {
    let bracketed = match (raw.find('['), raw.rfind(']')) {
        (Some(start), Some(end)) if start < end => Some(&raw[start..=end]),
        _ => None,
    };

    let bracket_error = match bracketed.map(serde_json::from_str::<Vec<T>>) {
        Some(Ok(items)) => return Ok(items),
        Some(Err(e)) => Some(e),
        None => None,
    };

    serde_json::from_str::<Vec<T>>(raw.trim()).map_err(|whole_error| {
        let cause = bracket_error.unwrap_or(whole_error);
        GenerationError::MalformedOutput(format!("{cause} (response: {})", preview(raw)))
    })
}

fn preview(raw: &str) -> String {
    const MAX: usize = 120;
    let trimmed = raw.trim();
    if trimmed.chars().count() <= MAX {
        trimmed.to_string()
    } else {
        format!("{}…", trimmed.chars().take(MAX).collect::<String>())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Reconciliation
// ────────────────────────────────────────────────────────────────────────────

/// Resolves a raw id to a record position, rejecting unknown, malformed and repeated ids.
fn resolve(
    raw_id: &str,
    index: &ContentIndex,
    seen: &mut HashSet<ContentId>,
) -> Result<(ContentId, usize), GenerationError> {
    let content_id = raw_id
        .trim()
        .parse::<u32>()
        .map(ContentId)
        .map_err(|_| GenerationError::ReconciliationMismatch {
            content_id: raw_id.to_string(),
            reason: "not a positive integer",
        })?;

    let position = index
        .position(content_id)
        .ok_or_else(|| GenerationError::ReconciliationMismatch {
            content_id: raw_id.to_string(),
            reason: "no stored record has this content id",
        })?;

    if !seen.insert(content_id) {
        return Err(GenerationError::ReconciliationMismatch {
            content_id: raw_id.to_string(),
            reason: "content id returned more than once",
        });
    }

    Ok((content_id, position))
}

fn warn_on_count_drift(kind: &str, content_id: ContentId, requested: Option<u32>, got: usize) {
    if let Some(requested) = requested {
        if requested as usize != got {
            warn!(
                "{kind} {content_id}: requested {requested} bullet points, model returned {got}"
            );
        }
    }
}

fn warn_on_missing(kind: &str, expected: usize, got: usize) {
    if got < expected {
        warn!("{kind} generation returned {got} of {expected} records; passing through");
    }
}

/// Merges generated experiences onto stored rows. `requested` is indexed by record position.
pub fn reconcile_experiences(
    generated: Vec<GeneratedExperience>,
    records: &[ExperienceRecord],
    index: &ContentIndex,
    requested: &[u32],
) -> Result<Vec<ExperienceResult>, GenerationError> {
    let mut seen = HashSet::new();
    let mut results = Vec::with_capacity(generated.len());

    for item in generated {
        let (content_id, position) = resolve(&item.experience_id, index, &mut seen)?;
        let stored = &records[position];
        warn_on_count_drift(
            "Experience",
            content_id,
            requested.get(position).copied(),
            item.resume_points.len(),
        );

        let experience_role = item
            .experience_role
            .filter(|r| !r.trim().is_empty())
            .or_else(|| stored.role.clone())
            .unwrap_or_default();

        results.push(ExperienceResult {
            experience_id: content_id,
            experience_role,
            resume_points: item.resume_points,
            experience_company_name: stored.experience_name.clone(),
            start_date: stored.start_date.clone(),
            end_date: stored.end_date.clone(),
            location: stored.location.clone(),
        });
    }

    warn_on_missing("Experience", records.len(), results.len());
    Ok(results)
}

/// Merges generated projects onto stored rows. Skill tags come from the model.
pub fn reconcile_projects(
    generated: Vec<GeneratedProject>,
    records: &[ProjectRecord],
    index: &ContentIndex,
    requested: &[u32],
) -> Result<Vec<ProjectResult>, GenerationError> {
    let mut seen = HashSet::new();
    let mut results = Vec::with_capacity(generated.len());

    for item in generated {
        let (content_id, position) = resolve(&item.project_id, index, &mut seen)?;
        let stored = &records[position];
        warn_on_count_drift(
            "Project",
            content_id,
            requested.get(position).copied(),
            item.project_points.len(),
        );

        results.push(ProjectResult {
            project_id: content_id,
            project_name: stored.project_name.clone(),
            project_points: item.project_points,
            project_skills: item.project_skills,
        });
    }

    warn_on_missing("Project", records.len(), results.len());
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::content::fixtures::{experience, project};

    const ARRAY: &str = r#"[{"experience_id":"1","experience_role":"Senior Engineer","resume_points":["a","b"]}]"#;

    #[test]
    fn test_extract_ignores_surrounding_prose() {
        let expected: Vec<GeneratedExperience> = serde_json::from_str(ARRAY).unwrap();
        for (prefix, suffix) in [
            ("", ""),
            ("Here you go:\n", ""),
            ("", "\nLet me know if you need changes."),
            ("Sure! ```json\n", "\n``` Done."),
        ] {
            let raw = format!("{prefix}{ARRAY}{suffix}");
            let got: Vec<GeneratedExperience> = extract_json_array(&raw).unwrap();
            assert_eq!(got, expected, "prefix={prefix:?} suffix={suffix:?}");
        }
    }

    #[test]
    fn test_extract_plain_prose_is_malformed() {
        let err = extract_json_array::<GeneratedExperience>("I could not do that, sorry.")
            .unwrap_err();
        assert!(matches!(err, GenerationError::MalformedOutput(_)));
    }

    #[test]
    fn test_extract_broken_brackets_is_malformed() {
        let err = extract_json_array::<GeneratedExperience>("[{\"experience_id\": 1,]").unwrap_err();
        assert!(matches!(err, GenerationError::MalformedOutput(_)));
    }

    #[test]
    fn test_extract_reversed_brackets_fall_back_to_whole_text() {
        let err = extract_json_array::<GeneratedExperience>("] nothing here [").unwrap_err();
        assert!(matches!(err, GenerationError::MalformedOutput(_)));
    }

    #[test]
    fn test_extract_requires_expected_fields() {
        let raw = r#"[{"experience_id": 1, "experience_role": "x"}]"#;
        let err = extract_json_array::<GeneratedExperience>(raw).unwrap_err();
        assert!(matches!(err, GenerationError::MalformedOutput(_)));
    }

    #[test]
    fn test_lenient_id_accepts_numbers_and_strings() {
        let raw = r#"[{"project_id": 2, "project_points": []}, {"project_id": "3", "project_points": ["p"]}]"#;
        let items: Vec<GeneratedProject> = extract_json_array(raw).unwrap();
        assert_eq!(items[0].project_id, "2");
        assert_eq!(items[1].project_id, "3");
        assert!(items[0].project_skills.is_empty());
    }

    #[test]
    fn test_reconcile_experience_reattaches_stored_fields() {
        let records = vec![experience(0, "Acme", "Engineer")];
        let index = ContentIndex::build(&records).unwrap();
        let generated: Vec<GeneratedExperience> =
            extract_json_array(&format!("Here you go:\n{ARRAY}")).unwrap();

        let results = reconcile_experiences(generated, &records, &index, &[2]).unwrap();

        assert_eq!(
            results,
            vec![ExperienceResult {
                experience_id: ContentId(1),
                experience_role: "Senior Engineer".to_string(),
                resume_points: vec!["a".to_string(), "b".to_string()],
                experience_company_name: "Acme".to_string(),
                start_date: "Jan 2021".to_string(),
                end_date: "Present".to_string(),
                location: Some("Remote".to_string()),
            }]
        );
    }

    #[test]
    fn test_reconcile_accepts_integral_float_ids() {
        let records = vec![experience(0, "Acme", "Engineer"), experience(1, "Beta", "Dev")];
        let index = ContentIndex::build(&records).unwrap();
        let raw = r#"[
            {"experience_id": 1.0, "resume_points": ["a"]},
            {"experience_id": 2.5, "resume_points": ["b"]}
        ]"#;
        let generated: Vec<GeneratedExperience> = extract_json_array(raw).unwrap();
        assert_eq!(generated[0].experience_id, "1");
        assert_eq!(generated[1].experience_id, "2.5");

        let results =
            reconcile_experiences(generated[..1].to_vec(), &records, &index, &[1, 0]).unwrap();
        assert_eq!(results[0].experience_id, ContentId(1));
        assert_eq!(results[0].experience_company_name, "Acme");

        let err = reconcile_experiences(generated, &records, &index, &[1, 1]).unwrap_err();
        assert!(matches!(err, GenerationError::ReconciliationMismatch { .. }));
    }

    #[test]
    fn test_reconcile_experience_falls_back_to_stored_role() {
        let records = vec![experience(0, "Acme", "Engineer")];
        let index = ContentIndex::build(&records).unwrap();
        let generated = vec![GeneratedExperience {
            experience_id: "1".to_string(),
            experience_role: None,
            resume_points: vec![],
        }];
        let results = reconcile_experiences(generated, &records, &index, &[0]).unwrap();
        assert_eq!(results[0].experience_role, "Engineer");
        assert!(results[0].resume_points.is_empty());
    }

    #[test]
    fn test_reconcile_unknown_id_fails() {
        let records = vec![experience(0, "Acme", "Engineer")];
        let index = ContentIndex::build(&records).unwrap();
        let generated = vec![GeneratedExperience {
            experience_id: "7".to_string(),
            experience_role: Some("x".to_string()),
            resume_points: vec![],
        }];
        let err = reconcile_experiences(generated, &records, &index, &[1]).unwrap_err();
        assert!(matches!(
            err,
            GenerationError::ReconciliationMismatch { ref content_id, .. } if content_id == "7"
        ));
    }

    #[test]
    fn test_reconcile_non_numeric_id_fails() {
        let records = vec![experience(0, "Acme", "Engineer")];
        let index = ContentIndex::build(&records).unwrap();
        let generated = vec![GeneratedExperience {
            experience_id: "experience_id_from_input".to_string(),
            experience_role: None,
            resume_points: vec![],
        }];
        assert!(reconcile_experiences(generated, &records, &index, &[1]).is_err());
    }

    #[test]
    fn test_reconcile_duplicate_id_fails() {
        let records = vec![experience(0, "Acme", "Engineer"), experience(1, "Beta", "Dev")];
        let index = ContentIndex::build(&records).unwrap();
        let item = GeneratedExperience {
            experience_id: "2".to_string(),
            experience_role: None,
            resume_points: vec![],
        };
        let err =
            reconcile_experiences(vec![item.clone(), item], &records, &index, &[1, 1]).unwrap_err();
        assert!(matches!(err, GenerationError::ReconciliationMismatch { .. }));
    }

    #[test]
    fn test_reconcile_passes_through_count_drift_and_partial_output() {
        let records = vec![experience(0, "Acme", "Engineer"), experience(1, "Beta", "Dev")];
        let index = ContentIndex::build(&records).unwrap();
        let generated = vec![GeneratedExperience {
            experience_id: "2".to_string(),
            experience_role: Some("Lead Dev".to_string()),
            resume_points: vec!["only one".to_string()],
        }];
        let results = reconcile_experiences(generated, &records, &index, &[3, 3]).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].experience_company_name, "Beta");
        assert_eq!(results[0].resume_points.len(), 1);
    }

    #[test]
    fn test_reconcile_project_keeps_stored_name_and_model_skills() {
        let records = vec![project(0, "Farm Insights", &["Python"])];
        let index = ContentIndex::build(&records).unwrap();
        let raw = r#"Result: [{"project_id": 1, "project_name": "Renamed", "project_points": ["p1"], "project_skills": ["Spark", "AWS Glue"]}]"#;
        let generated: Vec<GeneratedProject> = extract_json_array(raw).unwrap();

        let results = reconcile_projects(generated, &records, &index, &[1]).unwrap();
        assert_eq!(results[0].project_id, ContentId(1));
        assert_eq!(results[0].project_name, "Farm Insights");
        assert_eq!(results[0].project_skills, vec!["Spark", "AWS Glue"]);
    }
}
