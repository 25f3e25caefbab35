//! Loads the caller's resume records and numbers them
//! for the generation call.
//!
//! A record's content id is its zero-based display order plus one. The mapping
//! between content ids and storage rows lives in `ContentIndex`, built once per
//! request; nothing else recomputes the offset.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::generation::GenerationError;

/// The 1-based identifier sent to the LLM and expected back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentId(pub u32);

impl ContentId {
    /// `None` for negative display orders, which have no content id.
    pub fn from_display_order(display_order: i32) -> Option<Self> {
        u32::try_from(display_order)
            .ok()
            .and_then(|d| d.checked_add(1))
            .map(ContentId)
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A stored, user-owned record with a storage identity and a display order.
pub trait NumberedRecord {
    fn storage_id(&self) -> Uuid;
    fn display_order(&self) -> i32;
}

#[derive(Debug, Clone, FromRow)]
pub struct ExperienceRecord {
    pub id: Uuid,
    pub experience_name: String,
    pub start_date: String,
    pub end_date: String,
    pub role: Option<String>,
    pub location: Option<String>,
    pub experience_explanation: String,
    pub display_order: i32,
}

#[derive(Debug, Clone, FromRow)]
pub struct ProjectRecord {
    pub id: Uuid,
    pub project_name: String,
    pub project_info: String,
    pub display_order: i32,
    pub skills: Vec<String>,
}

/// One category of the user's skill catalog.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
pub struct SkillGroup {
    pub category: String,
    pub skills: Vec<String>,
}

impl NumberedRecord for ExperienceRecord {
    fn storage_id(&self) -> Uuid {
        self.id
    }

    fn display_order(&self) -> i32 {
        self.display_order
    }
}

impl NumberedRecord for ProjectRecord {
    fn storage_id(&self) -> Uuid {
        self.id
    }

    fn display_order(&self) -> i32 {
        self.display_order
    }
}

/// Bidirectional lookup between content ids and the position / storage id of
/// each record in the batch.
#[derive(Debug, Clone, Default)]
pub struct ContentIndex {
    by_content_id: HashMap<ContentId, usize>,
    by_storage_id: HashMap<Uuid, ContentId>,
}

impl ContentIndex {
    /// Fails when a display order is negative or shared by two records.
    pub fn build<T: NumberedRecord>(records: &[T]) -> Result<Self, GenerationError> {
        let mut index = ContentIndex::default();

        for (position, record) in records.iter().enumerate() {
            let content_id = ContentId::from_display_order(record.display_order()).ok_or_else(
                || {
                    GenerationError::InconsistentRecords(format!(
                        "record {} has negative display order {}",
                        record.storage_id(),
                        record.display_order()
                    ))
                },
            )?;

            if index.by_content_id.insert(content_id, position).is_some() {
                return Err(GenerationError::InconsistentRecords(format!(
                    "display order {} is used by more than one record",
                    record.display_order()
                )));
            }
            index.by_storage_id.insert(record.storage_id(), content_id);
        }

        Ok(index)
    }

    pub fn position(&self, content_id: ContentId) -> Option<usize> {
        self.by_content_id.get(&content_id).copied()
    }

    pub fn content_id(&self, storage_id: Uuid) -> Option<ContentId> {
        self.by_storage_id.get(&storage_id).copied()
    }

    pub fn len(&self) -> usize {
        self.by_content_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_content_id.is_empty()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Loaders
// ────────────────────────────────────────────────────────────────────────────

pub async fn load_experiences(
    pool: &PgPool,
    user_id: Uuid,
) -> Result<Vec<ExperienceRecord>, GenerationError> {
    Ok(sqlx::query_as::<_, ExperienceRecord>(
        r#"
        SELECT id, experience_name, start_date, end_date, role, location,
               experience_explanation, display_order
        FROM experiences
        WHERE user_id = $1
        ORDER BY display_order
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?)
}

/// Projects with their skill tags. Projects without skills are kept (empty tag list).
pub async fn load_projects(
    pool: &PgPool,
    user_id: Uuid,
) -> Result<Vec<ProjectRecord>, GenerationError> {
    Ok(sqlx::query_as::<_, ProjectRecord>(
        r#"
        SELECT p.id, p.project_name, p.project_info, p.display_order,
               COALESCE(
                   array_agg(s.skill_name::text ORDER BY s.skill_name) FILTER (WHERE s.id IS NOT NULL),
                   '{}'::text[]
               ) AS skills
        FROM projects p
        LEFT JOIN project_skills ps ON ps.project_id = p.id
        LEFT JOIN skills s ON s.id = ps.skill_id
        WHERE p.user_id = $1
        GROUP BY p.id
        ORDER BY p.display_order
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?)
}

/// The user's selected skills grouped by category. Uncategorized skills land in "Other".
pub async fn load_skill_groups(
    pool: &PgPool,
    user_id: Uuid,
) -> Result<Vec<SkillGroup>, GenerationError> {
    Ok(sqlx::query_as::<_, SkillGroup>(
        r#"
        SELECT COALESCE(s.category, 'Other')::text AS category,
               array_agg(s.skill_name::text ORDER BY s.skill_name) AS skills
        FROM user_skills us
        INNER JOIN skills s ON s.id = us.skill_id
        WHERE us.user_id = $1
        GROUP BY 1
        ORDER BY 1
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?)
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn experience(display_order: i32, company: &str, role: &str) -> ExperienceRecord {
        ExperienceRecord {
            id: Uuid::new_v4(),
            experience_name: company.to_string(),
            start_date: "Jan 2021".to_string(),
            end_date: "Present".to_string(),
            role: Some(role.to_string()),
            location: Some("Remote".to_string()),
            experience_explanation: format!("Worked on platform services at {company}"),
            display_order,
        }
    }

    pub fn project(display_order: i32, name: &str, skills: &[&str]) -> ProjectRecord {
        ProjectRecord {
            id: Uuid::new_v4(),
            project_name: name.to_string(),
            project_info: format!("{name} built for farm data analysis"),
            display_order,
            skills: skills.iter().map(|s| s.to_string()).collect(),
        }
    }
}
