use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

// Rows are serialized straight into API responses (camelCase).

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct BasicInfoRow {
    pub id: Uuid,
    pub full_name: String,
    pub phone_number: String,
    pub email: String,
    pub linkedin_url: Option<String>,
    pub github_url: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct AcademicRow {
    pub id: Uuid,
    pub college_name: String,
    pub graduation_date: String,
    pub course: String,
    pub display_order: i32,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct AchievementRow {
    pub id: Uuid,
    pub achievement_point: String,
    pub display_order: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct SkillRow {
    pub id: Uuid,
    pub skill_name: String,
    pub category: Option<String>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ExperienceRow {
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
pub struct ProjectRow {
    pub id: Uuid,
    pub project_name: String,
    pub project_info: String,
    pub display_order: i32,
}

/// A project with its linked skills, as returned by the API.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectWithSkills {
    pub id: Uuid,
    pub project_name: String,
    pub project_info: String,
    pub display_order: i32,
    pub skills: Vec<SkillRow>,
}

impl ProjectWithSkills {
    pub fn new(row: ProjectRow, skills: Vec<SkillRow>) -> Self {
        Self {
            id: row.id,
            project_name: row.project_name,
            project_info: row.project_info,
            display_order: row.display_order,
            skills,
        }
    }
}

/// A project-skill link joined with the skill, used to batch-load project skills.
#[derive(Debug, Clone, FromRow)]
pub struct ProjectSkillRow {
    pub project_id: Uuid,
    pub id: Uuid,
    pub skill_name: String,
    pub category: Option<String>,
}

impl From<ProjectSkillRow> for SkillRow {
    fn from(row: ProjectSkillRow) -> Self {
        Self {
            id: row.id,
            skill_name: row.skill_name,
            category: row.category,
        }
    }
}
