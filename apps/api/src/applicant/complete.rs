use axum::{
    extract::State,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::applicant::{academics, achievements, basic_info, experiences, projects, skills};
use crate::auth::extractor::AuthUser;
use crate::errors::AppError;
use crate::models::applicant::{
    AcademicRow, AchievementRow, BasicInfoRow, ExperienceRow, ProjectWithSkills, SkillRow,
};
use crate::response::Envelope;
use crate::state::AppState;

/// Every applicant section in one document.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteApplicantInfo {
    pub basic_information: Option<BasicInfoRow>,
    pub academics: Vec<AcademicRow>,
    pub achievements: Vec<AchievementRow>,
    pub skills: Vec<SkillRow>,
    pub projects: Vec<ProjectWithSkills>,
    pub experiences: Vec<ExperienceRow>,
}

/// GET /api/applicant-info/complete
pub async fn handle_get_complete(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Response, AppError> {
    let pool = &state.db;
    let (basic_information, academics, achievements, skills, projects, experiences) = tokio::try_join!(
        basic_info::find_basic_info(pool, user.user_id),
        academics::list_academics(pool, user.user_id),
        achievements::list_achievements(pool, user.user_id),
        skills::list_user_skills(pool, user.user_id),
        projects::list_projects(pool, user.user_id),
        experiences::list_experiences(pool, user.user_id),
    )?;

    Ok(Envelope::data(CompleteApplicantInfo {
        basic_information,
        academics,
        achievements,
        skills,
        projects,
        experiences,
    })
    .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_profile_shape() {
        let value = serde_json::to_value(CompleteApplicantInfo {
            basic_information: None,
            academics: vec![],
            achievements: vec![],
            skills: vec![],
            projects: vec![],
            experiences: vec![],
        })
        .unwrap();
        assert!(value["basicInformation"].is_null());
        assert_eq!(value["experiences"], serde_json::json!([]));
        assert!(value.get("basic_information").is_none());
    }
}
