pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::applicant::{
    academics, achievements, basic_info, complete, experiences, projects, skills,
};
use crate::applications::{handlers as applications, resume_file};
use crate::auth::handlers as auth;
use crate::generation::handlers as analyzer;
use crate::state::AppState;

/// Multipart overhead on top of the largest accepted resume.
const RESUME_BODY_LIMIT: usize = resume_file::MAX_RESUME_BYTES + 2 * 1024 * 1024;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Auth
        .route("/auth/signup", post(auth::handle_signup))
        .route("/auth/login", post(auth::handle_login))
        .route("/auth/logout", post(auth::handle_logout))
        .route("/auth/me", get(auth::handle_me))
        .route("/auth/verify-email/:key", get(auth::handle_verify_email))
        .route(
            "/auth/resend-verification",
            post(auth::handle_resend_verification),
        )
        .route("/auth/password/reset", post(auth::handle_password_reset))
        .route(
            "/auth/password/reset/confirm",
            post(auth::handle_password_reset_confirm),
        )
        .route("/auth/token/refresh", post(auth::handle_token_refresh))
        // Applicant info
        .route(
            "/api/applicant-info/basic",
            get(basic_info::handle_get_basic_info).post(basic_info::handle_save_basic_info),
        )
        .route(
            "/api/applicant-info/academics",
            get(academics::handle_get_academics).post(academics::handle_academic_action),
        )
        .route(
            "/api/applicant-info/achievements",
            get(achievements::handle_get_achievements)
                .post(achievements::handle_achievement_action),
        )
        .route(
            "/api/applicant-info/skills",
            get(skills::handle_get_user_skills).post(skills::handle_user_skill_action),
        )
        .route(
            "/api/applicant-info/projects",
            get(projects::handle_get_projects).post(projects::handle_project_action),
        )
        .route(
            "/api/applicant-info/experiences",
            get(experiences::handle_get_experiences).post(experiences::handle_experience_action),
        )
        .route(
            "/api/applicant-info/complete",
            get(complete::handle_get_complete),
        )
        .route(
            "/api/skills",
            get(skills::handle_list_skills).post(skills::handle_create_skill),
        )
        // Applications
        .route(
            "/api/applications",
            get(applications::handle_get_applications)
                .post(applications::handle_application_action),
        )
        .route(
            "/api/applications/stats",
            get(applications::handle_application_stats),
        )
        .route(
            "/api/resume",
            get(resume_file::handle_download_resume)
                .post(resume_file::handle_resume_action)
                .delete(resume_file::handle_delete_resume)
                .layer(DefaultBodyLimit::max(RESUME_BODY_LIMIT)),
        )
        // Analyzer
        .route(
            "/analyzer/experience-gen",
            post(analyzer::handle_experience_generation),
        )
        .route(
            "/analyzer/project-gen",
            post(analyzer::handle_project_generation),
        )
        .route("/analyzer/skill-gen", post(analyzer::handle_skill_generation))
        .with_state(state)
}
