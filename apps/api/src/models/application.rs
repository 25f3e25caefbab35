use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// Lifecycle of a job application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplicationStatus {
    Applied,
    Rejected,
    TimedOut,
    Processed,
    Accepted,
    Interview,
}

impl ApplicationStatus {
    pub const ALL: [ApplicationStatus; 6] = [
        ApplicationStatus::Applied,
        ApplicationStatus::Rejected,
        ApplicationStatus::TimedOut,
        ApplicationStatus::Processed,
        ApplicationStatus::Accepted,
        ApplicationStatus::Interview,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ApplicationStatus::Applied => "Applied",
            ApplicationStatus::Rejected => "Rejected",
            ApplicationStatus::TimedOut => "Timed out",
            ApplicationStatus::Processed => "Processed",
            ApplicationStatus::Accepted => "Accepted",
            ApplicationStatus::Interview => "Interview",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == value)
    }

    /// Counted towards the success rate.
    pub fn is_success(self) -> bool {
        matches!(self, ApplicationStatus::Accepted | ApplicationStatus::Interview)
    }

    /// "Applied, Rejected, ..." for validation messages.
    pub fn choices() -> String {
        Self::ALL.map(Self::as_str).join(", ")
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationRow {
    pub id: Uuid,
    pub job_name: String,
    pub company_name: String,
    pub job_link: String,
    pub resume_file_path: Option<String>,
    pub status: String,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct RecentApplication {
    pub id: Uuid,
    pub job_name: String,
    pub company_name: String,
    pub status: String,
}
