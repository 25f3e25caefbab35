// Job applications and their uploaded resume files.

pub mod handlers;
pub mod resume_file;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::application::{ApplicationRow, ApplicationStatus, RecentApplication};

pub const DEFAULT_LIMIT: i64 = 10;
pub const MAX_LIMIT: i64 = 100;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationQuery {
    pub id: Option<Uuid>,
    pub status: Option<String>,
    pub company: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

/// Resolved list parameters. Column and direction come from a fixed set, so
/// `order_by` is safe to splice into SQL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListParams {
    pub status: Option<String>,
    pub company: Option<String>,
    pub limit: i64,
    pub offset: i64,
    pub order_by: String,
}

impl ApplicationQuery {
    pub fn list_params(&self) -> ListParams {
        let column = match self.sort_by.as_deref() {
            Some("jobName") => "job_name",
            Some("companyName") => "company_name",
            Some("status") => "status",
            _ => "created_at",
        };
        let direction = match self.sort_order.as_deref() {
            Some("asc") => "ASC",
            _ => "DESC",
        };

        ListParams {
            status: self.status.clone().filter(|s| !s.is_empty()),
            company: self.company.clone().filter(|c| !c.is_empty()),
            limit: self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT),
            offset: self.offset.unwrap_or(0).max(0),
            order_by: format!("{column} {direction}, id"),
        }
    }
}

impl ListParams {
    /// 1-based page the offset falls on.
    pub fn page(&self) -> i64 {
        self.offset / self.limit + 1
    }
}

#[derive(Debug, Serialize)]
pub struct ApplicationPage {
    pub applications: Vec<ApplicationRow>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
}

#[derive(Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSummary {
    pub total: i64,
    pub by_status: BTreeMap<&'static str, i64>,
    pub success_rate: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationStats {
    #[serde(flatten)]
    pub summary: StatusSummary,
    pub recent_applications: Vec<RecentApplication>,
}

/// Folds per-status counts into totals. Every known status is present in
/// `by_status`; the success rate is a percentage rounded to two decimals.
pub fn summarize(counts: &[(String, i64)]) -> StatusSummary {
    let mut by_status: BTreeMap<&'static str, i64> = ApplicationStatus::ALL
        .into_iter()
        .map(|s| (s.as_str(), 0))
        .collect();
    let mut total = 0;
    let mut successful = 0;

    for (status, count) in counts {
        total += count;
        if let Some(known) = ApplicationStatus::parse(status) {
            *by_status.entry(known.as_str()).or_default() += count;
            if known.is_success() {
                successful += count;
            }
        }
    }

    let success_rate = if total > 0 {
        (successful as f64 / total as f64 * 10_000.0).round() / 100.0
    } else {
        0.0
    };

    StatusSummary {
        total,
        by_status,
        success_rate,
    }
}
