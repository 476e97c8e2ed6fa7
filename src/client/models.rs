use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// A processed standup, `GET /logs/{id}`
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct VoiceLog {
    pub id: i64,
    pub filename: String,
    pub transcript: String,
    pub summary: String,
    pub emotion: String,
    #[serde(default)]
    pub jira_issue_url: Option<String>,
    #[serde(default)]
    pub progress: Vec<String>,
    #[serde(default)]
    pub next_steps: Vec<String>,
    #[serde(default)]
    pub blockers: Vec<String>,
    #[serde(default)]
    pub created_at: Option<NaiveDateTime>,
}

/// `GET /report?days=n`
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SprintReport {
    pub markdown_report: String,
}

/// `GET /ping`
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Ping {
    pub status: String,
}

/// Extract the log id from a result link such as `/logs/42`
pub fn log_id_from_link(link: &str) -> Option<i64> {
    let mut segments = link.trim_end_matches('/').rsplit('/');
    let id = segments.next()?.parse().ok()?;

    match segments.next() {
        Some("logs") => Some(id),
        _ => None,
    }
}
