//! Read endpoints consumed by the dashboard views. Fetch and decode only.

use serde_json::Value;
use crate::core::{Result, TaskError};
use super::ScrumBotClient;
use super::models::{Ping, SprintReport, VoiceLog};

impl ScrumBotClient {
    pub async fn ping(&self) -> Result<Ping> {
        self.get_json(self.endpoint(&["ping"])?).await
    }

    /// All voice logs. The backend answers 404 when there are none.
    pub async fn logs(&self) -> Result<Vec<VoiceLog>> {
        match self.get_json(self.endpoint(&["logs"])?).await {
            Err(TaskError::Server { status_code: 404, .. }) => Ok(Vec::new()),
            other => other,
        }
    }

    pub async fn log(&self, log_id: i64) -> Result<VoiceLog> {
        let id = log_id.to_string();
        self.get_json(self.endpoint(&["logs", &id])?).await
    }

    /// Latest cached trend analysis, shape owned by the backend
    pub async fn latest_trends(&self) -> Result<Value> {
        self.get_json(self.endpoint(&["trends", "latest"])?).await
    }

    pub async fn report(&self, days: u32) -> Result<SprintReport> {
        let mut url = self.endpoint(&["report"])?;
        url.query_pairs_mut().append_pair("days", &days.to_string());
        self.get_json(url).await
    }

    pub async fn insights(&self) -> Result<Value> {
        self.get_json(self.endpoint(&["trends", "insights"])?).await
    }
}
