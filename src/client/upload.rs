use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Body, StatusCode};
use tracing::{debug, info};
use crate::core::{
    AudioFile, ProgressFn, Result, TaskClient, TaskError, TaskId, TaskStatusResponse, UploadResponse,
};
use crate::utils::PercentTracker;
use super::progress_stream::ProgressStream;
use super::{ScrumBotClient, error_for_status, open_body, server_message};

#[async_trait]
impl TaskClient for ScrumBotClient {
    async fn submit(&self, file: AudioFile, progress: ProgressFn) -> Result<TaskId> {
        let url = self.endpoint(&["upload_audio"])?;
        let AudioFile { file_name, mime_type, size, source } = file;

        let stream = open_body(source).await?;
        let body = Body::wrap_stream(ProgressStream::new(stream, PercentTracker::new(size, progress)));
        let part = Part::stream_with_length(body, size)
            .file_name(file_name.clone())
            .mime_str(&mime_type)
            .map_err(|err| TaskError::Validation(format!("Invalid mime type {}: {}", mime_type, err)))?;
        let form = Form::new().part("file", part);

        debug!(%url, file = %file_name, size, "uploading audio");
        let response = self.client.post(url).multipart(form).send().await?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(TaskError::server_error(status.as_u16(), server_message(status, &body)));
        }

        let UploadResponse { task_id } = response.json().await?;
        info!(%task_id, file = %file_name, "upload accepted");

        Ok(task_id)
    }

    async fn poll_status(&self, task_id: &TaskId) -> Result<TaskStatusResponse> {
        let url = self.endpoint(&["task_status", task_id.as_str()])?;
        let response = self.client.get(url).send().await?;
        let response = error_for_status(response).await?;

        Ok(response.json().await?)
    }
}
