mod models;
mod progress_stream;
mod reads;
mod upload;

pub use models::{Ping, SprintReport, VoiceLog, log_id_from_link};
pub use progress_stream::ProgressStream;

use std::io;
use std::pin::Pin;
use std::time::Duration;
use bytes::Bytes;
use futures::Stream;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use tokio::fs::File;
use tokio_util::io::ReaderStream;
use tracing::debug;
use url::Url;
use crate::config::Config;
use crate::core::{AudioSource, Result, TaskError};

/// Request body stream, `Sync` so reqwest can wrap it
pub type ByteStream = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send + Sync>>;

const MEMORY_CHUNK_SIZE: usize = 64 * 1024;
const MAX_ERROR_BODY: usize = 200;

/// HTTP client for the ScrumBot backend
#[derive(Debug, Clone)]
pub struct ScrumBotClient {
    client: Client,
    base_url: Url,
}

impl ScrumBotClient {
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_timeout(base_url, Duration::from_secs(300))
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|err| TaskError::Config(format!("Invalid url {:?}: {}", base_url, err)))?;
        if base_url.cannot_be_a_base() {
            return Err(TaskError::Config(format!("Url cannot be a base: {}", base_url)));
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| TaskError::Config(err.to_string()))?;

        Ok(Self { client, base_url })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::with_timeout(&config.base_url, config.request_timeout())
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Links returned by the backend are relative to the api root
    pub fn resolve_link(&self, link: &str) -> String {
        if link.starts_with("http://") || link.starts_with("https://") {
            return link.to_string();
        }

        let segments: Vec<&str> = link.split('/').filter(|segment| !segment.is_empty()).collect();
        self.endpoint(&segments)
            .map(|url| url.to_string())
            .unwrap_or_else(|_| link.to_string())
    }

    pub(crate) fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| TaskError::Config(format!("Url cannot be a base: {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);

        Ok(url)
    }

    pub(crate) async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        debug!(%url, "GET");
        let response = self.client.get(url).send().await?;
        let response = error_for_status(response).await?;

        Ok(response.json().await?)
    }
}

/// Non 2xx responses become `TaskError::Server`
pub(crate) async fn error_for_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(TaskError::server_error(status.as_u16(), server_message(status, &body)))
}

/// FastAPI reports errors as `{"detail": ...}`
fn server_message(status: StatusCode, body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        match value.get("detail") {
            Some(serde_json::Value::String(detail)) => return detail.clone(),
            Some(detail) => return detail.to_string(),
            None => {}
        }
    }

    let body = body.trim();
    if !body.is_empty() {
        return body.chars().take(MAX_ERROR_BODY).collect();
    }

    status
        .canonical_reason()
        .map(String::from)
        .unwrap_or_else(|| status.to_string())
}

pub(crate) async fn open_body(source: AudioSource) -> Result<ByteStream> {
    match source {
        AudioSource::Path(path) => {
            let file = File::open(&path).await?;
            Ok(Box::pin(ReaderStream::new(file)))
        }
        AudioSource::Memory(data) => {
            let chunks: Vec<io::Result<Bytes>> = (0..data.len())
                .step_by(MEMORY_CHUNK_SIZE)
                .map(|start| Ok(data.slice(start..(start + MEMORY_CHUNK_SIZE).min(data.len()))))
                .collect();
            Ok(Box::pin(futures::stream::iter(chunks)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[test]
    fn test_endpoint_joining() {
        let client = ScrumBotClient::new("http://localhost:8000/api").unwrap();
        assert_eq!(
            client.endpoint(&["task_status", "a b/c"]).unwrap().as_str(),
            "http://localhost:8000/api/task_status/a%20b%2Fc"
        );

        let client = ScrumBotClient::new("http://localhost:8000/api/").unwrap();
        assert_eq!(
            client.endpoint(&["upload_audio"]).unwrap().as_str(),
            "http://localhost:8000/api/upload_audio"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(matches!(ScrumBotClient::new("not a url"), Err(TaskError::Config(_))));
        assert!(matches!(ScrumBotClient::new("mailto:team@example.com"), Err(TaskError::Config(_))));
    }

    #[test]
    fn test_resolve_link() {
        let client = ScrumBotClient::new("http://localhost:8000/api").unwrap();
        assert_eq!(client.resolve_link("/logs/12"), "http://localhost:8000/api/logs/12");
        assert_eq!(client.resolve_link("https://x/1"), "https://x/1");
    }

    #[test]
    fn test_server_message() {
        assert_eq!(
            server_message(StatusCode::NOT_FOUND, r#"{"detail":"Job not found: T1"}"#),
            "Job not found: T1"
        );
        assert_eq!(server_message(StatusCode::BAD_GATEWAY, "upstream down\n"), "upstream down");
        assert_eq!(server_message(StatusCode::SERVICE_UNAVAILABLE, ""), "Service Unavailable");
    }

    #[tokio::test]
    async fn test_memory_body_is_chunked() {
        let data = Bytes::from(vec![7u8; MEMORY_CHUNK_SIZE * 2 + 10]);
        let chunks: Vec<_> = open_body(AudioSource::Memory(data)).await.unwrap().collect().await;

        let sizes: Vec<usize> = chunks.into_iter().map(|chunk| chunk.unwrap().len()).collect();
        assert_eq!(sizes, vec![MEMORY_CHUNK_SIZE, MEMORY_CHUNK_SIZE, 10]);
    }
}
