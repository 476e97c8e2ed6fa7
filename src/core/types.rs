use std::path::{Path, PathBuf};
use std::time::Duration;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use uuid::Uuid;
use super::errors::{Result, TaskError};

/// 上传尝试唯一标识
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct AttemptId(Uuid);

impl AttemptId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AttemptId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for AttemptId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Server assigned task identifier, opaque to the client
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TaskId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Tag carried by every piece of asynchronous work. A completion whose
/// generation is no longer the active one is dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Generation(pub(crate) u64);

impl std::fmt::Display for Generation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// 上传状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    /// 空闲，可以选择文件
    Idle,
    /// 上传中
    Uploading,
    /// 服务端处理中
    Processing,
    /// 已完成
    Success,
    /// 失败
    Error,
}

impl UploadStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, UploadStatus::Success | UploadStatus::Error)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UploadStatus::Idle => "idle",
            UploadStatus::Uploading => "uploading",
            UploadStatus::Processing => "processing",
            UploadStatus::Success => "success",
            UploadStatus::Error => "error",
        }
    }
}

impl std::fmt::Display for UploadStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AudioSource {
    Path(PathBuf),
    Memory(Bytes),
}

/// The binary payload of an upload. Nothing is read until the upload starts.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFile {
    pub file_name: String,
    pub mime_type: String,
    pub size: u64,
    pub source: AudioSource,
}

impl AudioFile {
    pub async fn from_path(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let metadata = tokio::fs::metadata(&path).await?;
        if !metadata.is_file() {
            return Err(TaskError::Validation(format!("Not a file: {}", path.display())));
        }

        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| TaskError::Validation(format!("Invalid file name: {}", path.display())))?
            .to_string();

        Ok(Self {
            mime_type: guess_mime_type(&path).to_string(),
            file_name,
            size: metadata.len(),
            source: AudioSource::Path(path),
        })
    }

    pub fn from_bytes(file_name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        let file_name = file_name.into();
        let data = data.into();

        Self {
            mime_type: guess_mime_type(Path::new(&file_name)).to_string(),
            file_name,
            size: data.len() as u64,
            source: AudioSource::Memory(data),
        }
    }
}

fn guess_mime_type(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());

    match extension.as_deref() {
        Some("mp3") => "audio/mpeg",
        Some("wav") => "audio/wav",
        Some("m4a") | Some("mp4") => "audio/mp4",
        Some("ogg") | Some("oga") => "audio/ogg",
        Some("webm") => "audio/webm",
        Some("flac") => "audio/flac",
        Some("aac") => "audio/aac",
        _ => "application/octet-stream",
    }
}

/// One user initiated submission
#[derive(Debug, Clone, PartialEq)]
pub struct UploadAttempt {
    pub id: AttemptId,
    pub selected_file: Option<AudioFile>,
    pub status: UploadStatus,
    /// 0-100, only meaningful while uploading
    pub upload_progress: u8,
    pub task_id: Option<TaskId>,
    pub result_link: Option<String>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl UploadAttempt {
    pub fn new() -> Self {
        Self {
            id: AttemptId::new(),
            selected_file: None,
            status: UploadStatus::Idle,
            upload_progress: 0,
            task_id: None,
            result_link: None,
            error_message: None,
            created_at: Utc::now(),
            submitted_at: None,
            finished_at: None,
        }
    }
}

impl Default for UploadAttempt {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Success,
    Failure,
    /// Anything else the backend may report; handled like `Pending`
    #[serde(other)]
    Unknown,
}

/// `GET /task_status/{task_id}`
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TaskStatusResponse {
    pub status: TaskStatus,
    #[serde(default)]
    pub log_url: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
}

impl TaskStatusResponse {
    pub fn pending() -> Self {
        Self { status: TaskStatus::Pending, log_url: None, error_message: None }
    }

    pub fn success(log_url: impl Into<String>) -> Self {
        Self { status: TaskStatus::Success, log_url: Some(log_url.into()), error_message: None }
    }

    pub fn failure(error_message: impl Into<String>) -> Self {
        Self { status: TaskStatus::Failure, log_url: None, error_message: Some(error_message.into()) }
    }
}

/// `POST /upload_audio`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UploadResponse {
    pub task_id: TaskId,
}

#[derive(Debug, Clone, PartialEq)]
pub enum UploadEvent {
    /// 状态变更
    StateChanged {
        attempt_id: AttemptId,
        old_status: UploadStatus,
        new_status: UploadStatus,
    },

    /// 上传进度
    Progress {
        attempt_id: AttemptId,
        percent: u8,
    },

    /// 服务端处理完成
    Completed {
        attempt_id: AttemptId,
        task_id: TaskId,
        result_link: String,
    },

    /// 任务失败
    Failed {
        attempt_id: AttemptId,
        error: String,
    },

    /// Attempt discarded, either dismissed or by the reset delay
    Reset {
        attempt_id: AttemptId,
    },
}

/// 上传管理器命令
pub(crate) enum ManagerCommand {
    SelectFile {
        file: AudioFile,
        reply: oneshot::Sender<AttemptId>,
    },

    Submit {
        reply: oneshot::Sender<Result<AttemptId>>,
    },

    Dismiss {
        reply: oneshot::Sender<Result<()>>,
    },

    GetAttempt {
        reply: oneshot::Sender<UploadAttempt>,
    },

    /// Tear down: cancels the submit, the poller and the reset delay
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

#[derive(Debug, Clone)]
pub struct UploadConfig {
    /// 状态轮询间隔
    pub poll_interval: Duration,

    /// 终态后自动重置的延迟
    pub reset_delay: Duration,

    /// Consecutive transport failures while polling that are absorbed as
    /// `pending`. Zero makes the first one fatal.
    pub max_poll_failures: u32,

    /// 事件广播缓存大小
    pub event_capacity: usize,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(3),
            reset_delay: Duration::from_secs(25),
            max_poll_failures: 0,
            event_capacity: 256,
        }
    }
}
