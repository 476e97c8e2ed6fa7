use std::sync::Arc;
use async_trait::async_trait;
use super::types::{AudioFile, TaskId, TaskStatusResponse};
use super::errors::Result;

/// Upload progress sink, receives a 0-100 percentage
pub type ProgressFn = Arc<dyn Fn(u8) + Send + Sync>;

/// 任务客户端 - 上传音频并查询后台任务状态
///
/// Implementations are plain I/O: no state and no retries. Retry policy
/// belongs to the poller.
#[async_trait]
pub trait TaskClient: Send + Sync {
    /// Send the payload as a single multipart request.
    ///
    /// `progress` is invoked at least once and with non-decreasing values.
    async fn submit(&self, file: AudioFile, progress: ProgressFn) -> Result<TaskId>;

    /// One best-effort status check
    async fn poll_status(&self, task_id: &TaskId) -> Result<TaskStatusResponse>;
}
