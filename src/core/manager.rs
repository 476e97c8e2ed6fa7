use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use super::errors::{Result, TaskError};
use super::manager_worker::UploadManagerWorker;
use super::traits::TaskClient;
use super::types::{AttemptId, AudioFile, ManagerCommand, UploadAttempt, UploadConfig, UploadEvent};

/// Handle to the upload workflow. Cheap to clone, every clone talks to the
/// same worker which owns the single [`UploadAttempt`].
#[derive(Clone)]
pub struct UploadManager {
    command_tx: mpsc::Sender<ManagerCommand>,
    event_tx: broadcast::Sender<UploadEvent>,
}

/// 上传管理器句柄 - 包含管理器和工作线程
pub struct UploadManagerHandle {
    pub manager: UploadManager,
    pub worker_handle: JoinHandle<()>,
}

impl UploadManagerHandle {
    /// Cancel everything still pending and wait for the worker to exit
    pub async fn shutdown(self) -> Result<()> {
        // 工作线程可能已经退出
        let _ = self.manager.shutdown().await;
        drop(self.manager);

        self.worker_handle
            .await
            .map_err(|err| TaskError::internal(format!("upload manager worker failed: {}", err)))
    }
}

impl UploadManager {
    pub fn new(client: Arc<dyn TaskClient>, config: UploadConfig) -> UploadManagerHandle {
        let (command_tx, command_rx) = mpsc::channel(32);
        let (event_tx, _) = broadcast::channel(config.event_capacity.max(1));

        let worker_handle = tokio::spawn(UploadManagerWorker::run(
            client,
            config,
            command_rx,
            event_tx.clone(),
        ));

        let manager = Self {
            command_tx,
            event_tx,
        };

        UploadManagerHandle {
            manager,
            worker_handle,
        }
    }

    /// Select the file for the next submission. Abandons whatever the
    /// current attempt still has in flight.
    pub async fn select_file(&self, file: AudioFile) -> Result<AttemptId> {
        self.request(|reply| ManagerCommand::SelectFile { file, reply }).await
    }

    /// Start uploading the selected file
    pub async fn submit(&self) -> Result<AttemptId> {
        self.request(|reply| ManagerCommand::Submit { reply }).await?
    }

    /// Close the success/error notice
    pub async fn dismiss(&self) -> Result<()> {
        self.request(|reply| ManagerCommand::Dismiss { reply }).await?
    }

    /// Snapshot of the current attempt
    pub async fn attempt(&self) -> Result<UploadAttempt> {
        self.request(|reply| ManagerCommand::GetAttempt { reply }).await
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.request(|reply| ManagerCommand::Shutdown { reply }).await
    }

    /// 订阅事件
    ///
    /// A slow subscriber may see `RecvError::Lagged`; state can always be
    /// re-read with [`UploadManager::attempt`].
    pub fn subscribe_events(&self) -> broadcast::Receiver<UploadEvent> {
        self.event_tx.subscribe()
    }

    async fn request<T, F>(&self, command: F) -> Result<T>
    where
        F: FnOnce(oneshot::Sender<T>) -> ManagerCommand,
    {
        let (reply_tx, reply_rx) = oneshot::channel();

        self.command_tx
            .send(command(reply_tx))
            .await
            .map_err(|_| TaskError::ManagerShutdown)?;

        reply_rx.await.map_err(|_| TaskError::ManagerShutdown)
    }
}
