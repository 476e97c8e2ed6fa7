pub mod core;
pub mod client;
pub mod utils;
pub mod config;
pub mod shell;

// 重新导出核心类型
pub use self::core::{
    AttemptId,
    AudioFile,
    TaskClient,
    TaskError,
    TaskId,
    TaskStatus,
    TaskStatusResponse,
    UploadAttempt,
    UploadConfig,
    UploadEvent,
    UploadManager,
    UploadManagerHandle,
    UploadStatus,
    Result,
};

pub use client::ScrumBotClient;
pub use config::Config;
