mod errors;
mod machine;
mod manager;
mod manager_worker;
mod poller;
mod timer;
mod traits;
mod types;

pub use errors::{Result, TaskError};
pub use machine::{Effect, Input, UploadStateMachine, NO_FILE_SELECTED};
pub use manager::{UploadManager, UploadManagerHandle};
pub use poller::Poller;
pub use timer::{DelayedTask, TaskGuard};
pub use traits::{ProgressFn, TaskClient};
pub use types::{
    AttemptId, AudioFile, AudioSource, Generation, TaskId, TaskStatus, TaskStatusResponse,
    UploadAttempt, UploadConfig, UploadEvent, UploadResponse, UploadStatus,
};
