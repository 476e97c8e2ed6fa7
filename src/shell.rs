//! Text rendering for the command line shell. Everything here is derived
//! from [`UploadEvent`]s, the shell keeps no state of its own.

use crate::core::{UploadEvent, UploadStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub severity: Severity,
    pub text: String,
}

impl Notice {
    fn new(severity: Severity, text: impl Into<String>) -> Self {
        Self { severity, text: text.into() }
    }
}

/// Line to show for an event, `None` for progress which is drawn as a bar
pub fn notice_for<F>(event: &UploadEvent, resolve_link: F) -> Option<Notice>
where
    F: Fn(&str) -> String,
{
    match event {
        UploadEvent::StateChanged { new_status: UploadStatus::Uploading, .. } => {
            Some(Notice::new(Severity::Info, "Uploading..."))
        }
        UploadEvent::StateChanged { new_status: UploadStatus::Processing, .. } => {
            Some(Notice::new(Severity::Info, "Processing..."))
        }
        UploadEvent::StateChanged { .. } | UploadEvent::Progress { .. } => None,
        UploadEvent::Completed { result_link, .. } => Some(Notice::new(
            Severity::Success,
            format!("Upload successful! View log: {}", resolve_link(result_link)),
        )),
        UploadEvent::Failed { error, .. } => Some(Notice::new(Severity::Error, error.clone())),
        UploadEvent::Reset { .. } => Some(Notice::new(Severity::Info, "Ready for the next standup.")),
    }
}

pub fn progress_bar(percent: u8, width: usize) -> String {
    let percent = percent.min(100) as usize;
    let filled = percent * width / 100;

    format!("[{}{}] {:>3}%", "#".repeat(filled), " ".repeat(width - filled), percent)
}
