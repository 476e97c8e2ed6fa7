//! Upload state machine.
//!
//! `idle -> uploading -> processing -> {success | error} -> idle`
//!
//! The machine owns the [`UploadAttempt`] and never performs I/O. Every
//! transition returns the [`Effect`]s the manager worker has to carry out,
//! and every asynchronous completion comes back in as an [`Input`] tagged
//! with the [`Generation`] it was started under. A tag that is no longer the
//! active one for its slot is a no-op.

use chrono::Utc;
use tracing::{debug, info, warn};
use super::errors::{Result, TaskError};
use super::types::{
    AudioFile, Generation, TaskId, TaskStatus, TaskStatusResponse, UploadAttempt, UploadEvent,
    UploadStatus,
};

pub const NO_FILE_SELECTED: &str = "no file selected";

/// Completions delivered by the submit task, the poller and the reset delay
#[derive(Debug)]
pub enum Input {
    Progress {
        generation: Generation,
        percent: u8,
    },
    Submitted {
        generation: Generation,
        result: Result<TaskId>,
    },
    Polled {
        generation: Generation,
        result: Result<TaskStatusResponse>,
    },
    ResetElapsed {
        generation: Generation,
    },
}

/// Work requested by a transition
#[derive(Debug, PartialEq)]
pub enum Effect {
    StartSubmit {
        generation: Generation,
        file: AudioFile,
    },
    AbortSubmit,
    StartPoller {
        generation: Generation,
        task_id: TaskId,
    },
    StopPoller,
    ScheduleReset {
        generation: Generation,
    },
    CancelReset,
    Emit(UploadEvent),
}

pub struct UploadStateMachine {
    attempt: UploadAttempt,
    next_generation: u64,
    submit_generation: Option<Generation>,
    poll_generation: Option<Generation>,
    reset_generation: Option<Generation>,
    max_poll_failures: u32,
    poll_failures: u32,
}

impl UploadStateMachine {
    pub fn new(max_poll_failures: u32) -> Self {
        Self {
            attempt: UploadAttempt::new(),
            next_generation: 0,
            submit_generation: None,
            poll_generation: None,
            reset_generation: None,
            max_poll_failures,
            poll_failures: 0,
        }
    }

    pub fn attempt(&self) -> &UploadAttempt {
        &self.attempt
    }

    pub fn status(&self) -> UploadStatus {
        self.attempt.status
    }

    /// A new selection always starts from a clean idle attempt. Whatever the
    /// previous attempt still had in flight is abandoned.
    pub fn select_file(&mut self, file: AudioFile) -> Vec<Effect> {
        let mut effects = Vec::new();
        self.cancel_all(&mut effects);

        let old_status = self.attempt.status;
        self.attempt = UploadAttempt::new();
        self.attempt.selected_file = Some(file);
        debug!(attempt_id = %self.attempt.id, "file selected");

        if old_status != UploadStatus::Idle {
            effects.push(self.state_changed(old_status));
        }

        effects
    }

    /// Start uploading the selected file. From `success` or `error` the same
    /// file is sent again as a fresh attempt, it stays selected until reset.
    pub fn submit(&mut self) -> Result<Vec<Effect>> {
        // 服务端任务仍在进行，不能丢弃
        if matches!(self.attempt.status, UploadStatus::Uploading | UploadStatus::Processing) {
            return Err(TaskError::InvalidTransition {
                action: "submit",
                status: self.attempt.status,
            });
        }

        let mut effects = Vec::new();
        self.cancel_all(&mut effects);

        let old_status = self.attempt.status;
        if old_status != UploadStatus::Idle {
            let selected_file = self.attempt.selected_file.take();
            self.attempt = UploadAttempt::new();
            self.attempt.selected_file = selected_file;
        }

        let Some(file) = self.attempt.selected_file.clone() else {
            self.finish_error(old_status, NO_FILE_SELECTED.to_string(), &mut effects);
            return Ok(effects);
        };

        let generation = self.next_generation();
        self.submit_generation = Some(generation);
        self.attempt.status = UploadStatus::Uploading;
        self.attempt.upload_progress = 0;
        self.attempt.submitted_at = Some(Utc::now());
        info!(attempt_id = %self.attempt.id, file = %file.file_name, size = file.size, "upload started");

        effects.push(Effect::StartSubmit { generation, file });
        effects.push(self.state_changed(old_status));

        Ok(effects)
    }

    /// Close the result notice before the reset delay runs out
    pub fn dismiss(&mut self) -> Result<Vec<Effect>> {
        if !self.attempt.status.is_terminal() {
            return Err(TaskError::InvalidTransition {
                action: "dismiss",
                status: self.attempt.status,
            });
        }

        let mut effects = Vec::new();
        self.cancel_all(&mut effects);
        self.reset(&mut effects);

        Ok(effects)
    }

    /// View teardown. State is left as is, all outstanding work is cancelled.
    pub fn shutdown(&mut self) -> Vec<Effect> {
        let mut effects = Vec::new();
        self.cancel_all(&mut effects);
        effects
    }

    pub fn handle(&mut self, input: Input) -> Vec<Effect> {
        match input {
            Input::Progress { generation, percent } => self.on_progress(generation, percent),
            Input::Submitted { generation, result } => self.on_submitted(generation, result),
            Input::Polled { generation, result } => self.on_polled(generation, result),
            Input::ResetElapsed { generation } => self.on_reset_elapsed(generation),
        }
    }

    fn on_progress(&mut self, generation: Generation, percent: u8) -> Vec<Effect> {
        if self.submit_generation != Some(generation) || self.attempt.status != UploadStatus::Uploading {
            return Vec::new();
        }

        let percent = percent.min(100);
        if percent <= self.attempt.upload_progress {
            return Vec::new();
        }

        self.attempt.upload_progress = percent;
        vec![Effect::Emit(UploadEvent::Progress {
            attempt_id: self.attempt.id,
            percent,
        })]
    }

    fn on_submitted(&mut self, generation: Generation, result: Result<TaskId>) -> Vec<Effect> {
        if self.submit_generation != Some(generation) || self.attempt.status != UploadStatus::Uploading {
            debug!(%generation, "discarding stale submit result");
            return Vec::new();
        }
        self.submit_generation = None;

        let mut effects = Vec::new();
        match result {
            Ok(task_id) => {
                // 同一次尝试只允许设置一次 task_id
                if self.attempt.task_id.is_some() {
                    warn!(attempt_id = %self.attempt.id, "task id already set, ignoring {}", task_id);
                    return effects;
                }

                let generation = self.next_generation();
                self.poll_generation = Some(generation);
                self.poll_failures = 0;
                self.attempt.task_id = Some(task_id.clone());
                self.attempt.status = UploadStatus::Processing;
                info!(attempt_id = %self.attempt.id, %task_id, "upload accepted, processing");

                effects.push(Effect::StartPoller { generation, task_id });
                effects.push(self.state_changed(UploadStatus::Uploading));
            }
            Err(err) => {
                self.finish_error(UploadStatus::Uploading, format!("Upload failed: {}", err), &mut effects);
            }
        }

        effects
    }

    fn on_polled(&mut self, generation: Generation, result: Result<TaskStatusResponse>) -> Vec<Effect> {
        if self.poll_generation != Some(generation) || self.attempt.status != UploadStatus::Processing {
            debug!(%generation, "discarding stale poll result");
            return Vec::new();
        }

        let mut effects = Vec::new();
        match result {
            Ok(response) => {
                self.poll_failures = 0;
                match response.status {
                    TaskStatus::Pending => {}
                    TaskStatus::Unknown => {
                        warn!(attempt_id = %self.attempt.id, "unrecognised task status, still processing");
                    }
                    TaskStatus::Success => {
                        self.stop_poller(&mut effects);
                        match response.log_url.filter(|link| !link.is_empty()) {
                            Some(link) => self.finish_success(link, &mut effects),
                            None => self.finish_error(
                                UploadStatus::Processing,
                                "Task finished without a result link".to_string(),
                                &mut effects,
                            ),
                        }
                    }
                    TaskStatus::Failure => {
                        self.stop_poller(&mut effects);
                        let message = response
                            .error_message
                            .filter(|message| !message.trim().is_empty())
                            .unwrap_or_else(|| "Task failed.".to_string());
                        self.finish_error(UploadStatus::Processing, message, &mut effects);
                    }
                }
            }
            Err(err) if err.is_transient() && self.poll_failures < self.max_poll_failures => {
                self.poll_failures += 1;
                warn!(
                    attempt_id = %self.attempt.id,
                    failures = self.poll_failures,
                    "status check failed, treating as pending: {}", err
                );
            }
            Err(err) => {
                self.stop_poller(&mut effects);
                self.finish_error(
                    UploadStatus::Processing,
                    format!("Error checking task status: {}", err),
                    &mut effects,
                );
            }
        }

        effects
    }

    fn on_reset_elapsed(&mut self, generation: Generation) -> Vec<Effect> {
        if self.reset_generation != Some(generation) || !self.attempt.status.is_terminal() {
            return Vec::new();
        }
        self.reset_generation = None;

        let mut effects = Vec::new();
        self.reset(&mut effects);
        effects
    }

    fn finish_success(&mut self, link: String, effects: &mut Vec<Effect>) {
        let task_id = self.attempt.task_id.clone().unwrap_or_else(|| TaskId::new(""));
        self.attempt.status = UploadStatus::Success;
        self.attempt.result_link = Some(link.clone());
        self.attempt.error_message = None;
        self.attempt.finished_at = Some(Utc::now());
        info!(attempt_id = %self.attempt.id, %task_id, link = %link, "task succeeded");

        effects.push(self.state_changed(UploadStatus::Processing));
        effects.push(Effect::Emit(UploadEvent::Completed {
            attempt_id: self.attempt.id,
            task_id,
            result_link: link,
        }));
        self.schedule_reset(effects);
    }

    fn finish_error(&mut self, old_status: UploadStatus, message: String, effects: &mut Vec<Effect>) {
        self.attempt.status = UploadStatus::Error;
        self.attempt.result_link = None;
        self.attempt.error_message = Some(message.clone());
        self.attempt.finished_at = Some(Utc::now());
        warn!(attempt_id = %self.attempt.id, "attempt failed: {}", message);

        effects.push(self.state_changed(old_status));
        effects.push(Effect::Emit(UploadEvent::Failed {
            attempt_id: self.attempt.id,
            error: message,
        }));
        self.schedule_reset(effects);
    }

    fn schedule_reset(&mut self, effects: &mut Vec<Effect>) {
        let generation = self.next_generation();
        self.reset_generation = Some(generation);
        effects.push(Effect::ScheduleReset { generation });
    }

    /// Replace the attempt with a fresh idle one
    fn reset(&mut self, effects: &mut Vec<Effect>) {
        let old_status = self.attempt.status;
        let attempt_id = self.attempt.id;
        self.attempt = UploadAttempt::new();
        debug!(%attempt_id, "attempt reset");

        effects.push(Effect::Emit(UploadEvent::StateChanged {
            attempt_id,
            old_status,
            new_status: UploadStatus::Idle,
        }));
        effects.push(Effect::Emit(UploadEvent::Reset { attempt_id }));
    }

    fn stop_poller(&mut self, effects: &mut Vec<Effect>) {
        if self.poll_generation.take().is_some() {
            effects.push(Effect::StopPoller);
        }
    }

    fn cancel_all(&mut self, effects: &mut Vec<Effect>) {
        if self.submit_generation.take().is_some() {
            effects.push(Effect::AbortSubmit);
        }
        self.stop_poller(effects);
        if self.reset_generation.take().is_some() {
            effects.push(Effect::CancelReset);
        }
    }

    fn state_changed(&self, old_status: UploadStatus) -> Effect {
        Effect::Emit(UploadEvent::StateChanged {
            attempt_id: self.attempt.id,
            old_status,
            new_status: self.attempt.status,
        })
    }

    fn next_generation(&mut self) -> Generation {
        self.next_generation += 1;
        Generation(self.next_generation)
    }
}
