use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, trace};
use super::machine::{Effect, Input, UploadStateMachine};
use super::poller::Poller;
use super::timer::{DelayedTask, TaskGuard};
use super::traits::{ProgressFn, TaskClient};
use super::types::{AudioFile, Generation, ManagerCommand, TaskId, UploadConfig, UploadEvent};

/// The single event sequence of the workflow: commands from the handle and
/// completions from spawned work are applied one at a time.
pub(crate) struct UploadManagerWorker {
    machine: UploadStateMachine,
    client: Arc<dyn TaskClient>,
    config: UploadConfig,

    submit: Option<TaskGuard>,
    poller: Option<Poller>,
    reset: Option<DelayedTask>,

    event_tx: broadcast::Sender<UploadEvent>,
    input_tx: mpsc::UnboundedSender<Input>,
}

impl UploadManagerWorker {
    pub(crate) async fn run(
        client: Arc<dyn TaskClient>,
        config: UploadConfig,
        mut command_rx: mpsc::Receiver<ManagerCommand>,
        event_tx: broadcast::Sender<UploadEvent>,
    ) {
        let (input_tx, mut input_rx) = mpsc::unbounded_channel();
        let mut worker = Self {
            machine: UploadStateMachine::new(config.max_poll_failures),
            client,
            config,
            submit: None,
            poller: None,
            reset: None,
            event_tx,
            input_tx,
        };

        // 主事件循环
        loop {
            tokio::select! {
                command = command_rx.recv() => match command {
                    Some(ManagerCommand::Shutdown { reply }) => {
                        worker.teardown();
                        let _ = reply.send(());
                        break;
                    }
                    Some(command) => worker.handle_command(command),
                    None => break,
                },
                Some(input) = input_rx.recv() => {
                    trace!(?input, "input");
                    let effects = worker.machine.handle(input);
                    worker.apply(effects);
                }
            }
        }

        worker.teardown();
        debug!("upload manager worker stopped");
    }

    fn handle_command(&mut self, command: ManagerCommand) {
        match command {
            ManagerCommand::SelectFile { file, reply } => {
                let effects = self.machine.select_file(file);
                self.apply(effects);
                let _ = reply.send(self.machine.attempt().id);
            }
            ManagerCommand::Submit { reply } => {
                let result = self.machine.submit().map(|effects| self.apply(effects));
                let _ = reply.send(result.map(|_| self.machine.attempt().id));
            }
            ManagerCommand::Dismiss { reply } => {
                let result = self.machine.dismiss().map(|effects| self.apply(effects));
                let _ = reply.send(result);
            }
            ManagerCommand::GetAttempt { reply } => {
                let _ = reply.send(self.machine.attempt().clone());
            }
            ManagerCommand::Shutdown { reply } => {
                self.teardown();
                let _ = reply.send(());
            }
        }
    }

    fn apply(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::StartSubmit { generation, file } => self.start_submit(generation, file),
                Effect::AbortSubmit => {
                    if let Some(submit) = self.submit.take() {
                        debug!(generation = %submit.generation(), "aborting upload");
                        submit.cancel();
                    }
                }
                Effect::StartPoller { generation, task_id } => self.start_poller(generation, task_id),
                Effect::StopPoller => {
                    if let Some(poller) = self.poller.take() {
                        poller.stop();
                    }
                }
                Effect::ScheduleReset { generation } => self.schedule_reset(generation),
                Effect::CancelReset => {
                    if let Some(reset) = self.reset.take() {
                        debug!(generation = %reset.generation(), "cancelling reset");
                        reset.cancel();
                    }
                }
                Effect::Emit(event) => {
                    // 没有订阅者时发送会失败，忽略
                    let _ = self.event_tx.send(event);
                }
            }
        }
    }

    fn start_submit(&mut self, generation: Generation, file: AudioFile) {
        if let Some(previous) = self.submit.take() {
            previous.cancel();
        }

        let client = self.client.clone();
        let input_tx = self.input_tx.clone();
        let progress_tx = self.input_tx.clone();
        let progress: ProgressFn = Arc::new(move |percent| {
            let _ = progress_tx.send(Input::Progress { generation, percent });
        });

        let guard = TaskGuard::spawn(generation, move |_token| async move {
            let result = client.submit(file, progress).await;
            let _ = input_tx.send(Input::Submitted { generation, result });
        });

        self.submit = Some(guard);
    }

    fn start_poller(&mut self, generation: Generation, task_id: TaskId) {
        // 同一时间只允许一个轮询器
        if let Some(previous) = self.poller.take() {
            previous.stop();
        }

        self.poller = Some(Poller::start(
            generation,
            task_id,
            self.config.poll_interval,
            self.client.clone(),
            self.input_tx.clone(),
        ));
    }

    fn schedule_reset(&mut self, generation: Generation) {
        if let Some(previous) = self.reset.take() {
            previous.cancel();
        }

        let input_tx = self.input_tx.clone();
        self.reset = Some(DelayedTask::schedule(generation, self.config.reset_delay, move || {
            let _ = input_tx.send(Input::ResetElapsed { generation });
        }));
    }

    fn teardown(&mut self) {
        let effects = self.machine.shutdown();
        self.apply(effects);

        // anything the machine no longer tracks still goes
        self.submit.take();
        self.poller.take();
        self.reset.take();
    }
}
