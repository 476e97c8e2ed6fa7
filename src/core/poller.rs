use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, trace};
use super::machine::Input;
use super::timer::TaskGuard;
use super::traits::TaskClient;
use super::types::{Generation, TaskId};

/// 状态轮询器
///
/// Checks the task status every `interval`, first check one interval after
/// start. Requests are sequential, the next tick is only awaited once the
/// previous response has been handed over. Once stopped nothing more is
/// sent, a response that was in flight at that moment is thrown away.
pub struct Poller {
    task_id: TaskId,
    guard: TaskGuard,
}

impl Poller {
    pub fn start(
        generation: Generation,
        task_id: TaskId,
        interval: Duration,
        client: Arc<dyn TaskClient>,
        input_tx: mpsc::UnboundedSender<Input>,
    ) -> Self {
        debug!(%generation, %task_id, "starting poller");

        let polled_id = task_id.clone();
        let guard = TaskGuard::spawn(generation, move |token| async move {
            let mut ticker = interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                if token.is_cancelled() {
                    break;
                }

                trace!(%generation, task_id = %polled_id, "checking task status");
                let result = client.poll_status(&polled_id).await;

                // 停止后到达的响应直接丢弃
                if token.is_cancelled() {
                    break;
                }

                if input_tx.send(Input::Polled { generation, result }).is_err() {
                    break;
                }
            }
        });

        Self { task_id, guard }
    }

    pub fn generation(&self) -> Generation {
        self.guard.generation()
    }

    pub fn stop(self) {
        debug!(generation = %self.generation(), task_id = %self.task_id, "stopping poller");
        self.guard.cancel();
    }
}
