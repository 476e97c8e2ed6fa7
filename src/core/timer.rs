use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::trace;
use super::types::Generation;

/// A spawned piece of work bound to a generation. Dropping the guard cancels
/// the work, so whoever owns the guard owns the work's lifetime.
pub struct TaskGuard {
    generation: Generation,
    token: CancellationToken,
}

impl TaskGuard {
    pub fn spawn<F, Fut>(generation: Generation, work: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let token = CancellationToken::new();
        let child = token.clone();
        let future = work(token.clone());

        tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = child.cancelled() => {
                    trace!(%generation, "task cancelled");
                }
                _ = future => {}
            }
        });

        Self { generation, token }
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// 延迟任务 - 到期后执行一次回调，可取消
pub struct DelayedTask {
    guard: TaskGuard,
}

impl DelayedTask {
    pub fn schedule<F>(generation: Generation, delay: Duration, on_elapsed: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        let guard = TaskGuard::spawn(generation, move |token| async move {
            tokio::time::sleep(delay).await;
            if !token.is_cancelled() {
                on_elapsed();
            }
        });

        Self { guard }
    }

    pub fn generation(&self) -> Generation {
        self.guard.generation()
    }

    pub fn cancel(&self) {
        self.guard.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.guard.is_cancelled()
    }
}
