use std::pin::Pin;
use std::task::{Context, Poll};
use bytes::Bytes;
use futures::Stream;
use pin_project_lite::pin_project;
use crate::utils::PercentTracker;

pin_project! {
    /// Request body wrapper that counts the bytes pulled by the transport
    pub struct ProgressStream<S> {
        #[pin]
        inner: S,
        tracker: PercentTracker,
    }
}

impl<S> ProgressStream<S> {
    pub fn new(inner: S, mut tracker: PercentTracker) -> Self {
        tracker.start();

        Self {
            inner,
            tracker,
        }
    }
}

impl<S> Stream for ProgressStream<S>
where
    S: Stream<Item = std::io::Result<Bytes>>
{
    type Item = std::io::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();

        match this.inner.poll_next(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                if !chunk.is_empty() {
                    this.tracker.add_bytes(chunk.len() as u64);
                }
                Poll::Ready(Some(Ok(chunk)))
            }
            Poll::Ready(None) => {
                // 流结束时，发送最终更新
                this.tracker.finish();
                Poll::Ready(None)
            }
            other => other,
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}
