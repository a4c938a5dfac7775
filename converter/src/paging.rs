//! Cursor-driven pagination as a [`Stream`].

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context as TaskContext, Poll};
use tokio_stream::Stream;

/// One page of items plus the cursor of the page after it, if any.
pub type Page<T> = (VecDeque<T>, Option<String>);

type OneFuturePage<'a, F, T> = Pin<Box<dyn Future<Output = eyre::Result<(F, Page<T>)>> + 'a + Send>>;

/// Yields items one by one, fetching the next page when the current one is exhausted.
///
/// APIs that embed the first page in a parent resource (a playlist with its first hundred
/// tracks, say) hand that page over directly together with the cursor of the next one. The
/// fetcher is only called with cursors the previous page returned.
pub struct PagedStream<'a, T, F> {
    current_items: VecDeque<T>,
    pending_request: Option<OneFuturePage<'a, F, T>>,
    is_done: bool,
}

impl<'a, T, F> PagedStream<'a, T, F> {
    pub fn new<Fut>(first_page: impl IntoIterator<Item = T>, next: Option<String>, fetcher: F) -> Self
    where
        F: Fn(String) -> Fut,
        F: Send + 'a,
        Fut: Future<Output = eyre::Result<Page<T>>> + Send + 'a,
        T: Send + 'a,
    {
        Self {
            current_items: first_page.into_iter().collect(),
            is_done: next.is_none(),
            pending_request: next.map(|cursor| Self::fetch(fetcher, cursor)),
        }
    }

    fn fetch<Fut>(fetcher: F, cursor: String) -> OneFuturePage<'a, F, T>
    where
        F: Fn(String) -> Fut,
        F: Send + 'a,
        Fut: Future<Output = eyre::Result<Page<T>>> + Send + 'a,
        T: Send + 'a,
    {
        Box::pin(async move {
            let page = fetcher(cursor).await?;
            Ok((fetcher, page))
        })
    }
}

impl<'a, T: Unpin, F> Unpin for PagedStream<'a, T, F> {}

impl<'a, T: Unpin, F, Fut> Stream for PagedStream<'a, T, F>
where
    F: Fn(String) -> Fut,
    F: Send + 'a,
    Fut: Future<Output = eyre::Result<Page<T>>> + Send + 'a,
    T: Send + 'a,
{
    type Item = eyre::Result<T>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<Option<Self::Item>> {
        loop {
            if let Some(item) = self.current_items.pop_front() {
                return Poll::Ready(Some(Ok(item)));
            }

            if self.is_done {
                return Poll::Ready(None);
            }

            let Some(pending) = self.pending_request.as_mut() else {
                self.is_done = true;
                return Poll::Ready(None);
            };

            match pending.as_mut().poll(cx) {
                Poll::Ready(Ok((fetcher, (items, next)))) => {
                    self.current_items.extend(items);
                    match next {
                        Some(cursor) => {
                            // queued, polled once the items above are drained
                            self.pending_request = Some(Self::fetch(fetcher, cursor));
                        }
                        None => {
                            self.is_done = true;
                            self.pending_request = None;
                        }
                    }
                }
                Poll::Ready(Err(e)) => {
                    self.pending_request = None;
                    self.is_done = true;
                    return Poll::Ready(Some(Err(e)));
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
