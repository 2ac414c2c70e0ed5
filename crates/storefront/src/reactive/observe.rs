use futures::stream::{BoxStream, StreamExt};
use std::future::Future;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

/// Streams the current value of a watch channel, then every subsequent value.
///
/// Values published while the consumer is busy are coalesced into the latest.
pub fn watch_stream<T>(rx: watch::Receiver<T>) -> BoxStream<'static, T>
where
    T: Clone + Send + Sync + 'static,
{
    WatchStream::new(rx).boxed()
}

/// Runs `query` once immediately and again after every bump of `generation`.
///
/// Each subscriber gets its own stream; dropping it only cancels that
/// subscription.
pub fn observe_query<T, E, F, Fut>(
    generation: watch::Receiver<u64>,
    query: F,
) -> BoxStream<'static, Result<T, E>>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Send + 'static,
{
    WatchStream::new(generation)
        .then(move |_generation| query())
        .boxed()
}
