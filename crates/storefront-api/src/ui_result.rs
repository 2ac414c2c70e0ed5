use futures::stream::{self, BoxStream, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Tagged state handed to UI consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum UiResult<T> {
    Loading,
    Success(T),
    Error(String),
}

impl<T> UiResult<T> {
    pub fn success(&self) -> Option<&T> {
        match self {
            UiResult::Success(value) => Some(value),
            _ => None,
        }
    }
}

/// Wraps a fallible stream so that it starts with `Loading` and maps each
/// item to `Success` or `Error`. Errors do not terminate the stream.
pub trait AsResult<T, E> {
    fn as_result(self) -> BoxStream<'static, UiResult<T>>;
}

impl<S, T, E> AsResult<T, E> for S
where
    S: Stream<Item = std::result::Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Display + Send + 'static,
{
    fn as_result(self) -> BoxStream<'static, UiResult<T>> {
        stream::once(async { UiResult::Loading })
            .chain(self.map(|item| match item {
                Ok(value) => UiResult::Success(value),
                Err(e) => UiResult::Error(e.to_string()),
            }))
            .boxed()
    }
}
