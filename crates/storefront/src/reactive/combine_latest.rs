use futures::future;
use futures::stream::{self, BoxStream, Stream, StreamExt};

enum Latest<A, B> {
    Left(A),
    Right(B),
}

/// Synchronization point over two streams.
///
/// Keeps the most recent value of each side. Once both sides have emitted,
/// every new value from either side produces a fresh pair built from the
/// latest value of each. Ends when both inputs end.
pub fn combine_latest<A, B, SA, SB>(left: SA, right: SB) -> BoxStream<'static, (A, B)>
where
    SA: Stream<Item = A> + Send + 'static,
    SB: Stream<Item = B> + Send + 'static,
    A: Clone + Send + 'static,
    B: Clone + Send + 'static,
{
    let merged = stream::select(left.map(Latest::Left), right.map(Latest::Right));

    let mut last_left: Option<A> = None;
    let mut last_right: Option<B> = None;

    merged
        .filter_map(move |event| {
            match event {
                Latest::Left(value) => last_left = Some(value),
                Latest::Right(value) => last_right = Some(value),
            }
            let pair = match (&last_left, &last_right) {
                (Some(l), Some(r)) => Some((l.clone(), r.clone())),
                _ => None,
            };
            future::ready(pair)
        })
        .boxed()
}

/// Three-way variant of [`combine_latest`].
pub fn combine_latest3<A, B, C, SA, SB, SC>(
    first: SA,
    second: SB,
    third: SC,
) -> BoxStream<'static, (A, B, C)>
where
    SA: Stream<Item = A> + Send + 'static,
    SB: Stream<Item = B> + Send + 'static,
    SC: Stream<Item = C> + Send + 'static,
    A: Clone + Send + 'static,
    B: Clone + Send + 'static,
    C: Clone + Send + 'static,
{
    combine_latest(combine_latest(first, second), third)
        .map(|((a, b), c)| (a, b, c))
        .boxed()
}
