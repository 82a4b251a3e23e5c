use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures_util::stream::{self, BoxStream};
use futures_util::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;

use super::socket::{Inbound, Socket};
use super::MessageDecoder;
use crate::errors::{Error, Result, StreamError};

/// Single-consumer stream of values read from a WebSocket.
///
/// Yields one item per complete message, in arrival order. A normal close
/// ends the stream; any other close yields one [`StreamError::Closed`] and
/// then ends. A message that fails to decode yields [`StreamError::Decode`]
/// and reading continues.
///
/// Dropping the stream, or cancelling its [`Self::cancellation_token`],
/// abandons the pending read and releases the socket.
///
/// ```no_run
/// use futures_util::StreamExt;
/// # async fn run(client: seq_api::SeqApiClient, events: seq_api::ResourceGroup) -> seq_api::Result<()> {
/// let mut stream = client
///     .connect::<seq_api::EventEntity, _>(&events, "Stream", None, None)
///     .await?;
/// while let Some(event) = stream.next().await {
///     println!("{:?}", event?.id);
/// }
/// # Ok(()) }
/// ```
#[must_use = "streams do nothing unless polled"]
pub struct LinkStream<T> {
    inner: BoxStream<'static, Result<T>>,
    cancel: CancellationToken,
}

struct ReadState<T> {
    socket: Socket,
    decode: MessageDecoder<T>,
    cancel: CancellationToken,
    failed: bool,
}

impl<T: Send + 'static> LinkStream<T> {
    pub(crate) fn new(socket: Socket, decode: MessageDecoder<T>) -> Self {
        let cancel = CancellationToken::new();
        let state = ReadState {
            socket,
            decode,
            cancel: cancel.clone(),
            failed: false,
        };

        let inner = stream::unfold(state, |mut state| async move {
            if state.failed {
                return None;
            }
            loop {
                let next = tokio::select! {
                    biased;
                    () = state.cancel.cancelled() => return None,
                    next = state.socket.next() => next,
                };

                let message = match next {
                    None => return None,
                    Some(Ok(message)) => message,
                    Some(Err(e)) => {
                        state.failed = true;
                        return Some((Err(Error::from(StreamError::Socket(e))), state));
                    }
                };

                match Inbound::from(message) {
                    Inbound::Skip => continue,
                    Inbound::End => return None,
                    Inbound::Fail(error) => {
                        state.failed = true;
                        return Some((Err(Error::from(error)), state));
                    }
                    Inbound::Payload(bytes) => {
                        let item: Result<T> =
                            (state.decode)(&bytes).map_err(|e| StreamError::Decode(e).into());
                        return Some((item, state));
                    }
                }
            }
        });

        Self {
            inner: inner.boxed(),
            cancel,
        }
    }
}

impl<T> LinkStream<T> {
    /// Token that stops this stream when cancelled. Clones may be moved to
    /// other tasks.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

impl<T> Stream for LinkStream<T> {
    type Item = Result<T>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }
}

impl<T> fmt::Debug for LinkStream<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinkStream")
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}
