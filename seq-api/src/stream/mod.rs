//! Live streaming over WebSockets reached through links.
//!
//! Two consumption modes share one connect protocol:
//! - [`LinkStream`]: one consumer pulls values as a [`futures_util::Stream`].
//! - [`ObservableStream`]: one background receive loop fans every value out
//!   to any number of [`Observer`]s.
//!
//! Messages are decoded as JSON by default; the `*_with` variants take any
//! `Fn(&[u8]) -> Result<T, BoxError>`.

use std::sync::Arc;

use serde::de::DeserializeOwned;

use crate::client::core::SeqApiClient;
use crate::errors::{BoxError, Result};
use crate::link::{LinkParams, Resource};

mod observable;
mod sequence;
mod socket;
#[cfg(test)]
pub(crate) mod testing;

pub use observable::{ObservableStream, Observer, StreamState, Subscription};
pub use sequence::LinkStream;

/// Turns the payload of one complete message into a value.
pub type MessageDecoder<T> =
    Arc<dyn Fn(&[u8]) -> std::result::Result<T, BoxError> + Send + Sync>;

fn json_decoder<T: DeserializeOwned + 'static>() -> MessageDecoder<T> {
    Arc::new(|payload: &[u8]| serde_json::from_slice::<T>(payload).map_err(BoxError::from))
}

fn text_decoder() -> MessageDecoder<String> {
    Arc::new(|payload: &[u8]| {
        std::str::from_utf8(payload)
            .map(str::to_owned)
            .map_err(BoxError::from)
    })
}

impl SeqApiClient {
    /// Open the WebSocket behind `link` and read JSON values of type `T`.
    ///
    /// `initial_message` is sent once, before anything is read.
    pub async fn connect<T, R>(
        &self,
        from: &R,
        link: &str,
        params: Option<&LinkParams>,
        initial_message: Option<&str>,
    ) -> Result<LinkStream<T>>
    where
        T: DeserializeOwned + Send + 'static,
        R: Resource + ?Sized,
    {
        let socket = self.open_socket(from, link, params, initial_message).await?;
        Ok(LinkStream::new(socket, json_decoder()))
    }

    /// [`Self::connect`] with a custom message decoder.
    pub async fn connect_with<T, R, F>(
        &self,
        from: &R,
        link: &str,
        params: Option<&LinkParams>,
        initial_message: Option<&str>,
        decode: F,
    ) -> Result<LinkStream<T>>
    where
        T: Send + 'static,
        R: Resource + ?Sized,
        F: Fn(&[u8]) -> std::result::Result<T, BoxError> + Send + Sync + 'static,
    {
        let socket = self.open_socket(from, link, params, initial_message).await?;
        Ok(LinkStream::new(socket, Arc::new(decode)))
    }

    /// [`Self::connect`] yielding each message as raw text.
    pub async fn connect_text<R: Resource + ?Sized>(
        &self,
        from: &R,
        link: &str,
        params: Option<&LinkParams>,
        initial_message: Option<&str>,
    ) -> Result<LinkStream<String>> {
        let socket = self.open_socket(from, link, params, initial_message).await?;
        Ok(LinkStream::new(socket, text_decoder()))
    }

    /// Open the WebSocket behind `link` for broadcast to many observers.
    ///
    /// Reading starts with the first subscription.
    pub async fn observe<T, R>(
        &self,
        from: &R,
        link: &str,
        params: Option<&LinkParams>,
        initial_message: Option<&str>,
    ) -> Result<ObservableStream<T>>
    where
        T: DeserializeOwned + Send + 'static,
        R: Resource + ?Sized,
    {
        let socket = self.open_socket(from, link, params, initial_message).await?;
        Ok(ObservableStream::new(
            socket,
            json_decoder(),
            self.socket_close_timeout,
        ))
    }

    /// [`Self::observe`] with a custom message decoder.
    pub async fn observe_with<T, R, F>(
        &self,
        from: &R,
        link: &str,
        params: Option<&LinkParams>,
        initial_message: Option<&str>,
        decode: F,
    ) -> Result<ObservableStream<T>>
    where
        T: Send + 'static,
        R: Resource + ?Sized,
        F: Fn(&[u8]) -> std::result::Result<T, BoxError> + Send + Sync + 'static,
    {
        let socket = self.open_socket(from, link, params, initial_message).await?;
        Ok(ObservableStream::new(
            socket,
            Arc::new(decode),
            self.socket_close_timeout,
        ))
    }
}
