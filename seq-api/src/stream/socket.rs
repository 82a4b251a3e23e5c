//! WebSocket handshake and frame classification shared by both stream modes.

use futures_util::SinkExt;
use reqwest::cookie::CookieStore;
use reqwest::header::{HeaderValue, ACCEPT, COOKIE, USER_AGENT};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::error::UrlError;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use url::Url;

use crate::client::core::{api_key_header, SeqApiClient, SEQ_API_MEDIA_TYPE};
use crate::errors::{Error, Result, StreamError};
use crate::link::{LinkParams, Resource};
use crate::seq_log;

pub(crate) type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// What one inbound message means for a receive loop.
#[derive(Debug)]
pub(crate) enum Inbound {
    /// A complete text or binary payload.
    Payload(bytes::Bytes),
    /// Control traffic; keep reading.
    Skip,
    /// Normal closure, or a close without status.
    End,
    /// Any other closure.
    Fail(StreamError),
}

impl From<Message> for Inbound {
    fn from(message: Message) -> Self {
        match message {
            Message::Text(text) => Inbound::Payload(text.into()),
            Message::Binary(data) => Inbound::Payload(data),
            Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => Inbound::Skip,
            Message::Close(None) => Inbound::End,
            Message::Close(Some(frame)) if frame.code == CloseCode::Normal => Inbound::End,
            Message::Close(Some(frame)) => Inbound::Fail(StreamError::Closed {
                code: frame.code.into(),
                description: frame.reason.to_string(),
            }),
        }
    }
}

/// Map an `http(s)` address onto the matching `ws(s)` scheme.
pub(crate) fn socket_url(url: &Url) -> Result<Url> {
    let unsupported =
        || Error::from(StreamError::Socket(tungstenite::Error::Url(UrlError::UnsupportedUrlScheme)));

    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        _ => return Err(unsupported()),
    };

    let mut socket_url = url.clone();
    socket_url.set_scheme(scheme).map_err(|()| unsupported())?;
    Ok(socket_url)
}

impl SeqApiClient {
    /// Resolve `link` and open a WebSocket to it, carrying the same API key,
    /// session cookies and user agent as HTTP requests.
    ///
    /// `initial_message`, when given, is sent as one text frame before
    /// anything is read.
    pub(crate) async fn open_socket<R: Resource + ?Sized>(
        &self,
        from: &R,
        link: &str,
        params: Option<&LinkParams>,
        initial_message: Option<&str>,
    ) -> Result<Socket> {
        let http_url = self.resolve_link(from, link, params)?;
        let url = socket_url(&http_url)?;

        let mut request = url.as_str().into_client_request()?;
        let headers = request.headers_mut();
        headers.insert(ACCEPT, HeaderValue::from_static(SEQ_API_MEDIA_TYPE));
        if let Ok(agent) = HeaderValue::from_str(&self.user_agent) {
            headers.insert(USER_AGENT, agent);
        }
        if let Some(key) = &self.api_key {
            headers.insert(api_key_header(), key.clone());
        }
        // Cookies are scoped to the HTTP form of the address.
        if let Some(cookies) = self.cookies.as_ref().and_then(|jar| jar.cookies(&http_url)) {
            headers.insert(COOKIE, cookies);
        }

        seq_log!(info, "Opening stream {}", url);
        let (mut socket, _response) = tokio_tungstenite::connect_async(request).await?;

        if let Some(message) = initial_message {
            socket.send(Message::text(message.to_owned())).await?;
        }
        Ok(socket)
    }
}
