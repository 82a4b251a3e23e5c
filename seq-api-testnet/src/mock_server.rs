use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Result;
use chrono::{SecondsFormat, Utc};
use seq_api::{EventEntity, MessageTemplateToken, SeqConnection, SeqConnectionBuilder};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::routes::create_app;
use crate::state::{AppState, Config, StreamCommand};

/// Builder for [MockSeqServer].
#[derive(Debug, Default)]
#[must_use]
pub struct MockSeqServerBuilder {
    config: Config,
    port: u16,
}

impl MockSeqServerBuilder {
    /// Require this API key (or the session cookie) on everything but the root.
    pub fn api_key<S: Into<String>>(mut self, key: S) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    /// Answer the first `count` root requests with `503 Starting up`.
    pub fn startup_failures(mut self, count: u32) -> Self {
        self.config.startup_failures = count;
        self
    }

    /// Instance name reported on the root resource.
    pub fn instance_name<S: Into<String>>(mut self, name: S) -> Self {
        self.config.instance_name = Some(name.into());
        self
    }

    /// Listen on this port instead of a random one.
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Start serving.
    pub async fn start(self) -> Result<MockSeqServer> {
        MockSeqServer::start_with(self.config, self.port).await
    }
}

/// An in-process server speaking enough of the Seq API for end-to-end tests:
/// the root resource, the `Events` and `Data` groups, and the live event
/// stream over WebSocket.
///
/// The server stops when dropped.
#[derive(Debug)]
pub struct MockSeqServer {
    state: AppState,
    address: SocketAddr,
    base_url: Url,
    shutdown: CancellationToken,
}

impl MockSeqServer {
    /// Run a server on a random port, without authentication.
    pub async fn start() -> Result<Self> {
        Self::builder().start().await
    }

    /// Configure a server before starting it.
    pub fn builder() -> MockSeqServerBuilder {
        MockSeqServerBuilder::default()
    }

    async fn start_with(config: Config, port: u16) -> Result<Self> {
        let state = AppState::new(config);
        let app = create_app(state.clone());

        let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], port))).await?;
        let address = listener.local_addr()?;
        let base_url = Url::parse(&format!("http://{address}/"))?;

        let shutdown = CancellationToken::new();
        let server = axum::serve(listener, app.into_make_service())
            .with_graceful_shutdown(shutdown.clone().cancelled_owned());
        tokio::spawn(async move {
            if let Err(error) = server.await {
                tracing::error!(?error, "Mock Seq server error");
            }
        });

        tracing::info!("Mock Seq server listening on http://{address}");

        Ok(Self {
            state,
            address,
            base_url,
            shutdown,
        })
    }

    /// The URL clients should be pointed at.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Socket the server listens on.
    pub fn address(&self) -> SocketAddr {
        self.address
    }

    /// A connection builder aimed at this server, carrying its API key.
    pub fn connection_builder(&self) -> SeqConnectionBuilder {
        let builder = SeqConnection::builder(self.base_url().as_str());
        match &self.state.config.api_key {
            Some(key) => builder.api_key(key.clone()),
            None => builder,
        }
    }

    /// A connection to this server.
    pub fn connection(&self) -> Result<SeqConnection> {
        Ok(self.connection_builder().build()?)
    }

    /// Store `event`, assigning its id, timestamp (when blank) and links,
    /// and push it to connected stream sockets. Returns the stored event.
    pub fn ingest(&self, mut event: EventEntity) -> EventEntity {
        if event.timestamp.is_empty() {
            event.timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);
        }
        let stored = self.state.store().insert(event);
        self.state
            .publish(StreamCommand::Event(Box::new(stored.clone())));
        stored
    }

    /// [`Self::ingest`] for a plain text message.
    pub fn log(&self, level: &str, message: &str) -> EventEntity {
        self.ingest(EventEntity {
            level: Some(level.to_string()),
            rendered_message: Some(message.to_string()),
            message_template_tokens: vec![MessageTemplateToken::Text {
                text: message.to_string(),
            }],
            ..EventEntity::default()
        })
    }

    /// Number of stored events.
    pub fn event_count(&self) -> usize {
        self.state.store().len()
    }

    /// Send `text` verbatim to every stream socket.
    pub fn send_raw<S: Into<String>>(&self, text: S) {
        self.state.publish(StreamCommand::Raw(text.into()));
    }

    /// Close every stream socket with `code` and `reason`.
    pub fn close_streams<S: Into<String>>(&self, code: u16, reason: S) {
        self.state.publish(StreamCommand::Close {
            code,
            reason: reason.into(),
        });
    }

    /// Stream sockets currently connected.
    pub fn stream_clients(&self) -> usize {
        *self.state.clients.borrow()
    }

    /// Wait until at least `count` stream sockets are connected.
    pub async fn wait_for_stream_clients(&self, count: usize, timeout: Duration) -> Result<()> {
        let mut clients = self.state.clients.subscribe();
        tokio::time::timeout(timeout, clients.wait_for(|connected| *connected >= count))
            .await
            .map_err(|_elapsed| anyhow::anyhow!("{count} stream clients did not connect in time"))??;
        Ok(())
    }

    /// Wait until no stream socket is connected.
    pub async fn wait_for_no_stream_clients(&self, timeout: Duration) -> Result<()> {
        let mut clients = self.state.clients.subscribe();
        tokio::time::timeout(timeout, clients.wait_for(|connected| *connected == 0))
            .await
            .map_err(|_elapsed| anyhow::anyhow!("stream clients still connected"))??;
        Ok(())
    }

    /// Text messages received from stream clients, in arrival order.
    pub fn client_messages(&self) -> Vec<String> {
        self.state.client_messages()
    }

    /// Requests served for `path`, e.g. `"/api"`.
    pub fn hits(&self, path: &str) -> usize {
        self.state.hits(path)
    }
}

impl Drop for MockSeqServer {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
