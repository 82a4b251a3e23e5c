use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use super::cache::{group_link_name, GroupCache};
use crate::client::core::{SeqApiClient, SeqApiClientBuilder};
use crate::errors::{BuildError, Result};
use crate::model::{ResourceGroup, RootEntity};
use crate::seq_log;

/// Environment variable read by [`SeqConnectionBuilder::from_env`] for the server address.
pub const SERVER_URL_ENV: &str = "SEQ_SERVER_URL";

/// Environment variable read by [`SeqConnectionBuilder::from_env`] for the API key.
pub const API_KEY_ENV: &str = "SEQ_API_KEY";

/// Address used by [`SeqConnectionBuilder::from_env`] when [`SERVER_URL_ENV`] is unset.
pub const DEFAULT_SERVER_URL: &str = "http://localhost:5341";

const INITIAL_BACKOFF: Duration = Duration::from_millis(100);
const MAX_BACKOFF: Duration = Duration::from_secs(5);

/// Configures a [`SeqConnection`]; every setting is forwarded to the
/// underlying [`SeqApiClientBuilder`].
#[derive(Debug, Clone)]
#[must_use]
pub struct SeqConnectionBuilder {
    client: SeqApiClientBuilder,
}

impl SeqConnectionBuilder {
    /// Read the server address from `SEQ_SERVER_URL` and the API key from
    /// `SEQ_API_KEY`.
    ///
    /// A missing address falls back to [`DEFAULT_SERVER_URL`]; a missing or
    /// blank key means no key is sent.
    pub fn from_env() -> Self {
        let server_url =
            std::env::var(SERVER_URL_ENV).unwrap_or_else(|_| DEFAULT_SERVER_URL.to_string());
        let builder = SeqConnection::builder(server_url);
        match std::env::var(API_KEY_ENV) {
            Ok(key) => builder.api_key(key),
            Err(_) => builder,
        }
    }

    /// See [`SeqApiClientBuilder::api_key`].
    pub fn api_key<S: Into<String>>(mut self, key: S) -> Self {
        self.client = self.client.api_key(key);
        self
    }

    /// See [`SeqApiClientBuilder::request_timeout`].
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.client = self.client.request_timeout(timeout);
        self
    }

    /// See [`SeqApiClientBuilder::use_cookies`].
    pub fn use_cookies(mut self, enabled: bool) -> Self {
        self.client = self.client.use_cookies(enabled);
        self
    }

    /// See [`SeqApiClientBuilder::socket_close_timeout`].
    pub fn socket_close_timeout(mut self, timeout: Duration) -> Self {
        self.client = self.client.socket_close_timeout(timeout);
        self
    }

    /// See [`SeqApiClientBuilder::user_agent_extra`].
    pub fn user_agent_extra<S: Into<String>>(mut self, extra: S) -> Self {
        self.client = self.client.user_agent_extra(extra);
        self
    }

    /// Build the [`SeqConnection`].
    pub fn build(&self) -> std::result::Result<SeqConnection, BuildError> {
        Ok(SeqConnection::with_client(self.client.build()?))
    }
}

/// Entry point to a Seq server.
///
/// Owns a [`SeqApiClient`] plus the cache of link metadata discovered from
/// the root resource. Clones share both, so resource groups are fetched once
/// no matter which clone asks first.
///
/// ```no_run
/// use seq_api::{LinkParams, SeqConnection};
///
/// # async fn run() -> seq_api::Result<()> {
/// let connection = SeqConnection::builder("https://seq.example.com")
///     .api_key("my-key")
///     .build()?;
///
/// let events = connection.load_resource_group("Events").await?;
/// let params = LinkParams::new().with("id", "event-42");
/// let event: seq_api::EventEntity = connection
///     .client()
///     .get(events.as_ref(), "Item", Some(&params))
///     .await?;
/// # Ok(()) }
/// ```
#[derive(Clone, Debug)]
pub struct SeqConnection {
    client: SeqApiClient,
    cache: Arc<GroupCache>,
}

impl SeqConnection {
    /// Connection to `server_url` with default settings.
    pub fn new<S: Into<String>>(server_url: S) -> std::result::Result<Self, BuildError> {
        Self::builder(server_url).build()
    }

    /// Returns a builder to edit settings before creating a [`SeqConnection`].
    pub fn builder<S: Into<String>>(server_url: S) -> SeqConnectionBuilder {
        SeqConnectionBuilder {
            client: SeqApiClient::builder(server_url),
        }
    }

    /// Wrap an already configured client. The cache starts empty.
    pub fn with_client(client: SeqApiClient) -> Self {
        Self {
            client,
            cache: Arc::new(GroupCache::new()),
        }
    }

    /// Access the underlying transport.
    #[inline]
    pub fn client(&self) -> &SeqApiClient {
        &self.client
    }

    /// The root resource, fetched once per connection.
    pub async fn root(&self) -> Result<Arc<RootEntity>> {
        self.cache.root(|| self.client.root()).await
    }

    /// The resource group `name`, reached through the root link
    /// `"<name>Resources"`.
    ///
    /// At most one fetch per group is in flight; concurrent callers share its
    /// outcome. Failures are not cached.
    pub async fn load_resource_group(&self, name: &str) -> Result<Arc<ResourceGroup>> {
        self.cache
            .group(name, || async {
                let root = self.root().await?;
                let link = group_link_name(name);
                self.client
                    .get::<ResourceGroup, _>(root.as_ref(), &link, None)
                    .await
            })
            .await
    }

    /// Poll the root until the server answers, backing off exponentially
    /// (100 ms doubling up to 5 s) between attempts.
    ///
    /// Returns the last failure once `timeout` has elapsed. Each attempt
    /// bypasses the root cache.
    pub async fn ensure_connected(&self, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        let mut delay = INITIAL_BACKOFF;

        loop {
            let error = match self.client.root().await {
                Ok(_) => return Ok(()),
                Err(error) => error,
            };

            let now = Instant::now();
            if now >= deadline {
                seq_log!(warn, "Server still unreachable after {:?}: {}", timeout, error);
                return Err(error);
            }

            seq_log!(debug, "Server unreachable ({}), retrying in {:?}", error, delay);
            tokio::time::sleep(delay.min(deadline - now)).await;
            delay = (delay * 2).min(MAX_BACKOFF);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use futures_util::future::join_all;
    use httpmock::prelude::*;
    use serde_json::json;

    use super::*;
    use crate::errors::{Error, NavigationError};
    use crate::{EventEntity, LinkParams};

    fn root_body() -> serde_json::Value {
        json!({
            "Product": "Seq",
            "Version": "2026.1",
            "InstanceName": "test",
            "Links": {
                "EventsResources": "api/events/resources",
                "DataResources": "api/data/resources"
            }
        })
    }

    fn events_group_body() -> serde_json::Value {
        json!({
            "Links": {
                "Items": "api/events{?count,filter}",
                "Item": "api/events/{id}{?render}"
            }
        })
    }

    #[tokio::test]
    async fn concurrent_loads_fetch_root_and_group_once() {
        let server = MockServer::start_async().await;
        let root = server
            .mock_async(|when, then| {
                when.method(GET).path("/api");
                then.status(200)
                    .delay(Duration::from_millis(50))
                    .json_body(root_body());
            })
            .await;
        let group = server
            .mock_async(|when, then| {
                when.method(GET).path("/api/events/resources");
                then.status(200)
                    .delay(Duration::from_millis(50))
                    .json_body(events_group_body());
            })
            .await;

        let connection = SeqConnection::new(server.base_url()).unwrap();
        let loads = (0..10).map(|_| connection.load_resource_group("Events"));
        for loaded in join_all(loads).await {
            assert!(loaded.unwrap().links.contains("Item"));
        }

        root.assert_hits_async(1).await;
        group.assert_hits_async(1).await;
    }

    #[tokio::test]
    async fn failed_group_loads_are_retried() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api");
                then.status(200).json_body(root_body());
            })
            .await;
        let failing = server
            .mock_async(|when, then| {
                when.method(GET).path("/api/events/resources");
                then.status(503);
            })
            .await;

        let connection = SeqConnection::new(server.base_url()).unwrap();
        let err = connection.load_resource_group("Events").await.unwrap_err();
        assert_eq!(err.status_code(), Some(reqwest::StatusCode::SERVICE_UNAVAILABLE));
        failing.delete_async().await;

        let healthy = server
            .mock_async(|when, then| {
                when.method(GET).path("/api/events/resources");
                then.status(200).json_body(events_group_body());
            })
            .await;

        connection.load_resource_group("Events").await.unwrap();
        connection.load_resource_group("Events").await.unwrap();
        healthy.assert_hits_async(1).await;
    }

    #[tokio::test]
    async fn unknown_groups_are_navigation_errors() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api");
                then.status(200).json_body(root_body());
            })
            .await;

        let connection = SeqConnection::new(server.base_url()).unwrap();
        let err = connection.load_resource_group("Alerts").await.unwrap_err();
        match err {
            Error::Navigation(NavigationError::LinkNotAvailable {
                link,
                mut available,
            }) => {
                assert_eq!(link, "AlertsResources");
                available.sort();
                assert_eq!(available, vec!["DataResources", "EventsResources"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn find_event_by_id_walks_root_group_and_item() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api");
                then.status(200).json_body(root_body());
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/events/resources");
                then.status(200).json_body(events_group_body());
            })
            .await;
        let item = server
            .mock_async(|when, then| {
                when.method(GET).path("/api/events/42");
                then.status(200).json_body(json!({
                    "Id": "42",
                    "Timestamp": "2026-10-19T10:00:00.0000001Z",
                    "Level": "Information",
                    "Links": {"Self": "api/events/42"}
                }));
            })
            .await;

        let connection = SeqConnection::new(server.base_url()).unwrap();
        let events = connection.load_resource_group("Events").await.unwrap();
        let params = LinkParams::new().with("id", "42");
        let event: EventEntity = connection
            .client()
            .get(events.as_ref(), "Item", Some(&params))
            .await
            .unwrap();

        item.assert_async().await;
        assert_eq!(event.id.as_deref(), Some("42"));
        assert_eq!(event.timestamp, "2026-10-19T10:00:00.0000001Z");
    }

    #[tokio::test]
    async fn ensure_connected_gives_up_with_the_last_error() {
        let server = MockServer::start_async().await;
        let root = server
            .mock_async(|when, then| {
                when.method(GET).path("/api");
                then.status(503).json_body(json!({"Error": "Starting up"}));
            })
            .await;

        let connection = SeqConnection::new(server.base_url()).unwrap();
        let err = connection
            .ensure_connected(Duration::from_millis(250))
            .await
            .unwrap_err();

        assert_eq!(err.server_message(), Some("Starting up"));
        assert!(root.hits_async().await >= 2);
    }

    #[tokio::test]
    async fn ensure_connected_returns_once_the_root_answers() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api");
                then.status(200).json_body(root_body());
            })
            .await;

        let connection = SeqConnection::new(server.base_url()).unwrap();
        connection
            .ensure_connected(Duration::from_secs(1))
            .await
            .unwrap();
    }
}
