use std::sync::Arc;
use std::time::Duration;

use reqwest::cookie::Jar;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT};
use url::Url;

use crate::errors::{BuildError, NavigationError, Result};
use crate::link::{has_unresolved_fields, LinkParams, Resource};

const DEFAULT_USER_AGENT: &str = concat!("seq-api", "@", env!("CARGO_PKG_VERSION"),);

/// Versioned media type sent in every `Accept` header.
///
/// Servers that predate this API version fall back to their own shape for
/// the same resources instead of rejecting the request.
pub const SEQ_API_MEDIA_TYPE: &str = "application/vnd.datalust.seq.v11+json";

/// Header carrying the API key, when one is configured.
pub const API_KEY_HEADER: &str = "X-Seq-ApiKey";

/// [`API_KEY_HEADER`] in the normalized (lowercase) form `http` stores.
pub(crate) fn api_key_header() -> HeaderName {
    HeaderName::from_static("x-seq-apikey")
}

/// Default upper bound for the close handshake when a stream is disposed.
pub const DEFAULT_SOCKET_CLOSE_TIMEOUT: Duration = Duration::from_secs(3);

/// Configures a [`SeqApiClient`] before construction.
///
/// # Defaults
/// - No API key; requests rely on the session cookie alone.
/// - Session cookies enabled (stored per client, replayed on every call and
///   WebSocket handshake).
/// - HTTP request timeout: reqwest default (none) unless set.
/// - User-agent: `seq-api@<crate-version>` plus any [`Self::user_agent_extra`].
/// - Close handshake bound for disposed streams: [`DEFAULT_SOCKET_CLOSE_TIMEOUT`].
///
/// # Example
/// ```no_run
/// use std::time::Duration;
/// # use seq_api::SeqApiClient;
/// let client = SeqApiClient::builder("https://seq.example.com")
///     .api_key("my-key")
///     .request_timeout(Duration::from_secs(10))
///     .user_agent_extra("myapp/1.2.3")
///     .build()?;
/// # Ok::<_, seq_api::BuildError>(())
/// ```
#[derive(Debug, Clone)]
#[must_use]
pub struct SeqApiClientBuilder {
    server_url: String,
    api_key: Option<String>,
    http_request_timeout: Option<Duration>,
    use_cookies: bool,
    socket_close_timeout: Duration,

    /// Optional user-agent segment appended to the default UA for app-level telemetry.
    user_agent_extra: Option<String>,
}

impl SeqApiClientBuilder {
    pub(crate) fn new<S: Into<String>>(server_url: S) -> Self {
        Self {
            server_url: server_url.into(),
            api_key: None,
            http_request_timeout: None,
            use_cookies: true,
            socket_close_timeout: DEFAULT_SOCKET_CLOSE_TIMEOUT,
            user_agent_extra: None,
        }
    }

    /// Send `key` in the [`API_KEY_HEADER`] header of every request.
    /// Blank keys are ignored.
    pub fn api_key<S: Into<String>>(mut self, key: S) -> Self {
        let key = key.into();
        self.api_key = (!key.trim().is_empty()).then_some(key);
        self
    }

    /// Set HTTP requests timeout.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.http_request_timeout = Some(timeout);
        self
    }

    /// Enable or disable the per-client session cookie store.
    pub fn use_cookies(mut self, enabled: bool) -> Self {
        self.use_cookies = enabled;
        self
    }

    /// Upper bound for the close handshake when a broadcast stream is disposed.
    pub fn socket_close_timeout(mut self, timeout: Duration) -> Self {
        self.socket_close_timeout = timeout;
        self
    }

    /// Append an extra user-agent segment after the default `seq-api@<version>`.
    pub fn user_agent_extra<S: Into<String>>(mut self, extra: S) -> Self {
        self.user_agent_extra = Some(extra.into());
        self
    }

    /// Build [`SeqApiClient`].
    pub fn build(&self) -> std::result::Result<SeqApiClient, BuildError> {
        let base_url = normalize_server_url(&self.server_url)?;

        // Compose user agent with optional extra part.
        let user_agent = match &self.user_agent_extra {
            Some(extra) if !extra.trim().is_empty() => {
                format!("{DEFAULT_USER_AGENT} {}", extra.trim())
            }
            _ => DEFAULT_USER_AGENT.to_string(),
        };

        let api_key = self
            .api_key
            .as_deref()
            .map(HeaderValue::from_str)
            .transpose()
            .map_err(|_invalid| BuildError::ApiKey)?
            .map(|mut value| {
                value.set_sensitive(true);
                value
            });

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(SEQ_API_MEDIA_TYPE));
        if let Some(key) = &api_key {
            headers.insert(api_key_header(), key.clone());
        }

        let mut http_builder = reqwest::Client::builder()
            .user_agent(&user_agent)
            .default_headers(headers);

        let cookies = self.use_cookies.then(|| Arc::new(Jar::default()));
        if let Some(jar) = &cookies {
            http_builder = http_builder.cookie_provider(Arc::clone(jar));
        }

        if let Some(timeout) = self.http_request_timeout {
            http_builder = http_builder.timeout(timeout);
        }

        Ok(SeqApiClient {
            http: http_builder.build()?,
            base_url,
            api_key,
            cookies,
            user_agent,
            socket_close_timeout: self.socket_close_timeout,
        })
    }
}

/// Parse `raw`, require `http`/`https`, and make sure the path ends with `/`
/// so relative links join underneath it.
fn normalize_server_url(raw: &str) -> std::result::Result<Url, BuildError> {
    let invalid = |reason: &str| BuildError::ServerUrl {
        url: raw.to_string(),
        reason: reason.to_string(),
    };

    let mut url = Url::parse(raw.trim()).map_err(|e| invalid(&e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid("scheme must be http or https"));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}

/// Transport core for the Seq API: follows links, negotiates content and maps
/// failures.
///
/// `SeqApiClient` owns:
/// - the base address every link is joined onto,
/// - a reqwest client with the `Accept` and API-key headers preinstalled,
/// - the session cookie jar shared by HTTP calls and WebSocket handshakes.
///
/// It never caches entities and never retries. Clones share the connection
/// pool and the cookie jar.
///
/// Most code goes through [`crate::SeqConnection`], which adds the resource
/// group cache on top of this client.
#[derive(Clone, Debug)]
pub struct SeqApiClient {
    pub(crate) http: reqwest::Client,
    pub(crate) base_url: Url,
    pub(crate) api_key: Option<HeaderValue>,
    pub(crate) cookies: Option<Arc<Jar>>,
    pub(crate) user_agent: String,
    pub(crate) socket_close_timeout: Duration,
}

impl SeqApiClient {
    /// Creates a client for `server_url` with default settings.
    pub fn new<S: Into<String>>(server_url: S) -> std::result::Result<SeqApiClient, BuildError> {
        Self::builder(server_url).build()
    }

    /// Returns a builder to edit settings before creating [`SeqApiClient`].
    pub fn builder<S: Into<String>>(server_url: S) -> SeqApiClientBuilder {
        SeqApiClientBuilder::new(server_url)
    }

    // === Getters ===

    /// Server base address, always ending with `/`.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Returns a reference to the internal reqwest client.
    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Resolve the link `link` of `from` into an absolute URL.
    ///
    /// Fails before any I/O when the link is missing, the parameters do not
    /// match the template, or required fields were left unbound.
    pub fn resolve_link<R: Resource + ?Sized>(
        &self,
        from: &R,
        link: &str,
        params: Option<&LinkParams>,
    ) -> Result<Url> {
        let uri = from.links().require(link)?.resolve(params)?;
        self.absolute(&uri)
    }

    /// Join a resolved relative URI onto the base address.
    pub(crate) fn absolute(&self, uri: &str) -> Result<Url> {
        if has_unresolved_fields(uri) {
            return Err(NavigationError::UnresolvedFields {
                uri: uri.to_string(),
            }
            .into());
        }
        Ok(self.base_url.join(uri)?)
    }
}
