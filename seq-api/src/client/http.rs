//! Typed HTTP verbs over links: resolve, send, check, decode.

use bytes::Bytes;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use url::Url;

use super::core::SeqApiClient;
use crate::errors::{RequestError, Result};
use crate::link::{LinkParams, Resource};
use crate::model::RootEntity;
use crate::seq_log;
use crate::util::check_http_status;

/// Relative address of the root resource.
pub const ROOT_PATH: &str = "api";

/// Serialize a request payload as JSON.
pub(crate) fn encode_body<B: Serialize + ?Sized>(body: &B) -> Result<Vec<u8>> {
    serde_json::to_vec(body).map_err(|e| {
        RequestError::EncodeJson {
            message: e.to_string(),
        }
        .into()
    })
}

/// Deserialize a response body; an empty body reads as JSON `null`, so `()`
/// and `Option<T>` accept "no content".
pub(crate) fn decode_body<T: DeserializeOwned>(body: &[u8]) -> Result<T> {
    let body = if body.iter().all(u8::is_ascii_whitespace) {
        b"null".as_slice()
    } else {
        body
    };
    Ok(serde_json::from_slice(body)?)
}

impl SeqApiClient {
    /// Start building a request for `method` and an already resolved `url`.
    ///
    /// The `Accept`, API-key and cookie headers are added by the client.
    pub fn request(&self, method: Method, url: Url) -> RequestBuilder {
        seq_log!(debug, "{} {}", method, url);
        self.http.request(method, url)
    }

    async fn send_link<R: Resource + ?Sized>(
        &self,
        method: Method,
        from: &R,
        link: &str,
        params: Option<&LinkParams>,
        body: Option<Vec<u8>>,
    ) -> Result<Response> {
        let url = self.resolve_link(from, link, params)?;
        let mut request = self.request(method, url);
        if let Some(body) = body {
            request = request.header(CONTENT_TYPE, "application/json").body(body);
        }
        let response = request.send().await?;
        check_http_status(response).await
    }

    async fn read<T: DeserializeOwned>(response: Response) -> Result<T> {
        let bytes = response.bytes().await?;
        decode_body(&bytes)
    }

    /// `GET <base>/api`: the root resource, uncached.
    ///
    /// [`crate::SeqConnection`] fetches it once and reuses it.
    pub async fn root(&self) -> Result<RootEntity> {
        let url = self.absolute(ROOT_PATH)?;
        let response = check_http_status(self.request(Method::GET, url).send().await?).await?;
        Self::read(response).await
    }

    /// GET the link `link` of `from` and deserialize the body as `T`.
    ///
    /// # Examples
    /// ```no_run
    /// # use seq_api::{EventEntity, LinkParams, ResourceGroup, SeqApiClient};
    /// # async fn ex(client: SeqApiClient, events: ResourceGroup) -> seq_api::Result<()> {
    /// let params = LinkParams::new().with("id", "event-42");
    /// let event: EventEntity = client.get(&events, "Item", Some(&params)).await?;
    /// # Ok(()) }
    /// ```
    pub async fn get<T, R>(&self, from: &R, link: &str, params: Option<&LinkParams>) -> Result<T>
    where
        T: DeserializeOwned,
        R: Resource + ?Sized,
    {
        let response = self.send_link(Method::GET, from, link, params, None).await?;
        Self::read(response).await
    }

    /// GET a JSON array and deserialize every element as `T`.
    pub async fn list<T, R>(
        &self,
        from: &R,
        link: &str,
        params: Option<&LinkParams>,
    ) -> Result<Vec<T>>
    where
        T: DeserializeOwned,
        R: Resource + ?Sized,
    {
        let response = self.send_link(Method::GET, from, link, params, None).await?;
        let items: Option<Vec<T>> = Self::read(response).await?;
        Ok(items.unwrap_or_default())
    }

    /// GET and return the body as text, untouched.
    pub async fn get_string<R: Resource + ?Sized>(
        &self,
        from: &R,
        link: &str,
        params: Option<&LinkParams>,
    ) -> Result<String> {
        let response = self.send_link(Method::GET, from, link, params, None).await?;
        Ok(response.text().await?)
    }

    /// GET and return the raw body bytes.
    pub async fn get_bytes<R: Resource + ?Sized>(
        &self,
        from: &R,
        link: &str,
        params: Option<&LinkParams>,
    ) -> Result<Bytes> {
        let response = self.send_link(Method::GET, from, link, params, None).await?;
        Ok(response.bytes().await?)
    }

    /// POST `body` as JSON, ignoring any response body.
    pub async fn post<B, R>(
        &self,
        from: &R,
        link: &str,
        body: &B,
        params: Option<&LinkParams>,
    ) -> Result<()>
    where
        B: Serialize + ?Sized,
        R: Resource + ?Sized,
    {
        let body = encode_body(body)?;
        self.send_link(Method::POST, from, link, params, Some(body))
            .await?;
        Ok(())
    }

    /// POST `body` as JSON and deserialize the response as `T`.
    pub async fn post_read<B, T, R>(
        &self,
        from: &R,
        link: &str,
        body: &B,
        params: Option<&LinkParams>,
    ) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
        R: Resource + ?Sized,
    {
        let body = encode_body(body)?;
        let response = self
            .send_link(Method::POST, from, link, params, Some(body))
            .await?;
        Self::read(response).await
    }

    /// POST `body` as JSON and return the response as text.
    pub async fn post_read_string<B, R>(
        &self,
        from: &R,
        link: &str,
        body: &B,
        params: Option<&LinkParams>,
    ) -> Result<String>
    where
        B: Serialize + ?Sized,
        R: Resource + ?Sized,
    {
        let body = encode_body(body)?;
        let response = self
            .send_link(Method::POST, from, link, params, Some(body))
            .await?;
        Ok(response.text().await?)
    }

    /// POST `body` as JSON and return the raw response bytes.
    pub async fn post_read_bytes<B, R>(
        &self,
        from: &R,
        link: &str,
        body: &B,
        params: Option<&LinkParams>,
    ) -> Result<Bytes>
    where
        B: Serialize + ?Sized,
        R: Resource + ?Sized,
    {
        let body = encode_body(body)?;
        let response = self
            .send_link(Method::POST, from, link, params, Some(body))
            .await?;
        Ok(response.bytes().await?)
    }

    /// PUT `body` as JSON, ignoring any response body.
    pub async fn put<B, R>(
        &self,
        from: &R,
        link: &str,
        body: &B,
        params: Option<&LinkParams>,
    ) -> Result<()>
    where
        B: Serialize + ?Sized,
        R: Resource + ?Sized,
    {
        let body = encode_body(body)?;
        self.send_link(Method::PUT, from, link, params, Some(body))
            .await?;
        Ok(())
    }

    /// PUT `body` as JSON and deserialize the response as `T`.
    pub async fn put_read<B, T, R>(
        &self,
        from: &R,
        link: &str,
        body: &B,
        params: Option<&LinkParams>,
    ) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
        R: Resource + ?Sized,
    {
        let body = encode_body(body)?;
        let response = self
            .send_link(Method::PUT, from, link, params, Some(body))
            .await?;
        Self::read(response).await
    }

    /// DELETE without a body, ignoring any response body.
    pub async fn delete<R: Resource + ?Sized>(
        &self,
        from: &R,
        link: &str,
        params: Option<&LinkParams>,
    ) -> Result<()> {
        self.send_link(Method::DELETE, from, link, params, None)
            .await?;
        Ok(())
    }

    /// DELETE with `body` as JSON and deserialize the response as `T`.
    pub async fn delete_read<B, T, R>(
        &self,
        from: &R,
        link: &str,
        body: &B,
        params: Option<&LinkParams>,
    ) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
        R: Resource + ?Sized,
    {
        let body = encode_body(body)?;
        let response = self
            .send_link(Method::DELETE, from, link, params, Some(body))
            .await?;
        Self::read(response).await
    }
}
