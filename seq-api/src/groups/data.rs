use std::time::Duration;

use chrono::{DateTime, Utc};

use super::{links, ResourceGroupHandle};
use crate::errors::Result;
use crate::link::LinkParams;
use crate::model::QueryResult;

/// Name of the data group on the root resource.
pub const GROUP_NAME: &str = "Data";

/// A query against the `Data` group.
#[derive(Clone, Debug, PartialEq)]
#[must_use]
pub struct DataQuery {
    query: String,
    range_start: DateTime<Utc>,
    range_end: Option<DateTime<Utc>>,
    signal: Option<String>,
    timeout: Option<Duration>,
}

impl DataQuery {
    /// `query` over events from `range_start` onwards.
    pub fn new<S: Into<String>>(query: S, range_start: DateTime<Utc>) -> Self {
        Self {
            query: query.into(),
            range_start,
            range_end: None,
            signal: None,
            timeout: None,
        }
    }

    /// Exclusive upper bound of the range; the server defaults to now.
    pub const fn range_end(mut self, end: DateTime<Utc>) -> Self {
        self.range_end = Some(end);
        self
    }

    /// Only consider events in this signal.
    pub fn signal<S: Into<String>>(mut self, signal: S) -> Self {
        self.signal = Some(signal.into());
        self
    }

    /// Server-side execution limit.
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Link parameters for the query.
    pub fn to_params(&self) -> LinkParams {
        let timeout_ms = self
            .timeout
            .map(|t| u64::try_from(t.as_millis()).unwrap_or(u64::MAX));
        LinkParams::new()
            .with("q", self.query.as_str())
            .with("rangeStartUtc", self.range_start)
            .with_opt("rangeEndUtc", self.range_end)
            .with_opt("signal", self.signal.as_deref())
            .with_opt("timeoutMS", timeout_ms)
    }
}

/// The `Data` group: SQL-style queries over stored events.
#[derive(Clone, Debug)]
pub struct DataResourceGroup {
    group: ResourceGroupHandle,
}

impl DataResourceGroup {
    pub(crate) fn new(group: ResourceGroupHandle) -> Self {
        Self { group }
    }

    /// Generic operations on the same group.
    pub fn handle(&self) -> &ResourceGroupHandle {
        &self.group
    }

    /// Run `query` through the `Query` link.
    ///
    /// Query failures reported by the server in a successful response come
    /// back as [`QueryResult::Error`]; transport and status failures as `Err`.
    pub async fn query(&self, query: &DataQuery) -> Result<QueryResult> {
        let params = query.to_params();
        self.group.get(links::QUERY, Some(&params)).await
    }

    /// Run `query` and return the server's CSV rendering.
    pub async fn query_csv(&self, query: &DataQuery) -> Result<String> {
        let group = self.group.resource().await?;
        let params = query.to_params().with("format", "text/csv");
        self.group
            .connection()
            .client()
            .get_string(group.as_ref(), links::QUERY, Some(&params))
            .await
    }
}
