use chrono::{DateTime, Utc};

use super::{links, ResourceGroupHandle};
use crate::errors::Result;
use crate::link::LinkParams;
use crate::model::EventEntity;
use crate::stream::{LinkStream, ObservableStream};

/// Name of the events group on the root resource.
pub const GROUP_NAME: &str = "Events";

/// Filters for listing and streaming events.
///
/// Only the fields that are set become link parameters, so a query never
/// names a variable the server's template does not declare unless asked to.
///
/// ```
/// # use seq_api::EventQuery;
/// let query = EventQuery::new().filter("@Level = 'Error'").count(50).render(true);
/// let params = query.to_params();
/// assert_eq!(params.len(), 3);
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
#[must_use]
pub struct EventQuery {
    filter: Option<String>,
    count: Option<u32>,
    signal: Option<String>,
    after_id: Option<String>,
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
    render: bool,
}

impl EventQuery {
    /// No filters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Server-side filter expression.
    pub fn filter<S: Into<String>>(mut self, filter: S) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// Maximum number of events.
    pub const fn count(mut self, count: u32) -> Self {
        self.count = Some(count);
        self
    }

    /// Restrict to a signal (or `,`-separated signal expression).
    pub fn signal<S: Into<String>>(mut self, signal: S) -> Self {
        self.signal = Some(signal.into());
        self
    }

    /// Page past the event with this id.
    pub fn after_id<S: Into<String>>(mut self, id: S) -> Self {
        self.after_id = Some(id.into());
        self
    }

    /// Lower timestamp bound.
    pub const fn from_date(mut self, from: DateTime<Utc>) -> Self {
        self.from = Some(from);
        self
    }

    /// Upper timestamp bound.
    pub const fn to_date(mut self, to: DateTime<Utc>) -> Self {
        self.to = Some(to);
        self
    }

    /// Ask the server to render messages.
    pub const fn render(mut self, render: bool) -> Self {
        self.render = render;
        self
    }

    /// Link parameters for the fields that are set.
    pub fn to_params(&self) -> LinkParams {
        LinkParams::new()
            .with_opt("filter", self.filter.as_deref())
            .with_opt("count", self.count)
            .with_opt("signal", self.signal.as_deref())
            .with_opt("afterId", self.after_id.as_deref())
            .with_opt("fromDateUtc", self.from)
            .with_opt("toDateUtc", self.to)
            .with_opt("render", self.render.then_some(true))
    }
}

/// The `Events` group: find, list and stream log events.
#[derive(Clone, Debug)]
pub struct EventsResourceGroup {
    group: ResourceGroupHandle,
}

impl EventsResourceGroup {
    pub(crate) fn new(group: ResourceGroupHandle) -> Self {
        Self { group }
    }

    /// Generic operations on the same group.
    pub fn handle(&self) -> &ResourceGroupHandle {
        &self.group
    }

    /// The event with `id`.
    pub async fn find(&self, id: &str) -> Result<EventEntity> {
        self.group.find(id).await
    }

    /// The event with `id`, with its message rendered by the server.
    pub async fn find_rendered(&self, id: &str) -> Result<EventEntity> {
        let params = LinkParams::new().with("id", id).with("render", true);
        self.group.get(links::ITEM, Some(&params)).await
    }

    /// Events matching `query`, newest first.
    pub async fn list(&self, query: &EventQuery) -> Result<Vec<EventEntity>> {
        let params = query.to_params();
        self.group.list(Some(&params)).await
    }

    /// Delete the event.
    pub async fn remove(&self, event: &EventEntity) -> Result<()> {
        self.group.remove(event).await
    }

    /// Live feed of events matching `query` for a single consumer.
    pub async fn stream(&self, query: &EventQuery) -> Result<LinkStream<EventEntity>> {
        let group = self.group.resource().await?;
        let params = query.to_params();
        self.group
            .connection()
            .client()
            .connect(group.as_ref(), links::STREAM, Some(&params), None)
            .await
    }

    /// Live feed of events matching `query`, shared by any number of observers.
    pub async fn observe(&self, query: &EventQuery) -> Result<ObservableStream<EventEntity>> {
        let group = self.group.resource().await?;
        let params = query.to_params();
        self.group
            .connection()
            .client()
            .observe(group.as_ref(), links::STREAM, Some(&params), None)
            .await
    }
}
