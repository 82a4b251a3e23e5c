//! Typed handles over resource groups.
//!
//! A handle only knows its group name; every call loads the group through
//! the connection's cache and follows one of its operation links.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::connection::SeqConnection;
use crate::errors::Result;
use crate::link::{LinkParams, Resource};
use crate::model::ResourceGroup;

pub mod data;
pub mod events;

pub use data::{DataQuery, DataResourceGroup};
pub use events::{EventQuery, EventsResourceGroup};

/// Link names shared by most resource groups.
pub mod links {
    /// A single entity, templated on `{id}`.
    pub const ITEM: &str = "Item";
    /// A collection of entities.
    pub const ITEMS: &str = "Items";
    /// A blank entity to fill in and create.
    pub const TEMPLATE: &str = "Template";
    /// Creation endpoint.
    pub const CREATE: &str = "Create";
    /// An entity's own address, used for update and removal.
    pub const SELF: &str = "Self";
    /// Live WebSocket feed.
    pub const STREAM: &str = "Stream";
    /// Query endpoint.
    pub const QUERY: &str = "Query";
}

/// Generic operations on the resource group called `name`.
#[derive(Clone, Debug)]
pub struct ResourceGroupHandle {
    connection: SeqConnection,
    name: String,
}

impl ResourceGroupHandle {
    pub(crate) fn new<S: Into<String>>(connection: SeqConnection, name: S) -> Self {
        Self {
            connection,
            name: name.into(),
        }
    }

    /// Group name, without the `Resources` suffix.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The connection this handle goes through.
    pub fn connection(&self) -> &SeqConnection {
        &self.connection
    }

    /// The group resource itself, from the connection cache.
    pub async fn resource(&self) -> Result<Arc<ResourceGroup>> {
        self.connection.load_resource_group(&self.name).await
    }

    /// GET an arbitrary link of the group.
    pub async fn get<T: DeserializeOwned>(
        &self,
        link: &str,
        params: Option<&LinkParams>,
    ) -> Result<T> {
        let group = self.resource().await?;
        self.connection.client().get(group.as_ref(), link, params).await
    }

    /// The entity with `id`, through the `Item` link.
    pub async fn find<T: DeserializeOwned>(&self, id: &str) -> Result<T> {
        let params = LinkParams::new().with("id", id);
        self.get(links::ITEM, Some(&params)).await
    }

    /// Entities through the `Items` link.
    pub async fn list<T: DeserializeOwned>(&self, params: Option<&LinkParams>) -> Result<Vec<T>> {
        let group = self.resource().await?;
        self.connection
            .client()
            .list(group.as_ref(), links::ITEMS, params)
            .await
    }

    /// A blank entity through the `Template` link.
    pub async fn template<T: DeserializeOwned>(&self) -> Result<T> {
        self.get(links::TEMPLATE, None).await
    }

    /// POST `entity` to the `Create` link; returns the stored entity.
    pub async fn create<E, T>(&self, entity: &E) -> Result<T>
    where
        E: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let group = self.resource().await?;
        self.connection
            .client()
            .post_read(group.as_ref(), links::CREATE, entity, None)
            .await
    }

    /// PUT `entity` to its own `Self` link.
    pub async fn update<E: Resource + Serialize>(&self, entity: &E) -> Result<()> {
        self.connection
            .client()
            .put(entity, links::SELF, entity, None)
            .await
    }

    /// DELETE `entity` through its own `Self` link.
    pub async fn remove<E: Resource>(&self, entity: &E) -> Result<()> {
        self.connection.client().delete(entity, links::SELF, None).await
    }
}

impl SeqConnection {
    /// Handle on the group called `name` (e.g. `"Signals"`).
    pub fn group<S: Into<String>>(&self, name: S) -> ResourceGroupHandle {
        ResourceGroupHandle::new(self.clone(), name)
    }

    /// Handle on the `Events` group.
    pub fn events(&self) -> EventsResourceGroup {
        EventsResourceGroup::new(self.group(events::GROUP_NAME))
    }

    /// Handle on the `Data` group.
    pub fn data(&self) -> DataResourceGroup {
        DataResourceGroup::new(self.group(data::GROUP_NAME))
    }
}
