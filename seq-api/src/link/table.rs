use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::Link;
use crate::errors::{NavigationError, Result};

/// The links a resource advertises, keyed by case-insensitive name.
///
/// Serialized as a JSON object (`{"Self": "api/events/1", ...}`). Names keep
/// the casing the server sent; lookups ignore ASCII case. Tables are small, so
/// entries live in a vector in arrival order.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct LinkTable {
    entries: Vec<(String, Link)>,
}

impl LinkTable {
    /// An empty table, as carried by resources not yet sent to the server.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the link called `name` (builder-style).
    #[must_use]
    pub fn with<N: Into<String>, L: Into<Link>>(mut self, name: N, link: L) -> Self {
        self.insert(name, link);
        self
    }

    /// Add or replace the link called `name`, returning the previous link.
    pub fn insert<N: Into<String>, L: Into<Link>>(&mut self, name: N, link: L) -> Option<Link> {
        let name = name.into();
        let link = link.into();
        match self
            .entries
            .iter_mut()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(&name))
        {
            Some(slot) => Some(std::mem::replace(&mut slot.1, link)),
            None => {
                self.entries.push((name, link));
                None
            }
        }
    }

    /// The link called `name`, ignoring ASCII case.
    pub fn get(&self, name: &str) -> Option<&Link> {
        self.entries
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
            .map(|(_, link)| link)
    }

    /// The link called `name`, or [`NavigationError::LinkNotAvailable`].
    pub fn require(&self, name: &str) -> Result<&Link> {
        self.get(name).ok_or_else(|| {
            NavigationError::LinkNotAvailable {
                link: name.to_string(),
                available: self.names().map(str::to_string).collect(),
            }
            .into()
        })
    }

    /// True when a link called `name` exists.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Link names as sent by the server.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    /// Iterate over `(name, link)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Link)> {
        self.entries.iter().map(|(name, link)| (name.as_str(), link))
    }

    /// Number of links.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True for tables with no links.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for LinkTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.entries.iter().map(|(n, l)| (n, l.template())))
            .finish()
    }
}

impl<N: Into<String>, L: Into<Link>> FromIterator<(N, L)> for LinkTable {
    fn from_iter<I: IntoIterator<Item = (N, L)>>(iter: I) -> Self {
        let mut table = LinkTable::new();
        for (name, link) in iter {
            table.insert(name, link);
        }
        table
    }
}

impl Serialize for LinkTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, link) in &self.entries {
            map.serialize_entry(name, link)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for LinkTable {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct TableVisitor;

        impl<'de> Visitor<'de> for TableVisitor {
            type Value = LinkTable;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of link names to URI templates")
            }

            fn visit_unit<E: serde::de::Error>(self) -> std::result::Result<LinkTable, E> {
                Ok(LinkTable::new())
            }

            fn visit_map<A: MapAccess<'de>>(
                self,
                mut access: A,
            ) -> std::result::Result<LinkTable, A::Error> {
                let mut table = LinkTable::new();
                while let Some((name, link)) = access.next_entry::<String, Link>()? {
                    table.insert(name, link);
                }
                Ok(table)
            }
        }

        deserializer.deserialize_any(TableVisitor)
    }
}

/// A server resource: something that carries a [`LinkTable`].
///
/// Navigation always re-enters the client explicitly with a resource's links;
/// the resource itself holds no connection.
pub trait Resource {
    /// The links this resource advertises.
    fn links(&self) -> &LinkTable;

    /// Server-assigned identifier, if any.
    fn id(&self) -> Option<&str> {
        None
    }
}

impl Resource for LinkTable {
    fn links(&self) -> &LinkTable {
        self
    }
}

impl<R: Resource + ?Sized> Resource for &R {
    fn links(&self) -> &LinkTable {
        (**self).links()
    }

    fn id(&self) -> Option<&str> {
        (**self).id()
    }
}
