//! Wire records the core navigates through.
//!
//! These are plain values: they round-trip to and from JSON and carry their
//! [`LinkTable`](crate::LinkTable), nothing more.

mod events;
mod query;
mod root;

pub use events::{EventEntity, EventPropertyPart, MessageTemplateToken};
pub use query::{QueryResult, QuerySlice, QueryTimeSeries};
pub use root::{ErrorPayload, ResourceGroup, RootEntity};
