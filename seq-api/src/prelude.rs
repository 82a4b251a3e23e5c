//! Common imports for quick starts.

// Common
pub use crate::{BuildError, Error, Result};

// Transport
pub use crate::{SeqApiClient, SeqApiClientBuilder};

// Cached navigation from the root resource
pub use crate::{SeqConnection, SeqConnectionBuilder};

// Links and the entities that carry them
pub use crate::{LinkParams, LinkTable, Resource};

// Typed groups
pub use crate::{DataQuery, EventQuery};

// Live feeds
pub use crate::{LinkStream, ObservableStream, Observer, Subscription};
