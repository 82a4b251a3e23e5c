#![doc = include_str!("../README.md")]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![cfg_attr(any(), deny(clippy::unwrap_used))]

mod client;
mod connection;
pub mod errors;
mod groups;
mod link;
mod macros;
mod model;
mod stream;
mod util;

pub mod prelude;

// --- PUBLIC API EXPORTS ---
// Transport
pub use client::core::{
    SeqApiClient, SeqApiClientBuilder, API_KEY_HEADER, DEFAULT_SOCKET_CLOSE_TIMEOUT,
    SEQ_API_MEDIA_TYPE,
};
pub use client::http::ROOT_PATH;

// Connection and resource groups
pub use connection::{
    group_link_name, SeqConnection, SeqConnectionBuilder, API_KEY_ENV, DEFAULT_SERVER_URL,
    GROUP_LINK_SUFFIX, SERVER_URL_ENV,
};
pub use groups::{
    links, DataQuery, DataResourceGroup, EventQuery, EventsResourceGroup, ResourceGroupHandle,
};

// Links
pub use link::{resolve, Link, LinkParams, LinkTable, ParamValue, Resource};

// Entities
pub use model::{
    ErrorPayload, EventEntity, EventPropertyPart, MessageTemplateToken, QueryResult, QuerySlice,
    QueryTimeSeries, ResourceGroup, RootEntity,
};

// Streaming
pub use stream::{LinkStream, MessageDecoder, ObservableStream, Observer, StreamState, Subscription};

// Errors
pub use errors::{BoxError, BuildError, Error, Result};

// Re-exports
pub use reqwest::{Method, StatusCode};
