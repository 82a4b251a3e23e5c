//! A mock Seq server for end-to-end tests of `seq-api`.
//!
//! ```no_run
//! # async fn run() -> anyhow::Result<()> {
//! use seq_api_testnet::MockSeqServer;
//!
//! let server = MockSeqServer::builder().api_key("secret").start().await?;
//! server.log("Error", "Disk full");
//!
//! let connection = server.connection()?;
//! let group = connection.load_resource_group("Events").await?;
//! # Ok(())
//! # }
//! ```

mod http_error;
mod mock_server;
mod routes;
mod state;

pub use mock_server::{MockSeqServer, MockSeqServerBuilder};
pub use routes::data::COUNT_QUERY;
pub use state::SESSION_COOKIE;

// Re-export the client crate
pub use seq_api;
