//! The connection facade: one client plus the link metadata discovered from it.

pub mod cache;
pub mod core;

pub use cache::{group_link_name, GROUP_LINK_SUFFIX};
pub use self::core::{
    SeqConnection, SeqConnectionBuilder, API_KEY_ENV, DEFAULT_SERVER_URL, SERVER_URL_ENV,
};
