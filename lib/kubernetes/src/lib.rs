mod client;
pub mod config;
mod resource;

pub use client::{Client, Error, ErrorResponse, ListParams, VersionMatch};
pub use config::{Auth, Config, RefreshableToken, TlsMaterial};
pub use resource::{ApiResource, ListMeta, ObjectList};
