//! The mailgate daemon: configuration, backend registry, HTTP surface and
//! a typed client for its `/send` endpoint.

pub mod client;
pub mod config;
pub mod http;
pub mod registry;

pub use client::{Client, ClientError};
pub use config::Config;
