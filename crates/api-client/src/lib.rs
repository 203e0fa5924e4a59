//! HTTP client for the Lanyue storage API.
//!
//! [`ApiClient`] implements the upload, share and source seams used by the
//! transfer crates, configured through a TOML-backed [`ClientConfig`].

pub mod client;
pub mod config;

pub use client::{ApiClient, ClientError};
pub use config::{ClientConfig, ConfigError, RetryConfig, TransportMode};
