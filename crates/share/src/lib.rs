//! Browsing a share link.
//!
//! [`ShareNavigator`] tracks the directory being viewed, asks for a password
//! when the share requires one and remembers both across sessions through
//! [`KeyValueStore`]s.

pub mod api;
pub mod navigator;
pub mod path;
pub mod store;

pub use api::ShareApi;
pub use navigator::{Navigation, ShareNavigator, ShareState};
pub use path::PathStack;
pub use store::{JsonFileStore, KeyValueStore, MemoryStore, StoreError};
