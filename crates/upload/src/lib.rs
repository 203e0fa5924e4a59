//! Upload sessions against the Lanyue storage API.
//!
//! [`UploadSessionManager`] wraps the individual endpoints of an upload task;
//! [`UploadDriver`] uses it to push a whole local file, resuming from the
//! server's chunk cursor.

pub mod api;
pub mod body;
pub mod driver;
pub mod error;
pub mod manager;

pub use api::{ProgressCallback, UploadApi};
pub use body::{BodyReader, UploadBody};
pub use driver::{UploadDriver, UploadEvent, describe_file, guess_mime_type};
pub use error::UploadError;
pub use manager::UploadSessionManager;

#[cfg(test)]
pub(crate) mod testing;
