use lanyue_protocol::{ApiError, Suppressed};

pub(crate) const MSG_SINK_UNAVAILABLE: &str = "download error";
pub(crate) const MSG_GENERIC: &str = "error during download";
pub(crate) const MSG_CANCELLED: &str = "download cancelled";
pub(crate) const MSG_NOT_FOUND: &str = "share not found or expired";
pub(crate) const MSG_PASSWORD_REQUIRED: &str = "password required";
pub(crate) const MSG_PASSWORD_INCORRECT: &str = "incorrect password";

/// Why a download failed. Converted to a user-facing message at the
/// pipeline boundary.
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    /// The local save destination could not be obtained.
    #[error("save target unavailable: {0}")]
    SinkUnavailable(std::io::Error),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("write failed: {0}")]
    Sink(std::io::Error),

    #[error("no data received for {0:?}")]
    Stalled(std::time::Duration),

    #[error("body ended after {received} of {expected} bytes")]
    Truncated { received: u64, expected: u64 },

    #[error("cancelled")]
    Cancelled,
}

impl DownloadError {
    pub fn user_message(&self) -> String {
        match self {
            DownloadError::SinkUnavailable(_) => MSG_SINK_UNAVAILABLE.into(),
            DownloadError::Cancelled => MSG_CANCELLED.into(),
            DownloadError::Api(ApiError::Rejected(r)) => match r.suppressed() {
                Some(Suppressed::NotFound) => MSG_NOT_FOUND.into(),
                Some(Suppressed::PasswordRequired) => MSG_PASSWORD_REQUIRED.into(),
                Some(Suppressed::PasswordIncorrect) => MSG_PASSWORD_INCORRECT.into(),
                Some(Suppressed::Reserved) => MSG_GENERIC.into(),
                None if r.message.is_empty() => MSG_GENERIC.into(),
                None => r.message.clone(),
            },
            _ => MSG_GENERIC.into(),
        }
    }
}
