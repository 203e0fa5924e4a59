//! Response-code classifier.
//!
//! Maps an envelope `code` to a semantic [`Outcome`]. Interpretation is kept
//! separate from presentation: callers decide what to show through
//! [`Outcome::notice`], and suppressed codes never reach the generic
//! notification path because the share navigator turns them into dedicated
//! states.

use crate::codes;

/// Semantic meaning of a response code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Proceed with the response body.
    Success,
    /// Show the message; the operation may be retried.
    Warning,
    /// Show the message and abort the current operation.
    HardError,
    /// Handled by a dedicated state machine instead of a notification.
    Suppressed(Suppressed),
}

/// Codes excluded from generic notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Suppressed {
    /// Share missing, cancelled or expired.
    NotFound,
    /// No password supplied or none on record.
    PasswordRequired,
    /// The password on record is wrong.
    PasswordIncorrect,
    /// Reserved; no UI action.
    Reserved,
}

/// A code outside the known table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("unclassified response code {0}")]
pub struct UnclassifiedCode(pub i64);

/// Severity of a user-facing notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Warning,
    Error,
}

/// A message destined for the generic notification surface (toast).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

/// Classifies a response code.
pub fn classify(code: i64) -> Result<Outcome, UnclassifiedCode> {
    match code {
        codes::OK => Ok(Outcome::Success),
        codes::FAILED | codes::INVALID_PARAMS => Ok(Outcome::Warning),
        codes::SERVER_FAULT => Ok(Outcome::HardError),
        codes::FS_ERROR | codes::STORAGE_WARNING => Ok(Outcome::Warning),
        codes::SHARE_NOT_FOUND => Ok(Outcome::Suppressed(Suppressed::NotFound)),
        codes::SHARE_PASSWORD_REQUIRED => Ok(Outcome::Suppressed(Suppressed::PasswordRequired)),
        codes::SHARE_PASSWORD_INCORRECT => {
            Ok(Outcome::Suppressed(Suppressed::PasswordIncorrect))
        }
        codes::UPLOAD_TASK_ERROR => Ok(Outcome::Suppressed(Suppressed::Reserved)),
        other => Err(UnclassifiedCode(other)),
    }
}

impl Outcome {
    /// Returns `true` for [`Outcome::Success`].
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success)
    }

    /// Returns the suppressed kind, if any.
    pub fn suppressed(&self) -> Option<Suppressed> {
        match self {
            Outcome::Suppressed(kind) => Some(*kind),
            _ => None,
        }
    }

    /// Builds the notice to display for this outcome, if any.
    pub fn notice(&self, message: &str) -> Option<Notice> {
        let level = match self {
            Outcome::Warning => NoticeLevel::Warning,
            Outcome::HardError => NoticeLevel::Error,
            Outcome::Success | Outcome::Suppressed(_) => return None,
        };
        Some(Notice {
            level,
            message: message.to_string(),
        })
    }
}
