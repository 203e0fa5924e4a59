//! Response codes carried in the `code` field of every JSON envelope.
//!
//! The backend reports application-level status through the envelope, not
//! through the HTTP status line, so every endpoint answers `200 OK` at the
//! transport level and these codes decide what actually happened.

/// Request succeeded; `data` holds the payload.
pub const OK: i64 = 200;

/// Generic failure with a human-readable message.
pub const FAILED: i64 = 410;

/// Request parameters failed validation.
pub const INVALID_PARAMS: i64 = 425;

/// Unexpected server-side fault.
pub const SERVER_FAULT: i64 = 430;

/// Filesystem error on the storage backend.
pub const FS_ERROR: i64 = 50000;

/// Share does not exist, was cancelled or has expired.
pub const SHARE_NOT_FOUND: i64 = 51100;

/// Share is protected and no password was supplied.
pub const SHARE_PASSWORD_REQUIRED: i64 = 51101;

/// Share is protected and the supplied password is wrong.
pub const SHARE_PASSWORD_INCORRECT: i64 = 51102;

/// Storage-level warning (capacity, mount state).
pub const STORAGE_WARNING: i64 = 52000;

/// Upload task error (missing task, mode or chunk index mismatch, cancelled).
pub const UPLOAD_TASK_ERROR: i64 = 52001;
