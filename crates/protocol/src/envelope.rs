use serde::{Deserialize, Serialize};

use crate::classify::{Outcome, UnclassifiedCode, classify};
use crate::codes;
use crate::error::{ApiError, Rejection};

/// Envelope for every non-streaming response.
///
/// `data` defaults to an untyped JSON value so the envelope can be parsed
/// before the caller knows what payload to expect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct Envelope<T = serde_json::Value> {
    pub code: i64,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub data: Option<T>,
}

impl<T> Envelope<T> {
    /// Creates a success envelope carrying `data`.
    pub fn ok(data: T) -> Self {
        Self {
            code: codes::OK,
            message: None,
            data: Some(data),
        }
    }

    /// Creates an error envelope.
    pub fn error(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: Some(message.into()),
            data: None,
        }
    }

    /// Classifies the envelope code.
    pub fn outcome(&self) -> Result<Outcome, UnclassifiedCode> {
        classify(self.code)
    }

    /// Returns the data of a success envelope, or the rejection otherwise.
    pub fn accept(self) -> Result<Option<T>, ApiError> {
        match classify(self.code) {
            Ok(Outcome::Success) => Ok(self.data),
            _ => Err(ApiError::Rejected(Rejection::new(
                self.code,
                self.message.unwrap_or_default(),
            ))),
        }
    }

    /// Like [`accept`](Self::accept) but treats a missing payload as a
    /// protocol violation.
    pub fn require(self) -> Result<T, ApiError> {
        self.accept()?
            .ok_or_else(|| ApiError::Protocol("success envelope without data".into()))
    }
}

impl Envelope<serde_json::Value> {
    /// Deserializes the untyped payload into `T`.
    pub fn parse_data<T: for<'de> Deserialize<'de>>(&self) -> Result<Option<T>, serde_json::Error> {
        match &self.data {
            Some(serde_json::Value::Null) | None => Ok(None),
            Some(raw) => Ok(Some(T::deserialize(raw)?)),
        }
    }
}
