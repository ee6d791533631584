//! Error taxonomy for storage operations and its `{code, message}` wire form.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Code carried by [`StoreError::NotFound`].
pub const CODE_NOT_FOUND: u16 = 404;

/// Code carried by [`StoreError::Internal`] and by anything unrecognised.
pub const CODE_INTERNAL: u16 = 500;

/// Errors from storage operations.
///
/// Every backend translates its native errors into one of these two variants
/// at its boundary. Provider messages are preserved verbatim.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The requested record does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Engine, transport or marshalling failure, or a misconfigured backend.
    #[error("internal error: {0}")]
    Internal(String),
}

impl StoreError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Numeric code of this error in the interchange format.
    pub fn code(&self) -> u16 {
        match self {
            Self::NotFound(_) => CODE_NOT_FOUND,
            Self::Internal(_) => CODE_INTERNAL,
        }
    }

    /// The bare message, without the variant prefix used by `Display`.
    pub fn message(&self) -> &str {
        match self {
            Self::NotFound(message) | Self::Internal(message) => message,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Check that a write touched exactly `expected` rows.
    ///
    /// A mismatch is reported as [`StoreError::Internal`].
    pub fn affected(expected: u64, actual: u64) -> StoreResult<()> {
        if expected == actual {
            return Ok(());
        }
        Err(Self::Internal(format!(
            "expected {expected} affected rows; got {actual} rows; no update made"
        )))
    }

    /// Serialize into the JSON interchange form.
    pub fn pack(&self) -> String {
        ErrorPayload::from(self).pack()
    }

    /// Parse the JSON interchange form. Never fails; see [`ErrorPayload::unpack`].
    pub fn unpack(raw: &[u8]) -> Self {
        ErrorPayload::unpack(raw).into()
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

/// Result alias for storage operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Cross-process error representation: `{"code": 404, "message": "..."}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub code: u16,
    pub message: String,
}

impl ErrorPayload {
    pub fn new(code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn pack(&self) -> String {
        serde_json::json!({ "code": self.code, "message": self.message }).to_string()
    }

    /// Parse a packed payload.
    ///
    /// Input that is not a JSON object yields an internal error whose message
    /// is the raw text. A missing or non-integer `code` becomes 500; a missing
    /// or non-string `message` becomes the raw text.
    pub fn unpack(raw: &[u8]) -> Self {
        let raw_text = String::from_utf8_lossy(raw).into_owned();
        let object = match serde_json::from_slice::<Value>(raw) {
            Ok(Value::Object(object)) => object,
            _ => return Self::new(CODE_INTERNAL, raw_text),
        };

        let code = object
            .get("code")
            .and_then(Value::as_u64)
            .and_then(|code| u16::try_from(code).ok())
            .unwrap_or(CODE_INTERNAL);
        let message = match object.get("message").and_then(Value::as_str) {
            Some(message) => message.to_owned(),
            None => raw_text,
        };

        Self { code, message }
    }
}

impl fmt::Display for ErrorPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] - {}", self.code, self.message)
    }
}

impl From<&StoreError> for ErrorPayload {
    fn from(err: &StoreError) -> Self {
        Self::new(err.code(), err.message())
    }
}

impl From<ErrorPayload> for StoreError {
    fn from(payload: ErrorPayload) -> Self {
        match payload.code {
            CODE_NOT_FOUND => StoreError::NotFound(payload.message),
            _ => StoreError::Internal(payload.message),
        }
    }
}
