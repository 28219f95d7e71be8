//! Error types for every data-layer operation.

use std::fmt;

use aws_sdk_dynamodb::error::BuildError;
use thiserror::Error;

use crate::dynamodb::TypeTag;

/// Top-level error type for the data layer.
///
/// Validation, schema, and codec errors are raised before any call reaches
/// the store and are never retried. Only [`Error::Store`] carries a code that
/// the retry executor inspects.
#[derive(Debug, Error)]
pub enum Error {
    /// Missing or incomplete key, malformed expression input, or malformed
    /// batch input.
    #[error("validation error: {0}")]
    Validation(String),

    /// Unknown table, unknown index, undeclared attribute, or an invalid
    /// schema configuration.
    #[error("schema error: {0}")]
    Schema(String),

    #[error(
        "type mismatch on '{table}.{attribute}': expected {expected:?}, got {actual:?}"
    )]
    TypeMismatch {
        table: String,
        attribute: String,
        expected: TypeTag,
        actual: TypeTag,
    },

    /// Schema-free encode of a value the store cannot represent.
    #[error("unsupported value for attribute '{attribute}': {reason}")]
    UnsupportedType { attribute: String, reason: String },

    #[error("decode error: {0}")]
    Decode(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("retries exhausted after {attempts} attempts: {source}")]
    RetryExhausted {
        attempts: u32,
        #[source]
        source: StoreError,
    },
}

impl Error {
    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }

    pub(crate) fn schema(msg: impl Into<String>) -> Self {
        Error::Schema(msg.into())
    }

    pub(crate) fn decode(msg: impl Into<String>) -> Self {
        Error::Decode(msg.into())
    }

    /// The store error code, if this error came from the store.
    pub fn store_code(&self) -> Option<&str> {
        match self {
            Error::Store(e) => e.code(),
            Error::RetryExhausted { source, .. } => source.code(),
            _ => None,
        }
    }
}

impl From<BuildError> for Error {
    fn from(err: BuildError) -> Self {
        Error::Validation(format!("malformed request: {err}"))
    }
}

/// A failed call to the underlying store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreError {
    code: Option<String>,
    message: String,
}

impl StoreError {
    pub fn new(code: Option<String>, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Shorthand for an error with a known code.
    pub fn with_code(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Some(code.into()), message)
    }

    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.code {
            Some(code) => write!(f, "store error ({code}): {}", self.message),
            None => write!(f, "store error: {}", self.message),
        }
    }
}

impl std::error::Error for StoreError {}

pub type Result<T> = std::result::Result<T, Error>;
