// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Error types for parameter retrieval.

use std::fmt;

/// The category of a parameter retrieval failure.
///
/// Every [`Error`] carries exactly one kind, which tells the caller whether
/// the failure came from the backend, from decoding a value, or from invalid
/// usage of the library.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The backend call failed: the parameter was not found, access was denied,
    /// or the service could not be reached.
    Retrieval,
    /// A stored value could not be decoded under the requested transform.
    Transform,
    /// The provider or the request was configured incorrectly.
    ///
    /// Configuration errors are never recovered from and never retried.
    Configuration,
}

impl ErrorKind {
    /// Returns a stable, lowercase name for this kind.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Retrieval => "retrieval",
            Self::Transform => "transform",
            Self::Configuration => "configuration",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An error from a parameter operation.
///
/// Use [`Error::kind`] to distinguish backend failures from transform and
/// configuration failures. The underlying cause is kept in the error chain
/// and is available through [`std::error::Error::source()`].
///
/// # Examples
///
/// ```
/// use paramstore::{Error, ErrorKind};
///
/// let error = Error::retrieval("parameter /app/db not found");
/// assert_eq!(error.kind(), ErrorKind::Retrieval);
/// ```
#[ohno::error]
pub struct Error {
    kind: ErrorKind,
}

impl Error {
    /// Creates an error for a failed backend call.
    pub fn retrieval(cause: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::caused_by(ErrorKind::Retrieval, cause)
    }

    /// Creates an error for a value that could not be decoded.
    pub fn transform(cause: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::caused_by(ErrorKind::Transform, cause)
    }

    /// Creates an error for invalid configuration or usage.
    pub fn configuration(cause: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::caused_by(ErrorKind::Configuration, cause)
    }

    /// Returns the category of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns `true` if the backend call failed.
    #[must_use]
    pub fn is_retrieval(&self) -> bool {
        self.kind == ErrorKind::Retrieval
    }

    /// Returns `true` if a value could not be decoded.
    #[must_use]
    pub fn is_transform(&self) -> bool {
        self.kind == ErrorKind::Transform
    }

    /// Returns `true` if the provider or request was misconfigured.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        self.kind == ErrorKind::Configuration
    }
}

/// A specialized [`Result`] type for parameter operations.
pub type Result<T> = std::result::Result<T, Error>;
