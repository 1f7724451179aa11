// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Raw and decoded parameter values.

use serde::de::DeserializeOwned;

use crate::{Error, Result};

/// A value exactly as returned by a backend, before any transform.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum RawValue {
    /// A textual value, such as a parameter string or a secret string.
    Text(String),
    /// An opaque binary value, such as a binary secret or a configuration blob.
    Binary(Vec<u8>),
}

impl RawValue {
    /// Creates a raw value from bytes, preferring [`RawValue::Text`] when the
    /// bytes are valid UTF-8.
    #[must_use]
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        match String::from_utf8(bytes) {
            Ok(text) => Self::Text(text),
            Err(e) => Self::Binary(e.into_bytes()),
        }
    }

    /// Returns the value as a byte slice regardless of its variant.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Text(text) => text.as_bytes(),
            Self::Binary(bytes) => bytes,
        }
    }

    /// Returns the text if this is a [`RawValue::Text`].
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Binary(_) => None,
        }
    }
}

impl From<String> for RawValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<Vec<u8>> for RawValue {
    fn from(value: Vec<u8>) -> Self {
        Self::Binary(value)
    }
}

/// A parameter value after its transform has been applied.
///
/// # Examples
///
/// ```
/// use paramstore::ParameterValue;
///
/// let value = ParameterValue::Json(serde_json::json!({"port": 5432}));
/// assert_eq!(value.as_json().unwrap()["port"], 5432);
/// assert!(value.as_text().is_none());
/// ```
#[derive(Clone, Debug, PartialEq)]
pub enum ParameterValue {
    /// Text passed through unchanged.
    Text(String),
    /// Bytes, either passed through or decoded from base64.
    Binary(Vec<u8>),
    /// A parsed JSON document.
    Json(serde_json::Value),
}

impl ParameterValue {
    /// Returns the text if this is a [`ParameterValue::Text`].
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Returns the bytes if this is a [`ParameterValue::Binary`].
    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Binary(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Returns the document if this is a [`ParameterValue::Json`].
    #[must_use]
    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Json(json) => Some(json),
            _ => None,
        }
    }

    /// Deserializes a JSON value into `T`.
    ///
    /// # Errors
    ///
    /// Returns a transform error if the value is not JSON or does not match `T`.
    ///
    /// # Examples
    ///
    /// ```
    /// use paramstore::ParameterValue;
    ///
    /// let value = ParameterValue::Json(serde_json::json!([1, 2, 3]));
    /// let numbers: Vec<u32> = value.deserialize()?;
    /// assert_eq!(numbers, vec![1, 2, 3]);
    /// # Ok::<(), paramstore::Error>(())
    /// ```
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T> {
        match self {
            Self::Json(json) => T::deserialize(json).map_err(Error::transform),
            Self::Text(_) => Err(Error::transform("text value cannot be deserialized, request the json transform")),
            Self::Binary(_) => Err(Error::transform("binary value cannot be deserialized, request the json transform")),
        }
    }
}
