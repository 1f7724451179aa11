// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Per-call options for parameter operations.

use std::{collections::BTreeMap, time::Duration};

use crate::Transform;

/// Names of backend options understood by the built-in stores.
///
/// Any other key is passed through to the backend client untouched.
pub mod keys {
    /// Decrypt secure values (`bool`).
    pub const DECRYPT: &str = "decrypt";
    /// List a path hierarchy recursively (`bool`).
    pub const RECURSIVE: &str = "recursive";
    /// Sort attribute used to key multi-item table results (`string`).
    pub const SORT_ATTR: &str = "sort_attr";
    /// Request a strongly consistent table read (`bool`).
    pub const CONSISTENT_READ: &str = "consistent_read";
    /// Secret version identifier (`string`).
    pub const VERSION_ID: &str = "version_id";
    /// Secret version stage label (`string`).
    pub const VERSION_STAGE: &str = "version_stage";
}

/// An open-ended map of backend-specific options.
///
/// This layer does not validate the options; each store reads the keys it
/// knows about (see [`keys`]) and a backend client may read any others.
/// Options take part in cache keys, so two requests that differ only in
/// their options never share a cache entry.
///
/// # Examples
///
/// ```
/// use paramstore::{BackendOptions, options::keys};
///
/// let options = BackendOptions::new().with(keys::DECRYPT, true).with("max_results", 10);
/// assert_eq!(options.flag(keys::DECRYPT), Some(true));
/// assert_eq!(options.get("max_results"), Some(&serde_json::json!(10)));
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BackendOptions(BTreeMap<String, serde_json::Value>);

impl BackendOptions {
    /// Creates an empty option map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the map with `key` set to `value`.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Sets `key` to `value`, replacing any previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) {
        self.0.insert(key.into(), value.into());
    }

    /// Returns the raw value stored under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.0.get(key)
    }

    /// Returns `key` as a boolean, if present and boolean.
    #[must_use]
    pub fn flag(&self, key: &str) -> Option<bool> {
        self.0.get(key).and_then(serde_json::Value::as_bool)
    }

    /// Returns `key` as a string, if present and a string.
    #[must_use]
    pub fn text(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(serde_json::Value::as_str)
    }

    /// Returns a copy of these options with every entry of `overrides` applied on top.
    #[must_use]
    pub fn merged(&self, overrides: &Self) -> Self {
        let mut merged = self.clone();
        for (key, value) in &overrides.0 {
            merged.0.insert(key.clone(), value.clone());
        }
        merged
    }

    /// Returns a canonical string form: equal maps render identically and
    /// different maps never do.
    pub(crate) fn fingerprint(&self) -> String {
        if self.0.is_empty() {
            return String::new();
        }

        // A JSON object in key order; keys are quoted and escaped.
        let object: serde_json::Map<String, serde_json::Value> = self.0.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        serde_json::Value::Object(object).to_string()
    }
}

/// Options for [`Provider::get`](crate::Provider::get) and
/// [`Provider::get_multiple`](crate::Provider::get_multiple).
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use paramstore::{GetOptions, Transform};
///
/// let options = GetOptions::new()
///     .max_age(Duration::from_secs(60))
///     .transform(Transform::Json)
///     .decrypt(true);
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GetOptions {
    pub(crate) max_age: Option<Duration>,
    pub(crate) transform: Transform,
    pub(crate) force_fetch: bool,
    pub(crate) raise_on_transform_error: bool,
    pub(crate) backend: BackendOptions,
}

impl GetOptions {
    /// Creates options that use the provider defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the provider's cache freshness window for this call.
    #[must_use]
    pub fn max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }

    /// Sets the transform applied to fetched values.
    #[must_use]
    pub fn transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    /// Skips the cache lookup. The fetched value still replaces the cached one.
    #[must_use]
    pub fn force_fetch(mut self, force_fetch: bool) -> Self {
        self.force_fetch = force_fetch;
        self
    }

    /// For multi-value retrieval, fails the whole call on the first value that
    /// cannot be transformed instead of returning `None` for it.
    ///
    /// Single-value retrieval always reports transform failures.
    #[must_use]
    pub fn raise_on_transform_error(mut self, raise: bool) -> Self {
        self.raise_on_transform_error = raise;
        self
    }

    /// Requests decryption of secure values, where the backend supports it.
    #[must_use]
    pub fn decrypt(mut self, decrypt: bool) -> Self {
        self.backend.insert(keys::DECRYPT, decrypt);
        self
    }

    /// Sets a backend-specific option.
    #[must_use]
    pub fn backend_option(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.backend.insert(key, value);
        self
    }

    /// Replaces all backend-specific options.
    #[must_use]
    pub fn backend_options(mut self, backend: BackendOptions) -> Self {
        self.backend = backend;
        self
    }

    /// Returns the backend-specific options.
    #[must_use]
    pub fn backend(&self) -> &BackendOptions {
        &self.backend
    }
}

/// Per-parameter overrides for
/// [`Provider::get_parameters_by_name`](crate::Provider::get_parameters_by_name).
///
/// Fields left unset inherit the call-level [`GetByNameOptions`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParameterOverrides {
    pub(crate) max_age: Option<Duration>,
    pub(crate) transform: Option<Transform>,
    pub(crate) decrypt: Option<bool>,
}

impl ParameterOverrides {
    /// Creates overrides that inherit everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the freshness window for this parameter.
    #[must_use]
    pub fn max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }

    /// Overrides the transform for this parameter.
    #[must_use]
    pub fn transform(mut self, transform: Transform) -> Self {
        self.transform = Some(transform);
        self
    }

    /// Overrides decryption for this parameter.
    #[must_use]
    pub fn decrypt(mut self, decrypt: bool) -> Self {
        self.decrypt = Some(decrypt);
        self
    }
}

/// Call-level options for
/// [`Provider::get_parameters_by_name`](crate::Provider::get_parameters_by_name).
///
/// By default any failed lookup fails the whole call. Use
/// [`GetByNameOptions::raise_on_error`] with `false` to receive failed names
/// in [`BatchResult::errors`](crate::BatchResult::errors) instead.
#[derive(Clone, Debug, PartialEq)]
pub struct GetByNameOptions {
    pub(crate) max_age: Option<Duration>,
    pub(crate) transform: Transform,
    pub(crate) force_fetch: bool,
    pub(crate) raise_on_error: bool,
    pub(crate) backend: BackendOptions,
}

impl Default for GetByNameOptions {
    fn default() -> Self {
        Self {
            max_age: None,
            transform: Transform::None,
            force_fetch: false,
            raise_on_error: true,
            backend: BackendOptions::new(),
        }
    }
}

impl GetByNameOptions {
    /// Creates options that use the provider defaults and fail on any error.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Default freshness window for parameters without their own override.
    #[must_use]
    pub fn max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }

    /// Default transform for parameters without their own override.
    #[must_use]
    pub fn transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    /// Skips the cache lookup for every parameter.
    #[must_use]
    pub fn force_fetch(mut self, force_fetch: bool) -> Self {
        self.force_fetch = force_fetch;
        self
    }

    /// Chooses between failing the call on any error (`true`, the default) and
    /// reporting failed names alongside the values (`false`).
    #[must_use]
    pub fn raise_on_error(mut self, raise: bool) -> Self {
        self.raise_on_error = raise;
        self
    }

    /// Default decryption for parameters without their own override.
    #[must_use]
    pub fn decrypt(mut self, decrypt: bool) -> Self {
        self.backend.insert(keys::DECRYPT, decrypt);
        self
    }

    /// Sets a backend-specific option shared by every parameter.
    #[must_use]
    pub fn backend_option(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.backend.insert(key, value);
        self
    }
}
