// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Cached retrieval of configuration parameters and secrets from pluggable backends.
//!
//! A [`Provider`] wraps one [`ParameterSource`] (a backend that only knows how
//! to fetch raw values) and adds what every backend shares: a time-to-live
//! cache, decoding of values through a [`Transform`], and batch retrieval of
//! independently named parameters.
//!
//! # Overview
//!
//! - [`Provider::get`] fetches one value, serving it from the cache while it
//!   is younger than its `max_age` (5 seconds unless configured).
//! - [`Provider::get_multiple`] fetches every value under a path, decoding
//!   each entry on its own so one malformed entry does not sink the rest.
//! - [`Provider::get_parameters_by_name`] fetches a set of names with
//!   per-name overrides, using the backend's bulk primitive for cache misses
//!   and reporting failures through a [`BatchResult`].
//! - [`Parameters`] lazily builds one provider per store family and can clear
//!   all of their caches at once.
//!
//! The built-in [`stores`] cover a hierarchical parameter store, a secret
//! store, a structured application configuration store and a key-value
//! table. Each talks to its backend through a small client trait; the `aws`
//! feature implements those traits for the AWS SDK clients.
//!
//! # Example
//!
//! ```
//! use paramstore::{GetOptions, ParameterValue, Provider, Transform};
//! use tick::Clock;
//! # use std::collections::HashMap;
//! # use paramstore::{BackendOptions, Error, ParameterSource, RawValue, Result};
//! # struct Memory(HashMap<&'static str, &'static str>);
//! # impl ParameterSource for Memory {
//! #     fn name(&self) -> &'static str { "memory" }
//! #     async fn fetch_one(&self, name: &str, _: &BackendOptions) -> Result<RawValue> {
//! #         self.0.get(name).map(|v| RawValue::Text((*v).to_string())).ok_or_else(|| Error::retrieval(name.to_string()))
//! #     }
//! #     async fn fetch_many(&self, _: &str, _: &BackendOptions) -> Result<HashMap<String, RawValue>> {
//! #         Err(Error::configuration("listing is not supported"))
//! #     }
//! # }
//! # futures::executor::block_on(async {
//!
//! // `Memory` is any `ParameterSource`; the built-in stores are used the same way.
//! let source = Memory(HashMap::from([("/service/limits", r#"{"rps": 100}"#)]));
//! let provider = Provider::new(source, Clock::new_frozen());
//!
//! let limits = provider
//!     .get("/service/limits", &GetOptions::new().transform(Transform::Json))
//!     .await?;
//! assert_eq!(limits, ParameterValue::Json(serde_json::json!({"rps": 100})));
//!
//! // Served from the cache.
//! provider.get("/service/limits", &GetOptions::new().transform(Transform::Json)).await?;
//! assert_eq!(provider.cached_entries(), 1);
//! # Ok::<(), paramstore::Error>(())
//! # });
//! ```
//!
//! # Features
//!
//! - `aws`: client trait implementations for the AWS SDK and `AwsBackends`.
//! - `test-util`: in-memory fake clients in the `testing` module.

mod batch;
mod cache;
mod error;
mod facade;
pub mod options;
mod provider;
mod settings;
mod source;
pub mod stores;
mod telemetry;
mod transform;
mod value;

#[cfg(feature = "aws")]
#[cfg_attr(docsrs, doc(cfg(feature = "aws")))]
mod aws;

#[cfg(any(feature = "test-util", test))]
#[cfg_attr(docsrs, doc(cfg(feature = "test-util")))]
pub mod testing;

#[cfg(feature = "aws")]
#[doc(inline)]
pub use aws::{AwsBackends, AwsBackendsBuilder};
#[doc(inline)]
pub use batch::{BatchResult, ERRORS_KEY};
#[doc(inline)]
pub use error::{Error, ErrorKind, Result};
#[doc(inline)]
pub use facade::{Backends, Parameters};
#[doc(inline)]
pub use options::{BackendOptions, GetByNameOptions, GetOptions, ParameterOverrides};
#[doc(inline)]
pub use provider::{DEFAULT_MAX_AGE, MultipleValues, Provider, ProviderBuilder};
#[doc(inline)]
pub use settings::{DECRYPT_ENV, MAX_AGE_ENV, Settings};
#[doc(inline)]
pub use source::{BulkFetch, ParameterSource};
#[doc(inline)]
pub use stores::{AppConfigStore, ParameterStore, SecretStore, TableConfig, TableStore};
#[doc(inline)]
pub use transform::Transform;
#[doc(inline)]
pub use value::{ParameterValue, RawValue};
