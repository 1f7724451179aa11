// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The contract every parameter backend implements.
//!
//! A [`ParameterSource`] only knows how to fetch raw values. Caching,
//! transforms and batch bookkeeping are supplied once by
//! [`Provider`](crate::Provider), which wraps any source.

use std::collections::HashMap;

use crate::{BackendOptions, RawValue, Result};

/// Raw outcome of one bulk lookup.
///
/// Every requested name ends up in exactly one of `values` or `failed`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BulkFetch {
    /// Names the backend returned, with their raw values.
    pub values: HashMap<String, RawValue>,
    /// Names the backend did not return or could not read.
    pub failed: Vec<String>,
}

/// Raw fetch operations for one kind of backend.
///
/// Implementations wrap backend client failures in
/// [`Error::retrieval`](crate::Error::retrieval) and report unsupported
/// operations with [`Error::configuration`](crate::Error::configuration).
///
/// # Examples
///
/// ```
/// use std::collections::HashMap;
/// use paramstore::{BackendOptions, Error, ParameterSource, RawValue, Result};
///
/// struct Static(HashMap<String, String>);
///
/// impl ParameterSource for Static {
///     fn name(&self) -> &'static str {
///         "static"
///     }
///
///     async fn fetch_one(&self, name: &str, _options: &BackendOptions) -> Result<RawValue> {
///         self.0
///             .get(name)
///             .map(|v| RawValue::Text(v.clone()))
///             .ok_or_else(|| Error::retrieval(format!("{name} not found")))
///     }
///
///     async fn fetch_many(&self, path: &str, _options: &BackendOptions) -> Result<HashMap<String, RawValue>> {
///         Ok(self
///             .0
///             .iter()
///             .filter_map(|(k, v)| k.strip_prefix(path).map(|rest| (rest.to_string(), RawValue::Text(v.clone()))))
///             .collect())
///     }
/// }
/// ```
pub trait ParameterSource: Send + Sync {
    /// Short name of the backend, used in logs and cache keys.
    fn name(&self) -> &'static str;

    /// Fetches the raw value of one parameter.
    fn fetch_one(&self, name: &str, options: &BackendOptions) -> impl Future<Output = Result<RawValue>> + Send;

    /// Fetches every value under a path or partition key, keyed by sub-key.
    fn fetch_many(&self, path: &str, options: &BackendOptions) -> impl Future<Output = Result<HashMap<String, RawValue>>> + Send;

    /// Maximum number of names accepted by one [`fetch_bulk`](Self::fetch_bulk) call.
    ///
    /// Larger requests are split into chunks of this size.
    fn bulk_limit(&self) -> usize {
        usize::MAX
    }

    /// Fetches several named parameters that share the same options.
    ///
    /// The default implementation calls [`fetch_one`](Self::fetch_one) for each
    /// name and isolates failures per name. Backends with a native bulk-get
    /// primitive override it together with [`bulk_limit`](Self::bulk_limit).
    ///
    /// An `Err` means the bulk call as a whole failed.
    fn fetch_bulk(&self, names: &[String], options: &BackendOptions) -> impl Future<Output = Result<BulkFetch>> + Send {
        async move {
            let mut bulk = BulkFetch::default();
            for name in names {
                match self.fetch_one(name, options).await {
                    Ok(value) => {
                        bulk.values.insert(name.clone(), value);
                    }
                    Err(e) => {
                        tracing::debug!(source = self.name(), parameter = %name, error = %e, "bulk member lookup failed");
                        bulk.failed.push(name.clone());
                    }
                }
            }
            Ok(bulk)
        }
    }
}
