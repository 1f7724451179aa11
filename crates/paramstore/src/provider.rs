// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Cached, transforming retrieval on top of any [`ParameterSource`].

use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
    time::Duration,
};

use tick::Clock;

use crate::{
    BackendOptions, BatchResult, Error, GetByNameOptions, GetOptions, ParameterOverrides, ParameterSource, ParameterValue, Result,
    Settings, Transform,
    batch::ERRORS_KEY,
    cache::{CacheKey, Cached, ParameterCache},
    options::keys,
    telemetry::{ClockExt, ProviderActivity, ProviderOperation, record},
};

/// Cache freshness window used when neither the provider nor the call sets one.
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(5);

/// Values returned by [`Provider::get_multiple`], keyed by sub-key.
///
/// `None` marks an entry whose value could not be transformed.
pub type MultipleValues = HashMap<String, Option<ParameterValue>>;

/// Builder for [`Provider`].
///
/// Created by [`Provider::builder`].
#[derive(Debug)]
pub struct ProviderBuilder<S> {
    source: S,
    clock: Clock,
    max_age: Duration,
}

impl<S: ParameterSource> ProviderBuilder<S> {
    /// Sets the default cache freshness window.
    #[must_use]
    pub fn max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    /// Applies the provider-wide parts of `settings`.
    #[must_use]
    pub fn settings(mut self, settings: &Settings) -> Self {
        self.max_age = settings.max_age;
        self
    }

    /// Builds the provider with an empty cache.
    #[must_use]
    pub fn build(self) -> Provider<S> {
        Provider {
            cache: ParameterCache::new(self.clock),
            source: self.source,
            max_age: self.max_age,
        }
    }
}

/// A parameter provider: one backend source plus its own cache.
///
/// `Provider` supplies the cache lookup, transform and batch bookkeeping that
/// every backend shares, and delegates raw fetches to its
/// [`ParameterSource`]. It is safe to share between concurrent callers.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use paramstore::{GetOptions, ParameterValue, Provider, Transform};
/// use tick::Clock;
/// # use std::collections::HashMap;
/// # use paramstore::{BackendOptions, Error, ParameterSource, RawValue, Result};
/// # struct Memory(HashMap<&'static str, &'static str>);
/// # impl ParameterSource for Memory {
/// #     fn name(&self) -> &'static str { "memory" }
/// #     async fn fetch_one(&self, name: &str, _: &BackendOptions) -> Result<RawValue> {
/// #         self.0.get(name).map(|v| RawValue::Text((*v).to_string())).ok_or_else(|| Error::retrieval(name.to_string()))
/// #     }
/// #     async fn fetch_many(&self, _: &str, _: &BackendOptions) -> Result<HashMap<String, RawValue>> {
/// #         Err(Error::configuration("listing is not supported"))
/// #     }
/// # }
/// # futures::executor::block_on(async {
///
/// let source = Memory(HashMap::from([("/app/config", r#"{"debug":true}"#)]));
/// let provider = Provider::builder(source, Clock::new_frozen())
///     .max_age(Duration::from_secs(30))
///     .build();
///
/// let value = provider
///     .get("/app/config", &GetOptions::new().transform(Transform::Json))
///     .await?;
/// assert_eq!(value, ParameterValue::Json(serde_json::json!({"debug": true})));
/// # Ok::<(), paramstore::Error>(())
/// # });
/// ```
#[derive(Debug)]
pub struct Provider<S> {
    source: S,
    cache: ParameterCache,
    max_age: Duration,
}

impl<S: ParameterSource> Provider<S> {
    /// Creates a builder for a provider over `source`, timed by `clock`.
    #[must_use]
    pub fn builder(source: S, clock: Clock) -> ProviderBuilder<S> {
        ProviderBuilder {
            source,
            clock,
            max_age: DEFAULT_MAX_AGE,
        }
    }

    /// Creates a provider with the default freshness window.
    #[must_use]
    pub fn new(source: S, clock: Clock) -> Self {
        Self::builder(source, clock).build()
    }

    /// Returns the backend source.
    #[must_use]
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Returns the freshness window used when a call does not set one.
    #[must_use]
    pub fn default_max_age(&self) -> Duration {
        self.max_age
    }

    /// Returns the number of cached entries, fresh or stale.
    #[must_use]
    pub fn cached_entries(&self) -> usize {
        self.cache.len()
    }

    /// Drops every cached value of this provider.
    pub fn clear_cache(&self) {
        self.cache.clear();
        record(self.source.name(), ProviderOperation::Clear, ProviderActivity::Cleared, "*", None);
    }

    /// Retrieves one parameter.
    ///
    /// A value cached less than `max_age` ago is returned without a backend
    /// call, unless `force_fetch` is set. A fetched value is transformed and
    /// then cached under the name, the resolved transform and the backend
    /// options.
    ///
    /// # Errors
    ///
    /// Returns a retrieval error if the backend call fails and a transform
    /// error if the value cannot be decoded.
    pub async fn get(&self, name: &str, options: &GetOptions) -> Result<ParameterValue> {
        let provider = self.source.name();
        let transform = options.transform.resolve(name);
        let key = CacheKey::single(provider, name, transform, &options.backend);

        if options.force_fetch {
            record(provider, ProviderOperation::Get, ProviderActivity::Bypass, name, None);
        } else if let Some(Cached::Value(value)) = self.cache.get(&key, self.max_age(options.max_age)) {
            record(provider, ProviderOperation::Get, ProviderActivity::Hit, name, None);
            return Ok(value);
        } else {
            record(provider, ProviderOperation::Get, ProviderActivity::Miss, name, None);
        }

        let raw = self
            .fetch(ProviderOperation::Get, name, self.source.fetch_one(name, &options.backend))
            .await?;
        let value = transform.apply(name, raw).inspect_err(|_| {
            record(provider, ProviderOperation::Get, ProviderActivity::TransformFailed, name, None);
        })?;

        self.cache.insert(key, Cached::Value(value.clone()));
        Ok(value)
    }

    /// Retrieves every value under a path or partition key.
    ///
    /// The transform is applied to each entry on its own; with
    /// [`Transform::Auto`] each sub-key's suffix selects its mode. An entry that
    /// fails to transform becomes `None`, unless
    /// [`GetOptions::raise_on_transform_error`] is set, in which case the whole
    /// call fails and nothing is cached.
    ///
    /// # Errors
    ///
    /// Returns a retrieval error if the backend call fails, a configuration
    /// error if the backend cannot list values, and a transform error in
    /// strict mode.
    pub async fn get_multiple(&self, path: &str, options: &GetOptions) -> Result<MultipleValues> {
        let provider = self.source.name();
        let strict = options.raise_on_transform_error;
        let key = CacheKey::multiple(provider, path, options.transform, strict, &options.backend);

        if options.force_fetch {
            record(provider, ProviderOperation::GetMultiple, ProviderActivity::Bypass, path, None);
        } else if let Some(Cached::Values(values)) = self.cache.get(&key, self.max_age(options.max_age)) {
            record(provider, ProviderOperation::GetMultiple, ProviderActivity::Hit, path, None);
            return Ok(values.as_ref().clone());
        } else {
            record(provider, ProviderOperation::GetMultiple, ProviderActivity::Miss, path, None);
        }

        let raw = self
            .fetch(ProviderOperation::GetMultiple, path, self.source.fetch_many(path, &options.backend))
            .await?;

        let mut values = MultipleValues::with_capacity(raw.len());
        for (sub_key, raw_value) in raw {
            match options.transform.apply(&sub_key, raw_value) {
                Ok(value) => {
                    values.insert(sub_key, Some(value));
                }
                Err(e) => {
                    record(provider, ProviderOperation::GetMultiple, ProviderActivity::TransformFailed, &sub_key, None);
                    if strict {
                        return Err(e);
                    }
                    values.insert(sub_key, None);
                }
            }
        }

        self.cache.insert(key, Cached::Values(Arc::new(values.clone())));
        Ok(values)
    }

    /// Retrieves a set of independently named parameters, each with its own overrides.
    ///
    /// Fresh cached values are served first. The remaining names are grouped
    /// by their effective backend options and fetched with the source's bulk
    /// primitive, split into chunks of [`ParameterSource::bulk_limit`].
    ///
    /// With the default options any failure fails the call. With
    /// [`GetByNameOptions::raise_on_error`] set to `false`, names that could not
    /// be retrieved or transformed are reported in [`BatchResult::errors`].
    ///
    /// # Errors
    ///
    /// Returns a configuration error, before any backend call, if a parameter
    /// is named [`ERRORS_KEY`]. In strict mode, returns the first transform
    /// or bulk-call error, or a retrieval error listing every missing name.
    pub async fn get_parameters_by_name<I, K>(&self, parameters: I, options: &GetByNameOptions) -> Result<BatchResult>
    where
        I: IntoIterator<Item = (K, ParameterOverrides)>,
        K: Into<String>,
    {
        let provider = self.source.name();
        let requests: BTreeMap<String, ParameterOverrides> = parameters.into_iter().map(|(name, o)| (name.into(), o)).collect();

        if requests.contains_key(ERRORS_KEY) {
            return Err(Error::configuration(format!(
                "parameter name '{ERRORS_KEY}' is reserved for reporting failed names"
            )));
        }

        let mut result = BatchResult::default();
        let mut groups: BTreeMap<String, (BackendOptions, Vec<PendingLookup>)> = BTreeMap::new();

        for (name, overrides) in requests {
            let transform = overrides.transform.unwrap_or(options.transform).resolve(&name);
            let max_age = self.max_age(overrides.max_age.or(options.max_age));
            let backend = match overrides.decrypt {
                Some(decrypt) => options.backend.merged(&BackendOptions::new().with(keys::DECRYPT, decrypt)),
                None => options.backend.clone(),
            };
            let key = CacheKey::single(provider, &name, transform, &backend);

            if options.force_fetch {
                record(provider, ProviderOperation::GetByName, ProviderActivity::Bypass, &name, None);
            } else if let Some(Cached::Value(value)) = self.cache.get(&key, max_age) {
                record(provider, ProviderOperation::GetByName, ProviderActivity::Hit, &name, None);
                result.insert_value(name, value);
                continue;
            } else {
                record(provider, ProviderOperation::GetByName, ProviderActivity::Miss, &name, None);
            }

            groups
                .entry(backend.fingerprint())
                .or_insert_with(|| (backend, Vec::new()))
                .1
                .push(PendingLookup { name, transform, key });
        }

        let limit = self.source.bulk_limit().max(1);
        for (backend, pending) in groups.into_values() {
            for chunk in pending.chunks(limit) {
                let names: Vec<String> = chunk.iter().map(|p| p.name.clone()).collect();
                let label = names.join(",");
                let fetched = self
                    .fetch(ProviderOperation::GetByName, &label, self.source.fetch_bulk(&names, &backend))
                    .await;

                let mut bulk = match fetched {
                    Ok(bulk) => bulk,
                    Err(e) if options.raise_on_error => return Err(e),
                    Err(_) => {
                        for lookup in chunk {
                            result.insert_error(lookup.name.clone());
                        }
                        continue;
                    }
                };

                for lookup in chunk {
                    let Some(raw) = bulk.values.remove(&lookup.name) else {
                        result.insert_error(lookup.name.clone());
                        continue;
                    };

                    match lookup.transform.apply(&lookup.name, raw) {
                        Ok(value) => {
                            self.cache.insert(lookup.key.clone(), Cached::Value(value.clone()));
                            result.insert_value(lookup.name.clone(), value);
                        }
                        Err(e) => {
                            record(provider, ProviderOperation::GetByName, ProviderActivity::TransformFailed, &lookup.name, None);
                            if options.raise_on_error {
                                return Err(e);
                            }
                            result.insert_error(lookup.name.clone());
                        }
                    }
                }
            }
        }

        if options.raise_on_error && !result.is_complete() {
            let failed: Vec<&str> = result.errors().iter().map(String::as_str).collect();
            return Err(Error::retrieval(format!("failed to retrieve parameters: {}", failed.join(", "))));
        }

        Ok(result)
    }

    fn max_age(&self, requested: Option<Duration>) -> Duration {
        requested.unwrap_or(self.max_age)
    }

    async fn fetch<T, F>(&self, operation: ProviderOperation, name: &str, fetch: F) -> Result<T>
    where
        F: Future<Output = Result<T>> + Send,
        T: Send,
    {
        let provider = self.source.name();
        let timed = self.cache.clock().timed_async(fetch).await;
        match &timed.result {
            Ok(_) => record(provider, operation, ProviderActivity::Fetched, name, Some(timed.duration)),
            Err(e) => {
                record(provider, operation, ProviderActivity::FetchFailed, name, Some(timed.duration));
                tracing::debug!(provider, parameter = name, error = %e, "backend call failed");
            }
        }
        timed.result
    }
}

/// A batch member that missed the cache.
#[derive(Debug)]
struct PendingLookup {
    name: String,
    transform: Transform,
    key: CacheKey,
}
