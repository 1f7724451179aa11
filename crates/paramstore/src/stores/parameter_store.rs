// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::collections::HashMap;

use crate::{BackendOptions, ParameterSource, RawValue, Result, options::keys, source::BulkFetch};

/// Largest number of names the parameter store accepts in one bulk lookup.
pub const MAX_BULK_NAMES: usize = 10;

/// One page of a path listing.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParameterPage {
    /// Full names and values of the parameters on this page.
    pub parameters: Vec<(String, String)>,
    /// Token for the next page, if the listing continues.
    pub next_token: Option<String>,
}

/// Outcome of one bulk lookup.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParametersBatch {
    /// Values of the names that were found.
    pub found: HashMap<String, String>,
    /// Names the store reported as missing or unreadable.
    pub invalid: Vec<String>,
}

/// The read calls a hierarchical parameter store client must offer.
///
/// Every call receives the caller's backend options so that clients can
/// honour keys this crate does not know about.
pub trait ParameterStoreClient: Send + Sync {
    /// Reads one parameter.
    fn get_parameter(&self, name: &str, decrypt: bool, options: &BackendOptions) -> impl Future<Output = Result<String>> + Send;

    /// Reads one page of the parameters under `path`.
    fn get_parameters_by_path(
        &self,
        path: &str,
        recursive: bool,
        decrypt: bool,
        next_token: Option<String>,
        options: &BackendOptions,
    ) -> impl Future<Output = Result<ParameterPage>> + Send;

    /// Reads up to [`MAX_BULK_NAMES`] parameters in one call.
    fn get_parameters(
        &self,
        names: &[String],
        decrypt: bool,
        options: &BackendOptions,
    ) -> impl Future<Output = Result<ParametersBatch>> + Send;
}

/// Source backed by a hierarchical key-value parameter store.
///
/// Recognized backend options are [`keys::DECRYPT`] and, for path listings,
/// [`keys::RECURSIVE`]. Decryption falls back to the store's default when a
/// call does not set it; listings are not recursive unless asked.
#[derive(Debug)]
pub struct ParameterStore<C> {
    client: C,
    default_decrypt: bool,
}

impl<C: ParameterStoreClient> ParameterStore<C> {
    /// Creates a source over `client` that does not decrypt by default.
    #[must_use]
    pub fn new(client: C) -> Self {
        Self {
            client,
            default_decrypt: false,
        }
    }

    /// Sets whether values are decrypted when a call does not say.
    #[must_use]
    pub fn with_default_decrypt(mut self, decrypt: bool) -> Self {
        self.default_decrypt = decrypt;
        self
    }

    /// Returns the underlying client.
    #[must_use]
    pub fn client(&self) -> &C {
        &self.client
    }

    fn decrypt(&self, options: &BackendOptions) -> bool {
        options.flag(keys::DECRYPT).unwrap_or(self.default_decrypt)
    }
}

impl<C: ParameterStoreClient> ParameterSource for ParameterStore<C> {
    fn name(&self) -> &'static str {
        "ssm"
    }

    async fn fetch_one(&self, name: &str, options: &BackendOptions) -> Result<RawValue> {
        self.client.get_parameter(name, self.decrypt(options), options).await.map(RawValue::Text)
    }

    async fn fetch_many(&self, path: &str, options: &BackendOptions) -> Result<HashMap<String, RawValue>> {
        let decrypt = self.decrypt(options);
        let recursive = options.flag(keys::RECURSIVE).unwrap_or(false);

        let mut values = HashMap::new();
        let mut next_token = None;
        loop {
            let page = self
                .client
                .get_parameters_by_path(path, recursive, decrypt, next_token, options)
                .await?;
            for (name, value) in page.parameters {
                values.insert(relative_name(path, &name).to_owned(), RawValue::Text(value));
            }

            match page.next_token {
                Some(token) => next_token = Some(token),
                None => break,
            }
        }

        Ok(values)
    }

    fn bulk_limit(&self) -> usize {
        MAX_BULK_NAMES
    }

    async fn fetch_bulk(&self, names: &[String], options: &BackendOptions) -> Result<BulkFetch> {
        let batch = self.client.get_parameters(names, self.decrypt(options), options).await?;

        let mut bulk = BulkFetch::default();
        let mut found = batch.found;
        for name in names {
            match found.remove(name) {
                Some(value) => {
                    bulk.values.insert(name.clone(), RawValue::Text(value));
                }
                None => bulk.failed.push(name.clone()),
            }
        }

        if !batch.invalid.is_empty() {
            tracing::debug!(invalid = ?batch.invalid, "parameter store reported invalid names");
        }

        Ok(bulk)
    }
}

/// Strips the listed path and any leading separators from a full parameter name.
fn relative_name<'a>(path: &str, name: &'a str) -> &'a str {
    name.strip_prefix(path).unwrap_or(name).trim_start_matches('/')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeParameterStore;

    #[test]
    fn relative_names() {
        assert_eq!(relative_name("/app", "/app/db/host"), "db/host");
        assert_eq!(relative_name("/app/", "/app/db"), "db");
        assert_eq!(relative_name("/other", "/app/db"), "app/db");
    }

    #[test]
    fn fetch_many_follows_every_page() {
        futures::executor::block_on(async {
            let client = FakeParameterStore::new()
                .with_page_size(2)
                .with_parameter("/app/a", "1")
                .with_parameter("/app/b", "2")
                .with_parameter("/app/c", "3")
                .with_parameter("/app/d/e", "4")
                .with_parameter("/other/x", "5");
            let store = ParameterStore::new(client.clone());

            let values = store
                .fetch_many("/app", &BackendOptions::new().with(keys::RECURSIVE, true))
                .await
                .unwrap();

            assert_eq!(values.len(), 4);
            assert_eq!(values["d/e"], RawValue::Text("4".to_string()));
            assert_eq!(client.calls().iter().filter(|c| c.starts_with("get_parameters_by_path")).count(), 2);
        });
    }

    #[test]
    fn non_recursive_listing_skips_nested_names() {
        futures::executor::block_on(async {
            let client = FakeParameterStore::new()
                .with_parameter("/app/a", "1")
                .with_parameter("/app/d/e", "4");
            let store = ParameterStore::new(client);

            let values = store.fetch_many("/app", &BackendOptions::new()).await.unwrap();

            assert_eq!(values.keys().collect::<Vec<_>>(), vec!["a"]);
        });
    }

    #[test]
    fn decrypt_defaults_to_store_setting() {
        futures::executor::block_on(async {
            let client = FakeParameterStore::new().with_secure_parameter("/app/key", "s3cret");

            let plain = ParameterStore::new(client.clone());
            assert_eq!(plain.fetch_one("/app/key", &BackendOptions::new()).await.unwrap(), RawValue::Text("<encrypted>".to_string()));

            let decrypting = ParameterStore::new(client.clone()).with_default_decrypt(true);
            assert_eq!(decrypting.fetch_one("/app/key", &BackendOptions::new()).await.unwrap(), RawValue::Text("s3cret".to_string()));

            let overridden = plain
                .fetch_one("/app/key", &BackendOptions::new().with(keys::DECRYPT, true))
                .await
                .unwrap();
            assert_eq!(overridden, RawValue::Text("s3cret".to_string()));
        });
    }

    #[test]
    fn fetch_bulk_isolates_missing_names() {
        futures::executor::block_on(async {
            let client = FakeParameterStore::new().with_parameter("/a", "1").with_parameter("/b", "2");
            let store = ParameterStore::new(client.clone());
            let names = vec!["/a".to_string(), "/b".to_string(), "/missing".to_string()];

            let bulk = store.fetch_bulk(&names, &BackendOptions::new()).await.unwrap();

            assert_eq!(bulk.values.len(), 2);
            assert_eq!(bulk.failed, vec!["/missing".to_string()]);
            assert_eq!(client.calls(), vec!["get_parameters:/a,/b,/missing"]);
        });
    }

    #[test]
    fn missing_parameter_is_a_retrieval_error() {
        futures::executor::block_on(async {
            let store = ParameterStore::new(FakeParameterStore::new());
            let err = store.fetch_one("/nope", &BackendOptions::new()).await.unwrap_err();
            assert!(err.is_retrieval());
        });
    }
}
