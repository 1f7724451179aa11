// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::collections::HashMap;

use crate::{BackendOptions, Error, ParameterSource, RawValue, Result, options::keys};

/// Identifies the secret version to read.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SecretRequest {
    /// Name or identifier of the secret.
    pub secret_id: String,
    /// Exact version to read.
    pub version_id: Option<String>,
    /// Staging label of the version to read.
    pub version_stage: Option<String>,
}

/// The read call a secret store client must offer.
pub trait SecretStoreClient: Send + Sync {
    /// Reads a secret, as text when it was stored as a string and as bytes otherwise.
    ///
    /// `options` carries the caller's backend options, including keys this
    /// crate does not interpret.
    fn get_secret_value(&self, request: SecretRequest, options: &BackendOptions) -> impl Future<Output = Result<RawValue>> + Send;
}

/// Source backed by a flat secret store.
///
/// Secrets are looked up by name only. [`keys::VERSION_ID`] and
/// [`keys::VERSION_STAGE`] select a version other than the current one.
#[derive(Debug)]
pub struct SecretStore<C> {
    client: C,
}

impl<C: SecretStoreClient> SecretStore<C> {
    /// Creates a source over `client`.
    #[must_use]
    pub fn new(client: C) -> Self {
        Self { client }
    }

    /// Returns the underlying client.
    #[must_use]
    pub fn client(&self) -> &C {
        &self.client
    }
}

impl<C: SecretStoreClient> ParameterSource for SecretStore<C> {
    fn name(&self) -> &'static str {
        "secrets"
    }

    async fn fetch_one(&self, name: &str, options: &BackendOptions) -> Result<RawValue> {
        let request = SecretRequest {
            secret_id: name.to_owned(),
            version_id: options.text(keys::VERSION_ID).map(str::to_owned),
            version_stage: options.text(keys::VERSION_STAGE).map(str::to_owned),
        };
        self.client.get_secret_value(request, options).await
    }

    async fn fetch_many(&self, path: &str, _options: &BackendOptions) -> Result<HashMap<String, RawValue>> {
        Err(Error::configuration(format!(
            "the secret store cannot list secrets under '{path}'"
        )))
    }
}
