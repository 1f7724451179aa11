// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! One-stop retrieval across the built-in stores.

use std::{
    collections::HashMap,
    sync::{Arc, OnceLock},
};

use parking_lot::Mutex;
use tick::Clock;

use crate::{
    BatchResult, GetByNameOptions, GetOptions, MultipleValues, ParameterOverrides, ParameterValue, Provider, Result, Settings,
    stores::{AppConfigClient, AppConfigStore, ParameterStore, ParameterStoreClient, SecretStore, SecretStoreClient},
};

/// Creates the backend clients behind [`Parameters`].
///
/// Each factory method is called at most once per provider the facade
/// builds, on first use of that provider.
pub trait Backends: Send + Sync {
    /// Client of the hierarchical parameter store.
    type ParameterClient: ParameterStoreClient;
    /// Client of the secret store.
    type SecretClient: SecretStoreClient;
    /// Client of the structured application configuration store.
    type AppConfigClient: AppConfigClient;

    /// Creates a parameter store client.
    fn parameter_client(&self) -> Self::ParameterClient;

    /// Creates a secret store client.
    fn secret_client(&self) -> Self::SecretClient;

    /// Creates an application configuration client.
    fn app_config_client(&self) -> Self::AppConfigClient;
}

type AppConfigProvider<B> = Provider<AppConfigStore<<B as Backends>::AppConfigClient>>;

/// Default providers for every store family, built lazily and shared.
///
/// The first call for a family builds its provider from the [`Backends`]
/// and the [`Settings`]; later calls reuse it, cache included. Application
/// configuration gets one provider per application and environment.
/// [`clear_caches`](Self::clear_caches) empties every provider built so far.
///
/// A process typically keeps one `Parameters` for its whole lifetime.
///
/// # Examples
///
/// ```
/// use paramstore::{Backends, GetOptions, Parameters, Result};
///
/// async fn database_url<B: Backends>(parameters: &Parameters<B>) -> Result<String> {
///     let host = parameters.get_parameter("/app/db/host", &GetOptions::new()).await?;
///     let password = parameters.get_secret("db-password", &GetOptions::new()).await?;
///
///     Ok(format!(
///         "postgres://app:{}@{}/app",
///         password.as_text().unwrap_or_default(),
///         host.as_text().unwrap_or_default()
///     ))
/// }
/// ```
pub struct Parameters<B: Backends> {
    backends: B,
    clock: Clock,
    settings: Settings,
    parameter_store: OnceLock<Provider<ParameterStore<B::ParameterClient>>>,
    secret_store: OnceLock<Provider<SecretStore<B::SecretClient>>>,
    app_configs: Mutex<HashMap<(String, String), Arc<AppConfigProvider<B>>>>,
}

impl<B: Backends + std::fmt::Debug> std::fmt::Debug for Parameters<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Parameters")
            .field("backends", &self.backends)
            .field("settings", &self.settings)
            .field("parameter_store", &self.parameter_store.get().is_some())
            .field("secret_store", &self.secret_store.get().is_some())
            .field("app_configs", &self.app_configs.lock().len())
            .finish_non_exhaustive()
    }
}

impl<B: Backends> Parameters<B> {
    /// Creates a facade with default [`Settings`].
    #[must_use]
    pub fn new(backends: B, clock: Clock) -> Self {
        Self::with_settings(backends, clock, Settings::default())
    }

    /// Creates a facade whose providers use `settings`.
    #[must_use]
    pub fn with_settings(backends: B, clock: Clock, settings: Settings) -> Self {
        Self {
            backends,
            clock,
            settings,
            parameter_store: OnceLock::new(),
            secret_store: OnceLock::new(),
            app_configs: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the settings applied to new providers.
    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Returns the parameter store provider, building it on first use.
    pub fn parameter_provider(&self) -> &Provider<ParameterStore<B::ParameterClient>> {
        self.parameter_store.get_or_init(|| {
            let store = ParameterStore::new(self.backends.parameter_client()).with_default_decrypt(self.settings.decrypt);
            self.build(store)
        })
    }

    /// Returns the secret store provider, building it on first use.
    pub fn secret_provider(&self) -> &Provider<SecretStore<B::SecretClient>> {
        self.secret_store
            .get_or_init(|| self.build(SecretStore::new(self.backends.secret_client())))
    }

    /// Returns the provider for one application and environment, building it on first use.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the application or environment is empty.
    pub fn app_config_provider(&self, environment: &str, application: &str) -> Result<Arc<AppConfigProvider<B>>> {
        let key = (application.to_owned(), environment.to_owned());
        let mut providers = self.app_configs.lock();
        if let Some(provider) = providers.get(&key) {
            return Ok(Arc::clone(provider));
        }

        let store = AppConfigStore::new(self.backends.app_config_client(), application, environment)?;
        let provider = Arc::new(self.build(store));
        providers.insert(key, Arc::clone(&provider));
        Ok(provider)
    }

    /// Retrieves one parameter from the parameter store.
    ///
    /// # Errors
    ///
    /// See [`Provider::get`].
    pub async fn get_parameter(&self, name: &str, options: &GetOptions) -> Result<ParameterValue> {
        self.parameter_provider().get(name, options).await
    }

    /// Retrieves every parameter under `path` from the parameter store.
    ///
    /// # Errors
    ///
    /// See [`Provider::get_multiple`].
    pub async fn get_parameters(&self, path: &str, options: &GetOptions) -> Result<MultipleValues> {
        self.parameter_provider().get_multiple(path, options).await
    }

    /// Retrieves independently named parameters from the parameter store.
    ///
    /// # Errors
    ///
    /// See [`Provider::get_parameters_by_name`].
    pub async fn get_parameters_by_name<I, K>(&self, parameters: I, options: &GetByNameOptions) -> Result<BatchResult>
    where
        I: IntoIterator<Item = (K, ParameterOverrides)>,
        K: Into<String>,
    {
        self.parameter_provider().get_parameters_by_name(parameters, options).await
    }

    /// Retrieves one secret.
    ///
    /// # Errors
    ///
    /// See [`Provider::get`].
    pub async fn get_secret(&self, name: &str, options: &GetOptions) -> Result<ParameterValue> {
        self.secret_provider().get(name, options).await
    }

    /// Retrieves the configuration profile `name` of `application` in `environment`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the application or environment is
    /// empty; otherwise see [`Provider::get`].
    pub async fn get_app_config(
        &self,
        name: &str,
        environment: &str,
        application: &str,
        options: &GetOptions,
    ) -> Result<ParameterValue> {
        let provider = self.app_config_provider(environment, application)?;
        provider.get(name, options).await
    }

    /// Empties the cache of every provider built so far.
    pub fn clear_caches(&self) {
        if let Some(provider) = self.parameter_store.get() {
            provider.clear_cache();
        }
        if let Some(provider) = self.secret_store.get() {
            provider.clear_cache();
        }

        let app_configs: Vec<_> = self.app_configs.lock().values().cloned().collect();
        for provider in app_configs {
            provider.clear_cache();
        }
    }

    fn build<S: crate::ParameterSource>(&self, source: S) -> Provider<S> {
        Provider::builder(source, self.clock.clone()).settings(&self.settings).build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeBackends, FakeParameterStore};

    #[test]
    fn providers_are_built_once() {
        futures::executor::block_on(async {
            let backends = FakeBackends::new();
            backends.parameters.set_parameter("/a", "1");
            let parameters = Parameters::new(backends.clone(), Clock::new_frozen());

            parameters.get_parameter("/a", &GetOptions::new()).await.unwrap();
            parameters.get_parameter("/a", &GetOptions::new()).await.unwrap();

            assert!(std::ptr::eq(parameters.parameter_provider(), parameters.parameter_provider()));
            assert_eq!(backends.parameters.calls(), vec!["get_parameter:/a"]);
        });
    }

    #[test]
    fn settings_reach_the_parameter_store() {
        futures::executor::block_on(async {
            let backends = FakeBackends {
                parameters: FakeParameterStore::new().with_secure_parameter("/key", "plain"),
                ..FakeBackends::default()
            };
            let settings = Settings {
                decrypt: true,
                ..Settings::default()
            };
            let parameters = Parameters::with_settings(backends, Clock::new_frozen(), settings);

            let value = parameters.get_parameter("/key", &GetOptions::new()).await.unwrap();

            assert_eq!(value.as_text(), Some("plain"));
            assert_eq!(parameters.parameter_provider().default_max_age(), settings.max_age);
        });
    }

    #[test]
    fn app_config_providers_are_keyed_by_application_and_environment() {
        let parameters = Parameters::new(FakeBackends::new(), Clock::new_frozen());

        let a = parameters.app_config_provider("prod", "orders").unwrap();
        let b = parameters.app_config_provider("prod", "orders").unwrap();
        let c = parameters.app_config_provider("dev", "orders").unwrap();

        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(c.source().environment(), "dev");
        assert!(parameters.app_config_provider("", "orders").unwrap_err().is_configuration());
    }

    #[test]
    fn clear_caches_before_any_use_is_a_no_op() {
        let parameters = Parameters::new(FakeBackends::new(), Clock::new_frozen());
        parameters.clear_caches();
        assert!(format!("{parameters:?}").contains("parameter_store: false"));
    }
}
