// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Backend clients on top of the AWS SDK.
//!
//! The store client traits are implemented directly on the SDK clients, so
//! `ParameterStore::new(aws_sdk_ssm::Client::new(&config))` is all it takes
//! to read from Systems Manager. [`AwsBackends`] creates every client from
//! one shared SDK configuration for [`Parameters`].

use std::collections::HashMap;

use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_ssm::error::DisplayErrorContext;
use tick::Clock;

use crate::{
    BackendOptions, Error, Parameters, RawValue, Result, Settings,
    facade::Backends,
    stores::{
        AppConfigClient, Item, LatestConfiguration, ParameterPage, ParameterStoreClient, ParametersBatch, QueryPage, SecretRequest,
        SecretStoreClient, TableClient, TableRequest,
    },
};

fn sdk_error(operation: &str, error: &(dyn std::error::Error + 'static)) -> Error {
    Error::retrieval(format!("{operation} failed: {}", DisplayErrorContext(error)))
}

impl ParameterStoreClient for aws_sdk_ssm::Client {
    async fn get_parameter(&self, name: &str, decrypt: bool, _options: &BackendOptions) -> Result<String> {
        let output = self
            .get_parameter()
            .name(name)
            .with_decryption(decrypt)
            .send()
            .await
            .map_err(|e| sdk_error("GetParameter", &e))?;

        output
            .parameter()
            .and_then(|p| p.value())
            .map(str::to_owned)
            .ok_or_else(|| Error::retrieval(format!("parameter {name} has no value")))
    }

    async fn get_parameters_by_path(
        &self,
        path: &str,
        recursive: bool,
        decrypt: bool,
        next_token: Option<String>,
        _options: &BackendOptions,
    ) -> Result<ParameterPage> {
        let output = self
            .get_parameters_by_path()
            .path(path)
            .recursive(recursive)
            .with_decryption(decrypt)
            .set_next_token(next_token)
            .send()
            .await
            .map_err(|e| sdk_error("GetParametersByPath", &e))?;

        Ok(ParameterPage {
            parameters: output
                .parameters()
                .iter()
                .filter_map(|p| Some((p.name()?.to_owned(), p.value()?.to_owned())))
                .collect(),
            next_token: output.next_token().map(str::to_owned),
        })
    }

    async fn get_parameters(&self, names: &[String], decrypt: bool, _options: &BackendOptions) -> Result<ParametersBatch> {
        let output = self
            .get_parameters()
            .set_names(Some(names.to_vec()))
            .with_decryption(decrypt)
            .send()
            .await
            .map_err(|e| sdk_error("GetParameters", &e))?;

        Ok(ParametersBatch {
            found: output
                .parameters()
                .iter()
                .filter_map(|p| Some((p.name()?.to_owned(), p.value()?.to_owned())))
                .collect(),
            invalid: output.invalid_parameters().to_vec(),
        })
    }
}

impl SecretStoreClient for aws_sdk_secretsmanager::Client {
    async fn get_secret_value(&self, request: SecretRequest, _options: &BackendOptions) -> Result<RawValue> {
        let output = self
            .get_secret_value()
            .secret_id(&request.secret_id)
            .set_version_id(request.version_id)
            .set_version_stage(request.version_stage)
            .send()
            .await
            .map_err(|e| sdk_error("GetSecretValue", &e))?;

        if let Some(text) = output.secret_string() {
            return Ok(RawValue::Text(text.to_owned()));
        }

        output
            .secret_binary()
            .map(|blob| RawValue::Binary(blob.as_ref().to_vec()))
            .ok_or_else(|| Error::retrieval(format!("secret {} has no value", request.secret_id)))
    }
}

impl AppConfigClient for aws_sdk_appconfigdata::Client {
    async fn start_session(&self, application: &str, environment: &str, profile: &str, _options: &BackendOptions) -> Result<String> {
        let output = self
            .start_configuration_session()
            .application_identifier(application)
            .environment_identifier(environment)
            .configuration_profile_identifier(profile)
            .send()
            .await
            .map_err(|e| sdk_error("StartConfigurationSession", &e))?;

        output
            .initial_configuration_token()
            .map(str::to_owned)
            .ok_or_else(|| Error::retrieval(format!("no configuration token for profile {profile}")))
    }

    async fn get_latest_configuration(&self, token: &str, _options: &BackendOptions) -> Result<LatestConfiguration> {
        let output = self
            .get_latest_configuration()
            .configuration_token(token)
            .send()
            .await
            .map_err(|e| sdk_error("GetLatestConfiguration", &e))?;

        let next_token = output
            .next_poll_configuration_token()
            .map(str::to_owned)
            .ok_or_else(|| Error::retrieval("no next poll token in configuration response"))?;

        Ok(LatestConfiguration {
            content: output.configuration().map(|blob| blob.as_ref().to_vec()).unwrap_or_default(),
            next_token,
        })
    }
}

/// Converts the attributes this crate can represent; others are dropped.
fn to_item(attributes: &HashMap<String, AttributeValue>) -> Item {
    attributes
        .iter()
        .filter_map(|(name, value)| {
            let raw = match value {
                AttributeValue::S(text) | AttributeValue::N(text) => RawValue::Text(text.clone()),
                AttributeValue::B(blob) => RawValue::Binary(blob.as_ref().to_vec()),
                AttributeValue::Bool(flag) => RawValue::Text(flag.to_string()),
                _ => return None,
            };
            Some((name.clone(), raw))
        })
        .collect()
}

impl TableClient for aws_sdk_dynamodb::Client {
    type Cursor = HashMap<String, AttributeValue>;

    async fn get_item(&self, request: TableRequest<'_>, _options: &BackendOptions) -> Result<Option<Item>> {
        let output = self
            .get_item()
            .table_name(request.table_name)
            .key(request.key_attr, AttributeValue::S(request.key.to_owned()))
            .consistent_read(request.consistent_read)
            .send()
            .await
            .map_err(|e| sdk_error("GetItem", &e))?;

        Ok(output.item().map(to_item))
    }

    async fn query(
        &self,
        request: TableRequest<'_>,
        start: Option<Self::Cursor>,
        _options: &BackendOptions,
    ) -> Result<QueryPage<Self::Cursor>> {
        let output = self
            .query()
            .table_name(request.table_name)
            .key_condition_expression("#key = :key")
            .expression_attribute_names("#key", request.key_attr)
            .expression_attribute_values(":key", AttributeValue::S(request.key.to_owned()))
            .consistent_read(request.consistent_read)
            .set_exclusive_start_key(start)
            .send()
            .await
            .map_err(|e| sdk_error("Query", &e))?;

        Ok(QueryPage {
            items: output.items().iter().map(to_item).collect(),
            last_evaluated_key: output.last_evaluated_key().cloned(),
        })
    }
}

/// AWS clients for [`Parameters`], all created from one SDK configuration.
#[derive(Clone, Debug)]
pub struct AwsBackends {
    config: SdkConfig,
}

impl AwsBackends {
    /// Uses an already loaded SDK configuration.
    #[must_use]
    pub fn new(config: SdkConfig) -> Self {
        Self { config }
    }

    /// Loads the SDK configuration from the environment.
    pub async fn from_env() -> Self {
        Self::builder().load().await
    }

    /// Creates a builder that overrides parts of the environment's configuration.
    #[must_use]
    pub fn builder() -> AwsBackendsBuilder {
        AwsBackendsBuilder::default()
    }

    /// Returns the shared SDK configuration.
    #[must_use]
    pub fn sdk_config(&self) -> &SdkConfig {
        &self.config
    }

    /// Creates a table client for use with [`TableStore`](crate::TableStore).
    #[must_use]
    pub fn table_client(&self) -> aws_sdk_dynamodb::Client {
        aws_sdk_dynamodb::Client::new(&self.config)
    }
}

impl Backends for AwsBackends {
    type ParameterClient = aws_sdk_ssm::Client;
    type SecretClient = aws_sdk_secretsmanager::Client;
    type AppConfigClient = aws_sdk_appconfigdata::Client;

    fn parameter_client(&self) -> Self::ParameterClient {
        aws_sdk_ssm::Client::new(&self.config)
    }

    fn secret_client(&self) -> Self::SecretClient {
        aws_sdk_secretsmanager::Client::new(&self.config)
    }

    fn app_config_client(&self) -> Self::AppConfigClient {
        aws_sdk_appconfigdata::Client::new(&self.config)
    }
}

/// Builder for [`AwsBackends`].
#[derive(Clone, Debug, Default)]
pub struct AwsBackendsBuilder {
    region: Option<String>,
    endpoint_url: Option<String>,
}

impl AwsBackendsBuilder {
    /// Sets the region instead of resolving it from the environment.
    #[must_use]
    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Sends every request to `endpoint_url`, for example a local emulator.
    #[must_use]
    pub fn endpoint_url(mut self, endpoint_url: impl Into<String>) -> Self {
        self.endpoint_url = Some(endpoint_url.into());
        self
    }

    /// Loads the SDK configuration.
    pub async fn load(self) -> AwsBackends {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = self.region {
            loader = loader.region(Region::new(region));
        }
        if let Some(endpoint_url) = self.endpoint_url {
            loader = loader.endpoint_url(endpoint_url);
        }

        AwsBackends::new(loader.load().await)
    }
}

impl Parameters<AwsBackends> {
    /// Creates a facade from the process environment.
    ///
    /// Must be called within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if [`Settings::from_env`] fails.
    pub async fn from_env() -> Result<Self> {
        let settings = Settings::from_env()?;
        let backends = AwsBackends::from_env().await;
        Ok(Self::with_settings(backends, Clock::new_tokio(), settings))
    }
}
