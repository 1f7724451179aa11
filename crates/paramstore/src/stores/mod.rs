// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Built-in parameter sources.
//!
//! Each store adapts one kind of backend to [`ParameterSource`](crate::ParameterSource)
//! through a small client trait, so that any client (an SDK wrapper, an
//! in-memory fake) can be plugged in.

mod app_config;
mod parameter_store;
mod secret_store;
mod table_store;

pub use app_config::{AppConfigClient, AppConfigStore, LatestConfiguration};
pub use parameter_store::{MAX_BULK_NAMES, ParameterPage, ParameterStore, ParameterStoreClient, ParametersBatch};
pub use secret_store::{SecretRequest, SecretStore, SecretStoreClient};
pub use table_store::{
    DEFAULT_KEY_ATTR, DEFAULT_SORT_ATTR, DEFAULT_VALUE_ATTR, Item, QueryPage, TableClient, TableConfig, TableRequest, TableStore,
};
