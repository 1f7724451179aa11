// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! In-memory backend clients for testing.
//!
//! Each fake keeps its data behind shared state, so clones observe the same
//! store. Every call is recorded as a short string (for example
//! `"get_parameter:/app/db"`) for later verification, and failures can be
//! injected per call with `fail_when`.

use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use parking_lot::Mutex;

use crate::{
    BackendOptions, Error, RawValue, Result,
    facade::Backends,
    stores::{
        AppConfigClient, Item, LatestConfiguration, MAX_BULK_NAMES, ParameterPage, ParameterStoreClient, ParametersBatch, QueryPage,
        SecretRequest, SecretStoreClient, TableClient, TableRequest,
    },
};

type FailPredicate = Box<dyn Fn(&str) -> bool + Send + Sync>;

/// Call log and failure injection shared by every fake.
#[derive(Clone, Default)]
struct Recorder {
    calls: Arc<Mutex<Vec<String>>>,
    fail_when: Arc<Mutex<Option<FailPredicate>>>,
}

impl std::fmt::Debug for Recorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Recorder")
            .field("calls", &self.calls)
            .field("fail_when", &self.fail_when.lock().is_some())
            .finish()
    }
}

impl Recorder {
    fn record(&self, call: String) -> Result<()> {
        let failing = self.fail_when.lock().as_ref().is_some_and(|predicate| predicate(&call));
        self.calls.lock().push(call.clone());
        if failing {
            return Err(Error::retrieval(format!("injected failure for {call}")));
        }
        Ok(())
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    fn fail_when(&self, predicate: impl Fn(&str) -> bool + Send + Sync + 'static) {
        *self.fail_when.lock() = Some(Box::new(predicate));
    }

    fn clear_failures(&self) {
        *self.fail_when.lock() = None;
    }
}

macro_rules! recorder_api {
    () => {
        /// Returns every recorded call, oldest first.
        #[must_use]
        pub fn calls(&self) -> Vec<String> {
            self.recorder.calls()
        }

        /// Fails every call whose recorded form matches `predicate` with a retrieval error.
        pub fn fail_when(&self, predicate: impl Fn(&str) -> bool + Send + Sync + 'static) {
            self.recorder.fail_when(predicate);
        }

        /// Lets every call succeed again.
        pub fn clear_failures(&self) {
            self.recorder.clear_failures();
        }
    };
}

#[derive(Debug)]
struct StoredParameter {
    value: String,
    secure: bool,
}

#[derive(Debug)]
struct ParameterState {
    parameters: BTreeMap<String, StoredParameter>,
    page_size: usize,
}

/// In-memory hierarchical parameter store.
///
/// Secure parameters read as `"<encrypted>"` unless decryption is requested.
/// Path listings are paged by [`with_page_size`](Self::with_page_size).
///
/// # Examples
///
/// ```
/// use paramstore::{BackendOptions, stores::ParameterStoreClient, testing::FakeParameterStore};
/// # futures::executor::block_on(async {
///
/// let store = FakeParameterStore::new().with_parameter("/app/db", "postgres://");
/// let value = store.get_parameter("/app/db", false, &BackendOptions::new()).await?;
///
/// assert_eq!(value, "postgres://");
/// assert_eq!(store.calls(), vec!["get_parameter:/app/db"]);
/// # Ok::<(), paramstore::Error>(())
/// # });
/// ```
#[derive(Clone, Debug)]
pub struct FakeParameterStore {
    state: Arc<Mutex<ParameterState>>,
    recorder: Recorder,
}

impl Default for FakeParameterStore {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeParameterStore {
    /// Creates an empty store that returns up to 50 parameters per listing page.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(ParameterState {
                parameters: BTreeMap::new(),
                page_size: 50,
            })),
            recorder: Recorder::default(),
        }
    }

    /// Adds a plain parameter.
    #[must_use]
    pub fn with_parameter(self, name: &str, value: &str) -> Self {
        self.put(name, value, false);
        self
    }

    /// Adds a parameter that is only readable with decryption.
    #[must_use]
    pub fn with_secure_parameter(self, name: &str, value: &str) -> Self {
        self.put(name, value, true);
        self
    }

    /// Sets how many parameters one listing page holds.
    #[must_use]
    pub fn with_page_size(self, page_size: usize) -> Self {
        self.state.lock().page_size = page_size.max(1);
        self
    }

    /// Adds or replaces a plain parameter.
    pub fn set_parameter(&self, name: &str, value: &str) {
        self.put(name, value, false);
    }

    /// Removes a parameter.
    pub fn remove_parameter(&self, name: &str) {
        self.state.lock().parameters.remove(name);
    }

    recorder_api!();

    fn put(&self, name: &str, value: &str, secure: bool) {
        self.state.lock().parameters.insert(
            name.to_owned(),
            StoredParameter {
                value: value.to_owned(),
                secure,
            },
        );
    }

    fn read(&self, name: &str, decrypt: bool) -> Option<String> {
        self.state.lock().parameters.get(name).map(|p| {
            if p.secure && !decrypt {
                "<encrypted>".to_owned()
            } else {
                p.value.clone()
            }
        })
    }
}

impl ParameterStoreClient for FakeParameterStore {
    async fn get_parameter(&self, name: &str, decrypt: bool, _options: &BackendOptions) -> Result<String> {
        self.recorder.record(format!("get_parameter:{name}"))?;
        self.read(name, decrypt)
            .ok_or_else(|| Error::retrieval(format!("parameter {name} not found")))
    }

    async fn get_parameters_by_path(
        &self,
        path: &str,
        recursive: bool,
        decrypt: bool,
        next_token: Option<String>,
        _options: &BackendOptions,
    ) -> Result<ParameterPage> {
        self.recorder.record(format!("get_parameters_by_path:{path}"))?;

        let offset = match next_token {
            Some(token) => token
                .parse::<usize>()
                .map_err(|e| Error::retrieval(format!("invalid next token '{token}': {e}")))?,
            None => 0,
        };

        let prefix = format!("{}/", path.trim_end_matches('/'));
        let state = self.state.lock();
        let matching: Vec<(String, String)> = state
            .parameters
            .iter()
            .filter(|(name, _)| {
                name.strip_prefix(&prefix)
                    .is_some_and(|rest| !rest.is_empty() && (recursive || !rest.contains('/')))
            })
            .map(|(name, p)| {
                let value = if p.secure && !decrypt { "<encrypted>".to_owned() } else { p.value.clone() };
                (name.clone(), value)
            })
            .collect();

        let end = (offset + state.page_size).min(matching.len());
        Ok(ParameterPage {
            parameters: matching.get(offset..end).map(<[_]>::to_vec).unwrap_or_default(),
            next_token: (end < matching.len()).then(|| end.to_string()),
        })
    }

    async fn get_parameters(&self, names: &[String], decrypt: bool, _options: &BackendOptions) -> Result<ParametersBatch> {
        self.recorder.record(format!("get_parameters:{}", names.join(",")))?;
        if names.len() > MAX_BULK_NAMES {
            return Err(Error::retrieval(format!(
                "at most {MAX_BULK_NAMES} names per call, got {}",
                names.len()
            )));
        }

        let mut batch = ParametersBatch::default();
        for name in names {
            match self.read(name, decrypt) {
                Some(value) => {
                    batch.found.insert(name.clone(), value);
                }
                None => batch.invalid.push(name.clone()),
            }
        }
        Ok(batch)
    }
}

#[derive(Debug, Default)]
struct SecretState {
    secrets: HashMap<String, RawValue>,
    requests: Vec<SecretRequest>,
}

/// In-memory secret store.
#[derive(Clone, Debug, Default)]
pub struct FakeSecretStore {
    state: Arc<Mutex<SecretState>>,
    recorder: Recorder,
}

impl FakeSecretStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a string secret.
    #[must_use]
    pub fn with_secret(self, name: &str, value: &str) -> Self {
        self.set_secret(name, value);
        self
    }

    /// Adds a binary secret.
    #[must_use]
    pub fn with_binary_secret(self, name: &str, value: Vec<u8>) -> Self {
        self.state.lock().secrets.insert(name.to_owned(), RawValue::Binary(value));
        self
    }

    /// Adds or replaces a string secret.
    pub fn set_secret(&self, name: &str, value: &str) {
        self.state.lock().secrets.insert(name.to_owned(), RawValue::Text(value.to_owned()));
    }

    /// Returns every request received, oldest first.
    #[must_use]
    pub fn requests(&self) -> Vec<SecretRequest> {
        self.state.lock().requests.clone()
    }

    recorder_api!();
}

impl SecretStoreClient for FakeSecretStore {
    async fn get_secret_value(&self, request: SecretRequest, _options: &BackendOptions) -> Result<RawValue> {
        self.recorder.record(format!("get_secret_value:{}", request.secret_id))?;

        let mut state = self.state.lock();
        let value = state.secrets.get(&request.secret_id).cloned();
        let id = request.secret_id.clone();
        state.requests.push(request);
        value.ok_or_else(|| Error::retrieval(format!("secret {id} not found")))
    }
}

#[derive(Debug, Default)]
struct AppConfigState {
    /// Current document and version of each profile.
    profiles: HashMap<String, (Vec<u8>, u64)>,
    /// Live tokens: the profile and the version already delivered on that session.
    tokens: HashMap<String, (String, Option<u64>)>,
    issued: u64,
    fail_next_poll: bool,
}

impl AppConfigState {
    fn issue(&mut self, profile: &str, delivered: Option<u64>) -> String {
        let token = format!("{profile}#{}", self.issued);
        self.issued += 1;
        self.tokens.insert(token.clone(), (profile.to_owned(), delivered));
        token
    }
}

/// In-memory structured application configuration store.
///
/// Tokens are single use. A poll returns the profile's document the first
/// time and an empty document until the profile changes.
#[derive(Clone, Debug, Default)]
pub struct FakeAppConfig {
    state: Arc<Mutex<AppConfigState>>,
    recorder: Recorder,
}

impl FakeAppConfig {
    /// Creates a store without profiles.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a profile.
    #[must_use]
    pub fn with_profile(self, profile: &str, content: &str) -> Self {
        self.set_profile(profile, content);
        self
    }

    /// Adds or changes a profile; open sessions see the change on their next poll.
    pub fn set_profile(&self, profile: &str, content: &str) {
        let mut state = self.state.lock();
        let version = state.profiles.get(profile).map_or(0, |(_, v)| v + 1);
        state.profiles.insert(profile.to_owned(), (content.as_bytes().to_vec(), version));
    }

    /// Fails the next poll with a retrieval error and invalidates its token.
    pub fn fail_next_poll(&self) {
        self.state.lock().fail_next_poll = true;
    }

    recorder_api!();
}

impl AppConfigClient for FakeAppConfig {
    async fn start_session(&self, application: &str, environment: &str, profile: &str, _options: &BackendOptions) -> Result<String> {
        self.recorder
            .record(format!("start_session:{application}/{environment}/{profile}"))?;

        let mut state = self.state.lock();
        if !state.profiles.contains_key(profile) {
            return Err(Error::retrieval(format!("profile {profile} not found")));
        }
        Ok(state.issue(profile, None))
    }

    async fn get_latest_configuration(&self, token: &str, _options: &BackendOptions) -> Result<LatestConfiguration> {
        self.recorder.record(format!("get_latest_configuration:{token}"))?;

        let mut state = self.state.lock();
        let (profile, delivered) = state
            .tokens
            .remove(token)
            .ok_or_else(|| Error::retrieval(format!("invalid token {token}")))?;

        if std::mem::take(&mut state.fail_next_poll) {
            return Err(Error::retrieval("injected poll failure"));
        }

        let (content, version) = state
            .profiles
            .get(&profile)
            .cloned()
            .ok_or_else(|| Error::retrieval(format!("profile {profile} not found")))?;

        let content = if delivered == Some(version) { Vec::new() } else { content };
        let next_token = state.issue(&profile, Some(version));
        Ok(LatestConfiguration { content, next_token })
    }
}

#[derive(Debug)]
struct TableState {
    items: Vec<Item>,
    page_size: usize,
}

/// In-memory table; query cursors are item offsets.
#[derive(Clone, Debug)]
pub struct FakeTable {
    state: Arc<Mutex<TableState>>,
    recorder: Recorder,
}

impl Default for FakeTable {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeTable {
    /// Creates an empty table that returns up to 100 items per query page.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(TableState {
                items: Vec::new(),
                page_size: 100,
            })),
            recorder: Recorder::default(),
        }
    }

    /// Adds an item made of text attributes.
    #[must_use]
    pub fn with_item<'a>(self, attributes: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        self.insert_item(
            attributes
                .into_iter()
                .map(|(name, value)| (name.to_owned(), RawValue::Text(value.to_owned())))
                .collect(),
        );
        self
    }

    /// Sets how many items one query page holds.
    #[must_use]
    pub fn with_page_size(self, page_size: usize) -> Self {
        self.state.lock().page_size = page_size.max(1);
        self
    }

    /// Adds an item.
    pub fn insert_item(&self, item: Item) {
        self.state.lock().items.push(item);
    }

    recorder_api!();

    fn matching(&self, request: &TableRequest<'_>) -> Vec<Item> {
        let expected = RawValue::Text(request.key.to_owned());
        self.state
            .lock()
            .items
            .iter()
            .filter(|item| item.get(request.key_attr) == Some(&expected))
            .cloned()
            .collect()
    }
}

fn describe(call: &str, request: &TableRequest<'_>) -> String {
    let consistency = if request.consistent_read { " consistent" } else { "" };
    format!(
        "{call}:{}/{}={}{consistency}",
        request.table_name, request.key_attr, request.key
    )
}

impl TableClient for FakeTable {
    type Cursor = usize;

    async fn get_item(&self, request: TableRequest<'_>, _options: &BackendOptions) -> Result<Option<Item>> {
        self.recorder.record(describe("get_item", &request))?;
        Ok(self.matching(&request).into_iter().next())
    }

    async fn query(&self, request: TableRequest<'_>, start: Option<usize>, _options: &BackendOptions) -> Result<QueryPage<usize>> {
        self.recorder.record(describe("query", &request))?;

        let items = self.matching(&request);
        let offset = start.unwrap_or(0).min(items.len());
        let end = (offset + self.state.lock().page_size).min(items.len());
        Ok(QueryPage {
            items: items[offset..end].to_vec(),
            last_evaluated_key: (end < items.len()).then_some(end),
        })
    }
}

/// Fake backends for [`Parameters`](crate::Parameters).
///
/// Every provider the facade builds talks to these same fakes.
#[derive(Clone, Debug, Default)]
pub struct FakeBackends {
    /// Parameter store behind the parameter provider.
    pub parameters: FakeParameterStore,
    /// Secret store behind the secret provider.
    pub secrets: FakeSecretStore,
    /// Configuration store behind every application configuration provider.
    pub app_config: FakeAppConfig,
}

impl FakeBackends {
    /// Creates empty fake backends.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Backends for FakeBackends {
    type ParameterClient = FakeParameterStore;
    type SecretClient = FakeSecretStore;
    type AppConfigClient = FakeAppConfig;

    fn parameter_client(&self) -> Self::ParameterClient {
        self.parameters.clone()
    }

    fn secret_client(&self) -> Self::SecretClient {
        self.secrets.clone()
    }

    fn app_config_client(&self) -> Self::AppConfigClient {
        self.app_config.clone()
    }
}
