// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::{collections::HashMap, sync::Arc};

use futures::lock::Mutex as AsyncMutex;
use parking_lot::Mutex;

use crate::{BackendOptions, Error, ParameterSource, RawValue, Result};

/// Response to a poll for the latest configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LatestConfiguration {
    /// The configuration document, empty when it has not changed since the previous poll.
    pub content: Vec<u8>,
    /// Token to present on the next poll.
    pub next_token: String,
}

/// The calls a structured application configuration client must offer.
pub trait AppConfigClient: Send + Sync {
    /// Opens a polling session for one configuration profile and returns its first token.
    fn start_session(
        &self,
        application: &str,
        environment: &str,
        profile: &str,
        options: &BackendOptions,
    ) -> impl Future<Output = Result<String>> + Send;

    /// Polls for the latest configuration with a session token.
    fn get_latest_configuration(
        &self,
        token: &str,
        options: &BackendOptions,
    ) -> impl Future<Output = Result<LatestConfiguration>> + Send;
}

#[derive(Debug)]
struct ProfileSession {
    token: String,
    last: Vec<u8>,
}

/// One profile's session; locked across a whole poll so concurrent callers share it.
type SessionSlot = Arc<AsyncMutex<Option<ProfileSession>>>;

/// Source backed by a structured application configuration store.
///
/// Parameter names are configuration profiles of one application in one
/// environment. Each profile keeps its own polling session; when the store
/// reports that a profile has not changed, the last document received for
/// it is returned.
#[derive(Debug)]
pub struct AppConfigStore<C> {
    client: C,
    application: String,
    environment: String,
    sessions: Mutex<HashMap<String, SessionSlot>>,
}

impl<C: AppConfigClient> AppConfigStore<C> {
    /// Creates a source for the profiles of `application` in `environment`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the application or environment is empty.
    pub fn new(client: C, application: impl Into<String>, environment: impl Into<String>) -> Result<Self> {
        let application = application.into();
        let environment = environment.into();
        if application.is_empty() || environment.is_empty() {
            return Err(Error::configuration("application and environment must not be empty"));
        }

        Ok(Self {
            client,
            application,
            environment,
            sessions: Mutex::new(HashMap::new()),
        })
    }

    /// Returns the application name.
    #[must_use]
    pub fn application(&self) -> &str {
        &self.application
    }

    /// Returns the environment name.
    #[must_use]
    pub fn environment(&self) -> &str {
        &self.environment
    }

    /// Returns the underlying client.
    #[must_use]
    pub fn client(&self) -> &C {
        &self.client
    }
}

impl<C: AppConfigClient> ParameterSource for AppConfigStore<C> {
    fn name(&self) -> &'static str {
        "appconfig"
    }

    async fn fetch_one(&self, name: &str, options: &BackendOptions) -> Result<RawValue> {
        let slot = Arc::clone(
            self.sessions
                .lock()
                .entry(name.to_owned())
                .or_insert_with(|| Arc::new(AsyncMutex::new(None))),
        );
        let mut current = slot.lock().await;

        let token = match current.as_ref() {
            Some(session) => session.token.clone(),
            None => {
                self.client
                    .start_session(&self.application, &self.environment, name, options)
                    .await?
            }
        };

        let latest = match self.client.get_latest_configuration(&token, options).await {
            Ok(latest) => latest,
            Err(e) => {
                // The token may have expired; the next call opens a new session.
                *current = None;
                return Err(e);
            }
        };

        let session = current.get_or_insert_with(|| ProfileSession {
            token: String::new(),
            last: Vec::new(),
        });
        session.token = latest.next_token;
        if !latest.content.is_empty() {
            session.last = latest.content;
        }

        Ok(RawValue::from_bytes(session.last.clone()))
    }

    async fn fetch_many(&self, path: &str, _options: &BackendOptions) -> Result<HashMap<String, RawValue>> {
        Err(Error::configuration(format!(
            "the application configuration store cannot list profiles under '{path}'"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeAppConfig;

    fn store(client: &FakeAppConfig) -> AppConfigStore<FakeAppConfig> {
        AppConfigStore::new(client.clone(), "orders", "prod").unwrap()
    }

    #[test]
    fn empty_names_are_rejected() {
        assert!(AppConfigStore::new(FakeAppConfig::new(), "", "prod").unwrap_err().is_configuration());
        assert!(AppConfigStore::new(FakeAppConfig::new(), "orders", "").unwrap_err().is_configuration());
    }

    #[test]
    fn one_session_per_profile_and_token_is_carried_forward() {
        futures::executor::block_on(async {
            let client = FakeAppConfig::new().with_profile("features", r#"{"beta":true}"#);
            let store = store(&client);

            let first = store.fetch_one("features", &BackendOptions::new()).await.unwrap();
            let second = store.fetch_one("features", &BackendOptions::new()).await.unwrap();

            assert_eq!(first, RawValue::Text(r#"{"beta":true}"#.to_string()));
            assert_eq!(second, first, "unchanged profile returns the last document");
            assert_eq!(
                client.calls(),
                vec![
                    "start_session:orders/prod/features",
                    "get_latest_configuration:features#0",
                    "get_latest_configuration:features#1",
                ]
            );
        });
    }

    #[test]
    fn changed_profile_returns_new_document() {
        futures::executor::block_on(async {
            let client = FakeAppConfig::new().with_profile("features", "v1");
            let store = store(&client);

            store.fetch_one("features", &BackendOptions::new()).await.unwrap();
            client.set_profile("features", "v2");
            let value = store.fetch_one("features", &BackendOptions::new()).await.unwrap();

            assert_eq!(value, RawValue::Text("v2".to_string()));
        });
    }

    #[test]
    fn failed_poll_starts_a_new_session_next_time() {
        futures::executor::block_on(async {
            let client = FakeAppConfig::new().with_profile("features", "v1");
            let store = store(&client);

            store.fetch_one("features", &BackendOptions::new()).await.unwrap();
            client.fail_next_poll();
            assert!(store.fetch_one("features", &BackendOptions::new()).await.unwrap_err().is_retrieval());
            store.fetch_one("features", &BackendOptions::new()).await.unwrap();

            let sessions = client.calls().iter().filter(|c| c.starts_with("start_session")).count();
            assert_eq!(sessions, 2);
        });
    }

    /// Delegates to a fake, suspending once before opening a session.
    struct SlowSessions(FakeAppConfig);

    impl AppConfigClient for SlowSessions {
        async fn start_session(
            &self,
            application: &str,
            environment: &str,
            profile: &str,
            options: &BackendOptions,
        ) -> Result<String> {
            let mut suspended = false;
            futures::future::poll_fn(move |cx| {
                if suspended {
                    return std::task::Poll::Ready(());
                }
                suspended = true;
                cx.waker().wake_by_ref();
                std::task::Poll::Pending
            })
            .await;
            self.0.start_session(application, environment, profile, options).await
        }

        async fn get_latest_configuration(&self, token: &str, options: &BackendOptions) -> Result<LatestConfiguration> {
            self.0.get_latest_configuration(token, options).await
        }
    }

    #[test]
    fn concurrent_first_fetches_share_one_session() {
        futures::executor::block_on(async {
            let client = FakeAppConfig::new().with_profile("features", "v1");
            let store = AppConfigStore::new(SlowSessions(client.clone()), "orders", "prod").unwrap();
            let options = BackendOptions::new();

            let (a, b) = futures::future::join(store.fetch_one("features", &options), store.fetch_one("features", &options)).await;

            assert_eq!(a.unwrap(), RawValue::Text("v1".to_string()));
            assert_eq!(b.unwrap(), RawValue::Text("v1".to_string()));
            assert_eq!(
                client.calls(),
                vec![
                    "start_session:orders/prod/features",
                    "get_latest_configuration:features#0",
                    "get_latest_configuration:features#1",
                ]
            );
        });
    }

    #[test]
    fn listing_is_a_configuration_error() {
        futures::executor::block_on(async {
            let store = store(&FakeAppConfig::new());
            assert!(store.fetch_many("features", &BackendOptions::new()).await.unwrap_err().is_configuration());
        });
    }
}
