// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg(feature = "test-util")]

//! Integration tests for the `Parameters` facade.

use std::time::Duration;

use paramstore::{
    GetByNameOptions, GetOptions, ParameterOverrides, ParameterValue, Parameters, Settings, Transform, testing::FakeBackends,
};
use tick::{Clock, ClockControl};

type TestResult = Result<(), paramstore::Error>;

fn block_on<F: std::future::Future>(f: F) -> F::Output {
    futures::executor::block_on(f)
}

fn backends() -> FakeBackends {
    let backends = FakeBackends::new();
    backends.parameters.set_parameter("/app/db/host", "db.internal");
    backends.parameters.set_parameter("/app/db/port", "5432");
    backends.parameters.set_parameter("/app/flags.json", r#"{"beta":true}"#);
    backends.secrets.set_secret("api-key", "k-123");
    backends.app_config.set_profile("features", r#"{"dark_mode":true}"#);
    backends
}

#[test]
fn every_family_is_reachable() -> TestResult {
    block_on(async {
        let parameters = Parameters::new(backends(), Clock::new_frozen());

        let host = parameters.get_parameter("/app/db/host", &GetOptions::new()).await?;
        let db = parameters.get_parameters("/app/db", &GetOptions::new()).await?;
        let key = parameters.get_secret("api-key", &GetOptions::new()).await?;
        let features = parameters
            .get_app_config("features", "prod", "checkout", &GetOptions::new().transform(Transform::Json))
            .await?;
        let batch = parameters
            .get_parameters_by_name(
                [
                    ("/app/db/port", ParameterOverrides::new()),
                    ("/app/flags.json", ParameterOverrides::new().transform(Transform::Auto)),
                ],
                &GetByNameOptions::new(),
            )
            .await?;

        assert_eq!(host.as_text(), Some("db.internal"));
        assert_eq!(db.len(), 2);
        assert_eq!(key.as_text(), Some("k-123"));
        assert_eq!(features, ParameterValue::Json(serde_json::json!({"dark_mode": true})));
        assert_eq!(batch.get("/app/flags.json"), Some(&ParameterValue::Json(serde_json::json!({"beta": true}))));
        Ok(())
    })
}

#[test]
fn clear_caches_empties_every_provider() -> TestResult {
    block_on(async {
        let backends = backends();
        let parameters = Parameters::new(backends.clone(), Clock::new_frozen());

        parameters.get_parameter("/app/db/host", &GetOptions::new()).await?;
        parameters.get_secret("api-key", &GetOptions::new()).await?;
        parameters.get_app_config("features", "prod", "checkout", &GetOptions::new()).await?;

        parameters.clear_caches();

        parameters.get_parameter("/app/db/host", &GetOptions::new()).await?;
        parameters.get_parameter("/app/db/host", &GetOptions::new()).await?;
        parameters.get_secret("api-key", &GetOptions::new()).await?;
        parameters.get_app_config("features", "prod", "checkout", &GetOptions::new()).await?;

        assert_eq!(backends.parameters.calls().len(), 2);
        assert_eq!(backends.secrets.calls().len(), 2);
        let polls = backends
            .app_config
            .calls()
            .iter()
            .filter(|c| c.starts_with("get_latest_configuration"))
            .count();
        assert_eq!(polls, 2);
        Ok(())
    })
}

#[test]
fn settings_set_the_default_max_age() -> TestResult {
    block_on(async {
        let control = ClockControl::new();
        let backends = backends();
        let settings = Settings::from_lookup(|key| (key == paramstore::MAX_AGE_ENV).then(|| "30".to_string()))?;
        let parameters = Parameters::with_settings(backends.clone(), control.to_clock(), settings);

        parameters.get_parameter("/app/db/host", &GetOptions::new()).await?;
        control.advance(Duration::from_secs(29));
        parameters.get_parameter("/app/db/host", &GetOptions::new()).await?;
        assert_eq!(backends.parameters.calls().len(), 1);

        control.advance(Duration::from_secs(1));
        parameters.get_parameter("/app/db/host", &GetOptions::new()).await?;
        assert_eq!(backends.parameters.calls().len(), 2);
        Ok(())
    })
}

#[test]
fn app_configs_for_different_environments_are_cached_apart() -> TestResult {
    block_on(async {
        let backends = backends();
        let parameters = Parameters::new(backends.clone(), Clock::new_frozen());

        parameters.get_app_config("features", "prod", "checkout", &GetOptions::new()).await?;
        parameters.get_app_config("features", "staging", "checkout", &GetOptions::new()).await?;
        parameters.get_app_config("features", "prod", "checkout", &GetOptions::new()).await?;

        let sessions: Vec<String> = backends
            .app_config
            .calls()
            .into_iter()
            .filter(|c| c.starts_with("start_session"))
            .collect();
        assert_eq!(
            sessions,
            vec!["start_session:checkout/prod/features", "start_session:checkout/staging/features"]
        );
        Ok(())
    })
}
