// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Structured logging of provider activity.
//!
//! Every provider operation emits `tracing` events carrying the provider
//! name, the operation, what happened and, for backend calls, how long the
//! round-trip took on the provider's clock.

use std::time::Duration;

use tick::Clock;
use tracing::Level;

#[cfg(test)]
pub(crate) mod testing;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ProviderOperation {
    Get,
    GetMultiple,
    GetByName,
    Clear,
}

impl ProviderOperation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "provider.get",
            Self::GetMultiple => "provider.get_multiple",
            Self::GetByName => "provider.get_by_name",
            Self::Clear => "provider.clear",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ProviderActivity {
    Hit,
    Miss,
    Bypass,
    Fetched,
    FetchFailed,
    TransformFailed,
    Cleared,
}

impl ProviderActivity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hit => "cache.hit",
            Self::Miss => "cache.miss",
            Self::Bypass => "cache.bypass",
            Self::Fetched => "backend.fetched",
            Self::FetchFailed => "backend.failed",
            Self::TransformFailed => "transform.failed",
            Self::Cleared => "cache.cleared",
        }
    }

    pub fn level(self) -> Level {
        match self {
            Self::Hit | Self::Miss | Self::Bypass => Level::DEBUG,
            Self::Fetched | Self::Cleared => Level::INFO,
            Self::FetchFailed | Self::TransformFailed => Level::WARN,
        }
    }
}

/// Records one provider event.
pub(crate) fn record(
    provider: &'static str,
    operation: ProviderOperation,
    activity: ProviderActivity,
    name: &str,
    duration: Option<Duration>,
) {
    let duration_ms = duration.map(|d| d.as_secs_f64() * 1000.0);
    let operation = operation.as_str();
    let activity_name = activity.as_str();

    match activity.level() {
        Level::WARN => {
            tracing::warn!(provider, operation, activity = activity_name, parameter = name, duration_ms, "parameter event");
        }
        Level::INFO => {
            tracing::info!(provider, operation, activity = activity_name, parameter = name, duration_ms, "parameter event");
        }
        _ => tracing::debug!(provider, operation, activity = activity_name, parameter = name, duration_ms, "parameter event"),
    }
}

/// Result of a timed async operation.
#[derive(Debug, Clone, Copy)]
pub(crate) struct TimedResult<R> {
    pub result: R,
    pub duration: Duration,
}

/// Extension trait for timing async operations.
pub(crate) trait ClockExt {
    /// Times an async operation and returns both the result and elapsed duration.
    fn timed_async<F, R>(&self, f: F) -> impl Future<Output = TimedResult<R>> + Send
    where
        F: Future<Output = R> + Send,
        R: Send;
}

impl ClockExt for Clock {
    async fn timed_async<F, R>(&self, f: F) -> TimedResult<R>
    where
        F: Future<Output = R> + Send,
        R: Send,
    {
        let start = self.instant();
        let result = f.await;
        TimedResult {
            result,
            duration: self.instant().saturating_duration_since(start),
        }
    }
}
