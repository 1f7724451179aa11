// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Captures provider events for assertions in tests.

use std::{io::Write, sync::Arc};

use parking_lot::Mutex;
use tracing::subscriber::DefaultGuard;
use tracing_subscriber::{fmt::MakeWriter, layer::SubscriberExt};

/// Formatted event output of the current thread, one event per line.
#[derive(Debug, Clone, Default)]
pub(crate) struct EventLog {
    text: Arc<Mutex<String>>,
}

impl EventLog {
    /// Routes this thread's events into the log until the guard is dropped.
    pub fn install(&self) -> DefaultGuard {
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(self.clone())
            .with_ansi(false)
            .without_time()
            .with_target(false);
        tracing::subscriber::set_default(tracing_subscriber::registry().with(layer))
    }

    pub fn lines(&self) -> Vec<String> {
        self.text.lock().lines().map(str::to_owned).collect()
    }

    /// Values of the `activity` field, in the order they were recorded.
    pub fn activities(&self) -> Vec<String> {
        self.lines().iter().filter_map(|line| quoted_field(line, "activity")).collect()
    }
}

fn quoted_field(line: &str, field: &str) -> Option<String> {
    let marker = format!("{field}=\"");
    let rest = &line[line.find(&marker)? + marker.len()..];
    rest.find('"').map(|end| rest[..end].to_owned())
}

impl MakeWriter<'_> for EventLog {
    type Writer = Self;

    fn make_writer(&self) -> Self::Writer {
        self.clone()
    }
}

impl Write for EventLog {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.text.lock().push_str(&String::from_utf8_lossy(buf));
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
