// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Results of batch-by-name retrieval.

use std::collections::{BTreeSet, HashMap};

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};

use crate::ParameterValue;

/// Reserved key under which failed names are reported.
///
/// A batch request may not contain a parameter with this name.
pub const ERRORS_KEY: &str = "_errors";

/// Values and failures of one batch-by-name call.
///
/// Each requested name appears in exactly one of [`values`](Self::values)
/// or [`errors`](Self::errors).
///
/// # Examples
///
/// ```
/// # use paramstore::BatchResult;
/// # fn inspect(result: &BatchResult) {
/// for name in result.errors() {
///     eprintln!("could not load {name}");
/// }
/// if let Some(value) = result.get("/app/db/host") {
///     println!("{value:?}");
/// }
/// # }
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BatchResult {
    values: HashMap<String, ParameterValue>,
    errors: BTreeSet<String>,
}

impl BatchResult {
    pub(crate) fn insert_value(&mut self, name: String, value: ParameterValue) {
        self.errors.remove(&name);
        self.values.insert(name, value);
    }

    pub(crate) fn insert_error(&mut self, name: String) {
        self.values.remove(&name);
        self.errors.insert(name);
    }

    /// Returns the value of `name`, if it was retrieved.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ParameterValue> {
        self.values.get(name)
    }

    /// Returns every retrieved value by name.
    #[must_use]
    pub fn values(&self) -> &HashMap<String, ParameterValue> {
        &self.values
    }

    /// Returns the names that could not be retrieved or transformed, in order.
    #[must_use]
    pub fn errors(&self) -> &BTreeSet<String> {
        &self.errors
    }

    /// Returns `true` if every requested name was retrieved.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.errors.is_empty()
    }

    /// Renders the result as one JSON object.
    ///
    /// Text and JSON values are emitted as-is, binary values as base64 text.
    /// Failed names are listed under [`ERRORS_KEY`] when there are any.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        let mut object = serde_json::Map::with_capacity(self.values.len() + 1);
        for (name, value) in &self.values {
            let rendered = match value {
                ParameterValue::Text(text) => serde_json::Value::String(text.clone()),
                ParameterValue::Binary(bytes) => serde_json::Value::String(BASE64.encode(bytes)),
                ParameterValue::Json(json) => json.clone(),
            };
            object.insert(name.clone(), rendered);
        }

        if !self.errors.is_empty() {
            let errors = self.errors.iter().cloned().map(serde_json::Value::String).collect();
            object.insert(ERRORS_KEY.to_owned(), serde_json::Value::Array(errors));
        }

        serde_json::Value::Object(object)
    }
}
