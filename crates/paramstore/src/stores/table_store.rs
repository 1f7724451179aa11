// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::collections::HashMap;

use crate::{BackendOptions, Error, ParameterSource, RawValue, Result, options::keys};

/// Partition key attribute used unless configured otherwise.
pub const DEFAULT_KEY_ATTR: &str = "id";
/// Sort key attribute used unless configured otherwise.
pub const DEFAULT_SORT_ATTR: &str = "sk";
/// Value attribute used unless configured otherwise.
pub const DEFAULT_VALUE_ATTR: &str = "value";

/// One table item, by attribute name.
pub type Item = HashMap<String, RawValue>;

/// Table name and attribute layout of a [`TableStore`].
///
/// # Examples
///
/// ```
/// use paramstore::TableConfig;
///
/// let config = TableConfig::new("parameters").value_attr("payload");
/// assert_eq!(config.key_attr, "id");
/// assert_eq!(config.sort_attr, "sk");
/// assert_eq!(config.value_attr, "payload");
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableConfig {
    /// Name of the table.
    pub table_name: String,
    /// Partition key attribute, matched against parameter names and paths.
    pub key_attr: String,
    /// Sort key attribute, used to key multi-item results.
    pub sort_attr: String,
    /// Attribute holding the parameter value.
    pub value_attr: String,
}

impl TableConfig {
    /// Creates a config for `table_name` with the default attribute names.
    #[must_use]
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            key_attr: DEFAULT_KEY_ATTR.to_owned(),
            sort_attr: DEFAULT_SORT_ATTR.to_owned(),
            value_attr: DEFAULT_VALUE_ATTR.to_owned(),
        }
    }

    /// Sets the partition key attribute.
    #[must_use]
    pub fn key_attr(mut self, attr: impl Into<String>) -> Self {
        self.key_attr = attr.into();
        self
    }

    /// Sets the sort key attribute.
    #[must_use]
    pub fn sort_attr(mut self, attr: impl Into<String>) -> Self {
        self.sort_attr = attr.into();
        self
    }

    /// Sets the value attribute.
    #[must_use]
    pub fn value_attr(mut self, attr: impl Into<String>) -> Self {
        self.value_attr = attr.into();
        self
    }

    fn validate(&self) -> Result<()> {
        let blank = [
            ("table_name", &self.table_name),
            ("key_attr", &self.key_attr),
            ("sort_attr", &self.sort_attr),
            ("value_attr", &self.value_attr),
        ]
        .into_iter()
        .find(|(_, value)| value.is_empty());

        match blank {
            Some((field, _)) => Err(Error::configuration(format!("table store {field} must not be empty"))),
            None => Ok(()),
        }
    }
}

/// Key lookup against one table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TableRequest<'a> {
    /// Name of the table.
    pub table_name: &'a str,
    /// Partition key attribute.
    pub key_attr: &'a str,
    /// Partition key value.
    pub key: &'a str,
    /// Whether a strongly consistent read is requested.
    pub consistent_read: bool,
}

/// One page of query results.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueryPage<K> {
    /// Items on this page.
    pub items: Vec<Item>,
    /// Where the next page starts, if the query continues.
    pub last_evaluated_key: Option<K>,
}

/// The read calls a table client must offer.
pub trait TableClient: Send + Sync {
    /// Opaque position from which a query continues.
    type Cursor: Send + Sync;

    /// Reads the item whose partition key matches, if any.
    fn get_item(&self, request: TableRequest<'_>, options: &BackendOptions) -> impl Future<Output = Result<Option<Item>>> + Send;

    /// Reads one page of the items sharing a partition key.
    fn query(
        &self,
        request: TableRequest<'_>,
        start: Option<Self::Cursor>,
        options: &BackendOptions,
    ) -> impl Future<Output = Result<QueryPage<Self::Cursor>>> + Send;
}

/// Source backed by a key-value table.
///
/// A single parameter is the item whose partition key equals its name.
/// Multiple values are every item sharing a partition key, keyed by their
/// sort attribute. [`keys::SORT_ATTR`] and [`keys::CONSISTENT_READ`] may be
/// set per call.
#[derive(Debug)]
pub struct TableStore<C> {
    client: C,
    config: TableConfig,
}

impl<C: TableClient> TableStore<C> {
    /// Creates a source over `client` for the table described by `config`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the table name or an attribute name is empty.
    pub fn new(client: C, config: TableConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { client, config })
    }

    /// Returns the table layout.
    #[must_use]
    pub fn config(&self) -> &TableConfig {
        &self.config
    }

    /// Returns the underlying client.
    #[must_use]
    pub fn client(&self) -> &C {
        &self.client
    }

    fn request<'a>(&'a self, key: &'a str, options: &BackendOptions) -> TableRequest<'a> {
        TableRequest {
            table_name: &self.config.table_name,
            key_attr: &self.config.key_attr,
            key,
            consistent_read: options.flag(keys::CONSISTENT_READ).unwrap_or(false),
        }
    }
}

impl<C: TableClient> ParameterSource for TableStore<C> {
    fn name(&self) -> &'static str {
        "table"
    }

    async fn fetch_one(&self, name: &str, options: &BackendOptions) -> Result<RawValue> {
        let mut item = self
            .client
            .get_item(self.request(name, options), options)
            .await?
            .ok_or_else(|| {
                Error::retrieval(format!(
                    "no item with {}='{name}' in table '{}'",
                    self.config.key_attr, self.config.table_name
                ))
            })?;

        take_attr(&mut item, &self.config.value_attr, name)
    }

    async fn fetch_many(&self, path: &str, options: &BackendOptions) -> Result<HashMap<String, RawValue>> {
        let sort_attr = options.text(keys::SORT_ATTR).unwrap_or(self.config.sort_attr.as_str());

        let mut values = HashMap::new();
        let mut start = None;
        loop {
            let page = self.client.query(self.request(path, options), start, options).await?;
            for mut item in page.items {
                let sort_key = match take_attr(&mut item, sort_attr, path)? {
                    RawValue::Text(text) => text,
                    RawValue::Binary(_) => {
                        return Err(Error::retrieval(format!(
                            "sort attribute '{sort_attr}' of an item under '{path}' is not text"
                        )));
                    }
                };
                let value = take_attr(&mut item, &self.config.value_attr, path)?;
                values.insert(sort_key, value);
            }

            match page.last_evaluated_key {
                Some(key) => start = Some(key),
                None => break,
            }
        }

        Ok(values)
    }
}

fn take_attr(item: &mut Item, attr: &str, key: &str) -> Result<RawValue> {
    item.remove(attr)
        .ok_or_else(|| Error::retrieval(format!("item '{key}' has no attribute '{attr}'")))
}
