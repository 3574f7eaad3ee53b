//! libpq Connection Strings
//!
//! An immutable, key-sorted mapping of libpq connection parameters.
//!
//! - Canonical form is `key=value` pairs sorted by key, empty values omitted
//! - Values containing whitespace are single-quoted, `\` and `'` escaped
//! - Equality and ordering are defined over the canonical form
//! - Parsing never fails; unrecognized spans are skipped
//!
//! The URI form (`postgresql://...`) is derived on demand.

mod parser;
mod uri;

use std::collections::BTreeMap;
use std::cmp::Ordering;
use std::convert::Infallible;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A libpq connection string.
#[derive(Clone, Default)]
pub struct ConnectionString {
    params: BTreeMap<String, String>,
}

impl ConnectionString {
    /// Create an empty connection string.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a libpq `key=value` connection string.
    ///
    /// When a key appears more than once, the first occurrence wins.
    pub fn parse(text: &str) -> Self {
        Self::builder().parse_from(text).build()
    }

    /// Parse `text`, then apply `overrides`, which always win over parsed values.
    pub fn with_overrides<I, K, V>(text: &str, overrides: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: ToString,
    {
        overrides
            .into_iter()
            .fold(Self::builder().parse_from(text), |builder, (k, v)| {
                builder.set(k, v)
            })
            .build()
    }

    /// Start keyword construction.
    pub fn builder() -> ConnectionStringBuilder {
        ConnectionStringBuilder::default()
    }

    /// Value for `key`, including keys explicitly set to the empty string.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// Whether `key` was set, even to the empty string.
    pub fn contains_key(&self, key: &str) -> bool {
        self.params.contains_key(key)
    }

    /// All keys that were set, sorted.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.params.keys().map(String::as_str)
    }

    /// All `(key, value)` pairs, sorted by key.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.params.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn host(&self) -> Option<&str> {
        self.get("host")
    }

    pub fn hostaddr(&self) -> Option<&str> {
        self.get("hostaddr")
    }

    pub fn port(&self) -> Option<&str> {
        self.get("port")
    }

    pub fn dbname(&self) -> Option<&str> {
        self.get("dbname")
    }

    pub fn user(&self) -> Option<&str> {
        self.get("user")
    }

    pub fn password(&self) -> Option<&str> {
        self.get("password")
    }

    /// The documented PostgreSQL URI form of this connection string.
    pub fn uri(&self) -> String {
        uri::to_uri(&self.params)
    }

    /// Canonical `key=value` form.
    pub fn as_conn_str(&self) -> String {
        self.params
            .iter()
            .filter(|(_, value)| !value.is_empty())
            .map(|(key, value)| format!("{}={}", key, parser::quote(value)))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Keyword construction for [`ConnectionString`].
///
/// Explicitly set keywords take precedence over parsed ones regardless of
/// call order.
#[derive(Debug, Clone, Default)]
pub struct ConnectionStringBuilder {
    parsed: BTreeMap<String, String>,
    explicit: BTreeMap<String, String>,
}

impl ConnectionStringBuilder {
    /// Parse `text` as a base. Keys already parsed are kept.
    pub fn parse_from(mut self, text: &str) -> Self {
        for (key, value) in parser::parse_pairs(text) {
            self.parsed.entry(key).or_insert(value);
        }
        self
    }

    /// Set `key` explicitly.
    pub fn set(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.explicit.insert(key.into(), value.to_string());
        self
    }

    pub fn build(self) -> ConnectionString {
        let mut params = self.parsed;
        params.extend(self.explicit);
        ConnectionString { params }
    }
}

impl fmt::Display for ConnectionString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_conn_str())
    }
}

impl fmt::Debug for ConnectionString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ConnectionString({:?})", self.as_conn_str())
    }
}

impl PartialEq for ConnectionString {
    fn eq(&self, other: &Self) -> bool {
        self.as_conn_str() == other.as_conn_str()
    }
}

impl Eq for ConnectionString {}

impl PartialOrd for ConnectionString {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ConnectionString {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_conn_str().cmp(&other.as_conn_str())
    }
}

impl Hash for ConnectionString {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_conn_str().hash(state);
    }
}

impl FromStr for ConnectionString {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl From<&str> for ConnectionString {
    fn from(s: &str) -> Self {
        Self::parse(s)
    }
}

impl Serialize for ConnectionString {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.as_conn_str())
    }
}

impl<'de> Deserialize<'de> for ConnectionString {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Ok(Self::parse(&text))
    }
}
