//! Typed configuration: per-environment blocks plus process-wide overrides.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::ConfigurationError;

/// Ordered list of schema names for Postgres `search_path`.
///
/// Accepts either a TOML array (`["secret", "public"]`) or a comma-separated
/// string (`"private, public"`). Whitespace around each name is stripped and
/// empty segments are dropped, so both forms normalize to the same list.
/// Any other value (a number, a list with non-string items) is kept as its
/// written text rather than rejected.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(from = "SearchPathRepr", into = "Vec<String>")]
pub struct SearchPath(Vec<String>);

#[derive(Deserialize)]
#[serde(untagged)]
enum SearchPathRepr {
    List(Vec<String>),
    Joined(String),
    Other(Value),
}

impl From<SearchPathRepr> for SearchPath {
    fn from(repr: SearchPathRepr) -> Self {
        match repr {
            SearchPathRepr::List(items) => Self::new(items),
            SearchPathRepr::Joined(joined) => Self::new([joined]),
            SearchPathRepr::Other(Value::Array(items)) => {
                Self::new(items.iter().map(value_text))
            }
            SearchPathRepr::Other(other) => Self::new([value_text(&other)]),
        }
    }
}

impl From<SearchPath> for Vec<String> {
    fn from(path: SearchPath) -> Self {
        path.0
    }
}

impl SearchPath {
    /// Builds a search path, splitting any comma-joined entries.
    pub fn new<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let schemas = items
            .into_iter()
            .flat_map(|item| {
                item.as_ref()
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .collect::<Vec<_>>()
            })
            .filter(|s| !s.is_empty())
            .collect();
        Self(schemas)
    }

    /// Schema names in precedence order.
    pub fn schemas(&self) -> &[String] {
        &self.0
    }

    /// Comma-joined form with no spaces, e.g. `secret,private,public`.
    pub fn joined(&self) -> String {
        self.0.join(",")
    }
}

impl std::str::FromStr for SearchPath {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new([s]))
    }
}

/// Strings render without quotes; every other value renders as JSON text.
pub(crate) fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Pool size setting.
///
/// Integers are the normal form. Anything else (a quoted number, a negative
/// value, a float) is kept exactly as written and handed on to the driver,
/// which decides whether it is acceptable.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum MaxConnections {
    Count(u32),
    Raw(Value),
}

impl MaxConnections {
    /// The pool size, if the setting is a non-negative integer.
    pub fn count(&self) -> Option<u32> {
        match self {
            Self::Count(n) => Some(*n),
            Self::Raw(_) => None,
        }
    }

    /// Value for a connection parameter map: integers as numbers, anything
    /// else unchanged.
    pub fn to_value(&self) -> Value {
        match self {
            Self::Count(n) => Value::from(*n),
            Self::Raw(value) => value.clone(),
        }
    }
}

impl From<u32> for MaxConnections {
    fn from(n: u32) -> Self {
        Self::Count(n)
    }
}

impl std::fmt::Display for MaxConnections {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Count(n) => write!(f, "{n}"),
            Self::Raw(value) => f.write_str(&value_text(value)),
        }
    }
}

impl std::str::FromStr for MaxConnections {
    type Err = std::convert::Infallible;

    /// Integers parse to [`MaxConnections::Count`]; any other text is kept
    /// as a raw string.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(s.trim()
            .parse::<u32>()
            .map_or_else(|_| Self::Raw(Value::from(s)), Self::Count))
    }
}

/// Raw settings for one named environment.
///
/// Unknown keys are kept in `extra` and passed through to the connection
/// parameters untouched.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct EnvironmentConfig {
    /// Adapter name, e.g. `postgres`, `mysql`, `sqlite`.
    pub adapter: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub database: Option<String>,
    pub username: Option<String>,
    pub owner: Option<String>,
    pub password: Option<String>,
    /// Precomputed connection string. When set it is never re-derived.
    pub url: Option<String>,
    pub search_path: Option<SearchPath>,
    pub max_connections: Option<MaxConnections>,
    /// Passthrough keys.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl EnvironmentConfig {
    /// Returns `true` if no key at all was configured.
    pub fn is_empty(&self) -> bool {
        self.adapter.is_none()
            && self.host.is_none()
            && self.port.is_none()
            && self.database.is_none()
            && self.username.is_none()
            && self.owner.is_none()
            && self.password.is_none()
            && self.url.is_none()
            && self.search_path.is_none()
            && self.max_connections.is_none()
            && self.extra.is_empty()
    }
}

/// Shallow override applied with [`Configuration::merge`].
///
/// Only fields that are `Some` replace the current value.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ConfigurationOverrides {
    pub schema_dump: Option<bool>,
    pub load_database_tasks: Option<bool>,
    pub max_connections: Option<MaxConnections>,
    pub search_path: Option<SearchPath>,
}

/// Process-wide database configuration.
///
/// Holds every environment block plus global settings. Global
/// `max_connections` and `search_path` win over the same keys in any
/// environment block.
#[derive(Debug, Clone, Deserialize)]
pub struct Configuration {
    /// Environment blocks keyed by name (`development`, `test`, ...).
    #[serde(default)]
    pub environments: BTreeMap<String, EnvironmentConfig>,

    /// Global pool size; replaces any per-environment value.
    #[serde(default)]
    pub max_connections: Option<MaxConnections>,

    /// Global search path; replaces any per-environment value.
    #[serde(default)]
    pub search_path: Option<SearchPath>,

    #[serde(default)]
    schema_dump: Option<bool>,

    #[serde(default = "default_load_database_tasks")]
    load_database_tasks: bool,

    #[serde(skip, default = "default_app_env")]
    app_env: String,
}

fn default_load_database_tasks() -> bool {
    true
}

fn default_app_env() -> String {
    "development".to_string()
}

impl Default for Configuration {
    fn default() -> Self {
        Self::new(default_app_env())
    }
}

impl Configuration {
    /// Creates an empty configuration for the given application environment.
    ///
    /// The application environment only drives defaults such as
    /// [`schema_dump`](Self::schema_dump); it does not select a block.
    pub fn new(app_env: impl Into<String>) -> Self {
        Self {
            environments: BTreeMap::new(),
            max_connections: None,
            search_path: None,
            schema_dump: None,
            load_database_tasks: default_load_database_tasks(),
            app_env: app_env.into(),
        }
    }

    /// Parses a configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::Parse`] on malformed input.
    pub fn from_toml_str(
        contents: &str,
        app_env: impl Into<String>,
    ) -> Result<Self, ConfigurationError> {
        let mut config: Self = toml::from_str(contents)?;
        config.app_env = app_env.into();
        Ok(config)
    }

    /// Name of the application environment used for defaults.
    pub fn app_env(&self) -> &str {
        &self.app_env
    }

    pub fn set_app_env(&mut self, app_env: impl Into<String>) {
        self.app_env = app_env.into();
    }

    /// Whether the schema should be dumped after migrations.
    ///
    /// Defaults to `false` in `test` and `production`, `true` elsewhere.
    pub fn schema_dump(&self) -> bool {
        self.schema_dump
            .unwrap_or_else(|| !matches!(self.app_env.as_str(), "test" | "production"))
    }

    pub fn set_schema_dump(&mut self, value: bool) {
        self.schema_dump = Some(value);
    }

    /// Whether database maintenance tasks should be registered.
    pub fn load_database_tasks(&self) -> bool {
        self.load_database_tasks
    }

    pub fn set_load_database_tasks(&mut self, value: bool) {
        self.load_database_tasks = value;
    }

    /// Adds or replaces an environment block.
    pub fn insert_environment(&mut self, name: impl Into<String>, env: EnvironmentConfig) {
        self.environments.insert(name.into(), env);
    }

    /// Applies a shallow override. Fields left as `None` are untouched.
    pub fn merge(&mut self, overrides: ConfigurationOverrides) {
        if let Some(value) = overrides.schema_dump {
            self.schema_dump = Some(value);
        }
        if let Some(value) = overrides.load_database_tasks {
            self.load_database_tasks = value;
        }
        if let Some(value) = overrides.max_connections {
            self.max_connections = Some(value);
        }
        if let Some(value) = overrides.search_path {
            self.search_path = Some(value);
        }
    }

    /// Returns the validated settings for `name` with global overrides applied.
    ///
    /// Precedence is by source: a global `max_connections` or `search_path`
    /// replaces the environment's value even when the environment sets one.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::UnknownEnvironment`] if no block exists,
    /// [`ConfigurationError::EmptyEnvironment`] if the block is empty, and
    /// [`ConfigurationError::MissingAdapter`] if neither `adapter` nor `url`
    /// is present.
    pub fn environment(&self, name: &str) -> Result<EnvironmentConfig, ConfigurationError> {
        let raw = self
            .environments
            .get(name)
            .ok_or_else(|| ConfigurationError::UnknownEnvironment(name.to_string()))?;

        if raw.is_empty() {
            return Err(ConfigurationError::EmptyEnvironment(name.to_string()));
        }
        if raw.adapter.is_none() && raw.url.is_none() {
            return Err(ConfigurationError::MissingAdapter(name.to_string()));
        }

        let mut merged = raw.clone();
        if let Some(ref max) = self.max_connections {
            merged.max_connections = Some(max.clone());
        }
        if let Some(ref path) = self.search_path {
            merged.search_path = Some(path.clone());
        }
        Ok(merged)
    }
}
