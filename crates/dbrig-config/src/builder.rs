//! Connection-string strategies for the native and JVM-hosted runtimes.
//!
//! The native runtime hands a flat parameter map to the driver. The
//! JVM-hosted runtime needs a JDBC URL plus a companion map used for driver
//! selection. Which one runs is decided once at startup by picking a
//! [`Runtime`].

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::settings::EnvironmentConfig;

const JDBC_PREFIX: &str = "jdbc:";

/// Flat, string-keyed connection parameters handed to a driver.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ConnectionParams(BTreeMap<String, Value>);

impl ConnectionParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Returns the value for `key` if it is a string.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }
}

/// What a connection factory receives.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ResolvedConnection {
    /// Native runtime: a single parameter map.
    Params(ConnectionParams),
    /// JVM-hosted runtime: a JDBC URL plus driver hints.
    Url {
        url: String,
        params: ConnectionParams,
    },
}

impl ResolvedConnection {
    /// The parameter map, whichever shape this is.
    pub fn params(&self) -> &ConnectionParams {
        match self {
            Self::Params(params) => params,
            Self::Url { params, .. } => params,
        }
    }

    /// The URL, if this is the JVM-hosted shape.
    pub fn url(&self) -> Option<&str> {
        match self {
            Self::Params(_) => None,
            Self::Url { url, .. } => Some(url),
        }
    }
}

/// Turns merged environment settings into a [`ResolvedConnection`].
pub trait ConnectionStringBuilder: Send + Sync {
    fn build(&self, settings: &EnvironmentConfig) -> ResolvedConnection;
}

/// Builds a flat parameter map for native drivers.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeBuilder;

impl ConnectionStringBuilder for NativeBuilder {
    fn build(&self, settings: &EnvironmentConfig) -> ResolvedConnection {
        let mut params = base_params(settings);
        if let Some(ref adapter) = settings.adapter {
            params.insert("adapter", adapter.as_str());
        }
        if let Some(ref url) = settings.url {
            params.insert("url", url.as_str());
        }
        ResolvedConnection::Params(params)
    }
}

/// Builds JDBC URLs for JVM-hosted drivers.
#[derive(Debug, Clone, Copy, Default)]
pub struct JdbcBuilder;

impl ConnectionStringBuilder for JdbcBuilder {
    fn build(&self, settings: &EnvironmentConfig) -> ResolvedConnection {
        let mut params = base_params(settings);

        // An explicit url is authoritative: only the adapter hint is decorated.
        if let Some(ref url) = settings.url {
            if let Some(ref adapter) = settings.adapter {
                params.insert("adapter", jdbc_adapter(adapter));
            }
            return ResolvedConnection::Url {
                url: url.clone(),
                params,
            };
        }

        let scheme = settings
            .adapter
            .as_deref()
            .map(driver_scheme)
            .unwrap_or_default();
        params.insert("adapter", format!("{JDBC_PREFIX}{scheme}"));

        ResolvedConnection::Url {
            url: jdbc_url(scheme, settings),
            params,
        }
    }
}

/// Normalized fields shared by both runtimes, excluding `adapter` and `url`.
fn base_params(settings: &EnvironmentConfig) -> ConnectionParams {
    let mut params = ConnectionParams::new();
    if let Some(ref host) = settings.host {
        params.insert("host", host.as_str());
    }
    if let Some(port) = settings.port {
        params.insert("port", port);
    }
    if let Some(ref database) = settings.database {
        params.insert("database", database.as_str());
    }
    if let Some(ref username) = settings.username {
        params.insert("username", username.as_str());
    }
    if let Some(ref owner) = settings.owner {
        params.insert("owner", owner.as_str());
    }
    if let Some(ref password) = settings.password {
        params.insert("password", password.as_str());
    }
    if let Some(ref path) = settings.search_path {
        params.insert("search_path", path.joined());
    }
    if let Some(ref max) = settings.max_connections {
        params.insert("max_connections", max.to_value());
    }
    for (key, value) in &settings.extra {
        params.insert(key.as_str(), value.clone());
    }
    params
}

fn jdbc_adapter(adapter: &str) -> String {
    if adapter.starts_with(JDBC_PREFIX) {
        adapter.to_string()
    } else {
        format!("{JDBC_PREFIX}{adapter}")
    }
}

/// Maps an adapter name to the scheme its JDBC driver expects.
pub fn driver_scheme(adapter: &str) -> &str {
    let adapter = adapter.strip_prefix(JDBC_PREFIX).unwrap_or(adapter);
    match adapter {
        "postgres" | "postgresql" => "postgresql",
        "mysql" | "mysql2" => "mysql",
        "sqlite" | "sqlite3" => "sqlite",
        other => other,
    }
}

/// `jdbc:<scheme>://<host>[:<port>][/<database>][?<query>]`
fn jdbc_url(scheme: &str, settings: &EnvironmentConfig) -> String {
    let mut url = format!(
        "{JDBC_PREFIX}{scheme}://{}",
        settings.host.as_deref().unwrap_or("localhost")
    );
    if let Some(port) = settings.port {
        url.push_str(&format!(":{port}"));
    }
    if let Some(ref database) = settings.database {
        url.push('/');
        url.push_str(database);
    }

    let mut query = Vec::new();
    if let Some(ref user) = settings.username {
        query.push(format!("user={user}"));
    }
    if let Some(ref password) = settings.password {
        query.push(format!("password={password}"));
    }
    if let Some(ref path) = settings.search_path {
        query.push(format!("search_path={}", path.joined()));
    }
    if let Some(ref max) = settings.max_connections {
        query.push(format!("max_connections={max}"));
    }
    if !query.is_empty() {
        url.push('?');
        url.push_str(&query.join("&"));
    }
    url
}

/// Execution runtime whose driver conventions apply.
///
/// Deserializes through [`FromStr`], so config files accept the same names
/// as `DBRIG_RUNTIME`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(try_from = "String", rename_all = "lowercase")]
pub enum Runtime {
    /// Native drivers taking a parameter map.
    #[default]
    Native,
    /// JVM-hosted drivers taking JDBC URLs.
    Jvm,
}

impl Runtime {
    /// Returns the builder strategy for this runtime.
    pub fn builder(self) -> Box<dyn ConnectionStringBuilder> {
        match self {
            Self::Native => Box::new(NativeBuilder),
            Self::Jvm => Box::new(JdbcBuilder),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Native => "native",
            Self::Jvm => "jvm",
        }
    }
}

impl fmt::Display for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown runtime name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown runtime '{0}' (expected 'native' or 'jvm')")]
pub struct ParseRuntimeError(pub String);

impl FromStr for Runtime {
    type Err = ParseRuntimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "native" => Ok(Self::Native),
            "jvm" | "jdbc" => Ok(Self::Jvm),
            other => Err(ParseRuntimeError(other.to_string())),
        }
    }
}

impl TryFrom<String> for Runtime {
    type Error = ParseRuntimeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{MaxConnections, SearchPath};

    fn postgres() -> EnvironmentConfig {
        EnvironmentConfig {
            adapter: Some("postgres".to_string()),
            host: Some("127.0.0.1".to_string()),
            database: Some("app_dev".to_string()),
            username: Some("deploy".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn native_builds_flat_params_without_url() {
        let resolved = NativeBuilder.build(&postgres());

        let ResolvedConnection::Params(params) = resolved else {
            panic!("native runtime should produce a parameter map");
        };
        assert_eq!(params.get_str("adapter"), Some("postgres"));
        assert_eq!(params.get_str("host"), Some("127.0.0.1"));
        assert_eq!(params.get_str("database"), Some("app_dev"));
        assert!(!params.contains_key("url"));
    }

    #[test]
    fn native_joins_search_path() {
        let mut settings = postgres();
        settings.search_path = Some(SearchPath::new(["a , b", "c"]));

        let resolved = NativeBuilder.build(&settings);
        assert_eq!(resolved.params().get_str("search_path"), Some("a,b,c"));
    }

    #[test]
    fn native_passes_extra_keys_through() {
        let mut settings = postgres();
        settings
            .extra
            .insert("sslmode".to_string(), Value::from("require"));
        settings
            .extra
            .insert("connect_timeout".to_string(), Value::from(5));

        let resolved = NativeBuilder.build(&settings);
        assert_eq!(resolved.params().get_str("sslmode"), Some("require"));
        assert_eq!(
            resolved.params().get("connect_timeout"),
            Some(&Value::from(5))
        );
    }

    #[test]
    fn native_keeps_malformed_max_connections_as_given() {
        let mut settings = postgres();
        settings.max_connections = Some(MaxConnections::Raw(Value::from("10")));
        let quoted = NativeBuilder.build(&settings);

        settings.max_connections = Some(MaxConnections::Raw(Value::from(-1)));
        let negative = NativeBuilder.build(&settings);

        settings.max_connections = Some(MaxConnections::Count(10));
        let integer = NativeBuilder.build(&settings);

        assert_eq!(quoted.params().get("max_connections"), Some(&Value::from("10")));
        assert_eq!(negative.params().get("max_connections"), Some(&Value::from(-1)));
        assert_eq!(integer.params().get("max_connections"), Some(&Value::from(10)));
    }

    #[test]
    fn jdbc_translates_postgres_scheme() {
        let resolved = JdbcBuilder.build(&postgres());

        assert_eq!(
            resolved.url(),
            Some("jdbc:postgresql://127.0.0.1/app_dev?user=deploy")
        );
        assert_eq!(resolved.params().get_str("adapter"), Some("jdbc:postgresql"));
        assert_eq!(resolved.params().get_str("host"), Some("127.0.0.1"));
    }

    #[test]
    fn jdbc_url_includes_port_and_query_options() {
        let mut settings = postgres();
        settings.port = Some(5433);
        settings.password = Some("hunter2".to_string());
        settings.search_path = Some("private, public".parse().unwrap());
        settings.max_connections = Some(MaxConnections::Count(7));

        let resolved = JdbcBuilder.build(&settings);
        assert_eq!(
            resolved.url(),
            Some(
                "jdbc:postgresql://127.0.0.1:5433/app_dev\
                 ?user=deploy&password=hunter2&search_path=private,public&max_connections=7"
            )
        );
    }

    #[test]
    fn jdbc_interpolates_malformed_max_connections_as_given() {
        let mut settings = postgres();
        settings.max_connections = Some(MaxConnections::Raw(Value::from("10")));
        let quoted = JdbcBuilder.build(&settings);

        settings.max_connections = Some(MaxConnections::Raw(Value::from(-1)));
        let negative = JdbcBuilder.build(&settings);

        assert_eq!(
            quoted.url(),
            Some("jdbc:postgresql://127.0.0.1/app_dev?user=deploy&max_connections=10")
        );
        assert_eq!(quoted.params().get("max_connections"), Some(&Value::from("10")));
        assert_eq!(
            negative.url(),
            Some("jdbc:postgresql://127.0.0.1/app_dev?user=deploy&max_connections=-1")
        );
    }

    #[test]
    fn jdbc_passes_extra_keys_through() {
        let mut settings = postgres();
        settings
            .extra
            .insert("sslmode".to_string(), Value::from("require"));

        let constructed = JdbcBuilder.build(&settings);
        settings.url = Some("jdbc:postgresql://db/app".to_string());
        let explicit = JdbcBuilder.build(&settings);

        assert_eq!(constructed.params().get_str("sslmode"), Some("require"));
        assert_eq!(explicit.params().get_str("sslmode"), Some("require"));
        assert_eq!(explicit.url(), Some("jdbc:postgresql://db/app"));
    }

    #[test]
    fn jdbc_defaults_host_and_skips_empty_query() {
        let settings = EnvironmentConfig {
            adapter: Some("mysql2".to_string()),
            ..Default::default()
        };

        let resolved = JdbcBuilder.build(&settings);
        assert_eq!(resolved.url(), Some("jdbc:mysql://localhost"));
        assert_eq!(resolved.params().get_str("adapter"), Some("jdbc:mysql"));
    }

    #[test]
    fn jdbc_passes_explicit_url_through() {
        let url = "jdbc:adapter_name://HOST/DB?user=U&password=P&ssl=true&sslfactory=sslFactoryOption";
        let settings = EnvironmentConfig {
            adapter: Some("adapter_name".to_string()),
            host: Some("ignored".to_string()),
            max_connections: Some(MaxConnections::Count(9)),
            url: Some(url.to_string()),
            ..Default::default()
        };

        let resolved = JdbcBuilder.build(&settings);
        assert_eq!(resolved.url(), Some(url));
        assert_eq!(resolved.params().get_str("adapter"), Some("jdbc:adapter_name"));
        assert!(!resolved.params().contains_key("url"));
    }

    #[test]
    fn jdbc_does_not_double_prefix_adapter() {
        let settings = EnvironmentConfig {
            adapter: Some("jdbc:postgresql".to_string()),
            url: Some("jdbc:postgresql://db/app".to_string()),
            ..Default::default()
        };

        let resolved = JdbcBuilder.build(&settings);
        assert_eq!(resolved.params().get_str("adapter"), Some("jdbc:postgresql"));
    }

    #[test]
    fn driver_scheme_maps_known_adapters() {
        assert_eq!(driver_scheme("postgres"), "postgresql");
        assert_eq!(driver_scheme("jdbc:postgres"), "postgresql");
        assert_eq!(driver_scheme("sqlite3"), "sqlite");
        assert_eq!(driver_scheme("oracle"), "oracle");
    }

    #[test]
    fn runtime_parses_and_selects_builder() {
        assert_eq!("native".parse::<Runtime>(), Ok(Runtime::Native));
        assert_eq!(" JVM ".parse::<Runtime>(), Ok(Runtime::Jvm));
        assert!("wasm".parse::<Runtime>().is_err());

        let resolved = Runtime::Jvm.builder().build(&postgres());
        assert!(resolved.url().is_some());
    }

    #[test]
    fn runtime_deserializes_the_names_from_str_accepts() {
        #[derive(Deserialize)]
        struct Holder {
            runtime: Runtime,
        }

        for (name, expected) in [
            ("native", Runtime::Native),
            ("jvm", Runtime::Jvm),
            ("jdbc", Runtime::Jvm),
            ("JVM", Runtime::Jvm),
        ] {
            let holder: Holder = toml::from_str(&format!("runtime = \"{name}\""))
                .expect("runtime name should deserialize");
            assert_eq!(holder.runtime, expected, "runtime = {name}");
            assert_eq!(name.parse::<Runtime>(), Ok(expected));
        }

        let err = toml::from_str::<Holder>("runtime = \"wasm\"").err();
        assert!(err.is_some(), "unknown runtime should be rejected");
        assert_eq!(
            serde_json::to_value(Runtime::Jvm).expect("runtime should serialize"),
            Value::from("jvm")
        );
    }
}
