//! dbrig binary: resolves the configured database environment and, for
//! native SQLite environments, opens the pool and prepares the `sessions`
//! table.
//!
//! The resolved connection is printed to stdout as JSON so deploy tooling
//! can inspect what a driver would receive.

mod config;

use dbrig_config::{ConfigurationResolver, ResolvedConnection, Runtime};
use dbrig_db::{run_migrations, DbRuntimeSettings, SqliteConnectionFactory};
use tracing_subscriber::EnvFilter;

fn resolve_config_path() -> (Option<String>, &'static str) {
    if let Some(path) = std::env::args()
        .nth(1)
        .filter(|value| !value.trim().is_empty())
    {
        return (Some(path), "cli-arg");
    }

    if let Ok(path) = std::env::var("DBRIG_CONFIG_PATH") {
        if !path.trim().is_empty() {
            return (Some(path), "env-var");
        }
    }

    (None, "default")
}

fn is_native_sqlite(runtime: Runtime, resolved: &ResolvedConnection) -> bool {
    runtime == Runtime::Native
        && matches!(
            resolved.params().get_str("adapter"),
            Some("sqlite" | "sqlite3")
        )
}

fn main() {
    let (resolved_config_path, config_source) = resolve_config_path();
    let selected_config_path = resolved_config_path.as_deref().or(Some("dbrig.toml"));

    let (config, notes) = config::load_config(selected_config_path)
        .expect("failed to load configuration: cannot resolve a database without valid config");

    let filter =
        EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("info"));

    if config.logging.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }

    if notes.file_missing {
        tracing::info!(
            path = selected_config_path.unwrap_or("<none>"),
            "config file not found, using defaults"
        );
    }
    for (var, reason) in &notes.ignored_overrides {
        tracing::warn!(var = *var, reason = %reason, "ignoring environment override");
    }

    tracing::info!(
        source = config_source,
        path = selected_config_path.unwrap_or("<none>"),
        environment = %config.app.environment,
        runtime = %config.app.runtime,
        schema_dump = config.database.schema_dump(),
        load_database_tasks = config.database.load_database_tasks(),
        "resolved startup configuration"
    );

    let resolver = ConfigurationResolver::new(&config.database, config.app.runtime);
    let resolved = resolver
        .resolve(&config.app.environment)
        .expect("failed to resolve database environment: check [database.environments]");

    let rendered =
        serde_json::to_string_pretty(&resolved).expect("resolved connection should serialize");
    println!("{rendered}");

    if !is_native_sqlite(config.app.runtime, &resolved) {
        tracing::info!("no native sqlite driver for this environment, skipping connect");
        return;
    }

    let pool = resolver
        .setup(
            &config.app.environment,
            &SqliteConnectionFactory::new(DbRuntimeSettings::default()),
        )
        .expect("failed to open database: check the environment's database path");

    let conn = pool
        .get()
        .expect("failed to get database connection for migrations");
    let applied = run_migrations(&conn).expect("failed to run database migrations");
    if applied > 0 {
        tracing::info!(count = applied, "applied database migrations");
    }

    tracing::info!(
        environment = %config.app.environment,
        max_connections = pool.max_size(),
        "session storage ready"
    );
}
