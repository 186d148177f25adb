//! Database pool construction and schema migrations.
//!
//! The catalog and the ledger share one SQLite database. Migrations under `migrations/` are
//! embedded at compile time and applied with [`migrate`].

use crate::config::CoreConfig;
use crate::ClinicResult;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// Opens a connection pool for the configured database.
///
/// Foreign keys are always enabled. An in-memory database lives only as long as its
/// connection, so for `:memory:` URLs the pool is pinned to one connection that is never
/// recycled.
///
/// # Errors
///
/// Returns `ClinicError::Storage` if the URL cannot be parsed or the first connection fails.
pub async fn connect(cfg: &CoreConfig) -> ClinicResult<SqlitePool> {
    let url = cfg.database_url();
    let options = SqliteConnectOptions::from_str(url)?
        .foreign_keys(true)
        .create_if_missing(true);

    let pool = if is_in_memory(url) {
        SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?
    } else {
        SqlitePoolOptions::new().connect_with(options).await?
    };

    tracing::debug!("opened database pool for {}", url);
    Ok(pool)
}

/// Applies all pending migrations.
///
/// # Errors
///
/// Returns `ClinicError::Migration` if a migration fails to apply.
pub async fn migrate(pool: &SqlitePool) -> ClinicResult<()> {
    MIGRATOR.run(pool).await?;
    tracing::info!("database schema is up to date");
    Ok(())
}

fn is_in_memory(url: &str) -> bool {
    url.contains(":memory:") || url.contains("mode=memory")
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::NonEmptyText;
    use std::time::Duration;

    pub(crate) fn memory_cfg() -> CoreConfig {
        CoreConfig::new(
            NonEmptyText::new("sqlite::memory:").unwrap(),
            Duration::from_secs(5),
        )
        .expect("CoreConfig::new should succeed")
    }

    pub(crate) async fn migrated_pool() -> SqlitePool {
        let pool = connect(&memory_cfg())
            .await
            .expect("in-memory pool should open");
        migrate(&pool).await.expect("migrations should apply");
        pool
    }

    /// Config for a database file inside `dir`; unlike `:memory:` it allows many connections.
    pub(crate) fn file_cfg(dir: &tempfile::TempDir) -> CoreConfig {
        let db_path = dir.path().join("clinic.db");
        CoreConfig::new(
            NonEmptyText::new(format!("sqlite://{}", db_path.display())).unwrap(),
            Duration::from_secs(5),
        )
        .expect("CoreConfig::new should succeed")
    }

    pub(crate) async fn migrated_file_pool(cfg: &CoreConfig) -> SqlitePool {
        let pool = connect(cfg).await.expect("file pool should open");
        migrate(&pool).await.expect("migrations should apply");
        pool
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NonEmptyText;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn detects_in_memory_urls() {
        assert!(is_in_memory("sqlite::memory:"));
        assert!(is_in_memory("sqlite://file:ledger?mode=memory&cache=shared"));
        assert!(!is_in_memory("sqlite://clinic.db?mode=rwc"));
    }

    #[tokio::test]
    async fn migrate_creates_schema_in_file_database() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = dir.path().join("clinic.db");
        let cfg = CoreConfig::new(
            NonEmptyText::new(format!("sqlite://{}", db_path.display())).unwrap(),
            Duration::from_secs(5),
        )
        .unwrap();

        let pool = connect(&cfg).await.expect("file pool should open");
        migrate(&pool).await.expect("migrations should apply");
        // Re-running is a no-op.
        migrate(&pool).await.expect("migrations should be idempotent");

        let tables: Vec<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE '\\_%' ESCAPE '\\' ORDER BY name",
        )
        .fetch_all(&pool)
        .await
        .expect("should list tables");

        for expected in [
            "actions",
            "medical_record_actions",
            "medical_record_medicines",
            "medical_records",
            "medicines",
        ] {
            assert!(
                tables.iter().any(|t| t == expected),
                "missing table {expected}, got {tables:?}"
            );
        }
        assert!(db_path.exists(), "database file should be created");
    }
}
