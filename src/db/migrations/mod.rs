use anyhow::Result;
use sqlx::{Executor, PgPool};
use tracing::info;

/// Embedded migrations, applied in order
const MIGRATIONS: &[(&str, &str)] = &[
    ("001_enums.sql", include_str!("sql/001_enums.sql")),
    ("002_core_tables.sql", include_str!("sql/002_core_tables.sql")),
    ("003_event_tables.sql", include_str!("sql/003_event_tables.sql")),
    ("004_indexes.sql", include_str!("sql/004_indexes.sql")),
];

/// Apply every migration not yet recorded in `schema_migrations`
pub async fn run_migrations(pool: &PgPool) -> Result<usize> {
    pool.execute(
        r#"
        CREATE TABLE IF NOT EXISTS schema_migrations (
            name TEXT PRIMARY KEY,
            applied_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .await?;

    let applied: Vec<String> = sqlx::query_scalar("SELECT name FROM schema_migrations")
        .fetch_all(pool)
        .await?;

    let mut count = 0;
    for (name, sql) in MIGRATIONS {
        if applied.iter().any(|done| done == name) {
            continue;
        }

        pool.execute(*sql).await?;
        sqlx::query("INSERT INTO schema_migrations (name) VALUES ($1)")
            .bind(*name)
            .execute(pool)
            .await?;

        info!("Applied migration: {}", name);
        count += 1;
    }

    Ok(count)
}
