use sqlx::migrate::{MigrateError, Migrator};

use crate::DbPool;

pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

pub async fn run_pending(pool: &DbPool) -> Result<(), MigrateError> {
    MIGRATOR.run(pool).await
}

/// Number of applied migrations, or zero when the bookkeeping table does not
/// exist yet (migrations have never run against this database).
pub async fn applied_count(pool: &DbPool) -> i64 {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(1) FROM _sqlx_migrations")
        .fetch_one(pool)
        .await
        .unwrap_or(0)
}
