//! Readiness endpoint. A single probe against the catalog table answers
//! both "is the database reachable" and "have migrations run".

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

use shelfdesk_db::DbPool;

#[derive(Clone)]
struct HealthState {
    db_pool: DbPool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub detail: String,
    pub checked_at: String,
}

pub fn router(db_pool: DbPool) -> Router {
    Router::new().route("/health", get(health)).with_state(HealthState { db_pool })
}

async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let (ready, detail) = catalog_probe(&state.db_pool).await;

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        detail,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

// Counting catalog rows (rather than SELECT 1) means a pool pointed at an
// unmigrated database reports degraded, not ready.
async fn catalog_probe(pool: &DbPool) -> (bool, String) {
    match sqlx::query_scalar::<_, i64>("SELECT COUNT(1) FROM books").fetch_one(pool).await {
        Ok(titles) => (true, format!("catalog reachable, {titles} title(s)")),
        Err(error) => (false, format!("catalog probe failed: {error}")),
    }
}

#[cfg(test)]
mod tests {
    use axum::{extract::State, http::StatusCode, Json};

    use shelfdesk_db::{connect_with_settings, migrations};

    use super::{health, HealthState};

    #[tokio::test]
    async fn migrated_database_reports_ready() {
        let pool = connect_with_settings("sqlite::memory:", 1, 5)
            .await
            .expect("pool should connect");
        migrations::run_pending(&pool).await.expect("migrations");

        let (status, Json(payload)) = health(State(HealthState { db_pool: pool.clone() })).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload.status, "ready");
        assert!(payload.detail.starts_with("catalog reachable"));

        pool.close().await;
    }

    #[tokio::test]
    async fn unmigrated_database_reports_degraded() {
        let pool = connect_with_settings("sqlite::memory:", 1, 5)
            .await
            .expect("pool should connect");

        let (status, Json(payload)) = health(State(HealthState { db_pool: pool })).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(payload.status, "degraded");
        assert!(payload.detail.starts_with("catalog probe failed"));
    }

    #[tokio::test]
    async fn closed_pool_reports_degraded() {
        let pool = connect_with_settings("sqlite::memory:", 1, 5)
            .await
            .expect("pool should connect");
        pool.close().await;

        let (status, Json(payload)) = health(State(HealthState { db_pool: pool })).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(payload.status, "degraded");
    }
}
