use sqlx::Executor;

use crate::connection::DbPool;
use crate::repositories::RepositoryError;

const SEED_BOOK_COUNT: i64 = 12;
const SEED_CUSTOMER_COUNT: i64 = 3;
const SEED_ORDER_COUNT: i64 = 1;

/// Deterministic demo dataset: a dozen catalog titles (including low-stock
/// and sold-out entries), three customers, and one shipped order.
pub struct SeedDataset;

impl SeedDataset {
    /// SQL fixture content for the demo dataset.
    pub const SQL: &str = include_str!("../../../config/fixtures/library_seed_data.sql");

    /// Load the demo dataset. Idempotent: every row carries an explicit key
    /// and is inserted with OR REPLACE.
    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let mut tx = pool.begin().await?;
        tx.execute(sqlx::query(Self::SQL)).await?;
        tx.commit().await?;

        Ok(SeedResult {
            books: SEED_BOOK_COUNT,
            customers: SEED_CUSTOMER_COUNT,
            orders: SEED_ORDER_COUNT,
        })
    }

    /// Verify that the seeded rows are present.
    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let books: i64 =
            sqlx::query_scalar("SELECT COUNT(1) FROM books").fetch_one(pool).await?;
        let customers: i64 =
            sqlx::query_scalar("SELECT COUNT(1) FROM customers").fetch_one(pool).await?;
        let orders: i64 =
            sqlx::query_scalar("SELECT COUNT(1) FROM orders").fetch_one(pool).await?;
        let order_lines: i64 = sqlx::query_scalar(
            "SELECT COUNT(1) FROM order_items WHERE order_id = 1",
        )
        .fetch_one(pool)
        .await?;

        let checks = vec![
            ("books", books >= SEED_BOOK_COUNT),
            ("customers", customers >= SEED_CUSTOMER_COUNT),
            ("orders", orders >= SEED_ORDER_COUNT),
            ("order-items", order_lines == 2),
        ];
        let all_present = checks.iter().all(|(_, present)| *present);
        Ok(VerificationResult { all_present, checks })
    }
}

#[derive(Debug)]
pub struct SeedResult {
    pub books: i64,
    pub customers: i64,
    pub orders: i64,
}

#[derive(Debug)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{connect_with_settings, migrations};

    #[test]
    fn sql_fixture_is_valid() {
        assert!(!SeedDataset::SQL.is_empty());
    }

    #[tokio::test]
    async fn seed_loads_verifies_and_is_idempotent() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("run migrations");

        let first = SeedDataset::load(&pool).await.expect("load seed fixtures");
        assert_eq!(first.books, 12);
        let verification = SeedDataset::verify(&pool).await.expect("verify");
        assert!(verification.all_present);

        SeedDataset::load(&pool).await.expect("reload seed fixtures");
        let again = SeedDataset::verify(&pool).await.expect("re-verify");
        assert!(again.all_present);

        let books: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM books")
            .fetch_one(&pool)
            .await
            .expect("count books");
        assert_eq!(books, 12);
    }

    #[tokio::test]
    async fn seed_includes_low_stock_and_sold_out_titles() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("run migrations");
        SeedDataset::load(&pool).await.expect("load seed fixtures");

        let sold_out: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM books WHERE stock = 0")
            .fetch_one(&pool)
            .await
            .expect("count sold out");
        assert_eq!(sold_out, 1);

        let low: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM books WHERE stock <= 5")
            .fetch_one(&pool)
            .await
            .expect("count low stock");
        assert!(low >= 3);
    }
}
