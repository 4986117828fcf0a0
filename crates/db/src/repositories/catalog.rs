use rust_decimal::Decimal;
use sqlx::Row;

use shelfdesk_core::domain::book::{
    Book, InventorySummary, Isbn, RepriceOutcome, RestockOutcome, SearchField,
    LOW_STOCK_THRESHOLD,
};
use shelfdesk_core::errors::CatalogError;

use super::{parse_price, CatalogRepository, RepositoryError};
use crate::DbPool;

pub struct SqlCatalogRepository {
    pool: DbPool,
}

impl SqlCatalogRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_book(row: &sqlx::sqlite::SqliteRow) -> Result<Book, RepositoryError> {
    let isbn: String = row.try_get("isbn").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let title: String =
        row.try_get("title").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let author: String =
        row.try_get("author").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let genre: String =
        row.try_get("genre").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let price_str: String =
        row.try_get("price").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let stock: i64 = row.try_get("stock").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    Ok(Book {
        isbn: Isbn(isbn),
        title,
        author,
        genre,
        price: parse_price("price", &price_str)?,
        stock,
    })
}

#[async_trait::async_trait]
impl CatalogRepository for SqlCatalogRepository {
    async fn find_by_isbn(&self, isbn: &str) -> Result<Option<Book>, RepositoryError> {
        let row = sqlx::query(
            "SELECT isbn, title, author, genre, price, stock FROM books WHERE isbn = ?",
        )
        .bind(isbn)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_book(r)?)),
            None => Ok(None),
        }
    }

    async fn search(&self, query: &str, field: SearchField) -> Result<Vec<Book>, RepositoryError> {
        let pattern = format!("%{query}%");
        let sql = match field {
            SearchField::Title => {
                "SELECT isbn, title, author, genre, price, stock
                 FROM books WHERE title LIKE ? ORDER BY title ASC"
            }
            SearchField::Author => {
                "SELECT isbn, title, author, genre, price, stock
                 FROM books WHERE author LIKE ? ORDER BY title ASC"
            }
        };
        let rows: Vec<sqlx::sqlite::SqliteRow> =
            sqlx::query(sql).bind(&pattern).fetch_all(&self.pool).await?;

        rows.iter().map(row_to_book).collect::<Result<Vec<_>, _>>()
    }

    /// Adjusts stock by a signed delta inside one transaction. The schema's
    /// non-negative CHECK rejects any adjustment that would drive stock
    /// below zero.
    async fn restock(&self, isbn: &str, qty: i64) -> Result<RestockOutcome, CatalogError> {
        let mut tx = self.pool.begin().await.map_err(RepositoryError::from)?;

        let row = sqlx::query("SELECT title, stock FROM books WHERE isbn = ?")
            .bind(isbn)
            .fetch_optional(&mut *tx)
            .await
            .map_err(RepositoryError::from)?;
        let Some(row) = row else {
            return Err(CatalogError::BookNotFound(isbn.to_string()));
        };
        let title: String = row
            .try_get("title")
            .map_err(|e| RepositoryError::Decode(e.to_string()))?;
        let previous_stock: i64 = row
            .try_get("stock")
            .map_err(|e| RepositoryError::Decode(e.to_string()))?;

        sqlx::query("UPDATE books SET stock = stock + ? WHERE isbn = ?")
            .bind(qty)
            .bind(isbn)
            .execute(&mut *tx)
            .await
            .map_err(RepositoryError::from)?;

        tx.commit().await.map_err(RepositoryError::from)?;

        Ok(RestockOutcome {
            isbn: Isbn(isbn.to_string()),
            title,
            previous_stock,
            added: qty,
            new_stock: previous_stock + qty,
        })
    }

    async fn reprice(
        &self,
        isbn: &str,
        new_price: Decimal,
    ) -> Result<RepriceOutcome, CatalogError> {
        let mut tx = self.pool.begin().await.map_err(RepositoryError::from)?;

        let row = sqlx::query("SELECT title, price FROM books WHERE isbn = ?")
            .bind(isbn)
            .fetch_optional(&mut *tx)
            .await
            .map_err(RepositoryError::from)?;
        let Some(row) = row else {
            return Err(CatalogError::BookNotFound(isbn.to_string()));
        };
        let title: String = row
            .try_get("title")
            .map_err(|e| RepositoryError::Decode(e.to_string()))?;
        let old_price_str: String = row
            .try_get("price")
            .map_err(|e| RepositoryError::Decode(e.to_string()))?;
        let old_price = parse_price("price", &old_price_str)?;

        sqlx::query("UPDATE books SET price = ? WHERE isbn = ?")
            .bind(new_price.to_string())
            .bind(isbn)
            .execute(&mut *tx)
            .await
            .map_err(RepositoryError::from)?;

        tx.commit().await.map_err(RepositoryError::from)?;

        Ok(RepriceOutcome { isbn: Isbn(isbn.to_string()), title, old_price, new_price })
    }

    async fn inventory_summary(&self) -> Result<InventorySummary, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(
            "SELECT isbn, title, author, genre, price, stock FROM books ORDER BY stock ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        let all_books = rows.iter().map(row_to_book).collect::<Result<Vec<_>, _>>()?;
        let total_titles = all_books.len() as i64;
        let total_units = all_books.iter().map(|b| b.stock).sum();
        let low_stock_titles = all_books
            .iter()
            .filter(|b| b.stock <= LOW_STOCK_THRESHOLD)
            .cloned()
            .collect();

        Ok(InventorySummary { total_titles, total_units, low_stock_titles, all_books })
    }
}
