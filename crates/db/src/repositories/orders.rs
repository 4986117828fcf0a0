use sqlx::Row;

use shelfdesk_core::domain::customer::CustomerId;
use shelfdesk_core::domain::order::{
    OrderDetails, OrderId, OrderLine, OrderReceipt, OrderRequestItem, OrderStatus, StockUpdate,
};
use shelfdesk_core::errors::OrderError;

use super::{parse_price, parse_timestamp, OrderRepository, RepositoryError};
use crate::DbPool;

pub struct SqlOrderRepository {
    pool: DbPool,
}

impl SqlOrderRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl OrderRepository for SqlOrderRepository {
    /// Places an order as a single transaction: every line item ships or the
    /// whole order is rolled back and stock is untouched.
    async fn place_order(
        &self,
        customer_id: CustomerId,
        items: &[OrderRequestItem],
    ) -> Result<OrderReceipt, OrderError> {
        // Collapse repeated ISBNs into one line (quantities summed) so the
        // stock check and the decrement see the combined amount, and the
        // one-row-per-ISBN layout of order_items holds. Zero quantities are
        // rejected here with a readable message instead of tripping the
        // schema's qty check mid-transaction.
        let mut requested: Vec<(String, u32)> = Vec::with_capacity(items.len());
        for item in items {
            if item.qty == 0 {
                return Err(OrderError::InvalidQuantity(item.isbn.0.clone()));
            }
            match requested.iter_mut().find(|(isbn, _)| *isbn == item.isbn.0) {
                Some((_, qty)) => *qty += item.qty,
                None => requested.push((item.isbn.0.clone(), item.qty)),
            }
        }

        let mut tx = self.pool.begin().await.map_err(RepositoryError::from)?;

        let customer_row = sqlx::query("SELECT name FROM customers WHERE id = ?")
            .bind(customer_id.0)
            .fetch_optional(&mut *tx)
            .await
            .map_err(RepositoryError::from)?;
        let customer_name: String = match customer_row {
            Some(row) => row
                .try_get("name")
                .map_err(|e| RepositoryError::Decode(e.to_string()))?,
            None => return Err(OrderError::CustomerNotFound(customer_id.0)),
        };

        // Validation pass before any write. Titles and prices are captured
        // here so the write pass works from a consistent snapshot.
        let mut validated: Vec<(String, String, String, u32)> =
            Vec::with_capacity(requested.len());
        for (isbn, qty) in requested {
            let row = sqlx::query("SELECT title, price, stock FROM books WHERE isbn = ?")
                .bind(&isbn)
                .fetch_optional(&mut *tx)
                .await
                .map_err(RepositoryError::from)?;
            let Some(row) = row else {
                return Err(OrderError::BookNotFound(isbn));
            };
            let title: String = row
                .try_get("title")
                .map_err(|e| RepositoryError::Decode(e.to_string()))?;
            let price: String = row
                .try_get("price")
                .map_err(|e| RepositoryError::Decode(e.to_string()))?;
            let stock: i64 = row
                .try_get("stock")
                .map_err(|e| RepositoryError::Decode(e.to_string()))?;
            if stock < i64::from(qty) {
                return Err(OrderError::InsufficientStock {
                    title,
                    available: stock,
                    requested: i64::from(qty),
                });
            }
            validated.push((isbn, title, price, qty));
        }

        let order_date = chrono::Utc::now().to_rfc3339();
        let inserted = sqlx::query(
            "INSERT INTO orders (customer_id, order_date, status) VALUES (?, ?, 'placed')",
        )
        .bind(customer_id.0)
        .bind(&order_date)
        .execute(&mut *tx)
        .await
        .map_err(RepositoryError::from)?;
        let order_id = inserted.last_insert_rowid();

        let mut stock_updates = Vec::with_capacity(validated.len());
        for (isbn, title, price, qty) in validated {
            sqlx::query(
                "INSERT INTO order_items (order_id, isbn, qty, price_at_purchase)
                 VALUES (?, ?, ?, ?)",
            )
            .bind(order_id)
            .bind(&isbn)
            .bind(qty)
            .bind(&price)
            .execute(&mut *tx)
            .await
            .map_err(RepositoryError::from)?;

            // Conditional decrement. The stock guard is re-checked at write
            // time, so a concurrent order can never drive stock negative.
            let decremented = sqlx::query(
                "UPDATE books SET stock = stock - ? WHERE isbn = ? AND stock >= ?",
            )
            .bind(i64::from(qty))
            .bind(&isbn)
            .bind(i64::from(qty))
            .execute(&mut *tx)
            .await
            .map_err(RepositoryError::from)?;
            if decremented.rows_affected() == 0 {
                let available: i64 = sqlx::query("SELECT stock FROM books WHERE isbn = ?")
                    .bind(&isbn)
                    .fetch_one(&mut *tx)
                    .await
                    .map_err(RepositoryError::from)?
                    .try_get("stock")
                    .map_err(|e| RepositoryError::Decode(e.to_string()))?;
                return Err(OrderError::InsufficientStock {
                    title,
                    available,
                    requested: i64::from(qty),
                });
            }

            let new_stock: i64 = sqlx::query("SELECT stock FROM books WHERE isbn = ?")
                .bind(&isbn)
                .fetch_one(&mut *tx)
                .await
                .map_err(RepositoryError::from)?
                .try_get("stock")
                .map_err(|e| RepositoryError::Decode(e.to_string()))?;

            stock_updates.push(StockUpdate {
                isbn: shelfdesk_core::Isbn(isbn),
                title,
                qty_ordered: qty,
                new_stock,
            });
        }

        tx.commit().await.map_err(RepositoryError::from)?;

        Ok(OrderReceipt {
            order_id: OrderId(order_id),
            customer_name,
            stock_updates,
        })
    }

    async fn order_status(&self, order_id: OrderId) -> Result<OrderDetails, OrderError> {
        let order_row = sqlx::query(
            "SELECT o.order_date, o.status, c.name
             FROM orders o JOIN customers c ON c.id = o.customer_id
             WHERE o.id = ?",
        )
        .bind(order_id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(RepositoryError::from)?;
        let Some(order_row) = order_row else {
            return Err(OrderError::OrderNotFound(order_id.0));
        };

        let customer_name: String = order_row
            .try_get("name")
            .map_err(|e| RepositoryError::Decode(e.to_string()))?;
        let date_str: String = order_row
            .try_get("order_date")
            .map_err(|e| RepositoryError::Decode(e.to_string()))?;
        let status_str: String = order_row
            .try_get("status")
            .map_err(|e| RepositoryError::Decode(e.to_string()))?;

        let item_rows = sqlx::query(
            "SELECT oi.isbn, b.title, oi.qty, oi.price_at_purchase
             FROM order_items oi JOIN books b ON b.isbn = oi.isbn
             WHERE oi.order_id = ?
             ORDER BY b.title ASC",
        )
        .bind(order_id.0)
        .fetch_all(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        let mut items = Vec::with_capacity(item_rows.len());
        for row in &item_rows {
            let isbn: String = row
                .try_get("isbn")
                .map_err(|e| RepositoryError::Decode(e.to_string()))?;
            let title: String = row
                .try_get("title")
                .map_err(|e| RepositoryError::Decode(e.to_string()))?;
            let qty: u32 = row
                .try_get("qty")
                .map_err(|e| RepositoryError::Decode(e.to_string()))?;
            let price_str: String = row
                .try_get("price_at_purchase")
                .map_err(|e| RepositoryError::Decode(e.to_string()))?;
            items.push(OrderLine {
                isbn: shelfdesk_core::Isbn(isbn),
                title,
                qty,
                price_at_purchase: parse_price("price_at_purchase", &price_str)?,
            });
        }

        let total = OrderDetails::compute_total(&items);

        Ok(OrderDetails {
            order_id,
            customer: customer_name,
            date: parse_timestamp(&date_str),
            status: OrderStatus::parse_lossy(&status_str),
            items,
            total,
        })
    }
}
