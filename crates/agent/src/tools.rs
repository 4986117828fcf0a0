use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;

use shelfdesk_core::domain::book::SearchField;
use shelfdesk_core::domain::customer::CustomerId;
use shelfdesk_core::domain::order::{OrderId, OrderRequestItem};
use shelfdesk_core::Isbn;
use shelfdesk_db::repositories::{CatalogRepository, OrderRepository};

use crate::llm::ToolDefinition;

/// One operation exposed to the model. `execute` never fails across the
/// boundary: every failure becomes an `{"error": …}` payload, and a failing
/// tool has mutated nothing.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;
    fn definition(&self) -> ToolDefinition;
    async fn execute(&self, args: Value) -> Value;
}

#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn register<T>(&mut self, tool: T)
    where
        T: Tool + 'static,
    {
        self.tools.insert(tool.name().to_string(), Box::new(tool));
    }

    /// The six desk operations wired to their repositories.
    pub fn standard(
        catalog: Arc<dyn CatalogRepository>,
        orders: Arc<dyn OrderRepository>,
    ) -> Self {
        let mut registry = Self::default();
        registry.register(FindBooksTool { catalog: catalog.clone() });
        registry.register(CreateOrderTool { orders: orders.clone() });
        registry.register(RestockBookTool { catalog: catalog.clone() });
        registry.register(UpdatePriceTool { catalog: catalog.clone() });
        registry.register(OrderStatusTool { orders });
        registry.register(InventorySummaryTool { catalog });
        registry
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut definitions =
            self.tools.values().map(|tool| tool.definition()).collect::<Vec<_>>();
        definitions.sort_by(|a, b| a.function.name.cmp(&b.function.name));
        definitions
    }

    pub async fn execute(&self, name: &str, args: Value) -> Value {
        match self.tools.get(name) {
            Some(tool) => tool.execute(args).await,
            None => {
                warn!(tool = name, "model requested unknown tool");
                error_payload(format!("Unknown tool '{name}'."))
            }
        }
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

fn error_payload(message: impl Into<String>) -> Value {
    json!({ "error": message.into() })
}

fn invalid_args(error: serde_json::Error) -> Value {
    error_payload(format!("Invalid arguments: {error}."))
}

fn book_payload(book: &shelfdesk_core::Book) -> Value {
    json!({
        "isbn": book.isbn.0,
        "title": book.title,
        "author": book.author,
        "genre": book.genre,
        "price": book.price.to_string(),
        "stock": book.stock,
    })
}

pub struct FindBooksTool {
    pub catalog: Arc<dyn CatalogRepository>,
}

#[derive(Deserialize)]
struct FindBooksArgs {
    q: String,
    #[serde(default)]
    by: Option<String>,
}

#[async_trait]
impl Tool for FindBooksTool {
    fn name(&self) -> &'static str {
        "find_books"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition::function(
            self.name(),
            "Search for books by title or author. Returns matching books with \
             ISBN, price, and current stock.",
            json!({
                "type": "object",
                "properties": {
                    "q": { "type": "string", "description": "The search query string" },
                    "by": {
                        "type": "string",
                        "enum": ["title", "author"],
                        "description": "Which field to search. Defaults to title."
                    }
                },
                "required": ["q"]
            }),
        )
    }

    async fn execute(&self, args: Value) -> Value {
        let args: FindBooksArgs = match serde_json::from_value(args) {
            Ok(args) => args,
            Err(error) => return invalid_args(error),
        };
        let field = SearchField::parse_or_title(args.by.as_deref().unwrap_or("title"));

        match self.catalog.search(&args.q, field).await {
            Ok(books) if books.is_empty() => json!({
                "message": format!("No books found matching '{}' by {}.", args.q, field.as_str()),
                "results": [],
            }),
            Ok(books) => json!({
                "message": format!("Found {} book(s).", books.len()),
                "results": books.iter().map(book_payload).collect::<Vec<_>>(),
            }),
            Err(error) => error_payload(error.to_string()),
        }
    }
}

pub struct CreateOrderTool {
    pub orders: Arc<dyn OrderRepository>,
}

#[derive(Deserialize)]
struct CreateOrderArgs {
    customer_id: i64,
    items: Vec<CreateOrderItemArgs>,
}

#[derive(Deserialize)]
struct CreateOrderItemArgs {
    isbn: String,
    qty: u32,
}

#[async_trait]
impl Tool for CreateOrderTool {
    fn name(&self) -> &'static str {
        "create_order"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition::function(
            self.name(),
            "Create a new order for a customer and reduce stock accordingly. \
             The whole order succeeds or fails together.",
            json!({
                "type": "object",
                "properties": {
                    "customer_id": {
                        "type": "integer",
                        "description": "The ID of the customer placing the order"
                    },
                    "items": {
                        "type": "array",
                        "description": "Items to order",
                        "items": {
                            "type": "object",
                            "properties": {
                                "isbn": { "type": "string" },
                                "qty": { "type": "integer", "minimum": 1 }
                            },
                            "required": ["isbn", "qty"]
                        }
                    }
                },
                "required": ["customer_id", "items"]
            }),
        )
    }

    async fn execute(&self, args: Value) -> Value {
        let args: CreateOrderArgs = match serde_json::from_value(args) {
            Ok(args) => args,
            Err(error) => return invalid_args(error),
        };
        let items = args
            .items
            .into_iter()
            .map(|item| OrderRequestItem { isbn: Isbn(item.isbn), qty: item.qty })
            .collect::<Vec<_>>();

        match self.orders.place_order(CustomerId(args.customer_id), &items).await {
            Ok(receipt) => json!({
                "message": format!(
                    "Order {} created successfully for customer '{}'.",
                    receipt.order_id, receipt.customer_name
                ),
                "order_id": receipt.order_id.0,
                "stock_updates": receipt.stock_updates,
            }),
            Err(error) => error_payload(error.to_string()),
        }
    }
}

pub struct RestockBookTool {
    pub catalog: Arc<dyn CatalogRepository>,
}

#[derive(Deserialize)]
struct RestockBookArgs {
    isbn: String,
    qty: i64,
}

#[async_trait]
impl Tool for RestockBookTool {
    fn name(&self) -> &'static str {
        "restock_book"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition::function(
            self.name(),
            "Restock a book by adding quantity to current stock.",
            json!({
                "type": "object",
                "properties": {
                    "isbn": { "type": "string", "description": "The ISBN of the book to restock" },
                    "qty": { "type": "integer", "description": "The quantity to add to stock" }
                },
                "required": ["isbn", "qty"]
            }),
        )
    }

    async fn execute(&self, args: Value) -> Value {
        let args: RestockBookArgs = match serde_json::from_value(args) {
            Ok(args) => args,
            Err(error) => return invalid_args(error),
        };

        match self.catalog.restock(&args.isbn, args.qty).await {
            Ok(outcome) => json!({
                "message": format!("Restocked '{}' by {}.", outcome.title, outcome.added),
                "isbn": outcome.isbn.0,
                "title": outcome.title,
                "previous_stock": outcome.previous_stock,
                "added": outcome.added,
                "new_stock": outcome.new_stock,
            }),
            Err(error) => error_payload(error.to_string()),
        }
    }
}

pub struct UpdatePriceTool {
    pub catalog: Arc<dyn CatalogRepository>,
}

#[derive(Deserialize)]
struct UpdatePriceArgs {
    isbn: String,
    price: serde_json::Number,
}

#[async_trait]
impl Tool for UpdatePriceTool {
    fn name(&self) -> &'static str {
        "update_price"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition::function(
            self.name(),
            "Update the price of a book. Already-placed orders keep the price \
             captured when they were created.",
            json!({
                "type": "object",
                "properties": {
                    "isbn": { "type": "string", "description": "The ISBN of the book" },
                    "price": { "type": "number", "description": "The new price" }
                },
                "required": ["isbn", "price"]
            }),
        )
    }

    async fn execute(&self, args: Value) -> Value {
        let args: UpdatePriceArgs = match serde_json::from_value(args) {
            Ok(args) => args,
            Err(error) => return invalid_args(error),
        };
        // Route through the decimal string form so binary float noise never
        // lands in the catalog.
        let new_price = match args.price.to_string().parse::<Decimal>() {
            Ok(price) => price,
            Err(error) => return error_payload(format!("Invalid price: {error}.")),
        };
        if new_price < Decimal::ZERO {
            return error_payload("Price must not be negative.");
        }

        match self.catalog.reprice(&args.isbn, new_price).await {
            Ok(outcome) => json!({
                "message": format!("Price updated for '{}'.", outcome.title),
                "isbn": outcome.isbn.0,
                "title": outcome.title,
                "old_price": outcome.old_price.to_string(),
                "new_price": outcome.new_price.to_string(),
            }),
            Err(error) => error_payload(error.to_string()),
        }
    }
}

pub struct OrderStatusTool {
    pub orders: Arc<dyn OrderRepository>,
}

#[derive(Deserialize)]
struct OrderStatusArgs {
    order_id: i64,
}

#[async_trait]
impl Tool for OrderStatusTool {
    fn name(&self) -> &'static str {
        "order_status"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition::function(
            self.name(),
            "Get the status and details of an order, including its line items \
             and total.",
            json!({
                "type": "object",
                "properties": {
                    "order_id": { "type": "integer", "description": "The ID of the order to look up" }
                },
                "required": ["order_id"]
            }),
        )
    }

    async fn execute(&self, args: Value) -> Value {
        let args: OrderStatusArgs = match serde_json::from_value(args) {
            Ok(args) => args,
            Err(error) => return invalid_args(error),
        };

        match self.orders.order_status(OrderId(args.order_id)).await {
            Ok(details) => json!({
                "order_id": details.order_id.0,
                "customer": details.customer,
                "date": details.date.to_rfc3339(),
                "status": details.status.as_str(),
                "items": details
                    .items
                    .iter()
                    .map(|line| json!({
                        "isbn": line.isbn.0,
                        "title": line.title,
                        "qty": line.qty,
                        "price_at_purchase": line.price_at_purchase.to_string(),
                    }))
                    .collect::<Vec<_>>(),
                "total": details.total.to_string(),
            }),
            Err(error) => error_payload(error.to_string()),
        }
    }
}

pub struct InventorySummaryTool {
    pub catalog: Arc<dyn CatalogRepository>,
}

#[async_trait]
impl Tool for InventorySummaryTool {
    fn name(&self) -> &'static str {
        "inventory_summary"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition::function(
            self.name(),
            "Get an inventory summary of all books, highlighting low-stock \
             titles (stock <= 5).",
            json!({ "type": "object", "properties": {} }),
        )
    }

    async fn execute(&self, _args: Value) -> Value {
        match self.catalog.inventory_summary().await {
            Ok(summary) => json!({
                "total_titles": summary.total_titles,
                "total_units": summary.total_units,
                "low_stock_titles": summary.low_stock_titles.iter().map(book_payload).collect::<Vec<_>>(),
                "all_books": summary.all_books.iter().map(book_payload).collect::<Vec<_>>(),
            }),
            Err(error) => error_payload(error.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use shelfdesk_db::repositories::{SqlCatalogRepository, SqlOrderRepository};
    use shelfdesk_db::{connect_with_settings, migrations};

    use super::ToolRegistry;

    async fn registry_with_seed() -> (ToolRegistry, sqlx::SqlitePool) {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");

        sqlx::query(
            "INSERT INTO books (isbn, title, author, genre, price, stock) VALUES
                ('B1', 'Dune', 'Frank Herbert', 'Science Fiction', '9.99', 10),
                ('B2', 'Hyperion', 'Dan Simmons', 'Science Fiction', '12.50', 3)",
        )
        .execute(&pool)
        .await
        .expect("seed books");
        sqlx::query("INSERT INTO customers (id, name) VALUES (1, 'Alice')")
            .execute(&pool)
            .await
            .expect("seed customer");

        let catalog = Arc::new(SqlCatalogRepository::new(pool.clone()));
        let orders = Arc::new(SqlOrderRepository::new(pool.clone()));
        (ToolRegistry::standard(catalog, orders), pool)
    }

    #[tokio::test]
    async fn registry_exposes_six_tools_in_stable_order() {
        let (registry, _pool) = registry_with_seed().await;
        assert_eq!(registry.len(), 6);

        let names = registry
            .definitions()
            .iter()
            .map(|def| def.function.name.clone())
            .collect::<Vec<_>>();
        assert_eq!(
            names,
            vec![
                "create_order",
                "find_books",
                "inventory_summary",
                "order_status",
                "restock_book",
                "update_price"
            ]
        );
    }

    #[tokio::test]
    async fn find_books_reports_matches_and_misses() {
        let (registry, _pool) = registry_with_seed().await;

        let hit = registry.execute("find_books", json!({"q": "Dune"})).await;
        assert_eq!(hit["message"], "Found 1 book(s).");
        assert_eq!(hit["results"][0]["isbn"], "B1");
        assert_eq!(hit["results"][0]["price"], "9.99");

        let miss = registry
            .execute("find_books", json!({"q": "Tolkien", "by": "author"}))
            .await;
        assert_eq!(miss["message"], "No books found matching 'Tolkien' by author.");
        assert_eq!(miss["results"].as_array().map(Vec::len), Some(0));
    }

    #[tokio::test]
    async fn create_order_returns_receipt_payload() {
        let (registry, _pool) = registry_with_seed().await;

        let result = registry
            .execute(
                "create_order",
                json!({"customer_id": 1, "items": [{"isbn": "B1", "qty": 3}]}),
            )
            .await;

        assert_eq!(result["order_id"], 1);
        assert_eq!(result["message"], "Order 1 created successfully for customer 'Alice'.");
        assert_eq!(result["stock_updates"][0]["new_stock"], 7);
        assert!(result.get("error").is_none());
    }

    #[tokio::test]
    async fn create_order_surfaces_stock_errors_as_payloads() {
        let (registry, pool) = registry_with_seed().await;

        let result = registry
            .execute(
                "create_order",
                json!({"customer_id": 1, "items": [{"isbn": "B2", "qty": 100}]}),
            )
            .await;
        assert_eq!(
            result["error"],
            "Insufficient stock for 'Hyperion'. Available: 3, Requested: 100"
        );

        let stock: i64 = sqlx::query_scalar("SELECT stock FROM books WHERE isbn = 'B2'")
            .fetch_one(&pool)
            .await
            .expect("stock");
        assert_eq!(stock, 3);
    }

    #[tokio::test]
    async fn create_order_accepts_repeated_isbns_and_rejects_zero_qty() {
        let (registry, pool) = registry_with_seed().await;

        let zero = registry
            .execute(
                "create_order",
                json!({"customer_id": 1, "items": [{"isbn": "B1", "qty": 0}]}),
            )
            .await;
        assert_eq!(zero["error"], "Quantity must be at least 1 for ISBN B1.");

        let merged = registry
            .execute(
                "create_order",
                json!({"customer_id": 1, "items": [
                    {"isbn": "B1", "qty": 2},
                    {"isbn": "B1", "qty": 3}
                ]}),
            )
            .await;
        assert!(merged.get("error").is_none());
        assert_eq!(merged["stock_updates"].as_array().map(Vec::len), Some(1));
        assert_eq!(merged["stock_updates"][0]["new_stock"], 5);

        let stock: i64 = sqlx::query_scalar("SELECT stock FROM books WHERE isbn = 'B1'")
            .fetch_one(&pool)
            .await
            .expect("stock");
        assert_eq!(stock, 5);
    }

    #[tokio::test]
    async fn malformed_arguments_become_error_payloads() {
        let (registry, _pool) = registry_with_seed().await;

        let missing = registry.execute("create_order", json!({"customer_id": 1})).await;
        assert!(missing["error"].as_str().expect("error").starts_with("Invalid arguments"));

        let wrong_type = registry.execute("find_books", json!({"q": 7})).await;
        assert!(wrong_type["error"].as_str().expect("error").starts_with("Invalid arguments"));
    }

    #[tokio::test]
    async fn unknown_tool_is_an_error_payload() {
        let (registry, _pool) = registry_with_seed().await;
        let result = registry.execute("delete_everything", json!({})).await;
        assert_eq!(result["error"], "Unknown tool 'delete_everything'.");
    }

    #[tokio::test]
    async fn update_price_round_trips_decimal_strings() {
        let (registry, _pool) = registry_with_seed().await;

        let result = registry
            .execute("update_price", json!({"isbn": "B1", "price": 14.99}))
            .await;
        assert_eq!(result["message"], "Price updated for 'Dune'.");
        assert_eq!(result["old_price"], "9.99");
        assert_eq!(result["new_price"], "14.99");
    }

    #[tokio::test]
    async fn inventory_summary_flags_low_stock() {
        let (registry, _pool) = registry_with_seed().await;

        let result = registry.execute("inventory_summary", json!({})).await;
        assert_eq!(result["total_titles"], 2);
        assert_eq!(result["total_units"], 13);
        assert_eq!(result["low_stock_titles"].as_array().map(Vec::len), Some(1));
        assert_eq!(result["low_stock_titles"][0]["isbn"], "B2");
        assert_eq!(result["all_books"][0]["isbn"], "B2");
    }
}
