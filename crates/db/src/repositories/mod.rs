use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;

use shelfdesk_core::domain::book::{Book, InventorySummary, RepriceOutcome, RestockOutcome};
use shelfdesk_core::domain::conversation::{
    MessageRole, SessionId, SessionSummary, StoredMessage, ToolCallRecord, TranscriptEntry,
};
use shelfdesk_core::domain::customer::CustomerId;
use shelfdesk_core::domain::order::{OrderDetails, OrderId, OrderReceipt, OrderRequestItem};
use shelfdesk_core::errors::{CatalogError, OrderError};
use shelfdesk_core::SearchField;

pub mod catalog;
pub mod conversation;
pub mod orders;

pub use catalog::SqlCatalogRepository;
pub use conversation::SqlConversationRepository;
pub use orders::SqlOrderRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

impl From<RepositoryError> for CatalogError {
    fn from(value: RepositoryError) -> Self {
        CatalogError::Storage(value.to_string())
    }
}

impl From<RepositoryError> for OrderError {
    fn from(value: RepositoryError) -> Self {
        OrderError::Storage(value.to_string())
    }
}

#[async_trait]
pub trait CatalogRepository: Send + Sync {
    async fn find_by_isbn(&self, isbn: &str) -> Result<Option<Book>, RepositoryError>;
    async fn search(&self, query: &str, field: SearchField) -> Result<Vec<Book>, RepositoryError>;
    async fn restock(&self, isbn: &str, qty: i64) -> Result<RestockOutcome, CatalogError>;
    async fn reprice(&self, isbn: &str, new_price: Decimal) -> Result<RepriceOutcome, CatalogError>;
    async fn inventory_summary(&self) -> Result<InventorySummary, RepositoryError>;
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn place_order(
        &self,
        customer_id: CustomerId,
        items: &[OrderRequestItem],
    ) -> Result<OrderReceipt, OrderError>;

    async fn order_status(&self, order_id: OrderId) -> Result<OrderDetails, OrderError>;
}

#[async_trait]
pub trait ConversationRepository: Send + Sync {
    async fn append_message(
        &self,
        session: &SessionId,
        role: MessageRole,
        content: &str,
    ) -> Result<(), RepositoryError>;

    async fn append_tool_call(
        &self,
        session: &SessionId,
        name: &str,
        args_json: &str,
        result_json: &str,
    ) -> Result<(), RepositoryError>;

    /// Chat history for prompt assembly: user and assistant turns only,
    /// oldest first. Rows with any other role are skipped.
    async fn history(&self, session: &SessionId) -> Result<Vec<TranscriptEntry>, RepositoryError>;

    async fn raw_messages(
        &self,
        session: &SessionId,
    ) -> Result<Vec<StoredMessage>, RepositoryError>;

    async fn tool_calls(&self, session: &SessionId)
        -> Result<Vec<ToolCallRecord>, RepositoryError>;

    async fn list_sessions(&self) -> Result<Vec<SessionSummary>, RepositoryError>;
}

/// Prices are stored as canonical decimal TEXT; a row that fails to parse is
/// a decode defect, not a recoverable condition.
pub(crate) fn parse_price(column: &str, raw: &str) -> Result<Decimal, RepositoryError> {
    raw.parse::<Decimal>()
        .map_err(|e| RepositoryError::Decode(format!("column `{column}`: {e}")))
}

/// Timestamps are RFC 3339 TEXT; unparseable values fold to now rather than
/// failing the whole row.
pub(crate) fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
