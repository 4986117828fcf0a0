//! Domain model, error taxonomy, and configuration for Shelfdesk.
//!
//! Everything here is persistence-free: repositories live in
//! `shelfdesk-db`, the tool façade and agent loop in `shelfdesk-agent`.

pub mod config;
pub mod domain;
pub mod errors;

pub use domain::book::{
    Book, InventorySummary, Isbn, RepriceOutcome, RestockOutcome, SearchField,
    LOW_STOCK_THRESHOLD,
};
pub use domain::conversation::{
    MessageRole, SessionId, SessionSummary, StoredMessage, ToolCallRecord, TranscriptEntry,
};
pub use domain::customer::{Customer, CustomerId};
pub use domain::order::{
    Order, OrderDetails, OrderId, OrderLine, OrderReceipt, OrderRequestItem, OrderStatus,
    StockUpdate,
};
pub use errors::{CatalogError, OrderError};
