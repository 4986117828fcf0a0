use thiserror::Error;

/// Failure taxonomy for order placement and lookup.
///
/// `CustomerNotFound`, `BookNotFound`, `OrderNotFound`, and
/// `InsufficientStock` are expected, caller-recoverable conditions;
/// `Storage` is an unexpected transactional fault. In all cases the
/// operation that produced the error left no partial state behind.
///
/// Display strings double as the `{"error": …}` payloads crossing the tool
/// boundary, so their wording is part of the contract.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum OrderError {
    #[error("Customer with ID {0} not found.")]
    CustomerNotFound(i64),
    #[error("Book with ISBN {0} not found.")]
    BookNotFound(String),
    #[error("Insufficient stock for '{title}'. Available: {available}, Requested: {requested}")]
    InsufficientStock { title: String, available: i64, requested: i64 },
    #[error("Quantity must be at least 1 for ISBN {0}.")]
    InvalidQuantity(String),
    #[error("Order {0} not found.")]
    OrderNotFound(i64),
    #[error("storage failure: {0}")]
    Storage(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("Book with ISBN {0} not found.")]
    BookNotFound(String),
    #[error("storage failure: {0}")]
    Storage(String),
}
