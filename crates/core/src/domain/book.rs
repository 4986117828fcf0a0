use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Catalog code identifying a book. Immutable once assigned.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Isbn(pub String);

impl std::fmt::Display for Isbn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Book {
    pub isbn: Isbn,
    pub title: String,
    pub author: String,
    pub genre: String,
    pub price: Decimal,
    pub stock: i64,
}

/// Which book field a catalog search matches against.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchField {
    Title,
    Author,
}

impl SearchField {
    /// Parse a caller-supplied field name, defaulting to title for anything
    /// unrecognized (mirrors the tool contract's `by="title"` default).
    pub fn parse_or_title(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "author" => Self::Author,
            _ => Self::Title,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::Author => "author",
        }
    }
}

/// Result of a stock adjustment, reporting before/after values.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestockOutcome {
    pub isbn: Isbn,
    pub title: String,
    pub previous_stock: i64,
    pub added: i64,
    pub new_stock: i64,
}

/// Result of a price change. Already-placed order items keep their captured
/// price-at-purchase.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RepriceOutcome {
    pub isbn: Isbn,
    pub title: String,
    pub old_price: Decimal,
    pub new_price: Decimal,
}

/// Books with stock at or below this count are flagged low-stock.
pub const LOW_STOCK_THRESHOLD: i64 = 5;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InventorySummary {
    pub total_titles: i64,
    pub total_units: i64,
    pub low_stock_titles: Vec<Book>,
    pub all_books: Vec<Book>,
}

#[cfg(test)]
mod tests {
    use super::SearchField;

    #[test]
    fn search_field_parses_author_and_defaults_to_title() {
        assert_eq!(SearchField::parse_or_title("author"), SearchField::Author);
        assert_eq!(SearchField::parse_or_title("AUTHOR"), SearchField::Author);
        assert_eq!(SearchField::parse_or_title("title"), SearchField::Title);
        assert_eq!(SearchField::parse_or_title("publisher"), SearchField::Title);
        assert_eq!(SearchField::parse_or_title(""), SearchField::Title);
    }
}
