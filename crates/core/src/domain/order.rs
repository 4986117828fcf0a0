use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::book::Isbn;
use crate::domain::customer::CustomerId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderId(pub i64);

impl std::fmt::Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Orders open in `Placed`; the core never advances the status itself.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Placed,
    Shipped,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Placed => "placed",
            Self::Shipped => "shipped",
            Self::Cancelled => "cancelled",
        }
    }

    /// Unknown stored values fold back to `Placed` rather than failing the
    /// whole row decode.
    pub fn parse_lossy(value: &str) -> Self {
        match value {
            "shipped" => Self::Shipped,
            "cancelled" => Self::Cancelled,
            _ => Self::Placed,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub customer_id: CustomerId,
    pub order_date: DateTime<Utc>,
    pub status: OrderStatus,
}

/// One requested line of an order before validation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRequestItem {
    pub isbn: Isbn,
    pub qty: u32,
}

/// Per-book stock movement reported back after a successful placement.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockUpdate {
    pub isbn: Isbn,
    pub title: String,
    pub qty_ordered: u32,
    pub new_stock: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderReceipt {
    pub order_id: OrderId,
    pub customer_name: String,
    pub stock_updates: Vec<StockUpdate>,
}

/// A stored line item. `price_at_purchase` is captured at order creation and
/// never recomputed, so historical totals survive later repricing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrderLine {
    pub isbn: Isbn,
    pub title: String,
    pub qty: u32,
    pub price_at_purchase: Decimal,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrderDetails {
    pub order_id: OrderId,
    pub customer: String,
    pub date: DateTime<Utc>,
    pub status: OrderStatus,
    pub items: Vec<OrderLine>,
    pub total: Decimal,
}

impl OrderDetails {
    /// Σ(qty × price-at-purchase), rounded to 2 decimal places.
    pub fn compute_total(items: &[OrderLine]) -> Decimal {
        items
            .iter()
            .map(|line| line.price_at_purchase * Decimal::from(line.qty))
            .sum::<Decimal>()
            .round_dp(2)
    }
}
