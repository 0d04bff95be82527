use chrono::{DateTime, Utc};
use domain::{Address, OrderStatus};
use serde::{Deserialize, Serialize};

use crate::ReadModelError;

/// One line of an order as seen by callers
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderItemView {
    item_name: String,
    unit_price: u32,
    quantity: u32,
}

impl OrderItemView {
    pub fn new(item_name: impl Into<String>, unit_price: u32, quantity: u32) -> Self {
        Self {
            item_name: item_name.into(),
            unit_price,
            quantity,
        }
    }

    /// Build from raw store columns, rejecting a negative price or a
    /// quantity below one
    pub fn from_columns(
        order_id: i64,
        item_name: String,
        unit_price: i32,
        quantity: i32,
    ) -> Result<Self, ReadModelError> {
        let unit_price = u32::try_from(unit_price).map_err(|_| {
            ReadModelError::AssemblyInvariantViolation {
                order_id,
                detail: format!("negative unit price {} for item {}", unit_price, item_name),
            }
        })?;
        if quantity < 1 {
            return Err(ReadModelError::AssemblyInvariantViolation {
                order_id,
                detail: format!("quantity {} for item {} is not positive", quantity, item_name),
            });
        }

        Ok(Self {
            item_name,
            unit_price,
            quantity: quantity as u32,
        })
    }

    pub fn item_name(&self) -> &str {
        &self.item_name
    }

    pub fn unit_price(&self) -> u32 {
        self.unit_price
    }

    pub fn quantity(&self) -> u32 {
        self.quantity
    }
}

/// Root-level scalars of an order: everything functionally determined by
/// the order id. Doubles as the grouping key when regrouping flat rows.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderSummaryView {
    order_id: i64,
    customer_name: String,
    order_date: DateTime<Utc>,
    status: OrderStatus,
    address: Address,
}

impl OrderSummaryView {
    pub fn new(
        order_id: i64,
        customer_name: impl Into<String>,
        order_date: DateTime<Utc>,
        status: OrderStatus,
        address: Address,
    ) -> Self {
        Self {
            order_id,
            customer_name: customer_name.into(),
            order_date,
            status,
            address,
        }
    }

    pub fn order_id(&self) -> i64 {
        self.order_id
    }

    pub fn customer_name(&self) -> &str {
        &self.customer_name
    }

    pub fn order_date(&self) -> DateTime<Utc> {
        self.order_date
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    /// Name of the first scalar field that differs from `other`
    pub fn differing_field(&self, other: &Self) -> Option<&'static str> {
        if self.order_id != other.order_id {
            Some("order_id")
        } else if self.customer_name != other.customer_name {
            Some("customer_name")
        } else if self.order_date != other.order_date {
            Some("order_date")
        } else if self.status != other.status {
            Some("status")
        } else if self.address != other.address {
            Some("address")
        } else {
            None
        }
    }
}

/// Read projection of an order with its line items
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderView {
    #[serde(flatten)]
    summary: OrderSummaryView,
    items: Vec<OrderItemView>,
}

impl OrderView {
    pub fn new(summary: OrderSummaryView, items: Vec<OrderItemView>) -> Self {
        Self { summary, items }
    }

    pub fn summary(&self) -> &OrderSummaryView {
        &self.summary
    }

    pub fn order_id(&self) -> i64 {
        self.summary.order_id
    }

    pub fn customer_name(&self) -> &str {
        &self.summary.customer_name
    }

    pub fn order_date(&self) -> DateTime<Utc> {
        self.summary.order_date
    }

    pub fn status(&self) -> OrderStatus {
        self.summary.status
    }

    pub fn address(&self) -> &Address {
        &self.summary.address
    }

    pub fn items(&self) -> &[OrderItemView] {
        &self.items
    }

    pub fn into_summary(self) -> OrderSummaryView {
        self.summary
    }
}
