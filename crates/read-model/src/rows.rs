//! Row shapes returned by the store, one per query in [`OrderSession`].
//!
//! Entity-shaped records carry foreign keys and ids the way the tables do;
//! projection rows carry only the columns a view needs.
//!
//! [`OrderSession`]: crate::store::OrderSession

use chrono::{DateTime, Utc};
use domain::{Address, OrderStatus};
use sqlx::FromRow;

use crate::views::{OrderItemView, OrderSummaryView};
use crate::ReadModelError;

/// `orders` table row
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct OrderRecord {
    pub order_id: i64,
    pub customer_id: i64,
    pub delivery_id: i64,
    pub order_date: DateTime<Utc>,
    #[sqlx(try_from = "String")]
    pub status: OrderStatus,
}

#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct CustomerRecord {
    pub customer_id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct DeliveryRecord {
    pub delivery_id: i64,
    pub city: String,
    pub street: String,
    pub zipcode: String,
}

impl DeliveryRecord {
    pub fn address(&self) -> Address {
        Address::new(&self.city, &self.street, &self.zipcode)
    }
}

/// `order_item` table row
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct OrderLineRecord {
    pub order_item_id: i64,
    pub order_id: i64,
    pub product_id: i64,
    pub order_price: i32,
    pub count: i32,
}

#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct ProductRecord {
    pub product_id: i64,
    pub name: String,
    pub price: i32,
}

/// Order joined with its customer and delivery
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct OrderJoinRecord {
    pub order_id: i64,
    pub order_date: DateTime<Utc>,
    #[sqlx(try_from = "String")]
    pub status: OrderStatus,
    pub customer_id: i64,
    pub customer_name: String,
    pub delivery_id: i64,
    pub city: String,
    pub street: String,
    pub zipcode: String,
}

impl OrderJoinRecord {
    pub fn summary(&self) -> OrderSummaryView {
        OrderSummaryView::new(
            self.order_id,
            &self.customer_name,
            self.order_date,
            self.status,
            Address::new(&self.city, &self.street, &self.zipcode),
        )
    }
}

/// Order line joined with its product
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct LineWithProductRecord {
    pub order_item_id: i64,
    pub order_id: i64,
    pub order_price: i32,
    pub count: i32,
    pub product_id: i64,
    pub product_name: String,
}

impl LineWithProductRecord {
    pub fn into_item(self) -> Result<(i64, OrderItemView), ReadModelError> {
        let item =
            OrderItemView::from_columns(self.order_id, self.product_name, self.order_price, self.count)?;
        Ok((self.order_id, item))
    }
}

/// One row per order line with every association joined in. Orders with no
/// lines appear once with the line columns null.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct OrderLineJoinRecord {
    #[sqlx(flatten)]
    pub order: OrderJoinRecord,
    pub order_item_id: Option<i64>,
    pub product_id: Option<i64>,
    pub product_name: Option<String>,
    pub order_price: Option<i32>,
    pub count: Option<i32>,
}

impl OrderLineJoinRecord {
    /// The line carried by this row, if the outer join matched one
    pub fn line(&self) -> Result<Option<(i64, OrderItemView)>, ReadModelError> {
        let order_id = self.order.order_id;
        match (
            self.order_item_id,
            &self.product_name,
            self.order_price,
            self.count,
        ) {
            (Some(line_id), Some(name), Some(price), Some(count)) => {
                let item = OrderItemView::from_columns(order_id, name.clone(), price, count)?;
                Ok(Some((line_id, item)))
            }
            (None, None, None, None) => Ok(None),
            _ => Err(partial_line(order_id)),
        }
    }
}

/// View scalars of an order, selected directly into a flat shape
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct OrderHeaderRow {
    pub order_id: i64,
    pub customer_name: String,
    pub order_date: DateTime<Utc>,
    #[sqlx(try_from = "String")]
    pub status: OrderStatus,
    pub city: String,
    pub street: String,
    pub zipcode: String,
}

impl OrderHeaderRow {
    pub fn into_summary(self) -> OrderSummaryView {
        OrderSummaryView::new(
            self.order_id,
            self.customer_name,
            self.order_date,
            self.status,
            Address::new(self.city, self.street, self.zipcode),
        )
    }
}

/// View scalars of an order line, keyed by its order
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct LineItemRow {
    pub order_id: i64,
    pub item_name: String,
    pub order_price: i32,
    pub count: i32,
}

impl LineItemRow {
    pub fn into_item(self) -> Result<(i64, OrderItemView), ReadModelError> {
        let item =
            OrderItemView::from_columns(self.order_id, self.item_name, self.order_price, self.count)?;
        Ok((self.order_id, item))
    }
}

/// Order scalars and one line's scalars in a single row. Orders with no
/// lines appear once with the line columns null.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct FlatOrderRow {
    #[sqlx(flatten)]
    pub header: OrderHeaderRow,
    pub item_name: Option<String>,
    pub order_price: Option<i32>,
    pub count: Option<i32>,
}

impl FlatOrderRow {
    pub fn into_parts(self) -> Result<(OrderSummaryView, Option<OrderItemView>), ReadModelError> {
        let order_id = self.header.order_id;
        let item = match (self.item_name, self.order_price, self.count) {
            (Some(name), Some(price), Some(count)) => {
                Some(OrderItemView::from_columns(order_id, name, price, count)?)
            }
            (None, None, None) => None,
            _ => return Err(partial_line(order_id)),
        };
        Ok((self.header.into_summary(), item))
    }
}

fn partial_line(order_id: i64) -> ReadModelError {
    ReadModelError::AssemblyInvariantViolation {
        order_id,
        detail: "line columns are only partially present".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn header(order_id: i64) -> OrderHeaderRow {
        OrderHeaderRow {
            order_id,
            customer_name: "Kim".to_string(),
            order_date: Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap(),
            status: OrderStatus::Placed,
            city: "Seoul".to_string(),
            street: "Teheran-ro 1".to_string(),
            zipcode: "06236".to_string(),
        }
    }

    #[test]
    fn test_flat_row_without_line_has_no_item() {
        let row = FlatOrderRow {
            header: header(3),
            item_name: None,
            order_price: None,
            count: None,
        };
        let (summary, item) = row.into_parts().unwrap();
        assert_eq!(summary.order_id(), 3);
        assert!(item.is_none());
    }

    #[test]
    fn test_flat_row_with_partial_line_is_rejected() {
        let row = FlatOrderRow {
            header: header(3),
            item_name: Some("book".to_string()),
            order_price: None,
            count: Some(1),
        };
        assert!(matches!(
            row.into_parts(),
            Err(ReadModelError::AssemblyInvariantViolation { order_id: 3, .. })
        ));
    }
}
