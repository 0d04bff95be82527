use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};
use tracing::{debug, error};

use super::{OrderSession, OrderStore, StoreError};
use crate::criteria::OrderFilter;
use crate::pagination::Page;
use crate::rows::*;

const ORDER_JOINS: &str = " FROM orders o \
    JOIN customer c ON c.customer_id = o.customer_id \
    JOIN delivery d ON d.delivery_id = o.delivery_id";

const LINE_JOINS: &str = " LEFT JOIN order_item oi ON oi.order_id = o.order_id \
    LEFT JOIN product p ON p.product_id = oi.product_id";

/// PostgreSQL implementation of [`OrderStore`]
pub struct PostgresOrderStore {
    pool: PgPool,
}

impl PostgresOrderStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OrderStore for PostgresOrderStore {
    async fn begin(&self) -> Result<Box<dyn OrderSession>, StoreError> {
        let mut tx = self.pool.begin().await.map_err(|e| {
            error!("Failed to open read transaction: {}", e);
            StoreError::Database(e)
        })?;

        sqlx::query("SET TRANSACTION READ ONLY")
            .execute(&mut *tx)
            .await?;

        Ok(Box::new(PgOrderSession { tx }))
    }
}

/// Read-only transaction held for one request. Dropping it rolls back and
/// returns the connection to the pool.
pub struct PgOrderSession {
    tx: Transaction<'static, Postgres>,
}

/// `WITH roots AS (..)` selecting the ids of the matching orders, capped
/// at the filter's root limit
fn with_roots(filter: &OrderFilter) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(
        "WITH roots AS (SELECT o.order_id FROM orders o \
         JOIN customer c ON c.customer_id = o.customer_id",
    );
    filter.predicate().push_where(&mut qb);
    qb.push(" ORDER BY o.order_id");
    filter.push_window(&mut qb, None);
    qb.push(") ");
    qb
}

#[async_trait]
impl OrderSession for PgOrderSession {
    async fn find_orders(
        &mut self,
        filter: &OrderFilter,
        page: Option<&Page>,
    ) -> Result<Vec<OrderRecord>, StoreError> {
        let mut qb = QueryBuilder::new(
            "SELECT o.order_id, o.customer_id, o.delivery_id, o.order_date, o.status \
             FROM orders o JOIN customer c ON c.customer_id = o.customer_id",
        );
        filter.predicate().push_where(&mut qb);
        qb.push(" ORDER BY o.order_id");
        filter.push_window(&mut qb, page);

        let rows = qb
            .build_query_as::<OrderRecord>()
            .fetch_all(&mut *self.tx)
            .await?;

        debug!("Loaded {} orders for [{}]", rows.len(), filter.predicate());
        Ok(rows)
    }

    async fn find_customer(&mut self, customer_id: i64) -> Result<CustomerRecord, StoreError> {
        sqlx::query_as::<_, CustomerRecord>(
            "SELECT customer_id, name FROM customer WHERE customer_id = $1",
        )
        .bind(customer_id)
        .fetch_optional(&mut *self.tx)
        .await?
        .ok_or(StoreError::MissingRow {
            entity: "customer",
            id: customer_id,
        })
    }

    async fn find_delivery(&mut self, delivery_id: i64) -> Result<DeliveryRecord, StoreError> {
        sqlx::query_as::<_, DeliveryRecord>(
            "SELECT delivery_id, city, street, zipcode FROM delivery WHERE delivery_id = $1",
        )
        .bind(delivery_id)
        .fetch_optional(&mut *self.tx)
        .await?
        .ok_or(StoreError::MissingRow {
            entity: "delivery",
            id: delivery_id,
        })
    }

    async fn find_product(&mut self, product_id: i64) -> Result<ProductRecord, StoreError> {
        sqlx::query_as::<_, ProductRecord>(
            "SELECT product_id, name, price FROM product WHERE product_id = $1",
        )
        .bind(product_id)
        .fetch_optional(&mut *self.tx)
        .await?
        .ok_or(StoreError::MissingRow {
            entity: "product",
            id: product_id,
        })
    }

    async fn find_order_lines(&mut self, order_id: i64) -> Result<Vec<OrderLineRecord>, StoreError> {
        let rows = sqlx::query_as::<_, OrderLineRecord>(
            r#"
            SELECT order_item_id, order_id, product_id, order_price, count
            FROM order_item
            WHERE order_id = $1
            ORDER BY order_item_id
            "#,
        )
        .bind(order_id)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(rows)
    }

    async fn find_orders_with_customer_delivery(
        &mut self,
        filter: &OrderFilter,
        page: Option<&Page>,
    ) -> Result<Vec<OrderJoinRecord>, StoreError> {
        let mut qb = QueryBuilder::new(
            "SELECT o.order_id, o.order_date, o.status, \
             c.customer_id, c.name AS customer_name, \
             d.delivery_id, d.city, d.street, d.zipcode",
        );
        qb.push(ORDER_JOINS);
        filter.predicate().push_where(&mut qb);
        qb.push(" ORDER BY o.order_id");
        filter.push_window(&mut qb, page);

        let rows = qb
            .build_query_as::<OrderJoinRecord>()
            .fetch_all(&mut *self.tx)
            .await?;

        debug!(
            "Loaded {} orders with customer and delivery for [{}]",
            rows.len(),
            filter.predicate()
        );
        Ok(rows)
    }

    async fn find_orders_with_lines(
        &mut self,
        filter: &OrderFilter,
    ) -> Result<Vec<OrderLineJoinRecord>, StoreError> {
        let mut qb = with_roots(filter);
        qb.push(
            "SELECT o.order_id, o.order_date, o.status, \
             c.customer_id, c.name AS customer_name, \
             d.delivery_id, d.city, d.street, d.zipcode, \
             oi.order_item_id, p.product_id, p.name AS product_name, oi.order_price, oi.count \
             FROM roots r \
             JOIN orders o ON o.order_id = r.order_id \
             JOIN customer c ON c.customer_id = o.customer_id \
             JOIN delivery d ON d.delivery_id = o.delivery_id",
        );
        qb.push(LINE_JOINS);
        qb.push(" ORDER BY o.order_id, oi.order_item_id");

        let rows = qb
            .build_query_as::<OrderLineJoinRecord>()
            .fetch_all(&mut *self.tx)
            .await?;

        debug!(
            "Loaded {} joined order/line rows for [{}]",
            rows.len(),
            filter.predicate()
        );
        Ok(rows)
    }

    async fn find_lines_by_order_ids(
        &mut self,
        order_ids: &[i64],
    ) -> Result<Vec<LineWithProductRecord>, StoreError> {
        let rows = sqlx::query_as::<_, LineWithProductRecord>(
            r#"
            SELECT oi.order_item_id, oi.order_id, oi.order_price, oi.count,
                   p.product_id, p.name AS product_name
            FROM order_item oi
            JOIN product p ON p.product_id = oi.product_id
            WHERE oi.order_id = ANY($1)
            ORDER BY oi.order_item_id
            "#,
        )
        .bind(order_ids)
        .fetch_all(&mut *self.tx)
        .await?;

        debug!("Loaded {} lines for {} orders", rows.len(), order_ids.len());
        Ok(rows)
    }

    async fn find_order_headers(
        &mut self,
        filter: &OrderFilter,
        page: Option<&Page>,
    ) -> Result<Vec<OrderHeaderRow>, StoreError> {
        let mut qb = QueryBuilder::new(
            "SELECT o.order_id, c.name AS customer_name, o.order_date, o.status, \
             d.city, d.street, d.zipcode",
        );
        qb.push(ORDER_JOINS);
        filter.predicate().push_where(&mut qb);
        qb.push(" ORDER BY o.order_id");
        filter.push_window(&mut qb, page);

        let rows = qb
            .build_query_as::<OrderHeaderRow>()
            .fetch_all(&mut *self.tx)
            .await?;

        debug!("Projected {} order headers for [{}]", rows.len(), filter.predicate());
        Ok(rows)
    }

    async fn find_line_items(&mut self, order_ids: &[i64]) -> Result<Vec<LineItemRow>, StoreError> {
        let rows = sqlx::query_as::<_, LineItemRow>(
            r#"
            SELECT oi.order_id, p.name AS item_name, oi.order_price, oi.count
            FROM order_item oi
            JOIN product p ON p.product_id = oi.product_id
            WHERE oi.order_id = ANY($1)
            ORDER BY oi.order_item_id
            "#,
        )
        .bind(order_ids)
        .fetch_all(&mut *self.tx)
        .await?;

        debug!("Projected {} line items for {} orders", rows.len(), order_ids.len());
        Ok(rows)
    }

    async fn find_flat_rows(&mut self, filter: &OrderFilter) -> Result<Vec<FlatOrderRow>, StoreError> {
        let mut qb = with_roots(filter);
        qb.push(
            "SELECT o.order_id, c.name AS customer_name, o.order_date, o.status, \
             d.city, d.street, d.zipcode, \
             p.name AS item_name, oi.order_price, oi.count \
             FROM roots r \
             JOIN orders o ON o.order_id = r.order_id \
             JOIN customer c ON c.customer_id = o.customer_id \
             JOIN delivery d ON d.delivery_id = o.delivery_id",
        );
        qb.push(LINE_JOINS);
        qb.push(" ORDER BY o.order_id, oi.order_item_id");

        let rows = qb
            .build_query_as::<FlatOrderRow>()
            .fetch_all(&mut *self.tx)
            .await?;

        debug!("Loaded {} flat rows for [{}]", rows.len(), filter.predicate());
        Ok(rows)
    }

    async fn finish(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().await?;
        Ok(())
    }
}
