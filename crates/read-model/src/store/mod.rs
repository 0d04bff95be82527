//! Contract between the fetch strategies and the relational store.

pub mod memory;
pub mod postgres;

pub use memory::InMemoryStore;
pub use postgres::PostgresOrderStore;

use async_trait::async_trait;
use thiserror::Error;

use crate::criteria::OrderFilter;
use crate::pagination::Page;
use crate::rows::*;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("{entity} not found: {id}")]
    MissingRow { entity: &'static str, id: i64 },

    #[error("Connection error: {0}")]
    Connection(String),
}

/// Source of request-scoped sessions
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Open a unit of work for one request. Dropping the session without
    /// calling [`OrderSession::finish`] releases it as well.
    async fn begin(&self) -> Result<Box<dyn OrderSession>, StoreError>;
}

/// One request's unit of work. Every method is one round trip.
///
/// Root queries return orders ascending by id, capped at the filter's
/// `max_results` roots; line queries return lines ascending by line id.
#[async_trait]
pub trait OrderSession: Send {
    /// Order entities matching the filter
    async fn find_orders(
        &mut self,
        filter: &OrderFilter,
        page: Option<&Page>,
    ) -> Result<Vec<OrderRecord>, StoreError>;

    async fn find_customer(&mut self, customer_id: i64) -> Result<CustomerRecord, StoreError>;

    async fn find_delivery(&mut self, delivery_id: i64) -> Result<DeliveryRecord, StoreError>;

    async fn find_product(&mut self, product_id: i64) -> Result<ProductRecord, StoreError>;

    /// Line entities of one order
    async fn find_order_lines(&mut self, order_id: i64) -> Result<Vec<OrderLineRecord>, StoreError>;

    /// Orders joined with customer and delivery
    async fn find_orders_with_customer_delivery(
        &mut self,
        filter: &OrderFilter,
        page: Option<&Page>,
    ) -> Result<Vec<OrderJoinRecord>, StoreError>;

    /// Orders joined with every association, one row per line
    async fn find_orders_with_lines(
        &mut self,
        filter: &OrderFilter,
    ) -> Result<Vec<OrderLineJoinRecord>, StoreError>;

    /// Lines with their products for a group of orders
    async fn find_lines_by_order_ids(
        &mut self,
        order_ids: &[i64],
    ) -> Result<Vec<LineWithProductRecord>, StoreError>;

    /// Order view scalars only
    async fn find_order_headers(
        &mut self,
        filter: &OrderFilter,
        page: Option<&Page>,
    ) -> Result<Vec<OrderHeaderRow>, StoreError>;

    /// Line view scalars only, for a group of orders
    async fn find_line_items(&mut self, order_ids: &[i64]) -> Result<Vec<LineItemRow>, StoreError>;

    /// Order and line scalars together, one row per line
    async fn find_flat_rows(&mut self, filter: &OrderFilter) -> Result<Vec<FlatOrderRow>, StoreError>;

    /// End the unit of work
    async fn finish(self: Box<Self>) -> Result<(), StoreError>;
}

/// Session wrapper that counts round trips
pub struct TrackedSession {
    inner: Box<dyn OrderSession>,
    round_trips: usize,
}

impl TrackedSession {
    pub fn new(inner: Box<dyn OrderSession>) -> Self {
        Self {
            inner,
            round_trips: 0,
        }
    }

    pub fn round_trips(&self) -> usize {
        self.round_trips
    }

    pub async fn close(self) -> Result<(), StoreError> {
        self.inner.finish().await
    }
}

#[async_trait]
impl OrderSession for TrackedSession {
    async fn find_orders(
        &mut self,
        filter: &OrderFilter,
        page: Option<&Page>,
    ) -> Result<Vec<OrderRecord>, StoreError> {
        self.round_trips += 1;
        self.inner.find_orders(filter, page).await
    }

    async fn find_customer(&mut self, customer_id: i64) -> Result<CustomerRecord, StoreError> {
        self.round_trips += 1;
        self.inner.find_customer(customer_id).await
    }

    async fn find_delivery(&mut self, delivery_id: i64) -> Result<DeliveryRecord, StoreError> {
        self.round_trips += 1;
        self.inner.find_delivery(delivery_id).await
    }

    async fn find_product(&mut self, product_id: i64) -> Result<ProductRecord, StoreError> {
        self.round_trips += 1;
        self.inner.find_product(product_id).await
    }

    async fn find_order_lines(&mut self, order_id: i64) -> Result<Vec<OrderLineRecord>, StoreError> {
        self.round_trips += 1;
        self.inner.find_order_lines(order_id).await
    }

    async fn find_orders_with_customer_delivery(
        &mut self,
        filter: &OrderFilter,
        page: Option<&Page>,
    ) -> Result<Vec<OrderJoinRecord>, StoreError> {
        self.round_trips += 1;
        self.inner.find_orders_with_customer_delivery(filter, page).await
    }

    async fn find_orders_with_lines(
        &mut self,
        filter: &OrderFilter,
    ) -> Result<Vec<OrderLineJoinRecord>, StoreError> {
        self.round_trips += 1;
        self.inner.find_orders_with_lines(filter).await
    }

    async fn find_lines_by_order_ids(
        &mut self,
        order_ids: &[i64],
    ) -> Result<Vec<LineWithProductRecord>, StoreError> {
        self.round_trips += 1;
        self.inner.find_lines_by_order_ids(order_ids).await
    }

    async fn find_order_headers(
        &mut self,
        filter: &OrderFilter,
        page: Option<&Page>,
    ) -> Result<Vec<OrderHeaderRow>, StoreError> {
        self.round_trips += 1;
        self.inner.find_order_headers(filter, page).await
    }

    async fn find_line_items(&mut self, order_ids: &[i64]) -> Result<Vec<LineItemRow>, StoreError> {
        self.round_trips += 1;
        self.inner.find_line_items(order_ids).await
    }

    async fn find_flat_rows(&mut self, filter: &OrderFilter) -> Result<Vec<FlatOrderRow>, StoreError> {
        self.round_trips += 1;
        self.inner.find_flat_rows(filter).await
    }

    async fn finish(self: Box<Self>) -> Result<(), StoreError> {
        self.close().await
    }
}
