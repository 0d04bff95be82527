//! In-process [`OrderStore`] over immutable tables, for tests and local
//! runs without a database.
//!
//! Queries follow the same join, ordering and capping rules as the
//! Postgres store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::{Address, OrderStatus};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

use super::{OrderSession, OrderStore, StoreError};
use crate::criteria::OrderFilter;
use crate::pagination::Page;
use crate::rows::*;

#[derive(Debug, Default)]
struct Tables {
    customers: BTreeMap<i64, CustomerRecord>,
    deliveries: BTreeMap<i64, DeliveryRecord>,
    products: BTreeMap<i64, ProductRecord>,
    orders: BTreeMap<i64, OrderRecord>,
    lines: BTreeMap<i64, OrderLineRecord>,
}

/// Builder for [`InMemoryStore`]. Ids are assigned sequentially per table,
/// starting at 1.
#[derive(Debug, Default)]
pub struct InMemoryStoreBuilder {
    tables: Tables,
    fail_after: Option<usize>,
    unavailable: bool,
}

impl InMemoryStoreBuilder {
    pub fn customer(&mut self, name: impl Into<String>) -> i64 {
        let customer_id = next_id(&self.tables.customers);
        self.tables.customers.insert(
            customer_id,
            CustomerRecord {
                customer_id,
                name: name.into(),
            },
        );
        customer_id
    }

    pub fn delivery(&mut self, address: &Address) -> i64 {
        let delivery_id = next_id(&self.tables.deliveries);
        self.tables.deliveries.insert(
            delivery_id,
            DeliveryRecord {
                delivery_id,
                city: address.city().to_string(),
                street: address.street().to_string(),
                zipcode: address.zipcode().to_string(),
            },
        );
        delivery_id
    }

    pub fn product(&mut self, name: impl Into<String>, price: i32) -> i64 {
        let product_id = next_id(&self.tables.products);
        self.tables.products.insert(
            product_id,
            ProductRecord {
                product_id,
                name: name.into(),
                price,
            },
        );
        product_id
    }

    /// Insert an order and its lines, given as `(product_id, order_price, count)`
    pub fn order(
        &mut self,
        customer_id: i64,
        delivery_id: i64,
        order_date: DateTime<Utc>,
        status: OrderStatus,
        lines: &[(i64, i32, i32)],
    ) -> i64 {
        let order_id = next_id(&self.tables.orders);
        self.tables.orders.insert(
            order_id,
            OrderRecord {
                order_id,
                customer_id,
                delivery_id,
                order_date,
                status,
            },
        );
        for &(product_id, order_price, count) in lines {
            self.line(order_id, product_id, order_price, count);
        }
        order_id
    }

    /// Append one line to an existing order
    pub fn line(&mut self, order_id: i64, product_id: i64, order_price: i32, count: i32) -> i64 {
        let order_item_id = next_id(&self.tables.lines);
        self.tables.lines.insert(
            order_item_id,
            OrderLineRecord {
                order_item_id,
                order_id,
                product_id,
                order_price,
                count,
            },
        );
        order_item_id
    }

    /// Fail every round trip of a session after the first `round_trips`
    pub fn fail_after(mut self, round_trips: usize) -> Self {
        self.fail_after = Some(round_trips);
        self
    }

    /// Refuse to open sessions at all
    pub fn unavailable(mut self) -> Self {
        self.unavailable = true;
        self
    }

    pub fn build(self) -> InMemoryStore {
        InMemoryStore {
            tables: Arc::new(self.tables),
            fail_after: self.fail_after,
            unavailable: self.unavailable,
            open_sessions: Arc::new(AtomicUsize::new(0)),
            finished_sessions: Arc::new(AtomicUsize::new(0)),
        }
    }
}

fn next_id<V>(table: &BTreeMap<i64, V>) -> i64 {
    table.keys().next_back().map_or(1, |last| last + 1)
}

pub struct InMemoryStore {
    tables: Arc<Tables>,
    fail_after: Option<usize>,
    unavailable: bool,
    open_sessions: Arc<AtomicUsize>,
    finished_sessions: Arc<AtomicUsize>,
}

impl InMemoryStore {
    pub fn builder() -> InMemoryStoreBuilder {
        InMemoryStoreBuilder::default()
    }

    /// Sessions begun and not yet finished or dropped
    pub fn open_sessions(&self) -> usize {
        self.open_sessions.load(Ordering::SeqCst)
    }

    /// Sessions that ended through `finish`
    pub fn finished_sessions(&self) -> usize {
        self.finished_sessions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OrderStore for InMemoryStore {
    async fn begin(&self) -> Result<Box<dyn OrderSession>, StoreError> {
        if self.unavailable {
            warn!("In-memory store refused a session");
            return Err(StoreError::Connection("store is unavailable".to_string()));
        }

        self.open_sessions.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemorySession {
            tables: Arc::clone(&self.tables),
            calls: 0,
            fail_after: self.fail_after,
            open_sessions: Arc::clone(&self.open_sessions),
            finished_sessions: Arc::clone(&self.finished_sessions),
        }))
    }
}

struct MemorySession {
    tables: Arc<Tables>,
    calls: usize,
    fail_after: Option<usize>,
    open_sessions: Arc<AtomicUsize>,
    finished_sessions: Arc<AtomicUsize>,
}

impl Drop for MemorySession {
    fn drop(&mut self) {
        self.open_sessions.fetch_sub(1, Ordering::SeqCst);
    }
}

impl MemorySession {
    fn round_trip(&mut self) -> Result<(), StoreError> {
        self.calls += 1;
        match self.fail_after {
            Some(limit) if self.calls > limit => {
                debug!("Injected failure on round trip {}", self.calls);
                Err(StoreError::Connection(format!(
                    "connection lost on round trip {}",
                    self.calls
                )))
            }
            _ => Ok(()),
        }
    }

    /// Matching orders inner-joined with customer and delivery, windowed
    fn roots(&self, filter: &OrderFilter, page: Option<&Page>) -> Vec<OrderJoinRecord> {
        let (offset, limit) = filter.window(page);
        self.tables
            .orders
            .values()
            .filter_map(|order| self.join(order))
            .filter(|row| filter.predicate().matches(row.status, &row.customer_name))
            .skip(offset as usize)
            .take(limit as usize)
            .collect()
    }

    fn join(&self, order: &OrderRecord) -> Option<OrderJoinRecord> {
        let customer = self.tables.customers.get(&order.customer_id)?;
        let delivery = self.tables.deliveries.get(&order.delivery_id)?;
        Some(OrderJoinRecord {
            order_id: order.order_id,
            order_date: order.order_date,
            status: order.status,
            customer_id: customer.customer_id,
            customer_name: customer.name.clone(),
            delivery_id: delivery.delivery_id,
            city: delivery.city.clone(),
            street: delivery.street.clone(),
            zipcode: delivery.zipcode.clone(),
        })
    }

    fn lines_of(&self, order_id: i64) -> impl Iterator<Item = &OrderLineRecord> {
        self.tables
            .lines
            .values()
            .filter(move |line| line.order_id == order_id)
    }

    /// Lines of the given orders inner-joined with their product, by line id
    fn lines_with_products(&self, order_ids: &[i64]) -> Vec<(&OrderLineRecord, &ProductRecord)> {
        self.tables
            .lines
            .values()
            .filter(|line| order_ids.contains(&line.order_id))
            .filter_map(|line| {
                self.tables
                    .products
                    .get(&line.product_id)
                    .map(|product| (line, product))
            })
            .collect()
    }
}

fn header_of(row: &OrderJoinRecord) -> OrderHeaderRow {
    OrderHeaderRow {
        order_id: row.order_id,
        customer_name: row.customer_name.clone(),
        order_date: row.order_date,
        status: row.status,
        city: row.city.clone(),
        street: row.street.clone(),
        zipcode: row.zipcode.clone(),
    }
}

#[async_trait]
impl OrderSession for MemorySession {
    async fn find_orders(
        &mut self,
        filter: &OrderFilter,
        page: Option<&Page>,
    ) -> Result<Vec<OrderRecord>, StoreError> {
        self.round_trip()?;
        let ids: Vec<i64> = self.roots(filter, page).iter().map(|r| r.order_id).collect();
        Ok(ids
            .iter()
            .filter_map(|id| self.tables.orders.get(id).cloned())
            .collect())
    }

    async fn find_customer(&mut self, customer_id: i64) -> Result<CustomerRecord, StoreError> {
        self.round_trip()?;
        self.tables
            .customers
            .get(&customer_id)
            .cloned()
            .ok_or(StoreError::MissingRow {
                entity: "customer",
                id: customer_id,
            })
    }

    async fn find_delivery(&mut self, delivery_id: i64) -> Result<DeliveryRecord, StoreError> {
        self.round_trip()?;
        self.tables
            .deliveries
            .get(&delivery_id)
            .cloned()
            .ok_or(StoreError::MissingRow {
                entity: "delivery",
                id: delivery_id,
            })
    }

    async fn find_product(&mut self, product_id: i64) -> Result<ProductRecord, StoreError> {
        self.round_trip()?;
        self.tables
            .products
            .get(&product_id)
            .cloned()
            .ok_or(StoreError::MissingRow {
                entity: "product",
                id: product_id,
            })
    }

    async fn find_order_lines(&mut self, order_id: i64) -> Result<Vec<OrderLineRecord>, StoreError> {
        self.round_trip()?;
        Ok(self.lines_of(order_id).cloned().collect())
    }

    async fn find_orders_with_customer_delivery(
        &mut self,
        filter: &OrderFilter,
        page: Option<&Page>,
    ) -> Result<Vec<OrderJoinRecord>, StoreError> {
        self.round_trip()?;
        Ok(self.roots(filter, page))
    }

    async fn find_orders_with_lines(
        &mut self,
        filter: &OrderFilter,
    ) -> Result<Vec<OrderLineJoinRecord>, StoreError> {
        self.round_trip()?;
        let mut rows = Vec::new();
        for root in self.roots(filter, None) {
            let before = rows.len();
            for line in self.lines_of(root.order_id) {
                let product = self.tables.products.get(&line.product_id);
                rows.push(OrderLineJoinRecord {
                    order: root.clone(),
                    order_item_id: Some(line.order_item_id),
                    product_id: product.map(|p| p.product_id),
                    product_name: product.map(|p| p.name.clone()),
                    order_price: Some(line.order_price),
                    count: Some(line.count),
                });
            }
            if rows.len() == before {
                rows.push(OrderLineJoinRecord {
                    order: root,
                    order_item_id: None,
                    product_id: None,
                    product_name: None,
                    order_price: None,
                    count: None,
                });
            }
        }
        Ok(rows)
    }

    async fn find_lines_by_order_ids(
        &mut self,
        order_ids: &[i64],
    ) -> Result<Vec<LineWithProductRecord>, StoreError> {
        self.round_trip()?;
        Ok(self
            .lines_with_products(order_ids)
            .into_iter()
            .map(|(line, product)| LineWithProductRecord {
                order_item_id: line.order_item_id,
                order_id: line.order_id,
                order_price: line.order_price,
                count: line.count,
                product_id: product.product_id,
                product_name: product.name.clone(),
            })
            .collect())
    }

    async fn find_order_headers(
        &mut self,
        filter: &OrderFilter,
        page: Option<&Page>,
    ) -> Result<Vec<OrderHeaderRow>, StoreError> {
        self.round_trip()?;
        Ok(self.roots(filter, page).iter().map(header_of).collect())
    }

    async fn find_line_items(&mut self, order_ids: &[i64]) -> Result<Vec<LineItemRow>, StoreError> {
        self.round_trip()?;
        Ok(self
            .lines_with_products(order_ids)
            .into_iter()
            .map(|(line, product)| LineItemRow {
                order_id: line.order_id,
                item_name: product.name.clone(),
                order_price: line.order_price,
                count: line.count,
            })
            .collect())
    }

    async fn find_flat_rows(&mut self, filter: &OrderFilter) -> Result<Vec<FlatOrderRow>, StoreError> {
        self.round_trip()?;
        let mut rows = Vec::new();
        for root in self.roots(filter, None) {
            let header = header_of(&root);
            let before = rows.len();
            for line in self.lines_of(root.order_id) {
                let product = self.tables.products.get(&line.product_id);
                rows.push(FlatOrderRow {
                    header: header.clone(),
                    item_name: product.map(|p| p.name.clone()),
                    order_price: Some(line.order_price),
                    count: Some(line.count),
                });
            }
            if rows.len() == before {
                rows.push(FlatOrderRow {
                    header,
                    item_name: None,
                    order_price: None,
                    count: None,
                });
            }
        }
        Ok(rows)
    }

    async fn finish(self: Box<Self>) -> Result<(), StoreError> {
        self.finished_sessions.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::criteria::CriteriaBuilder;
    use chrono::TimeZone;
    use domain::SearchCriteria;

    fn store() -> InMemoryStore {
        let mut b = InMemoryStore::builder();
        let kim = b.customer("Kim");
        let lee = b.customer("Lee");
        let address = Address::new("Seoul", "Teheran-ro 1", "06236");
        let book = b.product("book", 1000);
        let date = Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap();
        let d1 = b.delivery(&address);
        b.order(kim, d1, date, OrderStatus::Placed, &[(book, 1000, 2), (book, 900, 1)]);
        let d2 = b.delivery(&address);
        b.order(lee, d2, date, OrderStatus::Canceled, &[]);
        b.build()
    }

    #[tokio::test]
    async fn test_flat_rows_outer_join_empty_orders() {
        let store = store();
        let filter = CriteriaBuilder::default().build(&SearchCriteria::all()).unwrap();
        let mut session = store.begin().await.unwrap();

        let rows = session.find_flat_rows(&filter).await.unwrap();

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[2].header.order_id, 2);
        assert!(rows[2].item_name.is_none());
    }

    #[tokio::test]
    async fn test_roots_respect_predicate() {
        let store = store();
        let criteria = SearchCriteria::all().with_status(OrderStatus::Canceled);
        let filter = CriteriaBuilder::default().build(&criteria).unwrap();
        let mut session = store.begin().await.unwrap();

        let orders = session.find_orders(&filter, None).await.unwrap();

        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].order_id, 2);
    }

    #[tokio::test]
    async fn test_sessions_are_released_on_drop_and_finish() {
        let store = store();

        let session = store.begin().await.unwrap();
        assert_eq!(store.open_sessions(), 1);
        drop(session);
        assert_eq!(store.open_sessions(), 0);
        assert_eq!(store.finished_sessions(), 0);

        let session = store.begin().await.unwrap();
        session.finish().await.unwrap();
        assert_eq!(store.open_sessions(), 0);
        assert_eq!(store.finished_sessions(), 1);
    }

    #[tokio::test]
    async fn test_injected_failure_after_round_trips() {
        let mut b = InMemoryStore::builder();
        b.customer("Kim");
        let store = b.fail_after(1).build();
        let mut session = store.begin().await.unwrap();

        assert!(session.find_customer(1).await.is_ok());
        assert!(matches!(
            session.find_customer(1).await,
            Err(StoreError::Connection(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_row_is_reported() {
        let store = InMemoryStore::builder().build();
        let mut session = store.begin().await.unwrap();

        let err = session.find_product(42).await.unwrap_err();
        assert!(matches!(err, StoreError::MissingRow { entity: "product", id: 42 }));
    }
}
