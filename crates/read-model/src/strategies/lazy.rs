use async_trait::async_trait;

use super::{FetchStrategy, StrategyKind};
use crate::criteria::OrderFilter;
use crate::pagination::Page;
use crate::rows::OrderRecord;
use crate::store::OrderSession;
use crate::views::{OrderItemView, OrderSummaryView, OrderView};
use crate::ReadModelError;

/// Loads the order entities, then each association with its own lookup
#[derive(Debug, Clone, Copy, Default)]
pub struct LazyPerField;

impl LazyPerField {
    /// Customer and delivery lookups for one order
    pub(crate) async fn load_summary(
        session: &mut dyn OrderSession,
        order: &OrderRecord,
    ) -> Result<OrderSummaryView, ReadModelError> {
        let customer = session.find_customer(order.customer_id).await?;
        let delivery = session.find_delivery(order.delivery_id).await?;

        Ok(OrderSummaryView::new(
            order.order_id,
            customer.name,
            order.order_date,
            order.status,
            delivery.address(),
        ))
    }

    async fn load_items(
        session: &mut dyn OrderSession,
        order_id: i64,
    ) -> Result<Vec<OrderItemView>, ReadModelError> {
        let lines = session.find_order_lines(order_id).await?;
        let mut items = Vec::with_capacity(lines.len());
        for line in lines {
            let product = session.find_product(line.product_id).await?;
            items.push(OrderItemView::from_columns(
                line.order_id,
                product.name,
                line.order_price,
                line.count,
            )?);
        }
        Ok(items)
    }
}

#[async_trait]
impl FetchStrategy for LazyPerField {
    fn kind(&self) -> StrategyKind {
        StrategyKind::LazyPerField
    }

    async fn fetch(
        &self,
        session: &mut dyn OrderSession,
        filter: &OrderFilter,
        page: Option<&Page>,
    ) -> Result<Vec<OrderView>, ReadModelError> {
        let orders = session.find_orders(filter, page).await?;

        let mut views = Vec::with_capacity(orders.len());
        for order in &orders {
            let summary = Self::load_summary(&mut *session, order).await?;
            let items = Self::load_items(&mut *session, order.order_id).await?;
            views.push(OrderView::new(summary, items));
        }

        Ok(views)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::criteria::CriteriaBuilder;
    use crate::store::{OrderStore, TrackedSession};
    use crate::strategies::fixtures;
    use domain::SearchCriteria;

    #[tokio::test]
    async fn test_round_trips_grow_with_orders_and_lines() {
        let store = fixtures::shop();
        let filter = CriteriaBuilder::default().build(&SearchCriteria::all()).unwrap();
        let mut session = TrackedSession::new(store.begin().await.unwrap());

        let views = LazyPerField.fetch(&mut session, &filter, None).await.unwrap();

        let lines: usize = views.iter().map(|v| v.items().len()).sum();
        assert_eq!(views.len(), 5);
        assert_eq!(lines, 8);
        assert_eq!(session.round_trips(), 1 + 3 * 5 + 8);
    }
}
