use async_trait::async_trait;
use tracing::debug;

use super::{reject_page, FetchStrategy, StrategyKind};
use crate::assembler;
use crate::criteria::OrderFilter;
use crate::pagination::Page;
use crate::store::OrderSession;
use crate::views::OrderView;
use crate::ReadModelError;

/// Joins customer and delivery into the order query. Lines are still
/// looked up per order.
#[derive(Debug, Clone, Copy, Default)]
pub struct EagerJoinSingular;

#[async_trait]
impl FetchStrategy for EagerJoinSingular {
    fn kind(&self) -> StrategyKind {
        StrategyKind::EagerJoinSingular
    }

    async fn fetch(
        &self,
        session: &mut dyn OrderSession,
        filter: &OrderFilter,
        page: Option<&Page>,
    ) -> Result<Vec<OrderView>, ReadModelError> {
        let roots = session.find_orders_with_customer_delivery(filter, page).await?;

        let mut views = Vec::with_capacity(roots.len());
        for root in &roots {
            let items = session
                .find_lines_by_order_ids(&[root.order_id])
                .await?
                .into_iter()
                .map(|line| line.into_item().map(|(_, item)| item))
                .collect::<Result<Vec<_>, _>>()?;
            views.push(OrderView::new(root.summary(), items));
        }

        Ok(views)
    }
}

/// Joins every association, lines included, into one query. The order
/// columns repeat once per line and are collapsed by order identity.
#[derive(Debug, Clone, Copy, Default)]
pub struct EagerJoinCollection;

#[async_trait]
impl FetchStrategy for EagerJoinCollection {
    fn kind(&self) -> StrategyKind {
        StrategyKind::EagerJoinCollection
    }

    async fn fetch(
        &self,
        session: &mut dyn OrderSession,
        filter: &OrderFilter,
        page: Option<&Page>,
    ) -> Result<Vec<OrderView>, ReadModelError> {
        reject_page(self.kind(), page)?;

        let rows = session.find_orders_with_lines(filter).await?;
        let row_count = rows.len();
        let views = assembler::collapse_joined_rows(rows)?;

        debug!("Collapsed {} joined rows into {} orders", row_count, views.len());
        Ok(views)
    }
}
