use async_trait::async_trait;
use tracing::debug;

use super::{FetchStrategy, StrategyKind};
use crate::assembler;
use crate::criteria::OrderFilter;
use crate::pagination::Page;
use crate::store::OrderSession;
use crate::views::OrderView;
use crate::ReadModelError;

/// Joins customer and delivery into the order query, then loads lines with
/// grouped lookups of at most `batch_size` order ids each.
///
/// The batch size trades round trips against statement size: one id per
/// batch degrades to a lookup per order, while very large batches run into
/// the store's bind parameter limits.
#[derive(Debug, Clone, Copy)]
pub struct BatchFetch {
    batch_size: usize,
}

impl BatchFetch {
    pub const DEFAULT_BATCH_SIZE: usize = 100;

    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }
}

impl Default for BatchFetch {
    fn default() -> Self {
        Self::new(Self::DEFAULT_BATCH_SIZE)
    }
}

#[async_trait]
impl FetchStrategy for BatchFetch {
    fn kind(&self) -> StrategyKind {
        StrategyKind::BatchFetch
    }

    async fn fetch(
        &self,
        session: &mut dyn OrderSession,
        filter: &OrderFilter,
        page: Option<&Page>,
    ) -> Result<Vec<OrderView>, ReadModelError> {
        let roots = session.find_orders_with_customer_delivery(filter, page).await?;
        let order_ids: Vec<i64> = roots.iter().map(|root| root.order_id).collect();

        let mut children = Vec::new();
        for batch in order_ids.chunks(self.batch_size) {
            let lines = session.find_lines_by_order_ids(batch).await?;
            debug!("Batch of {} orders returned {} lines", batch.len(), lines.len());
            for line in lines {
                children.push(line.into_item()?);
            }
        }

        let summaries = roots.iter().map(|root| root.summary()).collect();
        Ok(assembler::attach_items(summaries, children))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::criteria::CriteriaBuilder;
    use crate::store::{OrderStore, TrackedSession};
    use crate::strategies::fixtures;
    use domain::SearchCriteria;

    async fn round_trips_for(batch_size: usize) -> usize {
        let store = fixtures::shop();
        let filter = CriteriaBuilder::default().build(&SearchCriteria::all()).unwrap();
        let mut session = TrackedSession::new(store.begin().await.unwrap());

        let views = BatchFetch::new(batch_size)
            .fetch(&mut session, &filter, None)
            .await
            .unwrap();
        assert_eq!(views.len(), 5);

        session.round_trips()
    }

    #[tokio::test]
    async fn test_round_trips_follow_batch_size() {
        assert_eq!(round_trips_for(100).await, 1 + 1);
        assert_eq!(round_trips_for(2).await, 1 + 3);
        assert_eq!(round_trips_for(1).await, 1 + 5);
    }

    #[tokio::test]
    async fn test_no_orders_means_no_batches() {
        let store = fixtures::shop();
        let criteria = SearchCriteria::all().with_customer_name("Nobody");
        let filter = CriteriaBuilder::default().build(&criteria).unwrap();
        let mut session = TrackedSession::new(store.begin().await.unwrap());

        let views = BatchFetch::default().fetch(&mut session, &filter, None).await.unwrap();

        assert!(views.is_empty());
        assert_eq!(session.round_trips(), 1);
    }

    #[test]
    fn test_zero_batch_size_is_raised_to_one() {
        assert_eq!(BatchFetch::new(0).batch_size(), 1);
    }
}
