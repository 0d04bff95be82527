use common::config::QueryConfig;
use common::metrics;
use domain::SearchCriteria;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};

use crate::criteria::{CriteriaBuilder, OrderFilter};
use crate::pagination::{Page, PageRequest, Paginator};
use crate::store::{OrderStore, TrackedSession};
use crate::strategies::{StrategyKind, SummaryStrategy};
use crate::views::{OrderSummaryView, OrderView};
use crate::ReadModelError;

/// Views of one listing together with the work it took
#[derive(Debug, Clone, Serialize)]
pub struct QueryOutcome<T> {
    pub views: Vec<T>,
    pub round_trips: usize,
    pub strategy: &'static str,
}

/// Entry point for order listings. Each call runs in its own session,
/// which is finished on success and dropped on failure.
pub struct OrderQueryService {
    store: Arc<dyn OrderStore>,
    criteria: CriteriaBuilder,
    paginator: Paginator,
    config: QueryConfig,
}

impl OrderQueryService {
    pub fn new(store: Arc<dyn OrderStore>, config: QueryConfig) -> Self {
        Self {
            store,
            criteria: CriteriaBuilder::new(config.max_results),
            paginator: Paginator::new(config.max_page_size),
            config,
        }
    }

    /// Orders matching `criteria` with every association populated
    pub async fn list_orders(
        &self,
        criteria: &SearchCriteria,
        kind: StrategyKind,
        page: Option<PageRequest>,
    ) -> Result<Vec<OrderView>, ReadModelError> {
        Ok(self.list_orders_with_stats(criteria, kind, page).await?.views)
    }

    pub async fn list_orders_with_stats(
        &self,
        criteria: &SearchCriteria,
        kind: StrategyKind,
        page: Option<PageRequest>,
    ) -> Result<QueryOutcome<OrderView>, ReadModelError> {
        let started = Instant::now();
        let result = self.run_listing(criteria, kind, page).await;
        finish_metrics(kind.as_str(), &result, started);
        result
    }

    /// Orders matching `criteria` without line items
    pub async fn list_order_summaries(
        &self,
        criteria: &SearchCriteria,
        strategy: SummaryStrategy,
        page: Option<PageRequest>,
    ) -> Result<QueryOutcome<OrderSummaryView>, ReadModelError> {
        let started = Instant::now();
        let result = self.run_summaries(criteria, strategy, page).await;
        finish_metrics(strategy.as_str(), &result, started);
        result
    }

    async fn run_listing(
        &self,
        criteria: &SearchCriteria,
        kind: StrategyKind,
        page: Option<PageRequest>,
    ) -> Result<QueryOutcome<OrderView>, ReadModelError> {
        let (filter, page) = self.prepare(criteria, page)?;
        if page.is_some() && kind.duplicates_rows() {
            return Err(ReadModelError::PaginationUnsupported(kind));
        }

        info!("Listing orders where {} using {}", filter.predicate(), kind);

        let strategy = kind.build(&self.config);
        let mut session = TrackedSession::new(self.store.begin().await?);
        let views = strategy.fetch(&mut session, &filter, page.as_ref()).await?;
        let round_trips = session.round_trips();
        session.close().await?;

        Ok(QueryOutcome {
            views,
            round_trips,
            strategy: kind.as_str(),
        })
    }

    async fn run_summaries(
        &self,
        criteria: &SearchCriteria,
        strategy: SummaryStrategy,
        page: Option<PageRequest>,
    ) -> Result<QueryOutcome<OrderSummaryView>, ReadModelError> {
        let (filter, page) = self.prepare(criteria, page)?;

        info!("Listing order summaries where {} using {}", filter.predicate(), strategy);

        let mut session = TrackedSession::new(self.store.begin().await?);
        let views = strategy.fetch(&mut session, &filter, page.as_ref()).await?;
        let round_trips = session.round_trips();
        session.close().await?;

        Ok(QueryOutcome {
            views,
            round_trips,
            strategy: strategy.as_str(),
        })
    }

    fn prepare(
        &self,
        criteria: &SearchCriteria,
        page: Option<PageRequest>,
    ) -> Result<(OrderFilter, Option<Page>), ReadModelError> {
        let page = page.map(|request| self.paginator.validate(request)).transpose()?;
        let filter = self.criteria.build(criteria)?;
        Ok((filter, page))
    }
}

fn finish_metrics<T>(
    strategy: &str,
    result: &Result<QueryOutcome<T>, ReadModelError>,
    started: Instant,
) {
    let elapsed = started.elapsed();
    metrics::record_query(strategy, result.is_ok(), elapsed.as_secs_f64());

    match result {
        Ok(outcome) => {
            metrics::record_fetch(strategy, outcome.round_trips, outcome.views.len());
            info!(
                "Retrieved {} orders in {} round trips using {}",
                outcome.views.len(),
                outcome.round_trips,
                strategy
            );
            debug!("Listing took {:?}", elapsed);
        }
        Err(e) => {
            error!("Order listing using {} failed: {}", strategy, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MockOrderStore, StoreError};
    use crate::strategies::fixtures;
    use domain::OrderStatus;

    fn service(store: impl OrderStore + 'static) -> OrderQueryService {
        OrderQueryService::new(Arc::new(store), QueryConfig::default())
    }

    #[tokio::test]
    async fn test_unavailable_store_is_reported() {
        let mut store = MockOrderStore::new();
        store
            .expect_begin()
            .times(1)
            .returning(|| Err(StoreError::Connection("refused".to_string())));

        let err = service(store)
            .list_orders(&SearchCriteria::all(), StrategyKind::ProjectionDto, None)
            .await
            .unwrap_err();

        assert!(matches!(err, ReadModelError::StoreUnavailable(_)));
    }

    #[tokio::test]
    async fn test_paging_duplicating_strategy_fails_before_session() {
        let mut store = MockOrderStore::new();
        store.expect_begin().never();
        let service = service(store);

        for kind in [StrategyKind::EagerJoinCollection, StrategyKind::FlatRowRegroup] {
            let err = service
                .list_orders(&SearchCriteria::all(), kind, Some(PageRequest::new(0, 10)))
                .await
                .unwrap_err();
            assert!(matches!(err, ReadModelError::PaginationUnsupported(k) if k == kind));
        }
    }

    #[tokio::test]
    async fn test_invalid_page_fails_before_session() {
        let mut store = MockOrderStore::new();
        store.expect_begin().never();

        let err = service(store)
            .list_orders(
                &SearchCriteria::all(),
                StrategyKind::BatchFetch,
                Some(PageRequest::new(0, 0)),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ReadModelError::InvalidPagination(_)));
    }

    #[tokio::test]
    async fn test_listing_finishes_session() {
        let store = Arc::new(fixtures::shop());
        let service = OrderQueryService::new(store.clone(), QueryConfig::default());
        let criteria = SearchCriteria::all().with_status(OrderStatus::Canceled);

        let outcome = service
            .list_orders_with_stats(&criteria, StrategyKind::EagerJoinSingular, None)
            .await
            .unwrap();

        assert_eq!(outcome.views.len(), 1);
        assert_eq!(outcome.views[0].order_id(), 3);
        assert_eq!(outcome.round_trips, 2);
        assert_eq!(outcome.strategy, "eager_join_singular");
        assert_eq!(store.finished_sessions(), 1);
        assert_eq!(store.open_sessions(), 0);
    }

    #[tokio::test]
    async fn test_summary_listing_pages() {
        let store = fixtures::shop();
        let outcome = service(store)
            .list_order_summaries(
                &SearchCriteria::all(),
                SummaryStrategy::ProjectionDto,
                Some(PageRequest::new(3, 10)),
            )
            .await
            .unwrap();

        let ids: Vec<i64> = outcome.views.iter().map(|s| s.order_id()).collect();
        assert_eq!(ids, vec![4, 5]);
        assert_eq!(outcome.round_trips, 1);
    }
}
