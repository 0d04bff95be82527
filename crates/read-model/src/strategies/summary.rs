use serde::{Deserialize, Serialize};
use std::fmt;

use super::lazy::LazyPerField;
use crate::criteria::OrderFilter;
use crate::pagination::Page;
use crate::store::OrderSession;
use crate::views::OrderSummaryView;
use crate::ReadModelError;

/// Strategies for listings without line items. Only singular associations
/// are involved, so every variant pages safely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SummaryStrategy {
    /// 1 + 2·orders round trips
    LazyPerField,
    /// 1 round trip
    EagerJoinSingular,
    /// 1 round trip
    ProjectionDto,
}

impl SummaryStrategy {
    pub const ALL: [SummaryStrategy; 3] = [
        SummaryStrategy::LazyPerField,
        SummaryStrategy::EagerJoinSingular,
        SummaryStrategy::ProjectionDto,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SummaryStrategy::LazyPerField => "summary_lazy_per_field",
            SummaryStrategy::EagerJoinSingular => "summary_eager_join_singular",
            SummaryStrategy::ProjectionDto => "summary_projection_dto",
        }
    }

    pub async fn fetch(
        &self,
        session: &mut dyn OrderSession,
        filter: &OrderFilter,
        page: Option<&Page>,
    ) -> Result<Vec<OrderSummaryView>, ReadModelError> {
        match self {
            SummaryStrategy::LazyPerField => {
                let orders = session.find_orders(filter, page).await?;
                let mut summaries = Vec::with_capacity(orders.len());
                for order in &orders {
                    summaries.push(LazyPerField::load_summary(&mut *session, order).await?);
                }
                Ok(summaries)
            }
            SummaryStrategy::EagerJoinSingular => Ok(session
                .find_orders_with_customer_delivery(filter, page)
                .await?
                .iter()
                .map(|root| root.summary())
                .collect()),
            SummaryStrategy::ProjectionDto => Ok(session
                .find_order_headers(filter, page)
                .await?
                .into_iter()
                .map(|header| header.into_summary())
                .collect()),
        }
    }
}

impl fmt::Display for SummaryStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
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
    async fn test_summary_strategies_agree() {
        let store = fixtures::shop();
        let filter = CriteriaBuilder::default().build(&SearchCriteria::all()).unwrap();

        let mut results = Vec::new();
        for strategy in SummaryStrategy::ALL {
            let mut session = TrackedSession::new(store.begin().await.unwrap());
            let summaries = strategy.fetch(&mut session, &filter, None).await.unwrap();
            results.push((strategy, summaries, session.round_trips()));
        }

        let (_, expected, _) = &results[0];
        assert_eq!(expected.len(), 5);
        for (strategy, summaries, _) in &results {
            assert_eq!(summaries, expected, "{} diverged", strategy);
        }

        let trips: Vec<usize> = results.iter().map(|(_, _, trips)| *trips).collect();
        assert_eq!(trips, vec![1 + 2 * 5, 1, 1]);
    }
}
