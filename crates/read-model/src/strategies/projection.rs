use async_trait::async_trait;

use super::{FetchStrategy, StrategyKind};
use crate::assembler;
use crate::criteria::OrderFilter;
use crate::pagination::Page;
use crate::rows::LineItemRow;
use crate::store::OrderSession;
use crate::views::OrderView;
use crate::ReadModelError;

/// Selects view columns straight into flat rows: one query for the orders,
/// one for all of their lines
#[derive(Debug, Clone, Copy, Default)]
pub struct ProjectionDto;

#[async_trait]
impl FetchStrategy for ProjectionDto {
    fn kind(&self) -> StrategyKind {
        StrategyKind::ProjectionDto
    }

    async fn fetch(
        &self,
        session: &mut dyn OrderSession,
        filter: &OrderFilter,
        page: Option<&Page>,
    ) -> Result<Vec<OrderView>, ReadModelError> {
        let headers = session.find_order_headers(filter, page).await?;
        if headers.is_empty() {
            return Ok(Vec::new());
        }

        let order_ids: Vec<i64> = headers.iter().map(|h| h.order_id).collect();
        let children = session
            .find_line_items(&order_ids)
            .await?
            .into_iter()
            .map(LineItemRow::into_item)
            .collect::<Result<Vec<_>, _>>()?;

        let summaries = headers.into_iter().map(|h| h.into_summary()).collect();
        Ok(assembler::attach_items(summaries, children))
    }
}
