use async_trait::async_trait;
use tracing::debug;

use super::{reject_page, FetchStrategy, StrategyKind};
use crate::assembler;
use crate::criteria::OrderFilter;
use crate::pagination::Page;
use crate::store::OrderSession;
use crate::views::OrderView;
use crate::ReadModelError;

/// One query selecting order and line columns together, regrouped in
/// process
#[derive(Debug, Clone, Copy, Default)]
pub struct FlatRowRegroup;

#[async_trait]
impl FetchStrategy for FlatRowRegroup {
    fn kind(&self) -> StrategyKind {
        StrategyKind::FlatRowRegroup
    }

    async fn fetch(
        &self,
        session: &mut dyn OrderSession,
        filter: &OrderFilter,
        page: Option<&Page>,
    ) -> Result<Vec<OrderView>, ReadModelError> {
        reject_page(self.kind(), page)?;

        let rows = session.find_flat_rows(filter).await?;
        let row_count = rows.len();
        let views = assembler::regroup_flat_rows(rows)?;

        debug!("Regrouped {} flat rows into {} orders", row_count, views.len());
        Ok(views)
    }
}
