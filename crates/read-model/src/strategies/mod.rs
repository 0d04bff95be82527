//! How an order's associations get populated.
//!
//! | Strategy | Round trips | Duplicated rows | Pageable |
//! |---|---|---|---|
//! | [`LazyPerField`] | 1 + 3·orders + lines | no | yes |
//! | [`EagerJoinSingular`] | 1 + orders | no | yes |
//! | [`EagerJoinCollection`] | 1 | yes | no |
//! | [`BatchFetch`] | 1 + ⌈orders / batch⌉ | no | yes |
//! | [`ProjectionDto`] | 2 | no | yes |
//! | [`FlatRowRegroup`] | 1 | yes | no |
//!
//! Every strategy yields the same views for the same store contents.

mod batch;
mod flat;
mod join;
mod lazy;
mod projection;
mod summary;

pub use batch::BatchFetch;
pub use flat::FlatRowRegroup;
pub use join::{EagerJoinCollection, EagerJoinSingular};
pub use lazy::LazyPerField;
pub use projection::ProjectionDto;
pub use summary::SummaryStrategy;

use async_trait::async_trait;
use common::config::QueryConfig;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::criteria::OrderFilter;
use crate::pagination::Page;
use crate::store::OrderSession;
use crate::views::OrderView;
use crate::ReadModelError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    LazyPerField,
    EagerJoinSingular,
    EagerJoinCollection,
    BatchFetch,
    ProjectionDto,
    FlatRowRegroup,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 6] = [
        StrategyKind::LazyPerField,
        StrategyKind::EagerJoinSingular,
        StrategyKind::EagerJoinCollection,
        StrategyKind::BatchFetch,
        StrategyKind::ProjectionDto,
        StrategyKind::FlatRowRegroup,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::LazyPerField => "lazy_per_field",
            StrategyKind::EagerJoinSingular => "eager_join_singular",
            StrategyKind::EagerJoinCollection => "eager_join_collection",
            StrategyKind::BatchFetch => "batch_fetch",
            StrategyKind::ProjectionDto => "projection_dto",
            StrategyKind::FlatRowRegroup => "flat_row_regroup",
        }
    }

    /// Whether the row stream repeats order columns once per line
    pub fn duplicates_rows(&self) -> bool {
        matches!(
            self,
            StrategyKind::EagerJoinCollection | StrategyKind::FlatRowRegroup
        )
    }

    pub fn is_pagination_safe(&self) -> bool {
        !self.duplicates_rows()
    }

    pub fn build(&self, config: &QueryConfig) -> Box<dyn FetchStrategy> {
        match self {
            StrategyKind::LazyPerField => Box::new(LazyPerField),
            StrategyKind::EagerJoinSingular => Box::new(EagerJoinSingular),
            StrategyKind::EagerJoinCollection => Box::new(EagerJoinCollection),
            StrategyKind::BatchFetch => Box::new(BatchFetch::new(config.batch_size)),
            StrategyKind::ProjectionDto => Box::new(ProjectionDto),
            StrategyKind::FlatRowRegroup => Box::new(FlatRowRegroup),
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("Unknown fetch strategy: {0}")]
pub struct UnknownStrategy(pub String);

impl FromStr for StrategyKind {
    type Err = UnknownStrategy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase().replace('-', "_");
        StrategyKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == wanted)
            .ok_or_else(|| UnknownStrategy(s.to_string()))
    }
}

/// Loads orders with all associations populated, deciding up front which
/// queries to issue
#[async_trait]
pub trait FetchStrategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    async fn fetch(
        &self,
        session: &mut dyn OrderSession,
        filter: &OrderFilter,
        page: Option<&Page>,
    ) -> Result<Vec<OrderView>, ReadModelError>;
}

/// Row-duplicating strategies cannot page: a window over lines is not a
/// window over orders
fn reject_page(kind: StrategyKind, page: Option<&Page>) -> Result<(), ReadModelError> {
    match page {
        Some(_) => Err(ReadModelError::PaginationUnsupported(kind)),
        None => Ok(()),
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use chrono::{Duration, TimeZone, Utc};
    use domain::{Address, OrderStatus};

    use crate::store::InMemoryStore;

    /// Five orders: Kim with three lines, Lee with one, Kim canceled with
    /// two, Park with none, Choi with two
    pub fn shop() -> InMemoryStore {
        let mut b = InMemoryStore::builder();
        let kim = b.customer("Kim");
        let lee = b.customer("Lee");
        let park = b.customer("Park");
        let choi = b.customer("Choi");
        let book = b.product("book", 1000);
        let pen = b.product("pen", 500);
        let ink = b.product("ink", 300);
        let base = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        let seoul = Address::new("Seoul", "Teheran-ro 1", "06236");
        let busan = Address::new("Busan", "Haeundae-ro 2", "48094");

        let d = b.delivery(&seoul);
        b.order(kim, d, base, OrderStatus::Placed, &[(book, 1000, 2), (pen, 500, 1), (ink, 300, 3)]);
        let d = b.delivery(&busan);
        b.order(lee, d, base + Duration::hours(1), OrderStatus::Placed, &[(book, 1000, 1)]);
        let d = b.delivery(&seoul);
        b.order(kim, d, base + Duration::hours(2), OrderStatus::Canceled, &[(pen, 450, 2), (ink, 300, 1)]);
        let d = b.delivery(&busan);
        b.order(park, d, base + Duration::hours(3), OrderStatus::Placed, &[]);
        let d = b.delivery(&seoul);
        b.order(choi, d, base + Duration::hours(4), OrderStatus::Placed, &[(ink, 300, 5), (book, 1000, 1)]);

        b.build()
    }
}
