pub mod assembler;
pub mod criteria;
pub mod pagination;
pub mod rows;
pub mod service;
pub mod store;
pub mod strategies;
pub mod views;

pub use criteria::{CriteriaBuilder, OrderFilter, OrderPredicate};
pub use pagination::{Page, PageRequest, Paginator};
pub use service::{OrderQueryService, QueryOutcome};
pub use store::{InMemoryStore, OrderSession, OrderStore, PostgresOrderStore, StoreError};
pub use strategies::{FetchStrategy, StrategyKind, SummaryStrategy};
pub use views::{OrderItemView, OrderSummaryView, OrderView};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReadModelError {
    #[error("Invalid search criteria: {0}")]
    InvalidCriteria(String),

    #[error("Invalid pagination: {0}")]
    InvalidPagination(String),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),

    #[error("Pagination unsupported with row-duplicating collection fetch ({0})")]
    PaginationUnsupported(StrategyKind),

    #[error("Assembly invariant violated for order {order_id}: {detail}")]
    AssemblyInvariantViolation { order_id: i64, detail: String },
}
