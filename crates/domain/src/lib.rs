pub mod criteria;
pub mod errors;
pub mod order;

pub use criteria::SearchCriteria;
pub use errors::DomainError;
pub use order::{Address, OrderStatus};
