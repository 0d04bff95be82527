use domain::{OrderStatus, SearchCriteria};
use sqlx::{Postgres, QueryBuilder};
use std::fmt;

use crate::pagination::Page;
use crate::ReadModelError;

/// One conjunct of an order predicate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Clause {
    StatusEq(OrderStatus),
    /// Substring match on the customer's name, case-sensitive like SQL `LIKE`
    CustomerNameContains(String),
}

/// Conjunction of clauses over an order joined to its customer. An empty
/// predicate matches every order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderPredicate {
    clauses: Vec<Clause>,
}

impl OrderPredicate {
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Evaluate in process against an order's status and customer name
    pub fn matches(&self, status: OrderStatus, customer_name: &str) -> bool {
        self.clauses.iter().all(|clause| match clause {
            Clause::StatusEq(expected) => status == *expected,
            Clause::CustomerNameContains(pattern) => customer_name.contains(pattern.as_str()),
        })
    }

    /// Append a `WHERE` clause for tables aliased `o` (orders) and `c`
    /// (customer). Appends nothing when empty.
    pub fn push_where(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        for (i, clause) in self.clauses.iter().enumerate() {
            qb.push(if i == 0 { " WHERE " } else { " AND " });
            match clause {
                Clause::StatusEq(status) => {
                    qb.push("o.status = ").push_bind(status.as_str());
                }
                Clause::CustomerNameContains(pattern) => {
                    qb.push("c.name LIKE ")
                        .push_bind(like_pattern(pattern))
                        .push(" ESCAPE '\\'");
                }
            }
        }
    }
}

impl fmt::Display for OrderPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.clauses.is_empty() {
            return f.write_str("<all>");
        }
        for (i, clause) in self.clauses.iter().enumerate() {
            if i > 0 {
                f.write_str(" AND ")?;
            }
            match clause {
                Clause::StatusEq(status) => write!(f, "status = {}", status)?,
                Clause::CustomerNameContains(pattern) => write!(f, "customer_name LIKE %{}%", pattern)?,
            }
        }
        Ok(())
    }
}

/// Wrap a substring in `%` wildcards, escaping characters `LIKE` treats
/// specially so the pattern matches literally
fn like_pattern(substring: &str) -> String {
    let mut pattern = String::with_capacity(substring.len() + 2);
    pattern.push('%');
    for ch in substring.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}

/// A predicate plus the result cap every listing carries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderFilter {
    predicate: OrderPredicate,
    max_results: i64,
}

impl OrderFilter {
    pub fn predicate(&self) -> &OrderPredicate {
        &self.predicate
    }

    pub fn max_results(&self) -> i64 {
        self.max_results
    }

    /// Offset and row limit for the root query, with the cap applied on top
    /// of any page
    pub fn window(&self, page: Option<&Page>) -> (i64, i64) {
        match page {
            Some(page) => (page.offset(), page.limit().min(self.max_results)),
            None => (0, self.max_results),
        }
    }

    /// Append `LIMIT .. OFFSET ..` for [`window`](Self::window)
    pub fn push_window(&self, qb: &mut QueryBuilder<'_, Postgres>, page: Option<&Page>) {
        let (offset, limit) = self.window(page);
        qb.push(" LIMIT ").push_bind(limit);
        if offset > 0 {
            qb.push(" OFFSET ").push_bind(offset);
        }
    }
}

/// Turns [`SearchCriteria`] into an [`OrderFilter`]
#[derive(Debug, Clone)]
pub struct CriteriaBuilder {
    max_results: i64,
}

impl CriteriaBuilder {
    pub const DEFAULT_MAX_RESULTS: i64 = 1000;

    pub fn new(max_results: i64) -> Self {
        Self {
            max_results: max_results.max(1),
        }
    }

    pub fn build(&self, criteria: &SearchCriteria) -> Result<OrderFilter, ReadModelError> {
        criteria
            .check()
            .map_err(|e| ReadModelError::InvalidCriteria(e.to_string()))?;

        let mut clauses = Vec::with_capacity(2);
        if let Some(status) = criteria.status {
            clauses.push(Clause::StatusEq(status));
        }
        if let Some(name) = criteria.name_pattern() {
            clauses.push(Clause::CustomerNameContains(name.to_string()));
        }

        Ok(OrderFilter {
            predicate: OrderPredicate { clauses },
            max_results: self.max_results,
        })
    }
}

impl Default for CriteriaBuilder {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_RESULTS)
    }
}
