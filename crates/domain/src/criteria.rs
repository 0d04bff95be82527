use serde::{Deserialize, Serialize};

use crate::errors::DomainError;
use crate::order::OrderStatus;

/// Optional-field search over orders. Absent fields do not filter; present
/// fields are combined with AND.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchCriteria {
    #[serde(default)]
    pub status: Option<OrderStatus>,

    /// Any length is accepted; a fragment longer than every stored name
    /// simply matches nothing
    #[serde(default)]
    pub customer_name: Option<String>,
}

impl SearchCriteria {
    /// Criteria that select every order
    pub fn all() -> Self {
        Self::default()
    }

    pub fn with_status(mut self, status: OrderStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_customer_name(mut self, name: impl Into<String>) -> Self {
        self.customer_name = Some(name.into());
        self
    }

    /// Customer name substring, or `None` when absent or blank
    pub fn name_pattern(&self) -> Option<&str> {
        self.customer_name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
    }

    /// Reject a name fragment that cannot be sent as SQL text
    pub fn check(&self) -> Result<(), DomainError> {
        match self.customer_name.as_deref() {
            Some(name) if name.contains('\0') => Err(DomainError::ValidationError(
                "customer name filter contains a NUL character".to_string(),
            )),
            _ => Ok(()),
        }
    }
}
