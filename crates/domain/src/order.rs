use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::DomainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Placed,
    Canceled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Placed => "PLACED",
            OrderStatus::Canceled => "CANCELED",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "PLACED" => Ok(OrderStatus::Placed),
            "CANCELED" => Ok(OrderStatus::Canceled),
            _ => Err(DomainError::UnknownStatus(s.to_string())),
        }
    }
}

/// Status columns are stored as text; row decoding goes through this impl.
impl TryFrom<String> for OrderStatus {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Delivery address value object. Fields are fixed at construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Address {
    city: String,
    street: String,
    zipcode: String,
}

impl Address {
    pub fn new(
        city: impl Into<String>,
        street: impl Into<String>,
        zipcode: impl Into<String>,
    ) -> Self {
        Self {
            city: city.into(),
            street: street.into(),
            zipcode: zipcode.into(),
        }
    }

    pub fn city(&self) -> &str {
        &self.city
    }

    pub fn street(&self) -> &str {
        &self.street
    }

    pub fn zipcode(&self) -> &str {
        &self.zipcode
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trips_through_text() {
        for status in [OrderStatus::Placed, OrderStatus::Canceled] {
            let parsed: OrderStatus = status.as_str().parse().unwrap();
            assert_eq!(parsed, status);
        }
    }

    #[test]
    fn test_status_parsing_is_case_insensitive() {
        assert_eq!("placed".parse::<OrderStatus>().unwrap(), OrderStatus::Placed);
        assert_eq!(
            OrderStatus::try_from(" Canceled ".to_string()).unwrap(),
            OrderStatus::Canceled
        );
    }

    #[test]
    fn test_unknown_status_is_rejected() {
        let err = "SHIPPED".parse::<OrderStatus>().unwrap_err();
        assert!(matches!(err, DomainError::UnknownStatus(s) if s == "SHIPPED"));
    }

    #[test]
    fn test_status_serializes_as_screaming_case() {
        let json = serde_json::to_string(&OrderStatus::Canceled).unwrap();
        assert_eq!(json, "\"CANCELED\"");
    }

    #[test]
    fn test_address_equality_is_by_value() {
        let a = Address::new("Seoul", "Teheran-ro 1", "06236");
        let b = Address::new("Seoul".to_string(), "Teheran-ro 1", "06236");
        assert_eq!(a, b);
        assert_eq!(a.city(), "Seoul");
        assert_eq!(a.zipcode(), "06236");
    }
}
