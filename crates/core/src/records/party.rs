use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::text_enum;
use crate::id::{CustomerId, SupplierId};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CustomerKind {
    Retail,
    Wholesale,
}

text_enum!(CustomerKind, "customer kind", {
    Retail => "retail",
    Wholesale => "wholesale",
});

impl CustomerKind {
    /// Credit ceiling granted to newly registered customers of this kind.
    pub fn default_credit_limit(&self) -> i64 {
        match self {
            CustomerKind::Retail => 1_000_000,
            CustomerKind::Wholesale => 5_000_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub city: String,
    pub area: String,
    pub line: String,
}

impl Address {
    pub fn new(city: impl Into<String>, area: impl Into<String>) -> Self {
        let city = city.into();
        let area = area.into();
        let line = format!("{area}, {city}");
        Self { city, area, line }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub code: String,
    pub name: String,
    pub kind: CustomerKind,
    pub phone: String,
    pub email: String,
    pub addresses: Vec<Address>,
    pub credit_limit: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Supplier {
    pub id: SupplierId,
    pub code: String,
    pub name: String,
    pub phone: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}
