use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::ProductId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub code: String,
    pub name: String,
    pub description: String,
    pub cost_price: i64,
    pub selling_price: i64,
    pub quantity: i64,
    pub min_quantity: i64,
    pub unit: String,
    pub created_at: DateTime<Utc>,
}

/// Quantity a sale line may actually take from stock.
///
/// `min(requested, available)`, never negative, so a decrement by the result can
/// not drive stock below zero.
pub fn allocate_quantity(requested: i64, available: i64) -> i64 {
    requested.min(available).max(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocation_is_capped_by_stock() {
        assert_eq!(allocate_quantity(8, 5), 5);
        assert_eq!(5 - allocate_quantity(8, 5), 0);
        assert_eq!(allocate_quantity(2, 5), 2);
        assert_eq!(allocate_quantity(3, 0), 0);
        assert_eq!(allocate_quantity(3, -2), 0);
    }
}
