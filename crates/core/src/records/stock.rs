use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::text_enum;
use crate::id::{MovementId, ProductId, WarehouseId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warehouse {
    pub id: WarehouseId,
    pub code: String,
    pub name: String,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementKind {
    AdjustmentIn,
    AdjustmentOut,
}

text_enum!(MovementKind, "movement kind", {
    AdjustmentIn => "adjustment_in",
    AdjustmentOut => "adjustment_out",
});

/// Signed stock adjustment with its before/after snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryMovement {
    pub id: MovementId,
    pub product_id: ProductId,
    pub warehouse_id: WarehouseId,
    pub kind: MovementKind,
    pub delta: i64,
    pub before: i64,
    pub after: i64,
    pub created_at: DateTime<Utc>,
}

impl InventoryMovement {
    /// `None` when the delta is zero or would take stock below zero.
    pub fn adjustment(
        product_id: ProductId,
        warehouse_id: WarehouseId,
        before: i64,
        delta: i64,
        created_at: DateTime<Utc>,
    ) -> Option<Self> {
        if delta == 0 {
            return None;
        }
        let after = before.checked_add(delta)?;
        if after < 0 {
            return None;
        }
        let kind = if delta > 0 {
            MovementKind::AdjustmentIn
        } else {
            MovementKind::AdjustmentOut
        };
        Some(Self {
            id: MovementId::new(),
            product_id,
            warehouse_id,
            kind,
            delta,
            before,
            after,
            created_at,
        })
    }

    /// Absolute quantity moved.
    pub fn quantity(&self) -> i64 {
        self.delta.abs()
    }
}
