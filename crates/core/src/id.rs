//! Strongly-typed identifiers.

use core::str::FromStr;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;

macro_rules! uuid_newtype {
    ($(#[$meta:meta])* $t:ident, $name:literal) => {
        $(#[$meta])*
        #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $t(Uuid);

        impl $t {
            /// Create a new identifier.
            ///
            /// Uses UUIDv7 (time-ordered). Prefer passing IDs explicitly in tests
            /// for determinism.
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $t {
            fn default() -> Self {
                Self::new()
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                core::fmt::Display::fmt(&self.0, f)
            }
        }

        impl From<Uuid> for $t {
            fn from(value: Uuid) -> Self {
                Self(value)
            }
        }

        impl From<$t> for Uuid {
            fn from(value: $t) -> Self {
                value.0
            }
        }

        impl FromStr for $t {
            type Err = CoreError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let uuid = Uuid::from_str(s)
                    .map_err(|e| CoreError::invalid_id(format!("{}: {}", $name, e)))?;
                Ok(Self(uuid))
            }
        }
    };
}

uuid_newtype!(
    /// Identifier of an entry in the orchestrator's error history.
    ErrorId,
    "ErrorId"
);
uuid_newtype!(
    /// Identifier of a UX/analysis suggestion.
    SuggestionId,
    "SuggestionId"
);
uuid_newtype!(
    /// Identifier of a `bot_logs` audit row.
    AuditId,
    "AuditId"
);
uuid_newtype!(CustomerId, "CustomerId");
uuid_newtype!(SupplierId, "SupplierId");
uuid_newtype!(ProductId, "ProductId");
uuid_newtype!(InvoiceId, "InvoiceId");
uuid_newtype!(PaymentId, "PaymentId");
uuid_newtype!(WarehouseId, "WarehouseId");
uuid_newtype!(MovementId, "MovementId");
uuid_newtype!(TaskId, "TaskId");
