//! ERP records created or inspected by the agent.
//!
//! The business schema itself is owned by the ERP; these are the typed shapes
//! the agent reads and writes, plus the arithmetic each write must honor.

pub mod fix;
pub mod invoice;
pub mod party;
pub mod product;
pub mod stock;
pub mod suggestion;
pub mod task;

pub use fix::Fix;
pub use invoice::{
    discount_amount, Invoice, InvoiceKind, InvoiceLine, InvoiceParty, Payment, PaymentMethod,
    PaymentStatus, PendingInvoice,
};
pub use party::{Address, Customer, CustomerKind, Supplier};
pub use product::{allocate_quantity, Product};
pub use stock::{InventoryMovement, MovementKind, Warehouse};
pub use suggestion::{Suggestion, SuggestionStatus};
pub use task::{Priority, Task, TaskStatus};

/// Snake-case string mapping for the enumerated columns stored as text.
macro_rules! text_enum {
    ($t:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $t {
            pub const ALL: &'static [$t] = &[$($t::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($t::$variant => $text),+
                }
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl core::str::FromStr for $t {
            type Err = crate::error::CoreError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($t::$variant),)+
                    other => Err(crate::error::CoreError::unknown($kind, other)),
                }
            }
        }
    };
}

pub(crate) use text_enum;
