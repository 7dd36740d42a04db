//! `erpbot-core`: shared building blocks for the background agent.
//!
//! This crate contains **pure** primitives (no I/O): identifiers, the bounded
//! history used for every rolling log, and the ERP records the agent creates or
//! inspects together with the arithmetic invariants they must satisfy.

pub mod error;
pub mod history;
pub mod id;
pub mod records;

pub use error::{CoreError, CoreResult};
pub use history::BoundedHistory;
pub use id::{
    AuditId, CustomerId, ErrorId, InvoiceId, MovementId, PaymentId, ProductId, SuggestionId,
    SupplierId, TaskId, WarehouseId,
};
