//! Typed access to the ERP business tables used by the activity generator.
//!
//! Reads return small samples; the caller picks among them with its own RNG so
//! runs are reproducible with a seeded generator. Each `commit_*`/`settle_*`/
//! `adjust_*` operation is one atomic unit: it applies completely or leaves no
//! rows behind.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use erpbot_core::CoreError;
use erpbot_core::records::{
    Customer, InventoryMovement, Invoice, Payment, PendingInvoice, Product, Supplier, Task,
    Warehouse,
};

mod in_memory;
mod sql;

pub use in_memory::InMemoryErpStore;
pub use sql::SqlErpStore;

use crate::db::DbError;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A guard failed (stock moved, invoice already settled); nothing was written.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error(transparent)]
    Invalid(#[from] CoreError),

    #[error(transparent)]
    Db(DbError),
}

impl From<DbError> for StoreError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Conflict(msg) => StoreError::Conflict(msg),
            other => StoreError::Db(other),
        }
    }
}

impl StoreError {
    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict(_))
    }
}

/// A purchase and, when the product is new, the product to create first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseDraft {
    pub invoice: Invoice,
    /// Inserted with the quantity it carries before the purchase is received.
    pub new_product: Option<Product>,
}

#[async_trait]
pub trait ErpStore: Send + Sync {
    async fn sample_customers(&self, limit: usize) -> Result<Vec<Customer>, StoreError>;

    async fn sample_suppliers(&self, limit: usize) -> Result<Vec<Supplier>, StoreError>;

    async fn sample_products(&self, limit: usize) -> Result<Vec<Product>, StoreError>;

    /// Products with `quantity > 0`.
    async fn products_in_stock(&self, limit: usize) -> Result<Vec<Product>, StoreError>;

    /// Exact-name lookup.
    async fn product_by_name(&self, name: &str) -> Result<Option<Product>, StoreError>;

    /// Invoices whose `payment_status` is still pending.
    async fn pending_invoices(&self, limit: usize) -> Result<Vec<PendingInvoice>, StoreError>;

    async fn first_warehouse(&self) -> Result<Option<Warehouse>, StoreError>;

    async fn insert_customer(&self, customer: &Customer) -> Result<(), StoreError>;

    async fn insert_supplier(&self, supplier: &Supplier) -> Result<(), StoreError>;

    async fn insert_product(&self, product: &Product) -> Result<(), StoreError>;

    async fn insert_warehouse(&self, warehouse: &Warehouse) -> Result<(), StoreError>;

    async fn insert_task(&self, task: &Task) -> Result<(), StoreError>;

    /// Sale invoice + items + per-line stock decrement (+ optional settlement).
    ///
    /// Every decrement is guarded by `quantity >= line.quantity`; if any guard
    /// fails the whole unit rolls back with [`StoreError::Conflict`]. A payment,
    /// when given, must equal the invoice total and marks the invoice paid.
    async fn commit_sale(&self, invoice: &Invoice, payment: Option<&Payment>) -> Result<(), StoreError>;

    /// Purchase invoice + item + stock increment (creating the product if new).
    async fn commit_purchase(&self, draft: &PurchaseDraft) -> Result<(), StoreError>;

    /// Record a full payment and flip the invoice to paid, guarded by
    /// `payment_status = 'pending' AND total = amount`.
    async fn settle_invoice(&self, payment: &Payment) -> Result<(), StoreError>;

    /// Apply a movement, guarded by the product still holding `movement.before`.
    async fn adjust_stock(&self, movement: &InventoryMovement) -> Result<(), StoreError>;
}

#[async_trait]
impl<S> ErpStore for Arc<S>
where
    S: ErpStore + ?Sized,
{
    async fn sample_customers(&self, limit: usize) -> Result<Vec<Customer>, StoreError> {
        (**self).sample_customers(limit).await
    }

    async fn sample_suppliers(&self, limit: usize) -> Result<Vec<Supplier>, StoreError> {
        (**self).sample_suppliers(limit).await
    }

    async fn sample_products(&self, limit: usize) -> Result<Vec<Product>, StoreError> {
        (**self).sample_products(limit).await
    }

    async fn products_in_stock(&self, limit: usize) -> Result<Vec<Product>, StoreError> {
        (**self).products_in_stock(limit).await
    }

    async fn product_by_name(&self, name: &str) -> Result<Option<Product>, StoreError> {
        (**self).product_by_name(name).await
    }

    async fn pending_invoices(&self, limit: usize) -> Result<Vec<PendingInvoice>, StoreError> {
        (**self).pending_invoices(limit).await
    }

    async fn first_warehouse(&self) -> Result<Option<Warehouse>, StoreError> {
        (**self).first_warehouse().await
    }

    async fn insert_customer(&self, customer: &Customer) -> Result<(), StoreError> {
        (**self).insert_customer(customer).await
    }

    async fn insert_supplier(&self, supplier: &Supplier) -> Result<(), StoreError> {
        (**self).insert_supplier(supplier).await
    }

    async fn insert_product(&self, product: &Product) -> Result<(), StoreError> {
        (**self).insert_product(product).await
    }

    async fn insert_warehouse(&self, warehouse: &Warehouse) -> Result<(), StoreError> {
        (**self).insert_warehouse(warehouse).await
    }

    async fn insert_task(&self, task: &Task) -> Result<(), StoreError> {
        (**self).insert_task(task).await
    }

    async fn commit_sale(&self, invoice: &Invoice, payment: Option<&Payment>) -> Result<(), StoreError> {
        (**self).commit_sale(invoice, payment).await
    }

    async fn commit_purchase(&self, draft: &PurchaseDraft) -> Result<(), StoreError> {
        (**self).commit_purchase(draft).await
    }

    async fn settle_invoice(&self, payment: &Payment) -> Result<(), StoreError> {
        (**self).settle_invoice(payment).await
    }

    async fn adjust_stock(&self, movement: &InventoryMovement) -> Result<(), StoreError> {
        (**self).adjust_stock(movement).await
    }
}

/// Shared pre-commit checks for both store implementations.
pub(crate) fn check_settlement(invoice_total: i64, payment: &Payment) -> Result<(), StoreError> {
    if payment.amount != invoice_total {
        return Err(StoreError::Invalid(CoreError::invariant(format!(
            "payment amount {} != invoice total {}",
            payment.amount, invoice_total
        ))));
    }
    Ok(())
}
