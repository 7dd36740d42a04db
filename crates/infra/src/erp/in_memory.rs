//! In-memory ERP store (for tests/dev).
//!
//! Each atomic unit runs under one lock and validates every guard before
//! mutating anything, so a failed unit leaves the state untouched.

use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use erpbot_core::records::{
    Customer, InventoryMovement, Invoice, InvoiceKind, Payment, PaymentStatus, PendingInvoice,
    Product, Supplier, Task, Warehouse,
};

use super::{check_settlement, ErpStore, PurchaseDraft, StoreError};

#[derive(Debug, Default, Clone)]
struct ErpState {
    customers: Vec<Customer>,
    suppliers: Vec<Supplier>,
    products: Vec<Product>,
    invoices: Vec<Invoice>,
    payments: Vec<Payment>,
    warehouses: Vec<Warehouse>,
    movements: Vec<InventoryMovement>,
    tasks: Vec<Task>,
}

impl ErpState {
    fn product_mut(&mut self, id: erpbot_core::ProductId) -> Result<&mut Product, StoreError> {
        self.products
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| StoreError::not_found("product", id))
    }
}

#[derive(Debug, Default)]
pub struct InMemoryErpStore {
    state: Mutex<ErpState>,
}

impl InMemoryErpStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ErpState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn customers(&self) -> Vec<Customer> {
        self.lock().customers.clone()
    }

    pub fn suppliers(&self) -> Vec<Supplier> {
        self.lock().suppliers.clone()
    }

    pub fn products(&self) -> Vec<Product> {
        self.lock().products.clone()
    }

    pub fn invoices(&self) -> Vec<Invoice> {
        self.lock().invoices.clone()
    }

    pub fn payments(&self) -> Vec<Payment> {
        self.lock().payments.clone()
    }

    pub fn warehouses(&self) -> Vec<Warehouse> {
        self.lock().warehouses.clone()
    }

    pub fn movements(&self) -> Vec<InventoryMovement> {
        self.lock().movements.clone()
    }

    pub fn tasks(&self) -> Vec<Task> {
        self.lock().tasks.clone()
    }
}

#[async_trait]
impl ErpStore for InMemoryErpStore {
    async fn sample_customers(&self, limit: usize) -> Result<Vec<Customer>, StoreError> {
        Ok(self.lock().customers.iter().take(limit).cloned().collect())
    }

    async fn sample_suppliers(&self, limit: usize) -> Result<Vec<Supplier>, StoreError> {
        Ok(self.lock().suppliers.iter().take(limit).cloned().collect())
    }

    async fn sample_products(&self, limit: usize) -> Result<Vec<Product>, StoreError> {
        Ok(self.lock().products.iter().take(limit).cloned().collect())
    }

    async fn products_in_stock(&self, limit: usize) -> Result<Vec<Product>, StoreError> {
        Ok(self
            .lock()
            .products
            .iter()
            .filter(|p| p.quantity > 0)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn product_by_name(&self, name: &str) -> Result<Option<Product>, StoreError> {
        Ok(self.lock().products.iter().find(|p| p.name == name).cloned())
    }

    async fn pending_invoices(&self, limit: usize) -> Result<Vec<PendingInvoice>, StoreError> {
        Ok(self
            .lock()
            .invoices
            .iter()
            .filter(|i| i.payment_status == PaymentStatus::Pending)
            .take(limit)
            .map(Invoice::pending)
            .collect())
    }

    async fn first_warehouse(&self) -> Result<Option<Warehouse>, StoreError> {
        Ok(self.lock().warehouses.first().cloned())
    }

    async fn insert_customer(&self, customer: &Customer) -> Result<(), StoreError> {
        let mut state = self.lock();
        if state.customers.iter().any(|c| c.code == customer.code) {
            return Err(StoreError::Conflict(format!("customer code {} exists", customer.code)));
        }
        state.customers.push(customer.clone());
        Ok(())
    }

    async fn insert_supplier(&self, supplier: &Supplier) -> Result<(), StoreError> {
        let mut state = self.lock();
        if state.suppliers.iter().any(|s| s.code == supplier.code) {
            return Err(StoreError::Conflict(format!("supplier code {} exists", supplier.code)));
        }
        state.suppliers.push(supplier.clone());
        Ok(())
    }

    async fn insert_product(&self, product: &Product) -> Result<(), StoreError> {
        let mut state = self.lock();
        if state.products.iter().any(|p| p.code == product.code) {
            return Err(StoreError::Conflict(format!("product code {} exists", product.code)));
        }
        state.products.push(product.clone());
        Ok(())
    }

    async fn insert_warehouse(&self, warehouse: &Warehouse) -> Result<(), StoreError> {
        self.lock().warehouses.push(warehouse.clone());
        Ok(())
    }

    async fn insert_task(&self, task: &Task) -> Result<(), StoreError> {
        self.lock().tasks.push(task.clone());
        Ok(())
    }

    async fn commit_sale(&self, invoice: &Invoice, payment: Option<&Payment>) -> Result<(), StoreError> {
        invoice.verify()?;
        if invoice.kind != InvoiceKind::Sale {
            return Err(StoreError::Conflict(format!("{} is not a sale invoice", invoice.number)));
        }
        if let Some(p) = payment {
            check_settlement(invoice.total, p)?;
        }

        let mut state = self.lock();
        if state.invoices.iter().any(|i| i.number == invoice.number) {
            return Err(StoreError::Conflict(format!("invoice {} exists", invoice.number)));
        }
        // Validate every guard first; lines may repeat a product.
        for line in &invoice.lines {
            let wanted: i64 = invoice
                .lines
                .iter()
                .filter(|l| l.product_id == line.product_id)
                .map(|l| l.quantity)
                .sum();
            let product = state.product_mut(line.product_id)?;
            if product.quantity < wanted {
                return Err(StoreError::Conflict(format!(
                    "product {} has {} in stock, sale needs {}",
                    product.code, product.quantity, wanted
                )));
            }
        }
        for line in &invoice.lines {
            state.product_mut(line.product_id)?.quantity -= line.quantity;
        }

        let mut stored = invoice.clone();
        if let Some(p) = payment {
            stored.payment_status = PaymentStatus::Paid;
            let mut p = p.clone();
            p.invoice_id = stored.id;
            state.payments.push(p);
        }
        state.invoices.push(stored);
        Ok(())
    }

    async fn commit_purchase(&self, draft: &PurchaseDraft) -> Result<(), StoreError> {
        let invoice = &draft.invoice;
        invoice.verify()?;
        if invoice.kind != InvoiceKind::Purchase {
            return Err(StoreError::Conflict(format!(
                "{} is not a purchase invoice",
                invoice.number
            )));
        }

        let mut state = self.lock();
        if state.invoices.iter().any(|i| i.number == invoice.number) {
            return Err(StoreError::Conflict(format!("invoice {} exists", invoice.number)));
        }
        let mut staged = state.clone();
        if let Some(product) = &draft.new_product {
            if staged.products.iter().any(|p| p.code == product.code) {
                return Err(StoreError::Conflict(format!("product code {} exists", product.code)));
            }
            staged.products.push(product.clone());
        }
        for line in &invoice.lines {
            staged.product_mut(line.product_id)?.quantity += line.quantity;
        }
        staged.invoices.push(invoice.clone());
        *state = staged;
        Ok(())
    }

    async fn settle_invoice(&self, payment: &Payment) -> Result<(), StoreError> {
        let mut state = self.lock();
        let invoice = state
            .invoices
            .iter_mut()
            .find(|i| i.id == payment.invoice_id)
            .ok_or_else(|| StoreError::not_found("invoice", payment.invoice_id))?;
        if invoice.payment_status != PaymentStatus::Pending {
            return Err(StoreError::Conflict(format!("invoice {} already settled", invoice.number)));
        }
        check_settlement(invoice.total, payment)?;
        invoice.payment_status = PaymentStatus::Paid;
        state.payments.push(payment.clone());
        Ok(())
    }

    async fn adjust_stock(&self, movement: &InventoryMovement) -> Result<(), StoreError> {
        if movement.after != movement.before + movement.delta || movement.after < 0 {
            return Err(StoreError::Invalid(erpbot_core::CoreError::invariant(
                "movement after != before + delta",
            )));
        }
        let mut state = self.lock();
        if !state.warehouses.iter().any(|w| w.id == movement.warehouse_id) {
            return Err(StoreError::not_found("warehouse", movement.warehouse_id));
        }
        let product = state.product_mut(movement.product_id)?;
        if product.quantity != movement.before {
            return Err(StoreError::Conflict(format!(
                "product {} moved from {} to {} meanwhile",
                product.code, movement.before, product.quantity
            )));
        }
        product.quantity = movement.after;
        state.movements.push(movement.clone());
        Ok(())
    }
}
