//! [`ErpStore`] over any [`QueryExecutor`].
//!
//! Expected tables (owned and migrated by the ERP itself):
//!
//! | table                 | columns used                                                                                   |
//! |-----------------------|------------------------------------------------------------------------------------------------|
//! | `customers`           | id, code, name, customer_type, phone, email, addresses (jsonb), credit_limit, created_at       |
//! | `suppliers`           | id, code, name, phone, email, created_at                                                       |
//! | `products`            | id, code, name, description, cost_price, selling_price, quantity, min_quantity, unit, created_at |
//! | `warehouses`          | id, code, name                                                                                 |
//! | `invoices`            | id, invoice_number, invoice_type, customer_id, supplier_id, subtotal, discount_percent, discount_amount, total, payment_status, created_at |
//! | `invoice_items`       | id, invoice_id, product_id, quantity, unit_price, total                                        |
//! | `payments`            | id, invoice_id, amount, payment_method, notes, payment_date                                    |
//! | `inventory_movements` | id, product_id, warehouse_id, movement_type, quantity, before_quantity, after_quantity, created_at |
//! | `tasks`               | id, title, description, priority, status, created_at                                           |

use std::str::FromStr;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value as JsonValue;
use tracing::instrument;
use uuid::Uuid;

use erpbot_core::records::{
    Address, Customer, CustomerKind, InventoryMovement, Invoice, InvoiceKind, InvoiceParty,
    Payment, PaymentStatus, PendingInvoice, Product, Supplier, Task, Warehouse,
};

use super::{check_settlement, ErpStore, PurchaseDraft, StoreError};
use crate::db::{column_i64, column_str, parse_timestamp, QueryExecutor, Row, SqlValue, Statement};

#[derive(Debug, Clone)]
pub struct SqlErpStore<E> {
    db: E,
}

impl<E> SqlErpStore<E> {
    pub fn new(db: E) -> Self {
        Self { db }
    }
}

fn text(row: &Row, column: &str) -> String {
    column_str(row, column).unwrap_or_default().to_string()
}

fn int(row: &Row, column: &str) -> i64 {
    column_i64(row, column).unwrap_or(0)
}

fn parse_col<T>(row: &Row, column: &'static str) -> Result<T, StoreError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = column_str(row, column).unwrap_or_default();
    raw.parse::<T>().map_err(|e| {
        StoreError::Db(crate::db::DbError::Decode(format!("column {column}: {e}")))
    })
}

fn created_at(row: &Row, column: &str) -> chrono::DateTime<Utc> {
    column_str(row, column)
        .and_then(parse_timestamp)
        .unwrap_or_else(Utc::now)
}

fn customer_from_row(row: &Row) -> Result<Customer, StoreError> {
    let addresses = row
        .get("addresses")
        .cloned()
        .and_then(|v| serde_json::from_value::<Vec<Address>>(v).ok())
        .unwrap_or_default();
    Ok(Customer {
        id: parse_col(row, "id")?,
        code: text(row, "code"),
        name: text(row, "name"),
        kind: column_str(row, "customer_type")
            .and_then(|s| s.parse().ok())
            .unwrap_or(CustomerKind::Retail),
        phone: text(row, "phone"),
        email: text(row, "email"),
        addresses,
        credit_limit: int(row, "credit_limit"),
        created_at: created_at(row, "created_at"),
    })
}

fn supplier_from_row(row: &Row) -> Result<Supplier, StoreError> {
    Ok(Supplier {
        id: parse_col(row, "id")?,
        code: text(row, "code"),
        name: text(row, "name"),
        phone: text(row, "phone"),
        email: text(row, "email"),
        created_at: created_at(row, "created_at"),
    })
}

fn product_from_row(row: &Row) -> Result<Product, StoreError> {
    Ok(Product {
        id: parse_col(row, "id")?,
        code: text(row, "code"),
        name: text(row, "name"),
        description: text(row, "description"),
        cost_price: int(row, "cost_price"),
        selling_price: int(row, "selling_price"),
        quantity: int(row, "quantity"),
        min_quantity: int(row, "min_quantity"),
        unit: text(row, "unit"),
        created_at: created_at(row, "created_at"),
    })
}

fn pending_from_row(row: &Row) -> Result<PendingInvoice, StoreError> {
    Ok(PendingInvoice {
        id: parse_col(row, "id")?,
        number: text(row, "invoice_number"),
        kind: parse_col::<InvoiceKind>(row, "invoice_type")?,
        total: int(row, "total"),
    })
}

const PRODUCT_COLUMNS: &str =
    "id::text AS id, code, name, description, cost_price, selling_price, quantity, min_quantity, unit, created_at";

/// Header + items for one invoice.
fn invoice_statements(invoice: &Invoice, status: PaymentStatus) -> Vec<Statement> {
    let (customer_id, supplier_id): (Option<Uuid>, Option<Uuid>) = match invoice.party {
        InvoiceParty::Customer(id) => (Some(id.as_uuid()), None),
        InvoiceParty::Supplier(id) => (None, Some(id.as_uuid())),
    };
    let mut statements = vec![
        Statement::new(
            "INSERT INTO invoices (id, invoice_number, invoice_type, customer_id, supplier_id, \
             subtotal, discount_percent, discount_amount, total, payment_status, created_at) \
             VALUES ($1, $2, $3, $4::uuid, $5::uuid, $6, $7, $8, $9, $10, $11)",
        )
        .bind(invoice.id.as_uuid())
        .bind(invoice.number.as_str())
        .bind(invoice.kind.as_str())
        .bind(customer_id)
        .bind(supplier_id)
        .bind(invoice.subtotal)
        .bind(invoice.discount_percent)
        .bind(invoice.discount_amount)
        .bind(invoice.total)
        .bind(status.as_str())
        .bind(invoice.created_at)
        .expect_rows(1),
    ];
    for line in &invoice.lines {
        statements.push(
            Statement::new(
                "INSERT INTO invoice_items (id, invoice_id, product_id, quantity, unit_price, total) \
                 VALUES ($1, $2, $3, $4, $5, $6)",
            )
            .bind(Uuid::now_v7())
            .bind(invoice.id.as_uuid())
            .bind(line.product_id.as_uuid())
            .bind(line.quantity)
            .bind(line.unit_price)
            .bind(line.total)
            .expect_rows(1),
        );
    }
    statements
}

fn payment_statement(payment: &Payment) -> Statement {
    Statement::new(
        "INSERT INTO payments (id, invoice_id, amount, payment_method, notes, payment_date) \
         VALUES ($1, $2, $3, $4, $5, $6)",
    )
    .bind(payment.id.as_uuid())
    .bind(payment.invoice_id.as_uuid())
    .bind(payment.amount)
    .bind(payment.method.as_str())
    .bind(payment.notes.as_str())
    .bind(payment.received_at)
    .expect_rows(1)
}

#[async_trait]
impl<E> ErpStore for SqlErpStore<E>
where
    E: QueryExecutor,
{
    async fn sample_customers(&self, limit: usize) -> Result<Vec<Customer>, StoreError> {
        let rows = self
            .db
            .all(
                "SELECT id::text AS id, code, name, customer_type, phone, email, addresses, \
                 credit_limit, created_at FROM customers ORDER BY RANDOM() LIMIT $1",
                &[SqlValue::Int(limit as i64)],
            )
            .await?;
        rows.iter().map(customer_from_row).collect()
    }

    async fn sample_suppliers(&self, limit: usize) -> Result<Vec<Supplier>, StoreError> {
        let rows = self
            .db
            .all(
                "SELECT id::text AS id, code, name, phone, email, created_at \
                 FROM suppliers ORDER BY RANDOM() LIMIT $1",
                &[SqlValue::Int(limit as i64)],
            )
            .await?;
        rows.iter().map(supplier_from_row).collect()
    }

    async fn sample_products(&self, limit: usize) -> Result<Vec<Product>, StoreError> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products ORDER BY RANDOM() LIMIT $1");
        let rows = self.db.all(&sql, &[SqlValue::Int(limit as i64)]).await?;
        rows.iter().map(product_from_row).collect()
    }

    async fn products_in_stock(&self, limit: usize) -> Result<Vec<Product>, StoreError> {
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE quantity > 0 ORDER BY RANDOM() LIMIT $1"
        );
        let rows = self.db.all(&sql, &[SqlValue::Int(limit as i64)]).await?;
        rows.iter().map(product_from_row).collect()
    }

    async fn product_by_name(&self, name: &str) -> Result<Option<Product>, StoreError> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE name = $1 LIMIT 1");
        match self.db.get(&sql, &[SqlValue::from(name)]).await? {
            Some(row) => product_from_row(&row).map(Some),
            None => Ok(None),
        }
    }

    async fn pending_invoices(&self, limit: usize) -> Result<Vec<PendingInvoice>, StoreError> {
        let rows = self
            .db
            .all(
                "SELECT id::text AS id, invoice_number, invoice_type, total FROM invoices \
                 WHERE payment_status = 'pending' ORDER BY RANDOM() LIMIT $1",
                &[SqlValue::Int(limit as i64)],
            )
            .await?;
        rows.iter().map(pending_from_row).collect()
    }

    async fn first_warehouse(&self) -> Result<Option<Warehouse>, StoreError> {
        let row = self
            .db
            .get("SELECT id::text AS id, code, name FROM warehouses ORDER BY code LIMIT 1", &[])
            .await?;
        match row {
            Some(row) => Ok(Some(Warehouse {
                id: parse_col(&row, "id")?,
                code: text(&row, "code"),
                name: text(&row, "name"),
            })),
            None => Ok(None),
        }
    }

    #[instrument(skip(self, customer), fields(code = %customer.code), err)]
    async fn insert_customer(&self, customer: &Customer) -> Result<(), StoreError> {
        let addresses = serde_json::to_value(&customer.addresses).unwrap_or(JsonValue::Array(vec![]));
        self.db
            .run(
                "INSERT INTO customers (id, code, name, customer_type, phone, email, addresses, \
                 credit_limit, created_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
                &[
                    customer.id.as_uuid().into(),
                    customer.code.as_str().into(),
                    customer.name.as_str().into(),
                    customer.kind.as_str().into(),
                    customer.phone.as_str().into(),
                    customer.email.as_str().into(),
                    addresses.into(),
                    customer.credit_limit.into(),
                    customer.created_at.into(),
                ],
            )
            .await?;
        Ok(())
    }

    #[instrument(skip(self, supplier), fields(code = %supplier.code), err)]
    async fn insert_supplier(&self, supplier: &Supplier) -> Result<(), StoreError> {
        self.db
            .run(
                "INSERT INTO suppliers (id, code, name, phone, email, created_at) \
                 VALUES ($1, $2, $3, $4, $5, $6)",
                &[
                    supplier.id.as_uuid().into(),
                    supplier.code.as_str().into(),
                    supplier.name.as_str().into(),
                    supplier.phone.as_str().into(),
                    supplier.email.as_str().into(),
                    supplier.created_at.into(),
                ],
            )
            .await?;
        Ok(())
    }

    #[instrument(skip(self, product), fields(code = %product.code), err)]
    async fn insert_product(&self, product: &Product) -> Result<(), StoreError> {
        let stmt = product_insert(product);
        self.db.run(&stmt.sql, &stmt.args).await?;
        Ok(())
    }

    async fn insert_warehouse(&self, warehouse: &Warehouse) -> Result<(), StoreError> {
        self.db
            .run(
                "INSERT INTO warehouses (id, code, name) VALUES ($1, $2, $3)",
                &[
                    warehouse.id.as_uuid().into(),
                    warehouse.code.as_str().into(),
                    warehouse.name.as_str().into(),
                ],
            )
            .await?;
        Ok(())
    }

    async fn insert_task(&self, task: &Task) -> Result<(), StoreError> {
        self.db
            .run(
                "INSERT INTO tasks (id, title, description, priority, status, created_at) \
                 VALUES ($1, $2, $3, $4, $5, $6)",
                &[
                    task.id.as_uuid().into(),
                    task.title.as_str().into(),
                    task.description.as_str().into(),
                    task.priority.as_str().into(),
                    task.status.as_str().into(),
                    task.created_at.into(),
                ],
            )
            .await?;
        Ok(())
    }

    #[instrument(skip(self, invoice, payment), fields(number = %invoice.number, total = invoice.total), err)]
    async fn commit_sale(&self, invoice: &Invoice, payment: Option<&Payment>) -> Result<(), StoreError> {
        invoice.verify()?;
        if let Some(p) = payment {
            check_settlement(invoice.total, p)?;
        }

        let status = if payment.is_some() {
            PaymentStatus::Paid
        } else {
            PaymentStatus::Pending
        };
        let mut statements = Vec::with_capacity(invoice.lines.len() * 2 + 2);
        // Guards first: nothing else is written if any product is short.
        for line in &invoice.lines {
            statements.push(
                Statement::new(
                    "UPDATE products SET quantity = quantity - $1 WHERE id = $2 AND quantity >= $1",
                )
                .bind(line.quantity)
                .bind(line.product_id.as_uuid())
                .expect_rows(1),
            );
        }
        statements.extend(invoice_statements(invoice, status));
        if let Some(p) = payment {
            statements.push(payment_statement(p));
        }
        self.db.transaction(statements).await?;
        Ok(())
    }

    #[instrument(skip(self, draft), fields(number = %draft.invoice.number), err)]
    async fn commit_purchase(&self, draft: &PurchaseDraft) -> Result<(), StoreError> {
        let invoice = &draft.invoice;
        invoice.verify()?;

        let mut statements = Vec::new();
        if let Some(product) = &draft.new_product {
            statements.push(product_insert(product).expect_rows(1));
        }
        for line in &invoice.lines {
            statements.push(
                Statement::new("UPDATE products SET quantity = quantity + $1 WHERE id = $2")
                    .bind(line.quantity)
                    .bind(line.product_id.as_uuid())
                    .expect_rows(1),
            );
        }
        statements.extend(invoice_statements(invoice, PaymentStatus::Pending));
        self.db.transaction(statements).await?;
        Ok(())
    }

    #[instrument(skip(self, payment), fields(invoice_id = %payment.invoice_id, amount = payment.amount), err)]
    async fn settle_invoice(&self, payment: &Payment) -> Result<(), StoreError> {
        let statements = vec![
            Statement::new(
                "UPDATE invoices SET payment_status = 'paid' \
                 WHERE id = $1 AND payment_status = 'pending' AND total = $2",
            )
            .bind(payment.invoice_id.as_uuid())
            .bind(payment.amount)
            .expect_rows(1),
            payment_statement(payment),
        ];
        self.db.transaction(statements).await?;
        Ok(())
    }

    #[instrument(skip(self, movement), fields(product_id = %movement.product_id, delta = movement.delta), err)]
    async fn adjust_stock(&self, movement: &InventoryMovement) -> Result<(), StoreError> {
        if movement.after != movement.before + movement.delta || movement.after < 0 {
            return Err(StoreError::Invalid(erpbot_core::CoreError::invariant(
                "movement after != before + delta",
            )));
        }
        let statements = vec![
            Statement::new("UPDATE products SET quantity = $1 WHERE id = $2 AND quantity = $3")
                .bind(movement.after)
                .bind(movement.product_id.as_uuid())
                .bind(movement.before)
                .expect_rows(1),
            Statement::new(
                "INSERT INTO inventory_movements (id, product_id, warehouse_id, movement_type, \
                 quantity, before_quantity, after_quantity, created_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
            )
            .bind(movement.id.as_uuid())
            .bind(movement.product_id.as_uuid())
            .bind(movement.warehouse_id.as_uuid())
            .bind(movement.kind.as_str())
            .bind(movement.quantity())
            .bind(movement.before)
            .bind(movement.after)
            .bind(movement.created_at)
            .expect_rows(1),
        ];
        self.db.transaction(statements).await?;
        Ok(())
    }
}

fn product_insert(product: &Product) -> Statement {
    Statement::new(
        "INSERT INTO products (id, code, name, description, cost_price, selling_price, quantity, \
         min_quantity, unit, created_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
    )
    .bind(product.id.as_uuid())
    .bind(product.code.as_str())
    .bind(product.name.as_str())
    .bind(product.description.as_str())
    .bind(product.cost_price)
    .bind(product.selling_price)
    .bind(product.quantity)
    .bind(product.min_quantity)
    .bind(product.unit.as_str())
    .bind(product.created_at)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{ScriptedQueryExecutor, ScriptedResponse};
    use erpbot_core::records::{InvoiceLine, PaymentMethod};
    use erpbot_core::{CustomerId, InvoiceId, ProductId};
    use serde_json::json;
    use std::sync::Arc;

    fn sale_invoice() -> Invoice {
        Invoice::sale(
            InvoiceId::new(),
            "INV-202401-000001",
            CustomerId::new(),
            vec![InvoiceLine::new(ProductId::new(), 2, 25_000).unwrap()],
            0,
            Utc::now(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn sale_puts_stock_guards_before_inserts() {
        let db = Arc::new(ScriptedQueryExecutor::new());
        db.on("", ScriptedResponse::Affected(1));
        let store = SqlErpStore::new(db.clone());

        let invoice = sale_invoice();
        let payment = Payment::settle(&invoice.pending(), PaymentMethod::Cash, Utc::now());
        store.commit_sale(&invoice, Some(&payment)).await.unwrap();

        let calls = db.calls();
        assert!(calls[0].0.contains("quantity >= $1"));
        assert!(calls[1].0.starts_with("INSERT INTO invoices"));
        assert_eq!(calls[1].1[9], SqlValue::from("paid"));
        assert!(calls.last().unwrap().0.starts_with("INSERT INTO payments"));
    }

    #[tokio::test]
    async fn short_stock_becomes_conflict() {
        let db = Arc::new(ScriptedQueryExecutor::new());
        db.on("", ScriptedResponse::Affected(1));
        db.on("UPDATE products", ScriptedResponse::Affected(0));
        let store = SqlErpStore::new(db.clone());

        let err = store.commit_sale(&sale_invoice(), None).await.unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(db.count("INSERT INTO invoices"), 0);
    }

    #[tokio::test]
    async fn decodes_products_from_json_rows() {
        let db = Arc::new(ScriptedQueryExecutor::new());
        let id = ProductId::new();
        db.rows(
            "FROM products",
            vec![json!({
                "id": id.to_string(),
                "code": "PRD-000001",
                "name": "Wireless mouse",
                "description": "",
                "cost_price": "15000.00",
                "selling_price": 25000,
                "quantity": 7,
                "min_quantity": 2,
                "unit": "piece",
                "created_at": "2024-01-15T10:00:00+00:00"
            })
            .as_object()
            .cloned()
            .unwrap()],
        );
        let store = SqlErpStore::new(db);
        let products = store.products_in_stock(3).await.unwrap();
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].id, id);
        assert_eq!(products[0].cost_price, 15_000);
        assert_eq!(products[0].quantity, 7);
    }
}
