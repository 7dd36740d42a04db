//! The synthetic activity generator.
//!
//! Every tick draws actions from a weighted mix and runs each against the typed
//! [`ErpStore`]. An action whose precondition is missing (no customer, no
//! stock, no supplier, no warehouse) creates the missing record and stops
//! there; the next tick can then succeed. Multi-row writes go through the
//! store's atomic units, so an action either lands completely or not at all.

use std::ops::RangeInclusive;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Datelike, Utc};
use rand::distributions::uniform::SampleUniform;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use erpbot_core::records::{
    allocate_quantity, Address, Customer, CustomerKind, InventoryMovement, Invoice, InvoiceLine,
    Payment, PaymentMethod, Priority, Product, Supplier, Task, TaskStatus, Warehouse,
};
use erpbot_core::{CustomerId, InvoiceId, ProductId, SupplierId, TaskId, WarehouseId};
use erpbot_infra::erp::{ErpStore, PurchaseDraft, StoreError};

use crate::catalog::{self, ProductTemplate};
use crate::weighted::choose_weighted;

const CODE_SPACE: u64 = 1_000_000;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Sale,
    Customer,
    Product,
    Payment,
    Purchase,
    Task,
    Inventory,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Sale => "sale",
            ActionKind::Customer => "customer",
            ActionKind::Product => "product",
            ActionKind::Payment => "payment",
            ActionKind::Purchase => "purchase",
            ActionKind::Task => "task",
            ActionKind::Inventory => "inventory",
        }
    }
}

/// A record created because an action found it missing.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Prerequisite {
    Customer,
    Product,
    Supplier,
    Warehouse,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeneratorConfig {
    /// Relative weight of each action; a zero weight disables it.
    pub weights: Vec<(ActionKind, u32)>,
    pub actions_per_tick: usize,
    pub discount_probability: f64,
    pub discount_percent: u32,
    /// Chance a sale is paid in full on the spot.
    pub payment_probability: f64,
    /// Relative price jitter applied to catalog templates (0.1 = ±10%).
    pub price_variation: f64,
    pub sale_lines: RangeInclusive<usize>,
    pub sale_quantity: RangeInclusive<i64>,
    pub purchase_quantity: RangeInclusive<i64>,
    pub new_product_quantity: RangeInclusive<i64>,
    pub adjustment: RangeInclusive<i64>,
    /// Rows fetched when picking a random customer, product or invoice.
    pub sample_size: usize,
    pub seed: Option<u64>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            weights: vec![
                (ActionKind::Sale, 30),
                (ActionKind::Customer, 15),
                (ActionKind::Product, 10),
                (ActionKind::Payment, 15),
                (ActionKind::Purchase, 10),
                (ActionKind::Task, 10),
                (ActionKind::Inventory, 10),
            ],
            actions_per_tick: 1,
            discount_probability: 0.3,
            discount_percent: 5,
            payment_probability: 0.6,
            price_variation: 0.1,
            sale_lines: 1..=3,
            sale_quantity: 1..=5,
            purchase_quantity: 10..=29,
            new_product_quantity: 10..=59,
            adjustment: -3..=6,
            sample_size: 20,
            seed: None,
        }
    }
}

impl GeneratorConfig {
    /// Only `kind`, every tick.
    pub fn only(kind: ActionKind) -> Self {
        Self {
            weights: vec![(kind, 1)],
            ..Self::default()
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ActionOutcome {
    CustomerCreated { code: String, name: String },
    ProductCreated { code: String, name: String, quantity: i64 },
    TaskCreated { title: String, priority: Priority },
    SaleInvoiced { number: String, total: i64, paid: bool },
    PurchaseInvoiced { number: String, total: i64, new_product: bool },
    PaymentRecorded { number: String, amount: i64 },
    StockAdjusted { product: String, before: i64, after: i64 },
    PrerequisiteCreated { action: ActionKind, created: Prerequisite },
    /// Nothing to do, or a guard rejected the write; no rows changed.
    Skipped { action: ActionKind, reason: String },
    Failed { action: ActionKind, error: String },
}

impl ActionOutcome {
    /// Invoices this outcome created.
    pub fn invoices(&self) -> u64 {
        match self {
            ActionOutcome::SaleInvoiced { .. } | ActionOutcome::PurchaseInvoiced { .. } => 1,
            _ => 0,
        }
    }

    /// Payments and stock movements this outcome recorded.
    pub fn transactions(&self) -> u64 {
        match self {
            ActionOutcome::SaleInvoiced { paid: true, .. }
            | ActionOutcome::PaymentRecorded { .. }
            | ActionOutcome::StockAdjusted { .. } => 1,
            _ => 0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationReport {
    pub invoices: u64,
    pub transactions: u64,
    pub outcomes: Vec<ActionOutcome>,
}

impl GenerationReport {
    pub fn absorb(&mut self, outcome: ActionOutcome) {
        self.invoices += outcome.invoices();
        self.transactions += outcome.transactions();
        self.outcomes.push(outcome);
    }

    pub fn failures(&self) -> impl Iterator<Item = (ActionKind, &str)> {
        self.outcomes.iter().filter_map(|o| match o {
            ActionOutcome::Failed { action, error } => Some((*action, error.as_str())),
            _ => None,
        })
    }
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BulkCounts {
    pub customers: u32,
    pub products: u32,
    pub invoices: u32,
    pub tasks: u32,
}

/// What a bulk run actually created.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkReport {
    pub customers: u32,
    pub products: u32,
    pub invoices: u32,
    pub tasks: u32,
}

fn draw<T>(rng: &mut StdRng, range: &RangeInclusive<T>) -> T
where
    T: SampleUniform + PartialOrd + Copy,
{
    if range.start() > range.end() {
        return *range.start();
    }
    rng.gen_range(range.clone())
}

fn chance(rng: &mut StdRng, probability: f64) -> bool {
    rng.gen_range(0.0..1.0) < probability
}

fn pick<T: Copy>(rng: &mut StdRng, items: &[T]) -> T {
    items[rng.gen_range(0..items.len())]
}

fn jitter(rng: &mut StdRng, amount: i64, variation: f64) -> i64 {
    let factor = if variation > 0.0 {
        1.0 + rng.gen_range(-variation..=variation)
    } else {
        1.0
    };
    ((amount as f64) * factor).round().max(0.0) as i64
}

pub struct ActivityGenerator {
    store: Arc<dyn ErpStore>,
    config: GeneratorConfig,
    rng: Mutex<StdRng>,
    sequence: AtomicU64,
}

impl ActivityGenerator {
    pub fn new(store: Arc<dyn ErpStore>, config: GeneratorConfig) -> Self {
        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let start = match config.seed {
            Some(_) => rng.gen_range(0..CODE_SPACE),
            None => Utc::now().timestamp_millis().unsigned_abs() % CODE_SPACE,
        };
        Self {
            store,
            config,
            rng: Mutex::new(rng),
            sequence: AtomicU64::new(start),
        }
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    fn with_rng<R>(&self, f: impl FnOnce(&mut StdRng) -> R) -> R {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut rng)
    }

    fn next_seq(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::Relaxed) % CODE_SPACE
    }

    fn code(&self, prefix: &str) -> String {
        format!("{prefix}-{:06}", self.next_seq())
    }

    fn invoice_number(&self, prefix: &str, at: DateTime<Utc>) -> String {
        format!("{prefix}-{}{:02}-{:06}", at.year(), at.month(), self.next_seq())
    }

    /// Draw the next action from the weighted mix.
    pub fn pick_action(&self) -> Option<ActionKind> {
        self.with_rng(|rng| {
            choose_weighted(&self.config.weights, |(_, w)| f64::from(*w), rng).map(|(k, _)| *k)
        })
    }

    /// One generation tick: `actions_per_tick` weighted actions.
    pub async fn generate(&self) -> GenerationReport {
        let mut report = GenerationReport::default();
        for _ in 0..self.config.actions_per_tick {
            let Some(kind) = self.pick_action() else {
                break;
            };
            let outcome = self.perform(kind).await;
            report.absorb(outcome);
        }
        report
    }

    /// Run one action; store failures become [`ActionOutcome::Failed`].
    pub async fn perform(&self, kind: ActionKind) -> ActionOutcome {
        let outcome = match self.run_action(kind).await {
            Ok(outcome) => outcome,
            Err(err) if err.is_conflict() => ActionOutcome::Skipped {
                action: kind,
                reason: err.to_string(),
            },
            Err(err) => {
                warn!(action = kind.as_str(), error = %err, "generator action failed");
                ActionOutcome::Failed {
                    action: kind,
                    error: err.to_string(),
                }
            }
        };
        debug!(action = kind.as_str(), ?outcome, "generator action finished");
        outcome
    }

    async fn run_action(&self, kind: ActionKind) -> Result<ActionOutcome, StoreError> {
        match kind {
            ActionKind::Sale => self.sale().await,
            ActionKind::Customer => {
                let c = self.create_customer().await?;
                Ok(ActionOutcome::CustomerCreated {
                    code: c.code,
                    name: c.name,
                })
            }
            ActionKind::Product => {
                let p = self.create_product().await?;
                Ok(ActionOutcome::ProductCreated {
                    code: p.code,
                    name: p.name,
                    quantity: p.quantity,
                })
            }
            ActionKind::Payment => self.payment().await,
            ActionKind::Purchase => self.purchase().await,
            ActionKind::Task => {
                let t = self.create_task().await?;
                Ok(ActionOutcome::TaskCreated {
                    title: t.title,
                    priority: t.priority,
                })
            }
            ActionKind::Inventory => self.inventory().await,
        }
    }

    pub async fn create_customer(&self) -> Result<Customer, StoreError> {
        let code = self.code("CUS");
        let now = Utc::now();
        let customer = self.with_rng(|rng| {
            let phone = format!("077{:08}", rng.gen_range(0..100_000_000u32));
            let (name, email, kind) = if chance(rng, 0.4) {
                let name = pick(rng, catalog::COMPANIES);
                let email = format!("{}@company.iq", catalog::email_local(name));
                (name.to_string(), email, CustomerKind::Wholesale)
            } else {
                let first = pick(rng, catalog::FIRST_NAMES);
                let last = pick(rng, catalog::LAST_NAMES);
                let email = format!("{}{:03}@email.com", first.to_lowercase(), rng.gen_range(0..1000));
                (format!("{first} {last}"), email, CustomerKind::Retail)
            };
            let address = Address::new(pick(rng, catalog::CITIES), pick(rng, catalog::AREAS));
            Customer {
                id: CustomerId::new(),
                code,
                name,
                kind,
                phone,
                email,
                addresses: vec![address],
                credit_limit: kind.default_credit_limit(),
                created_at: now,
            }
        });
        self.store.insert_customer(&customer).await?;
        debug!(code = %customer.code, name = %customer.name, "customer created");
        Ok(customer)
    }

    pub async fn create_product(&self) -> Result<Product, StoreError> {
        let code = self.code("PRD");
        let now = Utc::now();
        let product = self.with_rng(|rng| {
            let template: ProductTemplate = pick(rng, catalog::PRODUCTS);
            let variation = self.config.price_variation;
            Product {
                id: ProductId::new(),
                code,
                name: template.name.to_string(),
                description: format!("{} - {}", template.name, template.category),
                cost_price: jitter(rng, template.cost, variation),
                selling_price: jitter(rng, template.price, variation),
                quantity: draw(rng, &self.config.new_product_quantity).max(0),
                min_quantity: 5,
                unit: "piece".to_string(),
                created_at: now,
            }
        });
        self.store.insert_product(&product).await?;
        debug!(code = %product.code, quantity = product.quantity, "product created");
        Ok(product)
    }

    pub async fn create_supplier(&self) -> Result<Supplier, StoreError> {
        let code = self.code("SUP");
        let template = self.with_rng(|rng| pick(rng, catalog::SUPPLIERS));
        let supplier = Supplier {
            id: SupplierId::new(),
            code,
            name: template.name.to_string(),
            phone: template.phone.to_string(),
            email: format!("{}@supplier.iq", catalog::email_local(template.name)),
            created_at: Utc::now(),
        };
        self.store.insert_supplier(&supplier).await?;
        debug!(code = %supplier.code, "supplier created");
        Ok(supplier)
    }

    async fn create_warehouse(&self) -> Result<Warehouse, StoreError> {
        let warehouse = Warehouse {
            id: WarehouseId::new(),
            code: "WH-001".to_string(),
            name: "Main Warehouse".to_string(),
        };
        self.store.insert_warehouse(&warehouse).await?;
        debug!(code = %warehouse.code, "warehouse created");
        Ok(warehouse)
    }

    pub async fn create_task(&self) -> Result<Task, StoreError> {
        let (title, priority) = self.with_rng(|rng| {
            (pick(rng, catalog::TASK_TITLES), pick(rng, Priority::ALL))
        });
        let task = Task {
            id: TaskId::new(),
            title: title.to_string(),
            description: format!("Auto-generated task: {title}"),
            priority,
            status: TaskStatus::Pending,
            created_at: Utc::now(),
        };
        self.store.insert_task(&task).await?;
        Ok(task)
    }

    async fn sale(&self) -> Result<ActionOutcome, StoreError> {
        let customers = self.store.sample_customers(self.config.sample_size).await?;
        if customers.is_empty() {
            self.create_customer().await?;
            return Ok(ActionOutcome::PrerequisiteCreated {
                action: ActionKind::Sale,
                created: Prerequisite::Customer,
            });
        }
        let in_stock = self.store.products_in_stock(self.config.sample_size).await?;
        if in_stock.is_empty() {
            self.create_product().await?;
            return Ok(ActionOutcome::PrerequisiteCreated {
                action: ActionKind::Sale,
                created: Prerequisite::Product,
            });
        }

        let now = Utc::now();
        let (customer_id, lines, discount, pay_now, method) = self.with_rng(|rng| {
            let customer_id = customers[rng.gen_range(0..customers.len())].id;
            let wanted = draw(rng, &self.config.sale_lines).clamp(1, in_stock.len());
            let chosen: Vec<&Product> = in_stock.choose_multiple(rng, wanted).collect();
            let mut lines = Vec::with_capacity(chosen.len());
            for product in chosen {
                let requested = draw(rng, &self.config.sale_quantity);
                let applied = allocate_quantity(requested, product.quantity);
                if applied == 0 {
                    continue;
                }
                let unit_price = if product.selling_price > 0 {
                    product.selling_price
                } else {
                    catalog::DEFAULT_UNIT_PRICE
                };
                lines.push(InvoiceLine::new(product.id, applied, unit_price));
            }
            let discount = if chance(rng, self.config.discount_probability) {
                self.config.discount_percent
            } else {
                0
            };
            let pay_now = chance(rng, self.config.payment_probability);
            (customer_id, lines, discount, pay_now, pick(rng, PaymentMethod::ALL))
        });
        let lines = lines.into_iter().collect::<Result<Vec<_>, _>>()?;
        if lines.is_empty() {
            return Ok(ActionOutcome::Skipped {
                action: ActionKind::Sale,
                reason: "nothing left to allocate".to_string(),
            });
        }

        let number = self.invoice_number("INV", now);
        let invoice = Invoice::sale(InvoiceId::new(), number, customer_id, lines, discount, now)?;
        let payment = pay_now.then(|| Payment::settle(&invoice.pending(), method, now));
        self.store.commit_sale(&invoice, payment.as_ref()).await?;

        debug!(number = %invoice.number, total = invoice.total, paid = pay_now, "sale invoiced");
        Ok(ActionOutcome::SaleInvoiced {
            number: invoice.number,
            total: invoice.total,
            paid: pay_now,
        })
    }

    async fn purchase(&self) -> Result<ActionOutcome, StoreError> {
        let suppliers = self.store.sample_suppliers(self.config.sample_size).await?;
        if suppliers.is_empty() {
            self.create_supplier().await?;
            return Ok(ActionOutcome::PrerequisiteCreated {
                action: ActionKind::Purchase,
                created: Prerequisite::Supplier,
            });
        }

        let (supplier_id, template, quantity) = self.with_rng(|rng| {
            (
                suppliers[rng.gen_range(0..suppliers.len())].id,
                pick(rng, catalog::PRODUCTS),
                draw(rng, &self.config.purchase_quantity).max(1),
            )
        });
        let now = Utc::now();
        let (product_id, new_product) = match self.store.product_by_name(template.name).await? {
            Some(existing) => (existing.id, None),
            None => {
                let product = Product {
                    id: ProductId::new(),
                    code: self.code("PRD"),
                    name: template.name.to_string(),
                    description: format!("{} - {}", template.name, template.category),
                    cost_price: template.cost,
                    selling_price: template.price,
                    quantity: 0,
                    min_quantity: 5,
                    unit: "piece".to_string(),
                    created_at: now,
                };
                (product.id, Some(product))
            }
        };

        let line = InvoiceLine::new(product_id, quantity, template.cost)?;
        let number = self.invoice_number("PUR", now);
        let invoice = Invoice::purchase(InvoiceId::new(), number, supplier_id, line, now)?;
        let draft = PurchaseDraft {
            invoice,
            new_product,
        };
        self.store.commit_purchase(&draft).await?;

        debug!(number = %draft.invoice.number, quantity, "purchase invoiced");
        Ok(ActionOutcome::PurchaseInvoiced {
            number: draft.invoice.number,
            total: draft.invoice.total,
            new_product: draft.new_product.is_some(),
        })
    }

    async fn payment(&self) -> Result<ActionOutcome, StoreError> {
        let pending = self.store.pending_invoices(self.config.sample_size).await?;
        if pending.is_empty() {
            return Ok(ActionOutcome::Skipped {
                action: ActionKind::Payment,
                reason: "no pending invoice".to_string(),
            });
        }
        let (invoice, method) = self.with_rng(|rng| {
            (
                pending[rng.gen_range(0..pending.len())].clone(),
                pick(rng, PaymentMethod::ALL),
            )
        });
        let payment = Payment::settle(&invoice, method, Utc::now());
        self.store.settle_invoice(&payment).await?;

        debug!(number = %invoice.number, amount = payment.amount, method = %method, "payment recorded");
        Ok(ActionOutcome::PaymentRecorded {
            number: invoice.number,
            amount: payment.amount,
        })
    }

    async fn inventory(&self) -> Result<ActionOutcome, StoreError> {
        let products = self.store.sample_products(self.config.sample_size).await?;
        if products.is_empty() {
            return Ok(ActionOutcome::Skipped {
                action: ActionKind::Inventory,
                reason: "no products".to_string(),
            });
        }
        let (product, delta) = self.with_rng(|rng| {
            (
                products[rng.gen_range(0..products.len())].clone(),
                draw(rng, &self.config.adjustment),
            )
        });
        if delta == 0 || product.quantity + delta < 0 {
            return Ok(ActionOutcome::Skipped {
                action: ActionKind::Inventory,
                reason: format!("delta {delta} not applicable to {}", product.quantity),
            });
        }

        let Some(warehouse) = self.store.first_warehouse().await? else {
            self.create_warehouse().await?;
            return Ok(ActionOutcome::PrerequisiteCreated {
                action: ActionKind::Inventory,
                created: Prerequisite::Warehouse,
            });
        };

        let Some(movement) =
            InventoryMovement::adjustment(product.id, warehouse.id, product.quantity, delta, Utc::now())
        else {
            return Ok(ActionOutcome::Skipped {
                action: ActionKind::Inventory,
                reason: format!("delta {delta} not applicable to {}", product.quantity),
            });
        };
        self.store.adjust_stock(&movement).await?;

        debug!(product = %product.code, delta, "stock adjusted");
        Ok(ActionOutcome::StockAdjusted {
            product: product.code,
            before: movement.before,
            after: movement.after,
        })
    }

    /// Seed data in bulk. Sales are only invoiced while customers and stock
    /// exist; a sale that had to create a prerequisite instead counts it.
    pub async fn generate_bulk(&self, counts: BulkCounts) -> Result<BulkReport, StoreError> {
        let mut report = BulkReport::default();
        for _ in 0..counts.customers {
            self.create_customer().await?;
            report.customers += 1;
        }
        for _ in 0..counts.products {
            self.create_product().await?;
            report.products += 1;
        }
        for _ in 0..counts.tasks {
            self.create_task().await?;
            report.tasks += 1;
        }
        for _ in 0..counts.invoices {
            match self.sale().await {
                Ok(ActionOutcome::SaleInvoiced { .. }) => report.invoices += 1,
                Ok(ActionOutcome::PrerequisiteCreated {
                    created: Prerequisite::Customer,
                    ..
                }) => report.customers += 1,
                Ok(ActionOutcome::PrerequisiteCreated {
                    created: Prerequisite::Product,
                    ..
                }) => report.products += 1,
                Ok(_) => {}
                Err(err) if err.is_conflict() => {}
                Err(err) => return Err(err),
            }
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use erpbot_core::records::{InvoiceKind, PaymentStatus};
    use erpbot_infra::erp::InMemoryErpStore;
    use proptest::prelude::*;

    fn product(name: &str, quantity: i64) -> Product {
        Product {
            id: ProductId::new(),
            code: format!("PRD-{name}"),
            name: name.to_string(),
            description: String::new(),
            cost_price: 1_000,
            selling_price: 1_500,
            quantity,
            min_quantity: 5,
            unit: "piece".to_string(),
            created_at: Utc::now(),
        }
    }

    fn generator(store: &Arc<InMemoryErpStore>, config: GeneratorConfig) -> ActivityGenerator {
        ActivityGenerator::new(store.clone(), config.with_seed(11))
    }

    async fn seeded_store(stock: &[i64]) -> Arc<InMemoryErpStore> {
        let store = Arc::new(InMemoryErpStore::new());
        let seeder = ActivityGenerator::new(store.clone(), GeneratorConfig::default().with_seed(99));
        seeder.create_customer().await.unwrap();
        for (i, qty) in stock.iter().enumerate() {
            store.insert_product(&product(&format!("p{i}"), *qty)).await.unwrap();
        }
        store
    }

    #[tokio::test]
    async fn sale_without_customers_creates_one_and_stops() {
        let store = Arc::new(InMemoryErpStore::new());
        store.insert_product(&product("mouse", 5)).await.unwrap();
        let generator = generator(&store, GeneratorConfig::only(ActionKind::Sale));

        let outcome = generator.perform(ActionKind::Sale).await;
        assert_eq!(
            outcome,
            ActionOutcome::PrerequisiteCreated {
                action: ActionKind::Sale,
                created: Prerequisite::Customer
            }
        );
        assert_eq!(store.customers().len(), 1);
        assert!(store.invoices().is_empty());
        assert_eq!(store.products()[0].quantity, 5);
    }

    #[tokio::test]
    async fn sale_without_stock_creates_a_product_and_stops() {
        let store = seeded_store(&[0]).await;
        let generator = generator(&store, GeneratorConfig::default());

        let outcome = generator.perform(ActionKind::Sale).await;
        assert!(matches!(
            outcome,
            ActionOutcome::PrerequisiteCreated {
                created: Prerequisite::Product,
                ..
            }
        ));
        assert_eq!(store.products().len(), 2);
        assert!(store.invoices().is_empty());
    }

    #[tokio::test]
    async fn sale_caps_quantity_at_available_stock() {
        let store = seeded_store(&[5]).await;
        let config = GeneratorConfig {
            sale_quantity: 8..=8,
            payment_probability: 0.0,
            ..GeneratorConfig::default()
        };
        let generator = generator(&store, config);

        generator.perform(ActionKind::Sale).await;
        let invoice = &store.invoices()[0];
        assert_eq!(invoice.lines[0].quantity, 5);
        assert_eq!(store.products()[0].quantity, 0);
    }

    #[tokio::test]
    async fn paid_sale_settles_for_exactly_the_total() {
        let store = seeded_store(&[40, 40, 40]).await;
        let config = GeneratorConfig {
            discount_probability: 1.0,
            payment_probability: 1.0,
            ..GeneratorConfig::default()
        };
        let generator = generator(&store, config);

        let outcome = generator.perform(ActionKind::Sale).await;
        assert!(matches!(outcome, ActionOutcome::SaleInvoiced { paid: true, .. }));

        let invoice = &store.invoices()[0];
        invoice.verify().unwrap();
        assert_eq!(invoice.discount_percent, 5);
        assert_eq!(invoice.payment_status, PaymentStatus::Paid);
        assert_eq!(store.payments()[0].amount, invoice.total);
        assert!(invoice.number.starts_with("INV-"));
    }

    #[tokio::test]
    async fn payment_action_settles_a_pending_invoice() {
        let store = seeded_store(&[40]).await;
        let config = GeneratorConfig {
            payment_probability: 0.0,
            ..GeneratorConfig::default()
        };
        let generator = generator(&store, config);
        generator.perform(ActionKind::Sale).await;
        assert_eq!(store.pending_invoices(10).await.unwrap().len(), 1);

        let outcome = generator.perform(ActionKind::Payment).await;
        let invoice = &store.invoices()[0];
        assert_eq!(
            outcome,
            ActionOutcome::PaymentRecorded {
                number: invoice.number.clone(),
                amount: invoice.total
            }
        );
        assert_eq!(invoice.payment_status, PaymentStatus::Paid);

        let again = generator.perform(ActionKind::Payment).await;
        assert!(matches!(again, ActionOutcome::Skipped { .. }));
        assert_eq!(store.payments().len(), 1);
    }

    #[tokio::test]
    async fn purchase_needs_a_supplier_first() {
        let store = Arc::new(InMemoryErpStore::new());
        let generator = generator(&store, GeneratorConfig::default());

        let first = generator.perform(ActionKind::Purchase).await;
        assert!(matches!(
            first,
            ActionOutcome::PrerequisiteCreated {
                created: Prerequisite::Supplier,
                ..
            }
        ));
        assert!(store.invoices().is_empty());
        assert!(store.suppliers()[0].code.starts_with("SUP-"));

        let second = generator.perform(ActionKind::Purchase).await;
        assert!(matches!(second, ActionOutcome::PurchaseInvoiced { new_product: true, .. }));
        let invoice = &store.invoices()[0];
        assert_eq!(invoice.kind, InvoiceKind::Purchase);
        let product = &store.products()[0];
        assert_eq!(product.quantity, invoice.lines[0].quantity);
        assert_eq!(invoice.total, invoice.lines[0].quantity * product.cost_price);
    }

    #[tokio::test]
    async fn purchase_restocks_an_existing_product_by_name() {
        let store = Arc::new(InMemoryErpStore::new());
        for template in catalog::PRODUCTS {
            let mut p = product(template.name, 0);
            p.code = format!("PRD-{}", catalog::email_local(template.name));
            p.cost_price = template.cost;
            store.insert_product(&p).await.unwrap();
        }
        let generator = generator(&store, GeneratorConfig::default());
        generator.create_supplier().await.unwrap();

        let outcome = generator.perform(ActionKind::Purchase).await;
        assert!(matches!(outcome, ActionOutcome::PurchaseInvoiced { new_product: false, .. }));
        let products = store.products();
        assert_eq!(products.len(), catalog::PRODUCTS.len());
        let restocked: Vec<_> = products.iter().filter(|p| p.quantity > 0).collect();
        assert_eq!(restocked.len(), 1);
        assert!((10..=29).contains(&restocked[0].quantity));
    }

    #[tokio::test]
    async fn inventory_needs_a_warehouse_first() {
        let store = seeded_store(&[10]).await;
        let config = GeneratorConfig {
            adjustment: 2..=2,
            ..GeneratorConfig::default()
        };
        let generator = generator(&store, config);

        let first = generator.perform(ActionKind::Inventory).await;
        assert!(matches!(
            first,
            ActionOutcome::PrerequisiteCreated {
                created: Prerequisite::Warehouse,
                ..
            }
        ));
        assert!(store.movements().is_empty());
        assert_eq!(store.products()[0].quantity, 10);

        let second = generator.perform(ActionKind::Inventory).await;
        assert!(matches!(second, ActionOutcome::StockAdjusted { before: 10, after: 12, .. }));
        assert_eq!(store.movements()[0].after, 12);
    }

    #[tokio::test]
    async fn inventory_never_drives_stock_negative() {
        let store = seeded_store(&[2]).await;
        let config = GeneratorConfig {
            adjustment: -3..=-3,
            ..GeneratorConfig::default()
        };
        let generator = generator(&store, config);

        let outcome = generator.perform(ActionKind::Inventory).await;
        assert!(matches!(outcome, ActionOutcome::Skipped { .. }));
        assert_eq!(store.products()[0].quantity, 2);
    }

    #[tokio::test]
    async fn generate_reports_counts_per_tick() {
        let store = Arc::new(InMemoryErpStore::new());
        let config = GeneratorConfig {
            actions_per_tick: 4,
            ..GeneratorConfig::only(ActionKind::Customer)
        };
        let generator = generator(&store, config);

        let report = generator.generate().await;
        assert_eq!(report.outcomes.len(), 4);
        assert_eq!(report.invoices, 0);
        assert_eq!(report.transactions, 0);
        assert_eq!(store.customers().len(), 4);
        let mut codes: Vec<String> = store.customers().into_iter().map(|c| c.code).collect();
        codes.dedup();
        assert_eq!(codes.len(), 4);
    }

    #[tokio::test]
    async fn disabled_mix_does_nothing() {
        let store = Arc::new(InMemoryErpStore::new());
        let config = GeneratorConfig {
            weights: vec![(ActionKind::Sale, 0)],
            ..GeneratorConfig::default()
        };
        let report = generator(&store, config).generate().await;
        assert!(report.outcomes.is_empty());
    }

    #[tokio::test]
    async fn bulk_seeds_requested_records() {
        let store = Arc::new(InMemoryErpStore::new());
        let generator = generator(&store, GeneratorConfig::default());
        let counts = BulkCounts {
            customers: 3,
            products: 2,
            invoices: 4,
            tasks: 2,
        };

        let report = generator.generate_bulk(counts).await.unwrap();
        assert_eq!(report.tasks, 2);
        assert_eq!(store.tasks().len(), 2);
        assert_eq!(report.customers as usize, store.customers().len());
        assert_eq!(report.products as usize, store.products().len());
        assert_eq!(report.invoices as usize, store.invoices().len());
        assert!(report.invoices >= 1);
        assert!(store.invoices().iter().all(|i| i.verify().is_ok()));
    }

    #[test]
    fn payment_counts_as_a_transaction() {
        let mut report = GenerationReport::default();
        report.absorb(ActionOutcome::SaleInvoiced {
            number: "INV-202401-000001".into(),
            total: 10,
            paid: true,
        });
        report.absorb(ActionOutcome::PaymentRecorded {
            number: "INV-202401-000002".into(),
            amount: 3,
        });
        report.absorb(ActionOutcome::Failed {
            action: ActionKind::Task,
            error: "db down".into(),
        });
        assert_eq!(report.invoices, 1);
        assert_eq!(report.transactions, 2);
        assert_eq!(report.failures().count(), 1);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        /// Stock never goes negative and every invoice balances, whatever the
        /// interleaving of sales, settlements and adjustments.
        #[test]
        fn stock_stays_non_negative(seed in any::<u64>(), stock in prop::collection::vec(0i64..8, 1..4), steps in 1usize..40) {
            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            rt.block_on(async {
                let store = seeded_store(&stock).await;
                store
                    .insert_warehouse(&Warehouse {
                        id: WarehouseId::new(),
                        code: "WH-001".into(),
                        name: "Main".into(),
                    })
                    .await
                    .unwrap();
                let config = GeneratorConfig {
                    weights: vec![
                        (ActionKind::Sale, 5),
                        (ActionKind::Payment, 2),
                        (ActionKind::Inventory, 3),
                    ],
                    seed: Some(seed),
                    ..GeneratorConfig::default()
                };
                let generator = ActivityGenerator::new(store.clone(), config);
                for _ in 0..steps {
                    let outcome = generator.generate().await;
                    assert_eq!(outcome.failures().count(), 0);
                    assert!(store.products().iter().all(|p| p.quantity >= 0));
                }
                for invoice in store.invoices() {
                    assert!(invoice.verify().is_ok());
                }
                for movement in store.movements() {
                    assert_eq!(movement.after, movement.before + movement.delta);
                }
                for payment in store.payments() {
                    let invoice = store.invoices().into_iter().find(|i| i.id == payment.invoice_id).unwrap();
                    assert_eq!(payment.amount, invoice.total);
                    assert_eq!(invoice.payment_status, PaymentStatus::Paid);
                }
            });
        }
    }
}
