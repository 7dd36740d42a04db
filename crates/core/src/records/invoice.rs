//! Invoices, lines and settlement payments.
//!
//! Invariants enforced by construction and re-checked by [`Invoice::verify`]:
//! - `line.total == line.quantity * line.unit_price`
//! - `subtotal == Σ line.total`
//! - `total == subtotal - discount_amount`
//! - a settlement [`Payment`] carries `amount == invoice.total`

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::text_enum;
use crate::error::{CoreError, CoreResult};
use crate::id::{CustomerId, InvoiceId, PaymentId, ProductId, SupplierId};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceKind {
    Sale,
    Purchase,
}

text_enum!(InvoiceKind, "invoice kind", {
    Sale => "sale",
    Purchase => "purchase",
});

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
}

text_enum!(PaymentStatus, "payment status", {
    Pending => "pending",
    Paid => "paid",
});

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    BankTransfer,
    Check,
}

text_enum!(PaymentMethod, "payment method", {
    Cash => "cash",
    BankTransfer => "bank_transfer",
    Check => "check",
});

/// Counterparty of an invoice: customers buy, suppliers sell to us.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "party", content = "id", rename_all = "snake_case")]
pub enum InvoiceParty {
    Customer(CustomerId),
    Supplier(SupplierId),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceLine {
    pub product_id: ProductId,
    pub quantity: i64,
    pub unit_price: i64,
    pub total: i64,
}

impl InvoiceLine {
    pub fn new(product_id: ProductId, quantity: i64, unit_price: i64) -> CoreResult<Self> {
        if quantity <= 0 {
            return Err(CoreError::validation(format!(
                "line quantity must be positive (got {quantity})"
            )));
        }
        if unit_price < 0 {
            return Err(CoreError::validation(format!(
                "unit price must not be negative (got {unit_price})"
            )));
        }
        let total = quantity
            .checked_mul(unit_price)
            .ok_or_else(|| CoreError::validation("line total overflows"))?;
        Ok(Self {
            product_id,
            quantity,
            unit_price,
            total,
        })
    }
}

/// `round(subtotal * percent / 100)` in whole currency units.
pub fn discount_amount(subtotal: i64, percent: u32) -> i64 {
    let raw = i128::from(subtotal) * i128::from(percent);
    // Half-up rounding for non-negative subtotals.
    ((raw + 50).div_euclid(100)) as i64
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: InvoiceId,
    pub number: String,
    pub kind: InvoiceKind,
    pub party: InvoiceParty,
    pub lines: Vec<InvoiceLine>,
    pub subtotal: i64,
    pub discount_percent: u32,
    pub discount_amount: i64,
    pub total: i64,
    pub payment_status: PaymentStatus,
    pub created_at: DateTime<Utc>,
}

impl Invoice {
    /// Build a pending sale invoice, deriving subtotal, discount and total.
    pub fn sale(
        id: InvoiceId,
        number: impl Into<String>,
        customer_id: CustomerId,
        lines: Vec<InvoiceLine>,
        discount_percent: u32,
        created_at: DateTime<Utc>,
    ) -> CoreResult<Self> {
        Self::build(
            id,
            number.into(),
            InvoiceKind::Sale,
            InvoiceParty::Customer(customer_id),
            lines,
            discount_percent,
            created_at,
        )
    }

    /// Build a pending single-line purchase invoice (`total = qty * unit_cost`).
    pub fn purchase(
        id: InvoiceId,
        number: impl Into<String>,
        supplier_id: SupplierId,
        line: InvoiceLine,
        created_at: DateTime<Utc>,
    ) -> CoreResult<Self> {
        Self::build(
            id,
            number.into(),
            InvoiceKind::Purchase,
            InvoiceParty::Supplier(supplier_id),
            vec![line],
            0,
            created_at,
        )
    }

    fn build(
        id: InvoiceId,
        number: String,
        kind: InvoiceKind,
        party: InvoiceParty,
        lines: Vec<InvoiceLine>,
        discount_percent: u32,
        created_at: DateTime<Utc>,
    ) -> CoreResult<Self> {
        if lines.is_empty() {
            return Err(CoreError::invariant("an invoice needs at least one line"));
        }
        if discount_percent > 100 {
            return Err(CoreError::validation(format!(
                "discount percent out of range (got {discount_percent})"
            )));
        }
        let subtotal = lines
            .iter()
            .try_fold(0i64, |acc, l| acc.checked_add(l.total))
            .ok_or_else(|| CoreError::validation("subtotal overflows"))?;
        let discount_amount = discount_amount(subtotal, discount_percent);
        let invoice = Self {
            id,
            number,
            kind,
            party,
            lines,
            subtotal,
            discount_percent,
            discount_amount,
            total: subtotal - discount_amount,
            payment_status: PaymentStatus::Pending,
            created_at,
        };
        invoice.verify()?;
        Ok(invoice)
    }

    /// Re-check every arithmetic invariant.
    pub fn verify(&self) -> CoreResult<()> {
        if self.lines.is_empty() {
            return Err(CoreError::invariant("invoice has no lines"));
        }
        for line in &self.lines {
            if line.quantity <= 0 || line.total != line.quantity * line.unit_price {
                return Err(CoreError::invariant(format!(
                    "line for product {} does not equal quantity * unit_price",
                    line.product_id
                )));
            }
        }
        let sum: i64 = self.lines.iter().map(|l| l.total).sum();
        if self.subtotal != sum {
            return Err(CoreError::invariant(format!(
                "subtotal {} != sum of lines {}",
                self.subtotal, sum
            )));
        }
        if self.total != self.subtotal - self.discount_amount {
            return Err(CoreError::invariant(format!(
                "total {} != subtotal {} - discount {}",
                self.total, self.subtotal, self.discount_amount
            )));
        }
        if self.total < 0 {
            return Err(CoreError::invariant("invoice total is negative"));
        }
        Ok(())
    }

    pub fn pending(&self) -> PendingInvoice {
        PendingInvoice {
            id: self.id,
            number: self.number.clone(),
            kind: self.kind,
            total: self.total,
        }
    }
}

/// The slice of an invoice needed to settle it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingInvoice {
    pub id: InvoiceId,
    pub number: String,
    pub kind: InvoiceKind,
    pub total: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub invoice_id: InvoiceId,
    pub amount: i64,
    pub method: PaymentMethod,
    pub notes: String,
    pub received_at: DateTime<Utc>,
}

impl Payment {
    /// Full settlement of `invoice`: the amount is the invoice total, exactly.
    pub fn settle(invoice: &PendingInvoice, method: PaymentMethod, received_at: DateTime<Utc>) -> Self {
        Self {
            id: PaymentId::new(),
            invoice_id: invoice.id,
            amount: invoice.total,
            method,
            notes: "automated settlement".to_string(),
            received_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn line(qty: i64, price: i64) -> InvoiceLine {
        InvoiceLine::new(ProductId::new(), qty, price).unwrap()
    }

    #[test]
    fn ten_percent_discount_on_one_hundred_thousand() {
        assert_eq!(discount_amount(100_000, 10), 10_000);

        let inv = Invoice::sale(
            InvoiceId::new(),
            "INV-1",
            CustomerId::new(),
            vec![line(2, 50_000)],
            10,
            Utc::now(),
        )
        .unwrap();
        assert_eq!(inv.subtotal, 100_000);
        assert_eq!(inv.discount_amount, 10_000);
        assert_eq!(inv.total, 90_000);
        assert_eq!(inv.payment_status, PaymentStatus::Pending);
    }

    #[test]
    fn discount_rounds_half_up() {
        assert_eq!(discount_amount(30, 5), 2); // 1.5 -> 2
        assert_eq!(discount_amount(29, 5), 1); // 1.45 -> 1
        assert_eq!(discount_amount(0, 5), 0);
    }

    #[test]
    fn empty_invoice_is_rejected() {
        let err = Invoice::sale(InvoiceId::new(), "INV-2", CustomerId::new(), vec![], 0, Utc::now())
            .unwrap_err();
        assert!(matches!(err, CoreError::InvariantViolation(_)));
    }

    #[test]
    fn non_positive_line_quantity_is_rejected() {
        assert!(InvoiceLine::new(ProductId::new(), 0, 10).is_err());
        assert!(InvoiceLine::new(ProductId::new(), 1, -1).is_err());
    }

    #[test]
    fn purchase_total_is_quantity_times_cost() {
        let inv = Invoice::purchase(
            InvoiceId::new(),
            "PUR-1",
            SupplierId::new(),
            line(12, 15_000),
            Utc::now(),
        )
        .unwrap();
        assert_eq!(inv.total, 180_000);
        assert_eq!(inv.subtotal, inv.total);
        assert_eq!(inv.discount_amount, 0);
    }

    #[test]
    fn tampered_totals_fail_verification() {
        let mut inv = Invoice::sale(
            InvoiceId::new(),
            "INV-3",
            CustomerId::new(),
            vec![line(1, 1000)],
            0,
            Utc::now(),
        )
        .unwrap();
        inv.total += 1;
        assert!(inv.verify().is_err());
    }

    #[test]
    fn settlement_amount_equals_invoice_total() {
        let inv = Invoice::sale(
            InvoiceId::new(),
            "INV-4",
            CustomerId::new(),
            vec![line(3, 40_000)],
            5,
            Utc::now(),
        )
        .unwrap();
        let payment = Payment::settle(&inv.pending(), PaymentMethod::Cash, Utc::now());
        assert_eq!(payment.amount, inv.total);
        assert_eq!(payment.invoice_id, inv.id);
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: every constructed sale invoice satisfies
        /// subtotal == Σ qty*price and total == subtotal - discount.
        #[test]
        fn sale_totals_hold(
            lines in prop::collection::vec((1i64..50, 0i64..2_000_000), 1..4),
            pct in prop::sample::select(vec![0u32, 5, 10, 15]),
        ) {
            let lines: Vec<InvoiceLine> = lines
                .into_iter()
                .map(|(q, p)| line(q, p))
                .collect();
            let expected_subtotal: i64 = lines.iter().map(|l| l.quantity * l.unit_price).sum();
            let inv = Invoice::sale(InvoiceId::new(), "INV-P", CustomerId::new(), lines, pct, Utc::now()).unwrap();
            prop_assert_eq!(inv.subtotal, expected_subtotal);
            prop_assert_eq!(inv.total, inv.subtotal - inv.discount_amount);
            prop_assert!(inv.total >= 0);
        }
    }
}
