//! Healing contract and the default rule-based healer.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, instrument, warn};

use erpbot_core::records::Fix;
use erpbot_infra::db::{column_i64, DbError, QueryExecutor};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HealError {
    #[error("healer unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Db(#[from] DbError),
}

/// `{errorsFound, errorsFixed, fixes}` of one heal pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealReport {
    pub errors_found: u64,
    pub errors_fixed: u64,
    pub fixes: Vec<Fix>,
}

#[async_trait]
pub trait Healer: Send + Sync {
    /// Look for known data problems; repair them when `auto_fix` is set.
    async fn check_and_heal(&self, auto_fix: bool) -> Result<HealReport, HealError>;
}

#[async_trait]
impl<H> Healer for Arc<H>
where
    H: Healer + ?Sized,
{
    async fn check_and_heal(&self, auto_fix: bool) -> Result<HealReport, HealError> {
        (**self).check_and_heal(auto_fix).await
    }
}

/// A check that counts offending rows and the statement that repairs them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealRule {
    pub name: String,
    /// Yields one row with a `count` column.
    pub check_sql: String,
    pub fix_sql: String,
}

impl HealRule {
    pub fn new(name: impl Into<String>, check_sql: impl Into<String>, fix_sql: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            check_sql: check_sql.into(),
            fix_sql: fix_sql.into(),
        }
    }
}

const VALID_PAYMENT_STATUSES: &str = "('pending', 'paid')";

pub fn default_rules() -> Vec<HealRule> {
    vec![
        HealRule::new(
            "invalid_payment_status",
            format!(
                "SELECT COUNT(*) AS count FROM invoices \
                 WHERE payment_status IS NULL OR payment_status NOT IN {VALID_PAYMENT_STATUSES}"
            ),
            format!(
                "UPDATE invoices SET payment_status = 'pending' \
                 WHERE payment_status IS NULL OR payment_status NOT IN {VALID_PAYMENT_STATUSES}"
            ),
        ),
        HealRule::new(
            "inconsistent_totals",
            "SELECT COUNT(*) AS count FROM invoices WHERE total <> subtotal - discount_amount",
            "UPDATE invoices SET total = subtotal - discount_amount \
             WHERE total <> subtotal - discount_amount",
        ),
        HealRule::new(
            "negative_stock",
            "SELECT COUNT(*) AS count FROM products WHERE quantity < 0",
            "UPDATE products SET quantity = 0 WHERE quantity < 0",
        ),
        HealRule::new(
            "orphan_invoice_items",
            "SELECT COUNT(*) AS count FROM invoice_items ii \
             WHERE NOT EXISTS (SELECT 1 FROM invoices i WHERE i.id = ii.invoice_id)",
            "DELETE FROM invoice_items ii \
             WHERE NOT EXISTS (SELECT 1 FROM invoices i WHERE i.id = ii.invoice_id)",
        ),
        HealRule::new(
            "paid_without_payment",
            "SELECT COUNT(*) AS count FROM invoices i WHERE i.payment_status = 'paid' \
             AND NOT EXISTS (SELECT 1 FROM payments p WHERE p.invoice_id = i.id)",
            "UPDATE invoices i SET payment_status = 'pending' WHERE i.payment_status = 'paid' \
             AND NOT EXISTS (SELECT 1 FROM payments p WHERE p.invoice_id = i.id)",
        ),
    ]
}

/// Runs [`HealRule`]s over the ERP database. A failing rule is logged and
/// skipped.
pub struct RuleHealer {
    db: Arc<dyn QueryExecutor>,
    rules: Vec<HealRule>,
}

impl RuleHealer {
    pub fn new(db: Arc<dyn QueryExecutor>) -> Self {
        Self::with_rules(db, default_rules())
    }

    pub fn with_rules(db: Arc<dyn QueryExecutor>, rules: Vec<HealRule>) -> Self {
        Self { db, rules }
    }

    pub fn rules(&self) -> &[HealRule] {
        &self.rules
    }

    async fn count(&self, rule: &HealRule) -> Result<u64, DbError> {
        let row = self.db.get(&rule.check_sql, &[]).await?;
        Ok(row
            .and_then(|r| column_i64(&r, "count"))
            .unwrap_or(0)
            .max(0) as u64)
    }
}

#[async_trait]
impl Healer for RuleHealer {
    #[instrument(skip(self), fields(rules = self.rules.len()))]
    async fn check_and_heal(&self, auto_fix: bool) -> Result<HealReport, HealError> {
        let mut report = HealReport::default();
        for rule in &self.rules {
            let found = match self.count(rule).await {
                Ok(0) => continue,
                Ok(n) => n,
                Err(e) => {
                    warn!(rule = %rule.name, error = %e, "heal check failed");
                    continue;
                }
            };
            report.errors_found += found;
            warn!(rule = %rule.name, found, "data issues found");

            if !auto_fix {
                continue;
            }
            let fixed = match self.db.run(&rule.fix_sql, &[]).await {
                Ok(n) => n,
                Err(e) => {
                    warn!(rule = %rule.name, error = %e, "heal fix failed");
                    0
                }
            };
            report.errors_fixed += fixed;
            report.fixes.push(Fix::new(rule.name.clone(), found, fixed));
        }

        if report.errors_found > 0 {
            info!(
                found = report.errors_found,
                fixed = report.errors_fixed,
                "heal pass finished"
            );
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use erpbot_infra::db::{Row, ScriptedQueryExecutor, ScriptedResponse};
    use serde_json::json;

    fn count_row(n: i64) -> Vec<Row> {
        vec![json!({ "count": n }).as_object().cloned().unwrap_or_default()]
    }

    #[tokio::test]
    async fn clean_database_reports_nothing() {
        let db = Arc::new(ScriptedQueryExecutor::new());
        let report = RuleHealer::new(db.clone()).check_and_heal(true).await.unwrap();
        assert_eq!(report, HealReport::default());
        assert_eq!(db.count("SELECT COUNT(*)"), 5);
        assert_eq!(db.count("UPDATE"), 0);
    }

    #[tokio::test]
    async fn found_issues_are_fixed_when_allowed() {
        let db = Arc::new(ScriptedQueryExecutor::new());
        db.rows("FROM products WHERE quantity < 0", count_row(2));
        db.on("UPDATE products SET quantity = 0", ScriptedResponse::Affected(2));
        db.rows("total <> subtotal", count_row(1));
        db.on("SET total = subtotal", ScriptedResponse::Affected(1));

        let report = RuleHealer::new(db).check_and_heal(true).await.unwrap();
        assert_eq!(report.errors_found, 3);
        assert_eq!(report.errors_fixed, 3);
        let rules: Vec<&str> = report.fixes.iter().map(|f| f.rule.as_str()).collect();
        assert_eq!(rules, vec!["inconsistent_totals", "negative_stock"]);
    }

    #[tokio::test]
    async fn detection_only_without_auto_fix() {
        let db = Arc::new(ScriptedQueryExecutor::new());
        db.rows("FROM products WHERE quantity < 0", count_row(4));

        let report = RuleHealer::new(db.clone()).check_and_heal(false).await.unwrap();
        assert_eq!(report.errors_found, 4);
        assert_eq!(report.errors_fixed, 0);
        assert!(report.fixes.is_empty());
        assert_eq!(db.count("UPDATE products"), 0);
    }

    #[tokio::test]
    async fn failing_rule_is_skipped() {
        let db = Arc::new(ScriptedQueryExecutor::new());
        db.fail("FROM invoice_items", DbError::MissingRelation("invoice_items".into()));
        db.rows("FROM products WHERE quantity < 0", count_row(1));
        db.on("UPDATE products SET quantity = 0", ScriptedResponse::Affected(1));

        let report = RuleHealer::new(db).check_and_heal(true).await.unwrap();
        assert_eq!(report.errors_found, 1);
        assert_eq!(report.fixes, vec![Fix::new("negative_stock", 1, 1)]);
    }
}
