//! The default probe battery and coverage checklist.

use chrono::{Datelike, NaiveDate, Utc};

use erpbot_core::records::discount_amount;

use crate::probe::{DbExpectation, DbProbe, EndpointProbe, LogicAssertion};

/// Endpoints hit every testing cycle.
pub fn endpoints() -> Vec<EndpointProbe> {
    vec![
        EndpointProbe::get("Health Check", "/api/health", false),
        EndpointProbe::get("API Info", "/api", false),
        EndpointProbe::get("List Users", "/api/users", true),
        EndpointProbe::get("Current User", "/api/users/me", true),
        EndpointProbe::get("List Products", "/api/products", true),
        EndpointProbe::get("Product Stats", "/api/products/stats", true),
        EndpointProbe::get("List Invoices", "/api/invoices", true),
        EndpointProbe::get("Invoice Stats", "/api/invoices/stats", true),
        EndpointProbe::get("List Customers", "/api/customers", true),
        EndpointProbe::get("List Suppliers", "/api/suppliers", true),
        EndpointProbe::get("Inventory", "/api/inventory", true),
        EndpointProbe::get("List Tasks", "/api/tasks", true),
        EndpointProbe::get("Notifications", "/api/notifications", true),
        EndpointProbe::get("Attendance", "/api/attendance", true),
        EndpointProbe::get("Dashboard", "/api/reports/dashboard", true),
    ]
}

pub fn db_probes(admin_email: &str) -> Vec<DbProbe> {
    vec![
        DbProbe::new(
            "Users table exists",
            "SELECT table_name FROM information_schema.tables \
             WHERE table_schema = current_schema() AND table_name = 'users'",
            DbExpectation::RowPresent,
        ),
        DbProbe::new(
            "Admin user exists",
            "SELECT id FROM users WHERE email = $1",
            DbExpectation::RowPresent,
        )
        .bind(admin_email),
        DbProbe::new(
            "Products table accessible",
            "SELECT COUNT(*) AS count FROM products",
            DbExpectation::Executes,
        ),
        DbProbe::new(
            "Invoices table accessible",
            "SELECT COUNT(*) AS count FROM invoices",
            DbExpectation::Executes,
        ),
        DbProbe::new(
            "Foreign keys declared",
            "SELECT COUNT(*) AS count FROM information_schema.table_constraints \
             WHERE constraint_type = 'FOREIGN KEY'",
            DbExpectation::Executes,
        ),
        DbProbe::new(
            "Audit logs writable",
            "INSERT INTO audit_logs (id, event_type, action, created_at) \
             VALUES (gen_random_uuid(), 'test', 'bot_test', NOW())",
            DbExpectation::Writes,
        ),
    ]
}

/// `INV-<yyyymm>-<4 digits>`.
pub fn is_invoice_number(candidate: &str, yyyymm: &str) -> bool {
    let Some(rest) = candidate.strip_prefix("INV-") else {
        return false;
    };
    let Some((period, seq)) = rest.split_once('-') else {
        return false;
    };
    period == yyyymm && seq.len() == 4 && seq.bytes().all(|b| b.is_ascii_digit())
}

fn invoice_number_format() -> bool {
    let today = Utc::now().date_naive();
    let period = format!("{}{:02}", today.year(), today.month());
    is_invoice_number(&format!("INV-{period}-0001"), &period)
}

fn price_calculation() -> bool {
    let subtotal = 100 * 5;
    subtotal - discount_amount(subtotal, 10) == 450
}

fn date_formatting() -> bool {
    NaiveDate::from_ymd_opt(2024, 1, 15)
        .map(|d| d.format("%Y-%m-%d").to_string() == "2024-01-15")
        .unwrap_or(false)
}

pub fn assertions() -> Vec<LogicAssertion> {
    vec![
        LogicAssertion {
            name: "Invoice number generation",
            check: invoice_number_format,
        },
        LogicAssertion {
            name: "Price calculation",
            check: price_calculation,
        },
        LogicAssertion {
            name: "Date formatting",
            check: date_formatting,
        },
    ]
}

/// Tables the ERP schema is expected to contain.
pub const EXPECTED_TABLES: &[&str] = &[
    "users",
    "roles",
    "permissions",
    "role_permissions",
    "customers",
    "suppliers",
    "products",
    "categories",
    "invoices",
    "invoice_items",
    "payments",
    "inventory_movements",
    "warehouses",
    "tasks",
    "task_comments",
    "notifications",
    "audit_logs",
    "departments",
    "positions",
    "attendance",
    "settings",
    "user_sessions",
];

/// Tables whose row counts are reported.
pub const MAIN_TABLES: &[&str] = &["users", "customers", "products", "invoices", "suppliers"];

/// Full endpoint sweep for the coverage runner.
pub fn coverage_endpoints() -> Vec<EndpointProbe> {
    let mut sweep = endpoints();
    sweep.retain(|p| p.path != "/api/reports/dashboard");
    sweep.extend([
        EndpointProbe::get("Customer Stats", "/api/customers/stats", true),
        EndpointProbe::get("Inventory Movements", "/api/inventory/movements", true),
        EndpointProbe::get("My Tasks", "/api/tasks/my-tasks", true),
        EndpointProbe::get("Unread Notifications", "/api/notifications/unread-count", true),
        EndpointProbe::get("Attendance Today", "/api/attendance/today", true),
        EndpointProbe::get("My Points", "/api/goals/my-points", true),
        EndpointProbe::get("Leaderboard", "/api/goals/leaderboard", true),
        EndpointProbe::get("Training Progress", "/api/training/my-progress", true),
        EndpointProbe::get("AI Health", "/api/ai/health", true),
        EndpointProbe::get("Dashboard", "/api/reports/dashboard", true),
        EndpointProbe::get("Sales Reports", "/api/reports/sales", true),
        EndpointProbe::get("Accounting Overview", "/api/accounting/overview", true),
        EndpointProbe::get("Receivables", "/api/accounting/receivables", true),
        EndpointProbe::get("Payables", "/api/accounting/payables", true),
        EndpointProbe::get("Warranty Claims", "/api/warranty/claims", true),
        EndpointProbe::get("Delivery", "/api/delivery", true),
        EndpointProbe::get("Audit Log", "/api/audit", true),
        EndpointProbe::get("Settings", "/api/settings", true),
    ]);
    sweep
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_default_assertion_holds() {
        for assertion in assertions() {
            assert!((assertion.check)(), "{} failed", assertion.name);
        }
    }

    #[test]
    fn invoice_number_pattern() {
        assert!(is_invoice_number("INV-202401-0001", "202401"));
        assert!(!is_invoice_number("INV-202401-001", "202401"));
        assert!(!is_invoice_number("INV-202402-0001", "202401"));
        assert!(!is_invoice_number("PUR-202401-0001", "202401"));
        assert!(!is_invoice_number("INV-202401-00a1", "202401"));
    }

    #[test]
    fn coverage_sweep_has_no_duplicate_paths() {
        let sweep = coverage_endpoints();
        let mut paths: Vec<&str> = sweep.iter().map(|p| p.path.as_str()).collect();
        paths.sort_unstable();
        let before = paths.len();
        paths.dedup();
        assert_eq!(before, paths.len());
    }
}
