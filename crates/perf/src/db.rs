//! Database probes for a performance sample.
//!
//! Failures never abort a sample: each failing query leaves its own values at
//! zero and marks the section degraded, and the error rate falls back to 0.

use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use erpbot_infra::db::{column_i64, DbError, QueryExecutor};

use crate::metrics::{DbMetrics, TableCount};

const LARGEST_TABLES: usize = 5;
/// Trailing window for the error rate, in minutes.
const ACTIVITY_WINDOW_MINUTES: f64 = 5.0;

const TABLE_COUNT_SQL: &str = "SELECT COUNT(*) AS count FROM information_schema.tables \
     WHERE table_schema = 'public' AND table_type = 'BASE TABLE'";
const INDEX_COUNT_SQL: &str = "SELECT COUNT(*) AS count FROM pg_indexes WHERE schemaname = 'public'";
const ACTIVITY_SQL: &str = "SELECT COUNT(*) FILTER (WHERE severity = 'critical') AS critical, \
     COUNT(*) AS total FROM audit_logs \
     WHERE created_at > CURRENT_TIMESTAMP - INTERVAL '5 minutes'";

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}

fn is_identifier(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

async fn count(executor: &dyn QueryExecutor, sql: &str) -> Result<i64, DbError> {
    Ok(executor
        .get(sql, &[])
        .await?
        .and_then(|row| column_i64(&row, "count"))
        .unwrap_or(0))
}

/// Runs one query, logging and zeroing a failure.
async fn count_or_zero(executor: &dyn QueryExecutor, sql: &str, what: &str, degraded: &mut bool) -> i64 {
    match count(executor, sql).await {
        Ok(n) => n,
        Err(e) => {
            warn!(error = %e, query = what, "database metric unavailable");
            *degraded = true;
            0
        }
    }
}

/// Latency, table and index counts, and the sizes of `main_tables`.
pub async fn collect_db_metrics(executor: &dyn QueryExecutor, main_tables: &[String]) -> DbMetrics {
    let started = Instant::now();
    let mut degraded = false;

    let latency = Instant::now();
    let query_time_ms = match executor.get("SELECT 1 AS ok", &[]).await {
        Ok(_) => elapsed_ms(latency),
        Err(e) => {
            warn!(error = %e, query = "latency", "database metric unavailable");
            degraded = true;
            0.0
        }
    };

    let table_count = count_or_zero(executor, TABLE_COUNT_SQL, "table_count", &mut degraded)
        .await
        .max(0) as u64;

    let mut tables = Vec::new();
    for table in main_tables {
        if !is_identifier(table) {
            warn!(table = %table, "skipping table with an invalid name");
            continue;
        }
        // Missing tables are skipped.
        match count(executor, &format!("SELECT COUNT(*) AS count FROM {table}")).await {
            Ok(n) => tables.push(TableCount {
                table: table.clone(),
                count: n,
            }),
            Err(e) => debug!(table = %table, error = %e, "row count unavailable"),
        }
    }
    tables.sort_by(|a, b| b.count.cmp(&a.count));
    let total_records = tables.iter().map(|t| t.count).sum();
    tables.truncate(LARGEST_TABLES);

    let index_count = count_or_zero(executor, INDEX_COUNT_SQL, "index_count", &mut degraded).await;

    DbMetrics {
        query_time_ms,
        table_count,
        total_records,
        largest_tables: tables,
        index_count,
        total_time_ms: elapsed_ms(started),
        degraded,
    }
}

/// Audit-log activity over the trailing window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AppActivity {
    pub error_rate: f64,
    pub requests_per_minute: f64,
}

pub async fn collect_app_activity(executor: &dyn QueryExecutor) -> AppActivity {
    let row = match executor.get(ACTIVITY_SQL, &[]).await {
        Ok(Some(row)) => row,
        Ok(None) => return AppActivity::default(),
        Err(e) => {
            debug!(error = %e, "audit activity unavailable");
            return AppActivity::default();
        }
    };
    let critical = column_i64(&row, "critical").unwrap_or(0);
    let total = column_i64(&row, "total").unwrap_or(0);
    if total <= 0 {
        return AppActivity::default();
    }
    AppActivity {
        error_rate: critical as f64 / total as f64 * 100.0,
        requests_per_minute: total as f64 / ACTIVITY_WINDOW_MINUTES,
    }
}
