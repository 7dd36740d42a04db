use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use erpbot_infra::audit::PerformanceRecord;

use crate::thresholds::Issue;

/// Round to one decimal place.
pub(crate) fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemMetrics {
    /// Utilisation since the previous sample, all cores.
    pub cpu_usage: f64,
    pub memory_usage: f64,
    pub total_memory_mb: u64,
    pub available_memory_mb: u64,
    pub cpu_count: usize,
    pub uptime_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableCount {
    pub table: String,
    pub count: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DbMetrics {
    /// Round trip of one trivial query.
    pub query_time_ms: f64,
    pub table_count: u64,
    pub total_records: i64,
    /// Up to five main tables, largest first.
    pub largest_tables: Vec<TableCount>,
    pub index_count: i64,
    pub total_time_ms: f64,
    /// At least one query failed; its values are zero.
    pub degraded: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppMetrics {
    pub heap_used_mb: f64,
    pub heap_total_mb: f64,
    pub rss_mb: f64,
    pub process_uptime_secs: u64,
    pub requests_per_minute: f64,
    /// Critical audit events over all audit events in the trailing window, in percent.
    pub error_rate: f64,
}

impl AppMetrics {
    pub fn heap_ratio(&self) -> f64 {
        if self.heap_total_mb <= 0.0 {
            return 0.0;
        }
        self.heap_used_mb / self.heap_total_mb * 100.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSample {
    pub timestamp: DateTime<Utc>,
    pub system: SystemMetrics,
    pub db: DbMetrics,
    pub app: AppMetrics,
    pub issues: Vec<Issue>,
}

impl PerformanceSample {
    /// The `performance_metrics` row for this sample.
    pub fn to_record(&self) -> PerformanceRecord {
        PerformanceRecord {
            cpu_usage: self.system.cpu_usage,
            memory_usage: self.system.memory_usage,
            db_query_time: self.db.query_time_ms,
            heap_used: self.app.heap_used_mb,
            error_rate: self.app.error_rate,
            issues_count: self.issues.len() as u32,
            created_at: self.timestamp,
        }
    }
}
