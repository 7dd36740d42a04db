//! Persistence sink for the agent's own audit trail.
//!
//! Four tables: `bot_logs` (free-form action log), `bot_suggestions`,
//! `bot_fixes` and `performance_metrics`. Writes are best-effort from the
//! orchestrator's point of view; [`DbError::MissingRelation`] tells it to run
//! [`AuditSink::ensure_schema`] and retry once.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use erpbot_core::records::{Fix, Suggestion};

use crate::db::DbError;

mod in_memory;
mod sql;

pub use in_memory::InMemoryAuditSink;
pub use sql::{SqlAuditSink, SCHEMA};

/// One `bot_logs` row. `data` is intentionally free-form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub action: String,
    pub data: JsonValue,
    pub created_at: DateTime<Utc>,
}

/// One `performance_metrics` row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceRecord {
    pub cpu_usage: f64,
    pub memory_usage: f64,
    pub db_query_time: f64,
    pub heap_used: f64,
    pub error_rate: f64,
    pub issues_count: u32,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Idempotently create the four audit tables.
    async fn ensure_schema(&self) -> Result<(), DbError>;

    async fn log(&self, action: &str, data: &JsonValue) -> Result<(), DbError>;

    async fn record_fix(&self, fix: &Fix) -> Result<(), DbError>;

    /// Insert a suggestion, or update status/applied_at of a known one.
    async fn store_suggestion(&self, suggestion: &Suggestion) -> Result<(), DbError>;

    async fn record_metrics(&self, record: &PerformanceRecord) -> Result<(), DbError>;

    /// Delete metric rows created before `cutoff`; returns the rows removed.
    async fn prune_metrics(&self, cutoff: DateTime<Utc>) -> Result<u64, DbError>;
}

#[async_trait]
impl<A> AuditSink for Arc<A>
where
    A: AuditSink + ?Sized,
{
    async fn ensure_schema(&self) -> Result<(), DbError> {
        (**self).ensure_schema().await
    }

    async fn log(&self, action: &str, data: &JsonValue) -> Result<(), DbError> {
        (**self).log(action, data).await
    }

    async fn record_fix(&self, fix: &Fix) -> Result<(), DbError> {
        (**self).record_fix(fix).await
    }

    async fn store_suggestion(&self, suggestion: &Suggestion) -> Result<(), DbError> {
        (**self).store_suggestion(suggestion).await
    }

    async fn record_metrics(&self, record: &PerformanceRecord) -> Result<(), DbError> {
        (**self).record_metrics(record).await
    }

    async fn prune_metrics(&self, cutoff: DateTime<Utc>) -> Result<u64, DbError> {
        (**self).prune_metrics(cutoff).await
    }
}
