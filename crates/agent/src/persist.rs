//! Best-effort audit writes.
//!
//! A write that fails on a missing relation triggers one schema repair and one
//! retry. Whatever still fails is logged and dropped.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use tracing::{debug, warn};

use erpbot_core::records::{Fix, Suggestion};
use erpbot_infra::audit::{AuditSink, PerformanceRecord};
use erpbot_infra::db::DbError;

/// Action names written to `bot_logs`.
pub mod actions {
    pub const BOT_STARTED: &str = "bot_started";
    pub const BOT_STOPPED: &str = "bot_stopped";
    pub const BOT_ERROR: &str = "bot_error";
    pub const TEST_RESULTS: &str = "test_results";
    pub const DATA_GENERATED: &str = "data_generated";
    pub const FEATURE_TEST: &str = "feature_test";
}

#[derive(Debug, Clone)]
pub enum AuditWrite {
    Log { action: &'static str, data: JsonValue },
    Fix(Fix),
    Suggestion(Suggestion),
    Metrics(PerformanceRecord),
    Prune(DateTime<Utc>),
}

impl AuditWrite {
    pub fn log(action: &'static str, data: JsonValue) -> Self {
        AuditWrite::Log { action, data }
    }

    fn label(&self) -> &'static str {
        match self {
            AuditWrite::Log { action, .. } => *action,
            AuditWrite::Fix(_) => "bot_fixes",
            AuditWrite::Suggestion(_) => "bot_suggestions",
            AuditWrite::Metrics(_) => "performance_metrics",
            AuditWrite::Prune(_) => "performance_metrics_prune",
        }
    }
}

#[derive(Clone)]
pub struct AuditWriter {
    sink: Arc<dyn AuditSink>,
}

impl AuditWriter {
    pub fn new(sink: Arc<dyn AuditSink>) -> Self {
        Self { sink }
    }

    async fn apply(&self, write: &AuditWrite) -> Result<(), DbError> {
        match write {
            AuditWrite::Log { action, data } => self.sink.log(action, data).await,
            AuditWrite::Fix(fix) => self.sink.record_fix(fix).await,
            AuditWrite::Suggestion(s) => self.sink.store_suggestion(s).await,
            AuditWrite::Metrics(record) => self.sink.record_metrics(record).await,
            AuditWrite::Prune(cutoff) => self.sink.prune_metrics(*cutoff).await.map(|removed| {
                if removed > 0 {
                    debug!(removed, "pruned old performance samples");
                }
            }),
        }
    }

    /// `true` when the write landed.
    pub async fn write(&self, write: AuditWrite) -> bool {
        let err = match self.apply(&write).await {
            Ok(()) => return true,
            Err(e) => e,
        };
        if !err.is_missing_relation() {
            warn!(write = write.label(), error = %err, "audit write dropped");
            return false;
        }

        if let Err(repair) = self.sink.ensure_schema().await {
            warn!(write = write.label(), error = %repair, "audit schema repair failed");
            return false;
        }
        match self.apply(&write).await {
            Ok(()) => true,
            Err(e) => {
                warn!(write = write.label(), error = %e, "audit write dropped after schema repair");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use erpbot_infra::audit::InMemoryAuditSink;
    use serde_json::json;

    #[tokio::test]
    async fn missing_tables_are_created_once_and_the_write_retried() {
        let sink = Arc::new(InMemoryAuditSink::without_schema());
        let writer = AuditWriter::new(sink.clone());

        assert!(writer.write(AuditWrite::log(actions::BOT_STARTED, json!({}))).await);
        assert!(writer.write(AuditWrite::log(actions::BOT_STOPPED, json!({}))).await);
        assert_eq!(sink.actions(), vec!["bot_started", "bot_stopped"]);
        assert_eq!(sink.ensure_calls(), 1);
    }

    #[tokio::test]
    async fn unavailable_sink_is_swallowed() {
        let sink = Arc::new(InMemoryAuditSink::unavailable());
        let writer = AuditWriter::new(sink.clone());

        assert!(!writer.write(AuditWrite::log(actions::BOT_ERROR, json!({"x": 1}))).await);
        assert!(!writer.write(AuditWrite::Fix(Fix::new("negative_stock", 1, 1))).await);
        // Connection errors are not a schema problem.
        assert_eq!(sink.ensure_calls(), 0);
    }
}
