use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use tracing::{info, instrument};
use uuid::Uuid;

use erpbot_core::records::{Fix, Suggestion};

use super::{AuditSink, PerformanceRecord};
use crate::db::{DbError, QueryExecutor, SqlValue, Statement};

/// DDL for the audit tables; every statement is idempotent.
pub const SCHEMA: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS bot_logs (
        id UUID PRIMARY KEY,
        action TEXT NOT NULL,
        data JSONB NOT NULL DEFAULT '{}'::jsonb,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )"#,
    r#"CREATE TABLE IF NOT EXISTS bot_suggestions (
        id UUID PRIMARY KEY,
        type TEXT NOT NULL,
        component TEXT NOT NULL,
        suggestion TEXT NOT NULL,
        priority TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'pending',
        applied_at TIMESTAMPTZ,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )"#,
    r#"CREATE TABLE IF NOT EXISTS bot_fixes (
        id UUID PRIMARY KEY,
        error_type TEXT NOT NULL,
        description TEXT NOT NULL,
        fix_applied TEXT NOT NULL,
        success BOOLEAN NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )"#,
    r#"CREATE TABLE IF NOT EXISTS performance_metrics (
        id UUID PRIMARY KEY,
        cpu_usage DOUBLE PRECISION NOT NULL,
        memory_usage DOUBLE PRECISION NOT NULL,
        db_query_time DOUBLE PRECISION NOT NULL,
        heap_used DOUBLE PRECISION NOT NULL,
        error_rate DOUBLE PRECISION NOT NULL,
        issues_count INTEGER NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )"#,
    "CREATE INDEX IF NOT EXISTS idx_performance_metrics_created_at ON performance_metrics (created_at)",
];

/// [`AuditSink`] writing to the agent's tables through a [`QueryExecutor`].
#[derive(Debug, Clone)]
pub struct SqlAuditSink<E> {
    db: E,
}

impl<E> SqlAuditSink<E> {
    pub fn new(db: E) -> Self {
        Self { db }
    }
}

#[async_trait]
impl<E> AuditSink for SqlAuditSink<E>
where
    E: QueryExecutor,
{
    #[instrument(skip(self), err)]
    async fn ensure_schema(&self) -> Result<(), DbError> {
        let statements = SCHEMA.iter().map(|ddl| Statement::new(*ddl)).collect();
        self.db.transaction(statements).await?;
        info!(tables = 4, "audit schema ensured");
        Ok(())
    }

    async fn log(&self, action: &str, data: &JsonValue) -> Result<(), DbError> {
        self.db
            .run(
                "INSERT INTO bot_logs (id, action, data) VALUES ($1, $2, $3)",
                &[Uuid::now_v7().into(), action.into(), data.clone().into()],
            )
            .await?;
        Ok(())
    }

    async fn record_fix(&self, fix: &Fix) -> Result<(), DbError> {
        self.db
            .run(
                "INSERT INTO bot_fixes (id, error_type, description, fix_applied, success) \
                 VALUES ($1, $2, $3, $4, $5)",
                &[
                    Uuid::now_v7().into(),
                    fix.rule.as_str().into(),
                    fix.description().into(),
                    fix.applied().into(),
                    fix.succeeded().into(),
                ],
            )
            .await?;
        Ok(())
    }

    async fn store_suggestion(&self, suggestion: &Suggestion) -> Result<(), DbError> {
        self.db
            .run(
                "INSERT INTO bot_suggestions (id, type, component, suggestion, priority, status, \
                 applied_at, created_at) VALUES ($1, $2, $3, $4, $5, $6, $7::timestamptz, $8) \
                 ON CONFLICT (id) DO UPDATE SET status = EXCLUDED.status, applied_at = EXCLUDED.applied_at",
                &[
                    suggestion.id.as_uuid().into(),
                    suggestion.kind.as_str().into(),
                    suggestion.component.as_str().into(),
                    suggestion.text.as_str().into(),
                    suggestion.priority.as_str().into(),
                    suggestion.status.as_str().into(),
                    suggestion.applied_at.into(),
                    suggestion.created_at.into(),
                ],
            )
            .await?;
        Ok(())
    }

    async fn record_metrics(&self, record: &PerformanceRecord) -> Result<(), DbError> {
        self.db
            .run(
                "INSERT INTO performance_metrics (id, cpu_usage, memory_usage, db_query_time, \
                 heap_used, error_rate, issues_count, created_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
                &[
                    Uuid::now_v7().into(),
                    record.cpu_usage.into(),
                    record.memory_usage.into(),
                    record.db_query_time.into(),
                    record.heap_used.into(),
                    record.error_rate.into(),
                    SqlValue::Int(i64::from(record.issues_count)),
                    record.created_at.into(),
                ],
            )
            .await?;
        Ok(())
    }

    async fn prune_metrics(&self, cutoff: DateTime<Utc>) -> Result<u64, DbError> {
        self.db
            .run(
                "DELETE FROM performance_metrics WHERE created_at < $1",
                &[cutoff.into()],
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::ScriptedQueryExecutor;
    use erpbot_core::records::Priority;
    use std::sync::Arc;

    #[tokio::test]
    async fn ensure_schema_runs_every_ddl_statement() {
        let db = Arc::new(ScriptedQueryExecutor::new());
        SqlAuditSink::new(db.clone()).ensure_schema().await.unwrap();
        assert_eq!(db.calls().len(), SCHEMA.len());
        assert!(db.calls().iter().all(|(sql, _)| sql.contains("IF NOT EXISTS")));
    }

    #[tokio::test]
    async fn suggestions_upsert_on_id() {
        let db = Arc::new(ScriptedQueryExecutor::new());
        let sink = SqlAuditSink::new(db.clone());
        let s = Suggestion::new("ux", "invoices", "paginate", Priority::Low);
        sink.store_suggestion(&s).await.unwrap();

        let (sql, args) = &db.calls()[0];
        assert!(sql.contains("ON CONFLICT (id)"));
        assert_eq!(args[5], SqlValue::from("pending"));
        assert_eq!(args[6], SqlValue::Null);
    }

    #[tokio::test]
    async fn missing_table_surfaces_as_missing_relation() {
        let db = Arc::new(ScriptedQueryExecutor::new());
        db.fail("INSERT INTO bot_logs", DbError::MissingRelation("bot_logs".into()));
        let err = SqlAuditSink::new(db)
            .log("bot_started", &serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(err.is_missing_relation());
    }
}
