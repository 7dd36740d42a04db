//! In-memory audit sink (for tests/dev).

use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;

use erpbot_core::records::{Fix, Suggestion};

use super::{AuditEntry, AuditSink, PerformanceRecord};
use crate::db::DbError;

#[derive(Debug, Default)]
struct AuditState {
    schema_ready: bool,
    unavailable: bool,
    ensure_calls: usize,
    logs: Vec<AuditEntry>,
    fixes: Vec<Fix>,
    suggestions: Vec<Suggestion>,
    metrics: Vec<PerformanceRecord>,
}

#[derive(Debug)]
pub struct InMemoryAuditSink {
    state: Mutex<AuditState>,
}

impl Default for InMemoryAuditSink {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryAuditSink {
    pub fn new() -> Self {
        Self::with_state(AuditState {
            schema_ready: true,
            ..AuditState::default()
        })
    }

    /// Every write fails with `MissingRelation` until `ensure_schema` runs.
    pub fn without_schema() -> Self {
        Self::with_state(AuditState::default())
    }

    /// Every call fails with a connection error, including schema repair.
    pub fn unavailable() -> Self {
        Self::with_state(AuditState {
            unavailable: true,
            ..AuditState::default()
        })
    }

    fn with_state(state: AuditState) -> Self {
        Self {
            state: Mutex::new(state),
        }
    }

    fn lock(&self) -> MutexGuard<'_, AuditState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn writable(&self) -> Result<MutexGuard<'_, AuditState>, DbError> {
        let state = self.lock();
        if state.unavailable {
            return Err(DbError::Connection("audit store unavailable".into()));
        }
        if !state.schema_ready {
            return Err(DbError::MissingRelation("bot audit tables".into()));
        }
        Ok(state)
    }

    pub fn logs(&self) -> Vec<AuditEntry> {
        self.lock().logs.clone()
    }

    /// Logged action names, oldest first.
    pub fn actions(&self) -> Vec<String> {
        self.lock().logs.iter().map(|e| e.action.clone()).collect()
    }

    pub fn fixes(&self) -> Vec<Fix> {
        self.lock().fixes.clone()
    }

    pub fn suggestions(&self) -> Vec<Suggestion> {
        self.lock().suggestions.clone()
    }

    pub fn metrics(&self) -> Vec<PerformanceRecord> {
        self.lock().metrics.clone()
    }

    pub fn ensure_calls(&self) -> usize {
        self.lock().ensure_calls
    }
}

#[async_trait]
impl AuditSink for InMemoryAuditSink {
    async fn ensure_schema(&self) -> Result<(), DbError> {
        let mut state = self.lock();
        state.ensure_calls += 1;
        if state.unavailable {
            return Err(DbError::Connection("audit store unavailable".into()));
        }
        state.schema_ready = true;
        Ok(())
    }

    async fn log(&self, action: &str, data: &JsonValue) -> Result<(), DbError> {
        self.writable()?.logs.push(AuditEntry {
            action: action.to_string(),
            data: data.clone(),
            created_at: Utc::now(),
        });
        Ok(())
    }

    async fn record_fix(&self, fix: &Fix) -> Result<(), DbError> {
        self.writable()?.fixes.push(fix.clone());
        Ok(())
    }

    async fn store_suggestion(&self, suggestion: &Suggestion) -> Result<(), DbError> {
        let mut state = self.writable()?;
        match state.suggestions.iter_mut().find(|s| s.id == suggestion.id) {
            Some(existing) => {
                existing.status = suggestion.status;
                existing.applied_at = suggestion.applied_at;
            }
            None => state.suggestions.push(suggestion.clone()),
        }
        Ok(())
    }

    async fn record_metrics(&self, record: &PerformanceRecord) -> Result<(), DbError> {
        self.writable()?.metrics.push(record.clone());
        Ok(())
    }

    async fn prune_metrics(&self, cutoff: DateTime<Utc>) -> Result<u64, DbError> {
        let mut state = self.writable()?;
        let before = state.metrics.len();
        state.metrics.retain(|m| m.created_at >= cutoff);
        Ok((before - state.metrics.len()) as u64)
    }
}
