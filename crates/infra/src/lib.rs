//! Infrastructure layer: data access, HTTP client, ERP store and audit sink.
//!
//! Every external collaborator of the agent sits behind a trait here, with a
//! production adapter (Postgres / reqwest) and an in-memory implementation for
//! tests and local runs.

pub mod audit;
pub mod db;
pub mod erp;
pub mod http;

pub use audit::{AuditEntry, AuditSink, InMemoryAuditSink, PerformanceRecord, SqlAuditSink};
pub use db::{DbError, PgQueryExecutor, QueryExecutor, Row, ScriptedQueryExecutor, SqlValue, Statement};
pub use erp::{ErpStore, InMemoryErpStore, PurchaseDraft, SqlErpStore, StoreError};
pub use http::{
    ApiClient, ApiRequest, ApiResponse, HttpError, HttpMethod, ReqwestApiClient, StaticApiClient,
};
