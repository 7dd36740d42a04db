//! Asynchronous data-access contract.
//!
//! The agent talks to the ERP database through three primitives, `run` (mutate),
//! `get` (one row) and `all` (many rows), plus an atomic `transaction` over a list
//! of statements. Rows come back as JSON objects so callers decode them into typed
//! records with serde instead of reading columns by hand.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use thiserror::Error;
use uuid::Uuid;

mod postgres;
mod scripted;

pub use postgres::PgQueryExecutor;
pub use scripted::{ScriptedQueryExecutor, ScriptedResponse};

/// One result row, keyed by column name.
pub type Row = serde_json::Map<String, JsonValue>;

/// A bind parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Json(JsonValue),
    Uuid(Uuid),
    Timestamp(DateTime<Utc>),
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        SqlValue::Bool(v)
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::Int(v)
    }
}

impl From<i32> for SqlValue {
    fn from(v: i32) -> Self {
        SqlValue::Int(i64::from(v))
    }
}

impl From<u32> for SqlValue {
    fn from(v: u32) -> Self {
        SqlValue::Int(i64::from(v))
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        SqlValue::Float(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl From<JsonValue> for SqlValue {
    fn from(v: JsonValue) -> Self {
        SqlValue::Json(v)
    }
}

impl From<Uuid> for SqlValue {
    fn from(v: Uuid) -> Self {
        SqlValue::Uuid(v)
    }
}

impl From<DateTime<Utc>> for SqlValue {
    fn from(v: DateTime<Utc>) -> Self {
        SqlValue::Timestamp(v)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(SqlValue::Null, Into::into)
    }
}

/// A statement inside a [`QueryExecutor::transaction`].
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub args: Vec<SqlValue>,
    /// When set, a different affected-row count aborts the whole transaction
    /// with [`DbError::Conflict`].
    pub expect_affected: Option<u64>,
}

impl Statement {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            args: Vec::new(),
            expect_affected: None,
        }
    }

    pub fn bind(mut self, value: impl Into<SqlValue>) -> Self {
        self.args.push(value.into());
        self
    }

    pub fn expect_rows(mut self, n: u64) -> Self {
        self.expect_affected = Some(n);
        self
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DbError {
    /// The referenced table/view does not exist (SQLSTATE 42P01).
    #[error("missing relation: {0}")]
    MissingRelation(String),

    /// A guarded write did not affect the expected rows, or a unique key clashed.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("query failed: {0}")]
    Query(String),

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("decode failed: {0}")]
    Decode(String),
}

impl DbError {
    pub fn is_missing_relation(&self) -> bool {
        matches!(self, DbError::MissingRelation(_))
    }
}

#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Execute a mutation, returning the affected-row count.
    async fn run(&self, sql: &str, args: &[SqlValue]) -> Result<u64, DbError>;

    /// Fetch at most one row.
    async fn get(&self, sql: &str, args: &[SqlValue]) -> Result<Option<Row>, DbError>;

    /// Fetch every row.
    async fn all(&self, sql: &str, args: &[SqlValue]) -> Result<Vec<Row>, DbError>;

    /// Execute statements atomically; returns the affected-row count of each.
    async fn transaction(&self, statements: Vec<Statement>) -> Result<Vec<u64>, DbError>;
}

#[async_trait]
impl<E> QueryExecutor for Arc<E>
where
    E: QueryExecutor + ?Sized,
{
    async fn run(&self, sql: &str, args: &[SqlValue]) -> Result<u64, DbError> {
        (**self).run(sql, args).await
    }

    async fn get(&self, sql: &str, args: &[SqlValue]) -> Result<Option<Row>, DbError> {
        (**self).get(sql, args).await
    }

    async fn all(&self, sql: &str, args: &[SqlValue]) -> Result<Vec<Row>, DbError> {
        (**self).all(sql, args).await
    }

    async fn transaction(&self, statements: Vec<Statement>) -> Result<Vec<u64>, DbError> {
        (**self).transaction(statements).await
    }
}

/// Decode a row into a typed record.
pub fn decode_row<T: DeserializeOwned>(row: Row) -> Result<T, DbError> {
    serde_json::from_value(JsonValue::Object(row)).map_err(|e| DbError::Decode(e.to_string()))
}

pub fn decode_rows<T: DeserializeOwned>(rows: Vec<Row>) -> Result<Vec<T>, DbError> {
    rows.into_iter().map(decode_row).collect()
}

/// Integer column, accepting JSON numbers and numeric strings (Postgres
/// `NUMERIC`/`BIGINT` may serialize either way).
pub fn column_i64(row: &Row, column: &str) -> Option<i64> {
    match row.get(column)? {
        JsonValue::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.round() as i64)),
        JsonValue::String(s) => s.parse::<i64>().ok().or_else(|| s.parse::<f64>().ok().map(|f| f.round() as i64)),
        _ => None,
    }
}

pub fn column_f64(row: &Row, column: &str) -> Option<f64> {
    match row.get(column)? {
        JsonValue::Number(n) => n.as_f64(),
        JsonValue::String(s) => s.parse::<f64>().ok(),
        _ => None,
    }
}

pub fn column_str<'r>(row: &'r Row, column: &str) -> Option<&'r str> {
    row.get(column)?.as_str()
}

/// Parse a timestamp as rendered by `row_to_json` for both `timestamptz` and
/// plain `timestamp` columns (the latter is read as UTC).
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    // Postgres renders `+00` rather than `+00:00` for whole-hour offsets.
    if let Ok(ts) = DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f%#z") {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    fn row(value: JsonValue) -> Row {
        match value {
            JsonValue::Object(map) => map,
            _ => Row::new(),
        }
    }

    #[test]
    fn numeric_columns_accept_strings_and_numbers() {
        let r = row(json!({"a": 5, "b": "12", "c": "3.6", "d": 2.5, "e": null}));
        assert_eq!(column_i64(&r, "a"), Some(5));
        assert_eq!(column_i64(&r, "b"), Some(12));
        assert_eq!(column_i64(&r, "c"), Some(4));
        assert_eq!(column_f64(&r, "d"), Some(2.5));
        assert_eq!(column_i64(&r, "e"), None);
        assert_eq!(column_i64(&r, "missing"), None);
    }

    #[test]
    fn decodes_typed_rows() {
        #[derive(Debug, Deserialize)]
        struct Count {
            count: i64,
        }
        let decoded: Count = decode_row(row(json!({"count": 7}))).unwrap();
        assert_eq!(decoded.count, 7);

        let err = decode_row::<Count>(row(json!({"count": "x"}))).unwrap_err();
        assert!(matches!(err, DbError::Decode(_)));
    }

    #[test]
    fn parses_postgres_timestamp_renderings() {
        assert!(parse_timestamp("2024-01-15T10:30:00.123456+00:00").is_some());
        assert!(parse_timestamp("2024-01-15T10:30:00.123456+00").is_some());
        assert!(parse_timestamp("2024-01-15T10:30:00").is_some());
        assert!(parse_timestamp("15/01/2024").is_none());
    }

    #[test]
    fn statement_builder_collects_binds() {
        let stmt = Statement::new("UPDATE products SET quantity = quantity - $1 WHERE id = $2")
            .bind(3i64)
            .bind(Uuid::nil())
            .expect_rows(1);
        assert_eq!(stmt.args, vec![SqlValue::Int(3), SqlValue::Uuid(Uuid::nil())]);
        assert_eq!(stmt.expect_affected, Some(1));
        assert_eq!(SqlValue::from(None::<i64>), SqlValue::Null);
    }
}
