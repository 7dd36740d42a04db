//! Postgres-backed [`QueryExecutor`].
//!
//! `get`/`all` wrap the caller's SELECT as `SELECT row_to_json(q) FROM (<sql>) q`
//! so every row arrives as one JSON object regardless of column types.
//!
//! ## Error Mapping
//!
//! | SQLx error                         | SQLSTATE | DbError           |
//! |------------------------------------|----------|-------------------|
//! | Database (undefined table)         | `42P01`  | `MissingRelation` |
//! | Database (unique violation)        | `23505`  | `Conflict`        |
//! | Database (other)                   | any      | `Query`           |
//! | PoolClosed / PoolTimedOut / Io     | n/a      | `Connection`      |
//! | ColumnDecode / Decode              | n/a      | `Decode`          |

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use sqlx::postgres::{PgArguments, PgPoolOptions};
use sqlx::query::Query;
use sqlx::{PgPool, Postgres, Row as _};
use tracing::{debug, instrument};

use super::{DbError, QueryExecutor, Row, SqlValue, Statement};

#[derive(Debug, Clone)]
pub struct PgQueryExecutor {
    pool: PgPool,
}

impl PgQueryExecutor {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect a small pool; the agent issues a handful of queries per tick.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, DbError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn bind_all<'q>(
    mut query: Query<'q, Postgres, PgArguments>,
    args: &[SqlValue],
) -> Query<'q, Postgres, PgArguments> {
    for arg in args {
        query = match arg.clone() {
            SqlValue::Null => query.bind(None::<String>),
            SqlValue::Bool(v) => query.bind(v),
            SqlValue::Int(v) => query.bind(v),
            SqlValue::Float(v) => query.bind(v),
            SqlValue::Text(v) => query.bind(v),
            SqlValue::Json(v) => query.bind(v),
            SqlValue::Uuid(v) => query.bind(v),
            SqlValue::Timestamp(v) => query.bind(v),
        };
    }
    query
}

fn wrap_select(sql: &str) -> String {
    format!("SELECT row_to_json(q) AS row FROM ({}) q", sql.trim().trim_end_matches(';'))
}

fn into_row(value: JsonValue) -> Result<Row, DbError> {
    match value {
        JsonValue::Object(map) => Ok(map),
        other => Err(DbError::Decode(format!("expected a JSON object row, got {other}"))),
    }
}

#[async_trait]
impl QueryExecutor for PgQueryExecutor {
    #[instrument(skip(self, args), fields(operation = "run"), err)]
    async fn run(&self, sql: &str, args: &[SqlValue]) -> Result<u64, DbError> {
        let result = bind_all(sqlx::query(sql), args)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("run", e))?;
        Ok(result.rows_affected())
    }

    #[instrument(skip(self, args), fields(operation = "get"), err)]
    async fn get(&self, sql: &str, args: &[SqlValue]) -> Result<Option<Row>, DbError> {
        let wrapped = wrap_select(sql);
        let row = bind_all(sqlx::query(&wrapped), args)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("get", e))?;
        match row {
            Some(row) => {
                let value: JsonValue = row
                    .try_get("row")
                    .map_err(|e| map_sqlx_error("get", e))?;
                into_row(value).map(Some)
            }
            None => Ok(None),
        }
    }

    #[instrument(skip(self, args), fields(operation = "all"), err)]
    async fn all(&self, sql: &str, args: &[SqlValue]) -> Result<Vec<Row>, DbError> {
        let wrapped = wrap_select(sql);
        let rows = bind_all(sqlx::query(&wrapped), args)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("all", e))?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let value: JsonValue = row
                .try_get("row")
                .map_err(|e| map_sqlx_error("all", e))?;
            out.push(into_row(value)?);
        }
        Ok(out)
    }

    #[instrument(skip(self, statements), fields(operation = "transaction", statements = statements.len()), err)]
    async fn transaction(&self, statements: Vec<Statement>) -> Result<Vec<u64>, DbError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin", e))?;

        let mut affected = Vec::with_capacity(statements.len());
        for (index, stmt) in statements.iter().enumerate() {
            let result = bind_all(sqlx::query(&stmt.sql), &stmt.args)
                .execute(&mut *tx)
                .await;

            let rows = match result {
                Ok(r) => r.rows_affected(),
                Err(e) => {
                    tx.rollback()
                        .await
                        .map_err(|e| map_sqlx_error("rollback", e))?;
                    return Err(map_sqlx_error("transaction", e));
                }
            };

            if let Some(expected) = stmt.expect_affected {
                if rows != expected {
                    debug!(index, expected, rows, "guarded statement affected unexpected rows");
                    tx.rollback()
                        .await
                        .map_err(|e| map_sqlx_error("rollback", e))?;
                    return Err(DbError::Conflict(format!(
                        "statement {index} affected {rows} rows, expected {expected}"
                    )));
                }
            }
            affected.push(rows);
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit", e))?;
        Ok(affected)
    }
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> DbError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("42P01") => DbError::MissingRelation(msg),
                Some("23505") => DbError::Conflict(msg),
                _ => DbError::Query(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            DbError::Connection(format!("connection pool closed in {}", operation))
        }
        sqlx::Error::PoolTimedOut => {
            DbError::Connection(format!("connection pool timed out in {}", operation))
        }
        sqlx::Error::Io(e) => DbError::Connection(format!("io error in {}: {}", operation, e)),
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
            DbError::Decode(format!("decode error in {}: {}", operation, err))
        }
        _ => DbError::Query(format!("sqlx error in {}: {}", operation, err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_is_wrapped_for_json_rows() {
        assert_eq!(
            wrap_select("SELECT id, name FROM products LIMIT 5;"),
            "SELECT row_to_json(q) AS row FROM (SELECT id, name FROM products LIMIT 5) q"
        );
    }

    #[test]
    fn non_object_rows_are_decode_errors() {
        assert!(into_row(serde_json::json!([1, 2])).is_err());
        assert!(into_row(serde_json::json!({"a": 1})).is_ok());
    }
}
