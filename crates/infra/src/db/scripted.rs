//! In-memory [`QueryExecutor`] with canned responses (for tests/dev).
//!
//! Responses are matched by SQL substring; the most recently registered match
//! wins, so a test can override a default answer. Unmatched statements behave
//! like an empty database: `run` affects 0 rows, `get` returns `None`, `all`
//! returns no rows.

use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use super::{DbError, QueryExecutor, Row, SqlValue, Statement};

#[derive(Debug, Clone, PartialEq)]
pub enum ScriptedResponse {
    Rows(Vec<Row>),
    Affected(u64),
    Fail(DbError),
}

#[derive(Debug)]
struct Rule {
    pattern: String,
    response: ScriptedResponse,
    /// `None` answers forever.
    remaining: Option<usize>,
}

#[derive(Debug, Default)]
struct Script {
    rules: Vec<Rule>,
    calls: Vec<(String, Vec<SqlValue>)>,
}

#[derive(Debug, Default)]
pub struct ScriptedQueryExecutor {
    script: Mutex<Script>,
}

impl ScriptedQueryExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every statement containing `pattern`.
    pub fn on(&self, pattern: impl Into<String>, response: ScriptedResponse) -> &Self {
        self.push_rule(pattern.into(), response, None);
        self
    }

    /// Answer only the next `times` statements containing `pattern`.
    pub fn on_times(&self, pattern: impl Into<String>, times: usize, response: ScriptedResponse) -> &Self {
        self.push_rule(pattern.into(), response, Some(times));
        self
    }

    pub fn rows(&self, pattern: impl Into<String>, rows: Vec<Row>) -> &Self {
        self.on(pattern, ScriptedResponse::Rows(rows))
    }

    pub fn fail(&self, pattern: impl Into<String>, err: DbError) -> &Self {
        self.on(pattern, ScriptedResponse::Fail(err))
    }

    /// Every statement executed so far, in order.
    pub fn calls(&self) -> Vec<(String, Vec<SqlValue>)> {
        self.lock().calls.clone()
    }

    /// Number of executed statements containing `pattern`.
    pub fn count(&self, pattern: &str) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|(sql, _)| sql.contains(pattern))
            .count()
    }

    fn push_rule(&self, pattern: String, response: ScriptedResponse, remaining: Option<usize>) {
        self.lock().rules.push(Rule {
            pattern,
            response,
            remaining,
        });
    }

    fn lock(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn answer(&self, sql: &str, args: &[SqlValue]) -> Option<ScriptedResponse> {
        let mut script = self.lock();
        script.calls.push((sql.to_string(), args.to_vec()));

        let rule = script.rules.iter_mut().rev().find(|r| {
            sql.contains(r.pattern.as_str()) && r.remaining.is_none_or(|n| n > 0)
        })?;
        if let Some(n) = rule.remaining.as_mut() {
            *n -= 1;
        }
        Some(rule.response.clone())
    }

    fn affected(&self, sql: &str, args: &[SqlValue]) -> Result<u64, DbError> {
        match self.answer(sql, args) {
            Some(ScriptedResponse::Affected(n)) => Ok(n),
            Some(ScriptedResponse::Rows(rows)) => Ok(rows.len() as u64),
            Some(ScriptedResponse::Fail(e)) => Err(e),
            None => Ok(0),
        }
    }

    fn fetched(&self, sql: &str, args: &[SqlValue]) -> Result<Vec<Row>, DbError> {
        match self.answer(sql, args) {
            Some(ScriptedResponse::Rows(rows)) => Ok(rows),
            Some(ScriptedResponse::Affected(_)) | None => Ok(Vec::new()),
            Some(ScriptedResponse::Fail(e)) => Err(e),
        }
    }
}

#[async_trait]
impl QueryExecutor for ScriptedQueryExecutor {
    async fn run(&self, sql: &str, args: &[SqlValue]) -> Result<u64, DbError> {
        self.affected(sql, args)
    }

    async fn get(&self, sql: &str, args: &[SqlValue]) -> Result<Option<Row>, DbError> {
        Ok(self.fetched(sql, args)?.into_iter().next())
    }

    async fn all(&self, sql: &str, args: &[SqlValue]) -> Result<Vec<Row>, DbError> {
        self.fetched(sql, args)
    }

    async fn transaction(&self, statements: Vec<Statement>) -> Result<Vec<u64>, DbError> {
        let mut affected = Vec::with_capacity(statements.len());
        for (index, stmt) in statements.iter().enumerate() {
            let rows = self.affected(&stmt.sql, &stmt.args)?;
            if let Some(expected) = stmt.expect_affected {
                if rows != expected {
                    return Err(DbError::Conflict(format!(
                        "statement {index} affected {rows} rows, expected {expected}"
                    )));
                }
            }
            affected.push(rows);
        }
        Ok(affected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(v: serde_json::Value) -> Row {
        v.as_object().cloned().unwrap_or_default()
    }

    #[tokio::test]
    async fn unmatched_statements_look_like_an_empty_database() {
        let db = ScriptedQueryExecutor::new();
        assert_eq!(db.run("DELETE FROM x", &[]).await.unwrap(), 0);
        assert!(db.get("SELECT 1", &[]).await.unwrap().is_none());
        assert!(db.all("SELECT * FROM y", &[]).await.unwrap().is_empty());
        assert_eq!(db.calls().len(), 3);
    }

    #[tokio::test]
    async fn latest_rule_wins_and_limited_rules_expire() {
        let db = ScriptedQueryExecutor::new();
        db.rows("FROM products", vec![row(json!({"n": 1}))]);
        db.on_times(
            "FROM products",
            1,
            ScriptedResponse::Fail(DbError::MissingRelation("products".into())),
        );

        assert!(db.all("SELECT * FROM products", &[]).await.is_err());
        let rows = db.all("SELECT * FROM products", &[]).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(db.count("FROM products"), 2);
    }

    #[tokio::test]
    async fn guarded_transaction_fails_on_row_count_mismatch() {
        let db = ScriptedQueryExecutor::new();
        db.on("UPDATE products", ScriptedResponse::Affected(0));

        let err = db
            .transaction(vec![
                Statement::new("INSERT INTO invoices VALUES ($1)").bind(1i64),
                Statement::new("UPDATE products SET quantity = 0").expect_rows(1),
            ])
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Conflict(_)));
    }
}
