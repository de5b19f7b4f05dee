//! In-memory executor shared by the integration tests.
#![allow(dead_code)]

use rollcall::{AppEnv, DbError, DbResult, Executor, Record, Statement, Value};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

type CountFn = Box<dyn Fn(&Statement) -> i64 + Send + Sync>;

/// Records every statement and answers `COUNT(*)` queries from a closure.
///
/// Transaction calls follow the same rules as a real connection: nested
/// `begin_transaction` and `commit`/`roll_back` without a transaction fail.
pub struct RecordingExecutor {
    statements: Mutex<Vec<Statement>>,
    events: Mutex<Vec<&'static str>>,
    count: CountFn,
    fail_queries: bool,
    fail_rollback: bool,
    fail_commit: bool,
    integer_keys: bool,
    app_env: AppEnv,
    in_transaction: AtomicBool,
    last_id: AtomicI64,
}

impl Default for RecordingExecutor {
    fn default() -> Self {
        Self {
            statements: Mutex::new(Vec::new()),
            events: Mutex::new(Vec::new()),
            count: Box::new(|_| 0),
            fail_queries: false,
            fail_rollback: false,
            fail_commit: false,
            integer_keys: false,
            app_env: AppEnv::Development,
            in_transaction: AtomicBool::new(false),
            last_id: AtomicI64::new(0),
        }
    }
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_count(self, count: i64) -> Self {
        self.with_count_fn(move |_| count)
    }

    pub fn with_count_fn(mut self, count: impl Fn(&Statement) -> i64 + Send + Sync + 'static) -> Self {
        self.count = Box::new(count);
        self
    }

    /// Every statement fails like a missing table would.
    pub fn failing(mut self) -> Self {
        self.fail_queries = true;
        self
    }

    pub fn failing_rollback(mut self) -> Self {
        self.fail_rollback = true;
        self
    }

    /// COMMIT is rejected by the server, as after a deferred constraint failure.
    pub fn failing_commit(mut self) -> Self {
        self.fail_commit = true;
        self
    }

    /// Every placeholder targets an integer column: text that is not a number
    /// cannot be bound.
    pub fn integer_keys(mut self) -> Self {
        self.integer_keys = true;
        self
    }

    pub fn production(mut self) -> Self {
        self.app_env = AppEnv::Production;
        self
    }

    pub fn statements(&self) -> Vec<Statement> {
        self.statements.lock().unwrap().clone()
    }

    pub fn sql(&self) -> Vec<String> {
        self.statements()
            .iter()
            .map(|s| s.sql().to_string())
            .collect()
    }

    pub fn events(&self) -> Vec<&'static str> {
        self.events.lock().unwrap().clone()
    }

    fn record(&self, statement: &Statement) -> DbResult<()> {
        statement.check()?;
        self.statements.lock().unwrap().push(statement.clone());
        if self.integer_keys {
            let bad = statement.params().iter().find(|value| {
                value
                    .as_str()
                    .is_some_and(|text| text.trim().parse::<i64>().is_err())
            });
            if let Some(value) = bad {
                return Err(DbError::Bind {
                    sql: statement.sql().to_string(),
                    message: format!("cannot bind text '{value}' to int4"),
                });
            }
        }
        if self.fail_queries {
            return Err(DbError::Query {
                sql: statement.sql().to_string(),
                message: "relation does not exist".to_string(),
                code: Some("42P01".to_string()),
            });
        }
        Ok(())
    }

    fn event(&self, name: &'static str) {
        self.events.lock().unwrap().push(name);
    }
}

impl Executor for RecordingExecutor {
    async fn fetch_all(&self, statement: &Statement) -> DbResult<Vec<Record>> {
        self.record(statement)?;
        if statement.sql().starts_with("SELECT COUNT(*)") {
            let count = (self.count)(statement);
            return Ok(vec![Record::from_pairs([("count", Value::Int(count))])]);
        }
        Ok(Vec::new())
    }

    async fn execute(&self, statement: &Statement) -> DbResult<u64> {
        self.record(statement)?;
        if statement.verb() == "INSERT" {
            self.last_id.fetch_add(1, Ordering::SeqCst);
        }
        Ok(1)
    }

    async fn begin_transaction(&self) -> DbResult<()> {
        if self.in_transaction.swap(true, Ordering::SeqCst) {
            return Err(DbError::Transaction("already in transaction".to_string()));
        }
        self.event("BEGIN");
        Ok(())
    }

    async fn commit(&self) -> DbResult<()> {
        if !self.in_transaction.swap(false, Ordering::SeqCst) {
            return Err(DbError::Transaction("no active transaction".to_string()));
        }
        self.event("COMMIT");
        if self.fail_commit {
            return Err(DbError::Query {
                sql: "COMMIT".to_string(),
                message: "deferred constraint violated".to_string(),
                code: Some("23503".to_string()),
            });
        }
        Ok(())
    }

    async fn roll_back(&self) -> DbResult<()> {
        if !self.in_transaction.swap(false, Ordering::SeqCst) {
            return Err(DbError::Transaction("no active transaction".to_string()));
        }
        self.event("ROLLBACK");
        if self.fail_rollback {
            return Err(DbError::Connection("connection reset".to_string()));
        }
        Ok(())
    }

    fn in_transaction(&self) -> bool {
        self.in_transaction.load(Ordering::SeqCst)
    }

    async fn last_insert_id(&self) -> DbResult<Option<i64>> {
        let id = self.last_id.load(Ordering::SeqCst);
        Ok((id > 0).then_some(id))
    }

    fn error_mode(&self) -> AppEnv {
        self.app_env
    }
}
