//! The seam between builders and the database.

use crate::builder::{QueryBuilder, Statement};
use crate::config::AppEnv;
use crate::error::{DbError, DbResult};
use crate::record::Record;

/// Something that can run rendered statements and hold a transaction.
///
/// [`Connection`](crate::Connection) is the production implementation. Builders and
/// the validator only depend on this trait, so tests can substitute an in-memory
/// fake and callers can pass either a connection or a wrapper around one.
///
/// Implementations return failures as they happen ([`DbError::Query`] with the
/// SQL). The [`error_mode`](Self::error_mode) is applied once, by
/// [`QueryBuilder`] calls and the [`transaction!`](crate::transaction) macro.
pub trait Executor: Send + Sync {
    /// Run a statement and decode every returned row.
    fn fetch_all(
        &self,
        statement: &Statement,
    ) -> impl std::future::Future<Output = DbResult<Vec<Record>>> + Send;

    /// Run a statement and return the number of affected rows.
    fn execute(
        &self,
        statement: &Statement,
    ) -> impl std::future::Future<Output = DbResult<u64>> + Send;

    /// Open a transaction. Fails with [`DbError::Transaction`] if one is already open.
    fn begin_transaction(&self) -> impl std::future::Future<Output = DbResult<()>> + Send;

    /// Commit the open transaction. Fails with [`DbError::Transaction`] if none is open.
    fn commit(&self) -> impl std::future::Future<Output = DbResult<()>> + Send;

    /// Roll back the open transaction. Fails with [`DbError::Transaction`] if none is open.
    fn roll_back(&self) -> impl std::future::Future<Output = DbResult<()>> + Send;

    fn in_transaction(&self) -> bool;

    /// The most recent generated id in this session, `None` if nothing was generated yet.
    fn last_insert_id(&self) -> impl std::future::Future<Output = DbResult<Option<i64>>> + Send;

    /// How statement failures are surfaced to callers.
    fn error_mode(&self) -> AppEnv {
        AppEnv::Development
    }

    /// Start a builder chain on `name`.
    fn table(&self, name: impl Into<String>) -> QueryBuilder<'_, Self>
    where
        Self: Sized,
    {
        QueryBuilder::new(self).table(name)
    }
}

/// Apply the error mode to a failure.
///
/// In production a [`DbError::Query`] or [`DbError::Bind`] is logged with its SQL
/// and replaced by [`DbError::QueryFailed`]. Every other error passes through
/// unchanged.
pub(crate) fn surface(mode: AppEnv, err: DbError) -> DbError {
    match err {
        DbError::Bind { sql, message } if mode.is_production() => {
            tracing::error!(target: "rollcall.sql", sql = %sql, "{message}");
            DbError::QueryFailed { code: None }
        }
        DbError::Query { sql, message, code } if mode.is_production() => {
            tracing::error!(
                target: "rollcall.sql",
                sql = %sql,
                sqlstate = code.as_deref().unwrap_or(""),
                "{message}"
            );
            DbError::QueryFailed { code }
        }
        DbError::Query { ref sql, ref message, .. } | DbError::Bind { ref sql, ref message } => {
            tracing::debug!(target: "rollcall.sql", sql = %sql, "{message}");
            err
        }
        other => other,
    }
}

/// An executor with no database behind it.
///
/// Rendering works as usual; every round trip fails with [`DbError::Connection`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Offline;

fn offline() -> DbError {
    DbError::Connection("no database attached".to_string())
}

impl Executor for Offline {
    async fn fetch_all(&self, _statement: &Statement) -> DbResult<Vec<Record>> {
        Err(offline())
    }

    async fn execute(&self, _statement: &Statement) -> DbResult<u64> {
        Err(offline())
    }

    async fn begin_transaction(&self) -> DbResult<()> {
        Err(offline())
    }

    async fn commit(&self) -> DbResult<()> {
        Err(offline())
    }

    async fn roll_back(&self) -> DbResult<()> {
        Err(offline())
    }

    fn in_transaction(&self) -> bool {
        false
    }

    async fn last_insert_id(&self) -> DbResult<Option<i64>> {
        Err(offline())
    }
}
