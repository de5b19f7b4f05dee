//! PostgreSQL connection and the lazily connected [`Database`] handle.

use crate::builder::Statement;
use crate::config::{AppEnv, DatabaseConfig};
use crate::error::{DbError, DbResult};
use crate::executor::Executor;
use crate::record::Record;
use crate::sql::number_placeholders;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::OnceCell;
use tokio_postgres::NoTls;
use tokio_postgres::error::SqlState;
use tokio_postgres::types::ToSql;

const LASTVAL_SAVEPOINT: &str = "rollcall_lastval";
const LASTVAL_SQL: &str = "SELECT lastval()";

/// A single client connection with a connection-scoped transaction flag.
pub struct Connection {
    client: tokio_postgres::Client,
    app_env: AppEnv,
    in_transaction: AtomicBool,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("app_env", &self.app_env)
            .field("in_transaction", &self.in_transaction())
            .field("closed", &self.client.is_closed())
            .finish()
    }
}

impl Connection {
    /// Connect using `config` and spawn the driver task on the current runtime.
    ///
    /// Failure is a [`DbError::Connection`]. Nothing is retried.
    pub async fn connect(config: &DatabaseConfig) -> DbResult<Self> {
        let (client, connection) = config
            .to_pg_config()
            .connect(NoTls)
            .await
            .map_err(|e| DbError::Connection(e.to_string()))?;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!(target: "rollcall.sql", error = %e, "database connection failed");
            }
        });

        tracing::debug!(
            target: "rollcall.sql",
            host = %config.host,
            dbname = %config.dbname,
            app_env = config.app_env.as_str(),
            "connected"
        );
        Ok(Self::from_client(client, config.app_env))
    }

    /// Wrap an already connected client.
    pub fn from_client(client: tokio_postgres::Client, app_env: AppEnv) -> Self {
        Self {
            client,
            app_env,
            in_transaction: AtomicBool::new(false),
        }
    }

    pub fn client(&self) -> &tokio_postgres::Client {
        &self.client
    }

    pub fn app_env(&self) -> AppEnv {
        self.app_env
    }

    fn prepare(&self, statement: &Statement) -> DbResult<String> {
        statement.check()?;
        tracing::debug!(
            target: "rollcall.sql",
            sql = %statement.sql(),
            param_count = statement.params().len(),
            verb = statement.verb(),
            "statement"
        );
        Ok(number_placeholders(statement.sql()))
    }

    async fn batch(&self, sql: &str) -> DbResult<()> {
        tracing::debug!(target: "rollcall.sql", sql = sql, param_count = 0usize, "statement");
        self.client
            .batch_execute(sql)
            .await
            .map_err(|e| DbError::from_db_error(e, sql))
    }

    async fn lastval(&self) -> Result<i64, tokio_postgres::Error> {
        let row = self.client.query_one(LASTVAL_SQL, &[]).await?;
        row.try_get(0)
    }
}

/// No sequence used in this session yet means "no id", not a failure.
fn read_lastval(probe: Result<i64, tokio_postgres::Error>) -> DbResult<Option<i64>> {
    match probe {
        Ok(id) => Ok(Some(id)),
        Err(e) if e.code() == Some(&SqlState::OBJECT_NOT_IN_PREREQUISITE_STATE) => Ok(None),
        Err(e) => Err(DbError::from_db_error(e, LASTVAL_SQL)),
    }
}

impl Executor for Connection {
    async fn fetch_all(&self, statement: &Statement) -> DbResult<Vec<Record>> {
        let sql = self.prepare(statement)?;
        let params: Vec<&(dyn ToSql + Sync)> = statement
            .params()
            .iter()
            .map(|v| v as &(dyn ToSql + Sync))
            .collect();
        let rows = self
            .client
            .query(sql.as_str(), &params)
            .await
            .map_err(|e| DbError::from_db_error(e, statement.sql()))?;
        rows.iter().map(Record::from_pg_row).collect()
    }

    async fn execute(&self, statement: &Statement) -> DbResult<u64> {
        let sql = self.prepare(statement)?;
        let params: Vec<&(dyn ToSql + Sync)> = statement
            .params()
            .iter()
            .map(|v| v as &(dyn ToSql + Sync))
            .collect();
        self.client
            .execute(sql.as_str(), &params)
            .await
            .map_err(|e| DbError::from_db_error(e, statement.sql()))
    }

    async fn begin_transaction(&self) -> DbResult<()> {
        if self
            .in_transaction
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(DbError::Transaction("already in transaction".to_string()));
        }
        if let Err(e) = self.batch("BEGIN").await {
            self.in_transaction.store(false, Ordering::SeqCst);
            return Err(e);
        }
        Ok(())
    }

    async fn commit(&self) -> DbResult<()> {
        if self
            .in_transaction
            .compare_exchange(true, false, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(DbError::Transaction("no active transaction".to_string()));
        }
        self.batch("COMMIT").await
    }

    async fn roll_back(&self) -> DbResult<()> {
        if self
            .in_transaction
            .compare_exchange(true, false, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(DbError::Transaction("no active transaction".to_string()));
        }
        self.batch("ROLLBACK").await
    }

    fn in_transaction(&self) -> bool {
        self.in_transaction.load(Ordering::SeqCst)
    }

    /// Runs `SELECT lastval()`. Inside a transaction the probe runs under a
    /// savepoint, rolled back whenever the probe errored, so a session without
    /// generated ids leaves the transaction usable.
    async fn last_insert_id(&self) -> DbResult<Option<i64>> {
        if !self.in_transaction() {
            return read_lastval(self.lastval().await);
        }

        self.batch(&format!("SAVEPOINT {LASTVAL_SAVEPOINT}")).await?;
        let probe = self.lastval().await;
        if probe.is_err() {
            self.batch(&format!("ROLLBACK TO SAVEPOINT {LASTVAL_SAVEPOINT}"))
                .await?;
        }
        self.batch(&format!("RELEASE SAVEPOINT {LASTVAL_SAVEPOINT}"))
            .await?;
        read_lastval(probe)
    }

    fn error_mode(&self) -> AppEnv {
        self.app_env
    }
}

/// Configuration plus one lazily established [`Connection`].
///
/// ```ignore
/// let db = Database::from_env()?;
/// let conn = db.connection().await?;
/// let students = conn.table("students").where_("class_id", 3).get().await?;
/// ```
#[derive(Debug)]
pub struct Database {
    config: DatabaseConfig,
    connection: OnceCell<Connection>,
}

impl Database {
    pub fn new(config: DatabaseConfig) -> Self {
        Self {
            config,
            connection: OnceCell::new(),
        }
    }

    /// [`DatabaseConfig::from_env`] followed by [`Database::new`].
    pub fn from_env() -> DbResult<Self> {
        DatabaseConfig::from_env().map(Self::new)
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    /// The shared connection, established on first use.
    pub async fn connection(&self) -> DbResult<&Connection> {
        self.connection
            .get_or_try_init(|| Connection::connect(&self.config))
            .await
    }

    pub fn is_connected(&self) -> bool {
        self.connection.initialized()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn database_starts_disconnected() {
        let db = Database::new(DatabaseConfig::new().dbname("school_test"));
        assert!(!db.is_connected());
        assert_eq!(db.config().dbname, "school_test");
    }

    #[tokio::test]
    async fn unreachable_server_is_a_connection_error() {
        // Port 1 is reserved and never runs PostgreSQL.
        let config = DatabaseConfig::new().host("127.0.0.1").port(1);
        let db = Database::new(config);
        let err = db.connection().await.unwrap_err();
        assert!(matches!(err, DbError::Connection(_)));
        assert!(!db.is_connected());
    }
}
