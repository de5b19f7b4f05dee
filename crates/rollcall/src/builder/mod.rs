//! Fluent SQL query builder.
//!
//! # Usage
//!
//! ```ignore
//! use rollcall::{Direction, Executor, Op};
//!
//! // SELECT with a join and ordering
//! let rows = conn
//!     .table("students")
//!     .select("students.id, users.name")
//!     .inner_join("users", "users.id", Op::Eq, "students.user_id")
//!     .where_("students.class_id", 4)
//!     .order_by("users.name", Direction::Asc)
//!     .get()
//!     .await?;
//!
//! // INSERT
//! conn.table("users")
//!     .insert([("name", "Ada"), ("email", "ada@example.com")])
//!     .await?;
//!
//! // UPDATE: SET values are bound before the WHERE value.
//! conn.table("users")
//!     .where_("id", 7)
//!     .update([("status", "inactive")])
//!     .execute()
//!     .await?;
//! ```
//!
//! Chain methods consume the builder. Terminal calls borrow it, so a chain can be
//! rendered or executed more than once.
//!
//! Predicates follow SQL precedence: `where_(a).or_where(b).and_where(c)` renders
//! `a OR b AND c`. Use [`QueryBuilder::where_any`] for a parenthesised OR group.

mod clause;
mod state;

#[cfg(test)]
mod tests;

pub use clause::{Direction, JoinKind, Op};
pub use state::Statement;

use crate::error::{DbError, DbResult};
use crate::executor::{Executor, surface};
use crate::record::{FromRecord, Record};
use crate::value::Value;
use clause::{Condition, Connector, Join, Predicate, Verb};
use state::QueryState;
use std::fmt;

/// Accumulates one statement against an [`Executor`].
pub struct QueryBuilder<'e, E: Executor> {
    executor: &'e E,
    state: QueryState,
}

impl<E: Executor> Clone for QueryBuilder<'_, E> {
    fn clone(&self) -> Self {
        Self {
            executor: self.executor,
            state: self.state.clone(),
        }
    }
}

impl<E: Executor> fmt::Debug for QueryBuilder<'_, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryBuilder")
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

fn pairs<K, V>(data: impl IntoIterator<Item = (K, V)>) -> Vec<(String, Value)>
where
    K: Into<String>,
    V: Into<Value>,
{
    data.into_iter().map(|(k, v)| (k.into(), v.into())).collect()
}

impl<'e, E: Executor> QueryBuilder<'e, E> {
    pub fn new(executor: &'e E) -> Self {
        Self {
            executor,
            state: QueryState::default(),
        }
    }

    pub fn executor(&self) -> &'e E {
        self.executor
    }

    // ==================== Target & verb ====================

    /// Set or replace the target table.
    pub fn table(mut self, name: impl Into<String>) -> Self {
        self.state.table = Some(name.into());
        self
    }

    /// SELECT the given column list (`"id, name"`). Defaults to `*`.
    pub fn select(mut self, columns: impl Into<String>) -> Self {
        self.state.verb = Some(Verb::Select(columns.into()));
        self
    }

    /// UPDATE with `SET col = ?` for every pair, in iteration order.
    pub fn update<K, V>(mut self, data: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        self.state.verb = Some(Verb::Update(pairs(data)));
        self
    }

    /// DELETE. Without a predicate, rendering fails unless [`allow_delete_all`](Self::allow_delete_all) is set.
    pub fn delete(mut self) -> Self {
        self.state.verb = Some(Verb::Delete);
        self
    }

    pub fn allow_delete_all(mut self) -> Self {
        self.state.allow_delete_all = true;
        self
    }

    /// INSERT the given pairs. Use [`execute`](Self::execute) to run it, or call
    /// [`insert`](Self::insert) directly.
    pub fn values<K, V>(mut self, data: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        self.state.verb = Some(Verb::Insert(pairs(data)));
        self
    }

    // ==================== WHERE ====================

    fn push_where(mut self, connector: Connector, condition: Condition) -> Self {
        self.state.wheres.push(Predicate {
            connector,
            condition,
        });
        self
    }

    /// `column = ?`. A second call on the same chain is joined with AND.
    pub fn where_(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.where_op(column, Op::Eq, value)
    }

    pub fn where_op(self, column: impl Into<String>, op: Op, value: impl Into<Value>) -> Self {
        self.and_where_op(column, op, value)
    }

    pub fn and_where(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.and_where_op(column, Op::Eq, value)
    }

    pub fn and_where_op(self, column: impl Into<String>, op: Op, value: impl Into<Value>) -> Self {
        self.push_where(
            Connector::And,
            Condition::Compare {
                column: column.into(),
                op,
                value: value.into(),
            },
        )
    }

    /// `OR column = ?`, or a plain predicate when none exists yet.
    pub fn or_where(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.or_where_op(column, Op::Eq, value)
    }

    pub fn or_where_op(self, column: impl Into<String>, op: Op, value: impl Into<Value>) -> Self {
        self.push_where(
            Connector::Or,
            Condition::Compare {
                column: column.into(),
                op,
                value: value.into(),
            },
        )
    }

    pub fn where_null(self, column: impl Into<String>) -> Self {
        self.push_where(
            Connector::And,
            Condition::Null {
                column: column.into(),
                negated: false,
            },
        )
    }

    pub fn where_not_null(self, column: impl Into<String>) -> Self {
        self.push_where(
            Connector::And,
            Condition::Null {
                column: column.into(),
                negated: true,
            },
        )
    }

    /// `column IN (?, ...)`. An empty list matches nothing.
    pub fn where_in<V: Into<Value>>(
        self,
        column: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        self.push_where(
            Connector::And,
            Condition::In {
                column: column.into(),
                values: values.into_iter().map(Into::into).collect(),
            },
        )
    }

    /// `(c1 op ? OR c2 op ? ...)` with `value` bound once per column.
    ///
    /// ```ignore
    /// conn.table("students")
    ///     .where_any(&["first_name", "last_name", "admission_no"], Op::Ilike, format!("%{q}%"))
    /// ```
    pub fn where_any(self, columns: &[&str], op: Op, value: impl Into<Value>) -> Self {
        self.push_where(
            Connector::And,
            Condition::Any {
                columns: columns.iter().map(|c| c.to_string()).collect(),
                op,
                value: value.into(),
            },
        )
    }

    // ==================== JOIN ====================

    /// `<KIND> JOIN table ON left op right`.
    pub fn join(
        mut self,
        table: impl Into<String>,
        left: impl Into<String>,
        op: Op,
        right: impl Into<String>,
        kind: JoinKind,
    ) -> Self {
        self.state.joins.push(Join {
            kind,
            table: table.into(),
            left: left.into(),
            op,
            right: right.into(),
        });
        self
    }

    pub fn inner_join(
        self,
        table: impl Into<String>,
        left: impl Into<String>,
        op: Op,
        right: impl Into<String>,
    ) -> Self {
        self.join(table, left, op, right, JoinKind::Inner)
    }

    pub fn left_join(
        self,
        table: impl Into<String>,
        left: impl Into<String>,
        op: Op,
        right: impl Into<String>,
    ) -> Self {
        self.join(table, left, op, right, JoinKind::Left)
    }

    pub fn right_join(
        self,
        table: impl Into<String>,
        left: impl Into<String>,
        op: Op,
        right: impl Into<String>,
    ) -> Self {
        self.join(table, left, op, right, JoinKind::Right)
    }

    // ==================== GROUP / HAVING / ORDER ====================

    /// Append to GROUP BY (`"class_id"` or `"class_id, term"`).
    pub fn group_by(mut self, columns: impl Into<String>) -> Self {
        self.state.group_by.push(columns.into());
        self
    }

    /// `HAVING column op ?`. Repeated calls are joined with AND.
    pub fn having(mut self, column: impl Into<String>, op: Op, value: impl Into<Value>) -> Self {
        self.state.having.push(Predicate {
            connector: Connector::And,
            condition: Condition::Compare {
                column: column.into(),
                op,
                value: value.into(),
            },
        });
        self
    }

    pub fn order_by(mut self, column: impl Into<String>, direction: Direction) -> Self {
        self.state.order_by.push((column.into(), direction));
        self
    }

    pub fn order_by_asc(self, column: impl Into<String>) -> Self {
        self.order_by(column, Direction::Asc)
    }

    pub fn order_by_desc(self, column: impl Into<String>) -> Self {
        self.order_by(column, Direction::Desc)
    }

    // ==================== LIMIT / OFFSET ====================

    pub fn limit(mut self, n: u64) -> Self {
        self.state.limit = Some(n);
        self
    }

    pub fn offset(mut self, n: u64) -> Self {
        self.state.offset = Some(n);
        self
    }

    /// Pagination helper.
    ///
    /// `page` is 1-based (clamped to >= 1).
    /// `per_page` is clamped to >= 1.
    pub fn paginate(mut self, page: u64, per_page: u64) -> Self {
        let page = page.max(1);
        let size = per_page.max(1);
        self.state.limit = Some(size);
        self.state.offset = Some((page - 1).saturating_mul(size));
        self
    }

    // ==================== Rendering ====================

    /// Render the statement the chain currently describes.
    pub fn render(&self) -> DbResult<Statement> {
        self.state.render()
    }

    /// Rendered SQL with `?` placeholders.
    pub fn to_sql(&self) -> DbResult<String> {
        self.render().map(|s| s.sql().to_string())
    }

    /// Bound values in placeholder order.
    pub fn bindings(&self) -> DbResult<Vec<Value>> {
        self.render().map(|s| s.into_parts().1)
    }

    /// The statement [`count`](Self::count) runs.
    pub fn count_statement(&self) -> DbResult<Statement> {
        self.state.render_count()
    }

    // ==================== Terminal calls ====================

    pub(crate) fn surface<T>(&self, result: DbResult<T>) -> DbResult<T> {
        result.map_err(|e| surface(self.executor.error_mode(), e))
    }

    fn select_state(&self) -> DbResult<&QueryState> {
        if self.state.is_select() {
            Ok(&self.state)
        } else {
            let sql = self.state.render().map(|s| s.into_parts().0).unwrap_or_default();
            Err(DbError::query(sql, "get() and first() require a SELECT"))
        }
    }

    /// Render and run an INSERT of `data`. Returns the number of inserted rows.
    pub async fn insert<K, V>(&self, data: impl IntoIterator<Item = (K, V)>) -> DbResult<u64>
    where
        K: Into<String>,
        V: Into<Value>,
    {
        let mut state = self.state.clone();
        state.verb = Some(Verb::Insert(pairs(data)));
        let result = match state.render() {
            Ok(statement) => self.executor.execute(&statement).await,
            Err(e) => Err(e),
        };
        self.surface(result)
    }

    /// Run the statement and return the number of affected rows.
    pub async fn execute(&self) -> DbResult<u64> {
        let result = match self.render() {
            Ok(statement) => self.executor.execute(&statement).await,
            Err(e) => Err(e),
        };
        self.surface(result)
    }

    /// Run the SELECT and return every row.
    pub async fn get(&self) -> DbResult<Vec<Record>> {
        let result = match self.select_state().and_then(QueryState::render) {
            Ok(statement) => self.executor.fetch_all(&statement).await,
            Err(e) => Err(e),
        };
        self.surface(result)
    }

    pub async fn get_as<T: FromRecord>(&self) -> DbResult<Vec<T>> {
        self.get().await?.iter().map(T::from_record).collect()
    }

    /// Run the SELECT with `LIMIT 1` (unless a limit is already set).
    pub async fn first(&self) -> DbResult<Option<Record>> {
        let result = match self.select_state() {
            Ok(state) => {
                let mut state = state.clone();
                state.limit.get_or_insert(1);
                match state.render() {
                    Ok(statement) => self.executor.fetch_all(&statement).await,
                    Err(e) => Err(e),
                }
            }
            Err(e) => Err(e),
        };
        self.surface(result).map(|rows| rows.into_iter().next())
    }

    pub async fn first_as<T: FromRecord>(&self) -> DbResult<Option<T>> {
        self.first().await?.as_ref().map(T::from_record).transpose()
    }

    /// Number of rows [`get`](Self::get) would return.
    pub async fn count(&self) -> DbResult<i64> {
        let result = self.count_rows().await;
        self.surface(result)
    }

    /// [`count`](Self::count) with failures returned as the executor reported them.
    pub(crate) async fn count_rows(&self) -> DbResult<i64> {
        let statement = self.count_statement()?;
        let rows = self.executor.fetch_all(&statement).await?;
        rows.first()
            .and_then(|row| row.get_index(0))
            .and_then(Value::as_i64)
            .ok_or_else(|| DbError::decode("count", "COUNT(*) returned no integer"))
    }

    // ==================== Connection passthrough ====================

    pub async fn last_insert_id(&self) -> DbResult<Option<i64>> {
        let result = self.executor.last_insert_id().await;
        self.surface(result)
    }

    pub async fn begin_transaction(&self) -> DbResult<()> {
        let result = self.executor.begin_transaction().await;
        self.surface(result)
    }

    pub async fn commit(&self) -> DbResult<()> {
        let result = self.executor.commit().await;
        self.surface(result)
    }

    pub async fn roll_back(&self) -> DbResult<()> {
        let result = self.executor.roll_back().await;
        self.surface(result)
    }

    pub fn in_transaction(&self) -> bool {
        self.executor.in_transaction()
    }
}
