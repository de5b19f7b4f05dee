//! Bucketed query state and statement rendering.

use super::clause::{Direction, Join, Predicate, Verb, render_predicates};
use crate::error::{DbError, DbResult};
use crate::sql::count_placeholders;
use crate::value::Value;

/// A rendered statement: SQL with `?` placeholders and the values bound to them.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    sql: String,
    params: Vec<Value>,
}

impl Statement {
    /// Build a statement from hand-written SQL.
    ///
    /// Fails with [`DbError::Query`] when the placeholder count differs from `params.len()`.
    pub fn new(sql: impl Into<String>, params: Vec<Value>) -> DbResult<Self> {
        let statement = Self {
            sql: sql.into(),
            params,
        };
        statement.check()?;
        Ok(statement)
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn params(&self) -> &[Value] {
        &self.params
    }

    pub fn into_parts(self) -> (String, Vec<Value>) {
        (self.sql, self.params)
    }

    /// Leading keyword (`SELECT`, `INSERT`, ...), used for logging.
    pub fn verb(&self) -> &str {
        self.sql.split_whitespace().next().unwrap_or("")
    }

    /// Verify that placeholders and bound values line up.
    pub fn check(&self) -> DbResult<()> {
        let placeholders = count_placeholders(&self.sql);
        if placeholders != self.params.len() {
            return Err(DbError::query(
                self.sql.clone(),
                format!(
                    "statement has {placeholders} placeholders but {} bound values",
                    self.params.len()
                ),
            ));
        }
        Ok(())
    }
}

/// Everything a builder chain has accumulated.
///
/// Clauses live in separate buckets and are rendered in SQL order, so the order
/// of chain calls never changes the output.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct QueryState {
    pub(crate) table: Option<String>,
    pub(crate) verb: Option<Verb>,
    pub(crate) joins: Vec<Join>,
    pub(crate) wheres: Vec<Predicate>,
    pub(crate) group_by: Vec<String>,
    pub(crate) having: Vec<Predicate>,
    pub(crate) order_by: Vec<(String, Direction)>,
    pub(crate) limit: Option<u64>,
    pub(crate) offset: Option<u64>,
    pub(crate) allow_delete_all: bool,
}

impl QueryState {
    fn table(&self) -> DbResult<&str> {
        match self.table.as_deref() {
            Some(table) if !table.trim().is_empty() => Ok(table),
            _ => Err(DbError::query("", "no table selected")),
        }
    }

    pub(crate) fn is_select(&self) -> bool {
        matches!(self.verb, None | Some(Verb::Select(_)))
    }

    fn has_select_only_clauses(&self) -> bool {
        !self.joins.is_empty()
            || !self.group_by.is_empty()
            || !self.having.is_empty()
            || !self.order_by.is_empty()
            || self.limit.is_some()
            || self.offset.is_some()
    }

    fn push_where(&self, sql: &mut String, params: &mut Vec<Value>) {
        if !self.wheres.is_empty() {
            sql.push_str(" WHERE ");
            render_predicates(&self.wheres, sql, params);
        }
    }

    /// Render the statement for the current verb.
    pub(crate) fn render(&self) -> DbResult<Statement> {
        match &self.verb {
            None => self.render_select("*"),
            Some(Verb::Select(columns)) => self.render_select(columns),
            Some(Verb::Insert(data)) => self.render_insert(data),
            Some(Verb::Update(data)) => self.render_update(data),
            Some(Verb::Delete) => self.render_delete(),
        }
    }

    fn render_select(&self, columns: &str) -> DbResult<Statement> {
        let table = self.table()?;
        let columns = if columns.trim().is_empty() { "*" } else { columns };
        let mut sql = format!("SELECT {columns} FROM {table}");
        let mut params = Vec::new();

        for join in &self.joins {
            sql.push(' ');
            sql.push_str(&join.render());
        }

        self.push_where(&mut sql, &mut params);

        if !self.group_by.is_empty() {
            sql.push_str(" GROUP BY ");
            sql.push_str(&self.group_by.join(", "));
        }

        if !self.having.is_empty() {
            sql.push_str(" HAVING ");
            render_predicates(&self.having, &mut sql, &mut params);
        }

        if !self.order_by.is_empty() {
            let order: Vec<String> = self
                .order_by
                .iter()
                .map(|(column, direction)| format!("{column} {}", direction.as_sql()))
                .collect();
            sql.push_str(" ORDER BY ");
            sql.push_str(&order.join(", "));
        }

        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        if let Some(offset) = self.offset {
            sql.push_str(&format!(" OFFSET {offset}"));
        }

        Statement::new(sql, params)
    }

    fn render_insert(&self, data: &[(String, Value)]) -> DbResult<Statement> {
        let table = self.table()?;
        if data.is_empty() {
            return Err(DbError::query("", format!("INSERT INTO {table} has no values")));
        }
        if !self.wheres.is_empty() || self.has_select_only_clauses() {
            return Err(DbError::query(
                "",
                format!("INSERT INTO {table} cannot carry WHERE, JOIN, GROUP BY, HAVING, ORDER BY or LIMIT"),
            ));
        }

        let columns: Vec<&str> = data.iter().map(|(c, _)| c.as_str()).collect();
        let marks = vec!["?"; data.len()].join(", ");
        let sql = format!("INSERT INTO {table} ({}) VALUES ({marks})", columns.join(", "));
        let params = data.iter().map(|(_, v)| v.clone()).collect();
        Statement::new(sql, params)
    }

    fn render_update(&self, data: &[(String, Value)]) -> DbResult<Statement> {
        let table = self.table()?;
        if data.is_empty() {
            return Err(DbError::query("", format!("UPDATE {table} has no values")));
        }
        if self.has_select_only_clauses() {
            return Err(DbError::query(
                "",
                format!("UPDATE {table} cannot carry JOIN, GROUP BY, HAVING, ORDER BY or LIMIT"),
            ));
        }

        // SET values are bound before WHERE values whatever the call order.
        let assignments: Vec<String> = data.iter().map(|(c, _)| format!("{c} = ?")).collect();
        let mut sql = format!("UPDATE {table} SET {}", assignments.join(", "));
        let mut params: Vec<Value> = data.iter().map(|(_, v)| v.clone()).collect();
        self.push_where(&mut sql, &mut params);
        Statement::new(sql, params)
    }

    fn render_delete(&self) -> DbResult<Statement> {
        let table = self.table()?;
        if self.has_select_only_clauses() {
            return Err(DbError::query(
                "",
                format!("DELETE FROM {table} cannot carry JOIN, GROUP BY, HAVING, ORDER BY or LIMIT"),
            ));
        }
        if self.wheres.is_empty() && !self.allow_delete_all {
            return Err(DbError::query(
                format!("DELETE FROM {table}"),
                "refusing to delete every row; call allow_delete_all() to confirm",
            ));
        }

        let mut sql = format!("DELETE FROM {table}");
        let mut params = Vec::new();
        self.push_where(&mut sql, &mut params);
        Statement::new(sql, params)
    }

    /// `SELECT COUNT(*)` over the full SELECT, so the result always equals the
    /// number of rows the SELECT returns.
    pub(crate) fn render_count(&self) -> DbResult<Statement> {
        if !self.is_select() {
            return Err(DbError::query("", "count() requires a SELECT"));
        }
        let (inner, params) = self.render()?.into_parts();
        Statement::new(format!("SELECT COUNT(*) FROM ({inner}) AS counted"), params)
    }
}
