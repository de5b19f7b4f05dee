//! Operators, join kinds, sort directions and the internal clause model.

use crate::error::DbError;
use crate::value::Value;
use std::fmt;
use std::str::FromStr;

/// Comparison operator for WHERE, HAVING and JOIN ... ON.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Op {
    #[default]
    Eq,
    /// `!=`
    Ne,
    /// `<>`
    NotEq,
    Lt,
    Lte,
    Gt,
    Gte,
    Like,
    NotLike,
    /// Case-insensitive LIKE
    Ilike,
}

impl Op {
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "!=",
            Self::NotEq => "<>",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Like => "LIKE",
            Self::NotLike => "NOT LIKE",
            Self::Ilike => "ILIKE",
        }
    }
}

impl FromStr for Op {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.split_whitespace().collect::<Vec<_>>().join(" ");
        match normalized.to_ascii_uppercase().as_str() {
            "=" => Ok(Self::Eq),
            "!=" => Ok(Self::Ne),
            "<>" => Ok(Self::NotEq),
            "<" => Ok(Self::Lt),
            "<=" => Ok(Self::Lte),
            ">" => Ok(Self::Gt),
            ">=" => Ok(Self::Gte),
            "LIKE" => Ok(Self::Like),
            "NOT LIKE" => Ok(Self::NotLike),
            "ILIKE" => Ok(Self::Ilike),
            _ => Err(DbError::query("", format!("unsupported operator '{s}'"))),
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// Join type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JoinKind {
    #[default]
    Inner,
    Left,
    Right,
    Full,
}

impl JoinKind {
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Inner => "INNER JOIN",
            Self::Left => "LEFT JOIN",
            Self::Right => "RIGHT JOIN",
            Self::Full => "FULL JOIN",
        }
    }
}

/// Sort direction for ORDER BY.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

impl FromStr for Direction {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ASC" => Ok(Self::Asc),
            "DESC" => Ok(Self::Desc),
            _ => Err(DbError::query("", format!("unsupported sort direction '{s}'"))),
        }
    }
}

/// How a predicate attaches to the ones before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Connector {
    And,
    Or,
}

impl Connector {
    fn as_sql(self) -> &'static str {
        match self {
            Self::And => "AND",
            Self::Or => "OR",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Condition {
    Compare { column: String, op: Op, value: Value },
    Null { column: String, negated: bool },
    In { column: String, values: Vec<Value> },
    /// `(a op ? OR b op ? ...)` with the same value bound once per column.
    Any { columns: Vec<String>, op: Op, value: Value },
}

impl Condition {
    /// Render into `sql`, pushing bound values onto `params` in placeholder order.
    pub(crate) fn render(&self, sql: &mut String, params: &mut Vec<Value>) {
        match self {
            Self::Compare { column, op, value } => {
                sql.push_str(&format!("{column} {op} ?"));
                params.push(value.clone());
            }
            Self::Null { column, negated } => {
                let check = if *negated { "IS NOT NULL" } else { "IS NULL" };
                sql.push_str(&format!("{column} {check}"));
            }
            Self::In { values, .. } if values.is_empty() => sql.push_str("1=0"),
            Self::In { column, values } => {
                let marks = vec!["?"; values.len()].join(", ");
                sql.push_str(&format!("{column} IN ({marks})"));
                params.extend(values.iter().cloned());
            }
            Self::Any { columns, .. } if columns.is_empty() => sql.push_str("1=0"),
            Self::Any { columns, op, value } => {
                let parts: Vec<String> = columns.iter().map(|c| format!("{c} {op} ?")).collect();
                sql.push('(');
                sql.push_str(&parts.join(" OR "));
                sql.push(')');
                params.extend(std::iter::repeat_n(value.clone(), columns.len()));
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Predicate {
    pub(crate) connector: Connector,
    pub(crate) condition: Condition,
}

/// Render a predicate list without its leading keyword.
pub(crate) fn render_predicates(predicates: &[Predicate], sql: &mut String, params: &mut Vec<Value>) {
    for (idx, predicate) in predicates.iter().enumerate() {
        if idx > 0 {
            sql.push(' ');
            sql.push_str(predicate.connector.as_sql());
            sql.push(' ');
        }
        predicate.condition.render(sql, params);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Join {
    pub(crate) kind: JoinKind,
    pub(crate) table: String,
    pub(crate) left: String,
    pub(crate) op: Op,
    pub(crate) right: String,
}

impl Join {
    pub(crate) fn render(&self) -> String {
        format!(
            "{} {} ON {} {} {}",
            self.kind.as_sql(),
            self.table,
            self.left,
            self.op,
            self.right
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Verb {
    Select(String),
    Insert(Vec<(String, Value)>),
    Update(Vec<(String, Value)>),
    Delete,
}
