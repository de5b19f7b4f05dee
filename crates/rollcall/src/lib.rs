//! # rollcall
//!
//! Data-access core for a school administration backend on PostgreSQL.
//!
//! ## Features
//!
//! - **Fluent query builder**: chain `where_`/`join`/`order_by`/`limit` calls, render
//!   one parameterized statement per terminal call
//! - **Order-independent rendering**: clauses are kept in buckets and rendered in SQL order
//! - **Binding alignment**: every rendered statement is checked so placeholders and
//!   bound values line up, with UPDATE `SET` values always bound before `WHERE` values
//! - **Connection-scoped transactions**: `begin_transaction` / `commit` / `roll_back`,
//!   no nesting, plus the [`transaction!`] macro
//! - **Rule-based validation**: `required|email|unique:users,email` style rules, with
//!   `unique`/`exists` checked through the same builder
//! - **Error modes**: development surfaces SQL and driver messages, production logs
//!   them and returns [`DbError::QueryFailed`]
//!
//! ## Query Builder
//!
//! ```ignore
//! use rollcall::{Database, Executor, Op};
//!
//! let db = Database::from_env()?;
//! let conn = db.connection().await?;
//!
//! // SELECT
//! let students = conn
//!     .table("students")
//!     .where_("class_id", 4)
//!     .where_op("admission_date", Op::Gte, "2024-01-01")
//!     .order_by_asc("last_name")
//!     .get()
//!     .await?;
//!
//! // INSERT
//! conn.table("attendance")
//!     .insert([("student_id", 12), ("present", 1)])
//!     .await?;
//!
//! // UPDATE
//! conn.table("students")
//!     .update([("class_id", 5)])
//!     .where_("id", 12)
//!     .execute()
//!     .await?;
//!
//! // DELETE
//! conn.table("sessions")
//!     .delete()
//!     .where_op("expires_at", Op::Lt, "2024-01-01 00:00:00")
//!     .execute()
//!     .await?;
//! ```
//!
//! ## Logging
//!
//! Statements are logged with `tracing` under the `rollcall.sql` target. The library
//! never installs a subscriber.

pub mod builder;
pub mod config;
pub mod connection;
pub mod error;
pub mod executor;
pub mod record;
pub mod sql;
pub mod transaction;
pub mod validate;
pub mod value;

pub use builder::{Direction, JoinKind, Op, QueryBuilder, Statement};
pub use config::{AppEnv, DatabaseConfig};
pub use connection::{Connection, Database};
pub use error::{DbError, DbResult};
pub use executor::{Executor, Offline};
pub use record::{FromRecord, Record};
pub use validate::{
    FormData, Rule, RuleSet, ValidationError, ValidationErrors, Validator, clean, sanitize,
};
pub use value::{FromValue, Value};
