//! Transaction helpers.
//!
//! Transactions are connection-scoped: [`Executor::begin_transaction`], builder
//! chains issued on the same executor, then [`Executor::commit`] or
//! [`Executor::roll_back`]. There is no nesting and no savepoint API.
//!
//! For ergonomic commit/rollback handling, use the [`transaction!`] macro.
//!
//! # Example
//!
//! ```ignore
//! use rollcall::{DbResult, Executor};
//!
//! # async fn enroll(conn: &rollcall::Connection) -> DbResult<()> {
//! let student_id = rollcall::transaction!(conn, {
//!     conn.table("users").insert([("name", "Ada")]).await?;
//!     let user_id = conn.last_insert_id().await?;
//!     conn.table("students").insert([("user_id", user_id)]).await?;
//!     conn.last_insert_id().await
//! })?;
//! # Ok(()) }
//! ```
//!
//! [`Executor::begin_transaction`]: crate::Executor::begin_transaction
//! [`Executor::commit`]: crate::Executor::commit
//! [`Executor::roll_back`]: crate::Executor::roll_back

use crate::config::AppEnv;
use crate::error::DbError;
use crate::executor::surface;

/// Runs the given block inside a transaction on `$executor`.
///
/// - Begins with `begin_transaction()`.
/// - Commits on `Ok(_)`.
/// - Rolls back on `Err(_)` and returns the block's error. A failed rollback is
///   logged and the block's error is still returned.
/// - Failures of `BEGIN`/`COMMIT` follow the executor's error mode. Errors from
///   the block are returned as the block produced them.
///
/// The block must evaluate to `rollcall::DbResult<T>`; the macro evaluates to
/// `rollcall::DbResult<T>` as well.
#[macro_export]
macro_rules! transaction {
    ($executor:expr, $body:block) => {{
        #[allow(unused_imports)]
        use $crate::Executor as _;
        let __rollcall_executor = &$executor;
        let __rollcall_mode = __rollcall_executor.error_mode();
        match __rollcall_executor.begin_transaction().await {
            Err(error) => Err($crate::transaction::__surface(__rollcall_mode, error)),
            Ok(()) => {
                let __rollcall_body_result: $crate::DbResult<_> = async { $body }.await;
                match __rollcall_body_result {
                    Ok(value) => match __rollcall_executor.commit().await {
                        Ok(()) => Ok(value),
                        Err(error) => Err($crate::transaction::__surface(__rollcall_mode, error)),
                    },
                    Err(error) => match __rollcall_executor.roll_back().await {
                        Ok(()) => Err(error),
                        Err(rollback_err) => {
                            $crate::transaction::__rollback_failed(&error, &rollback_err);
                            Err(error)
                        }
                    },
                }
            }
        }
    }};
}

#[doc(hidden)]
pub fn __surface(mode: AppEnv, error: DbError) -> DbError {
    surface(mode, error)
}

#[doc(hidden)]
pub fn __rollback_failed(error: &DbError, rollback_err: &DbError) {
    tracing::warn!(
        target: "rollcall.sql",
        error = %error,
        rollback_error = %rollback_err,
        "rollback failed after transaction error"
    );
}
