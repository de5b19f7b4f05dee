//! Rule-based form validation.
//!
//! ```ignore
//! use rollcall::{FormData, Validator};
//!
//! let validator = Validator::from_rules([
//!     ("username", "required|min:3|alpha_dash|unique:users,username"),
//!     ("email", "required|email|unique:users,email"),
//!     ("password", "required|min:8|confirmed"),
//! ])?;
//!
//! let errors = validator.validate(&conn, &form).await?;
//! if errors.has_errors() {
//!     // redisplay the form with errors.to_map()
//! }
//! ```
//!
//! A value is *blank* when its key is absent or it is the empty string; `"0"` is
//! never blank. Format rules skip blank values, so only `required` enforces
//! presence. Length rules (`min`, `max`, `between`) measure characters and also
//! apply to blank values.

mod checks;
mod errors;
mod rule;
mod sanitize;

pub use checks::{
    chrono_format, is_alpha, is_alpha_dash, is_alpha_num, is_date, is_email, is_integer,
    is_numeric, is_phone, is_url, is_uuid, matches_date_format,
};
pub use errors::{ValidationError, ValidationErrors};
pub use rule::{Rule, RuleSet};
pub use sanitize::{clean, escape_html, sanitize, strip_tags};

use crate::builder::{Op, QueryBuilder};
use crate::error::DbResult;
use crate::executor::Executor;
use checks::{char_len, parse_number};
use std::collections::HashMap;

/// Submitted form fields.
pub type FormData = HashMap<String, String>;

/// Runs a [`RuleSet`] against form data.
#[derive(Debug, Clone, Default)]
pub struct Validator {
    rules: RuleSet,
}

impl Validator {
    pub fn new(rules: RuleSet) -> Self {
        Self { rules }
    }

    /// Parse `(field, "rule|rule:params")` pairs; see [`RuleSet::parse`].
    pub fn from_rules<I, F, S>(rules: I) -> DbResult<Self>
    where
        I: IntoIterator<Item = (F, S)>,
        F: Into<String>,
        S: AsRef<str>,
    {
        RuleSet::parse(rules).map(Self::new)
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Run every rule of every field in declared order and collect all failures.
    ///
    /// `unique` and `exists` count rows through `executor`; their query errors are
    /// returned as `Err`, never treated as a passing rule.
    pub async fn validate<E: Executor>(
        &self,
        executor: &E,
        data: &FormData,
    ) -> DbResult<ValidationErrors> {
        let mut errors = ValidationErrors::new();
        for (field, rules) in self.rules.iter() {
            for rule in rules {
                if let Some(message) = check(executor, data, field, rule).await? {
                    errors.push(ValidationError::new(field, rule.name(), message));
                }
            }
        }
        Ok(errors)
    }
}

fn field_value<'a>(data: &'a FormData, field: &str) -> &'a str {
    data.get(field).map(String::as_str).unwrap_or("")
}

/// Failure message for `rule`, or `None` when it passes.
async fn check<E: Executor>(
    executor: &E,
    data: &FormData,
    field: &str,
    rule: &Rule,
) -> DbResult<Option<String>> {
    let value = field_value(data, field);
    let blank = value.is_empty();

    let failed = |ok: bool, message: &str| (!ok).then(|| message.to_string());

    let message = match rule {
        Rule::Required => failed(!blank, "This field is required"),

        // Format rules never fail on blank input.
        _ if blank && skips_blank(rule) => None,

        Rule::Email => failed(checks::is_email(value), "Please enter a valid email address"),
        Rule::Url => failed(checks::is_url(value), "Please enter a valid URL"),
        Rule::Phone => failed(checks::is_phone(value), "Please enter a valid phone number"),
        Rule::Date => failed(checks::is_date(value), "Please enter a valid date"),
        Rule::DateFormat(format) => failed(
            checks::matches_date_format(value, format),
            &format!("Please enter a valid date in {format} format"),
        ),
        Rule::Numeric => failed(checks::is_numeric(value), "This field must be a number"),
        Rule::Integer => failed(checks::is_integer(value), "This field must be an integer"),
        Rule::Alpha => failed(
            checks::is_alpha(value),
            "This field must contain only letters",
        ),
        Rule::AlphaNum => failed(
            checks::is_alpha_num(value),
            "This field must contain only letters and numbers",
        ),
        Rule::AlphaDash => failed(
            checks::is_alpha_dash(value),
            "This field must contain only letters, numbers, dashes and underscores",
        ),
        Rule::Uuid => failed(checks::is_uuid(value), "This field must be a valid UUID"),
        Rule::Regex(re) => failed(re.is_match(value), "This field format is invalid"),

        Rule::Min(min) => failed(
            char_len(value) >= *min,
            &format!("This field must be at least {min} characters"),
        ),
        Rule::Max(max) => failed(
            char_len(value) <= *max,
            &format!("This field must not exceed {max} characters"),
        ),
        Rule::Between(min, max) => {
            let len = char_len(value);
            failed(
                len >= *min && len <= *max,
                &format!("This field must be between {min} and {max} characters"),
            )
        }

        // Numeric bounds only apply to numeric input.
        Rule::MinValue(min) => match parse_number(value) {
            Some(n) => failed(n >= *min, &format!("This field must be at least {min}")),
            None => None,
        },
        Rule::MaxValue(max) => match parse_number(value) {
            Some(n) => failed(n <= *max, &format!("This field must not exceed {max}")),
            None => None,
        },
        Rule::BetweenValue(min, max) => match parse_number(value) {
            Some(n) => failed(
                n >= *min && n <= *max,
                &format!("This field must be between {min} and {max}"),
            ),
            None => None,
        },

        Rule::In(allowed) => failed(
            allowed.iter().any(|a| a == value),
            "This value is not allowed",
        ),
        Rule::NotIn(denied) => failed(
            !denied.iter().any(|d| d == value),
            "This value is not allowed",
        ),

        Rule::Unique {
            table,
            column,
            exclude_id,
        } => {
            let column = column.as_deref().unwrap_or(field);
            let mut query = executor.table(table.as_str()).where_(column, value);
            if let Some(id) = exclude_id {
                query = query.and_where_op("id", Op::Ne, id.as_str());
            }
            let count = matching_rows(&query).await?;
            failed(count == 0, "This value is already taken")
        }
        Rule::Exists { table, column } => {
            let column = column.as_deref().unwrap_or(field);
            let query = executor.table(table.as_str()).where_(column, value);
            let count = matching_rows(&query).await?;
            failed(count > 0, "This value does not exist")
        }

        Rule::Confirmed => {
            let confirmation = field_value(data, &format!("{field}_confirmation"));
            failed(value == confirmation, "Field confirmation does not match")
        }
        Rule::Same(other) => failed(
            value == field_value(data, other),
            &format!("This field must match {other}"),
        ),
        Rule::Different(other) => failed(
            value != field_value(data, other),
            &format!("This field must be different from {other}"),
        ),
    };
    Ok(message)
}

/// Rows matched by a `unique`/`exists` lookup.
///
/// Input that cannot be converted to the column's type (`"abc"` for an integer
/// key) matches no row. Server and connection failures are returned.
async fn matching_rows<E: Executor>(query: &QueryBuilder<'_, E>) -> DbResult<i64> {
    match query.count_rows().await {
        Ok(count) => Ok(count),
        Err(e) if e.is_bind_failure() => {
            tracing::debug!(target: "rollcall.sql", error = %e, "lookup value does not fit column");
            Ok(0)
        }
        Err(e) => query.surface(Err(e)),
    }
}

/// Rules that treat a blank value as passing.
fn skips_blank(rule: &Rule) -> bool {
    !matches!(
        rule,
        Rule::Required
            | Rule::Min(_)
            | Rule::Max(_)
            | Rule::Between(..)
            | Rule::Confirmed
            | Rule::Same(_)
            | Rule::Different(_)
    )
}
