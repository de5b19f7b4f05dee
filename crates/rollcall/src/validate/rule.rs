//! Typed validation rules and the pipe-delimited rule syntax.
//!
//! ```text
//! required|email|unique:users,email,42
//! required|min:3|max:50|alpha_dash
//! date_format:d/m/Y
//! regex:/^S[0-9]{4}$/
//! ```
//!
//! Rules are separated by `|`, a rule name is separated from its parameters by the
//! first `:`, and parameters are separated by `,`. `regex:` takes the rest of the
//! segment verbatim, so a pattern may contain `,` and `:` but not `|`; build a
//! [`Rule::Regex`] directly for patterns that need alternation.

use super::checks::compile_pattern;
use crate::error::{DbError, DbResult};
use regex::Regex;

/// One parsed validation rule.
#[derive(Debug, Clone)]
pub enum Rule {
    Required,
    Email,
    Url,
    Phone,
    Date,
    /// PHP-style (`Y-m-d`) or chrono (`%Y-%m-%d`) format.
    DateFormat(String),
    Numeric,
    Integer,
    Alpha,
    AlphaNum,
    AlphaDash,
    Uuid,
    Regex(Regex),
    /// Minimum length in characters.
    Min(usize),
    /// Maximum length in characters.
    Max(usize),
    Between(usize, usize),
    MinValue(f64),
    MaxValue(f64),
    BetweenValue(f64, f64),
    In(Vec<String>),
    NotIn(Vec<String>),
    /// No row in `table` has `column` (default: the field name) equal to the value,
    /// ignoring the row whose `id` is `exclude_id`.
    Unique {
        table: String,
        column: Option<String>,
        exclude_id: Option<String>,
    },
    Exists {
        table: String,
        column: Option<String>,
    },
    /// Equals the `<field>_confirmation` field.
    Confirmed,
    Same(String),
    Different(String),
}

impl Rule {
    /// Rule name as written in rule strings. Also the [`ValidationError`](super::ValidationError) code.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Required => "required",
            Self::Email => "email",
            Self::Url => "url",
            Self::Phone => "phone",
            Self::Date => "date",
            Self::DateFormat(_) => "date_format",
            Self::Numeric => "numeric",
            Self::Integer => "integer",
            Self::Alpha => "alpha",
            Self::AlphaNum => "alpha_num",
            Self::AlphaDash => "alpha_dash",
            Self::Uuid => "uuid",
            Self::Regex(_) => "regex",
            Self::Min(_) => "min",
            Self::Max(_) => "max",
            Self::Between(..) => "between",
            Self::MinValue(_) => "min_value",
            Self::MaxValue(_) => "max_value",
            Self::BetweenValue(..) => "between_value",
            Self::In(_) => "in",
            Self::NotIn(_) => "not_in",
            Self::Unique { .. } => "unique",
            Self::Exists { .. } => "exists",
            Self::Confirmed => "confirmed",
            Self::Same(_) => "same",
            Self::Different(_) => "different",
        }
    }

    /// Whether the rule needs a database round trip.
    pub fn is_io(&self) -> bool {
        matches!(self, Self::Unique { .. } | Self::Exists { .. })
    }

    /// Parse one rule segment such as `between:3,20`.
    pub fn parse(segment: &str) -> DbResult<Self> {
        let segment = segment.trim();
        let (name, raw) = match segment.split_once(':') {
            Some((name, raw)) => (name.trim(), Some(raw)),
            None => (segment, None),
        };

        if name == "regex" {
            let pattern = raw
                .filter(|p| !p.trim().is_empty())
                .ok_or_else(|| DbError::invalid_rule("regex requires a pattern"))?;
            let regex = compile_pattern(pattern)
                .map_err(|e| DbError::invalid_rule(format!("regex pattern '{pattern}': {e}")))?;
            return Ok(Self::Regex(regex));
        }

        let params: Vec<&str> = raw
            .map(|r| r.split(',').map(str::trim).collect())
            .unwrap_or_default();
        let args = Args { name, params };

        let rule = match name {
            "required" => args.none(Self::Required)?,
            "email" => args.none(Self::Email)?,
            "url" => args.none(Self::Url)?,
            "phone" => args.none(Self::Phone)?,
            "date" => args.none(Self::Date)?,
            "numeric" => args.none(Self::Numeric)?,
            "integer" => args.none(Self::Integer)?,
            "alpha" => args.none(Self::Alpha)?,
            "alpha_num" => args.none(Self::AlphaNum)?,
            "alpha_dash" => args.none(Self::AlphaDash)?,
            "uuid" => args.none(Self::Uuid)?,
            "confirmed" => args.none(Self::Confirmed)?,
            "date_format" => {
                // The format may legitimately contain `,`.
                let format = raw
                    .filter(|f| !f.trim().is_empty())
                    .ok_or_else(|| args.error("requires a format"))?;
                Self::DateFormat(format.trim().to_string())
            }
            "min" => Self::Min(args.exact(1)?.length(0)?),
            "max" => Self::Max(args.exact(1)?.length(0)?),
            "between" => {
                let args = args.exact(2)?;
                let (min, max) = (args.length(0)?, args.length(1)?);
                if min > max {
                    return Err(args.error("minimum is greater than maximum"));
                }
                Self::Between(min, max)
            }
            "min_value" => Self::MinValue(args.exact(1)?.number(0)?),
            "max_value" => Self::MaxValue(args.exact(1)?.number(0)?),
            "between_value" => {
                let args = args.exact(2)?;
                let (min, max) = (args.number(0)?, args.number(1)?);
                if min > max {
                    return Err(args.error("minimum is greater than maximum"));
                }
                Self::BetweenValue(min, max)
            }
            "in" => Self::In(args.list()?),
            "not_in" => Self::NotIn(args.list()?),
            "unique" => {
                let args = args.range(1, 3)?;
                Self::Unique {
                    table: args.word(0)?,
                    column: args.optional_word(1)?,
                    exclude_id: args.optional(2),
                }
            }
            "exists" => {
                let args = args.range(1, 2)?;
                Self::Exists {
                    table: args.word(0)?,
                    column: args.optional_word(1)?,
                }
            }
            "same" => Self::Same(args.exact(1)?.word(0)?),
            "different" => Self::Different(args.exact(1)?.word(0)?),
            other => return Err(DbError::invalid_rule(format!("unknown rule '{other}'"))),
        };
        Ok(rule)
    }

    /// Parse a pipe-delimited rule string. Empty segments are skipped.
    pub fn parse_list(rules: &str) -> DbResult<Vec<Self>> {
        rules
            .split('|')
            .filter(|segment| !segment.trim().is_empty())
            .map(Self::parse)
            .collect()
    }
}

struct Args<'a> {
    name: &'a str,
    params: Vec<&'a str>,
}

impl Args<'_> {
    fn error(&self, message: &str) -> DbError {
        DbError::invalid_rule(format!("{}: {message}", self.name))
    }

    fn none(&self, rule: Rule) -> DbResult<Rule> {
        if self.params.is_empty() {
            Ok(rule)
        } else {
            Err(self.error("takes no parameters"))
        }
    }

    fn exact(self, n: usize) -> DbResult<Self> {
        self.range(n, n)
    }

    fn range(self, min: usize, max: usize) -> DbResult<Self> {
        let len = self.params.len();
        if len < min || len > max {
            let expected = if min == max {
                format!("expects {min} parameter(s), got {len}")
            } else {
                format!("expects {min} to {max} parameters, got {len}")
            };
            return Err(self.error(&expected));
        }
        Ok(self)
    }

    fn optional(&self, idx: usize) -> Option<String> {
        self.params
            .get(idx)
            .filter(|p| !p.is_empty())
            .map(|p| p.to_string())
    }

    fn word(&self, idx: usize) -> DbResult<String> {
        self.optional_word(idx)?
            .ok_or_else(|| self.error(&format!("parameter {} is empty", idx + 1)))
    }

    /// Identifiers end up in SQL text, so only `[A-Za-z0-9_.]` is accepted.
    fn optional_word(&self, idx: usize) -> DbResult<Option<String>> {
        match self.optional(idx) {
            Some(word)
                if word
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.') =>
            {
                Ok(Some(word))
            }
            Some(word) => Err(self.error(&format!("'{word}' is not a valid identifier"))),
            None => Ok(None),
        }
    }

    fn length(&self, idx: usize) -> DbResult<usize> {
        let raw = self.params[idx];
        raw.parse()
            .map_err(|_| self.error(&format!("'{raw}' is not a length")))
    }

    fn number(&self, idx: usize) -> DbResult<f64> {
        let raw = self.params[idx];
        super::checks::parse_number(raw).ok_or_else(|| self.error(&format!("'{raw}' is not a number")))
    }

    fn list(self) -> DbResult<Vec<String>> {
        if self.params.is_empty() {
            return Err(self.error("requires at least one value"));
        }
        Ok(self.params.into_iter().map(str::to_string).collect())
    }
}

/// Ordered mapping of field name to its rules.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    fields: Vec<(String, Vec<Rule>)>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `(field, "rule|rule:params")` pairs.
    ///
    /// Fails with [`DbError::InvalidRule`] on the first unknown rule or malformed parameter.
    pub fn parse<I, F, S>(rules: I) -> DbResult<Self>
    where
        I: IntoIterator<Item = (F, S)>,
        F: Into<String>,
        S: AsRef<str>,
    {
        let mut set = Self::new();
        for (field, spec) in rules {
            let field = field.into();
            let parsed = Rule::parse_list(spec.as_ref()).map_err(|e| match e {
                DbError::InvalidRule(message) => {
                    DbError::invalid_rule(format!("field '{field}': {message}"))
                }
                other => other,
            })?;
            set = set.field(field, parsed);
        }
        Ok(set)
    }

    /// Append rules for `field`. Rules for a field already present are added after its existing ones.
    pub fn field(mut self, field: impl Into<String>, rules: impl IntoIterator<Item = Rule>) -> Self {
        let field = field.into();
        match self.fields.iter_mut().find(|(name, _)| *name == field) {
            Some((_, existing)) => existing.extend(rules),
            None => self.fields.push((field, rules.into_iter().collect())),
        }
        self
    }

    pub fn get(&self, field: &str) -> Option<&[Rule]> {
        self.fields
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, rules)| rules.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Rule])> {
        self.fields
            .iter()
            .map(|(field, rules)| (field.as_str(), rules.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
