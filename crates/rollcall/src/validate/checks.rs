//! Format checks behind the string rules.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;
use std::sync::OnceLock;

fn cached(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("invalid built-in regex"))
}

/// Best-effort email validation. Not fully RFC-compliant.
pub fn is_email(s: &str) -> bool {
    static EMAIL_RE: OnceLock<Regex> = OnceLock::new();
    cached(&EMAIL_RE, r"^[^\s@]+@[^\s@]+\.[^\s@]+$").is_match(s)
}

/// Absolute URL with a host (or a scheme that has none, like `mailto:`).
pub fn is_url(s: &str) -> bool {
    match url::Url::parse(s) {
        Ok(url) => url.has_host() || matches!(url.scheme(), "mailto" | "news" | "file"),
        Err(_) => false,
    }
}

pub fn is_phone(s: &str) -> bool {
    static PHONE_RE: OnceLock<Regex> = OnceLock::new();
    cached(&PHONE_RE, r"^\+?[0-9\s\-()]+$").is_match(s)
}

/// Decimal or exponent notation, surrounding whitespace allowed.
pub fn is_numeric(s: &str) -> bool {
    static NUMERIC_RE: OnceLock<Regex> = OnceLock::new();
    cached(
        &NUMERIC_RE,
        r"^\s*[+-]?(\d+(\.\d*)?|\.\d+)([eE][+-]?\d+)?\s*$",
    )
    .is_match(s)
}

pub fn parse_number(s: &str) -> Option<f64> {
    if is_numeric(s) {
        s.trim().parse().ok()
    } else {
        None
    }
}

/// Optional sign, no leading zeros, fits in `i64`.
pub fn is_integer(s: &str) -> bool {
    static INTEGER_RE: OnceLock<Regex> = OnceLock::new();
    cached(&INTEGER_RE, r"^[+-]?(0|[1-9]\d*)$").is_match(s) && s.parse::<i64>().is_ok()
}

pub fn is_alpha(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphabetic())
}

pub fn is_alpha_num(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric())
}

pub fn is_alpha_dash(s: &str) -> bool {
    !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

pub fn is_uuid(s: &str) -> bool {
    uuid::Uuid::parse_str(s).is_ok()
}

/// Length in characters, not bytes.
pub fn char_len(s: &str) -> usize {
    s.chars().count()
}

const DATE_LAYOUTS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d-%m-%Y", "%m/%d/%Y", "%d %B %Y", "%B %d, %Y"];

const DATETIME_LAYOUTS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S",
];

/// Common date and date-time layouts.
pub fn is_date(s: &str) -> bool {
    let s = s.trim();
    DATE_LAYOUTS
        .iter()
        .any(|layout| NaiveDate::parse_from_str(s, layout).is_ok())
        || DATETIME_LAYOUTS
            .iter()
            .any(|layout| NaiveDateTime::parse_from_str(s, layout).is_ok())
        || DateTime::parse_from_rfc3339(s).is_ok()
}

/// Translate a PHP `date()` style format (`Y-m-d`) into a chrono format (`%Y-%m-%d`).
///
/// A format that already contains `%` is taken as a chrono format and returned as is.
pub fn chrono_format(format: &str) -> String {
    if format.contains('%') {
        return format.to_string();
    }

    let mut out = String::with_capacity(format.len() * 2);
    let mut chars = format.chars();
    while let Some(c) = chars.next() {
        let spec = match c {
            'Y' => "%Y",
            'y' => "%y",
            'm' => "%m",
            'n' => "%-m",
            'd' => "%d",
            'j' => "%-d",
            'H' => "%H",
            'G' => "%-H",
            'h' => "%I",
            'g' => "%-I",
            'i' => "%M",
            's' => "%S",
            'A' => "%p",
            'a' => "%P",
            'M' => "%b",
            'F' => "%B",
            'D' => "%a",
            'l' => "%A",
            '\\' => {
                if let Some(escaped) = chars.next() {
                    out.push(escaped);
                }
                continue;
            }
            other => {
                out.push(other);
                continue;
            }
        };
        out.push_str(spec);
    }
    out
}

/// `value` parses with `format` and formats back to exactly `value`.
pub fn matches_date_format(value: &str, format: &str) -> bool {
    let format = chrono_format(format);
    if let Ok(dt) = NaiveDateTime::parse_from_str(value, &format) {
        return dt.format(&format).to_string() == value;
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, &format) {
        return date.format(&format).to_string() == value;
    }
    if let Ok(time) = NaiveTime::parse_from_str(value, &format) {
        return time.format(&format).to_string() == value;
    }
    false
}

/// Compile a `regex:` rule pattern.
///
/// Accepts `/pattern/flags` delimiters; the `i`, `m`, `s` and `x` flags are
/// carried over as inline flags. A bare pattern is compiled as written.
pub fn compile_pattern(raw: &str) -> Result<Regex, regex::Error> {
    let trimmed = raw.trim();
    let delimited = trimmed
        .strip_prefix('/')
        .and_then(|rest| rest.rfind('/').map(|end| (&rest[..end], &rest[end + 1..])));

    match delimited {
        Some((body, flags)) if !body.is_empty() => {
            let flags: String = flags
                .chars()
                .filter(|c| matches!(c, 'i' | 'm' | 's' | 'x'))
                .collect();
            if flags.is_empty() {
                Regex::new(body)
            } else {
                Regex::new(&format!("(?{flags}){body}"))
            }
        }
        _ => Regex::new(trimmed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email() {
        assert!(is_email("a@b.co"));
        assert!(!is_email("a@b"));
        assert!(!is_email("a b@c.com"));
    }

    #[test]
    fn url() {
        assert!(is_url("https://school.example/students?id=4"));
        assert!(is_url("mailto:office@school.example"));
        assert!(!is_url("school.example"));
        assert!(!is_url("not a url"));
    }

    #[test]
    fn phone() {
        assert!(is_phone("+1 (555) 010-2030"));
        assert!(!is_phone("555-CALL-NOW"));
    }

    #[test]
    fn numbers() {
        assert!(is_numeric("12"));
        assert!(is_numeric(" -3.5 "));
        assert!(is_numeric("1e3"));
        assert!(is_numeric(".5"));
        assert!(!is_numeric("1,000"));
        assert!(!is_numeric("abc"));
        assert_eq!(parse_number("2.5"), Some(2.5));

        assert!(is_integer("0"));
        assert!(is_integer("-42"));
        assert!(!is_integer("007"));
        assert!(!is_integer("4.0"));
        assert!(!is_integer("99999999999999999999"));
    }

    #[test]
    fn charsets() {
        assert!(is_alpha("Ada"));
        assert!(!is_alpha("Ada1"));
        assert!(is_alpha_num("Ada1"));
        assert!(!is_alpha_num("Ada-1"));
        assert!(is_alpha_dash("ada_lovelace-1"));
        assert!(!is_alpha_dash("ada lovelace"));
    }

    #[test]
    fn char_len_counts_characters() {
        assert_eq!(char_len("Zoë"), 3);
        assert_eq!("Zoë".len(), 4);
    }

    #[test]
    fn dates() {
        assert!(is_date("2024-09-01"));
        assert!(is_date("01-09-2024"));
        assert!(is_date("2024-09-01 08:30:00"));
        assert!(is_date("2024-09-01T08:30:00+02:00"));
        assert!(!is_date("2024-02-30"));
        assert!(!is_date("tomorrow-ish"));
    }

    #[test]
    fn php_formats_translate() {
        assert_eq!(chrono_format("Y-m-d"), "%Y-%m-%d");
        assert_eq!(chrono_format("d/m/Y H:i"), "%d/%m/%Y %H:%M");
        assert_eq!(chrono_format(r"\Y\e\a\r: Y"), "Year: %Y");
        assert_eq!(chrono_format("%d.%m.%Y"), "%d.%m.%Y");
    }

    #[test]
    fn date_format_must_round_trip() {
        assert!(matches_date_format("2024-09-01", "Y-m-d"));
        assert!(!matches_date_format("2024-9-1", "Y-m-d"));
        assert!(matches_date_format("01/09/2024 14:05", "d/m/Y H:i"));
        assert!(matches_date_format("14:05", "H:i"));
        assert!(!matches_date_format("2024-13-01", "Y-m-d"));
    }

    #[test]
    fn patterns() {
        let re = compile_pattern("/^[a-z]{3}$/i").unwrap();
        assert!(re.is_match("ABC"));
        let re = compile_pattern("^S[0-9]+$").unwrap();
        assert!(re.is_match("S100"));
        assert!(!re.is_match("s100"));
        assert!(compile_pattern("/([a-z/").is_err());
    }
}
