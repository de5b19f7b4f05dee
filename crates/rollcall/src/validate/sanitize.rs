//! Caller-invoked input cleanup. Validation never runs these itself.

use super::FormData;

/// Trim every value and HTML-escape `& < > " '`.
pub fn sanitize(data: &FormData) -> FormData {
    data.iter()
        .map(|(key, value)| (key.clone(), escape_html(value.trim())))
        .collect()
}

/// Strip HTML tags, then trim.
pub fn clean(value: &str) -> String {
    strip_tags(value).trim().to_string()
}

pub fn escape_html(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            other => out.push(other),
        }
    }
    out
}

/// Remove everything between `<` and the next `>`. An unclosed tag drops the rest.
pub fn strip_tags(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut in_tag = false;
    for c in value.chars() {
        match (in_tag, c) {
            (false, '<') => in_tag = true,
            (true, '>') => in_tag = false,
            (false, other) => out.push(other),
            (true, _) => {}
        }
    }
    out
}
