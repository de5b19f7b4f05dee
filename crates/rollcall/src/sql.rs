//! `?` placeholder handling.
//!
//! Builders render canonical `?` placeholders. PostgreSQL expects `$1..$n`, so the
//! connection rewrites them right before preparing. `?` inside string literals,
//! quoted identifiers and comments is left untouched.

#[derive(Clone, Copy, PartialEq, Eq)]
enum Scan {
    Code,
    SingleQuote,
    DoubleQuote,
    LineComment,
    BlockComment,
}

/// Walk `sql`, calling `emit(None)` for every `?` outside quotes and comments and
/// `emit(Some(c))` for every other character.
fn scan(sql: &str, mut emit: impl FnMut(Option<char>)) {
    let mut state = Scan::Code;
    let mut chars = sql.chars().peekable();

    while let Some(ch) = chars.next() {
        match state {
            Scan::Code => match ch {
                '?' => {
                    emit(None);
                    continue;
                }
                '\'' => state = Scan::SingleQuote,
                '"' => state = Scan::DoubleQuote,
                '-' if chars.peek() == Some(&'-') => state = Scan::LineComment,
                '/' if chars.peek() == Some(&'*') => {
                    emit(Some(ch));
                    if let Some(star) = chars.next() {
                        emit(Some(star));
                    }
                    state = Scan::BlockComment;
                    continue;
                }
                _ => {}
            },
            // Doubled quotes are an escaped quote: leaving and re-entering the
            // state on consecutive quotes gives the same result.
            Scan::SingleQuote if ch == '\'' => state = Scan::Code,
            Scan::DoubleQuote if ch == '"' => state = Scan::Code,
            Scan::LineComment if ch == '\n' => state = Scan::Code,
            Scan::BlockComment if ch == '*' && chars.peek() == Some(&'/') => {
                emit(Some(ch));
                if let Some(slash) = chars.next() {
                    emit(Some(slash));
                }
                state = Scan::Code;
                continue;
            }
            _ => {}
        }
        emit(Some(ch));
    }
}

/// Number of `?` placeholders in `sql`.
pub fn count_placeholders(sql: &str) -> usize {
    let mut count = 0;
    scan(sql, |event| {
        if event.is_none() {
            count += 1;
        }
    });
    count
}

/// Rewrite `?` placeholders to `$1..$n`.
pub fn number_placeholders(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len() + 8);
    let mut next = 0usize;
    scan(sql, |event| match event {
        Some(c) => out.push(c),
        None => {
            next += 1;
            out.push('$');
            out.push_str(&next.to_string());
        }
    });
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_in_order() {
        assert_eq!(
            number_placeholders("SELECT * FROM t WHERE a = ? AND b > ? LIMIT ?"),
            "SELECT * FROM t WHERE a = $1 AND b > $2 LIMIT $3"
        );
    }

    #[test]
    fn skips_string_literals_and_identifiers() {
        let sql = r#"SELECT '?', "we?ird" FROM t WHERE a = ? AND b = 'it''s ?'"#;
        assert_eq!(count_placeholders(sql), 1);
        assert_eq!(
            number_placeholders(sql),
            r#"SELECT '?', "we?ird" FROM t WHERE a = $1 AND b = 'it''s ?'"#
        );
    }

    #[test]
    fn skips_comments() {
        let sql = "SELECT 1 -- why?\nFROM t /* ? */ WHERE x = ?";
        assert_eq!(count_placeholders(sql), 1);
        assert_eq!(
            number_placeholders(sql),
            "SELECT 1 -- why?\nFROM t /* ? */ WHERE x = $1"
        );
    }

    #[test]
    fn numbers_past_nine_and_keeps_block_comment_delimiters() {
        let sql = format!("/* a */ VALUES ({})", vec!["?"; 11].join(", "));
        let numbered = number_placeholders(&sql);
        assert!(numbered.starts_with("/* a */ VALUES ($1, $2"));
        assert!(numbered.ends_with("$10, $11)"));
        assert_eq!(count_placeholders(&sql), 11);
    }

    #[test]
    fn no_placeholders() {
        assert_eq!(count_placeholders("SELECT lastval()"), 0);
        assert_eq!(number_placeholders("SELECT lastval()"), "SELECT lastval()");
    }
}
