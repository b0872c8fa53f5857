//! Quote-aware splitting of INSERT value lists.
//!
//! Field tokens keep their original textual form (quotes, escapes, `NULL`),
//! so a token can be written back unchanged or compared byte-for-byte with
//! tokens from other tables.

/// Tracks whether a byte stream is inside a single-quoted SQL literal.
///
/// MySQL escapes quotes inside literals with a backslash (`\'`); a doubled
/// quote (`''`) toggles the state twice and therefore also works.
#[derive(Debug, Default, Clone, Copy)]
pub struct QuoteState {
    in_string: bool,
    escape_next: bool,
}

impl QuoteState {
    /// Feed one byte. Returns `true` if the byte is structural, i.e. outside
    /// any literal and not a quote character.
    #[inline]
    pub fn feed(&mut self, b: u8) -> bool {
        if self.escape_next {
            self.escape_next = false;
            return false;
        }
        if self.in_string {
            if b == b'\\' {
                self.escape_next = true;
            } else if b == b'\'' {
                self.in_string = false;
            }
            return false;
        }
        if b == b'\'' {
            self.in_string = true;
            return false;
        }
        true
    }

    /// Feed one char; non-ASCII chars never change the state
    #[inline]
    pub fn feed_char(&mut self, ch: char) -> bool {
        if ch.is_ascii() {
            self.feed(ch as u8)
        } else {
            self.feed(0x80)
        }
    }

    /// Feed bytes until a structural `;` is seen. Returns whether one was found.
    pub fn feed_until_terminator(&mut self, bytes: &[u8]) -> bool {
        for &b in bytes {
            if self.feed(b) && b == b';' {
                return true;
            }
        }
        false
    }

    /// Whether the stream currently sits inside a literal
    pub fn in_literal(&self) -> bool {
        self.in_string
    }
}

/// Split the value section of an INSERT into per-row fragments.
///
/// Each fragment is a top-level parenthesized group, parentheses included.
/// Commas, whitespace and the terminator between groups are dropped; `),(`
/// inside a literal does not split. An unbalanced trailing group is returned
/// as-is so that the field count check downstream reports it.
pub fn split_rows(values: &str) -> Vec<&str> {
    let mut rows = Vec::new();
    let mut state = QuoteState::default();
    let mut depth = 0usize;
    let mut start = None;

    for (i, b) in values.bytes().enumerate() {
        if !state.feed(b) {
            continue;
        }
        match b {
            b'(' => {
                if depth == 0 {
                    start = Some(i);
                }
                depth += 1;
            }
            b')' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    if let Some(s) = start.take() {
                        rows.push(&values[s..=i]);
                    }
                }
            }
            _ => {}
        }
    }

    if let Some(s) = start {
        rows.push(&values[s..]);
    }

    rows
}

/// Split one row fragment into field tokens.
///
/// Surrounding whitespace, semicolons and one enclosing pair of parentheses
/// are stripped first. Commas split only outside literals and outside nested
/// parentheses (function calls such as `NOW()`). Backticks outside literals
/// are dropped; literal text is kept verbatim.
pub fn split_fields(row: &str) -> Vec<String> {
    let inner = strip_row_delimiters(row);
    if inner.trim().is_empty() {
        return Vec::new();
    }

    let mut fields = Vec::new();
    let mut current = String::new();
    let mut state = QuoteState::default();
    let mut depth = 0usize;

    for ch in inner.chars() {
        if !state.feed_char(ch) {
            current.push(ch);
            continue;
        }
        match ch {
            '`' => {}
            '(' => {
                depth += 1;
                current.push(ch);
            }
            ')' => {
                depth = depth.saturating_sub(1);
                current.push(ch);
            }
            ',' if depth == 0 => {
                fields.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(ch),
        }
    }
    fields.push(current.trim().to_string());

    fields
}

fn strip_row_delimiters(row: &str) -> &str {
    let s = row.trim_matches(|c: char| c.is_whitespace() || c == ';');
    let s = s.strip_prefix('(').unwrap_or(s);
    s.strip_suffix(')').unwrap_or(s)
}

/// Whether a raw token is the SQL `NULL` literal
#[inline]
pub fn is_null_literal(token: &str) -> bool {
    token.eq_ignore_ascii_case("NULL")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_fields_basic() {
        assert_eq!(split_fields("(1,'a',NULL)"), vec!["1", "'a'", "NULL"]);
        assert_eq!(split_fields("(1, 'a', 2.5);"), vec!["1", "'a'", "2.5"]);
    }

    #[test]
    fn test_split_fields_commas_inside_literals() {
        assert_eq!(
            split_fields("(1,'Smith, John','x,y,z')"),
            vec!["1", "'Smith, John'", "'x,y,z'"]
        );
    }

    #[test]
    fn test_split_fields_escaped_quotes() {
        assert_eq!(
            split_fields(r"(1,'it\'s, fine','ok')"),
            vec!["1", r"'it\'s, fine'", "'ok'"]
        );
        assert_eq!(
            split_fields("(1,'it''s, fine')"),
            vec!["1", "'it''s, fine'"]
        );
    }

    #[test]
    fn test_split_fields_backticks_and_functions() {
        assert_eq!(split_fields("(`1`,NOW(),'a`b')"), vec!["1", "NOW()", "'a`b'"]);
        assert_eq!(split_fields("(1,CONCAT('a','b'))"), vec!["1", "CONCAT('a','b')"]);
    }

    #[test]
    fn test_split_fields_empty_and_trailing() {
        assert!(split_fields("()").is_empty());
        assert_eq!(split_fields("(1,)"), vec!["1", ""]);
        assert_eq!(split_fields("('')"), vec!["''"]);
    }

    #[test]
    fn test_split_fields_paren_inside_literal_at_end() {
        assert_eq!(split_fields("(1,'a)')"), vec!["1", "'a)'"]);
    }

    #[test]
    fn test_split_rows() {
        let rows = split_rows(" (1,'a'),(2,'b'),\n(3,'c');");
        assert_eq!(rows, vec!["(1,'a')", "(2,'b')", "(3,'c')"]);
    }

    #[test]
    fn test_split_rows_delimiter_inside_literal() {
        let rows = split_rows("(1,'x),(y'),(2,'z')");
        assert_eq!(rows, vec!["(1,'x),(y')", "(2,'z')"]);
    }

    #[test]
    fn test_split_rows_unbalanced_tail() {
        let rows = split_rows("(1,'a'),(2,'b'");
        assert_eq!(rows, vec!["(1,'a')", "(2,'b'"]);
    }

    #[test]
    fn test_quote_state_terminator() {
        let mut state = QuoteState::default();
        assert!(!state.feed_until_terminator(b"INSERT INTO t VALUES ('a;"));
        assert!(state.in_literal());
        assert!(state.feed_until_terminator(b"b');"));
        assert!(!state.in_literal());
    }

    #[test]
    fn test_non_ascii_literals() {
        assert_eq!(
            split_fields("(1,'Müller, Zoë','東京')"),
            vec!["1", "'Müller, Zoë'", "'東京'"]
        );
    }

    #[test]
    fn test_is_null_literal() {
        assert!(is_null_literal("NULL"));
        assert!(is_null_literal("null"));
        assert!(!is_null_literal("'NULL'"));
    }
}
