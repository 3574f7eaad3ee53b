//! libpq `key=value` tokenizer and quoting rules
//!
//! Parsing is best effort:
//! - Tokens look like `key = value`, whitespace around `=` is allowed
//! - A value is a single-quoted run ending at the first `'` followed by
//!   whitespace or end of input, or else a run of non-whitespace characters
//! - Spans that do not look like a token are skipped, never reported

use std::sync::OnceLock;

use regex::Regex;

static KEY_PATTERN: OnceLock<Regex> = OnceLock::new();

fn key_pattern() -> &'static Regex {
    KEY_PATTERN.get_or_init(|| Regex::new(r"(\w+)\s*=\s*").expect("key pattern is a valid regex"))
}

/// Split a connection string into `(key, value)` pairs in textual order.
///
/// Duplicate keys are reported as many times as they appear; the caller
/// decides which occurrence wins.
pub(crate) fn parse_pairs(text: &str) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    let mut pos = 0;

    while pos < text.len() {
        let Some(caps) = key_pattern().captures_at(text, pos) else {
            break;
        };
        let (Some(token), Some(key)) = (caps.get(0), caps.get(1)) else {
            break;
        };

        let value_start = token.end();
        let (raw, end) = match quoted_value(text, value_start) {
            Some(found) => found,
            None => unquoted_value(text, value_start),
        };

        pairs.push((key.as_str().to_string(), dequote(raw)));
        pos = end.max(token.end());
    }

    pairs
}

/// Match `'...'` starting at `start`.
///
/// Returns the body between the quotes and the offset just past the closing
/// quote. The closing quote must be followed by whitespace or end of input,
/// and the body may not span a newline.
fn quoted_value(text: &str, start: usize) -> Option<(&str, usize)> {
    let rest = &text[start..];
    if !rest.starts_with('\'') {
        return None;
    }

    let body_start = start + 1;
    let mut chars = text[body_start..].char_indices().peekable();
    while let Some((offset, c)) = chars.next() {
        match c {
            '\n' => return None,
            '\'' => {
                let terminated = match chars.peek() {
                    None => true,
                    Some((_, next)) => next.is_whitespace(),
                };
                if terminated {
                    let close = body_start + offset;
                    return Some((&text[body_start..close], close + 1));
                }
            }
            _ => {}
        }
    }

    None
}

fn unquoted_value(text: &str, start: usize) -> (&str, usize) {
    let rest = &text[start..];
    let len = rest.find(char::is_whitespace).unwrap_or(rest.len());
    (&rest[..len], start + len)
}

fn dequote(raw: &str) -> String {
    raw.replace("\\'", "'").replace("\\\\", "\\")
}

/// Escape a value for the canonical `key=value` form.
///
/// Newlines are never legal in a connection string and become spaces.
pub(crate) fn quote(value: &str) -> String {
    let escaped = value
        .replace('\\', "\\\\")
        .replace('\'', "\\'")
        .replace('\n', " ");
    if escaped.chars().any(char::is_whitespace) {
        format!("'{}'", escaped)
    } else {
        escaped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(text: &str) -> Vec<(String, String)> {
        parse_pairs(text)
    }

    fn kv(k: &str, v: &str) -> (String, String) {
        (k.to_string(), v.to_string())
    }

    #[test]
    fn test_simple_pairs() {
        assert_eq!(
            pairs("host=1.2.3.4 dbname=mydb port=5432"),
            vec![kv("host", "1.2.3.4"), kv("dbname", "mydb"), kv("port", "5432")]
        );
    }

    #[test]
    fn test_whitespace_around_equals() {
        assert_eq!(pairs("host = db1   port =5432"), vec![kv("host", "db1"), kv("port", "5432")]);
    }

    #[test]
    fn test_quoted_value_with_spaces() {
        assert_eq!(
            pairs("options='-c search_path=app' user=anon"),
            vec![kv("options", "-c search_path=app"), kv("user", "anon")]
        );
    }

    #[test]
    fn test_escaped_quote_inside_quotes() {
        assert_eq!(pairs(r"password='it\'s secret'"), vec![kv("password", "it's secret")]);
    }

    #[test]
    fn test_escaped_quote_unquoted() {
        assert_eq!(pairs(r"password=sec\'ret"), vec![kv("password", "sec'ret")]);
    }

    #[test]
    fn test_empty_quoted_value() {
        assert_eq!(pairs("password='' user=x"), vec![kv("password", ""), kv("user", "x")]);
    }

    #[test]
    fn test_unterminated_quote_taken_verbatim() {
        assert_eq!(pairs("password='abc user=x"), vec![kv("password", "'abc"), kv("user", "x")]);
    }

    #[test]
    fn test_garbage_is_skipped() {
        assert_eq!(pairs("!!! host=db === junk port=1"), vec![kv("host", "db"), kv("port", "1")]);
        assert!(pairs("no tokens here").is_empty());
        assert!(pairs("").is_empty());
    }

    #[test]
    fn test_trailing_equals_yields_empty_value() {
        assert_eq!(pairs("host="), vec![kv("host", "")]);
    }

    #[test]
    fn test_quote_rules() {
        assert_eq!(quote("plain"), "plain");
        assert_eq!(quote("two words"), "'two words'");
        assert_eq!(quote("sec'ret"), r"sec\'ret");
        assert_eq!(quote(r"back\slash"), r"back\\slash");
        assert_eq!(quote("line\nbreak"), "'line break'");
    }
}
