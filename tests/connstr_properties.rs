//! Connection string codec properties

use std::collections::BTreeMap;

use pgsql_relation::ConnectionString;
use proptest::prelude::*;

fn key() -> impl Strategy<Value = String> {
    "[a-z_][a-z0-9_]{0,11}"
}

/// Printable, whitespace-free values, quotes and backslashes included.
fn bare_value() -> impl Strategy<Value = String> {
    "[!-~]{0,16}"
}

fn build(params: &BTreeMap<String, String>) -> ConnectionString {
    params
        .iter()
        .fold(ConnectionString::builder(), |b, (k, v)| b.set(k.clone(), v))
        .build()
}

proptest! {
    #[test]
    fn prop_format_parse_round_trip(
        params in prop::collection::btree_map(key(), bare_value(), 0..8)
    ) {
        let formatted = build(&params).to_string();
        let parsed = ConnectionString::parse(&formatted);

        let expected: BTreeMap<String, String> =
            params.into_iter().filter(|(_, v)| !v.is_empty()).collect();
        let actual: BTreeMap<String, String> =
            parsed.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        prop_assert_eq!(actual, expected);
    }

    #[test]
    fn prop_format_keys_sorted(
        params in prop::collection::btree_map(key(), "[a-z0-9 ]{1,12}", 0..8)
    ) {
        let formatted = build(&params).to_string();
        let keys: Vec<String> = ConnectionString::parse(&formatted)
            .keys()
            .map(str::to_string)
            .collect();
        let mut sorted = keys.clone();
        sorted.sort();
        prop_assert_eq!(&keys, &sorted);

        let mut last = 0;
        for (k, v) in &params {
            let expected = if v.contains(' ') {
                format!("{}='{}'", k, v)
            } else {
                format!("{}={}", k, v)
            };
            let at = formatted[last..].find(&expected);
            prop_assert!(
                at.is_some(),
                "{} not found after offset {} in {}",
                expected,
                last,
                formatted
            );
            last += at.unwrap_or(0) + expected.len();
        }
    }

    #[test]
    fn prop_explicit_keyword_wins(base in bare_value(), explicit in "[a-z0-9]{1,8}") {
        let host = if base.is_empty() { "x".to_string() } else { base };
        let text = format!("host={} port=5432", host);
        let cs = ConnectionString::with_overrides(&text, [("host", explicit.clone())]);
        prop_assert_eq!(cs.host(), Some(explicit.as_str()));
        prop_assert_eq!(cs.port(), Some("5432"));
    }

    #[test]
    fn prop_parse_never_panics(text in "\\PC{0,64}") {
        let cs = ConnectionString::parse(&text);
        let _ = cs.to_string();
        let _ = cs.uri();
    }
}
