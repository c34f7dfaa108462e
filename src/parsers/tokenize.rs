//! Low-level tokenizing shared by the text parsers.
//!
//! OVS tools print values in a small common notation: bare words, quoted
//! strings with backslash escapes, `[a, b]` sets and `{k=v, k2="v 2"}` maps.
//! Splitting is always quote- and bracket-aware.

use crate::model::Attributes;

/// Split `s` on `sep` where it is not inside quotes or brackets.
pub fn split_top_level(s: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth: i32 = 0;
    let mut in_quotes = false;
    let mut escaped = false;
    let mut start = 0;

    for (idx, ch) in s.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            '(' | '[' | '{' if !in_quotes => depth += 1,
            ')' | ']' | '}' if !in_quotes => depth = (depth - 1).max(0),
            c if c == sep && !in_quotes && depth == 0 => {
                parts.push(&s[start..idx]);
                start = idx + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&s[start..]);
    parts
}

/// Split `token` at the first `sep` outside quotes into trimmed key and value.
pub fn split_key_value(token: &str, sep: char) -> Option<(&str, &str)> {
    let mut in_quotes = false;
    for (idx, ch) in token.char_indices() {
        match ch {
            '"' => in_quotes = !in_quotes,
            c if c == sep && !in_quotes => {
                let key = token[..idx].trim();
                if key.is_empty() {
                    return None;
                }
                return Some((key, token[idx + c.len_utf8()..].trim()));
            }
            _ => {}
        }
    }
    None
}

/// Remove surrounding quotes and resolve backslash escapes.
pub fn unquote(s: &str) -> String {
    let trimmed = s.trim();
    if trimmed.len() >= 2 && trimmed.starts_with('"') && trimmed.ends_with('"') {
        let inner = &trimmed[1..trimmed.len() - 1];
        let mut out = String::with_capacity(inner.len());
        let mut chars = inner.chars();
        while let Some(c) = chars.next() {
            if c == '\\' {
                if let Some(next) = chars.next() {
                    out.push(next);
                }
            } else {
                out.push(c);
            }
        }
        out
    } else {
        trimmed.to_string()
    }
}

/// Parse an OVS set (`[a, b]`, `[]`, or a bare scalar).
pub fn parse_set(s: &str) -> Vec<String> {
    let trimmed = s.trim();
    let inner = match trimmed.strip_prefix('[').and_then(|t| t.strip_suffix(']')) {
        Some(inner) => inner,
        None if trimmed.is_empty() => return Vec::new(),
        None => return vec![unquote(trimmed)],
    };
    split_top_level(inner, ',')
        .into_iter()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(unquote)
        .collect()
}

/// Parse an OVS map (`{k=v, k2="v 2"}`). Entries without `=` are skipped.
pub fn parse_map(s: &str) -> Attributes {
    let trimmed = s.trim();
    let inner = trimmed
        .strip_prefix('{')
        .and_then(|t| t.strip_suffix('}'))
        .unwrap_or(trimmed);
    split_top_level(inner, ',')
        .into_iter()
        .filter_map(|entry| split_key_value(entry, '='))
        .map(|(k, v)| (unquote(k), unquote(v)))
        .collect()
}

/// Parse an unsigned integer, accepting a `0x` hex prefix.
pub fn parse_u64(s: &str) -> Option<u64> {
    let trimmed = s.trim();
    match trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => trimmed.parse().ok(),
    }
}

pub fn parse_i64(s: &str) -> Option<i64> {
    s.trim().parse().ok()
}

/// Parse a duration printed as `120.5s` or `120.5`.
pub fn parse_seconds(s: &str) -> Option<f64> {
    let trimmed = s.trim();
    let number = trimmed.strip_suffix('s').unwrap_or(trimmed);
    number.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse an OVS boolean (`true`/`false`, optionally quoted).
pub fn parse_bool(s: &str) -> Option<bool> {
    match unquote(s).to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

/// A traffic counter as printed by the datapath.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Counter {
    Value(u64),
    /// Printed as `?`: the datapath does not track this counter.
    Unsupported,
    Negative(i64),
    Invalid,
}

pub fn parse_counter(s: &str) -> Counter {
    let trimmed = s.trim();
    if trimmed == "?" {
        return Counter::Unsupported;
    }
    if let Some(v) = parse_u64(trimmed) {
        return Counter::Value(v);
    }
    match trimmed.parse::<i64>() {
        Ok(v) if v < 0 => Counter::Negative(v),
        _ => Counter::Invalid,
    }
}

/// Value of an empty OVS column (`""`, `[]`, `{}`) reads as absent.
pub fn non_empty(s: &str) -> Option<String> {
    let value = unquote(s);
    match value.as_str() {
        "" | "[]" | "{}" => None,
        _ => Some(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_top_level_respects_nesting() {
        let parts = split_top_level(r#"a=1, b={x=1, y=2}, c="q, r", d=f(1,2)"#, ',');
        assert_eq!(
            parts.iter().map(|p| p.trim()).collect::<Vec<_>>(),
            vec!["a=1", "b={x=1, y=2}", r#"c="q, r""#, "d=f(1,2)"]
        );
    }

    #[test]
    fn test_split_key_value() {
        assert_eq!(split_key_value("name : br-int", ':'), Some(("name", "br-int")));
        assert_eq!(
            split_key_value(r#"error : "a: b""#, ':'),
            Some(("error", r#""a: b""#))
        );
        assert_eq!(split_key_value("no separator", '='), None);
        assert_eq!(split_key_value("=value", '='), None);
    }

    #[test]
    fn test_unquote() {
        assert_eq!(unquote(r#""veth1""#), "veth1");
        assert_eq!(unquote(r#""say \"hi\"""#), r#"say "hi""#);
        assert_eq!(unquote("bare"), "bare");
    }

    #[test]
    fn test_parse_set_and_map() {
        assert_eq!(parse_set("[a, b]"), vec!["a", "b"]);
        assert!(parse_set("[]").is_empty());
        assert_eq!(parse_set("single"), vec!["single"]);

        let map = parse_map(r#"{csum="true", key=flow, remote_ip="10.0.0.2"}"#);
        assert_eq!(map.get("csum").map(String::as_str), Some("true"));
        assert_eq!(map.get("key").map(String::as_str), Some("flow"));
        assert_eq!(map.get("remote_ip").map(String::as_str), Some("10.0.0.2"));
        assert!(parse_map("{}").is_empty());
    }

    #[test]
    fn test_numbers() {
        assert_eq!(parse_u64("0x1f"), Some(31));
        assert_eq!(parse_u64("42"), Some(42));
        assert_eq!(parse_u64("-1"), None);
        assert_eq!(parse_seconds("120.5s"), Some(120.5));
        assert_eq!(parse_counter("?"), Counter::Unsupported);
        assert_eq!(parse_counter("-3"), Counter::Negative(-3));
        assert_eq!(parse_counter("abc"), Counter::Invalid);
        assert_eq!(parse_counter("7"), Counter::Value(7));
    }
}
