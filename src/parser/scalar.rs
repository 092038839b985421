//! Scalar typing and source-span recovery.
//!
//! The tokenizer reports scalar values and start markers but not their
//! source extent; the helpers here re-scan the text to compute spans and
//! apply the implicit typing rules (core schema plus the YAML 1.1
//! boolean forms on plain scalars).
use crate::ast::NodeKind;
use lazy_static::lazy_static;
use regex::Regex;
use yaml_rust2::scanner::TScalarStyle;

lazy_static! {
    static ref INT_RE: Regex = Regex::new(r"^[-+]?[0-9]+$").expect("Is a valid regex");
    static ref HEX_RE: Regex = Regex::new(r"^0x[0-9a-fA-F]+$").expect("Is a valid regex");
    static ref OCT_RE: Regex = Regex::new(r"^0o[0-7]+$").expect("Is a valid regex");
    static ref FLOAT_RE: Regex =
        Regex::new(r"^[-+]?(\.[0-9]+|[0-9]+(\.[0-9]*)?)([eE][-+]?[0-9]+)?$")
            .expect("Is a valid regex");
}

/// The YAML 1.1 boolean forms accepted on plain scalars in addition to
/// the core `true`/`false`.
const TRUE_FORMS: &[&str] = &["true", "True", "TRUE", "y", "Y", "yes", "Yes", "YES", "on", "On", "ON"];
const FALSE_FORMS: &[&str] = &["false", "False", "FALSE", "n", "N", "no", "No", "NO", "off", "Off", "OFF"];

pub(crate) fn boolean_form(value: &str) -> Option<bool> {
    if TRUE_FORMS.contains(&value) {
        return Some(true);
    }
    if FALSE_FORMS.contains(&value) {
        return Some(false);
    }
    None
}

fn is_null_form(value: &str) -> bool {
    matches!(value, "" | "~" | "null" | "Null" | "NULL")
}

fn parse_number(value: &str) -> Option<f64> {
    if INT_RE.is_match(value) {
        return value.parse::<f64>().ok();
    }
    if let Some(hex) = value.strip_prefix("0x") {
        if HEX_RE.is_match(value) {
            return i64::from_str_radix(hex, 16).ok().map(|n| n as f64);
        }
    }
    if let Some(oct) = value.strip_prefix("0o") {
        if OCT_RE.is_match(value) {
            return i64::from_str_radix(oct, 8).ok().map(|n| n as f64);
        }
    }
    if FLOAT_RE.is_match(value) && value.bytes().any(|b| b.is_ascii_digit()) {
        return value.parse::<f64>().ok();
    }
    match value {
        ".inf" | ".Inf" | ".INF" | "+.inf" | "+.Inf" | "+.INF" => Some(f64::INFINITY),
        "-.inf" | "-.Inf" | "-.INF" => Some(f64::NEG_INFINITY),
        ".nan" | ".NaN" | ".NAN" => Some(f64::NAN),
        _ => None,
    }
}

fn number_kind(value: f64) -> NodeKind {
    NodeKind::Number {
        value,
        is_integer: value.fract() == 0.0,
    }
}

/// Implicit typing for a plain scalar per the core schema, with the
/// extended boolean forms.
pub(crate) fn implicit_kind(value: &str) -> NodeKind {
    if is_null_form(value) {
        return NodeKind::Null;
    }
    if let Some(b) = boolean_form(value) {
        return NodeKind::Boolean(b);
    }
    if let Some(n) = parse_number(value) {
        return number_kind(n);
    }
    NodeKind::String(value.to_string())
}

/// Typing for a tagged scalar. Core-schema tags force the type when the
/// value parses; otherwise the node falls back to String.
pub(crate) fn tagged_kind(value: &str, tag: &str) -> NodeKind {
    match tag {
        "tag:yaml.org,2002:str" => NodeKind::String(value.to_string()),
        "tag:yaml.org,2002:null" => NodeKind::Null,
        "tag:yaml.org,2002:bool" => match boolean_form(value) {
            Some(b) => NodeKind::Boolean(b),
            None => NodeKind::String(value.to_string()),
        },
        "tag:yaml.org,2002:int" | "tag:yaml.org,2002:float" => match parse_number(value) {
            Some(n) => number_kind(n),
            None => NodeKind::String(value.to_string()),
        },
        _ => NodeKind::String(value.to_string()),
    }
}

pub(crate) fn scalar_kind(value: &str, style: TScalarStyle, tag: Option<&str>) -> NodeKind {
    match tag {
        Some(tag) if tag.starts_with("tag:yaml.org,2002:") => tagged_kind(value, tag),
        // Custom/unknown tags keep the scalar textual; the builder
        // downgrades kind mismatches separately.
        Some(_) => NodeKind::String(value.to_string()),
        None => {
            if style == TScalarStyle::Plain {
                implicit_kind(value)
            } else {
                NodeKind::String(value.to_string())
            }
        }
    }
}

/// Compute the byte length of a scalar token starting at `start`.
///
/// Plain scalars span to the end of their line (comments and flow
/// terminators excluded); quoted scalars scan to the matching close
/// quote; block scalars consume the indented block under the indicator.
pub(crate) fn scalar_source_length(
    text: &str,
    start: usize,
    style: TScalarStyle,
    in_flow: bool,
) -> usize {
    let bytes = text.as_bytes();
    let len = bytes.len();
    if start >= len {
        return 0;
    }
    match style {
        TScalarStyle::DoubleQuoted => {
            let mut i = start + 1;
            while i < len {
                match bytes[i] {
                    b'\\' => i += 2,
                    b'"' => return i + 1 - start,
                    _ => i += 1,
                }
            }
            len - start
        }
        TScalarStyle::SingleQuoted => {
            let mut i = start + 1;
            while i < len {
                if bytes[i] == b'\'' {
                    if i + 1 < len && bytes[i + 1] == b'\'' {
                        i += 2;
                        continue;
                    }
                    return i + 1 - start;
                }
                i += 1;
            }
            len - start
        }
        TScalarStyle::Literal | TScalarStyle::Folded => {
            // Block content must be indented past the indicator's line.
            let mut base_line_start = start;
            while base_line_start > 0 && bytes[base_line_start - 1] != b'\n' {
                base_line_start -= 1;
            }
            let base_indent = content_start(bytes, base_line_start) - base_line_start;
            let header_end = line_end(bytes, start);
            let mut end = header_end;
            let mut i = header_end;
            while i < len && bytes[i] == b'\n' {
                let line_start = i + 1;
                let content = content_start(bytes, line_start);
                let line_stop = line_end(bytes, line_start);
                let blank = content >= line_stop;
                if !blank && content - line_start <= base_indent {
                    break;
                }
                if !blank {
                    end = line_stop;
                }
                i = line_stop;
            }
            trim_trailing_space(bytes, start, end) - start
        }
        _ => {
            let mut i = start;
            while i < len {
                let b = bytes[i];
                if b == b'\n' || b == b'\r' {
                    break;
                }
                if in_flow && matches!(b, b',' | b']' | b'}') {
                    break;
                }
                if b == b'#' && i > start && (bytes[i - 1] == b' ' || bytes[i - 1] == b'\t') {
                    break;
                }
                i += 1;
            }
            trim_trailing_space(bytes, start, i) - start
        }
    }
}

fn line_end(bytes: &[u8], from: usize) -> usize {
    let mut i = from;
    while i < bytes.len() && bytes[i] != b'\n' {
        i += 1;
    }
    i
}

fn content_start(bytes: &[u8], line_start: usize) -> usize {
    let mut i = line_start;
    while i < bytes.len() && bytes[i] == b' ' {
        i += 1;
    }
    i
}

fn trim_trailing_space(bytes: &[u8], start: usize, end: usize) -> usize {
    let mut end = end;
    while end > start && matches!(bytes[end - 1], b' ' | b'\t' | b'\n' | b'\r') {
        end -= 1;
    }
    end
}

/// Scan backwards from a node start for its `&anchor` token, skipping an
/// interleaved tag token if present.
pub(crate) fn anchor_token_before(text: &str, node_start: usize) -> Option<(String, usize)> {
    let bytes = text.as_bytes();
    let mut end = node_start.min(bytes.len());
    for _ in 0..3 {
        while end > 0 && (bytes[end - 1] as char).is_whitespace() {
            end -= 1;
        }
        if end == 0 {
            return None;
        }
        let mut start = end;
        while start > 0 && !(bytes[start - 1] as char).is_whitespace() {
            start -= 1;
        }
        match bytes[start] {
            b'&' => {
                let name = text[start + 1..end].to_string();
                if name.is_empty() {
                    return None;
                }
                return Some((name, start));
            }
            b'!' => {
                // Tag token between anchor and node; keep looking.
                end = start;
            }
            _ => return None,
        }
    }
    None
}

/// Read the `*alias` token at `start`; returns the alias name and the
/// token's byte length.
pub(crate) fn alias_token_at(text: &str, start: usize) -> Option<(String, usize)> {
    let rest = text.get(start..)?;
    let rest = rest.strip_prefix('*')?;
    let name: String = rest
        .chars()
        .take_while(|c| !c.is_whitespace() && !matches!(c, ',' | '[' | ']' | '{' | '}'))
        .collect();
    if name.is_empty() {
        return None;
    }
    let length = 1 + name.len();
    Some((name, length))
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("true", Some(true); "canonical true")]
    #[test_case("yes", Some(true); "extended yes")]
    #[test_case("OFF", Some(false); "extended off")]
    #[test_case("~", None; "tilde null")]
    #[test_case("", None; "empty null")]
    fn implicit_typing(value: &str, expected: Option<bool>) {
        match (implicit_kind(value), expected) {
            (NodeKind::Boolean(a), Some(b)) => assert_eq!(a, b),
            (NodeKind::Null, None) => {}
            (other, _) => panic!("unexpected kind {:?}", other),
        }
    }

    #[test_case("42", 42.0, true)]
    #[test_case("-7", -7.0, true)]
    #[test_case("0x1F", 31.0, true)]
    #[test_case("0o17", 15.0, true)]
    #[test_case("1.0", 1.0, true; "float valued integer")]
    #[test_case("2.5", 2.5, false)]
    #[test_case("1e3", 1000.0, true)]
    fn numeric_typing(text: &str, expected: f64, integer: bool) {
        match implicit_kind(text) {
            NodeKind::Number { value, is_integer } => {
                assert_eq!(value, expected);
                assert_eq!(is_integer, integer);
            }
            other => panic!("expected number, got {:?}", other),
        }
    }

    #[test]
    fn quoted_bools_stay_strings() {
        match scalar_kind("yes", TScalarStyle::SingleQuoted, None) {
            NodeKind::String(s) => assert_eq!(s, "yes"),
            other => panic!("expected string, got {:?}", other),
        }
    }

    #[test]
    fn plain_span_stops_at_comment() {
        let text = "key: value # trailing";
        assert_eq!(scalar_source_length(text, 5, TScalarStyle::Plain, false), 5);
    }

    #[test]
    fn double_quoted_span_handles_escapes() {
        let text = r#"k: "a\"b" "#;
        assert_eq!(scalar_source_length(text, 3, TScalarStyle::DoubleQuoted, false), 6);
    }

    #[test]
    fn block_scalar_spans_its_indented_block() {
        let text = "key: |\n  line one\n  line two\nnext: 1\n";
        let length = scalar_source_length(text, 5, TScalarStyle::Literal, false);
        assert_eq!(&text[5..5 + length], "|\n  line one\n  line two");
    }

    #[test]
    fn anchor_recovered_behind_node() {
        let text = "a: &x {p: 1}";
        let (name, offset) = anchor_token_before(text, 6).unwrap();
        assert_eq!(name, "x");
        assert_eq!(offset, 3);
    }

    #[test]
    fn alias_token_parses() {
        let (name, length) = alias_token_at("b: *x\n", 3).unwrap();
        assert_eq!(name, "x");
        assert_eq!(length, 2);
    }
}
