//! `format` keyword table. Formats are regex-checked except the URI
//! family, which goes through a real URI parser, and the IP formats,
//! which use the standard library's address parsers.
use lazy_static::lazy_static;
use regex::Regex;
use std::net::{Ipv4Addr, Ipv6Addr};
use url::Url;

lazy_static! {
    static ref COLOR_HEX_RE: Regex =
        Regex::new(r"^#([0-9A-Fa-f]{3,4}|[0-9A-Fa-f]{6}|[0-9A-Fa-f]{8})$")
            .expect("Is a valid regex");
    static ref DATE_RE: Regex =
        Regex::new(r"^(\d{4})-(0[1-9]|1[0-2])-(0[1-9]|[12][0-9]|3[01])$")
            .expect("Is a valid regex");
    static ref TIME_RE: Regex = Regex::new(
        r"(?i)^([01][0-9]|2[0-3]):([0-5][0-9]):([0-5][0-9]|60)(\.[0-9]+)?(Z|[+-]([01][0-9]|2[0-3]):([0-5][0-9]))$"
    )
    .expect("Is a valid regex");
    static ref DATE_TIME_RE: Regex = Regex::new(
        r"(?i)^(\d{4})-(0[1-9]|1[0-2])-(0[1-9]|[12][0-9]|3[01])T([01][0-9]|2[0-3]):([0-5][0-9]):([0-5][0-9]|60)(\.[0-9]+)?(Z|[+-]([01][0-9]|2[0-3]):([0-5][0-9]))$"
    )
    .expect("Is a valid regex");
    static ref EMAIL_RE: Regex = Regex::new(
        r#"^(([^<>()\[\]\\.,;:\s@"]+(\.[^<>()\[\]\\.,;:\s@"]+)*)|(".+"))@((\[[0-9.]+\])|(([a-zA-Z\-0-9]+\.)+[a-zA-Z]{2,}))$"#
    )
    .expect("Is a valid regex");
}

/// Check `value` against a named format. Returns an error message when
/// the value does not conform; unknown formats are ignored.
pub(crate) fn check_format(format: &str, value: &str) -> Option<String> {
    match format {
        "color-hex" => (!COLOR_HEX_RE.is_match(value)).then(|| {
            "Invalid color format. Use #RGB, #RGBA, #RRGGBB or #RRGGBBAA.".to_string()
        }),
        "date-time" => (!DATE_TIME_RE.is_match(value))
            .then(|| "String is not a RFC3339 date-time.".to_string()),
        "date" => (!DATE_RE.is_match(value)).then(|| "String is not a RFC3339 date.".to_string()),
        "time" => (!TIME_RE.is_match(value)).then(|| "String is not a RFC3339 time.".to_string()),
        "email" => {
            (!EMAIL_RE.is_match(value)).then(|| "String is not an e-mail address.".to_string())
        }
        "ipv4" => value
            .parse::<Ipv4Addr>()
            .is_err()
            .then(|| "String does not match IPv4 format.".to_string()),
        "ipv6" => value
            .parse::<Ipv6Addr>()
            .is_err()
            .then(|| "String does not match IPv6 format.".to_string()),
        "uri" | "uri-reference" => check_uri(format, value),
        _ => None,
    }
}

fn check_uri(format: &str, value: &str) -> Option<String> {
    if value.is_empty() {
        return Some("String is not a URI: URI expected.".to_string());
    }
    match Url::parse(value) {
        Ok(_) => None,
        Err(url::ParseError::RelativeUrlWithoutBase) if format == "uri-reference" => {
            (value.contains(char::is_whitespace))
                .then(|| "String is not a URI: URI is expected.".to_string())
        }
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            Some("String is not a URI: URI with a scheme is expected.".to_string())
        }
        Err(_) => Some("String is not a URI: URI is expected.".to_string()),
    }
}
