//! File-match glob patterns, compiled to regexes once at registration.
//!
//! Supported syntax: `*` (within a path segment), `?`, `**` (across
//! segments), and brace expansion `{a,b}`.
use regex::Regex;

/// Translate one glob into a regex body (no anchors).
pub fn glob_to_regex(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() * 2);
    let mut chars = pattern.chars().peekable();
    let mut brace_depth = 0usize;
    while let Some(c) = chars.next() {
        match c {
            '*' => {
                if chars.peek() == Some(&'*') {
                    chars.next();
                    // `**/` may match nothing at all.
                    if chars.peek() == Some(&'/') {
                        chars.next();
                        out.push_str("(?:.*[/\\\\])?");
                    } else {
                        out.push_str(".*");
                    }
                } else {
                    out.push_str("[^/\\\\]*");
                }
            }
            '?' => out.push_str("[^/\\\\]"),
            '{' => {
                brace_depth += 1;
                out.push_str("(?:");
            }
            '}' if brace_depth > 0 => {
                brace_depth -= 1;
                out.push(')');
            }
            ',' if brace_depth > 0 => out.push('|'),
            '/' => out.push_str("[/\\\\]"),
            c if "\\^$.|?*+()[]{}".contains(c) => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out
}

/// Compile a set of globs into one alternation matched against resource
/// URIs. Patterns are suffix-anchored at a path-segment boundary, so
/// `*.yaml` matches any basename and `folder/*.yaml` any matching
/// suffix path.
pub fn compile_patterns(patterns: &[String]) -> Option<Regex> {
    let bodies: Vec<String> = patterns
        .iter()
        .filter(|p| !p.is_empty())
        .map(|p| glob_to_regex(p.trim_start_matches('/')))
        .collect();
    if bodies.is_empty() {
        return None;
    }
    let source = format!("(?:^|[/\\\\])(?:{})$", bodies.join("|"));
    match Regex::new(&source) {
        Ok(regex) => Some(regex),
        Err(error) => {
            tracing::warn!(pattern = %source, %error, "dropping unparsable file-match pattern");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn matches(pattern: &str, path: &str) -> bool {
        compile_patterns(&[pattern.to_string()])
            .map(|re| re.is_match(path))
            .unwrap_or(false)
    }

    #[test_case("*.yaml", "file:///work/deploy.yaml", true)]
    #[test_case("*.yaml", "file:///work/deploy.yml", false)]
    #[test_case("*.y?ml", "file:///work/deploy.yaml", true)]
    #[test_case("*.{yml,yaml}", "file:///work/deploy.yml", true)]
    #[test_case("*.{yml,yaml}", "file:///work/deploy.yaml", true)]
    #[test_case("**/ci/*.yml", "file:///repo/sub/ci/build.yml", true; "double_star_nested")]
    #[test_case("**/ci/*.yml", "file:///repo/ci/build.yml", true; "double_star_top_level")]
    #[test_case("ci/*.yml", "file:///repo/ci/build.yml", true; "plain_prefix")]
    #[test_case("ci/*.yml", "file:///repo/other/build.yml", false)]
    #[test_case(".github/workflows/*", "file:///r/.github/workflows/test.yaml", true)]
    fn pattern_matching(pattern: &str, path: &str, expected: bool) {
        assert_eq!(matches(pattern, path), expected);
    }

    #[test]
    fn dots_are_literal() {
        assert!(!matches("*.yaml", "file:///work/deployXyaml"));
    }
}
