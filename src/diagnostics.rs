//! Conversion of internal problems into LSP diagnostics.
use crate::parser::TextIndex;
use crate::problems::Problem;
use ahash::AHashSet;
use lsp_types::{Diagnostic, NumberOrString, Range};

/// Convert problems to diagnostics, dropping duplicates: the first
/// problem for each `(start position, message)` pair wins.
pub fn problems_to_diagnostics(
    problems: &[Problem],
    text: &str,
    index: &TextIndex,
) -> Vec<Diagnostic> {
    let mut seen: AHashSet<(u32, u32, String)> = AHashSet::new();
    let mut diagnostics = Vec::with_capacity(problems.len());
    for problem in problems {
        let start = index.position_at(text, problem.location.offset);
        let end = index.position_at(text, problem.location.offset + problem.location.length);
        if !seen.insert((start.line, start.character, problem.message.clone())) {
            continue;
        }
        let data = if problem.schema_uris.is_empty() {
            None
        } else {
            Some(serde_json::json!({ "schemaUri": problem.schema_uris }))
        };
        diagnostics.push(Diagnostic {
            range: Range { start, end },
            severity: Some(problem.severity),
            code: problem
                .code
                .map(|code| NumberOrString::Number(code.as_number())),
            code_description: None,
            source: Some(problem.source.clone()),
            message: problem.message.clone(),
            related_information: None,
            tags: None,
            data,
        });
    }
    diagnostics
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::problems::Problem;

    #[test]
    fn duplicate_problems_collapse_first_wins() {
        let text = "a: 1\n";
        let index = TextIndex::new(text);
        let mut first = Problem::warning(0, 1, "same message");
        first.schema_uris = vec!["https://example.test/a.json".to_string()];
        let second = Problem::warning(0, 1, "same message");
        let third = Problem::warning(0, 1, "different message");
        let diagnostics = problems_to_diagnostics(&[first, second, third], text, &index);
        assert_eq!(diagnostics.len(), 2);
        // The first of the duplicate pair kept its attribution.
        assert!(diagnostics[0].data.is_some());
    }

    #[test]
    fn ranges_map_to_lines() {
        let text = "a: 1\nb: 2\n";
        let index = TextIndex::new(text);
        let problem = Problem::warning(8, 1, "here");
        let diagnostics = problems_to_diagnostics(&[problem], text, &index);
        let range = diagnostics[0].range;
        assert_eq!((range.start.line, range.start.character), (1, 3));
        assert_eq!((range.end.line, range.end.character), (1, 4));
    }
}
