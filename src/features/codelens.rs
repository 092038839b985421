//! Code lenses advertising the schema each document validates against.
use crate::ast::YamlDocument;
use crate::parser::TextIndex;
use lsp_types::{CodeLens, Command, Position, Range};
use serde_json::json;

pub(crate) const JUMP_TO_SCHEMA_COMMAND: &str = "jumpToSchema";

/// One unresolved lens per schema URI, anchored at the document's first
/// content line.
pub fn lenses_for_document(
    doc: &YamlDocument,
    text: &str,
    index: &TextIndex,
    schema_uris: &[String],
) -> Vec<CodeLens> {
    let anchor = match doc.root {
        Some(root) => index.position_at(text, doc.node(root).offset),
        None => Position::new(0, 0),
    };
    let range = Range {
        start: Position::new(anchor.line, 0),
        end: Position::new(anchor.line, 0),
    };
    schema_uris
        .iter()
        .map(|uri| CodeLens {
            range,
            command: None,
            data: Some(json!({ "schemaUri": uri })),
        })
        .collect()
}

/// Fill in the jump command from the lens data.
pub fn resolve_code_lens(mut lens: CodeLens) -> CodeLens {
    if lens.command.is_some() {
        return lens;
    }
    let uri = lens
        .data
        .as_ref()
        .and_then(|data| data.get("schemaUri"))
        .and_then(|value| value.as_str())
        .map(str::to_string);
    if let Some(uri) = uri {
        lens.command = Some(Command {
            title: schema_title(&uri),
            command: JUMP_TO_SCHEMA_COMMAND.to_string(),
            arguments: Some(vec![json!(uri)]),
        });
    }
    lens
}

fn schema_title(uri: &str) -> String {
    uri.rsplit(|c| c == '/' || c == '#')
        .find(|s| !s.is_empty())
        .unwrap_or(uri)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser;

    #[test]
    fn lens_resolves_to_jump_command() {
        let text = "a: 1\n";
        let stream = parser::parse(text);
        let doc = &stream.documents[0];
        let lenses = lenses_for_document(
            doc,
            text,
            &stream.index,
            &["https://example.test/config.schema.json".to_string()],
        );
        assert_eq!(lenses.len(), 1);
        assert!(lenses[0].command.is_none());
        let resolved = resolve_code_lens(lenses[0].clone());
        let command = resolved.command.unwrap();
        assert_eq!(command.command, JUMP_TO_SCHEMA_COMMAND);
        assert_eq!(command.title, "config.schema.json");
    }
}
