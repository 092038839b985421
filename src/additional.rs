//! Schema-independent validators: flow-style policy, unused anchors,
//! key ordering. They run over the YAML tree next to schema validation
//! and contribute their own diagnostics.
use crate::ast::{NodeKind, YamlDocument};
use crate::parser::TextIndex;
use crate::settings::{FlowStylePolicy, LanguageSettings};
use lsp_types::{Diagnostic, DiagnosticSeverity, DiagnosticTag, NumberOrString, Range};

fn diagnostic(
    text: &str,
    index: &TextIndex,
    offset: usize,
    length: usize,
    severity: DiagnosticSeverity,
    code: &str,
    message: String,
) -> Diagnostic {
    Diagnostic {
        range: Range {
            start: index.position_at(text, offset),
            end: index.position_at(text, offset + length),
        },
        severity: Some(severity),
        code: Some(NumberOrString::String(code.to_string())),
        code_description: None,
        source: Some("YAML".to_string()),
        message,
        related_information: None,
        tags: None,
        data: None,
    }
}

/// Report flow-style collections when configuration forbids them.
pub fn validate_flow_style(
    doc: &YamlDocument,
    settings: &LanguageSettings,
    text: &str,
    index: &TextIndex,
) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    let root = match doc.root {
        Some(root) => root,
        None => return diagnostics,
    };
    doc.visit(root, &mut |id| {
        let node = doc.node(id);
        if node.source.flow {
            match &node.kind {
                NodeKind::Object { .. } if settings.flow_mapping == FlowStylePolicy::Forbid => {
                    diagnostics.push(diagnostic(
                        text,
                        index,
                        node.offset,
                        node.length,
                        DiagnosticSeverity::ERROR,
                        "flowMap",
                        "Flow style mapping is forbidden".to_string(),
                    ));
                }
                NodeKind::Array { .. } if settings.flow_sequence == FlowStylePolicy::Forbid => {
                    diagnostics.push(diagnostic(
                        text,
                        index,
                        node.offset,
                        node.length,
                        DiagnosticSeverity::ERROR,
                        "flowSeq",
                        "Flow style sequence is forbidden".to_string(),
                    ));
                }
                _ => {}
            }
        }
        true
    });
    diagnostics
}

/// Report anchors never targeted by an alias as unnecessary.
pub fn validate_unused_anchors(
    doc: &YamlDocument,
    text: &str,
    index: &TextIndex,
) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    for token in &doc.anchor_tokens {
        if doc.used_aliases.iter().any(|name| *name == token.name) {
            continue;
        }
        let mut diag = diagnostic(
            text,
            index,
            token.offset,
            token.length,
            DiagnosticSeverity::INFORMATION,
            "unusedAnchor",
            format!("Unused anchor \"&{}\"", token.name),
        );
        diag.tags = Some(vec![DiagnosticTag::UNNECESSARY]);
        diagnostics.push(diag);
    }
    diagnostics
}

/// Report the first out-of-order key of each mapping when key ordering
/// is enforced.
pub fn validate_key_ordering(
    doc: &YamlDocument,
    settings: &LanguageSettings,
    text: &str,
    index: &TextIndex,
) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    if !settings.key_ordering {
        return diagnostics;
    }
    let root = match doc.root {
        Some(root) => root,
        None => return diagnostics,
    };
    doc.visit(root, &mut |id| {
        if let NodeKind::Object { properties } = &doc.node(id).kind {
            let mut previous: Option<&str> = None;
            for prop in properties {
                let key = doc.property_key(*prop);
                if let Some(previous) = previous {
                    if key < previous {
                        let location = match &doc.node(*prop).kind {
                            NodeKind::Property { key: key_node, .. } => doc.node(*key_node),
                            _ => doc.node(*prop),
                        };
                        diagnostics.push(diagnostic(
                            text,
                            index,
                            location.offset,
                            location.length,
                            DiagnosticSeverity::ERROR,
                            "mapKeyOrder",
                            format!("Wrong ordering of key \"{}\" in mapping", key),
                        ));
                        break;
                    }
                }
                previous = Some(key);
            }
        }
        true
    });
    diagnostics
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser;

    fn settings(flow_map: FlowStylePolicy, flow_seq: FlowStylePolicy, ordering: bool) -> LanguageSettings {
        LanguageSettings {
            flow_mapping: flow_map,
            flow_sequence: flow_seq,
            key_ordering: ordering,
            ..LanguageSettings::default()
        }
    }

    #[test]
    fn forbidden_flow_styles_reported() {
        let text = "a: {x: 1}\nb: [1, 2]\n";
        let stream = parser::parse(text);
        let doc = &stream.documents[0];
        let settings = settings(FlowStylePolicy::Forbid, FlowStylePolicy::Forbid, false);
        let map_diags = validate_flow_style(doc, &settings, text, &stream.index);
        assert_eq!(map_diags.len(), 2);
        assert!(map_diags.iter().any(|d| d.message.contains("mapping")));
        assert!(map_diags.iter().any(|d| d.message.contains("sequence")));
    }

    #[test]
    fn allowed_flow_styles_quiet() {
        let text = "a: {x: 1}\n";
        let stream = parser::parse(text);
        let doc = &stream.documents[0];
        let settings = settings(FlowStylePolicy::Allow, FlowStylePolicy::Allow, false);
        assert!(validate_flow_style(doc, &settings, text, &stream.index).is_empty());
    }

    #[test]
    fn unused_anchor_reported_with_tag() {
        let text = "a: &used 1\nb: *used\nc: &lonely 2\n";
        let stream = parser::parse(text);
        let doc = &stream.documents[0];
        let diags = validate_unused_anchors(doc, text, &stream.index);
        assert_eq!(diags.len(), 1);
        assert!(diags[0].message.contains("lonely"));
        assert_eq!(diags[0].tags.as_deref(), Some(&[DiagnosticTag::UNNECESSARY][..]));
        assert_eq!(diags[0].severity, Some(DiagnosticSeverity::INFORMATION));
    }

    #[test]
    fn key_order_violation_reported_once_per_mapping() {
        let text = "b: 1\na: 2\nc: 3\n";
        let stream = parser::parse(text);
        let doc = &stream.documents[0];
        let settings = settings(FlowStylePolicy::Allow, FlowStylePolicy::Allow, true);
        let diags = validate_key_ordering(doc, &settings, text, &stream.index);
        assert_eq!(diags.len(), 1);
        assert!(diags[0].message.contains("\"a\""));
    }
}
