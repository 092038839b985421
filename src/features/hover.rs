//! Hover: title/description of the schemas applicable at an offset.
use crate::ast::{NodeKind, YamlDocument};
use crate::parser::TextIndex;
use crate::resolver::ResolvedSchema;
use crate::validation::{matching_schemas, ValidationOptions};
use lsp_types::{Hover, HoverContents, MarkupContent, MarkupKind, Range};

pub fn do_hover(
    doc: &YamlDocument,
    text: &str,
    index: &TextIndex,
    offset: usize,
    resolved: &ResolvedSchema,
    options: &ValidationOptions,
) -> Option<Hover> {
    let root = doc.root?;
    let mut node = doc.find_node_at_offset(root, offset, true)?;
    // Hovering a key describes the property's value.
    if let Some(parent) = doc.node(node).parent {
        if let NodeKind::Property { key, value } = &doc.node(parent).kind {
            if *key == node {
                node = value.unwrap_or(node);
            }
        }
    }
    let target = doc.resolve_alias(node);
    // Focus on the described node's own offset: hovering a key must
    // surface the schemas that apply to its value.
    let focus = doc.node(node).offset;
    let mut sections: Vec<String> = Vec::new();
    for matching in matching_schemas(doc, resolved, Some(focus), None, options) {
        if matching.inverted || (matching.node != node && matching.node != target) {
            continue;
        }
        let schema = matching.schema.borrow();
        let mut section = String::new();
        if let Some(title) = &schema.title {
            section.push_str(title);
        }
        let description = schema
            .markdown_description
            .as_deref()
            .or(schema.description.as_deref());
        if let Some(description) = description {
            if !section.is_empty() {
                section.push_str("\n\n");
            }
            section.push_str(description);
        }
        if !section.is_empty() && !sections.contains(&section) {
            sections.push(section);
        }
    }
    if sections.is_empty() {
        return None;
    }
    let span = doc.node(node);
    Some(Hover {
        contents: HoverContents::Markup(MarkupContent {
            kind: MarkupKind::Markdown,
            value: sections.join("\n\n---\n\n"),
        }),
        range: Some(Range {
            start: index.position_at(text, span.offset),
            end: index.position_at(text, span.end()),
        }),
    })
}
