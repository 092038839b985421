//! Document symbols: hierarchical outline and the flat variant.
use crate::ast::{NodeId, NodeKind, YamlDocument};
use crate::parser::TextIndex;
use lsp_types::{DocumentSymbol, Location, Range, SymbolInformation, SymbolKind, Url};

fn range_of(doc: &YamlDocument, node: NodeId, text: &str, index: &TextIndex) -> Range {
    let n = doc.node(node);
    Range {
        start: index.position_at(text, n.offset),
        end: index.position_at(text, n.end()),
    }
}

fn symbol_kind(doc: &YamlDocument, node: NodeId) -> SymbolKind {
    match &doc.node(node).kind {
        NodeKind::Object { .. } => SymbolKind::OBJECT,
        NodeKind::Array { .. } => SymbolKind::ARRAY,
        NodeKind::String(_) => SymbolKind::STRING,
        NodeKind::Number { .. } => SymbolKind::NUMBER,
        NodeKind::Boolean(_) => SymbolKind::BOOLEAN,
        NodeKind::Null => SymbolKind::NULL,
        NodeKind::Property { .. } => SymbolKind::PROPERTY,
    }
}

/// Hierarchical outline of one document.
pub fn document_symbols(doc: &YamlDocument, text: &str, index: &TextIndex) -> Vec<DocumentSymbol> {
    match doc.root {
        Some(root) => child_symbols(doc, root, text, index),
        None => Vec::new(),
    }
}

fn child_symbols(
    doc: &YamlDocument,
    node: NodeId,
    text: &str,
    index: &TextIndex,
) -> Vec<DocumentSymbol> {
    match &doc.node(node).kind {
        NodeKind::Object { properties } => properties
            .iter()
            .filter_map(|prop| property_symbol(doc, *prop, text, index))
            .collect(),
        NodeKind::Array { items } => items
            .iter()
            .enumerate()
            .map(|(i, item)| value_symbol(doc, *item, i.to_string(), *item, text, index))
            .collect(),
        _ => Vec::new(),
    }
}

fn property_symbol(
    doc: &YamlDocument,
    prop: NodeId,
    text: &str,
    index: &TextIndex,
) -> Option<DocumentSymbol> {
    if let NodeKind::Property { key, value } = &doc.node(prop).kind {
        let name = doc.property_key(prop).to_string();
        let detail_node = value.unwrap_or(*key);
        return Some(make_symbol(
            doc,
            name,
            prop,
            *key,
            detail_node,
            value.is_some(),
            text,
            index,
        ));
    }
    None
}

fn value_symbol(
    doc: &YamlDocument,
    node: NodeId,
    name: String,
    selection: NodeId,
    text: &str,
    index: &TextIndex,
) -> DocumentSymbol {
    make_symbol(doc, name, node, selection, node, true, text, index)
}

#[allow(clippy::too_many_arguments)]
fn make_symbol(
    doc: &YamlDocument,
    name: String,
    range_node: NodeId,
    selection_node: NodeId,
    value_node: NodeId,
    descend: bool,
    text: &str,
    index: &TextIndex,
) -> DocumentSymbol {
    // Aliases keep their visible token; the outline never jumps to the
    // anchored content.
    let children = if descend && !doc.node(value_node).is_alias() {
        let nested = child_symbols(doc, value_node, text, index);
        if nested.is_empty() {
            None
        } else {
            Some(nested)
        }
    } else {
        None
    };
    #[allow(deprecated)]
    DocumentSymbol {
        name: if name.is_empty() { "\"\"".to_string() } else { name },
        detail: None,
        kind: symbol_kind(doc, value_node),
        tags: None,
        deprecated: None,
        range: range_of(doc, range_node, text, index),
        selection_range: range_of(doc, selection_node, text, index),
        children,
    }
}

/// Flat symbol list with container attribution.
pub fn flat_symbols(
    doc: &YamlDocument,
    text: &str,
    index: &TextIndex,
    uri: &Url,
) -> Vec<SymbolInformation> {
    let mut out = Vec::new();
    if let Some(root) = doc.root {
        flatten(doc, root, None, text, index, uri, &mut out);
    }
    out
}

fn flatten(
    doc: &YamlDocument,
    node: NodeId,
    container: Option<&str>,
    text: &str,
    index: &TextIndex,
    uri: &Url,
    out: &mut Vec<SymbolInformation>,
) {
    let entries: Vec<(String, NodeId, NodeId)> = match &doc.node(node).kind {
        NodeKind::Object { properties } => properties
            .iter()
            .filter_map(|prop| {
                if let NodeKind::Property { value, .. } = &doc.node(*prop).kind {
                    Some((doc.property_key(*prop).to_string(), *prop, value.unwrap_or(*prop)))
                } else {
                    None
                }
            })
            .collect(),
        NodeKind::Array { items } => items
            .iter()
            .enumerate()
            .map(|(i, item)| (i.to_string(), *item, *item))
            .collect(),
        _ => Vec::new(),
    };
    for (name, range_node, value_node) in entries {
        #[allow(deprecated)]
        out.push(SymbolInformation {
            name: name.clone(),
            kind: symbol_kind(doc, value_node),
            tags: None,
            deprecated: None,
            location: Location {
                uri: uri.clone(),
                range: range_of(doc, range_node, text, index),
            },
            container_name: container.map(str::to_string),
        });
        if !doc.node(value_node).is_alias() {
            flatten(doc, value_node, Some(&name), text, index, uri, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser;

    #[test]
    fn hierarchical_outline() {
        let text = "server:\n  host: local\n  ports:\n    - 80\n    - 443\n";
        let stream = parser::parse(text);
        let doc = &stream.documents[0];
        let symbols = document_symbols(doc, text, &stream.index);
        assert_eq!(symbols.len(), 1);
        assert_eq!(symbols[0].name, "server");
        assert_eq!(symbols[0].kind, SymbolKind::OBJECT);
        let children = symbols[0].children.as_ref().unwrap();
        assert_eq!(children.len(), 2);
        assert_eq!(children[1].name, "ports");
        assert_eq!(children[1].kind, SymbolKind::ARRAY);
    }

    #[test]
    fn alias_symbol_keeps_visible_token() {
        let text = "a: &x {p: 1}\nb: *x\n";
        let stream = parser::parse(text);
        let doc = &stream.documents[0];
        let symbols = document_symbols(doc, text, &stream.index);
        let b = symbols.iter().find(|s| s.name == "b").unwrap();
        // The alias contributes no children and its selection stays on
        // the `*x` token's line.
        assert!(b.children.is_none());
        assert_eq!(b.range.start.line, 1);
    }

    #[test]
    fn flat_symbols_carry_containers() {
        let text = "server:\n  host: local\n";
        let stream = parser::parse(text);
        let doc = &stream.documents[0];
        let uri = Url::parse("file:///test.yaml").unwrap();
        let symbols = flat_symbols(doc, text, &stream.index, &uri);
        assert_eq!(symbols.len(), 2);
        assert_eq!(symbols[1].name, "host");
        assert_eq!(symbols[1].container_name.as_deref(), Some("server"));
    }
}
