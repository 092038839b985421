//! Schema-driven completion proposals: missing properties in object
//! position, accepted values in value position.
use crate::ast::{NodeId, NodeKind, YamlDocument};
use crate::resolver::ResolvedSchema;
use crate::schema::SchemaRef;
use crate::settings::LanguageSettings;
use crate::validation::{matching_schemas, ValidationOptions};
use lsp_types::{CompletionItem, CompletionItemKind, CompletionList, Documentation};
use serde_json::Value;

pub fn do_complete(
    doc: &YamlDocument,
    offset: usize,
    resolved: &ResolvedSchema,
    settings: &LanguageSettings,
    options: &ValidationOptions,
) -> CompletionList {
    let mut items: Vec<CompletionItem> = Vec::new();
    let root = match doc.root {
        Some(root) => root,
        None => return CompletionList { is_incomplete: false, items },
    };
    // A cursor past the last token completes against the root context.
    let root_end = doc.node(root).end();
    let past_end = offset > root_end;
    let offset = offset.min(root_end);
    let node = if past_end {
        root
    } else {
        doc.find_node_at_offset(root, offset, true).unwrap_or(root)
    };
    let options = ValidationOptions {
        call_from_auto_complete: true,
        is_kubernetes: options.is_kubernetes,
        disable_additional_properties: options.disable_additional_properties,
    };
    let matching = matching_schemas(doc, resolved, Some(offset), None, &options);

    let (object_node, value_node) = completion_targets(doc, node);
    if let Some(object_node) = object_node {
        let existing = existing_keys(doc, object_node);
        for ms in &matching {
            if ms.inverted || ms.node != object_node {
                continue;
            }
            let schema = ms.schema.borrow();
            if let Some(properties) = &schema.properties {
                for (name, prop_schema) in properties {
                    if existing.iter().any(|k| k == name) {
                        continue;
                    }
                    if let SchemaRef::Object(prop) = prop_schema {
                        if prop.borrow().do_not_suggest == Some(true) {
                            continue;
                        }
                    }
                    if items.iter().any(|item| item.label == *name) {
                        continue;
                    }
                    let documentation = match prop_schema {
                        SchemaRef::Object(prop) => prop
                            .borrow()
                            .description
                            .clone()
                            .map(Documentation::String),
                        SchemaRef::Bool(_) => None,
                    };
                    items.push(CompletionItem {
                        label: name.clone(),
                        kind: Some(CompletionItemKind::PROPERTY),
                        insert_text: Some(format!("{}: ", name)),
                        documentation,
                        ..CompletionItem::default()
                    });
                }
            }
        }
    }
    if let Some(value_node) = value_node {
        for ms in &matching {
            if ms.inverted || ms.node != value_node {
                continue;
            }
            let schema = ms.schema.borrow();
            if let Some(values) = &schema.enumeration {
                for value in values {
                    push_value_item(&mut items, value);
                }
            }
            if let Some(constant) = &schema.constant {
                push_value_item(&mut items, constant);
            }
            if schema.type_includes("boolean") {
                push_value_item(&mut items, &Value::Bool(true));
                push_value_item(&mut items, &Value::Bool(false));
            }
            if !settings.disable_default_properties {
                if let Some(default) = &schema.default {
                    push_value_item(&mut items, default);
                }
            }
        }
    }
    CompletionList {
        is_incomplete: false,
        items,
    }
}

/// Work out which node property proposals belong to and which node
/// value proposals belong to.
fn completion_targets(doc: &YamlDocument, node: NodeId) -> (Option<NodeId>, Option<NodeId>) {
    match &doc.node(node).kind {
        NodeKind::Object { .. } => (Some(node), None),
        NodeKind::Array { .. } => (None, None),
        NodeKind::Property { .. } => {
            (doc.node(node).parent, None)
        }
        _ => {
            // A scalar: key position completes the enclosing object,
            // value position completes accepted values.
            match doc.node(node).parent {
                Some(parent) => match &doc.node(parent).kind {
                    NodeKind::Property { key, .. } if *key == node => {
                        (doc.node(parent).parent, None)
                    }
                    NodeKind::Property { .. } => (None, Some(node)),
                    NodeKind::Array { .. } => (None, Some(node)),
                    _ => (None, Some(node)),
                },
                None => (None, Some(node)),
            }
        }
    }
}

fn existing_keys(doc: &YamlDocument, object_node: NodeId) -> Vec<String> {
    match &doc.node(object_node).kind {
        NodeKind::Object { properties } => properties
            .iter()
            .map(|prop| doc.property_key(*prop).to_string())
            .collect(),
        _ => Vec::new(),
    }
}

fn push_value_item(items: &mut Vec<CompletionItem>, value: &Value) {
    let label = match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    if items.iter().any(|item| item.label == label) {
        return;
    }
    items.push(CompletionItem {
        label: label.clone(),
        kind: Some(CompletionItemKind::VALUE),
        insert_text: Some(label),
        ..CompletionItem::default()
    });
}
