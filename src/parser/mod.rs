//! YAML→AST conversion on top of the external tokenizer.
mod builder;
mod scalar;
mod text;

pub use text::TextIndex;

use crate::ast::{NodeKind, YamlDocument};
use crate::problems::Problem;
use ahash::AHashMap;
use builder::AstBuilder;
use yaml_rust2::parser::Parser;

/// Node kind a configured custom tag is declared for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CustomTagKind {
    Scalar,
    Mapping,
    Sequence,
}

/// Parse configured custom tags of the form `"!Name"` or
/// `"!Name mapping"` into a lookup table; the kind defaults to scalar.
pub fn custom_tag_map(tags: &[String]) -> AHashMap<String, CustomTagKind> {
    let mut map = AHashMap::new();
    for entry in tags {
        let mut parts = entry.split_whitespace();
        let tag = match parts.next() {
            Some(tag) => tag.to_string(),
            None => continue,
        };
        let kind = match parts.next() {
            Some("mapping") => CustomTagKind::Mapping,
            Some("sequence") => CustomTagKind::Sequence,
            _ => CustomTagKind::Scalar,
        };
        map.insert(tag, kind);
    }
    map
}

/// A parsed multi-document stream.
#[derive(Debug)]
pub struct YamlStream {
    pub documents: Vec<YamlDocument>,
    /// Stream-level tokenizer errors.
    pub problems: Vec<Problem>,
    pub(crate) index: TextIndex,
}

/// Parse `text` into a stream of AST documents.
pub fn parse(text: &str) -> YamlStream {
    parse_with_tags(text, &AHashMap::new())
}

/// Parse `text`, honouring configured custom tags: nodes tagged for a
/// mismatched kind are downgraded to String leaves over their source
/// text.
pub fn parse_with_tags(
    text: &str,
    custom_tags: &AHashMap<String, CustomTagKind>,
) -> YamlStream {
    let index = TextIndex::new(text);
    let mut receiver = AstBuilder::new(text, &index);
    let mut parser = Parser::new_from_str(text);
    let result = parser.load(&mut receiver, true);
    receiver.finish();
    let mut documents = std::mem::take(&mut receiver.documents);
    let mut problems = Vec::new();
    if let Err(err) = result {
        let offset = index.byte_offset(err.marker().index());
        problems.push(Problem::syntax(offset, 1, err.to_string()));
    }
    if !custom_tags.is_empty() {
        for doc in &mut documents {
            apply_custom_tags(doc, text, custom_tags);
        }
    }
    YamlStream {
        documents,
        problems,
        index,
    }
}

fn apply_custom_tags(
    doc: &mut YamlDocument,
    text: &str,
    custom_tags: &AHashMap<String, CustomTagKind>,
) {
    for id in 0..doc.node_count() as u32 {
        let (mismatch, offset, end) = {
            let node = doc.node(id);
            let tag = match &node.source.tag {
                Some(tag) if !tag.starts_with("tag:yaml.org,2002:") => tag,
                _ => continue,
            };
            let declared = match custom_tags.get(tag) {
                Some(kind) => *kind,
                None => continue,
            };
            let mismatch = match &node.kind {
                NodeKind::Array { .. } => declared != CustomTagKind::Sequence,
                NodeKind::Object { .. } => declared != CustomTagKind::Mapping,
                NodeKind::Property { .. } => false,
                _ => declared != CustomTagKind::Scalar,
            };
            (mismatch, node.offset, node.end())
        };
        if mismatch {
            let raw = text
                .get(offset..end.min(text.len()))
                .unwrap_or_default()
                .to_string();
            doc.node_mut(id).kind = NodeKind::String(raw);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::NodeKind;
    use serde_json::json;

    #[test]
    fn scalar_map_round_trips() {
        let stream = parse("name: jack\nage: 22\n");
        assert_eq!(stream.documents.len(), 1);
        let doc = &stream.documents[0];
        let root = doc.root.unwrap();
        assert_eq!(doc.get_value(root), json!({"name": "jack", "age": 22}));
    }

    #[test]
    fn multi_document_stream() {
        let stream = parse("name: jack\nage: 22\n---\nanalytics: true\n");
        assert_eq!(stream.documents.len(), 2);
        let second = &stream.documents[1];
        let root = second.root.unwrap();
        assert_eq!(second.get_value(root), json!({"analytics": true}));
    }

    #[test]
    fn ranges_are_byte_accurate() {
        let text = "name: jack\nage: 22\n";
        let stream = parse(text);
        let doc = &stream.documents[0];
        let root = doc.root.unwrap();
        let node = doc.node(root);
        assert_eq!(node.offset, 0);
        // The mapping ends at the last value, not the trailing newline.
        assert_eq!(node.end(), 18);
        let age_value = doc.find_node_at_offset(root, 16, true).unwrap();
        let age = doc.node(age_value);
        assert_eq!(&text[age.offset..age.end()], "22");
        assert!(matches!(age.kind, NodeKind::Number { is_integer: true, .. }));
    }

    #[test]
    fn spans_nest_for_nested_docs() {
        let text = "top:\n  inner:\n    - 1\n    - two\n  other: {a: 1, b: [x, y]}\n";
        let stream = parse(text);
        let doc = &stream.documents[0];
        let root = doc.root.unwrap();
        doc.visit(root, &mut |id| {
            let node = doc.node(id);
            if let Some(parent) = node.parent {
                let parent = doc.node(parent);
                assert!(parent.offset <= node.offset, "child starts before parent");
                assert!(node.end() <= parent.end(), "child ends after parent");
            }
            true
        });
    }

    #[test]
    fn property_without_value() {
        let stream = parse("a:\nb: 1\n");
        let doc = &stream.documents[0];
        let root = doc.root.unwrap();
        if let NodeKind::Object { properties } = &doc.node(root).kind {
            assert_eq!(properties.len(), 2);
            if let NodeKind::Property { value, .. } = &doc.node(properties[0]).kind {
                assert!(value.is_none());
            } else {
                panic!("expected property");
            }
        } else {
            panic!("expected object root");
        }
    }

    #[test]
    fn final_property_without_newline() {
        let text = "a: 1\nb: last";
        let stream = parse(text);
        let doc = &stream.documents[0];
        let root = doc.root.unwrap();
        if let NodeKind::Object { properties } = &doc.node(root).kind {
            let last = doc.node(properties[1]);
            assert_eq!(&text[last.offset..last.end()], "b: last");
        } else {
            panic!("expected object root");
        }
    }

    #[test]
    fn anchors_and_aliases() {
        let text = "a: &x {p: 1}\nb: *x\n";
        let stream = parse(text);
        let doc = &stream.documents[0];
        assert!(doc.anchors.contains_key("x"));
        let root = doc.root.unwrap();
        // The alias reifies to the anchored value.
        assert_eq!(doc.get_value(root), json!({"a": {"p": 1}, "b": {"p": 1}}));
        // The alias node itself keeps its visible token span.
        let alias = doc.find_node_at_offset(root, 17, true).unwrap();
        let alias_node = doc.node(alias);
        assert!(alias_node.is_alias());
        assert_eq!(&text[alias_node.offset..alias_node.end()], "*x");
    }

    #[test]
    fn alias_resolves_to_referent() {
        let text = "a: &x 1\nb: *x\n";
        let stream = parse(text);
        let doc = &stream.documents[0];
        let root = doc.root.unwrap();
        assert_eq!(doc.get_value(root), json!({"a": 1, "b": 1}));
        let alias = doc.find_node_at_offset(root, 11, true).unwrap();
        let resolved = doc.resolve_alias(alias);
        assert!(matches!(doc.node(resolved).kind, NodeKind::Number { .. }));
    }

    #[test]
    fn duplicate_keys_warn() {
        let stream = parse("a: 1\na: 2\n");
        let doc = &stream.documents[0];
        assert_eq!(doc.problems.len(), 1);
        assert!(doc.problems[0].message.contains("unique"));
    }

    #[test]
    fn merge_keys_do_not_warn() {
        let stream = parse("base: &b {x: 1}\nmore: &c {y: 2}\nout:\n  <<: *b\n  <<: *c\n");
        let doc = &stream.documents[0];
        assert!(doc.problems.is_empty());
    }

    #[test]
    fn empty_stream_has_no_root() {
        let stream = parse("");
        assert!(stream.documents.iter().all(|d| d.root.is_none()));
        let stream = parse("---\n");
        assert!(stream.documents.iter().all(|d| d.root.is_none()));
    }

    #[test]
    fn scan_errors_surface() {
        let stream = parse("a: [1, 2\n");
        assert!(!stream.problems.is_empty());
    }

    #[test]
    fn custom_tag_kind_mismatch_downgrades() {
        let tags = custom_tag_map(&["!Ref scalar".to_string()]);
        let stream = parse_with_tags("a: !Ref {x: 1}\n", &tags);
        let doc = &stream.documents[0];
        let root = doc.root.unwrap();
        // The mapping carried a scalar-declared tag, so it collapsed to
        // a String leaf over its source text.
        let prop = doc.children(root)[0];
        let value = doc.children(prop)[1];
        assert!(matches!(doc.node(value).kind, NodeKind::String(_)));
    }

    #[test]
    fn flow_collections_marked() {
        let stream = parse("a: [1, 2]\nb:\n  - 1\n");
        let doc = &stream.documents[0];
        let root = doc.root.unwrap();
        let flow = doc.find_node_at_offset(root, 3, true).unwrap();
        assert!(doc.node(flow).source.flow);
    }
}
