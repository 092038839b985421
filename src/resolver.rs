//! `$ref` expansion. Walks an unresolved schema with a worklist,
//! splices referenced sections into the referencing nodes by shallow
//! merge, and records every failure as a resolution error instead of
//! raising it.
use crate::schema::{find_section, JsonSchema, SchemaNode, SchemaRef, SingleOrVec};
use ahash::AHashSet;
use lazy_static::lazy_static;
use regex::Regex;
use std::rc::Rc;

lazy_static! {
    /// Absolute URI detection, scheme followed by `://`.
    static ref ABSOLUTE_URI_RE: Regex =
        Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*://").expect("Is a valid regex");
}

/// A schema as it came off the wire: parsed but with `$ref`s intact.
#[derive(Clone, Debug)]
pub struct UnresolvedSchema {
    pub schema: SchemaRef,
    pub errors: Vec<String>,
}

impl UnresolvedSchema {
    pub fn new(schema: SchemaRef) -> UnresolvedSchema {
        UnresolvedSchema {
            schema,
            errors: Vec::new(),
        }
    }

    pub fn with_errors(schema: SchemaRef, errors: Vec<String>) -> UnresolvedSchema {
        UnresolvedSchema { schema, errors }
    }
}

/// A schema with `$ref`s expanded in place and the failures that
/// happened along the way.
#[derive(Clone, Debug)]
pub struct ResolvedSchema {
    pub schema: SchemaNode,
    pub errors: Vec<String>,
}

/// Where external schema documents come from during resolution. The
/// registry implements this; tests stub it.
pub(crate) trait SchemaDocumentSource {
    fn load_unresolved(&self, uri: &str) -> UnresolvedSchema;
    fn resolve_relative(&self, reference: &str, base: &str) -> String;
    fn normalize_id(&self, uri: &str) -> String;
}

fn split_ref(reference: &str) -> (&str, &str) {
    match reference.split_once('#') {
        Some((external, fragment)) => (external, fragment),
        None => (reference, ""),
    }
}

fn decode_fragment(fragment: &str) -> String {
    percent_encoding::percent_decode_str(fragment)
        .decode_utf8()
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| fragment.to_string())
}

struct Resolution<'a> {
    source: &'a dyn SchemaDocumentSource,
    dependencies: &'a mut AHashSet<String>,
    errors: Vec<String>,
}

impl Resolution<'_> {
    fn merge_section(&mut self, node: &SchemaNode, root: &SchemaNode, uri: &str, path: &str) {
        let decoded = decode_fragment(path);
        match find_section(&SchemaRef::Object(Rc::clone(root)), &decoded) {
            Some(section) => {
                let section = section.as_schema();
                if !Rc::ptr_eq(node, &section) {
                    let section = section.borrow();
                    node.borrow_mut().merge_missing_from(&section);
                }
            }
            None => self
                .errors
                .push(format!("$ref '{}' in '{}' can not be resolved.", path, uri)),
        }
    }

    fn resolve_external_link(
        &mut self,
        node: &SchemaNode,
        uri: &str,
        fragment: &str,
        parent_url: &str,
        chain: &mut Vec<String>,
    ) {
        let uri = if ABSOLUTE_URI_RE.is_match(uri) {
            uri.to_string()
        } else {
            self.source.resolve_relative(uri, parent_url)
        };
        let uri = self.source.normalize_id(&uri);
        self.dependencies.insert(uri.clone());
        let unresolved = self.source.load_unresolved(&uri);
        if let Some(first) = unresolved.errors.first() {
            let location = if fragment.is_empty() {
                uri.clone()
            } else {
                format!("{}#{}", uri, fragment)
            };
            self.errors
                .push(format!("Problems loading reference '{}': {}", location, first));
        }
        let external_root = unresolved.schema.as_schema();
        self.merge_section(node, &external_root, &uri, fragment);
        node.borrow_mut().url = Some(uri.clone());
        self.resolve_refs(node, &external_root, &uri, std::mem::take(chain));
    }

    /// Expand refs reachable from `start`. `chain` carries the refs
    /// already expanded into `start` itself, so a self-referential
    /// cycle stops at its first repetition; every other node starts a
    /// fresh chain.
    fn resolve_refs(
        &mut self,
        start: &SchemaNode,
        parent: &SchemaNode,
        parent_url: &str,
        chain: Vec<String>,
    ) {
        let mut to_walk: Vec<(SchemaNode, Vec<String>)> = vec![(Rc::clone(start), chain)];
        let mut seen: AHashSet<*const std::cell::RefCell<JsonSchema>> = AHashSet::new();
        while let Some((next, mut chain)) = to_walk.pop() {
            if !seen.insert(Rc::as_ptr(&next)) {
                continue;
            }
            let mut external = false;
            loop {
                let reference = {
                    let mut node = next.borrow_mut();
                    match node.reference.take() {
                        Some(reference) => {
                            node.source_ref = Some(reference.clone());
                            reference
                        }
                        None => break,
                    }
                };
                if chain.contains(&reference) {
                    break;
                }
                chain.push(reference.clone());
                let (external_uri, fragment) = split_ref(&reference);
                if !external_uri.is_empty() {
                    let external_uri = external_uri.to_string();
                    let fragment = fragment.to_string();
                    self.resolve_external_link(
                        &next,
                        &external_uri,
                        &fragment,
                        parent_url,
                        &mut chain,
                    );
                    external = true;
                    break;
                }
                self.merge_section(&next, parent, parent_url, fragment);
            }
            if external {
                // The nested walk against the external document already
                // collected this node's entries.
                continue;
            }
            collect_subschemas(&next, |child| to_walk.push((child, Vec::new())));
        }
    }
}

fn collect_subschemas(node: &SchemaNode, mut push_ref: impl FnMut(SchemaNode)) {
    let node = node.borrow();
    let mut push = |schema: &SchemaRef| {
        if let Some(child) = schema.node() {
            push_ref(Rc::clone(child));
        }
    };
    for entry in [
        &node.additional_items,
        &node.additional_properties,
        &node.not,
        &node.contains,
        &node.property_names,
        &node.if_schema,
        &node.then_schema,
        &node.else_schema,
    ]
    .into_iter()
    .flatten()
    {
        push(entry);
    }
    match &node.items {
        Some(SingleOrVec::Single(item)) => push(item),
        Some(SingleOrVec::Multiple(items)) => items.iter().for_each(&mut push),
        None => {}
    }
    for map in [&node.definitions, &node.properties, &node.pattern_properties]
        .into_iter()
        .flatten()
    {
        map.values().for_each(&mut push);
    }
    if let Some(dependencies) = &node.dependencies {
        for dependency in dependencies.values() {
            if let crate::schema::Dependency::Schema(schema) = dependency {
                push(schema);
            }
        }
    }
    for list in [&node.any_of, &node.all_of, &node.one_of]
        .into_iter()
        .flatten()
    {
        list.iter().for_each(&mut push);
    }
}

/// Expand all `$ref`s of `unresolved` in place and produce the resolved
/// schema. `schema_url` may carry a fragment, in which case the result
/// is re-rooted on that section with the original top-level keys
/// layered underneath.
pub(crate) fn resolve_schema_content(
    source: &dyn SchemaDocumentSource,
    unresolved: &UnresolvedSchema,
    schema_url: &str,
    dependencies: &mut AHashSet<String>,
) -> ResolvedSchema {
    let mut resolution = Resolution {
        source,
        dependencies,
        errors: unresolved.errors.clone(),
    };
    let mut root = unresolved.schema.as_schema();
    resolution.resolve_refs(&root, &Rc::clone(&root), schema_url, Vec::new());
    if let Some((base, fragment)) = schema_url.split_once('#') {
        if !base.is_empty() && !fragment.is_empty() {
            let section_root = JsonSchema::default().into_node();
            let base = base.to_string();
            let fragment = fragment.to_string();
            resolution.resolve_external_link(
                &section_root,
                &base,
                &fragment,
                schema_url,
                &mut Vec::new(),
            );
            section_root.borrow_mut().merge_missing_from(&root.borrow());
            root = section_root;
        }
    }
    ResolvedSchema {
        schema: root,
        errors: resolution.errors,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ahash::AHashMap;
    use serde_json::{json, Value};

    struct StubSource {
        documents: AHashMap<String, Value>,
    }

    impl StubSource {
        fn new(documents: &[(&str, Value)]) -> StubSource {
            StubSource {
                documents: documents
                    .iter()
                    .map(|(uri, value)| (uri.to_string(), value.clone()))
                    .collect(),
            }
        }
    }

    impl SchemaDocumentSource for StubSource {
        fn load_unresolved(&self, uri: &str) -> UnresolvedSchema {
            match self.documents.get(uri) {
                Some(value) => {
                    UnresolvedSchema::new(SchemaRef::from_value(value.clone()).unwrap())
                }
                None => UnresolvedSchema::with_errors(
                    SchemaRef::new(JsonSchema::default()),
                    vec![format!("Unable to load schema from '{}'", uri)],
                ),
            }
        }

        fn resolve_relative(&self, reference: &str, base: &str) -> String {
            match base.rsplit_once('/') {
                Some((dir, _)) => format!("{}/{}", dir, reference),
                None => reference.to_string(),
            }
        }

        fn normalize_id(&self, uri: &str) -> String {
            uri.to_string()
        }
    }

    fn resolve(source: &StubSource, schema: Value, url: &str) -> ResolvedSchema {
        let unresolved = UnresolvedSchema::new(SchemaRef::from_value(schema).unwrap());
        let mut deps = AHashSet::new();
        resolve_schema_content(source, &unresolved, url, &mut deps)
    }

    #[test]
    fn local_fragment_resolves() {
        let source = StubSource::new(&[]);
        let resolved = resolve(
            &source,
            json!({
                "properties": {"a": {"$ref": "#/definitions/Foo"}},
                "definitions": {"Foo": {"type": "number"}}
            }),
            "https://example.test/root.json",
        );
        assert!(resolved.errors.is_empty());
        let root = resolved.schema.borrow();
        let a = root.properties.as_ref().unwrap()["a"].as_schema();
        let a = a.borrow();
        assert!(a.type_includes("number"));
        assert_eq!(a.source_ref.as_deref(), Some("#/definitions/Foo"));
    }

    #[test]
    fn external_ref_resolves_and_tracks_dependency() {
        let source = StubSource::new(&[(
            "https://example.test/other.json",
            json!({"definitions": {"Bar": {"type": "string", "minLength": 1}}}),
        )]);
        let unresolved = UnresolvedSchema::new(
            SchemaRef::from_value(json!({
                "properties": {"b": {"$ref": "https://example.test/other.json#/definitions/Bar"}}
            }))
            .unwrap(),
        );
        let mut deps = AHashSet::new();
        let resolved =
            resolve_schema_content(&source, &unresolved, "https://example.test/root.json", &mut deps);
        assert!(resolved.errors.is_empty());
        assert!(deps.contains("https://example.test/other.json"));
        let root = resolved.schema.borrow();
        let b = root.properties.as_ref().unwrap()["b"].as_schema();
        assert!(b.borrow().type_includes("string"));
        assert_eq!(
            b.borrow().url.as_deref(),
            Some("https://example.test/other.json")
        );
    }

    #[test]
    fn missing_fragment_reports_and_keeps_local_keys() {
        let source = StubSource::new(&[("https://example.test/other.json", json!({}))]);
        let resolved = resolve(
            &source,
            json!({
                "properties": {
                    "b": {
                        "$ref": "https://example.test/other.json#/definitions/Gone",
                        "description": "kept"
                    }
                }
            }),
            "https://example.test/root.json",
        );
        assert_eq!(resolved.errors.len(), 1);
        assert!(resolved.errors[0].contains("can not be resolved"));
        let root = resolved.schema.borrow();
        let b = root.properties.as_ref().unwrap()["b"].as_schema();
        let b = b.borrow();
        assert_eq!(b.description.as_deref(), Some("kept"));
        assert_eq!(
            b.source_ref.as_deref(),
            Some("https://example.test/other.json#/definitions/Gone")
        );
    }

    #[test]
    fn cyclic_refs_terminate() {
        let source = StubSource::new(&[]);
        let resolved = resolve(
            &source,
            json!({
                "definitions": {
                    "Node": {
                        "type": "object",
                        "properties": {"next": {"$ref": "#/definitions/Node"}}
                    }
                },
                "$ref": "#/definitions/Node"
            }),
            "https://example.test/cyclic.json",
        );
        let root = resolved.schema.borrow();
        assert!(root.type_includes("object"));
        assert_eq!(root.source_ref.as_deref(), Some("#/definitions/Node"));
        // The expansion aliases the definition, so the cycle is a
        // genuine loop in the graph rather than an unbounded tree.
        let next = root.properties.as_ref().unwrap()["next"].as_schema();
        assert!(next.borrow().source_ref.is_some());
    }

    #[test]
    fn unknown_document_becomes_resolution_error() {
        let source = StubSource::new(&[]);
        let resolved = resolve(
            &source,
            json!({"$ref": "https://example.test/missing.json"}),
            "https://example.test/root.json",
        );
        assert!(resolved
            .errors
            .iter()
            .any(|e| e.contains("Problems loading reference")));
    }

    #[test]
    fn fragment_in_schema_url_reroots() {
        let source = StubSource::new(&[(
            "https://example.test/s.json",
            json!({
                "definitions": {"Foo": {"type": "object", "properties": {"x": {"type": "number"}}}}
            }),
        )]);
        let resolved = resolve(
            &source,
            json!({
                "definitions": {"Foo": {"type": "object", "properties": {"x": {"type": "number"}}}}
            }),
            "https://example.test/s.json#/definitions/Foo",
        );
        assert!(resolved.errors.is_empty());
        assert!(resolved.schema.borrow().type_includes("object"));
        assert!(resolved
            .schema
            .borrow()
            .properties
            .as_ref()
            .unwrap()
            .contains_key("x"));
    }
}
