//! End-to-end behavior through the `LanguageService` surface.
use lsp_types::{DiagnosticSeverity, Position};
use serde_json::{json, Value};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use yaml_language_service::{
    FlowStylePolicy, LanguageService, LanguageSettings, SchemaConfiguration,
    SchemaContentRetriever, SchemaStoreEntry, KUBERNETES_SCHEMA_URL,
};

struct StaticRetriever {
    documents: HashMap<String, String>,
    requests: Rc<RefCell<Vec<String>>>,
}

impl SchemaContentRetriever for StaticRetriever {
    fn retrieve(&self, uri: &str) -> anyhow::Result<String> {
        self.requests.borrow_mut().push(uri.to_string());
        let without_fragment = uri.split('#').next().unwrap_or(uri);
        self.documents
            .get(without_fragment)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("schema not found: {}", uri))
    }
}

fn retriever(documents: &[(&str, Value)]) -> (StaticRetriever, Rc<RefCell<Vec<String>>>) {
    let requests = Rc::new(RefCell::new(Vec::new()));
    (
        StaticRetriever {
            documents: documents
                .iter()
                .map(|(uri, value)| (uri.to_string(), value.to_string()))
                .collect(),
            requests: Rc::clone(&requests),
        },
        requests,
    )
}

fn service_with_schema(schema: Value) -> LanguageService {
    let mut service = LanguageService::new(None);
    let mut settings = LanguageSettings::default();
    settings.schemas.push(SchemaConfiguration {
        uri: "https://example.test/test-schema.json".to_string(),
        file_match: vec!["*.yaml".to_string()],
        schema: Some(schema),
        ..SchemaConfiguration::default()
    });
    service.configure(settings);
    service
}

#[test]
fn validation_reports_schema_problems_with_attribution() {
    let service = service_with_schema(json!({
        "title": "Person",
        "type": "object",
        "properties": {"age": {"type": "number"}}
    }));
    let diagnostics = service.do_validation("file:///person.yaml", "age: old\n", false);
    assert_eq!(diagnostics.len(), 1, "{:#?}", diagnostics);
    assert_eq!(diagnostics[0].severity, Some(DiagnosticSeverity::WARNING));
    assert_eq!(diagnostics[0].source.as_deref(), Some("yaml-schema: Person"));
    let data = diagnostics[0].data.as_ref().expect("schema attribution");
    assert_eq!(
        data["schemaUri"][0],
        json!("https://example.test/test-schema.json")
    );
}

#[test]
fn tokenizer_errors_surface_as_error_diagnostics() {
    let service = service_with_schema(json!({}));
    let diagnostics = service.do_validation("file:///broken.yaml", "a: [1, 2\n", false);
    assert!(!diagnostics.is_empty());
    assert_eq!(diagnostics[0].severity, Some(DiagnosticSeverity::ERROR));
    assert_eq!(diagnostics[0].source.as_deref(), Some("YAML"));
}

#[test]
fn modeline_with_fragment_selects_the_section() {
    let (retriever, requests) = retriever(&[(
        "https://example.test/s.json",
        json!({
            "definitions": {
                "Foo": {"type": "object", "required": ["x"]}
            }
        }),
    )]);
    let service = LanguageService::new(Some(Box::new(retriever)));
    let text = "# yaml-language-server: $schema=https://example.test/s.json#/definitions/Foo\ny: 1\n";
    let diagnostics = service.do_validation("file:///any.yaml", text, false);
    assert_eq!(diagnostics.len(), 1, "{:#?}", diagnostics);
    assert!(diagnostics[0].message.contains("Missing property \"x\""));
    let requests = requests.borrow();
    assert!(requests
        .iter()
        .any(|r| r == "https://example.test/s.json#/definitions/Foo"));
    assert!(requests.iter().any(|r| r == "https://example.test/s.json"));
}

#[test]
fn kubernetes_crd_auto_detection_validates_against_catalog() {
    let crd_url =
        "https://raw.githubusercontent.com/datreeio/CRDs-catalog/main/argoproj.io/application_v1alpha1.json";
    let (retriever, requests) = retriever(&[
        (
            KUBERNETES_SCHEMA_URL,
            json!({"oneOf": [
                {"$ref": "_definitions.json#/definitions/io.k8s.api.core.v1.Pod"}
            ]}),
        ),
        (
            crd_url,
            json!({"type": "object", "required": ["spec"]}),
        ),
    ]);
    let service = LanguageService::new(Some(Box::new(retriever)));
    let text = "apiVersion: argoproj.io/v1alpha1\nkind: Application\n";
    let diagnostics = service.do_validation("file:///app.yaml", text, true);
    assert!(
        diagnostics.iter().any(|d| d.message.contains("\"spec\"")),
        "{:#?}",
        diagnostics
    );
    assert!(requests.borrow().iter().any(|r| r == crd_url));
}

#[test]
fn resolution_errors_become_warnings_on_the_document() {
    let (retriever, _) = retriever(&[]);
    let service = LanguageService::new(Some(Box::new(retriever)));
    let text = "# yaml-language-server: $schema=https://example.test/missing.json\na: 1\n";
    let diagnostics = service.do_validation("file:///any.yaml", text, false);
    assert_eq!(diagnostics.len(), 1, "{:#?}", diagnostics);
    assert_eq!(diagnostics[0].severity, Some(DiagnosticSeverity::WARNING));
    assert!(diagnostics[0].message.contains("Unable to load schema"));
}

#[test]
fn duplicate_diagnostics_are_removed() {
    // Both allOf arms produce the same missing-property complaint at
    // the same spot; only one survives.
    let service = service_with_schema(json!({
        "allOf": [
            {"type": "object", "required": ["name"]},
            {"type": "object", "required": ["name"]}
        ]
    }));
    let diagnostics = service.do_validation("file:///dup.yaml", "other: 1\n", false);
    assert_eq!(diagnostics.len(), 1, "{:#?}", diagnostics);
}

#[test]
fn flow_style_and_key_ordering_policies() {
    let mut service = LanguageService::new(None);
    let mut settings = LanguageSettings::default();
    settings.flow_mapping = FlowStylePolicy::Forbid;
    settings.flow_sequence = FlowStylePolicy::Forbid;
    settings.key_ordering = true;
    service.configure(settings);
    let diagnostics =
        service.do_validation("file:///style.yaml", "b: {x: 1}\na: [1]\n", false);
    let messages: Vec<&str> = diagnostics.iter().map(|d| d.message.as_str()).collect();
    assert!(messages.contains(&"Flow style mapping is forbidden"));
    assert!(messages.contains(&"Flow style sequence is forbidden"));
    assert!(messages.iter().any(|m| m.contains("Wrong ordering")));
}

#[test]
fn unused_anchor_diagnostics_are_informational() {
    let service = LanguageService::new(None);
    let diagnostics =
        service.do_validation("file:///anchors.yaml", "a: &unused 1\nb: 2\n", false);
    assert_eq!(diagnostics.len(), 1, "{:#?}", diagnostics);
    assert_eq!(
        diagnostics[0].severity,
        Some(DiagnosticSeverity::INFORMATION)
    );
    assert!(diagnostics[0].message.contains("&unused"));
}

#[test]
fn validation_disabled_by_settings() {
    let mut service = LanguageService::new(None);
    let mut settings = LanguageSettings::default();
    settings.validate = false;
    service.configure(settings);
    assert!(service
        .do_validation("file:///x.yaml", "a: [1, 2\n", false)
        .is_empty());
}

#[test]
fn completion_proposes_missing_properties() {
    let service = service_with_schema(json!({
        "type": "object",
        "properties": {
            "name": {"type": "string", "description": "Display name"},
            "age": {"type": "number"},
            "hidden": {"type": "string", "doNotSuggest": true}
        }
    }));
    let list = service.do_complete("file:///c.yaml", "name: x\n", Position::new(1, 0), false);
    let labels: Vec<&str> = list.items.iter().map(|i| i.label.as_str()).collect();
    assert!(labels.contains(&"age"), "labels: {:?}", labels);
    assert!(!labels.contains(&"name"), "existing keys are not re-proposed");
    assert!(!labels.contains(&"hidden"), "doNotSuggest is honoured");
}

#[test]
fn completion_proposes_enum_values() {
    let service = service_with_schema(json!({
        "type": "object",
        "properties": {"level": {"enum": ["debug", "info", "warn"]}}
    }));
    let list = service.do_complete("file:///c.yaml", "level: d\n", Position::new(0, 8), false);
    let labels: Vec<&str> = list.items.iter().map(|i| i.label.as_str()).collect();
    assert!(labels.contains(&"debug"), "labels: {:?}", labels);
    assert!(labels.contains(&"warn"), "labels: {:?}", labels);
}

#[test]
fn hover_shows_title_and_description() {
    let service = service_with_schema(json!({
        "type": "object",
        "properties": {
            "replicas": {
                "type": "number",
                "title": "Replica count",
                "description": "How many instances to run."
            }
        }
    }));
    let hover = service
        .do_hover("file:///h.yaml", "replicas: 3\n", Position::new(0, 2))
        .expect("hover content");
    match hover.contents {
        lsp_types::HoverContents::Markup(markup) => {
            assert!(markup.value.contains("Replica count"));
            assert!(markup.value.contains("How many instances"));
        }
        other => panic!("unexpected hover contents: {:?}", other),
    }
}

#[test]
fn symbols_cover_multi_document_streams() {
    let service = LanguageService::new(None);
    let text = "first: 1\n---\nsecond: 2\n";
    let symbols = service.find_document_symbols("file:///s.yaml", text);
    let names: Vec<&str> = symbols.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["first", "second"]);
    let flat = service.find_document_symbols_flat("file:///s.yaml", text);
    assert_eq!(flat.len(), 2);
}

#[test]
fn code_lenses_advertise_schemas_and_resolve() {
    let service = service_with_schema(json!({"type": "object"}));
    let lenses = service.get_code_lens("file:///l.yaml", "a: 1\n");
    assert_eq!(lenses.len(), 1, "{:#?}", lenses);
    let resolved = service.resolve_code_lens(lenses[0].clone());
    let command = resolved.command.expect("resolved command");
    assert_eq!(command.title, "test-schema.json");
    assert_eq!(
        command.arguments.unwrap()[0],
        json!("https://example.test/test-schema.json")
    );
}

#[test]
fn schema_store_entries_contribute_low_priority_matches() {
    let mut service = LanguageService::new(None);
    let mut settings = LanguageSettings::default();
    settings.schemas.push(SchemaConfiguration {
        uri: "https://example.test/settings.json".to_string(),
        file_match: vec!["deploy.yaml".to_string()],
        schema: Some(json!({"type": "object", "required": ["fromSettings"]})),
        ..SchemaConfiguration::default()
    });
    service.configure(settings);
    service.set_schema_store_entries(&[
        SchemaStoreEntry {
            url: "https://example.test/store.json".to_string(),
            file_match: vec!["deploy.yaml".to_string(), "*.json".to_string()],
            ..SchemaStoreEntry::default()
        },
        SchemaStoreEntry {
            url: "https://example.test/other-store.json".to_string(),
            file_match: vec!["*.toml".to_string()],
            ..SchemaStoreEntry::default()
        },
    ]);
    // The settings schema outranks the store entry for the same file.
    let diagnostics = service.do_validation("file:///deploy.yaml", "a: 1\n", false);
    assert_eq!(diagnostics.len(), 1, "{:#?}", diagnostics);
    assert!(diagnostics[0].message.contains("fromSettings"));
}

#[test]
fn custom_schema_provider_takes_precedence_over_patterns() {
    let mut service = LanguageService::new(None);
    let mut settings = LanguageSettings::default();
    settings.schemas.push(SchemaConfiguration {
        uri: "https://example.test/pattern.json".to_string(),
        file_match: vec!["*.yaml".to_string()],
        schema: Some(json!({"type": "object", "required": ["fromPattern"]})),
        ..SchemaConfiguration::default()
    });
    service.configure(settings);
    service.add_schema(
        "https://example.test/custom.json",
        json!({"type": "object", "required": ["fromProvider"]}),
    );
    service.register_custom_schema_provider(Box::new(|_uri| {
        Some(vec!["https://example.test/custom.json".to_string()])
    }));
    let diagnostics = service.do_validation("file:///x.yaml", "a: 1\n", false);
    assert_eq!(diagnostics.len(), 1, "{:#?}", diagnostics);
    assert!(diagnostics[0].message.contains("fromProvider"));
}

#[test]
fn schema_content_modification_reflects_in_validation() {
    let service = LanguageService::new(None);
    service.add_schema(
        "https://example.test/live.json",
        json!({"type": "object", "properties": {}}),
    );
    service.register_custom_schema_provider(Box::new(|_uri| {
        Some(vec!["https://example.test/live.json".to_string()])
    }));
    assert!(service
        .do_validation("file:///live.yaml", "port: x\n", false)
        .is_empty());
    service
        .modify_schema_content(
            "https://example.test/live.json",
            &["properties".to_string()],
            "port",
            json!({"type": "number"}),
        )
        .expect("modification applies");
    let diagnostics = service.do_validation("file:///live.yaml", "port: x\n", false);
    assert_eq!(diagnostics.len(), 1, "{:#?}", diagnostics);
    service
        .delete_schema_content(
            "https://example.test/live.json",
            &["properties".to_string()],
            "port",
        )
        .expect("deletion applies");
    assert!(service
        .do_validation("file:///live.yaml", "port: x\n", false)
        .is_empty());
}

#[test]
fn delete_schema_stops_matching() {
    let mut service = LanguageService::new(None);
    let mut settings = LanguageSettings::default();
    settings.schemas.push(SchemaConfiguration {
        uri: "https://example.test/gone.json".to_string(),
        file_match: vec!["*.yaml".to_string()],
        schema: Some(json!({"type": "object", "required": ["x"]})),
        ..SchemaConfiguration::default()
    });
    service.configure(settings);
    assert_eq!(
        service.do_validation("file:///g.yaml", "a: 1\n", false).len(),
        1
    );
    service.delete_schema("https://example.test/gone.json");
    assert!(service.do_validation("file:///g.yaml", "a: 1\n", false).is_empty());
}

#[test]
fn json_compatible_documents_reify_to_the_same_value() {
    let text = r#"{"a": [1, 2.5, "x"], "b": {"c": true, "d": null}}"#;
    let stream = yaml_language_service::parser::parse(text);
    let doc = &stream.documents[0];
    let reified = doc.get_value(doc.root.unwrap());
    let parsed: Value = serde_json::from_str(text).unwrap();
    assert_eq!(reified, parsed);
}
