//! The language service: the host-facing surface tying together the
//! parser, registry, validator and feature façades.
//!
//! No method on this type panics or propagates an error for malformed
//! input; everything surfaces as diagnostics, empty results, or a
//! `SchemaError` from the explicit content-modification calls.
use crate::additional;
use crate::ast::YamlDocument;
use crate::diagnostics::problems_to_diagnostics;
use crate::error::SchemaError;
use crate::features::{codelens, completion, hover, symbols};
use crate::parser::{self, CustomTagKind, YamlStream};
use crate::problems::Problem;
use crate::registry::{
    CustomSchemaProvider, SchemaConfiguration, SchemaContentRetriever, SchemaContributions,
    SchemaPriority, SchemaRegistry,
};
use crate::settings::{LanguageSettings, YamlVersion};
use crate::validation::{validate_document, ValidationOptions};
use ahash::AHashMap;
use lsp_types::{CodeLens, CompletionList, Diagnostic, DocumentSymbol, Hover, Position, SymbolInformation, Url};
use serde_json::Value;

/// A schema-store catalog entry, as pre-fetched by the host.
#[derive(Clone, Debug, Default)]
pub struct SchemaStoreEntry {
    pub url: String,
    pub file_match: Vec<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub versions: Option<AHashMap<String, String>>,
}

pub struct LanguageService {
    registry: SchemaRegistry,
    settings: LanguageSettings,
    custom_tags: AHashMap<String, CustomTagKind>,
}

impl std::fmt::Debug for LanguageService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LanguageService")
            .field("settings", &self.settings)
            .field("custom_tags", &self.custom_tags)
            .finish()
    }
}

impl LanguageService {
    pub fn new(retriever: Option<Box<dyn SchemaContentRetriever>>) -> LanguageService {
        LanguageService {
            registry: SchemaRegistry::new(retriever),
            settings: LanguageSettings::default(),
            custom_tags: AHashMap::new(),
        }
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    pub fn settings(&self) -> &LanguageSettings {
        &self.settings
    }

    /// Apply host settings: registered schemas (with per-version URI
    /// substitution), custom tags, validation toggles.
    pub fn configure(&mut self, settings: LanguageSettings) {
        self.registry.clear_external_schemas();
        let version_key = match settings.yaml_version {
            YamlVersion::V1_1 => "1.1",
            YamlVersion::V1_2 => "1.2",
        };
        for entry in &settings.schemas {
            let mut entry = entry.clone();
            if let Some(versions) = &entry.versions {
                if let Some(uri) = versions.get(version_key) {
                    entry.uri = uri.clone();
                }
            }
            self.registry
                .register_external(&entry, SchemaPriority::Settings);
        }
        self.custom_tags = parser::custom_tag_map(&settings.custom_tags);
        self.settings = settings;
    }

    /// Install contributed default schemas/associations from the host.
    pub fn set_contributions(&self, contributions: &SchemaContributions) {
        self.registry.set_contributions(contributions);
    }

    /// Install schema-store catalog entries: every entry matching YAML
    /// files contributes a store-priority association.
    pub fn set_schema_store_entries(&self, entries: &[SchemaStoreEntry]) {
        let version_key = match self.settings.yaml_version {
            YamlVersion::V1_1 => "1.1",
            YamlVersion::V1_2 => "1.2",
        };
        for entry in entries {
            let yaml_matches: Vec<String> = entry
                .file_match
                .iter()
                .filter(|pattern| pattern.ends_with(".yml") || pattern.ends_with(".yaml"))
                .cloned()
                .collect();
            if yaml_matches.is_empty() {
                continue;
            }
            let mut uri = entry.url.clone();
            if let Some(versions) = &entry.versions {
                if let Some(versioned) = versions.get(version_key) {
                    uri = versioned.clone();
                }
            }
            self.registry.register_external(
                &SchemaConfiguration {
                    uri,
                    file_match: yaml_matches,
                    name: entry.name.clone(),
                    description: entry.description.clone(),
                    ..SchemaConfiguration::default()
                },
                SchemaPriority::SchemaStore,
            );
        }
    }

    fn validation_options(&self, is_kubernetes: bool) -> ValidationOptions {
        ValidationOptions {
            is_kubernetes: is_kubernetes || self.settings.is_kubernetes,
            disable_additional_properties: self.settings.disable_additional_properties,
            call_from_auto_complete: false,
        }
    }

    fn parse(&self, text: &str) -> YamlStream {
        parser::parse_with_tags(text, &self.custom_tags)
    }

    /// Validate a document: tokenizer errors, schema problems and the
    /// schema-independent validators, deduplicated and in document
    /// order across a multi-document stream.
    pub fn do_validation(&self, uri: &str, text: &str, is_kubernetes: bool) -> Vec<Diagnostic> {
        if !self.settings.validate {
            return Vec::new();
        }
        let stream = self.parse(text);
        let options = self.validation_options(is_kubernetes);
        let mut diagnostics = problems_to_diagnostics(&stream.problems, text, &stream.index);
        for doc in &stream.documents {
            let mut problems: Vec<Problem> = doc.problems.clone();
            if let Some((resolved, _)) =
                self.registry
                    .resolve_for_resource(uri, text, Some(doc), options.is_kubernetes)
            {
                for error in &resolved.errors {
                    problems.push(Problem::warning(
                        document_start(doc),
                        document_span(doc),
                        error.clone(),
                    ));
                }
                problems.extend(validate_document(doc, &resolved, &options));
            }
            diagnostics.extend(problems_to_diagnostics(&problems, text, &stream.index));
            diagnostics.extend(additional::validate_flow_style(
                doc,
                &self.settings,
                text,
                &stream.index,
            ));
            diagnostics.extend(additional::validate_unused_anchors(doc, text, &stream.index));
            diagnostics.extend(additional::validate_key_ordering(
                doc,
                &self.settings,
                text,
                &stream.index,
            ));
        }
        diagnostics
    }

    /// Completion proposals at a position.
    pub fn do_complete(
        &self,
        uri: &str,
        text: &str,
        position: Position,
        is_kubernetes: bool,
    ) -> CompletionList {
        let empty = CompletionList {
            is_incomplete: false,
            items: Vec::new(),
        };
        if !self.settings.completion {
            return empty;
        }
        let stream = self.parse(text);
        let offset = stream.index.offset_at(text, position);
        let doc = match document_at_offset(&stream, offset) {
            Some(doc) => doc,
            None => return empty,
        };
        let options = self.validation_options(is_kubernetes);
        match self
            .registry
            .resolve_for_resource(uri, text, Some(doc), options.is_kubernetes)
        {
            Some((resolved, _)) => {
                completion::do_complete(doc, offset, &resolved, &self.settings, &options)
            }
            None => empty,
        }
    }

    /// Hover contents at a position.
    pub fn do_hover(&self, uri: &str, text: &str, position: Position) -> Option<Hover> {
        if !self.settings.hover {
            return None;
        }
        let stream = self.parse(text);
        let offset = stream.index.offset_at(text, position);
        let doc = document_at_offset(&stream, offset)?;
        let options = self.validation_options(false);
        let (resolved, _) =
            self.registry
                .resolve_for_resource(uri, text, Some(doc), options.is_kubernetes)?;
        hover::do_hover(doc, text, &stream.index, offset, &resolved, &options)
    }

    /// Hierarchical symbols for every document in the stream.
    pub fn find_document_symbols(&self, _uri: &str, text: &str) -> Vec<DocumentSymbol> {
        let stream = self.parse(text);
        stream
            .documents
            .iter()
            .flat_map(|doc| symbols::document_symbols(doc, text, &stream.index))
            .collect()
    }

    /// Flat symbols for every document in the stream.
    pub fn find_document_symbols_flat(&self, uri: &str, text: &str) -> Vec<SymbolInformation> {
        let parsed_uri = Url::parse(uri)
            .unwrap_or_else(|_| Url::parse("file:///untitled").expect("Is a valid URL"));
        let stream = self.parse(text);
        stream
            .documents
            .iter()
            .flat_map(|doc| symbols::flat_symbols(doc, text, &stream.index, &parsed_uri))
            .collect()
    }

    /// Unresolved code lenses advertising each document's schemas.
    pub fn get_code_lens(&self, uri: &str, text: &str) -> Vec<CodeLens> {
        let stream = self.parse(text);
        let mut lenses = Vec::new();
        for doc in &stream.documents {
            let uris = self
                .registry
                .schemas_for_resource(uri, text, Some(doc));
            lenses.extend(codelens::lenses_for_document(doc, text, &stream.index, &uris));
        }
        lenses
    }

    pub fn resolve_code_lens(&self, lens: CodeLens) -> CodeLens {
        codelens::resolve_code_lens(lens)
    }

    // -- schema management ------------------------------------------------

    pub fn add_schema(&self, id: &str, schema: Value) {
        self.registry.save_schema(id, schema);
    }

    pub fn delete_schema(&self, id: &str) {
        self.registry.delete_schema(id);
    }

    pub fn modify_schema_content(
        &self,
        schema: &str,
        path: &[String],
        key: &str,
        content: Value,
    ) -> Result<(), SchemaError> {
        self.registry.modify_schema_content(schema, path, key, content)
    }

    pub fn delete_schema_content(
        &self,
        schema: &str,
        path: &[String],
        key: &str,
    ) -> Result<(), SchemaError> {
        self.registry.delete_schema_content(schema, path, key)
    }

    pub fn delete_schemas_whole(&self, schemas: &[String]) {
        self.registry.delete_schemas_whole(schemas);
    }

    pub fn reset_schema(&self, uri: &str) -> bool {
        self.registry.on_resource_change(uri)
    }

    pub fn register_custom_schema_provider(&self, provider: CustomSchemaProvider) {
        self.registry.register_custom_provider(provider);
    }
}

fn document_start(doc: &YamlDocument) -> usize {
    doc.root.map(|root| doc.node(root).offset).unwrap_or(0)
}

fn document_span(doc: &YamlDocument) -> usize {
    doc.root.map(|root| doc.node(root).length).unwrap_or(0)
}

/// Pick the sub-document whose root span contains `offset`, falling
/// back to the last one before it.
fn document_at_offset(stream: &YamlStream, offset: usize) -> Option<&YamlDocument> {
    let mut best: Option<&YamlDocument> = None;
    for doc in &stream.documents {
        match doc.root {
            Some(root) => {
                let node = doc.node(root);
                if offset >= node.offset && offset <= node.end() {
                    return Some(doc);
                }
                if node.offset <= offset {
                    best = Some(doc);
                }
            }
            None => continue,
        }
    }
    best.or_else(|| stream.documents.first())
}
