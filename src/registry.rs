//! Schema registry: maps file URIs to candidate schemas and memoises
//! loaded/resolved schema documents.
//!
//! Candidates come from, in descending priority: the modeline comment,
//! a root `$schema` property, a custom provider callback, file-pattern
//! associations (ranked by advertised priority, ties combined through
//! `allOf`), and Kubernetes GVK auto-detection.
use crate::ast::{NodeKind, YamlDocument};
use crate::error::SchemaError;
use crate::glob;
use crate::resolver::{
    resolve_schema_content, ResolvedSchema, SchemaDocumentSource, UnresolvedSchema,
};
use crate::schema::{JsonSchema, SchemaRef};
use ahash::{AHashMap, AHashSet};
use lazy_static::lazy_static;
use parking_lot::Mutex;
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use regex::Regex;
use serde_json::Value;
use url::Url;

pub const KUBERNETES_SCHEMA_URL: &str =
    "https://raw.githubusercontent.com/yannh/kubernetes-json-schema/master/v1.32.1-standalone-strict/all.json";
pub const CRD_CATALOG_URL: &str =
    "https://raw.githubusercontent.com/datreeio/CRDs-catalog/main";
const COMBINED_SCHEMA_PREFIX: &str = "schemaservice://combinedSchema/";

lazy_static! {
    static ref MODELINE_RE: Regex =
        Regex::new(r"^#\s+yaml-language-server\s*:\s*\$schema\s*[=:]\s*(\S+)")
            .expect("Is a valid regex");
}

/// How strongly a schema registration binds to the files it matches.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum SchemaPriority {
    SchemaStore = 1,
    SchemaAssociation = 2,
    Settings = 3,
}

/// Host-injected loader for schema documents. Blocking; failures are
/// reported as resolution errors, never raised.
pub trait SchemaContentRetriever {
    fn retrieve(&self, uri: &str) -> anyhow::Result<String>;
}

/// Maps a resource URI to one or more schema URIs.
pub type CustomSchemaProvider = Box<dyn Fn(&str) -> Option<Vec<String>>>;

/// One schema registration from settings or the schema store.
#[derive(Clone, Debug, Default)]
pub struct SchemaConfiguration {
    pub uri: String,
    pub file_match: Vec<String>,
    pub schema: Option<Value>,
    pub priority: Option<SchemaPriority>,
    /// Per-YAML-version URI overrides, e.g. `{"1.1": …, "1.2": …}`.
    pub versions: Option<AHashMap<String, String>>,
    pub name: Option<String>,
    pub description: Option<String>,
}

/// Default schemas installed by the host; they survive
/// `clear_external_schemas`.
#[derive(Clone, Debug, Default)]
pub struct SchemaContributions {
    pub schemas: Vec<(String, Value)>,
    pub associations: Vec<(String, Vec<String>)>,
}

#[derive(Default)]
struct Handle {
    inline: Option<Value>,
    unresolved: Option<UnresolvedSchema>,
    resolved: Option<ResolvedSchema>,
    dependencies: AHashSet<String>,
}

struct Association {
    regex: Option<Regex>,
    uris: Vec<String>,
    priority: SchemaPriority,
}

#[derive(Default)]
struct State {
    handles: AHashMap<String, Handle>,
    associations: Vec<Association>,
    contribution_associations: Vec<Association>,
    external_uris: Vec<String>,
    priorities: AHashMap<String, AHashSet<u8>>,
    kubernetes_url: String,
}

pub struct SchemaRegistry {
    retriever: Option<Box<dyn SchemaContentRetriever>>,
    custom_provider: Mutex<Option<CustomSchemaProvider>>,
    state: Mutex<State>,
}

impl std::fmt::Debug for SchemaRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("SchemaRegistry")
            .field("handles", &state.handles.keys().collect::<Vec<_>>())
            .field("associations", &state.associations.len())
            .finish()
    }
}

impl SchemaRegistry {
    pub fn new(retriever: Option<Box<dyn SchemaContentRetriever>>) -> SchemaRegistry {
        let mut state = State::default();
        state.kubernetes_url = KUBERNETES_SCHEMA_URL.to_string();
        SchemaRegistry {
            retriever,
            custom_provider: Mutex::new(None),
            state: Mutex::new(state),
        }
    }

    pub fn set_kubernetes_url(&self, url: impl Into<String>) {
        self.state.lock().kubernetes_url = url.into();
    }

    pub fn register_custom_provider(&self, provider: CustomSchemaProvider) {
        *self.custom_provider.lock() = Some(provider);
    }

    /// Install host contributions. Kept across `clear_external_schemas`.
    pub fn set_contributions(&self, contributions: &SchemaContributions) {
        let mut state = self.state.lock();
        for (uri, schema) in &contributions.schemas {
            let uri = normalize_id(uri);
            let handle = state.handles.entry(uri).or_default();
            handle.inline = Some(schema.clone());
            handle.unresolved = None;
            handle.resolved = None;
        }
        state.contribution_associations = contributions
            .associations
            .iter()
            .map(|(pattern, uris)| Association {
                regex: glob::compile_patterns(std::slice::from_ref(pattern)),
                uris: uris.iter().map(|u| normalize_id(u)).collect(),
                priority: SchemaPriority::SchemaAssociation,
            })
            .collect();
    }

    /// Drop all externally registered schemas and associations,
    /// keeping contributions and cached documents.
    pub fn clear_external_schemas(&self) {
        let mut state = self.state.lock();
        let external = std::mem::take(&mut state.external_uris);
        for uri in external {
            if let Some(handle) = state.handles.get_mut(&uri) {
                handle.inline = None;
                handle.unresolved = None;
                handle.resolved = None;
            }
        }
        state.associations.clear();
        state.priorities.clear();
    }

    /// Register or replace an external schema, with optional inline
    /// content and file-match patterns.
    pub fn register_external(&self, configuration: &SchemaConfiguration, priority: SchemaPriority) {
        let uri = normalize_id(&configuration.uri);
        let mut state = self.state.lock();
        let handle = state.handles.entry(uri.clone()).or_default();
        handle.unresolved = None;
        handle.resolved = None;
        handle.inline = configuration.schema.clone();
        state.external_uris.push(uri.clone());
        let priority = configuration.priority.unwrap_or(priority);
        state
            .priorities
            .entry(uri.clone())
            .or_default()
            .insert(priority as u8);
        if !configuration.file_match.is_empty() {
            state.associations.push(Association {
                regex: glob::compile_patterns(&configuration.file_match),
                uris: vec![uri],
                priority,
            });
        }
    }

    pub fn add_priority(&self, uri: &str, priority: SchemaPriority) {
        let uri = normalize_id(uri);
        self.state
            .lock()
            .priorities
            .entry(uri)
            .or_default()
            .insert(priority as u8);
    }

    /// Replace a schema's content in place and drop its memoised state.
    pub fn save_schema(&self, uri: &str, content: Value) {
        let uri = normalize_id(uri);
        {
            let mut state = self.state.lock();
            let handle = state.handles.entry(uri.clone()).or_default();
            handle.inline = Some(content);
            handle.unresolved = None;
            handle.resolved = None;
        }
        self.on_resource_change(&uri);
    }

    pub fn delete_schema(&self, uri: &str) {
        let uri = normalize_id(uri);
        {
            let mut state = self.state.lock();
            state.handles.remove(&uri);
            state.priorities.remove(&uri);
            for association in &mut state.associations {
                association.uris.retain(|u| u != &uri);
            }
            state.associations.retain(|a| !a.uris.is_empty());
        }
        self.on_resource_change(&uri);
    }

    /// Invalidate the memoised state of `uri` and of every schema that
    /// transitively depends on it. Returns whether anything changed.
    pub fn on_resource_change(&self, uri: &str) -> bool {
        let uri = normalize_id(uri);
        let mut state = self.state.lock();
        let mut touched = false;
        let mut queue = vec![uri];
        while let Some(current) = queue.pop() {
            for (handle_uri, handle) in state.handles.iter_mut() {
                let direct = *handle_uri == current;
                let dependent = handle.dependencies.contains(&current);
                if (direct || dependent) && (handle.unresolved.is_some() || handle.resolved.is_some())
                {
                    handle.unresolved = None;
                    handle.resolved = None;
                    handle.dependencies.clear();
                    touched = true;
                    if dependent {
                        queue.push(handle_uri.clone());
                    }
                }
            }
        }
        touched
    }

    fn retrieve_content(&self, uri: &str) -> anyhow::Result<String> {
        match &self.retriever {
            Some(retriever) => retriever.retrieve(uri),
            None => Err(anyhow::anyhow!("no schema content retriever registered")),
        }
    }

    /// Parse retrieved schema text: JSON first, then the crate's own
    /// YAML pipeline for YAML-authored schemas.
    fn parse_schema_text(uri: &str, content: &str) -> UnresolvedSchema {
        let value: Result<Value, String> = serde_json::from_str(content).or_else(|json_error| {
            let stream = crate::parser::parse(content);
            match stream
                .documents
                .first()
                .and_then(|doc| doc.root.map(|root| doc.get_value(root)))
            {
                Some(value) if stream.problems.is_empty() => Ok(value),
                _ => Err(json_error.to_string()),
            }
        });
        match value {
            Ok(value) => match SchemaRef::from_value(value) {
                Ok(schema) => UnresolvedSchema::new(schema),
                Err(error) => UnresolvedSchema::with_errors(
                    SchemaRef::new(JsonSchema::default()),
                    vec![format!("Unable to parse content from '{}': {}", uri, error)],
                ),
            },
            Err(error) => UnresolvedSchema::with_errors(
                SchemaRef::new(JsonSchema::default()),
                vec![format!("Unable to parse content from '{}': {}", uri, error)],
            ),
        }
    }

    /// Memoised unresolved-schema lookup; load failures stay cached on
    /// the handle until `on_resource_change`.
    pub(crate) fn get_unresolved_schema(&self, uri: &str) -> UnresolvedSchema {
        let uri = normalize_id(uri);
        {
            let state = self.state.lock();
            if let Some(handle) = state.handles.get(&uri) {
                if let Some(unresolved) = &handle.unresolved {
                    return unresolved.clone();
                }
            }
        }
        let inline = {
            let state = self.state.lock();
            state.handles.get(&uri).and_then(|h| h.inline.clone())
        };
        let unresolved = match inline {
            Some(value) => match SchemaRef::from_value(value) {
                Ok(schema) => UnresolvedSchema::new(schema),
                Err(error) => UnresolvedSchema::with_errors(
                    SchemaRef::new(JsonSchema::default()),
                    vec![format!("Unable to parse content from '{}': {}", uri, error)],
                ),
            },
            None => match self.retrieve_content(&uri) {
                Ok(content) => Self::parse_schema_text(&uri, &content),
                Err(error) => {
                    tracing::warn!(%uri, %error, "schema retrieval failed");
                    UnresolvedSchema::with_errors(
                        SchemaRef::new(JsonSchema::default()),
                        vec![format!("Unable to load schema from '{}': {}", uri, error)],
                    )
                }
            },
        };
        let mut state = self.state.lock();
        let handle = state.handles.entry(uri).or_default();
        handle.unresolved = Some(unresolved.clone());
        unresolved
    }

    /// Memoised resolved-schema lookup.
    pub fn get_resolved_schema(&self, uri: &str) -> ResolvedSchema {
        let uri = normalize_id(uri);
        {
            let state = self.state.lock();
            if let Some(handle) = state.handles.get(&uri) {
                if let Some(resolved) = &handle.resolved {
                    return resolved.clone();
                }
            }
        }
        let unresolved = self.get_unresolved_schema(&uri);
        let mut dependencies = AHashSet::new();
        let resolved = resolve_schema_content(self, &unresolved, &uri, &mut dependencies);
        if resolved.schema.borrow().url.is_none() {
            resolved.schema.borrow_mut().url = Some(uri.clone());
        }
        let mut state = self.state.lock();
        let handle = state.handles.entry(uri).or_default();
        handle.resolved = Some(resolved.clone());
        handle.dependencies = dependencies;
        resolved
    }

    /// The candidate schema URIs for a resource, best source first.
    pub fn schemas_for_resource(
        &self,
        resource: &str,
        text: &str,
        document: Option<&YamlDocument>,
    ) -> Vec<String> {
        if let Some(uri) = modeline_schema(text) {
            return vec![normalize_id(&uri)];
        }
        if let Some(uri) = document.and_then(schema_property) {
            return vec![normalize_id(&uri)];
        }
        if let Some(provider) = self.custom_provider.lock().as_ref() {
            if let Some(uris) = provider(resource) {
                if !uris.is_empty() {
                    return uris.iter().map(|u| normalize_id(u)).collect();
                }
            }
        }
        let from_patterns = self.schemas_from_patterns(resource);
        if !from_patterns.is_empty() {
            return from_patterns;
        }
        Vec::new()
    }

    fn schemas_from_patterns(&self, resource: &str) -> Vec<String> {
        let state = self.state.lock();
        let mut best: Option<SchemaPriority> = None;
        let mut uris: Vec<String> = Vec::new();
        let associations = state
            .associations
            .iter()
            .chain(state.contribution_associations.iter());
        let mut matches: Vec<(&Association, SchemaPriority)> = Vec::new();
        for association in associations {
            let matched = association
                .regex
                .as_ref()
                .map(|re| re.is_match(resource))
                .unwrap_or(false);
            if !matched {
                continue;
            }
            let mut priority = association.priority;
            for uri in &association.uris {
                if let Some(advertised) = state.priorities.get(uri) {
                    if let Some(max) = advertised.iter().max() {
                        priority = priority.max(priority_from(*max));
                    }
                }
            }
            matches.push((association, priority));
        }
        for (association, priority) in &matches {
            match best {
                Some(b) if *priority < b => continue,
                Some(b) if *priority > b => {
                    uris.clear();
                    best = Some(*priority);
                }
                None => best = Some(*priority),
                _ => {}
            }
            for uri in &association.uris {
                if !uris.contains(uri) {
                    uris.push(uri.clone());
                }
            }
        }
        uris
    }

    /// Resolve the schema to validate `resource` with, combining
    /// multiple candidates through `allOf` and falling back to
    /// Kubernetes GVK detection.
    pub fn resolve_for_resource(
        &self,
        resource: &str,
        text: &str,
        document: Option<&YamlDocument>,
        is_kubernetes: bool,
    ) -> Option<(ResolvedSchema, Vec<String>)> {
        let mut uris = self.schemas_for_resource(resource, text, document);
        if uris.is_empty() && is_kubernetes {
            if let Some(uri) = document.and_then(|doc| self.kubernetes_schema_uri(doc)) {
                uris = vec![uri];
            }
        }
        if uris.is_empty() {
            return None;
        }
        if uris.len() == 1 {
            let uri = uris[0].clone();
            return Some((self.get_resolved_schema(&uri), uris));
        }
        let combined_uri = format!(
            "{}{}",
            COMBINED_SCHEMA_PREFIX,
            utf8_percent_encode(resource, NON_ALPHANUMERIC)
        );
        let all_of: Vec<Value> = uris
            .iter()
            .map(|uri| serde_json::json!({ "$ref": uri }))
            .collect();
        self.save_schema(&combined_uri, serde_json::json!({ "allOf": all_of }));
        Some((self.get_resolved_schema(&combined_uri), uris))
    }

    /// GVK auto-detection: when the main Kubernetes schema does not
    /// carry the document's group/version/kind, point at the CRD
    /// catalog instead.
    fn kubernetes_schema_uri(&self, document: &YamlDocument) -> Option<String> {
        let kubernetes_url = self.state.lock().kubernetes_url.clone();
        let (group_version, kind) = gvk_of(document)?;
        let (group, version) = match group_version.split_once('/') {
            Some((group, version)) => (group.to_string(), version.to_string()),
            None => (String::new(), group_version.clone()),
        };
        let stripped = if group.is_empty() {
            "core".to_string()
        } else {
            group.replace(".k8s.io", "")
        };
        let type_name =
            format!("io.k8s.api.{}.{}.{}", stripped, version, kind).to_lowercase();
        if self.kubernetes_defines(&kubernetes_url, &type_name) {
            return Some(kubernetes_url);
        }
        let kind = kind.to_lowercase();
        if group == "openshift.io" || group.ends_with(".openshift.io") {
            Some(format!(
                "{}/openshift/v4.15-strict/{}_{}_{}.json",
                CRD_CATALOG_URL, kind, group, version
            ))
        } else {
            Some(format!(
                "{}/{}/{}_{}.json",
                CRD_CATALOG_URL, group, kind, version
            ))
        }
    }

    fn kubernetes_defines(&self, kubernetes_url: &str, type_name: &str) -> bool {
        let unresolved = self.get_unresolved_schema(kubernetes_url);
        let root = unresolved.schema.as_schema();
        let root = root.borrow();
        let one_of = match &root.one_of {
            Some(one_of) => one_of,
            None => return false,
        };
        one_of.iter().any(|entry| {
            entry
                .node()
                .map(|node| {
                    node.borrow()
                        .reference
                        .as_deref()
                        .map(|r| r.to_lowercase().ends_with(type_name))
                        .unwrap_or(false)
                })
                .unwrap_or(false)
        })
    }

    // -- content modification -------------------------------------------------

    fn with_inline_value<R>(
        &self,
        uri: &str,
        apply: impl FnOnce(&mut Value) -> Result<R, SchemaError>,
    ) -> Result<R, SchemaError> {
        let uri = normalize_id(uri);
        let mut state = self.state.lock();
        let handle = state
            .handles
            .get_mut(&uri)
            .ok_or_else(|| SchemaError::unknown_schema(&uri))?;
        let value = handle
            .inline
            .get_or_insert_with(|| Value::Object(serde_json::Map::new()));
        let result = apply(value)?;
        handle.unresolved = None;
        handle.resolved = None;
        drop(state);
        self.on_resource_change(&uri);
        Ok(result)
    }

    /// Insert `content` at `path`/`key` inside a registered schema's
    /// content. Every traversed segment must address an object;
    /// intermediate objects are created on demand.
    pub fn modify_schema_content(
        &self,
        uri: &str,
        path: &[String],
        key: &str,
        content: Value,
    ) -> Result<(), SchemaError> {
        self.with_inline_value(uri, |value| {
            let target = navigate_object_path(value, path, true)?;
            target.insert(key.to_string(), content);
            Ok(())
        })
    }

    /// Remove `key` at `path` inside a registered schema's content.
    pub fn delete_schema_content(
        &self,
        uri: &str,
        path: &[String],
        key: &str,
    ) -> Result<(), SchemaError> {
        self.with_inline_value(uri, |value| {
            let target = navigate_object_path(value, path, false)?;
            target.remove(key);
            Ok(())
        })
    }

    pub fn delete_schemas_whole(&self, uris: &[String]) {
        for uri in uris {
            self.delete_schema(uri);
        }
    }
}

fn navigate_object_path<'a>(
    value: &'a mut Value,
    path: &[String],
    create: bool,
) -> Result<&'a mut serde_json::Map<String, Value>, SchemaError> {
    let mut current = value;
    for segment in path {
        let map = current
            .as_object_mut()
            .ok_or_else(|| SchemaError::invalid_segment(segment.clone()))?;
        if create && !map.contains_key(segment) {
            map.insert(segment.clone(), Value::Object(serde_json::Map::new()));
        }
        current = map
            .get_mut(segment)
            .ok_or_else(|| SchemaError::invalid_segment(segment.clone()))?;
    }
    current
        .as_object_mut()
        .ok_or_else(|| SchemaError::invalid_segment(path.last().cloned().unwrap_or_default()))
}

impl SchemaDocumentSource for SchemaRegistry {
    fn load_unresolved(&self, uri: &str) -> UnresolvedSchema {
        self.get_unresolved_schema(uri)
    }

    fn resolve_relative(&self, reference: &str, base: &str) -> String {
        match Url::parse(base).ok().and_then(|b| b.join(reference).ok()) {
            Some(url) => url.to_string(),
            None => match base.rsplit_once('/') {
                Some((dir, _)) => format!("{}/{}", dir, reference),
                None => reference.to_string(),
            },
        }
    }

    fn normalize_id(&self, uri: &str) -> String {
        normalize_id(uri)
    }
}

fn priority_from(raw: u8) -> SchemaPriority {
    match raw {
        1 => SchemaPriority::SchemaStore,
        2 => SchemaPriority::SchemaAssociation,
        _ => SchemaPriority::Settings,
    }
}

pub(crate) fn normalize_id(uri: &str) -> String {
    match Url::parse(uri) {
        Ok(url) => url.to_string(),
        Err(_) => uri.to_string(),
    }
}

/// Extract the modeline schema URI from the leading comment block.
pub(crate) fn modeline_schema(text: &str) -> Option<String> {
    for line in text.lines() {
        let trimmed = line.trim_start();
        if trimmed.is_empty() {
            continue;
        }
        if !trimmed.starts_with('#') {
            break;
        }
        if let Some(captures) = MODELINE_RE.captures(trimmed) {
            return Some(captures[1].to_string());
        }
    }
    None
}

/// `$schema` property of a root mapping, when the document is an
/// object.
pub(crate) fn schema_property(document: &YamlDocument) -> Option<String> {
    let root = document.root?;
    if let NodeKind::Object { properties } = &document.node(root).kind {
        for prop in properties {
            if document.property_key(*prop) == "$schema" {
                if let NodeKind::Property {
                    value: Some(value), ..
                } = &document.node(*prop).kind
                {
                    if let NodeKind::String(s) = &document.node(*value).kind {
                        return Some(s.clone());
                    }
                }
            }
        }
    }
    None
}

fn gvk_of(document: &YamlDocument) -> Option<(String, String)> {
    let root = document.root?;
    let mut api_version = None;
    let mut kind = None;
    if let NodeKind::Object { properties } = &document.node(root).kind {
        for prop in properties {
            let key = document.property_key(*prop);
            if key != "apiVersion" && key != "kind" {
                continue;
            }
            if let NodeKind::Property {
                value: Some(value), ..
            } = &document.node(*prop).kind
            {
                if let NodeKind::String(s) = &document.node(*value).kind {
                    match key {
                        "apiVersion" => api_version = Some(s.clone()),
                        _ => kind = Some(s.clone()),
                    }
                }
            }
        }
    }
    Some((api_version?, kind?))
}
