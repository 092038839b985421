//! Recursive schema validation over the AST.
//!
//! Dispatches on node kind, expands merge keys while walking objects,
//! ranks `oneOf`/`anyOf` arms through the match counters, and records
//! every visited `{node, schema}` pair in the collector for the editor
//! features.
mod collector;
mod equal;
mod format;
mod result;

pub use collector::{MatchingSchema, SchemaCollector};
pub use result::ValidationResult;

use crate::ast::{NodeId, NodeKind, YamlDocument};
use crate::problems::{
    ErrorCode, Problem, ProblemLocation, ProblemType, YAML_SCHEMA_PREFIX, YAML_SOURCE,
};
use crate::resolver::ResolvedSchema;
use crate::schema::{
    BoolOrNumber, Dependency, JsonSchema, SchemaNode, SchemaRef, SingleOrVec, StringOrStrings,
};
use equal::equal;
use fraction::{BigFraction, BigUint};
use indexmap::IndexMap;
use lsp_types::DiagnosticSeverity;
use serde_json::Value;
use std::cmp::Ordering;
use std::rc::Rc;

const MERGE_KEY: &str = "<<";

#[derive(Clone, Debug, Default)]
pub struct ValidationOptions {
    pub is_kubernetes: bool,
    /// Treat object schemas without `additionalProperties` as if it
    /// were `false`.
    pub disable_additional_properties: bool,
    /// Relax match bookkeeping so partially-written values still yield
    /// applicable schemas for completion.
    pub call_from_auto_complete: bool,
}

/// Validate a whole document against a resolved schema.
pub fn validate_document(
    doc: &YamlDocument,
    resolved: &ResolvedSchema,
    options: &ValidationOptions,
) -> Vec<Problem> {
    let mut result = ValidationResult::new();
    let mut collector = SchemaCollector::noop();
    if let Some(root) = doc.root {
        validate(
            doc,
            root,
            &resolved.schema,
            &resolved.schema,
            &mut result,
            &mut collector,
            options,
        );
    }
    result.problems
}

/// All `{node, schema}` pairs applicable around `focus`, for the
/// completion/hover/symbol façades.
pub fn matching_schemas(
    doc: &YamlDocument,
    resolved: &ResolvedSchema,
    focus: Option<usize>,
    exclude: Option<NodeId>,
    options: &ValidationOptions,
) -> Vec<MatchingSchema> {
    let mut result = ValidationResult::new();
    let mut collector = SchemaCollector::collecting(focus, exclude);
    if let Some(root) = doc.root {
        validate(
            doc,
            root,
            &resolved.schema,
            &resolved.schema,
            &mut result,
            &mut collector,
            options,
        );
    }
    collector.into_schemas()
}

pub fn validate(
    doc: &YamlDocument,
    node: NodeId,
    schema: &SchemaNode,
    original: &SchemaNode,
    result: &mut ValidationResult,
    collector: &mut SchemaCollector,
    options: &ValidationOptions,
) {
    if !collector.include(doc, node) {
        return;
    }
    if let NodeKind::Property { value, .. } = &doc.node(node).kind {
        // Keys are validated separately via propertyNames.
        if let Some(value) = value {
            validate(doc, *value, schema, original, result, collector, options);
        }
        return;
    }
    let node = effective_node(doc, node);
    validate_common(doc, node, schema, original, result, collector, options);
    match &doc.node(node).kind {
        NodeKind::Object { properties } => {
            let properties = properties.clone();
            validate_object(doc, node, &properties, schema, original, result, collector, options);
        }
        NodeKind::Array { items } => {
            let items = items.clone();
            validate_array(doc, node, &items, schema, original, result, collector, options);
        }
        NodeKind::String(value) => {
            let value = value.clone();
            validate_string(doc, node, &value, schema, original, result);
        }
        NodeKind::Number { value, .. } => {
            validate_number(doc, node, *value, schema, original, result);
        }
        _ => {}
    }
    collector.add(MatchingSchema {
        node,
        schema: Rc::clone(schema),
        inverted: false,
    });
}

/// Follow an alias leaf to the anchored node it stands for; the alias
/// keeps its own identity only when the chain does not resolve or the
/// referent contains the alias itself (`&a [*a]`).
fn effective_node(doc: &YamlDocument, node: NodeId) -> NodeId {
    if !doc.node(node).is_alias() {
        return node;
    }
    let target = doc.resolve_alias(node);
    if target == node {
        return node;
    }
    let target_node = doc.node(target);
    let alias_node = doc.node(node);
    let self_containing =
        target_node.offset <= alias_node.offset && alias_node.end() <= target_node.end();
    if self_containing {
        node
    } else {
        target
    }
}

fn node_location(doc: &YamlDocument, node: NodeId) -> ProblemLocation {
    let n = doc.node(node);
    ProblemLocation {
        offset: n.offset,
        length: n.length,
    }
}

/// Source label and URI attribution for a problem produced by `schema`.
/// Titles win over URL tails, with the enclosing schema's title as the
/// nearest fallback.
fn attribution(schema: &SchemaNode, original: &SchemaNode) -> (String, Vec<String>) {
    let s = schema.borrow();
    let original_title = || {
        if Rc::ptr_eq(schema, original) {
            None
        } else {
            original.borrow().title.clone()
        }
    };
    let label = s
        .title
        .clone()
        .or_else(original_title)
        .or_else(|| s.label())
        .or_else(|| {
            if Rc::ptr_eq(schema, original) {
                None
            } else {
                original.borrow().label()
            }
        });
    let source = match label {
        Some(label) => format!("{}{}", YAML_SCHEMA_PREFIX, label),
        None => YAML_SOURCE.to_string(),
    };
    let uris = match &s.url {
        Some(url) => vec![url.clone()],
        None => {
            if Rc::ptr_eq(schema, original) {
                Vec::new()
            } else {
                original
                    .borrow()
                    .url
                    .clone()
                    .map(|u| vec![u])
                    .unwrap_or_default()
            }
        }
    };
    (source, uris)
}

#[allow(clippy::too_many_arguments)]
fn schema_problem(
    location: ProblemLocation,
    message: String,
    code: Option<ErrorCode>,
    problem_type: Option<ProblemType>,
    problem_args: Vec<String>,
    schema: &SchemaNode,
    original: &SchemaNode,
) -> Problem {
    let (source, schema_uris) = attribution(schema, original);
    Problem {
        location,
        severity: DiagnosticSeverity::WARNING,
        code,
        message,
        source,
        schema_uris,
        problem_type,
        problem_args,
    }
}

fn node_matches_type(doc: &YamlDocument, node: NodeId, type_name: &str) -> bool {
    let n = doc.node(node);
    match type_name {
        "integer" => matches!(n.kind, NodeKind::Number { is_integer: true, .. }),
        other => n.type_name() == other,
    }
}

#[allow(clippy::too_many_arguments)]
fn validate_common(
    doc: &YamlDocument,
    node: NodeId,
    schema: &SchemaNode,
    original: &SchemaNode,
    result: &mut ValidationResult,
    collector: &mut SchemaCollector,
    options: &ValidationOptions,
) {
    let s = schema.borrow();

    if let Some(types) = &s.schema_type {
        let names: Vec<&str> = types.iter().collect();
        if !names.iter().any(|&t| node_matches_type(doc, node, t)) {
            let location = node_location(doc, node);
            let problem = if names.len() == 1 {
                let args = vec![names[0].to_string()];
                let message = s
                    .error_message
                    .clone()
                    .unwrap_or_else(|| ProblemType::TypeMismatch.message(&args));
                schema_problem(
                    location,
                    message,
                    None,
                    Some(ProblemType::TypeMismatch),
                    args,
                    schema,
                    original,
                )
            } else {
                let listing = names
                    .iter()
                    .map(|t| format!("\"{}\"", t))
                    .collect::<Vec<_>>()
                    .join(", ");
                let message = s
                    .error_message
                    .clone()
                    .unwrap_or_else(|| format!("Incorrect type. Expected one of {}.", listing));
                schema_problem(location, message, None, None, Vec::new(), schema, original)
            };
            result.problems.push(problem);
        }
    }

    if let Some(all_of) = &s.all_of {
        for sub in all_of {
            validate(doc, node, &sub.as_schema(), schema, result, collector, options);
        }
    }

    if let Some(not_schema) = &s.not {
        let mut sub_result = ValidationResult::new();
        let mut sub_collector = collector.new_sub();
        validate(
            doc,
            node,
            &not_schema.as_schema(),
            schema,
            &mut sub_result,
            &mut sub_collector,
            options,
        );
        if !sub_result.has_problems() {
            result.problems.push(schema_problem(
                node_location(doc, node),
                "Matches a schema that is not allowed.".to_string(),
                None,
                None,
                Vec::new(),
                schema,
                original,
            ));
        }
        collector.merge_inverted(sub_collector);
    }

    if let Some(one_of) = &s.one_of {
        test_alternatives(doc, node, one_of, true, schema, original, result, collector, options);
    }
    if let Some(any_of) = &s.any_of {
        test_alternatives(doc, node, any_of, false, schema, original, result, collector, options);
    }

    if s.if_schema.is_some() {
        test_condition(doc, node, &s, schema, result, collector, options);
    }

    if let Some(values) = &s.enumeration {
        let value = doc.get_value(node);
        let mut matched = values.iter().any(|candidate| equal(&value, candidate));
        if !matched && options.call_from_auto_complete {
            if let Value::String(prefix) = &value {
                matched = values
                    .iter()
                    .any(|c| matches!(c, Value::String(s) if s.starts_with(prefix)));
            }
        }
        result.enum_value_match = matched;
        result.enum_values = values.clone();
        if !matched {
            let listing = values
                .iter()
                .map(|v| serde_json::to_string(v).unwrap_or_default())
                .collect::<Vec<_>>()
                .join(", ");
            result.problems.push(schema_problem(
                node_location(doc, node),
                format!("Value is not accepted. Valid values: {}.", listing),
                Some(ErrorCode::EnumValueMismatch),
                None,
                Vec::new(),
                schema,
                original,
            ));
        }
    }

    if let Some(constant) = &s.constant {
        let value = doc.get_value(node);
        let matched = equal(&value, constant);
        result.enum_value_match = matched;
        result.enum_values = vec![constant.clone()];
        if !matched {
            let rendered = serde_json::to_string(constant).unwrap_or_default();
            let args = vec![rendered];
            result.problems.push(schema_problem(
                node_location(doc, node),
                ProblemType::ConstMismatch.message(&args),
                Some(ErrorCode::EnumValueMismatch),
                Some(ProblemType::ConstMismatch),
                args,
                schema,
                original,
            ));
        }
    }

    if let Some(message) = &s.deprecation_message {
        if let Some(parent) = doc.node(node).parent {
            if matches!(doc.node(parent).kind, NodeKind::Property { .. }) {
                result.problems.push(schema_problem(
                    node_location(doc, parent),
                    message.clone(),
                    Some(ErrorCode::Deprecated),
                    None,
                    Vec::new(),
                    schema,
                    original,
                ));
            }
        }
    }
}

struct BestMatch {
    schema: SchemaNode,
    result: ValidationResult,
    collector: SchemaCollector,
}

#[allow(clippy::too_many_arguments)]
fn test_alternatives(
    doc: &YamlDocument,
    node: NodeId,
    alternatives: &[SchemaRef],
    max_one_match: bool,
    schema: &SchemaNode,
    original: &SchemaNode,
    result: &mut ValidationResult,
    collector: &mut SchemaCollector,
    options: &ValidationOptions,
) {
    let mut best: Option<BestMatch> = None;
    let mut match_count = 0usize;
    let mut any_substantial_match = false;
    for alternative in alternatives {
        let sub_schema = alternative.as_schema();
        let mut sub_result = ValidationResult::new();
        let mut sub_collector = collector.new_sub();
        validate(
            doc,
            node,
            &sub_schema,
            schema,
            &mut sub_result,
            &mut sub_collector,
            options,
        );
        if !sub_result.has_problems() || options.call_from_auto_complete {
            match_count += 1;
            if sub_result.properties_matches > 0
                || sub_result.properties_value_matches > 0
                || sub_result.primary_value_matches > 0
                || sub_result.enum_value_match
            {
                any_substantial_match = true;
            }
        }
        let candidate = BestMatch {
            schema: sub_schema,
            result: sub_result,
            collector: sub_collector,
        };
        best = Some(match best {
            None => candidate,
            Some(current) => {
                if options.is_kubernetes {
                    kubernetes_comparison(current, candidate)
                } else {
                    generic_comparison(doc, node, max_one_match, current, candidate, options)
                }
            }
        });
    }
    if match_count > 1 && max_one_match && !options.is_kubernetes && any_substantial_match {
        result.problems.push(schema_problem(
            ProblemLocation {
                offset: doc.node(node).offset,
                length: 1,
            },
            "Matches multiple schemas when only one must validate.".to_string(),
            None,
            None,
            Vec::new(),
            schema,
            original,
        ));
    }
    if let Some(best) = best {
        result.enum_value_match = result.enum_value_match || best.result.enum_value_match;
        if !best.result.enum_values.is_empty() {
            result.enum_values.extend(best.result.enum_values.iter().cloned());
        }
        result.properties_matches += best.result.properties_matches;
        result.properties_value_matches += best.result.properties_value_matches;
        result.merge(best.result);
        collector.merge(best.collector);
    }
}

fn generic_comparison(
    doc: &YamlDocument,
    node: NodeId,
    max_one_match: bool,
    mut best: BestMatch,
    candidate: BestMatch,
    options: &ValidationOptions,
) -> BestMatch {
    if !max_one_match
        && !candidate.result.has_problems()
        && (!best.result.has_problems() || options.call_from_auto_complete)
    {
        // Equally clean anyOf arms pool their coverage.
        best.collector.merge(candidate.collector);
        best.result.properties_matches += candidate.result.properties_matches;
        best.result.properties_value_matches += candidate.result.properties_value_matches;
        return best;
    }
    match candidate.result.compare_generic(&best.result) {
        Ordering::Greater => candidate,
        Ordering::Less => best,
        Ordering::Equal => {
            if max_one_match && object_arm_loses_tie(doc, node, &best.schema) {
                candidate
            } else {
                best.collector.merge(candidate.collector);
                best.result.merge_enum_values(&candidate.result);
                best.result.merge_similar_warnings(&candidate.result);
                best
            }
        }
    }
}

/// On a tie, an arm declared `type: object` gives way when the node is
/// neither null nor an object; the other arm describes the data better.
fn object_arm_loses_tie(doc: &YamlDocument, node: NodeId, best_schema: &SchemaNode) -> bool {
    let s = best_schema.borrow();
    let object_arm = matches!(&s.schema_type, Some(StringOrStrings::One(t)) if t == "object");
    let node_type = doc.node(node).type_name();
    object_arm && node_type != "null" && node_type != "object"
}

fn kubernetes_comparison(mut best: BestMatch, candidate: BestMatch) -> BestMatch {
    match candidate.result.compare_kubernetes(&best.result) {
        Ordering::Greater => candidate,
        Ordering::Less => best,
        Ordering::Equal => {
            best.collector.merge(candidate.collector);
            best.result.merge_enum_values(&candidate.result);
            best
        }
    }
}

fn test_condition(
    doc: &YamlDocument,
    node: NodeId,
    s: &JsonSchema,
    schema: &SchemaNode,
    result: &mut ValidationResult,
    collector: &mut SchemaCollector,
    options: &ValidationOptions,
) {
    let if_schema = match &s.if_schema {
        Some(if_schema) => if_schema,
        None => return,
    };
    let mut if_result = ValidationResult::new();
    let mut if_collector = collector.new_sub();
    validate(
        doc,
        node,
        &if_schema.as_schema(),
        schema,
        &mut if_result,
        &mut if_collector,
        options,
    );
    collector.merge(if_collector);
    // The condition's own problems are discarded; only the branch
    // outcome counts.
    let branch = if !if_result.has_problems() {
        &s.then_schema
    } else {
        &s.else_schema
    };
    if let Some(branch) = branch {
        let mut branch_result = ValidationResult::new();
        let mut branch_collector = collector.new_sub();
        validate(
            doc,
            node,
            &branch.as_schema(),
            schema,
            &mut branch_result,
            &mut branch_collector,
            options,
        );
        result.properties_matches += branch_result.properties_matches;
        result.properties_value_matches += branch_result.properties_value_matches;
        result.merge(branch_result);
        collector.merge(branch_collector);
    }
}

struct SeenProperty {
    prop: NodeId,
    value: Option<NodeId>,
}

fn property_parts(doc: &YamlDocument, prop: NodeId) -> (String, Option<NodeId>) {
    let value = match &doc.node(prop).kind {
        NodeKind::Property { value, .. } => *value,
        _ => None,
    };
    (doc.property_key(prop).to_string(), value)
}

/// Record a mapping's own pairs plus everything spliced in through
/// merge keys. `<<` values may be a map, a sequence of maps, or aliases
/// to either.
fn collect_seen_properties(
    doc: &YamlDocument,
    properties: &[NodeId],
    seen: &mut IndexMap<String, SeenProperty>,
    unprocessed: &mut Vec<String>,
) {
    for prop in properties {
        let (key, value) = property_parts(doc, *prop);
        if key == MERGE_KEY {
            if let Some(value) = value {
                expand_merge_value(doc, value, seen, unprocessed, &mut Vec::new());
            }
            continue;
        }
        if !unprocessed.contains(&key) {
            unprocessed.push(key.clone());
        }
        seen.insert(key, SeenProperty { prop: *prop, value });
    }
}

fn expand_merge_value(
    doc: &YamlDocument,
    value: NodeId,
    seen: &mut IndexMap<String, SeenProperty>,
    unprocessed: &mut Vec<String>,
    visited: &mut Vec<NodeId>,
) {
    let resolved = doc.resolve_alias(value);
    if visited.contains(&resolved) {
        return;
    }
    visited.push(resolved);
    match &doc.node(resolved).kind {
        NodeKind::Object { properties } => {
            for prop in properties {
                let (key, value) = property_parts(doc, *prop);
                if key == MERGE_KEY {
                    // Merge chains splice through transitively.
                    if let Some(value) = value {
                        expand_merge_value(doc, value, seen, unprocessed, visited);
                    }
                    continue;
                }
                if !unprocessed.contains(&key) {
                    unprocessed.push(key.clone());
                }
                seen.insert(key, SeenProperty { prop: *prop, value });
            }
        }
        NodeKind::Array { items } => {
            for item in items {
                expand_merge_value(doc, *item, seen, unprocessed, visited);
            }
        }
        _ => {}
    }
}

fn key_location(doc: &YamlDocument, seen_property: &SeenProperty) -> ProblemLocation {
    if let NodeKind::Property { key, .. } = &doc.node(seen_property.prop).kind {
        return node_location(doc, *key);
    }
    node_location(doc, seen_property.prop)
}

fn inherit_url(target: &SchemaNode, parent: &JsonSchema, original: &SchemaNode) {
    let url = parent
        .url
        .clone()
        .or_else(|| original.borrow().url.clone());
    if let Some(url) = url {
        if let Ok(mut target) = target.try_borrow_mut() {
            if target.url.is_none() {
                target.url = Some(url);
            }
        }
    }
}

fn remove_key(unprocessed: &mut Vec<String>, key: &str) {
    unprocessed.retain(|k| k != key);
}

fn compile_user_pattern(pattern: &str) -> Option<fancy_regex::Regex> {
    match fancy_regex::Regex::new(pattern) {
        Ok(regex) => Some(regex),
        Err(error) => {
            tracing::warn!(%pattern, %error, "dropping invalid schema pattern");
            None
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn validate_object(
    doc: &YamlDocument,
    node: NodeId,
    properties: &[NodeId],
    schema: &SchemaNode,
    original: &SchemaNode,
    result: &mut ValidationResult,
    collector: &mut SchemaCollector,
    options: &ValidationOptions,
) {
    let s = schema.borrow();
    let mut seen: IndexMap<String, SeenProperty> = IndexMap::new();
    let mut unprocessed: Vec<String> = Vec::new();
    collect_seen_properties(doc, properties, &mut seen, &mut unprocessed);

    if let Some(property_names) = &s.property_names {
        let pn_schema = property_names.as_schema();
        for prop in properties {
            if let NodeKind::Property { key, .. } = &doc.node(*prop).kind {
                let mut key_result = ValidationResult::new();
                let mut noop = SchemaCollector::noop();
                validate(doc, *key, &pn_schema, schema, &mut key_result, &mut noop, options);
                // Key problems surface, but never feed match counters.
                result.problems.extend(key_result.problems);
            }
        }
    }

    if let Some(required) = &s.required {
        for name in required {
            if !seen.contains_key(name) {
                let location = owning_key_location(doc, node);
                let args = vec![name.clone()];
                result.problems.push(schema_problem(
                    location,
                    ProblemType::MissingRequiredProp.message(&args),
                    None,
                    Some(ProblemType::MissingRequiredProp),
                    args,
                    schema,
                    original,
                ));
            }
        }
    }

    let mut validate_child =
        |child: NodeId, prop_schema: &SchemaRef, result: &mut ValidationResult, collector: &mut SchemaCollector| {
            match prop_schema {
                SchemaRef::Bool(true) => {
                    result.properties_matches += 1;
                    result.properties_value_matches += 1;
                }
                SchemaRef::Bool(false) => unreachable!("handled by caller"),
                SchemaRef::Object(prop_node) => {
                    inherit_url(prop_node, &s, original);
                    let mut sub = ValidationResult::new();
                    validate(doc, child, prop_node, schema, &mut sub, collector, options);
                    result.merge_property_match(sub);
                }
            }
        };

    if let Some(schema_properties) = &s.properties {
        for (name, prop_schema) in schema_properties {
            remove_key(&mut unprocessed, name);
            let seen_property = match seen.get(name) {
                Some(found) => found,
                None => continue,
            };
            match prop_schema {
                SchemaRef::Bool(false) => {
                    let location = key_location(doc, seen_property);
                    let message = s
                        .error_message
                        .clone()
                        .unwrap_or_else(|| format!("Property {} is not allowed.", name));
                    result.problems.push(schema_problem(
                        location,
                        message,
                        Some(ErrorCode::PropertyExpected),
                        None,
                        Vec::new(),
                        schema,
                        original,
                    ));
                }
                other => {
                    if let Some(child) = seen_property.value {
                        validate_child(child, other, result, collector);
                    }
                }
            }
        }
    }

    if let Some(pattern_properties) = &s.pattern_properties {
        for (pattern, prop_schema) in pattern_properties {
            let regex = match compile_user_pattern(pattern) {
                Some(regex) => regex,
                None => continue,
            };
            for name in unprocessed.clone() {
                if !regex.is_match(&name).unwrap_or(false) {
                    continue;
                }
                remove_key(&mut unprocessed, &name);
                let seen_property = match seen.get(&name) {
                    Some(found) => found,
                    None => continue,
                };
                match prop_schema {
                    SchemaRef::Bool(false) => {
                        let location = key_location(doc, seen_property);
                        let message = s
                            .error_message
                            .clone()
                            .unwrap_or_else(|| format!("Property {} is not allowed.", name));
                        result.problems.push(schema_problem(
                            location,
                            message,
                            Some(ErrorCode::PropertyExpected),
                            None,
                            Vec::new(),
                            schema,
                            original,
                        ));
                    }
                    other => {
                        if let Some(child) = seen_property.value {
                            validate_child(child, other, result, collector);
                        }
                    }
                }
            }
        }
    }

    let forbid_unprocessed = match &s.additional_properties {
        Some(SchemaRef::Bool(false)) => true,
        None => options.disable_additional_properties && s.type_includes("object"),
        _ => false,
    };
    if let Some(SchemaRef::Object(additional)) = &s.additional_properties {
        for name in unprocessed.clone() {
            if let Some(seen_property) = seen.get(&name) {
                if let Some(child) = seen_property.value {
                    inherit_url(additional, &s, original);
                    let mut sub = ValidationResult::new();
                    validate(doc, child, additional, schema, &mut sub, collector, options);
                    result.merge_property_match(sub);
                }
            }
        }
    } else if forbid_unprocessed {
        for name in &unprocessed {
            if let Some(seen_property) = seen.get(name) {
                let location = key_location(doc, seen_property);
                let message = s
                    .error_message
                    .clone()
                    .unwrap_or_else(|| format!("Property {} is not allowed.", name));
                result.problems.push(schema_problem(
                    location,
                    message,
                    Some(ErrorCode::PropertyExpected),
                    None,
                    Vec::new(),
                    schema,
                    original,
                ));
            }
        }
    }

    if let Some(max_properties) = s.max_properties {
        if seen.len() as u64 > max_properties {
            result.problems.push(schema_problem(
                node_location(doc, node),
                format!("Object has more properties than limit of {}.", max_properties),
                None,
                None,
                Vec::new(),
                schema,
                original,
            ));
        }
    }
    if let Some(min_properties) = s.min_properties {
        if (seen.len() as u64) < min_properties {
            result.problems.push(schema_problem(
                node_location(doc, node),
                format!(
                    "Object has fewer properties than the required number of {}.",
                    min_properties
                ),
                None,
                None,
                Vec::new(),
                schema,
                original,
            ));
        }
    }

    if let Some(dependencies) = &s.dependencies {
        for (key, dependency) in dependencies {
            if !seen.contains_key(key) {
                continue;
            }
            match dependency {
                Dependency::Required(names) => {
                    for name in names {
                        if !seen.contains_key(name) {
                            result.problems.push(schema_problem(
                                node_location(doc, node),
                                format!(
                                    "Object is missing property {} required by property {}.",
                                    name, key
                                ),
                                None,
                                None,
                                Vec::new(),
                                schema,
                                original,
                            ));
                        } else {
                            result.properties_value_matches += 1;
                        }
                    }
                }
                Dependency::Schema(dep_schema) => {
                    let mut sub = ValidationResult::new();
                    validate(
                        doc,
                        node,
                        &dep_schema.as_schema(),
                        schema,
                        &mut sub,
                        collector,
                        options,
                    );
                    result.merge_property_match(sub);
                }
            }
        }
    }
}

/// Missing-property problems land on the object's own key when the
/// object is a property value, else on its first character.
fn owning_key_location(doc: &YamlDocument, node: NodeId) -> ProblemLocation {
    if let Some(parent) = doc.node(node).parent {
        if let NodeKind::Property { key, .. } = &doc.node(parent).kind {
            return node_location(doc, *key);
        }
    }
    ProblemLocation {
        offset: doc.node(node).offset,
        length: 1,
    }
}

#[allow(clippy::too_many_arguments)]
fn validate_array(
    doc: &YamlDocument,
    node: NodeId,
    items: &[NodeId],
    schema: &SchemaNode,
    original: &SchemaNode,
    result: &mut ValidationResult,
    collector: &mut SchemaCollector,
    options: &ValidationOptions,
) {
    let s = schema.borrow();
    match &s.items {
        Some(SingleOrVec::Single(item_schema)) => {
            let item_schema = item_schema.as_schema();
            for item in items {
                let mut sub = ValidationResult::new();
                validate(doc, *item, &item_schema, schema, &mut sub, collector, options);
                result.merge_property_match(sub);
            }
        }
        Some(SingleOrVec::Multiple(schemas)) => {
            for (index, item_schema) in schemas.iter().enumerate() {
                if let Some(item) = items.get(index) {
                    let mut sub = ValidationResult::new();
                    validate(
                        doc,
                        *item,
                        &item_schema.as_schema(),
                        schema,
                        &mut sub,
                        collector,
                        options,
                    );
                    result.merge_property_match(sub);
                }
            }
            if items.len() > schemas.len() {
                match &s.additional_items {
                    Some(SchemaRef::Object(additional)) => {
                        for item in items.iter().skip(schemas.len()) {
                            let mut sub = ValidationResult::new();
                            validate(doc, *item, additional, schema, &mut sub, collector, options);
                            result.merge_property_match(sub);
                        }
                    }
                    Some(SchemaRef::Bool(false)) => {
                        result.problems.push(schema_problem(
                            node_location(doc, node),
                            format!(
                                "Array has too many items according to schema. Expected {} or fewer.",
                                schemas.len()
                            ),
                            None,
                            None,
                            Vec::new(),
                            schema,
                            original,
                        ));
                    }
                    _ => {}
                }
            }
        }
        None => {}
    }

    if let Some(contains) = &s.contains {
        let contains_schema = contains.as_schema();
        let found = items.iter().any(|item| {
            let mut sub = ValidationResult::new();
            let mut noop = SchemaCollector::noop();
            validate(doc, *item, &contains_schema, schema, &mut sub, &mut noop, options);
            !sub.has_problems()
        });
        if !found {
            result.problems.push(schema_problem(
                node_location(doc, node),
                "Array does not contain required item.".to_string(),
                None,
                None,
                Vec::new(),
                schema,
                original,
            ));
        }
    }

    if let Some(min_items) = s.min_items {
        if (items.len() as u64) < min_items {
            result.problems.push(schema_problem(
                node_location(doc, node),
                format!("Array has too few items. Expected {} or more.", min_items),
                None,
                None,
                Vec::new(),
                schema,
                original,
            ));
        }
    }
    if let Some(max_items) = s.max_items {
        if items.len() as u64 > max_items {
            result.problems.push(schema_problem(
                node_location(doc, node),
                format!("Array has too many items. Expected {} or fewer.", max_items),
                None,
                None,
                Vec::new(),
                schema,
                original,
            ));
        }
    }
    if s.unique_items == Some(true) {
        let values: Vec<Value> = items.iter().map(|item| doc.get_value(*item)).collect();
        let duplicated = values
            .iter()
            .enumerate()
            .any(|(i, a)| values.iter().skip(i + 1).any(|b| equal(a, b)));
        if duplicated {
            result.problems.push(schema_problem(
                node_location(doc, node),
                "Array has duplicate items.".to_string(),
                None,
                None,
                Vec::new(),
                schema,
                original,
            ));
        }
    }
}

fn validate_string(
    doc: &YamlDocument,
    node: NodeId,
    value: &str,
    schema: &SchemaNode,
    original: &SchemaNode,
    result: &mut ValidationResult,
) {
    let s = schema.borrow();
    let char_count = bytecount::num_chars(value.as_bytes()) as u64;
    if let Some(min_length) = s.min_length {
        if char_count < min_length {
            result.problems.push(schema_problem(
                node_location(doc, node),
                format!("String is shorter than the minimum length of {}.", min_length),
                None,
                None,
                Vec::new(),
                schema,
                original,
            ));
        }
    }
    if let Some(max_length) = s.max_length {
        if char_count > max_length {
            result.problems.push(schema_problem(
                node_location(doc, node),
                format!("String is longer than the maximum length of {}.", max_length),
                None,
                None,
                Vec::new(),
                schema,
                original,
            ));
        }
    }
    if let Some(pattern) = &s.pattern {
        if let Some(regex) = compile_user_pattern(pattern) {
            if !regex.is_match(value).unwrap_or(true) {
                result.problems.push(schema_problem(
                    node_location(doc, node),
                    format!("String does not match the pattern of \"{}\".", pattern),
                    None,
                    None,
                    Vec::new(),
                    schema,
                    original,
                ));
            }
        }
    }
    if let Some(format_name) = &s.format {
        if let Some(message) = format::check_format(format_name, value) {
            result.problems.push(schema_problem(
                node_location(doc, node),
                message,
                None,
                None,
                Vec::new(),
                schema,
                original,
            ));
        }
    }
}

fn exclusive_limit(limit: Option<f64>, exclusive: Option<BoolOrNumber>) -> Option<f64> {
    match exclusive {
        Some(BoolOrNumber::Number(n)) => Some(n),
        Some(BoolOrNumber::Bool(true)) => limit,
        _ => None,
    }
}

fn inclusive_limit(limit: Option<f64>, exclusive: Option<BoolOrNumber>) -> Option<f64> {
    match exclusive {
        Some(BoolOrNumber::Bool(true)) => None,
        _ => limit,
    }
}

/// Decimal digits of the factor's fractional part, read off its shortest
/// rendering. Drives the rescaling below.
fn fractional_digits(value: f64) -> i32 {
    let rendered = format!("{}", value);
    match rendered.split_once('.') {
        Some((_, fraction)) => fraction.len() as i32,
        None => 0,
    }
}

/// Float-safe multiple-of test. A plain IEEE remainder misreports
/// decimal factors (`1.02 % 0.01`), so both sides are rescaled by a
/// power of ten derived from the factor's fractional length and the
/// remainder is taken over the resulting integers. Quotients that leave
/// the finite range fall back to exact rationals.
fn is_multiple_of(value: f64, multiple: f64) -> bool {
    if !value.is_finite() || !multiple.is_finite() || multiple == 0.0 {
        return false;
    }
    let quotient = value / multiple;
    if !quotient.is_finite() {
        let ratio = BigFraction::from(value) / BigFraction::from(multiple);
        return matches!(ratio.denom(), Some(denominator) if denominator == &BigUint::from(1_u8));
    }
    if quotient.fract() == 0.0 {
        return true;
    }
    let digits = fractional_digits(multiple);
    if digits == 0 {
        return false;
    }
    let factor = 10_f64.powi(digits);
    let scaled_value = value * factor;
    let scaled_multiple = (multiple * factor).round();
    if scaled_multiple == 0.0 {
        return false;
    }
    let rounded = scaled_value.round();
    let integral =
        (scaled_value - rounded).abs() <= f64::EPSILON * scaled_value.abs().max(1.0);
    integral && rounded % scaled_multiple == 0.0
}

fn validate_number(
    doc: &YamlDocument,
    node: NodeId,
    value: f64,
    schema: &SchemaNode,
    original: &SchemaNode,
    result: &mut ValidationResult,
) {
    let s = schema.borrow();
    if let Some(multiple) = s.multiple_of {
        if !is_multiple_of(value, multiple) {
            result.problems.push(schema_problem(
                node_location(doc, node),
                format!("Value is not divisible by {}.", multiple),
                None,
                None,
                Vec::new(),
                schema,
                original,
            ));
        }
    }
    if let Some(limit) = exclusive_limit(s.minimum, s.exclusive_minimum) {
        if value <= limit {
            result.problems.push(schema_problem(
                node_location(doc, node),
                format!("Value is below the exclusive minimum of {}.", limit),
                None,
                None,
                Vec::new(),
                schema,
                original,
            ));
        }
    }
    if let Some(limit) = exclusive_limit(s.maximum, s.exclusive_maximum) {
        if value >= limit {
            result.problems.push(schema_problem(
                node_location(doc, node),
                format!("Value is above the exclusive maximum of {}.", limit),
                None,
                None,
                Vec::new(),
                schema,
                original,
            ));
        }
    }
    if let Some(limit) = inclusive_limit(s.minimum, s.exclusive_minimum) {
        if value < limit {
            result.problems.push(schema_problem(
                node_location(doc, node),
                format!("Value is below the minimum of {}.", limit),
                None,
                None,
                Vec::new(),
                schema,
                original,
            ));
        }
    }
    if let Some(limit) = inclusive_limit(s.maximum, s.exclusive_maximum) {
        if value > limit {
            result.problems.push(schema_problem(
                node_location(doc, node),
                format!("Value is above the maximum of {}.", limit),
                None,
                None,
                Vec::new(),
                schema,
                original,
            ));
        }
    }
}
