//! In-memory JSON Schema (draft-07) model.
//!
//! Keywords are typed fields; anything else lands in a flattened side
//! map so round-tripping keeps it. Sub-schemas are shared
//! `Rc<RefCell<_>>` nodes: `$ref` expansion splices sections into place
//! by aliasing, which is what lets cyclic schemas stay finite.
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::cell::RefCell;
use std::rc::Rc;

pub type SchemaNode = Rc<RefCell<JsonSchema>>;

/// A sub-schema position: draft-07 allows `true`/`false` anywhere a
/// schema may appear.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SchemaRef {
    Bool(bool),
    Object(SchemaNode),
}

impl SchemaRef {
    pub fn new(schema: JsonSchema) -> SchemaRef {
        SchemaRef::Object(Rc::new(RefCell::new(schema)))
    }

    pub fn from_value(value: Value) -> Result<SchemaRef, serde_json::Error> {
        serde_json::from_value(value)
    }

    /// View as a schema object; `true` is the empty schema, `false` is
    /// `{"not": {}}`.
    pub fn as_schema(&self) -> SchemaNode {
        match self {
            SchemaRef::Object(node) => Rc::clone(node),
            SchemaRef::Bool(true) => Rc::new(RefCell::new(JsonSchema::default())),
            SchemaRef::Bool(false) => {
                let mut schema = JsonSchema::default();
                schema.not = Some(SchemaRef::new(JsonSchema::default()));
                Rc::new(RefCell::new(schema))
            }
        }
    }

    pub fn node(&self) -> Option<&SchemaNode> {
        match self {
            SchemaRef::Object(node) => Some(node),
            SchemaRef::Bool(_) => None,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StringOrStrings {
    One(String),
    Many(Vec<String>),
}

impl StringOrStrings {
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        let slice: &[String] = match self {
            StringOrStrings::One(s) => std::slice::from_ref(s),
            StringOrStrings::Many(v) => v,
        };
        slice.iter().map(String::as_str)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SingleOrVec {
    Single(SchemaRef),
    Multiple(Vec<SchemaRef>),
}

/// Draft-04 allowed boolean `exclusiveMinimum`/`exclusiveMaximum`;
/// draft-06 turned them numeric. Both appear in the wild.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BoolOrNumber {
    Bool(bool),
    Number(f64),
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Dependency {
    Required(Vec<String>),
    Schema(SchemaRef),
}

fn deserialize_some<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    // Keeps an explicit `null` distinguishable from an absent key,
    // which matters for `const: null` and `default: null`.
    Value::deserialize(deserializer).map(Some)
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JsonSchema {
    #[serde(rename = "$id", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "$ref", skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(rename = "$schema", skip_serializing_if = "Option::is_none")]
    pub meta_schema: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub markdown_description: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub schema_type: Option<StringOrStrings>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<IndexMap<String, SchemaRef>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern_properties: Option<IndexMap<String, SchemaRef>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_properties: Option<SchemaRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<SingleOrVec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_items: Option<SchemaRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exclusive_minimum: Option<BoolOrNumber>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exclusive_maximum: Option<BoolOrNumber>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub multiple_of: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enumeration: Option<Vec<Value>>,
    #[serde(
        rename = "const",
        deserialize_with = "deserialize_some",
        skip_serializing_if = "Option::is_none"
    )]
    pub constant: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub any_of: Option<Vec<SchemaRef>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub one_of: Option<Vec<SchemaRef>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub all_of: Option<Vec<SchemaRef>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub not: Option<SchemaRef>,
    #[serde(rename = "if", skip_serializing_if = "Option::is_none")]
    pub if_schema: Option<SchemaRef>,
    #[serde(rename = "then", skip_serializing_if = "Option::is_none")]
    pub then_schema: Option<SchemaRef>,
    #[serde(rename = "else", skip_serializing_if = "Option::is_none")]
    pub else_schema: Option<SchemaRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dependencies: Option<IndexMap<String, Dependency>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub property_names: Option<SchemaRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contains: Option<SchemaRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unique_items: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_items: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_items: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_properties: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_properties: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub definitions: Option<IndexMap<String, SchemaRef>>,
    #[serde(
        deserialize_with = "deserialize_some",
        skip_serializing_if = "Option::is_none"
    )]
    pub default: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub examples: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deprecation_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub do_not_suggest: Option<bool>,
    /// URL of the schema document this node came from. Assigned during
    /// resolution, used for diagnostic source attribution.
    #[serde(skip)]
    pub url: Option<String>,
    /// The original `$ref` target, retained through expansion so titles
    /// and labels survive resolution.
    #[serde(rename = "_ref", skip_serializing_if = "Option::is_none")]
    pub source_ref: Option<String>,
    /// Keywords this model does not interpret; preserved for
    /// round-tripping and fragment navigation.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl JsonSchema {
    pub fn into_node(self) -> SchemaNode {
        Rc::new(RefCell::new(self))
    }

    /// Whether the declared `type` includes `name`.
    pub fn type_includes(&self, name: &str) -> bool {
        match &self.schema_type {
            Some(types) => types.iter().any(|t| t == name),
            None => false,
        }
    }

    /// Human-facing label: the title if present, otherwise the tail of
    /// the retained `$ref` or source URL.
    pub fn label(&self) -> Option<String> {
        if let Some(title) = &self.title {
            return Some(title.clone());
        }
        let from = self.source_ref.as_deref().or(self.url.as_deref())?;
        let tail = from
            .rsplit(|c| c == '/' || c == '#')
            .find(|s| !s.is_empty())?;
        Some(tail.to_string())
    }

    /// Copy every top-level keyword of `section` that `self` does not
    /// already carry. This is the shallow merge `$ref` expansion uses:
    /// sub-schema values are aliased, not cloned.
    pub fn merge_missing_from(&mut self, section: &JsonSchema) {
        macro_rules! take {
            ($field:ident) => {
                if self.$field.is_none() {
                    self.$field = section.$field.clone();
                }
            };
        }
        take!(id);
        take!(reference);
        take!(meta_schema);
        take!(title);
        take!(description);
        take!(markdown_description);
        take!(schema_type);
        take!(properties);
        take!(pattern_properties);
        take!(additional_properties);
        take!(items);
        take!(additional_items);
        take!(minimum);
        take!(maximum);
        take!(exclusive_minimum);
        take!(exclusive_maximum);
        take!(multiple_of);
        take!(min_length);
        take!(max_length);
        take!(pattern);
        take!(format);
        take!(enumeration);
        take!(constant);
        take!(any_of);
        take!(one_of);
        take!(all_of);
        take!(not);
        take!(if_schema);
        take!(then_schema);
        take!(else_schema);
        take!(dependencies);
        take!(property_names);
        take!(contains);
        take!(required);
        take!(unique_items);
        take!(min_items);
        take!(max_items);
        take!(min_properties);
        take!(max_properties);
        take!(definitions);
        take!(default);
        take!(examples);
        take!(deprecation_message);
        take!(error_message);
        take!(do_not_suggest);
        for (key, value) in &section.extra {
            if !self.extra.contains_key(key) {
                self.extra.insert(key.clone(), value.clone());
            }
        }
    }
}

enum Cursor {
    Schema(SchemaRef),
    SchemaMap(IndexMap<String, SchemaRef>),
    SchemaList(Vec<SchemaRef>),
    Raw(Value),
}

/// Walk a fragment path (`/definitions/Foo`, leading slash optional)
/// inside a schema. Unknown keywords are followed through the side map.
pub fn find_section(root: &SchemaRef, path: &str) -> Option<SchemaRef> {
    let path = path.strip_prefix('/').unwrap_or(path);
    if path.is_empty() {
        return Some(root.clone());
    }
    let mut cursor = Cursor::Schema(root.clone());
    for segment in path.split('/') {
        cursor = match cursor {
            Cursor::Schema(schema) => {
                let node = schema.node()?;
                schema_step(&node.borrow(), segment)?
            }
            Cursor::SchemaMap(map) => Cursor::Schema(map.get(segment)?.clone()),
            Cursor::SchemaList(list) => {
                let index: usize = segment.parse().ok()?;
                Cursor::Schema(list.get(index)?.clone())
            }
            Cursor::Raw(value) => {
                let next = match &value {
                    Value::Object(map) => map.get(segment)?.clone(),
                    Value::Array(items) => {
                        let index: usize = segment.parse().ok()?;
                        items.get(index)?.clone()
                    }
                    _ => return None,
                };
                Cursor::Raw(next)
            }
        };
    }
    match cursor {
        Cursor::Schema(schema) => Some(schema),
        Cursor::Raw(value) => SchemaRef::from_value(value).ok(),
        _ => None,
    }
}

fn schema_step(schema: &JsonSchema, segment: &str) -> Option<Cursor> {
    let cursor = match segment {
        "definitions" => Cursor::SchemaMap(schema.definitions.clone()?),
        "properties" => Cursor::SchemaMap(schema.properties.clone()?),
        "patternProperties" => Cursor::SchemaMap(schema.pattern_properties.clone()?),
        "dependencies" => {
            let map = schema.dependencies.clone()?;
            let mut out = IndexMap::new();
            for (key, dep) in map {
                match dep {
                    Dependency::Schema(s) => {
                        out.insert(key, s);
                    }
                    Dependency::Required(_) => {}
                }
            }
            Cursor::SchemaMap(out)
        }
        "items" => match schema.items.clone()? {
            SingleOrVec::Single(s) => Cursor::Schema(s),
            SingleOrVec::Multiple(v) => Cursor::SchemaList(v),
        },
        "additionalProperties" => Cursor::Schema(schema.additional_properties.clone()?),
        "additionalItems" => Cursor::Schema(schema.additional_items.clone()?),
        "not" => Cursor::Schema(schema.not.clone()?),
        "contains" => Cursor::Schema(schema.contains.clone()?),
        "propertyNames" => Cursor::Schema(schema.property_names.clone()?),
        "if" => Cursor::Schema(schema.if_schema.clone()?),
        "then" => Cursor::Schema(schema.then_schema.clone()?),
        "else" => Cursor::Schema(schema.else_schema.clone()?),
        "anyOf" => Cursor::SchemaList(schema.any_of.clone()?),
        "oneOf" => Cursor::SchemaList(schema.one_of.clone()?),
        "allOf" => Cursor::SchemaList(schema.all_of.clone()?),
        other => Cursor::Raw(schema.extra.get(other)?.clone()),
    };
    Some(cursor)
}
