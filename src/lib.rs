//! # yaml-language-service
//!
//! The core of a YAML language service: given YAML text and one or more
//! JSON Schemas (draft-07), it produces validation diagnostics,
//! schema-driven completions, hovers, document symbols and code lenses.
//!
//! The crate bridges YAML's data model (multi-document streams,
//! anchors/aliases, merge keys, custom tags, implicit typing) with JSON
//! Schema validation: a converter builds a JSON-compatible AST with
//! byte-accurate source ranges, a registry maps file URIs to candidate
//! schemas, a resolver expands `$ref`s, and a best-match validator
//! walks AST and schema together.
//!
//! ## Example
//!
//! ```rust
//! use yaml_language_service::{LanguageService, LanguageSettings, SchemaConfiguration};
//! use serde_json::json;
//!
//! let mut service = LanguageService::new(None);
//! let mut settings = LanguageSettings::default();
//! settings.schemas.push(SchemaConfiguration {
//!     uri: "https://example.test/person.json".to_string(),
//!     file_match: vec!["*.yaml".to_string()],
//!     schema: Some(json!({
//!         "type": "object",
//!         "properties": {"age": {"type": "number"}},
//!     })),
//!     ..SchemaConfiguration::default()
//! });
//! service.configure(settings);
//!
//! let diagnostics = service.do_validation("file:///person.yaml", "age: oops\n", false);
//! assert_eq!(diagnostics.len(), 1);
//! assert!(diagnostics[0].message.contains("Incorrect type"));
//! ```
#![warn(
    clippy::doc_markdown,
    clippy::redundant_closure,
    clippy::explicit_iter_loop,
    clippy::match_same_arms,
    clippy::needless_borrow,
    clippy::print_stdout,
    missing_debug_implementations,
    trivial_casts,
    trivial_numeric_casts,
    unused_extern_crates,
    unused_import_braces,
    unused_qualifications
)]
pub mod additional;
pub mod ast;
pub mod diagnostics;
mod error;
pub mod features;
pub mod glob;
pub mod parser;
mod problems;
pub mod registry;
pub mod resolver;
pub mod schema;
mod service;
pub mod settings;
pub mod validation;

pub use error::SchemaError;
pub use problems::{ErrorCode, Problem, ProblemLocation, ProblemType};
pub use registry::{
    CustomSchemaProvider, SchemaConfiguration, SchemaContentRetriever, SchemaContributions,
    SchemaPriority, SchemaRegistry, CRD_CATALOG_URL, KUBERNETES_SCHEMA_URL,
};
pub use resolver::{ResolvedSchema, UnresolvedSchema};
pub use service::{LanguageService, SchemaStoreEntry};
pub use settings::{FlowStylePolicy, LanguageSettings, YamlVersion};
pub use validation::{MatchingSchema, SchemaCollector, ValidationOptions, ValidationResult};
