//! Service configuration, as delivered by the host's `configure` call.
use crate::registry::SchemaConfiguration;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlowStylePolicy {
    Allow,
    Forbid,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum YamlVersion {
    V1_1,
    V1_2,
}

#[derive(Clone, Debug)]
pub struct LanguageSettings {
    pub validate: bool,
    pub hover: bool,
    pub completion: bool,
    /// Formatting itself is delegated to an external pretty-printer;
    /// the flag is carried so hosts can toggle it in one place.
    pub format: bool,
    pub is_kubernetes: bool,
    pub schemas: Vec<SchemaConfiguration>,
    pub custom_tags: Vec<String>,
    pub indentation: String,
    pub disable_additional_properties: bool,
    pub disable_default_properties: bool,
    pub parent_skeleton_selected_first: bool,
    pub yaml_version: YamlVersion,
    pub flow_mapping: FlowStylePolicy,
    pub flow_sequence: FlowStylePolicy,
    pub key_ordering: bool,
}

impl Default for LanguageSettings {
    fn default() -> LanguageSettings {
        LanguageSettings {
            validate: true,
            hover: true,
            completion: true,
            format: true,
            is_kubernetes: false,
            schemas: Vec::new(),
            custom_tags: Vec::new(),
            indentation: "  ".to_string(),
            disable_additional_properties: false,
            disable_default_properties: false,
            parent_skeleton_selected_first: false,
            yaml_version: YamlVersion::V1_2,
            flow_mapping: FlowStylePolicy::Allow,
            flow_sequence: FlowStylePolicy::Allow,
            key_ordering: false,
        }
    }
}
