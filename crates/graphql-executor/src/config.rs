//! Engine configuration, usually read from TOML.

use std::num::NonZeroUsize;

use indexmap::IndexMap;

use crate::{registry::Registry, SchemaError};

#[derive(Clone, Debug, Default, PartialEq, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Runtime behaviour of execution passes
    pub execution: ExecutionConfig,
    /// Per object type binding and scheduling overrides, keyed by type name
    pub models: IndexMap<String, ModelConfig>,
}

#[derive(Clone, Debug, PartialEq, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExecutionConfig {
    /// Upper bound of concurrently running sibling fields or list items. Unbounded if not set.
    pub max_concurrency: Option<NonZeroUsize>,
    /// Report panics of bindings as field errors instead of unwinding.
    pub recover_panics: bool,
    /// Makes `__schema`, `__type` and the federation `_service` field fail.
    pub disable_introspection: bool,
    /// Requests whose operation is more complex are rejected. Unlimited if not set.
    pub complexity_limit: Option<usize>,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        ExecutionConfig {
            max_concurrency: None,
            recover_panics: true,
            disable_introspection: false,
            complexity_limit: None,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ModelConfig {
    /// Resolve the fields of this type one after the other.
    pub disable_concurrency: bool,
    pub fields: IndexMap<String, FieldConfig>,
}

#[derive(Clone, Debug, Default, PartialEq, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FieldConfig {
    /// Only a registered resolver may satisfy this field.
    pub resolver: bool,
    /// Name of the implementation member to bind to instead of the field name.
    pub field_name: Option<String>,
}

impl Config {
    pub fn from_toml(input: &str) -> Result<Config, SchemaError> {
        toml::from_str(input).map_err(|error| SchemaError::Config(error.to_string()))
    }

    pub(crate) fn model(&self, type_name: &str) -> Option<&ModelConfig> {
        self.models.get(type_name)
    }

    pub(crate) fn field(&self, type_name: &str, field: &str) -> Option<&FieldConfig> {
        self.model(type_name).and_then(|model| model.fields.get(field))
    }

    pub(crate) fn is_concurrency_disabled(&self, type_name: &str) -> bool {
        self.model(type_name).is_some_and(|model| model.disable_concurrency)
    }

    /// Models must name object types and their fields.
    pub(crate) fn validate(&self, registry: &Registry) -> Result<(), SchemaError> {
        for (type_name, model) in &self.models {
            let Some(object) = registry.object(type_name) else {
                return Err(SchemaError::Config(format!(
                    "models.{type_name}: no object type named `{type_name}`"
                )));
            };
            if let Some(field) = model.fields.keys().find(|field| !object.fields.contains_key(*field)) {
                return Err(SchemaError::Config(format!(
                    "models.{type_name}.fields.{field}: `{type_name}` has no field `{field}`"
                )));
            }
        }
        Ok(())
    }
}
