//! Static matching of schema fields to implementation members.

mod descriptor;
mod resolve;

use std::{collections::HashMap, fmt};

use indexmap::IndexMap;

pub use self::{
    descriptor::{AttributeDescriptor, ImplementationDescriptor, MethodDescriptor},
    resolve::BindingResolver,
};

/// Identity of an explicitly registered resolver.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResolverKey {
    pub type_name: String,
    pub field_name: String,
}

impl ResolverKey {
    pub fn new(type_name: impl Into<String>, field_name: impl Into<String>) -> Self {
        ResolverKey {
            type_name: type_name.into(),
            field_name: field_name.into(),
        }
    }
}

impl fmt::Display for ResolverKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.type_name, self.field_name)
    }
}

/// How one schema field is satisfied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Binding {
    /// Reads a stored attribute of the parent value.
    Attribute { name: String },
    /// Calls a method of the parent value. `arguments` maps field argument names to parameter names.
    Method {
        name: String,
        arguments: IndexMap<String, String>,
        takes_context: bool,
    },
    /// Invokes a registered resolver with every field argument.
    Resolver { key: ResolverKey },
    /// Subscription root field backed by a registered event source.
    Subscription { key: ResolverKey },
    /// Federation `_entities`.
    Entities,
    /// Federation `_service`.
    Service,
    /// `__schema` on the query root.
    IntrospectSchema,
    /// `__type(name:)` on the query root.
    IntrospectType,
}

impl Binding {
    pub fn kind(&self) -> &'static str {
        match self {
            Binding::Attribute { .. } => "attribute",
            Binding::Method { .. } => "method",
            Binding::Resolver { .. } => "resolver",
            Binding::Subscription { .. } => "subscription resolver",
            Binding::Entities | Binding::Service => "federation",
            Binding::IntrospectSchema | Binding::IntrospectType => "introspection",
        }
    }
}

impl fmt::Display for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Binding::Attribute { name } => write!(f, "attribute {name}"),
            Binding::Method { name, .. } => write!(f, "method {name}"),
            Binding::Resolver { key } => write!(f, "resolver {key}"),
            Binding::Subscription { key } => write!(f, "subscription resolver {key}"),
            Binding::Entities => f.write_str("federation entities"),
            Binding::Service => f.write_str("federation service"),
            Binding::IntrospectSchema => f.write_str("schema introspection"),
            Binding::IntrospectType => f.write_str("type introspection"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BindingError {
    #[error("no attribute, method or resolver matches `{type_name}.{field}`")]
    Absent { type_name: String, field: String },
    #[error("ambiguous binding for `{type_name}.{field}`: {}", candidates.join(", "))]
    Ambiguous {
        type_name: String,
        field: String,
        candidates: Vec<String>,
    },
    #[error("an implementation is declared for `{0}` which is not an object type of the schema")]
    UnknownType(String),
    #[error("a resolver is registered for `{type_name}.{field}` which is not a field of the schema")]
    UnknownField { type_name: String, field: String },
}

/// Every binding of a schema, keyed by object type and field name.
#[derive(Debug, Clone, Default)]
pub struct BindingTable {
    bindings: HashMap<String, IndexMap<String, Binding>>,
}

impl BindingTable {
    pub fn get(&self, type_name: &str, field: &str) -> Option<&Binding> {
        self.bindings.get(type_name).and_then(|fields| fields.get(field))
    }

    pub fn fields(&self, type_name: &str) -> impl Iterator<Item = (&str, &Binding)> {
        self.bindings
            .get(type_name)
            .into_iter()
            .flat_map(|fields| fields.iter().map(|(name, binding)| (name.as_str(), binding)))
    }

    pub fn len(&self) -> usize {
        self.bindings.values().map(IndexMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn insert(&mut self, type_name: &str, field: &str, binding: Binding) {
        self.bindings
            .entry(type_name.to_string())
            .or_default()
            .insert(field.to_string(), binding);
    }
}

/// Case-folded with `_` and `-` removed, so `full_name`, `FullName` and `fullName` are equal.
pub(crate) fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| !matches!(c, '_' | '-'))
        .flat_map(char::to_lowercase)
        .collect()
}
