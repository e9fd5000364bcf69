//! The resolved schema type graph.
//!
//! A [`Registry`] is built once, either from SDL with [`Registry::from_sdl`] or through a
//! [`RegistryBuilder`], and is shared read-only by every request afterwards.

mod builder;
mod federation;
mod introspection;
mod type_ref;

use std::fmt;

use async_graphql_parser::types::OperationType;
use async_graphql_value::{ConstValue, Name};
use indexmap::{IndexMap, IndexSet};

pub use self::{
    builder::RegistryBuilder,
    federation::{FederationEntity, FederationKey, FieldSet, KeySelection},
    type_ref::TypeRef,
};

pub(crate) use self::{
    federation::{ANY_SCALAR, ENTITIES_FIELD, ENTITY_UNION, SERVICE_FIELD, SERVICE_TYPE},
    introspection::{SCHEMA_FIELD, SCHEMA_TYPE, TYPE_FIELD},
};

pub const BUILTIN_SCALARS: [&str; 5] = ["Int", "Float", "String", "Boolean", "ID"];

/// Directives every schema understands without declaring them.
pub const BUILTIN_DIRECTIVES: [&str; 3] = ["skip", "include", "deprecated"];

pub(crate) const DEFAULT_DEPRECATION_REASON: &str = "No longer supported";

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("could not parse the schema: {0}")]
    Parse(String),
    #[error("type `{0}` is defined more than once")]
    DuplicateType(String),
    #[error("`{referenced_by}` references unknown type `{type_name}`")]
    UnknownType { type_name: String, referenced_by: String },
    #[error("`{referenced_by}` references `{type_name}` which is not {expected}")]
    WrongKind {
        type_name: String,
        referenced_by: String,
        expected: &'static str,
    },
    #[error("root type `{0}` is not defined")]
    MissingRootType(String),
    #[error("invalid @key on `{type_name}`: {message}")]
    InvalidKey { type_name: String, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Object,
    Interface,
    Union,
    Enum,
    Scalar,
    InputObject,
}

impl fmt::Display for TypeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TypeKind::Object => "object",
            TypeKind::Interface => "interface",
            TypeKind::Union => "union",
            TypeKind::Enum => "enum",
            TypeKind::Scalar => "scalar",
            TypeKind::InputObject => "input object",
        })
    }
}

#[derive(Debug, Clone)]
pub enum MetaType {
    Object(ObjectType),
    Interface(InterfaceType),
    Union(UnionType),
    Enum(EnumType),
    Scalar(ScalarType),
    InputObject(InputObjectType),
}

impl MetaType {
    pub fn name(&self) -> &str {
        match self {
            MetaType::Object(ty) => &ty.name,
            MetaType::Interface(ty) => &ty.name,
            MetaType::Union(ty) => &ty.name,
            MetaType::Enum(ty) => &ty.name,
            MetaType::Scalar(ty) => &ty.name,
            MetaType::InputObject(ty) => &ty.name,
        }
    }

    pub fn kind(&self) -> TypeKind {
        match self {
            MetaType::Object(_) => TypeKind::Object,
            MetaType::Interface(_) => TypeKind::Interface,
            MetaType::Union(_) => TypeKind::Union,
            MetaType::Enum(_) => TypeKind::Enum,
            MetaType::Scalar(_) => TypeKind::Scalar,
            MetaType::InputObject(_) => TypeKind::InputObject,
        }
    }

    /// Fields of objects and interfaces.
    pub fn fields(&self) -> Option<&IndexMap<String, MetaField>> {
        match self {
            MetaType::Object(ty) => Some(&ty.fields),
            MetaType::Interface(ty) => Some(&ty.fields),
            _ => None,
        }
    }

    pub fn field(&self, name: &str) -> Option<&MetaField> {
        self.fields().and_then(|fields| fields.get(name))
    }

    pub fn is_composite(&self) -> bool {
        matches!(self, MetaType::Object(_) | MetaType::Interface(_) | MetaType::Union(_))
    }

    pub fn is_abstract(&self) -> bool {
        matches!(self, MetaType::Interface(_) | MetaType::Union(_))
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, MetaType::Enum(_) | MetaType::Scalar(_))
    }

    pub fn is_input(&self) -> bool {
        matches!(self, MetaType::Enum(_) | MetaType::Scalar(_) | MetaType::InputObject(_))
    }
}

#[derive(Debug, Clone, Default)]
pub struct ObjectType {
    pub name: String,
    pub description: Option<String>,
    pub fields: IndexMap<String, MetaField>,
    pub implements: IndexSet<String>,
    pub entity: Option<FederationEntity>,
}

#[derive(Debug, Clone, Default)]
pub struct InterfaceType {
    pub name: String,
    pub description: Option<String>,
    pub fields: IndexMap<String, MetaField>,
    pub implements: IndexSet<String>,
    /// Concrete object types implementing this interface, filled in by the builder.
    pub possible_types: IndexSet<String>,
}

#[derive(Debug, Clone, Default)]
pub struct UnionType {
    pub name: String,
    pub description: Option<String>,
    pub possible_types: IndexSet<String>,
}

#[derive(Debug, Clone, Default)]
pub struct EnumType {
    pub name: String,
    pub description: Option<String>,
    pub values: IndexMap<String, MetaEnumValue>,
}

#[derive(Debug, Clone, Default)]
pub struct MetaEnumValue {
    pub name: String,
    pub description: Option<String>,
    pub deprecation: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ScalarType {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct InputObjectType {
    pub name: String,
    pub description: Option<String>,
    pub fields: IndexMap<String, MetaInputValue>,
}

#[derive(Debug, Clone)]
pub struct MetaField {
    pub name: String,
    pub description: Option<String>,
    pub ty: TypeRef,
    pub args: IndexMap<String, MetaInputValue>,
    /// Reason given by `@deprecated`.
    pub deprecation: Option<String>,
    /// Directives applied to the definition, `@deprecated` excluded.
    pub directives: Vec<AppliedDirective>,
}

impl MetaField {
    pub fn new(name: impl Into<String>, ty: TypeRef) -> Self {
        MetaField {
            name: name.into(),
            description: None,
            ty,
            args: IndexMap::new(),
            deprecation: None,
            directives: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_argument(mut self, arg: MetaInputValue) -> Self {
        self.args.insert(arg.name.clone(), arg);
        self
    }

    #[must_use]
    pub fn with_directive(mut self, directive: AppliedDirective) -> Self {
        self.directives.push(directive);
        self
    }
}

/// A directive applied in the schema document, with its argument values.
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedDirective {
    pub name: String,
    pub arguments: IndexMap<Name, ConstValue>,
}

impl AppliedDirective {
    pub fn new(name: impl Into<String>) -> Self {
        AppliedDirective {
            name: name.into(),
            arguments: IndexMap::new(),
        }
    }

    #[must_use]
    pub fn with_argument(mut self, name: &str, value: ConstValue) -> Self {
        self.arguments.insert(Name::new(name), value);
        self
    }
}

/// A `directive @name(...) on ...` definition.
#[derive(Debug, Clone)]
pub struct MetaDirective {
    pub name: String,
    pub description: Option<String>,
    /// Location names as they appear in the schema document, `FIELD_DEFINITION` for instance.
    pub locations: Vec<String>,
    pub args: IndexMap<String, MetaInputValue>,
    pub is_repeatable: bool,
}

impl MetaDirective {
    pub fn new(name: impl Into<String>, locations: impl IntoIterator<Item = &'static str>) -> Self {
        MetaDirective {
            name: name.into(),
            description: None,
            locations: locations.into_iter().map(str::to_string).collect(),
            args: IndexMap::new(),
            is_repeatable: false,
        }
    }

    #[must_use]
    pub fn with_argument(mut self, arg: MetaInputValue) -> Self {
        self.args.insert(arg.name.clone(), arg);
        self
    }
}

#[derive(Debug, Clone)]
pub struct MetaInputValue {
    pub name: String,
    pub description: Option<String>,
    pub ty: TypeRef,
    pub default_value: Option<ConstValue>,
}

impl MetaInputValue {
    pub fn new(name: impl Into<String>, ty: TypeRef) -> Self {
        MetaInputValue {
            name: name.into(),
            description: None,
            ty,
            default_value: None,
        }
    }

    #[must_use]
    pub fn with_default(mut self, value: ConstValue) -> Self {
        self.default_value = Some(value);
        self
    }
}

#[derive(Debug, Clone)]
pub struct Registry {
    pub(crate) types: IndexMap<String, MetaType>,
    pub(crate) directives: IndexMap<String, MetaDirective>,
    /// `__schema` and `__type`, selectable on the query root without being part of its fields.
    pub(crate) introspection_fields: IndexMap<String, MetaField>,
    pub(crate) query_type: String,
    pub(crate) mutation_type: Option<String>,
    pub(crate) subscription_type: Option<String>,
    pub(crate) sdl: String,
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    pub fn lookup(&self, name: &str) -> Option<&MetaType> {
        self.types.get(name)
    }

    pub fn types(&self) -> impl Iterator<Item = &MetaType> {
        self.types.values()
    }

    pub fn directives(&self) -> impl Iterator<Item = &MetaDirective> {
        self.directives.values()
    }

    pub fn directive(&self, name: &str) -> Option<&MetaDirective> {
        self.directives.get(name)
    }

    /// A directive declared by the schema document itself, as opposed to a built-in one.
    pub fn is_schema_directive(&self, name: &str) -> bool {
        self.directives.contains_key(name) && !BUILTIN_DIRECTIVES.contains(&name)
    }

    /// Field `name` of object `type_name`, including the introspection fields of the query root.
    pub fn field(&self, type_name: &str, name: &str) -> Option<&MetaField> {
        let field = self.object(type_name).and_then(|object| object.fields.get(name));
        match field {
            None if type_name == self.query_type => self.introspection_fields.get(name),
            field => field,
        }
    }

    pub fn query_type(&self) -> &str {
        &self.query_type
    }

    pub fn mutation_type(&self) -> Option<&str> {
        self.mutation_type.as_deref()
    }

    pub fn subscription_type(&self) -> Option<&str> {
        self.subscription_type.as_deref()
    }

    pub fn root_type(&self, operation: OperationType) -> Option<&str> {
        match operation {
            OperationType::Query => Some(self.query_type()),
            OperationType::Mutation => self.mutation_type(),
            OperationType::Subscription => self.subscription_type(),
        }
    }

    pub fn is_root_type(&self, name: &str) -> bool {
        self.query_type == name || self.mutation_type() == Some(name) || self.subscription_type() == Some(name)
    }

    /// Concrete object types a value of type `name` may have at runtime.
    pub fn possible_types<'a>(&'a self, name: &str) -> Box<dyn Iterator<Item = &'a str> + 'a> {
        match self.lookup(name) {
            Some(MetaType::Object(ty)) => Box::new(std::iter::once(ty.name.as_str())),
            Some(MetaType::Interface(ty)) => Box::new(ty.possible_types.iter().map(String::as_str)),
            Some(MetaType::Union(ty)) => Box::new(ty.possible_types.iter().map(String::as_str)),
            _ => Box::new(std::iter::empty()),
        }
    }

    pub fn is_possible_type(&self, abstract_type: &str, concrete_type: &str) -> bool {
        self.possible_types(abstract_type).any(|name| name == concrete_type)
    }

    /// Whether a fragment with type condition `condition` applies to objects of `concrete_type`.
    pub fn type_condition_matches(&self, condition: &str, concrete_type: &str) -> bool {
        condition == concrete_type || self.is_possible_type(condition, concrete_type)
    }

    pub fn object(&self, name: &str) -> Option<&ObjectType> {
        match self.lookup(name) {
            Some(MetaType::Object(ty)) => Some(ty),
            _ => None,
        }
    }

    pub fn entity(&self, type_name: &str) -> Option<&FederationEntity> {
        self.object(type_name).and_then(|ty| ty.entity.as_ref())
    }

    pub fn has_federation(&self) -> bool {
        self.types.contains_key(ENTITY_UNION) || self.types.contains_key(SERVICE_TYPE)
    }

    /// The SDL this registry was built from, without the generated federation types.
    pub fn sdl(&self) -> &str {
        &self.sdl
    }

    /// Object types the user is expected to provide an implementation for.
    pub(crate) fn user_object_types(&self) -> impl Iterator<Item = &ObjectType> {
        self.types.values().filter_map(|ty| match ty {
            MetaType::Object(object) if object.name != SERVICE_TYPE && !object.name.starts_with("__") => Some(object),
            _ => None,
        })
    }
}
