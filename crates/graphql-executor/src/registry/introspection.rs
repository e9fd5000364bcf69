use async_graphql_parser::types::TypeSystemDefinition;
use async_graphql_value::ConstValue;
use indexmap::IndexMap;

use super::{
    builder::convert_type_definition, MetaDirective, MetaField, MetaInputValue, MetaType, RegistryError, TypeRef,
    DEFAULT_DEPRECATION_REASON,
};

pub(crate) const SCHEMA_FIELD: &str = "__schema";
pub(crate) const TYPE_FIELD: &str = "__type";
pub(crate) const SCHEMA_TYPE: &str = "__Schema";

const INTROSPECTION_SDL: &str = r#"
type __Schema {
    description: String
    types: [__Type!]!
    queryType: __Type!
    mutationType: __Type
    subscriptionType: __Type
    directives: [__Directive!]!
}

type __Type {
    kind: __TypeKind!
    name: String
    description: String
    specifiedByURL: String
    fields(includeDeprecated: Boolean = false): [__Field!]
    interfaces: [__Type!]
    possibleTypes: [__Type!]
    enumValues(includeDeprecated: Boolean = false): [__EnumValue!]
    inputFields: [__InputValue!]
    ofType: __Type
}

enum __TypeKind {
    SCALAR
    OBJECT
    INTERFACE
    UNION
    ENUM
    INPUT_OBJECT
    LIST
    NON_NULL
}

type __Field {
    name: String!
    description: String
    args: [__InputValue!]!
    type: __Type!
    isDeprecated: Boolean!
    deprecationReason: String
}

type __InputValue {
    name: String!
    description: String
    type: __Type!
    defaultValue: String
}

type __EnumValue {
    name: String!
    description: String
    isDeprecated: Boolean!
    deprecationReason: String
}

type __Directive {
    name: String!
    description: String
    locations: [__DirectiveLocation!]!
    args: [__InputValue!]!
    isRepeatable: Boolean!
}

enum __DirectiveLocation {
    QUERY
    MUTATION
    SUBSCRIPTION
    FIELD
    FRAGMENT_DEFINITION
    FRAGMENT_SPREAD
    INLINE_FRAGMENT
    VARIABLE_DEFINITION
    SCHEMA
    SCALAR
    OBJECT
    FIELD_DEFINITION
    ARGUMENT_DEFINITION
    INTERFACE
    UNION
    ENUM
    ENUM_VALUE
    INPUT_OBJECT
    INPUT_FIELD_DEFINITION
}
"#;

/// The `__*` types answering introspection queries.
pub(super) fn introspection_types() -> Result<Vec<MetaType>, RegistryError> {
    let document =
        async_graphql_parser::parse_schema(INTROSPECTION_SDL).map_err(|error| RegistryError::Parse(error.to_string()))?;

    document
        .definitions
        .into_iter()
        .filter_map(|definition| match definition {
            TypeSystemDefinition::Type(ty) => Some(convert_type_definition(ty.node)),
            _ => None,
        })
        .collect()
}

pub(super) fn introspection_fields() -> IndexMap<String, MetaField> {
    [
        MetaField::new(SCHEMA_FIELD, TypeRef::named(SCHEMA_TYPE).non_null()),
        MetaField::new(TYPE_FIELD, TypeRef::named("__Type"))
            .with_argument(MetaInputValue::new("name", TypeRef::named("String").non_null())),
    ]
    .into_iter()
    .map(|field| (field.name.clone(), field))
    .collect()
}

pub(super) fn builtin_directives() -> [MetaDirective; 3] {
    let condition = |name: &str, description: &str| {
        let mut directive = MetaDirective::new(name, ["FIELD", "FRAGMENT_SPREAD", "INLINE_FRAGMENT"])
            .with_argument(MetaInputValue::new("if", TypeRef::named("Boolean").non_null()));
        directive.description = Some(description.to_string());
        directive
    };

    let mut deprecated = MetaDirective::new(
        "deprecated",
        ["FIELD_DEFINITION", "ARGUMENT_DEFINITION", "INPUT_FIELD_DEFINITION", "ENUM_VALUE"],
    )
    .with_argument(
        MetaInputValue::new("reason", TypeRef::named("String"))
            .with_default(ConstValue::String(DEFAULT_DEPRECATION_REASON.to_string())),
    );
    deprecated.description = Some("Marks an element of a GraphQL schema as no longer supported.".to_string());

    [
        condition("skip", "Directs the executor to skip this field or fragment when the `if` argument is true."),
        condition(
            "include",
            "Directs the executor to include this field or fragment only when the `if` argument is true.",
        ),
        deprecated,
    ]
}
