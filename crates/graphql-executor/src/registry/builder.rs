use async_graphql_parser::{
    types::{
        ConstDirective, DirectiveDefinition, DirectiveLocation, EnumValueDefinition, FieldDefinition,
        InputValueDefinition, SchemaDefinition, TypeDefinition, TypeKind as AstTypeKind, TypeSystemDefinition,
    },
    Positioned,
};
use async_graphql_value::{ConstValue, Name};
use indexmap::{IndexMap, IndexSet};

use super::{
    federation::{ANY_SCALAR, ENTITIES_FIELD, ENTITY_UNION, SERVICE_FIELD, SERVICE_TYPE},
    introspection::{builtin_directives, introspection_fields, introspection_types},
    AppliedDirective, EnumType, FederationEntity, FederationKey, FieldSet, InputObjectType, InterfaceType,
    MetaDirective, MetaEnumValue, MetaField, MetaInputValue, MetaType, ObjectType, Registry, RegistryError,
    ScalarType, TypeRef, UnionType, BUILTIN_SCALARS, DEFAULT_DEPRECATION_REASON,
};

const KEY_DIRECTIVE: &str = "key";
const DEPRECATED_DIRECTIVE: &str = "deprecated";

/// Assembles a [`Registry`], either type by type or from a schema document.
#[derive(Default)]
pub struct RegistryBuilder {
    types: IndexMap<String, MetaType>,
    directives: IndexMap<String, MetaDirective>,
    query_type: Option<String>,
    mutation_type: Option<String>,
    subscription_type: Option<String>,
    sdl: String,
}

impl Registry {
    /// Builds a registry from SDL.
    ///
    /// Extensions of a type that was never defined create it, which is what federation subgraphs
    /// extending types owned by another subgraph expect.
    pub fn from_sdl(sdl: &str) -> Result<Registry, RegistryError> {
        let document = async_graphql_parser::parse_schema(sdl).map_err(|error| RegistryError::Parse(error.to_string()))?;

        let mut builder = RegistryBuilder::default().sdl(sdl);
        let mut extensions = Vec::new();

        for definition in document.definitions {
            match definition {
                TypeSystemDefinition::Schema(schema) => builder.apply_schema_definition(schema.node),
                TypeSystemDefinition::Type(ty) if ty.node.extend => extensions.push(ty.node),
                TypeSystemDefinition::Type(ty) => {
                    let ty = convert_type_definition(ty.node)?;
                    if builder.types.contains_key(ty.name()) {
                        return Err(RegistryError::DuplicateType(ty.name().to_string()));
                    }
                    builder.types.insert(ty.name().to_string(), ty);
                }
                TypeSystemDefinition::Directive(directive) => {
                    let directive = convert_directive_definition(directive.node);
                    builder.directives.insert(directive.name.clone(), directive);
                }
            }
        }

        for extension in extensions {
            let extension = convert_type_definition(extension)?;
            match builder.types.get_mut(extension.name()) {
                Some(existing) => merge_extension(existing, extension)?,
                None => {
                    builder.types.insert(extension.name().to_string(), extension);
                }
            }
        }

        builder.build()
    }
}

impl RegistryBuilder {
    #[must_use]
    pub fn with_type(mut self, ty: MetaType) -> Self {
        self.types.insert(ty.name().to_string(), ty);
        self
    }

    #[must_use]
    pub fn with_directive(mut self, directive: MetaDirective) -> Self {
        self.directives.insert(directive.name.clone(), directive);
        self
    }

    #[must_use]
    pub fn query_type(mut self, name: impl Into<String>) -> Self {
        self.query_type = Some(name.into());
        self
    }

    #[must_use]
    pub fn mutation_type(mut self, name: impl Into<String>) -> Self {
        self.mutation_type = Some(name.into());
        self
    }

    #[must_use]
    pub fn subscription_type(mut self, name: impl Into<String>) -> Self {
        self.subscription_type = Some(name.into());
        self
    }

    /// SDL served by the federation `_service` field.
    #[must_use]
    pub fn sdl(mut self, sdl: impl Into<String>) -> Self {
        self.sdl = sdl.into();
        self
    }

    pub fn build(mut self) -> Result<Registry, RegistryError> {
        for scalar in BUILTIN_SCALARS {
            self.types.entry(scalar.to_string()).or_insert_with(|| {
                MetaType::Scalar(ScalarType {
                    name: scalar.to_string(),
                    description: None,
                })
            });
        }

        for directive in builtin_directives() {
            self.directives.entry(directive.name.clone()).or_insert(directive);
        }
        for ty in introspection_types()? {
            self.types.insert(ty.name().to_string(), ty);
        }

        let query_type = self.query_type.clone().unwrap_or_else(|| "Query".to_string());
        let mutation_type = self.root_name(self.mutation_type.clone(), "Mutation");
        let subscription_type = self.root_name(self.subscription_type.clone(), "Subscription");

        let has_entities = self
            .types
            .values()
            .any(|ty| matches!(ty, MetaType::Object(object) if object.entity.is_some()));

        if has_entities && !self.types.contains_key(&query_type) {
            self.types.insert(
                query_type.clone(),
                MetaType::Object(ObjectType {
                    name: query_type.clone(),
                    ..Default::default()
                }),
            );
        }

        for root in [Some(&query_type), mutation_type.as_ref(), subscription_type.as_ref()]
            .into_iter()
            .flatten()
        {
            match self.types.get(root) {
                Some(MetaType::Object(_)) => (),
                Some(_) => {
                    return Err(RegistryError::WrongKind {
                        type_name: root.clone(),
                        referenced_by: "schema".into(),
                        expected: "an object",
                    })
                }
                None => return Err(RegistryError::MissingRootType(root.clone())),
            }
        }

        if has_entities {
            self.add_federation_types(&query_type);
        }

        self.validate_references()?;
        self.collect_possible_types();
        self.apply_directive_defaults();

        Ok(Registry {
            types: self.types,
            directives: self.directives,
            introspection_fields: introspection_fields(),
            query_type,
            mutation_type,
            subscription_type,
            sdl: self.sdl,
        })
    }

    /// An explicitly named root must exist, a default one is only used when defined.
    fn root_name(&self, explicit: Option<String>, default: &str) -> Option<String> {
        explicit.or_else(|| self.types.contains_key(default).then(|| default.to_string()))
    }

    fn apply_schema_definition(&mut self, schema: SchemaDefinition) {
        if let Some(query) = schema.query {
            self.query_type = Some(query.node.to_string());
        }
        if let Some(mutation) = schema.mutation {
            self.mutation_type = Some(mutation.node.to_string());
        }
        if let Some(subscription) = schema.subscription {
            self.subscription_type = Some(subscription.node.to_string());
        }
    }

    fn add_federation_types(&mut self, query_type: &str) {
        let entities: IndexSet<String> = self
            .types
            .values()
            .filter_map(|ty| match ty {
                MetaType::Object(object) if object.entity.as_ref().is_some_and(FederationEntity::is_resolvable) => {
                    Some(object.name.clone())
                }
                _ => None,
            })
            .collect();

        let mut root_fields = Vec::new();

        if !entities.is_empty() {
            self.types.insert(
                ANY_SCALAR.into(),
                MetaType::Scalar(ScalarType {
                    name: ANY_SCALAR.into(),
                    description: None,
                }),
            );
            self.types.insert(
                ENTITY_UNION.into(),
                MetaType::Union(UnionType {
                    name: ENTITY_UNION.into(),
                    description: None,
                    possible_types: entities,
                }),
            );
            root_fields.push(
                MetaField::new(ENTITIES_FIELD, TypeRef::named(ENTITY_UNION).list().non_null()).with_argument(
                    MetaInputValue::new(
                        "representations",
                        TypeRef::named(ANY_SCALAR).non_null().list().non_null(),
                    ),
                ),
            );
        }

        let mut service_fields = IndexMap::new();
        service_fields.insert("sdl".to_string(), MetaField::new("sdl", TypeRef::named("String")));
        self.types.insert(
            SERVICE_TYPE.into(),
            MetaType::Object(ObjectType {
                name: SERVICE_TYPE.into(),
                fields: service_fields,
                ..Default::default()
            }),
        );
        root_fields.push(MetaField::new(SERVICE_FIELD, TypeRef::named(SERVICE_TYPE).non_null()));

        if let Some(MetaType::Object(query)) = self.types.get_mut(query_type) {
            for field in root_fields {
                query.fields.insert(field.name.clone(), field);
            }
        }
    }

    /// Fills in the defaults of declared directive arguments the schema document left out.
    fn apply_directive_defaults(&mut self) {
        let directives = &self.directives;
        for ty in self.types.values_mut() {
            let fields = match ty {
                MetaType::Object(object) => &mut object.fields,
                MetaType::Interface(interface) => &mut interface.fields,
                _ => continue,
            };
            for applied in fields.values_mut().flat_map(|field| field.directives.iter_mut()) {
                let Some(definition) = directives.get(&applied.name) else {
                    continue;
                };
                for arg in definition.args.values() {
                    if let Some(default) = &arg.default_value {
                        applied
                            .arguments
                            .entry(Name::new(&arg.name))
                            .or_insert_with(|| default.clone());
                    }
                }
            }
        }
    }

    fn validate_references(&self) -> Result<(), RegistryError> {
        let check = |type_ref: &TypeRef, referenced_by: &dyn Fn() -> String, input: bool| {
            let name = type_ref.named_type();
            match self.types.get(name) {
                None => Err(RegistryError::UnknownType {
                    type_name: name.to_string(),
                    referenced_by: referenced_by(),
                }),
                Some(ty) if input && !ty.is_input() => Err(RegistryError::WrongKind {
                    type_name: name.to_string(),
                    referenced_by: referenced_by(),
                    expected: "an input type",
                }),
                Some(MetaType::InputObject(_)) if !input => Err(RegistryError::WrongKind {
                    type_name: name.to_string(),
                    referenced_by: referenced_by(),
                    expected: "an output type",
                }),
                Some(_) => Ok(()),
            }
        };

        for ty in self.types.values() {
            if let Some(fields) = ty.fields() {
                for field in fields.values() {
                    check(&field.ty, &|| format!("{}.{}", ty.name(), field.name), false)?;
                    for arg in field.args.values() {
                        check(&arg.ty, &|| format!("{}.{}({})", ty.name(), field.name, arg.name), true)?;
                    }
                }
            }

            let implements = match ty {
                MetaType::Object(object) => Some(&object.implements),
                MetaType::Interface(interface) => Some(&interface.implements),
                _ => None,
            };
            for interface in implements.into_iter().flatten() {
                match self.types.get(interface) {
                    Some(MetaType::Interface(_)) => (),
                    Some(_) => {
                        return Err(RegistryError::WrongKind {
                            type_name: interface.clone(),
                            referenced_by: ty.name().to_string(),
                            expected: "an interface",
                        })
                    }
                    None => {
                        return Err(RegistryError::UnknownType {
                            type_name: interface.clone(),
                            referenced_by: ty.name().to_string(),
                        })
                    }
                }
            }

            match ty {
                MetaType::Union(union) => {
                    for member in &union.possible_types {
                        match self.types.get(member) {
                            Some(MetaType::Object(_)) => (),
                            Some(_) => {
                                return Err(RegistryError::WrongKind {
                                    type_name: member.clone(),
                                    referenced_by: union.name.clone(),
                                    expected: "an object",
                                })
                            }
                            None => {
                                return Err(RegistryError::UnknownType {
                                    type_name: member.clone(),
                                    referenced_by: union.name.clone(),
                                })
                            }
                        }
                    }
                }
                MetaType::InputObject(input) => {
                    for field in input.fields.values() {
                        check(&field.ty, &|| format!("{}.{}", input.name, field.name), true)?;
                    }
                }
                _ => (),
            }
        }

        for directive in self.directives.values() {
            for arg in directive.args.values() {
                check(&arg.ty, &|| format!("@{}({})", directive.name, arg.name), true)?;
            }
        }

        Ok(())
    }

    fn collect_possible_types(&mut self) {
        let implementations: Vec<(String, String)> = self
            .types
            .values()
            .filter_map(|ty| match ty {
                MetaType::Object(object) => Some(object),
                _ => None,
            })
            .flat_map(|object| {
                object
                    .implements
                    .iter()
                    .map(|interface| (interface.clone(), object.name.clone()))
            })
            .collect();

        for (interface, object) in implementations {
            if let Some(MetaType::Interface(interface)) = self.types.get_mut(&interface) {
                interface.possible_types.insert(object);
            }
        }
    }
}

pub(super) fn convert_type_definition(definition: TypeDefinition) -> Result<MetaType, RegistryError> {
    let name = definition.name.node.to_string();
    let description = definition.description.map(|description| description.node);

    Ok(match definition.kind {
        AstTypeKind::Scalar => MetaType::Scalar(ScalarType { name, description }),
        AstTypeKind::Object(object) => {
            let entity = convert_keys(&name, &definition.directives)?;
            MetaType::Object(ObjectType {
                fields: convert_fields(object.fields),
                implements: object.implements.into_iter().map(|name| name.node.to_string()).collect(),
                entity,
                name,
                description,
            })
        }
        AstTypeKind::Interface(interface) => MetaType::Interface(InterfaceType {
            name,
            description,
            fields: convert_fields(interface.fields),
            implements: interface
                .implements
                .into_iter()
                .map(|name| name.node.to_string())
                .collect(),
            possible_types: IndexSet::new(),
        }),
        AstTypeKind::Union(union) => MetaType::Union(UnionType {
            name,
            description,
            possible_types: union.members.into_iter().map(|member| member.node.to_string()).collect(),
        }),
        AstTypeKind::Enum(enum_type) => MetaType::Enum(EnumType {
            name,
            description,
            values: enum_type.values.into_iter().map(|value| convert_enum_value(value.node)).collect(),
        }),
        AstTypeKind::InputObject(input) => MetaType::InputObject(InputObjectType {
            name,
            description,
            fields: convert_input_values(input.fields),
        }),
    })
}

fn convert_fields(fields: Vec<Positioned<FieldDefinition>>) -> IndexMap<String, MetaField> {
    fields
        .into_iter()
        .map(|field| {
            let field = field.node;
            let name = field.name.node.to_string();
            let meta = MetaField {
                name: name.clone(),
                description: field.description.map(|description| description.node),
                ty: TypeRef::from(&field.ty.node),
                args: convert_input_values(field.arguments),
                deprecation: deprecation(&field.directives),
                directives: field
                    .directives
                    .into_iter()
                    .filter(|directive| directive.node.name.node != DEPRECATED_DIRECTIVE)
                    .map(|directive| AppliedDirective {
                        name: directive.node.name.node.to_string(),
                        arguments: directive
                            .node
                            .arguments
                            .into_iter()
                            .map(|(name, value)| (name.node, value.node))
                            .collect(),
                    })
                    .collect(),
            };
            (name, meta)
        })
        .collect()
}

fn convert_enum_value(value: EnumValueDefinition) -> (String, MetaEnumValue) {
    let name = value.value.node.to_string();
    let meta = MetaEnumValue {
        name: name.clone(),
        description: value.description.map(|description| description.node),
        deprecation: deprecation(&value.directives),
    };
    (name, meta)
}

/// The reason of a `@deprecated` directive, if one is applied.
fn deprecation(directives: &[Positioned<ConstDirective>]) -> Option<String> {
    let directive = directives
        .iter()
        .find(|directive| directive.node.name.node == DEPRECATED_DIRECTIVE)?;
    match directive.node.get_argument("reason").map(|reason| &reason.node) {
        Some(ConstValue::String(reason)) => Some(reason.clone()),
        _ => Some(DEFAULT_DEPRECATION_REASON.to_string()),
    }
}

fn convert_directive_definition(definition: DirectiveDefinition) -> MetaDirective {
    MetaDirective {
        name: definition.name.node.to_string(),
        description: definition.description.map(|description| description.node),
        locations: definition
            .locations
            .into_iter()
            .map(|location| location_name(location.node).to_string())
            .collect(),
        args: convert_input_values(definition.arguments),
        is_repeatable: definition.is_repeatable,
    }
}

fn location_name(location: DirectiveLocation) -> &'static str {
    match location {
        DirectiveLocation::Query => "QUERY",
        DirectiveLocation::Mutation => "MUTATION",
        DirectiveLocation::Subscription => "SUBSCRIPTION",
        DirectiveLocation::Field => "FIELD",
        DirectiveLocation::FragmentDefinition => "FRAGMENT_DEFINITION",
        DirectiveLocation::FragmentSpread => "FRAGMENT_SPREAD",
        DirectiveLocation::InlineFragment => "INLINE_FRAGMENT",
        DirectiveLocation::VariableDefinition => "VARIABLE_DEFINITION",
        DirectiveLocation::Schema => "SCHEMA",
        DirectiveLocation::Scalar => "SCALAR",
        DirectiveLocation::Object => "OBJECT",
        DirectiveLocation::FieldDefinition => "FIELD_DEFINITION",
        DirectiveLocation::ArgumentDefinition => "ARGUMENT_DEFINITION",
        DirectiveLocation::Interface => "INTERFACE",
        DirectiveLocation::Union => "UNION",
        DirectiveLocation::Enum => "ENUM",
        DirectiveLocation::EnumValue => "ENUM_VALUE",
        DirectiveLocation::InputObject => "INPUT_OBJECT",
        DirectiveLocation::InputFieldDefinition => "INPUT_FIELD_DEFINITION",
    }
}

fn convert_input_values(values: Vec<Positioned<InputValueDefinition>>) -> IndexMap<String, MetaInputValue> {
    values
        .into_iter()
        .map(|value| {
            let value = value.node;
            let name = value.name.node.to_string();
            let meta = MetaInputValue {
                name: name.clone(),
                description: value.description.map(|description| description.node),
                ty: TypeRef::from(&value.ty.node),
                default_value: value.default_value.map(|default| default.node),
            };
            (name, meta)
        })
        .collect()
}

fn convert_keys(
    type_name: &str,
    directives: &[Positioned<ConstDirective>],
) -> Result<Option<FederationEntity>, RegistryError> {
    let invalid = |message: String| RegistryError::InvalidKey {
        type_name: type_name.to_string(),
        message,
    };

    let keys = directives
        .iter()
        .filter(|directive| directive.node.name.node.as_str() == KEY_DIRECTIVE)
        .map(|directive| {
            let fields = match directive.node.get_argument("fields").map(|value| &value.node) {
                Some(ConstValue::String(fields)) => fields,
                _ => return Err(invalid("the `fields` argument must be a string".into())),
            };
            let selections = FieldSet::parse(fields).map_err(invalid)?;
            match directive.node.get_argument("resolvable").map(|value| &value.node) {
                None | Some(ConstValue::Boolean(true)) => Ok(FederationKey::new(selections)),
                Some(ConstValue::Boolean(false)) => Ok(FederationKey::unresolvable(selections)),
                Some(_) => Err(invalid("the `resolvable` argument must be a boolean".into())),
            }
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok((!keys.is_empty()).then_some(FederationEntity { keys }))
}

fn merge_extension(existing: &mut MetaType, extension: MetaType) -> Result<(), RegistryError> {
    match (existing, extension) {
        (MetaType::Object(existing), MetaType::Object(extension)) => {
            existing.fields.extend(extension.fields);
            existing.implements.extend(extension.implements);
            if let Some(entity) = extension.entity {
                existing.entity.get_or_insert_with(Default::default).keys.extend(entity.keys);
            }
        }
        (MetaType::Interface(existing), MetaType::Interface(extension)) => {
            existing.fields.extend(extension.fields);
            existing.implements.extend(extension.implements);
        }
        (MetaType::Union(existing), MetaType::Union(extension)) => {
            existing.possible_types.extend(extension.possible_types);
        }
        (MetaType::Enum(existing), MetaType::Enum(extension)) => existing.values.extend(extension.values),
        (MetaType::InputObject(existing), MetaType::InputObject(extension)) => {
            existing.fields.extend(extension.fields);
        }
        (MetaType::Scalar(_), MetaType::Scalar(_)) => (),
        (existing, extension) => {
            return Err(RegistryError::WrongKind {
                type_name: existing.name().to_string(),
                referenced_by: format!("extend {}", extension.kind()),
                expected: match extension.kind() {
                    super::TypeKind::Object => "an object",
                    super::TypeKind::Interface => "an interface",
                    super::TypeKind::Union => "a union",
                    super::TypeKind::Enum => "an enum",
                    super::TypeKind::Scalar => "a scalar",
                    super::TypeKind::InputObject => "an input object",
                },
            })
        }
    }
    Ok(())
}
