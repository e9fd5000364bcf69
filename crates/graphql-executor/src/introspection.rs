//! Objects answering `__schema` and `__type` queries, read lazily from the registry.

use std::sync::Arc;

use async_graphql_value::{ConstValue, Name};
use futures_util::{
    future::{self, BoxFuture},
    FutureExt,
};
use indexmap::IndexMap;

use crate::{
    registry::{
        MetaDirective, MetaEnumValue, MetaField, MetaInputValue, MetaType, Registry, TypeKind, TypeRef, SCHEMA_TYPE,
    },
    resolvers::{Arguments, ResolverInput},
    FieldValue, Object, ResolverError, ResolverResult,
};

fn answer(result: ResolverResult<FieldValue>) -> BoxFuture<'static, ResolverResult<FieldValue>> {
    future::ready(result).boxed()
}

fn no_such_field(type_name: &str, field: &str) -> ResolverResult<FieldValue> {
    Err(ResolverError::new(format!("{type_name} has no method {field}")))
}

fn enum_value(name: &str) -> FieldValue {
    FieldValue::Value(ConstValue::Enum(Name::new(name)))
}

fn include_deprecated(args: &Arguments) -> ResolverResult<bool> {
    Ok(args.get_as::<Option<bool>>("includeDeprecated")?.unwrap_or_default())
}

pub(crate) struct SchemaIntrospection {
    registry: Arc<Registry>,
}

impl SchemaIntrospection {
    pub(crate) fn new(registry: Arc<Registry>) -> Self {
        SchemaIntrospection { registry }
    }

    fn named_type(&self, name: Option<&str>) -> FieldValue {
        name.map(|name| TypeIntrospection::new(&self.registry, TypeRef::named(name)))
            .map_or(FieldValue::Null, FieldValue::object)
    }

    fn resolve(&self, field: &str) -> ResolverResult<FieldValue> {
        let registry = &self.registry;
        match field {
            "description" => Ok(FieldValue::Null),
            // Introspection types are left out, the rest is sorted by name.
            "types" => {
                let mut names = registry
                    .types()
                    .map(MetaType::name)
                    .filter(|name| !name.starts_with("__"))
                    .collect::<Vec<_>>();
                names.sort_unstable();
                Ok(FieldValue::list(names.into_iter().map(|name| self.named_type(Some(name)))))
            }
            "queryType" => Ok(self.named_type(Some(registry.query_type()))),
            "mutationType" => Ok(self.named_type(registry.mutation_type())),
            "subscriptionType" => Ok(self.named_type(registry.subscription_type())),
            "directives" => {
                let mut directives = registry.directives().collect::<Vec<_>>();
                directives.sort_unstable_by(|a, b| a.name.cmp(&b.name));
                Ok(FieldValue::list(directives.into_iter().map(|directive| {
                    FieldValue::object(DirectiveIntrospection {
                        registry: Arc::clone(registry),
                        directive: directive.clone(),
                    })
                })))
            }
            _ => no_such_field(SCHEMA_TYPE, field),
        }
    }
}

impl Object for SchemaIntrospection {
    fn type_name(&self) -> &str {
        SCHEMA_TYPE
    }

    fn attribute(&self, _: &str) -> Option<FieldValue> {
        None
    }

    fn call(&self, method: &str, _: ResolverInput) -> BoxFuture<'static, ResolverResult<FieldValue>> {
        answer(self.resolve(method))
    }
}

/// A named type, or a list or non-null wrapper around one.
pub(crate) struct TypeIntrospection {
    registry: Arc<Registry>,
    ty: TypeRef,
}

impl TypeIntrospection {
    pub(crate) fn new(registry: &Arc<Registry>, ty: TypeRef) -> Self {
        TypeIntrospection {
            registry: Arc::clone(registry),
            ty,
        }
    }

    fn wrap(&self, ty: &TypeRef) -> FieldValue {
        FieldValue::object(TypeIntrospection::new(&self.registry, ty.clone()))
    }

    fn named(&self) -> Option<&MetaType> {
        match &self.ty {
            TypeRef::Named(name) => self.registry.lookup(name),
            TypeRef::List(_) | TypeRef::NonNull(_) => None,
        }
    }

    fn kind(&self) -> &'static str {
        match (&self.ty, self.named().map(MetaType::kind)) {
            (TypeRef::NonNull(_), _) => "NON_NULL",
            (TypeRef::List(_), _) => "LIST",
            (_, Some(TypeKind::Object)) => "OBJECT",
            (_, Some(TypeKind::Interface)) => "INTERFACE",
            (_, Some(TypeKind::Union)) => "UNION",
            (_, Some(TypeKind::Enum)) => "ENUM",
            (_, Some(TypeKind::InputObject)) => "INPUT_OBJECT",
            (_, Some(TypeKind::Scalar) | None) => "SCALAR",
        }
    }

    fn type_list<'a>(&self, names: impl Iterator<Item = &'a String>) -> FieldValue {
        FieldValue::list(names.map(|name| self.wrap(&TypeRef::named(name.as_str()))))
    }

    fn fields(&self, fields: Option<&IndexMap<String, MetaField>>, args: &Arguments) -> ResolverResult<FieldValue> {
        let Some(fields) = fields else {
            return Ok(FieldValue::Null);
        };
        let include_deprecated = include_deprecated(args)?;
        Ok(FieldValue::list(
            fields
                .values()
                .filter(|field| !field.name.starts_with("__"))
                .filter(|field| include_deprecated || field.deprecation.is_none())
                .map(|field| {
                    FieldValue::object(FieldIntrospection {
                        registry: Arc::clone(&self.registry),
                        field: field.clone(),
                    })
                }),
        ))
    }

    fn resolve(&self, field: &str, args: &Arguments) -> ResolverResult<FieldValue> {
        let named = self.named();
        match field {
            "kind" => Ok(enum_value(self.kind())),
            "name" => Ok(named.map(|ty| ty.name().to_string()).into()),
            "description" => Ok(named
                .and_then(|ty| match ty {
                    MetaType::Object(ty) => ty.description.clone(),
                    MetaType::Interface(ty) => ty.description.clone(),
                    MetaType::Union(ty) => ty.description.clone(),
                    MetaType::Enum(ty) => ty.description.clone(),
                    MetaType::Scalar(ty) => ty.description.clone(),
                    MetaType::InputObject(ty) => ty.description.clone(),
                })
                .into()),
            "specifiedByURL" => Ok(FieldValue::Null),
            "fields" => self.fields(named.and_then(MetaType::fields), args),
            "interfaces" => Ok(match named {
                Some(MetaType::Object(ty)) => self.type_list(ty.implements.iter()),
                Some(MetaType::Interface(ty)) => self.type_list(ty.implements.iter()),
                _ => FieldValue::Null,
            }),
            "possibleTypes" => Ok(match named {
                Some(MetaType::Interface(ty)) => self.type_list(ty.possible_types.iter()),
                Some(MetaType::Union(ty)) => self.type_list(ty.possible_types.iter()),
                _ => FieldValue::Null,
            }),
            "enumValues" => {
                let Some(MetaType::Enum(ty)) = named else {
                    return Ok(FieldValue::Null);
                };
                let include_deprecated = include_deprecated(args)?;
                Ok(FieldValue::list(
                    ty.values
                        .values()
                        .filter(|value| include_deprecated || value.deprecation.is_none())
                        .map(|value| FieldValue::object(EnumValueIntrospection(value.clone()))),
                ))
            }
            "inputFields" => Ok(match named {
                Some(MetaType::InputObject(ty)) => input_values(&self.registry, ty.fields.values()),
                _ => FieldValue::Null,
            }),
            "ofType" => Ok(match &self.ty {
                TypeRef::List(inner) | TypeRef::NonNull(inner) => self.wrap(inner),
                TypeRef::Named(_) => FieldValue::Null,
            }),
            _ => no_such_field("__Type", field),
        }
    }
}

impl Object for TypeIntrospection {
    fn type_name(&self) -> &str {
        "__Type"
    }

    fn attribute(&self, _: &str) -> Option<FieldValue> {
        None
    }

    fn call(&self, method: &str, input: ResolverInput) -> BoxFuture<'static, ResolverResult<FieldValue>> {
        answer(self.resolve(method, &input.args))
    }
}

fn input_values<'a>(registry: &Arc<Registry>, values: impl Iterator<Item = &'a MetaInputValue>) -> FieldValue {
    FieldValue::list(values.map(|value| {
        FieldValue::object(InputValueIntrospection {
            registry: Arc::clone(registry),
            value: value.clone(),
        })
    }))
}

struct FieldIntrospection {
    registry: Arc<Registry>,
    field: MetaField,
}

impl Object for FieldIntrospection {
    fn type_name(&self) -> &str {
        "__Field"
    }

    fn attribute(&self, _: &str) -> Option<FieldValue> {
        None
    }

    fn call(&self, method: &str, _: ResolverInput) -> BoxFuture<'static, ResolverResult<FieldValue>> {
        let field = &self.field;
        answer(match method {
            "name" => Ok(field.name.as_str().into()),
            "description" => Ok(field.description.clone().into()),
            "args" => Ok(input_values(&self.registry, field.args.values())),
            "type" => Ok(FieldValue::object(TypeIntrospection::new(&self.registry, field.ty.clone()))),
            "isDeprecated" => Ok(field.deprecation.is_some().into()),
            "deprecationReason" => Ok(field.deprecation.clone().into()),
            _ => no_such_field("__Field", method),
        })
    }
}

struct InputValueIntrospection {
    registry: Arc<Registry>,
    value: MetaInputValue,
}

impl Object for InputValueIntrospection {
    fn type_name(&self) -> &str {
        "__InputValue"
    }

    fn attribute(&self, _: &str) -> Option<FieldValue> {
        None
    }

    fn call(&self, method: &str, _: ResolverInput) -> BoxFuture<'static, ResolverResult<FieldValue>> {
        let value = &self.value;
        answer(match method {
            "name" => Ok(value.name.as_str().into()),
            "description" => Ok(value.description.clone().into()),
            "type" => Ok(FieldValue::object(TypeIntrospection::new(&self.registry, value.ty.clone()))),
            // Printed as a GraphQL literal.
            "defaultValue" => Ok(value.default_value.as_ref().map(ToString::to_string).into()),
            _ => no_such_field("__InputValue", method),
        })
    }
}

struct EnumValueIntrospection(MetaEnumValue);

impl Object for EnumValueIntrospection {
    fn type_name(&self) -> &str {
        "__EnumValue"
    }

    fn attribute(&self, _: &str) -> Option<FieldValue> {
        None
    }

    fn call(&self, method: &str, _: ResolverInput) -> BoxFuture<'static, ResolverResult<FieldValue>> {
        let value = &self.0;
        answer(match method {
            "name" => Ok(value.name.as_str().into()),
            "description" => Ok(value.description.clone().into()),
            "isDeprecated" => Ok(value.deprecation.is_some().into()),
            "deprecationReason" => Ok(value.deprecation.clone().into()),
            _ => no_such_field("__EnumValue", method),
        })
    }
}

struct DirectiveIntrospection {
    registry: Arc<Registry>,
    directive: MetaDirective,
}

impl Object for DirectiveIntrospection {
    fn type_name(&self) -> &str {
        "__Directive"
    }

    fn attribute(&self, _: &str) -> Option<FieldValue> {
        None
    }

    fn call(&self, method: &str, _: ResolverInput) -> BoxFuture<'static, ResolverResult<FieldValue>> {
        let directive = &self.directive;
        answer(match method {
            "name" => Ok(directive.name.as_str().into()),
            "description" => Ok(directive.description.clone().into()),
            "locations" => Ok(FieldValue::list(
                directive.locations.iter().map(|location| enum_value(location)),
            )),
            "args" => Ok(input_values(&self.registry, directive.args.values())),
            "isRepeatable" => Ok(directive.is_repeatable.into()),
            _ => no_such_field("__Directive", method),
        })
    }
}
