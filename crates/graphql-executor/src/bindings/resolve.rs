use std::collections::HashSet;

use indexmap::IndexMap;

use super::{normalize, Binding, BindingError, BindingTable, ImplementationDescriptor, MethodDescriptor, ResolverKey};
use crate::{
    config::Config,
    registry::{
        MetaField, MetaType, ObjectType, Registry, TypeRef, ENTITIES_FIELD, SCHEMA_FIELD, SERVICE_FIELD, SERVICE_TYPE,
        TYPE_FIELD,
    },
};

/// Builds the [`BindingTable`] of a schema.
///
/// For every field of every object type, candidates are searched in priority order: attributes
/// of the implementation descriptor, then its methods, then registered resolvers. Within a tier
/// names are compared after [`normalize`]. The first tier with exactly one acceptable candidate
/// wins, two acceptable candidates in the same tier are an ambiguity.
pub struct BindingResolver<'a> {
    registry: &'a Registry,
    config: &'a Config,
    /// Registration order is kept, errors are reported in that order.
    descriptors: IndexMap<&'a str, &'a ImplementationDescriptor>,
    resolvers: IndexMap<&'a str, Vec<&'a ResolverKey>>,
    subscriptions: IndexMap<&'a str, Vec<&'a ResolverKey>>,
}

impl<'a> BindingResolver<'a> {
    pub fn new(registry: &'a Registry, config: &'a Config) -> Self {
        BindingResolver {
            registry,
            config,
            descriptors: IndexMap::new(),
            resolvers: IndexMap::new(),
            subscriptions: IndexMap::new(),
        }
    }

    #[must_use]
    pub fn descriptors(mut self, descriptors: impl IntoIterator<Item = &'a ImplementationDescriptor>) -> Self {
        self.descriptors
            .extend(descriptors.into_iter().map(|descriptor| (descriptor.type_name(), descriptor)));
        self
    }

    #[must_use]
    pub fn resolvers(mut self, keys: impl IntoIterator<Item = &'a ResolverKey>) -> Self {
        for key in keys {
            self.resolvers.entry(key.type_name.as_str()).or_default().push(key);
        }
        self
    }

    #[must_use]
    pub fn subscriptions(mut self, keys: impl IntoIterator<Item = &'a ResolverKey>) -> Self {
        for key in keys {
            self.subscriptions.entry(key.type_name.as_str()).or_default().push(key);
        }
        self
    }

    /// Resolves every object type of the registry, collecting all errors.
    pub fn resolve_all(&self) -> Result<BindingTable, Vec<BindingError>> {
        let mut errors = self.unknown_registrations();
        let mut table = BindingTable::default();

        for object in self.registry.user_object_types() {
            let descriptor = self.descriptors.get(object.name.as_str()).copied();
            match self.resolve(object, descriptor) {
                Ok(bindings) => {
                    for (field, binding) in bindings {
                        table.insert(&object.name, &field, binding);
                    }
                }
                Err(mut type_errors) => errors.append(&mut type_errors),
            }
        }

        if let Some(service) = self.registry.object(SERVICE_TYPE) {
            for field in service.fields.keys() {
                table.insert(SERVICE_TYPE, field, Binding::Attribute { name: field.clone() });
            }
        }
        self.bind_introspection(&mut table);

        if errors.is_empty() {
            Ok(table)
        } else {
            Err(errors)
        }
    }

    /// Bindings of the fields of one object type.
    pub fn resolve(
        &self,
        object: &ObjectType,
        descriptor: Option<&ImplementationDescriptor>,
    ) -> Result<IndexMap<String, Binding>, Vec<BindingError>> {
        let mut bindings = IndexMap::new();
        let mut errors = Vec::new();

        for field in object.fields.values() {
            match self.resolve_field(object, field, descriptor) {
                Ok(binding) => {
                    bindings.insert(field.name.clone(), binding);
                }
                Err(error) => errors.push(error),
            }
        }

        if errors.is_empty() {
            Ok(bindings)
        } else {
            Err(errors)
        }
    }

    fn resolve_field(
        &self,
        object: &ObjectType,
        field: &MetaField,
        descriptor: Option<&ImplementationDescriptor>,
    ) -> Result<Binding, BindingError> {
        let is_query_root = object.name == self.registry.query_type();
        if is_query_root && self.registry.has_federation() {
            if field.name == ENTITIES_FIELD {
                return Ok(Binding::Entities);
            }
            if field.name == SERVICE_FIELD {
                return Ok(Binding::Service);
            }
        }

        if self.registry.subscription_type() == Some(object.name.as_str()) {
            let candidates = matching_registrations(self.subscriptions.get(object.name.as_str()), &field.name);
            return pick(object, field, candidates, |key| Binding::Subscription {
                key: ResolverKey::clone(key),
            });
        }

        let field_config = self.config.field(&object.name, &field.name);
        let target = field_config
            .and_then(|config| config.field_name.as_deref())
            .unwrap_or(&field.name);
        let force_resolver = field_config.is_some_and(|config| config.resolver);
        let requires_context = self.registry.is_root_type(&object.name);

        if let (false, Some(descriptor)) = (force_resolver, descriptor) {
            if let Some(binding) = self.bind_member(object, field, descriptor, target, requires_context)? {
                return Ok(binding);
            }
        }

        let candidates = matching_registrations(self.resolvers.get(object.name.as_str()), &field.name);
        pick(object, field, candidates, |key| Binding::Resolver {
            key: ResolverKey::clone(key),
        })
    }

    fn bind_member(
        &self,
        object: &ObjectType,
        field: &MetaField,
        descriptor: &ImplementationDescriptor,
        target: &str,
        requires_context: bool,
    ) -> Result<Option<Binding>, BindingError> {
        let normalized = normalize(target);
        let attribute_allowed = field.args.is_empty() && !requires_context;

        if descriptor.is_map() && attribute_allowed {
            return Ok(Some(Binding::Attribute {
                name: target.to_string(),
            }));
        }

        let attributes: Vec<_> = descriptor
            .attributes
            .iter()
            .filter(|attribute| normalize(&attribute.name) == normalized)
            .filter(|attribute| {
                if !attribute_allowed {
                    tracing::warn!(
                        "attribute {} rejected for {}.{}, the field requires arguments or a context-aware call",
                        attribute.name,
                        object.name,
                        field.name
                    );
                    return false;
                }
                self.type_is_compatible(object, field, attribute.ty.as_ref(), &attribute.name)
            })
            .collect();
        if let Some(binding) = pick_optional(object, field, attributes, |attribute| Binding::Attribute {
            name: attribute.name.clone(),
        })? {
            return Ok(Some(binding));
        }

        let methods: Vec<_> = descriptor
            .methods
            .iter()
            .filter(|method| normalize(&method.name) == normalized)
            .filter_map(|method| {
                if requires_context && !method.takes_context {
                    tracing::warn!(
                        "method {} rejected for {}.{}, root fields require a context-aware call",
                        method.name,
                        object.name,
                        field.name
                    );
                    return None;
                }
                if !self.type_is_compatible(object, field, method.ty.as_ref(), &method.name) {
                    return None;
                }
                match map_arguments(field, method) {
                    Ok(arguments) => Some((method, arguments)),
                    Err(param) => {
                        tracing::warn!(
                            "method {} rejected for {}.{}, parameter {} is not an argument of the field",
                            method.name,
                            object.name,
                            field.name,
                            param
                        );
                        None
                    }
                }
            })
            .collect();
        pick_optional(object, field, methods, |(method, arguments)| Binding::Method {
            name: method.name.clone(),
            arguments: arguments.clone(),
            takes_context: method.takes_context,
        })
    }

    fn type_is_compatible(&self, object: &ObjectType, field: &MetaField, member: Option<&TypeRef>, name: &str) -> bool {
        let Some(member) = member else {
            return true;
        };
        let compatible = shapes_match(member, &field.ty)
            && (member.named_type() == field.ty.named_type()
                || self
                    .registry
                    .is_possible_type(field.ty.named_type(), member.named_type()));
        if !compatible {
            tracing::warn!(
                "member {} of type {} rejected for {}.{} of type {}",
                name,
                member,
                object.name,
                field.name,
                field.ty
            );
        }
        compatible
    }

    /// Introspection objects answer every field through a method of the same name.
    fn bind_introspection(&self, table: &mut BindingTable) {
        let query_type = self.registry.query_type();
        table.insert(query_type, SCHEMA_FIELD, Binding::IntrospectSchema);
        table.insert(query_type, TYPE_FIELD, Binding::IntrospectType);

        for ty in self.registry.types() {
            if let MetaType::Object(object) = ty {
                if !object.name.starts_with("__") {
                    continue;
                }
                for field in object.fields.keys() {
                    let binding = Binding::Method {
                        name: field.clone(),
                        arguments: IndexMap::new(),
                        takes_context: false,
                    };
                    table.insert(&object.name, field, binding);
                }
            }
        }
    }

    fn unknown_registrations(&self) -> Vec<BindingError> {
        let mut errors = Vec::new();

        for type_name in self.descriptors.keys() {
            if self.registry.object(type_name).is_none() {
                errors.push(BindingError::UnknownType(type_name.to_string()));
            }
        }

        let registrations = self.resolvers.values().chain(self.subscriptions.values()).flatten();
        let mut seen = HashSet::new();
        for key in registrations {
            let exists = self
                .registry
                .object(&key.type_name)
                .is_some_and(|object| object.fields.contains_key(&key.field_name));
            if !exists && seen.insert(*key) {
                errors.push(BindingError::UnknownField {
                    type_name: key.type_name.clone(),
                    field: key.field_name.clone(),
                });
            }
        }

        errors
    }
}

fn matching_registrations<'a>(registrations: Option<&Vec<&'a ResolverKey>>, field: &str) -> Vec<&'a ResolverKey> {
    let normalized = normalize(field);
    registrations
        .into_iter()
        .flatten()
        .filter(|key| normalize(&key.field_name) == normalized)
        .copied()
        .collect()
}

/// Maps each method parameter to the field argument with the same normalized name.
fn map_arguments(field: &MetaField, method: &MethodDescriptor) -> Result<IndexMap<String, String>, String> {
    method
        .params
        .iter()
        .map(|param| {
            let normalized = normalize(param);
            field
                .args
                .keys()
                .find(|arg| normalize(arg) == normalized)
                .map(|arg| (arg.clone(), param.clone()))
                .ok_or_else(|| param.clone())
        })
        .collect()
}

/// Same list structure, nullability is checked at runtime.
fn shapes_match(member: &TypeRef, field: &TypeRef) -> bool {
    match (member.nullable(), field.nullable()) {
        (TypeRef::List(member), TypeRef::List(field)) => shapes_match(member, field),
        (TypeRef::Named(_), TypeRef::Named(_)) => true,
        _ => false,
    }
}

fn pick_optional<T: std::fmt::Debug>(
    object: &ObjectType,
    field: &MetaField,
    mut candidates: Vec<T>,
    binding: impl Fn(&T) -> Binding,
) -> Result<Option<Binding>, BindingError> {
    match candidates.len() {
        0 => Ok(None),
        1 => Ok(candidates.pop().map(|candidate| binding(&candidate))),
        _ => Err(BindingError::Ambiguous {
            type_name: object.name.clone(),
            field: field.name.clone(),
            candidates: candidates.iter().map(|candidate| binding(candidate).to_string()).collect(),
        }),
    }
}

fn pick<T: std::fmt::Debug>(
    object: &ObjectType,
    field: &MetaField,
    candidates: Vec<T>,
    binding: impl Fn(&T) -> Binding,
) -> Result<Binding, BindingError> {
    pick_optional(object, field, candidates, binding)?.ok_or_else(|| BindingError::Absent {
        type_name: object.name.clone(),
        field: field.name.clone(),
    })
}
