//! Coercion of argument and variable values against their declared input types.

use std::fmt;

use async_graphql_parser::{types::VariableDefinition, Positioned};
use async_graphql_value::{ConstValue, Name, Variables};
use indexmap::IndexMap;

use crate::{
    registry::{EnumType, InputObjectType, MetaInputValue, MetaType, Registry, TypeRef, BUILTIN_SCALARS},
    scalars::ScalarRegistry,
};

pub(crate) struct InputCoercion<'a> {
    registry: &'a Registry,
    scalars: &'a ScalarRegistry,
    /// Leaves values of custom scalars as they are, their codec runs with the field arguments.
    defer_custom_scalars: bool,
}

#[derive(Clone, Copy)]
struct PathNode<'a> {
    name: &'a str,
    previous: Option<&'a PathNode<'a>>,
}

impl<'a> PathNode<'a> {
    fn new(name: &'a str) -> PathNode<'a> {
        PathNode { name, previous: None }
    }

    fn with(&'a self, name: &'a str) -> PathNode<'a> {
        PathNode {
            name,
            previous: Some(self),
        }
    }
}

impl fmt::Display for PathNode<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(previous) = self.previous {
            write!(f, "{previous}.")?;
        }
        f.write_str(self.name)
    }
}

fn input_error(path: PathNode<'_>, expected: &str) -> String {
    format!("{expected} for {path}")
}

impl<'a> InputCoercion<'a> {
    pub(crate) fn new(registry: &'a Registry, scalars: &'a ScalarRegistry) -> Self {
        InputCoercion {
            registry,
            scalars,
            defer_custom_scalars: false,
        }
    }

    /// Coercion of operation variables: structure, enums and the built-in scalars only.
    pub(crate) fn for_variables(registry: &'a Registry, scalars: &'a ScalarRegistry) -> Self {
        InputCoercion {
            registry,
            scalars,
            defer_custom_scalars: true,
        }
    }

    /// Coerces field arguments. Absent nullable arguments without default stay absent.
    pub(crate) fn coerce_arguments(
        &self,
        definitions: &IndexMap<String, MetaInputValue>,
        mut arguments: IndexMap<Name, ConstValue>,
    ) -> Result<IndexMap<Name, ConstValue>, String> {
        let mut coerced = IndexMap::with_capacity(definitions.len());

        for definition in definitions.values() {
            let value = arguments.shift_remove(definition.name.as_str());
            if let Some(value) = self.coerce_maybe_absent(
                PathNode::new(&definition.name),
                &definition.ty,
                definition.default_value.as_ref(),
                value,
            )? {
                coerced.insert(Name::new(&definition.name), value);
            }
        }

        Ok(coerced)
    }

    pub(crate) fn coerce_variables(
        &self,
        definitions: &[Positioned<VariableDefinition>],
        mut variables: Variables,
    ) -> Result<Variables, String> {
        let mut coerced = Variables::default();

        for definition in definitions {
            let name = &definition.node.name.node;
            let path = format!("${name}");
            let value = variables.remove(name);
            if let Some(value) = self.coerce_maybe_absent(
                PathNode::new(&path),
                &TypeRef::from(&definition.node.var_type.node),
                definition.node.default_value.as_ref().map(|value| &value.node),
                value,
            )? {
                coerced.insert(name.clone(), value);
            }
        }

        Ok(coerced)
    }

    fn coerce_maybe_absent(
        &self,
        path: PathNode<'_>,
        ty: &TypeRef,
        default_value: Option<&ConstValue>,
        value: Option<ConstValue>,
    ) -> Result<Option<ConstValue>, String> {
        match value.or_else(|| default_value.cloned()) {
            Some(value) => self.coerce_present(path, ty, value, true).map(Some),
            None if ty.is_non_null() => Err(input_error(path, "Unexpected null value")),
            None => Ok(None),
        }
    }

    fn coerce_present(
        &self,
        path: PathNode<'_>,
        ty: &TypeRef,
        value: ConstValue,
        allow_list_coercion: bool,
    ) -> Result<ConstValue, String> {
        match ty {
            TypeRef::NonNull(inner) => {
                if matches!(value, ConstValue::Null) {
                    return Err(input_error(path, "Unexpected null value"));
                }
                self.coerce_present(path, inner, value, allow_list_coercion)
            }
            TypeRef::List(item_ty) => match value {
                ConstValue::Null => Ok(ConstValue::Null),
                ConstValue::List(items) => {
                    // [[Int]] accepts [1] as [[1]] but not [1, 2] as [[1], [2]].
                    let allow_list_coercion = items.len() <= 1;
                    items
                        .into_iter()
                        .enumerate()
                        .map(|(index, item)| {
                            let index = index.to_string();
                            self.coerce_present(path.with(&index), item_ty, item, allow_list_coercion)
                        })
                        .collect::<Result<Vec<_>, _>>()
                        .map(ConstValue::List)
                }
                value if allow_list_coercion => Ok(ConstValue::List(vec![self.coerce_present(
                    path, item_ty, value, true,
                )?])),
                _ => Err(input_error(path, "Expected a List")),
            },
            TypeRef::Named(type_name) => {
                if matches!(value, ConstValue::Null) {
                    return Ok(value);
                }
                match self.registry.lookup(type_name) {
                    Some(MetaType::InputObject(input_object)) => self.coerce_input_object(path, input_object, value),
                    Some(MetaType::Enum(enum_type)) => coerce_enum(path, enum_type, value),
                    Some(MetaType::Scalar(_))
                        if self.defer_custom_scalars && !BUILTIN_SCALARS.contains(&type_name.as_str()) =>
                    {
                        Ok(value)
                    }
                    Some(MetaType::Scalar(_)) => {
                        let codec = self
                            .scalars
                            .get(type_name)
                            .ok_or_else(|| input_error(path, &format!("No codec for scalar {type_name}")))?;
                        codec.unmarshal(value).map_err(|error| input_error(path, &error.0))
                    }
                    _ => Err(input_error(path, &format!("{type_name} is not an input type"))),
                }
            }
        }
    }

    fn coerce_input_object(
        &self,
        path: PathNode<'_>,
        input_object: &InputObjectType,
        value: ConstValue,
    ) -> Result<ConstValue, String> {
        let ConstValue::Object(mut fields) = value else {
            return Err(input_error(path, "Expected an Object"));
        };

        let mut coerced = IndexMap::with_capacity(input_object.fields.len());
        for input in input_object.fields.values() {
            if let Some(value) = self.coerce_maybe_absent(
                path.with(&input.name),
                &input.ty,
                input.default_value.as_ref(),
                fields.shift_remove(input.name.as_str()),
            )? {
                coerced.insert(Name::new(&input.name), value);
            }
        }

        if let Some(unknown) = fields.keys().next() {
            return Err(input_error(path, &format!("Unknown field {unknown}")));
        }

        Ok(ConstValue::Object(coerced))
    }
}

fn coerce_enum(path: PathNode<'_>, enum_type: &EnumType, value: ConstValue) -> Result<ConstValue, String> {
    let name = match &value {
        ConstValue::Enum(name) => name.as_str(),
        ConstValue::String(string) => string.as_str(),
        _ => return Err(input_error(path, &format!("Expected an enum, not {value}"))),
    };
    if !enum_type.values.contains_key(name) {
        return Err(input_error(path, &format!("Unknown enum value {name}")));
    }
    Ok(ConstValue::Enum(Name::new(name)))
}
