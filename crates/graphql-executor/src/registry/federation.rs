//! Entity keys for running as a federation subgraph, and the types federation adds to a schema.

use std::fmt;

use async_graphql_parser::types::{DocumentOperations, Selection, SelectionSet};
use async_graphql_value::{ConstValue, Name};
use indexmap::IndexMap;

pub(crate) const ANY_SCALAR: &str = "_Any";
pub(crate) const ENTITY_UNION: &str = "_Entity";
pub(crate) const SERVICE_TYPE: &str = "_Service";
pub(crate) const ENTITIES_FIELD: &str = "_entities";
pub(crate) const SERVICE_FIELD: &str = "_service";

/// Federation details of an object type carrying one or more `@key` directives.
#[derive(Clone, Debug, Default)]
pub struct FederationEntity {
    pub keys: Vec<FederationKey>,
}

impl FederationEntity {
    pub fn keys(&self) -> impl Iterator<Item = &FederationKey> + '_ {
        self.keys.iter()
    }

    /// Only entities with at least one resolvable key are members of `_Entity`.
    pub fn is_resolvable(&self) -> bool {
        self.keys.iter().any(|key| key.resolvable)
    }

    /// Takes an `_Any` representation and determines which resolvable key it matches.
    ///
    /// A key matches when all of its fields are present and at least one of them is not null.
    pub(crate) fn find_key(&self, representation: &IndexMap<Name, ConstValue>) -> Option<&FederationKey> {
        self.keys.iter().filter(|key| key.resolvable).find(|key| {
            key.selections.all_fields_are_present(representation) && !key.selections.all_values_are_null(representation)
        })
    }
}

#[derive(Clone, Debug)]
pub struct FederationKey {
    pub selections: FieldSet,
    pub resolvable: bool,
}

impl FederationKey {
    pub fn new(selections: FieldSet) -> Self {
        FederationKey {
            selections,
            resolvable: true,
        }
    }

    pub fn unresolvable(selections: FieldSet) -> Self {
        FederationKey {
            selections,
            resolvable: false,
        }
    }
}

impl fmt::Display for FederationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.selections)
    }
}

/// The selections of a `@key(fields: "...")` argument, e.g. `id manufacturer { id }`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FieldSet(pub Vec<KeySelection>);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeySelection {
    pub field: String,
    pub selections: Vec<KeySelection>,
}

impl FieldSet {
    pub fn new(selections: impl IntoIterator<Item = KeySelection>) -> Self {
        FieldSet(selections.into_iter().collect())
    }

    pub fn parse(fields: &str) -> Result<Self, String> {
        let document =
            async_graphql_parser::parse_query(format!("{{ {fields} }}")).map_err(|error| error.to_string())?;
        let DocumentOperations::Single(operation) = document.operations else {
            return Err("expected a single selection set".into());
        };
        if !document.fragments.is_empty() {
            return Err("fragments are not allowed in a field set".into());
        }
        let selections = convert_selection_set(&operation.node.selection_set.node)?;
        if selections.is_empty() {
            return Err("a field set must select at least one field".into());
        }
        Ok(FieldSet(selections))
    }

    /// Top level field names, in declaration order.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|selection| selection.field.as_str())
    }

    pub fn all_fields_are_present(&self, object: &IndexMap<Name, ConstValue>) -> bool {
        selections_are_present(object, &self.0)
    }

    fn all_values_are_null(&self, object: &IndexMap<Name, ConstValue>) -> bool {
        self.0
            .iter()
            .all(|selection| matches!(object.get(selection.field.as_str()), None | Some(ConstValue::Null)))
    }
}

fn convert_selection_set(selection_set: &SelectionSet) -> Result<Vec<KeySelection>, String> {
    selection_set
        .items
        .iter()
        .map(|selection| match &selection.node {
            Selection::Field(field) => {
                if field.node.alias.is_some() || !field.node.arguments.is_empty() {
                    return Err(format!(
                        "field `{}` may not have an alias or arguments",
                        field.node.name.node
                    ));
                }
                Ok(KeySelection {
                    field: field.node.name.node.to_string(),
                    selections: convert_selection_set(&field.node.selection_set.node)?,
                })
            }
            Selection::FragmentSpread(_) | Selection::InlineFragment(_) => {
                Err("fragments are not allowed in a field set".into())
            }
        })
        .collect()
}

fn selections_are_present(object: &IndexMap<Name, ConstValue>, selections: &[KeySelection]) -> bool {
    selections.iter().all(|selection| match object.get(selection.field.as_str()) {
        None => false,
        Some(_) if selection.selections.is_empty() => true,
        Some(ConstValue::Object(nested)) => selections_are_present(nested, &selection.selections),
        // A present null is taken as a nullable nested key.
        Some(ConstValue::Null) => true,
        Some(_) => false,
    })
}

impl fmt::Display for FieldSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, selection) in self.0.iter().enumerate() {
            if i != 0 {
                f.write_str(" ")?;
            }
            write!(f, "{selection}")?;
        }
        Ok(())
    }
}

impl fmt::Display for KeySelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.field)?;
        if !self.selections.is_empty() {
            f.write_str(" {")?;
            for selection in &self.selections {
                write!(f, " {selection}")?;
            }
            f.write_str(" }")?;
        }
        Ok(())
    }
}
