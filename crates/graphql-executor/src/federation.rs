//! Entity resolution for federation subgraphs: `_entities` and `_service`.

use async_graphql_value::{ConstValue, Name};
use indexmap::IndexMap;

use crate::{
    context::ResolverContext,
    execution::Executor,
    registry::{FederationKey, SERVICE_TYPE},
    resolvers::Arguments,
    value::{MapObject, TYPENAME_KEY},
    FieldValue, ResolverError, ResolverResult,
};

/// An entity identified by its type and key fields, without its other data.
#[derive(Debug, Clone)]
pub struct Representation {
    type_name: String,
    fields: IndexMap<Name, ConstValue>,
    key: FederationKey,
}

impl Representation {
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Every field of the representation except `__typename`.
    pub fn fields(&self) -> &IndexMap<Name, ConstValue> {
        &self.fields
    }

    pub fn get(&self, field: &str) -> Option<&ConstValue> {
        self.fields.get(field)
    }

    /// Deserializes the representation, e.g. into the key struct of the entity.
    pub fn to_typed<T: serde::de::DeserializeOwned>(&self) -> ResolverResult<T> {
        let json = ConstValue::Object(self.fields.clone())
            .into_json()
            .map_err(ResolverError::from_error)?;
        serde_json::from_value(json).map_err(ResolverError::from_error)
    }

    /// The resolvable `@key` this representation satisfies.
    pub fn key(&self) -> &FederationKey {
        &self.key
    }

    pub fn into_fields(self) -> IndexMap<Name, ConstValue> {
        self.fields
    }
}

impl<'a> Executor<'a> {
    /// Resolves `_entities(representations:)`.
    ///
    /// Representations are grouped by type and each group is handed to the entity resolver of
    /// that type in one call. Results come back in the order of `representations`. Entries that
    /// fail are null, with an error at `_entities.<index>`.
    pub(crate) async fn resolve_entities(&self, args: Arguments, ctx: &ResolverContext) -> ResolverResult<FieldValue> {
        let representations = match args.into_inner().shift_remove("representations") {
            Some(ConstValue::List(representations)) => representations,
            _ => return Err(ResolverError::new("representations must be a list")),
        };

        let mut results = vec![FieldValue::Null; representations.len()];
        let mut groups: IndexMap<String, Vec<(usize, Representation)>> = IndexMap::new();

        for (index, value) in representations.into_iter().enumerate() {
            match self.representation(value) {
                Ok(representation) => groups
                    .entry(representation.type_name.clone())
                    .or_default()
                    .push((index, representation)),
                Err(message) => ctx.with_path(index).add_error(message),
            }
        }

        let dispatches = groups
            .into_iter()
            .map(|(type_name, group)| async move {
                tracing::debug!("resolving {} entities of type {}", group.len(), type_name);
                let (indices, representations): (Vec<_>, Vec<_>) = group.into_iter().unzip();
                let results = match self.schema.entity_resolvers.get(&type_name) {
                    Some(resolver) => resolver.resolve_entities(representations, ctx.clone()).await,
                    None => Vec::new(),
                };
                (type_name, indices, results)
            })
            .collect::<Vec<_>>();

        for (type_name, indices, group_results) in self.run_concurrently(dispatches).await {
            if group_results.len() != indices.len() {
                let expected = indices.len();
                for index in indices {
                    ctx.with_path(index).add_error(format!(
                        r#"resolving Entity "{type_name}": the entity resolver returned {} results for {expected} representations"#,
                        group_results.len(),
                    ));
                }
                continue;
            }

            for (index, result) in indices.into_iter().zip(group_results) {
                match result {
                    Ok(FieldValue::Value(ConstValue::Object(fields))) => {
                        results[index] = MapObject::from_map(fields, Some(&type_name))
                            .map(FieldValue::object)
                            .unwrap_or_default();
                    }
                    Ok(value) => results[index] = value,
                    Err(error) => {
                        let ctx = ctx.with_path(index);
                        let error = ResolverError {
                            message: format!(r#"resolving Entity "{type_name}": {}"#, error.message),
                            ..error
                        };
                        ctx.request.add_error(error.into_query_error(ctx.path.clone(), &ctx.locations));
                    }
                }
            }
        }

        Ok(FieldValue::List(results))
    }

    fn representation(&self, value: ConstValue) -> Result<Representation, String> {
        let ConstValue::Object(mut fields) = value else {
            return Err("representation must be an object".to_string());
        };
        let Some(ConstValue::String(type_name)) = fields.shift_remove(TYPENAME_KEY) else {
            return Err("__typename must be an existing string".to_string());
        };

        let entity = self
            .schema
            .registry
            .entity(&type_name)
            .filter(|_| self.schema.entity_resolvers.contains_key(&type_name))
            .ok_or_else(|| format!("unknown type: {type_name}"))?;
        let key = entity
            .find_key(&fields)
            .cloned()
            .ok_or_else(|| format!(r#"finding resolver for Entity "{type_name}": no key matched the representation"#))?;

        Ok(Representation { type_name, fields, key })
    }

    /// Resolves `_service`.
    pub(crate) fn resolve_service(&self) -> ResolverResult<FieldValue> {
        if self.schema.config.execution.disable_introspection {
            return Err(ResolverError::new("federated introspection disabled"));
        }

        let mut fields = IndexMap::new();
        fields.insert(Name::new("sdl"), ConstValue::String(self.schema.registry.sdl().to_string()));
        Ok(FieldValue::object(MapObject::new(SERVICE_TYPE, fields)))
    }
}
