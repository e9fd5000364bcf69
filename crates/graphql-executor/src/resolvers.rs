//! Resolver registrations: explicit callables for fields, subscription sources and entities.

use std::future::Future;

use async_graphql_value::{ConstValue, Name};
use futures_util::stream::BoxStream;
use indexmap::IndexMap;
use serde::de::DeserializeOwned;

use crate::{context::ResolverContext, federation::Representation, FieldValue, ResolverError, ResolverResult};

/// Decoded field arguments, already coerced and run through scalar codecs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Arguments(IndexMap<Name, ConstValue>);

impl Arguments {
    pub(crate) fn new(arguments: IndexMap<Name, ConstValue>) -> Self {
        Arguments(arguments)
    }

    pub fn get(&self, name: &str) -> Option<&ConstValue> {
        self.0.get(name)
    }

    /// Deserializes an argument, a missing argument deserializes from null.
    pub fn get_as<T: DeserializeOwned>(&self, name: &str) -> ResolverResult<T> {
        let value = self.0.get(name).cloned().unwrap_or_default();
        let json = value
            .into_json()
            .map_err(|error| ResolverError::new(format!("argument {name}: {error}")))?;
        serde_json::from_value(json).map_err(|error| ResolverError::new(format!("argument {name}: {error}")))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ConstValue)> {
        self.0.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> IndexMap<Name, ConstValue> {
        self.0
    }
}

/// Everything a binding invocation receives.
#[derive(Debug, Clone)]
pub struct ResolverInput {
    /// The object the field is selected on, or the root value for root fields.
    pub parent: FieldValue,
    pub args: Arguments,
    pub ctx: ResolverContext,
}

/// An explicitly registered resolver for one `{type, field}` pair.
#[async_trait::async_trait]
pub trait Resolver: Send + Sync {
    async fn resolve(&self, input: ResolverInput) -> ResolverResult<FieldValue>;
}

#[async_trait::async_trait]
impl<F, Fut> Resolver for F
where
    F: Fn(ResolverInput) -> Fut + Send + Sync,
    Fut: Future<Output = ResolverResult<FieldValue>> + Send + 'static,
{
    async fn resolve(&self, input: ResolverInput) -> ResolverResult<FieldValue> {
        self(input).await
    }
}

/// Event source of a subscription root field. Each item becomes the value of that field.
pub type EventStream = BoxStream<'static, ResolverResult<FieldValue>>;

#[async_trait::async_trait]
pub trait SubscriptionResolver: Send + Sync {
    async fn subscribe(&self, input: ResolverInput) -> ResolverResult<EventStream>;
}

#[async_trait::async_trait]
impl<F, Fut> SubscriptionResolver for F
where
    F: Fn(ResolverInput) -> Fut + Send + Sync,
    Fut: Future<Output = ResolverResult<EventStream>> + Send + 'static,
{
    async fn subscribe(&self, input: ResolverInput) -> ResolverResult<EventStream> {
        self(input).await
    }
}

/// Rebuilds entities of one type from a batch of representations.
///
/// Must return exactly one result per representation, in the same order.
#[async_trait::async_trait]
pub trait EntityResolver: Send + Sync {
    async fn resolve_entities(
        &self,
        representations: Vec<Representation>,
        ctx: ResolverContext,
    ) -> Vec<ResolverResult<FieldValue>>;
}

#[async_trait::async_trait]
impl<F, Fut> EntityResolver for F
where
    F: Fn(Vec<Representation>, ResolverContext) -> Fut + Send + Sync,
    Fut: Future<Output = Vec<ResolverResult<FieldValue>>> + Send + 'static,
{
    async fn resolve_entities(
        &self,
        representations: Vec<Representation>,
        ctx: ResolverContext,
    ) -> Vec<ResolverResult<FieldValue>> {
        self(representations, ctx).await
    }
}
