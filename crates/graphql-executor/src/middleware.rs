//! Hooks run around the binding of every field.
//!
//! Layers run outermost first: schema middlewares in registration order, then the schema
//! directives applied to the field definition in declaration order, then the binding itself.
//! A layer may change the input it hands down, inspect or replace the result, or return without
//! calling [`Next::run`] at all.

use futures_util::future::BoxFuture;

use crate::{registry::TypeRef, resolvers::Arguments, FieldValue, ResolverInput, ResolverResult};

/// The field a layer runs for.
#[derive(Debug, Clone, Copy)]
pub struct FieldInfo<'a> {
    pub parent_type: &'a str,
    pub field_name: &'a str,
    pub return_type: &'a TypeRef,
}

/// Wraps the resolution of every bound field of the schema.
#[async_trait::async_trait]
pub trait FieldMiddleware: Send + Sync {
    async fn resolve(&self, info: FieldInfo<'_>, input: ResolverInput, next: Next<'_>) -> ResolverResult<FieldValue>;
}

/// Implements a directive declared in the schema document, for the fields it is applied to.
///
/// `arguments` are the directive's arguments as written on the field definition, with the
/// declared defaults filled in.
#[async_trait::async_trait]
pub trait DirectiveHandler: Send + Sync {
    async fn resolve(
        &self,
        arguments: &Arguments,
        info: FieldInfo<'_>,
        input: ResolverInput,
        next: Next<'_>,
    ) -> ResolverResult<FieldValue>;
}

pub(crate) enum Layer<'a> {
    Middleware(&'a dyn FieldMiddleware),
    Directive(&'a dyn DirectiveHandler, &'a Arguments),
}

pub(crate) type Terminal<'a> = Box<dyn FnOnce(ResolverInput) -> BoxFuture<'a, ResolverResult<FieldValue>> + Send + 'a>;

/// The remaining layers, ending with the field's binding.
pub struct Next<'a> {
    layers: &'a [Layer<'a>],
    terminal: Terminal<'a>,
}

impl<'a> Next<'a> {
    pub(crate) fn new(layers: &'a [Layer<'a>], terminal: Terminal<'a>) -> Self {
        Next { layers, terminal }
    }

    pub async fn run(self, info: FieldInfo<'_>, input: ResolverInput) -> ResolverResult<FieldValue> {
        let Some((layer, layers)) = self.layers.split_first() else {
            return (self.terminal)(input).await;
        };

        let next = Next {
            layers,
            terminal: self.terminal,
        };
        match layer {
            Layer::Middleware(middleware) => middleware.resolve(info, input, next).await,
            Layer::Directive(handler, arguments) => handler.resolve(arguments, info, input, next).await,
        }
    }
}
