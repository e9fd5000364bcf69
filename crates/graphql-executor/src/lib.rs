//! Binds a GraphQL schema to implementation types and executes operations against them.
//!
//! A [`Schema`] is assembled once from a [`Registry`], the [`ImplementationDescriptor`]s of its
//! object types and explicitly registered resolvers. Building it resolves a [`Binding`] for every
//! field. Each request is then compiled into an [`ExecutionPlan`] and executed, yielding the usual
//! `{ data, errors }` envelope with partial data.

pub mod bindings;
pub mod config;
mod context;
mod error;
mod execution;
mod federation;
mod introspection;
mod middleware;
pub mod plan;
pub mod registry;
mod resolvers;
mod response;
pub mod scalars;
mod schema;
mod subscription;
mod value;

pub use async_graphql_parser::types::OperationType;
pub use async_graphql_value::{ConstValue, Name, Variables};

pub use self::{
    bindings::{Binding, BindingError, BindingTable, ImplementationDescriptor, MethodDescriptor, ResolverKey},
    config::Config,
    context::{Data, ResolverContext},
    error::{ErrorPresenter, Location, QueryError, ResolverError, ResolverResult},
    federation::Representation,
    middleware::{DirectiveHandler, FieldInfo, FieldMiddleware, Next},
    plan::{CompileError, ComplexityFn, ExecutionPlan},
    registry::{Registry, RegistryError, TypeRef},
    resolvers::{Arguments, EntityResolver, EventStream, Resolver, ResolverInput, SubscriptionResolver},
    response::{PathSegment, Response, ResponsePath},
    scalars::{ScalarCodec, ScalarError, ScalarRegistry},
    schema::{ComplexityLimitFn, Request, Schema, SchemaBuilder, SchemaError},
    value::{DynamicObject, FieldValue, MapObject, Object, TYPENAME_KEY},
};
