use std::{any::Any, fmt, future::Future, sync::Arc};

use async_graphql_parser::types::OperationType;
use async_graphql_value::Variables;
use futures_util::{
    stream::{self, BoxStream},
    FutureExt, StreamExt,
};
use indexmap::IndexMap;
use tokio_util::sync::CancellationToken;

use crate::{
    bindings::{BindingError, BindingResolver, BindingTable, ImplementationDescriptor, ResolverKey},
    config::Config,
    context::{Data, RequestState},
    error::{ErrorPresenter, QueryError},
    execution::Executor,
    federation::Representation,
    middleware::{DirectiveHandler, FieldMiddleware},
    plan::{CompileError, ComplexityFn, ExecutionPlan, FieldComplexities, PlanCompiler},
    registry::{MetaType, Registry, RegistryError},
    resolvers::{Arguments, EntityResolver, EventStream, Resolver, ResolverInput, SubscriptionResolver},
    response::Response,
    scalars::{ScalarCodec, ScalarRegistry},
    subscription::SubscriptionStream,
    FieldValue, ResolverContext, ResolverResult,
};

#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error("could not bind the schema: {}", join_errors(.0))]
    Binding(Vec<BindingError>),
    #[error("no codec is registered for scalar `{0}`")]
    MissingScalarCodec(String),
    #[error("an entity resolver is registered for `{0}`, which is not an entity with a resolvable key")]
    UnknownEntity(String),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("a handler is registered for directive `@{0}`, which the schema does not declare")]
    UnknownDirective(String),
    #[error("a complexity is registered for `{type_name}.{field}` which is not a field of the schema")]
    UnknownComplexityField { type_name: String, field: String },
}

fn join_errors(errors: &[BindingError]) -> String {
    errors.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

/// An operation to run against a [`Schema`].
#[derive(Debug, Default)]
pub struct Request {
    pub query: String,
    pub operation_name: Option<String>,
    pub variables: Variables,
    /// Typed values available to bindings of this request only.
    pub data: Data,
}

impl Request {
    pub fn new(query: impl Into<String>) -> Self {
        Request {
            query: query.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn operation_name(mut self, name: impl Into<String>) -> Self {
        self.operation_name = Some(name.into());
        self
    }

    #[must_use]
    pub fn variables(mut self, variables: Variables) -> Self {
        self.variables = variables;
        self
    }

    #[must_use]
    pub fn data<D: Any + Send + Sync>(mut self, data: D) -> Self {
        self.data.insert(data);
        self
    }
}

impl From<&str> for Request {
    fn from(query: &str) -> Self {
        Request::new(query)
    }
}

impl From<String> for Request {
    fn from(query: String) -> Self {
        Request::new(query)
    }
}

/// Computes the complexity limit of one request, `None` for no limit.
pub type ComplexityLimitFn = Arc<dyn Fn(&Request) -> Option<usize> + Send + Sync>;

pub(crate) struct SchemaInner {
    pub(crate) registry: Arc<Registry>,
    pub(crate) bindings: BindingTable,
    pub(crate) scalars: ScalarRegistry,
    pub(crate) config: Config,
    pub(crate) resolvers: IndexMap<ResolverKey, Arc<dyn Resolver>>,
    pub(crate) subscriptions: IndexMap<ResolverKey, Arc<dyn SubscriptionResolver>>,
    pub(crate) entity_resolvers: IndexMap<String, Arc<dyn EntityResolver>>,
    pub(crate) middlewares: Vec<Arc<dyn FieldMiddleware>>,
    pub(crate) directives: IndexMap<String, Arc<dyn DirectiveHandler>>,
    pub(crate) complexities: FieldComplexities,
    pub(crate) complexity_limit: Option<ComplexityLimitFn>,
    pub(crate) error_presenter: Option<ErrorPresenter>,
    pub(crate) data: Arc<Data>,
    pub(crate) query_root: FieldValue,
    pub(crate) mutation_root: FieldValue,
    pub(crate) subscription_root: FieldValue,
}

impl SchemaInner {
    pub(crate) fn present_errors(&self, errors: Vec<QueryError>) -> Vec<QueryError> {
        match &self.error_presenter {
            Some(presenter) => errors.into_iter().map(|error| presenter(error)).collect(),
            None => errors,
        }
    }

    pub(crate) fn root_value(&self, operation: OperationType) -> FieldValue {
        match operation {
            OperationType::Query => self.query_root.clone(),
            OperationType::Mutation => self.mutation_root.clone(),
            OperationType::Subscription => self.subscription_root.clone(),
        }
    }

    /// The limit function wins over the configured limit.
    fn complexity_limit(&self, request: &Request) -> Option<usize> {
        match &self.complexity_limit {
            Some(limit) => limit(request),
            None => self.config.execution.complexity_limit,
        }
    }

    fn request_state(&self, cancellation: CancellationToken, data: Data) -> Arc<RequestState> {
        Arc::new(RequestState::new(cancellation, Arc::clone(&self.data), Arc::new(data)))
    }
}

/// A schema with its bindings, ready to execute requests.
///
/// Cloning is cheap, clones share everything.
#[derive(Clone)]
pub struct Schema(Arc<SchemaInner>);

impl Schema {
    pub fn build(registry: Registry) -> SchemaBuilder {
        SchemaBuilder::new(Ok(registry))
    }

    /// Starts from a schema document, see [`Registry::from_sdl`].
    pub fn from_sdl(sdl: &str) -> SchemaBuilder {
        SchemaBuilder::new(Registry::from_sdl(sdl))
    }

    pub fn registry(&self) -> &Registry {
        &self.0.registry
    }

    pub fn bindings(&self) -> &BindingTable {
        &self.0.bindings
    }

    pub fn config(&self) -> &Config {
        &self.0.config
    }

    pub fn compile(
        &self,
        query: &str,
        operation_name: Option<&str>,
        variables: Variables,
    ) -> Result<ExecutionPlan, CompileError> {
        PlanCompiler::new(&self.0.registry, &self.0.bindings, &self.0.config, &self.0.scalars)
            .with_complexities(&self.0.complexities)
            .compile_query(query, operation_name, variables)
    }

    pub async fn execute(&self, request: impl Into<Request>) -> Response {
        self.execute_with_cancellation(request, CancellationToken::new()).await
    }

    /// Fields that have not started when `cancellation` fires fail with `operation cancelled`.
    pub async fn execute_with_cancellation(
        &self,
        request: impl Into<Request>,
        cancellation: CancellationToken,
    ) -> Response {
        let (plan, data) = match self.prepare(request.into()) {
            Ok(prepared) => prepared,
            Err(response) => return response,
        };
        if plan.operation_type == OperationType::Subscription {
            return self.request_error("subscription operations must be run with execute_stream");
        }

        let state = self.0.request_state(cancellation, data);
        Executor::new(&self.0)
            .execute(&plan, self.0.root_value(plan.operation_type), state)
            .await
    }

    /// Runs a subscription, yielding one response per event. Other operations yield one response.
    pub fn execute_stream(&self, request: impl Into<Request>) -> BoxStream<'static, Response> {
        self.execute_stream_with_cancellation(request, CancellationToken::new())
    }

    /// The stream ends once `cancellation` fires, after the event being resolved, if any.
    pub fn execute_stream_with_cancellation(
        &self,
        request: impl Into<Request>,
        cancellation: CancellationToken,
    ) -> BoxStream<'static, Response> {
        let (plan, data) = match self.prepare(request.into()) {
            Ok(prepared) => prepared,
            Err(response) => return stream::once(async move { response }).boxed(),
        };

        if plan.operation_type == OperationType::Subscription {
            return SubscriptionStream::new(
                Arc::clone(&self.0),
                Arc::new(plan),
                cancellation,
                Arc::new(data),
            )
            .boxed();
        }

        let schema = Arc::clone(&self.0);
        stream::once(
            async move {
                let state = schema.request_state(cancellation, data);
                Executor::new(&schema)
                    .execute(&plan, schema.root_value(plan.operation_type), state)
                    .await
            }
            .boxed(),
        )
        .boxed()
    }

    /// Compiles the request and checks its complexity, handing back the request data.
    fn prepare(&self, mut request: Request) -> Result<(ExecutionPlan, Data), Response> {
        let limit = self.0.complexity_limit(&request);
        let variables = std::mem::take(&mut request.variables);

        self.compile(&request.query, request.operation_name.as_deref(), variables)
            .and_then(|plan| match limit {
                Some(limit) => plan.check_complexity(limit).map(|()| plan),
                None => Ok(plan),
            })
            .map(|plan| (plan, request.data))
            .map_err(|error| {
                tracing::debug!("rejected request: {}", error);
                let mut query_error = QueryError::new(error.to_string());
                if let Some(code) = error.code() {
                    query_error = query_error.with_extension("code", code);
                }
                Response::from_errors(self.0.present_errors(vec![query_error]))
            })
    }

    fn request_error(&self, message: impl Into<String>) -> Response {
        Response::from_errors(self.0.present_errors(vec![QueryError::new(message)]))
    }
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("query_type", &self.0.registry.query_type())
            .field("bindings", &self.0.bindings.len())
            .finish_non_exhaustive()
    }
}

/// Collects implementations, resolvers and settings, then checks them against the registry.
pub struct SchemaBuilder {
    registry: Result<Registry, RegistryError>,
    descriptors: Vec<ImplementationDescriptor>,
    resolvers: IndexMap<ResolverKey, Arc<dyn Resolver>>,
    subscriptions: IndexMap<ResolverKey, Arc<dyn SubscriptionResolver>>,
    entity_resolvers: IndexMap<String, Arc<dyn EntityResolver>>,
    middlewares: Vec<Arc<dyn FieldMiddleware>>,
    directives: IndexMap<String, Arc<dyn DirectiveHandler>>,
    complexities: FieldComplexities,
    complexity_limit: Option<ComplexityLimitFn>,
    scalars: ScalarRegistry,
    config: Config,
    error_presenter: Option<ErrorPresenter>,
    data: Data,
    query_root: FieldValue,
    mutation_root: FieldValue,
    subscription_root: FieldValue,
}

impl SchemaBuilder {
    fn new(registry: Result<Registry, RegistryError>) -> Self {
        SchemaBuilder {
            registry,
            descriptors: Vec::new(),
            resolvers: IndexMap::new(),
            subscriptions: IndexMap::new(),
            entity_resolvers: IndexMap::new(),
            middlewares: Vec::new(),
            directives: IndexMap::new(),
            complexities: FieldComplexities::new(),
            complexity_limit: None,
            scalars: ScalarRegistry::with_builtins(),
            config: Config::default(),
            error_presenter: None,
            data: Data::default(),
            query_root: FieldValue::Null,
            mutation_root: FieldValue::Null,
            subscription_root: FieldValue::Null,
        }
    }

    #[must_use]
    pub fn descriptor(mut self, descriptor: ImplementationDescriptor) -> Self {
        self.descriptors.push(descriptor);
        self
    }

    #[must_use]
    pub fn resolver(
        mut self,
        type_name: impl Into<String>,
        field: impl Into<String>,
        resolver: impl Resolver + 'static,
    ) -> Self {
        self.resolvers
            .insert(ResolverKey::new(type_name, field), Arc::new(resolver));
        self
    }

    #[must_use]
    pub fn resolver_fn<F, Fut>(self, type_name: impl Into<String>, field: impl Into<String>, resolver: F) -> Self
    where
        F: Fn(ResolverInput) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ResolverResult<FieldValue>> + Send + 'static,
    {
        self.resolver(type_name, field, resolver)
    }

    #[must_use]
    pub fn subscription_resolver(
        mut self,
        type_name: impl Into<String>,
        field: impl Into<String>,
        resolver: impl SubscriptionResolver + 'static,
    ) -> Self {
        self.subscriptions
            .insert(ResolverKey::new(type_name, field), Arc::new(resolver));
        self
    }

    #[must_use]
    pub fn subscription_fn<F, Fut>(self, type_name: impl Into<String>, field: impl Into<String>, resolver: F) -> Self
    where
        F: Fn(ResolverInput) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ResolverResult<EventStream>> + Send + 'static,
    {
        self.subscription_resolver(type_name, field, resolver)
    }

    #[must_use]
    pub fn entity_resolver(mut self, type_name: impl Into<String>, resolver: impl EntityResolver + 'static) -> Self {
        self.entity_resolvers.insert(type_name.into(), Arc::new(resolver));
        self
    }

    #[must_use]
    pub fn entity_resolver_fn<F, Fut>(self, type_name: impl Into<String>, resolver: F) -> Self
    where
        F: Fn(Vec<Representation>, ResolverContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Vec<ResolverResult<FieldValue>>> + Send + 'static,
    {
        self.entity_resolver(type_name, resolver)
    }

    /// Wraps every bound field. Middlewares run in registration order, the first one outermost.
    #[must_use]
    pub fn middleware(mut self, middleware: impl FieldMiddleware + 'static) -> Self {
        self.middlewares.push(Arc::new(middleware));
        self
    }

    /// Implements directive `@name`, which the schema document must declare.
    #[must_use]
    pub fn directive(mut self, name: impl Into<String>, handler: impl DirectiveHandler + 'static) -> Self {
        self.directives.insert(name.into(), Arc::new(handler));
        self
    }

    #[must_use]
    pub fn field_complexity<F>(mut self, type_name: impl Into<String>, field: impl Into<String>, complexity: F) -> Self
    where
        F: Fn(usize, &Arguments) -> usize + Send + Sync + 'static,
    {
        let complexity: ComplexityFn = Arc::new(complexity);
        self.complexities
            .entry(type_name.into())
            .or_default()
            .insert(field.into(), complexity);
        self
    }

    /// Computes the complexity limit per request, replacing `execution.complexity_limit`.
    #[must_use]
    pub fn complexity_limit_fn(mut self, limit: impl Fn(&Request) -> Option<usize> + Send + Sync + 'static) -> Self {
        self.complexity_limit = Some(Arc::new(limit));
        self
    }

    #[must_use]
    pub fn scalar(mut self, name: impl Into<String>, codec: impl ScalarCodec + 'static) -> Self {
        self.scalars.register(name, codec);
        self
    }

    #[must_use]
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn error_presenter(mut self, presenter: impl Fn(QueryError) -> QueryError + Send + Sync + 'static) -> Self {
        self.error_presenter = Some(Arc::new(presenter));
        self
    }

    /// Typed values available to bindings of every request.
    #[must_use]
    pub fn data<D: Any + Send + Sync>(mut self, data: D) -> Self {
        self.data.insert(data);
        self
    }

    #[must_use]
    pub fn query_root(mut self, root: impl Into<FieldValue>) -> Self {
        self.query_root = root.into();
        self
    }

    #[must_use]
    pub fn mutation_root(mut self, root: impl Into<FieldValue>) -> Self {
        self.mutation_root = root.into();
        self
    }

    #[must_use]
    pub fn subscription_root(mut self, root: impl Into<FieldValue>) -> Self {
        self.subscription_root = root.into();
        self
    }

    pub fn build(self) -> Result<Schema, SchemaError> {
        let registry = self.registry?;
        self.config.validate(&registry)?;

        for ty in registry.types() {
            if let MetaType::Scalar(scalar) = ty {
                if !self.scalars.contains(&scalar.name) {
                    return Err(SchemaError::MissingScalarCodec(scalar.name.clone()));
                }
            }
        }

        if let Some(name) = self.directives.keys().find(|name| !registry.is_schema_directive(name)) {
            return Err(SchemaError::UnknownDirective(name.clone()));
        }

        for (type_name, fields) in &self.complexities {
            if let Some(field) = fields.keys().find(|field| registry.field(type_name, field).is_none()) {
                return Err(SchemaError::UnknownComplexityField {
                    type_name: type_name.clone(),
                    field: field.clone(),
                });
            }
        }

        if let Some(type_name) = self
            .entity_resolvers
            .keys()
            .find(|type_name| !registry.entity(type_name).is_some_and(|entity| entity.is_resolvable()))
        {
            return Err(SchemaError::UnknownEntity(type_name.clone()));
        }

        let bindings = BindingResolver::new(&registry, &self.config)
            .descriptors(&self.descriptors)
            .resolvers(self.resolvers.keys())
            .subscriptions(self.subscriptions.keys())
            .resolve_all()
            .map_err(SchemaError::Binding)?;
        tracing::debug!("bound {} fields", bindings.len());

        Ok(Schema(Arc::new(SchemaInner {
            registry: Arc::new(registry),
            bindings,
            scalars: self.scalars,
            config: self.config,
            resolvers: self.resolvers,
            subscriptions: self.subscriptions,
            entity_resolvers: self.entity_resolvers,
            middlewares: self.middlewares,
            directives: self.directives,
            complexities: self.complexities,
            complexity_limit: self.complexity_limit,
            error_presenter: self.error_presenter,
            data: Arc::new(self.data),
            query_root: self.query_root,
            mutation_root: self.mutation_root,
            subscription_root: self.subscription_root,
        })))
    }
}
