//! Per request state shared by every binding invocation of one execution pass.

use std::{
    any::{Any, TypeId},
    collections::HashMap,
    fmt,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use async_graphql_value::ConstValue;
use tokio_util::sync::CancellationToken;

use crate::{
    error::{Location, QueryError},
    response::{PathSegment, ResponsePath},
};

/// Typed values made available to bindings through [`ResolverContext::data`].
#[derive(Default)]
pub struct Data(HashMap<TypeId, Box<dyn Any + Send + Sync>>);

impl Data {
    pub fn insert<D: Any + Send + Sync>(&mut self, data: D) {
        self.0.insert(TypeId::of::<D>(), Box::new(data));
    }

    pub fn get<D: Any + Send + Sync>(&self) -> Option<&D> {
        self.0.get(&TypeId::of::<D>()).and_then(|data| data.downcast_ref())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Data {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Data").field(&self.0.len()).finish()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// State of one resolution pass: a request, or a single subscription event.
pub(crate) struct RequestState {
    cancellation: CancellationToken,
    schema_data: Arc<Data>,
    request_data: Arc<Data>,
    store: Mutex<HashMap<String, ConstValue>>,
    errors: Mutex<Vec<QueryError>>,
}

impl RequestState {
    pub(crate) fn new(cancellation: CancellationToken, schema_data: Arc<Data>, request_data: Arc<Data>) -> Self {
        RequestState {
            cancellation,
            schema_data,
            request_data,
            store: Mutex::new(HashMap::new()),
            errors: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn add_error(&self, error: QueryError) {
        lock(&self.errors).push(error);
    }

    pub(crate) fn take_errors(&self) -> Vec<QueryError> {
        std::mem::take(&mut *lock(&self.errors))
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}

/// What a binding sees of the request being resolved.
///
/// Cloning is cheap, every clone shares the same request state.
#[derive(Clone)]
pub struct ResolverContext {
    pub(crate) request: Arc<RequestState>,
    pub(crate) path: ResponsePath,
    pub(crate) locations: Arc<[Location]>,
}

impl ResolverContext {
    pub(crate) fn new(request: Arc<RequestState>) -> Self {
        ResolverContext {
            request,
            path: ResponsePath::empty(),
            locations: Arc::from(Vec::new()),
        }
    }

    pub(crate) fn with_field(&self, path: ResponsePath, locations: Arc<[Location]>) -> Self {
        ResolverContext {
            request: Arc::clone(&self.request),
            path,
            locations,
        }
    }

    pub(crate) fn with_path(&self, segment: impl Into<PathSegment>) -> Self {
        ResolverContext {
            request: Arc::clone(&self.request),
            path: self.path.child(segment),
            locations: Arc::clone(&self.locations),
        }
    }

    /// Response path of the field being resolved.
    pub fn path(&self) -> &ResponsePath {
        &self.path
    }

    pub fn locations(&self) -> &[Location] {
        &self.locations
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.request.cancellation
    }

    pub fn is_cancelled(&self) -> bool {
        self.request.is_cancelled()
    }

    /// Request data first, then schema data.
    pub fn data<D: Any + Send + Sync>(&self) -> Option<&D> {
        self.request
            .request_data
            .get::<D>()
            .or_else(|| self.request.schema_data.get::<D>())
    }

    /// Reads the request-scoped store.
    ///
    /// Concurrent siblings writing the same key race, last writer wins.
    pub fn get(&self, key: &str) -> Option<ConstValue> {
        lock(&self.request.store).get(key).cloned()
    }

    pub fn insert(&self, key: impl Into<String>, value: impl Into<ConstValue>) -> Option<ConstValue> {
        lock(&self.request.store).insert(key.into(), value.into())
    }

    pub fn remove(&self, key: &str) -> Option<ConstValue> {
        lock(&self.request.store).remove(key)
    }

    /// Reports an error at the current field without failing it.
    pub fn add_error(&self, message: impl Into<String>) {
        self.request.add_error(
            QueryError::new(message)
                .with_path(self.path.clone())
                .with_locations(self.locations.iter().copied()),
        );
    }
}

impl fmt::Debug for ResolverContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolverContext").field("path", &self.path).finish()
    }
}
