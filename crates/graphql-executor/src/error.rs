use std::{fmt, sync::Arc};

use async_graphql_parser::Pos;

use crate::response::ResponsePath;

pub type ResolverResult<T> = Result<T, ResolverError>;

/// Rewrites errors before they are placed in the response envelope.
pub type ErrorPresenter = Arc<dyn Fn(QueryError) -> QueryError + Send + Sync>;

/// A `{ line, column }` pair pointing into the query document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct Location {
    pub line: usize,
    pub column: usize,
}

impl From<Pos> for Location {
    fn from(pos: Pos) -> Self {
        Location {
            line: pos.line,
            column: pos.column,
        }
    }
}

/// A runtime, per-field error reported next to the partial data.
#[derive(Clone, Debug, serde::Serialize)]
pub struct QueryError {
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub locations: Vec<Location>,
    #[serde(skip_serializing_if = "ResponsePath::is_empty")]
    pub path: ResponsePath,
    #[serde(skip_serializing_if = "serde_json::Map::is_empty")]
    pub extensions: serde_json::Map<String, serde_json::Value>,
    /// Underlying failure, for server side observers only.
    #[serde(skip)]
    pub source: Option<Arc<dyn std::error::Error + Send + Sync>>,
}

impl QueryError {
    pub fn new(message: impl Into<String>) -> Self {
        QueryError {
            message: message.into(),
            locations: Vec::new(),
            path: ResponsePath::empty(),
            extensions: serde_json::Map::new(),
            source: None,
        }
    }

    #[must_use]
    pub fn with_path(mut self, path: ResponsePath) -> Self {
        self.path = path;
        self
    }

    #[must_use]
    pub fn with_location(mut self, location: impl Into<Location>) -> Self {
        self.locations.push(location.into());
        self
    }

    #[must_use]
    pub fn with_locations(mut self, locations: impl IntoIterator<Item = Location>) -> Self {
        self.locations.extend(locations);
        self
    }

    #[must_use]
    pub fn with_extension(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.extensions.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_source(mut self, source: Arc<dyn std::error::Error + Send + Sync>) -> Self {
        self.source = Some(source);
        self
    }
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            f.write_str(&self.message)
        } else {
            write!(f, "{} (at {})", self.message, self.path)
        }
    }
}

impl std::error::Error for QueryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|source| source as &(dyn std::error::Error + 'static))
    }
}

/// Error returned by user bindings: methods, resolvers and entity resolvers.
///
/// Anything implementing `Display` converts into it, so `?` works on most error types.
/// It deliberately does not implement `Display` itself.
#[derive(Clone, Debug)]
pub struct ResolverError {
    pub message: String,
    pub extensions: serde_json::Map<String, serde_json::Value>,
    pub source: Option<Arc<dyn std::error::Error + Send + Sync>>,
}

impl ResolverError {
    pub fn new(message: impl Into<String>) -> Self {
        ResolverError {
            message: message.into(),
            extensions: serde_json::Map::new(),
            source: None,
        }
    }

    /// Keeps the original error around as the source of the resulting `QueryError`.
    pub fn from_error(error: impl std::error::Error + Send + Sync + 'static) -> Self {
        ResolverError {
            message: error.to_string(),
            extensions: serde_json::Map::new(),
            source: Some(Arc::new(error)),
        }
    }

    #[must_use]
    pub fn with_extension(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.extensions.insert(key.into(), value.into());
        self
    }

    pub(crate) fn into_query_error(self, path: ResponsePath, locations: &[Location]) -> QueryError {
        QueryError {
            message: self.message,
            locations: locations.to_vec(),
            path,
            extensions: self.extensions,
            source: self.source,
        }
    }
}

impl<T: fmt::Display + Send + Sync + 'static> From<T> for ResolverError {
    fn from(error: T) -> Self {
        ResolverError::new(error.to_string())
    }
}
