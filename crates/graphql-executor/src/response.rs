use std::fmt;

use async_graphql_value::{ConstValue, Name};
use serde::ser::SerializeSeq;

use crate::QueryError;

/// One step of a response path: a response key or a list index.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    Field(Name),
    Index(usize),
}

impl From<&str> for PathSegment {
    fn from(value: &str) -> Self {
        PathSegment::Field(Name::new(value))
    }
}

impl From<Name> for PathSegment {
    fn from(value: Name) -> Self {
        PathSegment::Field(value)
    }
}

impl From<&Name> for PathSegment {
    fn from(value: &Name) -> Self {
        PathSegment::Field(value.clone())
    }
}

impl From<usize> for PathSegment {
    fn from(value: usize) -> Self {
        PathSegment::Index(value)
    }
}

impl serde::Serialize for PathSegment {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            PathSegment::Field(name) => serializer.serialize_str(name.as_str()),
            PathSegment::Index(index) => serializer.serialize_u64(*index as u64),
        }
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Field(name) => f.write_str(name.as_str()),
            PathSegment::Index(index) => write!(f, "{index}"),
        }
    }
}

/// Path from the response root to a value, shared cheaply between sibling steps.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct ResponsePath(im::Vector<PathSegment>);

impl ResponsePath {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn child(&self, segment: impl Into<PathSegment>) -> ResponsePath {
        let mut path = self.0.clone();
        path.push_back(segment.into());
        ResponsePath(path)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn last(&self) -> Option<&PathSegment> {
        self.0.last()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PathSegment> {
        self.0.iter()
    }
}

impl<S: Into<PathSegment>> FromIterator<S> for ResponsePath {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        ResponsePath(iter.into_iter().map(Into::into).collect())
    }
}

impl serde::Serialize for ResponsePath {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut seq = serializer.serialize_seq(Some(self.0.len()))?;
        for segment in &self.0 {
            seq.serialize_element(segment)?;
        }
        seq.end()
    }
}

impl fmt::Display for ResponsePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.0.iter().enumerate() {
            if i != 0 {
                f.write_str(".")?;
            }
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}

/// The standard `{ data, errors }` envelope.
///
/// `data` is `null` when a non-null violation reached the root or when the request
/// failed before execution started.
#[derive(Debug, Default, serde::Serialize)]
pub struct Response {
    pub data: ConstValue,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<QueryError>,
}

impl Response {
    pub fn new(data: ConstValue, errors: Vec<QueryError>) -> Self {
        Response { data, errors }
    }

    pub fn from_errors(errors: Vec<QueryError>) -> Self {
        Response {
            data: ConstValue::Null,
            errors,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn to_json_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}
