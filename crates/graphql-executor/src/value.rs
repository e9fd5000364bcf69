//! Values handed to and returned by bindings.

use std::{collections::HashMap, fmt, sync::Arc};

use async_graphql_value::{ConstValue, Name};
use futures_util::{future::BoxFuture, FutureExt};
use indexmap::IndexMap;

use crate::{resolvers::ResolverInput, ResolverError, ResolverResult};

/// Response key every map-backed object may use to name its concrete type.
pub const TYPENAME_KEY: &str = "__typename";

/// What a binding produces for a field.
#[derive(Clone, Default)]
pub enum FieldValue {
    #[default]
    Null,
    /// Plain data: leaves, or JSON-like objects and lists resolved through map lookups.
    Value(ConstValue),
    List(Vec<FieldValue>),
    Object(Arc<dyn Object>),
}

impl FieldValue {
    pub fn object(object: impl Object + 'static) -> Self {
        FieldValue::Object(Arc::new(object))
    }

    pub fn list(items: impl IntoIterator<Item = impl Into<FieldValue>>) -> Self {
        FieldValue::List(items.into_iter().map(Into::into).collect())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null | FieldValue::Value(ConstValue::Null))
    }

    pub fn as_object(&self) -> Option<&Arc<dyn Object>> {
        match self {
            FieldValue::Object(object) => Some(object),
            _ => None,
        }
    }

    pub fn as_value(&self) -> Option<&ConstValue> {
        match self {
            FieldValue::Value(value) => Some(value),
            _ => None,
        }
    }

    pub(crate) fn describe(&self) -> String {
        match self {
            FieldValue::Null => "null".into(),
            FieldValue::Value(value) => crate::scalars::describe(value),
            FieldValue::List(_) => "a list".into(),
            FieldValue::Object(object) => format!("an object of type {}", object.type_name()),
        }
    }
}

impl fmt::Debug for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => f.write_str("Null"),
            FieldValue::Value(value) => f.debug_tuple("Value").field(value).finish(),
            FieldValue::List(items) => f.debug_tuple("List").field(items).finish(),
            FieldValue::Object(object) => write!(f, "Object({})", object.type_name()),
        }
    }
}

impl From<ConstValue> for FieldValue {
    fn from(value: ConstValue) -> Self {
        FieldValue::Value(value)
    }
}

impl From<serde_json::Value> for FieldValue {
    fn from(value: serde_json::Value) -> Self {
        ConstValue::from_json(value).map_or(FieldValue::Null, FieldValue::Value)
    }
}

impl<T: Object + 'static> From<Arc<T>> for FieldValue {
    fn from(object: Arc<T>) -> Self {
        FieldValue::Object(object)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(FieldValue::Null, Into::into)
    }
}

impl<T: Into<FieldValue>> From<Vec<T>> for FieldValue {
    fn from(items: Vec<T>) -> Self {
        FieldValue::list(items)
    }
}

macro_rules! impl_from_scalar {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for FieldValue {
                fn from(value: $ty) -> Self {
                    FieldValue::Value(ConstValue::from(value))
                }
            }
        )*
    };
}

impl_from_scalar!(i32, i64, u32, u64, f64, bool, String, &str);

/// A live implementation value.
///
/// `type_name` is the capability tag used to pick the sub-plan of interface and union fields,
/// the engine never inspects the value any other way.
pub trait Object: Send + Sync {
    /// Concrete schema object type of this value.
    fn type_name(&self) -> &str;

    /// Reads a stored attribute, `None` if this value has no such attribute.
    fn attribute(&self, name: &str) -> Option<FieldValue>;

    /// Invokes a method member.
    fn call(&self, method: &str, input: ResolverInput) -> BoxFuture<'static, ResolverResult<FieldValue>> {
        let error = ResolverError::new(format!("{} has no method {method}", self.type_name()));
        drop(input);
        Box::pin(async move { Err(error) })
    }
}

type Method = Arc<dyn Fn(ResolverInput) -> BoxFuture<'static, ResolverResult<FieldValue>> + Send + Sync>;

/// An object assembled at runtime from attributes and method closures.
#[derive(Clone)]
pub struct DynamicObject {
    type_name: String,
    attributes: IndexMap<String, FieldValue>,
    methods: HashMap<String, Method>,
}

impl DynamicObject {
    pub fn new(type_name: impl Into<String>) -> Self {
        DynamicObject {
            type_name: type_name.into(),
            attributes: IndexMap::new(),
            methods: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_method<F, Fut>(mut self, name: impl Into<String>, method: F) -> Self
    where
        F: Fn(ResolverInput) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = ResolverResult<FieldValue>> + Send + 'static,
    {
        self.methods
            .insert(name.into(), Arc::new(move |input| method(input).boxed()));
        self
    }

    pub fn into_value(self) -> FieldValue {
        FieldValue::object(self)
    }
}

impl fmt::Debug for DynamicObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynamicObject")
            .field("type_name", &self.type_name)
            .field("attributes", &self.attributes)
            .field("methods", &self.methods.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Object for DynamicObject {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn attribute(&self, name: &str) -> Option<FieldValue> {
        self.attributes.get(name).cloned()
    }

    fn call(&self, method: &str, input: ResolverInput) -> BoxFuture<'static, ResolverResult<FieldValue>> {
        match self.methods.get(method) {
            Some(method) => method(input),
            None => {
                let error = ResolverError::new(format!("{} has no method {method}", self.type_name));
                Box::pin(async move { Err(error) })
            }
        }
    }
}

/// A JSON-like object whose fields are looked up by name.
#[derive(Debug, Clone)]
pub struct MapObject {
    type_name: String,
    fields: IndexMap<Name, ConstValue>,
}

impl MapObject {
    pub fn new(type_name: impl Into<String>, fields: IndexMap<Name, ConstValue>) -> Self {
        MapObject {
            type_name: type_name.into(),
            fields,
        }
    }

    /// Uses the `__typename` entry as the concrete type, falling back to `default_type`.
    pub fn from_map(fields: IndexMap<Name, ConstValue>, default_type: Option<&str>) -> Option<Self> {
        let type_name = match fields.get(TYPENAME_KEY) {
            Some(ConstValue::String(name)) => name.clone(),
            _ => default_type?.to_string(),
        };
        Some(MapObject { type_name, fields })
    }

    pub fn fields(&self) -> &IndexMap<Name, ConstValue> {
        &self.fields
    }
}

impl Object for MapObject {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Missing keys read as null.
    fn attribute(&self, name: &str) -> Option<FieldValue> {
        Some(self.fields.get(name).cloned().map_or(FieldValue::Null, FieldValue::Value))
    }
}
