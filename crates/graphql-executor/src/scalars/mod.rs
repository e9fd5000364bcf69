//! Codecs converting scalar values between their wire form and the form bindings work with.
//!
//! `unmarshal` runs on field arguments, variables included once substituted, `marshal` on every
//! leaf a binding returns. Variable coercion only checks the built-in scalars.
//! The pair must round-trip: `marshal(unmarshal(v))` is equivalent input for any accepted `v`.

use std::{collections::HashMap, fmt, sync::Arc};

use async_graphql_value::ConstValue;

mod any;
mod boolean;
mod float;
mod id;
mod int;
mod string;
mod time;

pub use self::{
    any::AnyScalar, boolean::BooleanScalar, float::FloatScalar, id::IdScalar, int::IntScalar, string::StringScalar,
    time::TimeScalar,
};

/// Why a scalar value was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct ScalarError(pub String);

impl ScalarError {
    pub fn new(message: impl Into<String>) -> Self {
        ScalarError(message.into())
    }

    pub(crate) fn unexpected(expected: &str, value: &ConstValue) -> Self {
        ScalarError(format!("{expected} cannot represent {}", describe(value)))
    }
}

pub type ScalarResult = Result<ConstValue, ScalarError>;

pub trait ScalarCodec: Send + Sync {
    /// Result coercion, applied to values returned by bindings.
    fn marshal(&self, value: ConstValue) -> ScalarResult;

    /// Input coercion, applied to argument and variable values.
    fn unmarshal(&self, value: ConstValue) -> ScalarResult;
}

struct FnCodec<M, U> {
    marshal: M,
    unmarshal: U,
}

impl<M, U> ScalarCodec for FnCodec<M, U>
where
    M: Fn(ConstValue) -> ScalarResult + Send + Sync,
    U: Fn(ConstValue) -> ScalarResult + Send + Sync,
{
    fn marshal(&self, value: ConstValue) -> ScalarResult {
        (self.marshal)(value)
    }

    fn unmarshal(&self, value: ConstValue) -> ScalarResult {
        (self.unmarshal)(value)
    }
}

/// Scalar type name to codec. Read-only once the schema is built.
#[derive(Clone)]
pub struct ScalarRegistry {
    codecs: HashMap<String, Arc<dyn ScalarCodec>>,
}

impl Default for ScalarRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl ScalarRegistry {
    pub fn empty() -> Self {
        ScalarRegistry { codecs: HashMap::new() }
    }

    /// The five standard scalars plus `Time`, `Any` and the federation `_Any`.
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.register("Int", IntScalar);
        registry.register("Float", FloatScalar);
        registry.register("String", StringScalar);
        registry.register("Boolean", BooleanScalar);
        registry.register("ID", IdScalar);
        registry.register("Time", TimeScalar);
        registry.register("Any", AnyScalar);
        registry.register(crate::registry::ANY_SCALAR, AnyScalar);
        registry
    }

    /// Registers or replaces the codec of `name`.
    pub fn register(&mut self, name: impl Into<String>, codec: impl ScalarCodec + 'static) {
        self.codecs.insert(name.into(), Arc::new(codec));
    }

    pub fn register_fn<M, U>(&mut self, name: impl Into<String>, marshal: M, unmarshal: U)
    where
        M: Fn(ConstValue) -> ScalarResult + Send + Sync + 'static,
        U: Fn(ConstValue) -> ScalarResult + Send + Sync + 'static,
    {
        self.register(name, FnCodec { marshal, unmarshal });
    }

    pub fn get(&self, name: &str) -> Option<&dyn ScalarCodec> {
        self.codecs.get(name).map(AsRef::as_ref)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.codecs.contains_key(name)
    }
}

impl fmt::Debug for ScalarRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.codecs.keys().collect();
        names.sort();
        f.debug_struct("ScalarRegistry").field("codecs", &names).finish()
    }
}

pub(crate) fn describe(value: &ConstValue) -> String {
    match value {
        ConstValue::Null => "null".into(),
        ConstValue::String(s) => format!("the string {s:?}"),
        ConstValue::Number(n) => format!("the number {n}"),
        ConstValue::Boolean(b) => format!("the boolean {b}"),
        ConstValue::Enum(name) => format!("the enum value {name}"),
        ConstValue::Binary(_) => "a binary value".into(),
        ConstValue::List(_) => "a list".into(),
        ConstValue::Object(_) => "an object".into(),
    }
}
