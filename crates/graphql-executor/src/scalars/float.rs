use async_graphql_value::ConstValue;

use super::{ScalarCodec, ScalarError, ScalarResult};

pub struct FloatScalar;

impl FloatScalar {
    fn coerce(value: ConstValue) -> ScalarResult {
        match &value {
            ConstValue::Number(number) => number
                .as_f64()
                .and_then(serde_json::Number::from_f64)
                .map(ConstValue::Number)
                .ok_or_else(|| ScalarError::unexpected("Float", &value)),
            _ => Err(ScalarError::unexpected("Float", &value)),
        }
    }
}

impl ScalarCodec for FloatScalar {
    fn marshal(&self, value: ConstValue) -> ScalarResult {
        Self::coerce(value)
    }

    fn unmarshal(&self, value: ConstValue) -> ScalarResult {
        Self::coerce(value)
    }
}
