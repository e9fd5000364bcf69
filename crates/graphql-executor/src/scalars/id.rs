use async_graphql_value::ConstValue;

use super::{ScalarCodec, ScalarError, ScalarResult};

/// Serialized as a string, integers are accepted on input and output.
pub struct IdScalar;

impl ScalarCodec for IdScalar {
    fn marshal(&self, value: ConstValue) -> ScalarResult {
        self.unmarshal(value)
    }

    fn unmarshal(&self, value: ConstValue) -> ScalarResult {
        match value {
            ConstValue::String(_) => Ok(value),
            ConstValue::Number(number) if number.is_i64() || number.is_u64() => {
                Ok(ConstValue::String(number.to_string()))
            }
            other => Err(ScalarError::unexpected("ID", &other)),
        }
    }
}
