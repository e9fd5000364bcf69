use async_graphql_value::ConstValue;

use super::{ScalarCodec, ScalarError, ScalarResult};

pub struct StringScalar;

impl ScalarCodec for StringScalar {
    fn marshal(&self, value: ConstValue) -> ScalarResult {
        match value {
            ConstValue::String(_) => Ok(value),
            ConstValue::Enum(name) => Ok(ConstValue::String(name.to_string())),
            other => Err(ScalarError::unexpected("String", &other)),
        }
    }

    fn unmarshal(&self, value: ConstValue) -> ScalarResult {
        match value {
            ConstValue::String(_) => Ok(value),
            other => Err(ScalarError::unexpected("String", &other)),
        }
    }
}
