use async_graphql_value::ConstValue;

use super::{ScalarCodec, ScalarError, ScalarResult};

pub struct BooleanScalar;

impl ScalarCodec for BooleanScalar {
    fn marshal(&self, value: ConstValue) -> ScalarResult {
        self.unmarshal(value)
    }

    fn unmarshal(&self, value: ConstValue) -> ScalarResult {
        match value {
            ConstValue::Boolean(_) => Ok(value),
            other => Err(ScalarError::unexpected("Boolean", &other)),
        }
    }
}
