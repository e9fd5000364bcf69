use async_graphql_value::ConstValue;

use super::{ScalarCodec, ScalarResult};

/// Passes any value through untouched, used for `Any` and federation representations.
pub struct AnyScalar;

impl ScalarCodec for AnyScalar {
    fn marshal(&self, value: ConstValue) -> ScalarResult {
        Ok(value)
    }

    fn unmarshal(&self, value: ConstValue) -> ScalarResult {
        Ok(value)
    }
}
