use async_graphql_value::ConstValue;

use super::{ScalarCodec, ScalarError, ScalarResult};

/// Signed 64-bit integers. Numeric strings are accepted on input.
pub struct IntScalar;

impl IntScalar {
    fn coerce(value: ConstValue) -> ScalarResult {
        match &value {
            ConstValue::Number(number) if number.is_i64() => Ok(value),
            ConstValue::Number(number) => match number.as_f64() {
                Some(float) if float.fract() == 0.0 && float >= i64::MIN as f64 && float < i64::MAX as f64 => {
                    Ok(ConstValue::Number((float as i64).into()))
                }
                _ => Err(ScalarError::unexpected("Int", &value)),
            },
            ConstValue::String(s) => s
                .parse::<i64>()
                .map(|int| ConstValue::Number(int.into()))
                .map_err(|_| ScalarError::unexpected("Int", &value)),
            _ => Err(ScalarError::unexpected("Int", &value)),
        }
    }
}

impl ScalarCodec for IntScalar {
    fn marshal(&self, value: ConstValue) -> ScalarResult {
        match value {
            ConstValue::Number(_) => Self::coerce(value),
            other => Err(ScalarError::unexpected("Int", &other)),
        }
    }

    fn unmarshal(&self, value: ConstValue) -> ScalarResult {
        Self::coerce(value)
    }
}
