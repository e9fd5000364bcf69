use async_graphql_value::ConstValue;
use chrono::{DateTime, SecondsFormat};

use super::{ScalarCodec, ScalarError, ScalarResult};

/// An RFC 3339 timestamp such as `2024-03-01T10:00:00Z`. The offset is preserved.
pub struct TimeScalar;

impl TimeScalar {
    fn normalize(value: ConstValue) -> ScalarResult {
        match &value {
            ConstValue::String(time) => DateTime::parse_from_rfc3339(time)
                .map(|time| ConstValue::String(time.to_rfc3339_opts(SecondsFormat::AutoSi, false)))
                .map_err(|error| ScalarError::new(format!("could not parse time {time:?}: {error}"))),
            _ => Err(ScalarError::unexpected("Time", &value)),
        }
    }
}

impl ScalarCodec for TimeScalar {
    fn marshal(&self, value: ConstValue) -> ScalarResult {
        Self::normalize(value)
    }

    fn unmarshal(&self, value: ConstValue) -> ScalarResult {
        Self::normalize(value)
    }
}
