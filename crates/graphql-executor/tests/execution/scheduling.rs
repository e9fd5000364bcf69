use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use graphql_executor::{Config, Schema};
use rstest::rstest;
use serde_json::json;

type Log = Arc<Mutex<Vec<&'static str>>>;

fn schema(config: &str) -> (Schema, Log) {
    let log = Log::default();

    let slow_log = Arc::clone(&log);
    let fast_log = Arc::clone(&log);
    let schema = Schema::from_sdl("type Query { slow: String fast: String }")
        .config(Config::from_toml(config).unwrap())
        .resolver_fn("Query", "slow", move |_| {
            let log = Arc::clone(&slow_log);
            async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                log.lock().unwrap().push("slow");
                Ok("slow".into())
            }
        })
        .resolver_fn("Query", "fast", move |_| {
            let log = Arc::clone(&fast_log);
            async move {
                log.lock().unwrap().push("fast");
                Ok("fast".into())
            }
        })
        .build()
        .unwrap();

    (schema, log)
}

#[rstest]
#[case::concurrent("", ["fast", "slow"])]
#[case::serial_model("[models.Query]\ndisable_concurrency = true", ["slow", "fast"])]
#[case::single_slot("[execution]\nmax_concurrency = 1", ["slow", "fast"])]
#[tokio::test]
async fn sibling_scheduling_follows_the_configuration(#[case] config: &str, #[case] expected: [&str; 2]) {
    let (schema, log) = schema(config);

    let response = schema.execute("{ slow fast }").await;

    // Response order is selection order whatever the completion order.
    assert_eq!(
        response.to_json_value(),
        json!({ "data": { "slow": "slow", "fast": "fast" } })
    );
    assert_eq!(*log.lock().unwrap(), expected);
}
