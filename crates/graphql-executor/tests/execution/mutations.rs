use std::{
    sync::{
        atomic::{AtomicI64, Ordering},
        Arc,
    },
    time::Duration,
};

use graphql_executor::{ResolverError, Schema};
use indoc::indoc;
use serde_json::json;

use crate::errors;

const SDL: &str = indoc! {r#"
    type Query {
        counter: Int!
    }

    type Mutation {
        increment(by: Int = 1): Int!
        refuse: Int!
        remember(value: Int!): Int!
        recall: Int
    }
"#};

fn schema() -> (Schema, Arc<AtomicI64>) {
    let counter = Arc::new(AtomicI64::new(0));

    let read = Arc::clone(&counter);
    let write = Arc::clone(&counter);
    let schema = Schema::from_sdl(SDL)
        .resolver_fn("Query", "counter", move |_| {
            let value = read.load(Ordering::SeqCst);
            async move { Ok(value.into()) }
        })
        .resolver_fn("Mutation", "increment", move |input| {
            let counter = Arc::clone(&write);
            async move {
                let by = input.args.get_as::<i64>("by")?;
                Ok((counter.fetch_add(by, Ordering::SeqCst) + by).into())
            }
        })
        .resolver_fn("Mutation", "refuse", |_| async { Err(ResolverError::new("refused")) })
        .resolver_fn("Mutation", "remember", |input| async move {
            let value = input.args.get_as::<i64>("value")?;
            tokio::time::sleep(Duration::from_millis(10)).await;
            input.ctx.insert("remembered", value);
            Ok(value.into())
        })
        .resolver_fn("Mutation", "recall", |input| async move {
            Ok(input.ctx.get("remembered").into())
        })
        .build()
        .unwrap();

    (schema, counter)
}

#[tokio::test]
async fn mutation_fields_run_in_selection_order() {
    let (schema, counter) = schema();

    let response = schema
        .execute("mutation { first: increment second: increment(by: 5) third: increment }")
        .await;

    assert_eq!(
        response.to_json_value(),
        json!({ "data": { "first": 1, "second": 6, "third": 7 } })
    );
    assert_eq!(counter.load(Ordering::SeqCst), 7);
}

#[tokio::test]
async fn later_mutations_see_earlier_effects() {
    let (schema, _) = schema();

    let response = schema.execute("mutation { remember(value: 4) recall }").await;

    assert_eq!(
        response.to_json_value(),
        json!({ "data": { "remember": 4, "recall": 4 } })
    );
}

#[tokio::test]
async fn null_reaching_the_root_stops_the_remaining_mutations() {
    let (schema, counter) = schema();

    let response = schema
        .execute("mutation { first: increment refuse third: increment }")
        .await;

    assert_eq!(response.data.clone().into_json().unwrap(), json!(null));
    assert_eq!(errors(&response), json!([{ "message": "refused", "path": ["refuse"] }]));
    assert_eq!(counter.load(Ordering::SeqCst), 1);
}
