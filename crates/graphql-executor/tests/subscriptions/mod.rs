use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use futures_util::{stream, StreamExt};
use graphql_executor::{EventStream, FieldValue, ImplementationDescriptor, ResolverError, ResolverResult, Schema};
use indoc::indoc;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use crate::errors;

const SDL: &str = indoc! {r#"
    type Query {
        ok: Boolean
    }

    type Subscription {
        ticks(limit: Int!): Tick!
        flaky: Tick
        closed: Tick
        forever: Tick
        stalled: Tick
    }

    type Tick {
        n: Int!
    }
"#};

fn tick(n: i64) -> ResolverResult<FieldValue> {
    Ok(json!({ "n": n }).into())
}

fn schema(pulled: Arc<AtomicUsize>) -> Schema {
    Schema::from_sdl(SDL)
        .descriptor(ImplementationDescriptor::map("Tick"))
        .resolver_fn("Query", "ok", |_| async { Ok(true.into()) })
        .subscription_fn("Subscription", "ticks", |input| async move {
            let limit = input.args.get_as::<i64>("limit")?;
            // the second event carries no payload
            let events = (1..=limit).map(|n| if n == 2 { Ok(FieldValue::Null) } else { tick(n) });
            Ok(stream::iter(events).boxed())
        })
        .subscription_fn("Subscription", "flaky", |_| async {
            Ok(stream::iter([tick(1), Err(ResolverError::new("lost connection")), tick(3)]).boxed())
        })
        .subscription_fn("Subscription", "closed", |_| async {
            Err(ResolverError::new("source unavailable"))
        })
        .subscription_fn("Subscription", "forever", move |_| {
            let pulled = Arc::clone(&pulled);
            async move {
                let events = stream::repeat_with(move || {
                    let n = pulled.fetch_add(1, Ordering::SeqCst) + 1;
                    tick(n as i64)
                });
                Ok(events.boxed())
            }
        })
        .subscription_fn("Subscription", "stalled", |_| {
            std::future::pending::<ResolverResult<EventStream>>()
        })
        .build()
        .unwrap()
}

#[tokio::test]
async fn each_event_is_one_response() {
    let schema = schema(Arc::default());

    let responses = schema
        .execute_stream("subscription { ticks(limit: 3) { n } }")
        .map(|response| response.to_json_value())
        .collect::<Vec<_>>()
        .await;

    insta::assert_json_snapshot!(responses, { "[].errors[].locations" => "[locations]" }, @r###"
    [
      {
        "data": {
          "ticks": {
            "n": 1
          }
        }
      },
      {
        "data": null,
        "errors": [
          {
            "message": "`Subscription.ticks` must not be null",
            "locations": "[locations]",
            "path": [
              "ticks"
            ]
          }
        ]
      },
      {
        "data": {
          "ticks": {
            "n": 3
          }
        }
      }
    ]
    "###);
}

#[tokio::test]
async fn failing_source_ends_the_stream() {
    let schema = schema(Arc::default());

    let responses = schema
        .execute_stream("subscription { flaky { n } }")
        .collect::<Vec<_>>()
        .await;

    assert_eq!(responses.len(), 2);
    assert_eq!(responses[0].to_json_value(), json!({ "data": { "flaky": { "n": 1 } } }));
    assert_eq!(responses[1].data.clone().into_json().unwrap(), json!(null));
    assert_eq!(
        errors(&responses[1]),
        json!([{ "message": "lost connection", "path": ["flaky"] }])
    );
}

#[tokio::test]
async fn source_that_cannot_open_yields_one_error() {
    let schema = schema(Arc::default());

    let responses = schema
        .execute_stream("subscription { closed { n } }")
        .collect::<Vec<_>>()
        .await;

    assert_eq!(responses.len(), 1);
    assert_eq!(
        errors(&responses[0]),
        json!([{ "message": "source unavailable", "path": ["closed"] }])
    );
}

#[tokio::test]
async fn events_are_pulled_on_demand_until_cancelled() {
    let pulled = Arc::new(AtomicUsize::new(0));
    let schema = schema(Arc::clone(&pulled));
    let cancellation = CancellationToken::new();

    let mut responses =
        schema.execute_stream_with_cancellation("subscription { forever { n } }", cancellation.clone());

    let first = responses.next().await.unwrap();
    assert_eq!(first.to_json_value(), json!({ "data": { "forever": { "n": 1 } } }));
    let second = responses.next().await.unwrap();
    assert_eq!(second.to_json_value(), json!({ "data": { "forever": { "n": 2 } } }));
    assert_eq!(pulled.load(Ordering::SeqCst), 2);

    cancellation.cancel();
    assert!(responses.next().await.is_none());
    assert!(responses.next().await.is_none());
    assert_eq!(pulled.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn cancellation_stops_a_source_that_is_still_opening() {
    let schema = schema(Arc::default());
    let cancellation = CancellationToken::new();
    let mut responses =
        schema.execute_stream_with_cancellation("subscription { stalled { n } }", cancellation.clone());

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        cancellation.cancel();
    });

    let next = tokio::time::timeout(Duration::from_secs(5), responses.next())
        .await
        .expect("the stream must end once cancelled");
    assert!(next.is_none());
}

#[tokio::test]
async fn arguments_are_checked_before_subscribing() {
    let schema = schema(Arc::default());

    let responses = schema
        .execute_stream(r#"subscription { ticks(limit: "many") { n } }"#)
        .collect::<Vec<_>>()
        .await;

    assert_eq!(responses.len(), 1);
    assert_eq!(
        errors(&responses[0]),
        json!([{ "message": r#"Int cannot represent the string "many" for limit"#, "path": ["ticks"] }])
    );
}

#[tokio::test]
async fn other_operations_stream_a_single_response() {
    let schema = schema(Arc::default());

    let responses = schema.execute_stream("{ ok }").collect::<Vec<_>>().await;
    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0].to_json_value(), json!({ "data": { "ok": true } }));

    let response = schema.execute("subscription { flaky { n } }").await;
    assert_eq!(
        response.to_json_value(),
        json!({
            "data": null,
            "errors": [{ "message": "subscription operations must be run with execute_stream" }]
        })
    );
}

#[tokio::test]
async fn subscriptions_select_a_single_root_field() {
    let schema = schema(Arc::default());

    let responses = schema
        .execute_stream("subscription { flaky { n } closed { n } }")
        .collect::<Vec<_>>()
        .await;

    assert_eq!(responses.len(), 1);
    assert_eq!(
        responses[0].to_json_value(),
        json!({
            "data": null,
            "errors": [{ "message": "subscription operations must select exactly one root field" }]
        })
    );
}
