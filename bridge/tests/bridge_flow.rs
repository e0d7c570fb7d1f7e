//! Bridge behaviour against the in-memory source: delivery modes, detach,
//! and failures published on the response channel.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::timeout;

use bridge::application::ports::data_source::DataSource;
use bridge::application::services::bridge::{Bridge, DeliveryPolicy};
use bridge::domain::bridge::{
    DeliveryMode, Failure, FailureKind, OutboundEvent, Request, SubscriptionId,
};
use bridge::infrastructure::outbound::ChannelResponsePublisher;
use bridge::infrastructure::source::{FanoutSource, MemorySource};

const TIMEOUT: Duration = Duration::from_secs(2);

fn open(source: Arc<dyn DataSource>, policy: DeliveryPolicy) -> (Bridge, UnboundedReceiver<OutboundEvent>) {
    let (publisher, rx) = ChannelResponsePublisher::<OutboundEvent>::channel();
    (Bridge::new(source, Arc::new(publisher), policy), rx)
}

async fn next_event(rx: &mut UnboundedReceiver<OutboundEvent>) -> OutboundEvent {
    timeout(TIMEOUT, rx.recv())
        .await
        .expect("no event within timeout")
        .expect("outbound channel closed")
}

async fn assert_quiet(rx: &mut UnboundedReceiver<OutboundEvent>) {
    if let Ok(Some(event)) = timeout(Duration::from_millis(150), rx.recv()).await {
        panic!("unexpected event {event:?}");
    }
}

async fn wait_until_idle(bridge: &Bridge) {
    for _ in 0..200 {
        if bridge.active_count().await == 0 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("subscriptions still active");
}

fn item(subscription: SubscriptionId, outcome: Result<Value, Failure>) -> OutboundEvent {
    OutboundEvent::Item {
        subscription,
        outcome,
    }
}

fn failure_kind(event: &OutboundEvent) -> Option<FailureKind> {
    match event.outcome() {
        Some(Err(f)) => Some(f.kind),
        _ => None,
    }
}

#[tokio::test]
async fn item_once_delivers_exactly_one_response() {
    let memory = Arc::new(MemorySource::new());
    memory.set("item/42", json!({"title": "foo"})).await;
    let (bridge, mut rx) = open(memory, DeliveryPolicy::default());

    let handle = bridge
        .request_with_mode(Request::item("42"), DeliveryMode::Once)
        .await;
    let id = handle.id();

    assert_eq!(
        next_event(&mut rx).await,
        OutboundEvent::Subscribed {
            subscription: id,
            request: Request::item("42"),
            mode: DeliveryMode::Once,
        }
    );
    assert_eq!(next_event(&mut rx).await, item(id, Ok(json!({"title": "foo"}))));
    assert_quiet(&mut rx).await;
    wait_until_idle(&bridge).await;
}

#[tokio::test]
async fn feed_once_carries_feed_name_and_data() {
    let memory = Arc::new(MemorySource::new());
    memory.set("top", json!(["1", "2", "3"])).await;
    let (bridge, mut rx) = open(memory, DeliveryPolicy::default());

    let handle = bridge.request(Request::feed("top")).await;
    assert_eq!(handle.mode(), DeliveryMode::Once);

    let _subscribed = next_event(&mut rx).await;
    assert_eq!(
        next_event(&mut rx).await,
        OutboundEvent::Feed {
            subscription: handle.id(),
            feed: "top".into(),
            outcome: Ok(json!(["1", "2", "3"])),
        }
    );
    assert_quiet(&mut rx).await;
}

#[tokio::test]
async fn identical_once_requests_are_independent() {
    let memory = Arc::new(MemorySource::new());
    memory.set("item/1", json!({"id": 1})).await;
    let (bridge, mut rx) = open(memory, DeliveryPolicy::default());

    let a = bridge
        .request_with_mode(Request::item("1"), DeliveryMode::Once)
        .await;
    let b = bridge
        .request_with_mode(Request::item("1"), DeliveryMode::Once)
        .await;
    assert_ne!(a.id(), b.id());

    let mut responses = Vec::new();
    for _ in 0..4 {
        let event = next_event(&mut rx).await;
        if event.outcome().is_some() {
            responses.push(event);
        }
    }
    assert_eq!(responses.len(), 2);
    assert!(responses.contains(&item(a.id(), Ok(json!({"id": 1})))));
    assert!(responses.contains(&item(b.id(), Ok(json!({"id": 1})))));
    assert_quiet(&mut rx).await;
}

#[tokio::test]
async fn continuous_redelivers_until_detached() {
    let memory = Arc::new(MemorySource::new());
    memory.set("item/5", json!({"score": 1})).await;
    let (bridge, mut rx) = open(memory.clone(), DeliveryPolicy::default());

    let handle = bridge.request(Request::item("5")).await;
    assert_eq!(handle.mode(), DeliveryMode::Continuous);
    let id = handle.id();

    let _subscribed = next_event(&mut rx).await;
    assert_eq!(next_event(&mut rx).await, item(id, Ok(json!({"score": 1}))));

    memory.set("item/5", json!({"score": 2})).await;
    assert_eq!(next_event(&mut rx).await, item(id, Ok(json!({"score": 2}))));
    memory.remove("item/5").await;
    assert_eq!(next_event(&mut rx).await, item(id, Ok(Value::Null)));

    assert!(handle.clone().detach().await);
    assert!(!handle.detach().await);
    assert!(!bridge.is_active(id).await);

    memory.set("item/5", json!({"score": 3})).await;
    assert_quiet(&mut rx).await;
    assert_eq!(memory.subscriber_count("item/5").await, 0);
}

#[tokio::test]
async fn unavailable_source_yields_single_failure() {
    let memory = Arc::new(MemorySource::new());
    memory.fail_path("item/42", "network down").await;
    let (bridge, mut rx) = open(memory, DeliveryPolicy::default());

    let handle = bridge
        .request_with_mode(Request::item("42"), DeliveryMode::Once)
        .await;
    let _subscribed = next_event(&mut rx).await;
    let response = next_event(&mut rx).await;
    assert_eq!(response.subscription(), handle.id());
    assert_eq!(failure_kind(&response), Some(FailureKind::SourceUnavailable));
    assert_quiet(&mut rx).await;

    // The bridge keeps serving after a failure.
    bridge
        .request_with_mode(Request::feed("top"), DeliveryMode::Once)
        .await;
    let _subscribed = next_event(&mut rx).await;
    assert!(matches!(next_event(&mut rx).await.outcome(), Some(Ok(Value::Null))));
}

#[tokio::test]
async fn failed_continuous_attach_is_reported_then_detached() {
    let memory = Arc::new(MemorySource::new());
    memory.fail_path("item/42", "network down").await;
    let (bridge, mut rx) = open(memory, DeliveryPolicy::default());

    let handle = bridge.request(Request::item("42")).await;
    let _subscribed = next_event(&mut rx).await;
    assert_eq!(
        failure_kind(&next_event(&mut rx).await),
        Some(FailureKind::SourceUnavailable)
    );
    assert_eq!(
        next_event(&mut rx).await,
        OutboundEvent::Detached {
            subscription: handle.id()
        }
    );
    wait_until_idle(&bridge).await;
}

#[tokio::test]
async fn continuous_survives_transient_failures() {
    let memory = Arc::new(MemorySource::new());
    let (bridge, mut rx) = open(memory.clone(), DeliveryPolicy::default());

    let handle = bridge.request(Request::item("8")).await;
    let _subscribed = next_event(&mut rx).await;
    assert_eq!(next_event(&mut rx).await, item(handle.id(), Ok(Value::Null)));

    memory.fail_path("item/8", "flaky").await;
    assert_eq!(
        failure_kind(&next_event(&mut rx).await),
        Some(FailureKind::SourceUnavailable)
    );

    memory.clear_failure("item/8").await;
    memory.set("item/8", json!("back")).await;
    assert_eq!(next_event(&mut rx).await, item(handle.id(), Ok(json!("back"))));
    assert!(bridge.is_active(handle.id()).await);
}

#[tokio::test]
async fn stalled_once_read_times_out() {
    let memory = Arc::new(MemorySource::new());
    memory.stall("item/7").await;
    let policy = DeliveryPolicy {
        once_timeout: Some(Duration::from_millis(50)),
        ..DeliveryPolicy::default()
    };
    let (bridge, mut rx) = open(memory, policy);

    bridge
        .request_with_mode(Request::item("7"), DeliveryMode::Once)
        .await;
    let _subscribed = next_event(&mut rx).await;
    assert_eq!(failure_kind(&next_event(&mut rx).await), Some(FailureKind::Timeout));
    wait_until_idle(&bridge).await;
}

#[tokio::test]
async fn invalid_ids_are_rejected_on_the_response_channel() {
    let memory = Arc::new(MemorySource::new());
    let (bridge, mut rx) = open(memory, DeliveryPolicy::default());

    let once = bridge
        .request_with_mode(Request::item("a/b"), DeliveryMode::Once)
        .await;
    let _subscribed = next_event(&mut rx).await;
    let response = next_event(&mut rx).await;
    assert_eq!(response.subscription(), once.id());
    assert_eq!(failure_kind(&response), Some(FailureKind::InvalidPath));
    assert_quiet(&mut rx).await;

    let continuous = bridge
        .request_with_mode(Request::item("$bad"), DeliveryMode::Continuous)
        .await;
    let _subscribed = next_event(&mut rx).await;
    assert_eq!(
        failure_kind(&next_event(&mut rx).await),
        Some(FailureKind::InvalidPath)
    );
    assert_eq!(
        next_event(&mut rx).await,
        OutboundEvent::Detached {
            subscription: continuous.id()
        }
    );
    assert_eq!(bridge.active_count().await, 0);
}

#[tokio::test]
async fn source_ending_a_stream_detaches_the_subscription() {
    let memory = Arc::new(MemorySource::new());
    let (bridge, mut rx) = open(memory.clone(), DeliveryPolicy::default());

    let handle = bridge.request(Request::feed("new")).await;
    let _subscribed = next_event(&mut rx).await;
    // Feeds default to Once; request a continuous one explicitly.
    assert_eq!(handle.mode(), DeliveryMode::Once);
    let _response = next_event(&mut rx).await;

    let handle = bridge
        .request_with_mode(Request::feed("new"), DeliveryMode::Continuous)
        .await;
    let _subscribed = next_event(&mut rx).await;
    let _current = next_event(&mut rx).await;

    memory.close_subscriptions("new").await;
    assert_eq!(
        next_event(&mut rx).await,
        OutboundEvent::Detached {
            subscription: handle.id()
        }
    );
    wait_until_idle(&bridge).await;
    assert!(!handle.detach().await);
}

#[tokio::test]
async fn detach_all_stops_every_subscription() {
    let memory = Arc::new(MemorySource::new());
    let (bridge, mut rx) = open(memory.clone(), DeliveryPolicy::default());

    for id in ["1", "2", "3"] {
        bridge.request(Request::item(id)).await;
        let _subscribed = next_event(&mut rx).await;
        let _current = next_event(&mut rx).await;
    }
    assert_eq!(bridge.active_count().await, 3);
    assert_eq!(bridge.detach_all().await, 3);

    memory.set("item/2", json!({"changed": true})).await;
    assert_quiet(&mut rx).await;
}

#[tokio::test]
async fn fanout_shares_upstream_between_requesters() {
    let memory = Arc::new(MemorySource::new());
    memory.set("item/11", json!({"n": 1})).await;
    let fanout: Arc<dyn DataSource> = Arc::new(FanoutSource::new(memory.clone()));
    let (first, mut rx_a) = open(fanout.clone(), DeliveryPolicy::default());
    let (second, mut rx_b) = open(fanout, DeliveryPolicy::default());

    let a = first.request(Request::item("11")).await;
    let b = second.request(Request::item("11")).await;
    let _ = next_event(&mut rx_a).await;
    let _ = next_event(&mut rx_b).await;
    assert_eq!(next_event(&mut rx_a).await, item(a.id(), Ok(json!({"n": 1}))));
    assert_eq!(next_event(&mut rx_b).await, item(b.id(), Ok(json!({"n": 1}))));
    assert_eq!(memory.subscriber_count("item/11").await, 1);

    memory.set("item/11", json!({"n": 2})).await;
    assert_eq!(next_event(&mut rx_a).await, item(a.id(), Ok(json!({"n": 2}))));
    assert_eq!(next_event(&mut rx_b).await, item(b.id(), Ok(json!({"n": 2}))));

    a.detach().await;
    memory.set("item/11", json!({"n": 3})).await;
    assert_eq!(next_event(&mut rx_b).await, item(b.id(), Ok(json!({"n": 3}))));
    assert_quiet(&mut rx_a).await;
}
