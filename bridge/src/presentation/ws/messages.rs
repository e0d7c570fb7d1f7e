use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::bridge::{
    DeliveryMode, Failure, FailureKind, OutboundEvent, Outcome, Request, SubscriptionId,
};

/// Item ids arrive as strings, but port emitters often send plain numbers.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PortId {
    Text(String),
    Number(serde_json::Number),
}

impl PortId {
    pub fn into_string(self) -> String {
        match self {
            Self::Text(s) => s,
            Self::Number(n) => n.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PortRequest {
    RequestItem {
        id: PortId,
        #[serde(default)]
        mode: Option<DeliveryMode>,
    },
    RequestFeed {
        name: String,
        #[serde(default)]
        mode: Option<DeliveryMode>,
    },
    Detach {
        subscription: SubscriptionId,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WireFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl From<Failure> for WireFailure {
    fn from(f: Failure) -> Self {
        Self {
            kind: f.kind,
            message: f.message,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestTarget {
    Item,
    Feed,
}

/// Messages written to a port session socket.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PortMessage {
    Subscribed {
        subscription: SubscriptionId,
        target: RequestTarget,
        key: String,
        mode: DeliveryMode,
    },
    ItemResponse {
        subscription: SubscriptionId,
        ok: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        value: Option<Value>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<WireFailure>,
    },
    FeedResponse {
        subscription: SubscriptionId,
        ok: bool,
        feed: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        data: Option<Value>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<WireFailure>,
    },
    Detached {
        subscription: SubscriptionId,
    },
    Error {
        message: String,
    },
}

fn split(outcome: Outcome) -> (bool, Option<Value>, Option<WireFailure>) {
    match outcome {
        Ok(value) => (true, Some(value), None),
        Err(failure) => (false, None, Some(failure.into())),
    }
}

impl From<OutboundEvent> for PortMessage {
    fn from(event: OutboundEvent) -> Self {
        match event {
            OutboundEvent::Subscribed {
                subscription,
                request,
                mode,
            } => {
                let (target, key) = match request {
                    Request::Item { id } => (RequestTarget::Item, id),
                    Request::Feed { name } => (RequestTarget::Feed, name),
                };
                Self::Subscribed {
                    subscription,
                    target,
                    key,
                    mode,
                }
            }
            OutboundEvent::Item {
                subscription,
                outcome,
            } => {
                let (ok, value, error) = split(outcome);
                Self::ItemResponse {
                    subscription,
                    ok,
                    value,
                    error,
                }
            }
            OutboundEvent::Feed {
                subscription,
                feed,
                outcome,
            } => {
                let (ok, data, error) = split(outcome);
                Self::FeedResponse {
                    subscription,
                    ok,
                    feed,
                    data,
                    error,
                }
            }
            OutboundEvent::Detached { subscription } => Self::Detached { subscription },
        }
    }
}
