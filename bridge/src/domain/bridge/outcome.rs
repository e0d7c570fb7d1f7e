use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::path::PathError;
use super::request::{DeliveryMode, Request, SubscriptionId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    SourceUnavailable,
    InvalidPath,
    Timeout,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SourceUnavailable => f.write_str("source_unavailable"),
            Self::InvalidPath => f.write_str("invalid_path"),
            Self::Timeout => f.write_str("timeout"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct Failure {
    pub kind: FailureKind,
    pub message: String,
}

impl Failure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn timeout(after: Duration) -> Self {
        Self::new(
            FailureKind::Timeout,
            format!("no value within {} ms", after.as_millis()),
        )
    }
}

impl From<PathError> for Failure {
    fn from(err: PathError) -> Self {
        Self::new(FailureKind::InvalidPath, err.to_string())
    }
}

/// Result of a single delivery: the decoded value, or why there is none.
pub type Outcome = Result<Value, Failure>;

/// Everything the bridge pushes onto a session's outbound channel.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundEvent {
    Subscribed {
        subscription: SubscriptionId,
        request: Request,
        mode: DeliveryMode,
    },
    Item {
        subscription: SubscriptionId,
        outcome: Outcome,
    },
    Feed {
        subscription: SubscriptionId,
        feed: String,
        outcome: Outcome,
    },
    /// The source ended a continuous subscription on its own.
    Detached { subscription: SubscriptionId },
}

impl OutboundEvent {
    pub fn subscription(&self) -> SubscriptionId {
        match self {
            Self::Subscribed { subscription, .. }
            | Self::Item { subscription, .. }
            | Self::Feed { subscription, .. }
            | Self::Detached { subscription } => *subscription,
        }
    }

    /// Wraps an outcome in the response variant matching `request`.
    pub fn response(subscription: SubscriptionId, request: &Request, outcome: Outcome) -> Self {
        match request {
            Request::Item { .. } => Self::Item {
                subscription,
                outcome,
            },
            Request::Feed { name } => Self::Feed {
                subscription,
                feed: name.clone(),
                outcome,
            },
        }
    }

    pub fn outcome(&self) -> Option<&Outcome> {
        match self {
            Self::Item { outcome, .. } | Self::Feed { outcome, .. } => Some(outcome),
            _ => None,
        }
    }
}
