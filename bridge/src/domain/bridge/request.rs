use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::path::{PathError, SourcePath};

/// Inbound port event asking for the value behind an item or a feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Item { id: String },
    Feed { name: String },
}

impl Request {
    pub fn item(id: impl Into<String>) -> Self {
        Self::Item { id: id.into() }
    }

    pub fn feed(name: impl Into<String>) -> Self {
        Self::Feed { name: name.into() }
    }

    pub fn kind(&self) -> RequestKind {
        match self {
            Self::Item { .. } => RequestKind::Item,
            Self::Feed { .. } => RequestKind::Feed,
        }
    }

    pub fn path(&self) -> Result<SourcePath, PathError> {
        match self {
            Self::Item { id } => SourcePath::item(id),
            Self::Feed { name } => SourcePath::feed(name),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    Item,
    Feed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMode {
    /// Read the current value once, deliver it and release the subscription.
    Once,
    /// Deliver the current value and every later change until detached.
    Continuous,
}

impl fmt::Display for DeliveryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Once => f.write_str("once"),
            Self::Continuous => f.write_str("continuous"),
        }
    }
}

impl FromStr for DeliveryMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "once" => Ok(Self::Once),
            "continuous" | "stream" | "on" => Ok(Self::Continuous),
            other => anyhow::bail!("unknown delivery mode `{other}`"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SubscriptionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
