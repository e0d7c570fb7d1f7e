use std::env;
use std::time::Duration;

use anyhow::Context;

use crate::application::services::bridge::DeliveryPolicy;
use crate::domain::bridge::DeliveryMode;
use crate::infrastructure::source::firebase::FirebaseConfig;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceBackend {
    Firebase,
    Memory,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub api_port: u16,
    pub frontend_url: Option<String>,
    pub source_backend: SourceBackend,
    pub source_url: String,
    pub source_root: String,
    pub source_seed_file: Option<String>,
    pub source_connect_timeout_ms: u64,
    pub source_reconnect_ms: u64,
    pub source_idle_timeout_ms: u64,
    pub item_delivery: DeliveryMode,
    pub feed_delivery: DeliveryMode,
    /// 0 disables the bound on `Once` reads.
    pub once_timeout_ms: u64,
    pub dedupe_continuous: bool,
    pub is_production: bool,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(get: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let number = |key: &str, default: u64| -> u64 {
            get(key).and_then(|s| s.trim().parse().ok()).unwrap_or(default)
        };
        let flag = |key: &str, default: bool| -> bool {
            match get(key).map(|s| s.trim().to_ascii_lowercase()) {
                Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => true,
                Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => false,
                _ => default,
            }
        };

        let api_port = get("BRIDGE_PORT")
            .and_then(|s| s.parse().ok())
            .unwrap_or(8080);
        let frontend_url = get("FRONTEND_URL").filter(|s| !s.trim().is_empty());
        let source_backend = match get("SOURCE_BACKEND").as_deref().map(str::trim) {
            None | Some("") | Some("firebase") => SourceBackend::Firebase,
            Some("memory") => SourceBackend::Memory,
            Some(other) => anyhow::bail!("SOURCE_BACKEND must be `firebase` or `memory`, got `{other}`"),
        };
        let source_url = get("SOURCE_URL")
            .unwrap_or_else(|| "https://hacker-news.firebaseio.com".into())
            .trim_end_matches('/')
            .to_string();
        let source_root = get("SOURCE_ROOT").unwrap_or_else(|| "v0".into());
        let source_seed_file = get("SOURCE_SEED_FILE").filter(|s| !s.trim().is_empty());
        let item_delivery = match get("ITEM_DELIVERY") {
            Some(v) => v.parse().context("ITEM_DELIVERY")?,
            None => DeliveryMode::Continuous,
        };
        let feed_delivery = match get("FEED_DELIVERY") {
            Some(v) => v.parse().context("FEED_DELIVERY")?,
            None => DeliveryMode::Once,
        };
        let is_production = matches!(
            get("RUST_ENV").as_deref(),
            Some("production") | Some("prod")
        );

        if !source_url.starts_with("http://") && !source_url.starts_with("https://") {
            anyhow::bail!("SOURCE_URL must be an http(s) origin, got `{source_url}`");
        }
        if is_production && frontend_url.is_none() {
            anyhow::bail!(
                "FRONTEND_URL must be set to a full origin in production (e.g., https://app.example.com)"
            );
        }

        Ok(Self {
            api_port,
            frontend_url,
            source_backend,
            source_url,
            source_root,
            source_seed_file,
            source_connect_timeout_ms: number("SOURCE_CONNECT_TIMEOUT_MS", 5_000),
            source_reconnect_ms: number("SOURCE_RECONNECT_MS", 2_000),
            source_idle_timeout_ms: number("SOURCE_IDLE_TIMEOUT_MS", 90_000),
            item_delivery,
            feed_delivery,
            once_timeout_ms: number("ONCE_TIMEOUT_MS", 10_000),
            dedupe_continuous: flag("DEDUPE_CONTINUOUS", true),
            is_production,
        })
    }

    pub fn delivery_policy(&self) -> DeliveryPolicy {
        DeliveryPolicy {
            item: self.item_delivery,
            feed: self.feed_delivery,
            once_timeout: (self.once_timeout_ms > 0)
                .then(|| Duration::from_millis(self.once_timeout_ms)),
        }
    }

    pub fn firebase(&self) -> FirebaseConfig {
        FirebaseConfig {
            base_url: self.source_url.clone(),
            root: self.source_root.clone(),
            connect_timeout: Duration::from_millis(self.source_connect_timeout_ms),
            reconnect_delay: Duration::from_millis(self.source_reconnect_ms),
            idle_timeout: Duration::from_millis(self.source_idle_timeout_ms),
        }
    }
}
