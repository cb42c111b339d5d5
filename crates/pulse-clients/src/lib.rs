//! External API clients: uptime probing, social post search, notifications.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use pulse_core::SiteStatus;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

pub const CRATE_NAME: &str = "pulse-clients";

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("network error: {0}")]
    Network(String),
    #[error("api error (status {status}): {message}")]
    Api { status: u16, message: String },
    #[error("parse error: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        ClientError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::Parse(err.to_string())
    }
}

/// Reachability probe: one bounded attempt, UP/DOWN, nothing else.
#[async_trait]
pub trait Probe: Send + Sync {
    async fn probe(&self, url: &str) -> SiteStatus;
}

/// Keyword search over recent social posts. Returns post texts,
/// most-recent-first, reposts excluded.
#[async_trait]
pub trait SocialSearch: Send + Sync {
    async fn search(&self, keyword: &str, max_results: u32) -> Result<Vec<String>, ClientError>;
}

/// Notification transport boundary: fire-and-forget subject/body sends.
#[async_trait]
pub trait Notify: Send + Sync {
    async fn send(&self, subject: &str, body: &str) -> Result<(), ClientError>;
}

/// Single-attempt HTTP reachability check. Any transport failure reads as
/// DOWN rather than an error; retry policy belongs to the next sweep.
#[derive(Debug, Clone)]
pub struct UptimeProber {
    client: reqwest::Client,
}

impl UptimeProber {
    pub fn new(timeout: Duration, user_agent: &str) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent.to_string())
            .build()
            .context("building probe http client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Probe for UptimeProber {
    async fn probe(&self, url: &str) -> SiteStatus {
        match self.client.get(url).send().await {
            Ok(resp) if resp.status().is_success() => SiteStatus::Up,
            Ok(resp) => {
                debug!(url, status = resp.status().as_u16(), "probe returned non-2xx");
                SiteStatus::Down
            }
            Err(err) => {
                debug!(url, error = %err, "probe transport failure");
                SiteStatus::Down
            }
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    #[serde(rename = "maxItems")]
    max_items: u32,
    #[serde(rename = "includeReposts")]
    include_reposts: bool,
}

#[derive(Debug, Clone, Deserialize)]
struct SearchResponse {
    items: Vec<SearchItem>,
}

/// A single post from the search API dataset.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchItem {
    pub text: Option<String>,
    #[serde(rename = "full_text")]
    pub full_text: Option<String>,
    #[serde(rename = "isRepost")]
    pub is_repost: Option<bool>,
}

impl SearchItem {
    /// Returns whichever text field is populated, preferring `full_text`.
    pub fn content(&self) -> Option<&str> {
        self.full_text.as_deref().or(self.text.as_deref())
    }
}

/// Bearer-token client for the social search API. The query asks the
/// server to exclude reposts; `batch_texts` drops any that slip through.
pub struct SocialSearchApi {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl SocialSearchApi {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            token: token.into(),
        }
    }
}

/// Flatten API items into at most `max` post texts, skipping reposts and
/// textless entries while preserving the API's most-recent-first order.
pub fn batch_texts(items: Vec<SearchItem>, max: usize) -> Vec<String> {
    items
        .into_iter()
        .filter(|item| !item.is_repost.unwrap_or(false))
        .filter_map(|item| item.content().map(str::to_string))
        .take(max)
        .collect()
}

#[async_trait]
impl SocialSearch for SocialSearchApi {
    async fn search(&self, keyword: &str, max_results: u32) -> Result<Vec<String>, ClientError> {
        let input = SearchRequest {
            query: keyword,
            max_items: max_results,
            include_reposts: false,
        };

        let url = format!("{}/search/posts", self.base_url);
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(&input)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ClientError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let parsed: SearchResponse = resp.json().await?;
        let texts = batch_texts(parsed.items, max_results as usize);
        debug!(keyword, count = texts.len(), "fetched social posts");
        Ok(texts)
    }
}

/// Notification transport: one JSON POST per send to a configured webhook.
pub struct WebhookNotifier {
    client: reqwest::Client,
    webhook_url: String,
}

impl WebhookNotifier {
    pub fn new(webhook_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            webhook_url: webhook_url.into(),
        }
    }
}

#[async_trait]
impl Notify for WebhookNotifier {
    async fn send(&self, subject: &str, body: &str) -> Result<(), ClientError> {
        let resp = self
            .client
            .post(&self.webhook_url)
            .json(&serde_json::json!({ "subject": subject, "message": body }))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "notification webhook rejected send");
            return Err(ClientError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(())
    }
}
