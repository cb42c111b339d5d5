//! Core domain model for the Pulse monitoring engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const CRATE_NAME: &str = "pulse-core";

/// Reachability state of a monitored site. `Pending` exists only between
/// registration and the first engine run; after that every run writes
/// either `Up` or `Down`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SiteStatus {
    Pending,
    Up,
    Down,
}

impl SiteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SiteStatus::Pending => "PENDING",
            SiteStatus::Up => "UP",
            SiteStatus::Down => "DOWN",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "PENDING" => Some(SiteStatus::Pending),
            "UP" => Some(SiteStatus::Up),
            "DOWN" => Some(SiteStatus::Down),
            _ => None,
        }
    }

    pub fn is_down(&self) -> bool {
        matches!(self, SiteStatus::Down)
    }
}

/// One run's sentiment result for a site. Appended to the record's history
/// and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub timestamp: DateTime<Utc>,
    pub sentiment: f64,
    pub posts: Vec<String>,
}

/// Persisted entity for one monitored URL, keyed by `url`.
///
/// `status`, `sentiment_score`, `example_posts`, and `history` are owned by
/// the engine and rewritten as a unit on every run; `url`, `keyword`, and
/// the owner fields are set at registration and left alone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteRecord {
    pub url: String,
    pub keyword: String,
    pub owner_id: String,
    pub owner_email: Option<String>,
    pub status: SiteStatus,
    pub sentiment_score: f64,
    pub example_posts: Vec<String>,
    pub history: Vec<Observation>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SiteRecord {
    /// A freshly registered record, before any engine run has touched it.
    pub fn new(
        url: impl Into<String>,
        keyword: impl Into<String>,
        owner: &Requester,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            url: url.into(),
            keyword: keyword.into(),
            owner_id: owner.user_id.clone(),
            owner_email: owner.email.clone(),
            status: SiteStatus::Pending,
            sentiment_score: 0.0,
            example_posts: Vec::new(),
            history: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Authenticated identity attached to user-facing operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requester {
    pub user_id: String,
    pub email: Option<String>,
}

/// What kicked off an engine run, decoded once at the boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Trigger {
    Scheduled,
    OnDemand { url: String, requester: Requester },
}

/// Terminal result of one engine run, handed back to whichever trigger
/// mechanism invoked it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RunOutcome {
    SweepComplete {
        checked: usize,
        alerted: usize,
        failed: usize,
    },
    CheckComplete {
        url: String,
        status: SiteStatus,
        sentiment_score: f64,
    },
    RecordNotFound {
        url: String,
    },
}
