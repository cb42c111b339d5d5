//! End-to-end sweep over a mixed work set, through the public engine API.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use pulse_clients::{ClientError, Notify, Probe, SocialSearch};
use pulse_core::{Requester, RunOutcome, SiteRecord, SiteStatus, Trigger};
use pulse_engine::{Engine, EngineOptions};
use pulse_store::{MemoryRecordStore, RecordStore};

struct MapProbe(HashMap<String, SiteStatus>);

#[async_trait]
impl Probe for MapProbe {
    async fn probe(&self, url: &str) -> SiteStatus {
        self.0.get(url).copied().unwrap_or(SiteStatus::Down)
    }
}

struct KeywordSearch;

#[async_trait]
impl SocialSearch for KeywordSearch {
    async fn search(&self, keyword: &str, _max: u32) -> Result<Vec<String>, ClientError> {
        Ok(vec![
            format!("{keyword} works great"),
            format!("{keyword} had an outage yesterday"),
        ])
    }
}

#[derive(Default)]
struct RecordingNotifier {
    subjects: Mutex<Vec<String>>,
}

#[async_trait]
impl Notify for RecordingNotifier {
    async fn send(&self, subject: &str, _body: &str) -> Result<(), ClientError> {
        self.subjects.lock().unwrap().push(subject.to_string());
        Ok(())
    }
}

fn registered(url: &str) -> SiteRecord {
    let owner = Requester {
        user_id: "owner-1".into(),
        email: Some("owner-1@example.com".into()),
    };
    SiteRecord::new(url, "acme", &owner, Utc::now())
}

#[tokio::test]
async fn mixed_sweep_updates_every_record_and_alerts_for_the_down_one() {
    let store = Arc::new(MemoryRecordStore::new());
    store.put(&registered("https://down.example.com")).await.unwrap();
    store.put(&registered("https://up.example.com")).await.unwrap();

    let probes = MapProbe(HashMap::from([
        ("https://up.example.com".to_string(), SiteStatus::Up),
        ("https://down.example.com".to_string(), SiteStatus::Down),
    ]));
    let notifier = Arc::new(RecordingNotifier::default());

    let engine = Engine::new(
        store.clone(),
        Arc::new(probes),
        Arc::new(KeywordSearch),
        notifier.clone(),
        EngineOptions {
            pacing: Duration::from_millis(0),
            ..EngineOptions::default()
        },
    );

    let outcome = engine.run(Trigger::Scheduled).await.unwrap();
    assert_eq!(
        outcome,
        RunOutcome::SweepComplete {
            checked: 2,
            alerted: 1,
            failed: 0
        }
    );

    let down = store.get("https://down.example.com").await.unwrap().unwrap();
    assert_eq!(down.status, SiteStatus::Down);
    assert_eq!(down.history.len(), 1);
    assert_eq!(down.example_posts.len(), 2);

    let up = store.get("https://up.example.com").await.unwrap().unwrap();
    assert_eq!(up.status, SiteStatus::Up);
    assert_eq!(up.sentiment_score, 0.0);

    assert_eq!(
        notifier.subjects.lock().unwrap().as_slice(),
        ["Website Down Alert!".to_string()]
    );
}
