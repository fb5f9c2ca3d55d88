//! End-to-end tests for the collector: session identity, consent gating,
//! queue release/discard, and the page lifecycle against an injected
//! recording transport.

use async_trait::async_trait;
use fintrack_collector::session::SESSION_TIMESTAMP_KEY;
use fintrack_collector::{
    Collector, CollectorConfig, HeatmapClick, MemoryStorage, PageContext, Storage, TrackedElement,
    Transport, TransportError,
};
use serde_json::Value;
use std::sync::{Arc, Mutex};

/// Transport that records calls instead of touching the network.
struct RecordingTransport {
    calls: Mutex<Vec<(String, Value)>>,
}

impl RecordingTransport {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().unwrap().clone()
    }

    fn calls_to(&self, endpoint: &str) -> Vec<Value> {
        self.calls()
            .into_iter()
            .filter(|(url, _)| url.ends_with(endpoint))
            .map(|(_, body)| body)
            .collect()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send(&self, url: &str, body: &Value) -> Result<(), TransportError> {
        self.calls
            .lock()
            .unwrap()
            .push((url.to_string(), body.clone()));
        Ok(())
    }
}

fn test_setup() -> (Collector, Arc<RecordingTransport>, Arc<MemoryStorage>) {
    let transport = RecordingTransport::new();
    let storage = Arc::new(MemoryStorage::new());
    let config = CollectorConfig {
        api_url: "http://collector.test/api".to_string(),
        ..CollectorConfig::default()
    };
    let collector = Collector::with_parts(
        config,
        storage.clone() as Arc<dyn Storage>,
        transport.clone() as Arc<dyn Transport>,
    );
    (collector, transport, storage)
}

/// Let spawned fire-and-forget sends run to completion.
async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

fn assert_uuid_v4_format(id: &str) {
    // xxxxxxxx-xxxx-4xxx-yxxx-xxxxxxxxxxxx
    let chars: Vec<char> = id.chars().collect();
    assert_eq!(chars.len(), 36, "bad length: {id}");
    for index in [8, 13, 18, 23] {
        assert_eq!(chars[index], '-', "bad separator in {id}");
    }
    assert_eq!(chars[14], '4', "not a v4 id: {id}");
    assert!(
        matches!(chars[19], '8' | '9' | 'a' | 'b'),
        "bad variant in {id}"
    );
}

#[tokio::test(start_paused = true)]
async fn test_session_id_format_and_rotation() {
    let (collector, _transport, storage) = test_setup();

    let id = collector.session_id();
    assert_uuid_v4_format(&id);
    assert_eq!(collector.session_id(), id, "stable within the window");

    // Simulate a 31-minute inactivity gap, then a fresh page load.
    let stale = chrono::Utc::now().timestamp_millis() - 31 * 60 * 1000;
    storage.set(SESSION_TIMESTAMP_KEY, &stale.to_string());

    let transport = RecordingTransport::new();
    let reloaded = Collector::with_parts(
        CollectorConfig {
            api_url: "http://collector.test/api".to_string(),
            ..CollectorConfig::default()
        },
        storage as Arc<dyn Storage>,
        transport as Arc<dyn Transport>,
    );

    let rotated = reloaded.session_id();
    assert_ne!(rotated, id, "stale session must rotate");
    assert_uuid_v4_format(&rotated);
}

#[tokio::test(start_paused = true)]
async fn test_unset_consent_queues_and_grant_releases() {
    let (collector, transport, _storage) = test_setup();

    let page = PageContext::new("https://example.com/landing")
        .with_screen(1920, 1080)
        .with_viewport(1280, 720);
    collector.track_page_visit(&page);
    settle().await;

    // Nothing on the wire yet; the visit is held in the pending queue.
    assert!(transport.calls().is_empty());
    assert_eq!(collector.queued_events(), 1);

    collector.set_consent(true);
    settle().await;

    let visits = transport.calls_to("/track/visit");
    assert_eq!(visits.len(), 1, "exactly the queued visit must go out");
    assert_eq!(visits[0]["page_url"], "https://example.com/landing");
    assert_eq!(visits[0]["consent_given"], true);
    assert_eq!(collector.queued_events(), 0);

    // The consent change itself was also reported.
    let consents = transport.calls_to("/track/consent");
    assert_eq!(consents.len(), 1);
    assert_eq!(consents[0]["consent_given"], true);
}

#[tokio::test(start_paused = true)]
async fn test_decline_discards_queue_permanently() {
    let (collector, transport, _storage) = test_setup();

    let page = PageContext::new("https://example.com/");
    collector.track_page_visit(&page);
    collector.track_click(&page, &TrackedElement::with_id("cta1"));
    settle().await;
    assert_eq!(collector.queued_events(), 2);

    collector.set_consent(false);
    settle().await;
    assert_eq!(collector.queued_events(), 0);

    // Later flushes and expired timers produce nothing for the
    // discarded events.
    collector.flush();
    tokio::time::sleep(std::time::Duration::from_secs(30)).await;

    assert!(transport.calls_to("/track/visit").is_empty());
    assert!(transport.calls_to("/track/click").is_empty());
    // Only the consent change reached the endpoint, flagged false.
    let consents = transport.calls_to("/track/consent");
    assert_eq!(consents.len(), 1);
    assert_eq!(consents[0]["consent_given"], false);
    assert_eq!(collector.stats().discarded, 2);
}

#[tokio::test(start_paused = true)]
async fn test_preconsent_debounce_sends_truthful_flag() {
    let (collector, transport, _storage) = test_setup();

    // Three events while consent is unresolved, within the debounce gap.
    let page = PageContext::new("https://example.com/");
    collector.track_page_visit(&page);
    collector.track_click(&page, &TrackedElement::with_id("cta1"));
    collector.track_event(&page, "scrolled", serde_json::json!({ "depth": 80 }));
    settle().await;
    assert!(transport.calls().is_empty());

    // Activity pauses; the pending queue flushes with consent evaluated
    // at send time, which is still "not given".
    tokio::time::sleep(std::time::Duration::from_secs(6)).await;
    settle().await;

    let calls = transport.calls();
    assert_eq!(calls.len(), 3, "one request per queued item");
    for (_, body) in &calls {
        assert_eq!(body["consent_given"], false);
    }
    assert_eq!(collector.queued_events(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_batch_cap_overrides_debounce() {
    let (collector, transport, _storage) = test_setup();

    // Ten queued events hit the generic batch cap and flush at once,
    // without waiting for the 5-second quiet period.
    let page = PageContext::new("https://example.com/");
    for n in 0..10 {
        collector.track_event(&page, "burst", serde_json::json!({ "n": n }));
    }
    settle().await;

    let clicks = transport.calls_to("/track/click");
    assert_eq!(clicks.len(), 10);
    // FIFO within the queue.
    assert_eq!(clicks[0]["button_text"], "{\"n\":0}");
    assert_eq!(clicks[9]["button_text"], "{\"n\":9}");

    // The canceled timer adds nothing later.
    tokio::time::sleep(std::time::Duration::from_secs(10)).await;
    settle().await;
    assert_eq!(transport.calls_to("/track/click").len(), 10);
}

#[tokio::test(start_paused = true)]
async fn test_click_without_id_makes_no_calls() {
    let (collector, transport, _storage) = test_setup();
    collector.set_consent(true);
    settle().await;

    collector.track_click(
        &PageContext::new("https://example.com/"),
        &TrackedElement {
            label: Some("untagged".to_string()),
            ..TrackedElement::default()
        },
    );
    settle().await;

    assert!(transport.calls_to("/track/click").is_empty());
    assert_eq!(collector.queued_events(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_page_lifecycle_end_to_end() {
    let (collector, transport, _storage) = test_setup();
    let session_id = collector.session_id();
    collector.set_consent(true);
    settle().await;

    // Load: first visit carries an empty referrer.
    let page = PageContext::new("https://example.com/")
        .with_screen(1920, 1080)
        .with_viewport(1280, 720);
    collector.track_page_visit(&page);

    // A tagged element with no text falls back to its accessibility label.
    collector.track_click(
        &page,
        &TrackedElement {
            track_id: Some("cta1".to_string()),
            aria_label: Some("Start free trial".to_string()),
            ..TrackedElement::default()
        },
    );

    // And with no label sources at all, the label is "Unknown".
    collector.track_click(&page, &TrackedElement::with_id("cta2"));

    // A couple of heatmap samples ride their own queue.
    collector.track_heatmap_click(HeatmapClick::from_viewport(
        "https://example.com/",
        640.0,
        360.0,
        0.0,
        0.0,
        1280,
        720,
        "button#cta1",
        "",
    ));
    settle().await;

    let visits = transport.calls_to("/track/visit");
    assert_eq!(visits.len(), 1);
    assert_eq!(visits[0]["referrer"], "");
    assert_eq!(visits[0]["session_id"], session_id.as_str());

    let clicks = transport.calls_to("/track/click");
    assert_eq!(clicks.len(), 2);
    assert_eq!(clicks[0]["button_id"], "cta1");
    assert_eq!(clicks[0]["button_text"], "Start free trial");
    assert_eq!(clicks[1]["button_text"], "Unknown");

    // Unload: the exit report runs on the blocking teardown path, off
    // the async runtime, and flushes the heatmap queue on the way out.
    let collector = Arc::new(collector);
    let exit_collector = Arc::clone(&collector);
    let exit_page = page.clone();
    std::thread::spawn(move || exit_collector.track_page_exit(&exit_page))
        .join()
        .expect("exit thread panicked");

    let exits = transport.calls_to("/track/page-exit");
    assert_eq!(exits.len(), 1, "exit report must be delivered exactly once");
    assert_eq!(exits[0]["session_id"], session_id.as_str());
    assert_eq!(exits[0]["page_url"], "https://example.com/");
    // Whole seconds since construction; the test runs in well under one.
    assert_eq!(exits[0]["time_on_page"], 0);
    assert_eq!(exits[0]["consent_given"], true);

    let heatmaps = transport.calls_to("/track/heatmap");
    assert_eq!(heatmaps.len(), 1);
    assert_eq!(heatmaps[0]["clicks"].as_array().unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_exit_with_unresolved_consent_sends_nothing() {
    let (collector, transport, _storage) = test_setup();

    let page = PageContext::new("https://example.com/");
    collector.track_page_visit(&page);
    settle().await;
    assert_eq!(collector.queued_events(), 1);

    let collector = Arc::new(collector);
    let exit_collector = Arc::clone(&collector);
    let exit_page = page.clone();
    std::thread::spawn(move || exit_collector.track_page_exit(&exit_page))
        .join()
        .expect("exit thread panicked");

    // Queued events die with the page; no exit report without consent.
    assert!(transport.calls().is_empty());
    assert_eq!(collector.queued_events(), 0);
}
