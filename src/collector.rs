//! The event collector: public tracking API over session, consent,
//! queues, and delivery.
//!
//! One `Collector` is constructed per host page context and passed by
//! reference to the host's event listeners. Nothing in here blocks the
//! host or surfaces errors to it: delivery is fire-and-forget, storage
//! failures degrade to in-memory state, and malformed tracking calls are
//! logged and skipped.

use crate::config::CollectorConfig;
use crate::consent::{Consent, ConsentGate};
use crate::events::{timestamp, HeatmapClick, PageContext, QueuedEvent, TrackedElement};
use crate::queue::{BatchQueue, FlushSink};
use crate::session::SessionManager;
use crate::stats::{CollectorStats, StatsSnapshot};
use crate::storage::{FileStorage, Storage};
use crate::transport::{DeliveryReport, Dispatcher, HttpTransport, Transport};
use crossbeam_channel::Receiver;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;

/// Consent-aware analytics collector.
pub struct Collector {
    config: CollectorConfig,
    session: Arc<SessionManager>,
    consent: Arc<ConsentGate>,
    dispatcher: Arc<Dispatcher>,
    /// Generic events raised before consent resolved
    pending: BatchQueue,
    /// Heatmap click samples, always batched
    heatmap: BatchQueue,
    stats: Arc<CollectorStats>,
    reports: Receiver<DeliveryReport>,
    started: Instant,
}

impl Collector {
    /// Create a collector with file-backed state and HTTP delivery.
    pub fn new(config: CollectorConfig) -> Self {
        if let Err(e) = config.ensure_directories() {
            tracing::warn!("Could not create state directory: {e}");
        }
        let storage: Arc<dyn Storage> = Arc::new(FileStorage::open(config.state_path()));
        Self::with_parts(config, storage, Arc::new(HttpTransport::new()))
    }

    /// Create a collector over explicit storage and transport.
    ///
    /// The seam tests use to inject in-memory storage and a recording
    /// transport; hosts with their own persistence can use it too.
    pub fn with_parts(
        config: CollectorConfig,
        storage: Arc<dyn Storage>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let stats = Arc::new(CollectorStats::new());
        let session = Arc::new(SessionManager::new(
            Arc::clone(&storage),
            config.session_timeout,
        ));
        let consent = Arc::new(ConsentGate::new(
            Arc::clone(&storage),
            config.consent_required,
        ));
        let (dispatcher, reports) = Dispatcher::new(
            config.api_url.clone(),
            transport,
            Arc::clone(&consent),
            Arc::clone(&stats),
        );

        // Pre-consent events target heterogeneous endpoints, so the batch
        // is delivered one request per item.
        let pending_sink: FlushSink = {
            let dispatcher = Arc::clone(&dispatcher);
            let stats = Arc::clone(&stats);
            Arc::new(move |items: Vec<QueuedEvent>| {
                stats.record_batch_flushed();
                for item in items {
                    dispatcher.dispatch(&item.endpoint, item.payload);
                }
            })
        };
        let pending = BatchQueue::new(
            "events",
            config.batch_size,
            config.batch_flush_interval,
            pending_sink,
        );

        // Heatmap samples share a wire envelope, so the whole batch goes
        // out as one request.
        let heatmap_sink: FlushSink = {
            let dispatcher = Arc::clone(&dispatcher);
            let session = Arc::clone(&session);
            let stats = Arc::clone(&stats);
            Arc::new(move |items: Vec<QueuedEvent>| {
                stats.record_batch_flushed();
                let clicks: Vec<Value> = items.into_iter().map(|item| item.payload).collect();
                dispatcher.dispatch(
                    "/track/heatmap",
                    json!({
                        "session_id": session.session_id(),
                        "clicks": clicks,
                    }),
                );
            })
        };
        let heatmap = BatchQueue::new(
            "heatmap",
            config.heatmap_batch_size,
            config.heatmap_flush_interval,
            heatmap_sink,
        );

        Self {
            config,
            session,
            consent,
            dispatcher,
            pending,
            heatmap,
            stats,
            reports,
            started: Instant::now(),
        }
    }

    /// Session id for this client, minting one if needed.
    pub fn session_id(&self) -> String {
        self.session.session_id()
    }

    /// Current tri-state consent.
    pub fn consent(&self) -> Consent {
        self.consent.status()
    }

    /// Record an explicit consent answer.
    ///
    /// Persists the flag, notifies the endpoint fire-and-forget, and on
    /// the transition into granted releases everything queued; a decline
    /// permanently discards the queues without sending. Events that were
    /// already sent stay sent.
    pub fn set_consent(&self, granted: bool) {
        let previous = self.consent.status();
        self.consent.record(granted);

        self.dispatcher.dispatch(
            "/track/consent",
            json!({ "session_id": self.session.session_id() }),
        );

        if granted {
            if previous != Consent::Granted {
                self.pending.flush();
                self.heatmap.flush();
            }
        } else {
            let dropped = self.pending.discard() + self.heatmap.discard();
            if dropped > 0 {
                self.stats.record_discarded(dropped as u64);
                tracing::debug!(dropped, "consent declined, queued events discarded");
            }
        }
    }

    /// Track a page view: initial load or tab refocus.
    pub fn track_page_visit(&self, page: &PageContext) {
        if !self.config.track_visits {
            return;
        }
        self.session.touch();
        self.stats.record_visit();

        let payload = json!({
            "session_id": self.session.session_id(),
            "page_url": page.page_url,
            "referrer": page.referrer,
            "timestamp": timestamp(),
            "screen_width": page.screen_width,
            "screen_height": page.screen_height,
            "viewport_width": page.viewport_width,
            "viewport_height": page.viewport_height,
        });
        self.gate_dispatch("/track/visit", payload);
    }

    /// Track a single-page-app navigation transition.
    pub fn track_navigation(&self, page: &PageContext) {
        self.track_page_visit(page);
    }

    /// React to a visibility change: refocus counts as a visit, losing
    /// visibility forces the heatmap batch out.
    pub fn on_visibility_change(&self, page: &PageContext, visible: bool) {
        if visible {
            self.track_page_visit(page);
        } else {
            self.session.touch();
            self.heatmap.flush();
        }
    }

    /// Track a click on a tagged element.
    ///
    /// Elements without a tracking id are skipped with a warning; the
    /// display label falls back from explicit label to text content to
    /// accessibility label.
    pub fn track_click(&self, page: &PageContext, element: &TrackedElement) {
        if !self.config.track_clicks {
            return;
        }
        self.session.touch();

        let Some(button_id) = element.track_id.as_deref() else {
            tracing::warn!("Element missing tracking id, click not recorded");
            return;
        };
        self.stats.record_click();

        let payload = json!({
            "session_id": self.session.session_id(),
            "button_id": button_id,
            "button_text": element.resolved_label(),
            "page_url": page.page_url,
            "timestamp": timestamp(),
        });
        self.gate_dispatch("/track/click", payload);
    }

    /// Track a free-form named event.
    ///
    /// Delivered on the click endpoint as `custom_<name>`, the wire
    /// convention the collection endpoint already understands.
    pub fn track_event(&self, page: &PageContext, name: &str, data: Value) {
        self.session.touch();
        self.stats.record_custom_event();

        let payload = json!({
            "session_id": self.session.session_id(),
            "button_id": format!("custom_{name}"),
            "button_text": data.to_string(),
            "page_url": page.page_url,
            "timestamp": timestamp(),
        });
        self.gate_dispatch("/track/click", payload);
    }

    /// Track a conversion funnel milestone.
    ///
    /// Also advances the local funnel step counter, which is bookkeeping
    /// only and never transmitted.
    pub fn track_conversion(&self, page: &PageContext, name: &str, data: Value) {
        self.session.touch();
        let step = self.stats.next_conversion_step();
        tracing::debug!(step, event = name, "conversion milestone");

        let payload = json!({
            "session_id": self.session.session_id(),
            "event_name": name,
            "page_url": page.page_url,
            "event_data": data,
            "timestamp": timestamp(),
        });
        self.gate_dispatch("/track/conversion", payload);
    }

    /// Record a heatmap click sample.
    ///
    /// Samples are always batched; they ride the heatmap queue whatever
    /// the consent state and the truthful flag is stamped at flush time.
    /// After an explicit decline nothing is recorded at all.
    pub fn track_heatmap_click(&self, click: HeatmapClick) {
        if self.config.consent_required && self.consent.status() == Consent::Declined {
            return;
        }
        self.session.touch();
        self.stats.record_heatmap_click();

        let payload = json!({
            "page_url": click.page_url,
            "x": click.x,
            "y": click.y,
            "viewport_width": click.viewport_width,
            "viewport_height": click.viewport_height,
            "element_selector": click.element_selector,
            "element_text": click.element_text,
        });
        self.heatmap.enqueue(QueuedEvent::new("/track/heatmap", payload));
    }

    /// Report the end of the page lifetime.
    ///
    /// Flushes both queues, then delivers the exit report over the
    /// blocking teardown path so it survives the host going away. Call
    /// from a shutdown hook or plain thread, off the async runtime. With
    /// consent unresolved or declined, queued events die here unsent.
    pub fn track_page_exit(&self, page: &PageContext) {
        self.session.touch();

        if !self.consent.is_granted() {
            let dropped = self.pending.discard() + self.heatmap.discard();
            if dropped > 0 {
                self.stats.record_discarded(dropped as u64);
            }
            return;
        }

        self.pending.flush();
        self.heatmap.flush();

        let payload = json!({
            "session_id": self.session.session_id(),
            "page_url": page.page_url,
            "time_on_page": self.started.elapsed().as_secs(),
        });
        self.dispatcher.dispatch_final("/track/page-exit", payload);
    }

    /// Force both queues out, regardless of timers and thresholds.
    pub fn flush(&self) {
        self.pending.flush();
        self.heatmap.flush();
    }

    /// Number of events currently held in the queues.
    pub fn queued_events(&self) -> usize {
        self.pending.len() + self.heatmap.len()
    }

    /// Snapshot of the local statistics counters.
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Human-readable statistics summary.
    pub fn stats_summary(&self) -> String {
        self.stats.summary()
    }

    /// Receiver of delivery reports.
    ///
    /// The collector never reads this itself; observers (tests, the CLI)
    /// may drain it to learn delivery outcomes.
    pub fn delivery_reports(&self) -> &Receiver<DeliveryReport> {
        &self.reports
    }

    /// Route a payload by consent state: dispatch when granted, hold in
    /// the pending queue while unanswered, drop after a decline.
    fn gate_dispatch(&self, endpoint: &str, payload: Value) {
        if self.consent.is_granted() {
            self.dispatcher.dispatch(endpoint, payload);
            return;
        }

        match self.consent.status() {
            Consent::Declined => {
                tracing::debug!(endpoint, "consent declined, event dropped");
            }
            _ => {
                self.stats.record_queued();
                self.pending.enqueue(QueuedEvent::new(endpoint, payload));
            }
        }
    }
}
