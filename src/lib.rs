//! FinTrack Collector - consent-aware analytics event collection.
//!
//! This library embeds in a host application (webview shell, kiosk, or
//! instrumented desktop app) and owns the engineering side of usage
//! analytics: session identity, consent gating, batched queues, and
//! best-effort delivery to a collection endpoint.
//!
//! # Consent Guarantees
//!
//! - **Truthful flags**: every payload carries the consent state as it is
//!   at send time, not as it was when the event occurred
//! - **Declines stick**: declining consent discards everything queued,
//!   without sending
//! - **Never in the way**: delivery failures, storage problems, and bad
//!   tracking calls degrade silently instead of breaking the host
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     FinTrack Collector                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐       │
//! │  │  track_*()  │──▶│ ConsentGate │──▶│ Dispatcher  │──▶ HTTP│
//! │  │  (host UI)  │   │  (tri-state)│   │ (fire&forget)│      │
//! │  └─────────────┘   └──────┬──────┘   └─────────────┘       │
//! │         │                 │ unset            ▲              │
//! │         ▼                 ▼                  │ flush        │
//! │  ┌─────────────┐   ┌─────────────┐   ┌──────┴──────┐       │
//! │  │   Session   │   │   pending   │   │   heatmap   │       │
//! │  │  (sliding)  │   │ BatchQueue  │   │ BatchQueue  │       │
//! │  └─────────────┘   └─────────────┘   └─────────────┘       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use fintrack_collector::{Collector, CollectorConfig, PageContext};
//!
//! let collector = Collector::new(CollectorConfig::default());
//!
//! // The host's listeners feed page-derived values in.
//! let page = PageContext::new("https://example.com/")
//!     .with_screen(1920, 1080)
//!     .with_viewport(1280, 720);
//! collector.track_page_visit(&page);
//! ```

pub mod collector;
pub mod config;
pub mod consent;
pub mod events;
pub mod queue;
pub mod session;
pub mod stats;
pub mod storage;
pub mod transport;

// Re-export key types at crate root for convenience
pub use collector::Collector;
pub use config::{CollectorConfig, ConfigError};
pub use consent::{Consent, ConsentGate};
pub use events::{element_selector, HeatmapClick, PageContext, QueuedEvent, TrackedElement};
pub use queue::{BatchQueue, FlushSink};
pub use session::SessionManager;
pub use stats::{CollectorStats, StatsSnapshot};
pub use storage::{FileStorage, MemoryStorage, Storage};
pub use transport::{DeliveryReport, Dispatcher, HttpTransport, Transport, TransportError};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Data practices declaration that can be displayed to users.
pub const DATA_PRACTICES: &str = r#"
╔══════════════════════════════════════════════════════════════════╗
║            FINTRACK COLLECTOR - DATA PRACTICES NOTICE            ║
╠══════════════════════════════════════════════════════════════════╣
║                                                                  ║
║  This collector records product usage for analytics.             ║
║                                                                  ║
║  ✓ WHAT IS RECORDED (after consent):                             ║
║    • Page visits (URL, referrer, screen metrics)                 ║
║    • Clicks on explicitly tagged elements                        ║
║    • Named milestone events and click-position samples           ║
║                                                                  ║
║  ✗ WHAT IS NEVER RECORDED:                                       ║
║    • Form contents, keystrokes, or passwords                     ║
║    • Anything from untagged elements                             ║
║    • Activity after consent is declined                          ║
║                                                                  ║
║  A random session identifier groups activity; it expires after   ║
║  30 minutes of inactivity and maps to no account or device id.   ║
║                                                                  ║
║  Every transmitted payload carries the consent state as it is    ║
║  at the moment of sending.                                       ║
║                                                                  ║
╚══════════════════════════════════════════════════════════════════╝
"#;
