//! FinTrack Collector CLI
//!
//! Exercises a collection endpoint from the command line: sends single
//! events, manages the persisted consent flag, or simulates a short
//! browsing session against the configured endpoint.

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use fintrack_collector::{
    element_selector, Collector, CollectorConfig, Consent, HeatmapClick, PageContext,
    TrackedElement, DATA_PRACTICES, VERSION,
};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "fintrack")]
#[command(author = "FinTrack Analytics")]
#[command(version = VERSION)]
#[command(about = "Consent-aware analytics event collector", long_about = None)]
struct Cli {
    /// Collection endpoint base URL (overrides the config file)
    #[arg(long, global = true)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send a page visit event
    Visit {
        /// Page URL to report
        #[arg(long)]
        url: String,

        /// Referrer URL
        #[arg(long, default_value = "")]
        referrer: String,

        /// Screen size as WIDTHxHEIGHT
        #[arg(long, default_value = "1920x1080")]
        screen: String,

        /// Viewport size as WIDTHxHEIGHT
        #[arg(long, default_value = "1280x720")]
        viewport: String,
    },

    /// Send a click event for a tagged element
    Click {
        /// Tracking identifier of the element
        #[arg(long)]
        id: String,

        /// Element label
        #[arg(long)]
        label: Option<String>,

        /// Page URL the click happened on
        #[arg(long)]
        url: String,
    },

    /// Send a free-form named event
    Event {
        /// Event name
        #[arg(long)]
        name: String,

        /// Event data as JSON
        #[arg(long, default_value = "{}")]
        data: String,

        /// Page URL
        #[arg(long)]
        url: String,
    },

    /// Send a conversion funnel milestone
    Conversion {
        /// Milestone name
        #[arg(long)]
        name: String,

        /// Event data as JSON
        #[arg(long, default_value = "{}")]
        data: String,

        /// Page URL
        #[arg(long)]
        url: String,
    },

    /// Record a consent answer and notify the endpoint
    Consent {
        /// The answer to record
        action: ConsentAction,
    },

    /// Print the current session id
    Session,

    /// Display the data practices notice
    Privacy,

    /// Show configuration
    Config,

    /// Simulate a short browsing session (Ctrl+C sends the exit report)
    Demo {
        /// Page URL for the simulated session
        #[arg(long, default_value = "https://example.com/")]
        url: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ConsentAction {
    Grant,
    Revoke,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let mut config = CollectorConfig::load().unwrap_or_default();
    if let Some(api_url) = cli.api_url {
        config.api_url = api_url;
    }

    match cli.command {
        Commands::Visit {
            url,
            referrer,
            screen,
            viewport,
        } => cmd_visit(config, &url, &referrer, &screen, &viewport).await,
        Commands::Click { id, label, url } => cmd_click(config, &id, label, &url).await,
        Commands::Event { name, data, url } => cmd_event(config, &name, &data, &url, false).await,
        Commands::Conversion { name, data, url } => {
            cmd_event(config, &name, &data, &url, true).await
        }
        Commands::Consent { action } => cmd_consent(config, action).await,
        Commands::Session => cmd_session(config),
        Commands::Privacy => {
            println!("{DATA_PRACTICES}");
            Ok(())
        }
        Commands::Config => cmd_config(config),
        Commands::Demo { url } => cmd_demo(config, url).await,
    }
}

fn parse_dimensions(value: &str) -> anyhow::Result<(u32, u32)> {
    let (width, height) = value
        .split_once('x')
        .with_context(|| format!("expected WIDTHxHEIGHT, got '{value}'"))?;
    Ok((width.parse()?, height.parse()?))
}

async fn cmd_visit(
    config: CollectorConfig,
    url: &str,
    referrer: &str,
    screen: &str,
    viewport: &str,
) -> anyhow::Result<()> {
    let (screen_w, screen_h) = parse_dimensions(screen)?;
    let (viewport_w, viewport_h) = parse_dimensions(viewport)?;

    let collector = Collector::new(config);
    let page = PageContext::new(url)
        .with_referrer(referrer)
        .with_screen(screen_w, screen_h)
        .with_viewport(viewport_w, viewport_h);

    collector.track_page_visit(&page);
    report_deliveries(&collector, 1).await;
    Ok(())
}

async fn cmd_click(
    config: CollectorConfig,
    id: &str,
    label: Option<String>,
    url: &str,
) -> anyhow::Result<()> {
    let collector = Collector::new(config);
    let page = PageContext::new(url);
    let element = TrackedElement {
        track_id: Some(id.to_string()),
        label,
        ..TrackedElement::default()
    };

    collector.track_click(&page, &element);
    report_deliveries(&collector, 1).await;
    Ok(())
}

async fn cmd_event(
    config: CollectorConfig,
    name: &str,
    data: &str,
    url: &str,
    conversion: bool,
) -> anyhow::Result<()> {
    let data: Value = serde_json::from_str(data).context("--data must be valid JSON")?;

    let collector = Collector::new(config);
    let page = PageContext::new(url);
    if conversion {
        collector.track_conversion(&page, name, data);
    } else {
        collector.track_event(&page, name, data);
    }
    report_deliveries(&collector, 1).await;
    Ok(())
}

async fn cmd_consent(config: CollectorConfig, action: ConsentAction) -> anyhow::Result<()> {
    let collector = Collector::new(config);
    let granted = matches!(action, ConsentAction::Grant);

    collector.set_consent(granted);
    println!(
        "Consent {} for session {}",
        if granted { "granted" } else { "revoked" },
        collector.session_id()
    );
    report_deliveries(&collector, 1).await;
    Ok(())
}

fn cmd_session(config: CollectorConfig) -> anyhow::Result<()> {
    let collector = Collector::new(config);
    println!("Session: {}", collector.session_id());
    println!(
        "Consent: {}",
        match collector.consent() {
            Consent::Granted => "granted",
            Consent::Declined => "declined",
            Consent::Unset => "not answered",
        }
    );
    Ok(())
}

fn cmd_config(config: CollectorConfig) -> anyhow::Result<()> {
    println!("Configuration file: {:?}", CollectorConfig::config_path());
    println!();
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

async fn cmd_demo(config: CollectorConfig, url: String) -> anyhow::Result<()> {
    println!("FinTrack Collector v{VERSION}");
    println!("Simulating a browsing session against {}", config.api_url);
    println!();

    let collector = Arc::new(Collector::new(config));
    println!("Session: {}", collector.session_id());

    collector.set_consent(true);

    let page = PageContext::new(&url)
        .with_screen(1920, 1080)
        .with_viewport(1280, 720);
    collector.track_page_visit(&page);

    collector.track_click(
        &page,
        &TrackedElement {
            track_id: Some("cta-demo".to_string()),
            label: Some("Demo CTA".to_string()),
            ..TrackedElement::default()
        },
    );

    let selector = element_selector("button", Some("cta-demo"), &["primary"]);
    for n in 0..3 {
        collector.track_heatmap_click(HeatmapClick::from_viewport(
            &url,
            200.0 + 40.0 * n as f64,
            300.0,
            0.0,
            0.0,
            1280,
            720,
            selector.as_str(),
            "Demo CTA",
        ));
    }

    // A simulated in-app navigation counts as another visit.
    let pricing = PageContext::new(format!("{url}pricing"))
        .with_referrer(&url)
        .with_screen(1920, 1080)
        .with_viewport(1280, 720);
    collector.track_navigation(&pricing);

    collector.track_conversion(&pricing, "demo_completed", serde_json::json!({ "runs": 1 }));

    println!("Events sent; heatmap batch flushes after the debounce interval.");
    println!("Press Ctrl+C to end the session and send the exit report.");

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })
    .context("failed to install Ctrl+C handler")?;

    while running.load(Ordering::SeqCst) {
        while let Ok(report) = collector.delivery_reports().try_recv() {
            match report.outcome {
                Ok(()) => println!("  delivered {}", report.endpoint),
                Err(e) => println!("  failed {} ({e})", report.endpoint),
            }
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
    }

    // The exit report goes out on the blocking teardown path, which must
    // run off the async runtime.
    println!();
    println!("Sending exit report...");
    let exit_collector = Arc::clone(&collector);
    let exit_page = page.clone();
    let handle = std::thread::spawn(move || exit_collector.track_page_exit(&exit_page));
    if handle.join().is_err() {
        tracing::warn!("exit report thread panicked");
    }

    while let Ok(report) = collector.delivery_reports().try_recv() {
        match report.outcome {
            Ok(()) => println!("  delivered {}", report.endpoint),
            Err(e) => println!("  failed {} ({e})", report.endpoint),
        }
    }

    println!();
    println!("{}", collector.stats_summary());
    Ok(())
}

/// Wait for fire-and-forget deliveries and print their outcomes.
///
/// Allows enough slack for a pre-consent event to ride out the full
/// debounce interval before its flush.
async fn report_deliveries(collector: &Collector, expected: usize) {
    let mut seen = 0;
    for _ in 0..80 {
        while let Ok(report) = collector.delivery_reports().try_recv() {
            seen += 1;
            match report.outcome {
                Ok(()) => println!("delivered {}", report.endpoint),
                Err(e) => println!("failed {} ({e})", report.endpoint),
            }
        }
        if seen >= expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    if seen < expected {
        println!("timed out waiting for delivery confirmation");
    }
}
