//! Site Monitor Binary

use chrono::{NaiveDateTime, Utc};
use clap::{Parser, Subcommand};
use site_monitor::aggregate::{last_down_label, time_ago};
use site_monitor::{
    AggregateViewBuilder, Config, DashboardView, DetailState, Headline, HttpMonitorApi, MonitorError,
    RefreshScheduler, Result, SiteDetailController, StatusFetcher, ViewStore,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "site-monitor", version, about = "Website availability dashboard client")]
struct Cli {
    /// Base URL of the monitoring backend
    #[arg(long, env = "MONITOR_API_BASE_URL", global = true)]
    base_url: Option<String>,

    /// Seconds between poll cycles
    #[arg(long, env = "REFRESH_INTERVAL_SECONDS", global = true)]
    interval: Option<u64>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Poll the roster periodically and print the dashboard after each cycle
    Watch {
        /// Exit after this many completed cycles
        #[arg(long)]
        cycles: Option<u64>,
    },
    /// Show status and outage history for one site
    Lookup { site: String },
    /// Report an issue with one site
    Report { site: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    initialize_tracing();

    let cli = Cli::parse();

    info!("Starting Site Monitor v{}", env!("CARGO_PKG_VERSION"));

    let mut config = Config::from_env()?;
    if let Some(base_url) = cli.base_url {
        config.api_base_url = base_url.trim_end_matches('/').to_string();
    }
    if let Some(seconds) = cli.interval {
        config.refresh_interval = Duration::from_secs(seconds);
    }

    if let Err(e) = config.validate() {
        error!("Configuration validation failed: {}", e);
        std::process::exit(1);
    }

    info!(
        "Monitor configuration - Backend: {}, Sites: {}, Interval: {}s",
        config.api_base_url,
        config.roster.len(),
        config.refresh_interval.as_secs()
    );

    let api = Arc::new(HttpMonitorApi::from_config(&config)?);
    let fetcher = StatusFetcher::new(api);

    let outcome = match cli.command.unwrap_or(Command::Watch { cycles: None }) {
        Command::Watch { cycles } => watch(&config, fetcher, cycles).await,
        Command::Lookup { site } => lookup(&config, fetcher, &site).await,
        Command::Report { site } => report(fetcher, &site).await,
    };

    if let Err(e) = outcome {
        error!("Site monitor failed: {}", e);
        std::process::exit(1);
    }

    Ok(())
}

async fn watch(config: &Config, fetcher: StatusFetcher, cycles: Option<u64>) -> Result<()> {
    let scheduler = RefreshScheduler::new(
        fetcher,
        AggregateViewBuilder::new(config.recent_display_limit, config.reported_display_limit),
        ViewStore::new(),
        config.parsed_roster()?,
        config.refresh_interval,
    )?;

    let handle = scheduler.start();
    let mut views = handle.subscribe();
    info!("Watching roster (session {})", handle.session_id());

    loop {
        tokio::select! {
            changed = views.changed() => {
                if changed.is_err() {
                    break;
                }
                let latest = views.borrow_and_update().clone();
                if let Some(view) = latest {
                    render_view(&view, backend_now(config));
                }
                if cycles.is_some_and(|limit| handle.cycles_completed() >= limit) {
                    break;
                }
            }
            signal = tokio::signal::ctrl_c() => {
                signal.map_err(|e| MonitorError::Other(format!("Failed to wait for shutdown signal: {}", e)))?;
                info!("Received shutdown signal");
                break;
            }
        }
    }

    handle.shutdown().await;
    handle.join().await;
    Ok(())
}

async fn lookup(config: &Config, fetcher: StatusFetcher, site: &str) -> Result<()> {
    let controller = SiteDetailController::new(fetcher);

    match controller.lookup_input(site).await? {
        DetailState::Loaded(detail) => {
            let now = backend_now(config);
            let status = &detail.status;

            println!("{}", detail.site);
            println!("  status:        {}", if status.is_down { "DOWN" } else { "UP" });
            println!("  response time: {:.0} ms", status.response_time);
            println!("  last checked:  {}", time_ago(status.latest_check(), now));
            println!("  last down:     {}", last_down_label(&status.last_down, now));
            if let Some(fastest) = status.min_response_time() {
                println!("  fastest check: {:.0} ms", fastest);
            }
            for point in status.recent_history(5) {
                println!("    {}  {:.0} ms", point.last_checked.format("%d %B %H:%M"), point.response_time);
            }

            println!("  reports (24h): {}", detail.outages.total_reports());
            if let Some(peak) = detail.outages.peak() {
                println!(
                    "  peak window:   {} ({} reports)",
                    peak.bucket_start.format("%H:%M"),
                    peak.report_count
                );
            }
            Ok(())
        }
        DetailState::Error { reason, .. } => Err(MonitorError::Other(reason)),
        other => Err(MonitorError::Other(format!("unexpected lookup state: {:?}", other))),
    }
}

async fn report(fetcher: StatusFetcher, site: &str) -> Result<()> {
    let controller = SiteDetailController::new(fetcher);

    // the report targets the looked-up site even when its status is unknown
    controller.lookup_input(site).await?;
    controller.open_report_dialog().await;

    let receipt = controller
        .submit_report()
        .await
        .map_err(|e| MonitorError::Other(e.user_message()))?;

    println!("{}", receipt.message);
    Ok(())
}

fn render_view(view: &DashboardView, now: NaiveDateTime) {
    let aggregates = &view.aggregates;

    match aggregates.headline {
        Headline::NoData => println!("[cycle {}] no status data yet", view.roster.cycle),
        Headline::AllHealthy => println!("[cycle {}] all monitored sites are up", view.roster.cycle),
        Headline::SitesDown(count) => println!("[cycle {}] {} site(s) down", view.roster.cycle, count),
    }

    for down in &aggregates.down_sites {
        println!("  DOWN {} (checked {})", down.site, time_ago(down.last_checked, now));
    }

    if !aggregates.recently_checked.is_empty() {
        let sites: Vec<&str> = aggregates.recently_checked.iter().map(|site| site.as_str()).collect();
        println!("  latest checked: {}", sites.join(", "));
    }

    if !aggregates.last_reported.is_empty() {
        let sites: Vec<&str> = aggregates.last_reported.iter().map(|entry| entry.site.as_str()).collect();
        println!("  last reported:  {}", sites.join(", "));
    }

    for (site, entry) in view.roster.iter() {
        if let Some(err) = entry.outcome.failure() {
            println!("  UNKNOWN {} ({})", site, err);
        } else if view.roster.is_stale(site) {
            println!("  STALE {} (last refreshed in cycle {})", site, entry.refreshed_in);
        }
    }
}

/// Current time on the backend's clock, which stamps naive local times.
fn backend_now(config: &Config) -> NaiveDateTime {
    Utc::now().naive_utc() + chrono::Duration::hours(i64::from(config.backend_utc_offset_hours))
}

/// Initialize structured logging
fn initialize_tracing() {
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .json();

    let filter_layer = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(&log_level))
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();
}
