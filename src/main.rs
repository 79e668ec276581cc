//! Sweepwatch - Hellgate sweep detector
//!
//! Two independent timers share the engine state: a fast poll cycle
//! (fetch, dedup, track, announce, purge) and a slow summary cycle.

use std::path::{Path, PathBuf};
use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use dotenv::dotenv;
use parking_lot::Mutex;
use tokio::time::{interval, interval_at, Instant, MissedTickBehavior};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sweepwatch::{
    config::Config,
    delivery::{deliver, DiscordSink, LogSink, MessageSink},
    scrapers::GameInfoClient,
    sweeps::{EquipmentBook, HistoryAggregator, SummaryReporter, SweepPipeline},
};

#[derive(Parser, Debug)]
#[command(name = "sweepwatch")]
#[command(about = "Announces Hellgate clean sweeps from the gameinfo kill feed")]
struct Args {
    /// TOML file overriding modes and timings
    #[arg(short, long, env = "SWEEPWATCH_CONFIG")]
    config: Option<PathBuf>,

    /// Log messages instead of posting them
    #[arg(long, env = "SWEEPWATCH_DRY_RUN")]
    dry_run: bool,

    /// Log filter (e.g. info, sweepwatch=debug)
    #[arg(short, long)]
    log_level: Option<String>,

    /// Run a single poll cycle and a summary, then exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    load_env();
    let args = Args::parse();
    init_tracing(args.log_level.as_deref());

    info!("🚀 Sweepwatch starting");

    let mut config = Config::from_env().context("Failed to read configuration from environment")?;
    if let Some(path) = &args.config {
        info!("Loading config from {}", path.display());
        config = config.apply_file(Config::load_file(path)?);
    }
    config.validate().context("Invalid configuration")?;

    for mode in &config.modes {
        info!(
            mode = %mode.label(),
            team_size = mode.team_size,
            required_kills = mode.required_kills,
            channel = mode.channel_id,
            "  - item power ({}, {})",
            mode.item_power_min,
            mode.item_power_max
        );
    }

    let sink = build_sink(&config, args.dry_run)?;
    let feed = GameInfoClient::new(config.api_url.clone(), config.fetch_timeout)?;

    let history = Arc::new(Mutex::new(HistoryAggregator::new()));
    let equipment = Arc::new(EquipmentBook::new());
    let mut pipeline = SweepPipeline::new(&config, history.clone(), equipment);
    let reporter = SummaryReporter::new(config.summary_window, config.summary_top_k);

    if args.once {
        poll_cycle(&feed, &mut pipeline, sink.as_ref(), config.fetch_limit).await;
        summary_cycle(&history, &reporter, &config, sink.as_ref()).await;
        return Ok(());
    }

    let poll_task = tokio::spawn(poll_loop(
        feed,
        pipeline,
        sink.clone(),
        config.poll_interval,
        config.fetch_limit,
    ));
    let summary_task = tokio::spawn(summary_loop(history, reporter, config, sink));

    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("🛑 Shutdown requested"),
        res = poll_task => warn!("poll task exited: {:?}", res),
        res = summary_task => warn!("summary task exited: {:?}", res),
    }

    Ok(())
}

fn build_sink(config: &Config, dry_run: bool) -> Result<Arc<dyn MessageSink>> {
    if dry_run {
        info!("📝 Dry run: messages go to the log");
        return Ok(Arc::new(LogSink));
    }

    let Some(token) = config.discord_token.clone() else {
        warn!("⚠️  DISCORD_TOKEN not set - falling back to dry run");
        return Ok(Arc::new(LogSink));
    };

    config
        .validate_channels()
        .context("Discord delivery needs channel ids")?;
    Ok(Arc::new(DiscordSink::new(token)?))
}

async fn poll_loop(
    feed: GameInfoClient,
    mut pipeline: SweepPipeline,
    sink: Arc<dyn MessageSink>,
    period: Duration,
    fetch_limit: usize,
) {
    info!("📡 Polling gameinfo every {:?}", period);

    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        poll_cycle(&feed, &mut pipeline, sink.as_ref(), fetch_limit).await;
    }
}

async fn poll_cycle(
    feed: &GameInfoClient,
    pipeline: &mut SweepPipeline,
    sink: &dyn MessageSink,
    fetch_limit: usize,
) {
    let batch = feed.fetch_events(fetch_limit).await;
    let report = pipeline.run_cycle(batch, Utc::now());

    for announcement in report.announcements {
        let context = format!("{} win", announcement.mode);
        deliver(sink, announcement.channel_id, &context, &announcement.text).await;
    }
}

async fn summary_loop(
    history: Arc<Mutex<HistoryAggregator>>,
    reporter: SummaryReporter,
    config: Config,
    sink: Arc<dyn MessageSink>,
) {
    info!("🌀 Summaries every {:?}", config.summary_interval);

    // First summary after one full interval, not at startup.
    let mut ticker = interval_at(
        Instant::now() + config.summary_interval,
        config.summary_interval,
    );
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        summary_cycle(&history, &reporter, &config, sink.as_ref()).await;
    }
}

async fn summary_cycle(
    history: &Mutex<HistoryAggregator>,
    reporter: &SummaryReporter,
    config: &Config,
    sink: &dyn MessageSink,
) {
    let summaries = {
        let mut history = history.lock();
        reporter.summarize(&mut history, &config.modes, Utc::now())
    };

    for summary in summaries {
        info!(
            mode = %summary.mode,
            unique_teams = summary.unique_teams,
            "🌀 Summary ready"
        );
        let context = format!("{} summary", summary.mode);
        deliver(sink, config.summary_channel_id, &context, &summary.render()).await;
    }
}

/// Initialize tracing; `--log-level` wins over `RUST_LOG`.
fn init_tracing(level: Option<&str>) {
    let filter = match level {
        Some(l) => tracing_subscriber::EnvFilter::new(l),
        None => tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "sweepwatch=info".into()),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn load_env() {
    // 1) Standard dotenv search (cwd + parents)
    let _ = dotenv();

    // 2) Also the crate directory, for runs from elsewhere with --manifest-path
    let manifest_env = Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
    if manifest_env.exists() {
        let _ = dotenv::from_path(&manifest_env);
    }
}
