//! Replay command - feed a recorded walk through the discovery loop.
//!
//! Two pacing modes:
//!
//! - **Stepped** (default): every fix is handed to the loop in order and any
//!   trigger it produces runs to completion before the next fix. Output is
//!   deterministic.
//! - **Realtime** (`--realtime`): fixes are published on a watch channel,
//!   spaced by their recorded timestamps divided by `--speed`, and the loop
//!   runs with its heartbeat exactly as it would on a device. Ctrl+C stops
//!   the replay.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use serendipity::config::ConfigError;
use serendipity::discovery::DiscoveryEngine;
use serendipity::pin::{HttpPinSource, PinSource, StaticPinSource};
use serendipity::tracker::{
    ChannelSink, LocationUpdateLoop, LoopStats, PositionSample, SinkEvent,
};

use crate::error::CliError;
use crate::runner::CliRunner;

/// Arguments for the replay command.
pub struct ReplayArgs {
    pub pins: Option<PathBuf>,
    pub track: PathBuf,
    pub http: bool,
    pub realtime: bool,
    pub speed: f64,
    pub json: bool,
}

/// Run the replay command.
pub fn run(runner: &CliRunner, args: ReplayArgs) -> Result<(), CliError> {
    runner.log_startup("replay");
    let config = runner.config();

    let track = load_track(&args.track)?;
    if !(args.speed.is_finite() && args.speed > 0.0) {
        return Err(CliError::Config(format!(
            "--speed must be a positive number, got {}",
            args.speed
        )));
    }

    // Pin source: remote store or a local JSON file
    let (source, reporter): (Arc<dyn PinSource>, Option<Arc<HttpPinSource>>) = if args.http {
        let base_url = config.pin_store.base_url.clone().ok_or_else(|| {
            CliError::Config(
                "--http requires base_url in the [pin_store] section of config.ini".to_string(),
            )
        })?;
        let mut client = HttpPinSource::new(base_url, config.pin_store.timeout)?;
        if let Some(device_id) = &config.pin_store.device_id {
            client = client.with_device_id(device_id.clone());
        }
        let client = Arc::new(client);
        (Arc::clone(&client) as Arc<dyn PinSource>, Some(client))
    } else {
        let path = args
            .pins
            .as_deref()
            .ok_or_else(|| CliError::Config("either --pins or --http is required".to_string()))?;
        let pins = runner.block_on(StaticPinSource::from_json_file(path))?;
        println!("Loaded {} pins from {}", pins.len(), path.display());
        (Arc::new(pins) as Arc<dyn PinSource>, None)
    };

    let preferences = runner.preferences();
    let (sink, events) = ChannelSink::new();
    let update_loop = Arc::new(LocationUpdateLoop::new(
        DiscoveryEngine::new(config.discovery.clone()),
        config.tracker.clone(),
        preferences,
        source,
        Arc::new(sink),
    )
    .map_err(ConfigError::from)?);

    println!(
        "Replaying {} fixes from {} ({})",
        track.len(),
        args.track.display(),
        if args.realtime { "realtime" } else { "stepped" }
    );
    println!();

    let json = args.json;
    let realtime = args.realtime;
    let speed = args.speed;
    let stats = runner.block_on(async move {
        let printer = tokio::spawn(print_events(events, reporter, json));

        if realtime {
            replay_realtime(Arc::clone(&update_loop), track, speed).await?;
        } else {
            replay_stepped(&update_loop, track).await;
        }

        let stats = update_loop.stats();
        // Dropping the loop closes the event channel so the printer finishes
        drop(update_loop);
        if let Err(e) = printer.await {
            tracing::warn!(error = %e, "Event printer failed");
        }
        Ok::<_, CliError>(stats)
    })?;

    print_summary(&stats);
    Ok(())
}

/// Read a track file: a JSON array of position samples.
fn load_track(path: &Path) -> Result<Vec<PositionSample>, CliError> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| CliError::Track(format!("{}: {}", path.display(), e)))?;
    let track: Vec<PositionSample> = serde_json::from_str(&contents)
        .map_err(|e| CliError::Track(format!("{}: {}", path.display(), e)))?;
    if track.is_empty() {
        return Err(CliError::Track(format!("{}: no fixes", path.display())));
    }
    Ok(track)
}

async fn replay_stepped(update_loop: &LocationUpdateLoop, track: Vec<PositionSample>) {
    for sample in track {
        if let Some(trigger) = update_loop.handle_sample(Some(sample)) {
            update_loop.try_run_cycle(trigger).await;
        }
    }
}

async fn replay_realtime(
    update_loop: Arc<LocationUpdateLoop>,
    track: Vec<PositionSample>,
    speed: f64,
) -> Result<(), CliError> {
    let cancellation = CancellationToken::new();
    let handler_token = cancellation.clone();
    ctrlc::set_handler(move || {
        println!();
        println!("Received shutdown signal, stopping replay...");
        handler_token.cancel();
    })
    .map_err(|e| CliError::Config(format!("Failed to set signal handler: {}", e)))?;

    let (tx, positions) = watch::channel(None);
    let handle = tokio::spawn(update_loop.run(positions, cancellation.clone()));

    let mut previous_ms: Option<i64> = None;
    for sample in track {
        let delay = pacing_delay(previous_ms, sample.timestamp_ms, speed);
        previous_ms = Some(sample.timestamp_ms);

        tokio::select! {
            biased;
            _ = cancellation.cancelled() => break,
            _ = tokio::time::sleep(delay) => {}
        }
        if tx.send(Some(sample)).is_err() {
            break;
        }
    }

    // Closing the channel lets the in-flight cycle finish
    drop(tx);
    if let Err(e) = handle.await {
        tracing::warn!(error = %e, "Location update loop task failed");
    }
    Ok(())
}

/// Longest wait between two replayed fixes.
const MAX_PACING_DELAY: Duration = Duration::from_secs(60 * 60);

/// Wall-clock wait before publishing a fix recorded at `timestamp_ms`.
///
/// Capped at [`MAX_PACING_DELAY`].
fn pacing_delay(previous_ms: Option<i64>, timestamp_ms: i64, speed: f64) -> Duration {
    let Some(previous_ms) = previous_ms else {
        return Duration::ZERO;
    };
    let gap_ms = timestamp_ms.saturating_sub(previous_ms).max(0) as f64;
    Duration::try_from_secs_f64(gap_ms / 1000.0 / speed)
        .unwrap_or(MAX_PACING_DELAY)
        .min(MAX_PACING_DELAY)
}

async fn print_events(
    mut events: mpsc::UnboundedReceiver<SinkEvent>,
    reporter: Option<Arc<HttpPinSource>>,
    json: bool,
) {
    while let Some(event) = events.recv().await {
        match event {
            SinkEvent::Notification(e) => {
                if json {
                    println!(
                        "{}",
                        serde_json::json!({
                            "event": "notify",
                            "pinId": e.pin_id,
                            "distanceM": e.distance_m,
                            "tier": e.tier.as_str(),
                        })
                    );
                } else {
                    println!(
                        "  NOTIFY   {:<16} {:>5} m  {}",
                        e.pin_id.as_str(),
                        e.distance_m,
                        e.tier
                    );
                }
            }
            SinkEvent::PassBy(e) => {
                if json {
                    println!(
                        "{}",
                        serde_json::json!({ "event": "pass_by", "pinId": e.pin_id })
                    );
                } else {
                    println!("  PASS-BY  {}", e.pin_id);
                }

                if let Some(client) = &reporter {
                    match client.record_pass_by(&e.pin_id).await {
                        Ok(passes_by) => {
                            tracing::info!(pin = %e.pin_id, passes_by, "Pass-by recorded")
                        }
                        Err(err) => {
                            tracing::warn!(pin = %e.pin_id, error = %err, "Failed to record pass-by")
                        }
                    }
                }
            }
        }
    }
}

fn print_summary(stats: &LoopStats) {
    println!();
    println!("Replay Summary");
    println!("──────────────");
    println!("  Cycles:          {} ({} coalesced)", stats.cycles, stats.coalesced);
    println!("  Notifications:   {}", stats.notifications);
    println!("  Pass-bys:        {}", stats.pass_bys);
    if stats.source_failures > 0 {
        println!("  Source failures: {}", stats.source_failures);
    }
}
