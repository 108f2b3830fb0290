//! Sentinel Biometrics CLI
//!
//! Drives the liveness pipeline from recorded or synthetic event streams.

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use sentinel_biometrics::{
    capture::{event_channel, now_millis, DEFAULT_QUEUE_CAPACITY},
    config::Config,
    transparency::create_shared_log_with_persistence,
    CaptureAdapter, EventPump, LivenessPayload, PayloadBuilder, RawEvent, RingBufferStore,
    SampleKind, SnapshotAssembler, SIGNAL_DECLARATION, VERSION,
};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sentinel-biometrics")]
#[command(version = VERSION)]
#[command(about = "Behavioral telemetry aggregation for liveness signals", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay recorded raw events (JSON Lines) through the pipeline
    Replay {
        /// Input file, one raw event per line
        #[arg(long, short)]
        input: PathBuf,

        /// Take a snapshot after every N events (0 = only at end of input)
        #[arg(long, default_value = "0")]
        every: usize,

        /// Write payloads to this file instead of the export directory
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Feed synthetic sensor streams from concurrent producers
    Simulate {
        /// How long to run
        #[arg(long, default_value = "10")]
        seconds: u64,

        /// Events per second for each producer
        #[arg(long, default_value = "60")]
        rate_hz: u32,
    },

    /// Show cumulative pipeline statistics
    Status,

    /// Display what the liveness signal contains
    Declaration,

    /// Show configuration
    Config,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Replay {
            input,
            every,
            output,
        } => cmd_replay(&input, every, output),
        Commands::Simulate { seconds, rate_hz } => cmd_simulate(seconds, rate_hz),
        Commands::Status => cmd_status(),
        Commands::Declaration => {
            println!("{SIGNAL_DECLARATION}");
            Ok(())
        }
        Commands::Config => cmd_config(),
    }
}

fn load_config() -> Result<Config> {
    let config = Config::load().context("loading configuration")?;
    if let Err(e) = config.ensure_directories() {
        tracing::warn!(error = %e, "could not create data directories");
    }
    Ok(config)
}

fn cmd_replay(input: &Path, every: usize, output: Option<PathBuf>) -> Result<()> {
    let config = load_config()?;
    let file =
        std::fs::File::open(input).with_context(|| format!("opening {}", input.display()))?;

    let transparency_log =
        create_shared_log_with_persistence(config.data_path.join("transparency.json"));
    let store = Arc::new(
        RingBufferStore::from_config(&config).with_transparency(Arc::clone(&transparency_log)),
    );
    let adapter =
        CaptureAdapter::new(Arc::clone(&store)).with_transparency(Arc::clone(&transparency_log));
    let assembler = SnapshotAssembler::new(store).with_transparency(Arc::clone(&transparency_log));
    let builder = PayloadBuilder::new().with_session_id(format!("REPLAY-{}", now_millis()));

    let (tx, rx) = event_channel(DEFAULT_QUEUE_CAPACITY);
    let pump = EventPump::spawn(adapter, rx).context("starting event pump")?;

    let mut payloads: Vec<LivenessPayload> = Vec::new();
    let mut sent: u64 = 0;
    let mut skipped: u64 = 0;

    for (line_no, line) in BufReader::new(file).lines().enumerate() {
        let line = line.with_context(|| format!("reading {}", input.display()))?;
        if line.trim().is_empty() {
            continue;
        }

        let event: RawEvent = match serde_json::from_str(&line) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(line = line_no + 1, error = %e, "skipping unparseable event");
                skipped += 1;
                continue;
            }
        };

        tx.send(event).context("event pump stopped unexpectedly")?;
        sent += 1;

        if every > 0 && sent % every as u64 == 0 {
            wait_for_pump(&pump, sent);
            payloads.push(snapshot_payload(&assembler, &builder));
        }
    }

    drop(tx);
    let summary = pump.join();
    if every == 0 || sent % every as u64 != 0 {
        payloads.push(snapshot_payload(&assembler, &builder));
    }

    println!(
        "Replayed {} events ({} accepted, {} rejected, {} unparseable)",
        sent + skipped,
        summary.submitted,
        summary.rejected,
        skipped
    );

    let path = output.unwrap_or_else(|| {
        config.export_path.join(format!(
            "replay_{}.json",
            Utc::now().format("%Y%m%d_%H%M%S")
        ))
    });
    export_payloads(&payloads, &path)?;
    for _ in &payloads {
        transparency_log.record_payload_exported();
    }

    if let Err(e) = transparency_log.save() {
        tracing::warn!(error = %e, "could not save transparency log");
    }

    println!();
    println!("{}", transparency_log.summary());
    Ok(())
}

/// Block until the pump has handled `sent` events or exited.
fn wait_for_pump(pump: &EventPump, sent: u64) {
    loop {
        let summary = pump.summary();
        if summary.submitted + summary.rejected >= sent || pump.is_finished() {
            return;
        }
        thread::sleep(Duration::from_millis(1));
    }
}

fn snapshot_payload(assembler: &SnapshotAssembler, builder: &PayloadBuilder) -> LivenessPayload {
    let features = assembler.take_snapshot();
    let payload = builder.build(&features);
    println!(
        "[{}] #{} samples={} gyro_var={:.3} cadence={:.1}ms pressure={:.3} accel={:.3}",
        features.snapshot_timestamp.format("%H:%M:%S"),
        payload.sequence,
        features.sample_count,
        features.gyro_variance,
        features.typing_cadence_mean_millis,
        features.touch_pressure_avg,
        features.accel_magnitude_mean
    );
    payload
}

fn export_payloads(payloads: &[LivenessPayload], path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(payloads).context("serializing payloads")?;
    std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
    println!("Exported {} payloads to {}", payloads.len(), path.display());
    Ok(())
}

fn cmd_simulate(seconds: u64, rate_hz: u32) -> Result<()> {
    if rate_hz == 0 {
        bail!("--rate-hz must be at least 1");
    }

    let config = load_config()?;
    println!("Sentinel Biometrics v{VERSION}");
    println!();
    println!("Simulating for {seconds}s at {rate_hz} Hz per producer");
    println!(
        "  Snapshot interval: {}s",
        config.snapshot_interval.as_secs()
    );
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let transparency_log =
        create_shared_log_with_persistence(config.data_path.join("transparency.json"));
    let store = Arc::new(
        RingBufferStore::from_config(&config).with_transparency(Arc::clone(&transparency_log)),
    );
    let adapter =
        CaptureAdapter::new(Arc::clone(&store)).with_transparency(Arc::clone(&transparency_log));
    let assembler = SnapshotAssembler::new(store).with_transparency(Arc::clone(&transparency_log));
    let builder = PayloadBuilder::new().with_session_id(format!("SIM-{}", now_millis()));
    println!("Instance ID: {}", builder.instance_id());

    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })
    .context("setting Ctrl+C handler")?;

    let period = Duration::from_secs_f64(1.0 / f64::from(rate_hz));
    let producers = [
        SampleKind::Orientation,
        SampleKind::Acceleration,
        SampleKind::KeyDown,
        SampleKind::TouchStart,
    ]
    .into_iter()
    .map(|kind| {
        let adapter = adapter.clone();
        let running = Arc::clone(&running);
        thread::Builder::new()
            .name(format!("producer-{kind}"))
            .spawn(move || produce(kind, &adapter, &running, period))
            .with_context(|| format!("spawning {kind} producer"))
    })
    .collect::<Result<Vec<_>>>()?;

    let deadline = Instant::now() + Duration::from_secs(seconds);
    let mut last_snapshot = Instant::now();
    let mut payloads = Vec::new();

    while running.load(Ordering::SeqCst) && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(50));
        if last_snapshot.elapsed() >= config.snapshot_interval {
            payloads.push(snapshot_payload(&assembler, &builder));
            last_snapshot = Instant::now();
        }
    }

    println!();
    println!("Stopping producers...");
    running.store(false, Ordering::SeqCst);
    for handle in producers {
        if handle.join().is_err() {
            tracing::error!("producer thread panicked");
        }
    }
    payloads.push(snapshot_payload(&assembler, &builder));

    let path = config.export_path.join(format!(
        "simulate_{}.json",
        Utc::now().format("%Y%m%d_%H%M%S")
    ));
    export_payloads(&payloads, &path)?;
    for _ in &payloads {
        transparency_log.record_payload_exported();
    }

    if let Err(e) = transparency_log.save() {
        tracing::warn!(error = %e, "could not save transparency log");
    }

    println!();
    println!("{}", transparency_log.summary());
    Ok(())
}

/// Synthetic producer loop. The `KeyDown` producer emits full press/release pairs.
fn produce(kind: SampleKind, adapter: &CaptureAdapter, running: &AtomicBool, period: Duration) {
    const KEYS: [&str; 6] = ["e", "t", "a", "o", "Space", "Shift"];
    let mut tick: u64 = 0;

    while running.load(Ordering::Relaxed) {
        let phase = tick as f64 * 0.1;
        let result = match kind {
            SampleKind::Orientation => adapter.on_orientation(
                Some((phase * 7.0) % 360.0),
                Some(20.0 + 5.0 * phase.sin()),
                Some(3.0 * phase.cos()),
            ),
            SampleKind::Acceleration => adapter.on_motion(
                Some(0.2 * phase.sin()),
                Some(0.1 * phase.cos()),
                Some(9.81 + 0.05 * (phase * 3.0).sin()),
            ),
            SampleKind::TouchStart => adapter.on_touch_start(
                Some(0.5 + 0.3 * (phase * 0.7).sin()),
                Some(12.0),
                Some(11.0),
            ),
            _ => {
                let key = KEYS[(tick as usize) % KEYS.len()];
                let hold = Duration::from_millis(60 + (tick % 5) * 15);
                adapter.on_key_down(key).and_then(|_| {
                    thread::sleep(hold);
                    adapter.on_key_up(key)
                })
            }
        };
        if let Err(e) = result {
            tracing::debug!(%kind, error = %e, "synthetic sample rejected");
        }
        tick += 1;
        thread::sleep(period);
    }
}

fn cmd_status() -> Result<()> {
    let config = Config::load().unwrap_or_default();

    println!("Sentinel Biometrics Status");
    println!("==========================");
    println!();

    println!("Configuration:");
    println!(
        "  Snapshot interval: {}s",
        config.snapshot_interval.as_secs()
    );
    for kind in SampleKind::ALL {
        println!("  Retention {kind}: {:?}", config.retention.policy_for(kind));
    }
    println!();

    let stats_path = config.data_path.join("transparency.json");
    if stats_path.exists() {
        let log = create_shared_log_with_persistence(stats_path);
        let stats = log.stats();
        println!("Cumulative Statistics:");
        for kind in SampleKind::ALL {
            println!(
                "  {kind}: {} accepted, {} rejected, {} evicted, {} drained",
                stats.accepted(kind),
                stats.rejected(kind),
                stats.evicted(kind),
                stats.drained(kind)
            );
        }
        println!("  Snapshots taken: {}", stats.snapshots_taken);
        println!("  Payloads exported: {}", stats.payloads_exported);
    } else {
        println!("No previous session data found.");
    }
    Ok(())
}

fn cmd_config() -> Result<()> {
    let config = Config::load().unwrap_or_default();

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!(
        "{}",
        serde_json::to_string_pretty(&config).context("serializing configuration")?
    );
    Ok(())
}
