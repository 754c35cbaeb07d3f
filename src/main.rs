//! Oscillation monitor daemon - main entry point
//!
//! Wires configured phasor sources through the coordinator into the
//! time-series store and runs until interrupted or until the watchdog
//! requests a restart. A restart request is surfaced as a dedicated exit
//! code; the actual re-exec is left to the host supervisor (systemd,
//! container runtime, ...).

use anyhow::Context;
use clap::Parser;
use oscimon::config::AppConfig;
use oscimon::pipeline::{Coordinator, RunOutcome};
use oscimon::source::{self, MockPhasorSource, PhasorSource, SignalPattern};
use oscimon::store::{InfluxStore, MemoryStore, TimeSeriesStore};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Exit code telling the host supervisor to restart the process
/// (EX_TEMPFAIL by convention)
const RESTART_EXIT_CODE: i32 = 75;

/// Wide-area oscillation monitor
#[derive(Debug, Parser)]
#[command(name = "oscimon", version, about)]
struct Cli {
    /// Path to the TOML configuration file; defaults apply when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Run against simulated sources and an in-memory store
    #[arg(long)]
    simulate: bool,

    /// Append logs to this file in addition to stderr
    #[arg(long)]
    log_file: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _log_guard = init_logging(cli.log_file.as_deref())?;

    let config = match &cli.config {
        Some(path) => AppConfig::load(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => {
            let config = AppConfig::default();
            config.validate().context("validating default config")?;
            config
        }
    };
    tracing::info!(
        "Starting oscillation monitor: {} sources at {} Hz{}",
        config.sources.len(),
        config.ingest.sampling_rate_hz,
        if cli.simulate { " (simulated)" } else { "" }
    );

    let stop = Arc::new(AtomicBool::new(false));
    let (event_tx, event_rx) = crossbeam_channel::bounded(config.ingest.queue_capacity);

    let sampling_rate = config.ingest.sampling_rate_hz;
    let simulate = cli.simulate;
    let make_source = move |source_config: &oscimon::config::SourceConfig| -> Box<dyn PhasorSource> {
        // The wire-protocol client is an external collaborator; this binary
        // ships the simulated source and leaves real decoding to it.
        if !simulate {
            tracing::warn!(
                "No wire-protocol client built in; source '{}' runs simulated",
                source_config.name
            );
        }
        let phase = source_config.idcode as f64 * 0.7;
        Box::new(
            MockPhasorSource::new(&source_config.name, sampling_rate)
                .with_pattern(SignalPattern::default())
                .with_phase(phase),
        )
    };

    let store: Box<dyn TimeSeriesStore> = if cli.simulate {
        Box::new(MemoryStore::new())
    } else {
        Box::new(InfluxStore::new(config.store.clone()).context("creating store client")?)
    };

    let workers = source::spawn_workers(&config, make_source, event_tx, stop.clone());

    let coordinator_stop = stop.clone();
    let coordinator_config = config.clone();
    let coordinator_handle = std::thread::Builder::new()
        .name("coordinator".to_string())
        .spawn(move || {
            let mut coordinator =
                Coordinator::new(coordinator_config, event_rx, store, coordinator_stop);
            coordinator.run()
        })
        .context("spawning coordinator thread")?;

    wait_for_shutdown(&stop, &coordinator_handle)?;
    stop.store(true, Ordering::SeqCst);

    let outcome = coordinator_handle
        .join()
        .map_err(|_| anyhow::anyhow!("coordinator thread panicked"))?;
    source::join_workers(workers, &config.supervision);

    match outcome {
        RunOutcome::Stopped => {
            tracing::info!("Shutdown complete");
            Ok(())
        }
        RunOutcome::RestartRequired(reason) => {
            tracing::error!("Requesting restart from host supervisor: {}", reason);
            std::process::exit(RESTART_EXIT_CODE);
        }
    }
}

/// Initialize tracing with an env-filter; optionally tee to a log file
fn init_logging(
    log_file: Option<&std::path::Path>,
) -> anyhow::Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,oscimon=debug"));
    let registry = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr));

    if let Some(path) = log_file {
        let directory = path.parent().unwrap_or_else(|| std::path::Path::new("."));
        let file_name = path
            .file_name()
            .ok_or_else(|| anyhow::anyhow!("log file path has no file name"))?;
        let appender = tracing_appender::rolling::never(directory, file_name);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(writer).with_ansi(false))
            .init();
        Ok(Some(guard))
    } else {
        registry.init();
        Ok(None)
    }
}

/// Block until Ctrl-C or until the coordinator finishes on its own
fn wait_for_shutdown(
    stop: &Arc<AtomicBool>,
    coordinator: &std::thread::JoinHandle<RunOutcome>,
) -> anyhow::Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("building signal runtime")?;
    runtime.block_on(async {
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);
        loop {
            // Wake periodically in case the coordinator exited by itself
            // (watchdog escalation or channel loss).
            let poll = tokio::time::sleep(std::time::Duration::from_millis(200));
            tokio::select! {
                result = &mut ctrl_c => {
                    if let Err(e) = result {
                        tracing::warn!("Ctrl-C handler failed: {}", e);
                    }
                    tracing::info!("Interrupt received, shutting down");
                    stop.store(true, Ordering::SeqCst);
                    break;
                }
                _ = poll => {
                    if coordinator.is_finished() || stop.load(Ordering::SeqCst) {
                        break;
                    }
                }
            }
        }
    });
    Ok(())
}
