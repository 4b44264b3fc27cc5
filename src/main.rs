use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use strixforge::{
    cancel_pair, AutoUi, ConsoleFrontend, Engine, EngineError, EventBus, EventUi, LogCollector, Platform,
    RunContext, SettingsManager, StateError, StateStore, StrixHaloPlatform, Ui, VERSION,
};

/// Exit status for a run stopped by Ctrl-C, as shells report SIGINT.
const EXIT_CANCELLED: u8 = 130;

/// How long the console gets to print what is left on the bus after the run.
const CONSOLE_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Parser, Debug)]
#[command(name = "strixforge", version, about = "Configure an AMD Strix Halo machine, stage by stage")]
struct Cli {
    /// Run unattended: every prompt takes its default answer
    #[arg(long)]
    auto: bool,

    /// Report what would run without changing the system
    #[arg(long)]
    dry_run: bool,

    /// Skip stages recorded as installed by a previous run
    #[arg(long)]
    skip_installed: bool,

    /// Use this state file instead of the per-user default
    #[arg(long, value_name = "PATH")]
    state_file: Option<PathBuf>,

    /// List the stages and exit
    #[arg(long)]
    list: bool,

    /// Write debug-level records to the session log
    #[arg(long)]
    debug: bool,
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("starting the async runtime")?;
    let outcome = runtime.block_on(run(cli));
    // A console read may still be parked on stdin; do not wait for it
    runtime.shutdown_background();
    outcome
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let loaded = SettingsManager::load();
    let mut settings = loaded.as_ref().ok().cloned().unwrap_or_default();
    if cli.skip_installed {
        settings.skip_installed = true;
    }
    if cli.auto {
        settings.interactive = false;
    }
    if cli.debug {
        settings.debug_logging = true;
    }
    if let Some(path) = &cli.state_file {
        settings.state_path = Some(path.clone());
    }

    // The run proceeds without a session log if the directory is unusable
    let logger = match LogCollector::new(settings.resolved_log_dir(), settings.log_level()) {
        Ok(collector) => match collector.install() {
            Ok(collector) => Some(collector),
            Err(e) => {
                eprintln!("[Main] WARNING: could not register logger: {}", e);
                None
            }
        },
        Err(e) => {
            eprintln!("[Main] WARNING: session log unavailable: {}", e);
            None
        }
    };
    log::info!("[Main] strixforge {} starting", VERSION);
    if let Err(e) = &loaded {
        log::warn!("[Config] settings unavailable, using defaults: {}", e);
        eprintln!("[Config] WARNING: settings unavailable, using defaults: {}", e);
    }

    let platform: Arc<dyn Platform> = Arc::new(StrixHaloPlatform::new());

    if cli.list {
        println!("{}", platform.name());
        for (i, stage) in platform.stages().iter().enumerate() {
            let marker = if stage.optional() { " (optional)" } else { "" };
            println!("  {}. {} [{}]{} - {}", i + 1, stage.name(), stage.id(), marker, stage.description());
        }
        return Ok(ExitCode::SUCCESS);
    }

    let device = match platform.detect().await {
        Ok(device) => {
            println!("Detected: {}", device);
            log::info!("[Main] detected device: {}", device);
            Some(device)
        }
        Err(e) => {
            println!("Could not identify this machine ({}); continuing without device quirks", e);
            log::warn!("[Main] device detection failed: {}", e);
            None
        }
    };

    let store = match settings.resolved_state_path() {
        Some(path) => Some(load_state(path)),
        None => {
            log::warn!("[Main] no state file location available; progress will not be saved");
            None
        }
    };
    if let Some(store) = &store {
        if !store.is_first_run() {
            println!(
                "Previous run found: {} stage(s) installed, {} skipped",
                store.installed_stages().len(),
                store.skipped_stages().len()
            );
        }
    }

    let bus = Arc::new(EventBus::with_capacity(settings.event_queue_capacity));
    let (cancel, token) = cancel_pair();
    let ctx = RunContext::new(token.clone(), Arc::clone(&bus)).with_device(device.clone());

    let (ui, console) = if settings.interactive {
        let console = ConsoleFrontend::new(&bus).spawn();
        let ui = Arc::new(EventUi::new(Arc::clone(&bus), token)) as Arc<dyn Ui>;
        (ui, Some(console))
    } else {
        (Arc::new(AutoUi::new()) as Arc<dyn Ui>, None)
    };

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        eprintln!("\nCancelling after the current stage... (Ctrl-C again to abort)");
        log::warn!("[Main] interrupt received, cancelling run");
        cancel.cancel();

        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nAborted.");
            std::process::exit(i32::from(EXIT_CANCELLED));
        }
    });

    let mut engine = Engine::new(Arc::clone(&platform), ui, ctx).skip_installed(settings.skip_installed);
    if let Some(store) = store {
        engine = engine.with_state_store(store);
    }
    engine.set_dry_run(cli.dry_run);

    let outcome = engine.run().await;
    let summary = engine.run_state().await.summary();

    if !cli.dry_run {
        if let Some(store) = engine.state_store_mut() {
            if outcome.is_ok() {
                store.mark_first_run_complete();
            }
            if let Some(device) = &device {
                store.set_device_name(device.name());
            }
            store.set_installer_version(VERSION);
            if let Err(e) = store.save() {
                log::warn!("[Main] could not save final state: {}", e);
                eprintln!("WARNING: could not save install state: {}", e);
            }
        }
    }

    // Closing the bus ends the console task once it has drained
    bus.close();
    if let Some(console) = console {
        let abort = console.abort_handle();
        match tokio::time::timeout(CONSOLE_DRAIN_TIMEOUT, console).await {
            Ok(Ok(stats)) if stats.dropped > 0 => {
                log::warn!("[Main] console missed {} event(s) under load", stats.dropped);
            }
            Ok(Ok(_)) => {}
            Ok(Err(e)) => log::warn!("[Main] console task ended abnormally: {}", e),
            Err(_) => {
                log::warn!("[Main] console did not finish draining, abandoning it");
                abort.abort();
            }
        }
    }

    println!(
        "\nSummary: {} succeeded, {} skipped, {} failed, {} not run",
        summary.succeeded, summary.skipped, summary.failed, summary.pending
    );

    let code = match &outcome {
        Ok(()) => {
            println!("All stages complete.");
            ExitCode::SUCCESS
        }
        Err(e) if e.is_cancelled() => {
            println!("{}", e);
            ExitCode::from(EXIT_CANCELLED)
        }
        Err(EngineError::StageFailed { stage_id, source }) => {
            println!("Stopped: stage '{}' failed: {}", stage_id, source.user_message());
            println!("Fix the problem and re-run with --skip-installed to resume.");
            ExitCode::FAILURE
        }
        Err(e) => {
            println!("Stopped: {}", e);
            ExitCode::FAILURE
        }
    };
    log::info!("[Main] run finished: {:?}", outcome.as_ref().map_err(|e| e.to_string()));

    if let Some(logger) = logger {
        logger
            .wait_for_empty()
            .await
            .context("flushing session log")?;
        println!("Session log: {}", logger.session_log_path().display());
    }

    Ok(code)
}

/// Load the state file, starting fresh (at the same path) if it cannot be read.
fn load_state(path: PathBuf) -> StateStore {
    match StateStore::load(&path) {
        Ok(store) => store,
        Err(e) => {
            let hint = match e {
                StateError::InvalidJson(_) => " (the file will be rewritten)",
                _ => "",
            };
            log::warn!("[Main] could not load state from {}: {}", path.display(), e);
            eprintln!("WARNING: could not read {}: {}{}", path.display(), e, hint);
            StateStore::new(path)
        }
    }
}
