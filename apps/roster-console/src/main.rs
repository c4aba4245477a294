mod bridge;
mod config;
mod logging;
mod member_file;

use std::{process::ExitCode, sync::Arc, time::Duration};

use bridge::{CommandOutcome, ConsoleBridge, parse_command, render_snapshot};
use config::ConsoleConfig;
use roster_core::{
    ChannelContext, ContextQueue, MemberListSnapshot, SettingsService, SnapshotCallback,
    TaskRunner,
};
use roster_platform::{InMemorySettingsStore, JsonFileSettingsStore, StoredSettings};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::mpsc,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Quiet period after input closes before pending member lists are abandoned.
const SETTLE_TIMEOUT: Duration = Duration::from_millis(250);
const RUNTIME_SHUTDOWN_TIMEOUT: Duration = Duration::from_millis(100);

fn main() -> ExitCode {
    logging::init();
    info!("starting roster-console");

    let config = match ConsoleConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            error!(error = %err, "invalid configuration");
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    };

    let settings = match open_settings(&config) {
        Ok(settings) => settings,
        Err(err) => {
            error!(error = %err, "failed opening settings");
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("roster-worker")
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            error!(error = %err, "failed building tokio runtime");
            return ExitCode::FAILURE;
        }
    };

    // The main thread plays the presentation thread: snapshots are rendered
    // only when it drains the context queue.
    let (context, queue) = ChannelContext::new();
    let ui_update: SnapshotCallback =
        Arc::new(|snapshot: MemberListSnapshot| println!("{}", render_snapshot(&snapshot)));
    let bridge = ConsoleBridge::start(
        &config,
        TaskRunner::new(runtime.handle().clone()),
        Arc::new(context),
        ui_update,
        settings,
    );

    let shutdown = CancellationToken::new();
    let (line_tx, line_rx) = mpsc::unbounded_channel();
    runtime.spawn(read_stdin_lines(line_tx, shutdown.clone()));

    runtime.block_on(run_input_loop(&bridge, line_rx, queue));

    shutdown.cancel();
    bridge.shutdown();
    runtime.shutdown_timeout(RUNTIME_SHUTDOWN_TIMEOUT);
    info!("roster-console exiting");
    ExitCode::SUCCESS
}

fn open_settings(config: &ConsoleConfig) -> Result<Arc<dyn SettingsService>, String> {
    match &config.settings_file {
        Some(path) => {
            let store = JsonFileSettingsStore::open(path).map_err(|err| err.to_string())?;
            debug!(path = %store.path().display(), "using file-backed settings");
            Ok(Arc::new(StoredSettings::new(store)))
        }
        None => {
            debug!("using in-memory settings");
            Ok(Arc::new(StoredSettings::new(InMemorySettingsStore::default())))
        }
    }
}

async fn run_input_loop(
    bridge: &ConsoleBridge,
    mut line_rx: mpsc::UnboundedReceiver<String>,
    mut queue: ContextQueue,
) {
    loop {
        tokio::select! {
            line = line_rx.recv() => {
                let Some(line) = line else {
                    debug!("input closed");
                    break;
                };
                match parse_command(&line) {
                    Ok(command) => match bridge.handle_command(command) {
                        CommandOutcome::Continue => {}
                        CommandOutcome::Message(message) => println!("{message}"),
                        CommandOutcome::Quit => return,
                    },
                    Err(message) => println!("{message}"),
                }
            }
            ran = queue.run_next() => {
                if !ran {
                    return;
                }
            }
        }
    }

    // Render whatever is still in flight for piped input.
    while let Ok(true) = tokio::time::timeout(SETTLE_TIMEOUT, queue.run_next()).await {}
}

async fn read_stdin_lines(line_tx: mpsc::UnboundedSender<String>, shutdown: CancellationToken) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    if line_tx.send(line).is_err() {
                        break;
                    }
                }
                Ok(None) => break,
                Err(err) => {
                    warn!(error = %err, "failed reading stdin");
                    break;
                }
            },
        }
    }
}
