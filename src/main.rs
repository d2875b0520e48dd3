//! MSC Bridge - host process
//!
//! Runs one bridge instance from a YAML configuration. Outbound commands go
//! to the console transmitter, the REPL plays the part of the control surface
//! and of the receiver.

use anyhow::Result;
use clap::Parser;
use colored::*;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cli;

use crate::cli::ReplCommand;
use msc_bridge::config::{AppConfig, ConfigWatcher};
use msc_bridge::dispatch::DispatchOutcome;
use msc_bridge::feedback::FeedbackRequest;
use msc_bridge::state::VariableDefinition;
use msc_bridge::transmitter::{ConsoleTransmitter, Transmitter};
use msc_bridge::{Bridge, BridgeActor, BridgeEvent, BridgeHandle};

/// MSC Bridge - drive and mirror lighting console executors over MIDI Show Control
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, env = "MSC_BRIDGE_CONFIG", default_value = "config.yaml")]
    config: String,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,

    /// Print the tracked executor variables and exit
    #[arg(long)]
    list_variables: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let args = Args::parse();

    init_logging(&args.log_level, args.json_logs)?;

    info!("Starting MSC Bridge...");
    info!("Configuration file: {}", args.config);

    let (config_watcher, initial_config) = ConfigWatcher::new(args.config.clone()).await?;
    info!("Configuration loaded successfully with hot-reload enabled");

    let bridge = Bridge::new((*initial_config).clone())?;

    if args.list_variables {
        print_variables(&bridge.variable_definitions());
        return Ok(());
    }

    let (handle, events) = BridgeActor::spawn(bridge);
    connect_links(&handle, &initial_config);

    run_app(handle.clone(), events, config_watcher, shutdown_signal()).await?;

    handle.shutdown();
    info!("MSC Bridge shutdown complete");
    Ok(())
}

/// Bind the transport sides the configuration asks for
fn connect_links(handle: &BridgeHandle, config: &AppConfig) {
    if let Some(transmitter) = build_transmitter(config) {
        handle.attach_transmitter(transmitter);
    }
    if config.receiver.enabled {
        handle.attach_receiver();
    }
}

fn build_transmitter(config: &AppConfig) -> Option<Arc<dyn Transmitter>> {
    config.transmitter.port.map(|_| {
        Arc::new(ConsoleTransmitter::from_config(&config.transmitter)) as Arc<dyn Transmitter>
    })
}

async fn run_app(
    handle: BridgeHandle,
    mut events: mpsc::UnboundedReceiver<BridgeEvent>,
    mut config_watcher: ConfigWatcher,
    shutdown: impl std::future::Future<Output = ()>,
) -> Result<()> {
    let (repl_tx, mut repl_rx) = mpsc::unbounded_channel();
    // Plain thread, a blocked readline must not hold up runtime shutdown
    std::thread::spawn(move || {
        if let Err(e) = cli::run_repl(repl_tx) {
            warn!("REPL stopped: {}", e);
        }
    });

    // Feedback predicates registered from the REPL, with their last result
    let mut watches: Vec<(FeedbackRequest, bool)> = Vec::new();

    info!("Ready, type 'help' for commands");

    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            Some(event) = events.recv() => match event {
                BridgeEvent::Ingested(report) => {
                    for update in &report.variables {
                        println!("  {} = {}", update.name.cyan(), update.value);
                    }
                    refresh_watches(&handle, &mut watches, |request| {
                        request.needs_refresh(&report.affected)
                    })
                    .await;
                }
                BridgeEvent::Warning(warning) => {
                    debug!("Inbound message skipped: {}", warning);
                }
                BridgeEvent::Status(status) => {
                    println!("{} {}", "status:".bold(), status);
                }
            },

            Some(command) = repl_rx.recv() => {
                if !handle_repl(&handle, &mut watches, command).await {
                    break;
                }
            }

            Some(new_config) = config_watcher.next_config() => {
                info!("📝 Configuration file changed, reloading...");
                let transmitter = build_transmitter(&new_config);
                let receiver = new_config.receiver.enabled;

                match handle.reconfigure(new_config, transmitter).await {
                    Ok(definitions) => {
                        if receiver {
                            handle.attach_receiver();
                        }
                        print_variables(&definitions);
                        refresh_watches(&handle, &mut watches, |_| true).await;
                        info!("✅ Configuration reloaded");
                    }
                    Err(e) => {
                        warn!("⚠️  Failed to reload config (keeping old config): {:#}", e);
                    }
                }
            }

            _ = &mut shutdown => {
                info!("Shutdown signal received, stopping event loop");
                break;
            }
        }
    }

    Ok(())
}

/// Handle one REPL command, `false` once the REPL asked to exit
async fn handle_repl(
    handle: &BridgeHandle,
    watches: &mut Vec<(FeedbackRequest, bool)>,
    command: ReplCommand,
) -> bool {
    match command {
        ReplCommand::Action(action) => match handle.dispatch(action).await {
            Ok(DispatchOutcome::Sent(command)) => debug!("Sent {}", command),
            Ok(DispatchOutcome::LinkUnavailable) => {
                println!("{}", "no transmitter bound, action dropped".yellow());
            }
            Ok(DispatchOutcome::NoFaderBaseline(key)) => {
                println!(
                    "{}",
                    format!("fader position of {} unknown, action dropped", key).yellow()
                );
            }
            Err(e) => println!("{} {}", "error:".red().bold(), e),
        },
        ReplCommand::Inbound(message) => handle.ingest(message),
        ReplCommand::Feedback(request) => {
            let value = handle.evaluate(request.clone()).await;
            println!("  {:?} → {}", request, paint(value));
            if !register_watch(watches, request, value) {
                debug!("Feedback already watched");
            }
        }
        ReplCommand::Variables => {
            if let Some(snapshot) = handle.snapshot().await {
                for update in snapshot.variables {
                    println!("  {} = {}", update.name.cyan(), update.value);
                }
            }
        }
        ReplCommand::Status => {
            if let Some(snapshot) = handle.snapshot().await {
                println!(
                    "{} {} ({}, transmitter {})",
                    "status:".bold(),
                    snapshot.status,
                    snapshot.dialect,
                    if snapshot.has_transmitter { "bound" } else { "unbound" }
                );
                for state in snapshot.executors {
                    println!(
                        "  {:>7} active={:?} paused={:?} cue={:?} fader={:?}",
                        state.key, state.active, state.paused, state.cue, state.fader
                    );
                }
            }
        }
        ReplCommand::Help => println!("{}", cli::HELP),
        ReplCommand::Exit => return false,
    }

    true
}

/// Add `request` to the watch list, `false` if it was already watched
fn register_watch(
    watches: &mut Vec<(FeedbackRequest, bool)>,
    request: FeedbackRequest,
    value: bool,
) -> bool {
    if let Some((_, last)) = watches.iter_mut().find(|(watched, _)| *watched == request) {
        *last = value;
        return false;
    }
    watches.push((request, value));
    true
}

/// Re-evaluate the watches selected by `stale`, printing the ones that changed
async fn refresh_watches(
    handle: &BridgeHandle,
    watches: &mut [(FeedbackRequest, bool)],
    stale: impl Fn(&FeedbackRequest) -> bool,
) {
    let indices: Vec<usize> = (0..watches.len()).filter(|i| stale(&watches[*i].0)).collect();
    if indices.is_empty() {
        return;
    }

    let requests = indices.iter().map(|i| watches[*i].0.clone()).collect();
    let results = handle.evaluate_many(requests).await;

    for (i, value) in indices.into_iter().zip(results) {
        let (request, last) = &mut watches[i];
        if *last != value {
            println!("  {:?} → {}", request, paint(value));
            *last = value;
        }
    }
}

fn print_variables(definitions: &[VariableDefinition]) {
    if definitions.is_empty() {
        return;
    }
    println!("\n{}", "Tracked variables:".bold());
    for definition in definitions {
        println!("  {:<16} {}", definition.name.cyan(), definition.label);
    }
}

fn paint(value: bool) -> ColoredString {
    if value {
        "on".green().bold()
    } else {
        "off".dimmed()
    }
}

fn init_logging(level: &str, json: bool) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_target(false))
            .init();
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_thread_names(false),
            )
            .init();
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to install CTRL+C signal handler: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
