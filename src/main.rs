//! Haptic Link - serialized control of a remote vibration device server
//!
//! This is the main entry point for the haptic-link binary.

mod cli;
mod console;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::runtime::Handle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{error, info, warn};

use haptic_link::config::{self, LinkConfig};
use haptic_link::connection::{ConnectionManager, ManagerConfig};
use haptic_link::error::{Error, Result};
use haptic_link::haptics::{HapticCoordinator, NoteEvent, StrengthContext};
use haptic_link::logging;
use haptic_link::remote::{MockConfig, MockServer};

use crate::cli::{Cli, Commands, ConfigSubcommand};
use crate::console::ConsoleCommand;

fn main() -> Result<()> {
    // Parse CLI arguments first (before logging, so we know verbosity)
    let cli = Cli::parse();

    match cli.command {
        Commands::Config { subcommand } => {
            // Config commands use minimal logging
            logging::init_simple(tracing::Level::WARN)?;
            handle_config_command(subcommand)
        }
        Commands::Simulate {
            config,
            server,
            devices,
            latency_ms,
        } => {
            let mut config =
                LinkConfig::load_unvalidated(config.as_deref()).unwrap_or_else(|e| exit_with(e));

            // CLI flags take precedence over file and environment
            if let Some(server) = server {
                config.server.url = server;
            }
            if let Some(devices) = devices {
                config.simulator.devices = devices;
            }
            if let Some(latency_ms) = latency_ms {
                config.simulator.latency_ms = latency_ms;
            }
            if let Err(e) = config.validate() {
                exit_with(e);
            }

            // The guards must be kept alive for the lifetime of the program
            let _log_guards = logging::init_logging(&config.logging, cli.verbose, cli.quiet)?;
            info!(version = env!("CARGO_PKG_VERSION"), "Starting Haptic Link");

            run_simulation(config)
        }
    }
}

/// Print a formatted error and exit with its code
fn exit_with(e: Error) -> ! {
    eprint!("{}", e.format_for_terminal());
    std::process::exit(e.exit_code());
}

/// Build the runtime and run the simulate console
fn run_simulation(config: LinkConfig) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .worker_threads(2)
        .thread_name("haptic-link")
        .build()
        .map_err(|e| Error::Internal(format!("Failed to create async runtime: {}", e)))?;

    let result = runtime.block_on(simulate_main(config));

    // A pending stdin read cannot be cancelled; don't wait for it
    runtime.shutdown_background();
    result
}

/// Console loop against the simulated device server
async fn simulate_main(config: LinkConfig) -> Result<()> {
    let server = MockServer::with_config(MockConfig {
        latency: Duration::from_millis(config.simulator.latency_ms),
        device_count: config.simulator.devices,
    });
    let manager = ConnectionManager::new(
        ManagerConfig {
            client_name: config.server.client_name.clone(),
        },
        Arc::new(server.clone()),
        Handle::current(),
    );
    let haptics = HapticCoordinator::new(manager, config.haptics.clone());
    let mut context = StrengthContext::default();

    info!(
        server = %config.server.url,
        devices = config.simulator.devices,
        latency_ms = config.simulator.latency_ms,
        "Simulated device server ready"
    );

    if config.server.auto_connect {
        if let Err(e) = haptics.connect(&config.server.url) {
            error!(error = %e.format_for_log(), "Auto-connect failed");
        }
    }

    let mut state_rx = haptics.manager().watch_state();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    let mut ticker = tokio::time::interval(config.haptics.tick_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut last_tick = Instant::now();

    // Set up graceful shutdown on Ctrl+C
    let shutdown_signal = tokio::signal::ctrl_c();
    tokio::pin!(shutdown_signal);

    println!("Type 'help' for the list of commands.");

    loop {
        tokio::select! {
            _ = &mut shutdown_signal => {
                info!("Shutdown signal received");
                break;
            }

            _ = ticker.tick() => {
                let now = Instant::now();
                haptics.tick(now - last_tick);
                last_tick = now;
            }

            Ok(()) = state_rx.changed() => {
                let state = *state_rx.borrow_and_update();
                info!(state = %state, "Connection state changed");
            }

            line = lines.next_line() => match line {
                Ok(Some(line)) if line.trim().is_empty() => {}
                Ok(Some(line)) => match line.parse::<ConsoleCommand>() {
                    Ok(ConsoleCommand::Quit) => break,
                    Ok(command) => run_command(&haptics, &server, &config, &mut context, command),
                    Err(e) => println!("error: {e}"),
                },
                Ok(None) => {
                    info!("Input closed");
                    break;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to read console input");
                    break;
                }
            },
        }
    }

    let result = haptics.shutdown().await;
    info!(remote_calls = server.calls().len(), "Simulation finished");
    result
}

/// Apply one console command
fn run_command(
    haptics: &HapticCoordinator,
    server: &MockServer,
    config: &LinkConfig,
    context: &mut StrengthContext,
    command: ConsoleCommand,
) {
    match command {
        ConsoleCommand::Connect(address) => {
            let address = address.as_deref().unwrap_or(&config.server.url);
            if let Err(e) = haptics.connect(address) {
                eprint!("{}", e.format_for_terminal());
            }
        }
        ConsoleCommand::Disconnect => haptics.disconnect(),
        ConsoleCommand::Intensity(intensity) => haptics.set_intensity(intensity),
        ConsoleCommand::Stop => haptics.stop_all(),
        ConsoleCommand::Pulse {
            intensity,
            duration,
        } => haptics.pulse(intensity, duration),
        ConsoleCommand::Hit => note(haptics, NoteEvent::Hit, context),
        ConsoleCommand::Miss => note(haptics, NoteEvent::Miss, context),
        ConsoleCommand::Battery(level) => context.battery = level.clamp(0.0, 1.0),
        ConsoleCommand::Progress(progress) => context.song_progress = progress.clamp(0.0, 1.0),
        ConsoleCommand::Preview => {
            if !haptics.preview() {
                println!("previews are disabled (haptics.preview_enabled)");
            }
        }
        ConsoleCommand::Status => print_status(haptics, server, context),
        ConsoleCommand::Help => println!("{}", console::HELP),
        // Handled by the console loop
        ConsoleCommand::Quit => {}
    }
}

fn note(haptics: &HapticCoordinator, event: NoteEvent, context: &StrengthContext) {
    if !haptics.on_note(event, context) {
        let settings = haptics.settings();
        println!(
            "no pulse (enabled: {}, pulse mode: {})",
            settings.enabled, settings.pulse_mode
        );
    }
}

fn print_status(haptics: &HapticCoordinator, server: &MockServer, context: &StrengthContext) {
    let manager = haptics.manager();
    let current = manager
        .current_task()
        .map(|kind| kind.to_string())
        .unwrap_or_else(|| "-".to_string());
    let pending: Vec<String> = manager
        .pending_tasks()
        .iter()
        .map(|task| task.kind().to_string())
        .collect();

    println!("state:      {}", manager.state());
    if let Some(session) = manager.session() {
        println!("session:    {}", session);
    }
    println!("current:    {}", current);
    println!("pending:    [{}]", pending.join(", "));
    println!("intensity:  {:.2}", haptics.intensity());
    println!(
        "context:    battery {:.2}, progress {:.2}",
        context.battery, context.song_progress
    );
    println!("calls:      {}", server.calls().len());
}

fn handle_config_command(subcommand: ConfigSubcommand) -> Result<()> {
    match subcommand {
        ConfigSubcommand::Show { config } => {
            let cfg = LinkConfig::load(config.as_deref()).unwrap_or_else(|e| exit_with(e));
            println!("{}", cfg.to_toml()?);
        }
        ConfigSubcommand::Init { path, force } => {
            let path = config::init_config(path.as_deref(), force).unwrap_or_else(|e| exit_with(e));
            println!("Configuration file created: {}", path.display());
        }
        ConfigSubcommand::Validate { config } => match LinkConfig::load(config.as_deref()) {
            Ok(_) => println!("Configuration is valid."),
            Err(e) => exit_with(e),
        },
    }

    Ok(())
}
