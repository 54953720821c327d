mod cli;
mod plugin_integration;
mod simulation;

use anyhow::Result;
use clap::Parser;
use cli::CliHandler;
use plugin_integration::PluginSystem;
use simulation::SimulationConfig;
use std::time::Duration;
use timed_flag_plugin::ServerState;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// In-memory game server that drives the Timed Flag On Spawn plugin
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Flag definition list (e.g. "WG=15;ST=0") or path to a .toml config file
    #[arg(short, long, default_value = "")]
    config: String,

    /// Run a timed simulation instead of the command interpreter
    #[arg(long)]
    simulate: bool,

    /// Players connected in the simulation
    #[arg(long, default_value_t = 8)]
    players: i32,

    /// Simulation length in seconds
    #[arg(long, default_value_t = 60)]
    duration: u64,

    /// Milliseconds between server ticks
    #[arg(long, default_value_t = 100)]
    tick_ms: u64,

    /// Server seconds per wall-clock second
    #[arg(long, default_value_t = 1.0)]
    time_scale: f64,

    /// Seed for the simulated player activity
    #[arg(long)]
    seed: Option<u64>,

    /// Flag codes the server accepts; grants of other codes fail
    #[arg(long, value_delimiter = ',')]
    known_flags: Vec<String>,

    /// Command to run instead of the interactive prompt
    command: Vec<String>,
}

fn init_logging() -> WorkerGuard {
    let filter = EnvFilter::builder()
        .with_default_directive(tracing::Level::INFO.into())
        .from_env_lossy();
    let (writer, guard) = tracing_appender::non_blocking(std::io::stderr());

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(writer)
        .init();

    guard
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let _guard = init_logging();
    let args = Args::parse();

    let host = ServerState::new().with_known_flags(args.known_flags.iter().cloned());
    let mut system = PluginSystem::new(host);
    system.initialize(&args.config)?;

    if args.simulate {
        let config = SimulationConfig {
            players: args.players,
            duration: Duration::from_secs(args.duration),
            tick: Duration::from_millis(args.tick_ms.max(1)),
            time_scale: args.time_scale,
            seed: args.seed,
            ..SimulationConfig::default()
        };

        tokio::select! {
            report = simulation::run(&mut system, &config) => {
                report?;
            }
            _ = tokio::signal::ctrl_c() => {
                warn!("Interrupted, stopping simulation");
            }
        }

        info!(
            "Final plugin status: {}",
            serde_json::to_string(&system.event_bus.plugin_status())?
        );
        system.shutdown();
        return Ok(());
    }

    let mut handler = CliHandler::new(system);
    let output = handler.execute_from_args(args.command)?;
    println!("{}", output);

    let mut system = handler.into_system();
    system.shutdown();
    Ok(())
}
