use crate::plugin_integration::PluginSystem;
use anyhow::Result;
use rand::{Rng, SeedableRng, rngs::StdRng};
use std::time::Duration;
use timed_flag_plugin::{HostApi, PlayerId};
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info};

/// Parameters of a timed simulation run
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    /// Players connected at start
    pub players: PlayerId,
    /// Wall-clock length of the run
    pub duration: Duration,
    /// Wall-clock time between server ticks
    pub tick: Duration,
    /// Server seconds per wall-clock second
    pub time_scale: f64,
    /// Likelihood multiplier for random deaths, drops and respawns; 0 disables them
    pub activity: f64,
    /// Seed for the random activity
    pub seed: Option<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            players: 8,
            duration: Duration::from_secs(60),
            tick: Duration::from_millis(100),
            time_scale: 1.0,
            activity: 1.0,
            seed: None,
        }
    }
}

/// Counters collected during a run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimulationReport {
    pub ticks: u64,
    pub spawns: u64,
    pub deaths: u64,
    pub drops: u64,
    pub flags_taken: u64,
}

const DEATH_CHANCE: f64 = 0.02;
const DROP_CHANCE: f64 = 0.01;
const RESPAWN_CHANCE: f64 = 0.2;

/// Run the plugin against random player activity until the duration elapses.
pub async fn run(system: &mut PluginSystem, config: &SimulationConfig) -> Result<SimulationReport> {
    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };
    let mut report = SimulationReport::default();

    info!(
        "Simulating {} players for {:?} (tick {:?}, time scale {})",
        config.players, config.duration, config.tick, config.time_scale
    );

    let start = Instant::now();
    let base_time = system.host.current_time();

    for player_id in 1..=config.players {
        system.join(player_id, &format!("bot{}", player_id));
        system.spawn(player_id)?;
        report.spawns += 1;
    }

    let mut interval = time::interval(config.tick);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    while start.elapsed() < config.duration {
        interval.tick().await;

        let elapsed = start.elapsed().as_secs_f64() * config.time_scale;
        system.host.set_time(base_time + elapsed);

        for player_id in system.host.player_index_list() {
            if system.host.player_is_alive(player_id) {
                if rng.random_bool((DEATH_CHANCE * config.activity).clamp(0.0, 1.0)) {
                    system.kill(player_id)?;
                    report.deaths += 1;
                } else if system.host.player_flag_id(player_id).is_some()
                    && rng.random_bool((DROP_CHANCE * config.activity).clamp(0.0, 1.0))
                {
                    system.drop_flag(player_id)?;
                    report.drops += 1;
                }
            } else if rng.random_bool((RESPAWN_CHANCE * config.activity).clamp(0.0, 1.0)) {
                system.spawn(player_id)?;
                report.spawns += 1;
            }
        }

        let before = system.status().flags_held;
        system.tick();
        let taken = before.saturating_sub(system.status().flags_held);
        if taken > 0 {
            debug!("{} flags taken at {:.1}", taken, system.host.current_time());
        }
        report.flags_taken += taken as u64;
        report.ticks += 1;
    }

    info!(
        "Simulation finished after {} ticks: {} spawns, {} deaths, {} drops, {} flags taken",
        report.ticks, report.spawns, report.deaths, report.drops, report.flags_taken
    );
    Ok(report)
}
