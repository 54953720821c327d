use crate::plugin_integration::PluginSystem;
use anyhow::{Context, Result, anyhow, bail};
use std::io::{self, BufRead, Write};
use timed_flag_plugin::{Event, PlayerId};

const HELP: &str = r#"Available commands:

Players:
  join <id> [callsign]      - connect a player
  part <id>                 - disconnect a player
  spawn <id>                - spawn a player (a flag is handed out)
  kill <id>                 - kill a player, dropping their flag
  drop <id>                 - drop the player's flag
  pickup <id> <flag>        - pick up a flag through normal play

Server:
  advance <seconds>         - move the server clock forward
  tick                      - run one server tick
  update <id>               - send a player update for one player
  event <json>              - deliver a raw event, e.g. {"type":"tick"}

Queries:
  players                   - list connected players
  status [id]               - plugin status, or one player's tracked flag
  server                    - plugin system summary
  help                      - this text"#;

/// CLI command handler for driving the server by hand
pub struct CliHandler {
    system: PluginSystem,
}

impl CliHandler {
    /// Create a new CLI handler
    pub fn new(system: PluginSystem) -> Self {
        Self { system }
    }

    /// Hand the plugin system back, e.g. for shutdown
    pub fn into_system(self) -> PluginSystem {
        self.system
    }

    /// Parse and execute a command line
    pub fn execute_command(&mut self, command_line: &str) -> Result<String> {
        let trimmed = command_line.trim();

        // Skip empty lines and comments
        if trimmed.is_empty() || trimmed.starts_with('#') {
            return Ok(String::new());
        }

        let (command, rest) = trimmed
            .split_once(char::is_whitespace)
            .map(|(command, rest)| (command, rest.trim()))
            .unwrap_or((trimmed, ""));
        let args: Vec<&str> = rest.split_whitespace().collect();

        match command.to_lowercase().as_str() {
            "help" => Ok(HELP.to_string()),
            "join" => {
                let player_id = player_arg(&args)?;
                let callsign = args
                    .get(1)
                    .map(|callsign| callsign.to_string())
                    .unwrap_or_else(|| format!("player{}", player_id));
                self.system.join(player_id, &callsign);
                Ok(format!("{} joined as player {}", callsign, player_id))
            }
            "part" => {
                let player_id = player_arg(&args)?;
                self.system.part(player_id)?;
                Ok(format!("player {} left", player_id))
            }
            "spawn" => {
                let player_id = player_arg(&args)?;
                self.system.spawn(player_id)?;
                Ok(self.describe_player(player_id))
            }
            "kill" => {
                let player_id = player_arg(&args)?;
                let dropped = self.system.kill(player_id)?;
                Ok(match dropped {
                    Some(flag) => format!("player {} died holding {} ({})", player_id, flag.flag, flag.id),
                    None => format!("player {} died", player_id),
                })
            }
            "drop" => {
                let player_id = player_arg(&args)?;
                Ok(match self.system.drop_flag(player_id)? {
                    Some(flag) => format!("player {} dropped {} ({})", player_id, flag.flag, flag.id),
                    None => format!("player {} holds no flag", player_id),
                })
            }
            "pickup" => {
                let player_id = player_arg(&args)?;
                let flag = args.get(1).context("usage: pickup <id> <flag>")?;
                if self.system.pick_up(player_id, flag)? {
                    Ok(self.describe_player(player_id))
                } else {
                    Ok(format!("player {} cannot pick up {}", player_id, flag))
                }
            }
            "advance" => {
                let seconds: f64 = args
                    .first()
                    .context("usage: advance <seconds>")?
                    .parse()
                    .context("seconds must be a number")?;
                if seconds < 0.0 {
                    bail!("the clock only moves forward");
                }
                self.system.host.advance_time(seconds);
                Ok(format!("server time is {}", self.system.status().server_time))
            }
            "tick" => {
                let before = self.system.status().flags_held;
                self.system.tick();
                let after = self.system.status().flags_held;
                Ok(format!("tick: {} flags taken", before.saturating_sub(after)))
            }
            "update" => {
                let player_id = player_arg(&args)?;
                if !self.system.update(player_id)? {
                    bail!("player {} is not alive", player_id);
                }
                Ok(self.describe_player(player_id))
            }
            "event" => {
                let event = Event::from_json(rest)?;
                self.system.handle_event(&event);
                Ok(format!("delivered {:?}", event.event_type()))
            }
            "players" => {
                let lines: Vec<String> = self
                    .system
                    .host
                    .players()
                    .map(|player| self.describe_player(player.id))
                    .collect();
                if lines.is_empty() {
                    Ok("no players connected".to_string())
                } else {
                    Ok(lines.join("\n"))
                }
            }
            "status" => match args.first() {
                Some(_) => {
                    let player_id = player_arg(&args)?;
                    let status = self.system.event_bus.plugin_status();
                    let players = status
                        .as_object()
                        .into_iter()
                        .flat_map(|plugins| plugins.values())
                        .filter_map(|plugin| plugin["players"].as_array())
                        .flatten()
                        .filter(|entry| entry["player_id"] == player_id)
                        .cloned()
                        .collect::<Vec<_>>();
                    Ok(serde_json::to_string_pretty(&players)?)
                }
                None => Ok(serde_json::to_string_pretty(
                    &self.system.event_bus.plugin_status(),
                )?),
            },
            "server" => {
                let status = self.system.status();
                Ok(format!(
                    "initialized: {}\nplugins: {} ({} subscriptions, {} on tick, {} on player update)\nplayers: {} ({} holding flags)\nserver time: {}",
                    status.initialized,
                    status.loaded_plugins,
                    status.event_subscriptions,
                    status.tick_subscribers,
                    status.update_subscribers,
                    status.connected_players,
                    status.flags_held,
                    status.server_time,
                ))
            }
            other => Err(anyhow!("unknown command: {}", other)),
        }
    }

    /// Start interactive CLI mode
    pub fn start_interactive(&mut self) -> Result<()> {
        println!("Timed Flag On Spawn server CLI");
        println!("Type 'help' for commands, 'exit' to quit");

        let stdin = io::stdin();
        let mut lines = stdin.lock().lines();
        loop {
            print!("> ");
            io::stdout().flush()?;

            let Some(line) = lines.next() else {
                break;
            };
            let command_line = line?;
            let command_line = command_line.trim();

            if command_line == "exit" || command_line == "quit" {
                println!("Leaving CLI");
                break;
            }

            match self.execute_command(command_line) {
                Ok(result) => {
                    if !result.is_empty() {
                        println!("{}", result);
                    }
                }
                Err(e) => println!("error: {}", e),
            }
        }

        Ok(())
    }

    /// Execute command from command line arguments
    pub fn execute_from_args(&mut self, args: Vec<String>) -> Result<String> {
        if args.is_empty() {
            return self.start_interactive().map(|_| "CLI mode exited".to_string());
        }

        let command_line = args.join(" ");
        self.execute_command(&command_line)
    }

    fn describe_player(&self, player_id: PlayerId) -> String {
        match self.system.host.player(player_id) {
            Some(player) => {
                let state = if player.alive { "alive" } else { "dead" };
                match &player.flag {
                    Some(flag) => format!(
                        "player {} ({}) {} holding {} ({})",
                        player.id, player.callsign, state, flag.flag, flag.id
                    ),
                    None => format!("player {} ({}) {} without a flag", player.id, player.callsign, state),
                }
            }
            None => format!("player {} is not connected", player_id),
        }
    }
}

fn player_arg(args: &[&str]) -> Result<PlayerId> {
    args.first()
        .context("missing player id")?
        .parse()
        .context("player id must be an integer")
}
