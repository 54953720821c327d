//! Timed Flag On Spawn
//!
//! A game server plugin that hands every spawning player a randomly chosen flag
//! and, for flags configured with a delay, takes it away again once the delay
//! has elapsed. The host server is reached through the [`HostApi`] trait, and an
//! in-memory [`ServerState`] host is provided for harnesses and tests.

pub mod api_host;
pub mod config;
pub mod definition;
pub mod event_system;
pub mod metadata;
pub mod plugin;
pub mod tracker;

// Re-exports
pub use api_host::{FlagId, HostApi, PlayerId, ServerState};
pub use config::{ExpiryMode, PluginConfig};
pub use definition::{DefinitionError, FlagDefinition};
pub use event_system::{Event, EventBus, EventType};
pub use metadata::PluginMetadata;
pub use plugin::{Plugin, Registrations};
pub use tracker::{FlagStatus, TimedFlagOnSpawn};

/// Result type for plugin operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for plugin system
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Plugin configuration error: {0}")]
    Config(String),
    #[error("Plugin already loaded: {0}")]
    AlreadyLoaded(String),
    #[error("Plugin not found: {0}")]
    NotFound(String),
    #[error("Player not found: {0}")]
    PlayerNotFound(PlayerId),
    #[error("Event system error: {0}")]
    Event(String),
}
