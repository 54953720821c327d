use crate::{Event, EventType, HostApi};
use std::collections::BTreeSet;

/// Contract between the host and a loaded plugin
pub trait Plugin {
    /// Display name, including version
    fn name(&self) -> String;

    /// Called once after loading with the plugin's config string
    fn init(&mut self, config: &str, registrations: &mut Registrations);

    /// Called once before unloading
    fn cleanup(&mut self, registrations: &mut Registrations);

    /// Called for every event the plugin registered for
    fn event(&mut self, host: &mut dyn HostApi, event: &Event);

    /// Runtime status report
    fn status(&self) -> serde_json::Value {
        serde_json::Value::Null
    }
}

/// Event types a plugin has asked to receive
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Registrations {
    event_types: BTreeSet<EventType>,
}

impl Registrations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start receiving an event type
    pub fn register(&mut self, event_type: EventType) {
        self.event_types.insert(event_type);
    }

    /// Stop receiving an event type
    pub fn unregister(&mut self, event_type: EventType) {
        self.event_types.remove(&event_type);
    }

    /// Stop receiving everything
    pub fn flush(&mut self) {
        self.event_types.clear();
    }

    pub fn is_registered(&self, event_type: EventType) -> bool {
        self.event_types.contains(&event_type)
    }

    pub fn iter(&self) -> impl Iterator<Item = EventType> + '_ {
        self.event_types.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.event_types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.event_types.is_empty()
    }
}
