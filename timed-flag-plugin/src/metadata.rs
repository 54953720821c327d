use std::fmt;

/// Plugin name and version numbering
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginMetadata {
    pub name: &'static str,
    pub major: u32,
    pub minor: u32,
    pub rev: u32,
    pub build: u32,
}

impl PluginMetadata {
    /// Version without the build number, e.g. `1.0.0`
    pub fn version(&self) -> String {
        format!("{}.{}.{}", self.major, self.minor, self.rev)
    }
}

/// Formats as `<name> <major>.<minor>.<rev> (<build>)`
impl fmt::Display for PluginMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} ({})", self.name, self.version(), self.build)
    }
}
