use serde::{Deserialize, Serialize};
use std::num::ParseIntError;
use tracing::error;

/// Separator between flag definitions in a definition list
pub const LIST_SEPARATOR: char = ';';

/// Separator between the flag code and its delay
pub const VALUE_SEPARATOR: char = '=';

/// A flag that may be handed out on spawn, and for how long
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagDefinition {
    /// Flag abbreviation as understood by the host (e.g. `WG`)
    pub flag: String,
    /// Seconds before the flag is taken back; `0` keeps it indefinitely
    pub delay: u32,
}

impl FlagDefinition {
    /// Create a new flag definition
    pub fn new(flag: impl Into<String>, delay: u32) -> Self {
        Self {
            flag: flag.into(),
            delay,
        }
    }

    /// Whether this flag is ever taken back
    pub fn expires(&self) -> bool {
        self.delay > 0
    }
}

/// Reasons a single flag definition is rejected
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DefinitionError {
    #[error("invalid flag definition: {0}")]
    Syntax(String),
    #[error("invalid delay in flag definition {definition}: {source}")]
    Delay {
        definition: String,
        #[source]
        source: ParseIntError,
    },
}

/// Parse a single `<flag>=<seconds>` definition, e.g. `WG=15`.
pub fn parse_flag_definition(definition: &str) -> Result<FlagDefinition, DefinitionError> {
    let parts: Vec<&str> = definition
        .split(VALUE_SEPARATOR)
        .filter(|part| !part.is_empty())
        .collect();

    if !definition.contains(VALUE_SEPARATOR) || parts.len() != 2 {
        return Err(DefinitionError::Syntax(definition.to_string()));
    }

    let flag = parts[0].trim();
    if flag.is_empty() {
        return Err(DefinitionError::Syntax(definition.to_string()));
    }

    let delay = parts[1]
        .trim()
        .parse::<u32>()
        .map_err(|source| DefinitionError::Delay {
            definition: definition.to_string(),
            source,
        })?;

    Ok(FlagDefinition::new(flag, delay))
}

/// Parse a semicolon separated definition list.
///
/// Malformed entries are logged and skipped; the remaining entries keep their
/// input order. An empty result means no flag will ever be handed out, which
/// callers are expected to report.
pub fn parse_flag_list(configuration: &str) -> Vec<FlagDefinition> {
    let candidates: Vec<&str> = if configuration.contains(LIST_SEPARATOR) {
        configuration
            .split(LIST_SEPARATOR)
            .filter(|candidate| !candidate.is_empty())
            .collect()
    } else {
        vec![configuration]
    };

    candidates
        .into_iter()
        .filter_map(|candidate| match parse_flag_definition(candidate) {
            Ok(definition) => Some(definition),
            Err(DefinitionError::Syntax(text)) => {
                error!("A flag definition syntax is as follows: <flag abbr>=<time in seconds>");
                error!("    error found in: {}", text);
                None
            }
            Err(DefinitionError::Delay { source, .. }) => {
                error!("The time delay for flags being taken must be an integer");
                error!("    got the following error: {}", source);
                None
            }
        })
        .collect()
}
