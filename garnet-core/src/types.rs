//! Domain types for collector definitions.
//!
//! All path fields use `PathBuf`; never `&str` or `String` for filesystem paths.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// A strongly-typed name for a configured collector.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CollectorName(pub String);

impl fmt::Display for CollectorName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for CollectorName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for CollectorName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// On-disk form
// ---------------------------------------------------------------------------

/// One `*.json` file in the config directory.
///
/// ```json
/// { "command": "./sampleCollector", "interval": 5 }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CollectorConfig {
    /// Overrides the name derived from the file stem.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub command: PathBuf,
    /// Seconds between invocations.
    pub interval: u64,
}

// ---------------------------------------------------------------------------
// Runtime form
// ---------------------------------------------------------------------------

/// An immutable collector definition: what to run and how often.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectorDescriptor {
    pub name: CollectorName,
    pub command: PathBuf,
    pub interval: Duration,
}

impl CollectorDescriptor {
    pub fn new(
        name: impl Into<CollectorName>,
        command: impl Into<PathBuf>,
        interval: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            interval,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
