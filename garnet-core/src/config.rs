//! Collector definitions discovered from a config directory.
//!
//! # Layout
//!
//! ```text
//! config/
//!   cpu.json      {"command": "./collectors/cpu", "interval": 5}
//!   disk.json     {"command": "/usr/local/bin/disk-usage", "interval": 60}
//! ```
//!
//! Each `*.json` file directly inside the directory is one collector, named
//! after its file stem unless the file sets `name`. Files are visited in
//! file-name order so the resulting sequence is deterministic. Any unreadable
//! or malformed entry fails the whole load.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;
use crate::types::{CollectorConfig, CollectorDescriptor, CollectorName};

/// Load every collector defined in `dir`.
pub fn collectors_from_dir(dir: &Path) -> Result<Vec<CollectorDescriptor>, ConfigError> {
    let io = |source| ConfigError::Io {
        path: dir.to_path_buf(),
        source,
    };

    let mut paths: Vec<PathBuf> = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(io)? {
        let entry = entry.map_err(io)?;
        let path = entry.path();
        if path.is_file() && is_json(&path) {
            paths.push(path);
        }
    }
    paths.sort();

    let mut seen = HashSet::new();
    let mut collectors = Vec::with_capacity(paths.len());
    for path in paths {
        let descriptor = load_collector(&path)?;
        if !seen.insert(descriptor.name.clone()) {
            return Err(ConfigError::DuplicateName {
                name: descriptor.name.0,
                path,
            });
        }
        collectors.push(descriptor);
    }
    Ok(collectors)
}

/// Parse a single collector file into a descriptor.
pub fn load_collector(path: &Path) -> Result<CollectorDescriptor, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let config: CollectorConfig =
        serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

    if config.interval == 0 {
        return Err(ConfigError::InvalidInterval {
            path: path.to_path_buf(),
        });
    }
    if config.command.as_os_str().is_empty() {
        return Err(ConfigError::EmptyCommand {
            path: path.to_path_buf(),
        });
    }

    let name = match config.name {
        Some(name) => CollectorName::from(name),
        None => CollectorName::from(file_stem(path)),
    };

    Ok(CollectorDescriptor {
        name,
        command: config.command,
        interval: Duration::from_secs(config.interval),
    })
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}
