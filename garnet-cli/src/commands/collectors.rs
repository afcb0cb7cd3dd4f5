//! `garnet collectors`: show what `garnet run` would schedule.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use garnet_core::{collectors_from_dir, CollectorDescriptor};
use garnet_daemon::paths::DEFAULT_CONFIG_DIR;

/// Arguments for `garnet collectors`.
#[derive(Args, Debug)]
pub struct CollectorsArgs {
    /// Directory of `*.json` collector definitions.
    #[arg(long, default_value = DEFAULT_CONFIG_DIR)]
    pub config_dir: PathBuf,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl CollectorsArgs {
    pub fn run(self) -> Result<()> {
        let collectors = collectors_from_dir(&self.config_dir).with_context(|| {
            format!(
                "failed to load collectors from {}",
                self.config_dir.display()
            )
        })?;

        if self.json {
            print_json(&collectors)?;
            return Ok(());
        }

        print_table(&self.config_dir, &collectors);
        Ok(())
    }
}

#[derive(Serialize)]
struct CollectorJson {
    name: String,
    command: String,
    interval_secs: u64,
    command_found: bool,
}

#[derive(Tabled)]
struct CollectorTableRow {
    #[tabled(rename = "collector")]
    name: String,
    #[tabled(rename = "command")]
    command: String,
    #[tabled(rename = "every")]
    interval: String,
    #[tabled(rename = "found")]
    found: String,
}

fn print_json(collectors: &[CollectorDescriptor]) -> Result<()> {
    let payload: Vec<CollectorJson> = collectors
        .iter()
        .map(|c| CollectorJson {
            name: c.name.0.clone(),
            command: c.command.display().to_string(),
            interval_secs: c.interval.as_secs(),
            command_found: command_exists(&c.command),
        })
        .collect();
    println!(
        "{}",
        serde_json::to_string_pretty(&payload).context("failed to serialize collectors JSON")?
    );
    Ok(())
}

fn print_table(config_dir: &Path, collectors: &[CollectorDescriptor]) {
    println!(
        "Garnet v{} | {} collectors in {}",
        env!("CARGO_PKG_VERSION"),
        collectors.len(),
        config_dir.display(),
    );

    if collectors.is_empty() {
        println!("No collectors configured.");
        return;
    }

    let rows: Vec<CollectorTableRow> = collectors
        .iter()
        .map(|c| CollectorTableRow {
            name: c.name.0.clone(),
            command: c.command.display().to_string(),
            interval: format!("{}s", c.interval.as_secs()),
            found: if command_exists(&c.command) {
                "yes".green().bold().to_string()
            } else {
                "missing".red().bold().to_string()
            },
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
}

/// Bare names are looked up on `PATH`; anything with a separator is a path.
fn command_exists(command: &Path) -> bool {
    if command.components().count() > 1 || command.is_absolute() {
        return command.is_file();
    }
    std::env::var_os("PATH")
        .map(|paths| std::env::split_paths(&paths).any(|dir| dir.join(command).is_file()))
        .unwrap_or(false)
}
