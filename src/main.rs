//! isimip-qc: quality control for ISIMIP output files.
//!
//! Checks every file below the unchecked path against the protocol's naming
//! scheme, JSON schema and rule definitions, optionally fixes what can be
//! fixed, and moves or copies clean files to the checked path.

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

mod check;
mod config;
mod dataset;
mod diagnostic;
mod file;
mod files;
mod fix;
mod ledger;
mod lock;
mod log;
mod model;
mod pipeline;
mod protocol;
mod reencode;
mod ui;

use crate::config::{Config, Settings, Transfer};
use crate::log::LogLevel;
use crate::protocol::Protocol;

#[derive(Parser)]
#[command(name = "isimip-qc")]
#[command(about = "Check ISIMIP output files against the protocol and fix what can be fixed")]
#[command(version)]
struct Cli {
    /// Protocol path, e.g. ISIMIP3b/OutputData/water_global
    schema_path: String,

    /// Path to isimip-qc config (TOML)
    #[arg(short = 'C', long)]
    config_file: Option<PathBuf>,

    /// Root of the files to check
    #[arg(long)]
    unchecked_path: Option<PathBuf>,

    /// Destination root for clean files
    #[arg(long)]
    checked_path: Option<PathBuf>,

    /// Move clean files to the checked path
    #[arg(short = 'm', long = "move", group = "transfer")]
    move_files: bool,

    /// Copy clean files to the checked path
    #[arg(short = 'c', long = "copy", group = "transfer")]
    copy_files: bool,

    /// Protocol root with pattern/, schema/ and definitions/ (repeatable)
    #[arg(long = "protocol-location")]
    protocol_locations: Vec<PathBuf>,

    /// Console log threshold
    #[arg(long, value_enum)]
    log_level: Option<LogLevel>,

    /// Write one log file per checked file below this directory
    #[arg(long)]
    log_path: Option<PathBuf>,

    /// Only process the first file found
    #[arg(short = 'f', long)]
    first_file: bool,

    /// Stop after the first file with warnings
    #[arg(short = 'w', long)]
    stop_on_warnings: bool,

    /// Stop after the first file with errors
    #[arg(short = 'e', long)]
    stop_on_errors: bool,

    /// Fix attributes in place
    #[arg(long)]
    fix: bool,

    /// Re-encode files with broken chunking using nccopy or ncks
    #[arg(long, value_name = "TOOL")]
    fix_datamodel: Option<String>,

    /// Check the data variable against its valid range (reads the payload)
    #[arg(long)]
    minmax: bool,
}

impl Cli {
    /// Merge the command line over the config file.
    fn settings(&self, config: Config) -> Settings {
        let mut settings = Settings::new(&self.schema_path, config);

        if let Some(path) = &self.unchecked_path {
            settings.unchecked_path = path.clone();
        }
        if let Some(path) = &self.checked_path {
            settings.checked_path = Some(path.clone());
        }
        if let Some(path) = &self.log_path {
            settings.log_path = Some(path.clone());
        }
        if let Some(level) = self.log_level {
            settings.log_level = level;
        }
        if !self.protocol_locations.is_empty() {
            settings.protocol_locations = self.protocol_locations.clone();
        }
        if let Some(tool) = &self.fix_datamodel {
            settings.fix_datamodel = Some(tool.clone());
        }

        settings.transfer = match (self.move_files, self.copy_files) {
            (true, _) => Some(Transfer::Move),
            (_, true) => Some(Transfer::Copy),
            _ => None,
        };
        settings.first_file = self.first_file;
        settings.stop_on_warnings = self.stop_on_warnings;
        settings.stop_on_errors = self.stop_on_errors;
        settings.minmax |= self.minmax;
        settings.fix_attributes |= self.fix;
        settings
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(&cli) {
        Ok(reports) => {
            ui::summary(&reports);
            if reports.iter().all(pipeline::FileReport::is_clean) {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<Vec<pipeline::FileReport>> {
    let config = Config::load(cli.config_file.as_deref())?;
    let settings = cli.settings(config);
    let protocol = Protocol::load(&settings.protocol_locations, &settings.schema_path)?;
    pipeline::run(&settings, &protocol)
}
