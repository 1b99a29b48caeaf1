//! Per-file leveled logging.
//!
//! Each checked file gets a [`FileLog`]: a console stream filtered by the
//! configured level, and optionally a persisted `<relative path>.log` that
//! records everything at INFO and above. Next to it, `<relative path>.json`
//! holds the final ledger in severity order.

use crate::diagnostic::Severity;
use crate::ledger::Ledger;
use anyhow::{Context, Result};
use chrono::Local;
use owo_colors::OwoColorize;
use serde::Deserialize;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Console log threshold
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Default,
    Deserialize,
    clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl From<Severity> for LogLevel {
    fn from(severity: Severity) -> Self {
        match severity {
            Severity::Info => Self::Info,
            Severity::Warning => Self::Warn,
            Severity::Error | Severity::Critical => Self::Error,
        }
    }
}

fn label(severity: Severity) -> &'static str {
    match severity {
        Severity::Info => "INFO",
        Severity::Warning => "WARNING",
        Severity::Error => "ERROR",
        Severity::Critical => "CRITICAL",
    }
}

fn timestamp() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S,%3f").to_string()
}

/// Log of one file
pub struct FileLog {
    name: String,
    level: LogLevel,
    sink: Option<BufWriter<File>>,
    report: Option<PathBuf>,
}

impl FileLog {
    /// Console-only log
    pub fn stderr(name: impl Into<String>, level: LogLevel) -> Self {
        Self {
            name: name.into(),
            level,
            sink: None,
            report: None,
        }
    }

    /// Console log plus `<log_root>/<relative>.log`, appended to.
    pub fn open(relative: &Path, level: LogLevel, log_root: Option<&Path>) -> Result<Self> {
        let mut log = Self::stderr(relative.display().to_string(), level);
        if let Some(root) = log_root {
            let log_file = root.join(relative).with_extension("log");
            if let Some(parent) = log_file.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&log_file)
                .with_context(|| format!("Failed to open log file: {}", log_file.display()))?;
            log.sink = Some(BufWriter::new(file));
            log.report = Some(log_file.with_extension("json"));
        }
        Ok(log)
    }

    pub fn record(&mut self, severity: Severity, message: &str) {
        let time = timestamp();
        if LogLevel::from(severity) >= self.level {
            let label = label(severity);
            if crate::ui::use_colors() {
                let label = match severity {
                    Severity::Info => label.green().to_string(),
                    Severity::Warning => label.yellow().to_string(),
                    Severity::Error => label.red().to_string(),
                    Severity::Critical => label.red().bold().to_string(),
                };
                eprintln!("[{time}] {label} {}: {message}", self.name.cyan());
            } else {
                eprintln!("[{time}] {label} {}: {message}", self.name);
            }
        }
        if let Some(sink) = self.sink.as_mut() {
            // a broken log file must not abort the check
            let _ = writeln!(sink, "[{time}] {}: {message}", label(severity));
        }
    }

    pub fn info(&mut self, message: &str) {
        self.record(Severity::Info, message);
    }

    pub fn debug(&mut self, message: &str) {
        if self.level == LogLevel::Debug {
            eprintln!("[{}] DEBUG {}: {message}", timestamp(), self.name);
        }
    }

    /// Write the ledger export next to the persisted log. A no-op for
    /// console-only logs.
    pub fn write_ledger(&mut self, ledger: &Ledger) {
        let Some(path) = self.report.clone() else {
            return;
        };
        let written = serde_json::to_string_pretty(&ledger.export())
            .map_err(anyhow::Error::from)
            .and_then(|json| {
                fs::write(&path, json + "\n")
                    .with_context(|| format!("Failed to write {}", path.display()))
            });
        if let Err(e) = written {
            self.record(Severity::Error, &format!("Could not write ledger: {e:#}"));
        }
    }

    /// Flush and release the persisted sink.
    pub fn close(mut self) {
        if let Some(mut sink) = self.sink.take() {
            let _ = sink.flush();
        }
    }
}
