//! Per-file orchestration and the run loop.
//!
//! A file moves through `Discovered -> Matched -> Opened -> Checked -> Fixed
//! -> Classified`. A naming mismatch stops it before the dataset is opened.
//! Failing to open (or reopen after a re-encode) is critical for that file
//! only; the run continues with the next one.

use crate::check::{Rule, match_naming_scheme};
use crate::config::{Settings, Transfer};
use crate::dataset::OpenMode;
use crate::diagnostic::{Diagnostic, DiagnosticCode, Severity};
use crate::file::FileContext;
use crate::files::{copy_file, move_file, walk_files};
use crate::fix::{FixOptions, apply_fixes};
use crate::ledger::Ledger;
use crate::lock::RunLock;
use crate::log::FileLog;
use crate::protocol::Protocol;
use crate::ui;
use anyhow::Result;
use std::path::{Path, PathBuf};

/// Final classification of one file
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum FileStatus {
    /// No warnings, errors or criticals remain
    Clean,
    /// Checked, but findings remain
    Dirty,
    /// The name did not match the naming scheme
    Rejected,
    /// The dataset could not be opened
    Failed,
}

/// Diagnostic counts per severity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counts {
    pub info: usize,
    pub warnings: usize,
    pub errors: usize,
    pub criticals: usize,
}

impl Counts {
    pub fn of(ledger: &Ledger) -> Self {
        Self {
            info: ledger.count(Severity::Info),
            warnings: ledger.count(Severity::Warning),
            errors: ledger.count(Severity::Error),
            criticals: ledger.count(Severity::Critical),
        }
    }
}

/// Outcome of one file, for the summary
#[derive(Debug, Clone)]
pub struct FileReport {
    /// Path relative to the unchecked root
    pub path: PathBuf,
    pub status: FileStatus,
    pub counts: Counts,
    /// Diagnostics resolved by the fix stages
    pub fixed: usize,
}

impl FileReport {
    pub fn is_clean(&self) -> bool {
        self.status == FileStatus::Clean
    }
}

fn classify(ledger: &Ledger) -> FileStatus {
    if ledger.has_criticals() {
        FileStatus::Failed
    } else if ledger.is_clean() {
        FileStatus::Clean
    } else {
        FileStatus::Dirty
    }
}

/// Check, fix and classify one file. Returns the status and the number of
/// resolved diagnostics. The dataset is closed (and fixes persisted) on return.
pub fn check_file(
    file: &mut FileContext,
    protocol: &Protocol,
    settings: &Settings,
) -> (FileStatus, usize) {
    match match_naming_scheme(&file.abs_path, &protocol.pattern) {
        Ok(specifiers) => {
            let rendered = serde_json::to_string(&specifiers).unwrap_or_default();
            file.specifiers = specifiers;
            file.record(Diagnostic::new(
                DiagnosticCode::I0101FileMatched,
                format!("File matched: {rendered}"),
            ));
        }
        Err(diagnostic) => {
            file.record(diagnostic);
            return (FileStatus::Rejected, 0);
        }
    }

    let options = FixOptions::from_settings(settings);
    let mode = if options.enabled() {
        OpenMode::ReadWrite
    } else {
        OpenMode::Read
    };
    if let Err(e) = file.open(mode) {
        file.record(Diagnostic::new(
            DiagnosticCode::C0101OpenFailed,
            format!("Could not open file: {e}"),
        ));
        return (FileStatus::Failed, 0);
    }

    file.evaluate(&Rule::ALL, protocol, settings);
    let outcome = apply_fixes(file, &options);

    if outcome.reencoded {
        match file.reopen() {
            Ok(()) => {
                file.log.info("Re-checking the re-encoded file");
                file.ledger.discard_from(&Rule::PAYLOAD);
                file.evaluate(&Rule::PAYLOAD, protocol, settings);
            }
            Err(e) => {
                file.record(Diagnostic::new(
                    DiagnosticCode::C0102ReopenFailed,
                    format!("Could not reopen the re-encoded file: {e}"),
                ));
            }
        }
    }

    if let Err(e) = file.close_dataset() {
        file.record(Diagnostic::new(
            DiagnosticCode::E0503SyncFailed,
            format!("Could not write fixes to the file: {e}"),
        ));
    }

    for diagnostic in file.ledger.iter().filter(|d| d.severity != Severity::Info) {
        file.log.debug(&format!("remaining {diagnostic}"));
    }
    (classify(&file.ledger), outcome.fixed)
}

fn transfer(settings: &Settings, relative: &Path, source: &Path) -> Result<()> {
    let (Some(transfer), Some(checked)) = (settings.transfer, &settings.checked_path) else {
        return Ok(());
    };
    let target = checked.join(relative);
    match transfer {
        Transfer::Move => {
            move_file(source, &target)?;
            ui::transferred("Moved", &target);
        }
        Transfer::Copy => {
            copy_file(source, &target)?;
            ui::transferred("Copied", &target);
        }
    }
    Ok(())
}

fn stop_reason(settings: &Settings, counts: &Counts) -> Option<&'static str> {
    if settings.stop_on_errors && counts.errors + counts.criticals > 0 {
        Some("file has errors (--stop-on-errors)")
    } else if settings.stop_on_warnings && counts.warnings > 0 {
        Some("file has warnings (--stop-on-warnings)")
    } else {
        None
    }
}

/// Check every file below the unchecked root.
pub fn run(settings: &Settings, protocol: &Protocol) -> Result<Vec<FileReport>> {
    let root = &settings.unchecked_path;
    if settings.transfer.is_some() && settings.checked_path.is_none() {
        anyhow::bail!("--move and --copy require a checked path");
    }
    let _lock = RunLock::acquire(settings)?;

    let mut reports = Vec::new();
    for abs_path in walk_files(root) {
        let relative = abs_path
            .strip_prefix(root)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| abs_path.clone());

        if !protocol.pattern.accepts_suffix(&abs_path) {
            ui::wrong_suffix(&relative, protocol.pattern.preferred_suffix());
            continue;
        }

        ui::checking(&relative);
        let log = FileLog::open(&relative, settings.log_level, settings.log_path.as_deref())?;
        let mut file = FileContext::new(&abs_path, root, log);
        let (mut status, fixed) = check_file(&mut file, protocol, settings);
        ui::verdict(status == FileStatus::Clean);

        if status == FileStatus::Clean {
            if let Err(e) = transfer(settings, &file.path, &file.abs_path) {
                file.record(Diagnostic::new(
                    DiagnosticCode::E0601TransferFailed,
                    format!("Could not transfer file: {e:#}"),
                ));
                status = classify(&file.ledger);
            }
        }

        let report = FileReport {
            path: file.path.clone(),
            status,
            counts: Counts::of(&file.ledger),
            fixed,
        };
        file.close();

        let stop = stop_reason(settings, &report.counts);
        reports.push(report);
        if let Some(reason) = stop {
            ui::stopped(reason);
            break;
        }
        if settings.first_file {
            break;
        }
    }
    Ok(reports)
}
