//! State of one file while it moves through the pipeline.

use crate::check::{Rule, RuleContext, run_rules};
use crate::config::Settings;
use crate::dataset::{Dataset, DatasetError, OpenMode, open_dataset};
use crate::diagnostic::Diagnostic;
use crate::ledger::Ledger;
use crate::log::FileLog;
use crate::model::{Metadata, Specifiers};
use crate::protocol::Protocol;
use std::path::{Path, PathBuf};

/// One file under check.
///
/// Owns the only handle to its dataset. The handle is closed exactly once,
/// either by [`FileContext::close_dataset`] or when reopening after a
/// re-encode.
pub struct FileContext {
    /// Path relative to the unchecked root
    pub path: PathBuf,
    pub abs_path: PathBuf,
    pub specifiers: Specifiers,
    pub metadata: Metadata,
    pub ledger: Ledger,
    pub log: FileLog,
    dataset: Option<Box<dyn Dataset>>,
    mode: OpenMode,
}

impl FileContext {
    pub fn new(abs_path: &Path, root: &Path, log: FileLog) -> Self {
        let path = abs_path
            .strip_prefix(root)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| abs_path.to_path_buf());
        Self {
            path,
            abs_path: abs_path.to_path_buf(),
            specifiers: Specifiers::new(),
            metadata: Metadata::default(),
            ledger: Ledger::new(),
            log,
            dataset: None,
            mode: OpenMode::Read,
        }
    }

    /// Log a diagnostic and add it to the ledger.
    pub fn record(&mut self, diagnostic: Diagnostic) {
        self.log.record(diagnostic.severity, &diagnostic.message);
        if let Some(fix) = &diagnostic.fix {
            self.log.debug(&format!("[{}] fix: {fix}", diagnostic.code.code()));
        }
        if let Some(detail) = &diagnostic.detail {
            self.log.debug(detail);
        }
        self.ledger.append(diagnostic);
    }

    /// Evaluate `rules` against the open dataset and record what they find.
    pub fn evaluate(&mut self, rules: &[Rule], protocol: &Protocol, settings: &Settings) {
        let Some(dataset) = self.dataset() else {
            return;
        };
        let ctx = RuleContext {
            metadata: &self.metadata,
            dataset,
            specifiers: &self.specifiers,
            protocol,
            settings,
        };
        let diagnostics = run_rules(rules, &ctx);
        for diagnostic in diagnostics {
            self.record(diagnostic);
        }
    }

    /// Open the dataset and take the metadata snapshot.
    pub fn open(&mut self, mode: OpenMode) -> Result<(), DatasetError> {
        let dataset = open_dataset(&self.abs_path, mode)?;
        self.metadata = Metadata::read(dataset.as_ref());
        self.dataset = Some(dataset);
        self.mode = mode;
        self.log.info(&format!("Open {}.", self.abs_path.display()));
        Ok(())
    }

    /// Release the current handle and open the file again with a fresh
    /// snapshot, in the same mode.
    pub fn reopen(&mut self) -> Result<(), DatasetError> {
        self.close_dataset()?;
        self.open(self.mode)
    }

    pub fn is_open(&self) -> bool {
        self.dataset.is_some()
    }

    pub fn dataset(&self) -> Option<&dyn Dataset> {
        self.dataset.as_deref()
    }

    pub fn dataset_mut(&mut self) -> Option<&mut (dyn Dataset + 'static)> {
        self.dataset.as_deref_mut()
    }

    /// Persist pending attribute writes.
    pub fn sync(&mut self) -> Result<(), DatasetError> {
        match self.dataset.as_mut() {
            Some(dataset) => dataset.sync(),
            None => Ok(()),
        }
    }

    /// Persist pending writes and release the handle. A no-op if nothing is open.
    pub fn close_dataset(&mut self) -> Result<(), DatasetError> {
        if let Some(dataset) = self.dataset.take() {
            dataset.close()?;
            self.log.info(&format!("Close {}.", self.abs_path.display()));
        }
        Ok(())
    }

    /// Close the dataset if still open, write the ledger report, then close
    /// the log.
    pub fn close(mut self) {
        if let Err(e) = self.close_dataset() {
            self.log.record(
                crate::diagnostic::Severity::Error,
                &format!("Could not close dataset: {e}"),
            );
        }
        self.log.write_ledger(&self.ledger);
        self.log.close();
    }
}
