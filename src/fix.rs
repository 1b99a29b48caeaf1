//! Fix stages.
//!
//! 1. attribute fixes attached to info diagnostics
//! 2. attribute fixes attached to warnings
//! 3. a full re-encode, only if a remaining warning needs one
//!
//! Each stage takes its bucket out of the ledger and puts back what it could
//! not resolve. Stage 3 runs after the in-place writes are synced so the
//! re-encoded file carries them.

use crate::config::{Grid, ReencodeConfig, Settings};
use crate::dataset::{AttrValue, Target};
use crate::diagnostic::{Diagnostic, DiagnosticCode, Remediation, Severity};
use crate::file::FileContext;
use crate::reencode::reencode_in_place;

/// Which fixes a run may apply
#[derive(Debug, Clone, Copy)]
pub struct FixOptions<'a> {
    pub attributes: bool,
    pub datamodel: Option<&'a str>,
    pub reencode: &'a ReencodeConfig,
    pub grid: Grid,
}

impl<'a> FixOptions<'a> {
    pub fn from_settings(settings: &'a Settings) -> Self {
        Self {
            attributes: settings.fix_attributes,
            datamodel: settings.fix_datamodel.as_deref(),
            reencode: &settings.reencode,
            grid: settings.grid,
        }
    }

    /// True if any stage may write to the file
    pub fn enabled(&self) -> bool {
        self.attributes || self.datamodel.is_some()
    }
}

/// What the fix stages did to one file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FixOutcome {
    /// Diagnostics resolved
    pub fixed: usize,
    /// The file was replaced by a re-encoded copy
    pub reencoded: bool,
}

/// Run the fix stages in order.
pub fn apply_fixes(file: &mut FileContext, options: &FixOptions<'_>) -> FixOutcome {
    let mut outcome = FixOutcome::default();

    if options.attributes {
        outcome.fixed += fix_attributes(file, Severity::Info);
        outcome.fixed += fix_attributes(file, Severity::Warning);
    }

    if let Some(tool) = options.datamodel {
        if let Some(resolved) = fix_datamodel(file, tool, options) {
            outcome.fixed += resolved;
            outcome.reencoded = true;
        }
    }
    outcome
}

fn attribute_fix(diagnostic: &Diagnostic) -> Option<(String, String, AttrValue)> {
    match &diagnostic.fix {
        Some(Remediation::SetVariableAttribute {
            variable,
            name,
            value,
        }) => Some((variable.clone(), name.clone(), value.clone())),
        _ => None,
    }
}

fn log_fixed(file: &mut FileContext, diagnostic: &Diagnostic) {
    let message = match &diagnostic.fix {
        Some(fix) => format!("Fixed [{}] {} ({fix})", diagnostic.code.code(), diagnostic.message),
        None => format!("Fixed [{}] {}", diagnostic.code.code(), diagnostic.message),
    };
    file.record(Diagnostic::new(DiagnosticCode::I0104Fixed, message));
}

/// Stages 1 and 2: write attributes in place.
fn fix_attributes(file: &mut FileContext, severity: Severity) -> usize {
    let pending = file.ledger.take(severity);
    let mut unresolved = Vec::with_capacity(pending.len());
    let mut resolved = Vec::new();

    for diagnostic in pending {
        let Some((variable, name, value)) = attribute_fix(&diagnostic) else {
            unresolved.push(diagnostic);
            continue;
        };
        let Some(dataset) = file.dataset_mut() else {
            unresolved.push(diagnostic);
            continue;
        };
        match dataset.write_attribute(Target::Variable(&variable), &name, value) {
            Ok(()) => resolved.push(diagnostic),
            Err(e) => {
                file.record(Diagnostic::new(
                    DiagnosticCode::E0501FixFailed,
                    format!("Could not set \"{name}\" of \"{variable}\": {e}"),
                ));
                unresolved.push(diagnostic);
            }
        }
    }

    file.ledger.restore(severity, unresolved);
    for diagnostic in &resolved {
        log_fixed(file, diagnostic);
    }
    resolved.len()
}

/// Stage 3: replace the file with a re-encoded copy.
///
/// Returns the number of resolved warnings, or `None` if nothing was
/// re-encoded.
fn fix_datamodel(file: &mut FileContext, tool: &str, options: &FixOptions<'_>) -> Option<usize> {
    if !file
        .ledger
        .get(Severity::Warning)
        .iter()
        .any(Diagnostic::requires_reencode)
    {
        return None;
    }

    if let Err(e) = file.sync() {
        file.record(Diagnostic::new(
            DiagnosticCode::E0503SyncFailed,
            format!("Could not persist fixes before re-encoding: {e}"),
        ));
        return None;
    }

    file.log.info(&format!("Re-encoding with {tool}"));
    if let Err(e) = reencode_in_place(tool, options.reencode, options.grid, &file.abs_path) {
        file.record(Diagnostic::new(
            DiagnosticCode::E0502ToolFailure,
            format!("Data model fix failed: {e}"),
        ));
        return None;
    }

    let (resolved, unresolved): (Vec<_>, Vec<_>) = file
        .ledger
        .take(Severity::Warning)
        .into_iter()
        .partition(Diagnostic::requires_reencode);
    file.ledger.restore(Severity::Warning, unresolved);
    for diagnostic in &resolved {
        log_fixed(file, diagnostic);
    }
    Some(resolved.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::check::Rule;
    use crate::check::fixtures::{FILE_NAME, conforming, protocol, settings};
    use crate::dataset::OpenMode;
    use crate::log::{FileLog, LogLevel};
    use crate::protocol::Protocol;
    use serde_json::{Value, json};
    use std::fs;
    use tempfile::TempDir;

    struct Checked {
        _dir: TempDir,
        file: FileContext,
        protocol: Protocol,
        settings: Settings,
    }

    fn check(doc: Value) -> Checked {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join(FILE_NAME);
        fs::write(&path, doc.to_string()).expect("write");

        let mut file = FileContext::new(&path, dir.path(), FileLog::stderr("test", LogLevel::Error));
        file.specifiers = crate::check::fixtures::specifiers();
        file.open(OpenMode::ReadWrite).expect("open");
        let protocol = protocol();
        let mut settings = settings();
        settings.fix_attributes = true;
        file.evaluate(&Rule::ALL, &protocol, &settings);
        Checked {
            _dir: dir,
            file,
            protocol,
            settings,
        }
    }

    fn on_disk(file: &FileContext) -> Value {
        serde_json::from_str(&fs::read_to_string(&file.abs_path).expect("read")).expect("json")
    }

    #[test]
    fn test_wrong_axis_is_fixed_in_place() {
        let mut doc = conforming();
        doc["variables"]["lat"]["attributes"]["axis"] = "X".into();
        let mut checked = check(doc);
        let file = &mut checked.file;
        assert_eq!(file.ledger.count(Severity::Warning), 1);

        let outcome = apply_fixes(file, &FixOptions::from_settings(&checked.settings));
        assert_eq!(outcome, FixOutcome { fixed: 1, reencoded: false });
        assert_eq!(file.ledger.count(Severity::Warning), 0);
        assert!(file.ledger.is_clean());

        let axis = file
            .dataset()
            .and_then(|ds| ds.read_attribute(Target::Variable("lat"), "axis"));
        assert_eq!(axis, Some(AttrValue::from("Y")));

        file.close_dataset().expect("close");
        assert_eq!(on_disk(file)["variables"]["lat"]["attributes"]["axis"], "Y");
    }

    #[test]
    fn test_second_pass_changes_nothing() {
        let mut doc = conforming();
        doc["variables"]["lon"]["attributes"]["long_name"] = "lon".into();
        let mut checked = check(doc);
        let options = FixOptions::from_settings(&checked.settings);

        assert_eq!(apply_fixes(&mut checked.file, &options).fixed, 1);
        assert_eq!(apply_fixes(&mut checked.file, &options).fixed, 0);

        // re-checking the fixed handle finds nothing to fix either
        let file = &mut checked.file;
        file.reopen().expect("reopen");
        file.ledger.discard_from(&Rule::ALL);
        file.evaluate(&Rule::ALL, &checked.protocol, &checked.settings);
        assert!(file.ledger.is_clean());
        assert_eq!(apply_fixes(file, &options).fixed, 0);
    }

    #[test]
    fn test_missing_fill_value_is_not_fixed() {
        let mut doc = conforming();
        if let Some(attrs) = doc["variables"]["tas"]["attributes"].as_object_mut() {
            attrs.remove("_FillValue");
        }
        let mut checked = check(doc);
        let before = checked.file.ledger.count(Severity::Error);
        assert_eq!(before, 1);

        let outcome = apply_fixes(&mut checked.file, &FixOptions::from_settings(&checked.settings));
        assert_eq!(outcome.fixed, 0);
        assert_eq!(checked.file.ledger.count(Severity::Error), before);
    }

    #[test]
    fn test_axis_order_stays_dirty() {
        let mut doc = conforming();
        doc["variables"]["lat"]["data"] = json!([-89.75, 0.0, 89.75]);
        let mut checked = check(doc);
        assert_eq!(checked.file.ledger.count(Severity::Warning), 1);

        apply_fixes(&mut checked.file, &FixOptions::from_settings(&checked.settings));
        assert_eq!(checked.file.ledger.count(Severity::Warning), 1);
        assert!(!checked.file.ledger.is_clean());
    }

    #[test]
    fn test_read_only_handle_reports_fix_failure() {
        let mut doc = conforming();
        doc["variables"]["lat"]["attributes"]["units"] = "degrees".into();
        let mut checked = check(doc);
        checked.file.close_dataset().expect("close");
        checked.file.open(OpenMode::Read).expect("open read-only");

        let outcome = apply_fixes(&mut checked.file, &FixOptions::from_settings(&checked.settings));
        assert_eq!(outcome.fixed, 0);
        assert_eq!(checked.file.ledger.count(Severity::Warning), 1);
        assert_eq!(
            checked.file.ledger.get(Severity::Error)[0].code,
            DiagnosticCode::E0501FixFailed
        );
    }

    #[test]
    fn test_reencode_skipped_without_encoding_warnings() {
        let mut doc = conforming();
        doc["variables"]["lat"]["attributes"]["axis"] = "X".into();
        let mut checked = check(doc);
        let mut options = FixOptions::from_settings(&checked.settings);
        options.datamodel = Some("no-such-tool");

        let outcome = apply_fixes(&mut checked.file, &options);
        assert!(!outcome.reencoded);
        assert!(checked.file.ledger.is_clean());
    }

    #[cfg(unix)]
    #[test]
    fn test_failed_reencode_leaves_file_untouched() {
        use crate::reencode::tests::fake_tools;

        let mut doc = conforming();
        doc["variables"]["tas"]["attributes"]["_ChunkSizes"] = json!([2, 3, 4]);
        doc["variables"]["lat"]["attributes"]["axis"] = "X".into();
        let mut checked = check(doc);
        let tools = TempDir::new().expect("temp dir");
        let reencode = fake_tools(tools.path(), "echo garbage > \"$out\"\nexit 1", None);
        let options = FixOptions {
            datamodel: Some("nccopy"),
            reencode: &reencode,
            ..FixOptions::from_settings(&checked.settings)
        };

        let outcome = apply_fixes(&mut checked.file, &options);
        assert_eq!(outcome, FixOutcome { fixed: 1, reencoded: false });

        let file = &checked.file;
        assert_eq!(file.ledger.count(Severity::Warning), 1);
        assert!(file.ledger.get(Severity::Warning)[0].requires_reencode());
        assert_eq!(
            file.ledger.get(Severity::Error)[0].code,
            DiagnosticCode::E0502ToolFailure
        );

        // the attribute fix was synced, the payload was not replaced
        let disk = on_disk(file);
        assert_eq!(disk["variables"]["lat"]["attributes"]["axis"], "Y");
        assert_eq!(disk["variables"]["tas"]["attributes"]["_ChunkSizes"], json!([2, 3, 4]));
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_reencode_is_a_tool_failure() {
        use crate::reencode::tests::fake_tools;

        let mut doc = conforming();
        doc["variables"]["tas"]["attributes"]["_ChunkSizes"] = json!([2, 3, 4]);
        let mut checked = check(doc.clone());
        let tools = TempDir::new().expect("temp dir");
        let reencode = fake_tools(tools.path(), "printf '\\211HDF' > \"$out\"", None);
        let options = FixOptions {
            datamodel: Some("nccopy"),
            reencode: &reencode,
            ..FixOptions::from_settings(&checked.settings)
        };

        let outcome = apply_fixes(&mut checked.file, &options);
        assert_eq!(outcome, FixOutcome { fixed: 0, reencoded: false });
        let error = &checked.file.ledger.get(Severity::Error)[0];
        assert_eq!(error.code, DiagnosticCode::E0502ToolFailure);
        assert!(error.message.contains("can not be read back"), "{}", error.message);
        assert_eq!(on_disk(&checked.file), doc);
    }

    #[cfg(unix)]
    #[test]
    fn test_successful_reencode_resolves_encoding_warnings() {
        use crate::reencode::tests::fake_tools;

        let mut doc = conforming();
        doc["variables"]["tas"]["attributes"]["_ChunkSizes"] = json!([2, 3, 4]);
        let mut checked = check(doc);
        let tools = TempDir::new().expect("temp dir");
        let reencode = fake_tools(tools.path(), "cp \"$in\" \"$out\"", Some(&conforming()));
        let options = FixOptions {
            datamodel: Some("nccopy"),
            reencode: &reencode,
            ..FixOptions::from_settings(&checked.settings)
        };

        let outcome = apply_fixes(&mut checked.file, &options);
        assert_eq!(outcome, FixOutcome { fixed: 1, reencoded: true });
        assert!(checked.file.ledger.is_clean());

        checked.file.reopen().expect("reopen");
        checked.file.ledger.discard_from(&Rule::PAYLOAD);
        checked
            .file
            .evaluate(&Rule::PAYLOAD, &checked.protocol, &checked.settings);
        assert!(checked.file.ledger.is_clean());
    }
}
