//! Per-file diagnostic ledger.
//!
//! Rules append while a file is checked; the fix stages remove what they
//! resolved by swapping in the unresolved remainder.

use crate::check::Rule;
use crate::diagnostic::{Diagnostic, Severity};
use serde::{Serialize, Serializer};

/// Ordered diagnostics of one file, one sequence per severity
#[derive(Debug, Default)]
pub struct Ledger {
    info: Vec<Diagnostic>,
    warnings: Vec<Diagnostic>,
    errors: Vec<Diagnostic>,
    criticals: Vec<Diagnostic>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    fn bucket(&self, severity: Severity) -> &Vec<Diagnostic> {
        match severity {
            Severity::Info => &self.info,
            Severity::Warning => &self.warnings,
            Severity::Error => &self.errors,
            Severity::Critical => &self.criticals,
        }
    }

    fn bucket_mut(&mut self, severity: Severity) -> &mut Vec<Diagnostic> {
        match severity {
            Severity::Info => &mut self.info,
            Severity::Warning => &mut self.warnings,
            Severity::Error => &mut self.errors,
            Severity::Critical => &mut self.criticals,
        }
    }

    pub fn append(&mut self, diagnostic: Diagnostic) {
        self.bucket_mut(diagnostic.severity).push(diagnostic);
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.bucket(severity).len()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn has_criticals(&self) -> bool {
        !self.criticals.is_empty()
    }

    /// No warnings, errors or criticals remain.
    pub fn is_clean(&self) -> bool {
        !self.has_warnings() && !self.has_errors() && !self.has_criticals()
    }

    pub fn get(&self, severity: Severity) -> &[Diagnostic] {
        self.bucket(severity)
    }

    /// All diagnostics, by severity then insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        Severity::ALL
            .into_iter()
            .flat_map(move |severity| self.bucket(severity).iter())
    }

    /// Ordered export for logging and serialization: by severity, then
    /// insertion order.
    pub fn export(&self) -> Vec<&Diagnostic> {
        self.iter().collect()
    }

    /// Take out every diagnostic of one severity for a fix pass.
    ///
    /// The caller hands back the unresolved remainder with [`Ledger::restore`].
    pub fn take(&mut self, severity: Severity) -> Vec<Diagnostic> {
        std::mem::take(self.bucket_mut(severity))
    }

    /// Put back the unresolved diagnostics of a fix pass, ahead of anything
    /// appended to the same severity in the meantime.
    pub fn restore(&mut self, severity: Severity, mut unresolved: Vec<Diagnostic>) {
        let bucket = self.bucket_mut(severity);
        unresolved.append(bucket);
        *bucket = unresolved;
    }

    /// Drop every diagnostic produced by one of `rules`, ahead of re-running them.
    pub fn discard_from(&mut self, rules: &[Rule]) {
        for severity in Severity::ALL {
            self.bucket_mut(severity)
                .retain(|d| !d.rule.is_some_and(|rule| rules.contains(&rule)));
        }
    }
}

impl Serialize for Ledger {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostic::{DiagnosticCode, Remediation};

    fn warn(message: &str) -> Diagnostic {
        Diagnostic::new(DiagnosticCode::W0101AttributeMismatch, message)
    }

    #[test]
    fn test_append_sorts_by_severity() {
        let mut ledger = Ledger::new();
        ledger.append(Diagnostic::new(DiagnosticCode::I0102LooksGood, "ok"));
        ledger.append(warn("w"));
        ledger.append(Diagnostic::new(DiagnosticCode::E0201VariableMissing, "e"));
        ledger.append(Diagnostic::new(DiagnosticCode::C0101OpenFailed, "c"));

        for severity in Severity::ALL {
            assert_eq!(ledger.count(severity), 1);
        }
        assert!(ledger.has_warnings());
        assert!(ledger.has_errors());
        assert!(ledger.has_criticals());
        assert!(!ledger.is_clean());
    }

    #[test]
    fn test_info_only_is_clean() {
        let mut ledger = Ledger::new();
        ledger.append(Diagnostic::new(DiagnosticCode::I0101FileMatched, "matched"));
        assert!(ledger.is_clean());
    }

    #[test]
    fn test_iter_preserves_insertion_order() {
        let mut ledger = Ledger::new();
        ledger.append(warn("first"));
        ledger.append(Diagnostic::new(DiagnosticCode::E0201VariableMissing, "error"));
        ledger.append(warn("second"));

        let messages: Vec<_> = ledger.iter().map(|d| d.message.as_str()).collect();
        assert_eq!(messages, ["first", "second", "error"]);
    }

    #[test]
    fn test_take_and_restore() {
        let mut ledger = Ledger::new();
        ledger.append(warn("a"));
        ledger.append(warn("b"));

        let taken = ledger.take(Severity::Warning);
        assert_eq!(taken.len(), 2);
        assert!(!ledger.has_warnings());

        let unresolved: Vec<_> = taken.into_iter().filter(|d| d.message == "b").collect();
        ledger.append(warn("late"));
        ledger.restore(Severity::Warning, unresolved);

        let messages: Vec<_> = ledger
            .get(Severity::Warning)
            .iter()
            .map(|d| d.message.as_str())
            .collect();
        assert_eq!(messages, ["b", "late"]);
    }

    #[test]
    fn test_discard_from_rules() {
        let mut ledger = Ledger::new();
        ledger.append(
            Diagnostic::new(DiagnosticCode::W0301Chunking, "chunks")
                .with_fix(Remediation::Reencode)
                .from_rule(Rule::Chunking),
        );
        ledger.append(warn("attr").from_rule(Rule::AxisVariables));
        ledger.append(Diagnostic::new(DiagnosticCode::E0101FileNotMatched, "no rule"));

        ledger.discard_from(&[Rule::Chunking]);

        assert_eq!(ledger.count(Severity::Warning), 1);
        assert_eq!(ledger.get(Severity::Warning)[0].message, "attr");
        assert_eq!(ledger.count(Severity::Error), 1);
    }

    #[test]
    fn test_export_snapshot() {
        let mut ledger = Ledger::new();
        ledger.append(
            Diagnostic::new(DiagnosticCode::W0102AttributeMissing, "axis of lat is missing.")
                .with_fix(Remediation::set_attribute("lat", "axis", "Y"))
                .from_rule(Rule::AxisVariables),
        );
        ledger.append(Diagnostic::new(DiagnosticCode::I0101FileMatched, "File matched: {}"));
        ledger.append(
            Diagnostic::new(DiagnosticCode::E0301FillValueMissing, "_FillValue of tas is missing.")
                .from_rule(Rule::FillValue),
        );
        ledger.append(
            Diagnostic::new(DiagnosticCode::W0301Chunking, "tas is stored contiguously.")
                .with_fix(Remediation::Reencode)
                .from_rule(Rule::Chunking)
                .with_detail("chunking: none"),
        );

        insta::assert_json_snapshot!(ledger.export(), @r#"
        [
          {
            "code": "I0101",
            "severity": "info",
            "message": "File matched: {}"
          },
          {
            "code": "W0102",
            "severity": "warning",
            "message": "axis of lat is missing.",
            "fix": {
              "kind": "set_variable_attribute",
              "variable": "lat",
              "name": "axis",
              "value": "Y"
            },
            "rule": "axis_variables"
          },
          {
            "code": "W0301",
            "severity": "warning",
            "message": "tas is stored contiguously.",
            "fix": {
              "kind": "reencode"
            },
            "rule": "chunking",
            "detail": "chunking: none"
          },
          {
            "code": "E0301",
            "severity": "error",
            "message": "_FillValue of tas is missing.",
            "rule": "fill_value"
          }
        ]
        "#);
        assert_eq!(
            serde_json::to_value(&ledger).expect("serialize"),
            serde_json::to_value(ledger.export()).expect("serialize")
        );
    }
}
