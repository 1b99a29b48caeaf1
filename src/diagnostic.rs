//! Diagnostic codes, severities and remediation actions.

use crate::check::Rule;
use crate::dataset::AttrValue;
use serde::{Serialize, Serializer};
use std::fmt;

/// Diagnostic severity level
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, strum::AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
    Critical,
}

impl Severity {
    pub const ALL: [Severity; 4] = [
        Severity::Info,
        Severity::Warning,
        Severity::Error,
        Severity::Critical,
    ];

    /// Only info and warning diagnostics may carry a remediation action.
    pub fn accepts_fix(self) -> bool {
        matches!(self, Self::Info | Self::Warning)
    }
}

/// Diagnostic codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticCode {
    // Info (I01xx)
    I0101FileMatched,
    I0102LooksGood,
    I0103RangeSkipped,
    I0104Fixed,

    // Metadata mismatches, fixable in place (W01xx)
    W0101AttributeMismatch,
    W0102AttributeMissing,
    W0103DtypeUnexpected,
    W0104UnitsUndefined,

    // Layout issues (W02xx)
    W0201DimensionOrder,
    W0202AxisOrder,

    // Encoding issues, fixable by re-encode only (W03xx)
    W0301Chunking,

    // Naming scheme (E01xx)
    E0101FileNotMatched,
    E0102VariableSpecifierMissing,

    // Structural violations (E02xx)
    E0201VariableMissing,
    E0202DefinitionMissing,
    E0203DimensionsInvalid,
    E0204VariableUnits,

    // Payload violations (E03xx)
    E0301FillValueMissing,
    E0302FillValueInvalid,
    E0303RangeMismatch,
    E0304ValidRangeExceeded,
    E0305PayloadUnreadable,

    // Schema violations (E04xx)
    E0401SchemaInvalid,

    // Fix and tool failures (E05xx)
    E0501FixFailed,
    E0502ToolFailure,
    E0503SyncFailed,

    // Transfer failures (E06xx)
    E0601TransferFailed,

    // Criticals (C01xx)
    C0101OpenFailed,
    C0102ReopenFailed,
}

impl DiagnosticCode {
    pub fn severity(&self) -> Severity {
        match self.code().as_bytes().first() {
            Some(b'I') => Severity::Info,
            Some(b'W') => Severity::Warning,
            Some(b'C') => Severity::Critical,
            _ => Severity::Error,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            // I01xx
            Self::I0101FileMatched => "I0101",
            Self::I0102LooksGood => "I0102",
            Self::I0103RangeSkipped => "I0103",
            Self::I0104Fixed => "I0104",
            // W01xx
            Self::W0101AttributeMismatch => "W0101",
            Self::W0102AttributeMissing => "W0102",
            Self::W0103DtypeUnexpected => "W0103",
            Self::W0104UnitsUndefined => "W0104",
            // W02xx
            Self::W0201DimensionOrder => "W0201",
            Self::W0202AxisOrder => "W0202",
            // W03xx
            Self::W0301Chunking => "W0301",
            // E01xx
            Self::E0101FileNotMatched => "E0101",
            Self::E0102VariableSpecifierMissing => "E0102",
            // E02xx
            Self::E0201VariableMissing => "E0201",
            Self::E0202DefinitionMissing => "E0202",
            Self::E0203DimensionsInvalid => "E0203",
            Self::E0204VariableUnits => "E0204",
            // E03xx
            Self::E0301FillValueMissing => "E0301",
            Self::E0302FillValueInvalid => "E0302",
            Self::E0303RangeMismatch => "E0303",
            Self::E0304ValidRangeExceeded => "E0304",
            Self::E0305PayloadUnreadable => "E0305",
            // E04xx
            Self::E0401SchemaInvalid => "E0401",
            // E05xx
            Self::E0501FixFailed => "E0501",
            Self::E0502ToolFailure => "E0502",
            Self::E0503SyncFailed => "E0503",
            // E06xx
            Self::E0601TransferFailed => "E0601",
            // C01xx
            Self::C0101OpenFailed => "C0101",
            Self::C0102ReopenFailed => "C0102",
        }
    }
}

/// Serialized as the bare code, e.g. `"W0101"`
impl Serialize for DiagnosticCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.code())
    }
}

/// A deferred repair bound to one diagnostic.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Remediation {
    /// Rewrite one attribute of a variable in place
    SetVariableAttribute {
        variable: String,
        name: String,
        value: AttrValue,
    },
    /// Rewrite the whole file with the configured re-encoder
    Reencode,
}

impl Remediation {
    pub fn set_attribute(
        variable: impl Into<String>,
        name: impl Into<String>,
        value: impl Into<AttrValue>,
    ) -> Self {
        Self::SetVariableAttribute {
            variable: variable.into(),
            name: name.into(),
            value: value.into(),
        }
    }
}

impl fmt::Display for Remediation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SetVariableAttribute {
                variable,
                name,
                value,
            } => write!(f, "set {variable}.{name} = {value}"),
            Self::Reencode => write!(f, "re-encode data model"),
        }
    }
}

/// A diagnostic message
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub code: DiagnosticCode,
    pub severity: Severity,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fix: Option<Remediation>,
    /// Rule that produced the diagnostic, `None` for pipeline-level records
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule: Option<Rule>,
    /// Extended context such as the serialized metadata snapshot
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl Diagnostic {
    pub fn new(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self {
            severity: code.severity(),
            code,
            message: message.into(),
            fix: None,
            rule: None,
            detail: None,
        }
    }

    /// Attach a remediation. Ignored for error and critical diagnostics,
    /// which are never repaired automatically.
    pub fn with_fix(mut self, fix: Remediation) -> Self {
        debug_assert!(
            self.severity.accepts_fix(),
            "{} diagnostics cannot carry a fix",
            self.severity.as_ref()
        );
        if self.severity.accepts_fix() {
            self.fix = Some(fix);
        }
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn from_rule(mut self, rule: Rule) -> Self {
        self.rule = Some(rule);
        self
    }

    /// True for warnings that only a full re-encode can resolve.
    pub fn requires_reencode(&self) -> bool {
        self.severity == Severity::Warning && matches!(self.fix, Some(Remediation::Reencode))
    }

    /// True if the fix is an in-place attribute rewrite.
    pub fn has_attribute_fix(&self) -> bool {
        matches!(self.fix, Some(Remediation::SetVariableAttribute { .. }))
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}[{}]: {}",
            self.severity.as_ref(),
            self.code.code(),
            self.message
        )
    }
}
