//! Rules evaluated against one file.
//!
//! A rule reads the metadata snapshot (and, for range rules, the payload)
//! and returns diagnostics. Rules never write to the dataset; repairs are
//! attached as [`Remediation`](crate::diagnostic::Remediation)s and applied
//! later by the fix stages.

mod axes;
mod naming;
mod schema;
mod variable;

pub use naming::match_naming_scheme;

use crate::config::Settings;
use crate::dataset::Dataset;
use crate::diagnostic::Diagnostic;
use crate::model::{Metadata, Specifiers};
use crate::protocol::Protocol;

/// Everything a rule may look at
pub struct RuleContext<'a> {
    pub metadata: &'a Metadata,
    pub dataset: &'a dyn Dataset,
    pub specifiers: &'a Specifiers,
    pub protocol: &'a Protocol,
    pub settings: &'a Settings,
}

impl RuleContext<'_> {
    /// Name of the data variable taken from the file name
    pub fn variable_name(&self) -> Option<&str> {
        self.specifiers.get("variable").and_then(|s| s.as_str())
    }
}

/// The rule set, in evaluation order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, strum::AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Rule {
    /// Presence, dtype and CF attributes of the coordinate variables
    AxisVariables,
    /// Presence, dtype, dimensions and units of the data variable
    Variable,
    /// Chunk layout of the data variable
    Chunking,
    /// `_FillValue` and `missing_value` of the data variable
    FillValue,
    /// Coordinate minimum, maximum and storage order
    AxisRange,
    /// Data variable against valid_min/valid_max
    ValidRange,
    /// Whole snapshot against the protocol's JSON schema
    Schema,
}

impl Rule {
    pub const ALL: [Rule; 7] = [
        Rule::AxisVariables,
        Rule::Variable,
        Rule::Chunking,
        Rule::FillValue,
        Rule::AxisRange,
        Rule::ValidRange,
        Rule::Schema,
    ];

    /// Rules whose outcome depends on the payload or its encoding; re-run
    /// after a re-encode replaced the file.
    pub const PAYLOAD: [Rule; 4] = [
        Rule::Chunking,
        Rule::AxisRange,
        Rule::ValidRange,
        Rule::Schema,
    ];

    pub fn evaluate(self, ctx: &RuleContext<'_>) -> Vec<Diagnostic> {
        let diagnostics = match self {
            Self::AxisVariables => axes::check_axis_variables(ctx),
            Self::Variable => variable::check_variable(ctx),
            Self::Chunking => variable::check_chunking(ctx),
            Self::FillValue => variable::check_fill_value(ctx),
            Self::AxisRange => axes::check_axis_range(ctx),
            Self::ValidRange => variable::check_valid_range(ctx),
            Self::Schema => schema::check_schema(ctx),
        };
        diagnostics
            .into_iter()
            .map(|d| d.from_rule(self))
            .collect()
    }
}

/// Evaluate `rules` in order and concatenate their diagnostics.
pub fn run_rules(rules: &[Rule], ctx: &RuleContext<'_>) -> Vec<Diagnostic> {
    rules.iter().flat_map(|rule| rule.evaluate(ctx)).collect()
}

#[cfg(test)]
pub(crate) mod fixtures;
