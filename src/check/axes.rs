//! Coordinate variable checks.

use super::RuleContext;
use crate::dataset::{DType, Dataset, DatasetError};
use crate::diagnostic::{Diagnostic, DiagnosticCode, Remediation};
use crate::model::{AxisDefinition, AxisOrder, Reduction, VariableMeta};

const AXIS_DTYPES: [DType; 2] = [DType::Float32, DType::Float64];

/// Compare one attribute against the single accepted value.
fn expect_attribute(var: &VariableMeta, name: &str, expected: &str, out: &mut Vec<Diagnostic>) {
    expect_one_of(var, name, &[expected.to_string()], out);
}

/// Compare one attribute against a list of accepted values. The repair
/// writes the first one.
fn expect_one_of(var: &VariableMeta, name: &str, accepted: &[String], out: &mut Vec<Diagnostic>) {
    let Some(first) = accepted.first() else {
        return;
    };
    let v = &var.name;
    let expectation = match accepted {
        [single] => format!("\"{single}\""),
        _ => format!("one of {accepted:?}"),
    };
    let fix = Remediation::set_attribute(v, name, first.as_str());

    match var.attribute(name) {
        None => out.push(
            Diagnostic::new(
                DiagnosticCode::W0102AttributeMissing,
                format!("\"{name}\" attribute of \"{v}\" is missing. Should be {expectation}."),
            )
            .with_fix(fix),
        ),
        Some(value) if value.as_str().is_some_and(|s| accepted.iter().any(|a| a == s)) => {
            out.push(Diagnostic::new(
                DiagnosticCode::I0102LooksGood,
                format!("\"{name}\" attribute of \"{v}\" looks good ({value})."),
            ));
        }
        Some(value) => out.push(
            Diagnostic::new(
                DiagnosticCode::W0101AttributeMismatch,
                format!("\"{name}\" attribute of \"{v}\" is {value}. Should be {expectation}."),
            )
            .with_fix(fix),
        ),
    }
}

fn check_axis(var: &VariableMeta, definition: &AxisDefinition, out: &mut Vec<Diagnostic>) {
    match var.dtype {
        Some(dtype) if AXIS_DTYPES.contains(&dtype) => {}
        other => out.push(Diagnostic::new(
            DiagnosticCode::W0103DtypeUnexpected,
            format!(
                "Data type of \"{}\" is \"{}\". Should be float32 or float64.",
                var.name,
                other.map_or_else(|| "unknown".to_string(), |d| d.to_string())
            ),
        )),
    }

    if let Some(axis) = &definition.axis {
        expect_attribute(var, "axis", axis, out);
    }
    if let Some(standard_name) = &definition.standard_name {
        expect_attribute(var, "standard_name", standard_name, out);
    }
    expect_one_of(var, "long_name", &definition.long_names, out);
    if let Some(units) = &definition.units {
        expect_attribute(var, "units", units, out);
    }
}

pub(super) fn check_axis_variables(ctx: &RuleContext<'_>) -> Vec<Diagnostic> {
    let mut out = Vec::new();
    for name in &ctx.settings.axes {
        let Some(var) = ctx.metadata.variable(name) else {
            out.push(Diagnostic::new(
                DiagnosticCode::E0201VariableMissing,
                format!("Variable \"{name}\" is missing."),
            ));
            continue;
        };
        let Some(definition) = ctx.protocol.definitions.dimensions.get(name) else {
            out.push(Diagnostic::new(
                DiagnosticCode::E0202DefinitionMissing,
                format!("Definition for dimension \"{name}\" is missing."),
            ));
            continue;
        };
        check_axis(var, definition, &mut out);
    }
    out
}

/// Smallest and largest value under the given reduction.
pub(super) fn extent(
    dataset: &dyn Dataset,
    variable: &str,
    reduction: Reduction,
) -> Result<Option<(f64, f64)>, DatasetError> {
    match reduction {
        Reduction::Global => Ok(dataset
            .reduce_min(variable)?
            .zip(dataset.reduce_max(variable)?)),
        Reduction::Endpoints => Ok(dataset
            .endpoints(variable)?
            .map(|(first, last)| (first.min(last), first.max(last)))),
    }
}

fn check_bound(name: &str, which: &str, actual: f64, expected: Option<f64>, out: &mut Vec<Diagnostic>) {
    let Some(expected) = expected else {
        return;
    };
    if actual == expected {
        out.push(Diagnostic::new(
            DiagnosticCode::I0102LooksGood,
            format!("{which} of \"{name}\" looks good ({actual})."),
        ));
    } else {
        out.push(Diagnostic::new(
            DiagnosticCode::E0303RangeMismatch,
            format!("{which} of \"{name}\" is {actual}. Must be {expected}."),
        ));
    }
}

fn check_order(
    ctx: &RuleContext<'_>,
    name: &str,
    order: AxisOrder,
    out: &mut Vec<Diagnostic>,
) -> Result<(), DatasetError> {
    let Some((first, last)) = ctx.dataset.endpoints(name)? else {
        return Ok(());
    };
    let wrong = match order {
        AxisOrder::Descending => first < last,
        AxisOrder::Ascending => first > last,
    };
    let expected = match order {
        AxisOrder::Descending => "descending",
        AxisOrder::Ascending => "ascending",
    };
    if wrong {
        out.push(Diagnostic::new(
            DiagnosticCode::W0202AxisOrder,
            format!(
                "\"{name}\" is stored in wrong order ({first} to {last}). Index should be {expected}."
            ),
        ));
    } else {
        out.push(Diagnostic::new(
            DiagnosticCode::I0102LooksGood,
            format!("\"{name}\" order looks good ({expected})."),
        ));
    }
    Ok(())
}

fn check_range(
    ctx: &RuleContext<'_>,
    name: &str,
    definition: &AxisDefinition,
    out: &mut Vec<Diagnostic>,
) -> Result<(), DatasetError> {
    if definition.minimum.is_some() || definition.maximum.is_some() {
        match extent(ctx.dataset, name, definition.reduction)? {
            Some((min, max)) => {
                check_bound(name, "Minimum", min, definition.minimum, out);
                check_bound(name, "Maximum", max, definition.maximum, out);
            }
            None => out.push(Diagnostic::new(
                DiagnosticCode::E0305PayloadUnreadable,
                format!("\"{name}\" holds no valid values."),
            )),
        }
    }

    // latitude runs north to south unless the protocol says otherwise
    let order = definition
        .order
        .or((name == "lat").then_some(AxisOrder::Descending));
    if let Some(order) = order {
        check_order(ctx, name, order, out)?;
    }
    Ok(())
}

pub(super) fn check_axis_range(ctx: &RuleContext<'_>) -> Vec<Diagnostic> {
    if ctx.settings.is_regional() {
        return vec![Diagnostic::new(
            DiagnosticCode::I0103RangeSkipped,
            format!(
                "Skipping axis range checks for regional sector \"{}\".",
                ctx.settings.sector()
            ),
        )];
    }

    let mut out = Vec::new();
    for name in &ctx.settings.axes {
        if ctx.metadata.variable(name).is_none() {
            continue;
        }
        let Some(definition) = ctx.protocol.definitions.dimensions.get(name) else {
            continue;
        };
        if let Err(e) = check_range(ctx, name, definition, &mut out) {
            out.push(Diagnostic::new(
                DiagnosticCode::E0305PayloadUnreadable,
                format!("Could not read values of \"{name}\": {e}"),
            ));
        }
    }
    out
}
