//! Checks on the data variable named by the file's `variable` specifier.

use super::RuleContext;
use super::axes::extent;
use crate::dataset::DType;
use crate::diagnostic::{Diagnostic, DiagnosticCode, Remediation};
use crate::model::{VariableDefinition, VariableMeta};

/// Canonical fill value sentinel
const FILL_VALUE: f64 = 1e20;
const FILL_VALUE_REL_TOL: f64 = 1e-6;

const DEFAULT_DIMENSIONS: [&str; 3] = ["time", "lat", "lon"];

fn is_close(a: f64, b: f64, rel_tol: f64) -> bool {
    (a - b).abs() <= rel_tol * a.abs().max(b.abs())
}

/// The data variable and its definition, if both exist
fn resolve<'a>(ctx: &'a RuleContext<'_>) -> Option<(&'a VariableMeta, &'a VariableDefinition)> {
    let name = ctx.variable_name()?;
    Some((
        ctx.metadata.variable(name)?,
        ctx.protocol.definitions.variable.get(name)?,
    ))
}

fn is_permutation(a: &[String], b: &[String]) -> bool {
    let mut a = a.to_vec();
    let mut b = b.to_vec();
    a.sort();
    b.sort();
    a == b
}

fn check_dimensions(var: &VariableMeta, definition: &VariableDefinition, out: &mut Vec<Diagnostic>) {
    let default: Vec<String> = DEFAULT_DIMENSIONS.iter().map(ToString::to_string).collect();
    let mut accepted = Vec::new();
    if !definition.dimensions.is_empty() {
        accepted.push(definition.dimensions.clone());
    }
    if !accepted.contains(&default) {
        accepted.push(default);
    }

    let name = &var.name;
    let actual = &var.dimensions;
    if accepted.contains(actual) {
        out.push(Diagnostic::new(
            DiagnosticCode::I0102LooksGood,
            format!("Dimensions of \"{name}\" look good {actual:?}."),
        ));
    } else if !(2..=4).contains(&actual.len()) {
        out.push(Diagnostic::new(
            DiagnosticCode::E0203DimensionsInvalid,
            format!(
                "\"{name}\" neither holds 2D, 3D nor 4D data (dimensions {actual:?})."
            ),
        ));
    } else if let Some(expected) = accepted.iter().find(|a| is_permutation(a, actual)) {
        out.push(Diagnostic::new(
            DiagnosticCode::W0201DimensionOrder,
            format!("Dimension order of \"{name}\" is {actual:?}. Should be {expected:?}."),
        ));
    } else {
        let expected: Vec<String> = accepted.iter().map(|a| format!("{a:?}")).collect();
        out.push(Diagnostic::new(
            DiagnosticCode::E0203DimensionsInvalid,
            format!(
                "Dimensions of \"{name}\" are {actual:?}. Must be {}.",
                expected.join(" or ")
            ),
        ));
    }
}

fn check_units(var: &VariableMeta, definition: &VariableDefinition, out: &mut Vec<Diagnostic>) {
    let name = &var.name;
    let Some(expected) = &definition.units else {
        out.push(Diagnostic::new(
            DiagnosticCode::W0104UnitsUndefined,
            format!("No units defined for \"{name}\"."),
        ));
        return;
    };

    // units describe the payload; rewriting them would relabel the data
    match var.attribute("units") {
        None => out.push(Diagnostic::new(
            DiagnosticCode::E0204VariableUnits,
            format!("\"units\" attribute of \"{name}\" is missing. Should be \"{expected}\"."),
        )),
        Some(value) if value.as_str() == Some(expected.as_str()) => {
            out.push(Diagnostic::new(
                DiagnosticCode::I0102LooksGood,
                format!("Units of \"{name}\" look good ({value})."),
            ));
        }
        Some(value) => out.push(Diagnostic::new(
            DiagnosticCode::E0204VariableUnits,
            format!("\"units\" attribute of \"{name}\" is {value}. Should be \"{expected}\"."),
        )),
    }
}

pub(super) fn check_variable(ctx: &RuleContext<'_>) -> Vec<Diagnostic> {
    let Some(name) = ctx.variable_name() else {
        return vec![Diagnostic::new(
            DiagnosticCode::E0102VariableSpecifierMissing,
            "No variable specifier found in the file name.",
        )];
    };
    let Some(var) = ctx.metadata.variable(name) else {
        return vec![Diagnostic::new(
            DiagnosticCode::E0201VariableMissing,
            format!("Variable \"{name}\" is missing."),
        )];
    };
    let Some(definition) = ctx.protocol.definitions.variable.get(name) else {
        return vec![Diagnostic::new(
            DiagnosticCode::E0202DefinitionMissing,
            format!("Definition for variable \"{name}\" is missing."),
        )];
    };

    let mut out = Vec::new();
    if var.dtype != Some(DType::Float32) {
        let actual = var
            .dtype
            .map_or_else(|| "unknown".to_string(), |d| d.to_string());
        out.push(Diagnostic::new(
            DiagnosticCode::W0103DtypeUnexpected,
            format!("Data type of \"{name}\" is \"{actual}\". Should be \"float32\"."),
        ));
    }
    check_dimensions(var, definition, &mut out);
    check_units(var, definition, &mut out);
    out
}

pub(super) fn check_chunking(ctx: &RuleContext<'_>) -> Vec<Diagnostic> {
    let Some((var, _)) = resolve(ctx) else {
        return vec![];
    };
    let name = &var.name;
    let grid = ctx.settings.grid;

    // chunks never exceed the dimension they cover
    let spatial = match var.shape.as_slice() {
        [.., lat, lon] => (grid.lat.min(*lat), grid.lon.min(*lon)),
        _ => (grid.lat, grid.lon),
    };
    let expected = format!("[1, ..., {}, {}]", spatial.0, spatial.1);

    let message = match &var.chunking {
        Some(chunks) => match chunks.as_slice() {
            [1, .., lat, lon] if (*lat, *lon) == spatial => {
                return vec![Diagnostic::new(
                    DiagnosticCode::I0102LooksGood,
                    format!("Chunking of \"{name}\" looks good {chunks:?}."),
                )];
            }
            _ => format!("Chunking of \"{name}\" is {chunks:?}. Should be {expected}."),
        },
        None => format!("\"{name}\" is stored contiguously. Should be chunked {expected}."),
    };
    vec![Diagnostic::new(DiagnosticCode::W0301Chunking, message).with_fix(Remediation::Reencode)]
}

pub(super) fn check_fill_value(ctx: &RuleContext<'_>) -> Vec<Diagnostic> {
    let Some((var, _)) = resolve(ctx) else {
        return vec![];
    };
    let name = &var.name;

    ["_FillValue", "missing_value"]
        .into_iter()
        .map(|attr| {
            let Some(raw) = var.attribute(attr) else {
                return Diagnostic::new(
                    DiagnosticCode::E0301FillValueMissing,
                    format!("\"{attr}\" of \"{name}\" is missing. Should be {FILL_VALUE:e}."),
                );
            };
            match raw.as_f64() {
                Some(value) if is_close(value, FILL_VALUE, FILL_VALUE_REL_TOL) => Diagnostic::new(
                    DiagnosticCode::I0102LooksGood,
                    format!("\"{attr}\" of \"{name}\" looks good ({value:e})."),
                ),
                Some(value) => Diagnostic::new(
                    DiagnosticCode::E0302FillValueInvalid,
                    format!("\"{attr}\" of \"{name}\" is {value:e}. Should be {FILL_VALUE:e}."),
                ),
                // present but not numeric
                None => Diagnostic::new(
                    DiagnosticCode::E0302FillValueInvalid,
                    format!("\"{attr}\" of \"{name}\" is {raw}. Should be {FILL_VALUE:e}."),
                ),
            }
        })
        .collect()
}

pub(super) fn check_valid_range(ctx: &RuleContext<'_>) -> Vec<Diagnostic> {
    if !ctx.settings.minmax {
        return vec![];
    }
    let Some((var, definition)) = resolve(ctx) else {
        return vec![];
    };
    let name = &var.name;

    let (Some(valid_min), Some(valid_max)) = (definition.valid_min, definition.valid_max) else {
        return vec![Diagnostic::new(
            DiagnosticCode::I0102LooksGood,
            format!("No valid range defined for \"{name}\"."),
        )];
    };

    let diagnostic = match extent(ctx.dataset, name, definition.reduction) {
        Ok(Some((min, max))) if min < valid_min || max > valid_max => Diagnostic::new(
            DiagnosticCode::E0304ValidRangeExceeded,
            format!(
                "Values of \"{name}\" ({min:.2E} to {max:.2E}) are outside the valid range ({valid_min:.2E} to {valid_max:.2E})."
            ),
        ),
        Ok(Some((min, max))) => Diagnostic::new(
            DiagnosticCode::I0102LooksGood,
            format!("Values of \"{name}\" ({min:.2E} to {max:.2E}) are within the valid range."),
        ),
        Ok(None) => Diagnostic::new(
            DiagnosticCode::I0102LooksGood,
            format!("\"{name}\" holds no valid values."),
        ),
        Err(e) => Diagnostic::new(
            DiagnosticCode::E0305PayloadUnreadable,
            format!("Could not read values of \"{name}\": {e}"),
        ),
    };
    vec![diagnostic]
}
